// Download bridge - fetch a track's bytes and save them under a suggested
// name, or hand the raw link to the system opener when that isn't possible.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::generation::GenerationId;
use crate::playback::{MediaKind, Track};

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },
    #[error("failed to save {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not open {url}: {reason}")]
    Open { url: String, reason: String },
}

/// Where media bytes come from. Also used by the audio output to stream tracks.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, DownloadError>;
}

/// http(s) through reqwest; `file://` urls and bare paths straight from disk
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        let fetch_error = |reason: String| DownloadError::Fetch {
            url: url.to_string(),
            reason,
        };

        if url.starts_with("http://") || url.starts_with("https://") {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .and_then(|response| response.error_for_status())
                .map_err(|e| fetch_error(e.to_string()))?;
            let bytes = response.bytes().await.map_err(|e| fetch_error(e.to_string()))?;
            return Ok(bytes.to_vec());
        }

        let path = url.strip_prefix("file://").unwrap_or(url);
        tokio::fs::read(path).await.map_err(|e| fetch_error(e.to_string()))
    }
}

/// Last resort: let the OS deal with the link (browser, player, ...)
pub trait LinkOpener: Send + Sync {
    fn open(&self, url: &str, name_hint: &str) -> Result<(), DownloadError>;
}

pub struct SystemOpener;

impl LinkOpener for SystemOpener {
    fn open(&self, url: &str, name_hint: &str) -> Result<(), DownloadError> {
        // the OS picks the name; the hint only shows up in the log
        info!("Opening {} directly (suggested name {})", url, name_hint);
        #[cfg(target_os = "windows")]
        let mut command = {
            let mut command = std::process::Command::new("cmd");
            command.args(["/C", "start", ""]);
            command
        };
        #[cfg(target_os = "macos")]
        let mut command = std::process::Command::new("open");
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        let mut command = std::process::Command::new("xdg-open");

        command
            .arg(url)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map(|_| ())
            .map_err(|e| DownloadError::Open {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Saved(PathBuf),
    OpenedDirectly,
}

/// `audio-{id}-track-{n}.{ext}` / `video-{id}-{n}.{ext}`, n counting from 1
pub fn suggested_filename(id: &GenerationId, index: usize, track: &Track) -> String {
    let n = index + 1;
    match track.kind {
        MediaKind::Video => format!("video-{}-{}.{}", id, n, track.extension()),
        _ => format!("audio-{}-track-{}.{}", id, n, track.extension()),
    }
}

/// Strip anything that would escape the target directory or upset a filesystem
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "download".to_string()
    } else {
        cleaned
    }
}

const MAX_NAME_ATTEMPTS: usize = 1000;

/// `name.ext`, then `name (1).ext`, `name (2).ext`, ...
fn candidate_paths(dir: &Path, name: &str) -> impl Iterator<Item = PathBuf> {
    let dir = dir.to_path_buf();
    let name = name.to_string();
    (0..MAX_NAME_ATTEMPTS).map(move |n| {
        if n == 0 {
            return dir.join(&name);
        }
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => dir.join(format!("{stem} ({n}).{ext}")),
            _ => dir.join(format!("{name} ({n})")),
        }
    })
}

pub struct DownloadBridge {
    fetcher: Arc<dyn Fetcher>,
    opener: Arc<dyn LinkOpener>,
    target_dir: PathBuf,
}

impl DownloadBridge {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        opener: Arc<dyn LinkOpener>,
        target_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fetcher,
            opener,
            target_dir: target_dir.into(),
        }
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    async fn save(&self, track: &Track, name: &str) -> Result<PathBuf, DownloadError> {
        let bytes = self.fetcher.fetch(&track.url).await?;

        tokio::fs::create_dir_all(&self.target_dir)
            .await
            .map_err(|source| DownloadError::Save {
                path: self.target_dir.clone(),
                source,
            })?;

        // create_new claims the name atomically, so concurrent downloads
        // of the same name end up side by side
        let mut last_error = None;
        for path in candidate_paths(&self.target_dir, &sanitize_filename(name)) {
            let opened = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;
            let mut file = match opened {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    last_error = Some((path, e));
                    continue;
                }
                Err(source) => return Err(DownloadError::Save { path, source }),
            };

            let written = async {
                file.write_all(&bytes).await?;
                file.flush().await
            }
            .await;
            return match written {
                Ok(()) => Ok(path),
                Err(source) => Err(DownloadError::Save { path, source }),
            };
        }

        let (path, source) = last_error.unwrap_or_else(|| {
            (
                self.target_dir.join(name),
                std::io::Error::from(std::io::ErrorKind::AlreadyExists),
            )
        });
        Err(DownloadError::Save { path, source })
    }

    pub async fn download(
        &self,
        track: &Track,
        name: &str,
    ) -> Result<DownloadOutcome, DownloadError> {
        match self.save(track, name).await {
            Ok(path) => {
                info!("Saved {} to {}", track.url, path.display());
                Ok(DownloadOutcome::Saved(path))
            }
            Err(e) => {
                warn!("Download failed, opening link instead: {}", e);
                self.opener
                    .open(&track.url, name)
                    .map(|()| DownloadOutcome::OpenedDirectly)
            }
        }
    }

    /// One independent download per request; results come back in request order
    pub async fn download_all(
        &self,
        requests: &[(Track, String)],
    ) -> Vec<Result<DownloadOutcome, DownloadError>> {
        join_all(requests.iter().map(|(track, name)| self.download(track, name))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeFetcher {
        bodies: HashMap<String, Vec<u8>>,
    }

    #[async_trait]
    impl Fetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
            self.bodies.get(url).cloned().ok_or_else(|| DownloadError::Fetch {
                url: url.to_string(),
                reason: "404".to_string(),
            })
        }
    }

    #[derive(Default)]
    struct FakeOpener {
        opened: Mutex<Vec<(String, String)>>,
        refuse: bool,
    }

    impl LinkOpener for FakeOpener {
        fn open(&self, url: &str, name_hint: &str) -> Result<(), DownloadError> {
            if self.refuse {
                return Err(DownloadError::Open {
                    url: url.to_string(),
                    reason: "no opener".to_string(),
                });
            }
            self.opened
                .lock()
                .unwrap()
                .push((url.to_string(), name_hint.to_string()));
            Ok(())
        }
    }

    fn bridge(dir: &TempDir, bodies: &[(&str, &str)], opener: Arc<FakeOpener>) -> DownloadBridge {
        let fetcher = FakeFetcher {
            bodies: bodies
                .iter()
                .map(|(url, body)| (url.to_string(), body.as_bytes().to_vec()))
                .collect(),
        };
        DownloadBridge::new(Arc::new(fetcher), opener, dir.path().join("downloads"))
    }

    #[test]
    fn test_suggested_filenames() {
        let id = GenerationId::from("abc");
        let song = Track::new("https://cdn/x.wav?sig=1", MediaKind::Audio);
        let clip = Track::new("https://cdn/stream", MediaKind::Video);
        assert_eq!(suggested_filename(&id, 0, &song), "audio-abc-track-1.wav");
        assert_eq!(suggested_filename(&id, 1, &clip), "video-abc-2.mp4");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_filename("a:b?.mp3"), "a_b_.mp3");
        assert_eq!(sanitize_filename("   "), "download");
    }

    #[tokio::test]
    async fn test_download_saves_under_suggested_name() {
        let dir = TempDir::new().unwrap();
        let opener = Arc::new(FakeOpener::default());
        let bridge = bridge(&dir, &[("a.mp3", "ID3")], opener.clone());

        let track = Track::new("a.mp3", MediaKind::Audio);
        let outcome = bridge.download(&track, "audio-x-track-1.mp3").await.unwrap();

        let expected = dir.path().join("downloads").join("audio-x-track-1.mp3");
        assert_eq!(outcome, DownloadOutcome::Saved(expected.clone()));
        assert_eq!(std::fs::read(expected).unwrap(), b"ID3");
        assert!(opener.opened.lock().unwrap().is_empty());

        // same name again does not clobber the first file
        let outcome = bridge.download(&track, "audio-x-track-1.mp3").await.unwrap();
        let second = dir.path().join("downloads").join("audio-x-track-1 (1).mp3");
        assert_eq!(outcome, DownloadOutcome::Saved(second));
    }

    #[tokio::test]
    async fn test_concurrent_downloads_of_one_name_keep_every_file() {
        let dir = TempDir::new().unwrap();
        let opener = Arc::new(FakeOpener::default());
        let bridge = bridge(&dir, &[("a.mp3", "ID3")], opener.clone());

        let track = Track::new("a.mp3", MediaKind::Audio);
        let requests: Vec<(Track, String)> =
            (0..4).map(|_| (track.clone(), "same.mp3".to_string())).collect();
        let results = bridge.download_all(&requests).await;

        let mut saved: Vec<PathBuf> = results
            .into_iter()
            .map(|result| match result.unwrap() {
                DownloadOutcome::Saved(path) => path,
                DownloadOutcome::OpenedDirectly => panic!("expected a saved file"),
            })
            .collect();
        saved.sort();
        saved.dedup();
        assert_eq!(saved.len(), 4);
        for path in &saved {
            assert_eq!(std::fs::read(path).unwrap(), b"ID3");
        }
        assert!(opener.opened.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_falls_back_to_opener() {
        let dir = TempDir::new().unwrap();
        let opener = Arc::new(FakeOpener::default());
        let bridge = bridge(&dir, &[], opener.clone());

        let track = Track::new("https://cdn/missing.mp3", MediaKind::Audio);
        let outcome = bridge.download(&track, "song.mp3").await.unwrap();

        assert_eq!(outcome, DownloadOutcome::OpenedDirectly);
        assert_eq!(
            opener.opened.lock().unwrap().as_slice(),
            &[("https://cdn/missing.mp3".to_string(), "song.mp3".to_string())]
        );
    }

    #[tokio::test]
    async fn test_both_paths_failing_is_an_error() {
        let dir = TempDir::new().unwrap();
        let opener = Arc::new(FakeOpener {
            refuse: true,
            ..Default::default()
        });
        let bridge = bridge(&dir, &[], opener);

        let result = bridge.download(&Track::new("x.mp3", MediaKind::Audio), "x.mp3").await;
        assert!(matches!(result, Err(DownloadError::Open { .. })));
    }

    #[tokio::test]
    async fn test_download_all_is_independent() {
        let dir = TempDir::new().unwrap();
        let opener = Arc::new(FakeOpener {
            refuse: true,
            ..Default::default()
        });
        let bridge = bridge(&dir, &[("1.mp3", "one"), ("3.mp3", "three")], opener);

        let requests: Vec<(Track, String)> = ["1.mp3", "2.mp3", "3.mp3"]
            .iter()
            .enumerate()
            .map(|(i, url)| (Track::new(*url, MediaKind::Audio), format!("t{}.mp3", i + 1)))
            .collect();
        let results = bridge.download_all(&requests).await;

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
        assert_eq!(
            std::fs::read(dir.path().join("downloads").join("t3.mp3")).unwrap(),
            b"three"
        );
    }

    #[tokio::test]
    async fn test_http_fetcher_reads_local_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("local.mp3");
        std::fs::write(&path, b"bytes").unwrap();

        let fetcher = HttpFetcher::new();
        let plain = fetcher.fetch(path.to_str().unwrap()).await.unwrap();
        let url = format!("file://{}", path.display());
        let prefixed = fetcher.fetch(&url).await.unwrap();
        assert_eq!(plain, b"bytes");
        assert_eq!(prefixed, b"bytes");
    }
}
