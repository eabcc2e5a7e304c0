use serde::{Deserialize, Serialize};

use super::MediaKind;
use crate::generation::ResultAsset;

/// A playable unit derived from a generation's assets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub url: String,
    pub cover: Option<String>,
    pub kind: MediaKind,
}

impl Track {
    pub fn new(url: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            url: url.into(),
            cover: None,
            kind,
        }
    }

    pub fn with_cover(mut self, cover: impl Into<String>) -> Self {
        self.cover = Some(cover.into());
        self
    }

    /// Extension of the url path, falling back to the kind's default
    pub fn extension(&self) -> String {
        url_extension(&self.url)
            .filter(|ext| MediaKind::from_extension(ext) == self.kind)
            .unwrap_or_else(|| self.kind.default_extension().to_string())
    }
}

/// Lowercased extension of the last path segment, ignoring query and fragment
pub fn url_extension(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Mime hint first, url extension second
pub fn classify(asset: &ResultAsset) -> MediaKind {
    asset
        .mime
        .as_deref()
        .and_then(MediaKind::from_mime)
        .or_else(|| url_extension(&asset.url).map(|ext| MediaKind::from_extension(&ext)))
        .unwrap_or(MediaKind::Other)
}

/// Cover pairing: an audio asset takes the image sitting right after it.
///
/// Purely positional - nothing in the feed links an image to its audio,
/// so reordering assets upstream silently changes which cover is shown.
fn paired_cover(assets: &[ResultAsset], audio_index: usize) -> Option<String> {
    assets
        .get(audio_index + 1)
        .filter(|next| classify(next) == MediaKind::Image)
        .map(|next| next.url.clone())
}

/// Playable tracks in asset order. Empty input is just an empty list.
pub fn extract_tracks(assets: &[ResultAsset]) -> Vec<Track> {
    assets
        .iter()
        .enumerate()
        .filter_map(|(index, asset)| match classify(asset) {
            MediaKind::Audio => Some(Track {
                url: asset.url.clone(),
                cover: paired_cover(assets, index),
                kind: MediaKind::Audio,
            }),
            MediaKind::Video => Some(Track::new(asset.url.clone(), MediaKind::Video)),
            MediaKind::Image | MediaKind::Other => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio(url: &str) -> ResultAsset {
        ResultAsset::new(url, Some("audio/mpeg"))
    }

    fn image(url: &str) -> ResultAsset {
        ResultAsset::new(url, Some("image/jpeg"))
    }

    #[test]
    fn test_single_song_with_cover() {
        let tracks = extract_tracks(&[audio("a.mp3"), image("c.jpg")]);
        assert_eq!(tracks, vec![Track::new("a.mp3", MediaKind::Audio).with_cover("c.jpg")]);
    }

    #[test]
    fn test_cover_only_from_immediate_successor() {
        let tracks = extract_tracks(&[audio("a.mp3"), image("i.jpg"), audio("b.mp3")]);
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].cover.as_deref(), Some("i.jpg"));
        assert_eq!(tracks[1].cover, None);

        let tracks = extract_tracks(&[audio("a.mp3"), audio("b.mp3")]);
        assert!(tracks.iter().all(|t| t.cover.is_none()));

        // an image before the audio belongs to nobody
        let tracks = extract_tracks(&[image("i.jpg"), audio("a.mp3")]);
        assert_eq!(tracks[0].cover, None);
    }

    #[test]
    fn test_video_never_takes_cover() {
        let assets = [ResultAsset::new("v.mp4", Some("video/mp4")), image("poster.png")];
        let tracks = extract_tracks(&assets);
        assert_eq!(tracks, vec![Track::new("v.mp4", MediaKind::Video)]);
    }

    #[test]
    fn test_extension_fallback_without_mime() {
        let assets = [
            ResultAsset::new("https://cdn.example/song.MP3?token=abc", None),
            ResultAsset::new("https://cdn.example/cover.webp#frag", None),
            ResultAsset::new("https://cdn.example/notes.txt", None),
            ResultAsset::new("https://cdn.example/clip.webm", Some("application/octet-stream")),
        ];
        let tracks = extract_tracks(&assets);
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].kind, MediaKind::Audio);
        assert_eq!(tracks[0].cover.as_deref(), Some("https://cdn.example/cover.webp#frag"));
        assert_eq!(tracks[1].kind, MediaKind::Video);
    }

    #[test]
    fn test_mime_wins_over_extension() {
        let assets = [ResultAsset::new("thumb.mp3", Some("image/png"))];
        assert!(extract_tracks(&assets).is_empty());
    }

    #[test]
    fn test_empty_and_order_preserving() {
        assert!(extract_tracks(&[]).is_empty());

        let assets = [
            audio("1.mp3"),
            ResultAsset::new("x.json", Some("application/json")),
            ResultAsset::new("2.mp4", Some("video/mp4")),
            image("y.png"),
            audio("3.wav"),
        ];
        let tracks = extract_tracks(&assets);
        assert!(tracks.len() <= assets.len());
        let urls: Vec<&str> = tracks.iter().map(|t| t.url.as_str()).collect();
        assert_eq!(urls, vec!["1.mp3", "2.mp4", "3.wav"]);
        assert!(tracks.iter().all(|t| t.kind.is_playable()));
    }

    #[test]
    fn test_url_extension_edge_cases() {
        assert_eq!(url_extension("https://cdn.example/dir.v2/file"), None);
        assert_eq!(url_extension("https://cdn.example/.hidden"), None);
        assert_eq!(url_extension("song.Mp3"), Some("mp3".to_string()));
        assert_eq!(Track::new("https://x/y", MediaKind::Audio).extension(), "mp3");
        assert_eq!(Track::new("https://x/y.flac", MediaKind::Audio).extension(), "flac");
    }
}
