use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use super::{GenerationId, GenerationItem};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("generation '{0}' not found")]
    NotFound(GenerationId),
    #[error("failed to access generation feed {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse generation feed {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// The generation store as the playback UI sees it.
///
/// This is the single source of truth for per-item flags such as
/// `is_favorite`; views read through `get` instead of caching copies.
pub trait GenerationStore {
    /// Live, ordered list of records
    fn items(&self) -> &[GenerationItem];

    fn get(&self, id: &GenerationId) -> Option<&GenerationItem> {
        self.items().iter().find(|item| &item.id == id)
    }

    fn is_favorite(&self, id: &GenerationId) -> bool {
        self.get(id).map(|item| item.is_favorite).unwrap_or(false)
    }

    /// Returns false when the id was not present
    fn remove(&mut self, id: &GenerationId) -> Result<bool, StoreError>;

    /// Returns the new favorite state
    fn toggle_favorite(&mut self, id: &GenerationId) -> Result<bool, StoreError>;
}

/// Generation records backed by a JSON feed file.
/// A missing file is an empty store; every mutation is written back.
#[derive(Debug)]
pub struct JsonStore {
    items: Vec<GenerationItem>,
    path: Option<PathBuf>,
}

impl JsonStore {
    /// In-memory store, never persisted
    pub fn in_memory(items: Vec<GenerationItem>) -> Self {
        Self { items, path: None }
    }

    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            warn!("Generation feed {} not found, starting empty", path.display());
            return Ok(Self {
                items: Vec::new(),
                path: Some(path.to_path_buf()),
            });
        }

        let content = fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let items: Vec<GenerationItem> =
            serde_json::from_str(&content).map_err(|source| StoreError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        info!("Loaded {} generations from {}", items.len(), path.display());
        Ok(Self {
            items,
            path: Some(path.to_path_buf()),
        })
    }

    fn save(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let json = serde_json::to_string_pretty(&self.items).map_err(|source| StoreError::Parse {
            path: path.clone(),
            source,
        })?;
        fs::write(path, json).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })
    }
}

impl GenerationStore for JsonStore {
    fn items(&self) -> &[GenerationItem] {
        &self.items
    }

    fn remove(&mut self, id: &GenerationId) -> Result<bool, StoreError> {
        let Some(pos) = self.items.iter().position(|item| &item.id == id) else {
            return Ok(false);
        };

        self.items.remove(pos);
        self.save()?;
        info!("Removed generation {}", id);
        Ok(true)
    }

    fn toggle_favorite(&mut self, id: &GenerationId) -> Result<bool, StoreError> {
        let item = self
            .items
            .iter_mut()
            .find(|item| &item.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        item.is_favorite = !item.is_favorite;
        let now_favorite = item.is_favorite;
        self.save()?;
        info!("Generation {} favorite = {}", id, now_favorite);
        Ok(now_favorite)
    }
}
