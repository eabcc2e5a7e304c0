// Item-level actions shared by the detail views and the multi-select bar.
// The collaborators (folder modal, confirmation, toasts, clipboard) are
// opaque; the host application decides how they look.

use tracing::{info, warn};

use super::{GenerationId, GenerationItem, GenerationKind, GenerationStore};
use crate::download::suggested_filename;
use crate::playback::{extract_tracks, Track};

/// "Add to folder" dialog, fed with the ids to file away
pub trait CollectionModal {
    fn open(&mut self, ids: Vec<GenerationId>);
}

/// Runs once the user confirms a destructive action
pub type ConfirmCallback = Box<dyn FnOnce(&mut dyn GenerationStore, &mut dyn Notifier)>;

pub trait DeleteConfirmation {
    fn request(&mut self, on_confirm: ConfirmCallback);
}

/// Fire-and-forget toast
pub trait Notifier {
    fn notify(&mut self, message: &str);
}

pub trait Clipboard {
    fn copy(&mut self, text: &str);
}

pub struct ItemActions;

impl ItemActions {
    pub fn copy_prompt(
        item: &GenerationItem,
        clipboard: &mut dyn Clipboard,
        notifier: &mut dyn Notifier,
    ) {
        clipboard.copy(&item.prompt);
        notifier.notify("Prompt copied");
    }

    /// Flips the flag in the store; the view re-reads it from there
    pub fn toggle_favorite(
        store: &mut dyn GenerationStore,
        id: &GenerationId,
        notifier: &mut dyn Notifier,
    ) -> Option<bool> {
        match store.toggle_favorite(id) {
            Ok(now_favorite) => Some(now_favorite),
            Err(e) => {
                warn!("Failed to toggle favorite for {}: {}", id, e);
                notifier.notify("Could not update favorite");
                None
            }
        }
    }

    pub fn add_to_folder(modal: &mut dyn CollectionModal, ids: Vec<GenerationId>) {
        if ids.is_empty() {
            return;
        }
        modal.open(ids);
    }

    /// Asks for confirmation, then removes every id through the store
    pub fn request_delete(confirmation: &mut dyn DeleteConfirmation, ids: Vec<GenerationId>) {
        if ids.is_empty() {
            return;
        }

        confirmation.request(Box::new(
            move |store: &mut dyn GenerationStore, notifier: &mut dyn Notifier| {
                let mut removed = 0;
                for id in &ids {
                    match store.remove(id) {
                        Ok(true) => removed += 1,
                        Ok(false) => {}
                        Err(e) => warn!("Failed to delete {}: {}", id, e),
                    }
                }

                if removed > 0 {
                    info!("Deleted {} generation(s)", removed);
                    notifier.notify("Deleted");
                }
            },
        ));
    }
}

/// Preview image for the selection bar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub id: GenerationId,
    /// None renders a placeholder (audio items, items without assets)
    pub url: Option<String>,
}

const MAX_THUMBNAILS: usize = 3;

/// Multi-select state behind the library's action bar, in selection order
#[derive(Debug, Clone, Default)]
pub struct Selection {
    ids: Vec<GenerationId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the id is selected afterwards
    pub fn toggle(&mut self, id: &GenerationId) -> bool {
        if let Some(pos) = self.ids.iter().position(|selected| selected == id) {
            self.ids.remove(pos);
            false
        } else {
            self.ids.push(id.clone());
            true
        }
    }

    pub fn contains(&self, id: &GenerationId) -> bool {
        self.ids.contains(id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[GenerationId] {
        &self.ids
    }

    /// Drop ids the store no longer knows about
    pub fn retain_existing(&mut self, store: &dyn GenerationStore) {
        self.ids.retain(|id| store.get(id).is_some());
    }

    pub fn thumbnails(&self, store: &dyn GenerationStore) -> Vec<Thumbnail> {
        self.ids
            .iter()
            .filter_map(|id| store.get(id))
            .take(MAX_THUMBNAILS)
            .map(|item| Thumbnail {
                id: item.id.clone(),
                url: match item.kind {
                    GenerationKind::Audio => None,
                    _ => item.result_assets.first().map(|asset| asset.url.clone()),
                },
            })
            .collect()
    }

    /// Every playable track of every selected item, with its save name
    pub fn download_requests(&self, store: &dyn GenerationStore) -> Vec<(Track, String)> {
        self.ids
            .iter()
            .filter_map(|id| store.get(id))
            .flat_map(|item| {
                extract_tracks(&item.result_assets)
                    .into_iter()
                    .enumerate()
                    .map(|(index, track)| {
                        let name = suggested_filename(&item.id, index, &track);
                        (track, name)
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    pub fn add_to_folder(&self, modal: &mut dyn CollectionModal) {
        ItemActions::add_to_folder(modal, self.ids.clone());
    }

    pub fn request_delete(&self, confirmation: &mut dyn DeleteConfirmation) {
        ItemActions::request_delete(confirmation, self.ids.clone());
    }
}
