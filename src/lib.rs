// genplay - playback and navigation core for browsing generated media
// The terminal host in `ui` is one consumer; everything else is UI-agnostic.

pub mod config; // settings and preferences
pub mod download; // save tracks locally, or hand the link to the OS
pub mod generation; // generation records, store, item actions
pub mod playback; // tracks, cursors, controller, session
pub mod ui; // input plumbing + terminal host

// Export the stuff other modules actually use
pub use config::Config;
pub use download::{DownloadBridge, DownloadOutcome};
pub use generation::{GenerationId, GenerationItem, GenerationStore, JsonStore};
pub use playback::{extract_tracks, PlaybackController, PlaybackSession, Track};
