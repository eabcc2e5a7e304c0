// Generation records - what the media backend hands us
// Read-only to the playback core; only the store mutates them

pub mod actions; // copy/favorite/folder/delete + multi-select
pub mod store;   // JSON-backed generation store

pub use actions::{
    Clipboard, CollectionModal, ConfirmCallback, DeleteConfirmation, ItemActions, Notifier,
    Selection, Thumbnail,
};
pub use store::{GenerationStore, JsonStore, StoreError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque generation identifier, compared by value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationId(pub String);

impl GenerationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GenerationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for GenerationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Queued,
    Processing,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationKind {
    Image,
    Video,
    Audio,
}

/// One entry of a generation's result list. Position in the list matters
/// (see cover pairing in `playback::track`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultAsset {
    pub url: String,
    #[serde(default)]
    pub mime: Option<String>,
}

impl ResultAsset {
    pub fn new(url: impl Into<String>, mime: Option<&str>) -> Self {
        Self {
            url: url.into(),
            mime: mime.map(str::to_string),
        }
    }
}

/// Free-form request parameters; only the bits the UI displays are kept
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationItem {
    pub id: GenerationId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub model: String,
    #[serde(rename = "type")]
    pub kind: GenerationKind,
    #[serde(default)]
    pub result_assets: Vec<ResultAsset>,
    #[serde(default)]
    pub is_favorite: bool,
    pub status: GenerationStatus,
    #[serde(default)]
    pub input: Option<GenerationInput>,
}

const TITLE_PROMPT_CHARS: usize = 30;
const DESCRIPTION_PROMPT_CHARS: usize = 100;

impl GenerationItem {
    pub fn new(
        id: impl Into<GenerationId>,
        kind: GenerationKind,
        assets: Vec<ResultAsset>,
    ) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            prompt: String::new(),
            model: String::new(),
            kind,
            result_assets: assets,
            is_favorite: false,
            status: GenerationStatus::Succeeded,
            input: None,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Still being generated - nothing to play yet
    pub fn is_pending(&self) -> bool {
        matches!(self.status, GenerationStatus::Queued | GenerationStatus::Processing)
    }

    pub fn is_failed(&self) -> bool {
        self.status == GenerationStatus::Failed
    }

    /// Input title, else the start of the prompt, else "Untitled"
    pub fn display_title(&self) -> String {
        self.input
            .as_ref()
            .and_then(|input| input.title.clone())
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| {
                let head: String = self.prompt.chars().take(TITLE_PROMPT_CHARS).collect();
                if head.trim().is_empty() {
                    "Untitled".to_string()
                } else {
                    head
                }
            })
    }

    pub fn style_label(&self) -> String {
        self.input
            .as_ref()
            .and_then(|input| input.style.clone().or_else(|| input.tags.clone()))
            .unwrap_or_default()
    }

    /// Short prompt preview for the detail panel
    pub fn description(&self) -> String {
        if self.prompt.is_empty() {
            return "No description".to_string();
        }
        let mut head: String = self.prompt.chars().take(DESCRIPTION_PROMPT_CHARS).collect();
        if self.prompt.chars().count() > DESCRIPTION_PROMPT_CHARS {
            head.push_str("...");
        }
        head
    }

    /// Card label for items that can't be played
    pub fn status_label(&self) -> Option<&'static str> {
        if self.is_pending() {
            Some("Generating...")
        } else if self.is_failed() {
            Some("Failed")
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_title_fallbacks() {
        let mut item = GenerationItem::new("g1", GenerationKind::Audio, Vec::new());
        assert_eq!(item.display_title(), "Untitled");

        item.prompt = "a slow lo-fi song about rainy tuesdays in the city".to_string();
        assert_eq!(item.display_title(), "a slow lo-fi song about rainy ");

        item.input = Some(GenerationInput {
            title: Some("Rainy Tuesday".to_string()),
            ..Default::default()
        });
        assert_eq!(item.display_title(), "Rainy Tuesday");
    }

    #[test]
    fn test_description_truncates_long_prompts() {
        let item = GenerationItem::new("g1", GenerationKind::Video, Vec::new())
            .with_prompt("x".repeat(120));
        let description = item.description();
        assert!(description.ends_with("..."));
        assert_eq!(description.chars().count(), 103);
    }

    #[test]
    fn test_deserialize_feed_record() {
        let json = r#"{
            "id": "abc",
            "created_at": "2026-01-14T10:00:00Z",
            "prompt": "song about friends",
            "model": "suno-v4",
            "type": "audio",
            "result_assets": [
                {"url": "https://cdn.example/a.mp3", "mime": "audio/mpeg"},
                {"url": "https://cdn.example/c.jpg"}
            ],
            "status": "processing"
        }"#;

        let item: GenerationItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.id, GenerationId::from("abc"));
        assert_eq!(item.kind, GenerationKind::Audio);
        assert_eq!(item.result_assets.len(), 2);
        assert_eq!(item.result_assets[1].mime, None);
        assert!(!item.is_favorite);
        assert!(item.is_pending());
        assert_eq!(item.status_label(), Some("Generating..."));
    }
}
