// Playback session - what a detail dialog or the footer player owns.
// Ties the extracted tracks, the track cursor and the controller together
// so switching items always goes through the same cascade.

use tracing::{debug, info};

use super::cursor::{CollectionCursor, TrackCursor};
use super::player::{MediaResource, PlaybackController, ResourceEvent, ResourceStatus};
use super::track::{extract_tracks, Track};
use super::{format_time, SpeedPreset};
use crate::generation::{GenerationId, GenerationItem};

/// What happens when the current track plays to the end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvancePolicy {
    /// Detail dialogs: next track of the same item, stop at its last track
    WithinItem,
    /// Footer player: next track, then on into the next item of the collection
    AcrossCollection,
}

/// Which track to start on when entering an item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackAnchor {
    First,
    Last,
}

/// The collection the footer walks through, borrowed for one call
pub struct Queue<'a> {
    pub cursor: &'a mut CollectionCursor,
    pub items: &'a [GenerationItem],
}

impl<'a> Queue<'a> {
    pub fn new(cursor: &'a mut CollectionCursor, items: &'a [GenerationItem]) -> Self {
        Self { cursor, items }
    }

    fn item(&self, id: &GenerationId) -> Option<&'a GenerationItem> {
        let items: &'a [GenerationItem] = self.items;
        items.iter().find(|item| &item.id == id)
    }

    /// Nearest neighbour in the given direction that has something to play
    fn neighbour_with_tracks(&self, forward: bool) -> Option<&'a GenerationItem> {
        let mut probe = self.cursor.clone();
        loop {
            let mut target = None;
            if forward {
                probe.next(|id| target = Some(id.clone()));
            } else {
                probe.previous(|id| target = Some(id.clone()));
            }

            let id = target?;
            if let Some(item) = self.item(&id) {
                if !extract_tracks(&item.result_assets).is_empty() {
                    return Some(item);
                }
                debug!("Skipping {} - nothing playable", id);
            }
            probe.set_active(Some(id));
        }
    }
}

/// Snapshot of everything the player UI renders
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub track_index: usize,
    pub is_playing: bool,
    pub elapsed_seconds: f64,
    pub duration_seconds: f64,
    pub volume: f32,
    pub speed_preset: SpeedPreset,
    pub status: ResourceStatus,
}

/// Footer "now playing" block
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlaying {
    pub title: Option<String>,
    pub cover: Option<String>,
    pub elapsed_seconds: f64,
    pub duration_seconds: f64,
}

impl NowPlaying {
    pub fn headline(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| "Nothing playing".to_string())
    }

    pub fn detail(&self) -> String {
        match self.title {
            Some(_) => format!(
                "{} / {}",
                format_time(self.elapsed_seconds),
                format_time(self.duration_seconds)
            ),
            None => "Select a track".to_string(),
        }
    }
}

pub struct PlaybackSession<R: MediaResource> {
    controller: PlaybackController<R>,
    policy: AdvancePolicy,
    active: Option<GenerationId>,
    tracks: Vec<Track>,
    cursor: TrackCursor,
}

impl<R: MediaResource> PlaybackSession<R> {
    pub fn new(controller: PlaybackController<R>, policy: AdvancePolicy) -> Self {
        Self {
            controller,
            policy,
            active: None,
            tracks: Vec::new(),
            cursor: TrackCursor::default(),
        }
    }

    pub fn controller(&self) -> &PlaybackController<R> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut PlaybackController<R> {
        &mut self.controller
    }

    pub fn policy(&self) -> AdvancePolicy {
        self.policy
    }

    pub fn active_id(&self) -> Option<&GenerationId> {
        self.active.as_ref()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track_cursor(&self) -> &TrackCursor {
        &self.cursor
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.tracks.get(self.cursor.index())
    }

    pub fn select_item(&mut self, item: &GenerationItem) -> bool {
        self.select_item_at(item, TrackAnchor::First)
    }

    /// Make `item` the active one. A different id runs the full cascade:
    /// re-extract tracks, reset the cursor, load the anchored track paused.
    /// The same id keeps tracks and position as they are.
    pub fn select_item_at(&mut self, item: &GenerationItem, anchor: TrackAnchor) -> bool {
        if self.active.as_ref() == Some(&item.id) {
            return false;
        }

        self.active = Some(item.id.clone());
        self.tracks = extract_tracks(&item.result_assets);
        self.cursor.reset(self.tracks.len());
        if anchor == TrackAnchor::Last {
            self.cursor.select_last();
        }
        info!("Selected {} ({} tracks)", item.id, self.tracks.len());

        match self.current_track().map(|track| track.url.clone()) {
            Some(url) => self.controller.load(&url),
            None => self.controller.unload(),
        }
        true
    }

    /// Forget the active item, e.g. after it was deleted
    pub fn clear(&mut self) {
        self.active = None;
        self.tracks.clear();
        self.cursor.reset(0);
        self.controller.unload();
    }

    /// Rebind only when the resolved url actually changed
    fn sync_resource(&mut self) {
        let Some(url) = self.current_track().map(|track| track.url.clone()) else {
            return;
        };
        if self.controller.loaded_url() != Some(url.as_str()) {
            self.controller.load(&url);
        }
    }

    /// Any explicit selection pauses; the caller resumes if it wants to
    pub fn select_track(&mut self, index: usize) -> bool {
        if index >= self.cursor.len() {
            return false;
        }
        self.cursor.select(index);
        self.controller.pause();
        self.sync_resource();
        true
    }

    pub fn next_track(&mut self) -> bool {
        if !self.cursor.next() {
            return false;
        }
        self.controller.pause();
        self.sync_resource();
        true
    }

    pub fn previous_track(&mut self) -> bool {
        if !self.cursor.previous() {
            return false;
        }
        self.controller.pause();
        self.sync_resource();
        true
    }

    pub fn has_next_track(&self) -> bool {
        self.cursor.has_next()
    }

    pub fn has_previous_track(&self) -> bool {
        self.cursor.has_previous()
    }

    /// Footer "next": next track of this item, else first track of the next
    /// item that has any
    pub fn skip_forward(&mut self, queue: &mut Queue<'_>) -> bool {
        if self.next_track() {
            return true;
        }
        self.step_item(queue, true)
    }

    /// Footer "previous": previous track, else last track of the previous item
    pub fn skip_back(&mut self, queue: &mut Queue<'_>) -> bool {
        if self.previous_track() {
            return true;
        }
        self.step_item(queue, false)
    }

    fn step_item(&mut self, queue: &mut Queue<'_>, forward: bool) -> bool {
        queue.cursor.set_active(self.active.clone());
        let Some(item) = queue.neighbour_with_tracks(forward) else {
            return false;
        };

        let anchor = if forward { TrackAnchor::First } else { TrackAnchor::Last };
        self.select_item_at(item, anchor);
        queue.cursor.set_active(Some(item.id.clone()));
        true
    }

    /// Feed one resource event through the controller, auto-advancing on end
    pub fn handle_resource_event(&mut self, event: ResourceEvent, queue: Option<&mut Queue<'_>>) {
        let mut ended = false;
        self.controller.handle_event(event, || ended = true);
        if !ended {
            return;
        }

        // the next track is loaded paused; resuming is the caller's call
        let advanced = match (self.policy, queue) {
            (AdvancePolicy::AcrossCollection, Some(queue)) => self.skip_forward(queue),
            _ => self.next_track(),
        };
        if advanced {
            debug!("Advanced to track {} after end", self.cursor.index());
        }
    }

    /// Drain the resource and apply everything it reported
    pub fn pump(&mut self, mut queue: Option<Queue<'_>>) {
        for event in self.controller.drain_resource_events() {
            self.handle_resource_event(event, queue.as_mut());
        }
    }

    pub fn state(&self) -> PlaybackState {
        PlaybackState {
            track_index: self.cursor.index(),
            is_playing: self.controller.is_playing(),
            elapsed_seconds: self.controller.elapsed(),
            duration_seconds: self.controller.duration(),
            volume: self.controller.volume(),
            speed_preset: self.controller.speed_preset(),
            status: self.controller.status().clone(),
        }
    }

    /// `item` is the active generation as the store currently has it
    pub fn now_playing(&self, item: Option<&GenerationItem>) -> NowPlaying {
        let track = self.current_track();
        let title = match (track, item) {
            (Some(_), Some(item)) if Some(&item.id) == self.active.as_ref() => {
                let title = item.display_title();
                if self.tracks.len() > 1 {
                    Some(format!("{} ({}/{})", title, self.cursor.index() + 1, self.tracks.len()))
                } else {
                    Some(title)
                }
            }
            _ => None,
        };

        NowPlaying {
            cover: title.as_ref().and(track).and_then(|track| track.cover.clone()),
            title,
            elapsed_seconds: self.controller.elapsed(),
            duration_seconds: self.controller.duration(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{GenerationKind, ResultAsset};
    use crate::playback::player::ResourceEventKind;
    use crate::playback::testing::RecordingResource;
    use crate::playback::PlaybackConfig;

    fn session(policy: AdvancePolicy) -> PlaybackSession<RecordingResource> {
        let controller =
            PlaybackController::new(RecordingResource::default(), &PlaybackConfig::default());
        PlaybackSession::new(controller, policy)
    }

    fn song(id: &str, urls: &[&str]) -> GenerationItem {
        let mut assets = Vec::new();
        for url in urls {
            assets.push(ResultAsset::new(*url, Some("audio/mpeg")));
            assets.push(ResultAsset::new(format!("{url}.jpg"), Some("image/jpeg")));
        }
        GenerationItem::new(id, GenerationKind::Audio, assets).with_prompt(format!("song {id}"))
    }

    fn metadata(session: &mut PlaybackSession<RecordingResource>, duration: f64) {
        let binding = session.controller().binding().unwrap();
        session.handle_resource_event(
            ResourceEvent::new(binding, ResourceEventKind::MetadataReady { duration }),
            None,
        );
    }

    fn end(session: &mut PlaybackSession<RecordingResource>, queue: Option<&mut Queue<'_>>) {
        let binding = session.controller().binding().unwrap();
        session.handle_resource_event(ResourceEvent::new(binding, ResourceEventKind::Ended), queue);
    }

    #[test]
    fn test_single_asset_pair_scenario() {
        let item = GenerationItem::new(
            "g",
            GenerationKind::Audio,
            vec![
                ResultAsset::new("a.mp3", Some("audio/mpeg")),
                ResultAsset::new("c.jpg", Some("image/jpeg")),
            ],
        );
        let mut s = session(AdvancePolicy::WithinItem);
        s.select_item(&item);

        assert_eq!(s.tracks().len(), 1);
        assert_eq!(s.tracks()[0].url, "a.mp3");
        assert_eq!(s.tracks()[0].cover.as_deref(), Some("c.jpg"));
        assert_eq!(s.controller().loaded_url(), Some("a.mp3"));
    }

    #[test]
    fn test_empty_item_is_nothing_playing() {
        let item = GenerationItem::new("empty", GenerationKind::Audio, Vec::new());
        let mut s = session(AdvancePolicy::WithinItem);
        s.select_item(&item);

        s.controller_mut().toggle();
        assert!(!s.state().is_playing);
        assert!(!s.next_track());
        assert!(!s.select_track(0));

        let now = s.now_playing(Some(&item));
        assert_eq!(now.headline(), "Nothing playing");
        assert_eq!(now.detail(), "Select a track");
    }

    #[test]
    fn test_switching_items_resets_everything() {
        let a = song("a", &["a1.mp3", "a2.mp3"]);
        let b = song("b", &["b1.mp3"]);
        let mut s = session(AdvancePolicy::WithinItem);

        s.select_item(&a);
        s.select_track(1);
        metadata(&mut s, 90.0);
        s.controller_mut().play();
        s.controller_mut().seek(45.0);
        s.controller_mut().set_volume(0.3);

        assert!(s.select_item(&b));
        let state = s.state();
        assert_eq!(state.track_index, 0);
        assert!(!state.is_playing);
        assert_eq!(state.elapsed_seconds, 0.0);
        assert_eq!(state.duration_seconds, 0.0);
        assert_eq!(state.volume, 0.3);
        assert_eq!(s.controller().loaded_url(), Some("b1.mp3"));
    }

    #[test]
    fn test_reselecting_same_item_keeps_position() {
        let a = song("a", &["a1.mp3", "a2.mp3"]);
        let mut s = session(AdvancePolicy::WithinItem);
        s.select_item(&a);
        s.next_track();

        assert!(!s.select_item(&a));
        assert_eq!(s.track_cursor().index(), 1);
        assert_eq!(s.controller().resource().bound_urls(), vec!["a1.mp3", "a2.mp3"]);
    }

    #[test]
    fn test_track_selection_pauses_without_clearing_time_for_same_url() {
        let item = GenerationItem::new(
            "dup",
            GenerationKind::Audio,
            vec![
                ResultAsset::new("same.mp3", Some("audio/mpeg")),
                ResultAsset::new("same.mp3", Some("audio/mpeg")),
            ],
        );
        let mut s = session(AdvancePolicy::WithinItem);
        s.select_item(&item);
        metadata(&mut s, 60.0);
        s.controller_mut().play();
        s.controller_mut().seek(20.0);

        assert!(s.select_track(1));
        assert!(!s.state().is_playing);
        assert_eq!(s.state().elapsed_seconds, 20.0);
        assert_eq!(s.state().duration_seconds, 60.0);
        assert_eq!(s.controller().resource().bound_urls().len(), 1);
    }

    #[test]
    fn test_track_navigation_bounds() {
        let a = song("a", &["a1.mp3", "a2.mp3"]);
        let mut s = session(AdvancePolicy::WithinItem);
        s.select_item(&a);

        assert!(!s.previous_track());
        assert!(s.next_track());
        assert!(!s.next_track());
        assert_eq!(s.track_cursor().index(), 1);
        assert_eq!(s.controller().loaded_url(), Some("a2.mp3"));
    }

    #[test]
    fn test_auto_advance_within_item() {
        let a = song("a", &["a1.mp3", "a2.mp3"]);
        let mut s = session(AdvancePolicy::WithinItem);
        s.select_item(&a);
        s.controller_mut().play();

        end(&mut s, None);
        assert_eq!(s.track_cursor().index(), 1);
        assert!(!s.state().is_playing);
        assert_eq!(s.controller().loaded_url(), Some("a2.mp3"));

        s.controller_mut().play();
        end(&mut s, None);
        assert_eq!(s.track_cursor().index(), 1);
        assert!(!s.state().is_playing);
    }

    #[test]
    fn test_collection_next_cascades() {
        let items = vec![song("a", &["a1.mp3", "a2.mp3"]), song("b", &["b1.mp3"])];
        let mut cursor = CollectionCursor::new(
            items.iter().map(|item| item.id.clone()).collect(),
            Some("a".into()),
        );
        let mut s = session(AdvancePolicy::WithinItem);
        s.select_item(&items[0]);
        s.next_track();
        s.controller_mut().play();

        let mut chosen = None;
        assert!(cursor.next(|id| chosen = Some(id.clone())));
        let next = items.iter().find(|item| Some(&item.id) == chosen.as_ref()).unwrap();
        s.select_item(next);
        cursor.set_active(chosen);

        assert_eq!(s.active_id(), Some(&"b".into()));
        assert_eq!(s.state().track_index, 0);
        assert!(!s.state().is_playing);
        assert!(!cursor.can_go_next());
        assert!(cursor.can_go_previous());
    }

    #[test]
    fn test_footer_skips_across_items() {
        let items = vec![
            song("a", &["a1.mp3", "a2.mp3"]),
            GenerationItem::new("pending", GenerationKind::Audio, Vec::new()),
            song("b", &["b1.mp3", "b2.mp3"]),
        ];
        let mut cursor = CollectionCursor::new(items.iter().map(|i| i.id.clone()).collect(), None);
        let mut s = session(AdvancePolicy::AcrossCollection);
        s.select_item(&items[0]);

        let mut queue = Queue::new(&mut cursor, &items);
        assert!(s.skip_forward(&mut queue));
        assert_eq!(s.controller().loaded_url(), Some("a2.mp3"));
        assert!(s.skip_forward(&mut queue));
        assert_eq!(s.active_id(), Some(&"b".into()));
        assert_eq!(s.controller().loaded_url(), Some("b1.mp3"));

        assert!(s.skip_back(&mut queue));
        assert_eq!(s.active_id(), Some(&"a".into()));
        assert_eq!(s.controller().loaded_url(), Some("a2.mp3"));
        assert_eq!(queue.cursor.active(), Some(&"a".into()));
    }

    #[test]
    fn test_footer_auto_advance_continues_into_next_item() {
        let items = vec![song("a", &["a1.mp3"]), song("b", &["b1.mp3"])];
        let mut cursor = CollectionCursor::new(items.iter().map(|i| i.id.clone()).collect(), None);
        let mut s = session(AdvancePolicy::AcrossCollection);
        s.select_item(&items[0]);
        s.controller_mut().play();

        let mut queue = Queue::new(&mut cursor, &items);
        end(&mut s, Some(&mut queue));
        assert_eq!(s.active_id(), Some(&"b".into()));
        assert!(!s.state().is_playing);
        assert_eq!(s.controller().loaded_url(), Some("b1.mp3"));

        s.controller_mut().play();
        end(&mut s, Some(&mut queue));
        assert_eq!(s.active_id(), Some(&"b".into()));
        assert!(!s.state().is_playing);
    }

    #[test]
    fn test_events_from_previous_item_are_ignored() {
        let a = song("a", &["a1.mp3"]);
        let b = song("b", &["b1.mp3"]);
        let mut s = session(AdvancePolicy::WithinItem);
        s.select_item(&a);
        let stale = s.controller().binding().unwrap();
        s.select_item(&b);

        s.controller_mut().resource_mut().queued = vec![
            ResourceEvent::new(stale, ResourceEventKind::MetadataReady { duration: 300.0 }),
            ResourceEvent::new(stale, ResourceEventKind::TimeAdvanced(120.0)),
        ];
        s.pump(None);

        assert_eq!(s.state().duration_seconds, 0.0);
        assert_eq!(s.state().elapsed_seconds, 0.0);
    }

    #[test]
    fn test_now_playing_reports_title_and_cover() {
        let a = song("a", &["a1.mp3", "a2.mp3"]);
        let mut s = session(AdvancePolicy::AcrossCollection);
        s.select_item(&a);
        metadata(&mut s, 65.0);

        let now = s.now_playing(Some(&a));
        assert_eq!(now.headline(), "song a (1/2)");
        assert_eq!(now.cover.as_deref(), Some("a1.mp3.jpg"));
        assert_eq!(now.detail(), "0:00 / 1:05");

        s.clear();
        assert_eq!(s.now_playing(Some(&a)).headline(), "Nothing playing");
        assert_eq!(s.state().status, ResourceStatus::Unloaded);
    }
}
