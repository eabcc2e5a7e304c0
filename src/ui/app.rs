use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::drag::{ControlGeometry, DragSession, VolumeDrag};
use super::events::{
    Action, BinderMode, InputEvent, KeyboardNavigationBinder, ListenerRegistry, PointerEvent,
    PointerKind,
};
use super::TerminalManager;
use crate::config::Config;
use crate::download::{
    suggested_filename, DownloadBridge, DownloadError, DownloadOutcome, Fetcher, HttpFetcher,
    SystemOpener,
};
use crate::generation::{
    Clipboard, CollectionModal, ConfirmCallback, DeleteConfirmation, GenerationId, GenerationItem,
    GenerationKind, GenerationStore, ItemActions, JsonStore, Notifier, Selection,
};
use crate::playback::resource::RodioResource;
use crate::playback::{
    format_time, AdvancePolicy, CollectionCursor, PlaybackConfig, PlaybackController,
    PlaybackSession, PlayerEvent, Queue, ResourceStatus, Track,
};

const VOLUME_STEP: f32 = 0.05;
const PAGE: usize = 10;

const DETAIL_HINTS: &str = concat!(
    "←/→ item  [ ] track  space play  ,/. seek  s speed  ",
    "d/D download  f fav  y copy  a folder  x delete  esc close",
);
const LIBRARY_HINTS: &str = concat!(
    "enter open  p play  n/b skip  v select  D download  ",
    "a folder  x delete  f fav  s speed  q quit",
);

/// Status-line toasts
struct Toasts {
    current: Option<(String, Instant)>,
    ttl: Duration,
    enabled: bool,
}

impl Toasts {
    fn visible(&self) -> Option<&str> {
        self.current
            .as_ref()
            .filter(|(_, shown)| shown.elapsed() < self.ttl)
            .map(|(message, _)| message.as_str())
    }
}

impl Notifier for Toasts {
    fn notify(&mut self, message: &str) {
        info!("{}", message);
        if self.enabled {
            self.current = Some((message.to_string(), Instant::now()));
        }
    }
}

/// Last copied text, shown in the detail panel so it can be selected from the terminal
#[derive(Default)]
struct Register {
    contents: Option<String>,
}

impl Clipboard for Register {
    fn copy(&mut self, text: &str) {
        self.contents = Some(text.to_string());
    }
}

/// Lists what would be filed; there is no folder backend in the terminal
#[derive(Default)]
struct FolderModal {
    ids: Option<Vec<GenerationId>>,
}

impl CollectionModal for FolderModal {
    fn open(&mut self, ids: Vec<GenerationId>) {
        info!("Add to folder requested for {} item(s)", ids.len());
        self.ids = Some(ids);
    }
}

#[derive(Default)]
struct PendingDelete {
    on_confirm: Option<ConfirmCallback>,
}

impl DeleteConfirmation for PendingDelete {
    fn request(&mut self, on_confirm: ConfirmCallback) {
        self.on_confirm = Some(on_confirm);
    }
}

struct DetailView {
    session: PlaybackSession<RodioResource>,
    binder: KeyboardNavigationBinder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Player {
    Footer,
    Detail,
}

struct DownloadReport {
    results: Vec<Result<DownloadOutcome, DownloadError>>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Areas {
    header: Rect,
    library: Rect,
    detail: Option<DetailAreas>,
    footer_info: Rect,
    footer_volume: Rect,
    footer_status: Rect,
    footer_progress: Rect,
    status_line: Rect,
}

#[derive(Debug, Clone, Copy, Default)]
struct DetailAreas {
    info: Rect,
    progress: Rect,
    volume: Rect,
}

impl Areas {
    fn compute(size: Rect, detail_open: bool) -> Self {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(0),    // Library (+ detail)
                Constraint::Length(3), // Footer player
                Constraint::Length(3), // Footer progress
                Constraint::Length(1), // Status line
            ])
            .split(size);

        let (library, detail) = if detail_open {
            let columns = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
                .split(rows[1]);
            let panel = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(0), Constraint::Length(3), Constraint::Length(3)])
                .split(columns[1]);
            let detail = DetailAreas {
                info: panel[0],
                progress: panel[1],
                volume: panel[2],
            };
            (columns[0], Some(detail))
        } else {
            (rows[1], None)
        };

        let footer = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(60), // Now playing
                Constraint::Percentage(20), // Volume
                Constraint::Percentage(20), // Status
            ])
            .split(rows[2]);

        Self {
            header: rows[0],
            library,
            detail,
            footer_info: footer[0],
            footer_volume: footer[1],
            footer_status: footer[2],
            footer_progress: rows[3],
            status_line: rows[4],
        }
    }
}

/// The bar inside a bordered gauge, one cell per step
fn bar_geometry(area: Rect) -> ControlGeometry {
    let left = area.x.saturating_add(1) as f32;
    let cells = area.width.saturating_sub(2);
    ControlGeometry::new(left, cells.saturating_sub(1).max(1) as f32)
}

fn hit(area: Rect, pointer: &PointerEvent) -> bool {
    let (x, y) = (pointer.x as u16, pointer.y as u16);
    x >= area.x && x < area.x + area.width && y >= area.y && y < area.y + area.height
}

fn binder_mode(item: &GenerationItem) -> BinderMode {
    match item.kind {
        GenerationKind::Video => BinderMode::NavigationOnly,
        _ => BinderMode::Full,
    }
}

pub struct App {
    config: Config,
    terminal: TerminalManager,
    playback: PlaybackConfig,
    fetcher: Arc<dyn Fetcher>,
    store: JsonStore,
    list_state: ListState,

    footer: PlaybackSession<RodioResource>,
    footer_cursor: CollectionCursor,
    detail: Option<DetailView>,
    detail_cursor: CollectionCursor,

    registry: ListenerRegistry,
    volume_drag: Option<(DragSession, Player)>,

    downloads: Arc<DownloadBridge>,
    download_tx: mpsc::UnboundedSender<DownloadReport>,
    download_rx: mpsc::UnboundedReceiver<DownloadReport>,
    player_tx: mpsc::UnboundedSender<PlayerEvent>,
    player_rx: mpsc::UnboundedReceiver<PlayerEvent>,

    selection: Selection,
    toasts: Toasts,
    register: Register,
    folders: FolderModal,
    pending_delete: PendingDelete,

    areas: Areas,
    should_quit: bool,
}

impl App {
    pub async fn new(config: Config) -> Result<Self> {
        let store = JsonStore::load(&config.generations_file)?;

        let playback = PlaybackConfig::from(&config);
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new());
        let (player_tx, player_rx) = mpsc::unbounded_channel();
        let mut controller =
            PlaybackController::new(RodioResource::new(fetcher.clone())?, &playback);
        controller.set_event_sender(player_tx.clone());
        let footer = PlaybackSession::new(controller, AdvancePolicy::AcrossCollection);
        let downloads = Arc::new(DownloadBridge::new(
            fetcher.clone(),
            Arc::new(SystemOpener),
            config.download_dir.clone(),
        ));
        let (download_tx, download_rx) = mpsc::unbounded_channel();

        let order: Vec<GenerationId> = store.items().iter().map(|item| item.id.clone()).collect();
        let mut list_state = ListState::default();
        if !order.is_empty() {
            list_state.select(Some(0));
        }

        let toasts = Toasts {
            current: None,
            ttl: Duration::from_millis(config.ui.notification_duration_ms),
            enabled: config.ui.show_notifications,
        };

        // terminal last, so startup errors still print normally
        let terminal = TerminalManager::new()?;

        Ok(Self {
            config,
            terminal,
            playback,
            fetcher,
            store,
            list_state,
            footer,
            footer_cursor: CollectionCursor::new(order.clone(), None),
            detail: None,
            detail_cursor: CollectionCursor::new(order, None),
            registry: ListenerRegistry::new(),
            volume_drag: None,
            downloads,
            download_tx,
            download_rx,
            player_tx,
            player_rx,
            selection: Selection::new(),
            toasts,
            register: Register::default(),
            folders: FolderModal::default(),
            pending_delete: PendingDelete::default(),
            areas: Areas::default(),
            should_quit: false,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        let tick = Duration::from_millis(self.config.ui.tick_ms.max(10));

        while !self.should_quit {
            while event::poll(Duration::from_millis(0))? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key)?,
                    Event::Mouse(mouse) => {
                        if let Some(pointer) = PointerEvent::from_mouse(&mouse) {
                            self.handle_pointer(pointer);
                        }
                    }
                    _ => {}
                }
            }

            self.pump_playback();
            while let Ok(report) = self.download_rx.try_recv() {
                self.handle_download_report(report);
            }
            while let Ok(event) = self.player_rx.try_recv() {
                self.handle_player_event(event);
            }

            self.render()?;
            sleep(tick).await;
        }

        info!("Shutting down");
        Ok(())
    }

    fn pump_playback(&mut self) {
        let items = self.store.items();
        self.footer.pump(Some(Queue::new(&mut self.footer_cursor, items)));
        if let Some(detail) = &mut self.detail {
            detail.session.pump(None);
        }
    }

    fn handle_player_event(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::StatusChanged(ResourceStatus::Failed(reason)) => {
                self.toasts.notify(&format!("Playback failed: {}", reason));
            }
            PlayerEvent::SpeedChanged(preset) => {
                self.toasts.notify(&format!("Speed: {}", preset.label()));
            }
            other => debug!("Player: {:?}", other),
        }
    }

    fn highlighted(&self) -> Option<&GenerationItem> {
        self.list_state
            .selected()
            .and_then(|index| self.store.items().get(index))
    }

    fn highlight(&mut self, id: &GenerationId) {
        if let Some(index) = self.store.items().iter().position(|item| &item.id == id) {
            self.list_state.select(Some(index));
        }
    }

    fn move_highlight(&mut self, delta: isize) {
        let len = self.store.items().len();
        if len == 0 {
            return;
        }
        let current = self.list_state.selected().unwrap_or(0) as isize;
        let next = (current + delta).clamp(0, len as isize - 1);
        self.list_state.select(Some(next as usize));
    }

    fn session_mut(&mut self, player: Player) -> Option<&mut PlaybackSession<RodioResource>> {
        match player {
            Player::Footer => Some(&mut self.footer),
            Player::Detail => self.detail.as_mut().map(|detail| &mut detail.session),
        }
    }

    fn focused(&self) -> Player {
        if self.detail.is_some() {
            Player::Detail
        } else {
            Player::Footer
        }
    }

    // ---- input ----

    fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return Ok(());
        }

        if self.pending_delete.on_confirm.is_some() {
            match key.code {
                KeyCode::Char('y') | KeyCode::Enter => self.confirm_delete(),
                KeyCode::Char('n') | KeyCode::Esc => {
                    self.pending_delete.on_confirm = None;
                    debug!("Delete cancelled");
                }
                _ => {}
            }
            return Ok(());
        }

        if self.folders.ids.is_some() {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q')) {
                self.folders.ids = None;
            }
            return Ok(());
        }

        let dispatch = self.registry.dispatch(&InputEvent::Key(key));
        let handled = !dispatch.actions.is_empty();
        for action in dispatch.actions {
            self.apply(action);
        }
        if dispatch.default_prevented || handled {
            return Ok(());
        }

        if self.detail.is_some() {
            self.handle_detail_key(key)
        } else {
            self.handle_library_key(key);
            Ok(())
        }
    }

    fn handle_library_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Esc => {
                if self.selection.is_empty() {
                    self.should_quit = true;
                } else {
                    self.selection.clear();
                }
            }
            KeyCode::Up | KeyCode::Char('k') => self.move_highlight(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_highlight(1),
            KeyCode::Char(' ') | KeyCode::PageDown => self.move_highlight(PAGE as isize),
            KeyCode::PageUp => self.move_highlight(-(PAGE as isize)),
            KeyCode::Enter => {
                if let Some(id) = self.highlighted().map(|item| item.id.clone()) {
                    if let Err(e) = self.open_detail(&id) {
                        warn!("Could not open {}: {}", id, e);
                        self.toasts.notify("Could not open audio output");
                    }
                }
            }
            KeyCode::Char('v') => {
                if let Some(id) = self.highlighted().map(|item| item.id.clone()) {
                    self.selection.toggle(&id);
                }
            }
            KeyCode::Char('c') => self.selection.clear(),
            KeyCode::Char('D') => {
                let requests = self.selection.download_requests(&self.store);
                self.start_downloads(requests);
            }
            KeyCode::Char('a') => {
                if self.selection.is_empty() {
                    if let Some(id) = self.highlighted().map(|item| item.id.clone()) {
                        ItemActions::add_to_folder(&mut self.folders, vec![id]);
                    }
                } else {
                    self.selection.add_to_folder(&mut self.folders);
                }
            }
            KeyCode::Char('x') => {
                if self.selection.is_empty() {
                    if let Some(id) = self.highlighted().map(|item| item.id.clone()) {
                        ItemActions::request_delete(&mut self.pending_delete, vec![id]);
                    }
                } else {
                    self.selection.request_delete(&mut self.pending_delete);
                }
            }
            KeyCode::Char('f') => {
                if let Some(id) = self.highlighted().map(|item| item.id.clone()) {
                    ItemActions::toggle_favorite(&mut self.store, &id, &mut self.toasts);
                }
            }
            KeyCode::Char('p') => self.play_highlighted_in_footer(),
            KeyCode::Char('n') => {
                let items = self.store.items();
                self.footer.skip_forward(&mut Queue::new(&mut self.footer_cursor, items));
            }
            KeyCode::Char('b') => {
                let items = self.store.items();
                self.footer.skip_back(&mut Queue::new(&mut self.footer_cursor, items));
            }
            KeyCode::Char('s') => self.cycle_speed(Player::Footer),
            KeyCode::Char('+') | KeyCode::Char('=') => {
                self.nudge_volume(Player::Footer, VOLUME_STEP)
            }
            KeyCode::Char('-') => self.nudge_volume(Player::Footer, -VOLUME_STEP),
            KeyCode::Char(',') => self.seek_by(Player::Footer, -1.0),
            KeyCode::Char('.') => self.seek_by(Player::Footer, 1.0),
            _ => {}
        }
    }

    fn handle_detail_key(&mut self, key: KeyEvent) -> Result<()> {
        let Some(id) = self
            .detail
            .as_ref()
            .and_then(|detail| detail.session.active_id().cloned())
        else {
            return Ok(());
        };

        match key.code {
            KeyCode::Esc | KeyCode::Backspace => self.close_detail(),
            KeyCode::Char('q') => self.should_quit = true,
            // no binder claimed it, so this is the media element's own toggle
            KeyCode::Char(' ') => self.toggle(Player::Detail),
            KeyCode::Char('[') => {
                if let Some(detail) = &mut self.detail {
                    detail.session.previous_track();
                }
            }
            KeyCode::Char(']') => {
                if let Some(detail) = &mut self.detail {
                    detail.session.next_track();
                }
            }
            KeyCode::Char(c @ '1'..='9') => {
                let index = c as usize - '1' as usize;
                if let Some(detail) = &mut self.detail {
                    detail.session.select_track(index);
                }
            }
            KeyCode::Char(',') => self.seek_by(Player::Detail, -1.0),
            KeyCode::Char('.') => self.seek_by(Player::Detail, 1.0),
            KeyCode::Char('s') => self.cycle_speed(Player::Detail),
            KeyCode::Char('+') | KeyCode::Char('=') => {
                self.nudge_volume(Player::Detail, VOLUME_STEP)
            }
            KeyCode::Char('-') => self.nudge_volume(Player::Detail, -VOLUME_STEP),
            KeyCode::Char('d') => {
                let current = self.detail.as_ref().and_then(|detail| {
                    let index = detail.session.track_cursor().index();
                    detail
                        .session
                        .current_track()
                        .map(|track| (track.clone(), suggested_filename(&id, index, track)))
                });
                if let Some(request) = current {
                    self.start_downloads(vec![request]);
                }
            }
            KeyCode::Char('D') => {
                let requests: Vec<(Track, String)> = self
                    .detail
                    .as_ref()
                    .map(|detail| {
                        detail
                            .session
                            .tracks()
                            .iter()
                            .enumerate()
                            .map(|(index, track)| {
                                (track.clone(), suggested_filename(&id, index, track))
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                self.start_downloads(requests);
            }
            KeyCode::Char('f') => {
                ItemActions::toggle_favorite(&mut self.store, &id, &mut self.toasts);
            }
            KeyCode::Char('y') => {
                if let Some(item) = self.store.get(&id) {
                    ItemActions::copy_prompt(item, &mut self.register, &mut self.toasts);
                }
            }
            KeyCode::Char('a') => ItemActions::add_to_folder(&mut self.folders, vec![id]),
            KeyCode::Char('x') => ItemActions::request_delete(&mut self.pending_delete, vec![id]),
            _ => {}
        }
        Ok(())
    }

    fn handle_pointer(&mut self, pointer: PointerEvent) {
        if pointer.kind == PointerKind::Down {
            self.pointer_down(&pointer);
        }

        let dispatch = self.registry.dispatch(&InputEvent::Pointer(pointer));
        for action in dispatch.actions {
            self.apply(action);
        }
    }

    fn pointer_down(&mut self, pointer: &PointerEvent) {
        let detail = self.areas.detail;
        let targets = [
            (Some(self.areas.footer_volume), self.areas.footer_progress, Player::Footer),
            (
                detail.map(|areas| areas.volume),
                detail.map(|areas| areas.progress).unwrap_or_default(),
                Player::Detail,
            ),
        ];

        for (volume, progress, player) in targets {
            if let Some(volume) = volume.filter(|area| hit(*area, pointer)) {
                // a new press replaces any drag that missed its release
                self.volume_drag = None;
                let (drag, initial) =
                    VolumeDrag::begin(&self.registry, bar_geometry(volume), pointer.x);
                self.volume_drag = Some((drag, player));
                if let Some(session) = self.session_mut(player) {
                    session.controller_mut().set_volume(initial);
                }
                return;
            }
            if hit(progress, pointer) {
                let fraction = bar_geometry(progress).fraction_at(pointer.x) as f64;
                if let Some(session) = self.session_mut(player) {
                    session.controller_mut().seek_fraction(fraction);
                }
                return;
            }
        }
    }

    fn apply(&mut self, action: Action) {
        match action {
            Action::PreviousItem => self.step_detail(false),
            Action::NextItem => self.step_detail(true),
            Action::TogglePlayback => self.toggle(self.focused()),
            Action::SetVolume(volume) => {
                if let Some(player) = self.volume_drag.as_ref().map(|(_, player)| *player) {
                    if let Some(session) = self.session_mut(player) {
                        session.controller_mut().set_volume(volume);
                    }
                }
            }
            Action::EndVolumeDrag => self.volume_drag = None,
        }
    }

    // ---- playback ----

    fn toggle(&mut self, player: Player) {
        if let Some(session) = self.session_mut(player) {
            session.controller_mut().toggle();
        }
    }

    fn cycle_speed(&mut self, player: Player) {
        if let Some(session) = self.session_mut(player) {
            let next = session.controller().speed_preset().cycle();
            session.controller_mut().set_speed_preset(next);
        }
    }

    fn nudge_volume(&mut self, player: Player, delta: f32) {
        if let Some(session) = self.session_mut(player) {
            let volume = session.controller().volume() + delta;
            session.controller_mut().set_volume(volume);
        }
    }

    fn seek_by(&mut self, player: Player, direction: f64) {
        let step = self.playback.seek_step_seconds;
        if let Some(session) = self.session_mut(player) {
            let target = session.controller().elapsed() + direction * step;
            session.controller_mut().seek(target);
        }
    }

    fn play_highlighted_in_footer(&mut self) {
        let Some(item) = self.highlighted().cloned() else {
            return;
        };
        if self.footer.active_id() == Some(&item.id) {
            self.footer.controller_mut().toggle();
            return;
        }

        self.footer.select_item(&item);
        self.footer_cursor.set_active(Some(item.id.clone()));
        self.footer.controller_mut().play();
    }

    fn open_detail(&mut self, id: &GenerationId) -> Result<()> {
        let Some(item) = self.store.get(id).cloned() else {
            return Ok(());
        };

        // one binder per open view: the old one goes before the new attaches
        self.detail = None;
        self.footer.controller_mut().pause();

        let mut controller =
            PlaybackController::new(RodioResource::new(self.fetcher.clone())?, &self.playback);
        controller.set_event_sender(self.player_tx.clone());
        let mut session = PlaybackSession::new(controller, AdvancePolicy::WithinItem);
        session.select_item(&item);
        let binder = KeyboardNavigationBinder::attach(&self.registry, binder_mode(&item));

        self.detail_cursor.set_active(Some(item.id.clone()));
        self.detail = Some(DetailView { session, binder });
        info!("Opened detail for {}", item.id);
        Ok(())
    }

    fn close_detail(&mut self) {
        if self.volume_drag.as_ref().is_some_and(|(_, player)| *player == Player::Detail) {
            self.volume_drag = None;
        }
        if let Some(DetailView { mut session, binder }) = self.detail.take() {
            binder.detach();
            session.clear();
            debug!("Closed detail view");
        }
        self.detail_cursor.set_active(None);
    }

    fn step_detail(&mut self, forward: bool) {
        let mut target = None;
        if forward {
            self.detail_cursor.next(|id| target = Some(id.clone()));
        } else {
            self.detail_cursor.previous(|id| target = Some(id.clone()));
        }
        let Some(id) = target else {
            return;
        };
        let Some(item) = self.store.get(&id).cloned() else {
            return;
        };

        if let Some(detail) = &mut self.detail {
            detail.session.select_item(&item);
            let mode = binder_mode(&item);
            if detail.binder.mode() != mode {
                detail.binder = KeyboardNavigationBinder::attach(&self.registry, mode);
            }
        }
        self.detail_cursor.set_active(Some(id.clone()));
        self.highlight(&id);
    }

    // ---- library actions ----

    fn confirm_delete(&mut self) {
        let Some(on_confirm) = self.pending_delete.on_confirm.take() else {
            return;
        };
        on_confirm(&mut self.store, &mut self.toasts);
        self.after_store_change();
    }

    fn after_store_change(&mut self) {
        let order: Vec<GenerationId> =
            self.store.items().iter().map(|item| item.id.clone()).collect();
        self.footer_cursor.set_items(order.clone());
        self.detail_cursor.set_items(order);
        self.selection.retain_existing(&self.store);

        let detail_gone = self
            .detail
            .as_ref()
            .and_then(|detail| detail.session.active_id())
            .is_some_and(|id| self.store.get(id).is_none());
        if detail_gone {
            self.close_detail();
        }

        let footer_gone = self.footer.active_id().is_some_and(|id| self.store.get(id).is_none());
        if footer_gone {
            self.footer.clear();
            self.footer_cursor.set_active(None);
        }

        let len = self.store.items().len();
        match self.list_state.selected() {
            _ if len == 0 => self.list_state.select(None),
            Some(index) if index >= len => self.list_state.select(Some(len - 1)),
            None => self.list_state.select(Some(0)),
            _ => {}
        }
    }

    fn start_downloads(&mut self, requests: Vec<(Track, String)>) {
        if requests.is_empty() {
            self.toasts.notify("Nothing to download");
            return;
        }

        info!("Starting {} download(s)", requests.len());
        let bridge = self.downloads.clone();
        let tx = self.download_tx.clone();
        tokio::spawn(async move {
            let results = bridge.download_all(&requests).await;
            let _ = tx.send(DownloadReport { results });
        });
    }

    fn handle_download_report(&mut self, report: DownloadReport) {
        let mut saved = 0;
        let mut opened = 0;
        let mut failed = 0;
        for result in &report.results {
            match result {
                Ok(DownloadOutcome::Saved(_)) => saved += 1,
                Ok(DownloadOutcome::OpenedDirectly) => opened += 1,
                Err(e) => {
                    warn!("Download failed: {}", e);
                    failed += 1;
                }
            }
        }

        let mut parts = Vec::new();
        if saved > 0 {
            parts.push(format!(
                "Saved {} file(s) to {}",
                saved,
                self.downloads.target_dir().display()
            ));
        }
        if opened > 0 {
            parts.push(format!("opened {} link(s)", opened));
        }
        if failed > 0 {
            parts.push(format!("{} failed", failed));
        }
        self.toasts.notify(&parts.join(", "));
    }

    // ---- rendering ----

    fn render(&mut self) -> Result<()> {
        let size = self.terminal.size()?;
        self.areas = Areas::compute(size, self.detail.is_some());

        let view = View {
            areas: self.areas,
            store: &self.store,
            selection: &self.selection,
            footer: &self.footer,
            detail: self.detail.as_ref(),
            toasts: &self.toasts,
            register: &self.register,
            folders: &self.folders,
            confirming: self.pending_delete.on_confirm.is_some(),
        };
        let mut list_state = self.list_state.clone();

        self.terminal.draw(|f| view.render(f, &mut list_state))?;

        self.list_state = list_state;
        Ok(())
    }
}

struct View<'a> {
    areas: Areas,
    store: &'a JsonStore,
    selection: &'a Selection,
    footer: &'a PlaybackSession<RodioResource>,
    detail: Option<&'a DetailView>,
    toasts: &'a Toasts,
    register: &'a Register,
    folders: &'a FolderModal,
    confirming: bool,
}

impl View<'_> {
    fn render(&self, f: &mut Frame, list_state: &mut ListState) {
        self.render_header(f);
        self.render_library(f, list_state);
        if let (Some(detail), Some(areas)) = (self.detail, self.areas.detail) {
            self.render_detail(f, detail, areas);
        }
        self.render_footer(f);
        self.render_status_line(f);
        if let Some(ids) = &self.folders.ids {
            Self::render_folder_modal(f, ids);
        }
    }

    fn render_header(&self, f: &mut Frame) {
        let mut text = format!("genplay - {} generations", self.store.items().len());
        if !self.selection.is_empty() {
            let previews: Vec<String> = self
                .selection
                .thumbnails(self.store)
                .iter()
                .map(|thumb| match &thumb.url {
                    Some(_) => format!("[{}]", thumb.id),
                    None => "[♪]".to_string(),
                })
                .collect();
            text.push_str(&format!(
                "  |  {} selected {}",
                self.selection.len(),
                previews.join(" ")
            ));
        }

        let header = Paragraph::new(text)
            .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(header, self.areas.header);
    }

    fn render_library(&self, f: &mut Frame, list_state: &mut ListState) {
        let selecting = !self.selection.is_empty();
        let items: Vec<ListItem> = self
            .store
            .items()
            .iter()
            .map(|item| {
                let playing = self.footer.active_id() == Some(&item.id);
                let mut spans = Vec::new();
                if selecting {
                    let mark = if self.selection.contains(&item.id) { "[x] " } else { "[ ] " };
                    spans.push(Span::raw(mark));
                }
                spans.push(Span::raw(if playing { "♪ " } else { "  " }));
                spans.push(Span::styled(
                    if self.store.is_favorite(&item.id) { "★ " } else { "  " },
                    Style::default().fg(Color::Yellow),
                ));
                spans.push(Span::styled(
                    format!("{:<6}", kind_label(item.kind)),
                    Style::default().fg(Color::DarkGray),
                ));
                spans.push(Span::raw(item.display_title()));
                if let Some(status) = item.status_label() {
                    spans.push(Span::styled(
                        format!("  {}", status),
                        Style::default().fg(Color::Magenta),
                    ));
                }

                let style = if playing {
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                ListItem::new(Line::from(spans)).style(style)
            })
            .collect();

        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title("Library"))
            .highlight_style(Style::default().bg(Color::DarkGray))
            .highlight_symbol("► ");
        f.render_stateful_widget(list, self.areas.library, list_state);
    }

    fn render_detail(&self, f: &mut Frame, detail: &DetailView, areas: DetailAreas) {
        let session = &detail.session;
        let item = session.active_id().and_then(|id| self.store.get(id));
        let Some(item) = item else {
            return;
        };

        let mut lines = vec![
            Line::from(vec![
                Span::styled("Style: ", Style::default().fg(Color::DarkGray)),
                Span::raw(item.style_label()),
            ]),
            Line::from(vec![
                Span::styled("Model: ", Style::default().fg(Color::DarkGray)),
                Span::raw(item.model.clone()),
                Span::styled("  Created: ", Style::default().fg(Color::DarkGray)),
                Span::raw(item.created_at.format("%Y-%m-%d %H:%M").to_string()),
            ]),
            Line::from(if self.store.is_favorite(&item.id) {
                "★ Favorite"
            } else {
                "☆ Not a favorite"
            }),
            Line::from(""),
            Line::from(item.description()),
            Line::from(""),
        ];

        if session.tracks().is_empty() {
            lines.push(Line::from(item.status_label().unwrap_or("No playable media")));
        } else {
            for (index, track) in session.tracks().iter().enumerate() {
                let current = index == session.track_cursor().index();
                let marker = if current { "▶ " } else { "  " };
                let cover = if track.cover.is_some() { " (cover)" } else { "" };
                let style = if current {
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                let text = format!("{}{}. {}{}", marker, index + 1, track.url, cover);
                lines.push(Line::styled(text, style));
            }
        }

        if let Some(copied) = &self.register.contents {
            lines.push(Line::from(""));
            lines.push(Line::styled(
                format!("Copied: {}", copied),
                Style::default().fg(Color::DarkGray),
            ));
        }

        let nav = format!(
            "{} ←  → {}",
            if session.has_previous_track() { "[" } else { " " },
            if session.has_next_track() { "]" } else { " " },
        );
        let block = Block::default()
            .borders(Borders::ALL)
            .title(item.display_title())
            .title_bottom(nav);
        let info = Paragraph::new(lines).wrap(Wrap { trim: true }).block(block);
        f.render_widget(info, areas.info);

        Self::render_progress(f, areas.progress, session);
        Self::render_volume(f, areas.volume, session.controller().volume());
    }

    fn render_footer(&self, f: &mut Frame) {
        let active = self.footer.active_id().and_then(|id| self.store.get(id));
        let now = self.footer.now_playing(active);

        let line = Line::from(format!("♪ {}  {}", now.headline(), now.detail()));
        let info = Paragraph::new(vec![line])
            .block(Block::default().borders(Borders::ALL).title("Now Playing"));
        f.render_widget(info, self.areas.footer_info);

        Self::render_volume(f, self.areas.footer_volume, self.footer.controller().volume());

        let controller = self.footer.controller();
        let state = match controller.status() {
            ResourceStatus::Failed(_) => "⚠ Error".to_string(),
            ResourceStatus::Loading => "… Loading".to_string(),
            _ if controller.is_playing() => "▶ Playing".to_string(),
            ResourceStatus::Unloaded => "⏹ Stopped".to_string(),
            _ => "⏸ Paused".to_string(),
        };
        let lines = vec![Line::from(state), Line::from(controller.speed_preset().label())];
        let status = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Status"));
        f.render_widget(status, self.areas.footer_status);

        Self::render_progress(f, self.areas.footer_progress, self.footer);
    }

    fn render_progress(f: &mut Frame, area: Rect, session: &PlaybackSession<RodioResource>) {
        let controller = session.controller();
        let label = format!(
            "{} / {}",
            format_time(controller.elapsed()),
            format_time(controller.duration())
        );
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title("Progress"))
            .gauge_style(Style::default().fg(Color::Cyan))
            .label(label)
            .ratio(controller.progress());
        f.render_widget(gauge, area);
    }

    fn render_volume(f: &mut Frame, area: Rect, volume: f32) {
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title("Volume"))
            .gauge_style(Style::default().fg(Color::Green))
            .ratio(volume.clamp(0.0, 1.0) as f64);
        f.render_widget(gauge, area);
    }

    fn render_status_line(&self, f: &mut Frame) {
        let text = if self.confirming {
            Span::styled(
                "Delete? This cannot be undone.  y: delete  n: cancel",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )
        } else if let Some(message) = self.toasts.visible() {
            Span::styled(message.to_string(), Style::default().fg(Color::Green))
        } else if self.detail.is_some() {
            Span::styled(DETAIL_HINTS, Style::default().fg(Color::DarkGray))
        } else {
            Span::styled(LIBRARY_HINTS, Style::default().fg(Color::DarkGray))
        };
        f.render_widget(Paragraph::new(Line::from(text)), self.areas.status_line);
    }

    fn render_folder_modal(f: &mut Frame, ids: &[GenerationId]) {
        let area = centered(f.area(), 50, 30);
        let mut lines = vec![
            Line::from(format!("Add {} item(s) to a folder", ids.len())),
            Line::from(""),
        ];
        lines.extend(ids.iter().take(5).map(|id| Line::from(format!("  {}", id))));
        lines.push(Line::from(""));
        lines.push(Line::styled(
            "No folders available. Esc to close",
            Style::default().fg(Color::DarkGray),
        ));

        let modal = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .block(Block::default().borders(Borders::ALL).title("Folders"));
        f.render_widget(Clear, area);
        f.render_widget(modal, area);
    }
}

fn kind_label(kind: GenerationKind) -> &'static str {
    match kind {
        GenerationKind::Audio => "audio",
        GenerationKind::Video => "video",
        GenerationKind::Image => "image",
    }
}

fn centered(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let width = area.width * percent_x / 100;
    let height = (area.height * percent_y / 100).max(6);
    Rect::new(
        area.x + (area.width.saturating_sub(width)) / 2,
        area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height.min(area.height),
    )
}
