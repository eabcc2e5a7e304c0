use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crossterm::event::{
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Down,
    Move,
    Release,
}

/// Pointer position in terminal cells (fractional so tests can be exact)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub x: f32,
    pub y: f32,
}

impl PointerEvent {
    pub fn new(kind: PointerKind, x: f32, y: f32) -> Self {
        Self { kind, x, y }
    }

    /// Left button only; scroll and other buttons aren't pointer gestures here
    pub fn from_mouse(mouse: &MouseEvent) -> Option<Self> {
        let kind = match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => PointerKind::Down,
            MouseEventKind::Drag(MouseButton::Left) | MouseEventKind::Moved => PointerKind::Move,
            MouseEventKind::Up(MouseButton::Left) => PointerKind::Release,
            _ => return None,
        };
        Some(Self::new(kind, mouse.column as f32, mouse.row as f32))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Key(KeyEvent),
    Pointer(PointerEvent),
}

impl InputEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            InputEvent::Key(_) => EventKind::Key,
            InputEvent::Pointer(pointer) => match pointer.kind {
                PointerKind::Down => EventKind::PointerDown,
                PointerKind::Move => EventKind::PointerMove,
                PointerKind::Release => EventKind::PointerRelease,
            },
        }
    }
}

/// What a listener subscribes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Key,
    PointerDown,
    PointerMove,
    PointerRelease,
}

/// Things listeners ask the host to do
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    PreviousItem,
    NextItem,
    TogglePlayback,
    SetVolume(f32),
    EndVolumeDrag,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    pub actions: Vec<Action>,
    pub prevent_default: bool,
}

impl Response {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn action(action: Action) -> Self {
        Self {
            actions: vec![action],
            prevent_default: false,
        }
    }

    /// Action plus "the host must not run its own handling of this event"
    pub fn prevent(action: Action) -> Self {
        Self {
            actions: vec![action],
            prevent_default: true,
        }
    }
}

/// Combined result of one dispatch over all listeners
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dispatch {
    pub actions: Vec<Action>,
    pub default_prevented: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&InputEvent) -> Response>;

struct Entry {
    id: ListenerId,
    kind: EventKind,
    // taken out while the listener runs, so it may add or remove listeners
    callback: Option<Listener>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    entries: Vec<Entry>,
}

impl Inner {
    // the caller drops the entry once the borrow is released
    fn take(&mut self, id: ListenerId) -> Option<Entry> {
        let slot = self.entries.iter().position(|entry| entry.id == id)?;
        Some(self.entries.remove(slot))
    }
}

/// Global input listeners for the event loop. Everything that subscribes
/// gets a `ListenerGuard`; dropping the guard unsubscribes.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    inner: Rc<RefCell<Inner>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &self,
        kind: EventKind,
        listener: impl FnMut(&InputEvent) -> Response + 'static,
    ) -> ListenerGuard {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let id = ListenerId(inner.next_id);
        inner.entries.push(Entry {
            id,
            kind,
            callback: Some(Box::new(listener)),
        });
        debug!("Listener {} attached for {:?}", id.0, kind);

        ListenerGuard {
            id,
            registry: Rc::downgrade(&self.inner),
        }
    }

    /// Run every listener subscribed to this event's kind, in attach order.
    /// Listeners attached during the dispatch see the next event, not this one.
    pub fn dispatch(&self, event: &InputEvent) -> Dispatch {
        let kind = event.kind();
        let ids: Vec<ListenerId> = self
            .inner
            .borrow()
            .entries
            .iter()
            .filter(|entry| entry.kind == kind)
            .map(|entry| entry.id)
            .collect();

        let mut dispatch = Dispatch::default();
        for id in ids {
            let callback = self
                .inner
                .borrow_mut()
                .entries
                .iter_mut()
                .find(|entry| entry.id == id)
                .and_then(|entry| entry.callback.take());
            let Some(mut callback) = callback else {
                continue;
            };

            let response = callback(event);
            dispatch.actions.extend(response.actions);
            dispatch.default_prevented |= response.prevent_default;

            // put it back unless the listener got detached meanwhile
            let mut inner = self.inner.borrow_mut();
            match inner.entries.iter().position(|entry| entry.id == id) {
                Some(slot) => inner.entries[slot].callback = Some(callback),
                None => {
                    // its captures may own guards that need the registry
                    drop(inner);
                    drop(callback);
                }
            }
        }
        dispatch
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.inner
            .borrow()
            .entries
            .iter()
            .filter(|entry| entry.kind == kind)
            .count()
    }
}

/// Unsubscribes on drop
pub struct ListenerGuard {
    id: ListenerId,
    registry: Weak<RefCell<Inner>>,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.registry.upgrade() {
            let removed = inner.borrow_mut().take(self.id);
            if removed.is_some() {
                debug!("Listener {} detached", self.id.0);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinderMode {
    /// Left/Right move between items, Space toggles playback
    Full,
    /// Left/Right only (video dialog)
    NavigationOnly,
}

/// Arrow/space bindings for an open detail view. Holding it keeps the
/// bindings alive; dropping it removes them.
pub struct KeyboardNavigationBinder {
    mode: BinderMode,
    _guard: ListenerGuard,
}

impl KeyboardNavigationBinder {
    pub fn attach(registry: &ListenerRegistry, mode: BinderMode) -> Self {
        let guard = registry.add(EventKind::Key, move |event| {
            let InputEvent::Key(key) = event else {
                return Response::none();
            };
            if key.kind != KeyEventKind::Press
                || key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
            {
                return Response::none();
            }

            match key.code {
                KeyCode::Left => Response::action(Action::PreviousItem),
                KeyCode::Right => Response::action(Action::NextItem),
                KeyCode::Char(' ') if mode == BinderMode::Full => {
                    Response::prevent(Action::TogglePlayback)
                }
                _ => Response::none(),
            }
        });

        Self { mode, _guard: guard }
    }

    pub fn mode(&self) -> BinderMode {
        self.mode
    }

    pub fn detach(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn key(code: KeyCode) -> InputEvent {
        InputEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn test_binder_maps_arrows_and_space() {
        let registry = ListenerRegistry::new();
        let _binder = KeyboardNavigationBinder::attach(&registry, BinderMode::Full);

        assert_eq!(registry.dispatch(&key(KeyCode::Left)).actions, vec![Action::PreviousItem]);
        assert_eq!(registry.dispatch(&key(KeyCode::Right)).actions, vec![Action::NextItem]);

        let space = registry.dispatch(&key(KeyCode::Char(' ')));
        assert_eq!(space.actions, vec![Action::TogglePlayback]);
        assert!(space.default_prevented);

        let other = registry.dispatch(&key(KeyCode::Char('x')));
        assert!(other.actions.is_empty());
        assert!(!other.default_prevented);
    }

    #[test]
    fn test_navigation_only_leaves_space_alone() {
        let registry = ListenerRegistry::new();
        let _binder = KeyboardNavigationBinder::attach(&registry, BinderMode::NavigationOnly);

        let space = registry.dispatch(&key(KeyCode::Char(' ')));
        assert!(space.actions.is_empty());
        assert!(!space.default_prevented);
        assert_eq!(registry.dispatch(&key(KeyCode::Right)).actions, vec![Action::NextItem]);
    }

    #[test]
    fn test_binder_ignores_releases_and_modified_keys() {
        let registry = ListenerRegistry::new();
        let _binder = KeyboardNavigationBinder::attach(&registry, BinderMode::Full);

        let mut release = KeyEvent::new(KeyCode::Left, KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert!(registry.dispatch(&InputEvent::Key(release)).actions.is_empty());

        let ctrl = KeyEvent::new(KeyCode::Right, KeyModifiers::CONTROL);
        assert!(registry.dispatch(&InputEvent::Key(ctrl)).actions.is_empty());
    }

    #[test]
    fn test_dropping_binder_detaches() {
        let registry = ListenerRegistry::new();
        let binder = KeyboardNavigationBinder::attach(&registry, BinderMode::Full);
        assert_eq!(registry.count(EventKind::Key), 1);

        drop(binder);
        assert!(registry.is_empty());
        assert!(registry.dispatch(&key(KeyCode::Left)).actions.is_empty());

        // reopening binds exactly once again
        let mut open = Some(KeyboardNavigationBinder::attach(&registry, BinderMode::Full));
        open.replace(KeyboardNavigationBinder::attach(&registry, BinderMode::Full));
        assert_eq!(registry.len(), 1);
        assert!(open.is_some());
    }

    #[test]
    fn test_listener_only_sees_its_kind() {
        let registry = ListenerRegistry::new();
        let moves = Rc::new(Cell::new(0));
        let seen = moves.clone();
        let _guard = registry.add(EventKind::PointerMove, move |_| {
            seen.set(seen.get() + 1);
            Response::none()
        });

        registry.dispatch(&InputEvent::Pointer(PointerEvent::new(PointerKind::Move, 1.0, 0.0)));
        registry.dispatch(&InputEvent::Pointer(PointerEvent::new(PointerKind::Release, 1.0, 0.0)));
        registry.dispatch(&key(KeyCode::Left));
        assert_eq!(moves.get(), 1);
    }

    #[test]
    fn test_listener_can_detach_itself_mid_dispatch() {
        let registry = ListenerRegistry::new();
        let slot: Rc<RefCell<Option<ListenerGuard>>> = Rc::default();

        let held = Rc::downgrade(&slot);
        let guard = registry.add(EventKind::PointerRelease, move |_| {
            if let Some(slot) = held.upgrade() {
                let own = slot.borrow_mut().take();
                drop(own);
            }
            Response::action(Action::EndVolumeDrag)
        });
        *slot.borrow_mut() = Some(guard);

        let release = InputEvent::Pointer(PointerEvent::new(PointerKind::Release, 0.0, 0.0));
        assert_eq!(registry.dispatch(&release).actions, vec![Action::EndVolumeDrag]);
        assert!(registry.is_empty());
        assert!(registry.dispatch(&release).actions.is_empty());
    }

    #[test]
    fn test_pointer_from_mouse() {
        let mouse = MouseEvent {
            kind: MouseEventKind::Drag(MouseButton::Left),
            column: 12,
            row: 3,
            modifiers: KeyModifiers::NONE,
        };
        assert_eq!(
            PointerEvent::from_mouse(&mouse),
            Some(PointerEvent::new(PointerKind::Move, 12.0, 3.0))
        );

        let scroll = MouseEvent {
            kind: MouseEventKind::ScrollUp,
            ..mouse
        };
        assert_eq!(PointerEvent::from_mouse(&scroll), None);
    }
}
