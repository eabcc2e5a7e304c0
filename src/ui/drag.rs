// Volume drag gesture. Pointer-down on the volume bar starts a session that
// listens globally for moves and the release; the release ends it wherever
// it happens, inside the bar or not.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::debug;

use super::events::{Action, EventKind, InputEvent, ListenerGuard, ListenerRegistry, Response};

/// Horizontal extent of the control, in the same units as pointer x
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlGeometry {
    pub left: f32,
    pub width: f32,
}

impl ControlGeometry {
    pub fn new(left: f32, width: f32) -> Self {
        Self { left, width }
    }

    /// Position along the control, clamped to [0, 1]
    pub fn fraction_at(&self, x: f32) -> f32 {
        if self.width <= 0.0 || !x.is_finite() {
            return 0.0;
        }
        ((x - self.left) / self.width).clamp(0.0, 1.0)
    }

    pub fn contains(&self, x: f32) -> bool {
        x >= self.left && x <= self.left + self.width
    }
}

pub struct VolumeDrag;

impl VolumeDrag {
    /// Install the move/release listeners and return the volume under the pointer
    pub fn begin(
        registry: &ListenerRegistry,
        geometry: ControlGeometry,
        x: f32,
    ) -> (DragSession, f32) {
        let guards: Rc<RefCell<Vec<ListenerGuard>>> = Rc::default();

        let on_move = registry.add(EventKind::PointerMove, move |event| match event {
            InputEvent::Pointer(pointer) => {
                Response::action(Action::SetVolume(geometry.fraction_at(pointer.x)))
            }
            InputEvent::Key(_) => Response::none(),
        });

        let held: Weak<RefCell<Vec<ListenerGuard>>> = Rc::downgrade(&guards);
        let on_release = registry.add(EventKind::PointerRelease, move |_| {
            if let Some(guards) = held.upgrade() {
                release(&guards);
            }
            Response::action(Action::EndVolumeDrag)
        });

        guards.borrow_mut().extend([on_move, on_release]);
        debug!("Volume drag started at x={}", x);

        (DragSession { guards }, geometry.fraction_at(x))
    }
}

fn release(guards: &RefCell<Vec<ListenerGuard>>) {
    let taken = std::mem::take(&mut *guards.borrow_mut());
    if !taken.is_empty() {
        debug!("Volume drag ended");
    }
    drop(taken);
}

/// Live drag. Ends on pointer release, `end()`, or drop, whichever is first.
pub struct DragSession {
    guards: Rc<RefCell<Vec<ListenerGuard>>>,
}

impl DragSession {
    pub fn end(&self) {
        release(&self.guards);
    }

    pub fn is_active(&self) -> bool {
        !self.guards.borrow().is_empty()
    }
}

impl Drop for DragSession {
    fn drop(&mut self) {
        self.end();
    }
}
