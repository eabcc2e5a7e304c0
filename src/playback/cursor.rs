// Bounds-checked position pointers. Hitting either end is a no-op, never an
// error and never a wraparound.

use tracing::debug;

use crate::generation::GenerationId;

/// Selected track within the active item. `len == 0` is the empty state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackCursor {
    index: usize,
    len: usize,
}

impl TrackCursor {
    pub fn new(len: usize) -> Self {
        Self { index: 0, len }
    }

    /// Back to the first track of a list of `len`
    pub fn reset(&mut self, len: usize) {
        self.index = 0;
        self.len = len;
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn has_next(&self) -> bool {
        self.index + 1 < self.len
    }

    pub fn has_previous(&self) -> bool {
        self.index > 0
    }

    /// Each move returns whether the index changed
    pub fn next(&mut self) -> bool {
        if !self.has_next() {
            return false;
        }
        self.index += 1;
        debug!("Track cursor -> {}", self.index);
        true
    }

    pub fn previous(&mut self) -> bool {
        if !self.has_previous() {
            return false;
        }
        self.index -= 1;
        debug!("Track cursor -> {}", self.index);
        true
    }

    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.len || index == self.index {
            return false;
        }
        self.index = index;
        debug!("Track cursor -> {}", self.index);
        true
    }

    pub fn select_last(&mut self) -> bool {
        match self.len {
            0 => false,
            len => self.select(len - 1),
        }
    }
}

/// Active item within an externally owned, ordered collection.
///
/// The active item is tracked by id; its position is recomputed whenever
/// the list or the active id changes, so reordering or removals upstream
/// never leave the cursor pointing at the wrong item.
#[derive(Debug, Clone, Default)]
pub struct CollectionCursor {
    order: Vec<GenerationId>,
    active: Option<GenerationId>,
    position: Option<usize>,
}

impl CollectionCursor {
    pub fn new(order: Vec<GenerationId>, active: Option<GenerationId>) -> Self {
        let mut cursor = Self {
            order,
            active,
            position: None,
        };
        cursor.locate();
        cursor
    }

    fn locate(&mut self) {
        self.position = self
            .active
            .as_ref()
            .and_then(|active| self.order.iter().position(|id| id == active));
    }

    pub fn set_items(&mut self, order: Vec<GenerationId>) {
        self.order = order;
        self.locate();
    }

    pub fn set_active(&mut self, active: Option<GenerationId>) {
        self.active = active;
        self.locate();
    }

    pub fn active(&self) -> Option<&GenerationId> {
        self.active.as_ref()
    }

    /// None when the list is empty or doesn't contain the active item
    pub fn position(&self) -> Option<usize> {
        self.position
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn can_go_previous(&self) -> bool {
        matches!(self.position, Some(pos) if pos > 0)
    }

    pub fn can_go_next(&self) -> bool {
        matches!(self.position, Some(pos) if pos + 1 < self.order.len())
    }

    pub fn peek_next(&self) -> Option<&GenerationId> {
        if !self.can_go_next() {
            return None;
        }
        self.position.and_then(|pos| self.order.get(pos + 1))
    }

    pub fn peek_previous(&self) -> Option<&GenerationId> {
        if !self.can_go_previous() {
            return None;
        }
        self.position.and_then(|pos| self.order.get(pos - 1))
    }

    /// Hands the following id to `select`. Returns false at the end.
    pub fn next(&self, select: impl FnOnce(&GenerationId)) -> bool {
        match self.peek_next() {
            Some(id) => {
                debug!("Collection cursor -> next item {}", id);
                select(id);
                true
            }
            None => false,
        }
    }

    /// Hands the preceding id to `select`. Returns false at the start.
    pub fn previous(&self, select: impl FnOnce(&GenerationId)) -> bool {
        match self.peek_previous() {
            Some(id) => {
                debug!("Collection cursor -> previous item {}", id);
                select(id);
                true
            }
            None => false,
        }
    }
}
