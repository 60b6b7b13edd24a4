//! Press sessions: which input source currently drives which charge.
//!
//! The mouse and every active touch point are independent sources. Each maps
//! to at most one live charge; a second start on an occupied source is
//! ignored. Touch sources are reference counted so the host only keeps its
//! move/cancel/end listeners installed while at least one touch is down.

#[cfg(test)]
#[path = "press_test.rs"]
mod press_test;

use std::collections::HashMap;

/// Stable handle to a charge owned by the mirror surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChargeHandle(pub u64);

/// An input source that can press the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PressSource {
    /// The (primary button of the) mouse pointer.
    Mouse,
    /// A touch point, by its browser-assigned identifier.
    Touch(i32),
}

impl PressSource {
    /// Tag used as the second component of the charge key.
    #[must_use]
    pub fn tag(&self) -> String {
        match self {
            Self::Mouse => "mouse".to_owned(),
            Self::Touch(id) => format!("touch{id}"),
        }
    }

    #[must_use]
    pub fn is_touch(&self) -> bool {
        matches!(self, Self::Touch(_))
    }
}

/// Change to the host's touch listener set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchListeners {
    /// The first touch went down: listen for move/cancel/end.
    Install,
    /// The last touch lifted: stop listening.
    Remove,
}

/// Multiplexes concurrent input sources onto charges.
#[derive(Debug, Default)]
pub struct PressTracker {
    presses: HashMap<PressSource, ChargeHandle>,
    touch_count: usize,
}

impl PressTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `source` is currently driving a charge.
    #[must_use]
    pub fn contains(&self, source: PressSource) -> bool {
        self.presses.contains_key(&source)
    }

    /// The charge driven by `source`, if any.
    #[must_use]
    pub fn get(&self, source: PressSource) -> Option<ChargeHandle> {
        self.presses.get(&source).copied()
    }

    /// Bind `source` to `handle`.
    ///
    /// Starting an occupied source keeps the existing binding and returns
    /// `None`; callers check [`Self::contains`] before creating a charge.
    pub fn start(&mut self, source: PressSource, handle: ChargeHandle) -> Option<TouchListeners> {
        if self.presses.contains_key(&source) {
            return None;
        }
        self.presses.insert(source, handle);
        if source.is_touch() {
            self.touch_count += 1;
            if self.touch_count == 1 {
                return Some(TouchListeners::Install);
            }
        }
        None
    }

    /// Unbind `source`, returning the charge it drove.
    pub fn end(&mut self, source: PressSource) -> Option<(ChargeHandle, Option<TouchListeners>)> {
        let handle = self.presses.remove(&source)?;
        let mut listeners = None;
        if source.is_touch() {
            self.touch_count = self.touch_count.saturating_sub(1);
            if self.touch_count == 0 {
                listeners = Some(TouchListeners::Remove);
            }
        }
        Some((handle, listeners))
    }

    /// Drop every binding. Reports `Remove` if touch listeners were installed.
    pub fn clear(&mut self) -> Option<TouchListeners> {
        self.presses.clear();
        let had_touches = self.touch_count > 0;
        self.touch_count = 0;
        had_touches.then_some(TouchListeners::Remove)
    }

    /// Number of live touch sources.
    #[must_use]
    pub fn touch_count(&self) -> usize {
        self.touch_count
    }

    /// Number of live sources of any kind.
    #[must_use]
    pub fn len(&self) -> usize {
        self.presses.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.presses.is_empty()
    }
}
