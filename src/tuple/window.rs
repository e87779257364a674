use super::{CACHE_RANGE, ControlKind, ControlTuple};

/// Returns the smallest window id `>= base` congruent to `wire` modulo
/// [`CACHE_RANGE`].
///
/// Window ids never decrease within a stream, so as long as consecutive
/// control tuples are less than [`CACHE_RANGE`] windows apart this recovers
/// the exact id from its cached encoding.
pub const fn resolve_window_id(base: u64, wire: u64) -> u64 {
    let range = CACHE_RANGE as u64;
    let delta = (wire % range + range - base % range) % range;
    base.saturating_add(delta)
}

/// Re-derives full window ids on the receiving side of a stream.
///
/// Reset window records carry the full id and re-base the tracker, any other
/// control tuple is resolved against the last known id with
/// [`resolve_window_id`].
#[derive(Debug, Clone, Default)]
pub struct WindowTracker {
    current: u64,
}

impl WindowTracker {
    pub const fn new() -> Self {
        Self { current: 0 }
    }

    /// The last window id observed.
    pub const fn current(&self) -> u64 {
        self.current
    }

    /// Resolves the full window id of `tuple` and records it.
    pub fn observe(&mut self, tuple: &ControlTuple) -> u64 {
        self.current = match tuple.kind() {
            ControlKind::ResetWindow => tuple.window_id(),
            _ => resolve_window_id(self.current, tuple.window_id()),
        };
        self.current
    }
}
