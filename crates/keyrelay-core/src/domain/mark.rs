//! Event order guard.
//!
//! Input events are queued before they are processed.  When focus moves to
//! another screen, events already in the queue belong to the old focus
//! state and must not be applied.  The guard handles this with a counter:
//!
//! 1. [`EventOrderGuard::advance`] bumps `current` and posts a marker
//!    carrying the new value into the same queue the input events use.
//! 2. Everything dequeued before that marker is refused by
//!    [`EventOrderGuard::admit`], because `current != last_observed`.
//! 3. When the marker itself is dequeued the consumer calls
//!    [`EventOrderGuard::observe`], and admission resumes.
//!
//! Only the marker for the *latest* advance restores admission; an older
//! marker still in flight does not.

/// A focus-transition counter value.  Wraps on overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Mark(pub u32);

impl Mark {
    pub fn next(self) -> Mark {
        Mark(self.0.wrapping_add(1))
    }
}

/// Where the guard posts its markers: the local event queue.
pub trait MarkerSink {
    fn post_marker(&mut self, mark: Mark);
}

impl<F: FnMut(Mark)> MarkerSink for F {
    fn post_marker(&mut self, mark: Mark) {
        self(mark)
    }
}

/// Drops input queued before the most recent focus transition.
#[derive(Debug, Clone, Default)]
pub struct EventOrderGuard {
    current: Mark,
    last_observed: Mark,
}

impl EventOrderGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new focus epoch and posts its marker to `sink`.
    pub fn advance(&mut self, sink: &mut dyn MarkerSink) -> Mark {
        self.current = self.current.next();
        tracing::trace!(mark = self.current.0, "advancing event mark");
        sink.post_marker(self.current);
        self.current
    }

    /// Records a marker taken off the event queue.
    pub fn observe(&mut self, mark: Mark) {
        self.last_observed = mark;
    }

    /// `true` if events dequeued now belong to the current epoch.
    pub fn admit(&self) -> bool {
        self.current == self.last_observed
    }

    pub fn current(&self) -> Mark {
        self.current
    }

    pub fn last_observed(&self) -> Mark {
        self.last_observed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_guard_admits() {
        assert!(EventOrderGuard::new().admit());
    }

    #[test]
    fn test_advance_blocks_until_marker_observed() {
        // Arrange
        let mut guard = EventOrderGuard::new();
        let mut posted = Vec::new();

        // Act
        let mark = guard.advance(&mut |m| posted.push(m));

        // Assert
        assert_eq!(posted, vec![mark]);
        assert!(!guard.admit());
        guard.observe(mark);
        assert!(guard.admit());
    }

    #[test]
    fn test_only_latest_marker_restores_admission() {
        let mut guard = EventOrderGuard::new();
        let mut posted = Vec::new();
        let first = guard.advance(&mut |m| posted.push(m));
        let second = guard.advance(&mut |m| posted.push(m));

        guard.observe(first);
        assert!(!guard.admit());

        guard.observe(second);
        assert!(guard.admit());
    }

    #[test]
    fn test_mark_wraps() {
        assert_eq!(Mark(u32::MAX).next(), Mark(0));
    }
}
