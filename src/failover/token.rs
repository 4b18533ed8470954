use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Generation counter shared between the control thread and its workers.
///
/// Starting a decision sequence advances the counter. Work captures the value
/// at start and checks [`is_current`](Self::is_current) before acting; a
/// mismatch means the result is stale and must be dropped.
#[derive(Debug, Clone, Default)]
pub struct VerificationToken(Arc<AtomicU64>);

impl VerificationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Invalidate all outstanding work and return the new generation
    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.current() == generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_invalidates_clones() {
        let token = VerificationToken::new();
        let worker_view = token.clone();
        let captured = worker_view.current();

        assert!(worker_view.is_current(captured));
        let next = token.advance();
        assert_eq!(next, captured + 1);
        assert!(!worker_view.is_current(captured));
        assert!(worker_view.is_current(next));
    }
}
