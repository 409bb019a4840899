//! Redemption frontier supplied by the queue ledger.
//!
//! Everything before the frontier is already redeemable. The market only
//! reads it; the queue ledger advances it over time.

use crate::types::QueuePosition;

pub trait Frontier {
    fn current_frontier(&self) -> QueuePosition;
}

/// Frontier advanced explicitly by the host.
///
/// The frontier never moves backwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManualFrontier {
    position: QueuePosition,
}

impl ManualFrontier {
    pub fn new(position: QueuePosition) -> Self {
        Self { position }
    }

    /// Move the frontier to `position` if it is ahead of the current one.
    pub fn advance_to(&mut self, position: QueuePosition) {
        self.position = self.position.max(position);
    }

    pub fn advance_by(&mut self, units: u64) {
        self.position = self.position.saturating_add(units);
    }
}

impl Frontier for ManualFrontier {
    fn current_frontier(&self) -> QueuePosition {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frontier_is_monotonic() {
        let mut frontier = ManualFrontier::new(100);
        frontier.advance_to(50);
        assert_eq!(frontier.current_frontier(), 100);
        frontier.advance_to(150);
        frontier.advance_by(10);
        assert_eq!(frontier.current_frontier(), 160);
    }
}
