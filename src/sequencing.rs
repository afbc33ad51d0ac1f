use tracing::debug;

/// Identifies one issued fetch; higher tickets were issued later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

/// Guards a view against responses that arrive out of order.
///
/// A response is applied only when its ticket is newer than the last applied
/// one, so a slow stale fetch can never overwrite fresher data.
#[derive(Debug, Default)]
pub struct RequestTracker {
    issued: u64,
    applied: u64,
    settled: u64,
}

impl RequestTracker {
    pub fn issue(&mut self) -> Ticket {
        self.issued += 1;
        Ticket(self.issued)
    }

    /// Records a successful response. Returns false when it is stale and must be dropped.
    pub fn accept(&mut self, ticket: Ticket) -> bool {
        self.settle(ticket);
        if ticket.0 <= self.applied {
            debug!(ticket = ticket.0, applied = self.applied, "discarding stale response");
            return false;
        }
        self.applied = ticket.0;
        true
    }

    /// Records a failed response. Returns false when a newer response has already
    /// been applied, in which case the failure is not worth reporting.
    pub fn fail(&mut self, ticket: Ticket) -> bool {
        self.settle(ticket);
        ticket.0 > self.applied
    }

    fn settle(&mut self, ticket: Ticket) {
        self.settled = self.settled.max(ticket.0);
    }

    /// True while the most recently issued request has not come back.
    pub fn is_loading(&self) -> bool {
        self.settled < self.issued
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_order_responses_apply() {
        let mut tracker = RequestTracker::default();
        let first = tracker.issue();
        assert!(tracker.is_loading());
        assert!(tracker.accept(first));
        assert!(!tracker.is_loading());

        let second = tracker.issue();
        assert!(tracker.accept(second));
    }

    #[test]
    fn test_stale_response_is_discarded() {
        let mut tracker = RequestTracker::default();
        let older = tracker.issue();
        let newer = tracker.issue();

        assert!(tracker.accept(newer));
        assert!(!tracker.accept(older));
        assert!(!tracker.is_loading());
    }

    #[test]
    fn test_older_response_applies_until_newer_lands() {
        let mut tracker = RequestTracker::default();
        let older = tracker.issue();
        let newer = tracker.issue();

        assert!(tracker.accept(older));
        assert!(tracker.is_loading());
        assert!(tracker.accept(newer));
        assert!(!tracker.is_loading());
    }

    #[test]
    fn test_failure_settles_without_applying() {
        let mut tracker = RequestTracker::default();
        let ticket = tracker.issue();
        assert!(tracker.fail(ticket));
        assert!(!tracker.is_loading());

        let next = tracker.issue();
        assert!(tracker.accept(next));
    }

    #[test]
    fn test_failure_behind_applied_response_is_stale() {
        let mut tracker = RequestTracker::default();
        let older = tracker.issue();
        let newer = tracker.issue();

        assert!(tracker.accept(newer));
        assert!(!tracker.fail(older));
        assert!(!tracker.is_loading());
    }
}
