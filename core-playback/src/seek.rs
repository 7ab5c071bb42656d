//! Bookkeeping for seeks a composite issues to one child.
//!
//! Every seek sent to a child is answered by one `SeekTo` notification from
//! that child, in issue order. The ledger remembers who asked for each one so
//! the composite only echoes seeks its own caller requested.

use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SeekOrigin {
    /// Requested by whoever drives the composite.
    Caller,
    /// Issued by the composite itself (repositioning, skipping a gap).
    Internal,
}

#[derive(Debug, Default)]
pub(crate) struct SeekLedger {
    pending: VecDeque<SeekOrigin>,
}

impl SeekLedger {
    pub(crate) fn issue(&mut self, origin: SeekOrigin) {
        self.pending.push_back(origin);
    }

    /// Match an echo to the oldest outstanding seek. `None` for an echo
    /// nobody is waiting for.
    pub(crate) fn settle(&mut self) -> Option<SeekOrigin> {
        self.pending.pop_front()
    }

    pub(crate) fn is_settled(&self) -> bool {
        self.pending.is_empty()
    }

    /// A newer caller seek is still in flight.
    pub(crate) fn caller_pending(&self) -> bool {
        self.pending.contains(&SeekOrigin::Caller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settles_in_issue_order() {
        let mut ledger = SeekLedger::default();
        ledger.issue(SeekOrigin::Internal);
        ledger.issue(SeekOrigin::Caller);

        assert!(ledger.caller_pending());
        assert_eq!(ledger.settle(), Some(SeekOrigin::Internal));
        assert_eq!(ledger.settle(), Some(SeekOrigin::Caller));
        assert!(ledger.is_settled());
        assert_eq!(ledger.settle(), None);
    }
}
