//! Bounded per-sender duplicate suppression.
//!
//! The link layer retransmits until it sees an acknowledgment. When the
//! acknowledgment is lost, the receiver gets the same packet twice with the
//! same link sequence number. Remembering the last sequence per sender is
//! enough to drop the echo.
//!
//! Memory is bounded: at most `capacity` senders are remembered, and the one
//! inserted longest ago is forgotten first. A message from a forgotten sender
//! is always treated as new.

use std::collections::VecDeque;

use cycinc_topology::NodeId;

/// Link-layer sequence number.
pub type SeqNo = u8;

/// Canonical number of remembered senders.
pub const DEFAULT_CAPACITY: usize = 4;

/// Last accepted sequence number from one sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupEntry {
    pub sender: NodeId,
    pub last_seq: SeqNo,
}

/// Outcome of offering `(sender, seq)` to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// First message seen from this sender.
    Inserted,
    /// Known sender, new sequence number.
    Updated,
    /// Unknown sender admitted by forgetting the oldest entry.
    Evicted(NodeId),
    /// Same sequence number as last time: an echo.
    Duplicate,
}

impl Admission {
    /// Whether the message should be processed.
    pub const fn is_new(self) -> bool {
        !matches!(self, Self::Duplicate)
    }
}

/// Fixed-capacity history of the last sequence number per sender.
#[derive(Debug, Clone)]
pub struct DedupCache {
    entries: VecDeque<DedupEntry>,
    capacity: usize,
}

impl DedupCache {
    /// Create an empty cache. Storage for `capacity` entries is reserved up
    /// front and never grows. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Offer a sequence number from `sender`.
    pub fn admit(&mut self, sender: NodeId, seq: SeqNo) -> Admission {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.sender == sender) {
            if entry.last_seq == seq {
                return Admission::Duplicate;
            }
            entry.last_seq = seq;
            return Admission::Updated;
        }

        let evicted = if self.entries.len() == self.capacity {
            self.entries.pop_front().map(|e| e.sender)
        } else {
            None
        };
        self.entries.push_back(DedupEntry { sender, last_seq: seq });

        match evicted {
            Some(old) => Admission::Evicted(old),
            None => Admission::Inserted,
        }
    }

    /// Last sequence number remembered for `sender`.
    pub fn last_seq(&self, sender: NodeId) -> Option<SeqNo> {
        self.entries.iter().find(|e| e.sender == sender).map(|e| e.last_seq)
    }

    /// Remembered entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &DedupEntry> {
        self.entries.iter()
    }

    /// Number of remembered senders.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of remembered senders.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn echo_is_duplicate() {
        let mut cache = DedupCache::default();
        assert_eq!(cache.admit(NodeId(10), 3), Admission::Inserted);
        assert_eq!(cache.admit(NodeId(10), 3), Admission::Duplicate);
        assert_eq!(cache.admit(NodeId(10), 3), Admission::Duplicate);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn new_sequence_updates() {
        let mut cache = DedupCache::default();
        cache.admit(NodeId(10), 3);
        assert_eq!(cache.admit(NodeId(10), 4), Admission::Updated);
        assert_eq!(cache.last_seq(NodeId(10)), Some(4));
        // Going back to an older number is not an echo of the last one
        assert_eq!(cache.admit(NodeId(10), 3), Admission::Updated);
    }

    #[test]
    fn evicts_oldest_inserted_not_most_recently_used() {
        let mut cache = DedupCache::new(2);
        cache.admit(NodeId(1), 0);
        cache.admit(NodeId(2), 0);
        // Touch sender 1; insertion order is unchanged
        assert_eq!(cache.admit(NodeId(1), 1), Admission::Updated);

        assert_eq!(cache.admit(NodeId(3), 0), Admission::Evicted(NodeId(1)));
        assert_eq!(cache.last_seq(NodeId(1)), None);
        let senders: Vec<_> = cache.entries().map(|e| e.sender).collect();
        assert_eq!(senders, vec![NodeId(2), NodeId(3)]);
    }

    #[test]
    fn forgotten_sender_reads_as_new() {
        let mut cache = DedupCache::new(1);
        cache.admit(NodeId(1), 7);
        cache.admit(NodeId(2), 0);
        // Same (sender, seq) as before, but the entry is gone
        assert!(cache.admit(NodeId(1), 7).is_new());
    }

    #[test]
    fn zero_capacity_still_remembers_one() {
        let mut cache = DedupCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.admit(NodeId(1), 7);
        assert_eq!(cache.admit(NodeId(1), 7), Admission::Duplicate);
    }

    proptest! {
        #[test]
        fn never_exceeds_capacity(
            capacity in 1usize..6,
            arrivals in proptest::collection::vec((0u16..10, any::<u8>()), 0..200),
        ) {
            let mut cache = DedupCache::new(capacity);
            for (sender, seq) in arrivals {
                cache.admit(NodeId(sender), seq);
                prop_assert!(cache.len() <= capacity);
            }
        }

        #[test]
        fn immediate_repeat_always_dropped(
            arrivals in proptest::collection::vec((0u16..10, any::<u8>()), 1..200),
        ) {
            let mut cache = DedupCache::default();
            for (sender, seq) in arrivals {
                cache.admit(NodeId(sender), seq);
                let again = cache.admit(NodeId(sender), seq);
                prop_assert_eq!(again, Admission::Duplicate);
                // The echo has no side effects
                prop_assert_eq!(cache.last_seq(NodeId(sender)), Some(seq));
            }
        }
    }
}
