//! Server transaction numbering.

use std::sync::atomic::{AtomicU32, Ordering};

/// Hands out `ServerTransactionID`s.
///
/// Starts at 1 and increases by exactly one per call, across all threads,
/// for the life of the sequencer. One instance lives in the server context.
#[derive(Debug, Default)]
pub struct TransactionSequencer {
    last: AtomicU32,
}

impl TransactionSequencer {
    /// Create a sequencer whose first ID will be 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next transaction ID.
    pub fn next(&self) -> u32 {
        self.last.fetch_add(1, Ordering::SeqCst).wrapping_add(1)
    }

    /// Last ID handed out, or 0 if none yet.
    pub fn current(&self) -> u32 {
        self.last.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn starts_at_one() {
        let seq = TransactionSequencer::new();
        assert_eq!(seq.current(), 0);
        assert_eq!(seq.next(), 1);
        assert_eq!(seq.next(), 2);
        assert_eq!(seq.current(), 2);
    }

    #[test]
    fn unique_across_threads() {
        let seq = Arc::new(TransactionSequencer::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let seq = Arc::clone(&seq);
                thread::spawn(move || {
                    let mut ids = Vec::with_capacity(500);
                    let mut last = 0;
                    for _ in 0..500 {
                        let id = seq.next();
                        assert!(id > last, "per-thread IDs must increase");
                        last = id;
                        ids.push(id);
                    }
                    ids
                })
            })
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(all.insert(id), "duplicate transaction ID {id}");
            }
        }
        assert_eq!(all.len(), 4000);
        assert_eq!(seq.current(), 4000);
    }
}
