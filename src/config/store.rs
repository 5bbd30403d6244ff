//! Atomically swappable rule table.
//!
//! # Design Decisions
//! - Readers take an `Arc<RuleTable>` and keep it for the whole request, so a
//!   reload never changes the rules under an in-flight request
//! - Tables are replaced wholesale, never patched
//! - `ArcSwap` keeps `snapshot()` lock-free; there is one writer (the reloader)

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::schema::RuleTable;

/// Holder of the currently active [`RuleTable`].
#[derive(Debug)]
pub struct RuleStore {
    current: ArcSwap<RuleTable>,
}

impl RuleStore {
    pub fn new(table: RuleTable) -> Self {
        Self {
            current: ArcSwap::from_pointee(table),
        }
    }

    /// Point-in-time view of the active rules.
    pub fn snapshot(&self) -> Arc<RuleTable> {
        self.current.load_full()
    }

    /// Replace the active rules. Snapshots taken afterwards see `table`.
    pub fn publish(&self, table: RuleTable) {
        let rules = table.len();
        self.current.store(Arc::new(table));
        tracing::debug!(rules, "Rule table published");
    }
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new(RuleTable::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::Rule;

    fn table(code: u16, copies: usize) -> RuleTable {
        (0..copies)
            .map(|i| {
                let mut rule = Rule::new("GET", format!("/r{}", i));
                rule.response_code = code;
                rule
            })
            .collect()
    }

    #[test]
    fn snapshot_survives_publish() {
        let store = RuleStore::new(table(200, 2));
        let before = store.snapshot();

        store.publish(table(500, 3));
        let after = store.snapshot();

        assert_eq!(before.len(), 2);
        assert!(before.iter().all(|r| r.response_code == 200));
        assert_eq!(after.len(), 3);
        assert!(after.iter().all(|r| r.response_code == 500));
    }

    #[test]
    fn concurrent_readers_never_see_mixed_tables() {
        let store = Arc::new(RuleStore::new(table(200, 8)));
        let mut readers = Vec::new();

        for _ in 0..4 {
            let store = Arc::clone(&store);
            readers.push(std::thread::spawn(move || {
                for _ in 0..2_000 {
                    let snapshot = store.snapshot();
                    let first = snapshot.iter().next().map(|r| r.response_code);
                    assert!(snapshot.iter().all(|r| Some(r.response_code) == first));
                    let expected = if first == Some(200) { 8 } else { 16 };
                    assert_eq!(snapshot.len(), expected);
                }
            }));
        }

        for i in 0..500 {
            if i % 2 == 0 {
                store.publish(table(503, 16));
            } else {
                store.publish(table(200, 8));
            }
        }

        for reader in readers {
            reader.join().unwrap();
        }
    }
}
