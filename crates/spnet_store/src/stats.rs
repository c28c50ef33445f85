//! Store statistics.
//!
//! Counters are atomic and can be read while operations are in progress.
//!
//! ```rust
//! use spnet_store::{DocumentStore, Filter, InMemoryStore};
//! use spnet_value::doc;
//!
//! let store = InMemoryStore::new();
//! store.insert("topic", doc! { "_id" => "cosmology" }).unwrap();
//! store.find_one("topic", &Filter::by_id("cosmology"), None).unwrap();
//!
//! let stats = store.stats().snapshot();
//! assert_eq!(stats.writes, 1);
//! assert_eq!(stats.index_lookups, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Store statistics.
#[derive(Debug, Default)]
pub struct StoreStats {
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
    scans: AtomicU64,
    index_lookups: AtomicU64,
    duplicate_rejections: AtomicU64,
    bytes_logged: AtomicU64,
}

impl StoreStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_scan(&self) {
        self.scans.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_index_lookup(&self) {
        self.index_lookups.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_duplicate(&self) {
        self.duplicate_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_logged(&self, bytes: u64) {
        self.bytes_logged.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Total number of read calls.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Total number of writes that changed a record.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Total number of deleted records.
    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    /// Total number of full collection scans.
    ///
    /// High scan counts mean most lookups are not by primary key.
    pub fn scans(&self) -> u64 {
        self.scans.load(Ordering::Relaxed)
    }

    /// Total number of primary-key lookups.
    pub fn index_lookups(&self) -> u64 {
        self.index_lookups.load(Ordering::Relaxed)
    }

    /// Total number of writes rejected by a unique index.
    pub fn duplicate_rejections(&self) -> u64 {
        self.duplicate_rejections.load(Ordering::Relaxed)
    }

    /// Total bytes appended to an operation log.
    pub fn bytes_logged(&self) -> u64 {
        self.bytes_logged.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            reads: self.reads(),
            writes: self.writes(),
            deletes: self.deletes(),
            scans: self.scans(),
            index_lookups: self.index_lookups(),
            duplicate_rejections: self.duplicate_rejections(),
            bytes_logged: self.bytes_logged(),
        }
    }
}

/// A point-in-time copy of [`StoreStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Total number of read calls.
    pub reads: u64,
    /// Total number of writes that changed a record.
    pub writes: u64,
    /// Total number of deleted records.
    pub deletes: u64,
    /// Total number of full collection scans.
    pub scans: u64,
    /// Total number of primary-key lookups.
    pub index_lookups: u64,
    /// Total number of writes rejected by a unique index.
    pub duplicate_rejections: u64,
    /// Total bytes appended to an operation log.
    pub bytes_logged: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = StoreStats::new();
        stats.record_read();
        stats.record_read();
        stats.record_write();
        stats.record_duplicate();
        stats.record_logged(40);
        stats.record_logged(2);

        let snap = stats.snapshot();
        assert_eq!(snap.reads, 2);
        assert_eq!(snap.writes, 1);
        assert_eq!(snap.duplicate_rejections, 1);
        assert_eq!(snap.bytes_logged, 42);
        assert_eq!(snap.deletes, 0);
    }

    #[test]
    fn stats_are_shared_across_threads() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(StoreStats::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..100 {
                        stats.record_scan();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stats.scans(), 400);
    }
}
