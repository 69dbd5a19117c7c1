//! In-memory store for results waiting to be viewed.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::models::ProcessingResult;

/// How long an unviewed result is kept.
pub const DEFAULT_RESULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Most unviewed results held at once.
pub const DEFAULT_RESULT_CAPACITY: usize = 200;

/// A result held for display along with the uploaded filename.
pub struct StoredResult {
    pub filename: String,
    pub result: ProcessingResult,
}

struct Entry {
    stored: StoredResult,
    stored_at: Instant,
    seq: u64,
}

/// One-shot result store with expiry and a size cap.
///
/// Entries older than the TTL are dropped on every insert and never
/// returned. When full, the oldest entry is evicted.
pub struct ResultStore {
    entries: HashMap<String, Entry>,
    ttl: Duration,
    capacity: usize,
    next_seq: u64,
}

impl ResultStore {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            capacity: capacity.max(1),
            next_seq: 0,
        }
    }

    /// Store a result and return its id.
    pub fn insert(&mut self, filename: String, result: ProcessingResult) -> String {
        self.sweep_expired();
        while self.entries.len() >= self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.seq)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    tracing::debug!("Result store full, evicting {}", id);
                    self.entries.remove(&id);
                }
                None => break,
            }
        }

        let id = uuid::Uuid::new_v4().to_string();
        self.entries.insert(
            id.clone(),
            Entry {
                stored: StoredResult { filename, result },
                stored_at: Instant::now(),
                seq: self.next_seq,
            },
        );
        self.next_seq += 1;
        id
    }

    /// Remove and return a result. Expired entries count as missing.
    pub fn take(&mut self, id: &str) -> Option<StoredResult> {
        let entry = self.entries.remove(id)?;
        if entry.stored_at.elapsed() >= self.ttl {
            return None;
        }
        Some(entry.stored)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn sweep_expired(&mut self) {
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);
    }
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new(DEFAULT_RESULT_TTL, DEFAULT_RESULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str) -> ProcessingResult {
        ProcessingResult::failed(name.to_string())
    }

    #[test]
    fn test_take_is_one_shot() {
        let mut store = ResultStore::default();
        let id = store.insert("id.pdf".to_string(), result("boom"));
        assert_eq!(store.len(), 1);

        let stored = store.take(&id).unwrap();
        assert_eq!(stored.filename, "id.pdf");
        assert!(store.take(&id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_full_store_evicts_oldest() {
        let mut store = ResultStore::new(DEFAULT_RESULT_TTL, 2);
        let first = store.insert("a.pdf".to_string(), result("a"));
        let second = store.insert("b.pdf".to_string(), result("b"));
        let third = store.insert("c.pdf".to_string(), result("c"));

        assert_eq!(store.len(), 2);
        assert!(store.take(&first).is_none());
        assert_eq!(store.take(&second).unwrap().filename, "b.pdf");
        assert_eq!(store.take(&third).unwrap().filename, "c.pdf");
    }

    #[test]
    fn test_expired_results_are_dropped() {
        let mut store = ResultStore::new(Duration::ZERO, 10);
        let id = store.insert("a.pdf".to_string(), result("a"));
        assert!(store.take(&id).is_none());

        store.insert("b.pdf".to_string(), result("b"));
        store.insert("c.pdf".to_string(), result("c"));
        // Each insert sweeps everything stored before it.
        assert_eq!(store.len(), 1);
    }
}
