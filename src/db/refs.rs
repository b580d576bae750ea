//! Message-id to thread index with reference counting.

use std::collections::HashMap;

use crate::mail::ThreadId;

#[derive(Debug, Clone, Copy)]
struct RefEntry {
    thread_id: ThreadId,
    count: u32,
}

/// Maps a normalized message id to the thread it belongs to.
///
/// The count is the number of live headers citing the id, either as their own
/// message id or in their reference chain. An entry disappears at zero.
#[derive(Debug, Default)]
pub(crate) struct ReferenceIndex {
    entries: HashMap<String, RefEntry>,
}

impl ReferenceIndex {
    pub fn lookup(&self, message_id: &str) -> Option<ThreadId> {
        self.entries.get(message_id).map(|e| e.thread_id)
    }

    /// Count one more citation. The entry follows the latest placement.
    pub fn add(&mut self, message_id: &str, thread_id: ThreadId) {
        match self.entries.get_mut(message_id) {
            Some(entry) => {
                entry.count += 1;
                entry.thread_id = thread_id;
            }
            None => {
                self.entries.insert(
                    message_id.to_string(),
                    RefEntry {
                        thread_id,
                        count: 1,
                    },
                );
            }
        }
    }

    /// Drop one citation; unknown ids are ignored.
    pub fn remove(&mut self, message_id: &str) {
        if let Some(entry) = self.entries.get_mut(message_id) {
            entry.count = entry.count.saturating_sub(1);
            if entry.count == 0 {
                self.entries.remove(message_id);
            }
        }
    }

    /// Point every entry for thread `from` at thread `to`.
    pub fn retarget(&mut self, from: ThreadId, to: ThreadId) {
        for entry in self.entries.values_mut() {
            if entry.thread_id == from {
                entry.thread_id = to;
            }
        }
    }

    pub fn count(&self, message_id: &str) -> u32 {
        self.entries.get(message_id).map_or(0, |e| e.count)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_removal() {
        let mut index = ReferenceIndex::default();
        index.add("a@x", 1);
        index.add("a@x", 1);
        assert_eq!(index.lookup("a@x"), Some(1));
        assert_eq!(index.count("a@x"), 2);

        index.remove("a@x");
        assert_eq!(index.count("a@x"), 1);
        index.remove("a@x");
        assert_eq!(index.lookup("a@x"), None);
        assert_eq!(index.len(), 0);

        // Never goes negative
        index.remove("a@x");
        assert_eq!(index.count("a@x"), 0);
    }

    #[test]
    fn test_entry_follows_latest_thread() {
        let mut index = ReferenceIndex::default();
        index.add("a@x", 1);
        index.add("a@x", 5);
        assert_eq!(index.lookup("a@x"), Some(5));
        assert_eq!(index.count("a@x"), 2);
    }

    #[test]
    fn test_retarget_moves_only_matching_entries() {
        let mut index = ReferenceIndex::default();
        index.add("a@x", 1);
        index.add("b@x", 1);
        index.add("c@x", 3);
        index.retarget(1, 2);
        assert_eq!(index.lookup("a@x"), Some(2));
        assert_eq!(index.lookup("b@x"), Some(2));
        assert_eq!(index.lookup("c@x"), Some(3));
        assert_eq!(index.count("a@x"), 1);
    }
}
