use chrono::{DateTime, Utc};

use super::header::MsgKey;

pub type ThreadId = MsgKey;

/// A conversation: an ordered set of member keys plus summary counters.
///
/// The thread id is the key of the header that started the thread and stays
/// stable even if that header is later removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgThread {
    pub id: ThreadId,
    pub root_key: MsgKey,
    /// Member keys in the order they joined; the root is first.
    pub keys: Vec<MsgKey>,
    pub num_unread: u32,
    /// Newest member date (Unix seconds). Never decreases.
    pub newest_date: i64,
    pub subject: String,
}

impl MsgThread {
    pub fn new(id: ThreadId, subject: String) -> Self {
        Self {
            id,
            root_key: id,
            keys: Vec::new(),
            num_unread: 0,
            newest_date: 0,
            subject,
        }
    }

    pub fn num_children(&self) -> u32 {
        self.keys.len() as u32
    }

    pub fn has_unread(&self) -> bool {
        self.num_unread > 0
    }

    pub fn contains(&self, key: MsgKey) -> bool {
        self.keys.contains(&key)
    }

    pub fn newest_date_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.newest_date, 0)
    }

    /// Add a member; returns false if it was already present.
    pub(crate) fn add_child(&mut self, key: MsgKey, date: i64, unread: bool) -> bool {
        if self.contains(key) {
            return false;
        }
        self.keys.push(key);
        if unread {
            self.num_unread += 1;
        }
        self.newest_date = self.newest_date.max(date);
        true
    }

    /// Remove a member; returns false if it wasn't present.
    pub(crate) fn remove_child(&mut self, key: MsgKey, unread: bool) -> bool {
        let Some(pos) = self.keys.iter().position(|&k| k == key) else {
            return false;
        };
        self.keys.remove(pos);
        if unread {
            self.num_unread = self.num_unread.saturating_sub(1);
        }
        if self.root_key == key
            && let Some(&first) = self.keys.first()
        {
            self.root_key = first;
        }
        true
    }

    pub(crate) fn mark_child_read(&mut self, read: bool) {
        if read {
            self.num_unread = self.num_unread.saturating_sub(1);
        } else {
            self.num_unread += 1;
        }
    }
}
