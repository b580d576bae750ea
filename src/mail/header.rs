//! Message header objects.
//!
//! A `MsgHdr` is a shared handle: every clone points at the same object, and the
//! database hands out at most one live object per key. Callers may compare
//! handles with [`MsgHdr::ptr_eq`] to reconcile listener notifications.

use chrono::{DateTime, Utc};
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use super::flags::{MsgFlags, Priority};
use crate::constants::{NONE_KEY, PSEUDO_KEY_FLOOR};
use crate::store::RowId;

/// Store-scoped message key.
pub type MsgKey = u32;

/// Whether `key` was handed out by `next_pseudo_msg_key` rather than the store.
pub fn is_pseudo_key(key: MsgKey) -> bool {
    key >= PSEUDO_KEY_FLOOR && key != NONE_KEY
}

/// Persisted metadata of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HdrData {
    pub flags: MsgFlags,
    pub subject: String,
    pub author: String,
    pub recipients: String,
    pub cc_list: String,
    pub bcc_list: String,
    /// Normalized (no angle brackets).
    pub message_id: String,
    /// Oldest first, normalized.
    pub references: Vec<String>,
    /// Unix timestamp in seconds.
    pub date: i64,
    pub size: u32,
    pub charset: String,
    pub thread_id: MsgKey,
    pub thread_parent: MsgKey,
    pub priority: Priority,
    pub label: u32,
    pub status_offset: u32,
    pub num_lines: u32,
    pub offline_offset: u64,
    pub offline_size: u32,
}

impl Default for HdrData {
    fn default() -> Self {
        Self {
            flags: MsgFlags::empty(),
            subject: String::new(),
            author: String::new(),
            recipients: String::new(),
            cc_list: String::new(),
            bcc_list: String::new(),
            message_id: String::new(),
            references: Vec::new(),
            date: 0,
            size: 0,
            charset: String::new(),
            thread_id: NONE_KEY,
            thread_parent: NONE_KEY,
            priority: Priority::NotSet,
            label: 0,
            status_offset: 0,
            num_lines: 0,
            offline_offset: 0,
            offline_size: 0,
        }
    }
}

/// A header to be added to the database.
///
/// Leave `key` empty to let the database allocate the next key.
#[derive(Debug, Clone, Default)]
pub struct NewHeader {
    pub key: Option<MsgKey>,
    pub flags: MsgFlags,
    pub subject: String,
    pub author: String,
    pub recipients: String,
    pub cc_list: String,
    pub bcc_list: String,
    pub message_id: String,
    pub references: Vec<String>,
    pub date: i64,
    pub size: u32,
    pub charset: String,
    pub priority: Priority,
    pub label: u32,
    pub status_offset: u32,
    pub num_lines: u32,
    pub offline_offset: u64,
    pub offline_size: u32,
}

impl NewHeader {
    pub(crate) fn into_data(self) -> HdrData {
        HdrData {
            flags: self.flags,
            subject: self.subject,
            author: self.author,
            recipients: self.recipients,
            cc_list: self.cc_list,
            bcc_list: self.bcc_list,
            message_id: super::normalize_message_id(&self.message_id),
            references: self
                .references
                .iter()
                .map(|r| super::normalize_message_id(r))
                .filter(|r| !r.is_empty())
                .collect(),
            date: self.date,
            size: self.size,
            charset: self.charset,
            thread_id: NONE_KEY,
            thread_parent: NONE_KEY,
            priority: self.priority,
            label: self.label,
            status_offset: self.status_offset,
            num_lines: self.num_lines,
            offline_offset: self.offline_offset,
            offline_size: self.offline_size,
        }
    }
}

/// Identity index of live header objects; holds no strong references.
pub(crate) type UseCache = RefCell<HashMap<MsgKey, Weak<HdrInner>>>;

pub(crate) struct HdrInner {
    key: MsgKey,
    row: RowId,
    data: RefCell<HdrData>,
    removed: Cell<bool>,
    use_cache: Weak<UseCache>,
}

impl Drop for HdrInner {
    fn drop(&mut self) {
        // Only drop the entry if it still refers to this (now dead) object
        if let Some(cache) = self.use_cache.upgrade()
            && let Ok(mut map) = cache.try_borrow_mut()
            && map.get(&self.key).is_some_and(|w| w.strong_count() == 0)
        {
            map.remove(&self.key);
        }
    }
}

#[derive(Clone)]
pub struct MsgHdr(Rc<HdrInner>);

impl MsgHdr {
    pub(crate) fn new(key: MsgKey, row: RowId, data: HdrData, use_cache: &Rc<UseCache>) -> Self {
        Self(Rc::new(HdrInner {
            key,
            row,
            data: RefCell::new(data),
            removed: Cell::new(false),
            use_cache: Rc::downgrade(use_cache),
        }))
    }

    pub(crate) fn from_inner(inner: Rc<HdrInner>) -> Self {
        Self(inner)
    }

    pub(crate) fn downgrade(&self) -> Weak<HdrInner> {
        Rc::downgrade(&self.0)
    }

    /// True when both handles refer to the same header object.
    pub fn ptr_eq(a: &MsgHdr, b: &MsgHdr) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }

    pub fn key(&self) -> MsgKey {
        self.0.key
    }

    pub(crate) fn row(&self) -> RowId {
        self.0.row
    }

    /// Set once the message has been deleted from the database.
    pub fn is_removed(&self) -> bool {
        self.0.removed.get()
    }

    pub(crate) fn mark_removed(&self) {
        self.0.removed.set(true);
    }

    /// Borrow all header fields.
    pub fn data(&self) -> Ref<'_, HdrData> {
        self.0.data.borrow()
    }

    pub(crate) fn data_mut(&self) -> RefMut<'_, HdrData> {
        self.0.data.borrow_mut()
    }

    pub fn flags(&self) -> MsgFlags {
        self.data().flags
    }

    pub fn is_read(&self) -> bool {
        self.flags().contains(MsgFlags::READ)
    }

    pub fn is_flagged(&self) -> bool {
        self.flags().contains(MsgFlags::MARKED)
    }

    pub fn subject(&self) -> String {
        self.data().subject.clone()
    }

    pub fn author(&self) -> String {
        self.data().author.clone()
    }

    pub fn message_id(&self) -> String {
        self.data().message_id.clone()
    }

    pub fn references(&self) -> Vec<String> {
        self.data().references.clone()
    }

    pub fn date(&self) -> i64 {
        self.data().date
    }

    pub fn date_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.date(), 0)
    }

    pub fn size(&self) -> u32 {
        self.data().size
    }

    pub fn thread_id(&self) -> MsgKey {
        self.data().thread_id
    }

    pub fn thread_parent(&self) -> MsgKey {
        self.data().thread_parent
    }
}

impl PartialEq for MsgHdr {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl Eq for MsgHdr {}

impl fmt::Debug for MsgHdr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data();
        f.debug_struct("MsgHdr")
            .field("key", &self.key())
            .field("subject", &data.subject)
            .field("flags", &data.flags)
            .field("thread_id", &data.thread_id)
            .finish()
    }
}
