//! Thread placement.
//!
//! A new header joins a thread by, in order:
//! 1. the newest entry of its reference chain found in the reference index,
//! 2. its own message id (a duplicate, or a parent arriving after its replies),
//! 3. its normalized subject, when the threading policy allows it.
//!
//! Otherwise it starts a thread whose id is its own key.
//!
//! The indexes are not persisted. The first threading operation after open
//! rebuilds them with a full scan of the header table, which blocks the
//! owner for its duration.

use std::collections::HashMap;
use std::time::Instant;

use super::refs::ReferenceIndex;
use super::{Columns, Database};
use crate::constants::NONE_KEY;
use crate::error::{ParamError, Result, StoreError};
use crate::mail::{HdrData, MsgFlags, MsgHdr, MsgKey, MsgThread, ThreadId};
use crate::policy::ThreadingPolicy;
use crate::store::{RowId, RowStore, TableId};

/// In-memory indexes used to place headers into threads.
#[derive(Debug, Default)]
pub(crate) struct ThreadingState {
    refs: ReferenceIndex,
    msg_ids: HashMap<String, MsgKey>,
    /// Normalized subject to the thread that last used it.
    subjects: HashMap<String, ThreadId>,
}

/// The header's own id followed by its references, without duplicates.
fn cited_ids(data: &HdrData) -> Vec<&str> {
    let mut ids: Vec<&str> = Vec::with_capacity(data.references.len() + 1);
    let own = (!data.message_id.is_empty()).then_some(data.message_id.as_str());
    for id in own.into_iter().chain(data.references.iter().map(String::as_str)) {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

impl ThreadingState {
    fn register(
        &mut self,
        policy: &ThreadingPolicy,
        key: MsgKey,
        data: &HdrData,
        thread_id: ThreadId,
    ) {
        for id in cited_ids(data) {
            self.refs.add(id, thread_id);
        }
        if !data.message_id.is_empty() {
            self.msg_ids.entry(data.message_id.clone()).or_insert(key);
        }
        let (subject, _) = policy.normalize_subject(&data.subject);
        if !subject.is_empty() {
            self.subjects.insert(subject, thread_id);
        }
    }

    fn unregister(&mut self, key: MsgKey, data: &HdrData) {
        for id in cited_ids(data) {
            self.refs.remove(id);
        }
        if self.msg_ids.get(&data.message_id) == Some(&key) {
            self.msg_ids.remove(&data.message_id);
        }
    }

    pub fn key_for_message_id(&self, message_id: &str) -> Option<MsgKey> {
        self.msg_ids.get(message_id).copied()
    }
}

/// Read every thread row.
pub(super) fn load_threads(
    store: &RowStore,
    table: TableId,
    cols: &Columns,
) -> std::result::Result<HashMap<ThreadId, MsgThread>, StoreError> {
    let mut threads = HashMap::new();
    for row in store.cursor(table) {
        let id = row.oid as ThreadId;
        let keys: Vec<MsgKey> = store
            .get_string(row, cols.thread_keys)?
            .unwrap_or_default()
            .split_whitespace()
            .filter_map(|k| MsgKey::from_str_radix(k, 16).ok())
            .collect();

        let children = store.get_u32(row, cols.thread_children)?.unwrap_or(0);
        if children as usize != keys.len() {
            tracing::warn!(
                "Thread {} lists {} keys but records {} children",
                id,
                keys.len(),
                children
            );
        }

        let thread = MsgThread {
            id,
            root_key: store.get_u32(row, cols.thread_root)?.unwrap_or(id),
            keys,
            num_unread: store.get_u32(row, cols.thread_unread)?.unwrap_or(0),
            newest_date: store.get_u64(row, cols.thread_newest)?.unwrap_or(0) as i64,
            subject: store.get_string(row, cols.thread_subject)?.unwrap_or_default(),
        };
        threads.insert(id, thread);
    }
    Ok(threads)
}

impl Database {
    pub(super) fn ensure_threading_state(&mut self) -> Result<()> {
        if self.threading.is_none() {
            self.threading = Some(self.build_threading_state()?);
        }
        Ok(())
    }

    fn build_threading_state(&self) -> Result<ThreadingState> {
        let started = Instant::now();
        let keys = self.list_all_keys();
        let mut state = ThreadingState::default();
        for &key in &keys {
            if let Some(data) = self.peek_data(key)? {
                state.register(&self.policy, key, &data, data.thread_id);
            }
        }
        tracing::debug!(
            "Built threading index for {:?}: {} ids from {} headers in {:?}",
            self.path,
            state.refs.len(),
            keys.len(),
            started.elapsed()
        );
        Ok(state)
    }

    /// Pick the thread for `data`; returns the thread id and parent key.
    fn find_thread(
        &self,
        state: &ThreadingState,
        data: &HdrData,
        subject: &str,
        had_reply_prefix: bool,
    ) -> Option<(ThreadId, MsgKey)> {
        for reference in data.references.iter().rev() {
            if let Some(thread_id) = state.refs.lookup(reference)
                && let Some(thread) = self.threads.get(&thread_id)
            {
                let parent = state
                    .msg_ids
                    .get(reference)
                    .copied()
                    .filter(|&k| thread.contains(k))
                    .unwrap_or(thread.root_key);
                return Some((thread_id, parent));
            }
        }

        if !data.message_id.is_empty()
            && let Some(thread_id) = state.refs.lookup(&data.message_id)
            && let Some(thread) = self.threads.get(&thread_id)
        {
            // A duplicate hangs off the root; a missing parent becomes the root
            let parent = if state.msg_ids.contains_key(&data.message_id) {
                thread.root_key
            } else {
                NONE_KEY
            };
            return Some((thread_id, parent));
        }

        if self.policy.subject_threading_enabled()
            && (had_reply_prefix || self.policy.thread_without_re)
            && !subject.is_empty()
            && let Some(&thread_id) = state.subjects.get(subject)
            && let Some(thread) = self.threads.get(&thread_id)
        {
            return Some((thread_id, thread.root_key));
        }

        None
    }

    /// Place a freshly added header and record it in the indexes.
    pub(super) fn place_in_thread(&mut self, hdr: &MsgHdr) -> Result<ThreadId> {
        let mut state = self.threading.take().unwrap_or_default();
        let key = hdr.key();
        let data = hdr.data().clone();
        let (subject, had_reply_prefix) = self.policy.normalize_subject(&data.subject);

        let found = self.find_thread(&state, &data, &subject, had_reply_prefix);
        let takes_root = matches!(found, Some((_, NONE_KEY)));
        let (thread_id, parent) = match found {
            Some(found) => found,
            None => {
                self.threads
                    .entry(key)
                    .or_insert_with(|| MsgThread::new(key, data.subject.clone()));
                (key, NONE_KEY)
            }
        };

        if let Some(thread) = self.threads.get_mut(&thread_id) {
            thread.add_child(key, data.date, !data.flags.contains(MsgFlags::READ));
        }
        {
            let mut live = hdr.data_mut();
            live.thread_id = thread_id;
            live.thread_parent = parent;
        }
        self.store.set_u32(hdr.row(), self.columns.thread_id, thread_id)?;
        self.store
            .set_u32(hdr.row(), self.columns.thread_parent, parent)?;
        if takes_root {
            self.adopt_replies(thread_id, key, &data.message_id)?;
        }
        self.write_thread(thread_id)?;

        state.register(&self.policy, key, &data, thread_id);
        self.threading = Some(state);
        Ok(thread_id)
    }

    /// Make a parent that arrived after its replies the root of their thread.
    ///
    /// Members whose newest reference is the parent, and members without a
    /// parent of their own, move under it.
    fn adopt_replies(&mut self, thread_id: ThreadId, key: MsgKey, message_id: &str) -> Result<()> {
        let Some(thread) = self.threads.get_mut(&thread_id) else {
            return Ok(());
        };
        thread.root_key = key;
        thread.keys.retain(|&k| k != key);
        thread.keys.insert(0, key);
        let members = thread.keys.clone();

        for member in members.into_iter().skip(1) {
            let Some(data) = self.peek_data(member)? else {
                continue;
            };
            let cites_parent = data.references.last().is_some_and(|r| r == message_id);
            if cites_parent || data.thread_parent == NONE_KEY {
                self.set_thread_parent(member, key)?;
            }
        }
        tracing::debug!("Header {} took over as root of thread {}", key, thread_id);
        Ok(())
    }

    /// Move a thread whose first header is gone to the id of its current root,
    /// so a new header reusing that key starts a thread of its own.
    pub(super) fn free_thread_id(&mut self, old_id: ThreadId) -> Result<()> {
        let Some(mut thread) = self.threads.remove(&old_id) else {
            return Ok(());
        };
        let new_id = thread.root_key;
        if new_id == old_id || self.threads.contains_key(&new_id) {
            self.threads.insert(old_id, thread);
            return Err(ParamError::KeyExists(old_id).into());
        }

        thread.id = new_id;
        self.store.cut_row(self.thread_table, u64::from(old_id));
        for &member in &thread.keys {
            if let Some(hdr) = self.headers.lookup(member) {
                hdr.data_mut().thread_id = new_id;
            }
            self.store
                .set_u32(self.hdr_row(member), self.columns.thread_id, new_id)?;
        }
        self.threads.insert(new_id, thread);
        self.write_thread(new_id)?;

        if let Some(state) = self.threading.as_mut() {
            state.refs.retarget(old_id, new_id);
            for target in state.subjects.values_mut() {
                if *target == old_id {
                    *target = new_id;
                }
            }
        }
        tracing::debug!("Thread {} renumbered to {} for key reuse", old_id, new_id);
        Ok(())
    }

    /// Detach a header from its thread and drop its index citations.
    pub(super) fn remove_from_thread(&mut self, hdr: &MsgHdr) -> Result<()> {
        let key = hdr.key();
        let (thread_id, parent, unread) = {
            let data = hdr.data();
            if let Some(state) = self.threading.as_mut() {
                state.unregister(key, &data);
            }
            (
                data.thread_id,
                data.thread_parent,
                !data.flags.contains(MsgFlags::READ),
            )
        };

        let Some(thread) = self.threads.get_mut(&thread_id) else {
            return Ok(());
        };
        let was_root = thread.root_key == key;
        if !thread.remove_child(key, unread) {
            return Ok(());
        }

        if thread.keys.is_empty() {
            self.threads.remove(&thread_id);
            self.store.cut_row(self.thread_table, u64::from(thread_id));
            if let Some(state) = self.threading.as_mut() {
                state.subjects.retain(|_, t| *t != thread_id);
            }
            tracing::debug!("Thread {} is empty, removed", thread_id);
            return Ok(());
        }

        let new_root = thread.root_key;
        let members = thread.keys.clone();
        self.write_thread(thread_id)?;

        // Direct children move up to the removed header's parent
        for member in members {
            if member == new_root {
                if was_root || self.thread_parent_of(member)? == key {
                    self.set_thread_parent(member, NONE_KEY)?;
                }
            } else if self.thread_parent_of(member)? == key {
                let adopted = if parent == NONE_KEY { new_root } else { parent };
                self.set_thread_parent(member, adopted)?;
            }
        }
        Ok(())
    }

    pub(super) fn thread_read_changed(&mut self, hdr: &MsgHdr, read: bool) -> Result<()> {
        let thread_id = hdr.thread_id();
        if let Some(thread) = self.threads.get_mut(&thread_id) {
            thread.mark_child_read(read);
            self.write_thread(thread_id)?;
        }
        Ok(())
    }

    fn thread_parent_of(&self, key: MsgKey) -> Result<MsgKey> {
        if let Some(hdr) = self.headers.lookup(key) {
            return Ok(hdr.thread_parent());
        }
        Ok(self
            .store
            .get_u32(self.hdr_row(key), self.columns.thread_parent)?
            .unwrap_or(NONE_KEY))
    }

    fn set_thread_parent(&mut self, key: MsgKey, parent: MsgKey) -> Result<()> {
        if let Some(hdr) = self.headers.lookup(key) {
            hdr.data_mut().thread_parent = parent;
        }
        self.store
            .set_u32(self.hdr_row(key), self.columns.thread_parent, parent)?;
        Ok(())
    }

    fn write_thread(&mut self, thread_id: ThreadId) -> std::result::Result<(), StoreError> {
        let Some(thread) = self.threads.get(&thread_id) else {
            return Ok(());
        };
        let oid = u64::from(thread_id);
        let row = if self.store.contains(self.thread_table, oid) {
            RowId {
                scope: self.thread_table.scope,
                oid,
            }
        } else {
            self.store.new_row_with_oid(self.thread_table, oid)
        };

        let keys = thread
            .keys
            .iter()
            .map(|k| format!("{k:x}"))
            .collect::<Vec<_>>()
            .join(" ");
        let cols = &self.columns;
        self.store
            .set_u32(row, cols.thread_children, thread.num_children())?;
        self.store.set_u32(row, cols.thread_unread, thread.num_unread)?;
        self.store.set_string(row, cols.thread_subject, &thread.subject)?;
        self.store.set_u32(row, cols.thread_root, thread.root_key)?;
        self.store
            .set_u64(row, cols.thread_newest, thread.newest_date as u64)?;
        self.store.set_string(row, cols.thread_keys, &keys)?;
        Ok(())
    }

    //
    // Lookups
    //

    pub fn thread(&self, thread_id: ThreadId) -> Option<&MsgThread> {
        self.threads.get(&thread_id)
    }

    pub fn thread_for_msg_key(&self, key: MsgKey) -> Result<Option<&MsgThread>> {
        self.ensure_open()?;
        let thread_id = match self.headers.lookup(key) {
            Some(hdr) => hdr.thread_id(),
            None => {
                if !self.contains_key(key) {
                    return Ok(None);
                }
                self.store
                    .get_u32(self.hdr_row(key), self.columns.thread_id)?
                    .unwrap_or(NONE_KEY)
            }
        };
        Ok(self.threads.get(&thread_id))
    }

    /// All threads, newest activity first.
    pub fn threads(&self) -> Vec<&MsgThread> {
        let mut threads: Vec<&MsgThread> = self.threads.values().collect();
        threads.sort_by(|a, b| b.newest_date.cmp(&a.newest_date).then(a.id.cmp(&b.id)));
        threads
    }

    pub fn num_threads(&self) -> usize {
        self.threads.len()
    }

    /// Headers of a thread, root first, then in the order they joined.
    pub fn thread_headers(&mut self, thread_id: ThreadId) -> Result<Vec<MsgHdr>> {
        self.ensure_open()?;
        let keys = self
            .threads
            .get(&thread_id)
            .map(|t| t.keys.clone())
            .unwrap_or_default();
        let mut headers = Vec::with_capacity(keys.len());
        for key in keys {
            let result = self.load_header(key, false);
            if let Some(hdr) = self.check(result)? {
                headers.push(hdr);
            }
        }
        Ok(headers)
    }

    /// Number of live headers citing `message_id`, counting its own header.
    pub fn reference_count(&mut self, message_id: &str) -> Result<u32> {
        self.ensure_open()?;
        let result = self.ensure_threading_state();
        self.check(result)?;
        Ok(self
            .threading
            .as_ref()
            .map_or(0, |state| state.refs.count(message_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::OpenOptions;
    use crate::mail::NewHeader;

    fn msg(key: MsgKey, id: &str, refs: &[&str], subject: &str) -> NewHeader {
        NewHeader {
            key: Some(key),
            subject: subject.to_string(),
            message_id: id.to_string(),
            references: refs.iter().map(|r| r.to_string()).collect(),
            date: 1_700_000_000 + i64::from(key) * 60,
            ..Default::default()
        }
    }

    async fn db_with_policy(policy: ThreadingPolicy) -> Database {
        let options = OpenOptions {
            threading: policy,
            ..Default::default()
        };
        Database::open_in_memory(options).await.unwrap()
    }

    async fn test_db() -> Database {
        db_with_policy(ThreadingPolicy::default()).await
    }

    fn parent_of(db: &mut Database, key: MsgKey) -> MsgKey {
        db.get_header_for_key(key).unwrap().unwrap().thread_parent()
    }

    #[tokio::test]
    async fn test_reference_chain_forms_one_thread() {
        let mut db = test_db().await;
        let a = db.add_header(msg(1, "a@x", &[], "Plans")).unwrap();
        let b = db.add_header(msg(2, "b@x", &["a@x"], "Re: Plans")).unwrap();
        let c = db
            .add_header(msg(3, "c@x", &["a@x", "b@x"], "Re: Plans"))
            .unwrap();

        assert_eq!(a.thread_id(), 1);
        assert_eq!(b.thread_id(), 1);
        assert_eq!(c.thread_id(), 1);
        assert_eq!(a.thread_parent(), NONE_KEY);
        assert_eq!(b.thread_parent(), 1);
        assert_eq!(c.thread_parent(), 2);

        let thread = db.thread_for_msg_key(3).unwrap().unwrap();
        assert_eq!(thread.num_children(), 3);
        assert_eq!(thread.keys, vec![1, 2, 3]);
        assert_eq!(thread.num_unread, 3);
        assert_eq!(thread.newest_date, c.date());
        assert_eq!(db.num_threads(), 1);

        let members: Vec<MsgKey> = db
            .thread_headers(1)
            .unwrap()
            .iter()
            .map(MsgHdr::key)
            .collect();
        assert_eq!(members, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_reference_counts_include_own_header() {
        let mut db = test_db().await;
        db.add_header(msg(1, "a@x", &[], "Plans")).unwrap();
        db.add_header(msg(2, "b@x", &["a@x"], "Re: Plans")).unwrap();
        db.add_header(msg(3, "c@x", &["a@x", "b@x"], "Re: Plans"))
            .unwrap();

        assert_eq!(db.reference_count("a@x").unwrap(), 3);
        assert_eq!(db.reference_count("b@x").unwrap(), 2);
        assert_eq!(db.reference_count("c@x").unwrap(), 1);
        assert_eq!(db.reference_count("nobody@x").unwrap(), 0);

        db.delete_messages(&[3], None).unwrap();
        assert_eq!(db.reference_count("a@x").unwrap(), 2);
        db.delete_messages(&[1, 2], None).unwrap();
        assert_eq!(db.reference_count("a@x").unwrap(), 0);
        assert_eq!(db.num_threads(), 0);
    }

    #[tokio::test]
    async fn test_subject_threading_needs_reply_prefix() {
        let mut db = test_db().await;
        db.add_header(msg(1, "a@x", &[], "Lunch")).unwrap();
        let reply = db.add_header(msg(2, "b@x", &[], "RE: Lunch")).unwrap();
        let repeat = db.add_header(msg(3, "c@x", &[], "Lunch")).unwrap();

        assert_eq!(reply.thread_id(), 1);
        assert_eq!(reply.thread_parent(), 1);
        assert_eq!(repeat.thread_id(), 3);
        assert_eq!(db.num_threads(), 2);
    }

    #[tokio::test]
    async fn test_subject_threading_without_prefix() {
        let policy = ThreadingPolicy {
            thread_without_re: true,
            ..Default::default()
        };
        let mut db = db_with_policy(policy).await;
        db.add_header(msg(1, "a@x", &[], "Lunch")).unwrap();
        let repeat = db.add_header(msg(2, "b@x", &[], "lunch ")).unwrap();
        assert_eq!(repeat.thread_id(), 1);
    }

    #[tokio::test]
    async fn test_strict_threading_ignores_subjects() {
        let policy = ThreadingPolicy {
            strict: true,
            ..Default::default()
        };
        let mut db = db_with_policy(policy).await;
        db.add_header(msg(1, "a@x", &[], "Lunch")).unwrap();
        let reply = db.add_header(msg(2, "b@x", &[], "Re: Lunch")).unwrap();
        assert_eq!(reply.thread_id(), 2);

        // References still thread
        let cited = db.add_header(msg(3, "c@x", &["a@x"], "Other")).unwrap();
        assert_eq!(cited.thread_id(), 1);
    }

    #[tokio::test]
    async fn test_parent_arriving_after_replies_becomes_root() {
        let mut db = test_db().await;
        let reply = db.add_header(msg(5, "b@x", &["a@x"], "Re: Plans")).unwrap();
        let nested = db
            .add_header(msg(6, "c@x", &["a@x", "b@x"], "Re: Plans"))
            .unwrap();
        assert_eq!(reply.thread_id(), 5);
        assert_eq!(nested.thread_parent(), 5);

        let parent = db.add_header(msg(7, "a@x", &[], "Plans")).unwrap();
        assert_eq!(parent.thread_id(), 5);
        assert_eq!(parent.thread_parent(), NONE_KEY);
        assert_eq!(reply.thread_parent(), 7);
        assert_eq!(nested.thread_parent(), 5);
        let thread = db.thread(5).unwrap();
        assert_eq!(thread.root_key, 7);
        assert_eq!(thread.keys, vec![7, 5, 6]);

        // A second copy of the parent hangs off the root instead
        let duplicate = db.add_header(msg(8, "a@x", &[], "Plans")).unwrap();
        assert_eq!(duplicate.thread_id(), 5);
        assert_eq!(duplicate.thread_parent(), 7);
        assert_eq!(db.thread(5).unwrap().root_key, 7);
        assert_eq!(db.thread(5).unwrap().num_children(), 4);

        // The first header with an id keeps the id lookup
        let found = db.get_msg_hdr_for_message_id("a@x").unwrap().unwrap();
        assert_eq!(found.key(), 7);
    }

    #[tokio::test]
    async fn test_reused_key_starts_its_own_thread() {
        let mut db = test_db().await;
        db.add_header(msg(1, "a@x", &[], "Plans")).unwrap();
        let reply = db.add_header(msg(2, "b@x", &["a@x"], "Re: Plans")).unwrap();
        db.delete_messages(&[1], None).unwrap();
        assert_eq!(reply.thread_id(), 1);

        let unrelated = db.add_header(msg(1, "z@x", &[], "Unrelated")).unwrap();
        assert_eq!(unrelated.thread_id(), 1);
        assert_eq!(db.thread(1).unwrap().keys, vec![1]);
        assert_eq!(db.num_threads(), 2);

        // The surviving conversation now goes by its root's key
        assert_eq!(reply.thread_id(), 2);
        let survivor = db.thread(2).unwrap();
        assert_eq!(survivor.keys, vec![2]);
        assert_eq!(survivor.root_key, 2);

        let late = db
            .add_header(msg(3, "c@x", &["a@x", "b@x"], "Re: Plans"))
            .unwrap();
        assert_eq!(late.thread_id(), 2);
        assert_eq!(late.thread_parent(), 2);
        let subject_only = db.add_header(msg(4, "d@x", &[], "Re: Plans")).unwrap();
        assert_eq!(subject_only.thread_id(), 2);
    }

    #[tokio::test]
    async fn test_removing_root_promotes_and_reparents() {
        let mut db = test_db().await;
        db.add_header(msg(1, "a@x", &[], "Plans")).unwrap();
        db.add_header(msg(2, "b@x", &["a@x"], "Re: Plans")).unwrap();
        db.add_header(msg(3, "c@x", &["a@x", "b@x"], "Re: Plans"))
            .unwrap();
        db.add_header(msg(4, "d@x", &["a@x"], "Re: Plans")).unwrap();

        db.delete_messages(&[1], None).unwrap();

        let thread = db.thread(1).unwrap();
        assert_eq!(thread.root_key, 2);
        assert_eq!(thread.keys, vec![2, 3, 4]);
        assert_eq!(parent_of(&mut db, 2), NONE_KEY);
        assert_eq!(parent_of(&mut db, 3), 2);
        assert_eq!(parent_of(&mut db, 4), 2);
    }

    #[tokio::test]
    async fn test_removing_inner_header_moves_children_up() {
        let mut db = test_db().await;
        db.add_header(msg(1, "a@x", &[], "Plans")).unwrap();
        db.add_header(msg(2, "b@x", &["a@x"], "Re: Plans")).unwrap();
        db.add_header(msg(3, "c@x", &["a@x", "b@x"], "Re: Plans"))
            .unwrap();

        db.delete_messages(&[2], None).unwrap();
        assert_eq!(parent_of(&mut db, 3), 1);
        assert_eq!(db.thread(1).unwrap().root_key, 1);
    }

    #[tokio::test]
    async fn test_thread_unread_counts_follow_read_state() {
        let mut db = test_db().await;
        db.add_header(msg(1, "a@x", &[], "Plans")).unwrap();
        db.add_header(msg(2, "b@x", &["a@x"], "Re: Plans")).unwrap();

        db.mark_read(2, true, None).unwrap();
        assert_eq!(db.thread(1).unwrap().num_unread, 1);
        db.mark_all_read(None).unwrap();
        assert!(!db.thread(1).unwrap().has_unread());
        db.mark_read(1, false, None).unwrap();
        assert_eq!(db.thread(1).unwrap().num_unread, 1);
    }

    #[tokio::test]
    async fn test_threads_newest_first() {
        let mut db = test_db().await;
        db.add_header(msg(1, "a@x", &[], "First")).unwrap();
        db.add_header(msg(2, "b@x", &[], "Second")).unwrap();
        db.add_header(msg(3, "c@x", &["a@x"], "Re: First")).unwrap();

        let order: Vec<ThreadId> = db.threads().iter().map(|t| t.id).collect();
        assert_eq!(order, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_index_rebuilt_after_clearing_caches() {
        let mut db = test_db().await;
        db.add_header(msg(1, "a@x", &[], "Plans")).unwrap();
        db.add_header(msg(2, "b@x", &["a@x"], "Re: Plans")).unwrap();

        db.clear_caches();
        assert!(db.threading.is_none());

        let late = db.add_header(msg(3, "c@x", &["b@x"], "Re: Plans")).unwrap();
        assert_eq!(late.thread_id(), 1);
        assert_eq!(late.thread_parent(), 2);
        assert_eq!(db.reference_count("a@x").unwrap(), 2);
    }
}
