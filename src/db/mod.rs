//! Per-folder message database.
//!
//! This module is split into:
//! - `mod.rs` - Database struct, column tokens, lifecycle state, simple getters
//! - `open.rs` - Open options, open/commit/close and error mapping
//! - `headers.rs` - Header rows: add, lookup, flags, properties, deletion
//! - `threading.rs` - Thread placement, removal and the lazily built indexes
//! - `folder_info.rs` - Summary counters persisted in the folder info row
//! - `purge.rs` - Retention: purge by age or count, offline body cleanup
//! - `hdr_cache.rs` - Two-tier header object cache
//! - `refs.rs` - Reference index
//!
//! A database has a single owner. Every call runs to completion on the
//! owner's thread; only opening, committing and closing suspend.

mod folder_info;
mod hdr_cache;
mod headers;
mod open;
mod purge;
mod refs;
mod threading;

pub use folder_info::FolderInfo;
pub use open::OpenOptions;
pub use purge::PurgeReport;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::constants::*;
use crate::error::{DbError, Result};
use crate::folder::Folder;
use crate::listener::{Announcer, ChangeListener};
use crate::mail::{MsgKey, MsgThread, ThreadId};
use crate::policy::{DownloadSettings, RetentionSettings, ThreadingPolicy};
use crate::store::{RowId, RowStore, TableId, Token};
use crate::telemetry::UsageSink;
use hdr_cache::HeaderCache;
use threading::ThreadingState;

/// Resolved store tokens for every column the database reads or writes.
pub(crate) struct Columns {
    pub subject: Token,
    pub sender: Token,
    pub recipients: Token,
    pub cc_list: Token,
    pub bcc_list: Token,
    pub message_id: Token,
    pub references: Token,
    pub date: Token,
    pub size: Token,
    pub flags: Token,
    pub priority: Token,
    pub label: Token,
    pub status_offset: Token,
    pub num_lines: Token,
    pub charset: Token,
    pub thread_id: Token,
    pub thread_parent: Token,
    pub offline_offset: Token,
    pub offline_size: Token,

    pub thread_children: Token,
    pub thread_unread: Token,
    pub thread_subject: Token,
    pub thread_root: Token,
    pub thread_newest: Token,
    pub thread_keys: Token,

    pub info_version: Token,
    pub info_num_messages: Token,
    pub info_num_unread: Token,
    pub info_expunged_bytes: Token,
    pub info_summary_valid: Token,
    pub info_high_water: Token,
    pub info_folder_size: Token,
    pub info_folder_date: Token,
}

/// Header columns backed by fields of `HdrData`.
const HEADER_COLUMNS: &[&str] = &[
    SUBJECT_COLUMN,
    SENDER_COLUMN,
    RECIPIENTS_COLUMN,
    CC_LIST_COLUMN,
    BCC_LIST_COLUMN,
    MESSAGE_ID_COLUMN,
    REFERENCES_COLUMN,
    DATE_COLUMN,
    MESSAGE_SIZE_COLUMN,
    FLAGS_COLUMN,
    PRIORITY_COLUMN,
    LABEL_COLUMN,
    STATUS_OFFSET_COLUMN,
    NUM_LINES_COLUMN,
    CHARSET_COLUMN,
    MSG_THREAD_ID_COLUMN,
    THREAD_PARENT_COLUMN,
    OFFLINE_MSG_OFFSET_COLUMN,
    OFFLINE_MSG_SIZE_COLUMN,
];

/// Header columns that feed the reference index, thread membership or the
/// unread counters. The generic property setters refuse them.
const INDEXED_COLUMNS: &[&str] = &[
    MESSAGE_ID_COLUMN,
    REFERENCES_COLUMN,
    FLAGS_COLUMN,
    MSG_THREAD_ID_COLUMN,
    THREAD_PARENT_COLUMN,
];

impl Columns {
    fn resolve(store: &mut RowStore) -> Self {
        Self {
            subject: store.token(SUBJECT_COLUMN),
            sender: store.token(SENDER_COLUMN),
            recipients: store.token(RECIPIENTS_COLUMN),
            cc_list: store.token(CC_LIST_COLUMN),
            bcc_list: store.token(BCC_LIST_COLUMN),
            message_id: store.token(MESSAGE_ID_COLUMN),
            references: store.token(REFERENCES_COLUMN),
            date: store.token(DATE_COLUMN),
            size: store.token(MESSAGE_SIZE_COLUMN),
            flags: store.token(FLAGS_COLUMN),
            priority: store.token(PRIORITY_COLUMN),
            label: store.token(LABEL_COLUMN),
            status_offset: store.token(STATUS_OFFSET_COLUMN),
            num_lines: store.token(NUM_LINES_COLUMN),
            charset: store.token(CHARSET_COLUMN),
            thread_id: store.token(MSG_THREAD_ID_COLUMN),
            thread_parent: store.token(THREAD_PARENT_COLUMN),
            offline_offset: store.token(OFFLINE_MSG_OFFSET_COLUMN),
            offline_size: store.token(OFFLINE_MSG_SIZE_COLUMN),

            thread_children: store.token(THREAD_CHILDREN_COLUMN),
            thread_unread: store.token(THREAD_UNREAD_CHILDREN_COLUMN),
            thread_subject: store.token(THREAD_SUBJECT_COLUMN),
            thread_root: store.token(THREAD_ROOT_KEY_COLUMN),
            thread_newest: store.token(THREAD_NEWEST_DATE_COLUMN),
            thread_keys: store.token(THREAD_KEYS_COLUMN),

            info_version: store.token(INFO_VERSION_COLUMN),
            info_num_messages: store.token(INFO_NUM_MESSAGES_COLUMN),
            info_num_unread: store.token(INFO_NUM_UNREAD_COLUMN),
            info_expunged_bytes: store.token(INFO_EXPUNGED_BYTES_COLUMN),
            info_summary_valid: store.token(INFO_SUMMARY_VALID_COLUMN),
            info_high_water: store.token(INFO_HIGH_WATER_COLUMN),
            info_folder_size: store.token(INFO_FOLDER_SIZE_COLUMN),
            info_folder_date: store.token(INFO_FOLDER_DATE_COLUMN),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DbState {
    Open,
    /// Closed after a store failure; only `close` is still allowed.
    Failed,
}

/// An open folder database.
pub struct Database {
    path: Option<PathBuf>,
    store: RowStore,
    columns: Columns,
    hdr_table: TableId,
    thread_table: TableId,
    info_table: TableId,
    info_row: RowId,
    folder_info: FolderInfo,
    headers: HeaderCache,
    threads: HashMap<ThreadId, MsgThread>,
    /// Built on first use by a full header scan.
    threading: Option<ThreadingState>,
    policy: ThreadingPolicy,
    announcer: Announcer,
    folder: Option<Rc<dyn Folder>>,
    retention: RetentionSettings,
    download: DownloadSettings,
    usage: Option<Rc<dyn UsageSink>>,
    next_pseudo_key: MsgKey,
    /// Keys added with the NEW flag during this session, in arrival order.
    new_keys: Vec<MsgKey>,
    state: DbState,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .field("state", &self.state)
            .field("messages", &self.num_messages())
            .field("threads", &self.threads.len())
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Path of the backing file; `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.state == DbState::Open
    }

    /// Handle to the listener list. Listeners may keep it to unregister later.
    pub fn announcer(&self) -> Announcer {
        self.announcer.clone()
    }

    pub fn add_listener(&self, listener: Rc<dyn ChangeListener>) {
        self.announcer.add(listener);
    }

    pub fn remove_listener(&self, listener: &Rc<dyn ChangeListener>) -> bool {
        self.announcer.remove(listener)
    }

    pub fn threading_policy(&self) -> &ThreadingPolicy {
        &self.policy
    }

    /// Retention settings, preferring the owning folder's current ones.
    pub fn retention_settings(&self) -> RetentionSettings {
        self.folder
            .as_ref()
            .and_then(|f| f.retention_settings())
            .unwrap_or_else(|| self.retention.clone())
    }

    /// Download settings, preferring the owning folder's current ones.
    pub fn download_settings(&self) -> DownloadSettings {
        self.folder
            .as_ref()
            .and_then(|f| f.download_settings())
            .unwrap_or_else(|| self.download.clone())
    }

    /// Change the MRU cache capacity; shrinking evicts the oldest entries.
    pub fn set_hdr_cache_size(&mut self, size: usize) -> Result<()> {
        self.headers.resize(size)?;
        Ok(())
    }

    pub fn hdr_cache_size(&self) -> usize {
        self.headers.capacity()
    }

    /// Drop cached header objects and the threading indexes.
    ///
    /// Objects still held by callers stay valid and keep their identity.
    pub fn clear_caches(&mut self) {
        self.headers.clear();
        self.threading = None;
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            DbState::Open => Ok(()),
            DbState::Failed => Err(DbError::Closed),
        }
    }

    /// Store failures are fatal to the handle: mark it closed.
    fn check<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(DbError::Store(e)) = &result {
            tracing::error!("Store failure on {:?}, closing database: {}", self.path, e);
            self.state = DbState::Failed;
        }
        result
    }

    fn record_use(&self) {
        if let Some(usage) = &self.usage {
            usage.record_use(chrono::Utc::now().timestamp());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ParamError, StoreError};
    use crate::mail::{MsgFlags, MsgHdr, NewHeader};
    use crate::policy::RetainBy;
    use std::cell::{Cell, RefCell};

    /// Records every event it sees as a short string.
    #[derive(Default)]
    struct Recorder {
        events: RefCell<Vec<String>>,
    }

    impl Recorder {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.events.borrow_mut())
        }
    }

    impl ChangeListener for Recorder {
        fn on_header_added(&self, hdr: &MsgHdr) {
            self.events.borrow_mut().push(format!("added {}", hdr.key()));
        }

        fn on_header_deleted(&self, hdr: &MsgHdr) {
            self.events.borrow_mut().push(format!("deleted {}", hdr.key()));
        }

        fn on_header_flags_changed(&self, hdr: &MsgHdr, _old: MsgFlags, _new: MsgFlags) {
            self.events.borrow_mut().push(format!("flags {}", hdr.key()));
        }

        fn on_read_status_changed(&self, hdr: &MsgHdr) {
            self.events.borrow_mut().push(format!("read {}", hdr.key()));
        }

        fn on_header_property_changed(&self, hdr: &MsgHdr, property: &str) {
            self.events
                .borrow_mut()
                .push(format!("property {} {}", hdr.key(), property));
        }

        fn on_summary_changed(&self) {
            self.events.borrow_mut().push("summary".to_string());
        }
    }

    fn header(key: MsgKey, flags: MsgFlags) -> NewHeader {
        NewHeader {
            key: Some(key),
            flags,
            subject: format!("message {}", key),
            message_id: format!("{}@example.com", key),
            date: 1_700_000_000 + i64::from(key),
            size: 1000,
            ..Default::default()
        }
    }

    async fn test_db() -> Database {
        Database::open_in_memory(OpenOptions::default()).await.unwrap()
    }

    #[tokio::test]
    async fn test_header_identity() {
        let mut db = test_db().await;
        let added = db.add_header(header(1, MsgFlags::empty())).unwrap();

        let first = db.get_header_for_key(1).unwrap().unwrap();
        let second = db.get_header_for_key(1).unwrap().unwrap();
        assert!(MsgHdr::ptr_eq(&added, &first));
        assert!(MsgHdr::ptr_eq(&first, &second));
        assert!(db.get_header_for_key(2).unwrap().is_none());

        let by_id = db
            .get_msg_hdr_for_message_id("<1@example.com>")
            .unwrap()
            .unwrap();
        assert!(MsgHdr::ptr_eq(&first, &by_id));
        assert!(db.get_msg_hdr_for_message_id("").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_key_allocation() {
        let mut db = test_db().await;
        let first = db.add_header(NewHeader::default()).unwrap();
        assert_eq!(first.key(), 1);

        db.add_header(header(10, MsgFlags::empty())).unwrap();
        let next = db.add_header(NewHeader::default()).unwrap();
        assert_eq!(next.key(), 11);

        let err = db.add_header(header(10, MsgFlags::empty())).unwrap_err();
        assert!(matches!(err, DbError::Param(ParamError::KeyExists(10))));
        assert_eq!(db.num_messages(), 3);
    }

    #[tokio::test]
    async fn test_pseudo_keys() {
        let mut db = test_db().await;
        let pseudo = db.next_pseudo_msg_key();
        assert_eq!(pseudo, PSEUDO_KEY_START);
        assert_eq!(db.next_pseudo_msg_key(), PSEUDO_KEY_START - 1);

        db.add_header(header(PSEUDO_KEY_START - 2, MsgFlags::empty()))
            .unwrap();
        // The occupied key is skipped
        assert_eq!(db.next_pseudo_msg_key(), PSEUDO_KEY_START - 3);

        // Provisional keys don't move the high-water mark
        assert_eq!(db.folder_info().high_water, 0);
        assert_eq!(db.add_header(NewHeader::default()).unwrap().key(), 1);
    }

    #[tokio::test]
    async fn test_instigator_is_not_notified() {
        let mut db = test_db().await;
        let first = Rc::new(Recorder::default());
        let second = Rc::new(Recorder::default());
        let first_dyn: Rc<dyn ChangeListener> = first.clone();
        db.add_listener(first_dyn.clone());
        db.add_listener(second.clone());

        db.add_header(header(1, MsgFlags::empty())).unwrap();
        assert_eq!(first.take(), vec!["added 1"]);
        assert_eq!(second.take(), vec!["added 1"]);

        assert!(db.set_flag(1, true, MsgFlags::READ, Some(&first_dyn)).unwrap());
        assert!(first.take().is_empty());
        assert_eq!(second.take(), vec!["flags 1", "read 1"]);

        assert!(db.remove_listener(&first_dyn));
        db.mark_flagged(1, true, None).unwrap();
        assert!(first.take().is_empty());
        assert_eq!(second.take(), vec!["flags 1"]);
    }

    #[tokio::test]
    async fn test_unread_counts_and_new_list() {
        let mut db = test_db().await;
        for key in 1..=3 {
            db.add_header(header(key, MsgFlags::NEW)).unwrap();
        }
        db.add_header(header(4, MsgFlags::READ)).unwrap();
        assert_eq!(db.folder_info().num_messages, 4);
        assert_eq!(db.folder_info().num_unread, 3);
        assert_eq!(db.new_keys(), &[1, 2, 3]);

        assert!(db.mark_read(2, true, None).unwrap());
        assert!(!db.mark_read(2, true, None).unwrap());
        assert!(db.is_read(2).unwrap());
        assert_eq!(db.folder_info().num_unread, 2);
        assert_eq!(db.new_keys(), &[1, 3]);

        db.clear_new_list(false).unwrap();
        assert!(!db.has_new());
        let hdr = db.get_header_for_key(1).unwrap().unwrap();
        assert!(!hdr.flags().contains(MsgFlags::NEW));

        assert_eq!(db.messages_with_flag(MsgFlags::READ).unwrap(), vec![2, 4]);
        assert_eq!(db.mark_all_read(None).unwrap(), vec![1, 3]);
        assert_eq!(db.folder_info().num_unread, 0);

        assert!(db.mark_read(4, false, None).unwrap());
        assert_eq!(db.folder_info().num_unread, 1);
    }

    #[tokio::test]
    async fn test_unknown_key_is_a_param_error() {
        let mut db = test_db().await;
        let err = db.mark_read(42, true, None).unwrap_err();
        assert!(matches!(err, DbError::Param(ParamError::UnknownKey(42))));
        // Caller mistakes don't close the database
        assert!(db.is_open());
    }

    #[tokio::test]
    async fn test_properties() {
        let mut db = test_db().await;
        let recorder = Rc::new(Recorder::default());
        db.add_listener(recorder.clone());
        let hdr = db.add_header(header(1, MsgFlags::empty())).unwrap();
        recorder.take();

        assert_eq!(db.get_string_property(1, "keywords").unwrap(), None);
        db.set_string_property(1, "keywords", "urgent", None).unwrap();
        assert_eq!(
            db.get_string_property(1, "keywords").unwrap().as_deref(),
            Some("urgent")
        );

        assert_eq!(db.get_u32_property(1, "junkscore", 7).unwrap(), 7);
        db.set_u32_property(1, "junkscore", 100, None).unwrap();
        assert_eq!(db.get_u32_property(1, "junkscore", 7).unwrap(), 100);

        db.set_u64_property(1, "storeToken", u64::MAX - 1, None).unwrap();
        assert_eq!(db.get_u64_property(1, "storeToken", 0).unwrap(), u64::MAX - 1);

        assert!(!db.get_bool_property(1, "pinned", false).unwrap());
        db.set_bool_property(1, "pinned", true, None).unwrap();
        assert!(db.get_bool_property(1, "pinned", false).unwrap());

        // Writing a built-in column is visible through the live object
        db.set_string_property(1, SUBJECT_COLUMN, "Renamed", None)
            .unwrap();
        assert_eq!(hdr.subject(), "Renamed");

        assert_eq!(
            recorder.take(),
            vec![
                "property 1 keywords",
                "property 1 junkscore",
                "property 1 storeToken",
                "property 1 pinned",
                "property 1 subject",
            ]
        );

        let err = db.set_string_property(1, "", "x", None).unwrap_err();
        assert!(matches!(err, DbError::Param(ParamError::EmptyPropertyName)));
        let err = db.get_u32_property(9, "junkscore", 0).unwrap_err();
        assert!(matches!(err, DbError::Param(ParamError::UnknownKey(9))));
    }

    #[tokio::test]
    async fn test_indexed_columns_are_read_only() {
        let mut db = test_db().await;
        db.add_header(header(1, MsgFlags::empty())).unwrap();

        for name in [MESSAGE_ID_COLUMN, REFERENCES_COLUMN] {
            let err = db
                .set_string_property(1, name, "z@example.com", None)
                .unwrap_err();
            assert!(
                matches!(err, DbError::Param(ParamError::ReadOnlyProperty(ref n)) if n == name)
            );
        }
        for name in [MSG_THREAD_ID_COLUMN, THREAD_PARENT_COLUMN] {
            let err = db.set_u32_property(1, name, 9, None).unwrap_err();
            assert!(
                matches!(err, DbError::Param(ParamError::ReadOnlyProperty(ref n)) if n == name)
            );
        }
        assert!(db.is_open());

        // The index still tracks the original id, so removal clears it
        assert_eq!(db.reference_count("1@example.com").unwrap(), 1);
        db.delete_messages(&[1], None).unwrap();
        assert_eq!(db.reference_count("1@example.com").unwrap(), 0);
        assert_eq!(db.reference_count("z@example.com").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_flags_column_only_changes_through_set_flag() {
        let mut db = test_db().await;
        let recorder = Rc::new(Recorder::default());
        db.add_listener(recorder.clone());
        db.add_header(header(1, MsgFlags::NEW)).unwrap();
        recorder.take();

        let err = db
            .set_u32_property(1, FLAGS_COLUMN, MsgFlags::READ.bits(), None)
            .unwrap_err();
        assert!(matches!(err, DbError::Param(ParamError::ReadOnlyProperty(_))));
        assert!(!db.is_read(1).unwrap());
        assert_eq!(db.folder_info().num_unread, 1);
        assert_eq!(db.thread(1).unwrap().num_unread, 1);
        assert!(recorder.take().is_empty());

        assert!(db.mark_read(1, true, None).unwrap());
        assert_eq!(db.folder_info().num_unread, 0);
        assert_eq!(db.thread(1).unwrap().num_unread, 0);
        assert!(!db.has_new());
        assert_eq!(recorder.take(), vec!["flags 1", "read 1"]);
    }

    #[tokio::test]
    async fn test_reserved_and_exhausted_keys() {
        let mut db = test_db().await;
        let err = db
            .add_header(header(NONE_KEY, MsgFlags::empty()))
            .unwrap_err();
        assert!(matches!(err, DbError::Param(ParamError::ReservedKey(NONE_KEY))));
        assert_eq!(db.folder_info().high_water, 0);
        assert_eq!(db.num_messages(), 0);
        assert_eq!(db.add_header(NewHeader::default()).unwrap().key(), 1);

        // Auto-allocation stops short of the provisional range
        db.add_header(header(PSEUDO_KEY_FLOOR - 1, MsgFlags::empty()))
            .unwrap();
        let err = db.add_header(NewHeader::default()).unwrap_err();
        assert!(matches!(err, DbError::Param(ParamError::KeySpaceExhausted)));
        assert!(db.is_open());
        assert_eq!(db.num_messages(), 2);
    }

    #[tokio::test]
    async fn test_delete_messages() {
        let mut db = test_db().await;
        let recorder = Rc::new(Recorder::default());
        db.add_listener(recorder.clone());
        let held = db.add_header(header(1, MsgFlags::empty())).unwrap();
        db.add_header(header(2, MsgFlags::READ)).unwrap();
        recorder.take();

        let removed = db.delete_messages(&[1, 5], None).unwrap();
        assert_eq!(removed, vec![1]);
        assert!(held.is_removed());
        // Still readable after removal
        assert_eq!(held.subject(), "message 1");
        assert!(!db.contains_key(1));
        assert!(db.get_header_for_key(1).unwrap().is_none());
        assert_eq!(recorder.take(), vec!["deleted 1"]);

        let info = db.folder_info();
        assert_eq!(info.num_messages, 1);
        assert_eq!(info.num_unread, 0);
        assert_eq!(info.expunged_bytes, 1000);
        assert_eq!(db.list_all_keys(), vec![2]);

        db.clear_expunged_bytes().unwrap();
        assert_eq!(db.folder_info().expunged_bytes, 0);
    }

    #[tokio::test]
    async fn test_sync_counts_repairs_drift() {
        let mut db = test_db().await;
        let recorder = Rc::new(Recorder::default());
        db.add_listener(recorder.clone());
        db.add_header(header(1, MsgFlags::empty())).unwrap();
        db.add_header(header(2, MsgFlags::READ)).unwrap();
        recorder.take();

        assert!(!db.sync_counts().unwrap());
        db.folder_info.num_unread = 10;
        db.folder_info.num_messages = 0;
        assert!(db.sync_counts().unwrap());
        assert_eq!(db.folder_info().num_messages, 2);
        assert_eq!(db.folder_info().num_unread, 1);
        assert_eq!(recorder.take(), vec!["summary"]);
    }

    #[tokio::test]
    async fn test_store_failure_closes_database() {
        let mut db = test_db().await;
        db.add_header(header(1, MsgFlags::empty())).unwrap();

        let failure: Result<()> = Err(StoreError::Malformed {
            op: "test",
            detail: "boom".to_string(),
        }
        .into());
        assert!(db.check(failure).is_err());
        assert!(!db.is_open());

        assert!(matches!(db.get_header_for_key(1), Err(DbError::Closed)));
        assert!(matches!(
            db.add_header(header(2, MsgFlags::empty())),
            Err(DbError::Closed)
        ));
        // Closing is still allowed
        db.close(true).await.unwrap();
    }

    #[tokio::test]
    async fn test_cache_size() {
        let mut db = test_db().await;
        assert_eq!(db.hdr_cache_size(), DEFAULT_HDR_CACHE_SIZE);
        db.set_hdr_cache_size(2).unwrap();
        assert_eq!(db.hdr_cache_size(), 2);
        let err = db.set_hdr_cache_size(0).unwrap_err();
        assert!(matches!(err, DbError::Param(ParamError::ZeroCacheSize)));

        for key in 1..=3 {
            db.add_header(header(key, MsgFlags::empty())).unwrap();
        }
        assert_eq!(db.headers.recent_len(), 2);
        assert!(!db.headers.is_recent(1));
    }

    #[derive(Default)]
    struct TestFolder {
        valid: Cell<Option<bool>>,
    }

    impl Folder for TestFolder {
        fn retention_settings(&self) -> Option<RetentionSettings> {
            Some(RetentionSettings {
                retain_by: RetainBy::Count,
                num_headers_to_keep: 5,
                ..Default::default()
            })
        }

        fn summary_validity_changed(&self, valid: bool) {
            self.valid.set(Some(valid));
        }
    }

    #[tokio::test]
    async fn test_folder_callbacks() {
        let folder = Rc::new(TestFolder::default());
        let options = OpenOptions {
            folder: Some(folder.clone()),
            ..Default::default()
        };
        let mut db = Database::open_in_memory(options).await.unwrap();

        assert_eq!(db.retention_settings().retain_by, RetainBy::Count);
        assert_eq!(db.download_settings(), DownloadSettings::default());

        db.set_summary_valid(false).unwrap();
        assert_eq!(folder.valid.get(), Some(false));
        assert!(!db.folder_info().summary_valid);
    }
}
