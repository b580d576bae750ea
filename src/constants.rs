//! Database-wide constants for tuning and on-disk layout
//!
//! Centralizes magic numbers and store token names so they stay discoverable.

use crate::mail::MsgKey;

/// Schema version written into the folder info row.
/// A mismatch on open is reported as an out-of-date summary.
pub const MSG_DB_VERSION: u32 = 1;

/// Default capacity of the MRU header cache.
pub const DEFAULT_HDR_CACHE_SIZE: usize = 20;

/// Sentinel for "no message" (root parent, empty thread).
pub const NONE_KEY: MsgKey = 0xffff_ffff;

/// First provisional key handed out; later pseudo keys count down from here.
pub const PSEUDO_KEY_START: MsgKey = 0xffff_ff80;

/// Lowest key treated as provisional.
pub const PSEUDO_KEY_FLOOR: MsgKey = 0xff00_0000;

/// Object id of the single folder info row.
pub const FOLDER_INFO_OID: u64 = 1;

/// Seconds in a day, for retention cutoffs.
pub const SECS_PER_DAY: i64 = 86_400;

// === Row scopes and table kinds ===

pub const HDR_ROW_SCOPE: &str = "ns:msg:db:row:scope:msgs:all";
pub const HDR_TABLE_KIND: &str = "ns:msg:db:table:kind:msgs";
pub const THREAD_ROW_SCOPE: &str = "ns:msg:db:row:scope:threads:all";
pub const ALL_THREADS_TABLE_KIND: &str = "ns:msg:db:table:kind:allthreads";
pub const FOLDER_INFO_SCOPE: &str = "ns:msg:db:row:scope:dbfolderinfo:all";
pub const FOLDER_INFO_TABLE_KIND: &str = "ns:msg:db:table:kind:dbfolderinfo";

// === Header columns ===

pub const SUBJECT_COLUMN: &str = "subject";
pub const SENDER_COLUMN: &str = "sender";
pub const RECIPIENTS_COLUMN: &str = "recipients";
pub const CC_LIST_COLUMN: &str = "ccList";
pub const BCC_LIST_COLUMN: &str = "bccList";
pub const MESSAGE_ID_COLUMN: &str = "message-id";
pub const REFERENCES_COLUMN: &str = "references";
pub const DATE_COLUMN: &str = "date";
pub const MESSAGE_SIZE_COLUMN: &str = "size";
pub const FLAGS_COLUMN: &str = "flags";
pub const PRIORITY_COLUMN: &str = "priority";
pub const LABEL_COLUMN: &str = "label";
pub const STATUS_OFFSET_COLUMN: &str = "statusOfset";
pub const NUM_LINES_COLUMN: &str = "numLines";
pub const CHARSET_COLUMN: &str = "msgCharSet";
pub const MSG_THREAD_ID_COLUMN: &str = "msgThreadId";
pub const THREAD_PARENT_COLUMN: &str = "threadParent";
pub const OFFLINE_MSG_OFFSET_COLUMN: &str = "msgOffset";
pub const OFFLINE_MSG_SIZE_COLUMN: &str = "offlineMsgSize";

// === Thread columns ===

pub const THREAD_CHILDREN_COLUMN: &str = "children";
pub const THREAD_UNREAD_CHILDREN_COLUMN: &str = "unreadChildren";
pub const THREAD_SUBJECT_COLUMN: &str = "threadSubject";
pub const THREAD_ROOT_KEY_COLUMN: &str = "threadRoot";
pub const THREAD_NEWEST_DATE_COLUMN: &str = "threadNewestMsgDate";
pub const THREAD_KEYS_COLUMN: &str = "threadMsgKeys";

// === Folder info columns ===

pub const INFO_VERSION_COLUMN: &str = "version";
pub const INFO_NUM_MESSAGES_COLUMN: &str = "numMsgs";
pub const INFO_NUM_UNREAD_COLUMN: &str = "numNewMsgs";
pub const INFO_EXPUNGED_BYTES_COLUMN: &str = "expungedBytes";
pub const INFO_SUMMARY_VALID_COLUMN: &str = "summaryValid";
pub const INFO_HIGH_WATER_COLUMN: &str = "highWaterKey";
pub const INFO_FOLDER_SIZE_COLUMN: &str = "folderSize";
pub const INFO_FOLDER_DATE_COLUMN: &str = "folderDate";
