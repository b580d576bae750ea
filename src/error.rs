//! Error types for the message database.
//!
//! Lookups that find nothing return `None`; only real failures are errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::mail::MsgKey;
use crate::store::RowId;

/// Failures reported by the row store.
///
/// Any of these is fatal to the current handle: the database must be
/// closed and reopened (or rebuilt) afterwards.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite failed while loading or committing.
    #[error("Store {op} failed: {source}")]
    Sqlite {
        op: &'static str,
        #[source]
        source: sqlx::Error,
    },

    /// Filesystem operation on the store file failed.
    #[error("Store {op} failed: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// A row the database expected to exist is gone.
    #[error("Store {op}: row {row:?} does not exist")]
    RowMissing { op: &'static str, row: RowId },

    /// Persisted store contents could not be interpreted.
    #[error("Store {op}: malformed contents ({detail})")]
    Malformed { op: &'static str, detail: String },
}

impl StoreError {
    pub(crate) fn sqlite(op: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| Self::Sqlite { op, source }
    }

    /// True when the underlying file is damaged or not a store at all.
    pub fn is_corruption(&self) -> bool {
        match self {
            Self::Malformed { .. } => true,
            Self::Sqlite {
                source: sqlx::Error::Database(e),
                ..
            } => e
                .code()
                .and_then(|code| code.parse::<i32>().ok())
                // SQLITE_CORRUPT (11) and SQLITE_NOTADB (26), including extended codes
                .is_some_and(|code| matches!(code & 0xff, 11 | 26)),
            _ => false,
        }
    }
}

/// Failures opening a folder database.
#[derive(Debug, Error)]
pub enum OpenError {
    /// `create` was false and there is no database file.
    #[error("Database file not found: {}", .0.display())]
    TargetMissing(PathBuf),

    /// The database opened but its summary is stale (version mismatch or marked invalid).
    #[error("Folder summary is out of date: {} ({reason})", .path.display())]
    SummaryOutOfDate { path: PathBuf, reason: String },

    /// The database file exists but carries no folder summary.
    #[error("Folder summary is missing: {}", .0.display())]
    SummaryMissing(PathBuf),

    /// The file is not a usable database.
    ///
    /// When `preserved` is false the broken file was replaced.
    #[error("Database is corrupt: {} (preserved: {preserved})", .path.display())]
    Corrupt { path: PathBuf, preserved: bool },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl OpenError {
    /// Whether the caller can recover by rebuilding the summary from source data.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::SummaryOutOfDate { .. } | Self::SummaryMissing(_))
    }
}

/// Invalid caller input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParamError {
    #[error("Message key {0} already exists")]
    KeyExists(MsgKey),

    #[error("No message with key {0}")]
    UnknownKey(MsgKey),

    /// The "no message" sentinel can't name a real message.
    #[error("Message key {0} is reserved")]
    ReservedKey(MsgKey),

    /// Every key below the provisional range is taken.
    #[error("No message keys left below the provisional range")]
    KeySpaceExhausted,

    #[error("Property name must not be empty")]
    EmptyPropertyName,

    /// Columns tied to the indexes and counters only change through their own calls.
    #[error("Property {0} can't be written directly")]
    ReadOnlyProperty(String),

    #[error("Header cache size must be at least 1")]
    ZeroCacheSize,
}

/// Errors from operations on an open database.
#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Param(#[from] ParamError),

    /// The database was closed, or a store failure forced it closed.
    #[error("Database is not open")]
    Closed,
}

/// Result type alias for database operations.
pub type Result<T> = std::result::Result<T, DbError>;
