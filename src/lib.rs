//! Per-folder message metadata database.
//!
//! Stores message headers (not bodies) for one mail folder, reconstructs
//! conversation threads from reference chains, hands out identity-stable
//! header objects and applies retention policy.

pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod folder;
pub mod listener;
pub mod mail;
pub mod policy;
pub mod service;
pub mod store;
pub mod telemetry;

pub use db::{Database, FolderInfo, OpenOptions, PurgeReport};
pub use error::{DbError, OpenError, ParamError, Result, StoreError};
pub use listener::{Announcer, ChangeListener, Instigator};
pub use mail::{MsgFlags, MsgHdr, MsgKey, MsgThread, NewHeader, ThreadId};
