//! Folder summary counters.

use chrono::{DateTime, Utc};

use super::{Columns, Database};
use crate::error::{Result, StoreError};
use crate::mail::{MsgFlags, MsgKey, is_pseudo_key};
use crate::store::{RowId, RowStore};

/// Aggregate counters kept in the folder info row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderInfo {
    pub version: u32,
    pub num_messages: u32,
    pub num_unread: u32,
    /// Bytes of messages removed since the folder was last compacted.
    pub expunged_bytes: u64,
    pub summary_valid: bool,
    /// Highest real (non-pseudo) key ever added.
    pub high_water: MsgKey,
    pub folder_size: u64,
    pub folder_date: i64,
}

impl FolderInfo {
    pub fn folder_date_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.folder_date, 0)
    }

    pub(super) fn load(
        store: &RowStore,
        row: RowId,
        cols: &Columns,
    ) -> std::result::Result<Self, StoreError> {
        Ok(Self {
            version: store.get_u32(row, cols.info_version)?.unwrap_or(0),
            num_messages: store.get_u32(row, cols.info_num_messages)?.unwrap_or(0),
            num_unread: store.get_u32(row, cols.info_num_unread)?.unwrap_or(0),
            expunged_bytes: store.get_u64(row, cols.info_expunged_bytes)?.unwrap_or(0),
            summary_valid: store.get_bool(row, cols.info_summary_valid)?.unwrap_or(false),
            high_water: store.get_u32(row, cols.info_high_water)?.unwrap_or(0),
            folder_size: store.get_u64(row, cols.info_folder_size)?.unwrap_or(0),
            folder_date: store.get_u64(row, cols.info_folder_date)?.unwrap_or(0) as i64,
        })
    }

    pub(super) fn store(
        &self,
        store: &mut RowStore,
        row: RowId,
        cols: &Columns,
    ) -> std::result::Result<(), StoreError> {
        store.set_u32(row, cols.info_version, self.version)?;
        store.set_u32(row, cols.info_num_messages, self.num_messages)?;
        store.set_u32(row, cols.info_num_unread, self.num_unread)?;
        store.set_u64(row, cols.info_expunged_bytes, self.expunged_bytes)?;
        store.set_bool(row, cols.info_summary_valid, self.summary_valid)?;
        store.set_u32(row, cols.info_high_water, self.high_water)?;
        store.set_u64(row, cols.info_folder_size, self.folder_size)?;
        store.set_u64(row, cols.info_folder_date, self.folder_date as u64)?;
        Ok(())
    }
}

impl Database {
    pub fn folder_info(&self) -> &FolderInfo {
        &self.folder_info
    }

    pub(super) fn write_folder_info(&mut self) -> std::result::Result<(), StoreError> {
        self.folder_info
            .store(&mut self.store, self.info_row, &self.columns)
    }

    pub(super) fn count_added(&mut self, key: MsgKey, flags: MsgFlags) {
        let info = &mut self.folder_info;
        info.num_messages += 1;
        if !flags.contains(MsgFlags::READ) {
            info.num_unread += 1;
        }
        if !is_pseudo_key(key) && key > info.high_water {
            info.high_water = key;
        }
    }

    pub(super) fn count_removed(&mut self, flags: MsgFlags, size: u32) {
        let info = &mut self.folder_info;
        info.num_messages = info.num_messages.saturating_sub(1);
        if !flags.contains(MsgFlags::READ) {
            info.num_unread = info.num_unread.saturating_sub(1);
        }
        info.expunged_bytes += u64::from(size);
    }

    pub(super) fn count_read_change(&mut self, read: bool) {
        let info = &mut self.folder_info;
        if read {
            info.num_unread = info.num_unread.saturating_sub(1);
        } else {
            info.num_unread += 1;
        }
    }

    /// Recount total and unread messages from the rows and repair drift.
    ///
    /// Returns true if the stored counters were wrong.
    pub fn sync_counts(&mut self) -> Result<bool> {
        self.ensure_open()?;
        let result = self.sync_counts_inner();
        self.check(result)
    }

    fn sync_counts_inner(&mut self) -> Result<bool> {
        let mut total = 0u32;
        let mut unread = 0u32;
        for key in self.list_all_keys() {
            total += 1;
            if !self.flags_for_key(key)?.contains(MsgFlags::READ) {
                unread += 1;
            }
        }

        let info = &self.folder_info;
        if info.num_messages == total && info.num_unread == unread {
            return Ok(false);
        }

        tracing::warn!(
            "Summary counts for {:?} drifted: total {} -> {}, unread {} -> {}",
            self.path,
            info.num_messages,
            total,
            info.num_unread,
            unread
        );
        self.folder_info.num_messages = total;
        self.folder_info.num_unread = unread;
        self.write_folder_info()?;
        self.announcer.summary_changed();
        Ok(true)
    }

    /// Mark the summary valid or stale and tell the owning folder.
    ///
    /// A stale summary makes the next open report `SummaryOutOfDate`.
    pub fn set_summary_valid(&mut self, valid: bool) -> Result<()> {
        self.ensure_open()?;
        if self.folder_info.summary_valid == valid {
            return Ok(());
        }
        self.folder_info.summary_valid = valid;
        let result = self.write_folder_info().map_err(Into::into);
        self.check(result)?;
        if let Some(folder) = &self.folder {
            folder.summary_validity_changed(valid);
        }
        Ok(())
    }

    pub fn set_folder_size(&mut self, size: u64) -> Result<()> {
        self.ensure_open()?;
        self.folder_info.folder_size = size;
        let result = self.write_folder_info().map_err(Into::into);
        self.check(result)
    }

    /// Modification time of the folder file, Unix seconds.
    pub fn set_folder_date(&mut self, date: i64) -> Result<()> {
        self.ensure_open()?;
        self.folder_info.folder_date = date;
        let result = self.write_folder_info().map_err(Into::into);
        self.check(result)
    }

    /// Reset after the folder file has been compacted.
    pub fn clear_expunged_bytes(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.folder_info.expunged_bytes = 0;
        let result = self.write_folder_info().map_err(Into::into);
        self.check(result)
    }
}
