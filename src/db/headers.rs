//! Header rows: add, lookup, flags, properties and deletion.

use super::{Columns, Database, HEADER_COLUMNS, INDEXED_COLUMNS};
use crate::constants::{NONE_KEY, PSEUDO_KEY_FLOOR};
use crate::error::{ParamError, Result, StoreError};
use crate::listener::Instigator;
use crate::mail::{HdrData, MsgFlags, MsgHdr, MsgKey, NewHeader, Priority, normalize_message_id};
use crate::store::{RowId, RowStore};

/// Decode a header row. Missing or unreadable cells fall back to defaults.
pub(super) fn read_hdr_data(
    store: &RowStore,
    cols: &Columns,
    row: RowId,
) -> std::result::Result<HdrData, StoreError> {
    let defaults = HdrData::default();
    let references = store
        .get_string(row, cols.references)?
        .map(|refs| refs.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();

    Ok(HdrData {
        flags: MsgFlags::from_bits_retain(store.get_u32(row, cols.flags)?.unwrap_or(0)),
        subject: store.get_string(row, cols.subject)?.unwrap_or_default(),
        author: store.get_string(row, cols.sender)?.unwrap_or_default(),
        recipients: store.get_string(row, cols.recipients)?.unwrap_or_default(),
        cc_list: store.get_string(row, cols.cc_list)?.unwrap_or_default(),
        bcc_list: store.get_string(row, cols.bcc_list)?.unwrap_or_default(),
        message_id: store.get_string(row, cols.message_id)?.unwrap_or_default(),
        references,
        date: store.get_u64(row, cols.date)?.unwrap_or(0) as i64,
        size: store.get_u32(row, cols.size)?.unwrap_or(0),
        charset: store.get_string(row, cols.charset)?.unwrap_or_default(),
        thread_id: store
            .get_u32(row, cols.thread_id)?
            .unwrap_or(defaults.thread_id),
        thread_parent: store
            .get_u32(row, cols.thread_parent)?
            .unwrap_or(defaults.thread_parent),
        priority: Priority::from_u32(store.get_u32(row, cols.priority)?.unwrap_or(0)),
        label: store.get_u32(row, cols.label)?.unwrap_or(0),
        status_offset: store.get_u32(row, cols.status_offset)?.unwrap_or(0),
        num_lines: store.get_u32(row, cols.num_lines)?.unwrap_or(0),
        offline_offset: store.get_u64(row, cols.offline_offset)?.unwrap_or(0),
        offline_size: store.get_u32(row, cols.offline_size)?.unwrap_or(0),
    })
}

pub(super) fn write_hdr_data(
    store: &mut RowStore,
    cols: &Columns,
    row: RowId,
    data: &HdrData,
) -> std::result::Result<(), StoreError> {
    store.set_u32(row, cols.flags, data.flags.bits())?;
    store.set_string(row, cols.subject, &data.subject)?;
    store.set_string(row, cols.sender, &data.author)?;
    store.set_string(row, cols.recipients, &data.recipients)?;
    store.set_string(row, cols.cc_list, &data.cc_list)?;
    store.set_string(row, cols.bcc_list, &data.bcc_list)?;
    store.set_string(row, cols.message_id, &data.message_id)?;
    store.set_string(row, cols.references, &data.references.join(" "))?;
    store.set_u64(row, cols.date, data.date as u64)?;
    store.set_u32(row, cols.size, data.size)?;
    store.set_string(row, cols.charset, &data.charset)?;
    store.set_u32(row, cols.thread_id, data.thread_id)?;
    store.set_u32(row, cols.thread_parent, data.thread_parent)?;
    store.set_u32(row, cols.priority, data.priority.as_u32())?;
    store.set_u32(row, cols.label, data.label)?;
    store.set_u32(row, cols.status_offset, data.status_offset)?;
    store.set_u32(row, cols.num_lines, data.num_lines)?;
    store.set_u64(row, cols.offline_offset, data.offline_offset)?;
    store.set_u32(row, cols.offline_size, data.offline_size)?;
    Ok(())
}

impl Database {
    pub(super) fn hdr_row(&self, key: MsgKey) -> RowId {
        RowId {
            scope: self.hdr_table.scope,
            oid: u64::from(key),
        }
    }

    pub fn contains_key(&self, key: MsgKey) -> bool {
        self.store.contains(self.hdr_table, u64::from(key))
    }

    /// All message keys in ascending order.
    pub fn list_all_keys(&self) -> Vec<MsgKey> {
        self.store
            .cursor(self.hdr_table)
            .map(|row| row.oid as MsgKey)
            .collect()
    }

    pub fn num_messages(&self) -> usize {
        self.store.row_count(self.hdr_table)
    }

    /// Resolve a header object, building it from its row if nobody holds one.
    pub(super) fn load_header(&mut self, key: MsgKey, touch: bool) -> Result<Option<MsgHdr>> {
        let exists = self.contains_key(key);
        let row = self.hdr_row(key);
        let store = &self.store;
        let columns = &self.columns;
        let hdr = self.headers.get_or_create(key, || {
            if !exists {
                return Ok::<_, StoreError>(None);
            }
            read_hdr_data(store, columns, row).map(|data| Some((row, data)))
        })?;
        if touch && let Some(hdr) = &hdr {
            self.headers.touch(hdr);
        }
        Ok(hdr)
    }

    fn require_header(&mut self, key: MsgKey) -> Result<MsgHdr> {
        self.load_header(key, true)?
            .ok_or_else(|| ParamError::UnknownKey(key).into())
    }

    /// Header fields without instantiating a header object.
    pub(super) fn peek_data(&self, key: MsgKey) -> Result<Option<HdrData>> {
        if let Some(hdr) = self.headers.lookup(key) {
            return Ok(Some(hdr.data().clone()));
        }
        if !self.contains_key(key) {
            return Ok(None);
        }
        Ok(Some(read_hdr_data(&self.store, &self.columns, self.hdr_row(key))?))
    }

    pub(super) fn flags_for_key(&self, key: MsgKey) -> Result<MsgFlags> {
        if let Some(hdr) = self.headers.lookup(key) {
            return Ok(hdr.flags());
        }
        if !self.contains_key(key) {
            return Err(ParamError::UnknownKey(key).into());
        }
        let bits = self
            .store
            .get_u32(self.hdr_row(key), self.columns.flags)?
            .unwrap_or(0);
        Ok(MsgFlags::from_bits_retain(bits))
    }

    /// The header for `key`, or `None` if there is no such message.
    ///
    /// Repeated calls return the same object while any caller holds it.
    pub fn get_header_for_key(&mut self, key: MsgKey) -> Result<Option<MsgHdr>> {
        self.ensure_open()?;
        let result = self.load_header(key, true);
        self.check(result)
    }

    /// Look a header up by its message id (with or without angle brackets).
    pub fn get_msg_hdr_for_message_id(&mut self, message_id: &str) -> Result<Option<MsgHdr>> {
        self.ensure_open()?;
        let result = self.msg_hdr_for_message_id(&normalize_message_id(message_id));
        self.check(result)
    }

    fn msg_hdr_for_message_id(&mut self, message_id: &str) -> Result<Option<MsgHdr>> {
        if message_id.is_empty() {
            return Ok(None);
        }
        self.ensure_threading_state()?;
        let key = self
            .threading
            .as_ref()
            .and_then(|state| state.key_for_message_id(message_id));
        match key {
            Some(key) => self.load_header(key, true),
            None => Ok(None),
        }
    }

    /// All headers in key order. Does not disturb the MRU cache.
    pub fn enumerate_messages(&mut self) -> Result<Vec<MsgHdr>> {
        self.ensure_open()?;
        let mut headers = Vec::new();
        for key in self.list_all_keys() {
            let result = self.load_header(key, false);
            if let Some(hdr) = self.check(result)? {
                headers.push(hdr);
            }
        }
        Ok(headers)
    }

    /// Add a message. A missing key is allocated past the high-water key.
    ///
    /// The header is placed into a thread and listeners are told about it.
    pub fn add_header(&mut self, header: NewHeader) -> Result<MsgHdr> {
        self.ensure_open()?;
        let result = self.add_header_inner(header);
        self.check(result)
    }

    fn add_header_inner(&mut self, header: NewHeader) -> Result<MsgHdr> {
        let key = match header.key {
            Some(NONE_KEY) => return Err(ParamError::ReservedKey(NONE_KEY).into()),
            Some(key) => key,
            None => self.allocate_key()?,
        };
        if self.contains_key(key) {
            return Err(ParamError::KeyExists(key).into());
        }

        // The index scan must not see the new row
        self.ensure_threading_state()?;
        // A reused key must not inherit the thread its old header started
        self.free_thread_id(key)?;

        let data = header.into_data();
        let flags = data.flags;
        let row = self.store.new_row_with_oid(self.hdr_table, u64::from(key));
        write_hdr_data(&mut self.store, &self.columns, row, &data)?;

        let hdr = self.headers.insert(key, row, data);
        self.headers.touch(&hdr);
        let thread_id = self.place_in_thread(&hdr)?;

        self.count_added(key, flags);
        self.write_folder_info()?;
        if flags.contains(MsgFlags::NEW) {
            self.new_keys.push(key);
        }

        tracing::debug!(
            "Added header {} to {:?} (thread {})",
            key,
            self.path,
            thread_id
        );
        self.announcer.header_added(&hdr, None);
        Ok(hdr)
    }

    /// The key after the high-water key. Never reaches the provisional range.
    fn allocate_key(&self) -> Result<MsgKey> {
        match self.folder_info.high_water.checked_add(1) {
            Some(key) if key < PSEUDO_KEY_FLOOR => Ok(key),
            _ => Err(ParamError::KeySpaceExhausted.into()),
        }
    }

    //
    // Flags
    //

    /// Set or clear `flag` on a message.
    ///
    /// Listeners other than `instigator` are notified. Returns false when the
    /// flag already had the requested value.
    pub fn set_flag(
        &mut self,
        key: MsgKey,
        set: bool,
        flag: MsgFlags,
        instigator: Instigator<'_>,
    ) -> Result<bool> {
        self.ensure_open()?;
        let result = self
            .require_header(key)
            .and_then(|hdr| self.set_hdr_flag(&hdr, set, flag, instigator));
        self.check(result)
    }

    pub(super) fn set_hdr_flag(
        &mut self,
        hdr: &MsgHdr,
        set: bool,
        flag: MsgFlags,
        instigator: Instigator<'_>,
    ) -> Result<bool> {
        let old = hdr.flags();
        let new = if set { old | flag } else { old - flag };
        if new == old {
            return Ok(false);
        }
        self.write_flags(hdr, new)?;

        let read_changed = (old ^ new).contains(MsgFlags::READ);
        if read_changed {
            let read = new.contains(MsgFlags::READ);
            self.count_read_change(read);
            self.thread_read_changed(hdr, read)?;
            if read {
                self.new_keys.retain(|&k| k != hdr.key());
            }
            self.write_folder_info()?;
        }

        self.announcer.flags_changed(hdr, old, new, instigator);
        if read_changed {
            self.announcer.read_status_changed(hdr, instigator);
        }
        Ok(true)
    }

    pub(super) fn write_flags(
        &mut self,
        hdr: &MsgHdr,
        flags: MsgFlags,
    ) -> std::result::Result<(), StoreError> {
        hdr.data_mut().flags = flags;
        self.store
            .set_u32(hdr.row(), self.columns.flags, flags.bits())
    }

    pub fn mark_read(
        &mut self,
        key: MsgKey,
        read: bool,
        instigator: Instigator<'_>,
    ) -> Result<bool> {
        self.set_flag(key, read, MsgFlags::READ, instigator)
    }

    pub fn mark_flagged(
        &mut self,
        key: MsgKey,
        flagged: bool,
        instigator: Instigator<'_>,
    ) -> Result<bool> {
        self.set_flag(key, flagged, MsgFlags::MARKED, instigator)
    }

    pub fn mark_replied(
        &mut self,
        key: MsgKey,
        replied: bool,
        instigator: Instigator<'_>,
    ) -> Result<bool> {
        self.set_flag(key, replied, MsgFlags::REPLIED, instigator)
    }

    pub fn mark_offline(
        &mut self,
        key: MsgKey,
        offline: bool,
        instigator: Instigator<'_>,
    ) -> Result<bool> {
        self.set_flag(key, offline, MsgFlags::OFFLINE, instigator)
    }

    pub fn is_read(&self, key: MsgKey) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.flags_for_key(key)?.contains(MsgFlags::READ))
    }

    /// Mark every unread message read; returns the keys that changed.
    pub fn mark_all_read(&mut self, instigator: Instigator<'_>) -> Result<Vec<MsgKey>> {
        self.ensure_open()?;
        let result = self.mark_all_read_inner(instigator);
        self.check(result)
    }

    fn mark_all_read_inner(&mut self, instigator: Instigator<'_>) -> Result<Vec<MsgKey>> {
        let mut changed = Vec::new();
        for key in self.list_all_keys() {
            if self.flags_for_key(key)?.contains(MsgFlags::READ) {
                continue;
            }
            if let Some(hdr) = self.load_header(key, false)?
                && self.set_hdr_flag(&hdr, true, MsgFlags::READ, instigator)?
            {
                changed.push(key);
            }
        }
        if !changed.is_empty() {
            self.announcer.summary_changed();
        }
        Ok(changed)
    }

    /// Keys of all messages carrying every bit in `flags`.
    pub fn messages_with_flag(&self, flags: MsgFlags) -> Result<Vec<MsgKey>> {
        self.ensure_open()?;
        let mut keys = Vec::new();
        for key in self.list_all_keys() {
            if self.flags_for_key(key)?.contains(flags) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    //
    // New-message set
    //

    pub fn has_new(&self) -> bool {
        !self.new_keys.is_empty()
    }

    /// Keys added with the NEW flag this session that are still unread.
    pub fn new_keys(&self) -> &[MsgKey] {
        &self.new_keys
    }

    /// Empty the new-message set and clear the NEW flag on its headers.
    pub fn clear_new_list(&mut self, notify: bool) -> Result<()> {
        self.ensure_open()?;
        let keys = std::mem::take(&mut self.new_keys);
        let result = self.clear_new_flags(&keys, notify);
        self.check(result)
    }

    fn clear_new_flags(&mut self, keys: &[MsgKey], notify: bool) -> Result<()> {
        for &key in keys {
            let Some(hdr) = self.load_header(key, false)? else {
                continue;
            };
            let old = hdr.flags();
            if !old.contains(MsgFlags::NEW) {
                continue;
            }
            let new = old - MsgFlags::NEW;
            self.write_flags(&hdr, new)?;
            if notify {
                self.announcer.flags_changed(&hdr, old, new, None);
            }
        }
        Ok(())
    }

    /// Hand out a provisional key below the real key space.
    pub fn next_pseudo_msg_key(&mut self) -> MsgKey {
        let mut key = self.next_pseudo_key;
        while key > PSEUDO_KEY_FLOOR && self.contains_key(key) {
            key -= 1;
        }
        self.next_pseudo_key = key.saturating_sub(1).max(PSEUDO_KEY_FLOOR);
        key
    }

    //
    // Properties
    //

    fn property_row(&self, key: MsgKey, name: &str) -> Result<RowId> {
        if name.is_empty() {
            return Err(ParamError::EmptyPropertyName.into());
        }
        if !self.contains_key(key) {
            return Err(ParamError::UnknownKey(key).into());
        }
        Ok(self.hdr_row(key))
    }

    fn read_property<T>(
        &mut self,
        key: MsgKey,
        name: &str,
        read: impl FnOnce(&mut RowStore, RowId) -> std::result::Result<T, StoreError>,
    ) -> Result<T> {
        self.ensure_open()?;
        let row = self.property_row(key, name)?;
        let result = read(&mut self.store, row).map_err(Into::into);
        self.check(result)
    }

    fn write_property(
        &mut self,
        key: MsgKey,
        name: &str,
        instigator: Instigator<'_>,
        write: impl FnOnce(&mut RowStore, RowId) -> std::result::Result<(), StoreError>,
    ) -> Result<()> {
        self.ensure_open()?;
        self.property_row(key, name)?;
        // Flags go through set_flag; ids, references and thread links are fixed at add time
        if INDEXED_COLUMNS.contains(&name) {
            return Err(ParamError::ReadOnlyProperty(name.to_string()).into());
        }
        let result = self.write_property_inner(key, name, instigator, write);
        self.check(result)
    }

    fn write_property_inner(
        &mut self,
        key: MsgKey,
        name: &str,
        instigator: Instigator<'_>,
        write: impl FnOnce(&mut RowStore, RowId) -> std::result::Result<(), StoreError>,
    ) -> Result<()> {
        let hdr = self.require_header(key)?;
        write(&mut self.store, hdr.row())?;
        // Keep the live object in step when a built-in column was written
        if HEADER_COLUMNS.contains(&name) {
            let data = read_hdr_data(&self.store, &self.columns, hdr.row())?;
            *hdr.data_mut() = data;
        }
        self.announcer.property_changed(&hdr, name, instigator);
        Ok(())
    }

    pub fn get_string_property(&mut self, key: MsgKey, name: &str) -> Result<Option<String>> {
        self.read_property(key, name, |store, row| store.get_property(row, name))
    }

    pub fn set_string_property(
        &mut self,
        key: MsgKey,
        name: &str,
        value: &str,
        instigator: Instigator<'_>,
    ) -> Result<()> {
        self.write_property(key, name, instigator, |store, row| {
            store.set_property(row, name, value)
        })
    }

    pub fn get_u32_property(&mut self, key: MsgKey, name: &str, default: u32) -> Result<u32> {
        self.read_property(key, name, |store, row| {
            store.get_u32_property(row, name, default)
        })
    }

    pub fn set_u32_property(
        &mut self,
        key: MsgKey,
        name: &str,
        value: u32,
        instigator: Instigator<'_>,
    ) -> Result<()> {
        self.write_property(key, name, instigator, |store, row| {
            store.set_u32_property(row, name, value)
        })
    }

    pub fn get_u64_property(&mut self, key: MsgKey, name: &str, default: u64) -> Result<u64> {
        self.read_property(key, name, |store, row| {
            store.get_u64_property(row, name, default)
        })
    }

    pub fn set_u64_property(
        &mut self,
        key: MsgKey,
        name: &str,
        value: u64,
        instigator: Instigator<'_>,
    ) -> Result<()> {
        self.write_property(key, name, instigator, |store, row| {
            store.set_u64_property(row, name, value)
        })
    }

    pub fn get_bool_property(&mut self, key: MsgKey, name: &str, default: bool) -> Result<bool> {
        self.read_property(key, name, |store, row| {
            store.get_bool_property(row, name, default)
        })
    }

    pub fn set_bool_property(
        &mut self,
        key: MsgKey,
        name: &str,
        value: bool,
        instigator: Instigator<'_>,
    ) -> Result<()> {
        self.write_property(key, name, instigator, |store, row| {
            store.set_bool_property(row, name, value)
        })
    }

    //
    // Deletion
    //

    /// Remove messages; unknown keys are skipped. Returns the keys removed.
    pub fn delete_messages(
        &mut self,
        keys: &[MsgKey],
        instigator: Instigator<'_>,
    ) -> Result<Vec<MsgKey>> {
        self.ensure_open()?;
        let result = self.delete_messages_inner(keys, instigator);
        self.check(result)
    }

    pub(super) fn delete_messages_inner(
        &mut self,
        keys: &[MsgKey],
        instigator: Instigator<'_>,
    ) -> Result<Vec<MsgKey>> {
        let mut removed = Vec::new();
        for &key in keys {
            let Some(hdr) = self.load_header(key, false)? else {
                continue;
            };
            self.remove_header(&hdr, instigator)?;
            removed.push(key);
        }
        Ok(removed)
    }

    fn remove_header(&mut self, hdr: &MsgHdr, instigator: Instigator<'_>) -> Result<()> {
        let key = hdr.key();
        self.remove_from_thread(hdr)?;

        let (flags, size) = {
            let data = hdr.data();
            (data.flags, data.size)
        };
        self.count_removed(flags, size);
        self.write_folder_info()?;

        self.store.cut_row(self.hdr_table, u64::from(key));
        self.headers.remove(key);
        hdr.mark_removed();
        self.new_keys.retain(|&k| k != key);

        self.announcer.header_deleted(hdr, instigator);
        Ok(())
    }
}
