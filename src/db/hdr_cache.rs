//! Two-tier header cache.
//!
//! The use cache indexes every live header object without owning it, so a key
//! never maps to two objects at once. The MRU tier owns a bounded number of
//! recently touched headers; evicting from it only drops that extra strong
//! reference.

use lru::LruCache;
use std::cell::RefCell;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::rc::Rc;

use crate::error::ParamError;
use crate::mail::header::UseCache;
use crate::mail::{HdrData, MsgHdr, MsgKey};
use crate::store::RowId;

pub(crate) struct HeaderCache {
    use_cache: Rc<UseCache>,
    mru: LruCache<MsgKey, MsgHdr>,
    /// When false, `touch` is a no-op and only identity is tracked.
    keep_recent: bool,
}

impl HeaderCache {
    pub fn new(capacity: NonZeroUsize, keep_recent: bool) -> Self {
        Self {
            use_cache: Rc::new(RefCell::new(HashMap::new())),
            mru: LruCache::new(capacity),
            keep_recent,
        }
    }

    /// The live object for `key`, if any caller still holds one.
    pub fn lookup(&self, key: MsgKey) -> Option<MsgHdr> {
        self.use_cache
            .borrow()
            .get(&key)
            .and_then(|weak| weak.upgrade())
            .map(MsgHdr::from_inner)
    }

    /// Return the live object for `key`, or build one with `load`.
    ///
    /// `load` returning `Ok(None)` means there is no such row.
    pub fn get_or_create<E>(
        &mut self,
        key: MsgKey,
        load: impl FnOnce() -> Result<Option<(RowId, HdrData)>, E>,
    ) -> Result<Option<MsgHdr>, E> {
        if let Some(hdr) = self.lookup(key) {
            return Ok(Some(hdr));
        }
        Ok(load()?.map(|(row, data)| self.insert(key, row, data)))
    }

    /// Register a freshly constructed header object.
    pub fn insert(&mut self, key: MsgKey, row: RowId, data: HdrData) -> MsgHdr {
        let hdr = MsgHdr::new(key, row, data, &self.use_cache);
        self.use_cache.borrow_mut().insert(key, hdr.downgrade());
        hdr
    }

    /// Mark `hdr` as most recently used, evicting the oldest entry when full.
    pub fn touch(&mut self, hdr: &MsgHdr) {
        if !self.keep_recent {
            return;
        }
        if let Some((evicted, _)) = self.mru.push(hdr.key(), hdr.clone())
            && evicted != hdr.key()
        {
            tracing::debug!("Evicted header {} from MRU cache", evicted);
        }
    }

    /// Forget `key` in both tiers, returning the live object if there was one.
    pub fn remove(&mut self, key: MsgKey) -> Option<MsgHdr> {
        let live = self.lookup(key);
        self.mru.pop(&key);
        self.use_cache.borrow_mut().remove(&key);
        live
    }

    pub fn resize(&mut self, capacity: usize) -> Result<(), ParamError> {
        let capacity = NonZeroUsize::new(capacity).ok_or(ParamError::ZeroCacheSize)?;
        self.mru.resize(capacity);
        Ok(())
    }

    /// Drop the MRU tier. Objects held elsewhere stay live and indexed.
    pub fn clear(&mut self) {
        self.mru.clear();
        self.use_cache
            .borrow_mut()
            .retain(|_, weak| weak.strong_count() > 0);
    }

    pub fn capacity(&self) -> usize {
        self.mru.cap().get()
    }

    #[cfg(test)]
    pub fn recent_len(&self) -> usize {
        self.mru.len()
    }

    #[cfg(test)]
    pub fn is_recent(&self, key: MsgKey) -> bool {
        self.mru.contains(&key)
    }

    #[cfg(test)]
    /// Number of header objects currently alive.
    pub fn live_len(&self) -> usize {
        self.use_cache
            .borrow()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}
