//! Retention: purge headers by age or count, clear stale offline bodies.

use chrono::Utc;

use super::Database;
use crate::constants::SECS_PER_DAY;
use crate::error::Result;
use crate::mail::{MsgFlags, MsgKey};
use crate::policy::{RetainBy, RetentionSettings};

/// What a retention pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    /// Keys of the headers removed, oldest first.
    pub removed: Vec<MsgKey>,
    /// Total size of the removed messages.
    pub bytes_removed: u64,
    /// Keys whose offline body metadata was cleared.
    pub bodies_cleared: Vec<MsgKey>,
}

impl PurgeReport {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.bodies_cleared.is_empty()
    }
}

struct Candidate {
    key: MsgKey,
    date: i64,
    flags: MsgFlags,
}

fn cutoff(days: u32, now: i64) -> i64 {
    now - i64::from(days) * SECS_PER_DAY
}

impl Database {
    /// Every header, oldest first (ties broken by key).
    fn headers_by_date(&self) -> Result<Vec<Candidate>> {
        let mut candidates = Vec::new();
        for key in self.list_all_keys() {
            if let Some(data) = self.peek_data(key)? {
                candidates.push(Candidate {
                    key,
                    date: data.date,
                    flags: data.flags,
                });
            }
        }
        candidates.sort_by(|a, b| a.date.cmp(&b.date).then(a.key.cmp(&b.key)));
        Ok(candidates)
    }

    /// Remove every header dated more than `days` days ago.
    ///
    /// Flagged messages survive unless `include_flagged` is set.
    pub fn purge_older_than(&mut self, days: u32, include_flagged: bool) -> Result<Vec<MsgKey>> {
        self.ensure_open()?;
        let now = Utc::now().timestamp();
        let result = self.purge_older_than_at(days, include_flagged, now);
        self.check(result)
    }

    fn purge_older_than_at(
        &mut self,
        days: u32,
        include_flagged: bool,
        now: i64,
    ) -> Result<Vec<MsgKey>> {
        let cutoff = cutoff(days, now);
        let keys: Vec<MsgKey> = self
            .headers_by_date()?
            .into_iter()
            .take_while(|c| c.date < cutoff)
            .filter(|c| include_flagged || !c.flags.contains(MsgFlags::MARKED))
            .map(|c| c.key)
            .collect();
        self.purge_keys(&keys, "age")
    }

    /// Remove the oldest headers until at most `max_count` remain.
    ///
    /// Flagged messages are skipped unless `include_flagged` is set, so more
    /// than `max_count` may remain.
    pub fn purge_excess(&mut self, max_count: u32, include_flagged: bool) -> Result<Vec<MsgKey>> {
        self.ensure_open()?;
        let result = self.purge_excess_inner(max_count, include_flagged);
        self.check(result)
    }

    fn purge_excess_inner(&mut self, max_count: u32, include_flagged: bool) -> Result<Vec<MsgKey>> {
        let total = self.num_messages();
        let Some(excess) = total.checked_sub(max_count as usize).filter(|&n| n > 0) else {
            return Ok(Vec::new());
        };
        let keys: Vec<MsgKey> = self
            .headers_by_date()?
            .into_iter()
            .filter(|c| include_flagged || !c.flags.contains(MsgFlags::MARKED))
            .take(excess)
            .map(|c| c.key)
            .collect();
        self.purge_keys(&keys, "count")
    }

    fn purge_keys(&mut self, keys: &[MsgKey], rule: &str) -> Result<Vec<MsgKey>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let expunged_before = self.folder_info.expunged_bytes;
        let removed = self.delete_messages_inner(keys, None)?;
        tracing::info!(
            "Purged {} headers by {} from {:?} ({} bytes)",
            removed.len(),
            rule,
            self.path,
            self.folder_info.expunged_bytes - expunged_before
        );
        Ok(removed)
    }

    /// Drop offline body metadata of messages dated more than `days` days ago.
    ///
    /// Clears the OFFLINE flag and the stored offset and size; the headers stay.
    pub fn purge_offline_bodies_older_than(&mut self, days: u32) -> Result<Vec<MsgKey>> {
        self.ensure_open()?;
        let now = Utc::now().timestamp();
        let result = self.purge_offline_bodies_at(days, now);
        self.check(result)
    }

    fn purge_offline_bodies_at(&mut self, days: u32, now: i64) -> Result<Vec<MsgKey>> {
        let cutoff = cutoff(days, now);
        let keys: Vec<MsgKey> = self
            .headers_by_date()?
            .into_iter()
            .take_while(|c| c.date < cutoff)
            .filter(|c| c.flags.contains(MsgFlags::OFFLINE))
            .map(|c| c.key)
            .collect();

        let mut cleared = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(hdr) = self.load_header(key, false)? else {
                continue;
            };
            {
                let mut data = hdr.data_mut();
                data.offline_offset = 0;
                data.offline_size = 0;
            }
            self.store
                .set_u64(hdr.row(), self.columns.offline_offset, 0)?;
            self.store.set_u32(hdr.row(), self.columns.offline_size, 0)?;
            self.set_hdr_flag(&hdr, false, MsgFlags::OFFLINE, None)?;
            cleared.push(key);
        }
        if !cleared.is_empty() {
            tracing::info!(
                "Cleared offline bodies of {} messages in {:?}",
                cleared.len(),
                self.path
            );
        }
        Ok(cleared)
    }

    /// Apply a retention policy, usually [`Database::retention_settings`].
    pub fn apply_retention_settings(
        &mut self,
        settings: &RetentionSettings,
    ) -> Result<PurgeReport> {
        self.ensure_open()?;
        let now = Utc::now().timestamp();
        let result = self.apply_retention_at(settings, now);
        self.check(result)
    }

    fn apply_retention_at(
        &mut self,
        settings: &RetentionSettings,
        now: i64,
    ) -> Result<PurgeReport> {
        let mut report = PurgeReport::default();
        let expunged_before = self.folder_info.expunged_bytes;

        report.removed = match settings.retain_by {
            RetainBy::All => Vec::new(),
            RetainBy::Age => self.purge_older_than_at(
                settings.days_to_keep_headers,
                settings.apply_to_flagged,
                now,
            )?,
            RetainBy::Count => {
                self.purge_excess_inner(settings.num_headers_to_keep, settings.apply_to_flagged)?
            }
        };
        report.bytes_removed = self.folder_info.expunged_bytes - expunged_before;

        if settings.cleanup_bodies_by_days {
            report.bodies_cleared =
                self.purge_offline_bodies_at(settings.days_to_keep_bodies, now)?;
        }

        if !report.is_empty() {
            self.announcer.summary_changed();
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::OpenOptions;
    use crate::mail::NewHeader;

    const NOW: i64 = 1_750_000_000;

    fn header(key: MsgKey, days_old: i64, flags: MsgFlags) -> NewHeader {
        NewHeader {
            key: Some(key),
            flags,
            subject: format!("message {}", key),
            message_id: format!("{}@example.com", key),
            date: NOW - days_old * SECS_PER_DAY,
            size: 100,
            ..Default::default()
        }
    }

    async fn db_with(headers: Vec<NewHeader>) -> Database {
        let mut db = Database::open_in_memory(OpenOptions::default()).await.unwrap();
        for h in headers {
            db.add_header(h).unwrap();
        }
        db
    }

    #[tokio::test]
    async fn test_purge_older_than_keeps_flagged() {
        let mut db = db_with(vec![
            header(1, 60, MsgFlags::empty()),
            header(2, 45, MsgFlags::MARKED),
            header(3, 31, MsgFlags::READ),
            header(4, 29, MsgFlags::empty()),
            header(5, 1, MsgFlags::MARKED),
        ])
        .await;

        let removed = db.purge_older_than_at(30, false, NOW).unwrap();
        assert_eq!(removed, vec![1, 3]);
        assert_eq!(db.list_all_keys(), vec![2, 4, 5]);
        assert_eq!(db.folder_info().num_messages, 3);
        assert_eq!(db.folder_info().expunged_bytes, 200);
    }

    #[tokio::test]
    async fn test_purge_older_than_including_flagged() {
        let mut db = db_with(vec![
            header(1, 60, MsgFlags::MARKED),
            header(2, 10, MsgFlags::MARKED),
        ])
        .await;

        let removed = db.purge_older_than_at(30, true, NOW).unwrap();
        assert_eq!(removed, vec![1]);
    }

    #[tokio::test]
    async fn test_purge_excess_removes_oldest_unflagged() {
        let mut db = db_with(vec![
            header(1, 5, MsgFlags::empty()),
            header(2, 50, MsgFlags::MARKED),
            header(3, 40, MsgFlags::empty()),
            header(4, 30, MsgFlags::empty()),
            header(5, 1, MsgFlags::empty()),
        ])
        .await;

        let removed = db.purge_excess_inner(3, false).unwrap();
        assert_eq!(removed, vec![3, 4]);
        assert_eq!(db.list_all_keys(), vec![1, 2, 5]);

        assert!(db.purge_excess_inner(3, false).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retention_by_age_and_bodies() {
        let mut db = db_with(vec![
            header(1, 100, MsgFlags::empty()),
            header(2, 20, MsgFlags::OFFLINE),
            header(3, 2, MsgFlags::OFFLINE),
        ])
        .await;

        let settings = RetentionSettings {
            retain_by: RetainBy::Age,
            days_to_keep_headers: 60,
            cleanup_bodies_by_days: true,
            days_to_keep_bodies: 10,
            ..Default::default()
        };
        let report = db.apply_retention_at(&settings, NOW).unwrap();
        assert_eq!(report.removed, vec![1]);
        assert_eq!(report.bytes_removed, 100);
        assert_eq!(report.bodies_cleared, vec![2]);

        let hdr = db.get_header_for_key(2).unwrap().unwrap();
        assert!(!hdr.flags().contains(MsgFlags::OFFLINE));
        assert_eq!(hdr.data().offline_size, 0);
        let hdr = db.get_header_for_key(3).unwrap().unwrap();
        assert!(hdr.flags().contains(MsgFlags::OFFLINE));
    }

    #[tokio::test]
    async fn test_retain_all_removes_nothing() {
        let mut db = db_with(vec![header(1, 1000, MsgFlags::empty())]).await;
        let report = db
            .apply_retention_at(&RetentionSettings::default(), NOW)
            .unwrap();
        assert!(report.is_empty());
        assert!(db.contains_key(1));
    }
}
