//! Retention, download and threading policy.
//!
//! These are plain configuration values. The database reads them but never
//! changes them.

use serde::{Deserialize, Serialize};

use crate::constants::SECS_PER_DAY;

/// Which rule decides what headers to keep.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RetainBy {
    #[default]
    All,
    /// Keep headers newer than `days_to_keep_headers`.
    Age,
    /// Keep the newest `num_headers_to_keep` headers.
    Count,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetentionSettings {
    #[serde(default)]
    pub retain_by: RetainBy,
    #[serde(default = "default_days_to_keep")]
    pub days_to_keep_headers: u32,
    #[serde(default = "default_num_headers_to_keep")]
    pub num_headers_to_keep: u32,
    /// Whether flagged messages may be purged too.
    #[serde(default)]
    pub apply_to_flagged: bool,
    #[serde(default = "default_true")]
    pub use_server_defaults: bool,
    /// Drop offline bodies of messages older than `days_to_keep_bodies`.
    #[serde(default)]
    pub cleanup_bodies_by_days: bool,
    #[serde(default = "default_days_to_keep")]
    pub days_to_keep_bodies: u32,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            retain_by: RetainBy::default(),
            days_to_keep_headers: default_days_to_keep(),
            num_headers_to_keep: default_num_headers_to_keep(),
            apply_to_flagged: false,
            use_server_defaults: true,
            cleanup_bodies_by_days: false,
            days_to_keep_bodies: default_days_to_keep(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownloadSettings {
    #[serde(default = "default_true")]
    pub use_server_defaults: bool,
    #[serde(default)]
    pub download_unread_only: bool,
    #[serde(default)]
    pub download_by_date: bool,
    /// Age limit in days, used when `download_by_date` is set.
    #[serde(default = "default_age_limit")]
    pub age_limit_days: u32,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            use_server_defaults: true,
            download_unread_only: false,
            download_by_date: false,
            age_limit_days: default_age_limit(),
        }
    }
}

impl DownloadSettings {
    /// Whether a message with the given read state and date (Unix seconds)
    /// should be downloaded for offline use at time `now`.
    pub fn accepts(&self, is_read: bool, date: i64, now: i64) -> bool {
        if self.download_unread_only && is_read {
            return false;
        }
        if self.download_by_date {
            let cutoff = now - i64::from(self.age_limit_days) * SECS_PER_DAY;
            return date >= cutoff;
        }
        true
    }
}

/// How new headers are placed into threads when no reference matches.
///
/// `strict` wins over everything else: no subject matching at all. Otherwise a
/// header is matched by subject only if its subject carried a reply prefix,
/// unless `thread_without_re` allows matching plain subjects too.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThreadingPolicy {
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub thread_without_re: bool,
    /// Reply/forward prefixes stripped before comparing subjects (case-insensitive, no colon).
    #[serde(default = "default_reply_prefixes")]
    pub reply_prefixes: Vec<String>,
}

impl Default for ThreadingPolicy {
    fn default() -> Self {
        Self {
            strict: false,
            thread_without_re: false,
            reply_prefixes: default_reply_prefixes(),
        }
    }
}

impl ThreadingPolicy {
    pub fn subject_threading_enabled(&self) -> bool {
        !self.strict
    }

    /// Strip reply prefixes repeatedly and lowercase.
    ///
    /// Returns the normalized subject and whether any prefix was removed.
    pub fn normalize_subject(&self, subject: &str) -> (String, bool) {
        let mut s = subject.trim();
        let mut stripped = false;
        while let Some(rest) = self.strip_prefix(s) {
            s = rest.trim_start();
            stripped = true;
        }
        (s.trim_end().to_lowercase(), stripped)
    }

    fn strip_prefix<'a>(&self, s: &'a str) -> Option<&'a str> {
        for prefix in &self.reply_prefixes {
            let Some(head) = s.get(..prefix.len()) else {
                continue;
            };
            if !head.eq_ignore_ascii_case(prefix) {
                continue;
            }
            let rest = &s[prefix.len()..];
            if let Some(rest) = rest.strip_prefix(':') {
                return Some(rest);
            }
            // Re[2]: style
            if rest.starts_with('[')
                && let Some(end) = rest.find("]:")
                && rest[1..end].chars().all(|c| c.is_ascii_digit())
            {
                return Some(&rest[end + 2..]);
            }
        }
        None
    }
}

fn default_true() -> bool {
    true
}

fn default_days_to_keep() -> u32 {
    30
}

fn default_num_headers_to_keep() -> u32 {
    2000
}

fn default_age_limit() -> u32 {
    30
}

fn default_reply_prefixes() -> Vec<String> {
    ["re", "fwd", "fw", "aw", "sv"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
