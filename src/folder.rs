//! Callbacks into the folder that owns a database.

use crate::policy::{DownloadSettings, RetentionSettings};

/// The owning folder.
///
/// The database only asks it for current policy and tells it when the summary
/// validity changes. Returning `None` from a settings getter means the
/// database falls back to the settings it was opened with.
pub trait Folder {
    fn retention_settings(&self) -> Option<RetentionSettings> {
        None
    }

    fn download_settings(&self) -> Option<DownloadSettings> {
        None
    }

    fn summary_validity_changed(&self, _valid: bool) {}
}
