//! Opening, committing and closing a folder database.
//!
//! Opening is the only long suspension point. It is an ordinary future:
//! dropping it before completion abandons the open and leaves no database.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::folder_info::FolderInfo;
use super::hdr_cache::HeaderCache;
use super::threading::load_threads;
use super::{Columns, Database, DbState};
use crate::constants::*;
use crate::error::{self, OpenError, StoreError};
use crate::folder::Folder;
use crate::policy::{DownloadSettings, RetentionSettings, ThreadingPolicy};
use crate::store::{RowId, RowStore};
use crate::telemetry::UsageSink;

/// How to open a database.
#[derive(Clone)]
pub struct OpenOptions {
    /// Create the file if it doesn't exist.
    pub create: bool,
    /// Keep a corrupt file on disk instead of replacing it.
    pub leave_invalid: bool,
    pub hdr_cache_size: usize,
    /// Keep recently used headers alive in the MRU cache.
    pub cache_headers: bool,
    pub threading: ThreadingPolicy,
    pub retention: RetentionSettings,
    pub download: DownloadSettings,
    pub folder: Option<Rc<dyn Folder>>,
    pub usage: Option<Rc<dyn UsageSink>>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            create: true,
            leave_invalid: false,
            hdr_cache_size: DEFAULT_HDR_CACHE_SIZE,
            cache_headers: true,
            threading: ThreadingPolicy::default(),
            retention: RetentionSettings::default(),
            download: DownloadSettings::default(),
            folder: None,
            usage: None,
        }
    }
}

impl std::fmt::Debug for OpenOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenOptions")
            .field("create", &self.create)
            .field("leave_invalid", &self.leave_invalid)
            .field("hdr_cache_size", &self.hdr_cache_size)
            .field("cache_headers", &self.cache_headers)
            .field("threading", &self.threading)
            .field("has_folder", &self.folder.is_some())
            .finish()
    }
}

fn io_error(op: &'static str) -> impl FnOnce(std::io::Error) -> StoreError {
    move |source| StoreError::Io { op, source }
}

impl Database {
    /// Open the database at `path` with default options.
    pub async fn open(path: &Path, create: bool, leave_invalid: bool) -> Result<Self, OpenError> {
        let options = OpenOptions {
            create,
            leave_invalid,
            ..Default::default()
        };
        Self::open_with(path, options).await
    }

    /// Open the database at `path`.
    ///
    /// A stale or missing summary is reported as a recoverable error and the
    /// file is left alone; call [`Database::open_fresh`] to rebuild. A corrupt
    /// file is replaced unless `leave_invalid` is set.
    pub async fn open_with(path: &Path, options: OpenOptions) -> Result<Self, OpenError> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(io_error("open"))?;
        if !exists && !options.create {
            return Err(OpenError::TargetMissing(path.to_path_buf()));
        }

        // A file we create only counts once its summary is committed
        let mut created = (!exists).then(|| CreatedFile::new(path));

        let store = match RowStore::open(path, options.create).await {
            Ok(store) => store,
            Err(e) if e.is_corruption() => {
                return Err(Self::handle_corrupt(path, &options, e).await);
            }
            Err(e) => return Err(e.into()),
        };

        let mut db = Self::from_store(store, options)?;
        if let Some(created) = created.take() {
            db.init_folder_info().await?;
            created.keep();
            tracing::info!("Created folder database {}", path.display());
        } else if let Err(e) = db.check_summary(path) {
            tracing::warn!("Not using folder database: {}", e);
            db.store.close().await;
            return Err(e);
        }

        db.record_use();
        tracing::debug!(
            "Opened folder database {} ({} messages, {} threads)",
            path.display(),
            db.folder_info.num_messages,
            db.threads.len()
        );
        Ok(db)
    }

    /// Discard whatever is at `path` and create an empty database there.
    pub async fn open_fresh(path: &Path, options: OpenOptions) -> Result<Self, OpenError> {
        remove_store_files(path).await?;
        Self::open_with(
            path,
            OpenOptions {
                create: true,
                ..options
            },
        )
        .await
    }

    #[cfg(test)]
    pub async fn open_in_memory(options: OpenOptions) -> Result<Self, OpenError> {
        let store = RowStore::in_memory().await?;
        let mut db = Self::from_store(store, options)?;
        db.init_folder_info().await?;
        Ok(db)
    }

    async fn handle_corrupt(path: &Path, options: &OpenOptions, error: StoreError) -> OpenError {
        tracing::error!("Folder database {} is corrupt: {}", path.display(), error);
        if options.leave_invalid {
            return OpenError::Corrupt {
                path: path.to_path_buf(),
                preserved: true,
            };
        }

        if let Err(e) = remove_store_files(path).await {
            return e.into();
        }
        if options.create
            && let Err(e) = Self::create_replacement(path, options).await
        {
            tracing::warn!("Failed to create replacement database: {}", e);
        }
        OpenError::Corrupt {
            path: path.to_path_buf(),
            preserved: false,
        }
    }

    async fn create_replacement(path: &Path, options: &OpenOptions) -> Result<(), StoreError> {
        let store = RowStore::open(path, true).await?;
        let mut db = Self::from_store(store, options.clone())?;
        let result = db.init_folder_info().await;
        db.store.close().await;
        result
    }

    fn from_store(mut store: RowStore, options: OpenOptions) -> Result<Self, StoreError> {
        let columns = Columns::resolve(&mut store);

        let hdr_scope = store.token(HDR_ROW_SCOPE);
        let hdr_kind = store.token(HDR_TABLE_KIND);
        let hdr_table = store.table(hdr_scope, hdr_kind);

        let thread_scope = store.token(THREAD_ROW_SCOPE);
        let thread_kind = store.token(ALL_THREADS_TABLE_KIND);
        let thread_table = store.table(thread_scope, thread_kind);

        let info_scope = store.token(FOLDER_INFO_SCOPE);
        let info_kind = store.token(FOLDER_INFO_TABLE_KIND);
        let info_table = store.table(info_scope, info_kind);
        let info_row = RowId {
            scope: info_scope,
            oid: FOLDER_INFO_OID,
        };

        let folder_info = if store.contains(info_table, FOLDER_INFO_OID) {
            FolderInfo::load(&store, info_row, &columns)?
        } else {
            FolderInfo::default()
        };
        let threads = load_threads(&store, thread_table, &columns)?;

        let capacity = NonZeroUsize::new(options.hdr_cache_size).unwrap_or_else(|| {
            tracing::warn!(
                "Header cache size 0 is invalid, using {}",
                DEFAULT_HDR_CACHE_SIZE
            );
            NonZeroUsize::new(DEFAULT_HDR_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN)
        });
        let headers = HeaderCache::new(capacity, options.cache_headers);

        Ok(Self {
            path: store.path().map(Path::to_path_buf),
            store,
            columns,
            hdr_table,
            thread_table,
            info_table,
            info_row,
            folder_info,
            headers,
            threads,
            threading: None,
            policy: options.threading,
            announcer: Default::default(),
            folder: options.folder,
            retention: options.retention,
            download: options.download,
            usage: options.usage,
            next_pseudo_key: PSEUDO_KEY_START,
            new_keys: Vec::new(),
            state: DbState::Open,
        })
    }

    /// Write the folder info row of a brand new database and commit it.
    async fn init_folder_info(&mut self) -> Result<(), StoreError> {
        self.store.new_row_with_oid(self.info_table, FOLDER_INFO_OID);
        self.folder_info = FolderInfo {
            version: MSG_DB_VERSION,
            summary_valid: true,
            ..Default::default()
        };
        self.write_folder_info()?;
        self.store.commit().await
    }

    fn check_summary(&self, path: &Path) -> Result<(), OpenError> {
        if !self.store.contains(self.info_table, FOLDER_INFO_OID) {
            return Err(OpenError::SummaryMissing(path.to_path_buf()));
        }
        let info = &self.folder_info;
        if info.version != MSG_DB_VERSION {
            return Err(OpenError::SummaryOutOfDate {
                path: path.to_path_buf(),
                reason: format!("version {} (expected {})", info.version, MSG_DB_VERSION),
            });
        }
        if !info.summary_valid {
            return Err(OpenError::SummaryOutOfDate {
                path: path.to_path_buf(),
                reason: "summary marked invalid".to_string(),
            });
        }
        Ok(())
    }

    /// Write all pending changes to disk.
    ///
    /// A failed commit closes the database.
    pub async fn commit(&mut self) -> error::Result<()> {
        self.ensure_open()?;
        let result = self.store.commit().await.map_err(Into::into);
        self.record_use();
        self.check(result)
    }

    /// Close the database, optionally committing first.
    ///
    /// Listeners are told the database is going away and then dropped.
    /// Header objects held by callers stay readable.
    pub async fn close(mut self, commit: bool) -> error::Result<()> {
        self.announcer.going_away();
        self.announcer.clear();
        self.headers.clear();
        self.threading = None;

        let result = if commit && self.state == DbState::Open {
            self.store.commit().await.map_err(Into::into)
        } else {
            Ok(())
        };
        self.record_use();
        tracing::debug!("Closed folder database {:?}", self.path);
        self.store.close().await;
        result
    }
}

/// Removes a freshly created store file unless `keep` is called.
///
/// Dropping an open future between creating the file and committing its
/// summary would otherwise leave a file that reopens as `SummaryMissing`.
struct CreatedFile {
    path: Option<PathBuf>,
}

impl CreatedFile {
    fn new(path: &Path) -> Self {
        Self {
            path: Some(path.to_path_buf()),
        }
    }

    fn keep(mut self) {
        self.path = None;
    }
}

impl Drop for CreatedFile {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        for file in store_files(&path) {
            match std::fs::remove_file(&file) {
                Ok(()) => tracing::debug!("Removed abandoned {}", file.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Failed to remove {}: {}", file.display(), e),
            }
        }
    }
}

/// The store file and its rollback journal.
fn store_files(path: &Path) -> [PathBuf; 2] {
    let mut journal = path.as_os_str().to_os_string();
    journal.push("-journal");
    [path.to_path_buf(), journal.into()]
}

/// Remove a store file and its rollback journal, if present.
async fn remove_store_files(path: &Path) -> Result<(), StoreError> {
    for file in store_files(path) {
        match tokio::fs::remove_file(&file).await {
            Ok(()) => tracing::debug!("Removed {}", file.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_error("remove")(e)),
        }
    }
    Ok(())
}
