//! Opening folder databases with shared defaults.
//!
//! Listeners can register interest in a folder before its database is open;
//! they are hooked up every time that database is opened through the service.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::db::{Database, OpenOptions};
use crate::error::OpenError;
use crate::listener::{ChangeListener, same_listener};

pub struct DbService {
    defaults: OpenOptions,
    pending: HashMap<PathBuf, Vec<Rc<dyn ChangeListener>>>,
}

impl DbService {
    pub fn new(defaults: OpenOptions) -> Self {
        Self {
            defaults,
            pending: HashMap::new(),
        }
    }

    pub fn defaults(&self) -> &OpenOptions {
        &self.defaults
    }

    /// Open the database for the folder at `path` with the service defaults.
    pub async fn open_folder_db(
        &self,
        path: &Path,
        create: bool,
        leave_invalid: bool,
    ) -> Result<Database, OpenError> {
        let options = OpenOptions {
            create,
            leave_invalid,
            ..self.defaults.clone()
        };
        let db = Database::open_with(path, options).await?;
        self.hook_up_pending(path, &db);
        Ok(db)
    }

    /// Create an empty database at `path`, replacing anything there.
    pub async fn create_new_db(&self, path: &Path) -> Result<Database, OpenError> {
        let db = Database::open_fresh(path, self.defaults.clone()).await?;
        self.hook_up_pending(path, &db);
        Ok(db)
    }

    pub fn register_pending_listener(&mut self, path: &Path, listener: Rc<dyn ChangeListener>) {
        self.pending
            .entry(path.to_path_buf())
            .or_default()
            .push(listener);
    }

    /// Forget a pending listener for every folder; returns false if it was unknown.
    pub fn unregister_pending_listener(&mut self, listener: &Rc<dyn ChangeListener>) -> bool {
        let mut found = false;
        for listeners in self.pending.values_mut() {
            let before = listeners.len();
            listeners.retain(|l| !same_listener(l, listener));
            found |= listeners.len() != before;
        }
        self.pending.retain(|_, listeners| !listeners.is_empty());
        found
    }

    pub fn has_pending_listeners(&self, path: &Path) -> bool {
        self.pending.contains_key(path)
    }

    fn hook_up_pending(&self, path: &Path, db: &Database) {
        if let Some(listeners) = self.pending.get(path) {
            tracing::debug!(
                "Hooking up {} pending listeners for {}",
                listeners.len(),
                path.display()
            );
            for listener in listeners {
                db.add_listener(listener.clone());
            }
        }
    }
}
