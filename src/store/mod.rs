//! Row store backing a folder database.
//!
//! This module is split into:
//! - `mod.rs` - RowStore struct, tokens, tables, rows, load and commit
//! - `schema.rs` - SQLite schema initialization
//! - `cells.rs` - Typed cell accessors (integers, booleans, strings, named properties)
//!
//! The whole store is held in memory once opened. Reads and writes are
//! synchronous; only `open`, `commit` and `close` touch SQLite.

mod cells;
mod schema;

use futures::TryStreamExt;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::StoreError;

/// A database has exactly one owner, so one connection is enough.
const POOL_SIZE: u32 = 1;

/// Interned property, scope or kind name.
pub type Token = u32;

/// A row, addressed by its scope and object id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId {
    pub scope: Token,
    pub oid: u64,
}

/// A table, addressed by row scope and table kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableId {
    pub scope: Token,
    pub kind: Token,
}

type Cells = HashMap<Token, Vec<u8>>;

/// Everything read back from SQLite on open.
#[derive(Default)]
struct Contents {
    tokens: HashMap<String, Token>,
    names: HashMap<Token, String>,
    tables: HashMap<TableId, BTreeSet<u64>>,
    rows: HashMap<RowId, Cells>,
}

pub struct RowStore {
    pool: SqlitePool,
    path: Option<PathBuf>,
    tokens: HashMap<String, Token>,
    names: HashMap<Token, String>,
    tables: HashMap<TableId, BTreeSet<u64>>,
    rows: HashMap<RowId, Cells>,
    next_token: Token,
    /// Next unused object id per row scope.
    next_oids: HashMap<Token, u64>,
    // Pending changes, written on commit
    new_tokens: Vec<Token>,
    new_tables: HashSet<TableId>,
    membership: HashMap<(TableId, u64), bool>,
    dirty_rows: HashSet<RowId>,
    removed_rows: HashSet<RowId>,
}

/// Iterates the rows of a table in object id order.
///
/// The cursor works on a snapshot, so the table may be modified while iterating.
pub struct TableCursor {
    scope: Token,
    oids: std::vec::IntoIter<u64>,
}

impl Iterator for TableCursor {
    type Item = RowId;

    fn next(&mut self) -> Option<RowId> {
        self.oids.next().map(|oid| RowId {
            scope: self.scope,
            oid,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.oids.size_hint()
    }
}

impl RowStore {
    /// Open the store file at `path`, creating it when `create` is set.
    pub async fn open(path: &Path, create: bool) -> Result<Self, StoreError> {
        // Rollback journal keeps the summary a single file
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(create)
            .journal_mode(SqliteJournalMode::Delete)
            .busy_timeout(Duration::from_secs(5))
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(POOL_SIZE)
            .connect_with(options)
            .await
            .map_err(StoreError::sqlite("connect"))?;

        Self::from_pool(pool, Some(path.to_path_buf())).await
    }

    /// Open an empty store that lives only in memory.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(StoreError::sqlite("connect"))?;

        // The data vanishes with the connection, so it must never be recycled
        let pool = SqlitePoolOptions::new()
            .max_connections(POOL_SIZE)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(StoreError::sqlite("connect"))?;

        Self::from_pool(pool, None).await
    }

    async fn from_pool(pool: SqlitePool, path: Option<PathBuf>) -> Result<Self, StoreError> {
        schema::init_schema(&pool).await?;
        let contents = load(&pool).await?;

        tracing::debug!(
            "Loaded store {:?}: {} tokens, {} tables, {} rows",
            path,
            contents.tokens.len(),
            contents.tables.len(),
            contents.rows.len()
        );

        let next_token = contents.names.keys().max().map_or(1, |max| max + 1);
        let mut next_oids: HashMap<Token, u64> = HashMap::new();
        for row in contents.rows.keys() {
            let next = next_oids.entry(row.scope).or_insert(1);
            *next = (*next).max(row.oid + 1);
        }

        Ok(Self {
            pool,
            path,
            next_token,
            next_oids,
            tokens: contents.tokens,
            names: contents.names,
            tables: contents.tables,
            rows: contents.rows,
            new_tokens: Vec::new(),
            new_tables: HashSet::new(),
            membership: HashMap::new(),
            dirty_rows: HashSet::new(),
            removed_rows: HashSet::new(),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    //
    // Tokens
    //

    /// Resolve a name to its token, allocating one on first use.
    pub fn token(&mut self, name: &str) -> Token {
        if let Some(&token) = self.tokens.get(name) {
            return token;
        }
        let token = self.next_token;
        self.next_token += 1;
        self.tokens.insert(name.to_string(), token);
        self.names.insert(token, name.to_string());
        self.new_tokens.push(token);
        token
    }

    /// Resolve a name without allocating.
    pub fn find_token(&self, name: &str) -> Option<Token> {
        self.tokens.get(name).copied()
    }

    pub fn token_name(&self, token: Token) -> Option<&str> {
        self.names.get(&token).map(String::as_str)
    }

    //
    // Tables
    //

    /// Get a table, creating it if missing.
    pub fn table(&mut self, scope: Token, kind: Token) -> TableId {
        let id = TableId { scope, kind };
        if !self.tables.contains_key(&id) {
            self.tables.insert(id, BTreeSet::new());
            self.new_tables.insert(id);
        }
        id
    }

    pub fn has_table(&self, scope: Token, kind: Token) -> bool {
        self.tables.contains_key(&TableId { scope, kind })
    }

    pub fn row_count(&self, table: TableId) -> usize {
        self.tables.get(&table).map_or(0, BTreeSet::len)
    }

    pub fn contains(&self, table: TableId, oid: u64) -> bool {
        self.tables
            .get(&table)
            .is_some_and(|oids| oids.contains(&oid))
    }

    pub fn cursor(&self, table: TableId) -> TableCursor {
        let oids: Vec<u64> = self
            .tables
            .get(&table)
            .map(|oids| oids.iter().copied().collect())
            .unwrap_or_default();
        TableCursor {
            scope: table.scope,
            oids: oids.into_iter(),
        }
    }

    //
    // Rows
    //

    /// Add a new row to `table` with the next free object id in its scope.
    pub fn new_row(&mut self, table: TableId) -> RowId {
        let oid = self.next_oids.get(&table.scope).copied().unwrap_or(1);
        self.new_row_with_oid(table, oid)
    }

    /// Add the row with a caller-chosen object id to `table`.
    /// An existing row with that id is reused.
    pub fn new_row_with_oid(&mut self, table: TableId, oid: u64) -> RowId {
        let row = RowId {
            scope: table.scope,
            oid,
        };
        self.rows.entry(row).or_default();
        let next = self.next_oids.entry(table.scope).or_insert(1);
        *next = (*next).max(oid.saturating_add(1));
        self.removed_rows.remove(&row);
        self.dirty_rows.insert(row);
        self.table(table.scope, table.kind);
        if let Some(oids) = self.tables.get_mut(&table)
            && oids.insert(oid)
        {
            self.membership.insert((table, oid), true);
        }
        row
    }

    pub fn row_exists(&self, row: RowId) -> bool {
        self.rows.contains_key(&row)
    }

    /// Remove a row from `table` and discard its cells.
    pub fn cut_row(&mut self, table: TableId, oid: u64) -> bool {
        let was_member = self
            .tables
            .get_mut(&table)
            .is_some_and(|oids| oids.remove(&oid));
        if was_member {
            self.membership.insert((table, oid), false);
        }
        let row = RowId {
            scope: table.scope,
            oid,
        };
        if self.rows.remove(&row).is_some() {
            self.dirty_rows.remove(&row);
            self.removed_rows.insert(row);
        }
        was_member
    }

    /// Raw cell bytes, `None` when the column was never set.
    pub fn get_cell(&self, row: RowId, token: Token) -> Result<Option<&[u8]>, StoreError> {
        let cells = self.rows.get(&row).ok_or(StoreError::RowMissing {
            op: "get_cell",
            row,
        })?;
        Ok(cells.get(&token).map(Vec::as_slice))
    }

    pub fn set_cell(&mut self, row: RowId, token: Token, value: &[u8]) -> Result<(), StoreError> {
        let cells = self.rows.get_mut(&row).ok_or(StoreError::RowMissing {
            op: "set_cell",
            row,
        })?;
        if cells.get(&token).map(Vec::as_slice) != Some(value) {
            cells.insert(token, value.to_vec());
            self.dirty_rows.insert(row);
        }
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        !self.new_tokens.is_empty()
            || !self.new_tables.is_empty()
            || !self.membership.is_empty()
            || !self.dirty_rows.is_empty()
            || !self.removed_rows.is_empty()
    }

    /// Write all pending changes in one transaction.
    pub async fn commit(&mut self) -> Result<(), StoreError> {
        if !self.is_dirty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(StoreError::sqlite("commit"))?;

        for token in &self.new_tokens {
            let name = self.names.get(token).map(String::as_str).unwrap_or_default();
            sqlx::query("INSERT OR REPLACE INTO store_tokens (token, name) VALUES (?, ?)")
                .bind(i64::from(*token))
                .bind(name)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::sqlite("commit tokens"))?;
        }

        for table in &self.new_tables {
            sqlx::query("INSERT OR IGNORE INTO store_tables (scope, kind) VALUES (?, ?)")
                .bind(i64::from(table.scope))
                .bind(i64::from(table.kind))
                .execute(&mut *tx)
                .await
                .map_err(StoreError::sqlite("commit tables"))?;
        }

        for (&(table, oid), &present) in &self.membership {
            let sql = if present {
                "INSERT OR IGNORE INTO store_table_rows (scope, kind, oid) VALUES (?, ?, ?)"
            } else {
                "DELETE FROM store_table_rows WHERE scope = ? AND kind = ? AND oid = ?"
            };
            sqlx::query(sql)
                .bind(i64::from(table.scope))
                .bind(i64::from(table.kind))
                .bind(oid as i64)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::sqlite("commit membership"))?;
        }

        for row in self.removed_rows.iter().chain(self.dirty_rows.iter()) {
            sqlx::query("DELETE FROM store_cells WHERE scope = ? AND oid = ?")
                .bind(i64::from(row.scope))
                .bind(row.oid as i64)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::sqlite("commit cells"))?;
        }

        for row in &self.dirty_rows {
            let Some(cells) = self.rows.get(row) else {
                continue;
            };
            for (token, value) in cells {
                sqlx::query(
                    "INSERT INTO store_cells (scope, oid, token, value) VALUES (?, ?, ?, ?)",
                )
                .bind(i64::from(row.scope))
                .bind(row.oid as i64)
                .bind(i64::from(*token))
                .bind(value.as_slice())
                .execute(&mut *tx)
                .await
                .map_err(StoreError::sqlite("commit cells"))?;
            }
        }

        tx.commit().await.map_err(StoreError::sqlite("commit"))?;

        tracing::debug!(
            "Committed store {:?}: {} rows written, {} rows removed",
            self.path,
            self.dirty_rows.len(),
            self.removed_rows.len()
        );

        self.new_tokens.clear();
        self.new_tables.clear();
        self.membership.clear();
        self.dirty_rows.clear();
        self.removed_rows.clear();
        Ok(())
    }

    /// Close the connection pool. Uncommitted changes are discarded.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

fn column<'r, T>(row: &'r sqlx::sqlite::SqliteRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name).map_err(StoreError::sqlite("load"))
}

fn token_from(value: i64, what: &str) -> Result<Token, StoreError> {
    Token::try_from(value).map_err(|_| StoreError::Malformed {
        op: "load",
        detail: format!("{what} token {value} out of range"),
    })
}

/// Read the whole store into memory.
async fn load(pool: &SqlitePool) -> Result<Contents, StoreError> {
    let mut contents = Contents::default();

    let mut rows = sqlx::query("SELECT token, name FROM store_tokens").fetch(pool);
    while let Some(row) = rows.try_next().await.map_err(StoreError::sqlite("load"))? {
        let token = token_from(column(&row, "token")?, "name")?;
        let name: String = column(&row, "name")?;
        contents.tokens.insert(name.clone(), token);
        contents.names.insert(token, name);
    }
    drop(rows);

    let mut rows = sqlx::query("SELECT scope, kind FROM store_tables").fetch(pool);
    while let Some(row) = rows.try_next().await.map_err(StoreError::sqlite("load"))? {
        let table = TableId {
            scope: token_from(column(&row, "scope")?, "scope")?,
            kind: token_from(column(&row, "kind")?, "kind")?,
        };
        contents.tables.entry(table).or_default();
    }
    drop(rows);

    let mut rows = sqlx::query("SELECT scope, kind, oid FROM store_table_rows").fetch(pool);
    while let Some(row) = rows.try_next().await.map_err(StoreError::sqlite("load"))? {
        let table = TableId {
            scope: token_from(column(&row, "scope")?, "scope")?,
            kind: token_from(column(&row, "kind")?, "kind")?,
        };
        let oid = column::<i64>(&row, "oid")? as u64;
        contents.tables.entry(table).or_default().insert(oid);
        contents
            .rows
            .entry(RowId {
                scope: table.scope,
                oid,
            })
            .or_default();
    }
    drop(rows);

    let mut rows = sqlx::query("SELECT scope, oid, token, value FROM store_cells").fetch(pool);
    while let Some(row) = rows.try_next().await.map_err(StoreError::sqlite("load"))? {
        let id = RowId {
            scope: token_from(column(&row, "scope")?, "scope")?,
            oid: column::<i64>(&row, "oid")? as u64,
        };
        let token = token_from(column(&row, "token")?, "column")?;
        if !contents.names.contains_key(&token) {
            return Err(StoreError::Malformed {
                op: "load",
                detail: format!("cell uses unknown token {token}"),
            });
        }
        let value: Vec<u8> = column(&row, "value")?;
        contents.rows.entry(id).or_default().insert(token, value);
    }

    Ok(contents)
}
