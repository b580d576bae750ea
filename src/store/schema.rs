//! Store schema initialization.

use sqlx::SqlitePool;

use crate::error::StoreError;

/// Create the token, table, membership and cell tables if they don't exist.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        -- Property and scope names, interned to small integers
        CREATE TABLE IF NOT EXISTS store_tokens (
            token INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        );

        -- Tables, identified by (row scope, table kind)
        CREATE TABLE IF NOT EXISTS store_tables (
            scope INTEGER NOT NULL,
            kind INTEGER NOT NULL,
            PRIMARY KEY (scope, kind)
        );

        -- Table membership
        CREATE TABLE IF NOT EXISTS store_table_rows (
            scope INTEGER NOT NULL,
            kind INTEGER NOT NULL,
            oid INTEGER NOT NULL,
            PRIMARY KEY (scope, kind, oid)
        );

        -- Cell values, one per (row, column token)
        CREATE TABLE IF NOT EXISTS store_cells (
            scope INTEGER NOT NULL,
            oid INTEGER NOT NULL,
            token INTEGER NOT NULL,
            value BLOB NOT NULL,
            PRIMARY KEY (scope, oid, token)
        );
        "#,
    )
    .execute(pool)
    .await
    .map_err(StoreError::sqlite("init schema"))?;

    Ok(())
}
