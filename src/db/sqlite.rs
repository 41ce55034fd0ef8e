use crate::db::schema::{SQLITE_COLUMN_MIGRATIONS, SQLITE_INIT};
use crate::error::AppError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;
use tracing::info;

pub type SqlitePool = Pool<Sqlite>;

/// Repository over the application database. Table-specific queries live in
/// sibling modules as further `impl Storage` blocks.
#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

/// `%q%` for a `LIKE ... ESCAPE '\'` clause, with `q` matched literally.
pub(crate) fn contains_pattern(q: &str) -> String {
    let mut pattern = String::with_capacity(q.len() + 2);
    pattern.push('%');
    for c in q.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Open (creating if missing) the database at `database_url` and bring its
/// schema up to date.
pub async fn connect(database_url: &str) -> Result<Storage, AppError> {
    let connect_opts = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    // Each in-memory connection is its own database.
    let max_connections = if database_url.contains(":memory:") { 1 } else { 8 };
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(connect_opts)
        .await?;
    let storage = Storage::new(pool);
    storage.init_schema().await?;
    storage.migrate().await?;
    Ok(storage)
}

impl Storage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), AppError> {
        // sqlx::query runs a single statement
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Add columns introduced after the initial schema. Returns how many were added.
    pub async fn migrate(&self) -> Result<usize, AppError> {
        let mut applied = 0;
        for (table, column, decl) in SQLITE_COLUMN_MIGRATIONS {
            if self.has_column(table, column).await? {
                continue;
            }
            let ddl = format!("ALTER TABLE {table} ADD COLUMN {column} {decl}");
            sqlx::query(&ddl).execute(&self.pool).await?;
            info!(table, column, "added column");
            applied += 1;
        }
        Ok(applied)
    }

    async fn has_column(&self, table: &str, column: &str) -> Result<bool, AppError> {
        let rows = sqlx::query(&format!("PRAGMA table_info({table})"))
            .fetch_all(&self.pool)
            .await?;
        for row in rows {
            let name: String = row.try_get("name")?;
            if name.eq_ignore_ascii_case(column) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
