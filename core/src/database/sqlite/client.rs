use std::{
    env,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use dotenv::dotenv;
use rusqlite::Connection;
use tracing::{debug, error, info};

use crate::database::backend::{
    BackendError, ColumnInfo, Dialect, ExecuteOutcome, ImportBackend, ImportConnection,
    RenderedStatement, TableSchema,
};
use crate::database::query_builder::quote_identifier;

/// SQLITE_MAX_SQL_LENGTH as compiled into the bundled library.
pub const SQLITE_MAX_STATEMENT_BYTES: usize = 1_000_000_000;

pub fn connection_string() -> String {
    dotenv().ok();
    // Default to ./bulk_import.db if DATABASE_URL is not set
    env::var("DATABASE_URL").unwrap_or_else(|_| "./bulk_import.db".to_string())
}

#[derive(thiserror::Error, Debug)]
pub enum SqliteConnectionError {
    #[error("SQLite error: {0}")]
    SqliteError(#[from] SqliteError),

    #[error("Can not connect to the database please make sure your connection string is correct")]
    CanNotConnectToDatabase,
}

#[derive(thiserror::Error, Debug)]
pub enum SqliteError {
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    #[error("Failed to acquire connection lock")]
    ConnectionLockError,
}

impl From<SqliteError> for BackendError {
    fn from(e: SqliteError) -> Self {
        match e {
            SqliteError::SqliteError(e) => BackendError::Statement(e.to_string()),
            SqliteError::ConnectionLockError => BackendError::Connection(e.to_string()),
        }
    }
}

pub struct SqliteClient {
    db_path: String,
    max_statement_bytes: Option<usize>,
}

fn open_connection(db_path: &str) -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(conn)
}

impl SqliteClient {
    /// Opens the database named by `DATABASE_URL`.
    pub async fn new() -> Result<Self, SqliteConnectionError> {
        Self::open(connection_string()).await
    }

    pub async fn open(db_path: impl Into<String>) -> Result<Self, SqliteConnectionError> {
        let db_path = db_path.into();

        info!("Connecting to SQLite database at: {}", db_path);

        // Create parent directories if they don't exist
        let db_path_clone = db_path.clone();
        tokio::task::spawn_blocking(move || {
            if let Some(parent) = PathBuf::from(&db_path_clone).parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        error!("Failed to create parent directories for SQLite database: {}", e);
                        SqliteConnectionError::CanNotConnectToDatabase
                    })?;
                }
            }

            let conn = open_connection(&db_path_clone).map_err(|e| {
                error!("Error connecting to SQLite database: {}", e);
                SqliteConnectionError::CanNotConnectToDatabase
            })?;

            // Enable WAL mode for better concurrent performance
            conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;").map_err(
                |_e| {
                    error!("Error setting SQLite pragmas");
                    SqliteConnectionError::CanNotConnectToDatabase
                },
            )?;

            info!("Successfully connected to SQLite database");
            Ok::<(), SqliteConnectionError>(())
        })
        .await
        .map_err(|_| SqliteConnectionError::CanNotConnectToDatabase)??;

        Ok(SqliteClient { db_path, max_statement_bytes: Some(SQLITE_MAX_STATEMENT_BYTES) })
    }

    /// Overrides the statement size limit, `None` for unbounded.
    pub fn with_max_statement_bytes(mut self, max_statement_bytes: Option<usize>) -> Self {
        self.max_statement_bytes = max_statement_bytes;
        self
    }

    pub async fn batch_execute(&self, sql: &str) -> Result<(), SqliteError> {
        let db_path = self.db_path.clone();
        let sql = sql.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = open_connection(&db_path)?;
            conn.execute_batch(&sql)?;
            Ok::<(), rusqlite::Error>(())
        })
        .await
        .map_err(|_| SqliteError::ConnectionLockError)?
        .map_err(SqliteError::SqliteError)
    }
}

#[async_trait]
impl ImportBackend for SqliteClient {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn max_statement_bytes(&self) -> Option<usize> {
        self.max_statement_bytes
    }

    async fn resolve_columns(&self, table: &str) -> Result<TableSchema, BackendError> {
        let db_path = self.db_path.clone();
        let table = table.to_string();

        let schema = tokio::task::spawn_blocking(move || {
            let conn = open_connection(&db_path)?;
            let mut stmt =
                conn.prepare(&format!("PRAGMA table_info({})", quote_identifier(&table)))?;
            // cid, name, type, notnull, dflt_value, pk
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        ColumnInfo {
                            name: row.get(1)?,
                            sql_type: row.get(2)?,
                            nullable: row.get::<_, i64>(3)? == 0,
                        },
                        row.get::<_, i64>(5)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let primary_keys: Vec<&ColumnInfo> =
                rows.iter().filter(|(_, pk)| *pk > 0).map(|(column, _)| column).collect();
            let primary_key = match primary_keys.as_slice() {
                [only] => Some(only.name.clone()),
                _ => None,
            };

            Ok::<TableSchema, SqliteError>(TableSchema {
                table,
                columns: rows.into_iter().map(|(column, _)| column).collect(),
                primary_key,
            })
        })
        .await
        .map_err(|_| SqliteError::ConnectionLockError)??;

        if schema.columns.is_empty() {
            return Err(BackendError::TableNotFound(schema.table));
        }

        debug!("Resolved {} columns for {}", schema.columns.len(), schema.table);
        Ok(schema)
    }

    async fn connect(&self) -> Result<Box<dyn ImportConnection + '_>, BackendError> {
        let db_path = self.db_path.clone();
        let conn = tokio::task::spawn_blocking(move || open_connection(&db_path))
            .await
            .map_err(|_| SqliteError::ConnectionLockError)?
            .map_err(SqliteError::SqliteError)?;

        Ok(Box::new(SqliteConnection { conn: Arc::new(Mutex::new(conn)) }))
    }
}

/// A connection opened for one import call and closed when dropped.
pub struct SqliteConnection {
    conn: Arc<Mutex<Connection>>,
}

#[async_trait]
impl ImportConnection for SqliteConnection {
    async fn execute(
        &mut self,
        statement: &RenderedStatement,
        want_ids: bool,
    ) -> Result<ExecuteOutcome, BackendError> {
        let conn = Arc::clone(&self.conn);
        let sql = statement.sql.clone();

        let outcome = tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| SqliteError::ConnectionLockError)?;

            if want_ids {
                let mut stmt = conn.prepare(&sql)?;
                let ids = stmt
                    .query_map([], |row| row.get::<_, i64>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok::<ExecuteOutcome, SqliteError>(ExecuteOutcome {
                    rows_affected: ids.len() as u64,
                    ids,
                })
            } else {
                let rows_affected = conn.execute(&sql, [])?;
                Ok(ExecuteOutcome { rows_affected: rows_affected as u64, ids: Vec::new() })
            }
        })
        .await
        .map_err(|_| SqliteError::ConnectionLockError)??;

        Ok(outcome)
    }
}
