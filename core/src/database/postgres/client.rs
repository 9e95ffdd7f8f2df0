use std::{env, time::Duration};

use async_trait::async_trait;
use bb8::{Pool, PooledConnection, RunError};
use bb8_postgres::PostgresConnectionManager;
use dotenv::dotenv;
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use tokio::{task, time::timeout};
pub use tokio_postgres::types::{ToSql, Type as PgType};
use tokio_postgres::{config::SslMode, Config, Error as PgError, Row, ToStatement};
use tracing::{debug, error, info};

use crate::database::backend::{
    BackendError, ColumnInfo, Dialect, ExecuteOutcome, ImportBackend, ImportConnection,
    RenderedStatement, TableSchema,
};

/// Postgres caps a single protocol message at 1GB.
pub const POSTGRES_MAX_STATEMENT_BYTES: usize = 1024 * 1024 * 1024 - 1;

pub fn connection_string() -> Result<String, env::VarError> {
    dotenv().ok();
    let connection = env::var("DATABASE_URL")?;
    Ok(connection)
}

#[derive(thiserror::Error, Debug)]
pub enum PostgresConnectionError {
    #[error("The database connection string is wrong please check your environment: {0}")]
    DatabaseConnectionConfigWrong(#[from] env::VarError),

    #[error("Connection pool error: {0}")]
    ConnectionPoolError(#[from] tokio_postgres::Error),

    #[error("Can not connect to the database please make sure your connection string is correct")]
    CanNotConnectToDatabase,

    #[error("Could not parse connection string make sure it is correctly formatted")]
    CouldNotParseConnectionString,

    #[error("Could not create tls connector")]
    CouldNotCreateTlsConnector,
}

#[derive(thiserror::Error, Debug)]
pub enum PostgresError {
    #[error("PgError {0}")]
    PgError(#[from] PgError),

    #[error("Connection pool error: {0}")]
    ConnectionPoolError(#[from] RunError<tokio_postgres::Error>),
}

impl From<PostgresError> for BackendError {
    fn from(e: PostgresError) -> Self {
        match e {
            PostgresError::PgError(e) => BackendError::Statement(e.to_string()),
            PostgresError::ConnectionPoolError(e) => BackendError::Connection(e.to_string()),
        }
    }
}

type PostgresPool = Pool<PostgresConnectionManager<MakeTlsConnector>>;

pub struct PostgresClient {
    pool: PostgresPool,
    max_statement_bytes: Option<usize>,
}

/// Splits `schema.table` into its parts, unquoting each.
pub fn split_table_name(table_name: &str) -> (Option<String>, String) {
    match table_name.split_once('.') {
        Some((schema, table)) => {
            (Some(schema.trim_matches('"').to_string()), table.trim_matches('"').to_string())
        }
        None => (None, table_name.trim_matches('"').to_string()),
    }
}

impl PostgresClient {
    /// Connects to the database named by `DATABASE_URL`.
    pub async fn new() -> Result<Self, PostgresConnectionError> {
        Self::connect_to(&connection_string()?).await
    }

    pub async fn connect_to(connection_str: &str) -> Result<Self, PostgresConnectionError> {
        async fn _new(
            connection_str: &str,
            disable_ssl: bool,
        ) -> Result<PostgresClient, PostgresConnectionError> {
            let mut config: Config = connection_str
                .parse()
                .map_err(|_| PostgresConnectionError::CouldNotParseConnectionString)?;

            if disable_ssl {
                config.ssl_mode(SslMode::Disable);
            }

            let connector = TlsConnector::builder()
                .build()
                .map_err(|_| PostgresConnectionError::CouldNotCreateTlsConnector)?;
            let tls_connector = MakeTlsConnector::new(connector);

            // Perform a direct connection test
            let (client, connection) =
                match timeout(Duration::from_millis(5000), config.connect(tls_connector.clone()))
                    .await
                {
                    Ok(Ok((client, connection))) => (client, connection),
                    Ok(Err(e)) => {
                        // retry without ssl if ssl has been attempted and failed
                        if !disable_ssl &&
                            config.get_ssl_mode() != SslMode::Disable &&
                            !connection_str.contains("sslmode=require")
                        {
                            return Box::pin(_new(connection_str, true)).await;
                        }
                        error!("Error connecting to database: {}", e);
                        return Err(PostgresConnectionError::CanNotConnectToDatabase);
                    }
                    Err(e) => {
                        error!("Timeout connecting to database: {}", e);
                        return Err(PostgresConnectionError::CanNotConnectToDatabase);
                    }
                };

            let connection_handle = task::spawn(connection);

            if client.query_one("SELECT 1", &[]).await.is_err() {
                return Err(PostgresConnectionError::CanNotConnectToDatabase);
            }

            drop(client);
            match connection_handle.await {
                Ok(Ok(())) => (),
                Ok(Err(_)) | Err(_) => return Err(PostgresConnectionError::CanNotConnectToDatabase),
            }

            let manager = PostgresConnectionManager::new(config, tls_connector);
            let pool = Pool::builder().build(manager).await?;

            info!("Connected to postgres");
            Ok(PostgresClient { pool, max_statement_bytes: Some(POSTGRES_MAX_STATEMENT_BYTES) })
        }

        _new(connection_str, false).await
    }

    /// Overrides the statement size limit, `None` for unbounded.
    pub fn with_max_statement_bytes(mut self, max_statement_bytes: Option<usize>) -> Self {
        self.max_statement_bytes = max_statement_bytes;
        self
    }

    pub async fn batch_execute(&self, sql: &str) -> Result<(), PostgresError> {
        let conn = self.pool.get().await?;
        conn.batch_execute(sql).await.map_err(PostgresError::PgError)
    }

    pub async fn query<T>(
        &self,
        query: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, PostgresError>
    where
        T: ?Sized + ToStatement,
    {
        let conn = self.pool.get().await?;
        let rows = conn.query(query, params).await.map_err(PostgresError::PgError)?;
        Ok(rows)
    }
}

#[async_trait]
impl ImportBackend for PostgresClient {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn max_statement_bytes(&self) -> Option<usize> {
        self.max_statement_bytes
    }

    async fn resolve_columns(&self, table: &str) -> Result<TableSchema, BackendError> {
        let (schema_name, table_name) = split_table_name(table);

        let rows = self
            .query(
                "SELECT column_name::text, data_type::text, is_nullable = 'YES'
                 FROM information_schema.columns
                 WHERE table_name::text = $1
                   AND table_schema::text = COALESCE($2::text, current_schema()::text)
                 ORDER BY ordinal_position",
                &[&table_name, &schema_name],
            )
            .await?;

        if rows.is_empty() {
            return Err(BackendError::TableNotFound(table.to_string()));
        }

        let columns = rows
            .iter()
            .map(|row| {
                Ok(ColumnInfo {
                    name: row.try_get(0)?,
                    sql_type: row.try_get(1)?,
                    nullable: row.try_get(2)?,
                })
            })
            .collect::<Result<Vec<_>, PgError>>()
            .map_err(PostgresError::PgError)?;

        let primary_keys = self
            .query(
                "SELECT kcu.column_name::text
                 FROM information_schema.table_constraints tc
                 JOIN information_schema.key_column_usage kcu
                   ON tc.constraint_name = kcu.constraint_name
                  AND tc.table_schema = kcu.table_schema
                 WHERE tc.constraint_type = 'PRIMARY KEY'
                   AND tc.table_name::text = $1
                   AND tc.table_schema::text = COALESCE($2::text, current_schema()::text)",
                &[&table_name, &schema_name],
            )
            .await?;

        let primary_key = match primary_keys.as_slice() {
            [only] => Some(only.try_get::<_, String>(0).map_err(PostgresError::PgError)?),
            _ => None,
        };

        debug!("Resolved {} columns for {}", columns.len(), table);
        Ok(TableSchema { table: table.to_string(), columns, primary_key })
    }

    async fn connect(&self) -> Result<Box<dyn ImportConnection + '_>, BackendError> {
        let conn = self.pool.get().await.map_err(PostgresError::ConnectionPoolError)?;
        Ok(Box::new(PostgresConnection { conn }))
    }
}

/// A pooled connection held for one import call and handed back on drop.
pub struct PostgresConnection<'a> {
    conn: PooledConnection<'a, PostgresConnectionManager<MakeTlsConnector>>,
}

fn row_id(row: &Row) -> Result<i64, PgError> {
    let column_type = row.columns().first().map(|column| column.type_());
    if column_type == Some(&PgType::INT2) {
        row.try_get::<_, i16>(0).map(i64::from)
    } else if column_type == Some(&PgType::INT4) {
        row.try_get::<_, i32>(0).map(i64::from)
    } else {
        row.try_get::<_, i64>(0)
    }
}

#[async_trait]
impl ImportConnection for PostgresConnection<'_> {
    async fn execute(
        &mut self,
        statement: &RenderedStatement,
        want_ids: bool,
    ) -> Result<ExecuteOutcome, BackendError> {
        if want_ids {
            let rows = self
                .conn
                .query(statement.sql.as_str(), &[])
                .await
                .map_err(PostgresError::PgError)?;
            let ids = rows
                .iter()
                .map(row_id)
                .collect::<Result<Vec<_>, _>>()
                .map_err(PostgresError::PgError)?;
            Ok(ExecuteOutcome { rows_affected: rows.len() as u64, ids })
        } else {
            let rows_affected = self
                .conn
                .execute(statement.sql.as_str(), &[])
                .await
                .map_err(PostgresError::PgError)?;
            Ok(ExecuteOutcome { rows_affected, ids: Vec::new() })
        }
    }
}
