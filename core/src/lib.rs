//! Batched bulk inserts for relational tables.
//!
//! Rows go in either as value tuples or as model instances. Each call
//! optionally validates them, stamps `created_at`/`updated_at` style
//! columns, packs the survivors into as few INSERT statements as the
//! statement size limit allows and reports what was inserted and what was
//! rejected.

mod database;
pub use database::{
    backend::{
        BackendError, ColumnInfo, Dialect, ExecuteOutcome, ImportBackend, ImportConnection,
        RenderedStatement, StatementTemplate, TableSchema,
    },
    postgres::client::{PostgresClient, PostgresConnectionError, PostgresError},
    query_builder::quote_identifier,
    sql_value::SqlValue,
    sqlite::client::{SqliteClient, SqliteConnectionError, SqliteError},
};

mod import;
pub use import::{
    normalize::{ImportInput, ImportModel},
    options::{BatchErrorPolicy, ImportOptions},
    planner::{plan_batches, Batch, BatchLimits, PlanError},
    record::{Origin, Record},
    result::{BatchFailure, FailedInstance, ImportResult},
    timestamps::{Clock, FixedClock, SystemClock, TimeZoneSetting, TIMESTAMP_COLUMNS},
    validate::{RecordValidator, Rules, ValidationError},
    ImportError, Importer,
};

mod logger;
pub use logger::{setup_info_logger, setup_logger, LogConfig};

// export 3rd party dependencies
pub use async_trait::async_trait;
pub use tracing::{error as bulk_import_error, info as bulk_import_info};
