use async_trait::async_trait;

use crate::database::query_builder::{render_insert, render_values, statement_template};
use crate::import::record::Record;

/// The SQL flavour a backend speaks, used when rendering literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub sql_type: String,
    pub nullable: bool,
}

/// What the backend knows about the target table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<ColumnInfo>,
    pub primary_key: Option<String>,
}

impl TableSchema {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }

    /// The primary key column when there is exactly one and it holds
    /// integers, which is what generated ids are reported for.
    pub fn integer_primary_key(&self) -> Option<&str> {
        let primary_key = self.primary_key.as_deref()?;
        self.columns
            .iter()
            .find(|column| column.name == primary_key)
            .filter(|column| is_integer_type(&column.sql_type))
            .map(|column| column.name.as_str())
    }
}

/// Integer type names as reported by `information_schema` and
/// `PRAGMA table_info`.
const INTEGER_TYPES: &[&str] = &[
    "INT",
    "INTEGER",
    "TINYINT",
    "SMALLINT",
    "MEDIUMINT",
    "BIGINT",
    "INT2",
    "INT4",
    "INT8",
    "UNSIGNED BIG INT",
];

fn is_integer_type(sql_type: &str) -> bool {
    let sql_type = sql_type.trim().to_ascii_uppercase();
    // drop a display width such as INT(11)
    let base = sql_type.split('(').next().unwrap_or_default().trim();
    INTEGER_TYPES.contains(&base)
}

/// The fixed part of an INSERT statement. Everything around the VALUES list
/// counts towards the per-statement overhead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementTemplate {
    pub prefix: String,
    pub suffix: String,
}

impl StatementTemplate {
    pub fn overhead(&self) -> usize {
        self.prefix.len() + self.suffix.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedStatement {
    pub sql: String,
    pub rows: usize,
}

impl RenderedStatement {
    pub fn byte_len(&self) -> usize {
        self.sql.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteOutcome {
    pub rows_affected: u64,
    pub ids: Vec<i64>,
}

#[derive(thiserror::Error, Debug)]
pub enum BackendError {
    #[error("Table {0} does not exist")]
    TableNotFound(String),

    #[error("Could not acquire a database connection: {0}")]
    Connection(String),

    #[error("Statement failed: {0}")]
    Statement(String),
}

/// A connection held for the whole of one import call. Dropping it hands
/// the connection back to wherever it came from.
#[async_trait]
pub trait ImportConnection: Send {
    async fn execute(
        &mut self,
        statement: &RenderedStatement,
        want_ids: bool,
    ) -> Result<ExecuteOutcome, BackendError>;
}

/// The persistence layer the import engine drives: schema introspection,
/// statement rendering and execution.
#[async_trait]
pub trait ImportBackend: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Largest statement in bytes the server accepts, `None` when unbounded.
    fn max_statement_bytes(&self) -> Option<usize>;

    async fn resolve_columns(&self, table: &str) -> Result<TableSchema, BackendError>;

    async fn connect(&self) -> Result<Box<dyn ImportConnection + '_>, BackendError>;

    fn statement_template(
        &self,
        schema: &TableSchema,
        columns: &[String],
        want_ids: bool,
    ) -> StatementTemplate {
        let returning = if want_ids { schema.integer_primary_key() } else { None };
        statement_template(schema, columns, returning)
    }

    fn render_values(&self, record: &Record) -> String {
        render_values(record, self.dialect())
    }

    fn render_insert(&self, template: &StatementTemplate, tuples: &[String]) -> RenderedStatement {
        render_insert(template, tuples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema_with_key(sql_type: &str) -> TableSchema {
        TableSchema {
            table: "places".to_string(),
            columns: vec![
                ColumnInfo {
                    name: "id".to_string(),
                    sql_type: sql_type.to_string(),
                    nullable: false,
                },
                ColumnInfo {
                    name: "name".to_string(),
                    sql_type: "text".to_string(),
                    nullable: true,
                },
            ],
            primary_key: Some("id".to_string()),
        }
    }

    #[test]
    fn test_integer_primary_key() {
        for sql_type in ["INTEGER", "integer", "bigint", "smallint", "INT(11)", "int8"] {
            assert_eq!(schema_with_key(sql_type).integer_primary_key(), Some("id"), "{}", sql_type);
        }
    }

    #[test]
    fn test_non_integer_primary_key() {
        for sql_type in ["POINT", "interval", "uuid", "text", "numeric"] {
            assert_eq!(schema_with_key(sql_type).integer_primary_key(), None, "{}", sql_type);
        }

        let mut schema = schema_with_key("INTEGER");
        schema.primary_key = None;
        assert_eq!(schema.integer_primary_key(), None);
    }

    #[test]
    fn test_column_names_in_table_order() {
        assert_eq!(schema_with_key("INTEGER").column_names(), vec!["id", "name"]);
    }
}
