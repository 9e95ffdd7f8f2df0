//! SQL text generation shared by every backend.
//!
//! Identifiers are always double-quoted so reserved words such as `order`,
//! `group` or `user` can be used as column and table names unchanged.

use crate::database::backend::{Dialect, RenderedStatement, StatementTemplate, TableSchema};
use crate::import::record::Record;

/// Separator written between two value tuples of one statement.
pub const TUPLE_SEPARATOR: &str = ",";

#[inline]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Formats a table name, handling schema.table format.
pub fn format_table_name(table_name: &str) -> String {
    table_name
        .split('.')
        .map(|part| quote_identifier(part.trim_matches('"')))
        .collect::<Vec<_>>()
        .join(".")
}

pub fn generate_columns_names_sql(column_names: &[String]) -> String {
    column_names.iter().map(|name| quote_identifier(name)).collect::<Vec<String>>().join(", ")
}

/// Builds `INSERT INTO "t" ("a", "b") VALUES ` plus an optional
/// `RETURNING` clause for the primary key.
pub fn statement_template(
    schema: &TableSchema,
    columns: &[String],
    returning: Option<&str>,
) -> StatementTemplate {
    let prefix = format!(
        "INSERT INTO {} ({}) VALUES ",
        format_table_name(&schema.table),
        generate_columns_names_sql(columns)
    );
    let suffix = match returning {
        Some(primary_key) => format!(" RETURNING {}", quote_identifier(primary_key)),
        None => String::new(),
    };

    StatementTemplate { prefix, suffix }
}

/// Renders one `(v1,v2,...)` tuple.
pub fn render_values(record: &Record, dialect: Dialect) -> String {
    let literals = record
        .values()
        .iter()
        .map(|value| value.to_sql_literal(dialect))
        .collect::<Vec<_>>()
        .join(",");
    format!("({})", literals)
}

pub fn render_insert(template: &StatementTemplate, tuples: &[String]) -> RenderedStatement {
    let mut sql = String::with_capacity(
        template.overhead()
            + tuples.iter().map(String::len).sum::<usize>()
            + tuples.len().saturating_sub(1) * TUPLE_SEPARATOR.len(),
    );
    sql.push_str(&template.prefix);
    sql.push_str(&tuples.join(TUPLE_SEPARATOR));
    sql.push_str(&template.suffix);

    RenderedStatement { sql, rows: tuples.len() }
}
