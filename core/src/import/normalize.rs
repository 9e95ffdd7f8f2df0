use std::{collections::BTreeMap, sync::Arc};

use crate::database::backend::TableSchema;
use crate::database::sql_value::SqlValue;
use crate::import::record::{Origin, Record};
use crate::import::ImportError;

/// Something with named attributes that can be written as a table row.
pub trait ImportModel {
    /// Attribute names in declaration order.
    fn attribute_names(&self) -> Vec<String>;

    fn attribute(&self, name: &str) -> Option<SqlValue>;

    /// Primary keys and read-only attributes return false so they are left
    /// out when the column list is inferred.
    fn is_writable(&self, _name: &str) -> bool {
        true
    }
}

impl ImportModel for BTreeMap<String, SqlValue> {
    fn attribute_names(&self) -> Vec<String> {
        self.keys().cloned().collect()
    }

    fn attribute(&self, name: &str) -> Option<SqlValue> {
        self.get(name).cloned()
    }
}

/// The two shapes an import accepts, resolved once at the entry point.
pub enum ImportInput<'a> {
    /// Explicit columns plus value tuples. An empty column list means every
    /// column of the table except the primary key, in table order.
    Rows { columns: Vec<String>, rows: Vec<Vec<SqlValue>> },
    /// Model instances. Without explicit columns the writable attributes of
    /// the first instance are used.
    Instances { columns: Option<Vec<String>>, instances: Vec<&'a (dyn ImportModel + Sync)> },
}

impl<'a> ImportInput<'a> {
    pub fn rows<C: Into<String>>(
        columns: impl IntoIterator<Item = C>,
        rows: Vec<Vec<SqlValue>>,
    ) -> Self {
        ImportInput::Rows { columns: columns.into_iter().map(Into::into).collect(), rows }
    }

    pub fn instances<M: ImportModel + Sync>(instances: &'a [M]) -> Self {
        ImportInput::Instances {
            columns: None,
            instances: instances.iter().map(|m| m as &(dyn ImportModel + Sync)).collect(),
        }
    }

    pub fn instances_with_columns<C: Into<String>, M: ImportModel + Sync>(
        columns: impl IntoIterator<Item = C>,
        instances: &'a [M],
    ) -> Self {
        ImportInput::Instances {
            columns: Some(columns.into_iter().map(Into::into).collect()),
            instances: instances.iter().map(|m| m as &(dyn ImportModel + Sync)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ImportInput::Rows { rows, .. } => rows.len(),
            ImportInput::Instances { instances, .. } => instances.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub struct NormalizedRows {
    pub columns: Arc<[String]>,
    pub records: Vec<Record>,
}

/// Turns either input shape into records sharing one column list, in input
/// order.
pub fn normalize(
    input: &ImportInput<'_>,
    schema: &TableSchema,
) -> Result<NormalizedRows, ImportError> {
    match input {
        ImportInput::Rows { columns, rows } => {
            let columns: Arc<[String]> = if columns.is_empty() {
                schema
                    .columns
                    .iter()
                    .filter(|column| Some(&column.name) != schema.primary_key.as_ref())
                    .map(|column| column.name.clone())
                    .collect()
            } else {
                columns.clone().into()
            };

            let records = rows
                .iter()
                .enumerate()
                .map(|(index, row)| {
                    if row.len() != columns.len() {
                        return Err(ImportError::SchemaMismatch {
                            row: index,
                            expected: columns.len(),
                            found: row.len(),
                        });
                    }
                    Ok(Record::new(Origin::Row(index), Arc::clone(&columns), row.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?;

            Ok(NormalizedRows { columns, records })
        }
        ImportInput::Instances { columns, instances } => {
            let columns: Arc<[String]> = match (columns, instances.first()) {
                (Some(columns), _) if !columns.is_empty() => columns.clone().into(),
                (_, Some(first)) => first
                    .attribute_names()
                    .into_iter()
                    .filter(|name| first.is_writable(name))
                    .collect(),
                (_, None) => Arc::from(Vec::new()),
            };

            let records = instances
                .iter()
                .enumerate()
                .map(|(index, instance)| {
                    let values = columns
                        .iter()
                        .map(|column| instance.attribute(column).unwrap_or(SqlValue::Null))
                        .collect();
                    Record::new(Origin::Instance(index), Arc::clone(&columns), values)
                })
                .collect();

            Ok(NormalizedRows { columns, records })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::backend::ColumnInfo;

    struct Topic {
        id: Option<i64>,
        title: String,
        author_name: String,
        author_email_address: Option<String>,
    }

    impl ImportModel for Topic {
        fn attribute_names(&self) -> Vec<String> {
            ["id", "title", "author_name", "author_email_address"]
                .iter()
                .map(|name| name.to_string())
                .collect()
        }

        fn attribute(&self, name: &str) -> Option<SqlValue> {
            match name {
                "id" => Some(self.id.into()),
                "title" => Some(self.title.clone().into()),
                "author_name" => Some(self.author_name.clone().into()),
                "author_email_address" => Some(self.author_email_address.clone().into()),
                _ => None,
            }
        }

        fn is_writable(&self, name: &str) -> bool {
            name != "id"
        }
    }

    fn topic(title: &str, author: &str) -> Topic {
        Topic {
            id: None,
            title: title.to_string(),
            author_name: author.to_string(),
            author_email_address: Some("zach.dennis@gmail.com".to_string()),
        }
    }

    fn topics_schema() -> TableSchema {
        let column = |name: &str| ColumnInfo {
            name: name.to_string(),
            sql_type: "TEXT".to_string(),
            nullable: true,
        };
        TableSchema {
            table: "topics".to_string(),
            columns: vec![column("id"), column("title"), column("author_name")],
            primary_key: Some("id".to_string()),
        }
    }

    #[test]
    fn test_rows_preserve_order_and_origin() {
        let input = ImportInput::rows(
            ["title", "author_name"],
            vec![
                vec!["LDAP".into(), "Jerry Carter".into()],
                vec!["Rails Recipes".into(), "Chad Fowler".into()],
            ],
        );

        let normalized = normalize(&input, &topics_schema()).unwrap();

        assert_eq!(&*normalized.columns, &["title".to_string(), "author_name".to_string()]);
        assert_eq!(normalized.records.len(), 2);
        assert_eq!(normalized.records[1].origin(), Origin::Row(1));
        assert_eq!(normalized.records[1].get("title"), Some(&SqlValue::from("Rails Recipes")));
    }

    #[test]
    fn test_rows_arity_mismatch_fails() {
        let input = ImportInput::rows(
            ["title", "author_name"],
            vec![vec!["LDAP".into(), "Jerry Carter".into()], vec!["Agile+UX".into()]],
        );

        match normalize(&input, &topics_schema()) {
            Err(ImportError::SchemaMismatch { row, expected, found }) => {
                assert_eq!((row, expected, found), (1, 2, 1));
            }
            other => panic!("expected schema mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_rows_without_columns_use_table_columns() {
        let input =
            ImportInput::rows(Vec::<String>::new(), vec![vec!["LDAP".into(), "Jerry".into()]]);
        let normalized = normalize(&input, &topics_schema()).unwrap();
        assert_eq!(&*normalized.columns, &["title".to_string(), "author_name".to_string()]);
    }

    #[test]
    fn test_instances_infer_writable_columns() {
        let topics = vec![topic("The RSpec Book", "David Chelimsky")];
        let normalized = normalize(&ImportInput::instances(&topics), &topics_schema()).unwrap();

        assert_eq!(
            &*normalized.columns,
            &["title".to_string(), "author_name".to_string(), "author_email_address".to_string()]
        );
        assert_eq!(normalized.records[0].origin(), Origin::Instance(0));
    }

    #[test]
    fn test_instances_with_explicit_columns_only_read_listed() {
        let topics = vec![topic("A", "first"), topic("B", "second")];
        let input = ImportInput::instances_with_columns(["author_name", "title"], &topics);
        let normalized = normalize(&input, &topics_schema()).unwrap();

        assert_eq!(&*normalized.columns, &["author_name".to_string(), "title".to_string()]);
        assert_eq!(
            normalized.records[1].values(),
            &[SqlValue::from("second"), SqlValue::from("B")]
        );
        assert_eq!(normalized.records[0].get("author_email_address"), None);
    }

    #[test]
    fn test_empty_instances() {
        let topics: Vec<Topic> = Vec::new();
        let normalized = normalize(&ImportInput::instances(&topics), &topics_schema()).unwrap();
        assert!(normalized.records.is_empty());
        assert!(normalized.columns.is_empty());
    }
}
