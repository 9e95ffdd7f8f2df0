use std::sync::Arc;

use serde::Serialize;

use crate::database::sql_value::SqlValue;

/// Where a record came from in the caller's input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Origin {
    /// Index into the raw value tuples.
    Row(usize),
    /// Index into the model instances.
    Instance(usize),
}

impl Origin {
    pub fn index(&self) -> usize {
        match self {
            Origin::Row(index) | Origin::Instance(index) => *index,
        }
    }
}

/// One normalized row. Every record of an import shares the same column
/// list, so it is reference counted rather than copied per row.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    origin: Origin,
    columns: Arc<[String]>,
    values: Vec<SqlValue>,
}

impl Record {
    pub(crate) fn new(origin: Origin, columns: Arc<[String]>, values: Vec<SqlValue>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Record { origin, columns, values }
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.position(column).map(|index| &self.values[index])
    }

    pub(crate) fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }

    /// Swaps in a wider column list, filling the new trailing columns.
    pub(crate) fn extend_columns(&mut self, columns: Arc<[String]>, values: Vec<SqlValue>) {
        debug_assert_eq!(columns.len(), self.values.len() + values.len());
        self.columns = columns;
        self.values.extend(values);
    }

    pub(crate) fn set(&mut self, index: usize, value: SqlValue) {
        self.values[index] = value;
    }
}
