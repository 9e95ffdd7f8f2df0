pub mod backend;
pub mod postgres;
pub mod query_builder;
pub mod sql_value;
pub mod sqlite;
