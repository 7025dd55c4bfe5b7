//! Database dialect system for ddlkit
//!
//! Each engine adapter embeds a [`Base`] configured from its `dialect.toml`
//! and implements the [`Dialect`] trait, overriding only what differs from
//! the shared behaviour.

pub mod base;
pub mod filter;
pub mod registry;

// Dialect modules
pub mod mssql;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

// Re-export main types
pub use base::{Base, Capabilities, Dialect, DialectConfig, DialectError, ProbeSql};
pub use filter::{apply_filters, Filter, IdFilter, QuoteFilter, SeqFilter};
pub use mssql::MssqlDialect;
pub use mysql::MysqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;
pub use registry::{get_registry, open_dialect, query_dialect, register_dialect};

use crate::model::schema::Table;
use crate::model::uri::DbType;
use log::debug;
use std::sync::Arc;

/// Get dialect by name (aliases such as "postgresql" or "mariadb" accepted)
pub fn get_dialect(name: &str) -> Result<Arc<dyn Dialect>, DialectError> {
    let db_type: DbType = name
        .parse()
        .map_err(|e: crate::model::uri::UnknownDbType| DialectError::NotFound(e.0))?;
    query_dialect(db_type).ok_or_else(|| DialectError::NotFound(db_type.to_string()))
}

/// List all registered dialect types
pub fn list_dialects() -> Vec<DbType> {
    get_registry()
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .list_dialects()
}

fn run_probe(dialect: &dyn Dialect, probe: ProbeSql) -> Result<bool, DialectError> {
    debug!("Running probe: {} {:?}", probe.sql, probe.args);
    let rows = dialect.base().query(&probe.sql, &probe.args)?;
    Ok(!rows.is_empty())
}

pub fn table_exists(dialect: &dyn Dialect, table_name: &str) -> Result<bool, DialectError> {
    run_probe(dialect, dialect.table_exists_sql(table_name))
}

pub fn column_exists(
    dialect: &dyn Dialect,
    table_name: &str,
    column_name: &str,
    is_primary_key: bool,
) -> Result<bool, DialectError> {
    run_probe(
        dialect,
        dialect.column_exists_sql(table_name, column_name, is_primary_key),
    )
}

/// `index_name` is the physical name, e.g. `IDX_users_name`
pub fn index_exists(dialect: &dyn Dialect, table_name: &str, index_name: &str) -> Result<bool, DialectError> {
    run_probe(dialect, dialect.index_exists_sql(table_name, index_name))
}

/// Load every table with its columns, primary key and indexes
pub fn describe_schema(dialect: &dyn Dialect) -> Result<Vec<Table>, DialectError> {
    let mut tables = dialect.get_tables()?;
    for table in &mut tables {
        describe_into(dialect, table)?;
    }
    debug!("Described {} tables", tables.len());
    Ok(tables)
}

/// Load a single table's columns and indexes
pub fn describe_table(dialect: &dyn Dialect, table_name: &str) -> Result<Table, DialectError> {
    let mut table = Table::new(table_name);
    describe_into(dialect, &mut table)?;
    Ok(table)
}

fn describe_into(dialect: &dyn Dialect, table: &mut Table) -> Result<(), DialectError> {
    for column in dialect.get_columns(&table.name)? {
        table.add_column(column);
    }
    for (_, index) in dialect.get_indexes(&table.name)? {
        table.add_index(index);
    }
    Ok(())
}
