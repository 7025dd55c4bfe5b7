use crate::dialects::base::{
    cell, collect_indexes, column_definitions, effective_table_name, literal_default,
    required_cell, table_options, Base, Dialect, DialectConfig, DialectError, ProbeSql,
};
use crate::dialects::filter::{Filter, IdFilter, QuoteFilter};
use crate::model::schema::{Column, Index, SqlType, Table};
use crate::model::uri::DbType;
use log::debug;
use std::collections::BTreeMap;
use std::sync::OnceLock;

static CONFIG: OnceLock<DialectConfig> = OnceLock::new();

pub struct MssqlDialect {
    base: Base,
}

impl MssqlDialect {
    pub fn new() -> Self {
        let config = Base::load_config(&CONFIG, include_str!("dialect.toml"));
        Self {
            base: Base::new(DbType::Mssql, config),
        }
    }
}

impl Default for MssqlDialect {
    fn default() -> Self {
        Self::new()
    }
}

fn string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Map sys.types names and sizes back to a portable type string.
/// `max_length` is in bytes (-1 for MAX), so N-types hold half as many characters.
fn catalog_type(type_name: &str, max_length: Option<&str>, precision: Option<&str>, scale: Option<&str>) -> String {
    let name = type_name.to_lowercase();
    let length: Option<i64> = max_length.and_then(|l| l.parse().ok());
    match (name.as_str(), length) {
        ("nvarchar" | "varchar" | "nchar" | "char", Some(-1)) => "text".to_string(),
        ("nvarchar" | "nchar", Some(len)) => format!("{}({})", name, len / 2),
        ("varchar" | "char", Some(len)) => format!("{}({})", name, len),
        ("decimal" | "numeric", _) => format!(
            "{}({},{})",
            name,
            precision.unwrap_or("18"),
            scale.unwrap_or("0")
        ),
        ("varbinary", Some(-1)) => "blob".to_string(),
        _ => name,
    }
}

/// Defaults are stored wrapped in parentheses: `((0))`, `('abc')`
fn strip_default_parens(default: &str) -> &str {
    let mut value = default.trim();
    while wrapped_in_parens(value) {
        value = &value[1..value.len() - 1];
    }
    value
}

/// Whether the opening `(` is closed by the final character, as in `(0)` but not `(0)+(1)`
fn wrapped_in_parens(value: &str) -> bool {
    if !value.starts_with('(') {
        return false;
    }
    let mut depth = 0usize;
    let mut in_quote = false;
    for (i, ch) in value.char_indices() {
        match ch {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => {
                depth -= 1;
                if depth == 0 {
                    return i == value.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}

impl Dialect for MssqlDialect {
    fn base(&self) -> &Base {
        &self.base
    }

    fn drop_table_sql(&self, table_name: &str) -> String {
        format!(
            "IF EXISTS (SELECT * FROM sysobjects WHERE id = object_id(N{}) AND OBJECTPROPERTY(id, N'IsUserTable') = 1) DROP TABLE {}",
            string_literal(table_name),
            self.quote(table_name)
        )
    }

    /// SQL Server has no CREATE TABLE IF NOT EXISTS; guard with a catalog check
    fn create_table_sql(
        &self,
        table: &Table,
        table_name: Option<&str>,
        store_engine: Option<&str>,
        charset: Option<&str>,
    ) -> Result<String, DialectError> {
        let name = effective_table_name(table, table_name);
        let sql = format!(
            "IF NOT EXISTS (SELECT [name] FROM sys.tables WHERE [name] = {}) CREATE TABLE {} ({}){};",
            string_literal(name),
            self.quote(name),
            column_definitions(self, table)?,
            table_options(self, store_engine, charset)
        );
        debug!("Generated CREATE TABLE for '{}': {}", name, sql);
        Ok(sql)
    }

    fn index_exists_sql(&self, table_name: &str, index_name: &str) -> ProbeSql {
        ProbeSql::new(
            "SELECT 1 FROM sys.indexes WHERE object_id = OBJECT_ID(?) AND name = ?",
            vec![table_name.to_string(), index_name.to_string()],
        )
    }

    fn table_exists_sql(&self, table_name: &str) -> ProbeSql {
        ProbeSql::new(
            "SELECT name FROM sysobjects WHERE id = OBJECT_ID(?) AND OBJECTPROPERTY(id, N'IsUserTable') = 1",
            vec![table_name.to_string()],
        )
    }

    fn column_exists_sql(&self, table_name: &str, column_name: &str, is_primary_key: bool) -> ProbeSql {
        let sql = if is_primary_key {
            "SELECT c.name FROM sys.indexes i JOIN sys.index_columns ic ON i.object_id = ic.object_id AND i.index_id = ic.index_id JOIN sys.columns c ON ic.object_id = c.object_id AND ic.column_id = c.column_id WHERE i.is_primary_key = 1 AND i.object_id = OBJECT_ID(?) AND c.name = ?"
        } else {
            "SELECT name FROM sys.columns WHERE object_id = OBJECT_ID(?) AND name = ?"
        };
        ProbeSql::new(sql, vec![table_name.to_string(), column_name.to_string()])
    }

    fn get_columns(&self, table_name: &str) -> Result<Vec<Column>, DialectError> {
        let rows = self.base.query(
            "SELECT a.name, b.name, a.max_length, a.precision, a.scale, a.is_nullable, a.is_identity, m.text, \
             CASE WHEN EXISTS (SELECT 1 FROM sys.indexes i JOIN sys.index_columns ic ON i.object_id = ic.object_id AND i.index_id = ic.index_id \
             WHERE i.is_primary_key = 1 AND ic.object_id = a.object_id AND ic.column_id = a.column_id) THEN 1 ELSE 0 END \
             FROM sys.columns a \
             LEFT JOIN sys.types b ON a.user_type_id = b.user_type_id \
             LEFT JOIN sys.syscomments m ON a.default_object_id = m.id \
             WHERE a.object_id = OBJECT_ID(?) ORDER BY a.column_id",
            &[table_name.to_string()],
        )?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let type_name = required_cell(row, 1, "type name")?;
            let sql_type = SqlType::parse(&catalog_type(type_name, cell(row, 2), cell(row, 3), cell(row, 4)));
            let mut column = Column::new(required_cell(row, 0, "column name")?, sql_type);
            column.nullable = cell(row, 5) == Some("1");
            column.is_auto_increment = cell(row, 6) == Some("1");
            column.default = cell(row, 7).map(strip_default_parens).map(str::to_string);
            column.default = literal_default(&column.sql_type, column.default.as_deref());
            column.is_primary_key = cell(row, 8) == Some("1");
            columns.push(column);
        }

        debug!("Loaded {} columns for table '{}'", columns.len(), table_name);
        Ok(columns)
    }

    fn get_tables(&self) -> Result<Vec<Table>, DialectError> {
        let rows = self
            .base
            .query("SELECT name FROM sys.tables WHERE type = 'U' ORDER BY name", &[])?;

        rows.iter()
            .map(|row| Ok(Table::new(required_cell(row, 0, "name")?)))
            .collect()
    }

    fn get_indexes(&self, table_name: &str) -> Result<BTreeMap<String, Index>, DialectError> {
        let rows = self.base.query(
            "SELECT ixs.name, ixs.is_unique, c.name FROM sys.indexes ixs \
             JOIN sys.index_columns ixcs ON ixs.object_id = ixcs.object_id AND ixs.index_id = ixcs.index_id \
             JOIN sys.columns c ON ixs.object_id = c.object_id AND ixcs.column_id = c.column_id \
             WHERE ixs.is_primary_key = 0 AND ixs.object_id = OBJECT_ID(?) \
             ORDER BY ixs.name, ixcs.key_ordinal",
            &[table_name.to_string()],
        )?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            entries.push((
                required_cell(row, 0, "index name")?.to_string(),
                required_cell(row, 1, "is_unique")? == "1",
                required_cell(row, 2, "column name")?.to_string(),
            ));
        }

        Ok(collect_indexes(table_name, entries))
    }

    fn filters(&self) -> Vec<Box<dyn Filter>> {
        vec![Box::new(IdFilter), Box::new(QuoteFilter)]
    }
}
