use crate::dialects::base::{
    self, cell, collect_indexes, literal_default, required_cell, Base, Dialect, DialectConfig,
    DialectError, ProbeSql,
};
use crate::dialects::filter::{Filter, IdFilter};
use crate::model::schema::{parse_index_definition, Column, Index, IndexType, SqlType, Table};
use crate::model::uri::DbType;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::sync::OnceLock;

static CONFIG: OnceLock<DialectConfig> = OnceLock::new();

pub struct SqliteDialect {
    base: Base,
}

impl SqliteDialect {
    pub fn new() -> Self {
        let config = Base::load_config(&CONFIG, include_str!("dialect.toml"));
        Self {
            base: Base::new(DbType::Sqlite, config),
        }
    }
}

impl Default for SqliteDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialect for SqliteDialect {
    fn base(&self) -> &Base {
        &self.base
    }

    // AUTOINCREMENT is only accepted on exactly "INTEGER PRIMARY KEY"
    fn sql_type(&self, column: &Column) -> String {
        if column.is_auto_increment && column.sql_type.is_integer() {
            return "INTEGER".to_string();
        }
        base::sql_type(self.base.config(), column)
    }

    fn index_exists_sql(&self, _table_name: &str, index_name: &str) -> ProbeSql {
        ProbeSql::new(
            "SELECT name FROM sqlite_master WHERE type = 'index' AND name = ?",
            vec![index_name.to_string()],
        )
    }

    fn table_exists_sql(&self, table_name: &str) -> ProbeSql {
        ProbeSql::new(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
            vec![table_name.to_string()],
        )
    }

    fn column_exists_sql(&self, table_name: &str, column_name: &str, is_primary_key: bool) -> ProbeSql {
        let mut sql = String::from("SELECT name FROM pragma_table_info(?) WHERE name = ?");
        if is_primary_key {
            sql.push_str(" AND pk > 0");
        }
        ProbeSql::new(sql, vec![table_name.to_string(), column_name.to_string()])
    }

    fn get_columns(&self, table_name: &str) -> Result<Vec<Column>, DialectError> {
        let rows = self.base.query(
            "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?) ORDER BY cid",
            &[table_name.to_string()],
        )?;
        let create_sql = self.base.query(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?",
            &[table_name.to_string()],
        )?;
        let has_autoincrement = create_sql
            .first()
            .and_then(|row| cell(row, 0))
            .is_some_and(|sql| sql.to_uppercase().contains("AUTOINCREMENT"));

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let sql_type = SqlType::parse(cell(row, 1).unwrap_or("TEXT"));
            let mut column = Column::new(required_cell(row, 0, "name")?, sql_type);
            column.nullable = cell(row, 2) != Some("1");
            column.default = literal_default(&column.sql_type, cell(row, 3));
            column.is_primary_key = cell(row, 4).is_some_and(|pk| pk != "0");
            columns.push(column);
        }

        if has_autoincrement {
            let mut keys = columns.iter_mut().filter(|c| c.is_primary_key);
            if let (Some(pk), None) = (keys.next(), keys.next()) {
                pk.is_auto_increment = true;
            }
        }

        debug!("Loaded {} columns for table '{}'", columns.len(), table_name);
        Ok(columns)
    }

    fn get_tables(&self) -> Result<Vec<Table>, DialectError> {
        let rows = self.base.query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            &[],
        )?;

        rows.iter()
            .map(|row| Ok(Table::new(required_cell(row, 0, "name")?)))
            .collect()
    }

    fn get_indexes(&self, table_name: &str) -> Result<BTreeMap<String, Index>, DialectError> {
        let rows = self.base.query(
            "SELECT name, sql FROM sqlite_master WHERE type = 'index' AND tbl_name = ? AND sql IS NOT NULL",
            &[table_name.to_string()],
        )?;

        let mut entries = Vec::new();
        for row in &rows {
            let key_name = required_cell(row, 0, "name")?;
            let definition = required_cell(row, 1, "sql")?;
            let Some((index_type, columns)) = parse_index_definition(definition) else {
                warn!("Skipping index '{}' with unrecognised definition", key_name);
                continue;
            };
            for column in columns {
                entries.push((key_name.to_string(), index_type == IndexType::Unique, column));
            }
        }

        Ok(collect_indexes(table_name, entries))
    }

    fn filters(&self) -> Vec<Box<dyn Filter>> {
        vec![Box::new(IdFilter)]
    }
}
