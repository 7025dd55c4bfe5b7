use crate::dialects::base::{
    collect_indexes, cell, literal_default, required_cell, Base, Dialect, DialectConfig,
    DialectError, ProbeSql,
};
use crate::dialects::filter::{Filter, IdFilter};
use crate::model::schema::{Column, Index, SqlType, Table};
use crate::model::uri::DbType;
use log::debug;
use std::collections::BTreeMap;
use std::sync::OnceLock;

static CONFIG: OnceLock<DialectConfig> = OnceLock::new();

pub struct MysqlDialect {
    base: Base,
}

impl MysqlDialect {
    pub fn new() -> Self {
        let config = Base::load_config(&CONFIG, include_str!("dialect.toml"));
        Self {
            base: Base::new(DbType::Mysql, config),
        }
    }

    /// Schema the catalog queries are scoped to
    fn schema_name(&self) -> String {
        self.uri().map(|u| u.db_name.clone()).unwrap_or_default()
    }
}

impl Default for MysqlDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialect for MysqlDialect {
    fn base(&self) -> &Base {
        &self.base
    }

    fn index_exists_sql(&self, table_name: &str, index_name: &str) -> ProbeSql {
        ProbeSql::new(
            "SELECT `INDEX_NAME` FROM `INFORMATION_SCHEMA`.`STATISTICS` WHERE `TABLE_SCHEMA` = ? AND `TABLE_NAME` = ? AND `INDEX_NAME` = ?",
            vec![self.schema_name(), table_name.to_string(), index_name.to_string()],
        )
    }

    fn table_exists_sql(&self, table_name: &str) -> ProbeSql {
        ProbeSql::new(
            "SELECT `TABLE_NAME` FROM `INFORMATION_SCHEMA`.`TABLES` WHERE `TABLE_SCHEMA` = ? AND `TABLE_NAME` = ?",
            vec![self.schema_name(), table_name.to_string()],
        )
    }

    fn column_exists_sql(&self, table_name: &str, column_name: &str, is_primary_key: bool) -> ProbeSql {
        let mut sql = String::from(
            "SELECT `COLUMN_NAME` FROM `INFORMATION_SCHEMA`.`COLUMNS` WHERE `TABLE_SCHEMA` = ? AND `TABLE_NAME` = ? AND `COLUMN_NAME` = ?",
        );
        if is_primary_key {
            sql.push_str(" AND `COLUMN_KEY` = 'PRI'");
        }
        ProbeSql::new(
            sql,
            vec![self.schema_name(), table_name.to_string(), column_name.to_string()],
        )
    }

    fn get_columns(&self, table_name: &str) -> Result<Vec<Column>, DialectError> {
        let rows = self.base.query(
            "SELECT `COLUMN_NAME`, `IS_NULLABLE`, `COLUMN_DEFAULT`, `COLUMN_TYPE`, `COLUMN_KEY`, `EXTRA` FROM `INFORMATION_SCHEMA`.`COLUMNS` WHERE `TABLE_SCHEMA` = ? AND `TABLE_NAME` = ? ORDER BY `ORDINAL_POSITION`",
            &[self.schema_name(), table_name.to_string()],
        )?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let sql_type = SqlType::parse(required_cell(row, 3, "COLUMN_TYPE")?);
            let mut column = Column::new(required_cell(row, 0, "COLUMN_NAME")?, sql_type);
            column.nullable = cell(row, 1) == Some("YES");
            column.default = literal_default(&column.sql_type, cell(row, 2));
            column.is_primary_key = cell(row, 4) == Some("PRI");
            column.is_auto_increment = cell(row, 5).is_some_and(|e| e.contains("auto_increment"));
            columns.push(column);
        }

        debug!("Loaded {} columns for table '{}'", columns.len(), table_name);
        Ok(columns)
    }

    fn get_tables(&self) -> Result<Vec<Table>, DialectError> {
        let rows = self.base.query(
            "SELECT `TABLE_NAME`, `ENGINE` FROM `INFORMATION_SCHEMA`.`TABLES` WHERE `TABLE_SCHEMA` = ? AND `TABLE_TYPE` = 'BASE TABLE' ORDER BY `TABLE_NAME`",
            &[self.schema_name()],
        )?;

        rows.iter()
            .map(|row| {
                let mut table = Table::new(required_cell(row, 0, "TABLE_NAME")?);
                table.store_engine = cell(row, 1).map(str::to_string);
                Ok(table)
            })
            .collect()
    }

    fn get_indexes(&self, table_name: &str) -> Result<BTreeMap<String, Index>, DialectError> {
        let rows = self.base.query(
            "SELECT `INDEX_NAME`, `NON_UNIQUE`, `COLUMN_NAME` FROM `INFORMATION_SCHEMA`.`STATISTICS` WHERE `TABLE_SCHEMA` = ? AND `TABLE_NAME` = ? ORDER BY `INDEX_NAME`, `SEQ_IN_INDEX`",
            &[self.schema_name(), table_name.to_string()],
        )?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            let key_name = required_cell(row, 0, "INDEX_NAME")?;
            if key_name == "PRIMARY" {
                continue;
            }
            let non_unique = required_cell(row, 1, "NON_UNIQUE")?;
            let unique = !matches!(non_unique, "1" | "YES");
            let column = required_cell(row, 2, "COLUMN_NAME")?.trim_matches(|c| c == '`' || c == ' ');
            entries.push((key_name.to_string(), unique, column.to_string()));
        }

        Ok(collect_indexes(table_name, entries))
    }

    fn filters(&self) -> Vec<Box<dyn Filter>> {
        vec![Box::new(IdFilter)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ScriptedDb;
    use crate::model::schema::IndexType;
    use crate::model::uri::Uri;
    use std::sync::Arc;

    fn bound(db: Arc<ScriptedDb>) -> MysqlDialect {
        let dialect = MysqlDialect::new();
        dialect
            .init(
                db,
                Uri::new(DbType::Mysql).with_db_name("shop").with_charset("utf8mb4"),
                "MySQL ODBC 8.0 Unicode Driver",
                "Server=localhost;Database=shop;",
            )
            .unwrap();
        dialect
    }

    #[test]
    fn test_mysql_syntax() {
        let dialect = MysqlDialect::new();
        assert_eq!(dialect.database_type(), DbType::Mysql);
        assert_eq!(dialect.quote("users"), "`users`");
        assert_eq!(dialect.auto_increment_keyword(), "AUTO_INCREMENT");
        assert_eq!(dialect.rollback_keyword(), "ROLL BACK");
        assert!(dialect.supports_engine());
        assert!(dialect.supports_charset());
        assert!(dialect.index_on_table());
    }

    #[test]
    fn test_mysql_column_types() {
        let dialect = MysqlDialect::new();
        assert_eq!(dialect.sql_type(&Column::new("a", SqlType::Bool)), "TINYINT(1)");
        assert_eq!(dialect.sql_type(&Column::new("a", SqlType::Varchar(64))), "VARCHAR(64)");
        assert_eq!(dialect.sql_type(&Column::new("a", SqlType::Decimal(10, 2))), "DECIMAL(10,2)");
    }

    #[test]
    fn test_mysql_probes_bind_schema_and_names() {
        let dialect = bound(Arc::new(ScriptedDb::new()));

        let probe = dialect.index_exists_sql("users", "UQE_users_email");
        assert!(!probe.sql.contains("users"));
        assert_eq!(probe.args, ["shop", "users", "UQE_users_email"]);

        let probe = dialect.column_exists_sql("users", "id", true);
        assert!(probe.sql.ends_with("AND `COLUMN_KEY` = 'PRI'"));
        assert_eq!(probe.args, ["shop", "users", "id"]);
    }

    #[test]
    fn test_mysql_get_columns() {
        let db = Arc::new(ScriptedDb::new().respond(
            "`INFORMATION_SCHEMA`.`COLUMNS`",
            vec![
                vec![Some("id"), Some("NO"), None, Some("bigint(20)"), Some("PRI"), Some("auto_increment")],
                vec![Some("name"), Some("YES"), Some("anon"), Some("varchar(64)"), Some(""), Some("")],
            ],
        ));
        let dialect = bound(Arc::clone(&db));

        let columns = dialect.get_columns("users").unwrap();
        assert_eq!(columns.len(), 2);
        assert!(columns[0].is_primary_key && columns[0].is_auto_increment);
        assert!(!columns[0].nullable);
        assert_eq!(columns[1].sql_type, SqlType::Varchar(64));
        assert_eq!(columns[1].default.as_deref(), Some("'anon'"));

        let queries = db.queries();
        assert_eq!(queries[0].1, ["shop", "users"]);
    }

    #[test]
    fn test_mysql_get_indexes_groups_columns() {
        let db = Arc::new(ScriptedDb::new().respond(
            "`STATISTICS`",
            vec![
                vec![Some("PRIMARY"), Some("0"), Some("id")],
                vec![Some("IDX_users_name_age"), Some("1"), Some("name")],
                vec![Some("IDX_users_name_age"), Some("1"), Some("age")],
                vec![Some("UQE_users_email"), Some("0"), Some("email")],
            ],
        ));
        let dialect = bound(db);

        let indexes = dialect.get_indexes("users").unwrap();
        assert_eq!(indexes.len(), 2);
        assert_eq!(indexes["name_age"].columns, ["name", "age"]);
        assert_eq!(indexes["name_age"].index_type, IndexType::Index);
        assert_eq!(indexes["email"].index_type, IndexType::Unique);
    }

    #[test]
    fn test_mysql_get_tables_reads_engine() {
        let db = Arc::new(ScriptedDb::new().respond(
            "`INFORMATION_SCHEMA`.`TABLES`",
            vec![vec![Some("orders"), Some("InnoDB")]],
        ));
        let dialect = bound(db);

        let tables = dialect.get_tables().unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "orders");
        assert_eq!(tables[0].store_engine.as_deref(), Some("InnoDB"));
    }

    #[test]
    fn test_mysql_catalog_row_without_name_is_an_error() {
        let db = Arc::new(ScriptedDb::new().respond(
            "`INFORMATION_SCHEMA`.`TABLES`",
            vec![vec![None, Some("InnoDB")]],
        ));
        let dialect = bound(db);

        assert!(matches!(dialect.get_tables(), Err(DialectError::Catalog(_))));
    }
}
