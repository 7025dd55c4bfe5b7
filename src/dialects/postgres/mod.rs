use crate::dialects::base::{
    self, cell, collect_indexes, literal_default, required_cell, Base, Dialect, DialectConfig,
    DialectError, ProbeSql,
};
use crate::dialects::filter::{Filter, IdFilter, QuoteFilter, SeqFilter};
use crate::model::schema::{parse_index_definition, Column, Index, IndexType, SqlType, Table};
use crate::model::uri::DbType;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::sync::OnceLock;

static CONFIG: OnceLock<DialectConfig> = OnceLock::new();

const SCHEMA: &str = "public";

pub struct PostgresDialect {
    base: Base,
}

impl PostgresDialect {
    pub fn new() -> Self {
        let config = Base::load_config(&CONFIG, include_str!("dialect.toml"));
        Self {
            base: Base::new(DbType::Postgres, config),
        }
    }
}

impl Default for PostgresDialect {
    fn default() -> Self {
        Self::new()
    }
}

/// Rebuild a type string like `character varying(64)` from information_schema fields
fn catalog_type(data_type: &str, char_len: Option<&str>, precision: Option<&str>, scale: Option<&str>) -> String {
    match (data_type, char_len, precision, scale) {
        (_, Some(len), _, _) => format!("{}({})", data_type, len),
        ("numeric", _, Some(p), Some(s)) => format!("numeric({},{})", p, s),
        _ => data_type.to_string(),
    }
}

/// Catalog defaults carry casts such as `'x'::character varying`;
/// only a cast outside quoted literals is dropped.
fn strip_cast(default: &str) -> &str {
    let mut in_quote = false;
    for (i, ch) in default.char_indices() {
        match ch {
            '\'' => in_quote = !in_quote,
            ':' if !in_quote && default[i..].starts_with("::") => return default[..i].trim_end(),
            _ => {}
        }
    }
    default
}

impl Dialect for PostgresDialect {
    fn base(&self) -> &Base {
        &self.base
    }

    /// Auto-increment integers become SERIAL/BIGSERIAL; there is no keyword form
    fn sql_type(&self, column: &Column) -> String {
        if column.is_auto_increment {
            match column.sql_type {
                SqlType::BigInt => return "BIGSERIAL".to_string(),
                SqlType::TinyInt | SqlType::SmallInt | SqlType::Int => return "SERIAL".to_string(),
                _ => {}
            }
        }
        base::sql_type(self.base.config(), column)
    }

    fn index_exists_sql(&self, table_name: &str, index_name: &str) -> ProbeSql {
        ProbeSql::new(
            "SELECT indexname FROM pg_indexes WHERE tablename = ? AND indexname = ?",
            vec![table_name.to_string(), index_name.to_string()],
        )
    }

    fn table_exists_sql(&self, table_name: &str) -> ProbeSql {
        ProbeSql::new(
            "SELECT tablename FROM pg_tables WHERE tablename = ?",
            vec![table_name.to_string()],
        )
    }

    fn column_exists_sql(&self, table_name: &str, column_name: &str, is_primary_key: bool) -> ProbeSql {
        if is_primary_key {
            return ProbeSql::new(
                "SELECT kcu.column_name FROM information_schema.table_constraints tc JOIN information_schema.key_column_usage kcu ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_name = ? AND kcu.column_name = ?",
                vec![table_name.to_string(), column_name.to_string()],
            );
        }
        ProbeSql::new(
            "SELECT column_name FROM INFORMATION_SCHEMA.COLUMNS WHERE table_name = ? AND column_name = ?",
            vec![table_name.to_string(), column_name.to_string()],
        )
    }

    fn get_columns(&self, table_name: &str) -> Result<Vec<Column>, DialectError> {
        let rows = self.base.query(
            "SELECT c.column_name, c.column_default, c.is_nullable, c.data_type, c.character_maximum_length, c.numeric_precision, c.numeric_scale, \
             CASE WHEN pk.column_name IS NULL THEN 'NO' ELSE 'YES' END \
             FROM information_schema.columns c \
             LEFT JOIN (SELECT kcu.column_name FROM information_schema.table_constraints tc \
             JOIN information_schema.key_column_usage kcu ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
             WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_name = ? AND tc.table_schema = ?) pk ON pk.column_name = c.column_name \
             WHERE c.table_name = ? AND c.table_schema = ? ORDER BY c.ordinal_position",
            &[
                table_name.to_string(),
                SCHEMA.to_string(),
                table_name.to_string(),
                SCHEMA.to_string(),
            ],
        )?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let data_type = required_cell(row, 3, "data_type")?;
            let sql_type = SqlType::parse(&catalog_type(data_type, cell(row, 4), cell(row, 5), cell(row, 6)));
            let mut column = Column::new(required_cell(row, 0, "column_name")?, sql_type);
            column.nullable = cell(row, 2) == Some("YES");
            column.is_primary_key = cell(row, 7) == Some("YES");

            match cell(row, 1) {
                Some(default) if default.starts_with("nextval(") => column.is_auto_increment = true,
                default => {
                    column.default = default
                        .map(strip_cast)
                        .and_then(|d| literal_default(&column.sql_type, Some(d)))
                }
            }
            columns.push(column);
        }

        debug!("Loaded {} columns for table '{}'", columns.len(), table_name);
        Ok(columns)
    }

    fn get_tables(&self) -> Result<Vec<Table>, DialectError> {
        let rows = self.base.query(
            "SELECT tablename FROM pg_tables WHERE schemaname = ? ORDER BY tablename",
            &[SCHEMA.to_string()],
        )?;

        rows.iter()
            .map(|row| Ok(Table::new(required_cell(row, 0, "tablename")?)))
            .collect()
    }

    fn get_indexes(&self, table_name: &str) -> Result<BTreeMap<String, Index>, DialectError> {
        let rows = self.base.query(
            "SELECT indexname, indexdef FROM pg_indexes WHERE tablename = ? AND schemaname = ?",
            &[table_name.to_string(), SCHEMA.to_string()],
        )?;

        let mut entries = Vec::new();
        for row in &rows {
            let key_name = required_cell(row, 0, "indexname")?;
            if key_name.ends_with("_pkey") {
                continue;
            }
            let definition = required_cell(row, 1, "indexdef")?;
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
        vec![
            Box::new(IdFilter),
            Box::new(QuoteFilter),
            Box::new(SeqFilter::new("$", 1)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ScriptedDb;
    use crate::model::uri::Uri;
    use std::sync::Arc;

    fn bound(db: Arc<ScriptedDb>) -> PostgresDialect {
        let dialect = PostgresDialect::new();
        dialect
            .init(db, Uri::new(DbType::Postgres).with_db_name("app"), "PostgreSQL Unicode", "Database=app;")
            .unwrap();
        dialect
    }

    #[test]
    fn test_postgres_syntax() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.quote("order"), "\"order\"");
        assert_eq!(dialect.rollback_keyword(), "ROLLBACK");
        assert!(!dialect.supports_engine());
        assert!(!dialect.supports_charset());
    }

    #[test]
    fn test_postgres_serial_types() {
        let dialect = PostgresDialect::new();
        let id = Column::new("id", SqlType::BigInt).primary_key().auto_increment();
        assert_eq!(dialect.sql_type(&id), "BIGSERIAL");
        assert_eq!(id.to_sql(&dialect), "\"id\" BIGSERIAL PRIMARY KEY NOT NULL");

        let plain = Column::new("n", SqlType::Int);
        assert_eq!(dialect.sql_type(&plain), "INTEGER");
    }

    #[test]
    fn test_postgres_get_columns_detects_sequences_and_casts() {
        let db = Arc::new(ScriptedDb::new().respond(
            "information_schema.columns",
            vec![
                vec![
                    Some("id"),
                    Some("nextval('users_id_seq'::regclass)"),
                    Some("NO"),
                    Some("integer"),
                    None,
                    Some("32"),
                    Some("0"),
                    Some("YES"),
                ],
                vec![
                    Some("status"),
                    Some("'active'::character varying"),
                    Some("YES"),
                    Some("character varying"),
                    Some("16"),
                    None,
                    None,
                    Some("NO"),
                ],
            ],
        ));
        let dialect = bound(db);

        let columns = dialect.get_columns("users").unwrap();
        assert!(columns[0].is_auto_increment && columns[0].is_primary_key);
        assert_eq!(columns[0].default, None);
        assert_eq!(columns[1].sql_type, SqlType::Varchar(16));
        assert_eq!(columns[1].default.as_deref(), Some("'active'"));
    }

    #[test]
    fn test_strip_cast_respects_quoted_literals() {
        assert_eq!(strip_cast("'a::b'::text"), "'a::b'");
        assert_eq!(strip_cast("'it''s'::character varying"), "'it''s'");
        assert_eq!(strip_cast("0"), "0");
        assert_eq!(strip_cast("'plain'"), "'plain'");
    }

    #[test]
    fn test_postgres_get_indexes_parses_definitions() {
        let db = Arc::new(ScriptedDb::new().respond(
            "pg_indexes",
            vec![
                vec![Some("users_pkey"), Some("CREATE UNIQUE INDEX users_pkey ON public.users USING btree (id)")],
                vec![
                    Some("UQE_users_email"),
                    Some("CREATE UNIQUE INDEX \"UQE_users_email\" ON public.users USING btree (email)"),
                ],
            ],
        ));
        let dialect = bound(db);

        let indexes = dialect.get_indexes("users").unwrap();
        assert_eq!(indexes.len(), 1);
        assert!(indexes["email"].is_unique());
        assert_eq!(indexes["email"].columns, ["email"]);
    }

    #[test]
    fn test_postgres_get_indexes_partial_and_expression() {
        let db = Arc::new(ScriptedDb::new().respond(
            "pg_indexes",
            vec![
                vec![
                    Some("IDX_orders_open"),
                    Some("CREATE INDEX \"IDX_orders_open\" ON public.orders USING btree (customer_id) WHERE (closed_at IS NULL)"),
                ],
                vec![
                    Some("orders_lower_ref"),
                    Some("CREATE INDEX orders_lower_ref ON public.orders USING btree (lower((ref)::text))"),
                ],
            ],
        ));
        let dialect = bound(db);

        let indexes = dialect.get_indexes("orders").unwrap();
        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes["open"].columns, ["customer_id"]);
    }

    #[test]
    fn test_postgres_introspection_requires_init() {
        let dialect = PostgresDialect::new();
        assert!(matches!(
            dialect.get_tables(),
            Err(DialectError::NotInitialized(DbType::Postgres))
        ));
    }
}
