use crate::dialects::filter::Filter;
use crate::executor::{ConnectionError, Db, Row};
use crate::model::schema::{Column, Index, IndexType, SqlType, Table};
use crate::model::uri::{DbType, Uri};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

/// Configuration embedded with each engine adapter (`dialect.toml`)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DialectConfig {
    pub metadata: DialectMetadata,
    pub syntax: SyntaxConfig,
    pub features: Capabilities,
    pub types: TypeMappings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DialectMetadata {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyntaxConfig {
    pub quote_char: String,
    pub rollback_keyword: String,
    pub auto_increment_keyword: String,
}

/// Optional SQL features a dialect does or does not support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Capabilities {
    pub supports_insert_many: bool,
    pub supports_engine: bool,
    pub supports_charset: bool,
    pub index_on_table: bool,
    pub show_create_null: bool,
}

/// Engine type names for each portable [`SqlType`]
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TypeMappings {
    pub bool: String,
    pub tiny_int: String,
    pub small_int: String,
    pub int: String,
    pub big_int: String,
    pub float: String,
    pub double: String,
    pub decimal: String,
    pub char: String,
    pub varchar: String,
    pub text: String,
    pub blob: String,
    pub date: String,
    pub time: String,
    pub datetime: String,
    pub timestamp: String,
    pub json: String,
    pub uuid: String,
}

/// A parameterised catalog probe: `?` placeholders in `sql`, values in `args`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSql {
    pub sql: String,
    pub args: Vec<String>,
}

impl ProbeSql {
    pub fn new(sql: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }
}

/// What a dialect is bound to by `init`
pub struct Binding {
    pub db: Arc<dyn Db>,
    pub uri: Uri,
    pub driver_name: String,
    pub data_source_name: String,
}

/// Shared state and defaults embedded by every engine adapter.
///
/// The binding is written once by [`Base::bind`] and only read afterwards,
/// so an initialised dialect can be shared across threads.
pub struct Base {
    db_type: DbType,
    config: &'static DialectConfig,
    binding: OnceLock<Binding>,
}

impl Base {
    pub fn new(db_type: DbType, config: &'static DialectConfig) -> Self {
        Self {
            db_type,
            config,
            binding: OnceLock::new(),
        }
    }

    /// Parse an embedded `dialect.toml` once per process
    pub fn load_config(cell: &'static OnceLock<DialectConfig>, source: &str) -> &'static DialectConfig {
        cell.get_or_init(|| toml::from_str(source).expect("Failed to parse embedded dialect config"))
    }

    pub fn db_type(&self) -> DbType {
        self.db_type
    }

    pub fn config(&self) -> &'static DialectConfig {
        self.config
    }

    pub fn binding(&self) -> Option<&Binding> {
        self.binding.get()
    }

    pub fn bind(
        &self,
        db: Arc<dyn Db>,
        uri: Uri,
        driver_name: &str,
        data_source_name: &str,
    ) -> Result<(), DialectError> {
        if uri.db_type != self.db_type {
            return Err(DialectError::Config(format!(
                "URI is for '{}' but the dialect is '{}'",
                uri.db_type, self.db_type
            )));
        }
        if driver_name.trim().is_empty() {
            return Err(DialectError::Config("driver name is empty".to_string()));
        }
        if data_source_name.trim().is_empty() {
            return Err(DialectError::Config("data source name is empty".to_string()));
        }

        let binding = Binding {
            db,
            uri,
            driver_name: driver_name.to_string(),
            data_source_name: data_source_name.to_string(),
        };
        self.binding
            .set(binding)
            .map_err(|_| DialectError::AlreadyInitialized(self.db_type))?;

        debug!("Initialized {} dialect with driver '{}'", self.db_type, driver_name);
        Ok(())
    }

    pub fn db(&self) -> Result<&Arc<dyn Db>, DialectError> {
        self.binding
            .get()
            .map(|b| &b.db)
            .ok_or(DialectError::NotInitialized(self.db_type))
    }

    /// Run a catalog query on the bound connection
    pub fn query(&self, sql: &str, args: &[String]) -> Result<Vec<Row>, DialectError> {
        Ok(self.db()?.query(sql, args)?)
    }
}

/// The contract every engine adapter satisfies.
///
/// Default method bodies are the shared behaviour; an adapter overrides a
/// method by implementing it in its own `impl Dialect` block.
pub trait Dialect: Send + Sync {
    fn base(&self) -> &Base;

    /// Bind connection, URI, driver and data source. Allowed exactly once.
    fn init(
        &self,
        db: Arc<dyn Db>,
        uri: Uri,
        driver_name: &str,
        data_source_name: &str,
    ) -> Result<(), DialectError> {
        self.base().bind(db, uri, driver_name, data_source_name)
    }

    fn uri(&self) -> Option<&Uri> {
        self.base().binding().map(|b| &b.uri)
    }

    fn connection(&self) -> Option<Arc<dyn Db>> {
        self.base().binding().map(|b| Arc::clone(&b.db))
    }

    fn database_type(&self) -> DbType {
        self.base().db_type()
    }

    fn driver_name(&self) -> &str {
        self.base().binding().map_or("", |b| b.driver_name.as_str())
    }

    fn data_source_name(&self) -> &str {
        self.base().binding().map_or("", |b| b.data_source_name.as_str())
    }

    fn description(&self) -> &str {
        &self.base().config().metadata.description
    }

    // Syntax primitives

    fn quote_char(&self) -> &str {
        &self.base().config().syntax.quote_char
    }

    fn quote(&self, identifier: &str) -> String {
        let q = self.quote_char();
        if q.is_empty() {
            return identifier.to_string();
        }
        let escaped = identifier.replace(q, &q.repeat(2));
        format!("{}{}{}", q, escaped, q)
    }

    fn and_keyword(&self) -> &str {
        "AND"
    }

    fn or_keyword(&self) -> &str {
        "OR"
    }

    fn equality_operator(&self) -> &str {
        "="
    }

    fn rollback_keyword(&self) -> &str {
        &self.base().config().syntax.rollback_keyword
    }

    fn auto_increment_keyword(&self) -> &str {
        &self.base().config().syntax.auto_increment_keyword
    }

    /// Engine type name for a column
    fn sql_type(&self, column: &Column) -> String {
        sql_type(self.base().config(), column)
    }

    // Capability flags

    fn capabilities(&self) -> Capabilities {
        self.base().config().features
    }

    fn supports_insert_many(&self) -> bool {
        self.capabilities().supports_insert_many
    }

    fn supports_engine(&self) -> bool {
        self.capabilities().supports_engine
    }

    fn supports_charset(&self) -> bool {
        self.capabilities().supports_charset
    }

    fn index_on_table(&self) -> bool {
        self.capabilities().index_on_table
    }

    fn show_create_null(&self) -> bool {
        self.capabilities().show_create_null
    }

    // DDL synthesis

    fn drop_table_sql(&self, table_name: &str) -> String {
        drop_table_sql(self, table_name)
    }

    fn create_table_sql(
        &self,
        table: &Table,
        table_name: Option<&str>,
        store_engine: Option<&str>,
        charset: Option<&str>,
    ) -> Result<String, DialectError> {
        create_table_sql(self, table, table_name, store_engine, charset)
    }

    fn create_index_sql(&self, table_name: &str, index: &Index) -> Result<String, DialectError> {
        create_index_sql(self, table_name, index)
    }

    // Introspection

    fn index_exists_sql(&self, table_name: &str, index_name: &str) -> ProbeSql;

    fn table_exists_sql(&self, table_name: &str) -> ProbeSql;

    fn column_exists_sql(&self, table_name: &str, column_name: &str, is_primary_key: bool) -> ProbeSql;

    fn get_columns(&self, table_name: &str) -> Result<Vec<Column>, DialectError>;

    /// Tables with name and engine-level options; columns are loaded separately
    fn get_tables(&self) -> Result<Vec<Table>, DialectError>;

    /// Indexes keyed by logical name (the `UQE_`/`IDX_` prefix stripped)
    fn get_indexes(&self, table_name: &str) -> Result<BTreeMap<String, Index>, DialectError>;

    /// SQL rewriting passes, in the order they must run
    fn filters(&self) -> Vec<Box<dyn Filter>>;
}

/// Render the engine type name from the configured mappings
pub fn sql_type(config: &DialectConfig, column: &Column) -> String {
    let types = &config.types;
    match &column.sql_type {
        SqlType::Bool => types.bool.clone(),
        SqlType::TinyInt => types.tiny_int.clone(),
        SqlType::SmallInt => types.small_int.clone(),
        SqlType::Int => types.int.clone(),
        SqlType::BigInt => types.big_int.clone(),
        SqlType::Float => types.float.clone(),
        SqlType::Double => types.double.clone(),
        SqlType::Decimal(precision, scale) => format!("{}({},{})", types.decimal, precision, scale),
        SqlType::Char(len) => format!("{}({})", types.char, len),
        SqlType::Varchar(len) => format!("{}({})", types.varchar, len),
        SqlType::Text => types.text.clone(),
        SqlType::Blob => types.blob.clone(),
        SqlType::Date => types.date.clone(),
        SqlType::Time => types.time.clone(),
        SqlType::DateTime => types.datetime.clone(),
        SqlType::Timestamp => types.timestamp.clone(),
        SqlType::Json => types.json.clone(),
        SqlType::Uuid => types.uuid.clone(),
        SqlType::Other(name) => name.to_uppercase(),
    }
}

pub fn drop_table_sql<D: Dialect + ?Sized>(dialect: &D, table_name: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", dialect.quote(table_name))
}

pub fn create_index_sql<D: Dialect + ?Sized>(
    dialect: &D,
    table_name: &str,
    index: &Index,
) -> Result<String, DialectError> {
    if index.columns.is_empty() {
        return Err(DialectError::MalformedTable(format!(
            "index '{}' on table '{}' has no columns",
            index.name, table_name
        )));
    }

    let unique = if index.is_unique() { " UNIQUE" } else { "" };
    let columns = index
        .columns
        .iter()
        .map(|c| dialect.quote(c))
        .collect::<Vec<_>>()
        .join(",");

    Ok(format!(
        "CREATE{} INDEX {} ON {} ({});",
        unique,
        dialect.quote(&index.key_name(table_name)),
        dialect.quote(table_name),
        columns
    ))
}

pub fn create_table_sql<D: Dialect + ?Sized>(
    dialect: &D,
    table: &Table,
    table_name: Option<&str>,
    store_engine: Option<&str>,
    charset: Option<&str>,
) -> Result<String, DialectError> {
    let name = effective_table_name(table, table_name);
    let sql = format!(
        "CREATE TABLE IF NOT EXISTS {} ({}){};",
        dialect.quote(name),
        column_definitions(dialect, table)?,
        table_options(dialect, store_engine, charset)
    );
    debug!("Generated CREATE TABLE for '{}': {}", name, sql);
    Ok(sql)
}

pub fn effective_table_name<'a>(table: &'a Table, table_name: Option<&'a str>) -> &'a str {
    table_name.filter(|n| !n.is_empty()).unwrap_or(&table.name)
}

/// Column definitions plus the composite key clause, comma separated.
///
/// Fails on a table without columns or with a column or key name missing
/// from the column lookup.
pub fn column_definitions<D: Dialect + ?Sized>(dialect: &D, table: &Table) -> Result<String, DialectError> {
    if table.columns_seq().is_empty() {
        return Err(DialectError::MalformedTable(format!(
            "table '{}' has no columns",
            table.name
        )));
    }

    let primary_keys = table.primary_keys();
    if let Some(missing) = primary_keys.iter().find(|k| table.column(k).is_none()) {
        return Err(DialectError::MalformedTable(format!(
            "primary key '{}' is not a column of table '{}'",
            missing, table.name
        )));
    }

    let mut parts = Vec::with_capacity(table.columns_seq().len() + 1);
    for name in table.columns_seq() {
        let column = table.column(name).ok_or_else(|| {
            DialectError::MalformedTable(format!(
                "column '{}' of table '{}' has no metadata",
                name, table.name
            ))
        })?;

        let inline_pk = primary_keys.len() == 1 && primary_keys[0] == *name;
        let definition = if inline_pk {
            column.to_sql(dialect)
        } else {
            column.to_sql_no_pk(dialect)
        };
        parts.push(definition.trim().to_string());
    }

    if primary_keys.len() > 1 {
        let keys = primary_keys
            .iter()
            .map(|k| dialect.quote(k))
            .collect::<Vec<_>>()
            .join(",");
        parts.push(format!("PRIMARY KEY ( {} )", keys));
    }

    Ok(parts.join(", "))
}

/// Trailing ` ENGINE=` and ` DEFAULT CHARSET` clauses, in that order
pub fn table_options<D: Dialect + ?Sized>(
    dialect: &D,
    store_engine: Option<&str>,
    charset: Option<&str>,
) -> String {
    let mut options = String::new();

    if dialect.supports_engine() {
        if let Some(engine) = store_engine.filter(|e| !e.is_empty()) {
            options.push_str(" ENGINE=");
            options.push_str(engine);
        }
    }

    if dialect.supports_charset() {
        let explicit = charset.filter(|c| !c.is_empty());
        let configured = dialect.uri().map(|u| u.charset.as_str()).filter(|c| !c.is_empty());
        if let Some(charset) = explicit.or(configured) {
            options.push_str(" DEFAULT CHARSET ");
            options.push_str(charset);
        }
    }

    options
}

pub(crate) fn cell(row: &Row, index: usize) -> Option<&str> {
    row.get(index).and_then(|v| v.as_deref())
}

pub(crate) fn required_cell<'r>(row: &'r Row, index: usize, what: &str) -> Result<&'r str, DialectError> {
    cell(row, index).ok_or_else(|| DialectError::Catalog(format!("catalog row has no {}", what)))
}

/// Catalogs report string defaults unquoted; put them back into SQL literal form
pub(crate) fn literal_default(sql_type: &SqlType, default: Option<&str>) -> Option<String> {
    let default = default?;
    let is_text = matches!(sql_type, SqlType::Char(_) | SqlType::Varchar(_) | SqlType::Text);
    if is_text && !default.starts_with('\'') {
        Some(format!("'{}'", default.replace('\'', "''")))
    } else {
        Some(default.to_string())
    }
}

/// Group `(physical name, unique, column)` rows, in column order, into indexes
/// keyed by logical name
pub(crate) fn collect_indexes<I>(table_name: &str, rows: I) -> BTreeMap<String, Index>
where
    I: IntoIterator<Item = (String, bool, String)>,
{
    let mut indexes: BTreeMap<String, Index> = BTreeMap::new();
    for (key_name, unique, column) in rows {
        let name = Index::parse_key_name(table_name, &key_name)
            .map(|(_, logical)| logical)
            .unwrap_or(key_name);
        let index_type = if unique { IndexType::Unique } else { IndexType::Index };
        indexes
            .entry(name.clone())
            .or_insert_with(|| Index::new(name, index_type))
            .columns
            .push(column);
    }
    indexes
}

/// Error types for dialect operations
#[derive(Debug, thiserror::Error)]
pub enum DialectError {
    #[error("Dialect not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Dialect '{0}' is already initialized")]
    AlreadyInitialized(DbType),

    #[error("Dialect '{0}' is not initialized")]
    NotInitialized(DbType),

    #[error("Malformed table metadata: {0}")]
    MalformedTable(String),

    #[error("Malformed catalog result: {0}")]
    Catalog(String),

    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialects::{MssqlDialect, MysqlDialect, SqliteDialect};

    #[test]
    fn test_embedded_configs_parse() {
        assert_eq!(MysqlDialect::new().base().config().metadata.name, "mysql");
        assert_eq!(MssqlDialect::new().base().config().types.uuid, "UNIQUEIDENTIFIER");
        assert_eq!(SqliteDialect::new().auto_increment_keyword(), "AUTOINCREMENT");
    }

    #[test]
    fn test_default_operators() {
        let dialect = SqliteDialect::new();
        assert_eq!(dialect.and_keyword(), "AND");
        assert_eq!(dialect.or_keyword(), "OR");
        assert_eq!(dialect.equality_operator(), "=");
    }

    #[test]
    fn test_sql_type_uses_mappings() {
        let config = MssqlDialect::new().base().config();
        assert_eq!(sql_type(config, &Column::new("a", SqlType::Varchar(40))), "NVARCHAR(40)");
        assert_eq!(sql_type(config, &Column::new("a", SqlType::Bool)), "BIT");
        assert_eq!(
            sql_type(config, &Column::new("a", SqlType::Other("geography".into()))),
            "GEOGRAPHY"
        );
    }

    #[test]
    fn test_literal_default_quotes_text_only() {
        assert_eq!(literal_default(&SqlType::Varchar(8), Some("abc")).as_deref(), Some("'abc'"));
        assert_eq!(literal_default(&SqlType::Text, Some("it's")).as_deref(), Some("'it''s'"));
        assert_eq!(literal_default(&SqlType::Text, Some("'x'")).as_deref(), Some("'x'"));
        assert_eq!(literal_default(&SqlType::Int, Some("0")).as_deref(), Some("0"));
        assert_eq!(literal_default(&SqlType::Int, None), None);
    }

    #[test]
    fn test_collect_indexes_by_logical_name() {
        let rows = vec![
            ("IDX_users_name_age".to_string(), false, "name".to_string()),
            ("IDX_users_name_age".to_string(), false, "age".to_string()),
            ("UQE_users_email".to_string(), true, "email".to_string()),
            ("legacy_idx".to_string(), false, "created_at".to_string()),
        ];
        let indexes = collect_indexes("users", rows);

        assert_eq!(indexes.len(), 3);
        assert_eq!(indexes["name_age"].columns, ["name", "age"]);
        assert!(indexes["email"].is_unique());
        assert_eq!(indexes["legacy_idx"].index_type, IndexType::Index);
    }

    #[test]
    fn test_table_options_order() {
        let dialect = MysqlDialect::new();
        assert_eq!(
            table_options(&dialect, Some("MyISAM"), Some("utf8")),
            " ENGINE=MyISAM DEFAULT CHARSET utf8"
        );
        assert_eq!(table_options(&dialect, None, None), "");
        assert_eq!(table_options(&SqliteDialect::new(), Some("MyISAM"), Some("utf8")), "");
    }

    #[test]
    fn test_cells() {
        let row: Row = vec![Some("a".to_string()), None];
        assert_eq!(cell(&row, 0), Some("a"));
        assert_eq!(cell(&row, 1), None);
        assert_eq!(cell(&row, 5), None);
        assert!(matches!(required_cell(&row, 1, "name"), Err(DialectError::Catalog(_))));
    }
}
