//! Table, column and index metadata consumed by the dialects.
//!
//! Tables can be built in code or loaded from a TOML schema document:
//!
//! ```toml
//! [[tables]]
//! name = "users"
//!
//! [[tables.columns]]
//! name = "id"
//! type = "bigint"
//! primary_key = true
//! auto_increment = true
//!
//! [[tables.indexes]]
//! name = "email"
//! type = "unique"
//! columns = ["email"]
//! ```

use crate::dialects::Dialect;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::sync::OnceLock;

/// Engine-neutral column type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SqlType {
    Bool,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    Decimal(u32, u32),
    Char(u32),
    Varchar(u32),
    Text,
    Blob,
    Date,
    Time,
    DateTime,
    Timestamp,
    Json,
    Uuid,
    /// Anything the catalog reports that has no portable counterpart
    Other(String),
}

fn type_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*([a-z][a-z0-9_ ]*?)\s*(?:\(\s*(\d+)\s*(?:,\s*(\d+)\s*)?\))?\s*(unsigned|signed)?\s*$")
            .expect("type pattern is valid")
    })
}

impl SqlType {
    /// Parse a type name as reported by a catalog (`varchar(255)`, `int(11) unsigned`, ...)
    pub fn parse(raw: &str) -> SqlType {
        let lower = raw.to_lowercase();
        let Some(caps) = type_regex().captures(&lower) else {
            return SqlType::Other(raw.trim().to_string());
        };

        let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let first: Option<u32> = caps.get(2).and_then(|m| m.as_str().parse().ok());
        let second: Option<u32> = caps.get(3).and_then(|m| m.as_str().parse().ok());

        match name {
            "bool" | "boolean" | "bit" => SqlType::Bool,
            "tinyint" => {
                // MySQL reports BOOL columns as tinyint(1)
                if first == Some(1) {
                    SqlType::Bool
                } else {
                    SqlType::TinyInt
                }
            }
            "smallint" | "int2" => SqlType::SmallInt,
            "int" | "integer" | "int4" | "mediumint" | "serial" => SqlType::Int,
            "bigint" | "int8" | "bigserial" => SqlType::BigInt,
            "float" | "real" | "float4" => SqlType::Float,
            "double" | "double precision" | "float8" => SqlType::Double,
            "decimal" | "numeric" => SqlType::Decimal(first.unwrap_or(10), second.unwrap_or(0)),
            "char" | "character" | "nchar" => SqlType::Char(first.unwrap_or(1)),
            "varchar" | "character varying" | "nvarchar" => SqlType::Varchar(first.unwrap_or(255)),
            "text" | "tinytext" | "mediumtext" | "longtext" | "ntext" | "clob" => SqlType::Text,
            "blob" | "tinyblob" | "mediumblob" | "longblob" | "bytea" | "varbinary" | "binary" => {
                SqlType::Blob
            }
            "date" => SqlType::Date,
            "time" | "time without time zone" => SqlType::Time,
            "datetime" | "datetime2" => SqlType::DateTime,
            "timestamp" | "timestamp without time zone" | "timestamp with time zone" | "timestamptz" => {
                SqlType::Timestamp
            }
            "json" | "jsonb" => SqlType::Json,
            "uuid" | "uniqueidentifier" => SqlType::Uuid,
            _ => SqlType::Other(raw.trim().to_string()),
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            SqlType::TinyInt | SqlType::SmallInt | SqlType::Int | SqlType::BigInt
        )
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::Bool => f.write_str("bool"),
            SqlType::TinyInt => f.write_str("tinyint"),
            SqlType::SmallInt => f.write_str("smallint"),
            SqlType::Int => f.write_str("int"),
            SqlType::BigInt => f.write_str("bigint"),
            SqlType::Float => f.write_str("float"),
            SqlType::Double => f.write_str("double"),
            SqlType::Decimal(p, s) => write!(f, "decimal({},{})", p, s),
            SqlType::Char(n) => write!(f, "char({})", n),
            SqlType::Varchar(n) => write!(f, "varchar({})", n),
            SqlType::Text => f.write_str("text"),
            SqlType::Blob => f.write_str("blob"),
            SqlType::Date => f.write_str("date"),
            SqlType::Time => f.write_str("time"),
            SqlType::DateTime => f.write_str("datetime"),
            SqlType::Timestamp => f.write_str("timestamp"),
            SqlType::Json => f.write_str("json"),
            SqlType::Uuid => f.write_str("uuid"),
            SqlType::Other(name) => f.write_str(name),
        }
    }
}

impl From<String> for SqlType {
    fn from(raw: String) -> Self {
        SqlType::parse(&raw)
    }
}

impl From<SqlType> for String {
    fn from(sql_type: SqlType) -> Self {
        sql_type.to_string()
    }
}

fn default_nullable() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,

    #[serde(rename = "type")]
    pub sql_type: SqlType,

    #[serde(default = "default_nullable")]
    pub nullable: bool,

    /// Raw SQL default expression, emitted verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    #[serde(default, rename = "primary_key")]
    pub is_primary_key: bool,

    #[serde(default, rename = "auto_increment")]
    pub is_auto_increment: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            nullable: true,
            default: None,
            is_primary_key: false,
            is_auto_increment: false,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.nullable = false;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.is_auto_increment = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default_value(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }

    /// Full column definition including the inline `PRIMARY KEY` marker
    pub fn to_sql<D: Dialect + ?Sized>(&self, dialect: &D) -> String {
        let mut parts = vec![dialect.quote(&self.name), dialect.sql_type(self)];
        if self.is_primary_key {
            parts.push("PRIMARY KEY".to_string());
            let auto_incr = dialect.auto_increment_keyword();
            if self.is_auto_increment && !auto_incr.is_empty() {
                parts.push(auto_incr.to_string());
            }
        }
        self.push_constraints(dialect, &mut parts);
        parts.join(" ")
    }

    /// Column definition without primary-key markers, for composite keys
    pub fn to_sql_no_pk<D: Dialect + ?Sized>(&self, dialect: &D) -> String {
        let mut parts = vec![dialect.quote(&self.name), dialect.sql_type(self)];
        self.push_constraints(dialect, &mut parts);
        parts.join(" ")
    }

    fn push_constraints<D: Dialect + ?Sized>(&self, dialect: &D, parts: &mut Vec<String>) {
        if dialect.show_create_null() {
            parts.push(if self.nullable { "NULL" } else { "NOT NULL" }.to_string());
        }
        if let Some(default) = self.default.as_deref().filter(|d| !d.is_empty()) {
            parts.push(format!("DEFAULT {}", default));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexType {
    #[default]
    Index,
    Unique,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    /// Logical name; the physical name is derived by [`Index::key_name`]
    pub name: String,

    #[serde(default, rename = "type")]
    pub index_type: IndexType,

    pub columns: Vec<String>,
}

const UNIQUE_PREFIX: &str = "UQE_";
const INDEX_PREFIX: &str = "IDX_";

impl Index {
    pub fn new(name: impl Into<String>, index_type: IndexType) -> Self {
        Self {
            name: name.into(),
            index_type,
            columns: Vec::new(),
        }
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn is_unique(&self) -> bool {
        self.index_type == IndexType::Unique
    }

    /// Physical index name: `UQE_<table>_<name>` or `IDX_<table>_<name>`
    pub fn key_name(&self, table_name: &str) -> String {
        let prefix = match self.index_type {
            IndexType::Unique => UNIQUE_PREFIX,
            IndexType::Index => INDEX_PREFIX,
        };
        format!("{}{}_{}", prefix, table_name, self.name)
    }

    /// Recover the index kind and logical name from a physical name built by
    /// [`Index::key_name`]. Returns `None` for names outside that convention.
    pub fn parse_key_name(table_name: &str, key_name: &str) -> Option<(IndexType, String)> {
        let (index_type, rest) = if let Some(rest) = key_name.strip_prefix(UNIQUE_PREFIX) {
            (IndexType::Unique, rest)
        } else if let Some(rest) = key_name.strip_prefix(INDEX_PREFIX) {
            (IndexType::Index, rest)
        } else {
            return None;
        };

        let logical = rest
            .strip_prefix(table_name)
            .and_then(|r| r.strip_prefix('_'))
            .unwrap_or(rest);
        Some((index_type, logical.to_string()))
    }
}

fn index_head_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)^\s*CREATE\s+(UNIQUE\s+)?INDEX\b.*?\bON\b[^(]*\(")
            .expect("index head pattern is valid")
    })
}

fn index_column_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?i)^(?:"((?:[^"]|"")+)"|`((?:[^`]|``)+)`|\[([^\]]+)\]|([a-z_][a-z0-9_$]*))(?:\s+(?:ASC|DESC))?$"#,
        )
        .expect("index column pattern is valid")
    })
}

/// Entries of a parenthesised list up to its matching `)`, split on top-level commas
fn split_column_list(list: &str) -> Option<Vec<&str>> {
    let mut entries = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, ch) in list.char_indices() {
        if let Some(close) = quote {
            if ch == close {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '`' => quote = Some(ch),
            '[' => quote = Some(']'),
            '(' => depth += 1,
            ')' if depth == 0 => {
                entries.push(&list[start..i]);
                return Some(entries);
            }
            ')' => depth -= 1,
            ',' if depth == 0 => {
                entries.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    None
}

fn index_column_name(entry: &str) -> Option<String> {
    let caps = index_column_regex().captures(entry.trim())?;
    let name = if let Some(m) = caps.get(1) {
        m.as_str().replace("\"\"", "\"")
    } else if let Some(m) = caps.get(2) {
        m.as_str().replace("``", "`")
    } else {
        caps.get(3).or_else(|| caps.get(4))?.as_str().to_string()
    };
    Some(name)
}

/// Extract uniqueness and column list from a `CREATE [UNIQUE] INDEX` statement
/// as stored in PostgreSQL's `pg_indexes.indexdef` or SQLite's `sqlite_master.sql`.
///
/// Only the key column list is read; a trailing `INCLUDE` or `WHERE` clause is
/// ignored. Expression entries make the whole definition unrecognised.
pub fn parse_index_definition(definition: &str) -> Option<(IndexType, Vec<String>)> {
    let head = index_head_regex().captures(definition)?;
    let index_type = if head.get(1).is_some() {
        IndexType::Unique
    } else {
        IndexType::Index
    };

    let list_start = head.get(0)?.end();
    let columns = split_column_list(&definition[list_start..])?
        .into_iter()
        .map(index_column_name)
        .collect::<Option<Vec<_>>>()?;

    Some((index_type, columns))
}

/// Table metadata: ordered columns, primary key list and indexes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub name: String,
    columns_seq: Vec<String>,
    columns: HashMap<String, Column>,
    primary_keys: Vec<String>,
    indexes: BTreeMap<String, Index>,
    pub store_engine: Option<String>,
    pub charset: Option<String>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Append a column; primary-key columns join the key in insertion order.
    /// Re-adding a name replaces its metadata without changing its position,
    /// and a replacement without the key flag leaves the key.
    pub fn add_column(&mut self, column: Column) {
        let name = column.name.clone();
        if column.is_primary_key {
            if !self.primary_keys.contains(&name) {
                self.primary_keys.push(name.clone());
            }
        } else {
            self.primary_keys.retain(|k| k != &name);
        }
        if self.columns.insert(name.clone(), column).is_none() {
            self.columns_seq.push(name);
        }
    }

    pub fn with_column(mut self, column: Column) -> Self {
        self.add_column(column);
        self
    }

    pub fn add_index(&mut self, index: Index) {
        self.indexes.insert(index.name.clone(), index);
    }

    pub fn with_index(mut self, index: Index) -> Self {
        self.add_index(index);
        self
    }

    /// Replace the primary key list with an explicit order
    pub fn set_primary_keys<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_keys = names.into_iter().map(Into::into).collect();
        for (name, column) in self.columns.iter_mut() {
            column.is_primary_key = self.primary_keys.contains(name);
        }
    }

    pub fn columns_seq(&self) -> &[String] {
        &self.columns_seq
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Columns in declared order
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns_seq.iter().filter_map(|name| self.columns.get(name))
    }

    pub fn primary_keys(&self) -> &[String] {
        &self.primary_keys
    }

    pub fn indexes(&self) -> &BTreeMap<String, Index> {
        &self.indexes
    }

    pub fn index(&self, name: &str) -> Option<&Index> {
        self.indexes.get(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,

    #[serde(default)]
    pub columns: Vec<Column>,

    #[serde(default)]
    pub indexes: Vec<Index>,

    /// Explicit key order; defaults to the columns flagged `primary_key`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_keys: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_engine: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaFile {
    #[serde(default)]
    pub tables: Vec<TableDef>,
}

impl TryFrom<TableDef> for Table {
    type Error = SchemaError;

    fn try_from(def: TableDef) -> Result<Self, Self::Error> {
        let mut table = Table::new(def.name);
        table.store_engine = def.store_engine;
        table.charset = def.charset;

        for column in def.columns {
            if table.column(&column.name).is_some() {
                return Err(SchemaError::DuplicateColumn(table.name, column.name));
            }
            table.add_column(column);
        }

        if let Some(keys) = def.primary_keys {
            if let Some(missing) = keys.iter().find(|k| table.column(k).is_none()) {
                return Err(SchemaError::UnknownColumn(table.name.clone(), missing.clone()));
            }
            table.set_primary_keys(keys);
        }

        for index in def.indexes {
            if let Some(missing) = index.columns.iter().find(|c| table.column(c).is_none()) {
                return Err(SchemaError::UnknownColumn(table.name.clone(), missing.clone()));
            }
            table.add_index(index);
        }

        Ok(table)
    }
}

/// Parse a TOML schema document into tables, in document order
pub fn parse_schema(content: &str) -> Result<Vec<Table>, SchemaError> {
    let file: SchemaFile =
        toml::from_str(content).map_err(|e| SchemaError::Parse(e.to_string()))?;
    file.tables.into_iter().map(Table::try_from).collect()
}

pub fn load_schema(path: &str) -> Result<Vec<Table>, SchemaError> {
    let content = fs::read_to_string(path)
        .map_err(|e| SchemaError::FileRead(path.to_string(), e.to_string()))?;
    parse_schema(&content)
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Failed to read schema file '{0}': {1}")]
    FileRead(String, String),

    #[error("Failed to parse schema: {0}")]
    Parse(String),

    #[error("Table '{0}' declares column '{1}' twice")]
    DuplicateColumn(String, String),

    #[error("Table '{0}' references unknown column '{1}'")]
    UnknownColumn(String, String),
}
