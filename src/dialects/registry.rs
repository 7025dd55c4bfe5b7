use crate::dialects::base::Dialect;
use crate::executor::{self, ConnectionError, Db};
use crate::model::uri::DbType;
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

/// Central registry mapping each database type to its dialect instance
pub struct DialectRegistry {
    dialects: HashMap<DbType, Arc<dyn Dialect>>,
}

impl DialectRegistry {
    pub fn new() -> Self {
        Self {
            dialects: HashMap::new(),
        }
    }

    /// Register a dialect; a later registration for the same type replaces the earlier one
    pub fn register(&mut self, db_type: DbType, dialect: Arc<dyn Dialect>) -> Option<Arc<dyn Dialect>> {
        debug!("Registering dialect: {}", db_type);
        let previous = self.dialects.insert(db_type, dialect);
        if previous.is_some() {
            debug!("Dialect '{}' overrides an earlier registration", db_type);
        }
        previous
    }

    /// Look up a dialect; `None` when the type was never registered
    pub fn get(&self, db_type: DbType) -> Option<Arc<dyn Dialect>> {
        self.dialects.get(&db_type).cloned()
    }

    /// All registered database types, sorted
    pub fn list_dialects(&self) -> Vec<DbType> {
        let mut types: Vec<DbType> = self.dialects.keys().copied().collect();
        types.sort();
        types
    }
}

impl Default for DialectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global registry instance
static GLOBAL_REGISTRY: OnceLock<RwLock<DialectRegistry>> = OnceLock::new();

/// Get the global dialect registry, populated with the built-in dialects on first use.
///
/// Registration is meant to finish during start-up; readers take the shared lock.
pub fn get_registry() -> &'static RwLock<DialectRegistry> {
    GLOBAL_REGISTRY.get_or_init(|| RwLock::new(create_default_registry()))
}

fn create_default_registry() -> DialectRegistry {
    let mut registry = DialectRegistry::new();

    registry.register(DbType::Mysql, Arc::new(crate::dialects::mysql::MysqlDialect::new()));
    registry.register(DbType::Postgres, Arc::new(crate::dialects::postgres::PostgresDialect::new()));
    registry.register(DbType::Sqlite, Arc::new(crate::dialects::sqlite::SqliteDialect::new()));
    registry.register(DbType::Mssql, Arc::new(crate::dialects::mssql::MssqlDialect::new()));

    registry
}

pub fn register_dialect(db_type: DbType, dialect: Arc<dyn Dialect>) {
    get_registry()
        .write()
        .unwrap_or_else(|e| e.into_inner())
        .register(db_type, dialect);
}

pub fn query_dialect(db_type: DbType) -> Option<Arc<dyn Dialect>> {
    get_registry()
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .get(db_type)
}

/// Open a connection using only what the dialect was initialised with
pub fn open_dialect(dialect: &dyn Dialect) -> Result<Arc<dyn Db>, ConnectionError> {
    debug!(
        "Opening {} connection through driver '{}'",
        dialect.database_type(),
        dialect.driver_name()
    );
    executor::open(dialect.driver_name(), dialect.data_source_name())
}
