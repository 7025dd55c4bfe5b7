use crate::model::uri::{DbType, Uri};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub ddl: DdlConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_type")]
    pub db_type: DbType,

    /// ODBC driver name, e.g. "PostgreSQL Unicode"
    #[serde(default = "default_driver")]
    pub driver: String,

    /// Full ODBC connection string; when absent one is built from the fields below
    pub connection_string: Option<String>,

    #[serde(default = "default_protocol")]
    pub protocol: String,

    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub port: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub charset: String,

    #[serde(default = "default_timeout")]
    pub timeout: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DdlConfig {
    /// Storage engine for CREATE TABLE on engines that support one
    #[serde(default)]
    pub store_engine: String,

    /// Charset for CREATE TABLE; falls back to `database.charset`
    #[serde(default)]
    pub charset: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_colored")]
    pub colored: bool,
}

// Default values
fn default_db_type() -> DbType {
    DbType::Postgres
}
fn default_driver() -> String {
    "PostgreSQL Unicode".to_string()
}
fn default_protocol() -> String {
    "tcp".to_string()
}
fn default_timeout() -> u32 {
    30
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_colored() -> bool {
    true
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: default_db_type(),
            driver: default_driver(),
            connection_string: None,
            protocol: default_protocol(),
            host: String::new(),
            port: String::new(),
            name: String::new(),
            user: String::new(),
            password: String::new(),
            charset: String::new(),
            timeout: default_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            colored: default_colored(),
        }
    }
}

impl DatabaseConfig {
    pub fn to_uri(&self) -> Uri {
        Uri {
            db_type: self.db_type,
            protocol: self.protocol.clone(),
            host: self.host.clone(),
            port: self.port.clone(),
            db_name: self.name.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            charset: self.charset.clone(),
            local_addr: String::new(),
            remote_addr: if self.host.is_empty() || self.port.is_empty() {
                self.host.clone()
            } else {
                format!("{}:{}", self.host, self.port)
            },
            timeout: Duration::from_secs(u64::from(self.timeout)),
        }
    }

    /// Explicit connection string, or one assembled from the endpoint fields
    pub fn data_source_name(&self) -> String {
        match &self.connection_string {
            Some(conn) => conn.clone(),
            None => self.to_uri().odbc_connection_string(&self.driver),
        }
    }
}

impl Config {
    /// Load configuration from file with environment override support
    pub fn load(config_path: Option<&str>, environment: Option<&str>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(path) = config_path {
            config = Self::load_from_file(path)?;
        } else {
            for standard_path in Self::standard_config_paths() {
                if standard_path.exists() {
                    debug!("Loading config from: {}", standard_path.display());
                    config = Self::load_from_file(&standard_path.to_string_lossy())?;
                    break;
                }
            }
        }

        if let Some(env) = environment {
            if let Ok(env_overlay) = Self::load_environment_overlay(env) {
                debug!("Applying environment config for: {}", env);
                config = config.merge(env_overlay)?;
            }
        }

        // Local overrides always come last
        if let Ok(local_overlay) = Self::load_overlay("config/local.toml") {
            debug!("Applying local config overrides");
            config = config.merge(local_overlay)?;
        }

        Ok(config)
    }

    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse(path.to_string(), e.to_string()))
    }

    /// Raw keys of an overlay file; only keys present in it are applied
    pub fn load_overlay(path: &str) -> Result<toml::Table, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;

        content
            .parse::<toml::Table>()
            .map_err(|e| ConfigError::Parse(path.to_string(), e.to_string()))
    }

    fn load_environment_overlay(environment: &str) -> Result<toml::Table, ConfigError> {
        let env_path = format!("config/{}.toml", environment);
        Self::load_overlay(&env_path)
    }

    fn standard_config_paths() -> Vec<PathBuf> {
        vec![
            PathBuf::from("ddlkit.toml"),
            PathBuf::from("config/default.toml"),
        ]
    }

    /// Apply an overlay on top of this config; keys the overlay leaves out keep their value
    pub fn merge(self, overlay: toml::Table) -> Result<Self, ConfigError> {
        let mut merged =
            toml::Value::try_from(&self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        if let toml::Value::Table(table) = &mut merged {
            merge_tables(table, overlay);
        }
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Merge(e.to_string()))
    }

    pub fn generate_default_config(path: &str) -> Result<(), ConfigError> {
        let config = Config::default();
        let toml_content =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        fs::write(path, toml_content)
            .map_err(|e| ConfigError::FileWrite(path.to_string(), e.to_string()))?;

        Ok(())
    }
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        if let toml::Value::Table(nested) = value {
            if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                merge_tables(existing, nested);
                continue;
            }
            base.insert(key, toml::Value::Table(nested));
        } else {
            base.insert(key, value);
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{0}': {1}")]
    FileRead(String, String),

    #[error("Failed to parse config file '{0}': {1}")]
    Parse(String, String),

    #[error("Failed to write config file '{0}': {1}")]
    FileWrite(String, String),

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Failed to apply config overlay: {0}")]
    Merge(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_config_default_values() {
        let config = Config::default();

        assert_eq!(config.database.db_type, DbType::Postgres);
        assert_eq!(config.database.driver, "PostgreSQL Unicode");
        assert_eq!(config.database.connection_string, None);
        assert_eq!(config.database.protocol, "tcp");
        assert_eq!(config.database.timeout, 30);

        assert!(config.ddl.store_engine.is_empty());
        assert!(config.ddl.charset.is_empty());

        assert_eq!(config.logging.level, "info");
        assert!(config.logging.colored);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();

        assert!(toml_str.contains("[database]"));
        assert!(toml_str.contains("[ddl]"));
        assert!(toml_str.contains("[logging]"));
        assert!(toml_str.contains("db_type = \"postgres\""));
        assert!(toml_str.contains("timeout = 30"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_content = r#"
[database]
db_type = "mysql"
driver = "MySQL ODBC 8.0 Unicode Driver"
host = "db.internal"
port = "3306"
name = "shop"
user = "app"
charset = "utf8mb4"
timeout = 10

[ddl]
store_engine = "InnoDB"

[logging]
level = "debug"
colored = false
        "#;

        let config: Config = toml::from_str(toml_content).unwrap();

        assert_eq!(config.database.db_type, DbType::Mysql);
        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.name, "shop");
        assert_eq!(config.database.timeout, 10);
        assert_eq!(config.ddl.store_engine, "InnoDB");
        assert!(config.ddl.charset.is_empty());
        assert_eq!(config.logging.level, "debug");
        assert!(!config.logging.colored);
    }

    #[test]
    fn test_config_partial_deserialization() {
        let toml_content = r#"
[database]
db_type = "sqlite"
        "#;

        let config: Config = toml::from_str(toml_content).unwrap();

        assert_eq!(config.database.db_type, DbType::Sqlite);
        assert_eq!(config.database.timeout, 30);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_rejects_unknown_db_type() {
        let toml_content = r#"
[database]
db_type = "oracle"
        "#;

        assert!(toml::from_str::<Config>(toml_content).is_err());
    }

    #[test]
    fn test_database_config_to_uri() {
        let database = DatabaseConfig {
            db_type: DbType::Mysql,
            host: "localhost".to_string(),
            port: "3306".to_string(),
            name: "shop".to_string(),
            charset: "utf8".to_string(),
            timeout: 5,
            ..DatabaseConfig::default()
        };

        let uri = database.to_uri();
        assert_eq!(uri.db_type, DbType::Mysql);
        assert_eq!(uri.db_name, "shop");
        assert_eq!(uri.charset, "utf8");
        assert_eq!(uri.remote_addr, "localhost:3306");
        assert_eq!(uri.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_data_source_name_prefers_explicit_connection_string() {
        let mut database = DatabaseConfig {
            name: "app".to_string(),
            ..DatabaseConfig::default()
        };
        assert!(database.data_source_name().starts_with("Driver={PostgreSQL Unicode};"));

        database.connection_string = Some("DSN=warehouse;".to_string());
        assert_eq!(database.data_source_name(), "DSN=warehouse;");
    }

    #[test]
    fn test_config_load_from_file() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(
            temp_file.path(),
            "[ddl]\nstore_engine = \"MyISAM\"\ncharset = \"latin1\"\n",
        )
        .unwrap();

        let config = Config::load_from_file(temp_file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.ddl.store_engine, "MyISAM");
        assert_eq!(config.ddl.charset, "latin1");
    }

    #[test]
    fn test_config_load_from_nonexistent_file() {
        let result = Config::load_from_file("/nonexistent/ddlkit.toml");
        assert!(matches!(result.unwrap_err(), ConfigError::FileRead(_, _)));
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "invalid toml content [[[").unwrap();

        let result = Config::load_from_file(temp_file.path().to_str().unwrap());
        assert!(matches!(result.unwrap_err(), ConfigError::Parse(_, _)));
    }

    #[test]
    fn test_config_merge() {
        let base_config = Config {
            database: DatabaseConfig {
                connection_string: Some("base-connection".to_string()),
                host: "db.internal".to_string(),
                ..DatabaseConfig::default()
            },
            ..Config::default()
        };

        let overlay: toml::Table = r#"
[database]
db_type = "mssql"
timeout = 60

[ddl]
store_engine = "InnoDB"
charset = "utf8mb4"
"#
        .parse()
        .unwrap();

        let merged = base_config.merge(overlay).unwrap();

        // Keys the overlay leaves out are kept
        assert_eq!(
            merged.database.connection_string,
            Some("base-connection".to_string())
        );
        assert_eq!(merged.database.host, "db.internal");
        assert_eq!(merged.database.db_type, DbType::Mssql);
        assert_eq!(merged.database.timeout, 60);
        assert_eq!(merged.ddl.store_engine, "InnoDB");
        assert_eq!(merged.ddl.charset, "utf8mb4");
    }

    #[test]
    fn test_logging_only_overlay_keeps_database() {
        let base_config: Config = toml::from_str(
            "[database]\ndb_type = \"mysql\"\nhost = \"db.internal\"\nname = \"shop\"\ncharset = \"utf8mb4\"\n",
        )
        .unwrap();
        let overlay: toml::Table = "[logging]\nlevel = \"debug\"\n".parse().unwrap();

        let merged = base_config.merge(overlay).unwrap();

        assert_eq!(merged.database.db_type, DbType::Mysql);
        assert_eq!(merged.database.host, "db.internal");
        assert_eq!(merged.database.name, "shop");
        assert_eq!(merged.database.charset, "utf8mb4");
        assert_eq!(merged.logging.level, "debug");
        assert!(merged.logging.colored);
    }

    #[test]
    fn test_overlay_with_invalid_value_fails() {
        let overlay: toml::Table = "[database]\ndb_type = \"oracle\"\n".parse().unwrap();
        let result = Config::default().merge(overlay);
        assert!(matches!(result.unwrap_err(), ConfigError::Merge(_)));
    }

    #[test]
    fn test_load_overlay_reports_parse_errors() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[logging\n").unwrap();

        let result = Config::load_overlay(temp_file.path().to_str().unwrap());
        assert!(matches!(result.unwrap_err(), ConfigError::Parse(_, _)));
    }

    #[test]
    fn test_generate_default_config() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("generated.toml");

        Config::generate_default_config(config_path.to_str().unwrap()).unwrap();
        assert!(config_path.exists());

        let loaded = Config::load_from_file(config_path.to_str().unwrap()).unwrap();
        assert_eq!(loaded.database.db_type, DbType::Postgres);
        assert_eq!(loaded.database.timeout, 30);
        assert_eq!(loaded.logging.level, "info");
    }

    #[test]
    fn test_config_error_display() {
        let errors = vec![
            ConfigError::FileRead("test.toml".to_string(), "Not found".to_string()),
            ConfigError::Parse("test.toml".to_string(), "Invalid syntax".to_string()),
            ConfigError::FileWrite("test.toml".to_string(), "Permission denied".to_string()),
            ConfigError::Serialize("Invalid value".to_string()),
            ConfigError::Merge("bad db_type".to_string()),
        ];

        for error in errors {
            let error_string = format!("{}", error);
            match error {
                ConfigError::FileRead(path, _) => assert!(error_string.contains(&path)),
                ConfigError::Parse(path, _) => assert!(error_string.contains(&path)),
                ConfigError::FileWrite(path, _) => assert!(error_string.contains(&path)),
                ConfigError::Serialize(_) => assert!(error_string.contains("serialize")),
                ConfigError::Merge(msg) => assert!(error_string.contains(&msg)),
            }
        }
    }
}
