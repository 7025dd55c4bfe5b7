use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Database engine identifier, used as the registry key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    Mysql,
    Postgres,
    Sqlite,
    Mssql,
}

impl DbType {
    pub const ALL: [DbType; 4] = [DbType::Mysql, DbType::Postgres, DbType::Sqlite, DbType::Mssql];

    pub fn as_str(&self) -> &'static str {
        match self {
            DbType::Mysql => "mysql",
            DbType::Postgres => "postgres",
            DbType::Sqlite => "sqlite",
            DbType::Mssql => "mssql",
        }
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown database type: {0}")]
pub struct UnknownDbType(pub String);

impl FromStr for DbType {
    type Err = UnknownDbType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(DbType::Mysql),
            "postgres" | "postgresql" | "pg" => Ok(DbType::Postgres),
            "sqlite" | "sqlite3" => Ok(DbType::Sqlite),
            "mssql" | "sqlserver" => Ok(DbType::Mssql),
            _ => Err(UnknownDbType(s.to_string())),
        }
    }
}

/// Connection endpoint description handed to a dialect at init time.
///
/// The dialect keeps its own copy once bound; nothing mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uri {
    pub db_type: DbType,
    pub protocol: String,
    pub host: String,
    pub port: String,
    pub db_name: String,
    pub user: String,
    pub password: String,
    pub charset: String,
    pub local_addr: String,
    pub remote_addr: String,
    pub timeout: Duration,
}

impl Uri {
    /// A URI with only the engine set, everything else empty
    pub fn new(db_type: DbType) -> Self {
        Self {
            db_type,
            protocol: String::new(),
            host: String::new(),
            port: String::new(),
            db_name: String::new(),
            user: String::new(),
            password: String::new(),
            charset: String::new(),
            local_addr: String::new(),
            remote_addr: String::new(),
            timeout: Duration::ZERO,
        }
    }

    pub fn with_db_name(mut self, db_name: impl Into<String>) -> Self {
        self.db_name = db_name.into();
        self
    }

    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    /// Build an ODBC connection string for this endpoint using the given driver.
    ///
    /// Empty fields are left out. SQLite drivers take the database file as `Database`.
    pub fn odbc_connection_string(&self, driver: &str) -> String {
        let mut parts = vec![format!("Driver={{{}}}", driver)];
        let mut push = |key: &str, value: &str| {
            if !value.is_empty() {
                parts.push(format!("{}={}", key, value));
            }
        };

        push("Server", &self.host);
        push("Port", &self.port);
        push("Database", &self.db_name);
        push("Uid", &self.user);
        push("Pwd", &self.password);
        if self.db_type == DbType::Mysql {
            push("Charset", &self.charset);
        }
        if !self.timeout.is_zero() {
            let secs = self.timeout.as_secs().to_string();
            push("LoginTimeout", &secs);
        }

        let mut conn = parts.join(";");
        conn.push(';');
        conn
    }
}
