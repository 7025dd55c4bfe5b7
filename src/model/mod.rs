pub mod config;
pub mod schema;
pub mod uri;

pub use config::{Config, ConfigError};
pub use schema::{Column, Index, IndexType, SchemaError, SqlType, Table};
pub use uri::{DbType, Uri};
