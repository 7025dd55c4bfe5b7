pub mod connection;
#[cfg(any(test, feature = "integration"))]
pub mod scripted;

pub use connection::{open, ConnectionError, Db, OdbcDb, Row};
#[cfg(any(test, feature = "integration"))]
pub use scripted::ScriptedDb;
