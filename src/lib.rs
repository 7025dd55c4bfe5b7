//! ddlkit: a database dialect layer.
//!
//! Dialects render portable table metadata into engine-specific DDL and
//! probe live catalogs over ODBC. Built-in dialects are registered in a
//! process-wide registry keyed by [`model::DbType`].

pub mod cli;
pub mod dialects;
pub mod executor;
pub mod logger;
pub mod model;

pub use dialects::{get_dialect, query_dialect, register_dialect, Dialect, DialectError};
pub use model::{Column, DbType, Index, IndexType, SqlType, Table, Uri};
