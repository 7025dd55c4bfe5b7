use crate::cli::args::{Cli, Commands};
use crate::dialects::{self, apply_filters, Dialect, DialectError, ProbeSql};
use crate::executor::{self, ConnectionError};
use crate::model::schema::{load_schema, SchemaError, Table};
use crate::model::{Config, ConfigError};
use log::{debug, error, info};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Dialect(#[from] DialectError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to create directory '{0}': {1}")]
    CreateDir(String, String),
}

pub fn handle(cli: Cli, config: Config) {
    debug!("Loaded configuration: {:?}", config);

    let (name, result) = match cli.command {
        Commands::Dialects => ("dialects", run_dialects()),
        Commands::Ddl {
            schema,
            dialect,
            engine,
            charset,
            drop,
        } => {
            info!("Running DDL command");
            let engine = engine.or_else(|| non_empty(&config.ddl.store_engine));
            let charset = charset
                .or_else(|| non_empty(&config.ddl.charset))
                .or_else(|| non_empty(&config.database.charset));
            (
                "ddl",
                resolve_dialect(dialect.as_deref(), &config).and_then(|d| {
                    run_ddl(d.as_ref(), &schema, engine.as_deref(), charset.as_deref(), drop)
                }),
            )
        }
        Commands::Drop { table, dialect } => (
            "drop",
            resolve_dialect(dialect.as_deref(), &config).map(|d| {
                println!("{};", d.drop_table_sql(&table));
            }),
        ),
        Commands::Probe {
            table,
            column,
            pk,
            index,
            dialect,
            native,
            conn,
        } => {
            info!("Running PROBE command");
            let target = match (column, index) {
                (Some(column), _) => ProbeTarget::Column(column, pk),
                (None, Some(index)) => ProbeTarget::Index(index),
                (None, None) => ProbeTarget::Table,
            };
            (
                "probe",
                resolve_dialect(dialect.as_deref(), &config)
                    .and_then(|d| run_probe(d, &config, &table, target, native, conn)),
            )
        }
        Commands::Inspect {
            conn,
            dialect,
            table,
        } => {
            info!("Running INSPECT command");
            (
                "inspect",
                resolve_dialect(dialect.as_deref(), &config)
                    .and_then(|d| run_inspect(d, &config, conn, table.as_deref())),
            )
        }
        Commands::Config { output, env } => {
            info!("Running CONFIG command");
            ("config", run_config(&output, env.as_deref()))
        }
    };

    if let Err(e) = result {
        error!("{} command failed: {}", name, e);
        std::process::exit(1);
    }
}

enum ProbeTarget {
    Table,
    Column(String, bool),
    Index(String),
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// `--dialect` wins over the configured database type
fn resolve_dialect(name: Option<&str>, config: &Config) -> Result<Arc<dyn Dialect>, CommandError> {
    let name = name.map_or_else(|| config.database.db_type.to_string(), str::to_string);
    debug!("Using dialect: {}", name);
    Ok(dialects::get_dialect(&name)?)
}

/// Connect and bind the dialect; the connection string comes from `--conn` or the config
fn connect(dialect: &dyn Dialect, config: &Config, conn: Option<String>) -> Result<(), CommandError> {
    let data_source_name = conn.unwrap_or_else(|| config.database.data_source_name());
    let mut uri = config.database.to_uri();
    uri.db_type = dialect.database_type();

    let db = executor::open(&config.database.driver, &data_source_name)?;
    dialect.init(db, uri, &config.database.driver, &data_source_name)?;
    Ok(())
}

fn run_dialects() -> Result<(), CommandError> {
    for db_type in dialects::list_dialects() {
        let Some(dialect) = dialects::query_dialect(db_type) else {
            continue;
        };
        let caps = dialect.capabilities();
        println!("{:<10} {}", db_type, dialect.description());
        println!(
            "           quote={} engine={} charset={} insert_many={} index_on_table={}",
            dialect.quote_char(),
            caps.supports_engine,
            caps.supports_charset,
            caps.supports_insert_many,
            caps.index_on_table
        );
    }
    Ok(())
}

fn run_ddl(
    dialect: &dyn Dialect,
    schema_path: &str,
    engine: Option<&str>,
    charset: Option<&str>,
    drop: bool,
) -> Result<(), CommandError> {
    let tables = load_schema(schema_path)?;
    info!("Loaded {} tables from {}", tables.len(), schema_path);

    let mut statements = Vec::new();
    for table in &tables {
        statements.extend(table_ddl(dialect, table, engine, charset, drop)?);
    }

    for statement in statements {
        println!("{}", statement);
    }
    Ok(())
}

/// Statements for one table; per-table engine and charset win over the command line
fn table_ddl(
    dialect: &dyn Dialect,
    table: &Table,
    engine: Option<&str>,
    charset: Option<&str>,
    drop: bool,
) -> Result<Vec<String>, CommandError> {
    let mut statements = Vec::new();
    if drop {
        statements.push(format!("{};", dialect.drop_table_sql(&table.name)));
    }

    let engine = table.store_engine.as_deref().or(engine);
    let charset = table.charset.as_deref().or(charset);
    statements.push(dialect.create_table_sql(table, None, engine, charset)?);

    for index in table.indexes().values() {
        statements.push(dialect.create_index_sql(&table.name, index)?);
    }
    Ok(statements)
}

fn run_probe(
    dialect: Arc<dyn Dialect>,
    config: &Config,
    table: &str,
    target: ProbeTarget,
    native: bool,
    conn: Option<String>,
) -> Result<(), CommandError> {
    let needs_connection = conn.is_some();
    if needs_connection {
        connect(dialect.as_ref(), config, conn)?;
    }

    let probe: ProbeSql = match &target {
        ProbeTarget::Table => dialect.table_exists_sql(table),
        ProbeTarget::Column(column, pk) => dialect.column_exists_sql(table, column, *pk),
        ProbeTarget::Index(index) => dialect.index_exists_sql(table, index),
    };

    if !needs_connection {
        let sql = if native {
            apply_filters(dialect.as_ref(), &probe.sql, None)
        } else {
            probe.sql.clone()
        };
        println!("{}", sql);
        println!("-- args: {:?}", probe.args);
        return Ok(());
    }

    let found = match target {
        ProbeTarget::Table => dialects::table_exists(dialect.as_ref(), table)?,
        ProbeTarget::Column(column, pk) => dialects::column_exists(dialect.as_ref(), table, &column, pk)?,
        ProbeTarget::Index(index) => dialects::index_exists(dialect.as_ref(), table, &index)?,
    };
    println!("{}", found);
    Ok(())
}

fn run_inspect(
    dialect: Arc<dyn Dialect>,
    config: &Config,
    conn: Option<String>,
    table: Option<&str>,
) -> Result<(), CommandError> {
    connect(dialect.as_ref(), config, conn)?;

    let tables = match table {
        Some(name) => vec![dialects::describe_table(dialect.as_ref(), name)?],
        None => dialects::describe_schema(dialect.as_ref())?,
    };

    for table in &tables {
        print_table(dialect.as_ref(), table);
    }
    info!("Described {} tables", tables.len());
    Ok(())
}

fn print_table(dialect: &dyn Dialect, table: &Table) {
    match &table.store_engine {
        Some(engine) => println!("{} (engine: {})", table.name, engine),
        None => println!("{}", table.name),
    }
    for column in table.columns() {
        println!("  {}", column.to_sql_no_pk(dialect));
    }
    if !table.primary_keys().is_empty() {
        println!("  primary key: {}", table.primary_keys().join(", "));
    }
    for index in table.indexes().values() {
        let kind = if index.is_unique() { "unique" } else { "index" };
        println!("  {} {}: {}", kind, index.name, index.columns.join(", "));
    }
}

fn run_config(output: &str, env: Option<&str>) -> Result<(), CommandError> {
    debug!("Output path: {}", output);
    Config::generate_default_config(output)?;
    info!("Generated default configuration file: {}", output);

    if let Some(env_name) = env {
        std::fs::create_dir_all("config")
            .map_err(|e| CommandError::CreateDir("config".to_string(), e.to_string()))?;
        let env_path = format!("config/{}.toml", env_name);
        Config::generate_default_config(&env_path)?;
        info!("Generated environment configuration file: {}", env_path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialects::{MssqlDialect, MysqlDialect, PostgresDialect};
    use crate::model::schema::{Column, Index, IndexType, SqlType};
    use crate::model::uri::DbType;

    fn users() -> Table {
        let mut table = Table::new("users")
            .with_column(Column::new("id", SqlType::BigInt).primary_key().auto_increment())
            .with_column(Column::new("email", SqlType::Varchar(255)).not_null())
            .with_index(Index::new("email", IndexType::Unique).with_columns(["email"]));
        table.charset = Some("latin1".to_string());
        table
    }

    #[test]
    fn test_resolve_dialect_prefers_flag() {
        let config = Config::default();
        assert_eq!(resolve_dialect(None, &config).unwrap().database_type(), DbType::Postgres);
        assert_eq!(
            resolve_dialect(Some("mssql"), &config).unwrap().database_type(),
            DbType::Mssql
        );
        assert!(matches!(
            resolve_dialect(Some("db2"), &config),
            Err(CommandError::Dialect(DialectError::NotFound(_)))
        ));
    }

    #[test]
    fn test_table_ddl_mysql_uses_table_charset() {
        let statements =
            table_ddl(&MysqlDialect::new(), &users(), Some("InnoDB"), Some("utf8"), true).unwrap();
        assert_eq!(statements.len(), 3);
        assert_eq!(statements[0], "DROP TABLE IF EXISTS `users`;");
        assert!(statements[1].ends_with(") ENGINE=InnoDB DEFAULT CHARSET latin1;"));
        assert_eq!(
            statements[2],
            "CREATE UNIQUE INDEX `UQE_users_email` ON `users` (`email`);"
        );
    }

    #[test]
    fn test_table_ddl_postgres_ignores_options() {
        let statements = table_ddl(&PostgresDialect::new(), &users(), Some("InnoDB"), None, false).unwrap();
        assert_eq!(
            statements[0],
            "CREATE TABLE IF NOT EXISTS \"users\" (\"id\" BIGSERIAL PRIMARY KEY NOT NULL, \"email\" VARCHAR(255) NOT NULL);"
        );
    }

    #[test]
    fn test_table_ddl_mssql_guarded_drop() {
        let statements = table_ddl(&MssqlDialect::new(), &users(), None, None, true).unwrap();
        assert!(statements[0].starts_with("IF EXISTS (SELECT * FROM sysobjects"));
        assert!(statements[1].starts_with("IF NOT EXISTS (SELECT [name] FROM sys.tables"));
    }

    #[test]
    fn test_table_ddl_rejects_empty_table() {
        let result = table_ddl(&MysqlDialect::new(), &Table::new("empty"), None, None, false);
        assert!(matches!(
            result,
            Err(CommandError::Dialect(DialectError::MalformedTable(_)))
        ));
    }
}
