use clap::{Parser, Subcommand};

/// CLI entry point for ddlkit
#[derive(Parser, Debug)]
#[command(
    name = "ddlkit",
    version,
    about = "Portable DDL synthesis and schema introspection across SQL dialects"
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Environment (loads config/{env}.toml)
    #[arg(long, global = true)]
    pub env: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List registered dialects and their capabilities
    Dialects,

    /// Generate CREATE TABLE and CREATE INDEX statements from a schema file
    Ddl {
        /// Path to a TOML schema file
        #[arg(long)]
        schema: String,

        /// Target dialect (defaults to the configured database type)
        #[arg(long)]
        dialect: Option<String>,

        /// Storage engine for dialects that support one
        #[arg(long)]
        engine: Option<String>,

        /// Default character set for dialects that support one
        #[arg(long)]
        charset: Option<String>,

        /// Emit DROP TABLE before each CREATE TABLE
        #[arg(long)]
        drop: bool,
    },

    /// Generate a DROP TABLE statement
    Drop {
        /// Table to drop
        #[arg(long)]
        table: String,

        /// Target dialect (defaults to the configured database type)
        #[arg(long)]
        dialect: Option<String>,
    },

    /// Show (or run) the catalog probe for a table, column or index
    Probe {
        /// Table to probe
        #[arg(long)]
        table: String,

        /// Probe a column of the table instead
        #[arg(long, conflicts_with = "index")]
        column: Option<String>,

        /// Require the column to be part of the primary key
        #[arg(long, requires = "column")]
        pk: bool,

        /// Probe an index (physical name) of the table instead
        #[arg(long)]
        index: Option<String>,

        /// Target dialect (defaults to the configured database type)
        #[arg(long)]
        dialect: Option<String>,

        /// Print the SQL with the dialect's rewriting filters applied
        #[arg(long)]
        native: bool,

        /// ODBC connection string; when given the probe is executed
        #[arg(long)]
        conn: Option<String>,
    },

    /// Connect and describe tables, columns and indexes
    Inspect {
        /// ODBC connection string
        #[arg(long)]
        conn: Option<String>,

        /// Dialect of the database (defaults to the configured database type)
        #[arg(long)]
        dialect: Option<String>,

        /// Describe a single table
        #[arg(long)]
        table: Option<String>,
    },

    /// Generate configuration file
    Config {
        /// Output path for config file
        #[arg(long, default_value = "ddlkit.toml")]
        output: String,

        /// Create environment-specific config
        #[arg(long)]
        env: Option<String>,
    },
}
