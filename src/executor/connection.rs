use log::{debug, error, info};
use odbc_api::{
    buffers::TextRowSet, Connection, ConnectionOptions, Cursor, Environment, Error as OdbcError,
    IntoParameter,
};
use std::sync::Arc;

/// A result row; `None` is SQL NULL
pub type Row = Vec<Option<String>>;

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("ODBC error: {0}")]
    Odbc(#[from] OdbcError),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query execution failed: {0}")]
    QueryFailed(String),
}

/// The connection object dialects are bound to.
///
/// Arguments are always bound as parameters, never spliced into the SQL text.
pub trait Db: Send + Sync {
    /// Run a query and collect every row as text
    fn query(&self, sql: &str, args: &[String]) -> Result<Vec<Row>, ConnectionError>;

    /// Run a statement, discarding any result set
    fn execute(&self, sql: &str, args: &[String]) -> Result<(), ConnectionError>;
}

/// ODBC-backed [`Db`]. Each call opens a fresh connection from the shared environment.
pub struct OdbcDb {
    environment: Arc<Environment>,
    connection_string: String,
}

impl OdbcDb {
    pub fn new(connection_string: &str) -> Result<Self, ConnectionError> {
        let environment = Environment::new()?;
        Ok(Self {
            environment: Arc::new(environment),
            connection_string: connection_string.to_string(),
        })
    }

    fn connect(&self) -> Result<Connection<'_>, ConnectionError> {
        debug!(
            "Connecting to database with connection string length: {}",
            self.connection_string.len()
        );

        self.environment
            .connect_with_connection_string(&self.connection_string, ConnectionOptions::default())
            .map_err(|e| {
                error!("Failed to connect to database: {}", e);
                ConnectionError::ConnectionFailed(e.to_string())
            })
    }

    /// Open and immediately drop a connection to surface connectivity problems early
    pub fn ping(&self) -> Result<(), ConnectionError> {
        self.connect().map(|_| ())
    }
}

impl Db for OdbcDb {
    fn query(&self, sql: &str, args: &[String]) -> Result<Vec<Row>, ConnectionError> {
        debug!("Querying rows: {} ({} args)", sql, args.len());

        let connection = self.connect()?;
        let mut prepared = connection
            .prepare(sql)
            .map_err(|e| ConnectionError::QueryFailed(e.to_string()))?;

        let params: Vec<_> = args.iter().map(|a| a.as_str().into_parameter()).collect();
        let mut cursor = prepared
            .execute(params.as_slice())
            .map_err(|e| ConnectionError::QueryFailed(e.to_string()))?
            .ok_or_else(|| ConnectionError::QueryFailed("Query returned no cursor".to_string()))?;

        let mut buffer = TextRowSet::for_cursor(100, &mut cursor, Some(4096))?;
        let mut row_set_cursor = cursor.bind_buffer(&mut buffer)?;
        let mut results = Vec::new();

        while let Some(row_set) = row_set_cursor.fetch()? {
            for row_index in 0..row_set.num_rows() {
                let row = (0..row_set.num_cols())
                    .map(|col_index| {
                        row_set
                            .at(col_index, row_index)
                            .map(|v| String::from_utf8_lossy(v).to_string())
                    })
                    .collect();
                results.push(row);
            }
        }

        debug!("Query returned {} rows", results.len());
        Ok(results)
    }

    fn execute(&self, sql: &str, args: &[String]) -> Result<(), ConnectionError> {
        debug!("Executing SQL statement: {}", sql);

        let connection = self.connect()?;
        let mut prepared = connection
            .prepare(sql)
            .map_err(|e| ConnectionError::QueryFailed(e.to_string()))?;

        let params: Vec<_> = args.iter().map(|a| a.as_str().into_parameter()).collect();
        match prepared.execute(params.as_slice()) {
            Ok(Some(mut cursor)) => {
                let mut buffer = TextRowSet::for_cursor(100, &mut cursor, Some(4096))?;
                let mut row_set_cursor = cursor.bind_buffer(&mut buffer)?;
                while row_set_cursor.fetch()?.is_some() {
                    // Consume results
                }
                debug!("Statement executed successfully with results");
                Ok(())
            }
            Ok(None) => {
                debug!("Statement executed successfully (no results)");
                Ok(())
            }
            Err(e) => {
                error!("Statement execution failed: {}", e);
                Err(ConnectionError::QueryFailed(e.to_string()))
            }
        }
    }
}

/// Open a connection for a driver name and data source string.
///
/// A data source that already names a driver or DSN is used verbatim; otherwise
/// `Driver={<driver_name>};` is prepended.
pub fn open(driver_name: &str, data_source_name: &str) -> Result<Arc<dyn Db>, ConnectionError> {
    let connection_string = odbc_connection_string(driver_name, data_source_name);
    let db = OdbcDb::new(&connection_string)?;
    db.ping()?;
    info!("Successfully connected to database");
    Ok(Arc::new(db))
}

fn odbc_connection_string(driver_name: &str, data_source_name: &str) -> String {
    let lower = data_source_name.to_lowercase();
    if driver_name.is_empty() || lower.contains("driver=") || lower.contains("dsn=") {
        data_source_name.to_string()
    } else {
        format!("Driver={{{}}};{}", driver_name, data_source_name)
    }
}
