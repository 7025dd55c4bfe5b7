//! In-memory [`Db`] that answers queries from canned rows.
//!
//! Used by the test suites to drive catalog introspection without a live
//! database.

use crate::executor::connection::{ConnectionError, Db, Row};
use std::sync::Mutex;

#[derive(Default)]
pub struct ScriptedDb {
    responses: Vec<(String, Vec<Row>)>,
    failure: Option<String>,
    log: Mutex<Vec<(String, Vec<String>)>>,
}

impl ScriptedDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer any query containing `pattern` with `rows`; first match wins
    pub fn respond(mut self, pattern: &str, rows: Vec<Vec<Option<&str>>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(|v| v.map(str::to_string)).collect())
            .collect();
        self.responses.push((pattern.to_string(), rows));
        self
    }

    /// Fail every query as an unreachable server would
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Every query received so far, with its arguments
    pub fn queries(&self) -> Vec<(String, Vec<String>)> {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Db for ScriptedDb {
    fn query(&self, sql: &str, args: &[String]) -> Result<Vec<Row>, ConnectionError> {
        self.log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((sql.to_string(), args.to_vec()));

        if let Some(message) = &self.failure {
            return Err(ConnectionError::ConnectionFailed(message.clone()));
        }

        Ok(self
            .responses
            .iter()
            .find(|(pattern, _)| sql.contains(pattern.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }

    fn execute(&self, sql: &str, args: &[String]) -> Result<(), ConnectionError> {
        self.query(sql, args).map(|_| ())
    }
}
