//! SQL rewriting passes a caller runs before handing SQL to a native driver.
//!
//! Each dialect publishes its own ordered chain through `Dialect::filters`.

use crate::dialects::base::Dialect;
use crate::model::schema::Table;

pub trait Filter: Send + Sync {
    fn name(&self) -> &str;

    fn apply(&self, sql: &str, dialect: &dyn Dialect, table: Option<&Table>) -> String;
}

/// Replaces the `(id)` placeholder with the table's quoted single primary key
#[derive(Debug, Clone, Copy, Default)]
pub struct IdFilter;

impl Filter for IdFilter {
    fn name(&self) -> &str {
        "id"
    }

    fn apply(&self, sql: &str, dialect: &dyn Dialect, table: Option<&Table>) -> String {
        let Some(table) = table else {
            return sql.to_string();
        };
        let [pk] = table.primary_keys() else {
            return sql.to_string();
        };

        let replacement = format!(" {} ", dialect.quote(pk));
        sql.replace(" `(id)` ", &replacement)
            .replace(&format!(" {} ", dialect.quote("(id)")), &replacement)
            .replace(" (id) ", &replacement)
    }
}

/// Rewrites backtick quoting to the dialect's quote character
#[derive(Debug, Clone, Copy, Default)]
pub struct QuoteFilter;

impl Filter for QuoteFilter {
    fn name(&self) -> &str {
        "quote"
    }

    fn apply(&self, sql: &str, dialect: &dyn Dialect, _table: Option<&Table>) -> String {
        sql.replace('`', dialect.quote_char())
    }
}

/// Rewrites `?` placeholders into numbered ones (`$1`, `$2`, ...).
/// Question marks inside single-quoted literals are left alone.
#[derive(Debug, Clone)]
pub struct SeqFilter {
    pub prefix: String,
    pub start: usize,
}

impl SeqFilter {
    pub fn new(prefix: impl Into<String>, start: usize) -> Self {
        Self {
            prefix: prefix.into(),
            start,
        }
    }
}

impl Filter for SeqFilter {
    fn name(&self) -> &str {
        "seq"
    }

    fn apply(&self, sql: &str, _dialect: &dyn Dialect, _table: Option<&Table>) -> String {
        let mut out = String::with_capacity(sql.len() + 8);
        let mut in_literal = false;
        let mut next = self.start;

        for ch in sql.chars() {
            if !in_literal && ch == '?' {
                out.push_str(&self.prefix);
                out.push_str(&next.to_string());
                next += 1;
            } else {
                if ch == '\'' {
                    in_literal = !in_literal;
                }
                out.push(ch);
            }
        }
        out
    }
}

/// Run the dialect's filter chain over `sql` in order
pub fn apply_filters(dialect: &dyn Dialect, sql: &str, table: Option<&Table>) -> String {
    dialect
        .filters()
        .iter()
        .fold(sql.to_string(), |acc, filter| filter.apply(&acc, dialect, table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialects::{MysqlDialect, PostgresDialect};
    use crate::model::schema::{Column, SqlType};

    fn users() -> Table {
        Table::new("users")
            .with_column(Column::new("user_id", SqlType::BigInt).primary_key())
            .with_column(Column::new("name", SqlType::Text))
    }

    #[test]
    fn test_id_filter_replaces_placeholder_forms() {
        let dialect = MysqlDialect::new();
        let table = users();

        let sql = "SELECT * FROM `users` WHERE (id) = ? OR `(id)` = ?";
        let out = IdFilter.apply(&format!("{} ", sql), &dialect, Some(&table));
        assert_eq!(out, "SELECT * FROM `users` WHERE `user_id` = ? OR `user_id` = ? ");
    }

    #[test]
    fn test_id_filter_needs_single_primary_key() {
        let dialect = MysqlDialect::new();
        let mut table = users();
        table.set_primary_keys(["user_id", "name"]);

        let sql = "DELETE FROM t WHERE (id) = ?";
        assert_eq!(IdFilter.apply(sql, &dialect, Some(&table)), sql);
        assert_eq!(IdFilter.apply(sql, &dialect, None), sql);
    }

    #[test]
    fn test_quote_filter_uses_dialect_quote() {
        let dialect = PostgresDialect::new();
        assert_eq!(
            QuoteFilter.apply("SELECT `name` FROM `users`", &dialect, None),
            "SELECT \"name\" FROM \"users\""
        );
    }

    #[test]
    fn test_seq_filter_skips_string_literals() {
        let dialect = PostgresDialect::new();
        let filter = SeqFilter::new("$", 1);

        assert_eq!(
            filter.apply("SELECT ? , '?' , ?", &dialect, None),
            "SELECT $1 , '?' , $2"
        );
    }

    #[test]
    fn test_apply_filters_postgres_chain() {
        let dialect = PostgresDialect::new();
        let table = users();

        let out = apply_filters(
            &dialect,
            "SELECT `name` FROM `users` WHERE (id) = ? AND `name` = ?",
            Some(&table),
        );
        assert_eq!(
            out,
            "SELECT \"name\" FROM \"users\" WHERE \"user_id\" = $1 AND \"name\" = $2"
        );
    }
}
