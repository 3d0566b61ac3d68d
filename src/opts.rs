//! Cursor options.

use no_panic::no_panic;
use url::Url;

use crate::error::Error;

/// Behavior configuration of a result cursor.
///
/// Supplied when the cursor is created and immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorOpts {
    /// Produce at most one row per result set.
    ///
    /// Further rows are skipped without being materialized; the records-affected
    /// count still reflects the whole result set.
    ///
    /// Default: `false`
    pub single_row: bool,

    /// Columns of a row must be read in increasing ordinal order, each at most once.
    ///
    /// Default: `false`
    pub sequential_access: bool,

    /// Close the owning connection when the cursor closes.
    ///
    /// Default: `false`
    pub close_connection_on_close: bool,
}

impl Default for CursorOpts {
    #[no_panic]
    fn default() -> Self {
        Self {
            single_row: false,
            sequential_access: false,
            close_connection_on_close: false,
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, Error> {
    match value {
        "true" | "True" | "1" | "yes" | "on" => Ok(true),
        "false" | "False" | "0" | "no" | "off" => Ok(false),
        _ => Err(Error::InvalidUsage(format!("Invalid {}: {}", key, value))),
    }
}

impl TryFrom<&Url> for CursorOpts {
    type Error = Error;

    /// Read cursor options from the query parameters of a PostgreSQL URL.
    ///
    /// Format: `postgres://[user[:password]@]host[:port][/database][?param1=value1&..]`
    ///
    /// Supported query parameters (true/True/1/yes/on or false/False/0/no/off):
    /// - `single_row`
    /// - `sequential_access`
    /// - `close_connection`
    ///
    /// Other parameters configure the connection and are ignored here.
    fn try_from(url: &Url) -> Result<Self, Self::Error> {
        if !["postgres", "pg"].contains(&url.scheme()) {
            return Err(Error::InvalidUsage(format!(
                "Invalid scheme: expected 'postgres://' or 'pg://', got '{}://'",
                url.scheme()
            )));
        }

        let mut opts = CursorOpts::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "single_row" => opts.single_row = parse_bool(&key, &value)?,
                "sequential_access" => opts.sequential_access = parse_bool(&key, &value)?,
                "close_connection" => opts.close_connection_on_close = parse_bool(&key, &value)?,
                _ => {}
            }
        }

        Ok(opts)
    }
}

impl TryFrom<&str> for CursorOpts {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let url = Url::parse(s).map_err(|e| Error::InvalidUsage(format!("Invalid URL: {}", e)))?;
        Self::try_from(&url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_plain_cursor() {
        let opts = CursorOpts::default();
        assert!(!opts.single_row);
        assert!(!opts.sequential_access);
        assert!(!opts.close_connection_on_close);
    }

    #[test]
    fn from_url_query() {
        let opts = CursorOpts::try_from(
            "postgres://app@db.internal/orders?sslmode=require&single_row=yes&close_connection=1",
        )
        .unwrap();
        assert!(opts.single_row);
        assert!(!opts.sequential_access);
        assert!(opts.close_connection_on_close);

        let opts = CursorOpts::try_from("pg://localhost?sequential_access=on").unwrap();
        assert!(opts.sequential_access);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(CursorOpts::try_from("mysql://localhost").is_err());
        assert!(CursorOpts::try_from("postgres://localhost?single_row=maybe").is_err());
        assert!(CursorOpts::try_from("not a url").is_err());
    }
}
