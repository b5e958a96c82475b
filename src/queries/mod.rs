//! Named custom queries serialized as a JSON array of row objects
//!
//! The serializer only needs the [`NamedQuery`] capability of a connection
//! and the [`RowCursor`] it returns; the `postgres` and `mysql` modules
//! provide both on top of `sqlx`.

pub mod mysql;
pub mod postgres;
pub mod registry;
pub mod value;

pub use registry::QueryRegistry;
pub use value::Value;

use crate::error::{Error, Result};
use dsn::DSN;
use std::{future::Future, time::Duration};

/// A connection able to run a pre-registered query by name
pub trait NamedQuery {
    type Rows: RowCursor;

    /// Run the query called `name` with positional `args`
    ///
    /// An unknown name, an execution failure or a timeout is reported as an
    /// error.
    fn query_by_name(
        &mut self,
        name: &str,
        args: &[String],
    ) -> impl Future<Output = Result<Self::Rows, sqlx::Error>> + Send;
}

/// Cursor over the rows of an executed query
pub trait RowCursor {
    /// Column names in result order
    ///
    /// # Errors
    ///
    /// Returns an error if the columns cannot be described
    fn columns(&self) -> Result<Vec<String>, sqlx::Error>;

    /// Move to the next row, `false` once the rows are exhausted
    fn advance(&mut self) -> bool;

    /// Decode the current row into `values`, one slot per column
    ///
    /// # Errors
    ///
    /// Returns [`sqlx::Error::RowNotFound`] when there is no current row, or
    /// the decoding error of a column
    fn scan(&mut self, values: &mut [Value]) -> Result<(), sqlx::Error>;
}

/// Decoding of one column of a backend row into a [`Value`]
pub trait DecodeRow {
    /// # Errors
    ///
    /// Returns an error if the column does not exist or its type cannot be
    /// represented as a [`Value`]
    fn decode_value(&self, index: usize) -> Result<Value, sqlx::Error>;
}

/// Rows fetched in full, replayed through [`RowCursor`]
#[derive(Debug)]
pub struct BufferedRows<R> {
    columns: Vec<String>,
    rows: std::vec::IntoIter<R>,
    current: Option<R>,
}

impl<R> BufferedRows<R> {
    #[must_use]
    pub fn new(columns: Vec<String>, rows: Vec<R>) -> Self {
        Self {
            columns,
            rows: rows.into_iter(),
            current: None,
        }
    }
}

impl<R: DecodeRow> RowCursor for BufferedRows<R> {
    fn columns(&self) -> Result<Vec<String>, sqlx::Error> {
        Ok(self.columns.clone())
    }

    fn advance(&mut self) -> bool {
        self.current = self.rows.next();
        self.current.is_some()
    }

    fn scan(&mut self, values: &mut [Value]) -> Result<(), sqlx::Error> {
        let row = self.current.as_ref().ok_or(sqlx::Error::RowNotFound)?;
        if values.len() != self.columns.len() {
            return Err(sqlx::Error::ColumnIndexOutOfBounds {
                index: values.len(),
                len: self.columns.len(),
            });
        }

        for (index, slot) in values.iter_mut().enumerate() {
            *slot = row.decode_value(index)?;
        }

        Ok(())
    }
}

/// Minimum number of parameters of [`custom_query`], the query name
pub const CUSTOM_QUERY_MIN_PARAMS: usize = 1;

/// Run the query named by the first parameter, passing the remaining ones as
/// positional arguments, and return the rows as a JSON array of objects
///
/// Keys follow the column order of the result. A query without rows yields
/// `[]`.
///
/// # Errors
///
/// - [`Error::InvalidParams`] without a query name, before `conn` is used
/// - [`Error::Fetch`] if the query cannot run, its columns cannot be
///   described or a row cannot be scanned
/// - [`Error::EmptyResult`] if scanning reports that there is no row
/// - [`Error::Json`] if a row cannot be encoded
pub async fn custom_query<C: NamedQuery>(conn: &mut C, params: &[String]) -> Result<String> {
    let Some((name, args)) = params.split_first() else {
        return Err(Error::InvalidParams);
    };

    let mut rows = conn.query_by_name(name, args).await.map_err(Error::Fetch)?;
    let columns = rows.columns().map_err(Error::Fetch)?;

    let mut values = vec![Value::Null; columns.len()];
    let mut data = Vec::new();

    while rows.advance() {
        rows.scan(&mut values).map_err(|err| {
            if matches!(err, sqlx::Error::RowNotFound) {
                Error::EmptyResult(err)
            } else {
                Error::Fetch(err)
            }
        })?;

        let row = value::Row {
            columns: &columns,
            values: &values,
        };
        data.push(serde_json::to_string(&row)?.trim().to_string());
    }

    tracing::debug!(query = %name, rows = data.len(), "custom query executed");

    Ok(format!("[{}]", data.join(",")))
}

/// Host or socket path the DSN points at
///
/// A URL-style DSN such as `postgres://localhost/app` parses with an empty
/// host, so it is rejected here instead of connecting nowhere.
///
/// # Errors
///
/// Returns [`Error::Config`] if the DSN names neither a host nor a socket
pub fn dsn_target(dsn: &DSN) -> Result<&str> {
    match (dsn.host.as_deref(), dsn.socket.as_deref()) {
        (Some(host), _) if !host.is_empty() => Ok(host),
        (_, Some(socket)) if !socket.is_empty() => Ok(socket),
        _ => Err(Error::Config(format!(
            "DSN has no host, use {}://<user>:<password>@tcp(<host>:<port>)/<database>",
            dsn.driver
        ))),
    }
}

/// Error reported when a query name is not registered
pub(crate) fn query_not_found(name: &str) -> sqlx::Error {
    sqlx::Error::Configuration(format!("query {name:?} not found").into())
}

/// Error reported when a query outlives its timeout
pub(crate) fn query_timed_out(name: &str, timeout: Duration) -> sqlx::Error {
    sqlx::Error::Io(std::io::Error::new(
        std::io::ErrorKind::TimedOut,
        format!("query {name:?} timed out after {timeout:?}"),
    ))
}

/// Error reported when a column cannot become a [`Value`]
pub(crate) fn decode_error(index: usize, message: String) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: index.to_string(),
        source: message.into(),
    }
}
