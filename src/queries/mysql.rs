use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use dsn::DSN;
use sqlx::{
    Column, ConnectOptions, Connection, Executor, MySqlConnection, Row, Statement, TypeInfo,
    ValueRef,
    mysql::{MySqlConnectOptions, MySqlRow, MySqlSslMode},
};
use std::{sync::Arc, time::Duration};

use super::{
    BufferedRows, DecodeRow, NamedQuery, QueryRegistry, Value, decode_error, dsn_target,
    query_not_found, query_timed_out,
};
use crate::tls::TlsSettings;

/// Build connect options from the DSN and the optional TLS settings
///
/// # Errors
///
/// Returns an error if the DSN has no host or socket, or the TLS settings
/// rely on a credential wallet
pub fn connect_options(dsn: &DSN, tls: Option<&TlsSettings>) -> Result<MySqlConnectOptions> {
    dsn_target(dsn)?;

    let mut options = MySqlConnectOptions::new()
        .username(dsn.username.clone().unwrap_or_default().as_ref())
        .password(dsn.password.clone().unwrap_or_default().as_str())
        .database(dsn.database.clone().unwrap_or_default().as_ref());

    if let Some(host) = &dsn.host {
        options = options.host(host.as_str()).port(dsn.port.unwrap_or(3306));
    } else if let Some(socket) = &dsn.socket {
        options = options.socket(socket.as_str());
    }

    let Some(tls) = tls else {
        return Ok(options.ssl_mode(MySqlSslMode::Disabled));
    };
    tls.require_files("mysql")?;

    options = options.ssl_mode(if tls.skip_verify {
        MySqlSslMode::Required
    } else {
        MySqlSslMode::VerifyIdentity
    });

    let details = &tls.details;
    if let Some(ca) = details.tls_ca_file() {
        options = options.ssl_ca(ca);
    }
    if let (Some(cert), Some(key)) = (details.tls_cert_file(), details.tls_key_file()) {
        options = options.ssl_client_cert(cert).ssl_client_key(key);
    }

    Ok(options)
}

/// Open a connection to the `MySQL`/`MariaDB` server of `dsn`
///
/// # Errors
///
/// Returns an error if the options are invalid or the connection fails
pub async fn connect(dsn: &DSN, tls: Option<&TlsSettings>) -> Result<MySqlConnection> {
    let options = connect_options(dsn, tls)?;
    let target = dsn_target(dsn)?;
    options
        .connect()
        .await
        .with_context(|| format!("failed to connect to {target}"))
}

/// `MySQL` connection running queries of a [`QueryRegistry`]
pub struct MySqlNamedQuery {
    conn: MySqlConnection,
    registry: Arc<QueryRegistry>,
    timeout: Duration,
}

impl MySqlNamedQuery {
    #[must_use]
    pub const fn new(
        conn: MySqlConnection,
        registry: Arc<QueryRegistry>,
        timeout: Duration,
    ) -> Self {
        Self {
            conn,
            registry,
            timeout,
        }
    }

    /// Close the connection gracefully
    ///
    /// # Errors
    ///
    /// Returns an error if the quit command cannot be sent
    pub async fn close(self) -> Result<(), sqlx::Error> {
        self.conn.close().await
    }
}

impl NamedQuery for MySqlNamedQuery {
    type Rows = BufferedRows<MySqlRow>;

    async fn query_by_name(
        &mut self,
        name: &str,
        args: &[String],
    ) -> Result<Self::Rows, sqlx::Error> {
        let sql = self.registry.get(name).ok_or_else(|| query_not_found(name))?;
        let conn = &mut self.conn;

        let run = async move {
            let statement = (&mut *conn).prepare(sql).await?;
            let columns = statement
                .columns()
                .iter()
                .map(|column| column.name().to_string())
                .collect();

            let mut query = statement.query();
            for arg in args {
                query = query.bind(arg.as_str());
            }
            let rows = query.fetch_all(&mut *conn).await?;

            Ok(BufferedRows::new(columns, rows))
        };

        tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| query_timed_out(name, self.timeout))?
    }
}

impl DecodeRow for MySqlRow {
    fn decode_value(&self, index: usize) -> Result<Value, sqlx::Error> {
        let raw = self.try_get_raw(index)?;
        if raw.is_null() {
            return Ok(Value::Null);
        }
        let type_info = raw.type_info();
        let name = type_info.name();

        // integer widths are decoded unchecked, the server already bounds them
        let value = match name {
            "BOOLEAN" => Value::Boolean(self.try_get(index)?),
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
                Value::from(self.try_get_unchecked::<i64, _>(index)?)
            }
            "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
            | "BIGINT UNSIGNED" => Value::from(self.try_get_unchecked::<u64, _>(index)?),
            "YEAR" => Value::from(u64::from(self.try_get_unchecked::<u16, _>(index)?)),
            "FLOAT" => float(index, f64::from(self.try_get::<f32, _>(index)?))?,
            "DOUBLE" => float(index, self.try_get::<f64, _>(index)?)?,
            "DECIMAL" | "VARCHAR" | "CHAR" | "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT"
            | "ENUM" | "SET" | "JSON" => Value::String(self.try_get_unchecked(index)?),
            "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
            | "GEOMETRY" => Value::Bytes(self.try_get_unchecked(index)?),
            "DATETIME" => Value::String(
                self.try_get::<NaiveDateTime, _>(index)?
                    .format("%Y-%m-%dT%H:%M:%S%.f")
                    .to_string(),
            ),
            "TIMESTAMP" => Value::String(self.try_get::<DateTime<Utc>, _>(index)?.to_rfc3339()),
            "DATE" => Value::String(self.try_get::<NaiveDate, _>(index)?.to_string()),
            "TIME" => Value::String(self.try_get::<NaiveTime, _>(index)?.to_string()),
            other => {
                return Err(decode_error(
                    index,
                    format!("unsupported column type {other}, cast it to char"),
                ));
            }
        };

        Ok(value)
    }
}

fn float(index: usize, value: f64) -> Result<Value, sqlx::Error> {
    Value::float(value).ok_or_else(|| decode_error(index, format!("{value} is not a JSON number")))
}
