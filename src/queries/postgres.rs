use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use dsn::DSN;
use sqlx::{
    Column, ConnectOptions, Connection, Executor, PgConnection, Row, Statement, TypeInfo,
    ValueRef,
    postgres::{
        PgConnectOptions, PgRow, PgSslMode,
        types::{Oid, PgInterval},
    },
    types::{Decimal, JsonValue, ipnetwork::IpNetwork},
};
use std::{sync::Arc, time::Duration};
use uuid::Uuid;

use super::{
    BufferedRows, DecodeRow, NamedQuery, QueryRegistry, Value, decode_error, dsn_target,
    query_not_found, query_timed_out,
};
use crate::tls::TlsSettings;

/// Build connect options from the DSN and the optional TLS settings
///
/// Verification maps to `verify-full`, skipping it to `require`; without TLS
/// settings the connection is plain.
///
/// # Errors
///
/// Returns an error if the DSN has no host or socket, or the TLS settings
/// rely on a credential wallet
pub fn connect_options(dsn: &DSN, tls: Option<&TlsSettings>) -> Result<PgConnectOptions> {
    dsn_target(dsn)?;

    let mut options = PgConnectOptions::new()
        .username(dsn.username.clone().unwrap_or_default().as_ref())
        .password(dsn.password.clone().unwrap_or_default().as_str())
        .database(dsn.database.clone().unwrap_or_default().as_ref());

    if let Some(host) = &dsn.host {
        options = options.host(host.as_str()).port(dsn.port.unwrap_or(5432));
    } else if let Some(socket) = &dsn.socket {
        options = options.socket(socket.as_str());
    }

    let Some(tls) = tls else {
        return Ok(options.ssl_mode(PgSslMode::Disable));
    };
    tls.require_files("postgres")?;

    options = options.ssl_mode(if tls.skip_verify {
        PgSslMode::Require
    } else {
        PgSslMode::VerifyFull
    });

    let details = &tls.details;
    if let Some(ca) = details.tls_ca_file() {
        options = options.ssl_root_cert(ca);
    }
    if let (Some(cert), Some(key)) = (details.tls_cert_file(), details.tls_key_file()) {
        options = options.ssl_client_cert(cert).ssl_client_key(key);
    }

    Ok(options)
}

/// Open a connection to the `PostgreSQL` server of `dsn`
///
/// # Errors
///
/// Returns an error if the options are invalid or the connection fails
pub async fn connect(dsn: &DSN, tls: Option<&TlsSettings>) -> Result<PgConnection> {
    let options = connect_options(dsn, tls)?;
    let target = dsn_target(dsn)?;
    options
        .connect()
        .await
        .with_context(|| format!("failed to connect to {target}"))
}

/// `PostgreSQL` connection running queries of a [`QueryRegistry`]
pub struct PgNamedQuery {
    conn: PgConnection,
    registry: Arc<QueryRegistry>,
    timeout: Duration,
}

impl PgNamedQuery {
    #[must_use]
    pub const fn new(conn: PgConnection, registry: Arc<QueryRegistry>, timeout: Duration) -> Self {
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
    /// Returns an error if the server cannot be told the session ends
    pub async fn close(self) -> Result<(), sqlx::Error> {
        self.conn.close().await
    }
}

impl NamedQuery for PgNamedQuery {
    type Rows = BufferedRows<PgRow>;

    async fn query_by_name(
        &mut self,
        name: &str,
        args: &[String],
    ) -> Result<Self::Rows, sqlx::Error> {
        let sql = self.registry.get(name).ok_or_else(|| query_not_found(name))?;
        let conn = &mut self.conn;

        let run = async move {
            // prepared first so the columns are known even without rows
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

impl DecodeRow for PgRow {
    fn decode_value(&self, index: usize) -> Result<Value, sqlx::Error> {
        let raw = self.try_get_raw(index)?;
        if raw.is_null() {
            return Ok(Value::Null);
        }
        let type_info = raw.type_info();

        let value = match type_info.name() {
            "BOOL" => Value::Boolean(self.try_get(index)?),
            "INT2" => Value::from(i64::from(self.try_get::<i16, _>(index)?)),
            "INT4" => Value::from(i64::from(self.try_get::<i32, _>(index)?)),
            "INT8" => Value::from(self.try_get::<i64, _>(index)?),
            "FLOAT4" => float(index, f64::from(self.try_get::<f32, _>(index)?))?,
            "FLOAT8" => float(index, self.try_get::<f64, _>(index)?)?,
            "OID" => Value::from(u64::from(self.try_get::<Oid, _>(index)?.0)),
            "NUMERIC" => Value::String(self.try_get::<Decimal, _>(index)?.to_string()),
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CITEXT" => {
                Value::String(self.try_get_unchecked(index)?)
            }
            "\"CHAR\"" => Value::String(single_char(self.try_get::<i8, _>(index)?)),
            "INET" => Value::String(inet_text(self.try_get::<IpNetwork, _>(index)?)),
            "CIDR" => Value::String(self.try_get::<IpNetwork, _>(index)?.to_string()),
            "JSON" | "JSONB" => Value::String(self.try_get::<JsonValue, _>(index)?.to_string()),
            "INTERVAL" => Value::String(interval_text(&self.try_get::<PgInterval, _>(index)?)),
            "UUID" => Value::String(self.try_get::<Uuid, _>(index)?.to_string()),
            "TIMESTAMPTZ" => Value::String(self.try_get::<DateTime<Utc>, _>(index)?.to_rfc3339()),
            "TIMESTAMP" => Value::String(
                self.try_get::<NaiveDateTime, _>(index)?
                    .format("%Y-%m-%dT%H:%M:%S%.f")
                    .to_string(),
            ),
            "DATE" => Value::String(self.try_get::<NaiveDate, _>(index)?.to_string()),
            "TIME" => Value::String(self.try_get::<NaiveTime, _>(index)?.to_string()),
            "BYTEA" => Value::Bytes(self.try_get(index)?),
            other => {
                return Err(decode_error(
                    index,
                    format!("unsupported column type {other}, cast it to text"),
                ));
            }
        };

        Ok(value)
    }
}

fn float(index: usize, value: f64) -> Result<Value, sqlx::Error> {
    Value::float(value).ok_or_else(|| decode_error(index, format!("{value} is not a JSON number")))
}

/// The single-byte `"char"` type, as used by `pg_class.relkind`
fn single_char(value: i8) -> String {
    char::from(u8::from_ne_bytes(value.to_ne_bytes())).to_string()
}

/// `inet` text as the server prints it, without the prefix of a single host
fn inet_text(network: IpNetwork) -> String {
    let host = match network {
        IpNetwork::V4(net) => net.prefix() == 32,
        IpNetwork::V6(net) => net.prefix() == 128,
    };
    if host {
        network.ip().to_string()
    } else {
        network.to_string()
    }
}

/// ISO 8601 duration keeping the months, days and microseconds apart
fn interval_text(interval: &PgInterval) -> String {
    let seconds = interval.microseconds / 1_000_000;
    let fraction = (interval.microseconds % 1_000_000).unsigned_abs();
    let sign = if interval.microseconds < 0 && seconds == 0 {
        "-"
    } else {
        ""
    };

    let mut text = format!("P{}M{}DT{sign}{seconds}", interval.months, interval.days);
    if fraction > 0 {
        text.push('.');
        text.push_str(format!("{fraction:06}").trim_end_matches('0'));
    }
    text.push('S');
    text
}
