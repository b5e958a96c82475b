use super::{Action, tls_settings};
use crate::{
    error::Error,
    queries::{
        CUSTOM_QUERY_MIN_PARAMS, NamedQuery, QueryRegistry, custom_query,
        mysql::{self, MySqlNamedQuery},
        postgres::{self, PgNamedQuery},
    },
    tls::{TlsProbeProtocol, TlsSessionConfig, TlsSettings},
};
use anyhow::{Context, Result, anyhow, bail};
use dsn::DSN;
use std::{path::Path, sync::Arc, time::Duration};

/// Execute the action's business logic by delegating to the appropriate module
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Query {
            dsn,
            tls,
            skip_verify,
            queries,
            params,
            timeout,
        } => {
            let settings = tls_settings(tls, skip_verify);
            let json = query(&dsn, settings.as_ref(), &queries, &params, timeout).await?;
            println!("{json}");
        }
        Action::Probe {
            dsn,
            tls,
            skip_verify,
            timeout,
        } => {
            let settings = tls_settings(tls, skip_verify)
                .context("probe needs a TLS connect mode, use --tls-connect required")?;
            let json = probe(&dsn, &settings, timeout).await?;
            println!("{json}");
        }
    }

    Ok(())
}

async fn query(
    dsn: &DSN,
    tls: Option<&TlsSettings>,
    queries: &Path,
    params: &[String],
    timeout: Duration,
) -> Result<String> {
    // no connection is opened for a call that cannot name a query
    if params.len() < CUSTOM_QUERY_MIN_PARAMS {
        return Err(Error::InvalidParams).context("usage: query <NAME> [PARAMS]...");
    }

    let registry = QueryRegistry::load(queries)
        .with_context(|| format!("failed to load queries from {}", queries.display()))?;
    let registry = Arc::new(registry);

    if let Some(tls) = tls {
        validate_tls(tls, &dsn.driver)?;
    }

    match dsn.driver.as_str() {
        "postgres" | "postgresql" => {
            let conn = postgres::connect(dsn, tls).await?;
            let mut conn = PgNamedQuery::new(conn, registry, timeout);
            let result = run_query(&mut conn, params).await;
            if let Err(e) = conn.close().await {
                tracing::debug!("failed to close connection: {e}");
            }
            result
        }
        "mysql" | "mariadb" => {
            let conn = mysql::connect(dsn, tls).await?;
            let mut conn = MySqlNamedQuery::new(conn, registry, timeout);
            let result = run_query(&mut conn, params).await;
            if let Err(e) = conn.close().await {
                tracing::debug!("failed to close connection: {e}");
            }
            result
        }
        other => bail!("unsupported driver: {other}"),
    }
}

/// Build the session configuration once so broken credential files are
/// reported before the driver tries to use them
///
/// The built configuration is dropped: sqlx cannot take a `rustls::ClientConfig`
/// and loads the same files itself.
fn validate_tls(tls: &TlsSettings, backend: &str) -> Result<()> {
    tls.require_files(backend)?;
    let config = TlsSessionConfig::build(&tls.details, tls.skip_verify)
        .context("invalid TLS configuration")?;

    tracing::debug!(
        trust_anchors = config.trust_anchor_count(),
        server_name = ?config.server_name(),
        "TLS credentials validated"
    );

    Ok(())
}

async fn run_query<C: NamedQuery>(conn: &mut C, params: &[String]) -> Result<String> {
    match custom_query(conn, params).await {
        Ok(json) => Ok(json),
        Err(e) => {
            if e.is_empty_result() {
                tracing::warn!(query = params.first().map(String::as_str), "{e}");
            } else {
                tracing::error!(query = params.first().map(String::as_str), "{e}");
            }
            Err(e.into())
        }
    }
}

async fn probe(dsn: &DSN, tls: &TlsSettings, timeout: Duration) -> Result<String> {
    tls.require_files("probe")?;

    let protocol = dsn
        .driver
        .parse::<TlsProbeProtocol>()
        .map_err(|e| anyhow!(e))?;
    let host = dsn
        .host
        .as_deref()
        .context("probe needs a TCP host in the DSN")?;
    let port = dsn.port.unwrap_or_else(|| protocol.default_port());

    let config = TlsSessionConfig::build(&tls.details, tls.skip_verify)
        .context("invalid TLS configuration")?;

    let metadata = tokio::time::timeout(timeout, crate::tls::probe(host, port, protocol, &config))
        .await
        .map_err(|_| anyhow!("TLS probe of {host}:{port} timed out after {timeout:?}"))??;

    if let Some(days) = metadata.cert_expiry_days {
        if days < 0 {
            tracing::error!(host, port, days, "server certificate has expired");
        } else if days < 30 {
            tracing::warn!(host, port, days, "server certificate expires soon");
        }
    }

    Ok(serde_json::to_string(&metadata)?)
}
