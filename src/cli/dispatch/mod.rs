use crate::{cli::actions::Action, queries::dsn_target, tls::ConnectionDetails};
use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use dsn::DSN;
use std::{path::PathBuf, time::Duration};

/// Server name candidate taken from the DSN, `host[:port]` or the socket path
fn raw_uri(dsn: &DSN) -> String {
    match (&dsn.host, dsn.port) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.clone(),
        (None, _) => dsn.socket.clone().unwrap_or_default(),
    }
}

fn string_arg<'a>(matches: &'a ArgMatches, id: &str) -> &'a str {
    matches
        .get_one::<String>(id)
        .map_or("", String::as_str)
}

/// Validate the connect mode against the wallet and attach the credential
/// files
fn connection_details(matches: &ArgMatches, dsn: &DSN) -> Result<ConnectionDetails> {
    let details = ConnectionDetails::new(
        string_arg(matches, "session"),
        string_arg(matches, "tls-connect"),
        string_arg(matches, "tls-wallet"),
        &raw_uri(dsn),
    )?;

    Ok(details.with_tls_files(
        string_arg(matches, "tls-ca"),
        string_arg(matches, "tls-cert"),
        string_arg(matches, "tls-key"),
    ))
}

/// Convert `ArgMatches` into typed Action enum with validation
///
/// # Errors
///
/// Returns an error if the DSN is invalid or names no host, the TLS parameters contradict each
/// other or the subcommand is unknown
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    let dsn_str = matches
        .get_one::<String>("dsn")
        .context("DSN is required")?;
    let dsn = dsn::parse(dsn_str).context("Failed to parse DSN")?;
    dsn_target(&dsn)?;

    let Some((name, sub)) = matches.subcommand() else {
        bail!("a command is required, use query or probe");
    };

    let tls = connection_details(sub, &dsn)?;
    let skip_verify = sub.get_flag("insecure-skip-verify");
    let timeout = Duration::from_secs(sub.get_one::<u64>("timeout").copied().unwrap_or(10));

    match name {
        "query" => {
            let params: Vec<String> = sub
                .get_many::<String>("params")
                .map(|values| values.cloned().collect())
                .unwrap_or_default();
            let queries = PathBuf::from(string_arg(sub, "queries"));

            Ok(Action::Query {
                dsn,
                tls,
                skip_verify,
                queries,
                params,
                timeout,
            })
        }
        "probe" => Ok(Action::Probe {
            dsn,
            tls,
            skip_verify,
            timeout,
        }),
        other => bail!("unknown command: {other}"),
    }
}
