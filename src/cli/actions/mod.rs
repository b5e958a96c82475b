mod run;

use crate::tls::{ConnectionDetails, TlsSettings};
use dsn::DSN;
use std::{path::PathBuf, time::Duration};

/// Action enum representing each possible command
#[derive(Debug)]
pub enum Action {
    Query {
        dsn: DSN,
        tls: ConnectionDetails,
        skip_verify: bool,
        queries: PathBuf,
        params: Vec<String>,
        timeout: Duration,
    },
    Probe {
        dsn: DSN,
        tls: ConnectionDetails,
        skip_verify: bool,
        timeout: Duration,
    },
}

impl Action {
    /// Execute the action
    ///
    /// # Errors
    ///
    /// Returns an error if the action fails to execute
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}

/// TLS settings for the driver, `None` when no connect mode was given
fn tls_settings(details: ConnectionDetails, skip_verify: bool) -> Option<TlsSettings> {
    details.tls_requested().then_some(TlsSettings {
        details,
        skip_verify,
    })
}
