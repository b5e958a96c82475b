//! Mutual TLS session configuration for database connections
//!
//! Connection credentials are described by [`ConnectionDetails`], which
//! validates the connect mode against the credential wallet, and turned into
//! an immutable [`TlsSessionConfig`] holding the trust anchors and the single
//! client certificate/key pair.
//!
//! # Module Organization
//!
//! - `details` - Connection and credential parameters
//! - `config` - TLS session configuration built from credential files
//! - `verifier` - Verifier used when peer verification is skipped
//! - `metadata` - Negotiated session and peer certificate metadata
//! - `probe` - End-to-end handshake check of a session configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use dbprobe::tls::{ConnectionDetails, TlsSessionConfig};
//!
//! let details = ConnectionDetails::new("default", "required", "", "db.example.com")?
//!     .with_tls_files("/etc/ssl/ca.crt", "/etc/ssl/client.crt", "/etc/ssl/client.key");
//!
//! let tls = TlsSessionConfig::build(&details, false)?;
//! let stream = tls.connect(tcp_stream, fallback_name).await?;
//! ```

pub mod config;
pub mod details;
pub mod metadata;
pub mod probe;
pub mod verifier;

// Re-export commonly used types
pub use config::TlsSessionConfig;
pub use details::{ConnectionDetails, TLS_CONNECT_REQUIRED};
pub use metadata::TlsMetadata;
pub use probe::{TlsProbeProtocol, probe};
pub use verifier::SkipServerVerification;

use crate::error::{Error, Result};

/// Validated TLS settings handed to a database driver
#[derive(Debug, Clone)]
pub struct TlsSettings {
    pub details: ConnectionDetails,
    pub skip_verify: bool,
}

impl TlsSettings {
    /// Drivers configured from files cannot resolve wallet credentials
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the session uses a credential wallet
    pub fn require_files(&self, backend: &str) -> Result<()> {
        if self.details.uses_wallet() {
            return Err(Error::Config(format!(
                "credential wallets are not supported by the {backend} backend, session {}",
                self.details.session()
            )));
        }
        Ok(())
    }
}
