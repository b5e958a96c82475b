use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Connect mode that asks for TLS with explicit certificate files instead of a
/// credential wallet
pub const TLS_CONNECT_REQUIRED: &str = "required";

/// Connection and credential parameters of one monitored session
///
/// The wallet path and the connect mode are validated together on
/// construction: an explicit connect mode needs a wallet, while an empty or
/// `"required"` mode forbids one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionDetails {
    session: String,
    tls_connect: String,
    tls_ca_file: Option<PathBuf>,
    tls_cert_file: Option<PathBuf>,
    tls_key_file: Option<PathBuf>,
    tls_wallet: Option<PathBuf>,
    raw_uri: String,
}

impl ConnectionDetails {
    /// Validate the connect mode against the wallet path
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the session and URI when the connect
    /// mode and the wallet path contradict each other
    pub fn new(session: &str, tls_connect: &str, wallet: &str, uri: &str) -> Result<Self> {
        if tls_connect.is_empty() || tls_connect == TLS_CONNECT_REQUIRED {
            if !wallet.is_empty() {
                return Err(Error::Config(format!(
                    "wallet folder configuration parameter set without wallet being used for database uri {uri}, with session {session}"
                )));
            }
        } else if wallet.is_empty() {
            return Err(Error::Config(format!(
                "missing wallet folder path for database uri {uri}, with session {session}"
            )));
        }

        Ok(Self {
            session: session.to_string(),
            tls_connect: tls_connect.to_string(),
            tls_wallet: non_empty_path(wallet),
            raw_uri: uri.to_string(),
            ..Default::default()
        })
    }

    /// Attach the trust anchor, client certificate and client key paths,
    /// empty strings leave the path unset
    #[must_use]
    pub fn with_tls_files(mut self, ca: &str, cert: &str, key: &str) -> Self {
        self.tls_ca_file = non_empty_path(ca);
        self.tls_cert_file = non_empty_path(cert);
        self.tls_key_file = non_empty_path(key);
        self
    }

    #[must_use]
    pub fn session(&self) -> &str {
        &self.session
    }

    #[must_use]
    pub fn tls_connect(&self) -> &str {
        &self.tls_connect
    }

    #[must_use]
    pub fn tls_ca_file(&self) -> Option<&Path> {
        self.tls_ca_file.as_deref()
    }

    #[must_use]
    pub fn tls_cert_file(&self) -> Option<&Path> {
        self.tls_cert_file.as_deref()
    }

    #[must_use]
    pub fn tls_key_file(&self) -> Option<&Path> {
        self.tls_key_file.as_deref()
    }

    #[must_use]
    pub fn tls_wallet(&self) -> Option<&Path> {
        self.tls_wallet.as_deref()
    }

    #[must_use]
    pub fn raw_uri(&self) -> &str {
        &self.raw_uri
    }

    /// Credentials come from a wallet rather than from certificate files
    #[must_use]
    pub const fn uses_wallet(&self) -> bool {
        self.tls_wallet.is_some()
    }

    /// A connect mode was given at all
    #[must_use]
    pub fn tls_requested(&self) -> bool {
        !self.tls_connect.is_empty()
    }
}

fn non_empty_path(value: &str) -> Option<PathBuf> {
    if value.is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    const URI: &str = "db.example.com:5432";

    #[test]
    fn test_no_connect_mode_no_wallet() {
        let details = ConnectionDetails::new("default", "", "", URI).unwrap();
        assert_eq!(details.session(), "default");
        assert_eq!(details.tls_connect(), "");
        assert_eq!(details.raw_uri(), URI);
        assert!(!details.uses_wallet());
        assert!(!details.tls_requested());
    }

    #[test]
    fn test_required_without_wallet() {
        let details = ConnectionDetails::new("prod", "required", "", URI).unwrap();
        assert_eq!(details.tls_connect(), TLS_CONNECT_REQUIRED);
        assert!(details.tls_wallet().is_none());
        assert!(details.tls_requested());
    }

    #[test]
    fn test_required_with_wallet_fails() {
        let err = ConnectionDetails::new("prod", "required", "/etc/wallet", URI).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        let message = err.to_string();
        assert!(message.contains("without wallet being used"));
        assert!(message.contains("prod"));
        assert!(message.contains(URI));
    }

    #[test]
    fn test_empty_mode_with_wallet_fails() {
        let err = ConnectionDetails::new("prod", "", "/etc/wallet", URI).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_explicit_mode_without_wallet_fails() {
        let err = ConnectionDetails::new("prod", "verify_full", "", URI).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        let message = err.to_string();
        assert!(message.contains("missing wallet folder path"));
        assert!(message.contains("prod"));
        assert!(message.contains(URI));
    }

    #[test]
    fn test_explicit_mode_with_wallet() {
        let details = ConnectionDetails::new("prod", "verify_full", "/etc/wallet", URI).unwrap();
        assert!(details.uses_wallet());
        assert_eq!(details.tls_wallet(), Some(Path::new("/etc/wallet")));
        assert!(details.tls_ca_file().is_none());
    }

    #[test]
    fn test_truth_table() {
        // (connect, wallet, ok)
        let cases = [
            ("", "", true),
            ("", "/w", false),
            ("required", "", true),
            ("required", "/w", false),
            ("verify_ca", "", false),
            ("verify_ca", "/w", true),
        ];

        for (connect, wallet, ok) in cases {
            let result = ConnectionDetails::new("s", connect, wallet, URI);
            assert_eq!(result.is_ok(), ok, "connect={connect:?} wallet={wallet:?}");
        }
    }

    #[test]
    fn test_with_tls_files() {
        let details = ConnectionDetails::new("s", "required", "", URI)
            .unwrap()
            .with_tls_files("/ssl/ca.crt", "/ssl/client.crt", "");

        assert_eq!(details.tls_ca_file(), Some(Path::new("/ssl/ca.crt")));
        assert_eq!(details.tls_cert_file(), Some(Path::new("/ssl/client.crt")));
        assert!(details.tls_key_file().is_none());
    }
}
