//! Database monitoring collector core
//!
//! - [`tls`] builds mutual TLS session configurations from credential files
//! - [`queries`] runs named queries and serializes the rows as a JSON array
//! - [`cli`] composes both into the `dbprobe` command

pub mod cli;
pub mod error;
pub mod queries;
pub mod tls;

pub use error::{Error, Result};
