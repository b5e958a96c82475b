use super::{TlsMetadata, TlsSessionConfig, config::server_name_from_uri};
use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use rustls::ProtocolVersion;
use std::str::FromStr;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
};
use tokio_rustls::client::TlsStream;
use x509_parser::prelude::{FromDer, X509Certificate};

// PostgreSQL SSL handshake constants
const POSTGRES_SSL_REQUEST_CODE: i32 = 80_877_103;
const POSTGRES_SSL_REQUEST_LEN: i32 = 8;

// MySQL capability flags
const MYSQL_CLIENT_SSL: u32 = 0x0000_0800;
const MYSQL_CLIENT_PROTOCOL_41: u32 = 0x0000_0200;
const MYSQL_CLIENT_SECURE_CONNECTION: u32 = 0x0000_8000;
const MYSQL_CLIENT_LONG_FLAG: u32 = 0x0000_0004;
const MYSQL_CLIENT_PLUGIN_AUTH: u32 = 0x0008_0000;

/// How TLS is negotiated before the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsProbeProtocol {
    /// `PostgreSQL` `SSLRequest` packet
    Postgres,
    /// MySQL/MariaDB `SSLRequest` capability packet
    Mysql,
    /// TLS from the first byte
    Direct,
}

impl FromStr for TlsProbeProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mysql" | "mariadb" => Ok(Self::Mysql),
            "direct" | "tls" => Ok(Self::Direct),
            _ => Err(format!("Invalid TLS probe protocol: {s}")),
        }
    }
}

impl TlsProbeProtocol {
    /// Default server port of the protocol
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Postgres => 5432,
            Self::Mysql => 3306,
            Self::Direct => 443,
        }
    }
}

/// Connect to `host:port` and complete a TLS handshake with the session
/// configuration, returning what was negotiated and the peer certificate
/// metadata
///
/// # Errors
///
/// Returns an error if the TCP connection, the STARTTLS negotiation, the TLS
/// handshake (including certificate verification) or certificate parsing fails
pub async fn probe(
    host: &str,
    port: u16,
    protocol: TlsProbeProtocol,
    tls: &TlsSessionConfig,
) -> Result<TlsMetadata> {
    let mut stream = TcpStream::connect((host, port))
        .await
        .with_context(|| format!("failed to connect to {host}:{port} for TLS probe ({protocol:?})"))?;

    negotiate(&mut stream, protocol).await?;

    let fallback =
        server_name_from_uri(host).ok_or_else(|| anyhow!("invalid server name for TLS probe: {host}"))?;
    let tls_stream = tls
        .connect(stream, fallback)
        .await
        .with_context(|| format!("failed to complete TLS handshake with {host}:{port}"))?;

    tracing::debug!(host, port, ?protocol, "TLS handshake completed");

    metadata_from_stream(&tls_stream)
}

async fn negotiate<S>(stream: &mut S, protocol: TlsProbeProtocol) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match protocol {
        TlsProbeProtocol::Postgres => send_postgres_ssl_request(stream).await,
        TlsProbeProtocol::Mysql => perform_mysql_starttls(stream).await,
        TlsProbeProtocol::Direct => Ok(()),
    }
}

async fn send_postgres_ssl_request<S>(stream: &mut S) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut packet = Vec::with_capacity(8);
    packet.extend_from_slice(&POSTGRES_SSL_REQUEST_LEN.to_be_bytes());
    packet.extend_from_slice(&POSTGRES_SSL_REQUEST_CODE.to_be_bytes());

    stream
        .write_all(&packet)
        .await
        .context("failed to send PostgreSQL SSLRequest packet")?;

    let mut response = [0u8; 1];
    stream
        .read_exact(&mut response)
        .await
        .context("failed to read PostgreSQL SSLRequest response")?;

    if response != [b'S'] {
        anyhow::bail!("PostgreSQL server does not accept TLS connections");
    }

    Ok(())
}

async fn perform_mysql_starttls<S>(stream: &mut S) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut header = [0u8; 4];
    stream
        .read_exact(&mut header)
        .await
        .context("failed to read MySQL handshake header")?;
    let [b0, b1, b2, _sequence] = header;
    let payload_len = u32::from_le_bytes([b0, b1, b2, 0]);
    let mut payload = vec![0u8; payload_len as usize];
    stream
        .read_exact(&mut payload)
        .await
        .context("failed to read MySQL handshake payload")?;

    let (capabilities, charset) = parse_mysql_handshake(&payload)?;
    if capabilities & MYSQL_CLIENT_SSL == 0 {
        anyhow::bail!("MySQL server does not support TLS connections");
    }

    stream
        .write_all(&mysql_ssl_request(capabilities, charset))
        .await
        .context("failed to send MySQL SSLRequest")?;

    Ok(())
}

fn mysql_ssl_request(capabilities: u32, charset: u8) -> Vec<u8> {
    let client_flags = (MYSQL_CLIENT_PROTOCOL_41
        | MYSQL_CLIENT_SSL
        | MYSQL_CLIENT_SECURE_CONNECTION
        | MYSQL_CLIENT_LONG_FLAG
        | MYSQL_CLIENT_PLUGIN_AUTH)
        & (capabilities | MYSQL_CLIENT_SSL);

    let max_packet = 16_777_216_u32;
    let collation = if charset == 0 { 0x21 } else { charset };

    let payload_len: u32 = 4 + 4 + 1 + 23;
    let mut packet = Vec::with_capacity(payload_len as usize + 4);
    packet.extend(payload_len.to_le_bytes().iter().take(3));
    packet.push(1);
    packet.extend_from_slice(&client_flags.to_le_bytes());
    packet.extend_from_slice(&max_packet.to_le_bytes());
    packet.push(collation);
    packet.extend_from_slice(&[0u8; 23]);
    packet
}

fn parse_mysql_handshake(payload: &[u8]) -> Result<(u32, u8)> {
    if payload.is_empty() {
        anyhow::bail!("empty MySQL handshake payload");
    }

    // protocol version
    let mut cursor = 1;

    let rest = payload
        .get(cursor..)
        .context("invalid MySQL handshake: missing protocol version")?;
    let version_end = rest
        .iter()
        .position(|&b| b == 0)
        .context("invalid MySQL handshake: missing version terminator")?;
    cursor += version_end + 1;

    if payload.len() < cursor + 4 + 8 + 1 + 2 {
        anyhow::bail!("unexpectedly short MySQL handshake");
    }
    // connection id, auth plugin data part 1, filler
    cursor += 4 + 8 + 1;

    let mut capabilities = u32::from(read_u16_le(payload, cursor).context(
        "invalid MySQL handshake: missing lower capabilities",
    )?);
    cursor += 2;

    let mut charset = 0u8;
    if let Some(&value) = payload.get(cursor) {
        charset = value;
        cursor += 1;
    }

    // status flags
    cursor += 2;
    if let Some(upper) = read_u16_le(payload, cursor) {
        capabilities |= u32::from(upper) << 16;
    }

    Ok((capabilities, charset))
}

fn read_u16_le(payload: &[u8], at: usize) -> Option<u16> {
    match payload.get(at..at + 2)? {
        [lo, hi] => Some(u16::from_le_bytes([*lo, *hi])),
        _ => None,
    }
}

fn metadata_from_stream(stream: &TlsStream<TcpStream>) -> Result<TlsMetadata> {
    let (_, connection) = stream.get_ref();

    let version = connection.protocol_version().map(|v| match v {
        ProtocolVersion::TLSv1_3 => "TLSv1.3".to_string(),
        ProtocolVersion::TLSv1_2 => "TLSv1.2".to_string(),
        other => format!("{other:?}"),
    });
    let cipher = connection
        .negotiated_cipher_suite()
        .map(|suite| format!("{:?}", suite.suite()));

    let mut metadata = match connection.peer_certificates().and_then(<[_]>::first) {
        Some(cert) => extract_cert_metadata(cert.as_ref())?,
        None => TlsMetadata::default(),
    };
    metadata.version = version;
    metadata.cipher = cipher;

    Ok(metadata)
}

/// Extract certificate metadata (subject, issuer, expiry) from DER-encoded certificate
fn extract_cert_metadata(cert_der: &[u8]) -> Result<TlsMetadata> {
    let (_, cert) = X509Certificate::from_der(cert_der)
        .map_err(|e| anyhow!("failed to parse certificate: {e}"))?;

    let raw = cert.validity().not_after.to_datetime();
    let not_after =
        chrono::DateTime::<Utc>::from_timestamp(raw.unix_timestamp(), raw.nanosecond())
            .ok_or_else(|| anyhow!("invalid certificate expiry timestamp"))?;

    Ok(TlsMetadata {
        cert_subject: Some(cert.subject().to_string()),
        cert_issuer: Some(cert.issuer().to_string()),
        cert_expiry_days: Some((not_after - Utc::now()).num_days()),
        ..Default::default()
    })
}
