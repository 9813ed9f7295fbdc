//! Plain/TLS connection establishment and the outbound wire handle.
//!
//! One session owns exactly one underlying stream. TLS is selected by port
//! (6697, the well-known implicit-TLS IRC port) or forced via config, and by
//! default skips peer-certificate verification — most small IRC deployments
//! run on self-signed certificates. A verifying config backed by
//! `webpki-roots` can be opted into instead.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls;

use crate::error::{Error, Result};

/// Well-known implicit-TLS IRC port; connecting here selects TLS.
pub const TLS_PORT: u16 = 6697;

/// Where and how to connect.
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    pub host: String,
    pub port: u16,
    /// Force TLS on a port other than 6697.
    pub tls: bool,
    /// Verify the peer certificate against the webpki roots instead of
    /// accepting anything.
    pub tls_verify: bool,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6667,
            tls: false,
            tls_verify: false,
        }
    }
}

impl ConnectConfig {
    /// TLS policy: explicit flag, or the implicit-TLS port.
    pub fn wants_tls(&self) -> bool {
        self.tls || self.port == TLS_PORT
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A connection that has completed TCP (and optionally TLS) but hasn't
/// started IRC registration yet.
pub enum EstablishedConnection {
    Plain(TcpStream),
    Tls(tokio_rustls::client::TlsStream<TcpStream>),
}

/// The read half of an established connection, owned by the network loop.
pub type Reader = Box<dyn AsyncRead + Send + Unpin>;
/// The write half, owned by [`Wire`].
pub type Writer = Box<dyn AsyncWrite + Send + Unpin>;

impl EstablishedConnection {
    pub fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    /// Split into the read half for the network loop and the write half for
    /// the wire.
    pub fn split(self) -> (Reader, Writer) {
        match self {
            Self::Plain(tcp) => {
                let (r, w) = tokio::io::split(tcp);
                (Box::new(r), Box::new(w))
            }
            Self::Tls(tls) => {
                let (r, w) = tokio::io::split(tls);
                (Box::new(r), Box::new(w))
            }
        }
    }
}

/// Establish the TCP (and optionally TLS) connection to the server.
///
/// Fatal on failure: the caller aborts startup before any loop runs.
pub async fn establish_connection(config: &ConnectConfig) -> Result<EstablishedConnection> {
    let addr = config.addr();
    let mode = if config.wants_tls() { "TLS" } else { "plain" };

    tracing::debug!("resolving {addr}...");
    let tcp = TcpStream::connect(&addr).await.map_err(|e| Error::Connect {
        addr: addr.clone(),
        source: e,
    })?;
    tracing::debug!("TCP connected to {addr} ({mode})");

    if !config.wants_tls() {
        return Ok(EstablishedConnection::Plain(tcp));
    }

    let tls_config = if config.tls_verify {
        tracing::debug!("TLS: verifying server certificate");
        rustls_default_config()
    } else {
        tracing::debug!("TLS: permissive mode (skipping cert verification)");
        rustls_insecure_config()
    };
    let connector = TlsConnector::from(Arc::new(tls_config));
    let dns_name = rustls::pki_types::ServerName::try_from(config.host.clone())
        .map_err(|_| Error::ServerName(config.host.clone()))?;
    let tls_stream = connector
        .connect(dns_name, tcp)
        .await
        .map_err(|e| Error::Handshake { addr, source: e })?;
    tracing::debug!("TLS handshake complete");
    Ok(EstablishedConnection::Tls(tls_stream))
}

fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

fn rustls_default_config() -> rustls::ClientConfig {
    install_crypto_provider();
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth()
}

fn rustls_insecure_config() -> rustls::ClientConfig {
    install_crypto_provider();
    rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(PermissiveVerifier))
        .with_no_client_auth()
}

/// Accepts any server certificate.
#[derive(Debug)]
struct PermissiveVerifier;

impl rustls::client::danger::ServerCertVerifier for PermissiveVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::CryptoProvider::get_default()
            .map(|p| p.signature_verification_algorithms.supported_schemes())
            .unwrap_or_default()
    }
}

/// Serialized outbound access to the connection's write half.
///
/// Every protocol line the session emits goes through [`Wire::send`], which
/// appends CRLF and logs the line. [`Wire::close`] shuts the write half down
/// and is safe to call more than once.
pub struct Wire {
    writer: Mutex<Option<Writer>>,
}

impl Wire {
    pub fn new(writer: Writer) -> Self {
        Self {
            writer: Mutex::new(Some(writer)),
        }
    }

    /// Send one protocol line (CRLF appended).
    pub async fn send(&self, line: &str) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(Error::NotConnected)?;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\r\n").await?;
        writer.flush().await?;
        tracing::info!("→ {line}");
        Ok(())
    }

    /// Shut down and drop the write half. Idempotent.
    pub async fn close(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
    }

    pub async fn is_open(&self) -> bool {
        self.writer.lock().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tls_policy_follows_port_and_flag() {
        let mut config = ConnectConfig::default();
        assert!(!config.wants_tls());
        config.port = TLS_PORT;
        assert!(config.wants_tls());
        config.port = 6667;
        config.tls = true;
        assert!(config.wants_tls());
    }

    #[tokio::test]
    async fn wire_close_is_idempotent_and_send_fails_after() {
        let (client, _server) = tokio::io::duplex(64);
        let (_r, w) = tokio::io::split(client);
        let wire = Wire::new(Box::new(w));
        wire.send("NICK tester").await.unwrap();
        wire.close().await;
        wire.close().await;
        assert!(matches!(
            wire.send("PING :x").await,
            Err(Error::NotConnected)
        ));
    }
}
