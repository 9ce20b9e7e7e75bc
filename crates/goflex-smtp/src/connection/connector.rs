//! Transport construction: TCP connect and in-band TLS upgrade.

use std::future::Future;
use std::io;
use std::sync::Arc;

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};

use crate::error::{Error, Result};

/// Opens plaintext transports and wraps them in TLS after STARTTLS.
///
/// The session is generic over this so the protocol can be driven against
/// an in-memory relay in tests.
pub trait Connector: Send + Sync {
    /// Plaintext transport returned by [`Connector::connect`].
    type Plain: AsyncRead + AsyncWrite + Unpin + Send;
    /// Encrypted transport returned by [`Connector::upgrade`].
    type Secure: AsyncRead + AsyncWrite + Unpin + Send;

    /// Opens a connection to `host:port`.
    fn connect(&self, host: &str, port: u16) -> impl Future<Output = io::Result<Self::Plain>> + Send;

    /// Performs the TLS handshake over an already-open plaintext transport.
    ///
    /// The plaintext transport is consumed; on failure it is dropped.
    fn upgrade(
        &self,
        host: &str,
        plain: Self::Plain,
    ) -> impl Future<Output = Result<Self::Secure>> + Send;
}

/// Production connector: tokio TCP plus rustls with the Mozilla root store.
#[derive(Clone)]
pub struct RustlsConnector {
    tls: TlsConnector,
}

impl RustlsConnector {
    /// Creates a connector trusting the bundled `webpki-roots` certificates.
    #[must_use]
    pub fn new() -> Self {
        let root_store = RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };

        let config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        Self::with_config(Arc::new(config))
    }

    /// Creates a connector from a caller-supplied rustls configuration.
    #[must_use]
    pub fn with_config(config: Arc<ClientConfig>) -> Self {
        Self {
            tls: TlsConnector::from(config),
        }
    }
}

impl Default for RustlsConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RustlsConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RustlsConnector").finish_non_exhaustive()
    }
}

impl Connector for RustlsConnector {
    type Plain = TcpStream;
    type Secure = TlsStream<TcpStream>;

    async fn connect(&self, host: &str, port: u16) -> io::Result<TcpStream> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    async fn upgrade(&self, host: &str, plain: TcpStream) -> Result<TlsStream<TcpStream>> {
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|_| Error::InvalidHostname(host.to_string()))?;

        self.tls
            .connect(server_name, plain)
            .await
            .map_err(Error::TlsHandshake)
    }
}
