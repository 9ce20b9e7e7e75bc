//! Low-level SMTP stream handling.

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader,
};

use super::Connector;
use crate::error::{Error, Result};

/// Longest line accepted from the server, line ending included.
///
/// RFC 5321 limits reply lines to 512 octets; this leaves room for
/// relays that overrun it.
pub const MAX_LINE_BYTES: usize = 4096;

/// SMTP transport: plaintext until STARTTLS, TLS afterwards.
#[derive(Debug)]
pub enum SmtpStream<P, S> {
    /// Plaintext connection.
    Plain(BufReader<P>),
    /// TLS-wrapped connection.
    Tls(Box<BufReader<S>>),
    /// Transport already handed off or shut down.
    Closed,
}

impl<P, S> SmtpStream<P, S>
where
    P: AsyncRead + AsyncWrite + Unpin + Send,
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wraps a freshly connected plaintext transport.
    pub fn plain(stream: P) -> Self {
        Self::Plain(BufReader::new(stream))
    }

    /// Returns true if the transport is TLS-wrapped.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    /// Returns true if the transport has been shut down.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Reads one line, without its line ending.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] at end of stream,
    /// [`Error::Protocol`] if the line exceeds [`MAX_LINE_BYTES`] or is not
    /// UTF-8, or an I/O error.
    pub async fn read_line(&mut self) -> Result<String> {
        let mut line = Vec::new();
        match self {
            Self::Plain(reader) => read_capped(reader, &mut line).await?,
            Self::Tls(reader) => read_capped(reader, &mut line).await?,
            Self::Closed => return Err(Error::InvalidState("transport is closed".into())),
        }

        if line.is_empty() {
            return Err(Error::ConnectionClosed);
        }

        let line = String::from_utf8(line)
            .map_err(|_| Error::Protocol("reply line is not valid UTF-8".into()))?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Writes and flushes data.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Self::Plain(reader) => {
                reader.get_mut().write_all(data).await?;
                reader.get_mut().flush().await?;
            }
            Self::Tls(reader) => {
                reader.get_mut().write_all(data).await?;
                reader.get_mut().flush().await?;
            }
            Self::Closed => return Err(Error::InvalidState("transport is closed".into())),
        }
        Ok(())
    }

    /// Upgrades a plaintext transport to TLS.
    ///
    /// Bytes the server sent after its STARTTLS reply but before the
    /// handshake are refused rather than carried into the TLS session.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport is not plaintext, if unread bytes are
    /// buffered, or if the handshake fails.
    pub async fn upgrade<C>(self, connector: &C, host: &str) -> Result<Self>
    where
        C: Connector<Plain = P, Secure = S>,
    {
        let reader = match self {
            Self::Plain(reader) => reader,
            Self::Tls(_) => return Err(Error::InvalidState("already using TLS".into())),
            Self::Closed => return Err(Error::InvalidState("transport is closed".into())),
        };

        if !reader.buffer().is_empty() {
            return Err(Error::Protocol(
                "server sent data after STARTTLS reply".into(),
            ));
        }

        let secure = connector.upgrade(host, reader.into_inner()).await?;
        Ok(Self::Tls(Box::new(BufReader::new(secure))))
    }

    /// Shuts the transport down.
    ///
    /// For TLS this sends `close_notify` and then shuts down the socket it
    /// owns. A closed stream is left as is.
    ///
    /// # Errors
    ///
    /// Returns an error if the shutdown fails.
    pub async fn shutdown(&mut self) -> Result<()> {
        match self {
            Self::Plain(reader) => reader.get_mut().shutdown().await?,
            Self::Tls(reader) => reader.get_mut().shutdown().await?,
            Self::Closed => {}
        }
        Ok(())
    }
}

/// Appends bytes up to and including the next `\n`, refusing to buffer more
/// than [`MAX_LINE_BYTES`]. Stops early at end of stream.
async fn read_capped<R>(reader: &mut R, line: &mut Vec<u8>) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(());
        }

        let (used, done) = available
            .iter()
            .position(|&b| b == b'\n')
            .map_or((available.len(), false), |at| (at + 1, true));
        if line.len() + used > MAX_LINE_BYTES {
            return Err(Error::Protocol("reply line too long".into()));
        }

        line.extend_from_slice(&available[..used]);
        reader.consume(used);
        if done {
            return Ok(());
        }
    }
}
