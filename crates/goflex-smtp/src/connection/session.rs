//! Step-tracked SMTP session.

use std::future::Future;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, trace, warn};

use super::{Connector, ServerInfo, SessionState, SmtpStream};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::{is_last_reply_line, parse_reply};
use crate::types::{Address, AuthMechanism, Reply, ReplyCode};

/// Upper bound on lines in one reply. Each line is capped at
/// [`super::MAX_LINE_BYTES`], so a babbling relay cannot grow memory.
const MAX_REPLY_LINES: usize = 128;

/// Timeouts applied to one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Deadline for opening the TCP connection.
    pub connect_timeout: Duration,
    /// Deadline for each individual read, write, handshake or shutdown.
    pub io_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            io_timeout: Duration::from_secs(60),
        }
    }
}

/// One SMTP conversation over one transport.
///
/// A session is created per message and never reused. Every command waits
/// for its full reply before the next one is written. The state only moves
/// forward after a step succeeds, so [`Session::state`] names the last
/// completed step when an operation fails.
pub struct Session<C: Connector> {
    stream: SmtpStream<C::Plain, C::Secure>,
    state: SessionState,
    server_info: ServerInfo,
    last_reply: Option<Reply>,
    recipients_attempted: usize,
    io_timeout: Duration,
}

impl<C: Connector> std::fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("tls", &self.stream.is_tls())
            .field("server_info", &self.server_info)
            .field("last_reply", &self.last_reply)
            .finish_non_exhaustive()
    }
}

impl<C: Connector> Session<C> {
    /// Opens a plaintext connection to the relay.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the connection is refused or the host does not
    /// resolve, and [`Error::Timeout`] if it takes longer than
    /// `config.connect_timeout`.
    pub async fn connect(
        connector: &C,
        host: &str,
        port: u16,
        config: &SessionConfig,
    ) -> Result<Self> {
        debug!(host, port, "connecting to SMTP relay");
        let stream = bounded(config.connect_timeout, async {
            connector.connect(host, port).await.map_err(Error::from)
        })
        .await?;
        Ok(Self::from_plain(stream, config))
    }

    /// Starts a session over an already-connected plaintext transport.
    pub fn from_plain(stream: C::Plain, config: &SessionConfig) -> Self {
        Self {
            stream: SmtpStream::plain(stream),
            state: SessionState::Connecting,
            server_info: ServerInfo::default(),
            last_reply: None,
            recipients_attempted: 0,
            io_timeout: config.io_timeout,
        }
    }

    /// Returns the last completed protocol step.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns what the relay has announced so far.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Returns the most recent reply read from the relay.
    #[must_use]
    pub const fn last_reply(&self) -> Option<&Reply> {
        self.last_reply.as_ref()
    }

    /// Returns true once the transport is TLS-wrapped.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        self.stream.is_tls()
    }

    /// Reads the server greeting, which must be 2xx.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the greeting is not a success.
    pub async fn read_greeting(&mut self) -> Result<Reply> {
        let reply = require(self.read_reply().await?, ReplyCode::is_success)?;
        self.server_info.hostname = reply.first_word().unwrap_or("unknown").to_string();
        self.state = SessionState::Greeted;
        Ok(reply)
    }

    /// Sends EHLO and records the advertised extensions.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or the reply is not 2xx.
    pub async fn ehlo(&mut self, client_domain: &str) -> Result<Reply> {
        let cmd = Command::Ehlo {
            domain: client_domain.to_string(),
        };
        let reply = require(self.command(&cmd).await?, ReplyCode::is_success)?;
        self.server_info.record_ehlo(&reply.message);
        self.state = if self.stream.is_tls() {
            SessionState::Ehlo2
        } else {
            SessionState::Ehlo1
        };
        Ok(reply)
    }

    /// Sends STARTTLS and performs the TLS handshake on the same socket.
    ///
    /// The relay's SMTP state is reset by the upgrade, so callers must send
    /// EHLO again afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the relay refuses STARTTLS or the handshake fails.
    /// A failed handshake leaves the session without a transport.
    pub async fn starttls(&mut self, connector: &C, host: &str) -> Result<()> {
        if !self.server_info.supports_starttls() {
            warn!(relay = %self.server_info.hostname, "STARTTLS not advertised, attempting anyway");
        }

        require(self.command(&Command::StartTls).await?, ReplyCode::is_success)?;
        self.state = SessionState::TlsStarting;

        let plain = std::mem::replace(&mut self.stream, SmtpStream::Closed);
        self.stream = bounded(self.io_timeout, plain.upgrade(connector, host)).await?;
        self.server_info.extensions.clear();
        self.state = SessionState::TlsEstablished;
        debug!(host, "TLS established");
        Ok(())
    }

    /// Authenticates with `AUTH LOGIN`.
    ///
    /// Username and password are each sent as one line of standard, padded,
    /// unwrapped base64 of their UTF-8 bytes, in answer to a 334 challenge.
    ///
    /// # Errors
    ///
    /// Returns an error if any challenge is missing or the credentials are
    /// refused.
    pub async fn auth_login(&mut self, username: &str, password: &str) -> Result<Reply> {
        if !self.server_info.supports_auth(AuthMechanism::Login) {
            debug!("AUTH LOGIN not advertised, attempting anyway");
        }

        let challenge = Command::Auth {
            mechanism: AuthMechanism::Login,
        };
        require(self.command(&challenge).await?, is_auth_challenge)?;
        self.state = SessionState::Authenticating;

        let user = Command::AuthResponse(STANDARD.encode(username.as_bytes()));
        require(self.command(&user).await?, is_auth_challenge)?;

        let pass = Command::AuthResponse(STANDARD.encode(password.as_bytes()));
        let reply = require(self.command(&pass).await?, ReplyCode::is_success)?;
        self.state = SessionState::Authenticated;
        Ok(reply)
    }

    /// Sends `MAIL FROM`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or the sender is refused.
    pub async fn mail_from(&mut self, from: &Address) -> Result<Reply> {
        let cmd = Command::MailFrom { from: from.clone() };
        let reply = require(self.command(&cmd).await?, ReplyCode::is_success)?;
        self.state = SessionState::MailFrom;
        Ok(reply)
    }

    /// Sends `RCPT TO` and returns the relay's answer whatever it is.
    ///
    /// A refused recipient is not an error here; the caller decides whether
    /// the transaction can continue.
    ///
    /// # Errors
    ///
    /// Returns an error only if the exchange itself fails.
    pub async fn rcpt_to(&mut self, to: &Address) -> Result<Reply> {
        let cmd = Command::RcptTo { to: to.clone() };
        let reply = self.command(&cmd).await?;
        self.state = SessionState::RcptTo(self.recipients_attempted);
        self.recipients_attempted += 1;
        Ok(reply)
    }

    /// Sends `DATA`, which must be answered with 354.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or the relay does not invite
    /// message input.
    pub async fn data(&mut self) -> Result<Reply> {
        let reply = require(self.command(&Command::Data).await?, |code| {
            code == ReplyCode::START_DATA
        })?;
        self.state = SessionState::DataStart;
        Ok(reply)
    }

    /// Writes the message and the end-of-data marker, then reads the verdict.
    ///
    /// Line endings are normalized to CRLF and lines starting with `.` are
    /// dot-stuffed, so the body can never terminate the transfer early.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails or the relay rejects the message.
    pub async fn send_message(&mut self, message: &[u8]) -> Result<Reply> {
        self.state = SessionState::DataSending;
        let payload = encode_data(message);
        debug!(bytes = payload.len(), "sending message data");
        bounded(self.io_timeout, self.stream.write_all(&payload)).await?;

        let reply = require(self.read_reply().await?, ReplyCode::is_success)?;
        self.state = SessionState::Accepted;
        Ok(reply)
    }

    /// Sends `QUIT` and reads the farewell.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails.
    pub async fn quit(&mut self) -> Result<Reply> {
        self.state = SessionState::Quitting;
        self.command(&Command::Quit).await
    }

    /// Shuts the transport down.
    ///
    /// Safe to call more than once: only the first call touches the
    /// transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the shutdown itself fails; the transport is
    /// released either way.
    pub async fn close(&mut self) -> Result<()> {
        let mut stream = std::mem::replace(&mut self.stream, SmtpStream::Closed);
        self.state = SessionState::Closed;
        if stream.is_closed() {
            return Ok(());
        }
        trace!("shutting down SMTP transport");
        bounded(self.io_timeout, stream.shutdown()).await
    }

    async fn command(&mut self, cmd: &Command) -> Result<Reply> {
        debug!(command = ?cmd, "C:");
        bounded(self.io_timeout, self.stream.write_all(&cmd.serialize())).await?;
        self.read_reply().await
    }

    async fn read_reply(&mut self) -> Result<Reply> {
        let mut lines = Vec::new();
        loop {
            let line = bounded(self.io_timeout, self.stream.read_line()).await?;
            let is_last = is_last_reply_line(&line);
            lines.push(line);

            if is_last {
                break;
            }
            if lines.len() >= MAX_REPLY_LINES {
                return Err(Error::Protocol("reply has too many lines".into()));
            }
        }

        let reply = parse_reply(&lines)?;
        debug!(code = reply.code.as_u16(), "S:");
        self.last_reply = Some(reply.clone());
        Ok(reply)
    }
}

/// Runs one I/O step under a deadline.
async fn bounded<T>(limit: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| Error::Timeout(limit))?
}

fn require(reply: Reply, accept: impl Fn(ReplyCode) -> bool) -> Result<Reply> {
    if accept(reply.code) {
        Ok(reply)
    } else {
        Err(Error::smtp_error(reply.code.as_u16(), reply.message_text()))
    }
}

fn is_auth_challenge(code: ReplyCode) -> bool {
    code == ReplyCode::AUTH_CONTINUE
}

/// Normalizes line endings, dot-stuffs, and appends the end-of-data marker.
fn encode_data(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + message.len() / 64 + 5);

    let body = message.strip_suffix(b"\n").unwrap_or(message);
    let body = body.strip_suffix(b"\r").unwrap_or(body);

    if !body.is_empty() {
        for line in body.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.first() == Some(&b'.') {
                out.push(b'.');
            }
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
        }
    }

    out.extend_from_slice(b".\r\n");
    out
}
