//! Scripted in-memory relay for tests.
//!
//! [`ScriptedConnector`] implements [`Connector`] without touching the
//! network. Every `connect` spawns a small relay task on one end of a
//! [`tokio::io::duplex`] pipe that answers each command with a well-behaved
//! default reply, unless a [`Stage`] has been overridden with an [`Action`].
//! STARTTLS "upgrades" reuse the same pipe, so the conversation after the
//! handshake is still visible to the relay.
//!
//! The connector records what the relay received in a [`Transcript`] and
//! counts transport lifecycle events in a [`Lifecycle`].

use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream, ReadBuf,
};

use crate::connection::Connector;
use crate::error::{Error, Result};

const PIPE_CAPACITY: usize = 64 * 1024;

/// A point in the conversation the relay can be told to misbehave at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Greeting sent on connect.
    Greeting,
    /// Reply to `EHLO` before STARTTLS.
    Ehlo,
    /// Reply to `EHLO` once STARTTLS was accepted.
    EhloTls,
    /// Reply to `STARTTLS`.
    StartTls,
    /// Reply to `AUTH LOGIN`.
    AuthLogin,
    /// Reply to the base64 username.
    AuthUsername,
    /// Reply to the base64 password.
    AuthPassword,
    /// Reply to `MAIL FROM`.
    MailFrom,
    /// Reply to `RCPT TO` for this address.
    RcptTo(String),
    /// Reply to `DATA`.
    Data,
    /// Reply after the end-of-data marker.
    DataEnd,
    /// Reply to `QUIT`.
    Quit,
}

/// How the relay answers a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Send these reply lines; CRLF is appended.
    Reply(String),
    /// Drop the connection without answering.
    Close,
    /// Never answer.
    Hang,
}

/// One line the relay received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    /// Which stage the line was answered as.
    pub stage: Stage,
    /// The line as written by the client, without CRLF.
    pub line: String,
}

/// Everything the relay received, across all connections.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    /// Command lines in arrival order. Message content is not included.
    pub received: Vec<Received>,
    /// Message content of each completed `DATA`, un-stuffed, CRLF-terminated lines.
    pub messages: Vec<String>,
}

impl Transcript {
    /// Returns the stages in the order the client reached them.
    #[must_use]
    pub fn stages(&self) -> Vec<Stage> {
        self.received.iter().map(|r| r.stage.clone()).collect()
    }

    /// Returns the raw line received for the first occurrence of `stage`.
    #[must_use]
    pub fn line_for(&self, stage: &Stage) -> Option<&str> {
        self.received
            .iter()
            .find(|r| &r.stage == stage)
            .map(|r| r.line.as_str())
    }

    /// Returns true if the client ever reached `stage`.
    #[must_use]
    pub fn reached(&self, stage: &Stage) -> bool {
        self.received.iter().any(|r| &r.stage == stage)
    }
}

/// Transport lifecycle counters.
#[derive(Debug, Default)]
pub struct Lifecycle {
    connects: AtomicUsize,
    upgrades: AtomicUsize,
    shutdowns: AtomicUsize,
    drops: AtomicUsize,
}

impl Lifecycle {
    /// Number of successful connects.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Number of successful TLS upgrades.
    pub fn upgrades(&self) -> usize {
        self.upgrades.load(Ordering::SeqCst)
    }

    /// Number of completed transport shutdowns.
    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    /// Number of transports released.
    pub fn drops(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }
}

/// Client half of the pipe, counting shutdowns and drops.
#[derive(Debug)]
pub struct TrackedStream {
    inner: DuplexStream,
    lifecycle: Arc<Lifecycle>,
}

impl AsyncRead for TrackedStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for TrackedStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let poll = Pin::new(&mut self.inner).poll_shutdown(cx);
        if poll.is_ready() {
            self.lifecycle.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
        poll
    }
}

impl Drop for TrackedStream {
    fn drop(&mut self) {
        self.lifecycle.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// [`Connector`] backed by a scripted in-memory relay.
#[derive(Debug, Clone)]
pub struct ScriptedConnector {
    overrides: HashMap<Stage, Action>,
    refuse: bool,
    fail_tls: bool,
    lifecycle: Arc<Lifecycle>,
    transcript: Arc<Mutex<Transcript>>,
}

impl Default for ScriptedConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedConnector {
    /// Creates a relay that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self {
            overrides: HashMap::new(),
            refuse: false,
            fail_tls: false,
            lifecycle: Arc::new(Lifecycle::default()),
            transcript: Arc::new(Mutex::new(Transcript::default())),
        }
    }

    /// Creates a connector whose connects are refused.
    #[must_use]
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::new()
        }
    }

    /// Overrides how the relay answers `stage`.
    #[must_use]
    pub fn on(mut self, stage: Stage, action: Action) -> Self {
        self.overrides.insert(stage, action);
        self
    }

    /// Overrides the reply text for `stage`.
    #[must_use]
    pub fn reply(self, stage: Stage, reply: impl Into<String>) -> Self {
        self.on(stage, Action::Reply(reply.into()))
    }

    /// Makes every TLS handshake fail.
    #[must_use]
    pub fn fail_tls(mut self) -> Self {
        self.fail_tls = true;
        self
    }

    /// Returns the lifecycle counters.
    #[must_use]
    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Returns a snapshot of what the relay has received.
    #[must_use]
    pub fn transcript(&self) -> Transcript {
        self.transcript
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Connector for ScriptedConnector {
    type Plain = TrackedStream;
    type Secure = TrackedStream;

    async fn connect(&self, _host: &str, _port: u16) -> io::Result<TrackedStream> {
        if self.refuse {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            ));
        }

        let (client, server) = tokio::io::duplex(PIPE_CAPACITY);
        let relay = Relay {
            overrides: self.overrides.clone(),
            transcript: Arc::clone(&self.transcript),
        };
        tokio::spawn(relay.run(server));

        self.lifecycle.connects.fetch_add(1, Ordering::SeqCst);
        Ok(TrackedStream {
            inner: client,
            lifecycle: Arc::clone(&self.lifecycle),
        })
    }

    async fn upgrade(&self, _host: &str, plain: TrackedStream) -> Result<TrackedStream> {
        if self.fail_tls {
            drop(plain);
            return Err(Error::TlsHandshake(io::Error::new(
                io::ErrorKind::InvalidData,
                "certificate verify failed",
            )));
        }
        self.lifecycle.upgrades.fetch_add(1, Ordering::SeqCst);
        Ok(plain)
    }
}

enum Flow {
    Continue,
    Stop,
}

struct Relay {
    overrides: HashMap<Stage, Action>,
    transcript: Arc<Mutex<Transcript>>,
}

impl Relay {
    async fn run(self, server: DuplexStream) {
        let mut conn = BufReader::new(server);
        if matches!(self.answer(&mut conn, Stage::Greeting).await, Flow::Stop) {
            return;
        }

        let mut auth_step = 0u8;
        let mut tls = false;
        loop {
            let Some(line) = read_line(&mut conn).await else {
                return;
            };

            let stage = if auth_step == 1 {
                auth_step = 2;
                Stage::AuthUsername
            } else if auth_step == 2 {
                auth_step = 0;
                Stage::AuthPassword
            } else if let Some(stage) = classify(&line) {
                if stage == Stage::Ehlo && tls {
                    Stage::EhloTls
                } else {
                    stage
                }
            } else {
                let unknown = b"502 5.5.2 Command not recognized\r\n";
                if conn.get_mut().write_all(unknown).await.is_err() {
                    return;
                }
                continue;
            };
            if stage == Stage::AuthLogin {
                auth_step = 1;
            }

            self.record(stage.clone(), line);

            let answered = self.answer(&mut conn, stage.clone()).await;
            if matches!(answered, Flow::Stop) {
                return;
            }
            // A refused challenge ends the exchange.
            if auth_step != 0 && !self.accepts(&stage) {
                auth_step = 0;
            }
            if stage == Stage::StartTls && self.accepts(&stage) {
                tls = true;
            }

            match stage {
                Stage::Data if self.accepts(&Stage::Data) => {
                    let Some(body) = read_message(&mut conn).await else {
                        return;
                    };
                    self.transcript
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .messages
                        .push(body);
                    if matches!(self.answer(&mut conn, Stage::DataEnd).await, Flow::Stop) {
                        return;
                    }
                }
                Stage::Quit => return,
                _ => {}
            }
        }
    }

    fn record(&self, stage: Stage, line: String) {
        self.transcript
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .received
            .push(Received { stage, line });
    }

    fn accepts(&self, stage: &Stage) -> bool {
        match self.overrides.get(stage) {
            Some(Action::Reply(text)) => matches!(text.as_bytes().first(), Some(b'2' | b'3')),
            Some(Action::Close | Action::Hang) => false,
            None => true,
        }
    }

    async fn answer(&self, conn: &mut BufReader<DuplexStream>, stage: Stage) -> Flow {
        let text = match self.overrides.get(&stage) {
            Some(Action::Reply(text)) => text.clone(),
            Some(Action::Close) => return Flow::Stop,
            Some(Action::Hang) => std::future::pending().await,
            None => default_reply(&stage).to_string(),
        };

        let wire = format!("{text}\r\n");
        if conn.get_mut().write_all(wire.as_bytes()).await.is_err() {
            return Flow::Stop;
        }
        Flow::Continue
    }
}

async fn read_line(conn: &mut BufReader<DuplexStream>) -> Option<String> {
    let mut line = String::new();
    match conn.read_line(&mut line).await {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
    }
}

async fn read_message(conn: &mut BufReader<DuplexStream>) -> Option<String> {
    let mut body = String::new();
    loop {
        let line = read_line(conn).await?;
        if line == "." {
            return Some(body);
        }
        body.push_str(line.strip_prefix('.').unwrap_or(&line));
        body.push_str("\r\n");
    }
}

fn classify(line: &str) -> Option<Stage> {
    let upper = line.to_ascii_uppercase();
    let stage = if upper.starts_with("EHLO") || upper.starts_with("HELO") {
        Stage::Ehlo
    } else if upper == "STARTTLS" {
        Stage::StartTls
    } else if upper.starts_with("AUTH LOGIN") {
        Stage::AuthLogin
    } else if upper.starts_with("MAIL FROM:") {
        Stage::MailFrom
    } else if upper.starts_with("RCPT TO:") {
        let addr = line["RCPT TO:".len()..]
            .trim()
            .trim_start_matches('<')
            .trim_end_matches('>');
        Stage::RcptTo(addr.to_string())
    } else if upper == "DATA" {
        Stage::Data
    } else if upper == "QUIT" {
        Stage::Quit
    } else {
        return None;
    };
    Some(stage)
}

fn default_reply(stage: &Stage) -> &'static str {
    match stage {
        Stage::Greeting => "220 relay.test ESMTP ready",
        Stage::Ehlo => "250-relay.test\r\n250-STARTTLS\r\n250-AUTH LOGIN PLAIN\r\n250 SIZE 10240000",
        Stage::EhloTls => "250-relay.test\r\n250-AUTH LOGIN PLAIN\r\n250 SIZE 10240000",
        Stage::StartTls => "220 2.0.0 Ready to start TLS",
        Stage::AuthLogin => "334 VXNlcm5hbWU6",
        Stage::AuthUsername => "334 UGFzc3dvcmQ6",
        Stage::AuthPassword => "235 2.7.0 Authentication successful",
        Stage::MailFrom | Stage::RcptTo(_) => "250 2.1.0 Ok",
        Stage::Data => "354 End data with <CR><LF>.<CR><LF>",
        Stage::DataEnd => "250 2.0.0 Ok: queued",
        Stage::Quit => "221 2.0.0 Bye",
    }
}
