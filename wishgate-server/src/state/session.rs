use std::collections::HashMap;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::net::output::OutputHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub width: u32,
    pub height: u32,
}

impl Default for Window {
    fn default() -> Self {
        Self { width: 80, height: 24 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pty {
    /// TERM as sent by the client, e.g. "xterm-256color"
    pub term: String,
    pub window: Window,
}

/// Everything known about a session when its handler starts.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub id: SessionId,
    pub user: String,
    pub remote_addr: Option<SocketAddr>,
    /// Words of the exec request; empty for an interactive shell
    pub command: Vec<String>,
    pub pty: Option<Pty>,
    pub env: HashMap<String, String>,
}

impl SessionContext {
    pub fn new(user: impl Into<String>, remote_addr: Option<SocketAddr>) -> Self {
        Self {
            id: SessionId::new(),
            user: user.into(),
            remote_addr,
            command: Vec::new(),
            pty: None,
            env: HashMap::new(),
        }
    }
}

struct SessionInner {
    ctx: SessionContext,
    window: RwLock<Window>,
    state: RwLock<SessionState>,
    output: OutputHandle,
}

/// One shell or exec request on an authenticated connection.
///
/// Cheap to clone; every clone writes to the same ordered output stream.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.ctx.id)
            .field("user", &self.inner.ctx.user)
            .field("remote_addr", &self.inner.ctx.remote_addr)
            .field("state", &self.state())
            .finish()
    }
}

impl Session {
    pub fn new(ctx: SessionContext, output: OutputHandle) -> Self {
        let window = ctx.pty.as_ref().map(|p| p.window).unwrap_or_default();
        Self {
            inner: Arc::new(SessionInner {
                ctx,
                window: RwLock::new(window),
                state: RwLock::new(SessionState::Open),
                output,
            }),
        }
    }

    pub fn id(&self) -> SessionId {
        self.inner.ctx.id
    }

    pub fn user(&self) -> &str {
        &self.inner.ctx.user
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.inner.ctx.remote_addr
    }

    pub fn command(&self) -> &[String] {
        &self.inner.ctx.command
    }

    pub fn pty(&self) -> Option<&Pty> {
        self.inner.ctx.pty.as_ref()
    }

    pub fn get_env(&self, key: &str) -> Option<&str> {
        self.inner.ctx.env.get(key).map(String::as_str)
    }

    /// Current terminal size; follows window-change requests.
    pub fn window(&self) -> Window {
        *self.inner.window.read()
    }

    pub fn set_window(&self, window: Window) {
        *self.inner.window.write() = window;
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.read()
    }

    pub fn is_closed(&self) -> bool {
        self.state() == SessionState::Closed
    }

    /// The connection went away underneath us.
    pub fn mark_closed(&self) {
        *self.inner.state.write() = SessionState::Closed;
    }

    pub async fn write(&self, data: &[u8]) -> io::Result<usize> {
        self.ensure_open()?;
        self.inner
            .output
            .data(Bytes::copy_from_slice(data))
            .await
            .map_err(broken_pipe)?;
        Ok(data.len())
    }

    pub async fn write_str(&self, s: &str) -> io::Result<usize> {
        self.write(s.as_bytes()).await
    }

    pub async fn write_stderr(&self, data: &[u8]) -> io::Result<usize> {
        self.ensure_open()?;
        self.inner
            .output
            .stderr(Bytes::copy_from_slice(data))
            .await
            .map_err(broken_pipe)?;
        Ok(data.len())
    }

    /// Reports `code` as the exit status and closes the session.
    pub async fn exit(&self, code: u32) -> io::Result<()> {
        self.ensure_open()?;
        self.inner.output.exit(code).await.map_err(broken_pipe)?;
        self.close().await
    }

    /// Sends EOF and closes the channel. Closing twice is a no-op.
    pub async fn close(&self) -> io::Result<()> {
        {
            let mut state = self.inner.state.write();
            if *state == SessionState::Closed {
                return Ok(());
            }
            *state = SessionState::Closed;
        }
        self.inner.output.close().await.map_err(broken_pipe)
    }

    fn ensure_open(&self) -> io::Result<()> {
        if self.is_closed() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "session is closed"));
        }
        Ok(())
    }
}

fn broken_pipe(e: crate::net::output::OutputClosed) -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, e)
}

/// Writes `args` to the session. Failures are logged, not returned.
pub async fn print(session: &Session, args: impl fmt::Display) {
    if let Err(e) = session.write_str(&args.to_string()).await {
        tracing::debug!(session = %session.id(), error = %e, "write to session failed");
    }
}

/// Like [`print`] with a trailing newline.
pub async fn println(session: &Session, args: impl fmt::Display) {
    print(session, format!("{args}\n")).await;
}
