use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use async_trait::async_trait;
use russh::MethodSet;
use russh::server::{self, Auth, Msg};
use russh::{Channel, ChannelId};
use crate::error::ServerError;
use crate::middleware::Handler;
use crate::net::output::init_session_for_ssh;
use crate::services::PasswordAuth;
use crate::state::session::{Pty, Session, SessionContext, Window};
use crate::util::args::split_command;

/// What the client asked for on a channel before its shell or exec request.
#[derive(Default)]
struct ChannelSetup {
    pty: Option<Pty>,
    env: HashMap<String, String>,
    /// Set once a shell or exec request started the handler
    session: Option<Session>,
}

/// russh handler for one TCP connection.
///
/// Authenticates with the shared password and runs the middleware chain once
/// per shell or exec request.
pub struct SshConnection {
    peer: Option<SocketAddr>,
    auth: Arc<PasswordAuth>,
    app: Handler,
    user: Option<String>,
    channels: HashMap<ChannelId, ChannelSetup>,
}

impl SshConnection {
    pub fn new(peer: Option<SocketAddr>, auth: Arc<PasswordAuth>, app: Handler) -> Self {
        Self {
            peer,
            auth,
            app,
            user: None,
            channels: HashMap::new(),
        }
    }

    /// Builds the session for `channel` and runs the chain on its own task.
    ///
    /// Returns false when the channel is unknown or already running.
    fn start_session(
        &mut self,
        channel: ChannelId,
        command: Vec<String>,
        handle: server::Handle,
    ) -> bool {
        let Some(setup) = self.channels.get_mut(&channel) else {
            tracing::warn!(peer = ?self.peer, ?channel, "request on unknown channel");
            return false;
        };
        if setup.session.is_some() {
            tracing::warn!(peer = ?self.peer, ?channel, "channel already has a session");
            return false;
        }

        let mut ctx = SessionContext::new(self.user.clone().unwrap_or_default(), self.peer);
        ctx.command = command;
        ctx.pty = setup.pty.clone();
        ctx.env = setup.env.clone();

        let output = init_session_for_ssh(handle, channel);
        let session = Session::new(ctx, output);
        setup.session = Some(session.clone());

        tokio::spawn(run_session(self.app.clone(), session));
        true
    }
}

/// Runs the chain, then reports exit status 0 and closes the channel.
async fn run_session(app: Handler, session: Session) {
    app(session.clone()).await;

    if session.is_closed() {
        return;
    }
    if let Err(e) = session.exit(0).await {
        tracing::debug!(session = %session.id(), error = %e, "could not close session");
    }
}

#[async_trait]
impl server::Handler for SshConnection {
    type Error = ServerError;

    async fn auth_password(&mut self, user: &str, password: &str) -> Result<Auth, Self::Error> {
        if self.auth.verify_password(password) {
            tracing::info!(peer = ?self.peer, %user, "password accepted");
            self.user = Some(user.to_string());
            Ok(Auth::Accept)
        } else {
            tracing::warn!(peer = ?self.peer, %user, "password rejected");
            // keep password on offer so the client can retry within max_auth_attempts
            Ok(Auth::Reject { proceed_with_methods: Some(MethodSet::PASSWORD) })
        }
    }

    async fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        _session: &mut server::Session,
    ) -> Result<bool, Self::Error> {
        self.channels.insert(channel.id(), ChannelSetup::default());
        Ok(true)
    }

    #[allow(clippy::too_many_arguments)]
    async fn pty_request(
        &mut self,
        channel: ChannelId,
        term: &str,
        col_width: u32,
        row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        _modes: &[(russh::Pty, u32)],
        session: &mut server::Session,
    ) -> Result<(), Self::Error> {
        if let Some(setup) = self.channels.get_mut(&channel) {
            setup.pty = Some(Pty {
                term: term.to_string(),
                window: Window { width: col_width, height: row_height },
            });
        }
        session.channel_success(channel);
        Ok(())
    }

    async fn env_request(
        &mut self,
        channel: ChannelId,
        variable_name: &str,
        variable_value: &str,
        session: &mut server::Session,
    ) -> Result<(), Self::Error> {
        if let Some(setup) = self.channels.get_mut(&channel) {
            setup.env.insert(variable_name.to_string(), variable_value.to_string());
        }
        session.channel_success(channel);
        Ok(())
    }

    async fn shell_request(
        &mut self,
        channel: ChannelId,
        session: &mut server::Session,
    ) -> Result<(), Self::Error> {
        if self.start_session(channel, Vec::new(), session.handle()) {
            session.channel_success(channel);
        } else {
            session.channel_failure(channel);
        }
        Ok(())
    }

    async fn exec_request(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        session: &mut server::Session,
    ) -> Result<(), Self::Error> {
        let command = split_command(&String::from_utf8_lossy(data));
        tracing::debug!(peer = ?self.peer, ?command, "exec request");

        if self.start_session(channel, command, session.handle()) {
            session.channel_success(channel);
        } else {
            session.channel_failure(channel);
        }
        Ok(())
    }

    async fn window_change_request(
        &mut self,
        channel: ChannelId,
        col_width: u32,
        row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        _session: &mut server::Session,
    ) -> Result<(), Self::Error> {
        let window = Window { width: col_width, height: row_height };
        if let Some(setup) = self.channels.get_mut(&channel) {
            match &setup.session {
                Some(session) => session.set_window(window),
                None => {
                    if let Some(pty) = setup.pty.as_mut() {
                        pty.window = window;
                    }
                }
            }
        }
        Ok(())
    }

    async fn channel_close(
        &mut self,
        channel: ChannelId,
        _session: &mut server::Session,
    ) -> Result<(), Self::Error> {
        if let Some(session) = self.channels.remove(&channel).and_then(|s| s.session) {
            session.mark_closed();
        }
        Ok(())
    }
}

impl Drop for SshConnection {
    fn drop(&mut self) {
        // the transport is gone, so nothing written from here on can arrive
        for setup in self.channels.values() {
            if let Some(session) = &setup.session {
                session.mark_closed();
            }
        }
    }
}
