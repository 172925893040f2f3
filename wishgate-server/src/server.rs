use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use parking_lot::Mutex;
use russh::MethodSet;
use russh::server;
use russh_keys::key::KeyPair;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use crate::banner::load_banner;
use crate::config::Config;
use crate::error::{ServerError, ServerResult};
use crate::hostkey::load_or_create_host_key;
use crate::middleware::{self, Middleware};
use crate::net::AppCtx;
use crate::services::PasswordAuth;
use crate::signal::{ignore_repeated_signals, wait_for_shutdown_signal};
use crate::state::registry::Registry;

/// How long force-closed connections get to flush their disconnect.
const FORCE_CLOSE_GRACE: Duration = Duration::from_millis(500);

/// A configured but not yet listening SSH server.
pub struct Server {
    config: Config,
    ssh: Arc<server::Config>,
    ctx: AppCtx,
}

impl Server {
    /// Loads the host key and banner named by `config` and builds the default chain.
    pub fn new(config: Config) -> ServerResult<Self> {
        let key = load_or_create_host_key(&config.host_key_path, config.generate_host_key)?;
        Self::with_host_key(config, key)
    }

    pub fn with_host_key(config: Config, key: KeyPair) -> ServerResult<Self> {
        let chain = middleware::default_chain(config.welcome.clone());
        Self::with_middleware(config, key, chain)
    }

    /// Same as [`Server::with_host_key`] with a caller-supplied middleware chain.
    pub fn with_middleware(
        config: Config,
        key: KeyPair,
        chain: Vec<Middleware>,
    ) -> ServerResult<Self> {
        config.listen_addr()?;
        let banner = load_banner(config.banner_path.as_deref())?;
        // russh wants the banner for the life of the process
        let banner: &'static str = Box::leak(banner.into_boxed_str());

        let ssh = server::Config {
            server_id: russh::SshId::Standard(format!(
                "SSH-2.0-wishgate_{}",
                env!("CARGO_PKG_VERSION")
            )),
            methods: MethodSet::PASSWORD,
            auth_banner: Some(banner),
            auth_rejection_time: config.auth_rejection_time(),
            auth_rejection_time_initial: Some(Duration::ZERO),
            max_auth_attempts: config.max_auth_attempts,
            inactivity_timeout: config.idle_timeout(),
            keys: vec![key],
            ..Default::default()
        };

        let ctx = AppCtx {
            auth: Arc::new(PasswordAuth::new(config.password.clone())),
            app: middleware::compose(&chain, middleware::noop_handler()),
            registry: Arc::new(Registry::new()),
        };

        Ok(Self { config, ssh: Arc::new(ssh), ctx })
    }

    /// Binds the listener and starts accepting in the background.
    pub async fn listen(self) -> ServerResult<RunningServer> {
        let addr = self.config.listen_addr()?;
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr: addr.clone(), source })?;
        let local_addr = listener.local_addr()?;
        tracing::info!(host = %self.config.host, port = local_addr.port(), "Starting SSH server");

        let registry = self.ctx.registry.clone();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let accept = tokio::spawn(crate::net::ssh::serve(listener, self.ssh, self.ctx, shutdown_rx));

        Ok(RunningServer {
            local_addr,
            registry,
            shutdown,
            accept: Mutex::new(Some(accept)),
            stopped: AtomicBool::new(false),
            shutdown_timeout: self.config.shutdown_timeout(),
        })
    }

    /// Serves until SIGINT or SIGTERM, then shuts down within the configured timeout.
    pub async fn start(self) -> ServerResult<()> {
        self.run_until(async {
            match wait_for_shutdown_signal().await {
                Ok(signal) => tracing::info!(%signal, "Stopping SSH server"),
                Err(e) => tracing::error!(error = %e, "cannot watch for signals, stopping SSH server"),
            }
        })
        .await
    }

    /// Serves until `shutdown` resolves, then stops like [`Server::start`].
    pub async fn run_until<F>(self, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()>,
    {
        let running = self.listen().await?;
        shutdown.await;

        let watcher = tokio::spawn(ignore_repeated_signals());
        let result = running.stop(running.shutdown_timeout()).await;
        watcher.abort();

        match result {
            Ok(()) => Ok(()),
            Err(e) if e.is_closed() => {
                tracing::debug!("server already closed");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Could not stop server");
                Err(e)
            }
        }
    }
}

/// A server that is accepting connections.
///
/// Dropping it without [`RunningServer::stop`] stops the listener and
/// force-closes whatever is still connected.
pub struct RunningServer {
    local_addr: SocketAddr,
    registry: Arc<Registry>,
    shutdown: watch::Sender<bool>,
    accept: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
    shutdown_timeout: Duration,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn active_connections(&self) -> usize {
        self.registry.len()
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Stops accepting, then waits up to `timeout` for live connections to end.
    ///
    /// Connections still open after `timeout` are force-closed and
    /// [`ServerError::ShutdownTimeout`] is returned. A second call returns
    /// [`ServerError::AlreadyClosed`].
    pub async fn stop(&self, timeout: Duration) -> ServerResult<()> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Err(ServerError::AlreadyClosed);
        }

        self.shutdown.send_replace(true);
        let accept = self.accept.lock().take();
        if let Some(accept) = accept {
            if let Err(e) = accept.await {
                tracing::warn!(error = %e, "accept loop ended abnormally");
            }
        }

        let live = self.registry.len();
        tracing::info!(live, ?timeout, "waiting for connections to finish");

        match tokio::time::timeout(timeout, self.registry.wait_empty()).await {
            Ok(()) => {
                tracing::info!("all connections closed");
                Ok(())
            }
            Err(_) => {
                for conn in self.registry.connections() {
                    tracing::debug!(conn = conn.id, peer = ?conn.peer, "connection outlived shutdown");
                }
                let remaining = self.registry.force_close_all();
                tracing::warn!(remaining, ?timeout, "shutdown timed out, force-closing connections");
                if tokio::time::timeout(FORCE_CLOSE_GRACE, self.registry.wait_empty()).await.is_err() {
                    tracing::debug!(left = self.registry.len(), "connections still winding down");
                }
                Err(ServerError::ShutdownTimeout { timeout, remaining })
            }
        }
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shutdown.send_replace(true);
        self.registry.force_close_all();
    }
}
