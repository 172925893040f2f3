mod connection;

use std::net::SocketAddr;
use std::sync::Arc;
use russh::Disconnect;
use russh::server::{self, run_stream};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use crate::net::AppCtx;
use crate::state::registry::ConnectionGuard;

pub use connection::SshConnection;

/// Accepts connections until `shutdown` flips. Connections already running are left alone.
pub(crate) async fn serve(
    listener: TcpListener,
    config: Arc<server::Config>,
    ctx: AppCtx,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::info!(%peer, "client connected");
                    // counted before the loop can observe shutdown again
                    let guard = ctx.registry.register(Some(peer));
                    tokio::spawn(handle_connection(stream, peer, guard, config.clone(), ctx.clone()));
                }
                Err(e) => {
                    tracing::error!(error=%e, "failed to accept connection");
                    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                }
            }
        }
    }

    tracing::info!("stopped accepting connections");
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    mut guard: ConnectionGuard,
    config: Arc<server::Config>,
    ctx: AppCtx,
) {
    let handler = SshConnection::new(Some(peer), ctx.auth.clone(), ctx.app.clone());

    let running = tokio::select! {
        res = run_stream(config, stream, handler) => res,
        _ = guard.force_closed() => {
            tracing::warn!(%peer, "dropping connection still in handshake");
            return;
        }
    };
    let mut running = match running {
        Ok(running) => running,
        Err(e) => {
            tracing::warn!(%peer, error=%e, "ssh handshake failed");
            return;
        }
    };

    let handle = running.handle();
    let conn = guard.id();
    tokio::select! {
        res = &mut running => {
            if let Err(e) = res {
                tracing::error!(%peer, error=%e, "connection error");
            }
        }
        _ = guard.force_closed() => {
            tracing::warn!(%peer, conn, "force-closing connection");
            let sent = handle
                .disconnect(Disconnect::ByApplication, "server shutting down".into(), "en".into())
                .await;
            if let Err(e) = sent {
                tracing::debug!(%peer, error=%e, "disconnect not delivered");
            }
        }
    }

    tracing::info!(%peer, "client disconnected");
}
