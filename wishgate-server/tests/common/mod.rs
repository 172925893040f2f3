#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use russh::ChannelMsg;
use russh::client;
use russh_keys::key::{KeyPair, PublicKey};
use wishgate_server::middleware::Middleware;
use wishgate_server::{Config, RunningServer, Server};

#[derive(Clone, Default)]
pub struct TestClient {
    pub banners: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl client::Handler for TestClient {
    type Error = russh::Error;

    async fn check_server_key(&mut self, _server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        Ok(true)
    }

    async fn auth_banner(
        &mut self,
        banner: &str,
        _session: &mut client::Session,
    ) -> Result<(), Self::Error> {
        self.banners.lock().push(banner.to_string());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct Transcript {
    pub stdout: String,
    pub exit_status: Option<u32>,
    pub eof: bool,
}

pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".into(),
        port: 0,
        auth_rejection_ms: 10,
        ..Config::default()
    }
}

pub fn host_key() -> KeyPair {
    KeyPair::generate_ed25519().unwrap()
}

pub async fn start(chain: Option<Vec<Middleware>>) -> RunningServer {
    let server = match chain {
        Some(chain) => Server::with_middleware(test_config(), host_key(), chain),
        None => Server::with_host_key(test_config(), host_key()),
    };
    server.unwrap().listen().await.unwrap()
}

pub async fn connect(addr: SocketAddr) -> (client::Handle<TestClient>, TestClient) {
    let client = TestClient::default();
    let handle = client::connect(Arc::new(client::Config::default()), addr, client.clone())
        .await
        .unwrap();
    (handle, client)
}

pub async fn login(addr: SocketAddr) -> (client::Handle<TestClient>, TestClient) {
    let (mut handle, client) = connect(addr).await;
    assert!(handle.authenticate_password("alice", "test").await.unwrap());
    (handle, client)
}

/// Reads a channel until the server is done with it and the stream ends.
pub async fn read_to_end(channel: &mut russh::Channel<client::Msg>) -> Transcript {
    let mut transcript = Transcript::default();
    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { data } => transcript.stdout.push_str(&String::from_utf8_lossy(&data)),
            ChannelMsg::ExitStatus { exit_status } => transcript.exit_status = Some(exit_status),
            ChannelMsg::Eof => transcript.eof = true,
            _ => {}
        }
    }
    transcript
}

pub async fn shell(handle: &client::Handle<TestClient>) -> Transcript {
    let mut channel = handle.channel_open_session().await.unwrap();
    channel.request_shell(true).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), read_to_end(&mut channel))
        .await
        .unwrap()
}
