use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use bytes::Bytes;
use russh::ChannelId;
use russh::server::Handle;
use thiserror::Error;
use tokio::sync::mpsc;
use crate::net::sink::ClientSink;
use crate::net::sink::ssh::SshSink;

const OUTPUT_QUEUE: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutFrame {
    /// Bytes for the channel's stdout
    Data(Bytes),
    /// Bytes for the channel's stderr (extended data type 1)
    Stderr(Bytes),
    /// Exit status reported to the client
    Exit(u32),
    /// EOF followed by channel close
    Close,
}

#[derive(Debug)]
pub struct OutEvent {
    pub frame: OutFrame,
    pub seq: u64,
}

#[derive(Debug, Error)]
#[error("session output is closed")]
pub struct OutputClosed;

/// Ordered writer side of a session. Frames reach the client in send order.
#[derive(Clone)]
pub struct OutputHandle {
    /// Sender for output events
    tx: mpsc::Sender<OutEvent>,
    /// Next sequence number for output frames
    next_seq: Arc<AtomicU64>,
}

impl OutputHandle {
    pub fn new(tx: mpsc::Sender<OutEvent>) -> Self {
        Self {
            tx,
            next_seq: Arc::new(AtomicU64::new(1)),
        }
    }

    #[inline]
    pub fn next_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    pub async fn send(&self, frame: OutFrame) -> Result<(), OutputClosed> {
        let event = OutEvent { frame, seq: self.next_seq() };
        self.tx.send(event).await.map_err(|_| OutputClosed)
    }

    pub async fn data(&self, bytes: impl Into<Bytes>) -> Result<(), OutputClosed> {
        self.send(OutFrame::Data(bytes.into())).await
    }

    pub async fn stderr(&self, bytes: impl Into<Bytes>) -> Result<(), OutputClosed> {
        self.send(OutFrame::Stderr(bytes.into())).await
    }

    pub async fn exit(&self, code: u32) -> Result<(), OutputClosed> {
        self.send(OutFrame::Exit(code)).await
    }

    pub async fn close(&self) -> Result<(), OutputClosed> {
        self.send(OutFrame::Close).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

pub struct SessionOut {
    rx: mpsc::Receiver<OutEvent>,
}

impl SessionOut {
    pub fn new(rx: mpsc::Receiver<OutEvent>) -> Self {
        Self { rx }
    }

    /// Pumps frames into `client` until every handle is dropped or a close frame went out.
    pub async fn run<C>(mut self, mut client: C) -> anyhow::Result<()>
    where
        C: ClientSink
    {
        while let Some(event) = self.rx.recv().await {
            let closing = event.frame == OutFrame::Close;
            client.send_frame(event.frame, event.seq).await?;
            if closing {
                break;
            }
        }

        Ok(())
    }
}

/// Output pair for a fresh session; the pump half still needs a sink.
pub fn output_channel() -> (OutputHandle, SessionOut) {
    let (tx, rx) = mpsc::channel::<OutEvent>(OUTPUT_QUEUE);
    (OutputHandle::new(tx), SessionOut::new(rx))
}

pub fn init_session_for_ssh(handle: Handle, channel: ChannelId) -> OutputHandle {
    let (output, session_out) = output_channel();
    let sink = SshSink::new(handle, channel);

    tokio::spawn(async move {
        if let Err(e) = session_out.run(sink).await {
            tracing::debug!(channel = ?channel, error = %e, "session output stopped");
        }
    });

    output
}
