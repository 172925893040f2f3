use anyhow::anyhow;
use async_trait::async_trait;
use russh::server::Handle;
use russh::{ChannelId, CryptoVec};
use crate::net::output::OutFrame;
use crate::net::sink::ClientSink;

/// Extended data type code for stderr (RFC 4254, section 5.2).
const SSH_EXTENDED_DATA_STDERR: u32 = 1;

pub struct SshSink {
    handle: Handle,
    channel: ChannelId,
}

impl SshSink {
    pub fn new(handle: Handle, channel: ChannelId) -> Self {
        Self { handle, channel }
    }
}

#[async_trait]
impl ClientSink for SshSink {
    async fn send_frame(&mut self, frame: OutFrame, seq: u64) -> anyhow::Result<()> {
        tracing::trace!(channel = ?self.channel, seq, "sending frame");

        match frame {
            OutFrame::Data(bytes) => {
                self.handle
                    .data(self.channel, CryptoVec::from_slice(&bytes))
                    .await
                    .map_err(|_| anyhow!("channel {:?} closed while writing data", self.channel))?;
            }
            OutFrame::Stderr(bytes) => {
                self.handle
                    .extended_data(self.channel, SSH_EXTENDED_DATA_STDERR, CryptoVec::from_slice(&bytes))
                    .await
                    .map_err(|_| anyhow!("channel {:?} closed while writing stderr", self.channel))?;
            }
            OutFrame::Exit(code) => {
                self.handle
                    .exit_status_request(self.channel, code)
                    .await
                    .map_err(|_| anyhow!("channel {:?} closed before exit status", self.channel))?;
            }
            OutFrame::Close => {
                // the client may already have closed its side; eof is best-effort
                let _ = self.handle.eof(self.channel).await;
                self.handle
                    .close(self.channel)
                    .await
                    .map_err(|_| anyhow!("channel {:?} already closed", self.channel))?;
            }
        }

        Ok(())
    }
}
