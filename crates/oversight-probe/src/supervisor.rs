//! Connects to AgentCore, announces this probe, and runs the inbound read
//! loop — reconnecting with exponential backoff whenever the link drops.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use oversight_protocol::message::{frame_type, AnnouncePayload};
use oversight_protocol::FrameDecoder;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::dispatcher::Dispatcher;
use crate::error::ProbeError;
use crate::link::Link;

const INITIAL_STEP: u64 = 2;
const MAX_STEP: u64 = 128;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const ANNOUNCE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Supervisor {
    link: Link,
    dispatcher: Arc<Dispatcher>,
    name: String,
    version: String,
    host: String,
    port: u16,
    connecting: Mutex<bool>,
}

impl Supervisor {
    pub fn new(link: Link, dispatcher: Arc<Dispatcher>, name: String, version: String, host: String, port: u16) -> Arc<Self> {
        Arc::new(Self {
            link,
            dispatcher,
            name,
            version,
            host,
            port,
            connecting: Mutex::new(false),
        })
    }

    /// Run the reconnect loop until `shutdown` fires. A connection attempt
    /// doubles the backoff step; a successful reconcile of the link (i.e.
    /// not currently connecting and not connected) resets it.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut step = INITIAL_STEP;
        loop {
            let connected = self.link.is_connected().await;
            let connecting = *self.connecting.lock().await;

            if !connected && !connecting {
                let me = Arc::clone(&self);
                tokio::spawn(async move { me.attempt_connect().await });
            }
            step = next_step(step, connected, connecting);

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(step)) => {}
                _ = shutdown.cancelled() => return,
            }
        }
    }

    async fn attempt_connect(self: Arc<Self>) {
        *self.connecting.lock().await = true;
        if let Err(e) = self.try_connect_once().await {
            tracing::warn!(error = %e, host = %self.host, port = self.port, "connecting to agentcore failed");
        }
        *self.connecting.lock().await = false;
    }

    async fn try_connect_once(&self) -> Result<(), ProbeError> {
        let addr = format!("{}:{}", self.host, self.port);
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr))
            .await
            .map_err(|_| ProbeError::ConnectionFailed("connect timed out".into()))?
            .map_err(|e| ProbeError::ConnectionFailed(e.to_string()))?;

        let (read_half, write_half) = stream.into_split();
        self.link.attach(write_half).await;

        let dispatcher = Arc::clone(&self.dispatcher);
        let link = self.link.clone();
        tokio::spawn(async move { run_read_loop(read_half, dispatcher, link).await });

        let body = AnnouncePayload(self.name.clone(), self.version.clone()).encode();
        self.link
            .request(frame_type::REQ_ANNOUNCE, 0, Bytes::from(body), ANNOUNCE_TIMEOUT)
            .await?;

        tracing::info!(host = %self.host, port = self.port, "announced to agentcore");
        Ok(())
    }
}

async fn run_read_loop(mut read_half: OwnedReadHalf, dispatcher: Arc<Dispatcher>, link: Link) {
    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; 8192];

    loop {
        match read_half.read(&mut buf).await {
            Ok(0) => {
                tracing::info!("agentcore closed the connection");
                break;
            }
            Ok(n) => {
                decoder.push(&buf[..n]);
                while let Some(frame) = decoder.next_frame() {
                    if let Err(e) = dispatcher.handle_frame(frame).await {
                        tracing::error!(error = %e, "framing corruption, discarding buffered bytes");
                        decoder.clear();
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "read from agentcore failed");
                break;
            }
        }
    }

    link.mark_disconnected().await;
}

/// The backoff step transition the reconnect loop applies each iteration:
/// doubles (capped at `MAX_STEP`) while neither connected nor connecting,
/// otherwise resets to `INITIAL_STEP`. Pulled out of [`Supervisor::run`] as
/// a pure function so the sequencing in §8 scenario 4 (resume at 4s after
/// the first failed attempt, doubling from there) can be unit-tested
/// without a live socket.
fn next_step(step: u64, connected: bool, connecting: bool) -> u64 {
    if !connected && !connecting {
        (step * 2).min(MAX_STEP)
    } else {
        INITIAL_STEP
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_doubles_while_neither_connected_nor_connecting() {
        let mut step = INITIAL_STEP;
        step = next_step(step, false, false);
        assert_eq!(step, 4);
        step = next_step(step, false, false);
        assert_eq!(step, 8);
        step = next_step(step, false, false);
        assert_eq!(step, 16);
    }

    #[test]
    fn step_caps_at_max_step() {
        let mut step = MAX_STEP;
        for _ in 0..5 {
            step = next_step(step, false, false);
        }
        assert_eq!(step, MAX_STEP);
    }

    #[test]
    fn step_resets_to_initial_once_connected() {
        let step = next_step(64, true, false);
        assert_eq!(step, INITIAL_STEP);
    }

    #[test]
    fn step_resets_to_initial_while_connecting() {
        let step = next_step(64, false, true);
        assert_eq!(step, INITIAL_STEP);
    }

    #[test]
    fn disconnect_mid_flight_resumes_backoff_at_4s() {
        // §8 scenario 4: a pending REQ_ANNOUNCE is severed mid-flight, the
        // attempt fails, and the very next iteration's sleep should be 4s
        // (the first doubling from INITIAL_STEP), not a reset to 2s.
        let step = next_step(INITIAL_STEP, false, false);
        assert_eq!(step, 4);
    }
}
