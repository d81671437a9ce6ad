//! The framed TCP link to AgentCore: a write half shared by every caller
//! that wants to ship a frame, and a pending-request table for the one
//! request/response exchange the probe side initiates (`REQ_ANNOUNCE`).
//!
//! [`Link`] owns no read loop — that lives in [`crate::supervisor`], which
//! feeds inbound frames to the dispatcher and calls [`Link::mark_disconnected`]
//! when the socket goes away.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use oversight_protocol::{message::frame_type, Frame};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{oneshot, Mutex};

use crate::error::ProbeError;

/// One in-flight request awaiting its response frame, keyed by `pid`.
type PendingMap = HashMap<u16, oneshot::Sender<Bytes>>;

#[derive(Default)]
struct LinkState {
    write_half: Option<OwnedWriteHalf>,
    next_pid: u16,
    pending: PendingMap,
}

/// Shared handle to the write side of the AgentCore connection. Cheap to
/// clone; every clone refers to the same underlying socket and pending-
/// request table.
#[derive(Clone)]
pub struct Link {
    state: std::sync::Arc<Mutex<LinkState>>,
}

impl Link {
    pub fn new() -> Self {
        Self {
            state: std::sync::Arc::new(Mutex::new(LinkState::default())),
        }
    }

    /// Install a freshly connected write half, replacing any previous one.
    pub async fn attach(&self, write_half: OwnedWriteHalf) {
        let mut state = self.state.lock().await;
        state.write_half = Some(write_half);
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.write_half.is_some()
    }

    /// Drop the write half and fail every pending request. Called once the
    /// read loop observes the socket has gone away.
    pub async fn mark_disconnected(&self) {
        let mut state = self.state.lock().await;
        state.write_half = None;
        state.pending.clear();
    }

    /// Best-effort fire-and-forget write. Silently dropped if not
    /// currently connected, matching a result dump with no transport.
    pub async fn send_frame(&self, frame: Frame) {
        let mut state = self.state.lock().await;
        let Some(write_half) = state.write_half.as_mut() else {
            return;
        };
        if let Err(e) = write_half.write_all(&frame.encode()).await {
            tracing::warn!(error = %e, "write to agentcore failed, marking link down");
            state.write_half = None;
            state.pending.clear();
        }
    }

    pub async fn send_heartbeat_reply(&self, pid: u16) {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();
        let body = oversight_protocol::message::encode_heartbeat_reply(now);
        self.send_frame(Frame::new(frame_type::RES_INFO, pid, 0, Bytes::from(body)))
            .await;
    }

    /// Send a frame and wait up to `timeout` for its response. The `pid`
    /// counter is pre-incremented before use, so the first request ever
    /// sent on a link carries pid 1, never 0.
    pub async fn request(&self, tp: u8, partid: u32, body: Bytes, timeout: Duration) -> Result<Bytes, ProbeError> {
        if !self.is_connected().await {
            return Err(ProbeError::ConnectionFailed("not connected".into()));
        }

        let (tx, rx) = oneshot::channel();
        let pid = {
            let mut state = self.state.lock().await;
            state.next_pid = state.next_pid.wrapping_add(1);
            let pid = state.next_pid;
            state.pending.insert(pid, tx);
            pid
        };

        self.send_frame(Frame::new(tp, pid, partid, body)).await;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(body)) => Ok(body),
            Ok(Err(_)) => Err(ProbeError::ConnectionLost),
            Err(_) => {
                self.state.lock().await.pending.remove(&pid);
                Err(ProbeError::RequestTimeout)
            }
        }
    }

    /// Resolve a previously registered request with its response body. A
    /// response for a pid nobody is waiting on (already timed out, or
    /// never ours) is logged and otherwise ignored.
    pub async fn complete_pending(&self, pid: u16, body: Bytes) {
        let sender = self.state.lock().await.pending.remove(&pid);
        match sender {
            Some(tx) => {
                let _ = tx.send(body);
            }
            None => tracing::error!(pid, "response for unmatched or expired request"),
        }
    }
}

impl Default for Link {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_without_connection_fails_fast() {
        let link = Link::new();
        let result = link
            .request(frame_type::REQ_ANNOUNCE, 0, Bytes::new(), Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(ProbeError::ConnectionFailed(_))));
    }

    #[tokio::test]
    async fn complete_pending_on_unknown_pid_is_a_no_op() {
        let link = Link::new();
        link.complete_pending(999, Bytes::from_static(b"x")).await;
    }

    #[tokio::test]
    async fn mark_disconnected_clears_write_half() {
        let link = Link::new();
        assert!(!link.is_connected().await);
        link.mark_disconnected().await;
        assert!(!link.is_connected().await);
    }

    #[tokio::test]
    async fn pid_counter_wraps_from_0xffff_to_0x0000() {
        let link = Link::new();
        link.state.lock().await.next_pid = 0xFFFF;
        {
            let mut state = link.state.lock().await;
            state.next_pid = state.next_pid.wrapping_add(1);
            assert_eq!(state.next_pid, 0x0000);
        }
    }
}
