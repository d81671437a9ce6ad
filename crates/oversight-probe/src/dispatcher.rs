//! Routes inbound frames to the link's pending-request table or the
//! scheduler, by frame type.

use std::sync::Arc;

use oversight_protocol::message::{decode_assignments, frame_type};
use oversight_protocol::{Frame, FrameError};

use crate::link::Link;
use crate::scheduler::Scheduler;

pub struct Dispatcher {
    link: Link,
    scheduler: Arc<Scheduler>,
}

impl Dispatcher {
    pub fn new(link: Link, scheduler: Arc<Scheduler>) -> Self {
        Self { link, scheduler }
    }

    /// Handle one inbound frame. `Err` means the frame body failed to
    /// decode as valid MessagePack at all — the caller should treat this
    /// as framing corruption and discard its reassembly buffer. A frame
    /// whose type isn't recognized is logged and otherwise ignored; that
    /// is not corruption.
    pub async fn handle_frame(&self, frame: Frame) -> Result<(), FrameError> {
        match frame.tp {
            frame_type::RES_ANNOUNCE => {
                let assignments = decode_assignments(&frame.body)?;
                self.scheduler.clone().reconcile(assignments).await;
                self.link.complete_pending(frame.pid, frame.body).await;
                Ok(())
            }
            frame_type::FAF_ASSETS => {
                let assignments = decode_assignments(&frame.body)?;
                self.scheduler.clone().reconcile(assignments).await;
                Ok(())
            }
            frame_type::REQ_INFO => {
                self.link.send_heartbeat_reply(frame.pid).await;
                Ok(())
            }
            other => {
                tracing::warn!(tp = other, pid = frame.pid, "unhandled frame type from agentcore");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::Catalog;
    use crate::config::ConfigStore;
    use bytes::Bytes;
    use rmpv::Value;
    use std::sync::Arc;

    async fn test_dispatcher() -> (Dispatcher, Link, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let conf_path = dir.path().join("probe.conf");
        std::fs::write(&conf_path, "[test]\n").unwrap();
        let store = Arc::new(ConfigStore::load_initial(&conf_path, "test").unwrap());
        let link = Link::new();
        let scheduler = Scheduler::new(Catalog::new(), store, link.clone());
        let dispatcher = Dispatcher::new(link.clone(), scheduler);
        (dispatcher, link, dir)
    }

    fn empty_assignments_body() -> Bytes {
        Bytes::from(rmp_serde::to_vec(&Value::Array(vec![])).unwrap())
    }

    #[tokio::test]
    async fn req_info_triggers_a_heartbeat_reply() {
        let (dispatcher, _link, _dir) = test_dispatcher().await;
        let frame = Frame::new(frame_type::REQ_INFO, 0x1234, 0, Bytes::new());
        dispatcher.handle_frame(frame).await.unwrap();
        // No transport is attached, so the reply is silently dropped; the
        // point of this test is only that dispatch doesn't error or panic.
    }

    #[tokio::test]
    async fn faf_assets_is_forwarded_without_completing_any_pending_request() {
        let (dispatcher, _link, _dir) = test_dispatcher().await;
        let frame = Frame::new(frame_type::FAF_ASSETS, 7, 0, empty_assignments_body());
        assert!(dispatcher.handle_frame(frame).await.is_ok());
    }

    #[tokio::test]
    async fn res_announce_with_malformed_body_is_reported_as_framing_corruption() {
        let (dispatcher, _link, _dir) = test_dispatcher().await;
        let frame = Frame::new(frame_type::RES_ANNOUNCE, 1, 0, Bytes::from_static(b"\xff\xff not msgpack"));
        assert!(dispatcher.handle_frame(frame).await.is_err());
    }

    #[tokio::test]
    async fn unknown_frame_type_is_logged_and_not_an_error() {
        let (dispatcher, _link, _dir) = test_dispatcher().await;
        let frame = Frame::new(0x7e, 1, 0, Bytes::new());
        assert!(dispatcher.handle_frame(frame).await.is_ok());
    }
}
