use thiserror::Error;

/// Failures that can occur while reassembling or decoding one frame.
///
/// A [`FrameError`] never tears down a link on its own; callers decide
/// whether to discard the inbound buffer (framing corruption) or simply
/// log and continue (unknown-but-well-formed frame).
#[derive(Debug, Error)]
pub enum FrameError {
    /// The frame body could not be decoded as a valid MessagePack value.
    /// Indicates the byte stream is desynchronized — the caller should
    /// discard everything buffered so far.
    #[error("payload decode failed: {0}")]
    PayloadDecode(#[from] rmp_serde::decode::Error),

    /// The body decoded fine but did not match the shape expected for its
    /// frame type (e.g. an assignment entry missing `_interval`).
    #[error("malformed message body: {0}")]
    MalformedBody(String),
}
