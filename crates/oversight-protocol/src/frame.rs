//! # Frame format
//!
//! Every frame on the wire begins with a fixed 11-byte header followed by a
//! MessagePack-encoded body:
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                     total length (u32 LE)                    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |         pid (u16 LE)          |   type (u8)   |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                      partid (u32 LE)                         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                      body (MessagePack)                      |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! `total` counts the whole frame including the 11-byte header. A frame is
//! never handed to a caller until `total` bytes have been buffered.
//!
//! This module concerns itself only with framing — splitting the inbound
//! byte stream into discrete `(type, pid, partid, body)` frames. It does
//! not know what's inside `body`; that's [`crate::message`]'s job.

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the fixed frame header in bytes.
pub const HEADER_SIZE: usize = 11;

/// High bit of the `type` byte marks a response frame.
pub const RESPONSE_BIT: u8 = 0x80;

/// One decoded (or about-to-be-encoded) protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub tp: u8,
    pub pid: u16,
    pub partid: u32,
    pub body: Bytes,
}

impl Frame {
    pub fn new(tp: u8, pid: u16, partid: u32, body: Bytes) -> Self {
        Self {
            tp,
            pid,
            partid,
            body,
        }
    }

    /// Whether this frame's type has the response bit set.
    pub fn is_response(&self) -> bool {
        self.tp & RESPONSE_BIT != 0
    }

    /// Total on-wire length of this frame, header included.
    pub fn total_len(&self) -> usize {
        HEADER_SIZE + self.body.len()
    }

    /// Serialize this frame to its on-wire representation.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.total_len());
        buf.put_u32_le(self.total_len() as u32);
        buf.put_u16_le(self.pid);
        buf.put_u8(self.tp);
        buf.put_u32_le(self.partid);
        buf.put_slice(&self.body);
        buf.freeze()
    }
}

/// Parsed frame header, before the body is known to be fully buffered.
struct Header {
    total: usize,
    pid: u16,
    tp: u8,
    partid: u32,
}

fn parse_header(buf: &[u8]) -> Header {
    debug_assert!(buf.len() >= HEADER_SIZE);
    let mut cursor = buf;
    let total = cursor.get_u32_le() as usize;
    let pid = cursor.get_u16_le();
    let tp = cursor.get_u8();
    let partid = cursor.get_u32_le();
    Header {
        total,
        pid,
        tp,
        partid,
    }
}

/// Incremental frame reassembler over a growing byte buffer.
///
/// Bytes arrive from the socket in arbitrary chunks; [`FrameDecoder::push`]
/// appends them, and [`FrameDecoder::next_frame`] pulls out complete frames
/// as they become available. Calling `next_frame` repeatedly until it
/// returns `None` drains every frame currently buffered.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffered: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append freshly read bytes to the reassembly buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buffered.extend_from_slice(data);
    }

    /// Pull the next complete frame out of the buffer, if one is ready.
    ///
    /// Returns `Ok(None)` when fewer than a full frame's worth of bytes has
    /// been buffered so far — this is not an error, just "not yet".
    pub fn next_frame(&mut self) -> Option<Frame> {
        if self.buffered.len() < HEADER_SIZE {
            return None;
        }
        let header = parse_header(&self.buffered);
        if self.buffered.len() < header.total {
            return None;
        }

        let mut frame_bytes = self.buffered.split_to(header.total);
        frame_bytes.advance(HEADER_SIZE);
        Some(Frame::new(
            header.tp,
            header.pid,
            header.partid,
            frame_bytes.freeze(),
        ))
    }

    /// Discard every buffered byte, including any partially-received frame.
    ///
    /// Used to recover from a payload decode error that indicates the
    /// stream is desynchronized, and on link disconnect.
    pub fn clear(&mut self) {
        self.buffered.clear();
    }

    /// Number of bytes currently buffered (including an incomplete frame).
    pub fn buffered_len(&self) -> usize {
        self.buffered.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_fields() {
        let frame = Frame::new(0x02, 0x1234, 42, Bytes::from_static(b"hello"));
        let encoded = frame.encode();

        let mut decoder = FrameDecoder::new();
        decoder.push(&encoded);
        let decoded = decoder.next_frame().expect("frame should decode");

        assert_eq!(decoded.tp, frame.tp);
        assert_eq!(decoded.pid, frame.pid);
        assert_eq!(decoded.partid, frame.partid);
        assert_eq!(decoded.body, frame.body);
    }

    #[test]
    fn response_bit_detection() {
        let req = Frame::new(0x01, 1, 0, Bytes::new());
        let res = Frame::new(0x81, 1, 0, Bytes::new());
        assert!(!req.is_response());
        assert!(res.is_response());
    }

    #[test]
    fn partial_frame_yields_no_dispatch_until_complete() {
        let frame = Frame::new(0x00, 7, 9, Bytes::from_static(b"0123456789"));
        let encoded = frame.encode();

        let mut decoder = FrameDecoder::new();
        decoder.push(&encoded[..encoded.len() - 1]);
        assert!(decoder.next_frame().is_none());

        decoder.push(&encoded[encoded.len() - 1..]);
        let decoded = decoder.next_frame().expect("final byte completes the frame");
        assert_eq!(decoded.body, frame.body);
    }

    #[test]
    fn header_only_yields_no_dispatch() {
        let frame = Frame::new(0x00, 1, 1, Bytes::from_static(b"xyz"));
        let encoded = frame.encode();

        let mut decoder = FrameDecoder::new();
        decoder.push(&encoded[..HEADER_SIZE]);
        assert!(decoder.next_frame().is_none());
    }

    #[test]
    fn drains_multiple_frames_from_one_push() {
        let a = Frame::new(0x00, 1, 1, Bytes::from_static(b"a"));
        let b = Frame::new(0x00, 2, 2, Bytes::from_static(b"bb"));

        let mut combined = BytesMut::new();
        combined.extend_from_slice(&a.encode());
        combined.extend_from_slice(&b.encode());

        let mut decoder = FrameDecoder::new();
        decoder.push(&combined);

        let first = decoder.next_frame().unwrap();
        let second = decoder.next_frame().unwrap();
        assert!(decoder.next_frame().is_none());

        assert_eq!(first.pid, 1);
        assert_eq!(second.pid, 2);
    }

    #[test]
    fn clear_discards_partial_frame() {
        let frame = Frame::new(0x00, 1, 1, Bytes::from_static(b"0123456789"));
        let encoded = frame.encode();

        let mut decoder = FrameDecoder::new();
        decoder.push(&encoded[..encoded.len() - 1]);
        decoder.clear();
        assert_eq!(decoder.buffered_len(), 0);

        decoder.push(&encoded[encoded.len() - 1..]);
        assert!(decoder.next_frame().is_none());
    }
}
