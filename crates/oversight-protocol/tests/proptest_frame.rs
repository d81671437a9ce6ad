//! Property-based tests for frame encode/decode and the incremental
//! reassembly decoder.

use bytes::{Bytes, BytesMut};
use oversight_protocol::{Frame, FrameDecoder, HEADER_SIZE};
use proptest::prelude::*;

fn frame_body() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..512)
}

proptest! {
    #[test]
    fn frame_roundtrips_through_encode_and_decode(
        tp in any::<u8>(),
        pid in any::<u16>(),
        partid in any::<u32>(),
        body in frame_body(),
    ) {
        let frame = Frame::new(tp, pid, partid, Bytes::from(body.clone()));
        let encoded = frame.encode();

        let mut decoder = FrameDecoder::new();
        decoder.push(&encoded);
        let decoded = decoder.next_frame().expect("a fully buffered frame always decodes");

        prop_assert_eq!(decoded.tp, tp);
        prop_assert_eq!(decoded.pid, pid);
        prop_assert_eq!(decoded.partid, partid);
        prop_assert_eq!(decoded.body.as_ref(), body.as_slice());
        prop_assert_eq!(encoded.len(), HEADER_SIZE + body.len());
    }

    #[test]
    fn arbitrary_chunking_does_not_change_the_decoded_frame(
        tp in any::<u8>(),
        pid in any::<u16>(),
        body in frame_body(),
        chunk_size in 1usize..64,
    ) {
        let frame = Frame::new(tp, pid, 0, Bytes::from(body.clone()));
        let encoded = frame.encode();

        let mut decoder = FrameDecoder::new();
        for chunk in encoded.chunks(chunk_size) {
            decoder.push(chunk);
        }

        let decoded = decoder.next_frame().expect("frame completes once all chunks are pushed");
        prop_assert_eq!(decoded.body.as_ref(), body.as_slice());
        prop_assert!(decoder.next_frame().is_none());
    }

    #[test]
    fn concatenated_frames_decode_in_order(
        first_body in frame_body(),
        second_body in frame_body(),
    ) {
        let a = Frame::new(0x00, 1, 0, Bytes::from(first_body.clone()));
        let b = Frame::new(0x00, 2, 0, Bytes::from(second_body.clone()));

        let mut combined = BytesMut::new();
        combined.extend_from_slice(&a.encode());
        combined.extend_from_slice(&b.encode());

        let mut decoder = FrameDecoder::new();
        decoder.push(&combined);

        let first = decoder.next_frame().unwrap();
        let second = decoder.next_frame().unwrap();
        prop_assert!(decoder.next_frame().is_none());
        prop_assert_eq!(first.body.as_ref(), first_body.as_slice());
        prop_assert_eq!(second.body.as_ref(), second_body.as_slice());
    }
}
