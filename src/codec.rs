//! Frame header encode/decode, grounded on the teacher's `read.rs`/`write.rs`
//! but generalized to the client direction: outbound frames are always
//! masked, inbound frames from the server are never masked (RFC 6455 §5.1).
//!
//! The two bugs spec.md §9 calls out in the original C are deliberately not
//! reproduced here: the 64-bit extended length is written with a single
//! `to_be_bytes` (no half-swap), and there's no manual "remaining length"
//! counter to decrement incorrectly — `AsyncReadExt::read_exact` owns that
//! bookkeeping.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::Error;
use crate::frame::{Frame, OpCode, OutboundFrame, SlicePart, MAX_PAYLOAD_SIZE};
use crate::mask::{generate_mask_key, mask_unmask};

/// Reads one frame off `reader`, unmasking if the server (incorrectly) set
/// the mask bit, per RFC 6455 servers must not mask, but we don't fail the
/// connection over it — we just honor whatever bit it actually sent.
pub async fn decode_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_frame_size: usize,
) -> Result<Frame, Error> {
    let mut header = [0u8; 2];
    reader.read_exact(&mut header).await?;

    let rsv = header[0] & 0b0111_0000;
    if rsv != 0 {
        return Err(Error::RsvNotZero);
    }

    let final_fragment = (header[0] & 0b1000_0000) != 0;
    let opcode = OpCode::from_byte(header[0] & 0b0000_1111)?;

    if !final_fragment && opcode.is_control() {
        return Err(Error::ControlFrameFragmented);
    }

    let masked = (header[1] & 0b1000_0000) != 0;
    let mut length = (header[1] & 0b0111_1111) as u64;

    if length == 126 {
        let mut ext = [0u8; 2];
        reader.read_exact(&mut ext).await?;
        length = u16::from_be_bytes(ext) as u64;
    } else if length == 127 {
        let mut ext = [0u8; 8];
        reader.read_exact(&mut ext).await?;
        length = u64::from_be_bytes(ext);
    }

    if opcode.is_control() && length > 125 {
        return Err(Error::ControlFramePayloadTooLarge);
    }

    if length as usize > max_frame_size || length as u128 > MAX_PAYLOAD_SIZE as u128 {
        return Err(Error::MaxFrameSize(length as usize, max_frame_size));
    }

    let mask = if masked {
        let mut mask = [0u8; 4];
        reader.read_exact(&mut mask).await?;
        Some(mask)
    } else {
        None
    };

    let mut payload = vec![0u8; length as usize];
    reader.read_exact(&mut payload).await?;

    if let Some(mask) = mask {
        mask_unmask(&mut payload, mask, 0);
    }

    Ok(Frame::new(final_fragment, opcode, payload))
}

/// Encodes and writes one client frame: always masked, per RFC 6455 §5.1.
/// `slice` controls the fin bit and opcode for slice writes
/// (`websocket_write_slice` in the original): the first piece carries the
/// real opcode with fin=0, middle pieces are CONTINUE with fin=0, the last
/// piece is CONTINUE with fin=1. A `Whole` write is fin=1 with the real
/// opcode, same as a single-frame message.
pub async fn encode_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    frame: &OutboundFrame,
) -> Result<(), Error> {
    let (opcode, fin) = match frame.slice {
        SlicePart::Whole => (frame.opcode, true),
        SlicePart::First => (frame.opcode, false),
        SlicePart::Middle => (OpCode::Continue, false),
        SlicePart::Last => (OpCode::Continue, true),
    };

    if opcode.is_control() && frame.payload.len() > 125 {
        return Err(Error::ControlFramePayloadTooLarge);
    }

    let mut header = Vec::with_capacity(14);
    let first_byte = ((fin as u8) << 7) | opcode.as_u8();
    header.push(first_byte);

    let len = frame.payload.len();
    if len <= 125 {
        header.push(0b1000_0000 | len as u8);
    } else if len <= u16::MAX as usize {
        header.push(0b1000_0000 | 126);
        header.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        header.push(0b1000_0000 | 127);
        header.extend_from_slice(&(len as u64).to_be_bytes());
    }

    let mask_key = generate_mask_key();
    header.extend_from_slice(&mask_key);

    let mut payload = frame.payload.clone();
    mask_unmask(&mut payload, mask_key, 0);

    writer.write_all(&header).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    async fn round_trip(opcode: OpCode, payload: Vec<u8>) -> Frame {
        let outbound = OutboundFrame::message(opcode, payload);
        let mut buf = Vec::new();
        encode_frame(&mut buf, &outbound).await.unwrap();
        let mut cursor = Cursor::new(buf);
        decode_frame(&mut cursor, 1 << 20).await.unwrap()
    }

    #[tokio::test]
    async fn encodes_and_decodes_hi_as_text() {
        let frame = round_trip(OpCode::Text, b"Hi".to_vec()).await;
        assert_eq!(frame.opcode, OpCode::Text);
        assert_eq!(frame.payload, b"Hi");
        assert!(frame.final_fragment);
    }

    #[tokio::test]
    async fn handles_126_length_boundary() {
        let payload = vec![7u8; 126];
        let frame = round_trip(OpCode::Binary, payload.clone()).await;
        assert_eq!(frame.payload, payload);
    }

    #[tokio::test]
    async fn handles_65535_length_boundary() {
        let payload = vec![9u8; 65535];
        let frame = round_trip(OpCode::Binary, payload.clone()).await;
        assert_eq!(frame.payload, payload);
    }

    #[tokio::test]
    async fn handles_65536_length_requiring_64_bit_extended_length() {
        let payload = vec![3u8; 65536];
        let frame = round_trip(OpCode::Binary, payload.clone()).await;
        assert_eq!(frame.payload, payload);
    }

    #[tokio::test]
    async fn rejects_fragmented_control_frame_on_decode() {
        // Hand-construct a PING frame header with fin=0, which must never
        // be produced by a compliant peer.
        let header = [0b0000_1001u8, 0b0000_0000u8];
        let mut cursor = Cursor::new(header.to_vec());
        let err = decode_frame(&mut cursor, 1 << 20).await.unwrap_err();
        assert!(matches!(err, Error::ControlFrameFragmented));
    }

    #[tokio::test]
    async fn rejects_oversize_control_frame_payload_on_encode() {
        let outbound = OutboundFrame::message(OpCode::Ping, vec![0u8; 126]);
        let mut buf = Vec::new();
        let err = encode_frame(&mut buf, &outbound).await.unwrap_err();
        assert!(matches!(err, Error::ControlFramePayloadTooLarge));
    }

    #[tokio::test]
    async fn outbound_frames_are_always_masked() {
        let outbound = OutboundFrame::message(OpCode::Text, b"mask me".to_vec());
        let mut buf = Vec::new();
        encode_frame(&mut buf, &outbound).await.unwrap();
        // byte 1's top bit is the mask bit
        assert_eq!(buf[1] & 0b1000_0000, 0b1000_0000);
    }

    #[tokio::test]
    async fn rejects_frame_exceeding_max_frame_size() {
        let payload = vec![1u8; 2000];
        let outbound = OutboundFrame::message(OpCode::Binary, payload);
        let mut buf = Vec::new();
        encode_frame(&mut buf, &outbound).await.unwrap();
        let mut cursor = Cursor::new(buf);
        let err = decode_frame(&mut cursor, 1000).await.unwrap_err();
        assert!(matches!(err, Error::MaxFrameSize(2000, 1000)));
    }
}
