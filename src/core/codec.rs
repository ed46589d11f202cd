//! Tokio codec splitting a TCP byte stream into world frames.
//!
//! Inbound frames come out still obfuscated and mutable, so the session worker
//! can reverse the transform in place before parsing the opcode.
//!
//! The configured maximum bounds inbound frames only. Outbound frames are
//! bounded by what the length field can describe.

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::core::packet::{FRAME_MAGIC, HEADER_LEN, LENGTH_OFFSET, MAX_WIRE_FRAME};
use crate::error::{ProtocolError, Result};

/// Default cap on a single inbound frame, in bytes
pub const DEFAULT_MAX_FRAME: usize = 16 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct WorldCodec {
    max_frame: usize,
}

impl Default for WorldCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME)
    }
}

impl WorldCodec {
    pub fn new(max_frame: usize) -> Self {
        Self { max_frame }
    }
}

impl Decoder for WorldCodec {
    type Item = BytesMut;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.len() < LENGTH_OFFSET + 2 {
            return Ok(None);
        }

        if src[..2] != FRAME_MAGIC {
            return Err(ProtocolError::InvalidHeader);
        }

        let len = u16::from_le_bytes([src[LENGTH_OFFSET], src[LENGTH_OFFSET + 1]]) as usize;
        if len < HEADER_LEN {
            return Err(ProtocolError::InvalidHeader);
        }
        if len > self.max_frame {
            return Err(ProtocolError::OversizedPacket(len));
        }

        if src.len() < len {
            src.reserve(len - src.len());
            return Ok(None);
        }

        Ok(Some(src.split_to(len)))
    }
}

impl Encoder<Bytes> for WorldCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        if item.len() > MAX_WIRE_FRAME {
            return Err(ProtocolError::OversizedPacket(item.len()));
        }
        dst.extend_from_slice(item.chunk());
        Ok(())
    }
}
