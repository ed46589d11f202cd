//! Raw inbound frames and the verbatim relay primitive.
//!
//! ```text
//! [Magic(2)] [Length(2, LE)] [Seq(1)] [Opcode(2): category, sub-type] [Payload(N)]
//! ```
//!
//! A [`RawPacket`] keeps the whole de-obfuscated frame. Handlers decode the
//! payload through [`RawPacket::reader`], and movement handlers forward a copy
//! of the original bytes with [`RawPacket::relay`] instead of re-encoding.

use bytes::{Bytes, BytesMut};

use crate::core::cursor::PacketReader;
use crate::error::{ProtocolError, Result};
use crate::utils::obfuscation::Obfuscator;

/// Frame magic bytes
pub const FRAME_MAGIC: [u8; 2] = [0x02, 0x00];

/// Offset of the little-endian u16 frame length
pub const LENGTH_OFFSET: usize = 2;

/// Offset of the sequence byte
pub const SEQUENCE_OFFSET: usize = 4;

/// Offset of the opcode category byte
pub const OPCODE_OFFSET: usize = 5;

/// Offset of the opcode sub-type byte patched by the movement relay
pub const SUBTYPE_OFFSET: usize = 6;

/// Everything from this offset on is covered by the obfuscation transform
pub const OBFUSCATION_START: usize = 5;

/// Magic + length + sequence + opcode
pub const HEADER_LEN: usize = 7;

/// Largest frame the u16 length field can describe
pub const MAX_WIRE_FRAME: usize = u16::MAX as usize;

/// An inbound message: opcode plus the complete frame it arrived in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    opcode: u16,
    frame: Bytes,
}

impl RawPacket {
    /// Parse a de-obfuscated frame
    ///
    /// Only the header is validated; payload layout is owned by the handler.
    pub fn from_frame(frame: Bytes) -> Result<Self> {
        if frame.len() < HEADER_LEN || frame[..2] != FRAME_MAGIC {
            return Err(ProtocolError::InvalidHeader);
        }
        let opcode = u16::from_be_bytes([frame[OPCODE_OFFSET], frame[SUBTYPE_OFFSET]]);
        Ok(Self { opcode, frame })
    }

    /// Build a frame around a payload (length patched, sequence zero)
    ///
    /// The frame must fit [`MAX_WIRE_FRAME`].
    pub fn build(opcode: u16, payload: &[u8]) -> Self {
        debug_assert!(HEADER_LEN + payload.len() <= MAX_WIRE_FRAME);
        let mut frame = BytesMut::with_capacity(HEADER_LEN + payload.len());
        frame.extend_from_slice(&FRAME_MAGIC);
        frame.extend_from_slice(&((HEADER_LEN + payload.len()) as u16).to_le_bytes());
        frame.extend_from_slice(&[0]);
        frame.extend_from_slice(&opcode.to_be_bytes());
        frame.extend_from_slice(payload);
        Self {
            opcode,
            frame: frame.freeze(),
        }
    }

    pub fn opcode(&self) -> u16 {
        self.opcode
    }

    /// The complete frame, header included
    pub fn frame(&self) -> &[u8] {
        &self.frame
    }

    pub fn payload(&self) -> &[u8] {
        &self.frame[HEADER_LEN..]
    }

    pub fn len(&self) -> usize {
        self.frame.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload().is_empty()
    }

    /// Cursor positioned at the first payload byte
    pub fn reader(&self) -> PacketReader<'_> {
        PacketReader::new(self.payload())
    }

    /// Copy the original frame, overwrite one byte, and obfuscate the copy
    ///
    /// The received frame itself is left untouched. Peers get the sender's
    /// bytes with only `offset` changed, never a re-encoded message.
    pub fn relay(&self, offset: usize, marker: u8, obfuscator: &dyn Obfuscator) -> Result<Bytes> {
        if offset >= self.frame.len() {
            return Err(ProtocolError::ShortPacket {
                needed: offset + 1,
                remaining: self.frame.len(),
            });
        }
        let mut copy = BytesMut::from(&self.frame[..]);
        copy[offset] = marker;
        obfuscator.apply(&mut copy, OBFUSCATION_START)?;
        Ok(copy.freeze())
    }
}
