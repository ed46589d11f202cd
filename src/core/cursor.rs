//! # Binary Cursor
//!
//! Sequential typed access to a fixed-size packet buffer.
//!
//! [`PacketReader`] walks a payload front to back. Every read advances the
//! cursor; there is no backtracking beyond [`PacketReader::seek`]. Handlers
//! never check remaining length themselves: a read past the end returns
//! [`ProtocolError::ShortPacket`], which propagates with `?` and is caught once
//! per message by the dispatcher.
//!
//! [`PacketWriter`] is the mirror image used by the response encoder. It
//! reserves the frame header up front and patches the length on `finish`.
//!
//! All multi-byte values are little-endian. `string16` is a u16 byte count
//! followed by UTF-16LE text.

use bytes::{BufMut, Bytes, BytesMut};

use crate::core::packet::{FRAME_MAGIC, HEADER_LEN, LENGTH_OFFSET, OBFUSCATION_START};
use crate::error::{ProtocolError, Result};
use crate::utils::obfuscation::Obfuscator;

/// Forward-only reader over a payload slice
#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current read offset
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left after the cursor
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    /// Move the cursor to an absolute offset
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.buf.len() {
            return Err(ProtocolError::ShortPacket {
                needed: pos,
                remaining: self.buf.len(),
            });
        }
        self.pos = pos;
        Ok(())
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.take_slice(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn take_slice(&mut self, len: usize) -> Result<&'a [u8]> {
        let remaining = self.remaining();
        if len > remaining {
            return Err(ProtocolError::ShortPacket {
                needed: len,
                remaining,
            });
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(i8::from_le_bytes(self.take::<1>()?))
    }

    /// One byte, `1` meaning true
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_i8()? == 1)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_le_bytes(self.take::<2>()?))
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take::<2>()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.take::<4>()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.take::<4>()?))
    }

    /// Read a field that is part of the layout but unused by any handler
    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.take_slice(len).map(|_| ())
    }

    /// Length-prefixed UTF-16LE string
    pub fn read_string16(&mut self) -> Result<String> {
        let len = self.read_u16()? as usize;
        let raw = self.take_slice(len)?;
        if raw.len() % 2 != 0 {
            return Err(ProtocolError::InvalidString);
        }
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16(&units).map_err(|_| ProtocolError::InvalidString)
    }
}

/// Builder for outbound frames
///
/// The header (magic, length, sequence, opcode) is written on construction and
/// the length is patched by [`PacketWriter::finish`].
#[derive(Debug)]
pub struct PacketWriter {
    buf: BytesMut,
    /// Set when a length prefix could not hold its count
    overflow: bool,
}

impl PacketWriter {
    pub fn new(opcode: u16) -> Self {
        let mut buf = BytesMut::with_capacity(64);
        buf.put_slice(&FRAME_MAGIC);
        buf.put_u16_le(0);
        buf.put_u8(0);
        buf.put_slice(&opcode.to_be_bytes());
        Self {
            buf,
            overflow: false,
        }
    }

    pub fn put_i8(&mut self, value: i8) -> &mut Self {
        self.buf.put_i8(value);
        self
    }

    pub fn put_bool(&mut self, value: bool) -> &mut Self {
        self.buf.put_u8(u8::from(value));
        self
    }

    pub fn put_i16(&mut self, value: i16) -> &mut Self {
        self.buf.put_i16_le(value);
        self
    }

    pub fn put_u16(&mut self, value: u16) -> &mut Self {
        self.buf.put_u16_le(value);
        self
    }

    pub fn put_i32(&mut self, value: i32) -> &mut Self {
        self.buf.put_i32_le(value);
        self
    }

    pub fn put_i64(&mut self, value: i64) -> &mut Self {
        self.buf.put_i64_le(value);
        self
    }

    pub fn put_f32(&mut self, value: f32) -> &mut Self {
        self.buf.put_f32_le(value);
        self
    }

    pub fn put_bytes(&mut self, value: &[u8]) -> &mut Self {
        self.buf.put_slice(value);
        self
    }

    /// u16 count prefix; a count that does not fit fails the frame at `finish`
    pub fn put_len16(&mut self, len: usize) -> &mut Self {
        match u16::try_from(len) {
            Ok(len) => self.buf.put_u16_le(len),
            Err(_) => {
                self.overflow = true;
                self.buf.put_u16_le(u16::MAX);
            }
        }
        self
    }

    /// Length-prefixed UTF-16LE string; the prefix counts bytes
    pub fn put_string16(&mut self, value: &str) -> &mut Self {
        let units: Vec<u16> = value.encode_utf16().collect();
        self.put_len16(units.len() * 2);
        for unit in units {
            self.buf.put_u16_le(unit);
        }
        self
    }

    /// Bytes written so far, header included
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.len() <= HEADER_LEN
    }

    /// Patch the length field, obfuscate, and freeze into a wire-ready frame
    ///
    /// Fails with [`ProtocolError::OversizedPacket`] when the frame or any
    /// count prefix written into it exceeds a u16.
    pub fn finish(mut self, obfuscator: &dyn Obfuscator) -> Result<Bytes> {
        let size = self.buf.len();
        let len = match u16::try_from(size) {
            Ok(len) if !self.overflow => len,
            _ => return Err(ProtocolError::OversizedPacket(size)),
        };
        self.buf[LENGTH_OFFSET..LENGTH_OFFSET + 2].copy_from_slice(&len.to_le_bytes());
        obfuscator.apply(&mut self.buf, OBFUSCATION_START)?;
        Ok(self.buf.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::obfuscation::IdentityObfuscator;

    #[test]
    fn reads_fields_in_layout_order() {
        let mut payload = Vec::new();
        payload.push(0x03);
        payload.extend_from_slice(&1234i32.to_le_bytes());
        payload.extend_from_slice(&(-7i16).to_le_bytes());
        payload.extend_from_slice(&1.5f32.to_le_bytes());

        let mut reader = PacketReader::new(&payload);
        assert_eq!(reader.read_i8().unwrap(), 3);
        assert_eq!(reader.read_i32().unwrap(), 1234);
        assert_eq!(reader.read_i16().unwrap(), -7);
        assert_eq!(reader.read_f32().unwrap(), 1.5);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn short_read_reports_shortfall() {
        let mut reader = PacketReader::new(&[1, 2, 3]);
        match reader.read_i32() {
            Err(ProtocolError::ShortPacket { needed, remaining }) => {
                assert_eq!(needed, 4);
                assert_eq!(remaining, 3);
            }
            other => panic!("unexpected: {other:?}"),
        }
        // failed read does not advance
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn string16_decodes_utf16le() {
        let text = "hi there";
        let units: Vec<u8> = text.encode_utf16().flat_map(u16::to_le_bytes).collect();
        let mut payload = (units.len() as u16).to_le_bytes().to_vec();
        payload.extend_from_slice(&units);

        let mut reader = PacketReader::new(&payload);
        assert_eq!(reader.read_string16().unwrap(), text);
    }

    #[test]
    fn string16_rejects_odd_length() {
        let payload = [3u8, 0, b'a', 0, b'b'];
        let mut reader = PacketReader::new(&payload);
        assert!(matches!(
            reader.read_string16(),
            Err(ProtocolError::InvalidString)
        ));
    }

    #[test]
    fn seek_past_end_fails() {
        let mut reader = PacketReader::new(&[0; 4]);
        assert!(reader.seek(4).is_ok());
        assert!(reader.seek(5).is_err());
    }

    #[test]
    fn writer_patches_length() {
        let mut writer = PacketWriter::new(0x0204);
        writer.put_i32(99).put_string16("ok");
        let frame = writer.finish(&IdentityObfuscator).unwrap();

        assert_eq!(&frame[..2], &FRAME_MAGIC);
        assert_eq!(u16::from_le_bytes([frame[2], frame[3]]) as usize, frame.len());
        assert_eq!(&frame[5..7], &[0x02, 0x04]);

        let mut reader = PacketReader::new(&frame[HEADER_LEN..]);
        assert_eq!(reader.read_i32().unwrap(), 99);
        assert_eq!(reader.read_string16().unwrap(), "ok");
    }

    #[test]
    fn writer_rejects_frame_past_length_field() {
        let mut writer = PacketWriter::new(0x0306);
        writer.put_bytes(&vec![0u8; u16::MAX as usize]);
        assert!(matches!(
            writer.finish(&IdentityObfuscator),
            Err(ProtocolError::OversizedPacket(_))
        ));

        let mut writer = PacketWriter::new(0x0306);
        writer.put_string16(&"a".repeat(40_000));
        assert!(writer.finish(&IdentityObfuscator).is_err());
    }

    #[test]
    fn count_prefix_overflow_fails_small_frame() {
        let mut writer = PacketWriter::new(0x0404);
        writer.put_len16(70_000);
        assert_eq!(writer.len(), HEADER_LEN + 2);
        assert!(matches!(
            writer.finish(&IdentityObfuscator),
            Err(ProtocolError::OversizedPacket(_))
        ));

        let mut writer = PacketWriter::new(0x0404);
        writer.put_len16(u16::MAX as usize);
        let frame = writer.finish(&IdentityObfuscator).unwrap();
        assert_eq!(&frame[HEADER_LEN..], &[0xFF, 0xFF]);
    }
}
