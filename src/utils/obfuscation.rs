//! Reversible byte transform applied to frames on the wire.
//!
//! The protocol core treats the transform as opaque: it only needs
//! `apply(buf, start)` to keep the length and be its own inverse, so the same
//! call both hides outbound frames and restores inbound ones.

use crate::error::{ProtocolError, Result};

/// Default key table shared with the client
const DEFAULT_KEY: [u8; 16] = [
    0x4A, 0x91, 0x2C, 0xE7, 0x5B, 0x18, 0xD3, 0x66, 0xAF, 0x0D, 0x72, 0xB9, 0x34, 0xC1, 0x8E, 0x57,
];

/// Keyed, length-preserving, self-inverse byte transform
pub trait Obfuscator: Send + Sync {
    /// Transform `buf[start..]` in place
    fn apply(&self, buf: &mut [u8], start: usize) -> Result<()>;
}

/// Rotating XOR over a key table
#[derive(Debug, Clone)]
pub struct XorObfuscator {
    key: Vec<u8>,
}

impl XorObfuscator {
    pub fn new(key: Vec<u8>) -> Result<Self> {
        if key.is_empty() {
            return Err(ProtocolError::ConfigError(
                "Obfuscation key cannot be empty".to_string(),
            ));
        }
        Ok(Self { key })
    }
}

impl Default for XorObfuscator {
    fn default() -> Self {
        Self {
            key: DEFAULT_KEY.to_vec(),
        }
    }
}

impl Obfuscator for XorObfuscator {
    fn apply(&self, buf: &mut [u8], start: usize) -> Result<()> {
        if start > buf.len() {
            return Err(ProtocolError::Transform(format!(
                "start offset {start} beyond buffer of {} bytes",
                buf.len()
            )));
        }
        for (i, byte) in buf[start..].iter_mut().enumerate() {
            *byte ^= self.key[i % self.key.len()];
        }
        Ok(())
    }
}

/// Pass-through transform for plaintext deployments and tests
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityObfuscator;

impl Obfuscator for IdentityObfuscator {
    fn apply(&self, buf: &mut [u8], start: usize) -> Result<()> {
        if start > buf.len() {
            return Err(ProtocolError::Transform(format!(
                "start offset {start} beyond buffer of {} bytes",
                buf.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xor_is_self_inverse() {
        let obfuscator = XorObfuscator::default();
        let original: Vec<u8> = (0..64u8).collect();
        let mut buf = original.clone();

        obfuscator.apply(&mut buf, 5).unwrap();
        assert_eq!(&buf[..5], &original[..5]);
        assert_ne!(&buf[5..], &original[5..]);

        obfuscator.apply(&mut buf, 5).unwrap();
        assert_eq!(buf, original);
    }

    #[test]
    fn start_beyond_buffer_is_an_error() {
        let mut buf = [0u8; 3];
        assert!(XorObfuscator::default().apply(&mut buf, 4).is_err());
        assert!(XorObfuscator::default().apply(&mut buf, 3).is_ok());
    }

    #[test]
    fn empty_key_rejected() {
        assert!(XorObfuscator::new(Vec::new()).is_err());
    }
}
