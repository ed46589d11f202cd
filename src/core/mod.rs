//! # Core Wire Components
//!
//! Low-level frame handling for the world protocol.
//!
//! ## Components
//! - **Cursor**: typed sequential reader/writer over a packet buffer
//! - **Packet**: raw inbound frame plus the verbatim relay primitive
//! - **Codec**: Tokio codec for framing over TCP byte streams
//!
//! ## Wire Format
//! ```text
//! [Magic(2)] [Length(2)] [Seq(1)] [Opcode(2)] [Payload(N)]
//! ```
//!
//! Bytes from offset 5 onward are covered by the obfuscation transform.

pub mod codec;
pub mod cursor;
pub mod packet;
