//! # Protocol Dispatch
//!
//! Turns one inbound frame into its effects: the session gate, the opcode
//! table, the per-opcode handlers and the response encoder they share.
//!
//! ```text
//! transport ─► World::dispatch ─► gate ─► handler ─► Session / GameMap sends
//! ```

pub mod dispatcher;
pub mod encoder;
pub mod gate;
pub mod handlers;
pub mod opcodes;


pub use dispatcher::{dispatch, Dispatcher};
pub use gate::{Requirement, SessionState};
pub use opcodes::Opcode;
