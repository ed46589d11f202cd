//! # Utility Modules
//!
//! Supporting pieces shared by the transport and the dispatcher.
//!
//! ## Components
//! - **Obfuscation**: keyed, reversible byte transform applied on the wire
//! - **Logging**: `tracing-subscriber` setup from [`LoggingConfig`](crate::config::LoggingConfig)
//! - **Metrics**: atomic dispatch counters
//! - **Timeout**: timeout constants and async wrappers

pub mod logging;
pub mod metrics;
pub mod obfuscation;
pub mod timeout;

pub use obfuscation::{IdentityObfuscator, Obfuscator, XorObfuscator};
