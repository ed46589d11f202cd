//! # World Protocol
//!
//! Server-side protocol core of a multiplayer world server: the session gate,
//! per-opcode payload decoding, the movement relay and the logout handoff to
//! another server process.
//!
//! ## Layout
//! - [`core`]: frame layout, binary cursor, TCP framing codec
//! - [`protocol`]: opcode table, gate, dispatcher, handlers, response encoder
//! - [`world`]: maps, character registry, access keys, collaborator traits
//! - [`session`]: per-connection state and outbound queue
//! - [`server`]: TCP accept loop and per-connection workers
//! - [`config`], [`error`], [`utils`]: configuration, errors, logging and metrics
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use world_protocol::config::WorldConfig;
//! use world_protocol::world::services::{CharacterStore, ChatService, ItemService};
//! use world_protocol::world::World;
//!
//! async fn run(
//!     store: Arc<dyn CharacterStore>,
//!     items: Arc<dyn ItemService>,
//!     chat: Arc<dyn ChatService>,
//! ) -> world_protocol::error::Result<()> {
//!     let config = WorldConfig::from_file("world.toml")?;
//!     world_protocol::utils::logging::init_logging(&config.logging)?;
//!
//!     let world = World::builder(&config)
//!         .store(store)
//!         .items(items)
//!         .chat(chat)
//!         .build()
//!         .await?;
//!     world_protocol::server::start_server(Arc::new(world), config.server).await
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod server;
pub mod session;
pub mod utils;
pub mod world;

pub use error::{ProtocolError, Result};
pub use session::Session;
pub use world::World;
