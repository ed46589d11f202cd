use std::collections::HashMap;
use std::sync::OnceLock;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, info, trace, warn};

use crate::core::packet::RawPacket;
use crate::error::{ProtocolError, Result};
use crate::protocol::gate::Requirement;
use crate::protocol::handlers::{connect, info, inventory, logout, movement, social};
use crate::protocol::opcodes::Opcode;
use crate::session::Session;
use crate::world::World;

pub type Handler =
    for<'a> fn(&'a World, &'a mut Session, &'a RawPacket) -> BoxFuture<'a, Result<()>>;

/// Wrap an `async fn(&World, &mut Session, &RawPacket) -> Result<()>` as a [`Handler`]
macro_rules! handler {
    ($f:path) => {{
        fn call<'a>(
            world: &'a World,
            session: &'a mut Session,
            packet: &'a RawPacket,
        ) -> BoxFuture<'a, Result<()>> {
            $f(world, session, packet).boxed()
        }
        call as Handler
    }};
}

#[derive(Clone, Copy)]
pub struct Route {
    pub requirement: Requirement,
    pub handler: Handler,
}

/// Opcode routing table, built once and never mutated while serving
pub struct Dispatcher {
    routes: HashMap<u16, Route>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Fails if the opcode is already routed
    pub fn register(
        &mut self,
        opcode: Opcode,
        requirement: Requirement,
        handler: Handler,
    ) -> Result<()> {
        if self.routes.contains_key(&opcode.as_u16()) {
            return Err(ProtocolError::Custom(format!(
                "Opcode {opcode:?} registered twice"
            )));
        }
        self.routes.insert(
            opcode.as_u16(),
            Route {
                requirement,
                handler,
            },
        );
        Ok(())
    }

    pub fn route(&self, opcode: u16) -> Option<&Route> {
        self.routes.get(&opcode)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// The world server's full table
    pub fn standard() -> &'static Dispatcher {
        static STANDARD: OnceLock<Dispatcher> = OnceLock::new();
        STANDARD.get_or_init(build_standard)
    }

    /// Gate, decode and act on one message
    ///
    /// Never fails: every error stops this message only and is logged here.
    pub async fn dispatch(&self, world: &World, session: &mut Session, packet: &RawPacket) {
        let metrics = world.metrics();
        metrics.message_received(packet.len() as u64);
        let opcode = packet.opcode();

        let Some(route) = self.route(opcode) else {
            // Before the handshake only Connect passes, so anything unrouted is a gate drop.
            if !session.is_authenticated() {
                metrics.gate_drop();
                trace!(
                    session_id = session.id(),
                    opcode = format_args!("{opcode:#06x}"),
                    "Unrouted opcode before handshake"
                );
                return;
            }
            metrics.unknown_opcode();
            if world.settings().log_packets {
                info!(opcode = format_args!("{opcode:#06x}"), len = packet.len(), "Unknown opcode");
            } else {
                trace!(opcode = format_args!("{opcode:#06x}"), len = packet.len(), "Unknown opcode");
            }
            return;
        };

        let state = session.state();
        if !route.requirement.admits(state) {
            metrics.gate_drop();
            trace!(
                session_id = session.id(),
                opcode = format_args!("{opcode:#06x}"),
                ?state,
                "Dropped by session gate"
            );
            return;
        }

        if world.settings().log_packets {
            debug!(session_id = session.id(), opcode = format_args!("{opcode:#06x}"), len = packet.len(), "Dispatching");
        }

        match (route.handler)(world, session, packet).await {
            Ok(()) => metrics.message_handled(),
            Err(e) if e.is_decode_failure() => {
                metrics.decode_failure();
                debug!(
                    session_id = session.id(),
                    opcode = format_args!("{opcode:#06x}"),
                    error = %e,
                    "Malformed payload dropped"
                );
            }
            Err(e) => {
                metrics.handler_failure();
                warn!(
                    session_id = session.id(),
                    opcode = format_args!("{opcode:#06x}"),
                    error = %e,
                    "Handler failed"
                );
            }
        }
    }
}

/// Dispatch through [`Dispatcher::standard`]
pub async fn dispatch(world: &World, session: &mut Session, packet: &RawPacket) {
    Dispatcher::standard().dispatch(world, session, packet).await;
}

fn standard_routes() -> Vec<(Opcode, Requirement, Handler)> {
    use Requirement::{Authenticated, InMap, Unauthenticated};

    vec![
        (Opcode::ConnectWorldServer, Unauthenticated, handler!(connect::connect)),
        (Opcode::KeepAlive, Authenticated, handler!(connect::keep_alive)),
        (Opcode::RequestLogout, InMap, handler!(logout::request_logout)),
        (Opcode::CharacterInfoRequest, InMap, handler!(info::character_info)),
        (Opcode::UpdateSpecialOptionList, InMap, handler!(info::special_options)),
        (Opcode::PlayersRequest, InMap, handler!(info::players)),
        (Opcode::ChannelInfo, InMap, handler!(info::channel_info)),
        (Opcode::MovementMove, InMap, handler!(movement::move_to)),
        (Opcode::MovementStop, InMap, handler!(movement::stop)),
        (Opcode::MovementJump, InMap, handler!(movement::jump)),
        (Opcode::CancelGesture, InMap, handler!(social::cancel_gesture)),
        (Opcode::DoGesture, InMap, handler!(social::do_gesture)),
        (Opcode::GestureSlotUpdate, InMap, handler!(social::update_gesture_slots)),
        (Opcode::ChatNormal, InMap, handler!(social::normal_chat)),
        (Opcode::ItemInventoryInfo, InMap, handler!(inventory::snapshot)),
        (Opcode::ItemMove, InMap, handler!(inventory::move_item)),
        (Opcode::ItemCombine, InMap, handler!(inventory::combine)),
        (Opcode::ItemDivide, InMap, handler!(inventory::divide)),
        (Opcode::ItemBreak, InMap, handler!(inventory::break_item)),
        (Opcode::ItemUse, InMap, handler!(inventory::use_item)),
        (Opcode::ItemUpgrade, InMap, handler!(inventory::upgrade)),
        (Opcode::ItemUpdateSlotInfo, InMap, handler!(inventory::increase_slots)),
    ]
}

fn build_standard() -> Dispatcher {
    let mut dispatcher = Dispatcher::new();
    for (opcode, requirement, handler) in standard_routes() {
        if let Err(e) = dispatcher.register(opcode, requirement, handler) {
            warn!(error = %e, "Skipped duplicate route");
        }
    }
    dispatcher
}
