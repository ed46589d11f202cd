//! Logout and server transfer.
//!
//! The client asks to leave either for character select on the game cluster
//! or for the authentication server. Either way it gets a fresh single-use
//! access key bound to its account and address, then a redirect. The
//! connection itself is closed by the client.

use tracing::{info, trace};

use crate::core::packet::RawPacket;
use crate::error::{constants, ProtocolError, Result};
use crate::session::Session;
use crate::world::World;

pub async fn request_logout(
    world: &World,
    session: &mut Session,
    packet: &RawPacket,
) -> Result<()> {
    let mut reader = packet.reader();
    let character_id = reader.read_i32()?;
    reader.skip(4)?;
    let to_character_server = reader.read_bool()?;

    let Some(account_id) = session.account_id() else {
        return Ok(());
    };
    trace!(account_id, character_id, to_character_server, "Logout requested");

    world
        .access_keys()
        .issue(account_id, session.peer().ip())
        .await
        .map_err(|e| {
            ProtocolError::Credential(format!("{}: {e}", constants::ERR_ACCESS_KEY_ISSUE))
        })?;

    let endpoint = if to_character_server {
        world.game_endpoint()
    } else {
        world.auth_endpoint()
    };
    session
        .send(world.encoder().login_server_redirect(account_id, endpoint)?)
        .await?;

    info!(
        session_id = session.id(),
        account_id,
        host = %endpoint.host,
        port = endpoint.port,
        "Redirected for server transfer"
    );
    Ok(())
}
