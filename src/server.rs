//! TCP transport for the world server.
//!
//! One task per connection reads frames in arrival order and awaits
//! [`World::dispatch`] for each, so a session's messages never overlap. A
//! second task per connection drains the session's outbound queue into the
//! socket. Sessions share nothing but the [`World`].

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_util::codec::Framed;
use tracing::{debug, error, info, instrument, warn};

use crate::config::ServerConfig;
use crate::core::codec::WorldCodec;
use crate::core::packet::{RawPacket, OBFUSCATION_START};
use crate::error::{constants, ProtocolError, Result};
use crate::session::{Outbound, Session};
use crate::utils::timeout::{self, with_timeout};
use crate::world::World;

/// Bind `config.address` and serve until ctrl-c
#[instrument(skip(world, config), fields(address = %config.address))]
pub async fn start_server(world: Arc<World>, config: ServerConfig) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            info!("Received CTRL+C signal, shutting down");
            let _ = shutdown_tx.send(()).await;
        }
    });

    start_server_with_shutdown(world, config, shutdown_rx).await
}

/// Bind `config.address` and serve until `shutdown_rx` fires
pub async fn start_server_with_shutdown(
    world: Arc<World>,
    config: ServerConfig,
    shutdown_rx: mpsc::Receiver<()>,
) -> Result<()> {
    let listener = TcpListener::bind(&config.address).await?;
    serve(listener, world, config, shutdown_rx).await
}

/// Serve on an already bound listener
pub async fn serve(
    listener: TcpListener,
    world: Arc<World>,
    config: ServerConfig,
    mut shutdown_rx: mpsc::Receiver<()>,
) -> Result<()> {
    let local = listener.local_addr()?;
    info!(address = %local, "World server listening");

    let config = Arc::new(config);
    let active_connections = Arc::new(Mutex::new(0usize));

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Shutting down server. Waiting for connections to close...");

                let deadline = tokio::time::sleep(config.shutdown_timeout);
                tokio::pin!(deadline);

                loop {
                    tokio::select! {
                        _ = &mut deadline => {
                            warn!("Shutdown timeout reached, forcing exit");
                            break;
                        }
                        _ = tokio::time::sleep(timeout::DRAIN_POLL_INTERVAL) => {
                            let connections = *active_connections.lock().await;
                            info!(connections, "Waiting for connections to close");
                            if connections == 0 {
                                info!("All connections closed, shutting down");
                                break;
                            }
                        }
                    }
                }

                world.metrics().log_summary();
                return Ok(());
            }

            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer)) => {
                        {
                            let mut count = active_connections.lock().await;
                            if *count >= config.max_connections {
                                warn!(%peer, limit = config.max_connections, "Connection limit reached, refusing");
                                continue;
                            }
                            *count += 1;
                        }

                        let world = Arc::clone(&world);
                        let config = Arc::clone(&config);
                        let active_connections = Arc::clone(&active_connections);
                        tokio::spawn(async move {
                            handle_connection(stream, peer, world, config).await;

                            let mut count = active_connections.lock().await;
                            *count -= 1;
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Error accepting connection");
                    }
                }
            }
        }
    }
}

#[instrument(skip(stream, peer, world, config), fields(peer = %peer))]
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    world: Arc<World>,
    config: Arc<ServerConfig>,
) {
    let metrics = Arc::clone(world.metrics());
    metrics.connection_established();
    debug!("Connection opened");

    let framed = Framed::new(stream, WorldCodec::new(config.max_frame_size));
    let (mut sink, mut frames) = framed.split();

    let (outbound, mut rx) = Outbound::channel(config.backpressure_limit);
    let mut session = Session::new(peer, outbound);

    let writer_metrics = Arc::clone(&metrics);
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let len = frame.len() as u64;
            match sink.send(frame).await {
                Ok(()) => writer_metrics.frame_sent(len),
                Err(ProtocolError::OversizedPacket(size)) => {
                    warn!(size, "Outbound frame too large, dropped");
                }
                Err(e) => {
                    debug!(error = %e, "Write failed, stopping writer");
                    break;
                }
            }
        }
    });

    loop {
        match with_timeout(frames.next(), config.connection_timeout).await {
            Ok(Some(Ok(mut frame))) => {
                if let Err(e) = world.obfuscator().apply(&mut frame, OBFUSCATION_START) {
                    debug!(error = %e, "Could not reverse transform, frame dropped");
                    continue;
                }
                match RawPacket::from_frame(Bytes::from(frame)) {
                    Ok(packet) => world.dispatch(&mut session, &packet).await,
                    Err(e) => debug!(error = %e, "Frame dropped"),
                }
            }
            Ok(Some(Err(e))) => {
                warn!(error = %e, "Framing error, closing connection");
                break;
            }
            Ok(None) => {
                debug!("{}", constants::ERR_CONNECTION_CLOSED);
                break;
            }
            Err(ProtocolError::ConnectionTimeout) => {
                info!(idle = ?config.connection_timeout, "{}", constants::ERR_CONNECTION_TIMEOUT);
                break;
            }
            Err(e) => {
                warn!(error = %e, "Read failed, closing connection");
                break;
            }
        }
    }

    if let Err(e) = world.disconnect(&mut session).await {
        warn!(error = %e, "Teardown incomplete");
    }
    drop(session);
    let _ = writer.await;

    metrics.connection_closed();
    debug!("Connection closed");
}
