//! Server network layer handling WebSocket connections and the dispatcher loop

use crate::client_manager::{ClientManager, OUTBOX_CAPACITY};
use crate::config::GameConfig;
use crate::error::ServerError;
use crate::registry::RoomRegistry;
use crate::scheduler::BroadcastScheduler;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{ClientEvent, ClientId, RoomMode, ServerEvent};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{accept_async, tungstenite::Message};

pub const SERVER_FULL_MESSAGE: &str = "Server is full";

/// Messages sent from connection tasks to the dispatcher loop
#[derive(Debug)]
pub enum ServerMessage {
    ClientConnected {
        addr: SocketAddr,
        outbox: mpsc::Sender<ServerEvent>,
        reply: oneshot::Sender<Option<ClientId>>,
    },
    EventReceived {
        client_id: ClientId,
        event: ClientEvent,
    },
    ClientDisconnected {
        client_id: ClientId,
    },
}

/// Main server coordinating connections, rooms and the broadcast clock
///
/// Connection tasks only translate frames; every decision is made by the
/// single dispatcher loop in [`Server::run`], which owns the client manager
/// and the room registry. Room state itself lives in per-room actors.
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    config: Arc<GameConfig>,
    clients: ClientManager,
    registry: RoomRegistry,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn new(addr: &str, config: GameConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let config = Arc::new(config);
        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            clients: ClientManager::new(config.max_clients),
            registry: RoomRegistry::new(Arc::clone(&config)),
            config,
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Spawns task that accepts TCP connections and hands each to its own task
    fn spawn_acceptor(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let server_tx = server_tx.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, addr, server_tx).await {
                                warn!("Connection from {} failed: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Processes one message from a connection task
    async fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::ClientConnected {
                addr,
                outbox,
                reply,
            } => {
                let client_id = self.clients.add_client(addr, outbox);
                if client_id.is_none() {
                    warn!(
                        "Rejecting {}: server full ({} clients)",
                        addr,
                        self.clients.max_clients()
                    );
                }
                let _ = reply.send(client_id);
            }

            ServerMessage::EventReceived { client_id, event } => {
                self.handle_event(client_id, event).await;
            }

            ServerMessage::ClientDisconnected { client_id } => {
                if let Some(client) = self.clients.remove_client(&client_id) {
                    if let Some(room_id) = client.room {
                        self.registry.leave(room_id, client_id).await;
                    }
                }
            }
        }
    }

    async fn handle_event(&mut self, client_id: ClientId, event: ClientEvent) {
        match event {
            ClientEvent::JoinRoom(name) => {
                let Some(mode) = RoomMode::from_name(&name) else {
                    debug!("Client {} asked for unknown room class {:?}", client_id, name);
                    return;
                };

                if let Some(room_id) = self.clients.room_of(client_id) {
                    debug!("Client {} is already in {}", client_id, room_id);
                    return;
                }

                let Some(handle) = self.clients.handle(client_id) else {
                    return;
                };

                info!("Player {} joining {}", client_id, mode);
                match self.registry.join_room(handle, mode).await {
                    Ok(room_id) => {
                        self.clients.assign_room(client_id, room_id);
                    }
                    Err(e) => error!("Failed to place client {}: {}", client_id, e),
                }
            }

            ClientEvent::PlayerMovement(state) => match self.clients.room_of(client_id) {
                Some(room_id) => self.registry.report_movement(room_id, client_id, state),
                None => debug!("Ignoring movement from client {} outside a room", client_id),
            },
        }
    }

    /// Main server loop: dispatches client messages and drives the broadcast clock
    pub async fn run(&mut self) -> Result<(), ServerError> {
        self.spawn_acceptor();

        let mut scheduler = BroadcastScheduler::new(&self.config);
        info!(
            "Server started successfully ({} Hz, max {} clients)",
            self.config.tick_rate, self.config.max_clients
        );

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    let Some(message) = message else { break };
                    self.handle_message(message).await;
                },

                dt = scheduler.tick() => {
                    self.registry.tick_all(dt);

                    if scheduler.is_report_tick() && !self.clients.is_empty() {
                        debug!(
                            "Tick {}: {} clients, {} rooms",
                            scheduler.tick_count(),
                            self.clients.len(),
                            self.registry.room_count()
                        );
                    }
                },
            }
        }

        info!("Server shutting down");
        Ok(())
    }
}

/// Bridges one WebSocket connection to the dispatcher loop
///
/// Inbound text frames are parsed as [`ClientEvent`]s; events queued on the
/// client's outbox are written back as JSON text frames. The connection ends
/// when the socket closes or errors, which is reported as a disconnect.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) -> Result<(), ServerError> {
    let ws_stream = accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let (outbox, mut outbox_rx) = mpsc::channel::<ServerEvent>(OUTBOX_CAPACITY);
    let (reply, response) = oneshot::channel();
    server_tx
        .send(ServerMessage::ClientConnected {
            addr,
            outbox,
            reply,
        })
        .map_err(|_| ServerError::Shutdown)?;

    let client_id = match response.await.map_err(|_| ServerError::Shutdown)? {
        Some(client_id) => client_id,
        None => {
            let full = ServerEvent::ServerFull(SERVER_FULL_MESSAGE.to_string());
            ws_sender
                .send(Message::Text(serde_json::to_string(&full)?))
                .await?;
            ws_sender.close().await?;
            return Ok(());
        }
    };

    let writer = tokio::spawn(async move {
        while let Some(event) = outbox_rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to encode event for client {}: {}", client_id, e);
                    continue;
                }
            };
            if let Err(e) = ws_sender.send(Message::Text(text)).await {
                debug!("Failed to send to client {}: {}", client_id, e);
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    while let Some(frame) = ws_receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => {
                    if server_tx
                        .send(ServerMessage::EventReceived { client_id, event })
                        .is_err()
                    {
                        break;
                    }
                }
                Err(e) => warn!("Malformed event from client {}: {}", client_id, e),
            },
            Ok(Message::Binary(_)) => {
                warn!("Unexpected binary frame from client {}", client_id);
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("Connection error from client {}: {}", client_id, e);
                break;
            }
        }
    }

    writer.abort();
    let _ = server_tx.send(ServerMessage::ClientDisconnected { client_id });
    Ok(())
}
