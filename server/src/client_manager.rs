//! Connected client bookkeeping for the game server
//!
//! This module tracks every live WebSocket connection:
//! - Client id assignment and the global connection cap
//! - The outbound event queue used to push events to the client
//! - Which room, if any, the client has been placed in
//!
//! The manager is owned by the dispatcher loop, so it needs no locking.

use crate::room::RoomId;
use log::{debug, info};
use shared::{ClientId, ServerEvent};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Events buffered per client before new ones are dropped
///
/// Every tick carries the full terrain, so a dropped update is replaced by the next one.
pub const OUTBOX_CAPACITY: usize = 64;

/// Cheap, clonable sending half of a client's outbound queue
///
/// Rooms keep one per member. Sends never wait: an event for a client whose
/// queue is full or whose connection already closed is discarded.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    pub id: ClientId,
    outbox: mpsc::Sender<ServerEvent>,
}

impl ClientHandle {
    pub fn new(id: ClientId, outbox: mpsc::Sender<ServerEvent>) -> Self {
        Self { id, outbox }
    }

    /// Queues an event for delivery, returning false if it was dropped
    pub fn send(&self, event: ServerEvent) -> bool {
        match self.outbox.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Outbox of client {} is full, dropping event", self.id);
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Dropping event for closed client {}", self.id);
                false
            }
        }
    }
}

/// A connected client
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server
    pub id: ClientId,
    /// Remote address of the connection
    pub addr: SocketAddr,
    /// When the connection was accepted
    pub connected_at: Instant,
    /// Room the client joined, if any
    pub room: Option<RoomId>,
    handle: ClientHandle,
}

impl Client {
    pub fn new(id: ClientId, addr: SocketAddr, outbox: mpsc::Sender<ServerEvent>) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            room: None,
            handle: ClientHandle::new(id, outbox),
        }
    }

    pub fn handle(&self) -> ClientHandle {
        self.handle.clone()
    }

    pub fn session_length(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

/// Manages all connected clients
///
/// Enforces the global connection cap and maps client ids to their outbound
/// queue and room membership.
pub struct ClientManager {
    /// Connected clients indexed by their unique ID
    clients: HashMap<ClientId, Client>,
    /// Next available client ID for new connections
    next_client_id: ClientId,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
}

impl ClientManager {
    /// Creates an empty manager. Client IDs start from 1.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Registers a new connection
    ///
    /// Returns Some(client_id) if successful, None if the server is at capacity.
    pub fn add_client(
        &mut self,
        addr: SocketAddr,
        outbox: mpsc::Sender<ServerEvent>,
    ) -> Option<ClientId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients
            .insert(client_id, Client::new(client_id, addr, outbox));

        Some(client_id)
    }

    /// Removes a client, returning its record if it was connected
    pub fn remove_client(&mut self, client_id: &ClientId) -> Option<Client> {
        let client = self.clients.remove(client_id)?;
        info!(
            "Client {} ({}) disconnected after {:.1}s",
            client.id,
            client.addr,
            client.session_length().as_secs_f32()
        );
        Some(client)
    }

    pub fn handle(&self, client_id: ClientId) -> Option<ClientHandle> {
        self.clients.get(&client_id).map(Client::handle)
    }

    pub fn room_of(&self, client_id: ClientId) -> Option<RoomId> {
        self.clients.get(&client_id).and_then(|client| client.room)
    }

    /// Records the room a client was placed in. Returns false for unknown clients.
    pub fn assign_room(&mut self, client_id: ClientId, room: RoomId) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.room = Some(room);
                true
            }
            None => false,
        }
    }

    pub fn max_clients(&self) -> usize {
        self.max_clients
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    fn outbox() -> mpsc::Sender<ServerEvent> {
        mpsc::channel(OUTBOX_CAPACITY).0
    }

    #[test]
    fn test_client_manager_creation() {
        let manager = ClientManager::new(5);
        assert_eq!(manager.max_clients(), 5);
        assert!(manager.is_empty());
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn test_add_multiple_clients() {
        let mut manager = ClientManager::new(3);

        let client_id1 = manager.add_client(test_addr(), outbox()).unwrap();
        let client_id2 = manager.add_client(test_addr2(), outbox()).unwrap();

        assert_eq!(client_id1, 1);
        assert_eq!(client_id2, 2);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1);

        assert!(manager.add_client(test_addr(), outbox()).is_some());
        assert!(manager.add_client(test_addr2(), outbox()).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_ids_are_not_reused() {
        let mut manager = ClientManager::new(1);

        let first = manager.add_client(test_addr(), outbox()).unwrap();
        assert!(manager.remove_client(&first).is_some());
        let second = manager.add_client(test_addr(), outbox()).unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn test_remove_nonexistent_client() {
        let mut manager = ClientManager::new(2);
        assert!(manager.remove_client(&999).is_none());
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn test_room_assignment() {
        let mut manager = ClientManager::new(2);
        let client_id = manager.add_client(test_addr(), outbox()).unwrap();

        assert_eq!(manager.room_of(client_id), None);
        assert!(manager.assign_room(client_id, RoomId(3)));
        assert_eq!(manager.room_of(client_id), Some(RoomId(3)));
        assert!(!manager.assign_room(42, RoomId(3)));

        let removed = manager.remove_client(&client_id).unwrap();
        assert_eq!(removed.room, Some(RoomId(3)));
    }

    #[test]
    fn test_handle_delivers_events() {
        let mut manager = ClientManager::new(2);
        let (tx, mut rx) = mpsc::channel(OUTBOX_CAPACITY);
        let client_id = manager.add_client(test_addr(), tx).unwrap();

        let handle = manager.handle(client_id).unwrap();
        assert_eq!(handle.id, client_id);
        assert!(handle.send(ServerEvent::PlayerDisconnected(7)));
        assert_eq!(rx.try_recv().unwrap(), ServerEvent::PlayerDisconnected(7));

        drop(rx);
        assert!(!handle.send(ServerEvent::PlayerDisconnected(8)));
        assert!(manager.handle(99).is_none());
    }

    #[test]
    fn test_full_outbox_drops_events() {
        let (tx, mut rx) = mpsc::channel(OUTBOX_CAPACITY);
        let handle = ClientHandle::new(1, tx);

        for id in 0..OUTBOX_CAPACITY as ClientId {
            assert!(handle.send(ServerEvent::PlayerDisconnected(id)));
        }
        assert!(!handle.send(ServerEvent::PlayerDisconnected(999)));
        assert!(!handle.send(ServerEvent::PlayerDisconnected(1000)));

        let mut received = Vec::new();
        while let Ok(event) = rx.try_recv() {
            received.push(event);
        }
        assert_eq!(received.len(), OUTBOX_CAPACITY);
        assert_eq!(
            received.last(),
            Some(&ServerEvent::PlayerDisconnected(OUTBOX_CAPACITY as ClientId - 1))
        );

        // room frees up once the writer catches up
        assert!(handle.send(ServerEvent::PlayerDisconnected(7)));
    }
}
