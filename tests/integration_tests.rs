//! Integration tests for the room server
//!
//! These tests validate cross-component interactions and real network behavior.

use futures_util::{SinkExt, StreamExt};
use rand::rngs::StdRng;
use rand::SeedableRng;
use server::client_manager::{ClientHandle, OUTBOX_CAPACITY};
use server::config::GameConfig;
use server::error::ServerError;
use server::generator::{self, Terrain};
use server::network::Server;
use server::registry::RoomRegistry;
use shared::{ClientEvent, ClientId, PlayerState, RoomMode, ServerEvent};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_test::assert_ok;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(3);

fn test_config() -> GameConfig {
    GameConfig {
        seed: Some(42),
        solo_start_delay: Duration::from_millis(20),
        ..GameConfig::default()
    }
}

/// END-TO-END TESTS OVER WEBSOCKET
mod network_tests {
    use super::*;

    async fn start_server(config: GameConfig) -> SocketAddr {
        let mut server = Server::new("127.0.0.1:0", config)
            .await
            .expect("Failed to bind server");
        let addr = server.local_addr();
        tokio::spawn(async move {
            let _ = server.run().await;
        });
        addr
    }

    async fn connect(addr: SocketAddr) -> Socket {
        let (socket, _) = connect_async(format!("ws://{}", addr))
            .await
            .expect("Failed to connect");
        socket
    }

    async fn send(socket: &mut Socket, event: &ClientEvent) {
        let text = serde_json::to_string(event).unwrap();
        socket.send(Message::Text(text)).await.unwrap();
    }

    async fn next_event(socket: &mut Socket) -> ServerEvent {
        loop {
            let frame = timeout(WAIT, socket.next())
                .await
                .expect("Timed out waiting for server event")
                .expect("Connection closed")
                .expect("WebSocket error");
            if let Message::Text(text) = frame {
                return serde_json::from_str(&text).expect("Server sent malformed event");
            }
        }
    }

    /// Skips events until one matches `pred`
    async fn wait_for(socket: &mut Socket, pred: impl Fn(&ServerEvent) -> bool) -> ServerEvent {
        loop {
            let event = next_event(socket).await;
            if pred(&event) {
                return event;
            }
        }
    }

    /// Tests that rule sets the generator cannot run with are refused at bind time
    #[tokio::test]
    async fn invalid_rules_are_rejected() {
        let mut config = test_config();
        config.generator.gap_width = f32::NAN;
        let result = Server::new("127.0.0.1:0", config).await;
        assert!(matches!(result, Err(ServerError::InvalidConfig(_))));

        assert_ok!(Server::new("127.0.0.1:0", test_config()).await);
    }

    /// Tests that a solo join starts a game with the initial terrain
    #[tokio::test]
    async fn solo_game_starts_over_websocket() {
        let addr = start_server(test_config()).await;
        let mut socket = connect(addr).await;

        send(&mut socket, &ClientEvent::JoinRoom("solo".into())).await;

        let snapshot = match wait_for(&mut socket, |e| matches!(e, ServerEvent::GameStart(_))).await
        {
            ServerEvent::GameStart(snapshot) => snapshot,
            _ => unreachable!(),
        };

        assert_eq!(snapshot.players.len(), 1);
        let player = snapshot.players.values().next().unwrap();
        assert_eq!(*player, PlayerState::spawn());

        let highest = snapshot.map_data.iter().map(|p| p.floor).max().unwrap();
        assert_eq!(highest, 14);
        assert_eq!(snapshot.map_data[0].floor, 0);
        assert!(snapshot.map_data[0].is_static);
    }

    /// Tests that climbing near the top pushes only the newly generated floors
    #[tokio::test]
    async fn climbing_extends_terrain() {
        let addr = start_server(test_config()).await;
        let mut socket = connect(addr).await;

        send(&mut socket, &ClientEvent::JoinRoom("solo".into())).await;
        wait_for(&mut socket, |e| matches!(e, ServerEvent::GameStart(_))).await;

        // floor 14, well inside the lookahead window
        let state = PlayerState {
            x: 400.0,
            y: 600.0 - 14.0 * 120.0,
            score: 14,
        };
        send(&mut socket, &ClientEvent::PlayerMovement(state)).await;

        let appended = wait_for(&mut socket, |e| match e {
            ServerEvent::MapUpdate(platforms) => {
                !platforms.is_empty() && platforms.iter().all(|p| p.floor >= 15)
            }
            _ => false,
        })
        .await;

        if let ServerEvent::MapUpdate(platforms) = appended {
            let highest = platforms.iter().map(|p| p.floor).max().unwrap();
            assert_eq!(highest, 18);
            assert!(platforms.iter().any(|p| p.floor == 15));
        }
    }

    /// Tests that movement is relayed to the other room members
    #[tokio::test]
    async fn movement_is_relayed_between_members() {
        let addr = start_server(test_config()).await;
        let mut first = connect(addr).await;
        let mut second = connect(addr).await;

        send(&mut first, &ClientEvent::JoinRoom("duo".into())).await;
        // keep the join order deterministic
        tokio::time::sleep(Duration::from_millis(100)).await;
        send(&mut second, &ClientEvent::JoinRoom("duo".into())).await;

        let second_id = match next_event(&mut first).await {
            ServerEvent::NewPlayer(player) => player.id,
            other => panic!("Expected newPlayer, got {:?}", other),
        };

        wait_for(&mut first, |e| matches!(e, ServerEvent::GameStart(_))).await;
        wait_for(&mut second, |e| matches!(e, ServerEvent::GameStart(_))).await;

        let state = PlayerState {
            x: 250.0,
            y: 480.0,
            score: 1,
        };
        send(&mut second, &ClientEvent::PlayerMovement(state)).await;

        match wait_for(&mut first, |e| matches!(e, ServerEvent::PlayerMoved(_))).await {
            ServerEvent::PlayerMoved(moved) => {
                assert_eq!(moved.id, second_id);
                assert_eq!(moved.x, 250.0);
                assert_eq!(moved.score, 1);
            }
            _ => unreachable!(),
        }
    }

    /// Tests that connections over the cap are told the server is full
    #[tokio::test]
    async fn over_cap_connection_gets_server_full() {
        let addr = start_server(GameConfig {
            max_clients: 1,
            ..test_config()
        })
        .await;

        let _first = connect(addr).await;
        // the first connection must be registered before the second arrives
        tokio::time::sleep(Duration::from_millis(100)).await;
        let mut second = connect(addr).await;

        assert_eq!(
            next_event(&mut second).await,
            ServerEvent::ServerFull("Server is full".to_string())
        );
    }

    /// Tests that malformed frames are dropped without closing the connection
    #[tokio::test]
    async fn malformed_frames_are_ignored() {
        let addr = start_server(test_config()).await;
        let mut socket = connect(addr).await;

        socket
            .send(Message::Text("{not json".to_string()))
            .await
            .unwrap();
        socket
            .send(Message::Text(r#"{"event":"fly","data":1}"#.to_string()))
            .await
            .unwrap();
        send(&mut socket, &ClientEvent::JoinRoom("trio".into())).await;
        send(&mut socket, &ClientEvent::JoinRoom("solo".into())).await;

        assert!(matches!(
            wait_for(&mut socket, |e| matches!(e, ServerEvent::GameStart(_))).await,
            ServerEvent::GameStart(_)
        ));
    }
}

/// ROOM ROUTING TESTS
mod routing_tests {
    use super::*;

    fn client(id: ClientId) -> (ClientHandle, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(OUTBOX_CAPACITY);
        (ClientHandle::new(id, tx), rx)
    }

    async fn wait_for_start(rx: &mut mpsc::Receiver<ServerEvent>) -> ServerEvent {
        loop {
            let event = timeout(WAIT, rx.recv())
                .await
                .expect("Timed out waiting for gameStart")
                .expect("Outbox closed");
            if matches!(event, ServerEvent::GameStart(_)) {
                return event;
            }
        }
    }

    /// Tests that four quad joins share one room that starts for everyone
    #[tokio::test]
    async fn quad_room_fills_and_starts() {
        let mut registry = RoomRegistry::new(Arc::new(test_config()));
        let mut inboxes = Vec::new();
        let mut rooms = Vec::new();

        for id in 1..=4 {
            let (handle, inbox) = client(id);
            rooms.push(assert_ok!(registry.join_room(handle, RoomMode::Quad).await));
            inboxes.push(inbox);
        }

        assert!(rooms.iter().all(|room| *room == rooms[0]));
        for inbox in &mut inboxes {
            match wait_for_start(inbox).await {
                ServerEvent::GameStart(snapshot) => assert_eq!(snapshot.players.len(), 4),
                _ => unreachable!(),
            }
        }

        let (late, _inbox) = client(5);
        let spill = assert_ok!(registry.join_room(late, RoomMode::Quad).await);
        assert_ne!(spill, rooms[0]);
        assert_eq!(registry.rooms_of(RoomMode::Quad), vec![rooms[0], spill]);
    }

    /// Tests that the last member leaving a started room removes it
    #[tokio::test]
    async fn emptied_room_is_removed() {
        let mut registry = RoomRegistry::new(Arc::new(test_config()));
        let (first, mut first_inbox) = client(1);
        let (second, _second_inbox) = client(2);

        let room = registry.join_room(first, RoomMode::Duo).await.unwrap();
        registry.join_room(second, RoomMode::Duo).await.unwrap();
        wait_for_start(&mut first_inbox).await;

        registry.leave(room, 2).await;
        assert!(registry.contains(room));

        registry.leave(room, 1).await;
        assert!(!registry.contains(room));

        let (third, _third_inbox) = client(3);
        let fresh = registry.join_room(third, RoomMode::Duo).await.unwrap();
        assert_ne!(fresh, room);
    }

    /// Tests that a seeded server produces the same terrain for the same room number
    #[tokio::test]
    async fn seeded_rooms_are_reproducible() {
        let mut snapshots = Vec::new();

        for _ in 0..2 {
            let mut registry = RoomRegistry::new(Arc::new(test_config()));
            let (handle, mut inbox) = client(1);
            registry.join_room(handle, RoomMode::Solo).await.unwrap();
            match wait_for_start(&mut inbox).await {
                ServerEvent::GameStart(snapshot) => snapshots.push(snapshot.map_data),
                _ => unreachable!(),
            }
        }

        assert_eq!(snapshots[0], snapshots[1]);
    }
}

/// TERRAIN PROPERTY TESTS
mod terrain_tests {
    use super::*;
    use shared::{PLAYFIELD_LEFT, PLAYFIELD_RIGHT};

    /// Tests that long generated towers keep every structural rule
    #[test]
    fn long_tower_keeps_structure() {
        let config = GameConfig::default().generator;

        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut terrain = Terrain::new();
            generator::extend(&mut terrain, 200, &config, &mut rng);

            assert_eq!(terrain.floor_count(), 200);

            let mut previous_floor_top = f32::INFINITY;
            for floor in 0..200 {
                let records: Vec<_> = terrain
                    .platforms()
                    .iter()
                    .filter(|p| p.floor == floor)
                    .collect();
                assert!(!records.is_empty(), "seed {}: floor {} missing", seed, floor);

                for platform in &records {
                    let left = platform.x - platform.width / 2.0;
                    let right = platform.x + platform.width / 2.0;
                    assert!(left >= PLAYFIELD_LEFT - 0.01, "seed {}: {:?}", seed, platform);
                    assert!(right <= PLAYFIELD_RIGHT + 0.01, "seed {}: {:?}", seed, platform);
                    assert!(platform.base_y < previous_floor_top || floor == 0);
                }

                previous_floor_top = records
                    .iter()
                    .map(|p| p.base_y)
                    .fold(f32::INFINITY, f32::min);
            }
        }
    }

    /// Tests that oscillating platforms stay inside the playfield over many ticks
    #[test]
    fn oscillation_stays_in_bounds() {
        let config = GameConfig::default().generator;
        let mut rng = StdRng::seed_from_u64(7);
        let mut terrain = Terrain::new();
        generator::extend(&mut terrain, 100, &config, &mut rng);

        for _ in 0..2_000 {
            terrain.advance(1.0 / 20.0);
            for platform in terrain.platforms().iter().filter(|p| p.is_moving()) {
                let (min_x, max_x) = platform.travel_bounds();
                assert!(platform.x >= min_x && platform.x <= max_x);
                assert_eq!(platform.y, platform.base_y);
            }
        }
    }
}
