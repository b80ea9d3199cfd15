//! Scripted bot that joins a room and climbs
//!
//! Connects over WebSocket, joins the requested room class, waits for the
//! game to start and then reports a steadily rising position while logging
//! what the server sends back.

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use shared::{player_floor, ClientEvent, PlayerState, ServerEvent};
use std::time::Duration;
use tokio::time::interval;
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// WebSocket URL of the server
    #[clap(short, long, default_value = "ws://127.0.0.1:8081")]
    url: String,
    /// Room class to join (solo, duo, quad, octet)
    #[clap(short, long, default_value = "solo")]
    mode: String,
    /// Movement reports per second
    #[clap(short, long, default_value = "10")]
    rate: u32,
    /// Pixels climbed per movement report
    #[clap(long, default_value = "12")]
    climb: f32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Hint: set RUST_LOG=info to see bot output");
    }
    env_logger::init();

    let args = Args::parse();

    let (ws_stream, _) = connect_async(args.url.as_str()).await?;
    info!("Connected to {}", args.url);
    let (mut sender, mut receiver) = ws_stream.split();

    let join = ClientEvent::JoinRoom(args.mode.clone());
    sender
        .send(Message::Text(serde_json::to_string(&join)?))
        .await?;
    info!("Requested a {} room", args.mode);

    let mut state = PlayerState::spawn();
    let mut started = false;
    let mut reports = interval(Duration::from_secs_f64(1.0 / args.rate.max(1) as f64));

    loop {
        tokio::select! {
            frame = receiver.next() => {
                let Some(frame) = frame else { break };
                let text = match frame? {
                    Message::Text(text) => text,
                    Message::Close(_) => break,
                    _ => continue,
                };

                match serde_json::from_str::<ServerEvent>(&text) {
                    Ok(ServerEvent::GameStart(snapshot)) => {
                        info!(
                            "Game started with {} platforms and {} players",
                            snapshot.map_data.len(),
                            snapshot.players.len()
                        );
                        started = true;
                    }
                    Ok(ServerEvent::MapUpdate(platforms)) => {
                        debug!("Map update with {} platforms", platforms.len());
                    }
                    Ok(ServerEvent::PlayerMoved(moved)) => {
                        debug!("Player {} at ({:.0}, {:.0})", moved.id, moved.x, moved.y);
                    }
                    Ok(ServerEvent::NewPlayer(player)) => info!("Player {} joined", player.id),
                    Ok(ServerEvent::PlayerDisconnected(id)) => info!("Player {} left", id),
                    Ok(ServerEvent::ServerFull(reason)) => {
                        warn!("Rejected: {}", reason);
                        break;
                    }
                    Err(e) => warn!("Unreadable event: {}", e),
                }
            }

            _ = reports.tick(), if started => {
                state.y -= args.climb;
                state.score = player_floor(state.y);

                let movement = ClientEvent::PlayerMovement(state);
                sender
                    .send(Message::Text(serde_json::to_string(&movement)?))
                    .await?;
            }
        }
    }

    info!("Disconnected");
    Ok(())
}
