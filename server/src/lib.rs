//! # Skyclimb Server Library
//!
//! This library provides the authoritative server for a multiplayer vertical
//! platformer. Players connect over WebSocket, ask to join a room of a given
//! capacity class, and climb a shared, endlessly extending tower of
//! platforms. The server owns the terrain; each client simulates its own
//! avatar and reports the result.
//!
//! ## Core Responsibilities
//!
//! ### Terrain Authority
//! Every room generates its own platform layout, keeps it ahead of the
//! highest player, and moves oscillating platforms forward in time. Clients
//! never invent terrain; they render what the server sends them.
//!
//! ### Matchmaking
//! Join requests are routed to the first room of the requested class that
//! still has a free slot. A room starts once it is full, and a room that
//! starts never takes new players.
//!
//! ### State Broadcasting
//! A fixed-rate clock pushes the current terrain to every started room,
//! while movement reports are relayed to the other members of the room as
//! soon as they arrive.
//!
//! ## Architecture Design
//!
//! ### Dispatcher Loop
//! A single dispatcher task owns the connection table and the room registry.
//! Connection tasks only translate WebSocket frames into events and back,
//! so routing decisions never race.
//!
//! ### Room Actors
//! Each room lives in its own task behind a command queue. Commands for one
//! room are applied strictly in order, while different rooms progress
//! independently. The pending start of a filled room is a timer inside its
//! actor, so a leave that arrives first cancels it.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! Connection tracking, id assignment, the connection cap and each client's
//! current room.
//!
//! ### Generator Module (`generator`)
//! Platform placement: floor spacing, split floors, launch platforms,
//! horizontal placement rules, bonus scheduling and difficulty tiers.
//!
//! ### Room Modules (`room`, `room_actor`, `registry`)
//! The room state machine, the task that serializes its mutations, and the
//! registry that routes joins and reaps ended rooms.
//!
//! ### Network Module (`network`)
//! WebSocket accept loop, per-connection reader and writer tasks, and the
//! dispatcher that ties clients to rooms.
//!
//! ### Scheduler Module (`scheduler`)
//! The fixed-rate broadcast clock with delta-time capping.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::GameConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Bind with the default rules: 60Hz broadcasts, 15 initial floors
//!     let mut server = Server::new("127.0.0.1:8081", GameConfig::default()).await?;
//!
//!     // Accepts connections, routes joins and drives every room's clock
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod error;
pub mod generator;
pub mod network;
pub mod registry;
pub mod room;
pub mod room_actor;
pub mod scheduler;
