//! Task that owns a [`Room`] and serializes every mutation of it
//!
//! Each room runs in its own tokio task fed by an unbounded command queue, so
//! two events for the same room never interleave while rooms progress
//! independently of each other. The actor also owns the start-delay timer
//! that batches near-simultaneous joins before a filled room starts.

use crate::client_manager::ClientHandle;
use crate::error::ServerError;
use crate::room::{JoinOutcome, LeaveOutcome, Room, RoomId, RoomPhase};
use log::{debug, info};
use shared::{ClientId, PlayerState};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};

/// Messages sent into a room actor
#[derive(Debug)]
pub enum RoomCommand {
    Join {
        client: ClientHandle,
        reply: oneshot::Sender<JoinOutcome>,
    },
    Leave {
        client_id: ClientId,
        reply: oneshot::Sender<LeaveOutcome>,
    },
    Movement {
        client_id: ClientId,
        state: PlayerState,
    },
    Tick {
        dt: f32,
    },
}

/// Handle that the registry keeps for each running room
///
/// Dropping every handle closes the command queue and stops the actor.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    id: RoomId,
    cmd_tx: mpsc::UnboundedSender<RoomCommand>,
}

impl RoomHandle {
    /// Spawns the actor task for `room`
    pub fn spawn(room: Room, start_delay: Duration) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let handle = RoomHandle {
            id: room.id(),
            cmd_tx,
        };

        let actor = RoomActor {
            room,
            start_delay,
            start_at: None,
        };
        tokio::spawn(actor.run(cmd_rx));

        handle
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub async fn join(&self, client: ClientHandle) -> Result<JoinOutcome, ServerError> {
        let (reply, response) = oneshot::channel();
        self.send(RoomCommand::Join { client, reply })?;
        response.await.map_err(|_| ServerError::RoomClosed(self.id))
    }

    pub async fn leave(&self, client_id: ClientId) -> Result<LeaveOutcome, ServerError> {
        let (reply, response) = oneshot::channel();
        self.send(RoomCommand::Leave { client_id, reply })?;
        response.await.map_err(|_| ServerError::RoomClosed(self.id))
    }

    pub fn report_movement(&self, client_id: ClientId, state: PlayerState) -> Result<(), ServerError> {
        self.send(RoomCommand::Movement { client_id, state })
    }

    pub fn tick(&self, dt: f32) -> Result<(), ServerError> {
        self.send(RoomCommand::Tick { dt })
    }

    fn send(&self, command: RoomCommand) -> Result<(), ServerError> {
        self.cmd_tx
            .send(command)
            .map_err(|_| ServerError::RoomClosed(self.id))
    }
}

struct RoomActor {
    room: Room,
    start_delay: Duration,
    /// Deadline of a pending start, armed when the room fills
    start_at: Option<Instant>,
}

impl RoomActor {
    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<RoomCommand>) {
        loop {
            tokio::select! {
                command = cmd_rx.recv() => {
                    let Some(command) = command else { break };
                    if !self.handle(command) {
                        break;
                    }
                }
                _ = wait_until(self.start_at) => {
                    self.start_at = None;
                    self.room.start();
                }
            }
        }

        info!("{} ({}) stopped", self.room.id(), self.room.mode());
    }

    /// Applies one command. Returns false once the room has ended.
    fn handle(&mut self, command: RoomCommand) -> bool {
        match command {
            RoomCommand::Join { client, reply } => {
                let outcome = self.room.join(client);
                if outcome == JoinOutcome::Filled {
                    self.schedule_start();
                }
                let _ = reply.send(outcome);
                true
            }
            RoomCommand::Leave { client_id, reply } => {
                let outcome = self.room.leave(client_id);
                if self.room.phase() != RoomPhase::Ready && self.start_at.take().is_some() {
                    debug!("{} start cancelled", self.room.id());
                }
                let _ = reply.send(outcome);
                !outcome.ended
            }
            RoomCommand::Movement { client_id, state } => {
                if !self.room.report_movement(client_id, state) {
                    debug!(
                        "Ignoring movement from player {} in {}",
                        client_id,
                        self.room.id()
                    );
                }
                true
            }
            RoomCommand::Tick { dt } => {
                self.room.tick(dt);
                true
            }
        }
    }

    fn schedule_start(&mut self) {
        if self.start_delay.is_zero() {
            self.room.start();
        } else {
            self.start_at = Some(Instant::now() + self.start_delay);
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
