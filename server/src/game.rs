//! Match simulation: the fixed-rate tick loop that owns the board
//!
//! A [`Game`] is the single writer of its board and players. Connection tasks
//! only push commands into each player's [`CommandInbox`]; the simulator
//! drains them at the start of that player's step, so a broadcast snapshot
//! always reflects a fully applied tick.

use crate::board::Board;
use crate::client_manager::{ClientHandle, ClientLink};
use crate::player::{CommandInbox, MoveError, Player};
use crate::session::SessionEvent;
use log::{debug, info, warn};
use shared::{
    GameStatus, ResponseBody, ServerMessage, DEFAULT_HEIGHT, DEFAULT_MATCH_SIZE, DEFAULT_TICK_MS,
    DEFAULT_WIDTH, INITIAL_SIZE,
};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

/// Parameters of every match the server runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameConfig {
    pub width: usize,
    pub height: usize,
    /// Players needed before a match starts
    pub match_size: usize,
    pub tick_interval: Duration,
    pub initial_size: i32,
    /// Fixed seed for apple and spawn placement, mainly for tests
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            match_size: DEFAULT_MATCH_SIZE,
            tick_interval: Duration::from_millis(DEFAULT_TICK_MS),
            initial_size: INITIAL_SIZE,
            seed: None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("no room to seat player {id} on a {width}x{height} board")]
    NoRoom {
        id: String,
        width: usize,
        height: usize,
    },
}

/// Requests the session sends to a running match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchControl {
    /// The player's connection is gone; stop simulating and messaging it.
    Detach { id: String },
}

/// What happened during one tick.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Players that died moving this tick, in player order
    pub eliminated: Vec<(String, MoveError)>,
    /// Players that quit or dropped before moving this tick
    pub quit: Vec<String>,
    /// No player is alive any more
    pub finished: bool,
}

struct MatchPlayer {
    player: Player,
    inbox: CommandInbox,
    link: ClientLink,
    connected: bool,
}

impl MatchPlayer {
    fn send(&mut self, message: ServerMessage) {
        if self.connected && !self.link.send(message) {
            debug!("Player {} connection gone; no further frames", self.player.id);
            self.connected = false;
        }
    }

    fn disconnect(&mut self) {
        if self.connected {
            self.link.close();
            self.connected = false;
        }
    }
}

pub struct Game {
    board: Board,
    /// Seating order; players step in this order every tick
    players: Vec<MatchPlayer>,
    tick: u64,
}

impl Game {
    /// Seats the clients on a fresh board, then places the opening apple on
    /// a cell none of their bodies took.
    pub fn new(config: &GameConfig, clients: Vec<ClientHandle>) -> Result<Self, GameError> {
        let mut board = match config.seed {
            Some(seed) => Board::with_seed(config.width, config.height, seed),
            None => Board::new(config.width, config.height),
        };

        let mut players = Vec::with_capacity(clients.len());
        for client in clients {
            let (link, inbox) = client.into_parts();
            let player = Player::spawn(link.id.clone(), &mut board, config.initial_size)
                .ok_or_else(|| GameError::NoRoom {
                    id: link.id.clone(),
                    width: config.width,
                    height: config.height,
                })?;
            player.generate_initial_body(&mut board);
            info!(
                "Spawned player {} at ({}, {}) heading {:?}",
                player.id, player.x, player.y, player.direction
            );
            players.push(MatchPlayer {
                player,
                inbox,
                link,
                connected: true,
            });
        }

        if board.generate_apple().is_none() {
            warn!("No free cell for the opening apple");
        }

        Ok(Self {
            board,
            players,
            tick: 0,
        })
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players
            .iter()
            .map(|slot| &slot.player)
            .find(|player| player.id == id)
    }

    pub fn player_ids(&self) -> Vec<String> {
        self.players
            .iter()
            .map(|slot| slot.player.id.clone())
            .collect()
    }

    pub fn alive_count(&self) -> usize {
        self.players.iter().filter(|slot| slot.player.alive).count()
    }

    pub fn is_finished(&self) -> bool {
        self.alive_count() == 0
    }

    /// Full public state of the match as it stands now.
    pub fn snapshot(&self) -> ResponseBody {
        ResponseBody {
            board: self.board.serialize(),
            width: self.board.width(),
            height: self.board.height(),
            players: self
                .players
                .iter()
                .map(|slot| slot.player.to_response())
                .collect(),
        }
    }

    /// Stops simulating a player whose connection went away.
    ///
    /// Returns false for unknown identities.
    pub fn detach(&mut self, id: &str) -> bool {
        let Some(slot) = self.players.iter_mut().find(|slot| slot.player.id == id) else {
            return false;
        };
        if slot.player.alive {
            info!("Player {} detached at tick {}", id, self.tick);
        }
        slot.player.kill();
        slot.connected = false;
        true
    }

    /// Runs one tick: commands, movement, snapshots, then ageing.
    pub fn step(&mut self) -> TickReport {
        self.tick += 1;
        let mut report = TickReport::default();

        for slot in self.players.iter_mut().filter(|slot| slot.player.alive) {
            if slot.inbox.drain_into(&mut slot.player) {
                info!("Player {} quit at tick {}", slot.player.id, self.tick);
                slot.player.kill();
                slot.connected = false;
                report.quit.push(slot.player.id.clone());
                continue;
            }

            if let Err(error) = slot.player.advance(&mut self.board) {
                info!(
                    "Player {} eliminated at tick {}: {}",
                    slot.player.id, self.tick, error
                );
                report.eliminated.push((slot.player.id.clone(), error));
            }
        }

        let body = self.snapshot();

        for (id, _) in &report.eliminated {
            if let Some(slot) = self.players.iter_mut().find(|slot| &slot.player.id == id) {
                slot.send(ServerMessage::snapshot(GameStatus::Error, body.clone()));
                slot.disconnect();
            }
        }

        for slot in self
            .players
            .iter_mut()
            .filter(|slot| slot.player.alive && slot.connected)
        {
            slot.send(ServerMessage::snapshot(GameStatus::Ok, body.clone()));
        }

        self.board.tick_decay();
        report.finished = self.is_finished();
        report
    }
}

/// Drives a match at a fixed rate until no player is left alive.
///
/// Eliminations and quits are reported as `ClientFinish`; leaving the loop is
/// reported as `MatchEnded`.
pub async fn run_match(
    mut game: Game,
    tick_interval: Duration,
    mut control: mpsc::UnboundedReceiver<MatchControl>,
    events: mpsc::UnboundedSender<SessionEvent>,
) {
    let mut ticker = interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; give clients one interval to react.
    ticker.tick().await;

    info!(
        "Match started with {} players on a {}x{} board",
        game.players.len(),
        game.board.width(),
        game.board.height()
    );

    loop {
        tokio::select! {
            message = control.recv() => {
                match message {
                    Some(MatchControl::Detach { id }) => {
                        game.detach(&id);
                        if game.is_finished() {
                            break;
                        }
                    }
                    None => {
                        info!("Match control channel closed");
                        break;
                    }
                }
            },

            _ = ticker.tick() => {
                let report = game.step();
                let finished_ids = report
                    .eliminated
                    .into_iter()
                    .map(|(id, _)| id)
                    .chain(report.quit);
                for id in finished_ids {
                    if events.send(SessionEvent::ClientFinish { id }).is_err() {
                        warn!("Session gone; stopping match");
                        return;
                    }
                }

                if report.finished {
                    break;
                }

                if game.tick % 100 == 0 {
                    debug!("Tick {}: {} players alive", game.tick, game.alive_count());
                }
            },
        }
    }

    info!("Match over after {} ticks", game.tick);
    if events.send(SessionEvent::MatchEnded).is_err() {
        warn!("Session gone before match end was reported");
    }
}
