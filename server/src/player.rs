//! Per-connection snake state and its command intake.

use crate::board::Board;
use log::debug;
use rand::Rng;
use shared::{Command, Direction, PlayerResponse, CELL_EMPTY};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

/// Spawn positions tried before giving up on a crowded board.
const SPAWN_ATTEMPTS: usize = 256;

/// Why a snake could not advance. Both are fatal to that snake only.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MoveError {
    #[error("out of border at ({x}, {y})")]
    OutOfBorder { x: i32, y: i32 },
    #[error("ran into a snake at ({x}, {y})")]
    SelfCollision { x: i32, y: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved,
    AteApple,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: String,
    pub x: i32,
    pub y: i32,
    pub direction: Direction,
    pub size: i32,
    pub alive: bool,
}

impl Player {
    pub fn new(id: impl Into<String>, x: i32, y: i32, direction: Direction, size: i32) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            direction,
            size,
            alive: true,
        }
    }

    /// Picks a random spawn cell and heading whose initial body and first
    /// step are free. `None` when no clear spot turned up.
    pub fn spawn(id: impl Into<String>, board: &mut Board, size: i32) -> Option<Self> {
        let (width, height) = (board.width() as i32, board.height() as i32);
        let mut player = Player::new(id, 0, 0, Direction::Right, size);

        for _ in 0..SPAWN_ATTEMPTS {
            let rng = board.rng();
            player.x = rng.gen_range(0..width);
            player.y = rng.gen_range(0..height);
            player.direction = Direction::ALL[rng.gen_range(0..Direction::ALL.len())];

            if player.spawn_is_clear(board) {
                debug!(
                    "Spawned player {} at ({}, {}) heading {:?}",
                    player.id, player.x, player.y, player.direction
                );
                return Some(player);
            }
        }

        debug!("No clear spawn for player {} after {} attempts", player.id, SPAWN_ATTEMPTS);
        None
    }

    fn spawn_is_clear(&self, board: &Board) -> bool {
        let body = self.initial_body_cells(board);
        if body.len() != self.size.max(0) as usize {
            return false;
        }
        if body
            .iter()
            .any(|&(x, y, _)| board.get_cell(x, y) != CELL_EMPTY)
        {
            return false;
        }

        let (dx, dy) = self.direction.delta();
        let (nx, ny) = (self.x + dx, self.y + dy);
        board.contains(nx, ny) && board.get_cell(nx, ny) == CELL_EMPTY
    }

    /// Cells of the initial body as `(x, y, age)`, head first.
    ///
    /// The body is laid backwards from the head. When the next cell would
    /// leave the board horizontally the layout turns downwards, and when it
    /// would leave vertically it turns right. The zero-aged tail of the
    /// layout is empty by definition and is not returned.
    fn initial_body_cells(&self, board: &Board) -> Vec<(i32, i32, i32)> {
        let mut cells = Vec::new();
        if !board.contains(self.x, self.y) {
            return cells;
        }

        let (mut dx, mut dy) = self.direction.opposite().delta();
        let (mut x, mut y) = (self.x, self.y);

        for age in (1..=self.size).rev() {
            cells.push((x, y, age));
            if !board.contains(x + dx, y) {
                dx = 0;
                dy = 1;
            }
            if !board.contains(x, y + dy) {
                dx = 1;
                dy = 0;
            }
            if !board.contains(x + dx, y + dy) {
                break;
            }
            x += dx;
            y += dy;
        }
        cells
    }

    pub fn generate_initial_body(&self, board: &mut Board) {
        for (x, y, age) in self.initial_body_cells(board) {
            board.set_cell(x, y, age);
        }
    }

    /// Applies a steering request. Reversals and requests from dead snakes
    /// are ignored. Returns whether the heading was accepted.
    pub fn change_direction(&mut self, requested: Direction) -> bool {
        if !self.alive || requested == self.direction.opposite() {
            return false;
        }
        self.direction = requested;
        true
    }

    /// Advances the head one cell.
    ///
    /// On failure the snake dies and neither its position nor the board is
    /// touched.
    pub fn advance(&mut self, board: &mut Board) -> Result<MoveOutcome, MoveError> {
        let (dx, dy) = self.direction.delta();
        let (x, y) = (self.x + dx, self.y + dy);

        if !board.contains(x, y) {
            self.alive = false;
            return Err(MoveError::OutOfBorder { x, y });
        }
        if board.get_cell(x, y) > 0 {
            self.alive = false;
            return Err(MoveError::SelfCollision { x, y });
        }

        let outcome = if board.hit_apple(x, y) {
            board.generate_apple();
            self.size += 1;
            MoveOutcome::AteApple
        } else {
            MoveOutcome::Moved
        };

        board.set_cell(x, y, self.size + 1);
        self.x = x;
        self.y = y;
        Ok(outcome)
    }

    pub fn kill(&mut self) {
        self.alive = false;
    }

    pub fn to_response(&self) -> PlayerResponse {
        PlayerResponse {
            id: self.id.clone(),
            x: self.x,
            y: self.y,
            size: self.size,
            direction: self.direction,
        }
    }
}

/// Receiving end of one player's command channel.
///
/// The connection task owns the sender and pushes commands as frames arrive;
/// the simulator drains the inbox only at the start of that player's step.
#[derive(Debug)]
pub struct CommandInbox {
    receiver: mpsc::UnboundedReceiver<Command>,
}

impl CommandInbox {
    pub fn channel() -> (mpsc::UnboundedSender<Command>, CommandInbox) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (sender, CommandInbox { receiver })
    }

    /// Applies every pending steering command in arrival order.
    ///
    /// Returns true when the player asked to quit or its connection is gone.
    pub fn drain_into(&mut self, player: &mut Player) -> bool {
        loop {
            match self.receiver.try_recv() {
                Ok(Command::Turn(direction)) => {
                    if !player.change_direction(direction) {
                        debug!(
                            "Player {} ignored turn {:?} while heading {:?}",
                            player.id, direction, player.direction
                        );
                    }
                }
                Ok(Command::Quit) => return true,
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Disconnected) => return true,
            }
        }
    }
}
