//! Wire protocol and game constants shared by the snake server and client.
//!
//! Every frame is a JSON text message. Clients send [`EventRequest`]s, the
//! server answers with one of the [`ServerMessage`] shapes. Board cells are
//! plain integers: `0` is empty, `-1` is an apple and any positive value is a
//! snake segment whose value is its remaining age in ticks.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_WIDTH: usize = 80;
pub const DEFAULT_HEIGHT: usize = 40;
pub const DEFAULT_MATCH_SIZE: usize = 2;
pub const DEFAULT_TICK_MS: u64 = 100;
pub const INITIAL_SIZE: i32 = 3;

pub const CELL_EMPTY: i32 = 0;
pub const CELL_APPLE: i32 = -1;

/// `eventtype` of a steering request.
pub const EVENT_TYPE_KEY: i32 = 0;
/// `eventtype` of an explicit quit request.
pub const EVENT_TYPE_QUIT: i32 = 1;
/// Key code that also means quit when sent with [`EVENT_TYPE_KEY`].
pub const KEY_QUIT: i32 = 4;

/// Errors raised while decoding an inbound client frame.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("malformed command frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unknown event type {0}")]
    UnknownEventType(i32),
    #[error("key event without a key code")]
    MissingKey,
    #[error("unknown key code {0}")]
    UnknownKey(i32),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown status code {0}")]
pub struct UnknownStatus(pub i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Left,
        Direction::Right,
        Direction::Up,
        Direction::Down,
    ];

    pub fn code(self) -> i32 {
        match self {
            Direction::Left => 0,
            Direction::Right => 1,
            Direction::Up => 2,
            Direction::Down => 3,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Direction::Left),
            1 => Some(Direction::Right),
            2 => Some(Direction::Up),
            3 => Some(Direction::Down),
            _ => None,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    /// Grid offset of one step. `y` grows downwards.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
        }
    }
}

impl From<Direction> for i32 {
    fn from(direction: Direction) -> Self {
        direction.code()
    }
}

impl TryFrom<i32> for Direction {
    type Error = CommandError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Direction::from_code(code).ok_or(CommandError::UnknownKey(code))
    }
}

/// `status` field of every server frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum GameStatus {
    Init,
    Ok,
    Error,
    Waiting,
}

impl From<GameStatus> for i32 {
    fn from(status: GameStatus) -> Self {
        match status {
            GameStatus::Init => 0,
            GameStatus::Ok => 1,
            GameStatus::Error => 2,
            GameStatus::Waiting => 3,
        }
    }
}

impl TryFrom<i32> for GameStatus {
    type Error = UnknownStatus;

    fn try_from(code: i32) -> Result<Self, UnknownStatus> {
        match code {
            0 => Ok(GameStatus::Init),
            1 => Ok(GameStatus::Ok),
            2 => Ok(GameStatus::Error),
            3 => Ok(GameStatus::Waiting),
            other => Err(UnknownStatus(other)),
        }
    }
}

/// Typed form of a decoded client frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Turn(Direction),
    Quit,
}

/// Client → server frame: `{ "eventtype": int, "key"|"id": int }`.
///
/// Older clients put the key code in `id`, newer ones in `key`; `key` wins
/// when both are present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRequest {
    #[serde(default)]
    pub eventtype: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i32>,
}

impl EventRequest {
    pub fn turn(direction: Direction) -> Self {
        Self {
            eventtype: EVENT_TYPE_KEY,
            key: Some(direction.code()),
            id: None,
        }
    }

    pub fn quit() -> Self {
        Self {
            eventtype: EVENT_TYPE_QUIT,
            key: None,
            id: None,
        }
    }

    pub fn to_command(&self) -> Result<Command, CommandError> {
        match self.eventtype {
            EVENT_TYPE_QUIT => Ok(Command::Quit),
            EVENT_TYPE_KEY => match self.key.or(self.id) {
                Some(KEY_QUIT) => Ok(Command::Quit),
                Some(code) => Direction::try_from(code).map(Command::Turn),
                None => Err(CommandError::MissingKey),
            },
            other => Err(CommandError::UnknownEventType(other)),
        }
    }
}

/// Decodes one inbound text frame into a [`Command`].
pub fn decode_command(text: &str) -> Result<Command, CommandError> {
    let request: EventRequest = serde_json::from_str(text)?;
    request.to_command()
}

/// Public per-player state carried in every snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerResponse {
    pub id: String,
    pub x: i32,
    pub y: i32,
    pub size: i32,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseBody {
    pub board: Vec<i32>,
    pub width: usize,
    pub height: usize,
    pub players: Vec<PlayerResponse>,
}

impl ResponseBody {
    /// Cell at `(x, y)` of the row-major board, if inside the grid.
    pub fn cell(&self, x: i32, y: i32) -> Option<i32> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return None;
        }
        self.board.get(y as usize * self.width + x as usize).copied()
    }

    pub fn apple(&self) -> Option<(i32, i32)> {
        self.board
            .iter()
            .position(|&cell| cell == CELL_APPLE)
            .map(|index| ((index % self.width) as i32, (index / self.width) as i32))
    }

    pub fn player(&self, id: &str) -> Option<&PlayerResponse> {
        self.players.iter().find(|player| player.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventResponse {
    pub status: GameStatus,
    pub body: ResponseBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitResponse {
    pub status: GameStatus,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: GameStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Every frame the server can send. Variant order matters for decoding:
/// snapshots carry `body`, init frames carry `id`, status notices neither.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Event(EventResponse),
    Init(InitResponse),
    Status(StatusResponse),
}

impl ServerMessage {
    pub fn init(id: impl Into<String>) -> Self {
        ServerMessage::Init(InitResponse {
            status: GameStatus::Init,
            id: id.into(),
        })
    }

    pub fn snapshot(status: GameStatus, body: ResponseBody) -> Self {
        ServerMessage::Event(EventResponse { status, body })
    }

    pub fn waiting() -> Self {
        ServerMessage::Status(StatusResponse {
            status: GameStatus::Waiting,
            reason: None,
        })
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        ServerMessage::Status(StatusResponse {
            status: GameStatus::Error,
            reason: Some(reason.into()),
        })
    }

    pub fn status(&self) -> GameStatus {
        match self {
            ServerMessage::Event(event) => event.status,
            ServerMessage::Init(init) => init.status,
            ServerMessage::Status(notice) => notice.status,
        }
    }

    pub fn body(&self) -> Option<&ResponseBody> {
        match self {
            ServerMessage::Event(event) => Some(&event.body),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
