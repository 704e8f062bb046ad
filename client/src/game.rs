use log::{debug, info, warn};
use shared::{GameStatus, PlayerResponse, ResponseBody, ServerMessage};

/// Where the client is in its session, as told by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Connected, identity not yet received
    Connecting,
    /// Identity received, waiting for the lobby to fill
    Waiting,
    Playing,
    /// Our snake died; the server closes the connection next
    Eliminated,
    /// The server refused to seat us
    Rejected(String),
}

/// Client view of the match, rebuilt from every server snapshot.
///
/// The server sends the full board each tick, so nothing is predicted or
/// interpolated; the latest snapshot is the truth.
#[derive(Debug, Clone)]
pub struct ClientGameState {
    pub my_id: Option<String>,
    pub phase: Phase,
    pub snapshot: Option<ResponseBody>,
    pub ticks_seen: u64,
}

impl Default for ClientGameState {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientGameState {
    pub fn new() -> Self {
        Self {
            my_id: None,
            phase: Phase::Connecting,
            snapshot: None,
            ticks_seen: 0,
        }
    }

    /// Folds one server frame into the state.
    pub fn apply(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Init(init) => {
                info!("Assigned player id {}", init.id);
                self.my_id = Some(init.id);
                if self.phase == Phase::Connecting {
                    self.phase = Phase::Waiting;
                }
            }
            ServerMessage::Status(notice) => match notice.status {
                GameStatus::Waiting => {
                    debug!("Waiting for more players");
                    self.phase = Phase::Waiting;
                }
                GameStatus::Error => {
                    let reason = notice.reason.unwrap_or_default();
                    warn!("Rejected by server: {}", reason);
                    self.phase = Phase::Rejected(reason);
                }
                other => debug!("Ignoring status notice {:?}", other),
            },
            ServerMessage::Event(event) => {
                self.ticks_seen += 1;
                self.phase = match event.status {
                    GameStatus::Error => Phase::Eliminated,
                    _ => Phase::Playing,
                };
                self.snapshot = Some(event.body);
            }
        }
    }

    pub fn me(&self) -> Option<&PlayerResponse> {
        let id = self.my_id.as_deref()?;
        self.snapshot.as_ref()?.player(id)
    }

    pub fn is_over(&self) -> bool {
        matches!(self.phase, Phase::Eliminated | Phase::Rejected(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Direction;

    fn body_with(id: &str) -> ResponseBody {
        ResponseBody {
            board: vec![0; 16],
            width: 4,
            height: 4,
            players: vec![PlayerResponse {
                id: id.to_string(),
                x: 1,
                y: 2,
                size: 3,
                direction: Direction::Up,
            }],
        }
    }

    #[test]
    fn test_init_then_waiting() {
        let mut state = ClientGameState::new();
        assert_eq!(state.phase, Phase::Connecting);

        state.apply(ServerMessage::init("me"));
        assert_eq!(state.my_id.as_deref(), Some("me"));
        assert_eq!(state.phase, Phase::Waiting);

        state.apply(ServerMessage::waiting());
        assert_eq!(state.phase, Phase::Waiting);
        assert!(!state.is_over());
    }

    #[test]
    fn test_snapshot_tracks_own_player() {
        let mut state = ClientGameState::new();
        state.apply(ServerMessage::init("me"));
        state.apply(ServerMessage::snapshot(GameStatus::Ok, body_with("me")));

        assert_eq!(state.phase, Phase::Playing);
        assert_eq!(state.ticks_seen, 1);
        assert_eq!(state.me().map(|p| (p.x, p.y)), Some((1, 2)));
    }

    #[test]
    fn test_error_snapshot_ends_game() {
        let mut state = ClientGameState::new();
        state.apply(ServerMessage::init("me"));
        state.apply(ServerMessage::snapshot(GameStatus::Error, body_with("me")));

        assert_eq!(state.phase, Phase::Eliminated);
        assert!(state.is_over());
    }

    #[test]
    fn test_rejection_keeps_reason() {
        let mut state = ClientGameState::new();
        state.apply(ServerMessage::init("me"));
        state.apply(ServerMessage::rejected("match already started"));

        assert_eq!(
            state.phase,
            Phase::Rejected("match already started".to_string())
        );
        assert!(state.is_over());
    }

    #[test]
    fn test_me_without_identity() {
        let mut state = ClientGameState::new();
        state.apply(ServerMessage::snapshot(GameStatus::Ok, body_with("other")));
        assert!(state.me().is_none());
    }
}
