//! Session lifecycle: matchmaking, the running match, and teardown
//!
//! The session is an event-driven state machine over three phases:
//!
//! ```text
//! Matchmaking --(lobby full)--> Ingame --(roster empty)--> Finished
//!      ^                                                       |
//!      +--------------------(MatchEnded)-----------------------+
//! ```
//!
//! Each phase implements [`Phase`]; events a phase has no handler for fall
//! through to the trait defaults, which report `HandlerNotFound`. The session
//! logs those and carries on. Orchestrator failures are returned to the
//! caller and end the process.

use crate::client_manager::{ClientHandle, ClientLink, ClientManager};
use crate::game::{run_match, Game, GameConfig, MatchControl};
use crate::orchestrator::{Orchestrator, OrchestratorError};
use log::{debug, info, warn};
use shared::ServerMessage;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Inputs to the session, produced by connection tasks and the simulator.
#[derive(Debug)]
pub enum SessionEvent {
    ClientConnect(ClientHandle),
    ClientFinish { id: String },
    MatchEnded,
}

impl SessionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SessionEvent::ClientConnect(_) => EventKind::ClientConnect,
            SessionEvent::ClientFinish { .. } => EventKind::ClientFinish,
            SessionEvent::MatchEnded => EventKind::MatchEnded,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    ClientConnect,
    ClientFinish,
    MatchEnded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Matchmaking,
    Ingame,
    Finished,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no handler for {event:?} while {phase}")]
    HandlerNotFound {
        event: EventKind,
        phase: SessionPhase,
    },
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
}

/// Shared inputs every phase handler may need.
pub struct SessionContext {
    pub config: GameConfig,
    pub orchestrator: Arc<dyn Orchestrator>,
    /// Handed to each match so it can report back
    pub events: mpsc::UnboundedSender<SessionEvent>,
}

enum Transition {
    Stay,
    Goto(SessionState),
}

trait Phase {
    fn phase(&self) -> SessionPhase;

    fn not_found(&self, event: EventKind) -> SessionError {
        SessionError::HandlerNotFound {
            event,
            phase: self.phase(),
        }
    }

    fn on_client_connect(
        &mut self,
        _ctx: &SessionContext,
        _client: ClientHandle,
    ) -> Result<Transition, SessionError> {
        Err(self.not_found(EventKind::ClientConnect))
    }

    fn on_client_finish(
        &mut self,
        _ctx: &SessionContext,
        _id: String,
    ) -> Result<Transition, SessionError> {
        Err(self.not_found(EventKind::ClientFinish))
    }

    fn on_match_ended(&mut self, _ctx: &SessionContext) -> Result<Transition, SessionError> {
        Err(self.not_found(EventKind::MatchEnded))
    }
}

fn reject(client: ClientHandle, reason: &str) {
    info!("Rejecting client {} from {}: {}", client.id(), client.addr, reason);
    client.send(ServerMessage::rejected(reason));
    client.close();
}

/// Waiting for the lobby to fill.
struct Matchmaking {
    lobby: ClientManager,
}

impl Matchmaking {
    fn new(ctx: &SessionContext) -> Self {
        Self {
            lobby: ClientManager::new(ctx.config.match_size),
        }
    }
}

impl Phase for Matchmaking {
    fn phase(&self) -> SessionPhase {
        SessionPhase::Matchmaking
    }

    fn on_client_connect(
        &mut self,
        ctx: &SessionContext,
        client: ClientHandle,
    ) -> Result<Transition, SessionError> {
        let id = client.id().to_string();
        if let Err(client) = self.lobby.add_client(client) {
            reject(client, "lobby full");
            return Ok(Transition::Stay);
        }

        if !self.lobby.is_full() {
            if let Some(client) = self.lobby.get(&id) {
                client.send(ServerMessage::waiting());
            }
            return Ok(Transition::Stay);
        }

        let clients = self.lobby.take_all();
        let links: Vec<ClientLink> = clients.iter().map(|client| client.link.clone()).collect();
        let game = match Game::new(&ctx.config, clients) {
            Ok(game) => game,
            Err(error) => {
                warn!("Cannot start match: {}", error);
                for link in links {
                    link.send(ServerMessage::rejected(error.to_string()));
                    link.close();
                }
                return Ok(Transition::Stay);
            }
        };

        ctx.orchestrator.allocate()?;
        let ingame = Ingame::start(ctx, game);
        Ok(Transition::Goto(SessionState::Ingame(ingame)))
    }

    fn on_client_finish(
        &mut self,
        _ctx: &SessionContext,
        id: String,
    ) -> Result<Transition, SessionError> {
        if self.lobby.remove_client(&id).is_none() {
            debug!("Client {} finished but was not waiting", id);
        }
        Ok(Transition::Stay)
    }
}

/// A match is running.
struct Ingame {
    /// Players whose connections are still attached to the match
    roster: Vec<String>,
    control: mpsc::UnboundedSender<MatchControl>,
    task: JoinHandle<()>,
}

impl Ingame {
    fn start(ctx: &SessionContext, game: Game) -> Self {
        let roster = game.player_ids();
        let (control, control_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_match(
            game,
            ctx.config.tick_interval,
            control_rx,
            ctx.events.clone(),
        ));

        info!("Match starting with players {:?}", roster);
        Self {
            roster,
            control,
            task,
        }
    }
}

impl Phase for Ingame {
    fn phase(&self) -> SessionPhase {
        SessionPhase::Ingame
    }

    fn on_client_connect(
        &mut self,
        _ctx: &SessionContext,
        client: ClientHandle,
    ) -> Result<Transition, SessionError> {
        reject(client, "match already started");
        Ok(Transition::Stay)
    }

    fn on_client_finish(
        &mut self,
        ctx: &SessionContext,
        id: String,
    ) -> Result<Transition, SessionError> {
        let Some(index) = self.roster.iter().position(|player| *player == id) else {
            debug!("Client {} finished but is not in the match", id);
            return Ok(Transition::Stay);
        };
        self.roster.remove(index);

        if self.control.send(MatchControl::Detach { id: id.clone() }).is_err() {
            debug!("Match already stopped; {} not detached", id);
        }
        info!("Player {} left the match, {} remaining", id, self.roster.len());

        if !self.roster.is_empty() {
            return Ok(Transition::Stay);
        }

        ctx.orchestrator.shutdown()?;
        Ok(Transition::Goto(SessionState::Finished(Finished)))
    }

    fn on_match_ended(&mut self, ctx: &SessionContext) -> Result<Transition, SessionError> {
        warn!(
            "Match ended with players still attached: {:?}",
            self.roster
        );
        if !self.task.is_finished() {
            self.task.abort();
        }
        ctx.orchestrator.shutdown()?;
        Ok(Transition::Goto(SessionState::Matchmaking(Matchmaking::new(
            ctx,
        ))))
    }
}

/// Every player has left; waiting for the match task to wind down.
struct Finished;

impl Phase for Finished {
    fn phase(&self) -> SessionPhase {
        SessionPhase::Finished
    }

    fn on_client_connect(
        &mut self,
        _ctx: &SessionContext,
        client: ClientHandle,
    ) -> Result<Transition, SessionError> {
        reject(client, "match finishing");
        Ok(Transition::Stay)
    }

    fn on_match_ended(&mut self, ctx: &SessionContext) -> Result<Transition, SessionError> {
        Ok(Transition::Goto(SessionState::Matchmaking(Matchmaking::new(
            ctx,
        ))))
    }
}

enum SessionState {
    Matchmaking(Matchmaking),
    Ingame(Ingame),
    Finished(Finished),
}

impl SessionState {
    fn as_phase(&mut self) -> &mut dyn Phase {
        match self {
            SessionState::Matchmaking(state) => state,
            SessionState::Ingame(state) => state,
            SessionState::Finished(state) => state,
        }
    }

    fn phase(&self) -> SessionPhase {
        match self {
            SessionState::Matchmaking(_) => SessionPhase::Matchmaking,
            SessionState::Ingame(_) => SessionPhase::Ingame,
            SessionState::Finished(_) => SessionPhase::Finished,
        }
    }
}

/// The single game session of this server process.
pub struct Session {
    ctx: SessionContext,
    state: SessionState,
    matches_started: u64,
}

impl Session {
    pub fn new(
        config: GameConfig,
        orchestrator: Arc<dyn Orchestrator>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let ctx = SessionContext {
            config,
            orchestrator,
            events,
        };
        let state = SessionState::Matchmaking(Matchmaking::new(&ctx));
        Self {
            ctx,
            state,
            matches_started: 0,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    pub fn matches_started(&self) -> u64 {
        self.matches_started
    }

    /// Clients waiting in the lobby, or players attached to the match.
    pub fn player_count(&self) -> usize {
        match &self.state {
            SessionState::Matchmaking(state) => state.lobby.len(),
            SessionState::Ingame(state) => state.roster.len(),
            SessionState::Finished(_) => 0,
        }
    }

    /// Dispatches one event to the current phase.
    ///
    /// Unhandled (event, phase) pairs are logged and ignored; only
    /// orchestrator failures are returned.
    pub fn handle(&mut self, event: SessionEvent) -> Result<(), SessionError> {
        let from = self.phase();
        let kind = event.kind();
        let phase = self.state.as_phase();

        let result = match event {
            SessionEvent::ClientConnect(client) => phase.on_client_connect(&self.ctx, client),
            SessionEvent::ClientFinish { id } => phase.on_client_finish(&self.ctx, id),
            SessionEvent::MatchEnded => phase.on_match_ended(&self.ctx),
        };

        match result {
            Ok(Transition::Stay) => Ok(()),
            Ok(Transition::Goto(next)) => {
                let to = next.phase();
                if to == SessionPhase::Ingame {
                    self.matches_started += 1;
                }
                info!("Session {} -> {} on {:?}", from, to, kind);
                self.state = next;
                Ok(())
            }
            Err(error @ SessionError::HandlerNotFound { .. }) => {
                warn!("{}", error);
                Ok(())
            }
            Err(error) => Err(error),
        }
    }
}

/// Feeds events to the session until the channel closes or a hook fails.
pub async fn run_session(
    mut session: Session,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
) -> Result<(), SessionError> {
    while let Some(event) = events.recv().await {
        session.handle(event)?;
    }
    info!("Session event channel closed");
    Ok(())
}
