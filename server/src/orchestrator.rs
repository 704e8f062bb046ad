//! Hooks into the environment that hosts the game server
//!
//! A hosting platform is told when the server is ready, when a match claims
//! the server, and when the match is over; it is also pinged periodically.
//! Any hook failure is fatal to the process.

use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("{hook} hook failed: {reason}")]
    HookFailed { hook: &'static str, reason: String },
}

pub trait Orchestrator: Send + Sync {
    /// The server is accepting connections.
    fn ready(&self) -> Result<(), OrchestratorError>;
    /// A match is starting on this server.
    fn allocate(&self) -> Result<(), OrchestratorError>;
    /// The match on this server is over.
    fn shutdown(&self) -> Result<(), OrchestratorError>;
    /// Periodic liveness report.
    fn health(&self) -> Result<(), OrchestratorError>;
}

/// Standalone deployments: every hook succeeds silently.
#[derive(Debug, Default, Clone, Copy)]
pub struct NopOrchestrator;

impl Orchestrator for NopOrchestrator {
    fn ready(&self) -> Result<(), OrchestratorError> {
        Ok(())
    }

    fn allocate(&self) -> Result<(), OrchestratorError> {
        Ok(())
    }

    fn shutdown(&self) -> Result<(), OrchestratorError> {
        Ok(())
    }

    fn health(&self) -> Result<(), OrchestratorError> {
        Ok(())
    }
}

/// Logs each hook call, for running outside a hosting platform.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingOrchestrator;

impl Orchestrator for LoggingOrchestrator {
    fn ready(&self) -> Result<(), OrchestratorError> {
        info!("Orchestrator: server ready");
        Ok(())
    }

    fn allocate(&self) -> Result<(), OrchestratorError> {
        info!("Orchestrator: server allocated to a match");
        Ok(())
    }

    fn shutdown(&self) -> Result<(), OrchestratorError> {
        info!("Orchestrator: match over, server released");
        Ok(())
    }

    fn health(&self) -> Result<(), OrchestratorError> {
        debug!("Orchestrator: health ping");
        Ok(())
    }
}

/// Selects an orchestrator on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OrchestratorKind {
    #[default]
    Nop,
    Log,
}

impl OrchestratorKind {
    pub fn build(self) -> Arc<dyn Orchestrator> {
        match self {
            OrchestratorKind::Nop => Arc::new(NopOrchestrator),
            OrchestratorKind::Log => Arc::new(LoggingOrchestrator),
        }
    }
}

/// Pings `health` every `every` until a ping fails.
pub async fn run_health_pings(
    orchestrator: Arc<dyn Orchestrator>,
    every: Duration,
) -> Result<(), OrchestratorError> {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        orchestrator.health()?;
    }
}
