use clap::Parser;
use log::info;
use server::game::GameConfig;
use server::network::{Server, ServerConfig};
use server::orchestrator::OrchestratorKind;
use shared::{
    DEFAULT_HEIGHT, DEFAULT_MATCH_SIZE, DEFAULT_TICK_MS, DEFAULT_WIDTH, INITIAL_SIZE,
};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Interface to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Board width in cells
    #[arg(long, default_value_t = DEFAULT_WIDTH)]
    width: usize,

    /// Board height in cells (no short flag to avoid conflict with --help)
    #[arg(long, default_value_t = DEFAULT_HEIGHT)]
    height: usize,

    /// Players needed to start a match
    #[arg(short, long, default_value_t = DEFAULT_MATCH_SIZE)]
    match_size: usize,

    /// Milliseconds between simulation ticks
    #[arg(short, long, default_value_t = DEFAULT_TICK_MS)]
    tick_ms: u64,

    /// Length of a freshly spawned snake
    #[arg(long, default_value_t = INITIAL_SIZE)]
    initial_size: i32,

    /// Seconds between orchestrator health pings
    #[arg(long, default_value = "2")]
    health_interval_secs: u64,

    /// Seed apple and spawn placement for reproducible matches
    #[arg(long)]
    seed: Option<u64>,

    /// Hosting platform integration
    #[arg(long, value_enum, default_value_t = OrchestratorKind::Nop)]
    orchestrator: OrchestratorKind,
}

impl Args {
    fn validate(&self) -> Result<(), String> {
        if self.width < 2 || self.height < 2 {
            return Err(format!(
                "board must be at least 2x2, got {}x{}",
                self.width, self.height
            ));
        }
        if self.match_size == 0 {
            return Err("match size must be at least 1".to_string());
        }
        if self.tick_ms == 0 || self.health_interval_secs == 0 {
            return Err("tick and health intervals must be positive".to_string());
        }
        if self.initial_size < 1 {
            return Err("initial snake size must be at least 1".to_string());
        }
        // every snake needs its body plus a free first step, and one cell is
        // left for the apple
        let needed = self.match_size * (self.initial_size as usize + 1) + 1;
        if self.width * self.height < needed {
            return Err(format!(
                "a {}x{} board cannot seat {} snakes of size {}",
                self.width, self.height, self.match_size, self.initial_size
            ));
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    args.validate()?;

    let config = ServerConfig {
        addr: format!("{}:{}", args.host, args.port),
        game: GameConfig {
            width: args.width,
            height: args.height,
            match_size: args.match_size,
            tick_interval: Duration::from_millis(args.tick_ms),
            initial_size: args.initial_size,
            seed: args.seed,
        },
        health_interval: Duration::from_secs(args.health_interval_secs),
    };

    info!("Starting server with {:?} orchestrator", args.orchestrator);
    let server = Server::bind(config, args.orchestrator.build()).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
