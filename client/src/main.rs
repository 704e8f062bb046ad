use clap::Parser;
use client::network::Client;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to, `host:port` or a ws:// URL
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Seed for the steering bot
    #[arg(long)]
    seed: Option<u64>,

    /// Quit after this many snapshots
    #[arg(short = 'm', long)]
    max_ticks: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting headless client...");
    let mut client = Client::new(&args.server, args.seed, args.max_ticks);
    let summary = client.run().await?;

    info!(
        "Finished as {:?} after {} snapshots (size {:?})",
        summary.phase, summary.ticks_seen, summary.final_size
    );

    Ok(())
}
