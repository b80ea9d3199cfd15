use clap::Parser;
use log::{error, info};
use server::config::GameConfig;
use server::network::Server;

/// Authoritative server for the multiplayer vertical platformer
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8081")]
    port: u16,
    /// Broadcast tick rate (updates per second)
    #[clap(short, long, default_value = "60")]
    tick_rate: u32,
    /// Maximum number of concurrent connections
    #[clap(short, long, default_value = "64")]
    max_clients: usize,
    /// Floors generated when a room starts
    #[clap(long, default_value = "15")]
    initial_floors: u32,
    /// Fixed seed for reproducible terrain
    #[clap(long)]
    seed: Option<u64>,
    /// Vertical distance between consecutive floors
    #[clap(long, default_value = "120")]
    base_spacing: f32,
    /// Width of the gap in split floors
    #[clap(long, default_value = "120")]
    gap_width: f32,
}

impl Args {
    fn game_config(&self) -> GameConfig {
        let mut config = GameConfig {
            tick_rate: self.tick_rate,
            max_clients: self.max_clients,
            initial_floors: self.initial_floors,
            seed: self.seed,
            ..GameConfig::default()
        };
        config.generator.base_spacing = self.base_spacing;
        config.generator.gap_width = self.gap_width;
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Hint: set RUST_LOG=info (or debug) to see server logs");
    }
    env_logger::init();

    let args = Args::parse();
    let address = format!("{}:{}", args.host, args.port);

    let mut server = Server::new(&address, args.game_config()).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
