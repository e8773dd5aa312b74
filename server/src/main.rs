use clap::Parser;
use log::info;
use rcon_server::{MockServer, MockServerConfig};
use rcon_shared::BanLayout;
use std::time::Duration;

/// Runs a mock Frostbite RCON server for manual and scripted testing
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "47200")]
    port: u16,

    /// Password accepted by login.plainText
    #[arg(long, default_value = "secret")]
    password: String,

    /// Milliseconds to wait before writing each response
    #[arg(short = 'd', long, default_value = "0")]
    delay_ms: u64,

    /// Probability (0.0 to 1.0) that a response is never sent
    #[arg(long, default_value = "0.0")]
    drop_rate: f64,

    /// Seed for the drop decisions
    #[arg(long)]
    seed: Option<u64>,

    /// Seconds of silence before a session is closed
    #[arg(long, default_value = "300")]
    idle_timeout: u64,

    /// Maximum concurrent sessions
    #[arg(short = 'm', long, default_value = "16")]
    max_sessions: usize,

    /// Report bans in the five-word Frostbite 1 layout
    #[arg(long)]
    five_word_bans: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = MockServerConfig {
        address: format!("{}:{}", args.host, args.port),
        password: args.password,
        response_delay: Duration::from_millis(args.delay_ms),
        drop_rate: args.drop_rate.clamp(0.0, 1.0),
        seed: args.seed,
        idle_timeout: Duration::from_secs(args.idle_timeout),
        max_sessions: args.max_sessions,
        ban_layout: if args.five_word_bans {
            BanLayout::FiveWord
        } else {
            BanLayout::SixWord
        },
    };

    info!("Starting mock server...");
    let server = MockServer::bind(config).await?;
    let handle = server.handle();
    let server_task = tokio::spawn(server.run());

    tokio::select! {
        result = server_task => {
            result??;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            handle.shutdown();
        }
    }

    Ok(())
}
