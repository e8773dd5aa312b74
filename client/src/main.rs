use clap::Parser;
use log::{error, info, warn};
use rcon_client::{ConnectionConfig, ConnectionEvent, ConnectionHandle, Connector, ProtocolVariant};
use rcon_shared::{join, tokenize, Origin};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// RCON address of the game server
    #[arg(short = 'a', long, default_value = "127.0.0.1:47200")]
    address: String,

    /// Log in with this password before sending anything
    #[arg(short = 'p', long)]
    password: Option<String>,

    /// Game generation: frostbite1 (bfbc2, moh) or frostbite2 (bf3, bf4)
    #[arg(long, default_value = "frostbite2")]
    variant: ProtocolVariant,

    /// Seconds to wait for each response
    #[arg(short = 't', long, default_value = "15")]
    timeout: u64,

    /// Seconds without traffic before a logged-in connection is dropped
    #[arg(long, default_value = "120")]
    stale_after: u64,

    /// Print server events until interrupted once the commands are done
    #[arg(short = 'f', long)]
    follow: bool,

    /// Commands to send, e.g. 'serverInfo' 'admin.say "hello all" all'.
    /// Reads one command per line from stdin when none are given.
    commands: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let mut config = ConnectionConfig::new(&args.address).with_variant(args.variant);
    config.action_timeout = Duration::from_secs(args.timeout);
    config.request_timeout = Duration::from_secs(args.timeout);
    config.stale_after = Duration::from_secs(args.stale_after);

    let connection = Connector::new(config).connect().await?;
    spawn_event_printer(&connection)?;

    if let Some(password) = &args.password {
        if !connection.login(password).await? {
            error!("Login to {} was rejected", args.address);
            connection.shutdown()?;
            return Err("login rejected".into());
        }
        info!("Logged in to {}", args.address);
    }

    if args.commands.is_empty() {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            run_command(&connection, &line).await?;
        }
    } else {
        for command in &args.commands {
            run_command(&connection, command).await?;
        }
    }

    if args.follow {
        info!("Following server events, press Ctrl-C to stop");
        tokio::signal::ctrl_c().await?;
    }

    connection.shutdown()?;
    Ok(())
}

async fn run_command(connection: &ConnectionHandle, line: &str) -> Result<(), Box<dyn std::error::Error>> {
    let words = tokenize(line);
    if words.is_empty() {
        return Ok(());
    }

    match connection.request(words).await {
        Ok(response) => println!("{}", join(&response.words)),
        Err(rcon_client::ConnectionError::Expired { command }) => {
            warn!("No response to {}", command);
            println!("(no response)");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn spawn_event_printer(connection: &ConnectionHandle) -> Result<(), Box<dyn std::error::Error>> {
    let mut events = connection.subscribe()?;
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ConnectionEvent::PacketReceived(packet) if packet.origin == Origin::Server => {
                    println!("* {}", join(&packet.words));
                }
                ConnectionEvent::SocketException { message } => error!("Socket error: {}", message),
                ConnectionEvent::ConnectionFailure { reason } => error!("Connection lost: {}", reason),
                _ => {}
            }
        }
    });
    Ok(())
}
