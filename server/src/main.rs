use clap::Parser;
use log::info;
use server::network::{Server, ServerConfig};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8000")]
    port: u16,

    /// Maximum number of simultaneous connections across all channels
    #[arg(short, long, default_value = "256")]
    max_connections: usize,
}

/// Parses arguments, binds the relay and runs it until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=debug for detailed logging");
    }
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        max_connections: args.max_connections,
    };

    info!("Starting relay server on {}", config.address());
    let server = Server::bind(config).await?;
    let shutdown = server.shutdown_handle();
    let server_handle = tokio::spawn(server.run());

    tokio::select! {
        result = server_handle => {
            match result {
                Ok(Err(e)) => return Err(e.into()),
                Err(e) => return Err(e.into()),
                Ok(Ok(())) => {}
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
            let _ = shutdown.send(());
        }
    }

    Ok(())
}
