use clap::Parser;
use log::{error, info};
use server::network::Server;
use server::registry::MatchRegistry;
use std::sync::Arc;

/// Main-method of the application.
/// Parses command-line arguments, then runs the match server until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Server port to listen on
        #[clap(short, long, default_value = "8080")]
        port: u16,
        /// Maximum number of concurrent matches
        #[clap(short, long, default_value_t = shared::MAX_MATCHES)]
        max_matches: usize,
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let registry = Arc::new(MatchRegistry::new(args.max_matches));

    let address = format!("{}:{}", args.host, args.port);
    let server = Server::new(&address, registry).await?;

    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            error!("Server error: {}", e);
        }
    });

    // Handle shutdown gracefully
    tokio::select! {
        result = server_handle => {
            if let Err(e) = result {
                error!("Server task panicked: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
