use clap::Parser;
use env_logger::Env;
use log::{error, info};
use server::network::ChatServer;
use std::net::{IpAddr, SocketAddr};

/// Parses command-line arguments, binds the listener and serves until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// IP address to bind to
        #[clap(short = 'H', long, default_value = "0.0.0.0")]
        host: IpAddr,
        /// Port to listen on
        #[clap(short, long, default_value_t = shared::DEFAULT_PORT)]
        port: u16,
    }

    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let address = SocketAddr::new(args.host, args.port);

    let server = match ChatServer::bind(address).await {
        Ok(server) => server,
        Err(e) => {
            error!("Server error: {}", e);
            return Err(e.into());
        }
    };

    server
        .run_until(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C, shutting down"),
                Err(e) => {
                    error!("Could not listen for Ctrl+C: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        })
        .await;

    Ok(())
}
