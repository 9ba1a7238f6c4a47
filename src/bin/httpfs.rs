//! httpfs
//!
//! File server speaking the reliable UDP transport. Serves one session at a
//! time from a directory.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use courier::core::constants::DEFAULT_HTTP_PORT;
use courier::server::{Server, ServerConfigBuilder};

#[derive(Debug, Parser)]
#[command(name = "httpfs", version, about = "File server over a reliable UDP transport")]
struct Args {
    /// Log every frame
    #[arg(short, long)]
    verbose: bool,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_HTTP_PORT)]
    port: u16,

    /// Directory to serve
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    directory: PathBuf,

    /// Send every datagram through this router
    #[arg(long, value_name = "ADDR")]
    router: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(true)
        .init();

    let mut builder = ServerConfigBuilder::new().port(args.port).root(&args.directory);
    if let Some(router) = args.router {
        builder = builder.router(router);
    }

    let result = async {
        let config = builder.build()?;
        let mut server = Server::bind(&config).await?;
        tracing::info!(root = %config.root.display(), "serving");
        server.run().await
    }
    .await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "server stopped");
            ExitCode::FAILURE
        }
    }
}
