//! httpc
//!
//! Command-line HTTP/1.0 client speaking the reliable UDP transport.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand};
use courier::client::HttpClient;
use courier::http::{Request, Response};
use courier::SessionConfig;

#[derive(Debug, Parser)]
#[command(name = "httpc", version, about = "HTTP/1.0 client over a reliable UDP transport")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch a resource
    #[command(disable_help_flag = true)]
    Get(Common),
    /// Send data to a resource
    #[command(disable_help_flag = true)]
    Post(PostArgs),
}

#[derive(Debug, Args)]
struct Common {
    /// Print the status line and headers, and log protocol details
    #[arg(short, long)]
    verbose: bool,

    /// Extra header, repeatable
    #[arg(short = 'h', long = "header", value_name = "KEY:VALUE")]
    headers: Vec<String>,

    /// Write the response to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Send every datagram through this router
    #[arg(long, value_name = "ADDR")]
    router: Option<SocketAddr>,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,

    /// Target, e.g. http://localhost:8080/index.html
    url: String,
}

#[derive(Debug, Args)]
struct PostArgs {
    #[command(flatten)]
    common: Common,

    /// Inline body
    #[arg(short, long, conflicts_with = "file")]
    data: Option<String>,

    /// Read the body from a file
    #[arg(short, long, value_name = "FILE")]
    file: Option<PathBuf>,
}

fn build_request(command: &Command) -> courier::Result<Request> {
    let (common, mut request) = match command {
        Command::Get(common) => (common, Request::get(&common.url)?),
        Command::Post(args) => {
            let body = match (&args.data, &args.file) {
                (Some(data), _) => data.clone().into_bytes(),
                (None, Some(path)) => std::fs::read(path)?,
                (None, None) => Vec::new(),
            };
            (&args.common, Request::post(&args.common.url, body)?)
        }
    };

    for header in &common.headers {
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| courier::Error::MalformedRequest(format!("header {header:?} is not KEY:VALUE")))?;
        request = request.with_header(name.trim(), value.trim());
    }
    let body_len = request.body.as_ref().map(Vec::len);
    if let Some(length) = body_len.filter(|_| request.header("Content-Length").is_none()) {
        request = request.with_header("Content-Length", length.to_string());
    }
    Ok(request)
}

fn render(response: &Response, verbose: bool) -> Vec<u8> {
    let mut out = Vec::new();
    if verbose {
        out.extend_from_slice(format!("HTTP/1.0 {} {}\n", response.status, response.reason).as_bytes());
        for (name, value) in &response.headers {
            out.extend_from_slice(format!("{name}: {value}\n").as_bytes());
        }
        out.push(b'\n');
    }
    out.extend_from_slice(&response.body);
    out
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let common = match &cli.command {
        Command::Get(common) => common,
        Command::Post(args) => &args.common,
    };

    let default_level = if common.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let result = async {
        let request = build_request(&cli.command)?;
        let config = SessionConfig {
            router: common.router,
            ..SessionConfig::default()
        };
        let outcome = HttpClient::new(config)?.perform(request).await?;
        let rendered = render(&outcome.response, common.verbose);
        match &common.output {
            Some(path) => std::fs::write(path, rendered)?,
            None => {
                use std::io::Write;
                std::io::stdout().write_all(&rendered)?;
            }
        }
        courier::Result::Ok(())
    }
    .await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("httpc: {err}");
            ExitCode::FAILURE
        }
    }
}
