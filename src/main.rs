//! rexecd - Remote Command-Execution Server
//!
//! This is the main entry point for the rexecd server.
//! It parses arguments, sets up logging, starts the reactor, and waits for
//! Ctrl+C.

use anyhow::Context;
use rexecd::config::{Profile, ServerConfig, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_WORKERS};
use rexecd::{Server, ShellExecutor};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Parse configuration from command-line arguments
fn config_from_args() -> ServerConfig {
    let args: Vec<String> = std::env::args().collect();

    let mut profile = Profile::Open;
    let mut host = DEFAULT_HOST.to_string();
    let mut port = DEFAULT_PORT;
    let mut workers = DEFAULT_WORKERS;
    let mut username: Option<String> = None;
    let mut password: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--host" | "-h" => {
                host = take_value(&args, i);
                i += 2;
            }
            "--port" | "-p" => {
                port = take_value(&args, i).parse().unwrap_or_else(|_| {
                    eprintln!("Error: invalid port number");
                    std::process::exit(1);
                });
                i += 2;
            }
            "--workers" | "-w" => {
                workers = take_value(&args, i).parse().unwrap_or_else(|_| {
                    eprintln!("Error: invalid worker count");
                    std::process::exit(1);
                });
                i += 2;
            }
            "--profile" => {
                profile = take_value(&args, i).parse().unwrap_or_else(|e| {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                });
                i += 2;
            }
            "--user" => {
                username = Some(take_value(&args, i));
                i += 2;
            }
            "--password" => {
                password = Some(take_value(&args, i));
                i += 2;
            }
            "--help" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-v" => {
                println!("rexecd version {}", rexecd::VERSION);
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
    }

    ServerConfig {
        host,
        port,
        workers,
        ..ServerConfig::for_profile(profile)
    }
    .with_credentials(username, password)
}

/// Returns the value following the flag at `i`, or exits.
fn take_value(args: &[String], i: usize) -> String {
    args.get(i + 1).cloned().unwrap_or_else(|| {
        eprintln!("Error: {} requires a value", args[i]);
        std::process::exit(1);
    })
}

fn print_help() {
    println!(
        r#"
rexecd - Remote Command-Execution Server

USAGE:
    rexecd [OPTIONS]

OPTIONS:
    -h, --host <HOST>         Host to bind to (default: {host})
    -p, --port <PORT>         Port to listen on (default: {port})
    -w, --workers <N>         Worker threads (default: {workers})
        --profile <PROFILE>   open | auth | http (default: open)
        --user <NAME>         Username for the handshake (enables it, ends on DISCONNECT)
        --password <PASS>     Password for the handshake (enables it, ends on DISCONNECT)
    -v, --version             Print version information
        --help                Print this help message

EXAMPLES:
    rexecd                          # Open profile on port {port}
    rexecd --profile auth           # Require admin/password
    rexecd --profile http -p 8000   # One command per HTTP response

CONNECTING:
    $ nc 127.0.0.1 {port}
    echo hello
    hello
"#,
        host = DEFAULT_HOST,
        port = DEFAULT_PORT,
        workers = DEFAULT_WORKERS,
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = config_from_args();

    // Set up logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let auth_enabled = config.credentials.is_some();
    let framing = config.framing;
    let address = config.bind_address();

    let server = Server::bind(config, Arc::new(ShellExecutor::new()))
        .inspect_err(|e| error!(error = %e, "Server setup failed"))
        .with_context(|| format!("failed to start server on {}", address))?;

    info!(
        addr = %server.local_addr(),
        auth = auth_enabled,
        framing = ?framing,
        "rexecd v{} ready to accept connections",
        rexecd::VERSION
    );

    let handle = server.spawn().context("failed to start reactor thread")?;

    signal::ctrl_c()
        .await
        .context("failed to install Ctrl+C handler")?;
    info!("Shutdown signal received, stopping server...");

    tokio::task::spawn_blocking(move || handle.shutdown())
        .await
        .context("shutdown task failed")??;

    info!("Server shutdown complete");
    Ok(())
}
