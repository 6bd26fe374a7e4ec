//! Stratum HTTP Gateway
//!
//! Serves the Stratum method set over JSON-RPC/HTTP with cookie sessions.
//! A demo chain mines a block every `--block-interval-secs`; sessions that
//! called `blockchain.numblocks.subscribe` see the new height on their next poll.
//!
//! Usage:
//! ```bash
//! RUST_LOG=info cargo run --package stratum-http-gateway -- --bind 127.0.0.1:8081
//!
//! curl -i -c jar -b jar -d '{"id":1,"method":"blockchain.numblocks.subscribe","params":[]}' http://127.0.0.1:8081/
//! curl -i -c jar -b jar http://127.0.0.1:8081/
//! ```

mod backend;

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stratum_http_server::HttpRpcServer;

use crate::backend::{DemoBackend, GATEWAY_METHODS};

const DEFAULT_LOG_FILTER: &str =
    "stratum_http_gateway=info,stratum_http_server=info,stratum_session_storage=info";

/// Command-line arguments for the gateway
#[derive(Parser, Debug)]
#[command(name = "stratum-http-gateway")]
#[command(about = "Session-aware Stratum JSON-RPC over HTTP gateway")]
struct Args {
    /// Address to bind the server to
    #[arg(short, long, default_value = "127.0.0.1:8081")]
    bind: SocketAddr,

    /// Path answering RPC traffic (repeatable)
    #[arg(long = "rpc-path", default_values = ["/", "/RPC2"])]
    rpc_paths: Vec<String>,

    /// Text returned by server.banner
    #[arg(long, default_value = "Welcome to the Stratum HTTP gateway")]
    banner: String,

    /// Idle minutes before a session and its queue are dropped
    #[arg(long, default_value_t = 30)]
    session_expiry_minutes: u64,

    /// Seconds between demo blocks
    #[arg(long, default_value_t = 60)]
    block_interval_secs: u64,

    /// Include handler diagnostics in internal-error faults
    #[arg(long)]
    verbose_errors: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let backend = DemoBackend::new(args.banner);

    let server = HttpRpcServer::builder()
        .bind_address(args.bind)
        .rpc_paths(args.rpc_paths)
        .session_expiry_minutes(args.session_expiry_minutes)
        .expose_internal_errors(args.verbose_errors)
        .register_handler(GATEWAY_METHODS, backend.clone())
        .build()?;

    let shutdown = server.shutdown_token();

    let ticker = tokio::spawn(backend.run_block_ticker(
        Duration::from_secs(args.block_interval_secs.max(1)),
        shutdown.clone(),
    ));

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, shutting down");
                shutdown.cancel();
            }
        }
    });

    let result = server.run().await;
    shutdown.cancel();
    ticker.await?;
    result?;
    Ok(())
}
