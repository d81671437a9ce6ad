//! ping-probe
//!
//! Minimal host program for `oversight-probe`: a single "ping" check that
//! reports whether a TCP connect to `host:port` succeeds, plus its round
//! trip time on success.

use std::time::Instant;

use clap::Parser;
use oversight_probe::{check_fn, CheckOutcome, Probe};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ping-probe", about = "Oversight probe: TCP reachability check")]
struct Cli {
    /// AgentCore host (overrides AGENTCORE_HOST).
    #[arg(long)]
    agentcore_host: Option<String>,

    /// AgentCore port (overrides AGENTCORE_PORT).
    #[arg(long)]
    agentcore_port: Option<u16>,

    /// Local config file path (overrides OVERSIGHT_CONF).
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut builder = Probe::builder("ping-probe", env!("CARGO_PKG_VERSION")).check(
        "ping",
        check_fn(|asset, asset_config, _check_config| async move {
            let target = asset_config
                .get("host")
                .cloned()
                .unwrap_or_else(|| asset.asset_name.clone());
            if target.is_empty() {
                return CheckOutcome::error("no target host configured for this asset");
            }
            ping_check(&target).await
        }),
    );

    if cli.agentcore_host.is_some() || cli.agentcore_port.is_some() {
        let host = cli
            .agentcore_host
            .unwrap_or_else(|| std::env::var("AGENTCORE_HOST").unwrap_or_else(|_| "127.0.0.1".into()));
        let port = cli.agentcore_port.unwrap_or(8750);
        builder = builder.coordinator(host, port);
    }
    if let Some(path) = cli.config {
        builder = builder.config_path(path);
    }

    let probe = builder.build();

    let shutdown = probe.shutdown_token();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received SIGINT, shutting down");
        shutdown.cancel();
    });

    tracing::info!("ping-probe starting");
    probe.run().await;
    tracing::info!("ping-probe stopped");
    Ok(())
}

async fn ping_check(target: &str) -> CheckOutcome {
    let addr = if target.contains(':') {
        target.to_string()
    } else {
        format!("{target}:80")
    };

    let started = Instant::now();
    match tokio::time::timeout(std::time::Duration::from_secs(5), tokio::net::TcpStream::connect(&addr)).await {
        Ok(Ok(_stream)) => {
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            let mut map = Vec::new();
            map.push((rmpv::Value::String("reachable".into()), rmpv::Value::Boolean(true)));
            map.push((
                rmpv::Value::String("rtt_ms".into()),
                rmpv::Value::F64(elapsed_ms),
            ));
            CheckOutcome::Result(rmpv::Value::Map(map))
        }
        Ok(Err(e)) => CheckOutcome::error(format!("connect failed: {e}")),
        Err(_) => CheckOutcome::error("connect timed out"),
    }
}
