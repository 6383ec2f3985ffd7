//! Cross-venue arbitrage executor.
//!
//! Watches top-of-book on a front-end-bridged venue and a directly-integrated
//! backend venue, learns an adaptive spread threshold, and fires a two-legged
//! hedge when the spread clears it.

use anyhow::{Context, Result};
use arbxbot::book::BookStore;
use arbxbot::bridge::BridgeServer;
use arbxbot::config::{Cli, Config};
use arbxbot::coordinator::Coordinator;
use arbxbot::datalog::SessionLogger;
use arbxbot::latency::LatencyMeter;
use arbxbot::notify::Notifier;
use arbxbot::position::PositionLedger;
use arbxbot::risk::{RiskGate, RiskLimits};
use arbxbot::signal::SignalEngine;
use arbxbot::venue_l::VenueLClient;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn load_env() {
    let _ = dotenv::dotenv();
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    for candidate in [manifest_dir.join(".env"), manifest_dir.join("../.env")] {
        if candidate.exists() {
            let _ = dotenv::from_path(&candidate);
        }
    }
}

fn init_tracing(level: &str) {
    let default_directive = format!("arbxbot={}", level.to_lowercase());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    let cli = Cli::parse();
    let config = Config::from_env().apply_cli(&cli);
    init_tracing(&config.log_level);

    tracing::info!(ticker = %config.strategy.ticker, "arbitrage engine starting");

    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .context("failed to build HTTP client")?;

    let book = Arc::new(BookStore::new());
    let ledger = Arc::new(PositionLedger::new());
    let risk = Arc::new(RiskGate::new(RiskLimits {
        max_position: config.risk.max_position,
        max_imbalance: config.risk.max_position_imbalance,
        max_daily_loss: config.risk.max_daily_loss,
        max_error_rate: config.risk.max_error_rate,
    }));
    let latency = Arc::new(LatencyMeter::new());
    let signal_engine = Arc::new(SignalEngine::new(config.strategy.clone()));
    let (venue_l, venue_l_events) = VenueLClient::new(config.venue_l.clone(), http.clone(), book.clone());
    let venue_l = Arc::new(venue_l);
    let (bridge, bridge_events) = BridgeServer::new();
    let bridge = Arc::new(bridge);
    let notifier = Arc::new(Notifier::new(config.notifier.clone(), http.clone()));

    let session_id = uuid::Uuid::new_v4().to_string();
    let logger = Arc::new(
        SessionLogger::new(&config.log_dir, &config.strategy.ticker, &session_id)
            .context("failed to initialize session logger")?,
    );

    let coordinator = Arc::new(Coordinator::new(
        &config,
        book,
        ledger,
        risk,
        latency,
        signal_engine,
        venue_l.clone(),
        bridge.clone(),
        notifier,
        logger,
    ));

    let (venue_l_shutdown_tx, venue_l_shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
    let venue_l_task = {
        let venue_l = venue_l.clone();
        tokio::spawn(async move { venue_l.run(venue_l_shutdown_rx).await })
    };

    let bridge_task = {
        let bridge = bridge.clone();
        let host = config.server.host.clone();
        let port = config.server.port;
        tokio::spawn(async move {
            if let Err(err) = bridge.serve(&host, port).await {
                tracing::error!(error = %err, "bridge server exited");
            }
        })
    };

    let run_task = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.run(bridge_events, venue_l_events).await })
    };

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .context("failed to install SIGTERM handler")?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received SIGINT, shutting down");
            }
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM, shutting down");
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("received ctrl-c, shutting down");
    }

    coordinator.request_shutdown();
    let _ = run_task.await;
    let _ = venue_l_shutdown_tx.send(()).await;
    bridge_task.abort();
    venue_l_task.abort();

    Ok(())
}
