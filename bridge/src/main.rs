// Copyright (c) Hedera Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;
use hedera_bridge::clients::mirror::RestMirrorClient;
use hedera_bridge::clients::UnconfiguredClient;
use hedera_bridge::config::ValidatorNodeConfig;
use hedera_bridge::metrics::BridgeMetrics;
use hedera_bridge::node::{Repositories, ValidatorNode};
use hedera_bridge::server::start_metrics_server;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(rename_all = "kebab-case")]
#[clap(name = env!("CARGO_BIN_NAME"))]
struct Args {
    #[clap(long)]
    pub config_path: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Invalid static configuration is the only hard-fail path.
    let config = ValidatorNodeConfig::load(&args.config_path)?;
    let cfg = Arc::new(config.validate()?);

    let registry = prometheus::Registry::new();
    let metrics = Arc::new(BridgeMetrics::new(&registry));
    start_metrics_server(registry, cfg.metrics_port);
    info!("Metrics server started at port {}", cfg.metrics_port);

    let mirror = Arc::new(RestMirrorClient::new(&cfg.mirror_base_url, metrics.clone())?);

    // The Hedera SDK and EVM contract clients are supplied by the embedding
    // deployment; the shipped binary runs against the read-only stand-in.
    let unconfigured = Arc::new(UnconfiguredClient);
    let cancel = CancellationToken::new();
    let (node, channels) = ValidatorNode::new(
        cfg,
        mirror,
        unconfigured.clone(),
        unconfigured.clone(),
        unconfigured,
        Repositories::in_memory(),
        metrics,
        cancel.clone(),
    );
    let handles = node.spawn();

    // The intake senders stay with the deployment's watchers; keep them
    // alive for the process lifetime.
    let _channels = channels;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, draining");
    cancel.cancel();
    for handle in handles {
        let _ = handle.await;
    }
    Ok(())
}
