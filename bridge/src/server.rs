// Copyright (c) Hedera Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Prometheus metrics endpoint.

use axum::routing::get;
use axum::Router;
use prometheus::{Registry, TextEncoder};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::task::JoinHandle;
use tracing::{error, info};

pub fn render_metrics(registry: &Registry) -> String {
    TextEncoder::new()
        .encode_to_string(&registry.gather())
        .unwrap_or_else(|e| format!("# metrics encoding failed: {}\n", e))
}

/// Serves `GET /metrics` on `0.0.0.0:{port}`.
pub fn start_metrics_server(registry: Registry, port: u16) -> JoinHandle<()> {
    tokio::spawn(async move {
        let app = Router::new().route(
            "/metrics",
            get(move || {
                let registry = registry.clone();
                async move { render_metrics(&registry) }
            }),
        );
        let address = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), port);
        let listener = match tokio::net::TcpListener::bind(address).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("[MetricsServer] Failed to bind {}: {}", address, e);
                return;
            }
        };
        info!("[MetricsServer] Serving metrics at {}/metrics", address);
        if let Err(e) = axum::serve(listener, app).await {
            error!("[MetricsServer] Server stopped: {}", e);
        }
    })
}
