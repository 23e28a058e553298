// Copyright (c) Hedera Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Thin typed REST client for the mirror node.
//!
//! Only the four queries the core consumes. Failures map to
//! `UpstreamUnavailable` and are retried by the caller's poll loop; a 404 on
//! an entity lookup maps to `NotFound`/`None` since "not visible yet" is a
//! legitimate state on an eventually-consistent read API.

use crate::clients::{MirrorClient, MirrorSchedule, MirrorTransaction};
use crate::error::{BridgeError, BridgeResult};
use crate::metrics::BridgeMetrics;
use async_trait::async_trait;
use hedera_bridge_types::{EntityId, Timestamp};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

const TRANSACTIONS_PAGE_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
struct TransactionsResponse {
    #[serde(default)]
    transactions: Vec<MirrorTransaction>,
}

pub struct RestMirrorClient {
    http: reqwest::Client,
    base_url: Url,
    metrics: Arc<BridgeMetrics>,
}

impl RestMirrorClient {
    pub fn new(base_url: &str, metrics: Arc<BridgeMetrics>) -> BridgeResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| BridgeError::InvalidInput(format!("invalid mirror base url: {}", e)))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            metrics,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        path_and_query: &str,
    ) -> BridgeResult<Option<T>> {
        self.metrics.mirror_queries.with_label_values(&[endpoint]).inc();
        let url = self.base_url.join(path_and_query).map_err(|e| {
            BridgeError::InvalidInput(format!("invalid mirror path {}: {}", path_and_query, e))
        })?;
        let response = self.http.get(url).send().await.map_err(|e| {
            self.metrics
                .mirror_query_errors
                .with_label_values(&[endpoint])
                .inc();
            BridgeError::UpstreamUnavailable(format!("mirror {} request failed: {}", endpoint, e))
        })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            self.metrics
                .mirror_query_errors
                .with_label_values(&[endpoint])
                .inc();
            return Err(BridgeError::UpstreamUnavailable(format!(
                "mirror {} returned {}",
                endpoint,
                response.status()
            )));
        }

        let body = response.json::<T>().await.map_err(|e| {
            self.metrics
                .mirror_query_errors
                .with_label_values(&[endpoint])
                .inc();
            BridgeError::UpstreamUnavailable(format!("mirror {} decode failed: {}", endpoint, e))
        })?;
        Ok(Some(body))
    }
}

#[async_trait]
impl MirrorClient for RestMirrorClient {
    async fn account_transactions_after(
        &self,
        account: &EntityId,
        after: Timestamp,
    ) -> BridgeResult<Vec<MirrorTransaction>> {
        let path = format!(
            "api/v1/transactions?account.id={}&timestamp=gt:{}&order=asc&limit={}",
            account, after, TRANSACTIONS_PAGE_LIMIT
        );
        let response: Option<TransactionsResponse> =
            self.get_json("account_transactions", &path).await?;
        Ok(response.map(|r| r.transactions).unwrap_or_default())
    }

    async fn scheduled_transaction(
        &self,
        transaction_id: &str,
    ) -> BridgeResult<Option<MirrorTransaction>> {
        let path = format!("api/v1/transactions/{}?scheduled=true", transaction_id);
        let response: Option<TransactionsResponse> =
            self.get_json("scheduled_transaction", &path).await?;
        Ok(response.and_then(|r| r.transactions.into_iter().next()))
    }

    async fn schedule(&self, schedule_id: &str) -> BridgeResult<MirrorSchedule> {
        let path = format!("api/v1/schedules/{}", schedule_id);
        let response: Option<MirrorSchedule> = self.get_json("schedule", &path).await?;
        response.ok_or_else(|| BridgeError::NotFound(format!("schedule {}", schedule_id)))
    }

    async fn nft_transactions(
        &self,
        token_id: &str,
        serial_number: i64,
    ) -> BridgeResult<Vec<MirrorTransaction>> {
        let path = format!(
            "api/v1/tokens/{}/nfts/{}/transactions",
            token_id, serial_number
        );
        let response: Option<TransactionsResponse> =
            self.get_json("nft_transactions", &path).await?;
        Ok(response.map(|r| r.transactions).unwrap_or_default())
    }
}
