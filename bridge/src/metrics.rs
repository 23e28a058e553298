// Copyright (c) Hedera Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

use prometheus::{
    register_gauge_vec_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, GaugeVec, IntCounter, IntCounterVec, Registry,
};

#[derive(Clone, Debug)]
pub struct BridgeMetrics {
    pub(crate) transfers_ingested: IntCounter,
    pub(crate) transfers_duplicate: IntCounter,
    pub(crate) transfers_completed: IntCounter,
    pub(crate) transfers_failed: IntCounter,

    pub(crate) fees_computed: IntCounter,
    pub(crate) schedules_submitted: IntCounter,
    pub(crate) schedules_confirmed: IntCounter,
    pub(crate) schedules_failed: IntCounter,

    pub(crate) signatures_signed: IntCounter,
    pub(crate) signatures_verified: IntCounter,
    pub(crate) signatures_duplicate: IntCounter,
    pub(crate) signatures_unauthorized: IntCounter,

    pub(crate) quorum_reached: IntCounter,
    // signatures collected / member count, per target chain
    pub(crate) participation_rate: GaugeVec,

    pub(crate) mirror_queries: IntCounterVec,
    pub(crate) mirror_query_errors: IntCounterVec,

    // keyed by BridgeError::error_type()
    pub(crate) errors: IntCounterVec,
}

impl BridgeMetrics {
    pub fn new(registry: &Registry) -> Self {
        Self {
            transfers_ingested: register_int_counter_with_registry!(
                "bridge_transfers_ingested",
                "Total number of transfer events ingested",
                registry,
            )
            .unwrap(),
            transfers_duplicate: register_int_counter_with_registry!(
                "bridge_transfers_duplicate",
                "Total number of redelivered transfer events skipped by the idempotence guard",
                registry,
            )
            .unwrap(),
            transfers_completed: register_int_counter_with_registry!(
                "bridge_transfers_completed",
                "Total number of transfers that reached COMPLETED",
                registry,
            )
            .unwrap(),
            transfers_failed: register_int_counter_with_registry!(
                "bridge_transfers_failed",
                "Total number of transfers that reached FAILED",
                registry,
            )
            .unwrap(),
            fees_computed: register_int_counter_with_registry!(
                "bridge_fees_computed",
                "Total number of bridge fees computed",
                registry,
            )
            .unwrap(),
            schedules_submitted: register_int_counter_with_registry!(
                "bridge_schedules_submitted",
                "Total number of scheduled transactions submitted",
                registry,
            )
            .unwrap(),
            schedules_confirmed: register_int_counter_with_registry!(
                "bridge_schedules_confirmed",
                "Total number of scheduled transactions confirmed executed",
                registry,
            )
            .unwrap(),
            schedules_failed: register_int_counter_with_registry!(
                "bridge_schedules_failed",
                "Total number of scheduled transactions that failed",
                registry,
            )
            .unwrap(),
            signatures_signed: register_int_counter_with_registry!(
                "bridge_signatures_signed",
                "Total number of authorization payloads signed by this node",
                registry,
            )
            .unwrap(),
            signatures_verified: register_int_counter_with_registry!(
                "bridge_signatures_verified",
                "Total number of peer signatures verified and stored",
                registry,
            )
            .unwrap(),
            signatures_duplicate: register_int_counter_with_registry!(
                "bridge_signatures_duplicate",
                "Total number of duplicate peer signatures ignored",
                registry,
            )
            .unwrap(),
            signatures_unauthorized: register_int_counter_with_registry!(
                "bridge_signatures_unauthorized",
                "Total number of signatures recovering to non-members",
                registry,
            )
            .unwrap(),
            quorum_reached: register_int_counter_with_registry!(
                "bridge_quorum_reached",
                "Total number of transfers completed by signature quorum",
                registry,
            )
            .unwrap(),
            participation_rate: register_gauge_vec_with_registry!(
                "bridge_participation_rate",
                "Collected signatures over member count for the latest quorum check",
                &["chain_id"],
                registry,
            )
            .unwrap(),
            mirror_queries: register_int_counter_vec_with_registry!(
                "bridge_mirror_queries",
                "Total number of mirror node queries",
                &["endpoint"],
                registry,
            )
            .unwrap(),
            mirror_query_errors: register_int_counter_vec_with_registry!(
                "bridge_mirror_query_errors",
                "Total number of failed mirror node queries",
                &["endpoint"],
                registry,
            )
            .unwrap(),
            errors: register_int_counter_vec_with_registry!(
                "bridge_errors",
                "Total number of errors by type",
                &["type"],
                registry,
            )
            .unwrap(),
        }
    }

    pub fn record_error(&self, error: &crate::error::BridgeError) {
        self.errors.with_label_values(&[error.error_type()]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;

    #[test]
    fn test_metrics_register_on_fresh_registry() {
        let registry = Registry::new();
        let metrics = BridgeMetrics::new(&registry);
        metrics.transfers_ingested.inc();
        metrics.record_error(&BridgeError::NotFound("x".into()));
        metrics
            .participation_rate
            .with_label_values(&["80001"])
            .set(0.75);

        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "bridge_transfers_ingested"));
        assert!(families.iter().any(|f| f.get_name() == "bridge_errors"));
    }
}
