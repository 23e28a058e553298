// Copyright (c) Hedera Bridge Contributors
// SPDX-License-Identifier: Apache-2.0

use hedera_bridge_types::base_types::ParseError;
use hedera_bridge_types::memo::MemoError;
use hedera_bridge_types::topic::TopicDecodeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    // Row absent - often a legitimate "not yet arrived" state handled by retry
    NotFound(String),
    // Malformed transaction memo - permanently rejects the deposit
    InvalidMemo(String),
    // Malformed signature/amount/address - permanently rejects that message
    InvalidInput(String),
    // Chain id outside the configured routes
    InvalidChainId(u64),
    // Signature recovers to an identity outside the member set
    UnauthorizedSigner(String),
    // Signature already stored - benign, mapped to success at the service boundary
    DuplicateSignature(String),
    // Mirror/ledger RPC failure - retried, never surfaced to callers
    UpstreamUnavailable(String),
    // A scheduled transaction was mined but did not succeed
    ScheduleExecutionFailed(String),
    // Repository write error - the triggering transition is abandoned for
    // this attempt and corrected by the startup recovery pass
    PersistenceFailure(String),
    // Uncategorized error
    Generic(String),
}

impl BridgeError {
    /// Returns a short string identifying the error type for metrics labels
    pub fn error_type(&self) -> &'static str {
        match self {
            BridgeError::NotFound(_) => "not_found",
            BridgeError::InvalidMemo(_) => "invalid_memo",
            BridgeError::InvalidInput(_) => "invalid_input",
            BridgeError::InvalidChainId(_) => "invalid_chain_id",
            BridgeError::UnauthorizedSigner(_) => "unauthorized_signer",
            BridgeError::DuplicateSignature(_) => "duplicate_signature",
            BridgeError::UpstreamUnavailable(_) => "upstream_unavailable",
            BridgeError::ScheduleExecutionFailed(_) => "schedule_execution_failed",
            BridgeError::PersistenceFailure(_) => "persistence_failure",
            BridgeError::Generic(_) => "generic",
        }
    }

    /// Whether the condition is permanent for the triggering message, as
    /// opposed to retriable/benign.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            BridgeError::InvalidMemo(_)
                | BridgeError::InvalidInput(_)
                | BridgeError::InvalidChainId(_)
                | BridgeError::UnauthorizedSigner(_)
        )
    }
}

impl std::fmt::Display for BridgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeError::NotFound(s) => write!(f, "not found: {}", s),
            BridgeError::InvalidMemo(s) => write!(f, "invalid memo: {}", s),
            BridgeError::InvalidInput(s) => write!(f, "invalid input: {}", s),
            BridgeError::InvalidChainId(id) => write!(f, "invalid chain id: {}", id),
            BridgeError::UnauthorizedSigner(s) => write!(f, "unauthorized signer: {}", s),
            BridgeError::DuplicateSignature(s) => write!(f, "duplicate signature: {}", s),
            BridgeError::UpstreamUnavailable(s) => write!(f, "upstream unavailable: {}", s),
            BridgeError::ScheduleExecutionFailed(s) => {
                write!(f, "scheduled execution failed: {}", s)
            }
            BridgeError::PersistenceFailure(s) => write!(f, "persistence failure: {}", s),
            BridgeError::Generic(s) => write!(f, "{}", s),
        }
    }
}

impl std::error::Error for BridgeError {}

impl From<MemoError> for BridgeError {
    fn from(e: MemoError) -> Self {
        BridgeError::InvalidMemo(e.to_string())
    }
}

impl From<ParseError> for BridgeError {
    fn from(e: ParseError) -> Self {
        BridgeError::InvalidInput(e.to_string())
    }
}

impl From<TopicDecodeError> for BridgeError {
    fn from(e: TopicDecodeError) -> Self {
        BridgeError::InvalidInput(e.to_string())
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_type_labels() {
        let errors = vec![
            (BridgeError::NotFound("t".into()), "not_found"),
            (BridgeError::InvalidMemo("t".into()), "invalid_memo"),
            (BridgeError::InvalidInput("t".into()), "invalid_input"),
            (BridgeError::InvalidChainId(9), "invalid_chain_id"),
            (
                BridgeError::UnauthorizedSigner("t".into()),
                "unauthorized_signer",
            ),
            (
                BridgeError::DuplicateSignature("t".into()),
                "duplicate_signature",
            ),
            (
                BridgeError::UpstreamUnavailable("t".into()),
                "upstream_unavailable",
            ),
            (
                BridgeError::ScheduleExecutionFailed("t".into()),
                "schedule_execution_failed",
            ),
            (
                BridgeError::PersistenceFailure("t".into()),
                "persistence_failure",
            ),
            (BridgeError::Generic("t".into()), "generic"),
        ];
        for (error, expected) in errors {
            assert_eq!(error.error_type(), expected, "mismatch for {:?}", error);
        }
    }

    /// error_type values are used as Prometheus label values and must stay
    /// lowercase/underscore-only
    #[test]
    fn test_error_type_valid_prometheus_labels() {
        let errors = vec![
            BridgeError::NotFound("x".into()),
            BridgeError::InvalidMemo("x".into()),
            BridgeError::UpstreamUnavailable("x".into()),
            BridgeError::PersistenceFailure("x".into()),
        ];
        for error in errors {
            let label = error.error_type();
            assert!(!label.is_empty());
            for c in label.chars() {
                assert!(
                    c.is_ascii_lowercase() || c == '_',
                    "label '{}' has invalid char '{}'",
                    label,
                    c
                );
            }
            assert!(!label.starts_with('_'));
            assert!(!label.ends_with('_'));
        }
    }

    #[test]
    fn test_error_type_payload_independence() {
        let a = BridgeError::UpstreamUnavailable("short".into());
        let b = BridgeError::UpstreamUnavailable("a much longer explanation".into());
        assert_eq!(a.error_type(), b.error_type());
    }

    #[test]
    fn test_permanence_classification() {
        assert!(BridgeError::InvalidMemo("m".into()).is_permanent());
        assert!(BridgeError::UnauthorizedSigner("s".into()).is_permanent());
        assert!(!BridgeError::NotFound("r".into()).is_permanent());
        assert!(!BridgeError::UpstreamUnavailable("u".into()).is_permanent());
        assert!(!BridgeError::DuplicateSignature("d".into()).is_permanent());
    }
}
