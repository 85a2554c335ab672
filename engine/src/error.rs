use std::time::Duration;

use thiserror::Error;

use pocketctl_client::ApiError;
use pocketctl_types::{Health, ResourceKind, ResourceName};

/// Why a reconciliation cycle did not converge.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The referenced resource is not declared or has not been observed yet.
    /// The next pass retries.
    #[error("{field}: ref {target} {reason}")]
    ReferenceUnresolved {
        field: &'static str,
        target: ResourceName,
        reason: &'static str,
    },
    #[error("{field}: label selectors are not supported")]
    SelectorUnsupported { field: &'static str },
    #[error("{0}")]
    InvariantViolated(String),
    #[error("failed to {operation} {}: {source}", .kind.noun())]
    Api {
        operation: &'static str,
        kind: ResourceKind,
        #[source]
        source: ApiError,
    },
    #[error("cannot {operation} {}: remote object has no id", .kind.noun())]
    MissingIdentity {
        operation: &'static str,
        kind: ResourceKind,
    },
    #[error("{operation} {} returned an incomplete response", .kind.noun())]
    IncompleteResponse {
        operation: &'static str,
        kind: ResourceKind,
    },
    #[error("reconciling {} timed out after {}s", .kind.noun(), .after.as_secs())]
    TimedOut { kind: ResourceKind, after: Duration },
}

impl ReconcileError {
    /// Wraps a client error with the operation that produced it.
    pub(crate) fn api(
        operation: &'static str,
        kind: ResourceKind,
    ) -> impl FnOnce(ApiError) -> Self {
        move |source| Self::Api {
            operation,
            kind,
            source,
        }
    }

    /// Condition health recorded for this failure.
    #[must_use]
    pub fn health(&self) -> Health {
        match self {
            Self::ReferenceUnresolved { .. } => Health::Unresolved,
            Self::InvariantViolated(_) => Health::InvariantViolated,
            Self::SelectorUnsupported { .. }
            | Self::Api { .. }
            | Self::MissingIdentity { .. }
            | Self::IncompleteResponse { .. }
            | Self::TimedOut { .. } => Health::Unavailable,
        }
    }

    /// Whether another pass may succeed without a manifest change.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ReferenceUnresolved { .. }
            | Self::IncompleteResponse { .. }
            | Self::TimedOut { .. } => true,
            // Client errors other than throttling mean the request itself is wrong.
            Self::Api { source, .. } => source
                .status()
                .is_none_or(|status| !status.is_client_error() || status.as_u16() == 429),
            Self::SelectorUnsupported { .. }
            | Self::InvariantViolated(_)
            | Self::MissingIdentity { .. } => false,
        }
    }
}
