//! One request to one source, reduced to a tagged outcome.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use cnops_client::{ClientError, Transport};

use super::{Payload, SourceSpec};

/// Why a source produced no usable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureReason {
    /// No response, a timeout, or a non-success status.
    #[serde(rename = "NetworkFailure")]
    Network,
    /// A response arrived but did not match the source's schema.
    #[serde(rename = "MalformedResponse")]
    Malformed,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Network => f.write_str("network failure"),
            FailureReason::Malformed => f.write_str("malformed response"),
        }
    }
}

/// The result of fetching one source once.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Ok(Payload),
    Failed {
        reason: FailureReason,
        message: String,
        /// The source's configured default.
        fallback: Payload,
    },
}

impl Outcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            Outcome::Ok(_) => None,
            Outcome::Failed { reason, .. } => Some(*reason),
        }
    }
}

/// Issues source requests over a shared transport.
///
/// Fetching never fails past this boundary: every error becomes an
/// [`Outcome::Failed`] carrying the source's default.
#[derive(Debug, Clone)]
pub struct SourceFetcher {
    transport: Arc<dyn Transport>,
}

impl SourceFetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Fetch one source.
    pub async fn fetch(&self, spec: &SourceSpec) -> Outcome {
        fetch(self.transport.as_ref(), spec).await
    }

    /// Fetch every source concurrently and return once all have settled.
    ///
    /// Dropping the returned future aborts the requests still in flight.
    pub async fn fetch_all(&self, specs: &[SourceSpec]) -> BTreeMap<String, Outcome> {
        let mut set = JoinSet::new();
        for spec in specs {
            let transport = self.transport.clone();
            let spec = spec.clone();
            set.spawn(async move {
                let outcome = fetch(transport.as_ref(), &spec).await;
                (spec.name().to_string(), outcome)
            });
        }

        let mut outcomes = BTreeMap::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((name, outcome)) => {
                    outcomes.insert(name, outcome);
                }
                Err(e) => warn!(error = %e, "source fetch task failed"),
            }
        }
        outcomes
    }
}

/// Fetch `spec` once over `transport`.
pub async fn fetch(transport: &dyn Transport, spec: &SourceSpec) -> Outcome {
    let failed = |reason: FailureReason, message: String| Outcome::Failed {
        reason,
        message,
        fallback: spec.default_payload().clone(),
    };

    let body = match transport.get(spec.path()).await {
        Ok(body) => body,
        Err(ClientError::Parse(e)) => {
            warn!(source = spec.name(), path = spec.path(), error = %e, "source returned unreadable body");
            return failed(FailureReason::Malformed, e);
        }
        Err(e @ ClientError::Unauthorized { .. }) => {
            warn!(source = spec.name(), path = spec.path(), error = %e, "source rejected credentials");
            return failed(FailureReason::Network, e.to_string());
        }
        Err(e) => {
            warn!(source = spec.name(), path = spec.path(), error = %e, "source unreachable");
            return failed(FailureReason::Network, e.to_string());
        }
    };

    match spec.projection().project(body) {
        Ok(payload) => {
            debug!(source = spec.name(), "source fetched");
            Outcome::Ok(payload)
        }
        Err(e) => {
            warn!(source = spec.name(), path = spec.path(), error = %e, "source returned malformed response");
            failed(FailureReason::Malformed, e)
        }
    }
}
