//! Folds one cycle of outcomes into an [`AggregatedView`].

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::snapshot::{now_ms, AggregatedView, OverallStatus, Snapshot};
use crate::error::ViewError;
use crate::source::{FailureReason, Outcome, SourceSpec};

/// What a failed source shows in place of fresh data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Show the source's configured default. Outages are visible as reset
    /// values.
    #[default]
    ResetToDefault,
    /// Keep showing the last value, flagged with the error. Falls back to
    /// the default when the source never succeeded.
    RetainLastGood,
}

impl FallbackPolicy {
    /// The snapshot that replaces `previous` once `outcome` arrives.
    pub fn apply(self, previous: Option<&Snapshot>, outcome: Outcome, now_ms: u64) -> Snapshot {
        match outcome {
            Outcome::Ok(data) => Snapshot {
                data,
                error: None,
                message: None,
                fetched_at_ms: Some(now_ms),
            },
            Outcome::Failed {
                reason,
                message,
                fallback,
            } => {
                let data = match (self, previous) {
                    (FallbackPolicy::RetainLastGood, Some(previous)) => previous.data.clone(),
                    _ => fallback,
                };
                Snapshot {
                    data,
                    error: Some(reason),
                    message: Some(message),
                    fetched_at_ms: Some(now_ms),
                }
            }
        }
    }
}

/// Merges per-source outcomes into views for a fixed set of sources.
#[derive(Debug, Clone)]
pub struct Aggregator {
    specs: Vec<SourceSpec>,
    liveness: String,
    policy: FallbackPolicy,
}

impl Aggregator {
    /// Validates that the sources are non-empty, uniquely named, and
    /// include the liveness source.
    pub fn new(
        specs: Vec<SourceSpec>,
        liveness: impl Into<String>,
        policy: FallbackPolicy,
    ) -> Result<Self, ViewError> {
        let liveness = liveness.into();
        if specs.is_empty() {
            return Err(ViewError::NoSources);
        }

        let mut seen = HashSet::new();
        for spec in &specs {
            if !seen.insert(spec.name()) {
                return Err(ViewError::DuplicateSource(spec.name().to_string()));
            }
        }
        if !seen.contains(liveness.as_str()) {
            return Err(ViewError::UnknownLiveness(liveness));
        }

        Ok(Self {
            specs,
            liveness,
            policy,
        })
    }

    pub fn specs(&self) -> &[SourceSpec] {
        &self.specs
    }

    pub fn liveness(&self) -> &str {
        &self.liveness
    }

    pub fn policy(&self) -> FallbackPolicy {
        self.policy
    }

    /// The view shown before the first cycle: every source at its default.
    pub fn initial_view(&self) -> AggregatedView {
        let sources = self
            .specs
            .iter()
            .map(|spec| {
                (
                    spec.name().to_string(),
                    Snapshot::initial(spec.default_payload().clone()),
                )
            })
            .collect();

        AggregatedView {
            cycle: 0,
            overall_status: OverallStatus::Unknown,
            liveness: self.liveness.clone(),
            sources,
        }
    }

    /// Build the view for `cycle` from `previous` and this cycle's outcomes.
    ///
    /// The result always holds exactly the configured sources. A configured
    /// source with no outcome counts as a network failure; outcomes for
    /// names that are not configured are dropped.
    pub fn merge(
        &self,
        previous: &AggregatedView,
        mut outcomes: BTreeMap<String, Outcome>,
        cycle: u64,
    ) -> AggregatedView {
        let now = now_ms();
        let mut sources = BTreeMap::new();

        for spec in &self.specs {
            let outcome = outcomes
                .remove(spec.name())
                .unwrap_or_else(|| Outcome::Failed {
                    reason: FailureReason::Network,
                    message: "no outcome".to_string(),
                    fallback: spec.default_payload().clone(),
                });
            let snapshot = self.policy.apply(previous.get(spec.name()), outcome, now);
            sources.insert(spec.name().to_string(), snapshot);
        }

        for name in outcomes.keys() {
            debug!(source = %name, cycle, "ignoring outcome for unconfigured source");
        }

        let overall_status = match sources.get(&self.liveness) {
            Some(snapshot) if snapshot.is_ok() => OverallStatus::Ok,
            _ => OverallStatus::Offline,
        };

        AggregatedView {
            cycle,
            overall_status,
            liveness: self.liveness.clone(),
            sources,
        }
    }
}
