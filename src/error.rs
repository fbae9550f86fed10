//! Errors raised while configuring views and their components.
//!
//! Fetch failures never appear here: they are recorded in snapshots.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ViewError {
    #[error("a view needs at least one source")]
    NoSources,

    #[error("source `{0}` is configured more than once")]
    DuplicateSource(String),

    #[error("liveness source `{0}` is not one of the configured sources")]
    UnknownLiveness(String),

    #[error("poll interval must be greater than zero")]
    ZeroInterval,

    #[error("unknown view `{0}` (expected dashboard, instances, buckets, monitoring, advisor or cluster)")]
    UnknownView(String),

    #[error("unknown action `{0}`")]
    UnknownAction(String),

    #[error("the {view} view has no {action} action")]
    ActionUnavailable {
        view: &'static str,
        action: &'static str,
    },

    #[error("the {0} view has no selection")]
    NoSelection(&'static str),

    #[error("the {0} view is closed")]
    Closed(&'static str),
}
