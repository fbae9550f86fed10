//! Snapshots, aggregated views, and the aggregator that folds outcomes
//! into them.
//!
//! ## Data Flow
//!
//! ```text
//! BTreeMap<name, Outcome>   (one poll cycle)
//!        │
//!        ▼
//! Aggregator::merge(previous, outcomes, cycle)
//!        │
//!        ├──▶ Snapshot per configured source (FallbackPolicy on failure)
//!        │
//!        └──▶ OverallStatus from the liveness source
//! ```

pub mod aggregator;
pub mod snapshot;

pub use aggregator::{Aggregator, FallbackPolicy};
pub use snapshot::{now_ms, AggregatedView, OverallStatus, Snapshot};
