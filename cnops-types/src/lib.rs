//! # cnops-types
//!
//! Wire schemas for every endpoint the CloudNetOps console consumes.
//!
//! Each record states which fields are required and which carry a named
//! default. A response missing a required field fails to deserialize, which
//! the console treats as a malformed response rather than letting an absent
//! value leak into the view.
//!
//! ## Modules
//!
//! - inventory: `/status`, `/monitor/ec2/*`, `/monitor/s3/*`
//! - cluster: `/k8s/pods`, `/k8s/services`, `/k8s/metrics`, `/k8s/recommendation`
//! - action: request and reply bodies for every `POST` endpoint
//!
//! ## Example
//!
//! ```rust
//! use cnops_types::InstanceList;
//!
//! let list: InstanceList = serde_json::from_str(
//!     r#"{"instances":[{"instanceId":"i-1","state":"running"}]}"#,
//! ).unwrap();
//! assert_eq!(list.running_count(), 1);
//! ```

mod action;
mod cluster;
mod inventory;

pub use action::*;
pub use cluster::*;
pub use inventory::*;

/// Deserialize a nullable number, treating `null` the same as an absent field.
pub(crate) fn number_or_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}
