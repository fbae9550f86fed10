//! Compute and storage inventory schemas.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::number_or_zero;

/// Reply of `GET /status`: backend liveness plus the last sizing advice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: String,

    /// Last AI recommendation persisted by the backend, if any.
    #[serde(default)]
    pub last_ai: Option<Value>,
}

/// Reply of `GET /monitor/ec2/list`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InstanceList {
    pub instances: Vec<InstanceSummary>,
}

impl InstanceList {
    /// Number of instances whose state is `running`.
    pub fn running_count(&self) -> u64 {
        self.instances.iter().filter(|i| i.is_running()).count() as u64
    }
}

/// One compute instance as listed by the inventory endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSummary {
    #[serde(rename = "instanceId")]
    pub instance_id: String,

    /// Value of the `Name` tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub state: String,
}

impl InstanceSummary {
    pub fn is_running(&self) -> bool {
        self.state.eq_ignore_ascii_case("running")
    }

    /// `id — name` when tagged, otherwise the bare id.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("{} — {}", self.instance_id, name),
            None => self.instance_id.clone(),
        }
    }
}

/// Reply of `GET /monitor/ec2/list` reduced to what counting needs.
///
/// Entries only have to carry a `state`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InstanceStates {
    pub instances: Vec<InstanceState>,
}

impl InstanceStates {
    pub fn running_count(&self) -> u64 {
        self.instances
            .iter()
            .filter(|i| i.state.eq_ignore_ascii_case("running"))
            .count() as u64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceState {
    pub state: String,
}

/// Reply of `GET /monitor/s3/list`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BucketList {
    pub buckets: Vec<BucketSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketSummary {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// Reply of `GET /monitor/ec2/{id}`: CloudWatch aggregates over the last
/// ten minutes. Every datapoint defaults to zero when CloudWatch has none.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InstanceMetrics {
    #[serde(rename = "CPUUtilization", default, deserialize_with = "number_or_zero")]
    pub cpu_utilization: f64,

    #[serde(rename = "NetworkIn", default, deserialize_with = "number_or_zero")]
    pub network_in: f64,

    #[serde(rename = "NetworkOut", default, deserialize_with = "number_or_zero")]
    pub network_out: f64,

    #[serde(rename = "DiskReadOps", default, deserialize_with = "number_or_zero")]
    pub disk_read_ops: f64,

    #[serde(rename = "DiskWriteOps", default, deserialize_with = "number_or_zero")]
    pub disk_write_ops: f64,
}

/// Reply of `GET /monitor/s3/{name}`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BucketMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_count: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_size_bytes: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_list_running_count() {
        let json = r#"{
            "instances": [
                {"instanceId": "i-1", "state": "running", "name": "web"},
                {"instanceId": "i-2", "state": "stopped"},
                {"instanceId": "i-3", "state": "RUNNING"}
            ]
        }"#;

        let list: InstanceList = serde_json::from_str(json).unwrap();
        assert_eq!(list.instances.len(), 3);
        assert_eq!(list.running_count(), 2);
        assert_eq!(list.instances[0].label(), "i-1 — web");
        assert_eq!(list.instances[1].label(), "i-2");
    }

    #[test]
    fn test_instance_states_need_no_id() {
        let states: InstanceStates = serde_json::from_str(
            r#"{"instances":[{"state":"running"},{"state":"stopped"}]}"#,
        )
        .unwrap();
        assert_eq!(states.running_count(), 1);
    }

    #[test]
    fn test_instance_missing_state_is_rejected() {
        let json = r#"{"instances": [{"instanceId": "i-1"}]}"#;
        assert!(serde_json::from_str::<InstanceList>(json).is_err());
    }

    #[test]
    fn test_instance_list_requires_instances_member() {
        assert!(serde_json::from_str::<InstanceList>("{}").is_err());
    }

    #[test]
    fn test_metrics_default_to_zero() {
        let json = r#"{"CPUUtilization": 42.5, "NetworkIn": null}"#;
        let metrics: InstanceMetrics = serde_json::from_str(json).unwrap();
        assert_eq!(metrics.cpu_utilization, 42.5);
        assert_eq!(metrics.network_in, 0.0);
        assert_eq!(metrics.disk_write_ops, 0.0);
    }

    #[test]
    fn test_bucket_region_is_optional() {
        let list: BucketList = serde_json::from_str(r#"{"buckets":[{"name":"logs"}]}"#).unwrap();
        assert_eq!(list.buckets[0].name, "logs");
        assert!(list.buckets[0].region.is_none());
    }

    #[test]
    fn test_status_report_without_advice() {
        let report: StatusReport = serde_json::from_str(r#"{"status":"ok"}"#).unwrap();
        assert_eq!(report.status, "ok");
        assert!(report.last_ai.is_none());
    }
}
