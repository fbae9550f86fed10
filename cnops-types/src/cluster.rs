//! Kubernetes cluster schemas.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reply of `GET /k8s/pods`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PodList {
    pub pods: Vec<Pod>,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pod {
    pub name: String,
    pub namespace: String,

    /// Pod phase (`Running`, `Pending`, `Failed`, ...).
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,

    #[serde(default)]
    pub restarts: u64,

    #[serde(default = "unknown_age")]
    pub age: String,

    #[serde(default)]
    pub metrics: PodUsage,
}

impl Pod {
    pub fn is_running(&self) -> bool {
        self.status == "Running"
    }
}

fn unknown_age() -> String {
    "—".to_string()
}

/// `kubectl top` figures for one pod.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodUsage {
    #[serde(default = "zero_cpu")]
    pub cpu: String,
    #[serde(default = "zero_memory")]
    pub memory: String,
}

impl Default for PodUsage {
    fn default() -> Self {
        Self {
            cpu: zero_cpu(),
            memory: zero_memory(),
        }
    }
}

fn zero_cpu() -> String {
    "0m".to_string()
}

fn zero_memory() -> String {
    "0Mi".to_string()
}

/// Reply of `GET /k8s/services`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ServiceList {
    pub services: Vec<ClusterService>,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterService {
    pub name: String,
    pub namespace: String,

    #[serde(rename = "type")]
    pub service_type: String,

    #[serde(rename = "clusterIP", default, skip_serializing_if = "Option::is_none")]
    pub cluster_ip: Option<String>,

    #[serde(default)]
    pub ports: Vec<ServicePort>,

    /// First exposed port, flattened for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u32>,

    #[serde(rename = "nodePort", default, skip_serializing_if = "Option::is_none")]
    pub node_port: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicePort {
    pub port: u32,

    /// Either a port number or a named container port.
    #[serde(rename = "targetPort", default, skip_serializing_if = "Option::is_none")]
    pub target_port: Option<Value>,

    #[serde(rename = "nodePort", default, skip_serializing_if = "Option::is_none")]
    pub node_port: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

/// Reply of `GET /k8s/metrics`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClusterMetrics {
    #[serde(rename = "totalPods")]
    pub total_pods: u64,
    #[serde(rename = "runningPods")]
    pub running_pods: u64,
    #[serde(rename = "cpuUsage", default)]
    pub cpu_usage: String,
    #[serde(rename = "memoryUsage", default)]
    pub memory_usage: String,
    #[serde(rename = "networkIO", default)]
    pub network_io: String,
    #[serde(default)]
    pub nodes: u64,
}

/// Reply of `GET /k8s/recommendation`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClusterRecommendation {
    pub recommendations: Vec<Advice>,
    pub summary: AdviceSummary,
}

impl ClusterRecommendation {
    /// Advice entries that call for operator attention.
    pub fn issues(&self) -> impl Iterator<Item = &Advice> {
        self.recommendations
            .iter()
            .filter(|a| matches!(a.kind, AdviceKind::Warning | AdviceKind::Error))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advice {
    #[serde(rename = "type")]
    pub kind: AdviceKind,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub action: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdviceKind {
    Success,
    Warning,
    Error,
    #[serde(other)]
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AdviceSummary {
    #[serde(rename = "totalPods")]
    pub total_pods: u64,
    #[serde(rename = "healthyPods")]
    pub healthy_pods: u64,
    pub issues: u64,
}
