//! The six console screens, each an instantiation of the same pattern
//! against its own endpoints.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ViewError;
use crate::source::{Projection, SourceSpec};
use crate::sync::{ActionKind, DetailKind};

pub const STATUS: &str = "status";
pub const EC2: &str = "ec2";
pub const S3: &str = "s3";
pub const INSTANCES: &str = "instances";
pub const BUCKETS: &str = "buckets";
pub const PODS: &str = "pods";
pub const SERVICES: &str = "services";
pub const CLUSTER_METRICS: &str = "clusterMetrics";
pub const RECOMMENDATION: &str = "recommendation";

/// A console screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    /// Backend status with running instance and bucket counts.
    Dashboard,
    Instances,
    /// Bucket inventory; selecting a bucket follows its metrics.
    Buckets,
    /// Instance inventory; selecting an instance follows its metrics.
    Monitoring,
    /// Like monitoring, plus sizing predictions for the selected instance.
    Advisor,
    /// Pods, services, cluster metrics and advice.
    Cluster,
}

impl ViewKind {
    pub const ALL: [ViewKind; 6] = [
        ViewKind::Dashboard,
        ViewKind::Instances,
        ViewKind::Buckets,
        ViewKind::Monitoring,
        ViewKind::Advisor,
        ViewKind::Cluster,
    ];

    /// Cycle to the next view.
    pub fn next(self) -> Self {
        match self {
            ViewKind::Dashboard => ViewKind::Instances,
            ViewKind::Instances => ViewKind::Buckets,
            ViewKind::Buckets => ViewKind::Monitoring,
            ViewKind::Monitoring => ViewKind::Advisor,
            ViewKind::Advisor => ViewKind::Cluster,
            ViewKind::Cluster => ViewKind::Dashboard,
        }
    }

    /// Cycle to the previous view.
    pub fn prev(self) -> Self {
        match self {
            ViewKind::Dashboard => ViewKind::Cluster,
            ViewKind::Instances => ViewKind::Dashboard,
            ViewKind::Buckets => ViewKind::Instances,
            ViewKind::Monitoring => ViewKind::Buckets,
            ViewKind::Advisor => ViewKind::Monitoring,
            ViewKind::Cluster => ViewKind::Advisor,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ViewKind::Dashboard => "dashboard",
            ViewKind::Instances => "instances",
            ViewKind::Buckets => "buckets",
            ViewKind::Monitoring => "monitoring",
            ViewKind::Advisor => "advisor",
            ViewKind::Cluster => "cluster",
        }
    }

    /// The sources, liveness source, detail feed and actions of this view.
    pub fn spec(self) -> ViewSpec {
        let instances = || SourceSpec::new(INSTANCES, "/monitor/ec2/list", Projection::InstanceList);

        match self {
            ViewKind::Dashboard => ViewSpec {
                sources: vec![
                    SourceSpec::new(STATUS, "/status", Projection::Status),
                    SourceSpec::new(EC2, "/monitor/ec2/list", Projection::RunningInstanceCount),
                    SourceSpec::new(S3, "/monitor/s3/list", Projection::BucketCount),
                ],
                liveness: STATUS,
                detail: None,
                actions: &[],
            },
            ViewKind::Instances => ViewSpec {
                sources: vec![instances()],
                liveness: INSTANCES,
                detail: None,
                actions: &[ActionKind::CreateInstance, ActionKind::TerminateInstance],
            },
            ViewKind::Buckets => ViewSpec {
                sources: vec![SourceSpec::new(BUCKETS, "/monitor/s3/list", Projection::BucketList)],
                liveness: BUCKETS,
                detail: Some(DetailKind::BucketMetrics),
                actions: &[ActionKind::CreateBucket, ActionKind::DeleteBucket],
            },
            ViewKind::Monitoring => ViewSpec {
                sources: vec![instances()],
                liveness: INSTANCES,
                detail: Some(DetailKind::InstanceMetrics),
                actions: &[],
            },
            ViewKind::Advisor => ViewSpec {
                sources: vec![instances()],
                liveness: INSTANCES,
                detail: Some(DetailKind::InstanceMetrics),
                actions: &[ActionKind::Predict],
            },
            ViewKind::Cluster => ViewSpec {
                sources: vec![
                    SourceSpec::new(PODS, "/k8s/pods", Projection::Pods),
                    SourceSpec::new(SERVICES, "/k8s/services", Projection::Services),
                    SourceSpec::new(CLUSTER_METRICS, "/k8s/metrics", Projection::ClusterMetrics),
                    SourceSpec::new(
                        RECOMMENDATION,
                        "/k8s/recommendation",
                        Projection::ClusterRecommendation,
                    ),
                ],
                liveness: PODS,
                detail: None,
                actions: &[ActionKind::Deploy],
            },
        }
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ViewKind {
    type Err = ViewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ViewKind::ALL
            .into_iter()
            .find(|kind| kind.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| ViewError::UnknownView(s.to_string()))
    }
}

/// Everything a view session instantiates.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSpec {
    pub sources: Vec<SourceSpec>,
    pub liveness: &'static str,
    pub detail: Option<DetailKind>,
    pub actions: &'static [ActionKind],
}
