//! Source descriptors and the schema projections that validate their bodies.

use serde::Serialize;
use serde_json::Value;

use cnops_types::{
    BucketList, BucketMetrics, BucketSummary, ClusterMetrics, ClusterRecommendation,
    ClusterService, InstanceList, InstanceMetrics, InstanceStates, InstanceSummary, Pod, PodList,
    ServiceList, StatusReport,
};

/// The typed value a source contributes to a view.
///
/// Serializes untagged, so a count renders as a bare number and a list as
/// a JSON array.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    /// No value yet (the default of sources without a natural zero).
    Empty,
    Count(u64),
    Status(StatusReport),
    Instances(Vec<InstanceSummary>),
    Buckets(Vec<BucketSummary>),
    InstanceMetrics(InstanceMetrics),
    BucketMetrics(BucketMetrics),
    Pods(Vec<Pod>),
    Services(Vec<ClusterService>),
    ClusterMetrics(ClusterMetrics),
    Recommendation(ClusterRecommendation),
}

impl Payload {
    pub fn is_empty(&self) -> bool {
        matches!(self, Payload::Empty)
    }

    pub fn as_count(&self) -> Option<u64> {
        match self {
            Payload::Count(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_status(&self) -> Option<&StatusReport> {
        match self {
            Payload::Status(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_instances(&self) -> Option<&[InstanceSummary]> {
        match self {
            Payload::Instances(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_buckets(&self) -> Option<&[BucketSummary]> {
        match self {
            Payload::Buckets(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_instance_metrics(&self) -> Option<&InstanceMetrics> {
        match self {
            Payload::InstanceMetrics(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_pods(&self) -> Option<&[Pod]> {
        match self {
            Payload::Pods(list) => Some(list),
            _ => None,
        }
    }
}

/// How a response body is validated and reduced to a [`Payload`].
///
/// Each projection decodes the body against its schema in `cnops-types`;
/// anything that does not fit is reported as malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    Status,
    InstanceList,
    /// Number of instances in the `running` state.
    RunningInstanceCount,
    BucketList,
    BucketCount,
    InstanceMetrics,
    BucketMetrics,
    Pods,
    Services,
    ClusterMetrics,
    ClusterRecommendation,
}

impl Projection {
    /// Validate `body` and reduce it to this projection's payload.
    ///
    /// Every endpoint answers with a JSON object; a non-object body or one
    /// carrying an `error` member is malformed even when it arrived with a
    /// success status.
    pub fn project(self, body: Value) -> Result<Payload, String> {
        let Some(object) = body.as_object() else {
            return Err(format!("expected a JSON object, got {}", kind_of(&body)));
        };
        if let Some(error) = object.get("error").filter(|e| !e.is_null()) {
            let message = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());
            return Err(format!("backend reported error: {}", message));
        }

        let payload = match self {
            Projection::Status => Payload::Status(decode::<StatusReport>(body)?),
            Projection::InstanceList => Payload::Instances(decode::<InstanceList>(body)?.instances),
            Projection::RunningInstanceCount => {
                Payload::Count(decode::<InstanceStates>(body)?.running_count())
            }
            Projection::BucketList => Payload::Buckets(decode::<BucketList>(body)?.buckets),
            Projection::BucketCount => {
                Payload::Count(decode::<BucketList>(body)?.buckets.len() as u64)
            }
            Projection::InstanceMetrics => Payload::InstanceMetrics(decode(body)?),
            Projection::BucketMetrics => Payload::BucketMetrics(decode(body)?),
            Projection::Pods => Payload::Pods(decode::<PodList>(body)?.pods),
            Projection::Services => Payload::Services(decode::<ServiceList>(body)?.services),
            Projection::ClusterMetrics => Payload::ClusterMetrics(decode(body)?),
            Projection::ClusterRecommendation => Payload::Recommendation(decode(body)?),
        };
        Ok(payload)
    }

    /// The named default shown while a source has no good value.
    pub fn default_payload(self) -> Payload {
        match self {
            Projection::Status => Payload::Empty,
            Projection::InstanceList => Payload::Instances(Vec::new()),
            Projection::RunningInstanceCount | Projection::BucketCount => Payload::Count(0),
            Projection::BucketList => Payload::Buckets(Vec::new()),
            Projection::InstanceMetrics => Payload::InstanceMetrics(InstanceMetrics::default()),
            Projection::BucketMetrics => Payload::BucketMetrics(BucketMetrics::default()),
            Projection::Pods => Payload::Pods(Vec::new()),
            Projection::Services => Payload::Services(Vec::new()),
            Projection::ClusterMetrics => Payload::Empty,
            Projection::ClusterRecommendation => Payload::Empty,
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(body: Value) -> Result<T, String> {
    serde_json::from_value(body).map_err(|e| e.to_string())
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// An immutable description of one independently polled feed.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSpec {
    name: String,
    path: String,
    projection: Projection,
    default: Payload,
}

impl SourceSpec {
    /// A source whose default is the projection's named default.
    pub fn new(name: impl Into<String>, path: impl Into<String>, projection: Projection) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            default: projection.default_payload(),
            projection,
        }
    }

    /// Override the value shown while the source has failed.
    pub fn with_default(mut self, default: Payload) -> Self {
        self.default = default;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn default_payload(&self) -> &Payload {
        &self.default
    }
}
