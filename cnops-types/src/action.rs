//! Request and reply bodies for the `POST` endpoints.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::InstanceMetrics;

/// Body of `POST /deploy/ec2/create`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateInstanceRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub instance_type: String,
}

/// Body of `POST /deploy/ec2/terminate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminateInstanceRequest {
    pub instance_id: String,
}

/// Body of `POST /deploy/s3/create`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateBucketRequest {
    pub bucket_name: String,
    pub region: String,
}

/// Body of `POST /deploy/s3/delete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteBucketRequest {
    pub bucket_name: String,
    /// Empty the bucket before deleting it.
    #[serde(default)]
    pub force: bool,
}

/// Body of `POST /ai/predict`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    pub instance_id: String,
    pub metrics: InstanceMetrics,
}

/// Body of `POST /k8s/deploy`.
///
/// Empty: the backend always applies its own `deployment.yaml`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeployRequest {}

/// Reply of any action endpoint.
///
/// The backend reports failures as an `error` member, sometimes with a
/// success status, so callers must check [`ActionReply::error`] as well as
/// the HTTP status.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,

    /// Everything else the endpoint returned (instance id, kubectl output, ...).
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// Body of `POST /auth/login`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Body of `POST /auth/register`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub role: String,
}

/// Reply of the credential endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenReply {
    pub token: String,
}
