//! The request seam between the console engine and the network.

use std::fmt::Debug;

use async_trait::async_trait;
use serde_json::Value;

use crate::ClientError;

/// One JSON request/response exchange with the console API.
///
/// [`ApiClient`](crate::ApiClient) is the production implementation; tests
/// and demos substitute in-memory transports.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Issue `GET path` and return the decoded JSON body.
    async fn get(&self, path: &str) -> Result<Value, ClientError>;

    /// Issue `POST path` with a JSON body and return the decoded JSON reply.
    async fn post(&self, path: &str, body: Value) -> Result<Value, ClientError>;

    /// Human-readable description of where requests go.
    fn description(&self) -> &str;
}
