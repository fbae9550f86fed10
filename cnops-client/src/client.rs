//! HTTP client for the console API.
//!
//! ## Example
//!
//! ```rust,no_run
//! use cnops_client::{ApiClient, Session, Transport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ApiClient::builder()
//!         .endpoint("http://localhost:5000")
//!         .session(Session::bearer("token"))
//!         .build()?;
//!
//!     let status = client.get("/status").await?;
//!     println!("backend says {}", status["status"]);
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::trace;

use cnops_types::{Credentials, Registration, TokenReply};

use crate::{ClientError, Session, Transport};

/// Console API client. Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    endpoint: String,
    session: Session,
    description: String,
}

impl ApiClient {
    /// Create a new builder for configuring the client.
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// A client sharing this one's connection pool but sending `session`.
    pub fn with_session(&self, session: Session) -> Self {
        Self {
            session,
            ..self.clone()
        }
    }

    /// Exchange credentials for a session (`POST /auth/login`).
    pub async fn login(&self, credentials: &Credentials) -> Result<Session, ClientError> {
        let body = serde_json::to_value(credentials).map_err(|e| ClientError::Parse(e.to_string()))?;
        let reply = self.post("/auth/login", body).await?;
        token_session(reply)
    }

    /// Create an account and return its session (`POST /auth/register`).
    pub async fn register(&self, registration: &Registration) -> Result<Session, ClientError> {
        let body =
            serde_json::to_value(registration).map_err(|e| ClientError::Parse(e.to_string()))?;
        let reply = self.post("/auth/register", body).await?;
        token_session(reply)
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.endpoint.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.authorization() {
            Some(header) => request.header(AUTHORIZATION, header),
            None => request,
        }
    }
}

#[async_trait]
impl Transport for ApiClient {
    async fn get(&self, path: &str) -> Result<Value, ClientError> {
        let url = self.url(path);
        trace!(%url, "GET");
        let response = self.authorize(self.client.get(&url)).send().await?;
        read_json(response).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, ClientError> {
        let url = self.url(path);
        trace!(%url, "POST");
        let response = self
            .authorize(self.client.post(&url).json(&body))
            .send()
            .await?;
        read_json(response).await
    }

    fn description(&self) -> &str {
        &self.description
    }
}

async fn read_json(response: Response) -> Result<Value, ClientError> {
    let status = response.status();

    if status == StatusCode::UNAUTHORIZED {
        return Err(ClientError::Unauthorized {
            status: status.as_u16(),
        });
    }

    let body = response.text().await?;

    if !status.is_success() {
        return Err(ClientError::Http {
            status: status.as_u16(),
            message: backend_message(&body),
        });
    }

    serde_json::from_str(&body).map_err(|e| ClientError::Parse(e.to_string()))
}

// The backend puts its explanation in `error` or, for auth routes, `message`.
fn backend_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .or_else(|| value.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn token_session(reply: Value) -> Result<Session, ClientError> {
    let reply: TokenReply =
        serde_json::from_value(reply).map_err(|e| ClientError::Parse(e.to_string()))?;
    Ok(Session::bearer(reply.token))
}

/// Builder for ApiClient.
#[derive(Debug, Default)]
pub struct ApiClientBuilder {
    endpoint: Option<String>,
    session: Option<Session>,
    timeout: Option<Duration>,
}

impl ApiClientBuilder {
    /// Set the API base URL (default: "http://localhost:5000").
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the session whose token is attached to every request.
    pub fn session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    /// Set the request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<ApiClient, ClientError> {
        let timeout = self.timeout.unwrap_or(Duration::from_secs(10));

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;

        let endpoint = self
            .endpoint
            .unwrap_or_else(|| "http://localhost:5000".to_string());

        Ok(ApiClient {
            client,
            description: format!("api: {}", endpoint),
            endpoint,
            session: self.session.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve exactly one HTTP response and hand back the raw request head.
    async fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).to_string()
        });

        (format!("http://{}", addr), handle)
    }

    #[test]
    fn test_builder_defaults() {
        let client = ApiClient::builder().build().unwrap();
        assert_eq!(client.endpoint(), "http://localhost:5000");
        assert!(!client.session().is_authenticated());
        assert_eq!(client.description(), "api: http://localhost:5000");
    }

    #[test]
    fn test_url_joining() {
        let client = ApiClient::builder()
            .endpoint("http://api.local:5000/")
            .build()
            .unwrap();
        assert_eq!(client.url("/status"), "http://api.local:5000/status");
        assert_eq!(client.url("k8s/pods"), "http://api.local:5000/k8s/pods");
    }

    #[test]
    fn test_backend_message() {
        assert_eq!(
            backend_message(r#"{"error": "bucket_name manquant"}"#).as_deref(),
            Some("bucket_name manquant")
        );
        assert_eq!(
            backend_message(r#"{"message": "Identifiants invalides"}"#).as_deref(),
            Some("Identifiants invalides")
        );
        assert!(backend_message("<html>").is_none());
    }

    #[tokio::test]
    async fn test_get_sends_bearer_token() {
        let (endpoint, server) = serve_once("200 OK", r#"{"status":"ok"}"#).await;
        let client = ApiClient::builder()
            .endpoint(endpoint)
            .session(Session::bearer("tok-1"))
            .build()
            .unwrap();

        let body = client.get("/status").await.unwrap();
        assert_eq!(body["status"], "ok");

        let request = server.await.unwrap().to_lowercase();
        assert!(request.starts_with("get /status"));
        assert!(request.contains("authorization: bearer tok-1"));
    }

    #[tokio::test]
    async fn test_unauthorized_status() {
        let (endpoint, _server) = serve_once("401 Unauthorized", r#"{"msg":"expired"}"#).await;
        let client = ApiClient::builder().endpoint(endpoint).build().unwrap();

        let err = client.get("/monitor/ec2/list").await.unwrap_err();
        assert!(matches!(err, ClientError::Unauthorized { status: 401 }));
    }

    #[tokio::test]
    async fn test_error_status_carries_backend_message() {
        let (endpoint, _server) =
            serve_once("500 Internal Server Error", r#"{"error":"Kubernetes non configuré"}"#)
                .await;
        let client = ApiClient::builder().endpoint(endpoint).build().unwrap();

        match client.get("/k8s/pods").await.unwrap_err() {
            ClientError::Http { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message.as_deref(), Some("Kubernetes non configuré"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_json_body_is_parse_error() {
        let (endpoint, _server) = serve_once("200 OK", "not json").await;
        let client = ApiClient::builder().endpoint(endpoint).build().unwrap();

        let err = client.get("/status").await.unwrap_err();
        assert!(matches!(err, ClientError::Parse(_)));
        assert!(!err.is_transport());
    }
}
