//! In-memory transport with scripted replies.
//!
//! Replaces the network in tests and demos. Each route has an optional
//! queue of one-shot replies, served first, and a sticky reply served once
//! the queue is empty. Replies may be delayed; with a paused tokio clock the
//! delays are deterministic.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use cnops_client::{ClientError, Transport};

/// What a scripted route answers.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Json(Value),
    /// A non-success HTTP status.
    Status(u16),
    Unauthorized,
    /// A body that is not JSON.
    Garbage,
}

impl ScriptedReply {
    fn into_result(self) -> Result<Value, ClientError> {
        match self {
            ScriptedReply::Json(value) => Ok(value),
            ScriptedReply::Status(status) => Err(ClientError::Http {
                status,
                message: None,
            }),
            ScriptedReply::Unauthorized => Err(ClientError::Unauthorized { status: 401 }),
            ScriptedReply::Garbage => Err(ClientError::Parse(
                "expected value at line 1 column 1".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone)]
struct Step {
    reply: ScriptedReply,
    delay: Duration,
}

#[derive(Debug, Default)]
struct Route {
    queue: VecDeque<Step>,
    sticky: Option<Step>,
    calls: usize,
    bodies: Vec<Value>,
}

impl Route {
    fn next_step(&mut self) -> Option<Step> {
        self.queue.pop_front().or_else(|| self.sticky.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Method {
    Get,
    Post,
}

/// A [`Transport`] answering from a script instead of the network.
///
/// # Example
///
/// ```
/// use cnops_console::source::ScriptedTransport;
/// use serde_json::json;
///
/// let transport = ScriptedTransport::new("demo");
/// transport.respond("/status", json!({"status": "ok"}));
/// transport.fail("/monitor/s3/list", 503);
/// ```
#[derive(Debug)]
pub struct ScriptedTransport {
    description: String,
    routes: Mutex<HashMap<(Method, String), Route>>,
}

impl ScriptedTransport {
    pub fn new(description: &str) -> Self {
        Self {
            description: format!("scripted: {}", description),
            routes: Mutex::new(HashMap::new()),
        }
    }

    /// Answer every `GET path` with `body`.
    pub fn respond(&self, path: &str, body: Value) {
        self.set_sticky(Method::Get, path, ScriptedReply::Json(body), Duration::ZERO);
    }

    /// Answer every `GET path` with `body` after `delay`.
    pub fn respond_after(&self, path: &str, body: Value, delay: Duration) {
        self.set_sticky(Method::Get, path, ScriptedReply::Json(body), delay);
    }

    /// Answer every `GET path` with an error status.
    pub fn fail(&self, path: &str, status: u16) {
        self.set_sticky(Method::Get, path, ScriptedReply::Status(status), Duration::ZERO);
    }

    /// Answer every `GET path` with a body that is not JSON.
    pub fn garbage(&self, path: &str) {
        self.set_sticky(Method::Get, path, ScriptedReply::Garbage, Duration::ZERO);
    }

    /// Queue a one-shot reply for the next `GET path`.
    pub fn enqueue(&self, path: &str, reply: ScriptedReply, delay: Duration) {
        self.routes
            .lock()
            .entry((Method::Get, path.to_string()))
            .or_default()
            .queue
            .push_back(Step { reply, delay });
    }

    /// Answer every `POST path` with `body`.
    pub fn respond_post(&self, path: &str, body: Value) {
        self.set_sticky(Method::Post, path, ScriptedReply::Json(body), Duration::ZERO);
    }

    /// Answer every `POST path` with `body` after `delay`.
    pub fn respond_post_after(&self, path: &str, body: Value, delay: Duration) {
        self.set_sticky(Method::Post, path, ScriptedReply::Json(body), delay);
    }

    /// Answer every `POST path` with an error status.
    pub fn fail_post(&self, path: &str, status: u16) {
        self.set_sticky(Method::Post, path, ScriptedReply::Status(status), Duration::ZERO);
    }

    /// Number of `GET path` requests issued so far.
    pub fn get_calls(&self, path: &str) -> usize {
        self.calls(Method::Get, path)
    }

    /// Number of `POST path` requests issued so far.
    pub fn post_calls(&self, path: &str) -> usize {
        self.calls(Method::Post, path)
    }

    /// Bodies sent with `POST path`, oldest first.
    pub fn posted(&self, path: &str) -> Vec<Value> {
        self.routes
            .lock()
            .get(&(Method::Post, path.to_string()))
            .map(|r| r.bodies.clone())
            .unwrap_or_default()
    }

    fn set_sticky(&self, method: Method, path: &str, reply: ScriptedReply, delay: Duration) {
        self.routes
            .lock()
            .entry((method, path.to_string()))
            .or_default()
            .sticky = Some(Step { reply, delay });
    }

    fn calls(&self, method: Method, path: &str) -> usize {
        self.routes
            .lock()
            .get(&(method, path.to_string()))
            .map_or(0, |r| r.calls)
    }

    async fn answer(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, ClientError> {
        let step = {
            let mut routes = self.routes.lock();
            let route = routes.entry((method, path.to_string())).or_default();
            route.calls += 1;
            if let Some(body) = body {
                route.bodies.push(body);
            }
            route.next_step()
        };

        let Some(step) = step else {
            return Err(ClientError::Http {
                status: 404,
                message: Some(format!("no scripted reply for {}", path)),
            });
        };

        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }
        step.reply.into_result()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, path: &str) -> Result<Value, ClientError> {
        self.answer(Method::Get, path, None).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, ClientError> {
        self.answer(Method::Post, path, Some(body)).await
    }

    fn description(&self) -> &str {
        &self.description
    }
}
