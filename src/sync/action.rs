//! Long-running user-triggered operations.
//!
//! An [`ActionMachine`] drives one kind of action through
//! `Idle → Pending → {Success, Error} → Idle`. A trigger is accepted only
//! from `Idle`; the terminal state reverts to `Idle` on its own after a
//! fixed delay.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use cnops_client::ClientError;
use cnops_types::{
    ActionReply, CreateBucketRequest, CreateInstanceRequest, DeleteBucketRequest, DeployRequest,
    InstanceMetrics, PredictRequest, TerminateInstanceRequest,
};

use super::PollHandle;
use crate::data::now_ms;
use crate::error::ViewError;
use crate::source::Transport;

/// Default delay before a resolved action returns to `Idle`.
pub const DEFAULT_REVERT_DELAY: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    CreateInstance,
    TerminateInstance,
    CreateBucket,
    DeleteBucket,
    Predict,
    Deploy,
}

impl ActionKind {
    pub const ALL: [ActionKind; 6] = [
        ActionKind::CreateInstance,
        ActionKind::TerminateInstance,
        ActionKind::CreateBucket,
        ActionKind::DeleteBucket,
        ActionKind::Predict,
        ActionKind::Deploy,
    ];

    /// The `POST` endpoint the action calls.
    pub fn path(self) -> &'static str {
        match self {
            ActionKind::CreateInstance => "/deploy/ec2/create",
            ActionKind::TerminateInstance => "/deploy/ec2/terminate",
            ActionKind::CreateBucket => "/deploy/s3/create",
            ActionKind::DeleteBucket => "/deploy/s3/delete",
            ActionKind::Predict => "/ai/predict",
            ActionKind::Deploy => "/k8s/deploy",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ActionKind::CreateInstance => "create-instance",
            ActionKind::TerminateInstance => "terminate-instance",
            ActionKind::CreateBucket => "create-bucket",
            ActionKind::DeleteBucket => "delete-bucket",
            ActionKind::Predict => "predict",
            ActionKind::Deploy => "deploy",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ActionKind {
    type Err = ViewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .into_iter()
            .find(|kind| kind.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| ViewError::UnknownAction(s.to_string()))
    }
}

/// One action call: a kind and the body to post.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    kind: ActionKind,
    body: Value,
}

impl ActionRequest {
    pub fn new(kind: ActionKind, body: Value) -> Self {
        Self { kind, body }
    }

    pub fn create_instance(name: &str, instance_type: &str) -> Self {
        Self::encode(
            ActionKind::CreateInstance,
            &CreateInstanceRequest {
                name: name.to_string(),
                instance_type: instance_type.to_string(),
            },
        )
    }

    pub fn terminate_instance(instance_id: &str) -> Self {
        Self::encode(
            ActionKind::TerminateInstance,
            &TerminateInstanceRequest {
                instance_id: instance_id.to_string(),
            },
        )
    }

    pub fn create_bucket(bucket_name: &str, region: &str) -> Self {
        Self::encode(
            ActionKind::CreateBucket,
            &CreateBucketRequest {
                bucket_name: bucket_name.to_string(),
                region: region.to_string(),
            },
        )
    }

    pub fn delete_bucket(bucket_name: &str, force: bool) -> Self {
        Self::encode(
            ActionKind::DeleteBucket,
            &DeleteBucketRequest {
                bucket_name: bucket_name.to_string(),
                force,
            },
        )
    }

    pub fn predict(instance_id: &str, metrics: InstanceMetrics) -> Self {
        Self::encode(
            ActionKind::Predict,
            &PredictRequest {
                instance_id: instance_id.to_string(),
                metrics,
            },
        )
    }

    pub fn deploy() -> Self {
        Self::encode(ActionKind::Deploy, &DeployRequest::default())
    }

    fn encode<T: Serialize>(kind: ActionKind, body: &T) -> Self {
        // Plain structs of strings and numbers always serialize.
        let body = serde_json::to_value(body).unwrap_or_default();
        Self { kind, body }
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn path(&self) -> &'static str {
        self.kind.path()
    }

    pub fn body(&self) -> &Value {
        &self.body
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActionState {
    Idle,
    Pending,
    Success,
    Error,
}

impl ActionState {
    pub fn is_resolved(self) -> bool {
        matches!(self, ActionState::Success | ActionState::Error)
    }
}

/// The observable state of one action kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRun {
    pub kind: ActionKind,
    pub state: ActionState,
    /// Milliseconds since the Unix epoch.
    pub started_at: Option<u64>,
    pub resolved_at: Option<u64>,
    /// The reply body, when one arrived.
    pub payload: Option<Value>,
    /// Transient text for the operator: the reply's message or the error.
    pub message: Option<String>,
    #[serde(skip)]
    generation: u64,
    #[serde(skip)]
    closed: bool,
}

impl ActionRun {
    fn idle(kind: ActionKind, generation: u64) -> Self {
        Self {
            kind,
            state: ActionState::Idle,
            started_at: None,
            resolved_at: None,
            payload: None,
            message: None,
            generation,
            closed: false,
        }
    }
}

/// Whether a trigger started a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Accepted,
    /// Another run is in progress, the request was for a different action,
    /// or the machine was torn down. Nothing was sent.
    Rejected,
}

impl Trigger {
    pub fn is_accepted(self) -> bool {
        self == Trigger::Accepted
    }
}

/// Runs one action kind at a time.
#[derive(Debug)]
pub struct ActionMachine {
    kind: ActionKind,
    transport: Arc<dyn Transport>,
    revert_delay: Duration,
    on_success: Mutex<Option<PollHandle>>,
    run_tx: Arc<watch::Sender<ActionRun>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ActionMachine {
    pub fn new(kind: ActionKind, transport: Arc<dyn Transport>, revert_delay: Duration) -> Self {
        let (run_tx, _) = watch::channel(ActionRun::idle(kind, 0));
        Self {
            kind,
            transport,
            revert_delay,
            on_success: Mutex::new(None),
            run_tx: Arc::new(run_tx),
            task: Mutex::new(None),
        }
    }

    /// Refresh `poller` once whenever a run succeeds.
    pub fn on_success(&self, poller: PollHandle) {
        *self.on_success.lock() = Some(poller);
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    /// Start a run if the machine is `Idle`.
    pub fn trigger(&self, request: ActionRequest) -> Trigger {
        if request.kind() != self.kind {
            warn!(expected = %self.kind, got = %request.kind(), "action request for another kind");
            return Trigger::Rejected;
        }

        let mut generation = 0;
        let accepted = self.run_tx.send_if_modified(|run| {
            if run.closed || run.state != ActionState::Idle {
                return false;
            }
            let next = run.generation + 1;
            *run = ActionRun {
                state: ActionState::Pending,
                started_at: Some(now_ms()),
                ..ActionRun::idle(self.kind, next)
            };
            generation = next;
            true
        });
        if !accepted {
            debug!(kind = %self.kind, state = ?self.run_tx.borrow().state, "action trigger rejected");
            return Trigger::Rejected;
        }

        info!(kind = %self.kind, path = request.path(), "action pending");
        let task = tokio::spawn(drive(
            self.transport.clone(),
            request,
            generation,
            self.revert_delay,
            self.on_success.lock().clone(),
            self.run_tx.clone(),
        ));
        *self.task.lock() = Some(task);
        Trigger::Accepted
    }

    pub fn run(&self) -> ActionRun {
        self.run_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ActionRun> {
        self.run_tx.subscribe()
    }

    /// Return to `Idle` for good. In-flight work is dropped without touching
    /// the state, and later triggers are rejected.
    pub fn teardown(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        self.run_tx.send_modify(|run| {
            *run = ActionRun {
                closed: true,
                ..ActionRun::idle(self.kind, run.generation + 1)
            };
        });
    }
}

impl Drop for ActionMachine {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

async fn drive(
    transport: Arc<dyn Transport>,
    request: ActionRequest,
    generation: u64,
    revert_delay: Duration,
    on_success: Option<PollHandle>,
    run_tx: Arc<watch::Sender<ActionRun>>,
) {
    let kind = request.kind();
    let result = transport.post(request.path(), request.body).await;
    let (state, payload, message) = resolve(result);

    let applied = run_tx.send_if_modified(|run| {
        if run.generation != generation {
            return false;
        }
        run.state = state;
        run.resolved_at = Some(now_ms());
        run.payload = payload;
        run.message = message;
        true
    });
    if !applied {
        debug!(%kind, "action result discarded after teardown");
        return;
    }

    match state {
        ActionState::Success => {
            info!(%kind, "action succeeded");
            if let Some(poller) = on_success {
                poller.refresh();
            }
        }
        _ => warn!(%kind, message = ?run_tx.borrow().message, "action failed"),
    }

    tokio::time::sleep(revert_delay).await;
    run_tx.send_if_modified(|run| {
        if run.generation != generation {
            return false;
        }
        *run = ActionRun::idle(kind, generation);
        true
    });
    debug!(%kind, "action back to idle");
}

fn resolve(result: Result<Value, ClientError>) -> (ActionState, Option<Value>, Option<String>) {
    let body = match result {
        Ok(body) => body,
        Err(e) => return (ActionState::Error, None, Some(e.to_string())),
    };

    if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
        let message = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());
        return (ActionState::Error, Some(body), Some(message));
    }

    let message = serde_json::from_value::<ActionReply>(body.clone())
        .ok()
        .and_then(|reply| reply.message);
    (ActionState::Success, Some(body), message)
}
