//! The single selected resource and its independently polled detail feed.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::data::{now_ms, FallbackPolicy, Snapshot};
use crate::source::{Projection, SourceFetcher, SourceSpec, Transport};

/// Builds the detail source for a selected id.
pub type DetailFactory = Arc<dyn Fn(&str) -> SourceSpec + Send + Sync>;

/// The detail feeds a view can follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailKind {
    /// `GET /monitor/ec2/{id}`
    InstanceMetrics,
    /// `GET /monitor/s3/{name}`
    BucketMetrics,
}

impl DetailKind {
    pub fn spec(self, id: &str) -> SourceSpec {
        match self {
            DetailKind::InstanceMetrics => SourceSpec::new(
                "instanceMetrics",
                format!("/monitor/ec2/{}", id),
                Projection::InstanceMetrics,
            ),
            DetailKind::BucketMetrics => SourceSpec::new(
                "bucketMetrics",
                format!("/monitor/s3/{}", id),
                Projection::BucketMetrics,
            ),
        }
    }

    pub fn factory(self) -> DetailFactory {
        Arc::new(move |id: &str| self.spec(id))
    }
}

/// What consumers see of the selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetailState {
    /// Incremented on every `select`.
    pub epoch: u64,
    pub selected: Option<String>,
    /// `None` until the first detail fetch for this epoch settles.
    pub snapshot: Option<Snapshot>,
}

/// Holds at most one selected id and polls its detail source.
///
/// Every call to [`select`](Self::select) starts a new epoch. A detail
/// result is applied only while its epoch is still current, so a slow
/// response for a superseded selection can never overwrite a newer one.
pub struct SelectionTracker {
    fetcher: SourceFetcher,
    factory: DetailFactory,
    interval: Duration,
    policy: FallbackPolicy,
    state_tx: Arc<watch::Sender<DetailState>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for SelectionTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionTracker")
            .field("interval", &self.interval)
            .field("state", &*self.state_tx.borrow())
            .finish_non_exhaustive()
    }
}

impl SelectionTracker {
    pub fn new(transport: Arc<dyn Transport>, factory: DetailFactory, interval: Duration) -> Self {
        let (state_tx, _) = watch::channel(DetailState::default());
        Self {
            fetcher: SourceFetcher::new(transport),
            factory,
            interval,
            policy: FallbackPolicy::default(),
            state_tx: Arc::new(state_tx),
            task: Mutex::new(None),
        }
    }

    pub fn with_policy(mut self, policy: FallbackPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Change the selection and return the new epoch.
    ///
    /// Interest in the previous selection ends immediately. Selecting `None`
    /// clears the detail without issuing a fetch.
    pub fn select(&self, id: Option<&str>) -> u64 {
        let mut task = self.task.lock();
        if let Some(previous) = task.take() {
            previous.abort();
        }

        let mut epoch = 0;
        self.state_tx.send_modify(|state| {
            state.epoch += 1;
            state.selected = id.map(str::to_string);
            state.snapshot = None;
            epoch = state.epoch;
        });

        match id {
            Some(id) => {
                let spec = (self.factory)(id);
                info!(selected = id, epoch, path = spec.path(), "selection changed");
                *task = Some(tokio::spawn(follow(
                    self.fetcher.clone(),
                    spec,
                    epoch,
                    self.interval,
                    self.policy,
                    self.state_tx.clone(),
                )));
            }
            None => info!(epoch, "selection cleared"),
        }
        epoch
    }

    pub fn selected(&self) -> Option<String> {
        self.state_tx.borrow().selected.clone()
    }

    pub fn epoch(&self) -> u64 {
        self.state_tx.borrow().epoch
    }

    pub fn detail(&self) -> DetailState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DetailState> {
        self.state_tx.subscribe()
    }

    /// Stop following and return to no selection.
    pub fn teardown(&self) {
        self.select(None);
    }
}

impl Drop for SelectionTracker {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

async fn follow(
    fetcher: SourceFetcher,
    spec: SourceSpec,
    epoch: u64,
    interval: Duration,
    policy: FallbackPolicy,
    state_tx: Arc<watch::Sender<DetailState>>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let outcome = fetcher.fetch(&spec).await;

        let applied = state_tx.send_if_modified(|state| {
            if state.epoch != epoch {
                return false;
            }
            state.snapshot = Some(policy.apply(state.snapshot.as_ref(), outcome, now_ms()));
            true
        });
        if !applied {
            debug!(epoch, source = spec.name(), "stale detail result discarded");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{FailureReason, Payload, ScriptedTransport};
    use serde_json::json;

    fn tracker(transport: &Arc<ScriptedTransport>) -> SelectionTracker {
        SelectionTracker::new(
            transport.clone(),
            DetailKind::InstanceMetrics.factory(),
            Duration::from_secs(10),
        )
    }

    fn cpu(state: &DetailState) -> Option<f64> {
        state
            .snapshot
            .as_ref()
            .and_then(|s| s.data.as_instance_metrics())
            .map(|m| m.cpu_utilization)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[test]
    fn test_detail_specs() {
        let spec = DetailKind::BucketMetrics.spec("logs");
        assert_eq!(spec.path(), "/monitor/s3/logs");
        assert_eq!(spec.projection(), Projection::BucketMetrics);
        assert_eq!(DetailKind::InstanceMetrics.spec("i-1").path(), "/monitor/ec2/i-1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_fetches_detail() {
        let transport = Arc::new(ScriptedTransport::new("test"));
        transport.respond("/monitor/ec2/i-1", json!({"CPUUtilization": 41.5}));
        let tracker = tracker(&transport);

        let epoch = tracker.select(Some("i-1"));
        assert_eq!(tracker.detail().snapshot, None);
        settle().await;

        let detail = tracker.detail();
        assert_eq!(detail.epoch, epoch);
        assert_eq!(detail.selected.as_deref(), Some("i-1"));
        assert_eq!(cpu(&detail), Some(41.5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_result_of_superseded_selection_is_discarded() {
        let transport = Arc::new(ScriptedTransport::new("test"));
        transport.respond_after(
            "/monitor/ec2/i-a",
            json!({"CPUUtilization": 10.0}),
            Duration::from_millis(300),
        );
        transport.respond_after(
            "/monitor/ec2/i-b",
            json!({"CPUUtilization": 20.0}),
            Duration::from_millis(100),
        );
        let tracker = tracker(&transport);

        tracker.select(Some("i-a"));
        tracker.select(Some("i-b"));
        tokio::time::sleep(Duration::from_millis(500)).await;

        let detail = tracker.detail();
        assert_eq!(detail.selected.as_deref(), Some("i-b"));
        assert_eq!(cpu(&detail), Some(20.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_follow_refuses_stale_epoch() {
        let transport = Arc::new(ScriptedTransport::new("test"));
        transport.respond("/monitor/ec2/i-a", json!({"CPUUtilization": 10.0}));
        let (state_tx, _) = watch::channel(DetailState {
            epoch: 2,
            selected: Some("i-b".to_string()),
            snapshot: None,
        });
        let state_tx = Arc::new(state_tx);

        follow(
            SourceFetcher::new(transport.clone()),
            DetailKind::InstanceMetrics.spec("i-a"),
            1,
            Duration::from_secs(10),
            FallbackPolicy::default(),
            state_tx.clone(),
        )
        .await;

        assert_eq!(state_tx.borrow().snapshot, None);
        assert_eq!(transport.get_calls("/monitor/ec2/i-a"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_none_clears_without_fetching() {
        let transport = Arc::new(ScriptedTransport::new("test"));
        transport.respond("/monitor/ec2/i-1", json!({"CPUUtilization": 1.0}));
        let tracker = tracker(&transport);

        tracker.select(Some("i-1"));
        settle().await;
        tracker.select(None);

        let detail = tracker.detail();
        assert_eq!(detail.selected, None);
        assert_eq!(detail.snapshot, None);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.get_calls("/monitor/ec2/i-1"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detail_polls_on_interval_and_records_failures() {
        let transport = Arc::new(ScriptedTransport::new("test"));
        transport.respond("/monitor/ec2/i-1", json!({"CPUUtilization": 5.0}));
        let tracker = tracker(&transport);

        tracker.select(Some("i-1"));
        settle().await;
        transport.fail("/monitor/ec2/i-1", 500);
        tokio::time::sleep(Duration::from_secs(10)).await;
        settle().await;

        let snapshot = tracker.detail().snapshot.unwrap();
        assert_eq!(snapshot.error, Some(FailureReason::Network));
        assert_eq!(
            snapshot.data,
            Payload::InstanceMetrics(Default::default())
        );
        assert_eq!(transport.get_calls("/monitor/ec2/i-1"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_stops_following() {
        let transport = Arc::new(ScriptedTransport::new("test"));
        transport.respond_after(
            "/monitor/ec2/i-1",
            json!({"CPUUtilization": 5.0}),
            Duration::from_millis(200),
        );
        let tracker = tracker(&transport);

        let before = tracker.select(Some("i-1"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        tracker.teardown();
        tokio::time::sleep(Duration::from_secs(30)).await;

        let detail = tracker.detail();
        assert!(detail.epoch > before);
        assert_eq!(detail.selected, None);
        assert_eq!(detail.snapshot, None);
    }
}
