//! The fixed-interval fetch-all-then-merge loop behind every view.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::data::{AggregatedView, Aggregator, FallbackPolicy};
use crate::error::ViewError;
use crate::source::{SourceFetcher, SourceSpec, Transport};

type ViewSender = Arc<watch::Sender<Arc<AggregatedView>>>;

/// Default interval between poll cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Polls a fixed set of sources and publishes one view per cycle.
///
/// Cycles run one at a time on a single task: a tick that comes due while a
/// cycle is still outstanding is skipped. Every source of a cycle is fetched
/// concurrently and the merged view is published once all have settled, so
/// subscribers never see a view mixing two cycles.
///
/// # Example
///
/// ```
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
/// use cnops_console::source::{Projection, ScriptedTransport, SourceSpec};
/// use cnops_console::Poller;
///
/// # tokio_test::block_on(async {
/// let transport = Arc::new(ScriptedTransport::new("demo"));
/// let poller = Poller::builder(transport)
///     .source(SourceSpec::new("status", "/status", Projection::Status))
///     .liveness("status")
///     .interval(Duration::from_secs(5))
///     .build()
///     .unwrap();
///
/// let handle = poller.start();
/// handle.stop();
/// # });
/// ```
#[derive(Debug)]
pub struct Poller {
    fetcher: SourceFetcher,
    aggregator: Arc<Aggregator>,
    interval: Duration,
    view_tx: ViewSender,
    running: Mutex<Option<Running>>,
}

#[derive(Debug)]
struct Running {
    handle: PollHandle,
    task: JoinHandle<()>,
}

impl Poller {
    pub fn builder(transport: Arc<dyn Transport>) -> PollerBuilder {
        PollerBuilder {
            transport,
            sources: Vec::new(),
            liveness: None,
            interval: DEFAULT_POLL_INTERVAL,
            policy: FallbackPolicy::default(),
        }
    }

    /// Start polling: one cycle now, then one per interval.
    ///
    /// Calling this while already running returns the existing handle.
    /// Starting again after a stop begins from the initial view.
    pub fn start(&self) -> PollHandle {
        let mut running = self.running.lock();
        if let Some(current) = running.as_ref() {
            if !current.handle.is_stopped() {
                return current.handle.clone();
            }
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = PollHandle {
            stop_tx: Arc::new(stop_tx),
            refresh: Arc::new(RefreshSignal::default()),
            view_tx: self.view_tx.clone(),
        };

        self.view_tx
            .send_replace(Arc::new(self.aggregator.initial_view()));

        let task = tokio::spawn(run_cycles(
            self.fetcher.clone(),
            self.aggregator.clone(),
            self.interval,
            self.view_tx.clone(),
            stop_rx,
            handle.refresh.clone(),
        ));

        info!(
            sources = self.aggregator.specs().len(),
            interval_ms = self.interval.as_millis() as u64,
            transport = self.fetcher.transport().description(),
            "poller started"
        );
        *running = Some(Running {
            handle: handle.clone(),
            task,
        });
        handle
    }

    /// Stop polling. Results of a cycle still in flight are discarded.
    pub fn stop(&self) {
        if let Some(running) = self.running.lock().take() {
            running.handle.stop();
            running.task.abort();
            info!("poller stopped");
        }
    }

    /// Run one extra cycle as soon as possible. No-op while stopped.
    pub fn refresh(&self) {
        if let Some(running) = self.running.lock().as_ref() {
            running.handle.refresh();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|r| !r.handle.is_stopped())
    }

    /// Receive every published view.
    pub fn subscribe(&self) -> watch::Receiver<Arc<AggregatedView>> {
        self.view_tx.subscribe()
    }

    /// The most recently published view.
    pub fn view(&self) -> Arc<AggregatedView> {
        self.view_tx.borrow().clone()
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Builder for [`Poller`].
#[derive(Debug)]
pub struct PollerBuilder {
    transport: Arc<dyn Transport>,
    sources: Vec<SourceSpec>,
    liveness: Option<String>,
    interval: Duration,
    policy: FallbackPolicy,
}

impl PollerBuilder {
    /// Add a source to every cycle.
    pub fn source(mut self, spec: SourceSpec) -> Self {
        self.sources.push(spec);
        self
    }

    pub fn sources(mut self, specs: impl IntoIterator<Item = SourceSpec>) -> Self {
        self.sources.extend(specs);
        self
    }

    /// The source whose health decides the view's overall status.
    ///
    /// Defaults to the first source.
    pub fn liveness(mut self, name: impl Into<String>) -> Self {
        self.liveness = Some(name.into());
        self
    }

    /// Defaults to 10 seconds.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn policy(mut self, policy: FallbackPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> Result<Poller, ViewError> {
        if self.interval.is_zero() {
            return Err(ViewError::ZeroInterval);
        }
        let liveness = match self.liveness {
            Some(name) => name,
            None => self
                .sources
                .first()
                .map(|s| s.name().to_string())
                .ok_or(ViewError::NoSources)?,
        };

        let aggregator = Aggregator::new(self.sources, liveness, self.policy)?;
        let (view_tx, _) = watch::channel(Arc::new(aggregator.initial_view()));

        Ok(Poller {
            fetcher: SourceFetcher::new(self.transport),
            aggregator: Arc::new(aggregator),
            interval: self.interval,
            view_tx: Arc::new(view_tx),
            running: Mutex::new(None),
        })
    }
}

/// Cancellation and refresh handle for a running [`Poller`].
///
/// Clones control the same run. Dropping a handle does not stop polling.
#[derive(Debug, Clone)]
pub struct PollHandle {
    stop_tx: Arc<watch::Sender<bool>>,
    refresh: Arc<RefreshSignal>,
    view_tx: ViewSender,
}

/// A single pending refresh request plus the wakeup for the cycle loop.
#[derive(Debug, Default)]
struct RefreshSignal {
    pending: AtomicBool,
    wake: Notify,
}

impl RefreshSignal {
    fn request(&self) {
        if !self.pending.swap(true, Ordering::AcqRel) {
            self.wake.notify_one();
        }
    }

    async fn requested(&self) {
        loop {
            self.wake.notified().await;
            if self.pending.swap(false, Ordering::AcqRel) {
                return;
            }
        }
    }
}

impl PollHandle {
    /// Stop the run. No view is published after this returns.
    pub fn stop(&self) {
        // Raised under the view lock so it cannot interleave with a publish.
        self.view_tx.send_if_modified(|_| {
            self.stop_tx.send_replace(true);
            false
        });
    }

    /// Request one immediate cycle. Requests made while a cycle is
    /// outstanding coalesce into a single extra cycle.
    pub fn refresh(&self) {
        if !self.is_stopped() {
            self.refresh.request();
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }
}

async fn run_cycles(
    fetcher: SourceFetcher,
    aggregator: Arc<Aggregator>,
    interval: Duration,
    view_tx: ViewSender,
    mut stop_rx: watch::Receiver<bool>,
    refresh: Arc<RefreshSignal>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut cycle = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = stop_rx.wait_for(|stopped| *stopped) => break,
            _ = ticker.tick() => {}
            _ = refresh.requested() => debug!("refresh requested"),
        }

        cycle += 1;
        debug!(cycle, "poll cycle started");

        let outcomes = tokio::select! {
            biased;
            _ = stop_rx.wait_for(|stopped| *stopped) => {
                debug!(cycle, "poll cycle abandoned after stop");
                break;
            }
            outcomes = fetcher.fetch_all(aggregator.specs()) => outcomes,
        };

        let previous = view_tx.borrow().clone();
        let view = Arc::new(aggregator.merge(&previous, outcomes, cycle));
        let status = view.overall_status;

        let applied = view_tx.send_if_modified(|current| {
            if *stop_rx.borrow() {
                return false;
            }
            *current = view;
            true
        });
        if !applied {
            debug!(cycle, "poll cycle discarded after stop");
            break;
        }
        debug!(cycle, ?status, "poll cycle applied");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::OverallStatus;
    use crate::source::{FailureReason, Payload, Projection, ScriptedTransport};
    use serde_json::json;

    const EC2: &str = "/monitor/ec2/list";
    const S3: &str = "/monitor/s3/list";

    fn poller(transport: &Arc<ScriptedTransport>) -> Poller {
        Poller::builder(transport.clone())
            .source(SourceSpec::new("ec2", EC2, Projection::RunningInstanceCount))
            .source(SourceSpec::new("s3", S3, Projection::BucketCount))
            .liveness("ec2")
            .interval(Duration::from_secs(10))
            .build()
            .unwrap()
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[test]
    fn test_build_rejects_zero_interval() {
        let transport = Arc::new(ScriptedTransport::new("test"));
        let err = Poller::builder(transport)
            .source(SourceSpec::new("ec2", EC2, Projection::RunningInstanceCount))
            .interval(Duration::ZERO)
            .build()
            .unwrap_err();
        assert_eq!(err, ViewError::ZeroInterval);
    }

    #[test]
    fn test_liveness_defaults_to_first_source() {
        let transport = Arc::new(ScriptedTransport::new("test"));
        let poller = Poller::builder(transport)
            .source(SourceSpec::new("pods", "/k8s/pods", Projection::Pods))
            .build()
            .unwrap();
        assert_eq!(poller.aggregator().liveness(), "pods");
        assert_eq!(poller.view().overall_status, OverallStatus::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_runs_immediately_then_every_interval() {
        let transport = Arc::new(ScriptedTransport::new("test"));
        transport.respond(EC2, json!({"instances": [{"instanceId": "i-1", "state": "running"}]}));
        transport.respond(S3, json!({"buckets": []}));
        let poller = poller(&transport);

        poller.start();
        settle().await;
        assert_eq!(poller.view().cycle, 1);
        assert_eq!(poller.view().data("ec2"), Some(&Payload::Count(1)));
        assert_eq!(transport.get_calls(EC2), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(poller.view().cycle, 2);
        assert_eq!(transport.get_calls(EC2), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let transport = Arc::new(ScriptedTransport::new("test"));
        transport.respond(EC2, json!({"instances": []}));
        transport.respond(S3, json!({"buckets": []}));
        let poller = poller(&transport);

        let first = poller.start();
        let second = poller.start();
        settle().await;

        assert_eq!(transport.get_calls(EC2), 1);
        first.stop();
        assert!(second.is_stopped());
        assert!(!poller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_discards_in_flight_cycle() {
        let transport = Arc::new(ScriptedTransport::new("test"));
        transport.respond_after(EC2, json!({"instances": []}), Duration::from_millis(500));
        transport.respond(S3, json!({"buckets": [{"name": "logs"}]}));
        let poller = poller(&transport);

        let handle = poller.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.stop();
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(poller.view().cycle, 0);
        assert_eq!(poller.view().overall_status, OverallStatus::Unknown);
        assert_eq!(transport.get_calls(EC2), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_view_is_published_once_per_cycle() {
        let transport = Arc::new(ScriptedTransport::new("test"));
        transport.respond(EC2, json!({"instances": []}));
        transport.respond_after(S3, json!({"buckets": [{"name": "a"}]}), Duration::from_millis(300));
        let poller = poller(&transport);

        poller.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        // The fast source has settled but the cycle has not.
        assert_eq!(poller.view().cycle, 0);
        assert!(!poller.view().get("ec2").unwrap().is_fetched());

        tokio::time::sleep(Duration::from_millis(250)).await;
        let view = poller.view();
        assert_eq!(view.cycle, 1);
        assert_eq!(view.data("s3"), Some(&Payload::Count(1)));
        assert!(view.get("ec2").unwrap().is_fetched());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_runs_an_extra_cycle() {
        let transport = Arc::new(ScriptedTransport::new("test"));
        transport.respond(EC2, json!({"instances": []}));
        transport.respond(S3, json!({"buckets": []}));
        let poller = poller(&transport);

        let handle = poller.start();
        settle().await;
        handle.refresh();
        handle.refresh();
        settle().await;

        assert_eq!(poller.view().cycle, 2);
        assert_eq!(transport.get_calls(EC2), 2);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(poller.view().cycle, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refreshes_during_a_cycle_coalesce() {
        let transport = Arc::new(ScriptedTransport::new("test"));
        transport.respond_after(EC2, json!({"instances": []}), Duration::from_millis(200));
        transport.respond(S3, json!({"buckets": []}));
        let poller = poller(&transport);

        let handle = poller.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.refresh();
        handle.refresh();
        handle.refresh();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(poller.view().cycle, 2);
        assert_eq!(transport.get_calls(EC2), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycles_do_not_overlap() {
        let transport = Arc::new(ScriptedTransport::new("test"));
        transport.respond_after(EC2, json!({"instances": []}), Duration::from_millis(250));
        transport.respond(S3, json!({"buckets": []}));
        let poller = Poller::builder(transport.clone())
            .source(SourceSpec::new("ec2", EC2, Projection::RunningInstanceCount))
            .source(SourceSpec::new("s3", S3, Projection::BucketCount))
            .interval(Duration::from_millis(100))
            .build()
            .unwrap();
        let mut views = poller.subscribe();

        poller.start();
        let mut cycles = Vec::new();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        while tokio::time::timeout_at(deadline, views.changed()).await.is_ok() {
            cycles.push(views.borrow_and_update().cycle);
        }

        assert!(!cycles.is_empty());
        assert!(cycles.windows(2).all(|w| w[0] < w[1]));
        // A 250ms cycle cannot be started every 100ms.
        assert!(transport.get_calls(EC2) <= 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_liveness_source_is_offline() {
        let transport = Arc::new(ScriptedTransport::new("test"));
        transport.fail(EC2, 502);
        transport.respond(S3, json!({"buckets": [{"name": "a"}, {"name": "b"}]}));
        let poller = poller(&transport);

        poller.start();
        settle().await;

        let view = poller.view();
        assert_eq!(view.overall_status, OverallStatus::Offline);
        assert_eq!(view.get("ec2").unwrap().error, Some(FailureReason::Network));
        assert_eq!(view.data("s3"), Some(&Payload::Count(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_begins_from_initial_view() {
        let transport = Arc::new(ScriptedTransport::new("test"));
        transport.respond(EC2, json!({"instances": []}));
        transport.respond(S3, json!({"buckets": []}));
        let poller = poller(&transport);

        poller.start();
        settle().await;
        poller.stop();
        assert_eq!(poller.view().cycle, 1);

        poller.start();
        assert_eq!(poller.view().cycle, 0);
        settle().await;
        assert_eq!(poller.view().cycle, 1);
        assert_eq!(transport.get_calls(EC2), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_polling() {
        let transport = Arc::new(ScriptedTransport::new("test"));
        transport.respond(EC2, json!({"instances": []}));
        transport.respond(S3, json!({"buckets": []}));

        let handle = {
            let poller = poller(&transport);
            let handle = poller.start();
            settle().await;
            handle
        };
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert!(handle.is_stopped());
        assert_eq!(transport.get_calls(EC2), 1);
    }
}
