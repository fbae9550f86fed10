//! View sessions: one open screen and everything it owns.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use crate::data::{AggregatedView, FallbackPolicy};
use crate::error::ViewError;
use crate::source::Transport;
use crate::sync::{
    ActionKind, ActionMachine, ActionRequest, ActionRun, DetailState, PollHandle, Poller,
    SelectionTracker, Trigger, DEFAULT_POLL_INTERVAL, DEFAULT_REVERT_DELAY,
};
use crate::views::ViewKind;

/// Timing and fallback settings shared by every component of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub poll_interval: Duration,
    pub revert_delay: Duration,
    pub fallback_policy: FallbackPolicy,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            revert_delay: DEFAULT_REVERT_DELAY,
            fallback_policy: FallbackPolicy::default(),
        }
    }
}

/// An open view: exactly one poller, plus the selection tracker and action
/// machines the view defines.
///
/// Successful actions refresh the poller once. Closing the session, or
/// dropping it, stops every component; nothing it owns publishes afterwards.
#[derive(Debug)]
pub struct ViewSession {
    kind: ViewKind,
    poller: Poller,
    handle: PollHandle,
    selection: Option<SelectionTracker>,
    actions: BTreeMap<ActionKind, ActionMachine>,
    closed: AtomicBool,
}

impl ViewSession {
    /// Open `kind` and start polling. Must be called within a tokio runtime.
    pub fn open(
        kind: ViewKind,
        transport: Arc<dyn Transport>,
        options: SessionOptions,
    ) -> Result<Self, ViewError> {
        let spec = kind.spec();

        let poller = Poller::builder(transport.clone())
            .sources(spec.sources)
            .liveness(spec.liveness)
            .interval(options.poll_interval)
            .policy(options.fallback_policy)
            .build()?;
        let handle = poller.start();

        let selection = spec.detail.map(|detail| {
            SelectionTracker::new(transport.clone(), detail.factory(), options.poll_interval)
                .with_policy(options.fallback_policy)
        });

        let actions = spec
            .actions
            .iter()
            .map(|&action| {
                let machine = ActionMachine::new(action, transport.clone(), options.revert_delay);
                machine.on_success(handle.clone());
                (action, machine)
            })
            .collect();

        info!(view = %kind, transport = transport.description(), "view opened");
        Ok(Self {
            kind,
            poller,
            handle,
            selection,
            actions,
            closed: AtomicBool::new(false),
        })
    }

    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    pub fn view(&self) -> Arc<AggregatedView> {
        self.poller.view()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<AggregatedView>> {
        self.poller.subscribe()
    }

    /// Run one extra poll cycle now.
    pub fn refresh(&self) {
        self.handle.refresh();
    }

    pub fn poll_handle(&self) -> &PollHandle {
        &self.handle
    }

    pub fn has_selection(&self) -> bool {
        self.selection.is_some()
    }

    /// Change the selected resource; returns the new selection epoch.
    pub fn select(&self, id: Option<&str>) -> Result<u64, ViewError> {
        let tracker = self.tracker()?;
        if self.closed.load(Ordering::Acquire) {
            return Err(ViewError::Closed(self.kind.label()));
        }
        Ok(tracker.select(id))
    }

    pub fn selected(&self) -> Option<String> {
        self.selection.as_ref().and_then(SelectionTracker::selected)
    }

    pub fn detail(&self) -> Option<DetailState> {
        self.selection.as_ref().map(SelectionTracker::detail)
    }

    pub fn subscribe_detail(&self) -> Result<watch::Receiver<DetailState>, ViewError> {
        self.tracker().map(SelectionTracker::subscribe)
    }

    /// The actions this view offers.
    pub fn actions(&self) -> impl Iterator<Item = ActionKind> + '_ {
        self.actions.keys().copied()
    }

    /// Trigger `request` on its action machine.
    pub fn trigger(&self, request: ActionRequest) -> Result<Trigger, ViewError> {
        Ok(self.machine(request.kind())?.trigger(request))
    }

    pub fn action_run(&self, kind: ActionKind) -> Option<ActionRun> {
        self.actions.get(&kind).map(ActionMachine::run)
    }

    pub fn subscribe_action(&self, kind: ActionKind) -> Result<watch::Receiver<ActionRun>, ViewError> {
        self.machine(kind).map(ActionMachine::subscribe)
    }

    /// Stop polling, clear the selection and reset every action to idle.
    ///
    /// Only the first call has an effect.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.poller.stop();
        if let Some(tracker) = &self.selection {
            tracker.teardown();
        }
        for machine in self.actions.values() {
            machine.teardown();
        }
        info!(view = %self.kind, "view closed");
    }

    fn tracker(&self) -> Result<&SelectionTracker, ViewError> {
        self.selection
            .as_ref()
            .ok_or(ViewError::NoSelection(self.kind.label()))
    }

    fn machine(&self, kind: ActionKind) -> Result<&ActionMachine, ViewError> {
        self.actions.get(&kind).ok_or(ViewError::ActionUnavailable {
            view: self.kind.label(),
            action: kind.label(),
        })
    }
}

impl Drop for ViewSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ScriptedTransport;

    #[tokio::test(start_paused = true)]
    async fn test_open_wires_view_components() {
        let transport = Arc::new(ScriptedTransport::new("test"));

        let cluster = ViewSession::open(ViewKind::Cluster, transport.clone(), SessionOptions::default())
            .unwrap();
        assert!(!cluster.has_selection());
        assert_eq!(cluster.actions().collect::<Vec<_>>(), vec![ActionKind::Deploy]);
        assert_eq!(cluster.select(Some("x")), Err(ViewError::NoSelection("cluster")));

        let advisor = ViewSession::open(ViewKind::Advisor, transport, SessionOptions::default())
            .unwrap();
        assert!(advisor.has_selection());
        assert_eq!(
            advisor.trigger(ActionRequest::deploy()),
            Err(ViewError::ActionUnavailable {
                view: "advisor",
                action: "deploy",
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_rejected() {
        let transport = Arc::new(ScriptedTransport::new("test"));
        let options = SessionOptions {
            poll_interval: Duration::ZERO,
            ..SessionOptions::default()
        };
        let err = ViewSession::open(ViewKind::Dashboard, transport, options).unwrap_err();
        assert_eq!(err, ViewError::ZeroInterval);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_is_idempotent() {
        let transport = Arc::new(ScriptedTransport::new("test"));
        let session = ViewSession::open(ViewKind::Advisor, transport, SessionOptions::default())
            .unwrap();
        session.select(Some("i-1")).unwrap();

        session.close();
        let mut detail = session.subscribe_detail().unwrap();
        let mut runs = session.subscribe_action(ActionKind::Predict).unwrap();
        let epoch = session.detail().unwrap().epoch;

        session.close();
        assert_eq!(session.select(Some("i-2")), Err(ViewError::Closed("advisor")));
        assert_eq!(session.detail().unwrap().epoch, epoch);
        assert!(!detail.has_changed().unwrap());
        assert!(!runs.has_changed().unwrap());

        drop(session);
        let state = detail.borrow_and_update().clone();
        assert_eq!(state.epoch, epoch);
        assert_eq!(state.selected, None);
    }
}
