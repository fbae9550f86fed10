//! The asynchronous state holders: poller, selection tracker, and action
//! machines.
//!
//! Each owns its state exclusively and publishes it through a
//! `tokio::sync::watch` channel; consumers only read.

pub mod action;
pub mod poller;
pub mod selection;

pub use action::{
    ActionKind, ActionMachine, ActionRequest, ActionRun, ActionState, Trigger,
    DEFAULT_REVERT_DELAY,
};
pub use poller::{PollHandle, Poller, PollerBuilder, DEFAULT_POLL_INTERVAL};
pub use selection::{DetailFactory, DetailKind, DetailState, SelectionTracker};
