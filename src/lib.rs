//! # cnops-console
//!
//! Client-side state synchronization for the CloudNetOps console.
//!
//! The engine repeatedly polls several independent, unreliable endpoints,
//! merges their results into one consistent view without letting a failing
//! source corrupt the others, follows the detail feed of one selected
//! resource, and drives user-triggered actions through a guarded state
//! machine that returns to idle on its own.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         ViewSession                          │
//! │  ┌─────────┐    ┌──────────────┐    ┌────────────┐           │
//! │  │ Poller  │───▶│SourceFetcher │───▶│ Transport  │──▶ HTTP   │
//! │  │ (cycle) │    │ (per source) │    │ (ApiClient)│           │
//! │  └────┬────┘    └──────────────┘    └────────────┘           │
//! │       │ outcomes                          ▲        ▲         │
//! │       ▼                                   │        │         │
//! │  ┌──────────┐   watch   ┌────────────┐    │        │         │
//! │  │Aggregator│──────────▶│ consumers  │    │        │         │
//! │  └──────────┘           └────────────┘    │        │         │
//! │  ┌──────────────────┐  detail feed        │        │         │
//! │  │ SelectionTracker │─────────────────────┘        │         │
//! │  └──────────────────┘                              │         │
//! │  ┌──────────────────┐  POST, then refresh poller   │         │
//! │  │  ActionMachine   │──────────────────────────────┘         │
//! │  └──────────────────┘                                        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`source`]**: source descriptors, schema projections, and the fetcher
//!   that turns one request into an [`Outcome`]
//! - **[`data`]**: snapshots, the [`AggregatedView`], and the [`Aggregator`]
//! - **[`sync`]**: the [`Poller`], [`SelectionTracker`] and [`ActionMachine`]
//! - **[`views`]**: the six console screens as [`ViewKind`]
//! - **[`app`]**: [`ViewSession`], one open screen and everything it owns
//! - **[`settings`]**: layered configuration
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use cnops_console::source::ScriptedTransport;
//! use cnops_console::{SessionOptions, ViewKind, ViewSession};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let transport = Arc::new(ScriptedTransport::new("demo"));
//! transport.respond("/status", json!({"status": "ok"}));
//!
//! let session = ViewSession::open(
//!     ViewKind::Dashboard,
//!     transport,
//!     SessionOptions::default(),
//! ).unwrap();
//!
//! let mut views = session.subscribe();
//! views.changed().await.unwrap();
//! println!("{}", serde_json::to_string(&**views.borrow()).unwrap());
//! session.close();
//! # });
//! ```

pub mod app;
pub mod data;
pub mod error;
pub mod settings;
pub mod source;
pub mod sync;
pub mod views;

pub use app::{SessionOptions, ViewSession};
pub use data::{AggregatedView, Aggregator, FallbackPolicy, OverallStatus, Snapshot};
pub use error::ViewError;
pub use settings::{ConfigError, Settings};
pub use source::{FailureReason, Outcome, Payload, Projection, SourceFetcher, SourceSpec};
pub use sync::{
    ActionKind, ActionMachine, ActionRequest, ActionRun, ActionState, DetailKind, DetailState,
    PollHandle, Poller, SelectionTracker, Trigger,
};
pub use views::ViewKind;
