//! Data sources: what is polled and how one poll becomes an outcome.
//!
//! A source is a named, independently failing feed backed by one `GET`
//! endpoint. [`SourceSpec`] describes it, [`Projection`] validates its body
//! against the wire schema, and [`SourceFetcher`] turns one request into an
//! [`Outcome`] without ever raising past its boundary.
//!
//! Requests go through the [`Transport`] trait from `cnops-client`;
//! [`ScriptedTransport`] stands in for the network in tests.

mod fetch;
mod scripted;
mod spec;

pub use cnops_client::Transport;
pub use fetch::{fetch, FailureReason, Outcome, SourceFetcher};
pub use scripted::{ScriptedReply, ScriptedTransport};
pub use spec::{Payload, Projection, SourceSpec};
