//! Core runtime for Oversight monitoring probes.
//!
//! A host program builds a [`Probe`] from a name, a version, and a catalog
//! of named check functions, then calls [`Probe::run`]. From there this
//! crate owns everything: reconnecting to AgentCore with backoff
//! ([`supervisor`]), dispatching inbound frames ([`dispatcher`]),
//! reconciling the running check set against AgentCore's assignments
//! ([`scheduler`]), and serving per-asset config from a local file
//! ([`config`]).

pub mod check;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod link;
pub mod probe;
pub mod scheduler;
pub mod supervisor;

pub use check::{check_fn, AssetConfig, BoxedCheckFn, Catalog, CheckFuture, CheckOutcome};
pub use error::ProbeError;
pub use probe::{Probe, ProbeBuilder};
