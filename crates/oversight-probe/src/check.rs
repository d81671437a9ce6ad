//! The shape of a check function and what it can hand back.
//!
//! The original scheduler let a check either return a result map or raise
//! one of four sentinel exceptions to signal something other than success.
//! Rust has no exceptions to borrow for that, so [`CheckOutcome`] makes
//! those four exits explicit variants instead.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use oversight_protocol::{AssetHandle, ConfigMap, Severity};

/// Per-asset scalar config, as served by the local config store. Always
/// plain strings — see the component design for the local store format.
pub type AssetConfig = HashMap<String, String>;

/// What a check invocation finished with.
#[derive(Debug, Clone)]
pub enum CheckOutcome {
    /// A result map to ship to the coordinator. If the value isn't a
    /// MessagePack map, the scheduler downgrades this to an error result
    /// rather than sending a malformed dump.
    Result(rmpv::Value),
    /// Suppress this tick's dump but keep the task scheduled normally.
    IgnoreResult,
    /// Stop scheduling this check entirely. It is re-created only if a
    /// later reconciliation changes this path's assignment.
    IgnoreCheck,
    /// A partial result alongside an error descriptor — both are shipped.
    Incomplete {
        partial: rmpv::Value,
        message: String,
        severity: Severity,
    },
    /// The check failed outright; only the error descriptor is shipped.
    Error { message: String, severity: Severity },
}

impl CheckOutcome {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            severity: Severity::default(),
        }
    }

    pub fn error_with_severity(message: impl Into<String>, severity: Severity) -> Self {
        Self::Error {
            message: message.into(),
            severity,
        }
    }

    pub fn incomplete(partial: rmpv::Value, message: impl Into<String>, severity: Severity) -> Self {
        Self::Incomplete {
            partial,
            message: message.into(),
            severity,
        }
    }
}

pub type CheckFuture = Pin<Box<dyn Future<Output = CheckOutcome> + Send>>;

/// A catalog entry: `(asset, asset_config, check_config) -> outcome`.
pub type BoxedCheckFn =
    Arc<dyn Fn(AssetHandle, AssetConfig, ConfigMap) -> CheckFuture + Send + Sync>;

pub type Catalog = HashMap<String, BoxedCheckFn>;

/// Wrap an `async fn`/closure as a catalog entry, boxing its future.
///
/// ```ignore
/// catalog.insert("ping".into(), oversight_probe::check::check_fn(
///     |asset, asset_config, check_config| async move { .. }
/// ));
/// ```
pub fn check_fn<F, Fut>(f: F) -> BoxedCheckFn
where
    F: Fn(AssetHandle, AssetConfig, ConfigMap) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CheckOutcome> + Send + 'static,
{
    Arc::new(move |asset, asset_config, check_config| {
        Box::pin(f(asset, asset_config, check_config))
    })
}
