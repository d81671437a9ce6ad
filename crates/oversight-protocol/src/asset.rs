//! Asset identity and check-assignment shapes shared between the frame
//! codec and the scheduler.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A scalar configuration value as handed to a check — keys are always
/// strings, values may be any MessagePack scalar, map, or list.
pub type ConfigMap = BTreeMap<String, rmpv::Value>;

/// The `(zone_id, asset_id, collector_id)` triple that uniquely keys one
/// scheduled (asset, check) pair on this probe.
///
/// Serializes as a plain 3-element array on the wire, matching how the
/// coordinator sends it (a bare tuple, not a map).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Path(pub i64, pub i64, pub i64);

impl Path {
    pub fn new(zone_id: i64, asset_id: i64, collector_id: i64) -> Self {
        Self(zone_id, asset_id, collector_id)
    }

    pub fn zone_id(&self) -> i64 {
        self.0
    }

    pub fn asset_id(&self) -> i64 {
        self.1
    }

    pub fn collector_id(&self) -> i64 {
        self.2
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.0, self.1, self.2)
    }
}

/// The `(asset_name, check_name)` pair carried alongside a [`Path`], used
/// only for logging/context — not part of the path's identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Names(pub String, pub String);

impl Names {
    pub fn asset_name(&self) -> &str {
        &self.0
    }

    pub fn check_name(&self) -> &str {
        &self.1
    }
}

/// The value the core hands to a check invocation for logging/context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetHandle {
    pub id: i64,
    pub asset_name: String,
    pub check_name: String,
}

impl fmt::Display for AssetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "asset: `{}` check: `{}`",
            self.asset_name, self.check_name
        )
    }
}

/// Urgency tag an error descriptor carries to the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
}

/// The `(message, severity)` pair attached to a failed or partial check
/// result, per the "error descriptor" referenced throughout the check
/// outcome classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub error: String,
    pub severity: Severity,
}

impl ErrorDescriptor {
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            error: message.into(),
            severity,
        }
    }
}

/// One check assignment as reconciled by the scheduler: a path, its
/// `(asset_name, check_name)` pair, and its config map (must contain
/// `_interval`).
#[derive(Debug, Clone, PartialEq)]
pub struct CheckAssignment {
    pub path: Path,
    pub names: Names,
    pub config: ConfigMap,
}

impl CheckAssignment {
    /// The `_interval` key, in whole seconds. Assignments without a
    /// positive `_interval` are not schedulable and are rejected by the
    /// caller before this type is constructed.
    pub fn interval_secs(&self) -> Option<u64> {
        interval_from_config(&self.config)
    }
}

/// Read the `_interval` key (whole seconds, must be positive) out of a
/// bare config map. Shared by [`CheckAssignment::interval_secs`] and the
/// scheduler, which re-reads this on every tick in case the coordinator
/// pushed a new interval without restarting the check task.
pub fn interval_from_config(config: &ConfigMap) -> Option<u64> {
    match config.get("_interval") {
        Some(rmpv::Value::Integer(n)) => n.as_u64().filter(|v| *v > 0),
        _ => None,
    }
}
