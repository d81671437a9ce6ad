//! AgentCore message shapes: the six frame types exchanged between a
//! probe and the coordinator, and how each one's body is encoded.
//!
//! Every body is MessagePack, decoded through [`rmpv::Value`] so a single
//! malformed field doesn't have to fail the whole batch — see
//! [`decode_assignments`].

use rmpv::Value;
use serde::{Deserialize, Serialize};

use crate::asset::{CheckAssignment, ConfigMap, ErrorDescriptor, Names, Path};
use crate::error::FrameError;

/// Frame type bytes used on the AgentCore link. See the dispatch table in
/// the component design: values with the high bit set are responses.
pub mod frame_type {
    pub const FAF_DUMP: u8 = 0x00;
    pub const REQ_ANNOUNCE: u8 = 0x01;
    pub const FAF_ASSETS: u8 = 0x02;
    pub const REQ_INFO: u8 = 0x03;
    pub const RES_ANNOUNCE: u8 = 0x81;
    pub const RES_INFO: u8 = 0x82;
}

/// Body of a `REQ_ANNOUNCE` frame: `(name, version)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnouncePayload(pub String, pub String);

impl AnnouncePayload {
    pub fn encode(&self) -> Vec<u8> {
        rmp_serde::to_vec(self).expect("announce payload is always serializable")
    }
}

/// Body of a `FAF_DUMP` frame: `[path, (result, error), ts_next]`.
///
/// `result` is present on success or on an incomplete result; `error` is
/// present on any failure (including incomplete). Exactly one pairing
/// applies per the outcome classification: `(Some, None)` success,
/// `(None, Some)` failure, `(Some, Some)` incomplete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpPayload {
    pub path: Path,
    pub result: (Option<Value>, Option<ErrorDescriptor>),
    pub ts_next: i64,
}

impl DumpPayload {
    pub fn encode(&self) -> Vec<u8> {
        rmp_serde::to_vec(self).expect("dump payload is always serializable")
    }
}

/// Body of a `RES_INFO` frame: the current wall-clock time in seconds.
pub fn encode_heartbeat_reply(now_secs: f64) -> Vec<u8> {
    rmp_serde::to_vec(&now_secs).expect("f64 is always serializable")
}

/// Decode a `RES_ANNOUNCE` or `FAF_ASSETS` body into assignments.
///
/// The body is a list of entries. Two shapes are accepted per entry,
/// since the coordinator has been observed sending both:
///
/// - `[path, (asset_name, check_name), config]` (preferred, richer)
/// - `[path, check_name, config]` (legacy, bare check name)
///
/// A malformed individual entry is skipped with a warning rather than
/// failing the whole snapshot; only a body that isn't valid MessagePack,
/// or isn't a list at all, is treated as framing corruption.
pub fn decode_assignments(body: &[u8]) -> Result<Vec<CheckAssignment>, FrameError> {
    let value: Value = rmp_serde::from_slice(body)?;
    let entries = value
        .as_array()
        .ok_or_else(|| FrameError::MalformedBody("assignments body is not a list".into()))?;

    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        match parse_assignment_entry(entry) {
            Some(assignment) => out.push(assignment),
            None => tracing::warn!(entry = %entry, "skipping malformed assignment entry"),
        }
    }
    Ok(out)
}

fn parse_assignment_entry(entry: &Value) -> Option<CheckAssignment> {
    let fields = entry.as_array()?;
    if fields.len() != 3 {
        return None;
    }

    let path = parse_path(&fields[0])?;
    let names = parse_names(&fields[1])?;
    let config = parse_config(&fields[2])?;

    Some(CheckAssignment {
        path,
        names,
        config,
    })
}

fn parse_path(value: &Value) -> Option<Path> {
    let elems = value.as_array()?;
    if elems.len() != 3 {
        return None;
    }
    Some(Path(
        elems[0].as_i64()?,
        elems[1].as_i64()?,
        elems[2].as_i64()?,
    ))
}

/// Accepts either `(asset_name, check_name)` or a bare `check_name` string
/// (the two divergent shapes observed from the coordinator). The bare
/// form has no asset name, so it's filled in as empty.
fn parse_names(value: &Value) -> Option<Names> {
    if let Some(s) = value.as_str() {
        return Some(Names(String::new(), s.to_string()));
    }
    let elems = value.as_array()?;
    if elems.len() != 2 {
        return None;
    }
    Some(Names(
        elems[0].as_str()?.to_string(),
        elems[1].as_str()?.to_string(),
    ))
}

fn parse_config(value: &Value) -> Option<ConfigMap> {
    let map = value.as_map()?;
    let mut out = ConfigMap::new();
    for (k, v) in map {
        let key = k.as_str()?.to_string();
        out.insert(key, v.clone());
    }
    Some(out)
}
