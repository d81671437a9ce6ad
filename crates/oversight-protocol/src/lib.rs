//! Wire framing and AgentCore message shapes for Oversight monitoring
//! probes.
//!
//! This crate has no I/O of its own — it's the part of the probe/
//! coordinator contract that doesn't touch a socket: the frame header
//! layout ([`frame`]), the six message bodies exchanged with AgentCore
//! ([`message`]), and the asset/check identity types both sides agree on
//! ([`asset`]).

pub mod asset;
pub mod error;
pub mod frame;
pub mod message;

pub use asset::{
    interval_from_config, AssetHandle, CheckAssignment, ConfigMap, ErrorDescriptor, Names, Path,
    Severity,
};
pub use error::FrameError;
pub use frame::{Frame, FrameDecoder, HEADER_SIZE, RESPONSE_BIT};
