//! # diffdedup wire protocol
//!
//! Encodings for the event streams entering and leaving the operator, plus
//! key and sort extraction for JSON payloads.
//!
//! ## Encodings
//!
//! - JSON lines: one event object per line, tagged by `event`
//! - CBOR frames: a 4-byte big-endian length followed by one CBOR event
//!
//! ```json
//! {"event":"insert","id":0,"data":{"group":"a"},"sortIndex":3}
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod payload;

pub use codec::CodecError;
pub use payload::{json_dedup, JsonDedup};

/// An inbound event carrying a JSON payload.
pub type WireInput = diffdedup_core::InputOp<serde_json::Value>;

/// An outbound event carrying a JSON payload.
pub type WireOutput = diffdedup_core::OutputOp<serde_json::Value>;
