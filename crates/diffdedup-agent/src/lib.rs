//! # diffdedup agent
//!
//! Runs the deduplication operator as a stage in an async pipeline.
//!
//! ## Architecture
//!
//! The binary wires three tasks together over bounded channels:
//! 1. **Ingress**: reads JSON-line input events from stdin
//! 2. **Stage**: applies each event to the operator and forwards the output
//! 3. **Egress**: writes JSON-line output events to stdout
//!
//! Every output event is sent before the next input is accepted, so a slow
//! consumer holds back the producer.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod runtime;

pub use config::AgentConfig;
pub use runtime::{Stage, StageError, StageHandle, StageStats};
