//! # diffdedup Core
//!
//! Incremental deduplication of a live, position-addressed diff stream.
//!
//! Upstream describes an ordered sequence with `insert`/`update`/`delete`
//! events addressed by source position. The operator groups elements into
//! clusters by a caller-supplied key and exposes only one representative per
//! cluster downstream, again as position-addressed events.
//!
//! This crate provides:
//! - Source-index renumbering under array-splice semantics
//! - A sorted-of-sorted cluster table
//! - A reconciler that turns before/after cluster slots into minimal events
//! - The [`Dedup`] operator routing inbound ops through all of the above
//! - A naive [`Replica`] consumer for replaying emitted events

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cluster;
pub mod index;
pub mod op;
pub mod operator;
pub mod reconcile;
pub mod replica;

pub use cluster::{Cluster, ClusterTable, Member, Slot};
pub use index::{SourceIndex, Splice};
pub use op::{InputOp, OutputOp};
pub use operator::{ConfigError, Dedup, DedupBuilder, DedupError};
pub use reconcile::{Cause, Emit, EmitPolicy, Reconciler, Touched};
pub use replica::{Replica, ReplicaError};
