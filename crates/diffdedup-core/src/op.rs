//! Inbound and outbound diff events.
//!
//! Both directions share one wire shape: an object tagged by an `event` field,
//! e.g. `{"event":"insert","id":0,"data":{...}}`. Inbound ids are source
//! positions; outbound ids are visible indices.

use serde::{Deserialize, Serialize};

/// A mutation of the upstream sequence, addressed by source position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum InputOp<P> {
    /// A new element was spliced in at `id`
    Insert {
        /// Source position of the new element
        id: usize,
        /// Element payload
        data: P,
        /// Optional explicit sort position within the element's cluster
        #[serde(
            default,
            rename = "sortIndex",
            skip_serializing_if = "Option::is_none"
        )]
        sort_index: Option<i64>,
    },
    /// The element at `id` was replaced
    Update {
        /// Source position of the element
        id: usize,
        /// New payload
        data: P,
        /// Optional explicit sort position within the element's cluster
        #[serde(
            default,
            rename = "sortIndex",
            skip_serializing_if = "Option::is_none"
        )]
        sort_index: Option<i64>,
    },
    /// The element at `id` was spliced out
    Delete {
        /// Source position of the element
        id: usize,
    },
}

impl<P> InputOp<P> {
    /// Source position this op addresses.
    #[must_use]
    pub fn id(&self) -> usize {
        match self {
            InputOp::Insert { id, .. } | InputOp::Update { id, .. } | InputOp::Delete { id } => {
                *id
            }
        }
    }

    /// Lowercase event name, as it appears on the wire.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            InputOp::Insert { .. } => "insert",
            InputOp::Update { .. } => "update",
            InputOp::Delete { .. } => "delete",
        }
    }
}

/// A change to the visible representative list, addressed by visible index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum OutputOp<P> {
    /// A representative appeared at `id`
    Insert {
        /// Visible index
        id: usize,
        /// Representative payload
        data: P,
    },
    /// The representative at `id` was replaced in place
    Update {
        /// Visible index
        id: usize,
        /// Representative payload
        data: P,
    },
    /// The representative at `id` disappeared
    Delete {
        /// Visible index
        id: usize,
    },
}

impl<P> OutputOp<P> {
    /// Visible index this event addresses.
    #[must_use]
    pub fn id(&self) -> usize {
        match self {
            OutputOp::Insert { id, .. } | OutputOp::Update { id, .. } | OutputOp::Delete { id } => {
                *id
            }
        }
    }

    /// Lowercase event name, as it appears on the wire.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            OutputOp::Insert { .. } => "insert",
            OutputOp::Update { .. } => "update",
            OutputOp::Delete { .. } => "delete",
        }
    }
}
