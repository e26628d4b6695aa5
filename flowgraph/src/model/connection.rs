//! Node handles and connections (edges in the dataflow graph).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier for a node in a [`Graph`](crate::Graph).
///
/// Handles are issued monotonically by the graph and are the only way
/// external code refers to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeHandle(u64);

impl NodeHandle {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Identifies a specific pin on a specific node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PinId {
    pub node: NodeHandle,
    pub pin: String,
}

impl PinId {
    pub fn new(node: NodeHandle, pin: impl Into<String>) -> Self {
        Self {
            node,
            pin: pin.into(),
        }
    }
}

/// A connection from one node's output pin to another node's input pin.
///
/// The two pins carry equal type tags; this is enforced when the connection
/// is created and never re-checked during evaluation. Connections are
/// immutable once added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub from: PinId,
    pub to: PinId,
}

impl Connection {
    pub fn new(from: PinId, to: PinId) -> Self {
        Self { from, to }
    }
}
