//! The dataflow graph: node ownership, typed wiring, caching policy.

pub mod analysis;

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::model::connection::{Connection, NodeHandle, PinId};
use crate::model::node::FlowNode;

/// Controls whether a node's outputs are retained across evaluations.
///
/// `Default` resolves to the graph-wide default lazily, at the moment the
/// strategy is read. An `AlwaysCache` node must keep its outputs for future
/// reads and is never stripped of them; a `NeverCache` node's outputs may be
/// moved into a sole consumer, after which the node recomputes on the next
/// pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CachingStrategy {
    #[default]
    Default,
    AlwaysCache,
    NeverCache,
}

struct NodeSlot {
    node: Mutex<Box<dyn FlowNode>>,
    caching: CachingStrategy,
    identifier: String,
}

/// A directed acyclic graph of typed computation nodes.
///
/// Nodes are owned by the graph and referred to through opaque handles;
/// connections wire output pins to input pins with type tags checked at
/// wiring time. Nodes are never removed and connections are immutable once
/// added. Construction takes `&mut self`; evaluation takes `&self` (each
/// node sits behind its own mutex), so a graph can be shared across worker
/// threads once wiring is complete.
pub struct Graph {
    nodes: BTreeMap<NodeHandle, NodeSlot>,
    connections: Vec<Connection>,
    next_handle: u64,
    default_caching: CachingStrategy,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            connections: Vec::new(),
            next_handle: 0,
            default_caching: CachingStrategy::AlwaysCache,
        }
    }

    /// Store a node, issuing the next handle. Never fails.
    pub fn add_node(
        &mut self,
        node: impl FlowNode + 'static,
        identifier: impl Into<String>,
        caching: CachingStrategy,
    ) -> NodeHandle {
        let handle = NodeHandle::new(self.next_handle);
        self.next_handle += 1;
        self.nodes.insert(
            handle,
            NodeSlot {
                node: Mutex::new(Box::new(node)),
                caching,
                identifier: identifier.into(),
            },
        );
        handle
    }

    /// Wire `from`'s output pin to `to`'s input pin.
    ///
    /// Fails without modifying the connection set when either handle is
    /// absent, a pin name is unknown, the pin types differ, or the input is
    /// already fed by another connection.
    pub fn add_connection(
        &mut self,
        from: NodeHandle,
        from_pin: &str,
        to: NodeHandle,
        to_pin: &str,
    ) -> Result<(), GraphError> {
        let from_type = self.with_node(from, |node| node.output_type(from_pin))??;
        let to_type = self.with_node(to, |node| node.input_type(to_pin))??;
        if from_type != to_type {
            return Err(GraphError::UnmatchedTypes {
                expected: to_type,
                found: from_type,
            });
        }
        if self.find_connection_for_input(to, to_pin).is_some() {
            return Err(GraphError::DuplicateInputConnection(to_pin.to_string()));
        }
        self.connections
            .push(Connection::new(PinId::new(from, from_pin), PinId::new(to, to_pin)));
        Ok(())
    }

    /// Wire the single type-compatible (output, input) pair between two
    /// nodes.
    ///
    /// Enumerates every pair across the two nodes whose type tags match and
    /// adds the connection only when exactly one pair does.
    pub fn infer_connection(&mut self, from: NodeHandle, to: NodeHandle) -> Result<(), GraphError> {
        let outputs = self.with_node(from, |node| node.outputs())?;
        let inputs = self.with_node(to, |node| node.inputs())?;

        let mut matched: Option<(String, String)> = None;
        for output in &outputs {
            for input in &inputs {
                if output.pin_type == input.pin_type {
                    if matched.is_some() {
                        return Err(GraphError::MultipleMatchesFound);
                    }
                    matched = Some((output.name.clone(), input.name.clone()));
                }
            }
        }

        match matched {
            Some((from_pin, to_pin)) => self.add_connection(from, &from_pin, to, &to_pin),
            None => Err(GraphError::NoMatchesFound),
        }
    }

    pub fn set_default_caching_strategy(&mut self, strategy: CachingStrategy) {
        self.default_caching = strategy;
    }

    pub fn default_caching_strategy(&self) -> CachingStrategy {
        self.default_caching
    }

    pub fn set_node_caching_strategy(
        &mut self,
        handle: NodeHandle,
        strategy: CachingStrategy,
    ) -> Result<(), GraphError> {
        let slot = self
            .nodes
            .get_mut(&handle)
            .ok_or(GraphError::NodeDoesNotExist(handle))?;
        slot.caching = strategy;
        Ok(())
    }

    /// The node's caching strategy with `Default` resolved to the
    /// graph-wide default.
    pub fn effective_caching_strategy(&self, handle: NodeHandle) -> Result<CachingStrategy, GraphError> {
        let slot = self.slot(handle)?;
        Ok(match slot.caching {
            CachingStrategy::Default => self.default_caching,
            other => other,
        })
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_handles(&self) -> impl Iterator<Item = NodeHandle> + '_ {
        self.nodes.keys().copied()
    }

    pub fn node_identifier(&self, handle: NodeHandle) -> Result<&str, GraphError> {
        Ok(&self.slot(handle)?.identifier)
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Fan-out of an output pin: how many connections draw from it.
    pub fn count_consumers(&self, pin: &PinId) -> usize {
        self.connections.iter().filter(|c| c.from == *pin).count()
    }

    pub fn find_connection_for_input(&self, to: NodeHandle, input: &str) -> Option<&Connection> {
        self.connections
            .iter()
            .find(|c| c.to.node == to && c.to.pin == input)
    }

    pub fn connection_for_input(&self, to: NodeHandle, input: &str) -> Result<&Connection, GraphError> {
        self.find_connection_for_input(to, input)
            .ok_or_else(|| GraphError::ConnectionDoesNotExist(input.to_string()))
    }

    /// Whether the consumer on `connection` may take ownership of the
    /// upstream value instead of receiving a read-only handout.
    ///
    /// Permitted only when the output has no other consumer anywhere in the
    /// graph, the destination input declares itself consumable, and the
    /// upstream node is not effectively `AlwaysCache`.
    pub fn can_steal_output(&self, connection: &Connection) -> Result<bool, GraphError> {
        if self.count_consumers(&connection.from) != 1 {
            return Ok(false);
        }
        let consumable = self.with_node(connection.to.node, |node| {
            node.inputs()
                .into_iter()
                .find(|pin| pin.name == connection.to.pin)
                .map(|pin| pin.consumable)
                .unwrap_or(false)
        })?;
        if !consumable {
            return Ok(false);
        }
        Ok(self.effective_caching_strategy(connection.from.node)? != CachingStrategy::AlwaysCache)
    }

    pub fn is_output_available(&self, handle: NodeHandle, output: &str) -> Result<bool, GraphError> {
        self.with_node(handle, |node| node.output_available(output))
    }

    /// Run a closure against the node behind its mutex.
    pub(crate) fn with_node<R>(
        &self,
        handle: NodeHandle,
        f: impl FnOnce(&mut dyn FlowNode) -> R,
    ) -> Result<R, GraphError> {
        let slot = self.slot(handle)?;
        let mut node = slot.node.lock().expect("node mutex poisoned");
        Ok(f(&mut **node))
    }

    fn slot(&self, handle: NodeHandle) -> Result<&NodeSlot, GraphError> {
        self.nodes
            .get(&handle)
            .ok_or(GraphError::NodeDoesNotExist(handle))
    }
}
