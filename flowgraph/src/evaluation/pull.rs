//! Demand-driven evaluation: recursively resolve one requested output.

use std::collections::HashSet;

use log::debug;

use crate::error::GraphError;
use crate::evaluation::info::EvalInfo;
use crate::graph::{CachingStrategy, Graph};
use crate::model::connection::NodeHandle;
use crate::model::data_map::DataMap;
use crate::model::value::PinValue;
use crate::util::timing::ScopedTimer;

impl Graph {
    /// Evaluate one output of one node, recursively resolving everything
    /// upstream of it.
    ///
    /// Each required input is pulled from its connection, taking ownership
    /// of the upstream value where [`Graph::can_steal_output`] permits it.
    /// With `take_ownership` the final result is moved out of the node's
    /// output store as well, unless the node is effectively `AlwaysCache`,
    /// in which case a read-only handout is returned instead.
    ///
    /// Recursion depth is bounded by graph depth; a cycle is reported as
    /// `CyclicGraph` instead of recursing forever.
    pub fn compute_output(
        &self,
        handle: NodeHandle,
        output: &str,
        info: &EvalInfo,
        take_ownership: bool,
    ) -> Result<PinValue, GraphError> {
        if info.cancelled() {
            return Err(GraphError::OperationCancelled);
        }
        let _timer = ScopedTimer::debug(format!("compute_output {handle}.{output}"));
        let mut in_progress = HashSet::new();
        self.pull(handle, output, info, take_ownership, &mut in_progress)
    }

    fn pull(
        &self,
        handle: NodeHandle,
        output: &str,
        info: &EvalInfo,
        take_ownership: bool,
        in_progress: &mut HashSet<NodeHandle>,
    ) -> Result<PinValue, GraphError> {
        if !in_progress.insert(handle) {
            return Err(GraphError::CyclicGraph);
        }
        let identifier = self.node_identifier(handle)?;
        let requested = vec![output.to_string()];
        let required = self.with_node(handle, |node| node.required_inputs(&requested))?;

        let mut inputs = DataMap::new();
        for input in required {
            let connection = self.find_connection_for_input(handle, &input).ok_or_else(|| {
                GraphError::MalformedGraph(format!(
                    "required input '{input}' of '{identifier}' has no connection"
                ))
            })?;
            let steal = self.can_steal_output(connection)?;
            let (from_node, from_pin) = (connection.from.node, connection.from.pin.clone());
            let value = self.pull(from_node, &from_pin, info, steal, in_progress)?;
            inputs.insert(input, value);
        }

        debug!("evaluating '{}' ({})", self.node_identifier(handle)?, handle);
        info.count_evaluation();
        self.with_node(handle, |node| node.evaluate(inputs, &requested, info))??;
        in_progress.remove(&handle);

        self.handout(handle, output, take_ownership)
    }

    /// Read an already-computed output out of a node: a move when
    /// `take_ownership` is set and the node is not effectively
    /// `AlwaysCache`, a read-only handout otherwise.
    pub(crate) fn handout(
        &self,
        handle: NodeHandle,
        output: &str,
        take_ownership: bool,
    ) -> Result<PinValue, GraphError> {
        let steal =
            take_ownership && self.effective_caching_strategy(handle)? != CachingStrategy::AlwaysCache;
        self.with_node(handle, |node| {
            if !node.output_available(output) {
                return Err(GraphError::OutputDoesNotExist(output.to_string()));
            }
            if steal {
                node.steal_output(output)
            } else {
                node.get_output(output)
            }
        })?
    }
}
