//! The node capability contract and the per-node output store.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::GraphError;
use crate::evaluation::info::EvalInfo;
use crate::model::data_map::DataMap;
use crate::model::pin::{InputPin, OutputPin, PinType};
use crate::model::value::PinValue;

/// Per-node output store: one slot per output name holding the last
/// computed value.
#[derive(Debug, Default)]
pub struct OutputCache {
    slots: BTreeMap<String, PinValue>,
}

impl OutputCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: PinValue) {
        self.slots.insert(name.into(), value);
    }

    pub fn is_available(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Hand out a read-only alias of the slot's value. The slot transitions
    /// to the shared state in place and retains the value.
    pub fn share(&mut self, name: &str) -> Result<PinValue, GraphError> {
        let value = self
            .slots
            .remove(name)
            .ok_or_else(|| GraphError::OutputDoesNotExist(name.to_string()))?;
        let shared = value.into_shared();
        self.slots
            .insert(name.to_string(), PinValue::Shared(Arc::clone(&shared)));
        Ok(PinValue::Shared(shared))
    }

    /// Move the slot's value out, leaving the slot empty.
    pub fn take(&mut self, name: &str) -> Result<PinValue, GraphError> {
        self.slots
            .remove(name)
            .ok_or_else(|| GraphError::OutputDoesNotExist(name.to_string()))
    }

    pub fn clear(&mut self, name: &str) {
        self.slots.remove(name);
    }

    pub fn clear_all(&mut self) {
        self.slots.clear();
    }
}

/// The capability contract every computation node implements.
///
/// Nodes declare their pins, report which inputs a given set of outputs
/// actually needs, and evaluate input bundles into their output store.
/// Whether a node recomputes or reuses a still-valid cached output is the
/// node's own decision, made from its own tracking of changed inputs; the
/// engine does no dirty propagation.
pub trait FlowNode: Send {
    /// Declared input pins, in order.
    fn inputs(&self) -> Vec<InputPin>;

    /// Declared output pins, in order.
    fn outputs(&self) -> Vec<OutputPin>;

    fn cache(&self) -> &OutputCache;

    fn cache_mut(&mut self) -> &mut OutputCache;

    /// Produce every output named in `requested`, making each available in
    /// the output store. A node that recomputes must call
    /// [`EvalInfo::count_compute`]; a node whose cached outputs are still
    /// valid leaves them in place.
    fn evaluate(
        &mut self,
        inputs: DataMap,
        requested: &[String],
        info: &EvalInfo,
    ) -> Result<(), GraphError>;

    /// Which inputs are needed to produce the requested subset of outputs.
    /// Defaults to all declared inputs; nodes with independent outputs
    /// override this so unused branches are never evaluated.
    fn required_inputs(&self, _requested: &[String]) -> Vec<String> {
        self.inputs().into_iter().map(|pin| pin.name).collect()
    }

    fn input_type(&self, name: &str) -> Result<PinType, GraphError> {
        self.inputs()
            .into_iter()
            .find(|pin| pin.name == name)
            .map(|pin| pin.pin_type)
            .ok_or_else(|| GraphError::InputDoesNotExist(name.to_string()))
    }

    fn output_type(&self, name: &str) -> Result<PinType, GraphError> {
        self.outputs()
            .into_iter()
            .find(|pin| pin.name == name)
            .map(|pin| pin.pin_type)
            .ok_or_else(|| GraphError::OutputDoesNotExist(name.to_string()))
    }

    fn output_available(&self, name: &str) -> bool {
        self.cache().is_available(name)
    }

    /// Hand out a read-only alias of an output.
    fn get_output(&mut self, name: &str) -> Result<PinValue, GraphError> {
        self.cache_mut().share(name)
    }

    /// Transfer ownership of an output out of the node, leaving its slot
    /// empty.
    fn steal_output(&mut self, name: &str) -> Result<PinValue, GraphError> {
        self.cache_mut().take(name)
    }

    /// Store an output value, checked against the declared output type.
    fn set_output(&mut self, name: &str, value: PinValue) -> Result<(), GraphError> {
        let expected = self.output_type(name)?;
        let found = value.pin_type();
        if expected != found {
            return Err(GraphError::UnmatchedTypes { expected, found });
        }
        self.cache_mut().set(name, value);
        Ok(())
    }
}
