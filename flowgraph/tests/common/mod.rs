//! Shared node types for the integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use flowgraph::{
    DataMap, EvalInfo, FlowNode, GraphError, InputPin, OutputCache, OutputPin, PinValue,
};

/// Payload that counts how many times it is cloned, so tests can prove a
/// value was moved rather than copied.
#[derive(Debug)]
pub struct CountedBuffer {
    pub values: Vec<f64>,
    copies: Arc<AtomicUsize>,
}

impl CountedBuffer {
    pub fn with_counter(values: Vec<f64>, copies: Arc<AtomicUsize>) -> Self {
        Self { values, copies }
    }
}

impl Clone for CountedBuffer {
    fn clone(&self) -> Self {
        self.copies.fetch_add(1, Ordering::Relaxed);
        Self {
            values: self.values.clone(),
            copies: Arc::clone(&self.copies),
        }
    }
}

/// Emits a fixed integer on pin "value".
pub struct ConstNode {
    value: i64,
    cache: OutputCache,
}

impl ConstNode {
    pub fn new(value: i64) -> Self {
        Self {
            value,
            cache: OutputCache::new(),
        }
    }
}

impl FlowNode for ConstNode {
    fn inputs(&self) -> Vec<InputPin> {
        Vec::new()
    }

    fn outputs(&self) -> Vec<OutputPin> {
        vec![OutputPin::new::<i64>("value")]
    }

    fn cache(&self) -> &OutputCache {
        &self.cache
    }

    fn cache_mut(&mut self) -> &mut OutputCache {
        &mut self.cache
    }

    fn evaluate(
        &mut self,
        _inputs: DataMap,
        _requested: &[String],
        info: &EvalInfo,
    ) -> Result<(), GraphError> {
        if self.output_available("value") {
            return Ok(());
        }
        info.count_compute();
        self.set_output("value", PinValue::new(self.value))
    }
}

/// Emits a `CountedBuffer` on pin "buffer".
pub struct BufferSourceNode {
    values: Vec<f64>,
    copies: Arc<AtomicUsize>,
    cache: OutputCache,
}

impl BufferSourceNode {
    pub fn new(values: Vec<f64>) -> (Self, Arc<AtomicUsize>) {
        let copies = Arc::new(AtomicUsize::new(0));
        (
            Self {
                values,
                copies: Arc::clone(&copies),
                cache: OutputCache::new(),
            },
            copies,
        )
    }
}

impl FlowNode for BufferSourceNode {
    fn inputs(&self) -> Vec<InputPin> {
        Vec::new()
    }

    fn outputs(&self) -> Vec<OutputPin> {
        vec![OutputPin::new::<CountedBuffer>("buffer")]
    }

    fn cache(&self) -> &OutputCache {
        &self.cache
    }

    fn cache_mut(&mut self) -> &mut OutputCache {
        &mut self.cache
    }

    fn evaluate(
        &mut self,
        _inputs: DataMap,
        _requested: &[String],
        info: &EvalInfo,
    ) -> Result<(), GraphError> {
        if self.output_available("buffer") {
            return Ok(());
        }
        info.count_compute();
        let buffer = CountedBuffer::with_counter(self.values.clone(), Arc::clone(&self.copies));
        self.set_output("buffer", PinValue::new(buffer))
    }
}

/// `out = in + addend`, recomputing only when the input changed.
pub struct AddNode {
    addend: i64,
    consumable: bool,
    last_input: Option<i64>,
    cache: OutputCache,
}

impl AddNode {
    pub fn new(addend: i64) -> Self {
        Self {
            addend,
            consumable: false,
            last_input: None,
            cache: OutputCache::new(),
        }
    }

    pub fn consuming(addend: i64) -> Self {
        Self {
            consumable: true,
            ..Self::new(addend)
        }
    }
}

impl FlowNode for AddNode {
    fn inputs(&self) -> Vec<InputPin> {
        let pin = InputPin::new::<i64>("in");
        vec![if self.consumable { pin.consumable() } else { pin }]
    }

    fn outputs(&self) -> Vec<OutputPin> {
        vec![OutputPin::new::<i64>("out")]
    }

    fn cache(&self) -> &OutputCache {
        &self.cache
    }

    fn cache_mut(&mut self) -> &mut OutputCache {
        &mut self.cache
    }

    fn evaluate(
        &mut self,
        inputs: DataMap,
        _requested: &[String],
        info: &EvalInfo,
    ) -> Result<(), GraphError> {
        let input = *inputs.get_as::<i64>("in")?;
        if self.output_available("out") && self.last_input == Some(input) {
            return Ok(());
        }
        info.count_compute();
        self.last_input = Some(input);
        self.set_output("out", PinValue::new(input + self.addend))
    }
}

/// `out = a + b`, recomputing only when an input changed.
pub struct SumNode {
    last_inputs: Option<(i64, i64)>,
    cache: OutputCache,
}

impl SumNode {
    pub fn new() -> Self {
        Self {
            last_inputs: None,
            cache: OutputCache::new(),
        }
    }
}

impl FlowNode for SumNode {
    fn inputs(&self) -> Vec<InputPin> {
        vec![InputPin::new::<i64>("a"), InputPin::new::<i64>("b")]
    }

    fn outputs(&self) -> Vec<OutputPin> {
        vec![OutputPin::new::<i64>("out")]
    }

    fn cache(&self) -> &OutputCache {
        &self.cache
    }

    fn cache_mut(&mut self) -> &mut OutputCache {
        &mut self.cache
    }

    fn evaluate(
        &mut self,
        inputs: DataMap,
        _requested: &[String],
        info: &EvalInfo,
    ) -> Result<(), GraphError> {
        let a = *inputs.get_as::<i64>("a")?;
        let b = *inputs.get_as::<i64>("b")?;
        if self.output_available("out") && self.last_inputs == Some((a, b)) {
            return Ok(());
        }
        info.count_compute();
        self.last_inputs = Some((a, b));
        self.set_output("out", PinValue::new(a + b))
    }
}

/// Scales a `CountedBuffer` in place; its input is consumable, so with a
/// sole uncached producer the buffer is moved in rather than copied.
pub struct ScaleBufferNode {
    factor: f64,
    cache: OutputCache,
}

impl ScaleBufferNode {
    pub fn new(factor: f64) -> Self {
        Self {
            factor,
            cache: OutputCache::new(),
        }
    }
}

impl FlowNode for ScaleBufferNode {
    fn inputs(&self) -> Vec<InputPin> {
        vec![InputPin::new::<CountedBuffer>("buffer").consumable()]
    }

    fn outputs(&self) -> Vec<OutputPin> {
        vec![OutputPin::new::<CountedBuffer>("out")]
    }

    fn cache(&self) -> &OutputCache {
        &self.cache
    }

    fn cache_mut(&mut self) -> &mut OutputCache {
        &mut self.cache
    }

    fn evaluate(
        &mut self,
        mut inputs: DataMap,
        _requested: &[String],
        info: &EvalInfo,
    ) -> Result<(), GraphError> {
        let mut buffer = inputs.extract::<CountedBuffer>("buffer")?;
        info.count_compute();
        for value in &mut buffer.values {
            *value *= self.factor;
        }
        self.set_output("out", PinValue::new(buffer))
    }
}

/// Outputs "doubled" (needs only input "a") and "sum" (needs "a" and "b"),
/// so requesting "doubled" must leave the "b" branch unevaluated.
pub struct SelectiveNode {
    cache: OutputCache,
}

impl SelectiveNode {
    pub fn new() -> Self {
        Self {
            cache: OutputCache::new(),
        }
    }
}

impl FlowNode for SelectiveNode {
    fn inputs(&self) -> Vec<InputPin> {
        vec![InputPin::new::<i64>("a"), InputPin::new::<i64>("b")]
    }

    fn outputs(&self) -> Vec<OutputPin> {
        vec![OutputPin::new::<i64>("doubled"), OutputPin::new::<i64>("sum")]
    }

    fn cache(&self) -> &OutputCache {
        &self.cache
    }

    fn cache_mut(&mut self) -> &mut OutputCache {
        &mut self.cache
    }

    fn required_inputs(&self, requested: &[String]) -> Vec<String> {
        let mut required = vec!["a".to_string()];
        if requested.iter().any(|name| name == "sum") {
            required.push("b".to_string());
        }
        required
    }

    fn evaluate(
        &mut self,
        inputs: DataMap,
        requested: &[String],
        info: &EvalInfo,
    ) -> Result<(), GraphError> {
        info.count_compute();
        let a = *inputs.get_as::<i64>("a")?;
        for name in requested {
            match name.as_str() {
                "doubled" => self.set_output("doubled", PinValue::new(a * 2))?,
                "sum" => {
                    let b = *inputs.get_as::<i64>("b")?;
                    self.set_output("sum", PinValue::new(a + b))?;
                }
                other => return Err(GraphError::OutputDoesNotExist(other.to_string())),
            }
        }
        Ok(())
    }
}

/// Declares an output it never produces; evaluation of anything downstream
/// of it must fail with `OutputDoesNotExist`.
pub struct BrokenNode {
    cache: OutputCache,
}

impl BrokenNode {
    pub fn new() -> Self {
        Self {
            cache: OutputCache::new(),
        }
    }
}

impl FlowNode for BrokenNode {
    fn inputs(&self) -> Vec<InputPin> {
        Vec::new()
    }

    fn outputs(&self) -> Vec<OutputPin> {
        vec![OutputPin::new::<i64>("out")]
    }

    fn cache(&self) -> &OutputCache {
        &self.cache
    }

    fn cache_mut(&mut self) -> &mut OutputCache {
        &mut self.cache
    }

    fn evaluate(
        &mut self,
        _inputs: DataMap,
        _requested: &[String],
        _info: &EvalInfo,
    ) -> Result<(), GraphError> {
        Ok(())
    }
}

/// Source with an integer and a string output, for connection inference.
pub struct PairSourceNode {
    cache: OutputCache,
}

impl PairSourceNode {
    pub fn new() -> Self {
        Self {
            cache: OutputCache::new(),
        }
    }
}

impl FlowNode for PairSourceNode {
    fn inputs(&self) -> Vec<InputPin> {
        Vec::new()
    }

    fn outputs(&self) -> Vec<OutputPin> {
        vec![
            OutputPin::new::<i64>("number"),
            OutputPin::new::<String>("label"),
        ]
    }

    fn cache(&self) -> &OutputCache {
        &self.cache
    }

    fn cache_mut(&mut self) -> &mut OutputCache {
        &mut self.cache
    }

    fn evaluate(
        &mut self,
        _inputs: DataMap,
        requested: &[String],
        info: &EvalInfo,
    ) -> Result<(), GraphError> {
        info.count_compute();
        for name in requested {
            match name.as_str() {
                "number" => self.set_output("number", PinValue::new(42_i64))?,
                "label" => self.set_output("label", PinValue::new("answer".to_string()))?,
                other => return Err(GraphError::OutputDoesNotExist(other.to_string())),
            }
        }
        Ok(())
    }
}

/// Sink with a single integer input.
pub struct IntSinkNode {
    cache: OutputCache,
}

impl IntSinkNode {
    pub fn new() -> Self {
        Self {
            cache: OutputCache::new(),
        }
    }
}

impl FlowNode for IntSinkNode {
    fn inputs(&self) -> Vec<InputPin> {
        vec![InputPin::new::<i64>("number")]
    }

    fn outputs(&self) -> Vec<OutputPin> {
        Vec::new()
    }

    fn cache(&self) -> &OutputCache {
        &self.cache
    }

    fn cache_mut(&mut self) -> &mut OutputCache {
        &mut self.cache
    }

    fn evaluate(
        &mut self,
        _inputs: DataMap,
        _requested: &[String],
        _info: &EvalInfo,
    ) -> Result<(), GraphError> {
        Ok(())
    }
}

/// Sink with two integer inputs — inference against it is ambiguous.
pub struct TwoIntSinkNode {
    cache: OutputCache,
}

impl TwoIntSinkNode {
    pub fn new() -> Self {
        Self {
            cache: OutputCache::new(),
        }
    }
}

impl FlowNode for TwoIntSinkNode {
    fn inputs(&self) -> Vec<InputPin> {
        vec![InputPin::new::<i64>("a"), InputPin::new::<i64>("b")]
    }

    fn outputs(&self) -> Vec<OutputPin> {
        Vec::new()
    }

    fn cache(&self) -> &OutputCache {
        &self.cache
    }

    fn cache_mut(&mut self) -> &mut OutputCache {
        &mut self.cache
    }

    fn evaluate(
        &mut self,
        _inputs: DataMap,
        _requested: &[String],
        _info: &EvalInfo,
    ) -> Result<(), GraphError> {
        Ok(())
    }
}

/// Sink with a single boolean input — inference from an integer source
/// finds nothing.
pub struct BoolSinkNode {
    cache: OutputCache,
}

impl BoolSinkNode {
    pub fn new() -> Self {
        Self {
            cache: OutputCache::new(),
        }
    }
}

impl FlowNode for BoolSinkNode {
    fn inputs(&self) -> Vec<InputPin> {
        vec![InputPin::new::<bool>("flag")]
    }

    fn outputs(&self) -> Vec<OutputPin> {
        Vec::new()
    }

    fn cache(&self) -> &OutputCache {
        &self.cache
    }

    fn cache_mut(&mut self) -> &mut OutputCache {
        &mut self.cache
    }

    fn evaluate(
        &mut self,
        _inputs: DataMap,
        _requested: &[String],
        _info: &EvalInfo,
    ) -> Result<(), GraphError> {
        Ok(())
    }
}
