//! A typed dataflow graph execution engine.
//!
//! Nodes declare named, typed input and output pins; connections wire an
//! output pin to an input pin, with type tags checked at wiring time.
//! Evaluation is either demand-driven ([`Graph::compute_output`]) or
//! scheduled across a worker pool ([`ParallelEvaluator`]). Where the caching
//! policy allows it, intermediate values are moved into their sole consumer
//! instead of being copied.

pub mod error;
pub mod evaluation;
pub mod graph;
pub mod model;
pub mod util;

pub use error::GraphError;
pub use evaluation::info::{CancelToken, EvalInfo};
pub use evaluation::parallel::{ExecutionLog, NodeCompletion, ParallelEvaluator, TaskRecord};
pub use graph::analysis::topological_order;
pub use graph::{CachingStrategy, Graph};
pub use model::connection::{Connection, NodeHandle, PinId};
pub use model::data_map::DataMap;
pub use model::node::{FlowNode, OutputCache};
pub use model::pin::{InputPin, OutputPin, PinType};
pub use model::value::{PinData, PinValue};
