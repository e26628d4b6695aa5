use thiserror::Error;

use crate::model::connection::NodeHandle;
use crate::model::pin::PinType;

/// Error returned by every fallible graph operation.
///
/// Wiring mistakes (`NodeDoesNotExist`, `UnmatchedTypes`, ...) are reported
/// at construction time and are recoverable before evaluation starts.
/// `MalformedGraph` and `CyclicGraph` mean the graph was never valid to
/// execute. `OperationCancelled` is an ordinary operational outcome, not a
/// failure of the graph.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("{0} does not exist in the graph")]
    NodeDoesNotExist(NodeHandle),
    #[error("input pin '{0}' does not exist")]
    InputDoesNotExist(String),
    #[error("output pin '{0}' does not exist")]
    OutputDoesNotExist(String),
    #[error("no connection feeds input pin '{0}'")]
    ConnectionDoesNotExist(String),
    #[error("pin types do not match: expected {expected}, found {found}")]
    UnmatchedTypes { expected: PinType, found: PinType },
    #[error("no type-compatible pin pair between the two nodes")]
    NoMatchesFound,
    #[error("more than one type-compatible pin pair between the two nodes")]
    MultipleMatchesFound,
    #[error("input pin '{0}' already has a connection")]
    DuplicateInputConnection(String),
    #[error("the graph contains a cycle")]
    CyclicGraph,
    #[error("malformed graph: {0}")]
    MalformedGraph(String),
    #[error("the operation was cancelled")]
    OperationCancelled,
}
