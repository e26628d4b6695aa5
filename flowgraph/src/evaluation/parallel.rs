//! Dependency-scheduled parallel evaluation across a worker pool.
//!
//! One unit of work is built per node that is an ancestor of a requested
//! output, with prerequisites wired from the topological order. Workers pull
//! ready tasks from a shared job channel; a task becomes ready only once
//! every node feeding one of its inputs has completed. Callers retrieve
//! results by waiting on per-node completion handles.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info};
use serde::Serialize;

use crate::error::GraphError;
use crate::evaluation::info::EvalInfo;
use crate::graph::Graph;
use crate::graph::analysis::topological_order;
use crate::model::connection::{NodeHandle, PinId};
use crate::model::data_map::DataMap;
use crate::model::value::PinValue;
use crate::util::timing::ScopedTimer;

/// One entry in the execution log: which node ran and for how long.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub node: NodeHandle,
    pub identifier: String,
    pub elapsed: Duration,
}

/// Per-worker task records, merged after the workers join.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionLog {
    pub records: Vec<TaskRecord>,
}

impl ExecutionLog {
    pub fn total_elapsed(&self) -> Duration {
        self.records.iter().map(|record| record.elapsed).sum()
    }

    pub fn contains_node(&self, handle: NodeHandle) -> bool {
        self.records.iter().any(|record| record.node == handle)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

struct TaskInput {
    name: String,
    from: PinId,
    steal: bool,
}

struct Task {
    handle: NodeHandle,
    identifier: String,
    /// Outputs this task must produce: everything its scheduled consumers
    /// draw plus any explicitly requested outputs.
    requested: Vec<String>,
    inputs: Vec<TaskInput>,
    dependents: Vec<usize>,
    pending: AtomicUsize,
    state: TaskState,
}

#[derive(Default)]
struct TaskState {
    result: Mutex<Option<Result<(), GraphError>>>,
    ready: Condvar,
}

impl TaskState {
    fn wait(&self) -> Result<(), GraphError> {
        let mut guard = self.result.lock().expect("task state poisoned");
        while guard.is_none() {
            guard = self.ready.wait(guard).expect("task state poisoned");
        }
        guard.as_ref().unwrap().clone()
    }

    fn try_wait(&self) -> Option<Result<(), GraphError>> {
        self.result.lock().expect("task state poisoned").clone()
    }

    fn is_complete(&self) -> bool {
        self.result.lock().expect("task state poisoned").is_some()
    }

    /// Publish the task's outcome. Returns false if it was already set.
    fn complete(&self, result: Result<(), GraphError>) -> bool {
        let mut guard = self.result.lock().expect("task state poisoned");
        if guard.is_some() {
            return false;
        }
        *guard = Some(result);
        self.ready.notify_all();
        true
    }
}

struct TaskContext {
    graph: Arc<Graph>,
    tasks: Vec<Task>,
    remaining: AtomicUsize,
    info: Arc<EvalInfo>,
}

enum Job {
    Run(usize),
    Shutdown,
}

/// Completion handle for one node's unit of work.
///
/// Waiting on several outputs goes through one handle per node, so callers
/// are never forced to serialize their waits in dispatch order.
pub struct NodeCompletion {
    ctx: Arc<TaskContext>,
    index: usize,
}

impl fmt::Debug for NodeCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeCompletion")
            .field("index", &self.index)
            .finish()
    }
}

impl NodeCompletion {
    /// Block until the node's unit of work completes.
    pub fn wait(&self) -> Result<(), GraphError> {
        self.ctx.tasks[self.index].state.wait()
    }

    /// Non-blocking poll of the node's outcome.
    pub fn try_wait(&self) -> Option<Result<(), GraphError>> {
        self.ctx.tasks[self.index].state.try_wait()
    }
}

/// Dependency-respecting parallel evaluation of a graph.
///
/// Built with [`ParallelEvaluator::dispatch`]; outputs are retrieved with
/// [`wait_output`](ParallelEvaluator::wait_output) /
/// [`take_output`](ParallelEvaluator::take_output) and the merged execution
/// log with [`finish`](ParallelEvaluator::finish).
pub struct ParallelEvaluator {
    ctx: Arc<TaskContext>,
    index: BTreeMap<NodeHandle, usize>,
    workers: Vec<JoinHandle<()>>,
    log_rx: Receiver<Vec<TaskRecord>>,
}

impl ParallelEvaluator {
    /// Build and dispatch one unit of work per ancestor of the requested
    /// outputs, using one worker per available core.
    pub fn dispatch(
        graph: Arc<Graph>,
        requests: &[(NodeHandle, String)],
        info: Arc<EvalInfo>,
    ) -> Result<Self, GraphError> {
        let workers = thread::available_parallelism().map(|v| v.get()).unwrap_or(1);
        Self::dispatch_with_workers(graph, requests, info, workers)
    }

    /// [`dispatch`](ParallelEvaluator::dispatch) with an explicit worker
    /// count.
    pub fn dispatch_with_workers(
        graph: Arc<Graph>,
        requests: &[(NodeHandle, String)],
        info: Arc<EvalInfo>,
        worker_count: usize,
    ) -> Result<Self, GraphError> {
        if info.cancelled() {
            return Err(GraphError::OperationCancelled);
        }
        let _timer = ScopedTimer::debug("task graph construction");

        for (handle, output) in requests {
            graph.with_node(*handle, |node| node.output_type(output).map(|_| ()))??;
        }

        // Cycle check covers the whole graph, not just the scheduled subset.
        let order = topological_order(&graph)?;

        // Backward-reachable closure from the requested outputs, pruned by
        // each node's declared requirements: only ancestors of a requested
        // output get a task.
        let mut requested_map: BTreeMap<NodeHandle, BTreeSet<String>> = BTreeMap::new();
        let mut worklist: Vec<NodeHandle> = Vec::new();
        for (handle, output) in requests {
            if requested_map.entry(*handle).or_default().insert(output.clone()) {
                worklist.push(*handle);
            }
        }
        while let Some(handle) = worklist.pop() {
            let requested: Vec<String> = requested_map[&handle].iter().cloned().collect();
            let required = graph.with_node(handle, |node| node.required_inputs(&requested))?;
            for input in required {
                let connection = graph.find_connection_for_input(handle, &input).ok_or_else(|| {
                    GraphError::MalformedGraph(format!(
                        "required input '{}' of '{}' has no connection",
                        input,
                        graph.node_identifier(handle).unwrap_or("?")
                    ))
                })?;
                let from = connection.from.clone();
                if requested_map.entry(from.node).or_default().insert(from.pin) {
                    worklist.push(from.node);
                }
            }
        }

        // One task per scheduled node, walking topological order so every
        // prerequisite task already exists.
        let mut index: BTreeMap<NodeHandle, usize> = BTreeMap::new();
        let mut tasks: Vec<Task> = Vec::with_capacity(requested_map.len());
        for handle in order {
            let Some(outputs) = requested_map.get(&handle) else {
                continue;
            };
            let requested: Vec<String> = outputs.iter().cloned().collect();
            let required = graph.with_node(handle, |node| node.required_inputs(&requested))?;

            let mut inputs = Vec::with_capacity(required.len());
            let mut prereqs = BTreeSet::new();
            for input in required {
                let connection = graph.connection_for_input(handle, &input)?;
                prereqs.insert(index[&connection.from.node]);
                inputs.push(TaskInput {
                    name: input,
                    from: connection.from.clone(),
                    steal: graph.can_steal_output(connection)?,
                });
            }

            let task_index = tasks.len();
            for &prereq in &prereqs {
                tasks[prereq].dependents.push(task_index);
            }
            tasks.push(Task {
                handle,
                identifier: graph.node_identifier(handle)?.to_string(),
                requested,
                inputs,
                dependents: Vec::new(),
                pending: AtomicUsize::new(prereqs.len()),
                state: TaskState::default(),
            });
            index.insert(handle, task_index);
        }

        let total = tasks.len();
        let ctx = Arc::new(TaskContext {
            graph,
            tasks,
            remaining: AtomicUsize::new(total),
            info,
        });

        let (log_tx, log_rx) = mpsc::channel();
        let mut workers = Vec::new();
        if total > 0 {
            let worker_count = worker_count.clamp(1, total);
            info!("dispatching {total} task(s) across {worker_count} worker(s)");

            let (job_tx, job_rx) = mpsc::channel::<Job>();
            for (task_index, task) in ctx.tasks.iter().enumerate() {
                if task.pending.load(Ordering::Acquire) == 0 {
                    job_tx.send(Job::Run(task_index)).expect("job queue closed");
                }
            }

            let job_rx = Arc::new(Mutex::new(job_rx));
            for worker_id in 0..worker_count {
                let ctx = Arc::clone(&ctx);
                let job_rx = Arc::clone(&job_rx);
                let job_tx = job_tx.clone();
                let log_tx = log_tx.clone();
                workers.push(thread::spawn(move || {
                    worker_loop(worker_id, ctx, job_rx, job_tx, log_tx, worker_count)
                }));
            }
        }
        drop(log_tx);

        Ok(Self {
            ctx,
            index,
            workers,
            log_rx,
        })
    }

    /// Completion handle for a node's unit of work. A handle absent from
    /// the dispatched task set fails with `NodeDoesNotExist` instead of
    /// blocking forever.
    pub fn completion(&self, handle: NodeHandle) -> Result<NodeCompletion, GraphError> {
        let index = *self
            .index
            .get(&handle)
            .ok_or(GraphError::NodeDoesNotExist(handle))?;
        Ok(NodeCompletion {
            ctx: Arc::clone(&self.ctx),
            index,
        })
    }

    /// Wait for a node's unit of work and hand out its output read-only.
    pub fn wait_output(&self, handle: NodeHandle, output: &str) -> Result<PinValue, GraphError> {
        self.retrieve(handle, output, false)
    }

    /// Wait for a node's unit of work and move its output out, unless the
    /// node is effectively `AlwaysCache` (then a read-only handout).
    pub fn take_output(&self, handle: NodeHandle, output: &str) -> Result<PinValue, GraphError> {
        self.retrieve(handle, output, true)
    }

    fn retrieve(
        &self,
        handle: NodeHandle,
        output: &str,
        take_ownership: bool,
    ) -> Result<PinValue, GraphError> {
        if self.ctx.info.cancelled() {
            return Err(GraphError::OperationCancelled);
        }
        self.completion(handle)?.wait()?;
        self.ctx.graph.handout(handle, output, take_ownership)
    }

    /// Wait for every unit of work; the first failure, if any.
    pub fn wait_all(&self) -> Result<(), GraphError> {
        let mut first_error = None;
        for task in &self.ctx.tasks {
            if let Err(error) = task.state.wait() {
                first_error.get_or_insert(error);
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Wait for every unit of work to complete (successfully or not), join
    /// the workers, and merge their execution logs.
    pub fn finish(mut self) -> ExecutionLog {
        for task in &self.ctx.tasks {
            let _ = task.state.wait();
        }
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        let mut log = ExecutionLog::default();
        while let Ok(mut records) = self.log_rx.recv() {
            log.records.append(&mut records);
        }
        log
    }
}

impl Drop for ParallelEvaluator {
    fn drop(&mut self) {
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(
    worker_id: usize,
    ctx: Arc<TaskContext>,
    job_rx: Arc<Mutex<Receiver<Job>>>,
    job_tx: Sender<Job>,
    log_tx: Sender<Vec<TaskRecord>>,
    worker_count: usize,
) {
    let mut records = Vec::new();
    loop {
        let job = {
            let receiver = job_rx.lock().expect("job queue poisoned");
            receiver.recv()
        };
        match job {
            Ok(Job::Run(task_index)) => {
                let task = &ctx.tasks[task_index];
                // Already failed through an upstream cascade.
                if task.state.is_complete() {
                    continue;
                }
                let result = if ctx.info.cancelled() {
                    Err(GraphError::OperationCancelled)
                } else {
                    debug!("worker {} running '{}' ({})", worker_id, task.identifier, task.handle);
                    let start = Instant::now();
                    let result = run_task(&ctx, task);
                    records.push(TaskRecord {
                        node: task.handle,
                        identifier: task.identifier.clone(),
                        elapsed: start.elapsed(),
                    });
                    result
                };
                let completed = complete_task(&ctx, task_index, result, &job_tx);
                if completed > 0
                    && ctx.remaining.fetch_sub(completed, Ordering::AcqRel) == completed
                {
                    for _ in 0..worker_count {
                        let _ = job_tx.send(Job::Shutdown);
                    }
                }
            }
            Ok(Job::Shutdown) | Err(_) => break,
        }
    }
    let _ = log_tx.send(records);
}

/// Re-derive the task's input bundle from its completed prerequisites and
/// evaluate the node.
fn run_task(ctx: &TaskContext, task: &Task) -> Result<(), GraphError> {
    let mut inputs = DataMap::new();
    for input in &task.inputs {
        let value = ctx.graph.with_node(input.from.node, |node| {
            if input.steal {
                node.steal_output(&input.from.pin)
            } else {
                node.get_output(&input.from.pin)
            }
        })??;
        inputs.insert(input.name.clone(), value);
    }

    ctx.info.count_evaluation();
    ctx.graph
        .with_node(task.handle, |node| node.evaluate(inputs, &task.requested, &ctx.info))??;

    let missing = ctx.graph.with_node(task.handle, |node| {
        task.requested
            .iter()
            .find(|name| !node.output_available(name.as_str()))
            .cloned()
    })?;
    match missing {
        Some(name) => Err(GraphError::OutputDoesNotExist(name)),
        None => Ok(()),
    }
}

/// Publish a task's outcome, enqueue dependents that became ready, and
/// complete the transitive dependents of a failed task with the same error
/// without running them. Returns how many tasks this call completed.
fn complete_task(
    ctx: &TaskContext,
    task_index: usize,
    result: Result<(), GraphError>,
    job_tx: &Sender<Job>,
) -> usize {
    let mut completed = 0;
    let mut worklist = vec![(task_index, result)];
    while let Some((index, result)) = worklist.pop() {
        let task = &ctx.tasks[index];
        let failure = result.as_ref().err().cloned();
        if !task.state.complete(result) {
            continue;
        }
        completed += 1;
        match failure {
            None => {
                for &dependent in &task.dependents {
                    if ctx.tasks[dependent].pending.fetch_sub(1, Ordering::AcqRel) == 1 {
                        let _ = job_tx.send(Job::Run(dependent));
                    }
                }
            }
            Some(error) => {
                for &dependent in &task.dependents {
                    worklist.push((dependent, Err(error.clone())));
                }
            }
        }
    }
    completed
}
