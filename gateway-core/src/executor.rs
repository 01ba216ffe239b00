//! The Parallel Executor (§4.3): dispatches a [`Plan`]'s steps concurrently, fanning out across
//! list insertion points, and stitches every step's contribution into one response through a
//! single writer task — the same "one task per fetch node, a single place that owns mutable
//! response state" shape the teacher uses for its own per-request fan-out/fan-in.

use std::sync::Arc;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;

use gateway_federation::plan::InsertionPoint;
use gateway_federation::plan::PathElement;
use gateway_federation::plan::Plan;
use gateway_federation::plan::PlanStep;
use gateway_federation::plan::materialize::NODE_ID_VARIABLE;
use parking_lot::Mutex;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map;
use serde_json_bytes::Value;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::context::ExecutionContext;
use crate::error::ExecError;
use crate::queryer::QueryRequest;
use crate::queryer::QueryerTable;
use crate::stitch;

/// One GraphQL error object (§6 "Wire conventions"): `{message, path, extensions?}`.
#[derive(Debug, Clone)]
pub struct GraphQLError {
    pub message: String,
    pub path: Vec<String>,
    pub extensions: Option<Value>,
}

impl GraphQLError {
    fn from_exec(err: &ExecError, insertion_point: &InsertionPoint) -> Self {
        Self {
            message: err.to_string(),
            path: stitch::error_path_for(insertion_point),
            extensions: None,
        }
    }
}

/// What [`ParallelExecutor::execute`] returns: the merged, scrubbed response data, or an error
/// list when a step, the stitcher, or cancellation aborted the request (§4.3 "Contract").
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub data: Option<Value>,
    pub errors: Vec<GraphQLError>,
}

enum StitchMessage {
    Completion { insertion_point: InsertionPoint, result: Value },
}

struct ExecRun {
    queryers: QueryerTable,
    variables: Map<ByteString, Value>,
    cancellation: CancellationToken,
    outstanding: AtomicI64,
    tx: mpsc::Sender<StitchMessage>,
    error: Mutex<Option<(ExecError, InsertionPoint)>>,
    done_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl ExecRun {
    fn fail(&self, err: ExecError, insertion_point: InsertionPoint) {
        let mut slot = self.error.lock();
        if slot.is_none() {
            *slot = Some((err, insertion_point));
        }
        drop(slot);
        self.cancellation.cancel();
    }

    fn finish_one(&self) {
        if self.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            if let Some(tx) = self.done_tx.lock().take() {
                let _ = tx.send(());
            }
        }
    }
}

/// Executes plans against a fixed table of downstream [`crate::queryer::Queryer`]s, per §4.3.
pub struct ParallelExecutor {
    queryers: QueryerTable,
    channel_capacity: usize,
}

impl ParallelExecutor {
    pub fn new(queryers: QueryerTable, channel_capacity: std::num::NonZeroUsize) -> Self {
        Self {
            queryers,
            channel_capacity: channel_capacity.get(),
        }
    }

    #[tracing::instrument(name = "executor.execute", skip_all)]
    pub async fn execute(&self, ctx: &ExecutionContext, plan: &Plan) -> ExecutionOutcome {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let (done_tx, done_rx) = oneshot::channel();

        let run = Arc::new(ExecRun {
            queryers: self.queryers.clone(),
            variables: ctx.variables.clone(),
            cancellation: ctx.cancellation().clone(),
            outstanding: AtomicI64::new(0),
            tx,
            error: Mutex::new(None),
            done_tx: Mutex::new(Some(done_tx)),
        });

        let top_level = &plan.root_step.then;
        if top_level.is_empty() {
            return ExecutionOutcome {
                data: Some(Value::Object(Map::new())),
                errors: Vec::new(),
            };
        }

        let mut tasks = JoinSet::new();
        for step in top_level {
            run.outstanding.fetch_add(1, Ordering::AcqRel);
            let task_run = Arc::clone(&run);
            let step = step.clone();
            let concrete_point = step.insertion_point.clone();
            tasks.spawn(async move {
                run_step(task_run, step, concrete_point).await;
            });
        }

        let stitcher = tokio::spawn(stitch_loop(rx));

        let _ = done_rx.await;
        tasks.shutdown().await;

        // Every per-step task has finished and dropped its `Arc<ExecRun>` clone; `run` is the
        // last reference. Read the failure slot, then drop it to close `tx` — the stitcher's
        // `rx.recv()` loop ends once the sole `Sender` is gone, yielding the accumulated response.
        let run_error = run.error.lock().clone();
        drop(run);
        let (mut accumulator, stitch_error) = stitcher.await.expect("stitcher task does not panic");

        if let Some((err, insertion_point)) = run_error.or(stitch_error) {
            return ExecutionOutcome {
                data: None,
                errors: vec![GraphQLError::from_exec(&err, &insertion_point)],
            };
        }

        for (field_name, points) in &plan.fields_to_scrub {
            stitch::scrub(&mut accumulator, field_name.as_str(), points);
        }

        ExecutionOutcome {
            data: Some(accumulator),
            errors: Vec::new(),
        }
    }
}

async fn stitch_loop(mut rx: mpsc::Receiver<StitchMessage>) -> (Value, Option<(ExecError, InsertionPoint)>) {
    let mut accumulator = Value::Object(Map::new());
    let mut first_error = None;
    while let Some(message) = rx.recv().await {
        match message {
            StitchMessage::Completion { insertion_point, result } => {
                if let Err(err) = stitch::merge_at(&mut accumulator, &insertion_point, result) {
                    if first_error.is_none() {
                        first_error = Some((err, insertion_point));
                    }
                }
            }
        }
    }
    (accumulator, first_error)
}

fn build_variables(step: &PlanStep, concrete_point: &InsertionPoint, caller_vars: &Map<ByteString, Value>) -> Map<ByteString, Value> {
    let mut vars = Map::new();
    for name in &step.variables {
        if step.needs_node_wrapper() && name.as_str() == NODE_ID_VARIABLE {
            continue;
        }
        if let Some(value) = caller_vars.get(name.as_str()) {
            vars.insert(ByteString::from(name.as_str()), value.clone());
        }
    }
    if step.needs_node_wrapper() {
        if let Some(id) = concrete_point.last().and_then(PathElement::captured_id) {
            vars.insert(ByteString::from(NODE_ID_VARIABLE), Value::String(id.as_ref().into()));
        }
    }
    vars
}

async fn run_step(run: Arc<ExecRun>, step: PlanStep, concrete_point: InsertionPoint) {
    if run.cancellation.is_cancelled() {
        run.finish_one();
        return;
    }

    if step.needs_node_wrapper() && concrete_point.last().and_then(PathElement::captured_id).is_none() {
        run.fail(
            ExecError::StitchMissing {
                path: stitch::error_path_for(&concrete_point).join("/"),
            },
            concrete_point,
        );
        run.finish_one();
        return;
    }

    let Some(queryer) = run.queryers.get(&step.location) else {
        run.fail(
            ExecError::Queryer {
                location: step.location.clone(),
                message: "no queryer registered for this location".to_string(),
            },
            concrete_point,
        );
        run.finish_one();
        return;
    };

    let variables = build_variables(&step, &concrete_point, &run.variables);
    let request = QueryRequest {
        query_string: Arc::from(step.query_string.as_str()),
        query_document: Arc::new(step.query_document.clone()),
        variables,
    };

    let response = match queryer.query(request).await {
        Ok(response) => response,
        Err(err) => {
            run.fail(err, concrete_point);
            run.finish_one();
            return;
        }
    };

    let effective = if step.needs_node_wrapper() {
        match stitch::field(&response, "node") {
            Some(node) => node.clone(),
            None => {
                run.fail(
                    ExecError::StitchShape {
                        path: stitch::error_path_for(&concrete_point).join("/"),
                        reason: "node(id:$id) response did not contain a \"node\" key".to_string(),
                    },
                    concrete_point,
                );
                run.finish_one();
                return;
            }
        }
    } else {
        response
    };

    if run.tx.send(StitchMessage::Completion { insertion_point: concrete_point.clone(), result: effective.clone() }).await.is_err() {
        run.finish_one();
        return;
    }

    for child in &step.then {
        let mut points = Vec::new();
        if let Err(err) = fan_out(&child.insertion_point, &effective, &concrete_point, &mut points) {
            run.fail(err, concrete_point.clone());
            break;
        }
        for point in points {
            run.outstanding.fetch_add(1, Ordering::AcqRel);
            let run = Arc::clone(&run);
            let child = child.clone();
            tokio::spawn(async move {
                run_step(run, child, point).await;
            });
        }
    }

    run.finish_one();
}

/// Walk `template` (a child step's alias-only insertion point) alongside `parent_result` (the
/// step that owns it) to produce the concrete insertion points the child must be dispatched at,
/// fanning out one task per list element (§4.3 "Insertion-point fan-out").
fn fan_out(
    template: &[PathElement],
    parent_result: &Value,
    prefix: &InsertionPoint,
    out: &mut Vec<InsertionPoint>,
) -> Result<(), ExecError> {
    let Some((token, rest)) = template.split_first() else {
        out.push(prefix.clone());
        return Ok(());
    };

    let alias = token.response_key();
    let Some(value) = stitch::field(parent_result, alias.as_str()) else {
        // The field was absent (e.g. a null relation); nothing to dispatch on this branch.
        return Ok(());
    };

    match value {
        // A to-one relation the subgraph legitimately resolved to `null`: nothing to fan out
        // into, and no id to capture, but not a planning failure either.
        Value::Null => Ok(()),
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                let id = stitch::plain_id(item).ok_or_else(|| ExecError::StitchMissing {
                    path: format!("{}/{alias}:{index}", stitch::error_path_for(prefix).join("/")),
                })?;
                let mut next_prefix = prefix.clone();
                next_prefix.push(PathElement::list_item(alias.clone(), index).with_id(id));
                fan_out(rest, item, &next_prefix, out)?;
            }
            Ok(())
        }
        other => {
            let mut element = PathElement::field(alias.clone());
            if rest.is_empty() {
                if let Some(id) = stitch::plain_id(other) {
                    element = element.with_id(id);
                }
            }
            let mut next_prefix = prefix.clone();
            next_prefix.push(element);
            fan_out(rest, other, &next_prefix, out)
        }
    }
}
