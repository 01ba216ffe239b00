//! The query planner (§4.2): Phase A parse, Phase B split.
//!
//! Splitting a selection tree is pure, synchronous recursion ([`walk_selection_set`]) — it never
//! touches a downstream service, so there is no IO to overlap. The asynchronous worker pool around
//! it exists for the same reason the teacher's own concurrent subsystems are shaped this way: a
//! bounded queue plus a fixed set of workers draining it, with an outstanding-work counter deciding
//! when the pool is done (§5). A naive version of that shape — a worker that blocks waiting for its
//! own recursively-enqueued children to finish — can deadlock the whole pool (every worker ends up
//! parked on a child that is still sitting in the queue because no worker is free to pop it). The
//! arena below avoids that: a job that spawns children stores its partial result and returns
//! immediately, freeing its worker; whichever child happens to finish last bubbles the assembled
//! step up to the parent inline, with no worker ever awaiting its own descendants.
use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast::Definition;
use apollo_compiler::ast::Document;
use apollo_compiler::ast::InlineFragment;
use apollo_compiler::ast::OperationDefinition;
use apollo_compiler::ast::OperationType;
use apollo_compiler::ast::Selection;
use apollo_compiler::ast::VariableDefinition;
use dashmap::DashMap;
use indexmap::IndexMap;
use indexmap::IndexSet;
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::task::JoinSet;

use crate::error::PlanError;
use crate::location_map::INTERNAL_LOCATION;
use crate::location_map::Location;
use crate::merge::UnifiedSchema;
use crate::plan::InsertionPoint;
use crate::plan::PathElement;
use crate::plan::Plan;
use crate::plan::PlanList;
use crate::plan::PlanStep;
use crate::plan::materialize::materialize_document;
use crate::plan::materialize::project_variable_definitions;
use crate::plan::materialize::wrap_in_node;
use crate::selection::FragmentMap;
use crate::selection::collect_variables;
use crate::selection::resolve_spread;
use crate::selection::response_key;
use crate::selection::selects_plain_id;
use crate::selection::synthetic_id_field;

/// Sizing for the planner's worker pool (§5). Mirrors `GatewayConfig`'s
/// `planner_worker_count`/`planner_queue_capacity` fields, which is where an embedder actually
/// configures this in practice; this struct is what `QueryPlanner` itself consumes.
#[derive(Debug, Clone, Copy)]
pub struct PlannerPoolConfig {
    pub worker_count: NonZeroUsize,
    pub queue_capacity: NonZeroUsize,
}

impl Default for PlannerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: NonZeroUsize::new(4).expect("4 is nonzero"),
            queue_capacity: NonZeroUsize::new(64).expect("64 is nonzero"),
        }
    }
}

/// Splits operations against a [`UnifiedSchema`] into [`Plan`]s (§4.2). Cheap to clone: the schema
/// is reference-counted and the pool configuration is `Copy`, so a cache's single-flight
/// compilation future can own a handle without borrowing the planner's lifetime.
#[derive(Clone)]
pub struct QueryPlanner {
    schema: Arc<UnifiedSchema>,
    pool: PlannerPoolConfig,
}

impl QueryPlanner {
    pub fn new(schema: Arc<UnifiedSchema>) -> Self {
        Self {
            schema,
            pool: PlannerPoolConfig::default(),
        }
    }

    pub fn with_pool_config(mut self, pool: PlannerPoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Phase A: parse, then plan every operation in source order (§4.2).
    pub async fn plan(&self, query: &str) -> Result<PlanList, PlanError> {
        let document = Document::parse(query, "query.graphql").map_err(|err| PlanError::ParseError {
            message: err.to_string(),
        })?;

        let mut fragments = FragmentMap::new();
        let mut operations = Vec::new();
        for definition in &document.definitions {
            match definition {
                Definition::FragmentDefinition(def) => {
                    fragments.insert(def.name.clone(), def.clone());
                }
                Definition::OperationDefinition(op) => operations.push(op.clone()),
                _ => {}
            }
        }

        let mut plans = Vec::with_capacity(operations.len());
        for operation in &operations {
            plans.push(self.plan_operation(operation, &fragments).await?);
        }
        Ok(PlanList::new(plans))
    }

    async fn plan_operation(
        &self,
        operation: &Node<OperationDefinition>,
        fragments: &FragmentMap,
    ) -> Result<Plan, PlanError> {
        let root_type_name: &str = match operation.operation_type {
            OperationType::Query => "Query",
            OperationType::Mutation => "Mutation",
            OperationType::Subscription => "Subscription",
        };

        let run = Arc::new(PlannerRun::new(
            self.schema.clone(),
            fragments.clone(),
            operation.variables.clone(),
            operation.operation_type,
        ));

        let (tx, rx) = mpsc::channel(self.pool.queue_capacity.get());
        let rx = Arc::new(AsyncMutex::new(rx));

        let mut workers = JoinSet::new();
        for _ in 0..self.pool.worker_count.get() {
            let run = run.clone();
            let rx = rx.clone();
            let tx = tx.clone();
            workers.spawn(async move {
                loop {
                    let item = {
                        let mut guard = rx.lock().await;
                        guard.recv().await
                    };
                    match item {
                        Some(work) => process_work(&run, work, tx.clone()).await,
                        None => break,
                    }
                }
            });
        }

        run.outstanding.fetch_add(1, Ordering::SeqCst);
        let root_work = WorkItem {
            id: run.next_job_id(),
            parent: None,
            parent_type: Arc::from(root_type_name),
            location: Arc::from(INTERNAL_LOCATION),
            insertion_point: Vec::new(),
            selection_set: operation.selection_set.clone(),
        };
        // The queue was just sized to the caller's configuration; a full queue on the very first
        // send would mean capacity zero, which `NonZeroUsize` already rules out.
        let _ = tx.send(root_work).await;
        drop(tx);

        let done_rx = run.done_rx.lock().take().expect("plan_operation owns the receiver");
        let _ = done_rx.await;
        workers.shutdown().await;

        if let Some(err) = run.error.lock().take() {
            return Err(err);
        }
        let (root_result, scrub_points) = run.result.lock().take().expect("root job completes before done fires");

        let mut fields_to_scrub: IndexMap<Name, Vec<InsertionPoint>> = IndexMap::new();
        if !scrub_points.is_empty() {
            fields_to_scrub.insert(
                Name::new("id").expect("\"id\" is a valid GraphQL name"),
                scrub_points,
            );
        }

        let mut root_step = PlanStep::synthetic_root(root_type_name);
        root_step.selection_set = root_result.selection_set;
        root_step.then = root_result.then;

        Ok(Plan {
            operation_name: operation.name.clone(),
            operation_type: operation.operation_type,
            root_step,
            fragment_definitions: fragments.clone(),
            fields_to_scrub,
        })
    }
}

type JobId = u64;

/// A field (or fragment-grouped set of fields) whose location differs from its enclosing job's
/// current location — the unit the split walk hands off to a new job (§4.2, "For each non-parent
/// location present in the partition, enqueue a child step").
struct ChildSpec {
    parent_type: Arc<str>,
    location: Location,
    insertion_point: InsertionPoint,
    selection_set: Vec<Selection>,
}

struct WorkItem {
    id: JobId,
    parent: Option<JobId>,
    parent_type: Arc<str>,
    location: Location,
    insertion_point: InsertionPoint,
    selection_set: Vec<Selection>,
}

/// A job that has produced its own kept selection and is waiting on `remaining` children before it
/// can be assembled into a [`PlanStep`] and handed to its own parent.
struct JobSlot {
    parent_type: Arc<str>,
    location: Location,
    insertion_point: InsertionPoint,
    kept: Vec<Selection>,
    own_scrub: Vec<InsertionPoint>,
    parent: Option<JobId>,
    remaining: AtomicI64,
    children: Mutex<Vec<PlanStep>>,
    child_scrub: Mutex<Vec<InsertionPoint>>,
}

/// Everything one call to [`QueryPlanner::plan_operation`] shares across its worker pool: the
/// schema/fragment/variable context every job reads, the arena of in-flight jobs, and the
/// outstanding-work counter that decides when the pool has nothing left to do (§5).
struct PlannerRun {
    schema: Arc<UnifiedSchema>,
    fragments: FragmentMap,
    operation_variable_defs: Vec<Node<VariableDefinition>>,
    operation_type: OperationType,
    next_id: AtomicU64,
    outstanding: AtomicI64,
    arena: DashMap<JobId, JobSlot>,
    error: Mutex<Option<PlanError>>,
    result: Mutex<Option<(PlanStep, Vec<InsertionPoint>)>>,
    done_tx: Mutex<Option<oneshot::Sender<()>>>,
    done_rx: Mutex<Option<oneshot::Receiver<()>>>,
}

impl PlannerRun {
    fn new(
        schema: Arc<UnifiedSchema>,
        fragments: FragmentMap,
        operation_variable_defs: Vec<Node<VariableDefinition>>,
        operation_type: OperationType,
    ) -> Self {
        let (done_tx, done_rx) = oneshot::channel();
        Self {
            schema,
            fragments,
            operation_variable_defs,
            operation_type,
            next_id: AtomicU64::new(1),
            outstanding: AtomicI64::new(0),
            arena: DashMap::new(),
            error: Mutex::new(None),
            result: Mutex::new(None),
            done_tx: Mutex::new(Some(done_tx)),
            done_rx: Mutex::new(Some(done_rx)),
        }
    }

    fn next_job_id(&self) -> JobId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn fail(&self, err: PlanError) {
        let mut guard = self.error.lock();
        if guard.is_none() {
            *guard = Some(err);
            drop(guard);
            self.signal_done();
        }
    }

    fn signal_done(&self) {
        if let Some(tx) = self.done_tx.lock().take() {
            let _ = tx.send(());
        }
    }
}

#[tracing::instrument(name = "planner.split_selection", skip_all, fields(parent_type = %work.parent_type, location = %work.location))]
async fn process_work(run: &Arc<PlannerRun>, work: WorkItem, tx: mpsc::Sender<WorkItem>) {
    let outcome = walk_selection_set(
        &run.schema,
        &run.fragments,
        &work.parent_type,
        &work.location,
        &work.insertion_point,
        &work.selection_set,
    );

    match outcome {
        Err(err) => run.fail(err),
        Ok((kept, child_specs)) => {
            let (kept, own_scrub) = inject_ids(&work.insertion_point, kept, &child_specs);

            if child_specs.is_empty() {
                let step = build_plan_step(
                    run,
                    work.parent_type.clone(),
                    work.location.clone(),
                    work.insertion_point.clone(),
                    kept,
                    Vec::new(),
                );
                complete_job(run, work.parent, step, own_scrub);
            } else {
                run.arena.insert(
                    work.id,
                    JobSlot {
                        parent_type: work.parent_type.clone(),
                        location: work.location.clone(),
                        insertion_point: work.insertion_point.clone(),
                        kept,
                        own_scrub,
                        parent: work.parent,
                        remaining: AtomicI64::new(child_specs.len() as i64),
                        children: Mutex::new(Vec::with_capacity(child_specs.len())),
                        child_scrub: Mutex::new(Vec::new()),
                    },
                );

                for spec in child_specs {
                    run.outstanding.fetch_add(1, Ordering::SeqCst);
                    let child_work = WorkItem {
                        id: run.next_job_id(),
                        parent: Some(work.id),
                        parent_type: spec.parent_type,
                        location: spec.location,
                        insertion_point: spec.insertion_point,
                        selection_set: spec.selection_set,
                    };
                    if tx.send(child_work).await.is_err() {
                        run.fail(PlanError::SchedulingFailed {
                            parent_type: work.parent_type.clone(),
                        });
                        break;
                    }
                }
            }
        }
    }

    if run.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
        run.signal_done();
    }
}

/// Bubble a finished job's [`PlanStep`] up to its parent (§5's "fork-join" without any worker ever
/// blocking on it): the last child to report in assembles the parent inline and recurses.
fn complete_job(run: &Arc<PlannerRun>, parent: Option<JobId>, step: PlanStep, scrub: Vec<InsertionPoint>) {
    match parent {
        None => {
            *run.result.lock() = Some((step, scrub));
        }
        Some(parent_id) => {
            let finished = {
                let slot = run
                    .arena
                    .get(&parent_id)
                    .expect("parent job is registered before any of its children are dispatched");
                slot.children.lock().push(step);
                slot.child_scrub.lock().extend(scrub);
                slot.remaining.fetch_sub(1, Ordering::AcqRel) == 1
            };
            if finished {
                let (_, slot) = run
                    .arena
                    .remove(&parent_id)
                    .expect("slot is still present for its own last child");
                let mut children = slot.children.into_inner();
                children.sort_by_key(|child| {
                    (
                        child.insertion_point.iter().map(PathElement::to_string).collect::<Vec<_>>(),
                        child.location.to_string(),
                    )
                });
                let mut scrub_points = slot.own_scrub;
                scrub_points.extend(slot.child_scrub.into_inner());
                let parent_step = build_plan_step(
                    run,
                    slot.parent_type,
                    slot.location,
                    slot.insertion_point,
                    slot.kept,
                    children,
                );
                complete_job(run, slot.parent, parent_step, scrub_points);
            }
        }
    }
}

/// Materialize a job's kept selection into a full [`PlanStep`] (§4.2, "Query materialization").
/// Non-root parent types are always fetched as `{ node(id: $id) { ... on ParentType { .. } } }`
/// regardless of the enclosing operation's kind — entity lookups are reads even inside a mutation.
fn build_plan_step(
    run: &Arc<PlannerRun>,
    parent_type: Arc<str>,
    location: Location,
    insertion_point: InsertionPoint,
    kept: Vec<Selection>,
    then: Vec<PlanStep>,
) -> PlanStep {
    let is_root = matches!(parent_type.as_ref(), "Query" | "Mutation" | "Subscription");
    let variables: BTreeSet<Name> = collect_variables(&kept, &run.fragments);

    let document = if is_root {
        let variable_defs = project_variable_definitions(&run.operation_variable_defs, &variables, false);
        materialize_document(run.operation_type, variable_defs, kept.clone())
    } else {
        let parent_name = Name::new(parent_type.as_ref()).expect("type name is a valid GraphQL name");
        let wrapped = wrap_in_node(&parent_name, kept.clone());
        let variable_defs = project_variable_definitions(&run.operation_variable_defs, &variables, true);
        materialize_document(OperationType::Query, variable_defs, wrapped)
    };
    let query_string = document.to_string();

    PlanStep {
        parent_type,
        location,
        insertion_point,
        selection_set: kept,
        fragment_definitions: run.fragments.clone(),
        variables,
        query_string,
        query_document: document,
        then,
    }
}

/// Walk one selection set, grouping fields by the location that resolves them (§4.2 steps 1-5).
/// Same-location fields with a sub-selection recurse synchronously, in place; any field whose
/// resolved location differs from `location` is batched with its location-mates into a
/// [`ChildSpec`] rather than processed here. Fragment spreads are resolved into inline fragments
/// (a single, simpler stand-in for synthesizing a per-location named fragment for each split) and
/// handled the same way as literal inline fragments.
fn walk_selection_set(
    schema: &UnifiedSchema,
    fragments: &FragmentMap,
    ty: &str,
    location: &Location,
    insertion_point: &InsertionPoint,
    selection_set: &[Selection],
) -> Result<(Vec<Selection>, Vec<ChildSpec>), PlanError> {
    let mut kept = Vec::new();
    let mut children = Vec::new();
    let mut moved: IndexMap<Location, Vec<Selection>> = IndexMap::new();

    for selection in selection_set {
        match selection {
            Selection::Field(field) => {
                if field.name.as_str() == "__typename" {
                    kept.push(selection.clone());
                    continue;
                }

                let locations = schema.locations.locations(ty, field.name.as_str());
                if locations.is_empty() {
                    return Err(PlanError::FieldNotFound {
                        type_name: Arc::from(ty),
                        field_name: Arc::from(field.name.as_str()),
                    });
                }
                let chosen: Location = if locations.iter().any(|candidate| candidate == location) {
                    location.clone()
                } else {
                    locations[0].clone()
                };

                if &chosen == location {
                    if field.selection_set.is_empty() {
                        kept.push(selection.clone());
                    } else {
                        let child_ty = schema
                            .field_return_type(ty, field.name.as_str())
                            .ok_or_else(|| PlanError::FieldNotFound {
                                type_name: Arc::from(ty),
                                field_name: Arc::from(field.name.as_str()),
                            })?
                            .clone();
                        let mut child_point = insertion_point.clone();
                        child_point.push(PathElement::field(response_key(field).clone()));
                        let (nested_kept, nested_children) = walk_selection_set(
                            schema,
                            fragments,
                            &child_ty,
                            location,
                            &child_point,
                            &field.selection_set,
                        )?;
                        children.extend(nested_children);
                        let mut new_field = (**field).clone();
                        new_field.selection_set = nested_kept;
                        kept.push(Selection::Field(Node::new(new_field)));
                    }
                } else {
                    moved.entry(chosen).or_default().push(selection.clone());
                }
            }
            Selection::InlineFragment(inline) => {
                let narrow_ty: &str = inline.type_condition.as_ref().map(Name::as_str).unwrap_or(ty);
                let (nested_kept, nested_children) =
                    walk_selection_set(schema, fragments, narrow_ty, location, insertion_point, &inline.selection_set)?;
                children.extend(nested_children);
                if !nested_kept.is_empty() {
                    let mut new_inline = (**inline).clone();
                    new_inline.selection_set = nested_kept;
                    kept.push(Selection::InlineFragment(Node::new(new_inline)));
                }
            }
            Selection::FragmentSpread(spread) => {
                let resolved = resolve_spread(spread, fragments).ok_or_else(|| PlanError::FragmentUnresolved {
                    fragment_name: Arc::from(spread.fragment_name.as_str()),
                })?;
                let narrow_ty: &str = resolved.type_condition.as_ref().map(Name::as_str).unwrap_or(ty);
                let (nested_kept, nested_children) = walk_selection_set(
                    schema,
                    fragments,
                    narrow_ty,
                    location,
                    insertion_point,
                    &resolved.selection_set,
                )?;
                children.extend(nested_children);
                if !nested_kept.is_empty() {
                    let new_inline = InlineFragment {
                        type_condition: resolved.type_condition.clone(),
                        directives: resolved.directives.clone(),
                        selection_set: nested_kept,
                    };
                    kept.push(Selection::InlineFragment(Node::new(new_inline)));
                }
            }
        }
    }

    for (location, selection_set) in moved {
        children.push(ChildSpec {
            parent_type: Arc::from(ty),
            location,
            insertion_point: insertion_point.clone(),
            selection_set,
        });
    }

    Ok((kept, children))
}

/// Inject a synthetic `id` selection at every distinct point a child was split off from, unless the
/// user already selected `id` there or the point belongs to a root operation type (§4.2, "ID
/// injection"). Returns the (possibly modified) kept selection plus the insertion points where a
/// synthetic `id` was actually added, for `fields_to_scrub`.
fn inject_ids(base_point: &InsertionPoint, kept: Vec<Selection>, child_specs: &[ChildSpec]) -> (Vec<Selection>, Vec<InsertionPoint>) {
    let mut kept = kept;
    let mut scrub_points = Vec::new();
    let mut seen: IndexSet<InsertionPoint> = IndexSet::new();

    for spec in child_specs {
        if matches!(spec.parent_type.as_ref(), "Query" | "Mutation" | "Subscription") {
            continue;
        }
        if !seen.insert(spec.insertion_point.clone()) {
            continue;
        }
        let relative = &spec.insertion_point[base_point.len()..];
        let (next_kept, injected) = inject_along_path(kept, relative);
        kept = next_kept;
        if injected {
            scrub_points.push(spec.insertion_point.clone());
        }
    }

    (kept, scrub_points)
}

fn inject_along_path(selections: Vec<Selection>, path: &[PathElement]) -> (Vec<Selection>, bool) {
    if path.is_empty() {
        if selects_plain_id(&selections) {
            return (selections, false);
        }
        let mut out = selections;
        out.push(Selection::Field(synthetic_id_field()));
        return (out, true);
    }

    let head = &path[0];
    let rest = &path[1..];
    let mut injected = false;
    let out = selections
        .into_iter()
        .map(|selection| {
            if injected {
                return selection;
            }
            match selection {
                Selection::Field(field) if response_key(&field) == &head.field_alias => {
                    let mut inner = (*field).clone();
                    let (new_selection_set, did_inject) = inject_along_path(inner.selection_set, rest);
                    inner.selection_set = new_selection_set;
                    injected = did_inject;
                    Selection::Field(Node::new(inner))
                }
                Selection::InlineFragment(inline) => {
                    let mut inner = (*inline).clone();
                    let (new_selection_set, did_inject) = inject_along_path(inner.selection_set, path);
                    inner.selection_set = new_selection_set;
                    if did_inject {
                        injected = true;
                    }
                    Selection::InlineFragment(Node::new(inner))
                }
                other => other,
            }
        })
        .collect();
    (out, injected)
}
