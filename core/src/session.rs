//! Inspection session: one live document, one schema generation at a time.
//!
//! Everything runs on the host's thread. Timers are deadlines the host pumps
//! with [`Inspector::pump`]; every scheduled task and engine callback is
//! bound to the generation that created it, and loading a new document bumps
//! the generation before anything else happens. Work from an older
//! generation is discarded instead of touching the new document.

use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

use vmscope_shared::{PropertyValue, SchemaTree};

use crate::binding::panel::UserEdit;
use crate::binding::{
    BindingSynchronizer, ControlSurface, EditOutcome, ReconcileReport, TriggerOutcome, WriteError,
};
use crate::config::InspectorConfig;
use crate::control::{self, ControlKey, ControlSchema};
use crate::enums::EnumResolver;
use crate::introspect::{IntrospectError, introspect};
use crate::live::LiveGraph;

/// Monotonic schema generation counter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deferred work
#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    /// Periodic live-to-UI reconciliation
    Reconcile,
    /// Reset a trigger that was pulsed instead of fired
    RevertPulse(ControlKey),
}

#[derive(Debug)]
struct Scheduled {
    due: Instant,
    seq: u64,
    generation: Generation,
    task: Task,
}

/// Generation-bound tasks ordered by deadline
#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: Vec<Scheduled>,
    next_seq: u64,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, generation: Generation, due: Instant, task: Task) {
        self.tasks.push(Scheduled {
            due,
            seq: self.next_seq,
            generation,
            task,
        });
        self.next_seq += 1;
    }

    /// Remove and return every task due at `now`, earliest first
    pub fn take_due(&mut self, now: Instant) -> Vec<(Generation, Task)> {
        let (mut due, pending): (Vec<_>, Vec<_>) = self.tasks.drain(..).partition(|t| t.due <= now);
        self.tasks = pending;
        due.sort_by_key(|t| (t.due, t.seq));
        due.into_iter().map(|t| (t.generation, t.task)).collect()
    }

    /// Drop everything; returns how many tasks were cancelled
    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.tasks.len();
        self.tasks.clear();
        cancelled
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.tasks.iter().map(|t| t.due).min()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// What one [`Inspector::pump`] call did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpReport {
    pub ran: usize,
    /// Tasks dropped because their generation is no longer current
    pub stale: usize,
    pub reconcile: Option<ReconcileReport>,
}

/// Owns the live document and everything derived from it
pub struct Inspector<S: ControlSurface> {
    graph: Option<Rc<dyn LiveGraph>>,
    generation: Generation,
    tree: Option<SchemaTree>,
    sync: BindingSynchronizer<S>,
    tasks: TaskQueue,
    resolver: EnumResolver,
    reconcile_interval: Duration,
    pulse_duration: Duration,
    stale_discarded: u64,
}

impl<S: ControlSurface> Inspector<S> {
    pub fn new(surface: S, config: &InspectorConfig, resolver: EnumResolver) -> Self {
        let generation = Generation::default();
        Self {
            graph: None,
            generation,
            tree: None,
            sync: BindingSynchronizer::new(ControlSchema::empty(generation), surface),
            tasks: TaskQueue::new(),
            resolver,
            reconcile_interval: config.reconcile_interval(),
            pulse_duration: config.pulse_duration(),
            stale_discarded: 0,
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Whether work created under `generation` may still run
    pub fn is_current(&self, generation: Generation) -> bool {
        generation == self.generation
    }

    pub fn tree(&self) -> Option<&SchemaTree> {
        self.tree.as_ref()
    }

    pub fn schema(&self) -> &ControlSchema {
        self.sync.schema()
    }

    pub fn synchronizer(&self) -> &BindingSynchronizer<S> {
        &self.sync
    }

    pub fn surface(&self) -> &S {
        self.sync.surface()
    }

    pub fn surface_mut(&mut self) -> &mut S {
        self.sync.surface_mut()
    }

    pub fn graph(&self) -> Option<&Rc<dyn LiveGraph>> {
        self.graph.as_ref()
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.tasks.next_due()
    }

    /// Stale tasks and callbacks discarded so far
    pub fn stale_discarded(&self) -> u64 {
        self.stale_discarded
    }

    /// Drop the current generation's controls and pending work
    fn teardown(&mut self) {
        let cancelled = self.tasks.cancel_all();
        self.generation = self.generation.next();
        self.sync.reset(self.generation);
        if cancelled > 0 {
            tracing::debug!("session: cancelled {} pending tasks", cancelled);
        }
    }

    /// Introspect `graph` and bind a fresh control schema to it
    pub fn load(&mut self, graph: Rc<dyn LiveGraph>, now: Instant) -> Result<&SchemaTree, IntrospectError> {
        self.teardown();
        self.tree = None;
        self.graph = None;

        let tree = introspect(graph.as_ref())?;
        let schema = control::build(&tree, graph.as_ref(), &self.resolver, self.generation);
        self.sync.rebind(schema);
        self.tasks
            .schedule(self.generation, now + self.reconcile_interval, Task::Reconcile);

        tracing::info!("Loaded document (generation {})", self.generation);
        self.graph = Some(graph);
        Ok(self.tree.insert(tree))
    }

    /// Rebuild everything from the current document
    pub fn rebuild(&mut self, now: Instant) -> Result<&SchemaTree, IntrospectError> {
        match self.graph.clone() {
            Some(graph) => self.load(graph, now),
            None => Err(IntrospectError::StructuralUnavailable(
                crate::live::AccessError::failed("no document loaded"),
            )),
        }
    }

    /// Schedule generation-bound work
    pub fn schedule(&mut self, generation: Generation, due: Instant, task: Task) {
        self.tasks.schedule(generation, due, task);
    }

    /// Run every task due at `now`
    pub fn pump(&mut self, now: Instant) -> PumpReport {
        let mut report = PumpReport::default();
        for (generation, task) in self.tasks.take_due(now) {
            if !self.is_current(generation) {
                tracing::trace!("session: dropping {:?} from generation {}", task, generation);
                report.stale += 1;
                self.stale_discarded += 1;
                continue;
            }
            report.ran += 1;
            match task {
                Task::Reconcile => {
                    report.reconcile = Some(self.sync.reconcile());
                    self.tasks
                        .schedule(generation, now + self.reconcile_interval, Task::Reconcile);
                }
                Task::RevertPulse(key) => {
                    if let Err(err) = self.sync.revert_pulse(&key) {
                        tracing::warn!("session: pulse revert failed: {}", err);
                    }
                }
            }
        }
        report
    }

    /// Run an engine callback only if it belongs to the current generation
    pub fn on_engine_callback<R>(&mut self, generation: Generation, f: impl FnOnce(&mut Self) -> R) -> Option<R> {
        if !self.is_current(generation) {
            tracing::trace!("session: dropping callback from generation {}", generation);
            self.stale_discarded += 1;
            return None;
        }
        Some(f(self))
    }

    pub fn edit(&mut self, key: &ControlKey, value: PropertyValue) -> Result<EditOutcome, WriteError> {
        self.sync.on_user_edit(key, value)
    }

    /// Fire a trigger; a pulse gets its revert scheduled
    pub fn fire_trigger(&mut self, key: &ControlKey, now: Instant) -> TriggerOutcome {
        let outcome = self.sync.fire_trigger(key);
        if outcome == TriggerOutcome::Pulsed {
            self.tasks
                .schedule(self.generation, now + self.pulse_duration, Task::RevertPulse(key.clone()));
        }
        outcome
    }

    /// Apply an edit reported by the control panel
    pub fn apply(&mut self, edit: UserEdit, now: Instant) -> Result<(), WriteError> {
        match edit {
            UserEdit::Set { key, value } => self.edit(&key, value).map(|_| ()),
            UserEdit::Fire(key) => match self.fire_trigger(&key, now) {
                TriggerOutcome::Failed(reason) => Err(WriteError::Rejected { key, reason }),
                TriggerOutcome::Fired | TriggerOutcome::Pulsed => Ok(()),
            },
        }
    }

    /// Cancel everything and release the document
    pub fn dispose(&mut self) {
        self.teardown();
        self.tree = None;
        self.graph = None;
        tracing::info!("Inspector disposed");
    }
}
