//! Batch driver: run pull and push tasks for many entity types over a
//! bounded worker pool.
//!
//! Pull and push for one entity type must not run concurrently against
//! the same collection, so callers enqueue at most one task per entity
//! type per batch. Tasks for different entity types are independent and
//! run in parallel up to the worker limit.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use coresync_protocol::PullQuery;
use coresync_store::LocalCollection;

use crate::engine::SyncEngine;
use crate::error::SyncResult;
use crate::progress::ProgressSink;
use crate::pull::PullResult;
use crate::push::PushReport;
use crate::remote::RemoteStore;

/// What to run for one entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Pull the full listing into the local collection.
    Pull,
    /// Detect local changes and push them.
    Push,
}

/// One unit of work for [`sync_all`].
pub struct SyncTask<R: RemoteStore, C: LocalCollection> {
    /// Entity type to sync.
    pub entity: String,
    /// Pull or push.
    pub kind: TaskKind,
    /// Listing filters, used by pull tasks.
    pub query: PullQuery,
    /// Engine bound to the entity type's collection.
    pub engine: Arc<SyncEngine<R, C>>,
}

impl<R: RemoteStore, C: LocalCollection> SyncTask<R, C> {
    /// Creates a pull task with no filters.
    #[must_use]
    pub fn pull(entity: impl Into<String>, engine: Arc<SyncEngine<R, C>>) -> Self {
        SyncTask {
            entity: entity.into(),
            kind: TaskKind::Pull,
            query: PullQuery::new(),
            engine,
        }
    }

    /// Creates a push task.
    #[must_use]
    pub fn push(entity: impl Into<String>, engine: Arc<SyncEngine<R, C>>) -> Self {
        SyncTask {
            entity: entity.into(),
            kind: TaskKind::Push,
            query: PullQuery::new(),
            engine,
        }
    }

    /// Sets the pull query.
    #[must_use]
    pub fn with_query(mut self, query: PullQuery) -> Self {
        self.query = query;
        self
    }
}

/// Result payload of one completed task.
#[derive(Debug)]
pub enum TaskResult {
    /// Outcome of a pull task.
    Pull(PullResult),
    /// Outcome of a push task.
    Push(PushReport),
}

/// One task's outcome.
#[derive(Debug)]
pub struct TaskOutcome {
    /// Entity type the task ran for.
    pub entity: String,
    /// Pull or push.
    pub kind: TaskKind,
    /// What happened.
    pub result: SyncResult<TaskResult>,
}

/// Runs every task and returns their outcomes in task order.
///
/// `workers` is clamped to at least one thread and at most one per
/// task. A failing task is reported in its outcome and never stops the
/// others.
pub fn sync_all<R: RemoteStore, C: LocalCollection>(
    tasks: Vec<SyncTask<R, C>>,
    workers: usize,
) -> Vec<TaskOutcome> {
    if tasks.is_empty() {
        return Vec::new();
    }
    let workers = workers.clamp(1, tasks.len());
    tracing::info!(tasks = tasks.len(), workers, "batch sync starting");

    let next = AtomicUsize::new(0);
    let finished: Mutex<Vec<(usize, TaskOutcome)>> = Mutex::new(Vec::with_capacity(tasks.len()));
    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                let index = next.fetch_add(1, Ordering::Relaxed);
                let Some(task) = tasks.get(index) else {
                    break;
                };
                let outcome = run_task(task);
                finished.lock().push((index, outcome));
            });
        }
    });

    let mut finished = finished.into_inner();
    finished.sort_by_key(|(index, _)| *index);
    finished.into_iter().map(|(_, outcome)| outcome).collect()
}

fn run_task<R: RemoteStore, C: LocalCollection>(task: &SyncTask<R, C>) -> TaskOutcome {
    let result = match task.kind {
        TaskKind::Pull => task
            .engine
            .pull(&task.entity, &task.query, &ProgressSink::none())
            .map(TaskResult::Pull),
        TaskKind::Push => task
            .engine
            .push(&task.entity, &ProgressSink::none())
            .map(TaskResult::Push),
    };
    if let Err(err) = &result {
        tracing::warn!(entity = %task.entity, %err, "task failed");
    }
    TaskOutcome {
        entity: task.entity.clone(),
        kind: task.kind,
        result,
    }
}
