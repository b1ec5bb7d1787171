//! Strictly ordered queue of asynchronous tasks.
//!
//! At most one task runs at a time. A task's work function is called as soon
//! as the task reaches the head of an idle queue, and the queue moves on once
//! the returned future settles, whatever the outcome.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::BoxFuture;
use tracing::{debug, warn};

pub type TaskFuture = BoxFuture<'static, anyhow::Result<()>>;

type Work = Box<dyn FnOnce() -> TaskFuture + Send>;

struct Task {
    name: String,
    work: Work,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Task>,
    in_flight: Option<String>,
}

/// FIFO task queue. Cloning yields another handle to the same queue.
///
/// Starting a task spawns onto the ambient tokio runtime.
#[derive(Clone, Default)]
pub struct TaskQueue {
    state: Arc<Mutex<QueueState>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a task; when the queue is idle, `work` is called before this
    /// returns.
    pub fn add_task<F>(&self, name: impl Into<String>, work: F)
    where
        F: FnOnce() -> TaskFuture + Send + 'static,
    {
        let name = name.into();
        debug!(task = %name, "queueing task");
        self.state().pending.push_back(Task {
            name,
            work: Box::new(work),
        });
        self.execute();
    }

    /// Starts the head task unless one is already running. Returns whether a
    /// task was started.
    pub fn execute(&self) -> bool {
        let task = {
            let mut state = self.state();
            if state.in_flight.is_some() {
                return false;
            }
            let Some(task) = state.pending.pop_front() else {
                return false;
            };
            state.in_flight = Some(task.name.clone());
            task
        };

        debug!(task = %task.name, "starting task");
        let future = (task.work)();
        let queue = self.clone();
        let name = task.name;
        tokio::spawn(async move {
            match tokio::spawn(future).await {
                Ok(Ok(())) => debug!(task = %name, "task finished"),
                Ok(Err(err)) => warn!(task = %name, error = %err, "task failed"),
                Err(err) => warn!(task = %name, error = %err, "task aborted"),
            }
            queue.finish();
        });
        true
    }

    /// Drops pending tasks named `name`, or every pending task when `name` is
    /// `None`. The running task is not affected.
    pub fn clear_tasks(&self, name: Option<&str>) -> usize {
        let removed: Vec<Task> = {
            let mut state = self.state();
            match name {
                None => state.pending.drain(..).collect(),
                Some(name) => {
                    let (removed, kept): (VecDeque<Task>, VecDeque<Task>) =
                        state.pending.drain(..).partition(|task| task.name == name);
                    state.pending = kept;
                    removed.into()
                }
            }
        };
        if !removed.is_empty() {
            debug!(count = removed.len(), name = ?name, "cleared pending tasks");
        }
        // work closures are dropped here, outside the queue lock
        removed.len()
    }

    /// Number of tasks waiting to start.
    pub fn len(&self) -> usize {
        self.state().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().pending.is_empty()
    }

    pub fn is_busy(&self) -> bool {
        self.state().in_flight.is_some()
    }

    /// Name of the running task.
    pub fn in_flight(&self) -> Option<String> {
        self.state().in_flight.clone()
    }

    pub fn pending_names(&self) -> Vec<String> {
        self.state()
            .pending
            .iter()
            .map(|task| task.name.clone())
            .collect()
    }

    fn finish(&self) {
        self.state().in_flight = None;
        self.execute();
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("TaskQueue")
            .field("in_flight", &state.in_flight)
            .field("pending", &state.pending.len())
            .finish()
    }
}
