//! Update scheduler
//!
//! Coalesces re-render callbacks and flushes them once per turn on the
//! microtask queue. At most one flush is ever scheduled.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::event_loop;
use crate::pending::Pending;
use crate::value::{Function, Value};

/// A zero-argument update callback, compared by identity
#[derive(Clone)]
pub struct Task {
    id: usize,
    run: Rc<dyn Fn() -> anyhow::Result<()>>,
}

impl Task {
    pub fn new(run: impl Fn() -> anyhow::Result<()> + 'static) -> Self {
        let run: Rc<dyn Fn() -> anyhow::Result<()>> = Rc::new(run);
        Self {
            id: Rc::as_ptr(&run) as *const () as usize,
            run,
        }
    }

    /// Adapt a callable value. Identity follows the callable, so the same
    /// function registered twice is one task.
    pub fn from_function(function: Function) -> Self {
        Self {
            id: function.identity(),
            run: Rc::new(move || {
                function.call(&Value::Undefined, &[])?;
                Ok(())
            }),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn run(&self) -> anyhow::Result<()> {
        (self.run)()
    }

    pub fn same(&self, other: &Task) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task({:#x})", self.id)
    }
}

#[derive(Default)]
struct SchedulerState {
    pending: IndexMap<usize, Task>,
    flush_scheduled: bool,
    flushes: u64,
}

thread_local! {
    static SCHEDULER: RefCell<SchedulerState> = RefCell::new(SchedulerState::default());
}

/// Add a task to the pending set, scheduling a flush if none is scheduled.
/// Enqueuing a task that is already pending is a no-op.
pub fn enqueue(task: Task) {
    let schedule = SCHEDULER.with(|s| {
        let mut s = s.borrow_mut();
        s.pending.entry(task.id()).or_insert(task);
        !std::mem::replace(&mut s.flush_scheduled, true)
    });
    if schedule {
        event_loop::queue_microtask(flush);
    }
}

/// Run every pending task. Tasks enqueued while flushing land in the next
/// flush. A failing task is logged and does not stop the others.
pub fn flush() {
    let snapshot: Vec<Task> = SCHEDULER.with(|s| {
        let mut s = s.borrow_mut();
        s.flush_scheduled = false;
        s.flushes += 1;
        std::mem::take(&mut s.pending).into_values().collect()
    });
    tracing::trace!(tasks = snapshot.len(), "flushing updates");
    for task in snapshot {
        if let Err(err) = task.run() {
            tracing::error!(error = %err, "scheduled update failed");
        }
    }
}

/// Tasks waiting for the next flush
pub fn pending_count() -> usize {
    SCHEDULER.with(|s| s.borrow().pending.len())
}

/// Flushes performed on this thread so far
pub fn flush_count() -> u64 {
    SCHEDULER.with(|s| s.borrow().flushes)
}

/// Enqueue `callback` (if any) and return a future that resolves once it
/// has run. Backs the `$nextTick` helper.
pub fn next_tick(callback: Option<Task>) -> Pending {
    let pending = Pending::new();
    let settle = pending.clone();
    enqueue(Task::new(move || {
        let result = callback.as_ref().map_or(Ok(()), Task::run);
        match &result {
            Ok(()) => settle.resolve(Value::Undefined),
            Err(err) => settle.reject(err.to_string()),
        }
        result
    }));
    pending
}

/// The `$nextTick` helper as a callable value
pub fn next_tick_function() -> Value {
    Value::function("$nextTick", |_this, args| {
        let callback = match args.first() {
            Some(Value::Function(f)) => Some(Task::from_function(f.clone())),
            _ => None,
        };
        Ok(Value::Pending(next_tick(callback)))
    })
}
