//! Event Loop Implementation
//!
//! Single-threaded loop with a microtask queue and virtual-clock timers.
//! One loop per thread; the host drives it explicitly.

use std::cell::RefCell;
use std::collections::VecDeque;

/// Upper bound on timer firings in one `run_until_idle` call
const MAX_IDLE_STEPS: usize = 10_000;

type Callback = Box<dyn FnOnce()>;

/// Timer handle returned by [`set_timeout`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u32);

/// Timer task
struct Timer {
    id: TimerId,
    deadline: u64,
    callback: Callback,
}

#[derive(Default)]
struct EventLoop {
    /// Microtask queue (future continuations, scheduler flushes)
    microtasks: VecDeque<Callback>,
    /// Pending timers in insertion order
    timers: Vec<Timer>,
    /// Next timer ID
    next_timer_id: u32,
    /// Virtual clock (ms)
    current_time: u64,
}

thread_local! {
    static EVENT_LOOP: RefCell<EventLoop> = RefCell::new(EventLoop::default());
}

/// Queue a microtask
pub fn queue_microtask(callback: impl FnOnce() + 'static) {
    EVENT_LOOP.with(|lp| lp.borrow_mut().microtasks.push_back(Box::new(callback)));
}

/// Run `callback` once the virtual clock has advanced by `delay_ms`
pub fn set_timeout(callback: impl FnOnce() + 'static, delay_ms: u64) -> TimerId {
    EVENT_LOOP.with(|lp| {
        let mut lp = lp.borrow_mut();
        let id = TimerId(lp.next_timer_id);
        lp.next_timer_id += 1;
        let deadline = lp.current_time + delay_ms;
        lp.timers.push(Timer {
            id,
            deadline,
            callback: Box::new(callback),
        });
        id
    })
}

/// Cancel a timer. Returns false if it already fired or never existed.
pub fn clear_timeout(id: TimerId) -> bool {
    EVENT_LOOP.with(|lp| {
        let mut lp = lp.borrow_mut();
        let before = lp.timers.len();
        lp.timers.retain(|t| t.id != id);
        before != lp.timers.len()
    })
}

/// Drain the microtask queue, including microtasks queued while draining.
/// Returns how many ran.
pub fn run_microtasks() -> usize {
    let mut executed = 0;
    while let Some(task) = EVENT_LOOP.with(|lp| lp.borrow_mut().microtasks.pop_front()) {
        task();
        executed += 1;
    }
    executed
}

/// Pop the earliest timer due at or before `limit`. Ties fire in
/// scheduling order.
fn take_due_timer(limit: Option<u64>) -> Option<Timer> {
    EVENT_LOOP.with(|lp| {
        let mut lp = lp.borrow_mut();
        let (index, deadline) = lp
            .timers
            .iter()
            .enumerate()
            .min_by_key(|(i, t)| (t.deadline, *i))
            .map(|(i, t)| (i, t.deadline))?;
        if limit.is_some_and(|limit| deadline > limit) {
            return None;
        }
        let timer = lp.timers.remove(index);
        lp.current_time = lp.current_time.max(deadline);
        Some(timer)
    })
}

/// Advance the virtual clock by `delta_ms`, firing due timers in deadline
/// order with a microtask checkpoint after each. Returns timers fired.
pub fn advance(delta_ms: u64) -> usize {
    run_microtasks();
    let target = now() + delta_ms;
    let mut fired = 0;
    while let Some(timer) = take_due_timer(Some(target)) {
        (timer.callback)();
        run_microtasks();
        fired += 1;
    }
    EVENT_LOOP.with(|lp| lp.borrow_mut().current_time = target);
    fired
}

/// Run microtasks and every pending timer until nothing is left
pub fn run_until_idle() -> usize {
    let mut steps = run_microtasks();
    for _ in 0..MAX_IDLE_STEPS {
        let Some(timer) = take_due_timer(None) else {
            return steps;
        };
        (timer.callback)();
        steps += 1 + run_microtasks();
    }
    tracing::warn!(steps, "event loop still busy after step limit");
    steps
}

/// Current virtual time (ms)
pub fn now() -> u64 {
    EVENT_LOOP.with(|lp| lp.borrow().current_time)
}

/// Check if there's pending work
pub fn has_pending_work() -> bool {
    EVENT_LOOP.with(|lp| {
        let lp = lp.borrow();
        !lp.microtasks.is_empty() || !lp.timers.is_empty()
    })
}
