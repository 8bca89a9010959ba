//! Event loop implementation.
//!
//! This module provides the deterministic event loop that coordinates
//! macrotask and microtask execution. The loop is an explicit,
//! constructible context: there is no global instance, and several
//! isolated loops can coexist in one process.
//!
//! Time is logical. The clock starts at zero and advances only when a
//! macrotask is popped, jumping to that task's due time. External timer
//! and I/O sources feed the loop exclusively through [`TaskSource`].

use crate::task_queue::{MicroTask, MicrotaskQueue, Task, TaskHandle, TaskQueue};
use core_types::{JsError, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// The execution phase of an event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    /// No job is currently executing
    Idle,
    /// A macrotask callback is running
    RunningMacrotask,
    /// The microtask queue is being drained
    DrainingMicrotasks,
    /// The loop was halted; queued work was discarded
    Halted,
}

/// The capability an external time or I/O source needs from the loop:
/// register a callback to become eligible after a logical delay, and
/// cancel it while it is still queued.
///
/// Real timers, network completions and file I/O all sit behind this
/// boundary; the loop itself never produces time.
pub trait TaskSource {
    /// Registers `task` to become eligible `delay_ms` logical
    /// milliseconds from now. Returns a cancellable handle.
    fn register(&mut self, task: Task, delay_ms: u64) -> TaskHandle;

    /// Cancels a registered task. Returns false if it already ran.
    fn cancel(&mut self, handle: TaskHandle) -> bool;
}

struct LoopInner {
    task_queue: TaskQueue,
    microtask_queue: MicrotaskQueue,
    now: u64,
    next_sequence: u64,
    next_promise_id: u64,
    microtasks_drained: u64,
    phase: LoopPhase,
    unhandled_rejection: Option<Box<dyn FnMut(Value)>>,
}

/// The deterministic event loop.
///
/// Each iteration of the loop fully drains the microtask queue, then pops
/// the macrotask with the smallest `(due_time, sequence)` key, advances
/// the logical clock to its due time, and runs it to completion. This is
/// the core ordering contract: microtasks always exhaust completely —
/// including microtasks enqueued mid-drain — before the next macrotask is
/// considered. A job chain that keeps enqueuing microtasks therefore
/// starves the macrotask queue forever; that is modeled behavior, and the
/// drain is never truncated.
///
/// `EventLoop` is a cheaply cloneable handle; clones share the same
/// queues and clock. Jobs capture a clone to schedule further work.
///
/// # Examples
///
/// ```
/// use async_runtime::{EventLoop, Task};
/// use core_types::Value;
///
/// let event_loop = EventLoop::new();
/// event_loop.enqueue_task(Task::new(|| Ok(Value::Undefined)), 0);
/// event_loop.run_until_idle().unwrap();
/// assert_eq!(event_loop.current_time(), 0);
/// ```
#[derive(Clone, Default)]
pub struct EventLoop {
    inner: Rc<RefCell<LoopInner>>,
}

impl Default for LoopInner {
    fn default() -> Self {
        Self {
            task_queue: TaskQueue::new(),
            microtask_queue: MicrotaskQueue::new(),
            now: 0,
            next_sequence: 0,
            next_promise_id: 0,
            microtasks_drained: 0,
            phase: LoopPhase::Idle,
            unhandled_rejection: None,
        }
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("EventLoop")
            .field("now", &inner.now)
            .field("phase", &inner.phase)
            .field("tasks", &inner.task_queue.len())
            .field("microtasks", &inner.microtask_queue.len())
            .finish()
    }
}

impl EventLoop {
    /// Creates a new event loop with empty queues and the clock at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a microtask to the microtask queue.
    ///
    /// Callable from anywhere, including from within a currently
    /// executing microtask or macrotask. Ignored after [`halt`].
    ///
    /// [`halt`]: EventLoop::halt
    pub fn enqueue_microtask(&self, microtask: MicroTask) {
        let mut inner = self.inner.borrow_mut();
        if inner.phase == LoopPhase::Halted {
            return;
        }
        inner.microtask_queue.enqueue(microtask);
    }

    /// Schedules a macrotask to become eligible `delay_ms` logical
    /// milliseconds from the current logical time.
    ///
    /// Ties between tasks with the same due time are broken by insertion
    /// order.
    ///
    /// # Returns
    ///
    /// A handle usable with [`cancel_task`](EventLoop::cancel_task).
    pub fn enqueue_task(&self, task: Task, delay_ms: u64) -> TaskHandle {
        let mut inner = self.inner.borrow_mut();
        let due_time = inner.now.saturating_add(delay_ms);
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        if inner.phase == LoopPhase::Halted {
            // Dead handle; the task is dropped.
            return TaskHandle::detached(due_time, sequence);
        }
        inner.task_queue.schedule(due_time, sequence, task)
    }

    /// Cancels a queued macrotask.
    ///
    /// # Returns
    ///
    /// True if the task was removed; false if it already executed, was
    /// cancelled before, or is unknown to this loop.
    pub fn cancel_task(&self, handle: TaskHandle) -> bool {
        self.inner.borrow_mut().task_queue.cancel(handle)
    }

    /// Runs the loop until both queues are empty.
    ///
    /// Each iteration drains every queued microtask (including ones
    /// enqueued during the drain), then executes the next due macrotask
    /// after advancing the clock to its due time.
    ///
    /// # Returns
    ///
    /// `Ok(())` when all work completed, or the first error returned by
    /// a host-scheduled job. Promise reactions never take the error
    /// path; a failed job leaves the remaining work queued, so a later
    /// call resumes where this one stopped.
    pub fn run_until_idle(&self) -> Result<(), JsError> {
        let result = self.drive();
        let mut inner = self.inner.borrow_mut();
        if inner.phase != LoopPhase::Halted {
            inner.phase = LoopPhase::Idle;
        }
        result
    }

    fn drive(&self) -> Result<(), JsError> {
        loop {
            self.run_all_microtasks()?;

            let task = {
                let mut inner = self.inner.borrow_mut();
                if inner.phase == LoopPhase::Halted {
                    return Ok(());
                }
                match inner.task_queue.pop_next() {
                    Some((due_time, task)) => {
                        // The clock only moves forward.
                        inner.now = inner.now.max(due_time);
                        inner.phase = LoopPhase::RunningMacrotask;
                        Some(task)
                    }
                    None => None,
                }
            };

            match task {
                Some(task) => {
                    task.run()?;
                }
                None => return Ok(()),
            }
        }
    }

    /// Drains the microtask queue until it is empty.
    ///
    /// New microtasks enqueued during execution are also processed before
    /// this method returns.
    pub fn run_all_microtasks(&self) -> Result<(), JsError> {
        loop {
            let microtask = {
                let mut inner = self.inner.borrow_mut();
                if inner.phase == LoopPhase::Halted {
                    return Ok(());
                }
                match inner.microtask_queue.dequeue() {
                    Some(microtask) => {
                        inner.phase = LoopPhase::DrainingMicrotasks;
                        inner.microtasks_drained += 1;
                        Some(microtask)
                    }
                    None => None,
                }
            };

            match microtask {
                Some(microtask) => {
                    microtask.run()?;
                }
                None => {
                    let mut inner = self.inner.borrow_mut();
                    if inner.phase == LoopPhase::DrainingMicrotasks {
                        inner.phase = LoopPhase::Idle;
                    }
                    return Ok(());
                }
            }
        }
    }

    /// Executes at most one queued microtask.
    ///
    /// Intended for deterministic tests that need to observe individual
    /// scheduling steps.
    ///
    /// # Returns
    ///
    /// Whether any work (in either queue) remains afterwards.
    pub fn step_microtask(&self) -> Result<bool, JsError> {
        let microtask = {
            let mut inner = self.inner.borrow_mut();
            if inner.phase == LoopPhase::Halted {
                return Ok(false);
            }
            match inner.microtask_queue.dequeue() {
                Some(microtask) => {
                    inner.phase = LoopPhase::DrainingMicrotasks;
                    inner.microtasks_drained += 1;
                    Some(microtask)
                }
                None => None,
            }
        };
        if let Some(microtask) = microtask {
            let result = microtask.run();
            let mut inner = self.inner.borrow_mut();
            if inner.phase == LoopPhase::DrainingMicrotasks {
                inner.phase = LoopPhase::Idle;
            }
            drop(inner);
            result?;
        }
        Ok(self.has_pending_work())
    }

    /// Executes at most one queued macrotask, advancing the clock to its
    /// due time. Queued microtasks are left untouched.
    ///
    /// # Returns
    ///
    /// Whether any work (in either queue) remains afterwards.
    pub fn step_macrotask(&self) -> Result<bool, JsError> {
        let task = {
            let mut inner = self.inner.borrow_mut();
            if inner.phase == LoopPhase::Halted {
                return Ok(false);
            }
            match inner.task_queue.pop_next() {
                Some((due_time, task)) => {
                    inner.now = inner.now.max(due_time);
                    inner.phase = LoopPhase::RunningMacrotask;
                    Some(task)
                }
                None => None,
            }
        };
        if let Some(task) = task {
            let result = task.run();
            let mut inner = self.inner.borrow_mut();
            if inner.phase == LoopPhase::RunningMacrotask {
                inner.phase = LoopPhase::Idle;
            }
            drop(inner);
            result?;
        }
        Ok(self.has_pending_work())
    }

    /// Returns the current logical time in milliseconds.
    pub fn current_time(&self) -> u64 {
        self.inner.borrow().now
    }

    /// Returns the current execution phase.
    pub fn phase(&self) -> LoopPhase {
        self.inner.borrow().phase
    }

    /// Returns the total number of microtasks executed so far.
    ///
    /// Diagnostic counter for spotting runaway microtask chains; the
    /// drain itself is never truncated.
    pub fn microtasks_drained(&self) -> u64 {
        self.inner.borrow().microtasks_drained
    }

    /// Returns true if the macrotask queue is empty.
    pub fn is_task_queue_empty(&self) -> bool {
        self.inner.borrow().task_queue.is_empty()
    }

    /// Returns true if the microtask queue is empty.
    pub fn is_microtask_queue_empty(&self) -> bool {
        self.inner.borrow().microtask_queue.is_empty()
    }

    /// Returns true if either queue holds work.
    pub fn has_pending_work(&self) -> bool {
        let inner = self.inner.borrow();
        !inner.task_queue.is_empty() || !inner.microtask_queue.is_empty()
    }

    /// Halts the loop: both queues are cleared and all further
    /// scheduling calls are ignored.
    pub fn halt(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.phase = LoopPhase::Halted;
        while inner.task_queue.pop_next().is_some() {}
        while inner.microtask_queue.dequeue().is_some() {}
    }

    /// Installs the unhandled-rejection diagnostic callback.
    ///
    /// The callback is invoked with the rejection reason, once per
    /// promise that is rejected and still has zero attached reactions by
    /// the time its settlement microtask has run. Replaces any previous
    /// callback.
    pub fn on_unhandled_rejection<F>(&self, callback: F)
    where
        F: FnMut(Value) + 'static,
    {
        self.inner.borrow_mut().unhandled_rejection = Some(Box::new(callback));
    }

    /// Allocates a loop-unique promise id.
    pub(crate) fn allocate_promise_id(&self) -> u64 {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_promise_id;
        inner.next_promise_id += 1;
        id
    }

    /// Invokes the unhandled-rejection callback, if installed.
    ///
    /// The callback is taken out for the duration of the call so that it
    /// may itself use the loop without re-borrowing.
    pub(crate) fn report_unhandled_rejection(&self, reason: Value) {
        let callback = self.inner.borrow_mut().unhandled_rejection.take();
        if let Some(mut callback) = callback {
            callback(reason);
            let mut inner = self.inner.borrow_mut();
            if inner.unhandled_rejection.is_none() {
                inner.unhandled_rejection = Some(callback);
            }
        }
    }
}

impl TaskSource for EventLoop {
    fn register(&mut self, task: Task, delay_ms: u64) -> TaskHandle {
        self.enqueue_task(task, delay_ms)
    }

    fn cancel(&mut self, handle: TaskHandle) -> bool {
        self.cancel_task(handle)
    }
}
