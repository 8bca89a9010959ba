//! Task and microtask queue management.
//!
//! This module provides the two job queues driven by the event loop.
//! Macrotasks carry a logical due time and are executed in
//! `(due_time, sequence)` order; microtasks are plain FIFO and drain
//! completely after each macrotask.

use core_types::{JsError, Value};
use std::collections::{BTreeMap, VecDeque};

/// A macrotask to be executed by the event loop.
///
/// Tasks represent external-event-sourced work: timer callbacks, I/O
/// completions, host events. A queued task may still be cancelled; an
/// executing task always runs to completion.
pub struct Task {
    callback: Box<dyn FnOnce() -> Result<Value, JsError>>,
}

impl Task {
    /// Creates a new Task from a closure.
    ///
    /// # Arguments
    ///
    /// * `f` - The function to execute when the task runs
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() -> Result<Value, JsError> + 'static,
    {
        Self {
            callback: Box::new(f),
        }
    }

    /// Executes the task.
    ///
    /// # Returns
    ///
    /// The result of the task execution.
    pub fn run(self) -> Result<Value, JsError> {
        (self.callback)()
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Task {{ ... }}")
    }
}

/// A microtask to be executed by the event loop.
///
/// Microtasks are drained completely between macrotasks. Promise
/// reactions and thenable adoption hops are enqueued here. Once
/// enqueued, a microtask cannot be cancelled.
pub struct MicroTask {
    callback: Box<dyn FnOnce() -> Result<Value, JsError>>,
}

impl MicroTask {
    /// Creates a new MicroTask from a closure.
    ///
    /// # Arguments
    ///
    /// * `f` - The function to execute when the microtask runs
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() -> Result<Value, JsError> + 'static,
    {
        Self {
            callback: Box::new(f),
        }
    }

    /// Executes the microtask.
    ///
    /// # Returns
    ///
    /// The result of the microtask execution.
    pub fn run(self) -> Result<Value, JsError> {
        (self.callback)()
    }
}

impl std::fmt::Debug for MicroTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MicroTask {{ ... }}")
    }
}

/// Handle to a queued macrotask, usable for cancellation.
///
/// The handle stays valid after the task has executed; cancelling it then
/// simply has no effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle {
    due_time: u64,
    sequence: u64,
}

impl TaskHandle {
    /// Builds a handle that refers to no queued entry (cancel is a no-op).
    pub(crate) fn detached(due_time: u64, sequence: u64) -> Self {
        Self { due_time, sequence }
    }

    /// The logical time at which the task becomes eligible.
    pub fn due_time(&self) -> u64 {
        self.due_time
    }

    /// The insertion counter, unique per event loop.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// A time-ordered queue for macrotasks.
///
/// Entries are keyed by `(due_time, sequence)`: earliest due time first,
/// insertion order as the tie-break. Queued entries may be removed by
/// handle before execution.
#[derive(Debug, Default)]
pub struct TaskQueue {
    entries: BTreeMap<(u64, u64), Task>,
}

impl TaskQueue {
    /// Creates a new empty TaskQueue.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Inserts a task keyed by `(due_time, sequence)`.
    ///
    /// The caller is responsible for allocating a fresh `sequence` per
    /// insertion; the pair must be unique within one queue.
    pub fn schedule(&mut self, due_time: u64, sequence: u64, task: Task) -> TaskHandle {
        self.entries.insert((due_time, sequence), task);
        TaskHandle { due_time, sequence }
    }

    /// Removes and returns the entry with the smallest `(due_time, sequence)`.
    ///
    /// Returns the task together with its due time so the caller can
    /// advance the logical clock.
    pub fn pop_next(&mut self) -> Option<(u64, Task)> {
        let ((due_time, _), task) = self.entries.pop_first()?;
        Some((due_time, task))
    }

    /// Removes a queued entry.
    ///
    /// Returns true if the entry was still queued, false if it already
    /// executed or was never scheduled on this queue.
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        self.entries
            .remove(&(handle.due_time, handle.sequence))
            .is_some()
    }

    /// Returns the due time of the earliest entry, if any.
    pub fn next_due_time(&self) -> Option<u64> {
        self.entries.keys().next().map(|(due_time, _)| *due_time)
    }

    /// Returns true if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of queued tasks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// A FIFO queue for microtasks.
///
/// Microtasks are drained completely after each macrotask, including any
/// microtasks enqueued during the drain itself.
#[derive(Debug, Default)]
pub struct MicrotaskQueue {
    queue: VecDeque<MicroTask>,
}

impl MicrotaskQueue {
    /// Creates a new empty MicrotaskQueue.
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// Adds a microtask to the end of the queue.
    pub fn enqueue(&mut self, microtask: MicroTask) {
        self.queue.push_back(microtask);
    }

    /// Removes and returns the next microtask from the queue.
    pub fn dequeue(&mut self) -> Option<MicroTask> {
        self.queue.pop_front()
    }

    /// Returns true if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns the number of microtasks in the queue.
    pub fn len(&self) -> usize {
        self.queue.len()
    }
}
