//! Deterministic async runtime: event loop, promises, combinators.
//!
//! This crate provides a single-threaded cooperative scheduler and a
//! settle-once promise state machine built on top of it:
//! - [`EventLoop`] - two-queue event loop with a logical clock
//! - [`Promise`] - settle-once container with `then` chaining and
//!   thenable adoption
//! - Combinators - [`Promise::all`], [`Promise::race`], [`Promise::any`],
//!   [`Promise::all_settled`]
//!
//! # Ordering model
//!
//! Work is split across two queues. Macrotasks carry a logical due time
//! and run one at a time in `(due_time, sequence)` order; microtasks are
//! FIFO and the queue is drained completely — including microtasks
//! enqueued mid-drain — before the next macrotask is considered. A
//! running job is never preempted. Promise reactions are always
//! microtasks.
//!
//! # Examples
//!
//! ## Event loop usage
//!
//! ```
//! use async_runtime::{EventLoop, Task};
//! use core_types::Value;
//!
//! let event_loop = EventLoop::new();
//! event_loop.enqueue_task(Task::new(|| Ok(Value::Undefined)), 0);
//! event_loop.run_until_idle().unwrap();
//! ```
//!
//! ## Promise usage
//!
//! ```
//! use async_runtime::{EventLoop, Function, Promise, Resolution};
//! use core_types::Value;
//!
//! let event_loop = EventLoop::new();
//! let recorded = std::rc::Rc::new(std::cell::RefCell::new(None));
//!
//! let seen = recorded.clone();
//! Promise::resolve_with(&event_loop, Value::Smi(1)).then(
//!     Some(Function::new(move |value| {
//!         *seen.borrow_mut() = Some(value.clone());
//!         Ok(Resolution::Value(value))
//!     })),
//!     None,
//! );
//!
//! event_loop.run_until_idle().unwrap();
//! assert_eq!(*recorded.borrow(), Some(Value::Smi(1)));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod combinators;
pub mod event_loop;
pub mod promise;
pub mod task_queue;

// Re-export main types at crate root
pub use event_loop::{EventLoop, LoopPhase, TaskSource};
pub use promise::{Function, Promise, PromiseState, Resolution, Resolver, Thenable};
pub use task_queue::{MicroTask, MicrotaskQueue, Task, TaskHandle, TaskQueue};
