//! Promise implementation.
//!
//! This module provides a settle-once value/error container with reaction
//! lists, a resolution procedure that adopts thenable values, and the
//! `then`/`catch`/`finally` chaining surface.
//!
//! A promise is a cheaply cloneable handle bound to exactly one
//! [`EventLoop`] at construction; its reactions are always scheduled on
//! that loop. Settlement happens at most once: the first resolve or
//! reject wins and every later attempt is silently ignored.

use crate::event_loop::EventLoop;
use crate::task_queue::MicroTask;
use core_types::{JsError, SettledOutcome, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// The state of a Promise.
///
/// Promises transition through states at most once. Once settled
/// (Fulfilled or Rejected), a Promise cannot change state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromiseState {
    /// The initial state; the promise is neither fulfilled nor rejected.
    Pending,
    /// The promise has been fulfilled with a value.
    Fulfilled,
    /// The promise has been rejected with a reason.
    Rejected,
}

/// A reaction handler attached via `then`.
///
/// Wraps a host closure that receives the settled value (or reason) and
/// produces either a resolution for the downstream promise or an error
/// that rejects it.
pub struct Function {
    callback: Box<dyn FnMut(Value) -> Result<Resolution, JsError>>,
}

impl Function {
    /// Creates a new Function from a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: FnMut(Value) -> Result<Resolution, JsError> + 'static,
    {
        Self {
            callback: Box::new(f),
        }
    }

    /// Calls the function with the given argument.
    pub fn call(&mut self, argument: Value) -> Result<Resolution, JsError> {
        (self.callback)(argument)
    }
}

impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Function {{ ... }}")
    }
}

/// A reaction to be triggered when a Promise settles.
///
/// Registered via `then`-style attachment while pending; fired in
/// registration order as microtasks upon settlement. `downstream` is
/// `None` for observer reactions (combinators), which have no chained
/// promise to settle.
#[derive(Debug)]
pub(crate) struct PromiseReaction {
    pub(crate) on_fulfilled: Option<Function>,
    pub(crate) on_rejected: Option<Function>,
    pub(crate) downstream: Option<Promise>,
}

/// A one-shot capability standing in for an eventual value.
///
/// Invoking the capability hands it a guarded [`Resolver`] for the
/// adopting promise; whichever of resolve/reject the capability calls
/// first decides the promise's fate. Built either from a raw closure
/// ([`Thenable::new`]) or from another promise (via `From<Promise> for
/// Resolution`), in which case the source is remembered so that direct
/// self-resolution can be detected.
pub struct Thenable {
    capability: Box<dyn FnOnce(Resolver)>,
    source: Option<Promise>,
}

impl Thenable {
    /// Creates a thenable from a capability closure.
    ///
    /// The closure is invoked from a microtask with the adopting
    /// promise's resolver. A capability that never calls back leaves the
    /// adopting promise pending forever; that is valid behavior.
    pub fn new<F>(capability: F) -> Self
    where
        F: FnOnce(Resolver) + 'static,
    {
        Self {
            capability: Box::new(capability),
            source: None,
        }
    }

    fn from_promise(promise: Promise) -> Self {
        let source = promise.clone();
        let capability = move |resolver: Resolver| {
            let reject = resolver.clone();
            promise.observe(
                Function::new(move |value| {
                    resolver.resolve(value);
                    Ok(Resolution::Value(Value::Undefined))
                }),
                Function::new(move |reason| {
                    reject.reject(reason);
                    Ok(Resolution::Value(Value::Undefined))
                }),
            );
        };
        Self {
            capability: Box::new(capability),
            source: Some(source),
        }
    }

    /// Unwraps the source promise, if this thenable was built from one.
    pub(crate) fn into_source(self) -> Result<Promise, Thenable> {
        let Thenable { capability, source } = self;
        match source {
            Some(promise) => Ok(promise),
            None => Err(Thenable {
                capability,
                source: None,
            }),
        }
    }
}

impl std::fmt::Debug for Thenable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            Some(promise) => write!(f, "Thenable {{ promise #{} }}", promise.id()),
            None => write!(f, "Thenable {{ ... }}"),
        }
    }
}

/// Input to the resolution procedure: either a plain value, which
/// settles immediately, or a thenable, whose eventual state is adopted
/// through the microtask queue.
///
/// The two cases are decided once, at conversion time, instead of by
/// property inspection scattered through the resolution code.
#[derive(Debug)]
pub enum Resolution {
    /// A plain value; fulfills the promise synchronously.
    Value(Value),
    /// A thenable; the promise adopts its eventual state.
    Thenable(Thenable),
}

impl From<Value> for Resolution {
    fn from(value: Value) -> Self {
        Resolution::Value(value)
    }
}

impl From<Thenable> for Resolution {
    fn from(thenable: Thenable) -> Self {
        Resolution::Thenable(thenable)
    }
}

impl From<Promise> for Resolution {
    fn from(promise: Promise) -> Self {
        Resolution::Thenable(Thenable::from_promise(promise))
    }
}

impl From<JsError> for Resolution {
    fn from(error: JsError) -> Self {
        Resolution::Value(Value::from(error))
    }
}

struct PromiseInner {
    id: u64,
    state: PromiseState,
    result: Option<Value>,
    reason: Option<Value>,
    reactions: Vec<PromiseReaction>,
    /// A reaction was attached at some point (suppresses the
    /// unhandled-rejection diagnostic).
    handled: bool,
    /// A resolution is in flight: a thenable adoption microtask is
    /// queued or running. External settle attempts are ignored until
    /// the adoption decides the outcome.
    resolving: bool,
}

/// A promise: a value that will become available, or fail, at most once.
///
/// Cloning the handle is cheap and shares the underlying state. A
/// promise is tied to the event loop it was created on; all its
/// reactions run as microtasks of that loop.
///
/// # Examples
///
/// ```
/// use async_runtime::{EventLoop, Function, Promise, PromiseState, Resolution};
/// use core_types::Value;
///
/// let event_loop = EventLoop::new();
/// let promise = Promise::resolve_with(&event_loop, Value::Smi(42));
/// assert_eq!(promise.state(), PromiseState::Fulfilled);
///
/// let chained = promise.then(
///     Some(Function::new(|v| match v {
///         Value::Smi(n) => Ok(Resolution::Value(Value::Smi(n + 1))),
///         other => Ok(Resolution::Value(other)),
///     })),
///     None,
/// );
/// event_loop.run_until_idle().unwrap();
/// assert_eq!(chained.value(), Some(Value::Smi(43)));
/// ```
#[derive(Clone)]
pub struct Promise {
    inner: Rc<RefCell<PromiseInner>>,
    event_loop: EventLoop,
}

impl std::fmt::Debug for Promise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Promise")
            .field("id", &inner.id)
            .field("state", &inner.state)
            .finish()
    }
}

impl Promise {
    /// Creates a new pending promise bound to `event_loop`.
    pub(crate) fn new_pending(event_loop: &EventLoop) -> Self {
        Self {
            inner: Rc::new(RefCell::new(PromiseInner {
                id: event_loop.allocate_promise_id(),
                state: PromiseState::Pending,
                result: None,
                reason: None,
                reactions: Vec::new(),
                handled: false,
                resolving: false,
            })),
            event_loop: event_loop.clone(),
        }
    }

    /// Creates a pending promise together with its resolver.
    ///
    /// The resolver is the only external way to settle the promise; its
    /// first resolve or reject call wins.
    pub fn pending(event_loop: &EventLoop) -> (Promise, Resolver) {
        let promise = Self::new_pending(event_loop);
        let resolver = Resolver::new(promise.clone());
        (promise, resolver)
    }

    /// Creates a promise and runs `executor` with its resolver,
    /// synchronously, before returning.
    ///
    /// An error returned by the executor rejects the promise — unless
    /// the executor already settled it, in which case the error is
    /// ignored (settlement is final).
    pub fn create<F>(event_loop: &EventLoop, executor: F) -> Promise
    where
        F: FnOnce(Resolver) -> Result<(), JsError>,
    {
        let (promise, resolver) = Self::pending(event_loop);
        let guard = resolver.clone();
        if let Err(error) = executor(resolver) {
            guard.reject(Value::from(error));
        }
        promise
    }

    /// Creates a promise resolved with `input`.
    ///
    /// A plain value produces an already-fulfilled promise; a thenable
    /// input goes through the adoption path.
    pub fn resolve_with(event_loop: &EventLoop, input: impl Into<Resolution>) -> Promise {
        let (promise, resolver) = Self::pending(event_loop);
        resolver.resolve(input);
        promise
    }

    /// Creates a promise already rejected with `reason`.
    ///
    /// Reasons are never inspected for thenable-ness.
    pub fn reject_with(event_loop: &EventLoop, reason: Value) -> Promise {
        let (promise, resolver) = Self::pending(event_loop);
        resolver.reject(reason);
        promise
    }

    /// Adds handlers for fulfillment and/or rejection.
    ///
    /// Returns the downstream promise immediately. If this promise is
    /// pending the reaction is appended; if it already settled the
    /// matching handler is scheduled as a microtask right away, in FIFO
    /// order with any other queued work. An absent handler passes the
    /// original state through to the downstream promise unchanged.
    pub fn then(
        &self,
        on_fulfilled: Option<Function>,
        on_rejected: Option<Function>,
    ) -> Promise {
        let downstream = Self::new_pending(&self.event_loop);
        self.add_reaction(PromiseReaction {
            on_fulfilled,
            on_rejected,
            downstream: Some(downstream.clone()),
        });
        downstream
    }

    /// Shorthand for `then(None, Some(on_rejected))`.
    pub fn catch(&self, on_rejected: Function) -> Promise {
        self.then(None, Some(on_rejected))
    }

    /// Runs `on_settled` once this promise settles, regardless of
    /// outcome.
    ///
    /// The original value or reason passes through to the returned
    /// promise unchanged — unless the callback fails, in which case the
    /// returned promise rejects with that error instead.
    pub fn finally<F>(&self, on_settled: F) -> Promise
    where
        F: FnMut() -> Result<(), JsError> + 'static,
    {
        let downstream = Self::new_pending(&self.event_loop);
        let callback = Rc::new(RefCell::new(on_settled));

        let cb = callback.clone();
        let fulfilled_downstream = downstream.clone();
        let on_fulfilled = Function::new(move |value| {
            match (cb.borrow_mut())() {
                Ok(()) => fulfilled_downstream.fulfill_internal(value),
                Err(error) => fulfilled_downstream.reject_internal(Value::from(error)),
            }
            Ok(Resolution::Value(Value::Undefined))
        });

        let cb = callback;
        let rejected_downstream = downstream.clone();
        let on_rejected = Function::new(move |reason| {
            match (cb.borrow_mut())() {
                Ok(()) => rejected_downstream.reject_internal(reason),
                Err(error) => rejected_downstream.reject_internal(Value::from(error)),
            }
            Ok(Resolution::Value(Value::Undefined))
        });

        self.observe(on_fulfilled, on_rejected);
        downstream
    }

    /// Attaches an observer reaction with no downstream promise.
    ///
    /// Used by combinators: handler results are discarded.
    pub(crate) fn observe(&self, on_fulfilled: Function, on_rejected: Function) {
        self.add_reaction(PromiseReaction {
            on_fulfilled: Some(on_fulfilled),
            on_rejected: Some(on_rejected),
            downstream: None,
        });
    }

    /// Returns the current state of the promise.
    pub fn state(&self) -> PromiseState {
        self.inner.borrow().state.clone()
    }

    /// Returns the fulfillment value, if fulfilled.
    pub fn value(&self) -> Option<Value> {
        self.inner.borrow().result.clone()
    }

    /// Returns the rejection reason, if rejected.
    pub fn reason(&self) -> Option<Value> {
        self.inner.borrow().reason.clone()
    }

    /// Returns the loop-unique id of this promise.
    pub fn id(&self) -> u64 {
        self.inner.borrow().id
    }

    /// Returns the event loop this promise is bound to.
    pub fn event_loop(&self) -> &EventLoop {
        &self.event_loop
    }

    /// Checks if there are reactions waiting for settlement.
    pub fn has_pending_reactions(&self) -> bool {
        !self.inner.borrow().reactions.is_empty()
    }

    fn add_reaction(&self, reaction: PromiseReaction) {
        let outcome = {
            let mut inner = self.inner.borrow_mut();
            inner.handled = true;
            match inner.state {
                PromiseState::Pending => {
                    inner.reactions.push(reaction);
                    return;
                }
                PromiseState::Fulfilled => SettledOutcome::Fulfilled {
                    value: inner.result.clone().unwrap_or(Value::Undefined),
                },
                PromiseState::Rejected => SettledOutcome::Rejected {
                    reason: inner.reason.clone().unwrap_or(Value::Undefined),
                },
            }
        };
        self.schedule_reaction(reaction, outcome);
    }

    fn schedule_reaction(&self, reaction: PromiseReaction, outcome: SettledOutcome) {
        self.event_loop.enqueue_microtask(MicroTask::new(move || {
            Self::run_reaction(reaction, outcome);
            Ok(Value::Undefined)
        }));
    }

    /// Executes one reaction against a settled outcome.
    ///
    /// Runs outside of any queue or promise borrow, so handlers are free
    /// to attach further reactions or create promises.
    fn run_reaction(reaction: PromiseReaction, outcome: SettledOutcome) {
        match outcome {
            SettledOutcome::Fulfilled { value } => match reaction.on_fulfilled {
                Some(handler) => Self::apply_handler(handler, value, reaction.downstream),
                None => {
                    if let Some(downstream) = reaction.downstream {
                        downstream.fulfill_internal(value);
                    }
                }
            },
            SettledOutcome::Rejected { reason } => match reaction.on_rejected {
                Some(handler) => Self::apply_handler(handler, reason, reaction.downstream),
                None => {
                    if let Some(downstream) = reaction.downstream {
                        downstream.reject_internal(reason);
                    }
                }
            },
        }
    }

    fn apply_handler(mut handler: Function, argument: Value, downstream: Option<Promise>) {
        let result = handler.call(argument);
        let Some(downstream) = downstream else {
            return;
        };
        match result {
            Ok(resolution) => downstream.resolve_internal(resolution),
            Err(error) => downstream.reject_internal(Value::from(error)),
        }
    }

    /// The resolution procedure: plain values settle now, thenables are
    /// adopted via the microtask queue.
    pub(crate) fn resolve_internal(&self, resolution: Resolution) {
        match resolution {
            Resolution::Value(value) => self.fulfill_internal(value),
            Resolution::Thenable(thenable) => self.adopt(thenable),
        }
    }

    /// Begins adopting a thenable's eventual state.
    ///
    /// The capability is invoked from a fresh microtask with a delegated
    /// resolver, so arbitrarily long adoption chains iterate through the
    /// job queue instead of recursing on the call stack. A cycle that
    /// never calls back simply leaves this promise pending.
    fn adopt(&self, thenable: Thenable) {
        if let Some(source) = &thenable.source {
            if Rc::ptr_eq(&source.inner, &self.inner) {
                self.reject_internal(Value::from(JsError::type_error(
                    "Chaining cycle detected: cannot resolve a promise with itself",
                )));
                return;
            }
        }
        {
            let mut inner = self.inner.borrow_mut();
            if inner.state != PromiseState::Pending {
                return;
            }
            inner.resolving = true;
        }
        let resolver = Resolver::delegated(self.clone());
        let capability = thenable.capability;
        self.event_loop.enqueue_microtask(MicroTask::new(move || {
            capability(resolver);
            Ok(Value::Undefined)
        }));
    }

    /// Settles the promise as fulfilled and fires queued reactions.
    pub(crate) fn fulfill_internal(&self, value: Value) {
        let reactions = {
            let mut inner = self.inner.borrow_mut();
            if inner.state != PromiseState::Pending {
                return;
            }
            inner.state = PromiseState::Fulfilled;
            inner.result = Some(value.clone());
            std::mem::take(&mut inner.reactions)
        };
        for reaction in reactions {
            self.schedule_reaction(
                reaction,
                SettledOutcome::Fulfilled {
                    value: value.clone(),
                },
            );
        }
    }

    /// Settles the promise as rejected and fires queued reactions.
    ///
    /// If no reaction was ever attached, a diagnostic microtask is
    /// queued that reports the rejection as unhandled unless a reaction
    /// arrives before it runs.
    pub(crate) fn reject_internal(&self, reason: Value) {
        let (reactions, was_unobserved) = {
            let mut inner = self.inner.borrow_mut();
            if inner.state != PromiseState::Pending {
                return;
            }
            inner.state = PromiseState::Rejected;
            inner.reason = Some(reason.clone());
            let reactions = std::mem::take(&mut inner.reactions);
            (reactions, !inner.handled)
        };
        for reaction in reactions {
            self.schedule_reaction(
                reaction,
                SettledOutcome::Rejected {
                    reason: reason.clone(),
                },
            );
        }
        if was_unobserved {
            let promise = self.clone();
            self.event_loop.enqueue_microtask(MicroTask::new(move || {
                let reason = {
                    let inner = promise.inner.borrow();
                    if inner.handled {
                        None
                    } else {
                        Some(inner.reason.clone().unwrap_or(Value::Undefined))
                    }
                };
                if let Some(reason) = reason {
                    promise.event_loop.report_unhandled_rejection(reason);
                }
                Ok(Value::Undefined)
            }));
        }
    }
}

/// The guarded settle capability for one promise.
///
/// Collapses the resolve/reject callback pair into one object: both
/// share a once-flag, so whichever is called first wins and every later
/// call through this resolver (or a clone of it) is ignored. Adoption
/// hops get a fresh *delegated* resolver that is allowed to settle the
/// promise while a resolution is in flight.
#[derive(Clone)]
pub struct Resolver {
    target: Promise,
    used: Rc<Cell<bool>>,
    delegated: bool,
}

impl Resolver {
    fn new(target: Promise) -> Self {
        Self {
            target,
            used: Rc::new(Cell::new(false)),
            delegated: false,
        }
    }

    fn delegated(target: Promise) -> Self {
        Self {
            target,
            used: Rc::new(Cell::new(false)),
            delegated: true,
        }
    }

    fn may_settle(&self) -> bool {
        if self.used.get() {
            return false;
        }
        let inner = self.target.inner.borrow();
        inner.state == PromiseState::Pending && (self.delegated || !inner.resolving)
    }

    /// Resolves the target promise.
    ///
    /// No-op if this resolver was already used, the promise is settled,
    /// or another resolution is in flight. A thenable input starts the
    /// adoption path instead of settling immediately.
    pub fn resolve(&self, input: impl Into<Resolution>) {
        if !self.may_settle() {
            return;
        }
        self.used.set(true);
        self.target.resolve_internal(input.into());
    }

    /// Rejects the target promise with `reason`.
    ///
    /// Same guards as [`resolve`](Resolver::resolve); reasons are never
    /// inspected for thenable-ness.
    pub fn reject(&self, reason: Value) {
        if !self.may_settle() {
            return;
        }
        self.used.set(true);
        self.target.reject_internal(reason);
    }

    /// The promise this resolver settles.
    pub fn promise(&self) -> &Promise {
        &self.target
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("promise", &self.target.id())
            .field("used", &self.used.get())
            .field("delegated", &self.delegated)
            .finish()
    }
}
