//! Promise combinators: `all`, `race`, `any`, `all_settled`.
//!
//! All four are built purely on promise reactions and the resolution
//! procedure; the event loop knows nothing about them. Each input is
//! wrapped through the static resolve path (plain values become settled
//! promises, thenables are adopted), then a pair of observer reactions
//! feeds a shared aggregation record that settles the combinator's own
//! promise.

use crate::event_loop::EventLoop;
use crate::promise::{Function, Promise, Resolution};
use core_types::{JsError, SettledOutcome, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Normalizes one combinator input to a promise.
///
/// Inputs that already are promises are observed directly (no extra
/// adoption hop, so settle order across mixed inputs stays faithful);
/// everything else goes through the static resolve path.
fn resolved_input(event_loop: &EventLoop, input: Resolution) -> Promise {
    match input {
        Resolution::Value(value) => Promise::resolve_with(event_loop, value),
        Resolution::Thenable(thenable) => match thenable.into_source() {
            Ok(promise) => promise,
            Err(thenable) => Promise::resolve_with(event_loop, thenable),
        },
    }
}

struct AllState {
    values: Vec<Option<Value>>,
    remaining: usize,
    settled: bool,
}

struct AnyState {
    reasons: Vec<Option<Value>>,
    remaining: usize,
    settled: bool,
}

struct AllSettledState {
    records: Vec<Option<SettledOutcome>>,
    remaining: usize,
}

impl Promise {
    /// Waits for every input to fulfill.
    ///
    /// Fulfills with an array of the input values at their original
    /// indices, regardless of completion order. The first rejection
    /// immediately rejects the result with that reason; later
    /// settlements of other inputs are observed but have no further
    /// effect. An empty input fulfills immediately with an empty array.
    pub fn all(event_loop: &EventLoop, inputs: Vec<Resolution>) -> Promise {
        let result = Promise::new_pending(event_loop);
        if inputs.is_empty() {
            result.fulfill_internal(Value::Array(Vec::new()));
            return result;
        }

        let state = Rc::new(RefCell::new(AllState {
            values: vec![None; inputs.len()],
            remaining: inputs.len(),
            settled: false,
        }));

        for (index, input) in inputs.into_iter().enumerate() {
            let input_promise = resolved_input(event_loop, input);

            let on_value_state = state.clone();
            let on_value_result = result.clone();
            let on_fulfilled = Function::new(move |value| {
                let mut state = on_value_state.borrow_mut();
                if !state.settled && state.values[index].is_none() {
                    state.values[index] = Some(value);
                    state.remaining -= 1;
                    if state.remaining == 0 {
                        state.settled = true;
                        let values = state
                            .values
                            .iter()
                            .map(|slot| slot.clone().unwrap_or(Value::Undefined))
                            .collect();
                        drop(state);
                        on_value_result.fulfill_internal(Value::Array(values));
                    }
                }
                Ok(Resolution::Value(Value::Undefined))
            });

            let on_reason_state = state.clone();
            let on_reason_result = result.clone();
            let on_rejected = Function::new(move |reason| {
                let mut state = on_reason_state.borrow_mut();
                if !state.settled {
                    state.settled = true;
                    drop(state);
                    on_reason_result.reject_internal(reason);
                }
                Ok(Resolution::Value(Value::Undefined))
            });

            input_promise.observe(on_fulfilled, on_rejected);
        }

        result
    }

    /// Settles with whichever input settles first, value or reason.
    ///
    /// With several inputs settling in the same scheduling slot, input
    /// order decides (reactions fire in FIFO attachment order). An
    /// empty input returns a promise that never settles.
    pub fn race(event_loop: &EventLoop, inputs: Vec<Resolution>) -> Promise {
        let result = Promise::new_pending(event_loop);
        let decided = Rc::new(Cell::new(false));

        for input in inputs {
            let input_promise = resolved_input(event_loop, input);

            let on_value_decided = decided.clone();
            let on_value_result = result.clone();
            let on_fulfilled = Function::new(move |value| {
                if !on_value_decided.get() {
                    on_value_decided.set(true);
                    on_value_result.fulfill_internal(value);
                }
                Ok(Resolution::Value(Value::Undefined))
            });

            let on_reason_decided = decided.clone();
            let on_reason_result = result.clone();
            let on_rejected = Function::new(move |reason| {
                if !on_reason_decided.get() {
                    on_reason_decided.set(true);
                    on_reason_result.reject_internal(reason);
                }
                Ok(Resolution::Value(Value::Undefined))
            });

            input_promise.observe(on_fulfilled, on_rejected);
        }

        result
    }

    /// Fulfills with the first input that fulfills.
    ///
    /// If every input rejects, rejects with an aggregate error carrying
    /// all reasons in original input order. An empty input rejects
    /// immediately with an empty aggregate.
    pub fn any(event_loop: &EventLoop, inputs: Vec<Resolution>) -> Promise {
        let result = Promise::new_pending(event_loop);
        if inputs.is_empty() {
            result.reject_internal(Value::from(JsError::aggregate(Vec::new())));
            return result;
        }

        let state = Rc::new(RefCell::new(AnyState {
            reasons: vec![None; inputs.len()],
            remaining: inputs.len(),
            settled: false,
        }));

        for (index, input) in inputs.into_iter().enumerate() {
            let input_promise = resolved_input(event_loop, input);

            let on_value_state = state.clone();
            let on_value_result = result.clone();
            let on_fulfilled = Function::new(move |value| {
                let mut state = on_value_state.borrow_mut();
                if !state.settled {
                    state.settled = true;
                    drop(state);
                    on_value_result.fulfill_internal(value);
                }
                Ok(Resolution::Value(Value::Undefined))
            });

            let on_reason_state = state.clone();
            let on_reason_result = result.clone();
            let on_rejected = Function::new(move |reason| {
                let mut state = on_reason_state.borrow_mut();
                if !state.settled && state.reasons[index].is_none() {
                    state.reasons[index] = Some(reason);
                    state.remaining -= 1;
                    if state.remaining == 0 {
                        state.settled = true;
                        let reasons = state
                            .reasons
                            .iter()
                            .map(|slot| slot.clone().unwrap_or(Value::Undefined))
                            .collect();
                        drop(state);
                        on_reason_result
                            .reject_internal(Value::from(JsError::aggregate(reasons)));
                    }
                }
                Ok(Resolution::Value(Value::Undefined))
            });

            input_promise.observe(on_fulfilled, on_rejected);
        }

        result
    }

    /// Waits for every input to settle, never rejecting.
    ///
    /// Fulfills with an index-aligned array of settlement records, one
    /// per input: fulfilled-with-value or rejected-with-reason. An
    /// empty input fulfills immediately with an empty array.
    pub fn all_settled(event_loop: &EventLoop, inputs: Vec<Resolution>) -> Promise {
        let result = Promise::new_pending(event_loop);
        if inputs.is_empty() {
            result.fulfill_internal(Value::Array(Vec::new()));
            return result;
        }

        let state = Rc::new(RefCell::new(AllSettledState {
            records: vec![None; inputs.len()],
            remaining: inputs.len(),
        }));

        for (index, input) in inputs.into_iter().enumerate() {
            let input_promise = resolved_input(event_loop, input);

            let record = {
                let state = state.clone();
                let result = result.clone();
                move |outcome: SettledOutcome| {
                    let mut state = state.borrow_mut();
                    if state.records[index].is_none() {
                        state.records[index] = Some(outcome);
                        state.remaining -= 1;
                        if state.remaining == 0 {
                            let records = state
                                .records
                                .iter()
                                .map(|slot| match slot.clone() {
                                    Some(outcome) => Value::Settled(Box::new(outcome)),
                                    None => Value::Undefined,
                                })
                                .collect();
                            drop(state);
                            result.fulfill_internal(Value::Array(records));
                        }
                    }
                }
            };

            let record_rejection = record.clone();
            let on_fulfilled = Function::new(move |value| {
                record(SettledOutcome::Fulfilled { value });
                Ok(Resolution::Value(Value::Undefined))
            });
            let on_rejected = Function::new(move |reason| {
                record_rejection(SettledOutcome::Rejected { reason });
                Ok(Resolution::Value(Value::Undefined))
            });

            input_promise.observe(on_fulfilled, on_rejected);
        }

        result
    }
}
