//! Integration tests for promise reactions riding the event loop.
//!
//! These tests exercise the scheduling contract end to end: reactions
//! are microtasks, microtasks drain completely before any macrotask,
//! and the logical clock never leaks into microtask ordering.

use async_runtime::{EventLoop, Function, MicroTask, Promise, Resolution, Task};
use core_types::{JsError, Value};
use std::cell::RefCell;
use std::rc::Rc;

type OrderLog = Rc<RefCell<Vec<String>>>;

fn log_task(event_loop: &EventLoop, log: &OrderLog, label: &'static str, delay_ms: u64) {
    let log = log.clone();
    event_loop.enqueue_task(
        Task::new(move || {
            log.borrow_mut().push(label.to_string());
            Ok(Value::Undefined)
        }),
        delay_ms,
    );
}

fn log_microtask(event_loop: &EventLoop, log: &OrderLog, label: &'static str) {
    let log = log.clone();
    event_loop.enqueue_microtask(MicroTask::new(move || {
        log.borrow_mut().push(label.to_string());
        Ok(Value::Undefined)
    }));
}

#[test]
fn queued_microtasks_run_before_a_delay_zero_task() {
    let event_loop = EventLoop::new();
    let log: OrderLog = Rc::new(RefCell::new(Vec::new()));

    log_task(&event_loop, &log, "T1", 0);
    log_microtask(&event_loop, &log, "M1");
    log_microtask(&event_loop, &log, "M2");

    event_loop.run_until_idle().unwrap();
    assert_eq!(*log.borrow(), vec!["M1", "M2", "T1"]);
}

#[test]
fn chained_handlers_run_before_any_macrotask() {
    let event_loop = EventLoop::new();
    let log: OrderLog = Rc::new(RefCell::new(Vec::new()));

    log_task(&event_loop, &log, "task", 0);

    let record = log.clone();
    Promise::resolve_with(&event_loop, Value::Smi(1))
        .then(
            Some(Function::new(|value| match value {
                Value::Smi(n) => Ok(Resolution::Value(Value::Smi(n + 1))),
                other => Ok(Resolution::Value(other)),
            })),
            None,
        )
        .then(
            Some(Function::new(move |value| {
                record.borrow_mut().push(format!("record({})", value));
                Ok(Resolution::Value(value))
            })),
            None,
        );

    event_loop.run_until_idle().unwrap();
    // The whole chain settles during the initial drain.
    assert_eq!(*log.borrow(), vec!["record(2)", "task"]);
}

#[test]
fn reaction_to_a_timer_settled_promise_runs_in_that_timer_slot() {
    let event_loop = EventLoop::new();
    let log: OrderLog = Rc::new(RefCell::new(Vec::new()));

    let (promise, resolver) = Promise::pending(&event_loop);
    let settle_log = log.clone();
    event_loop.enqueue_task(
        Task::new(move || {
            settle_log.borrow_mut().push("timer-10".to_string());
            resolver.resolve(Value::Smi(1));
            Ok(Value::Undefined)
        }),
        10,
    );
    log_task(&event_loop, &log, "timer-20", 20);

    let reaction_log = log.clone();
    promise.then(
        Some(Function::new(move |value| {
            reaction_log.borrow_mut().push("reaction".to_string());
            Ok(Resolution::Value(value))
        })),
        None,
    );

    event_loop.run_until_idle().unwrap();
    // The reaction drains between the two timer slots.
    assert_eq!(*log.borrow(), vec!["timer-10", "reaction", "timer-20"]);
}

#[test]
fn handler_error_reaches_a_later_catch() {
    let event_loop = EventLoop::new();
    let caught = Rc::new(RefCell::new(None));

    let c = caught.clone();
    Promise::resolve_with(&event_loop, Value::Smi(1))
        .then(
            Some(Function::new(|_| Err(JsError::internal("boom")))),
            None,
        )
        .catch(Function::new(move |reason| {
            *c.borrow_mut() = Some(reason);
            Ok(Resolution::Value(Value::Undefined))
        }));

    event_loop.run_until_idle().unwrap();
    assert_eq!(
        *caught.borrow(),
        Some(Value::from(JsError::internal("boom")))
    );
}

#[test]
fn rejection_skips_fulfillment_handlers_until_a_catch() {
    let event_loop = EventLoop::new();
    let log: OrderLog = Rc::new(RefCell::new(Vec::new()));

    let skipped = log.clone();
    let caught = log.clone();
    Promise::reject_with(&event_loop, Value::String("down".to_string()))
        .then(
            Some(Function::new(move |_| {
                skipped.borrow_mut().push("skipped".to_string());
                Ok(Resolution::Value(Value::Undefined))
            })),
            None,
        )
        .catch(Function::new(move |reason| {
            caught.borrow_mut().push(format!("caught({})", reason));
            Ok(Resolution::Value(Value::Undefined))
        }));

    event_loop.run_until_idle().unwrap();
    assert_eq!(*log.borrow(), vec!["caught(down)"]);
}

#[test]
fn handlers_attached_after_settlement_still_run_async() {
    let event_loop = EventLoop::new();
    let log: OrderLog = Rc::new(RefCell::new(Vec::new()));

    let promise = Promise::resolve_with(&event_loop, Value::Smi(1));
    event_loop.run_until_idle().unwrap();

    let record = log.clone();
    promise.then(
        Some(Function::new(move |_| {
            record.borrow_mut().push("late".to_string());
            Ok(Resolution::Value(Value::Undefined))
        })),
        None,
    );
    assert!(log.borrow().is_empty());

    event_loop.run_until_idle().unwrap();
    assert_eq!(*log.borrow(), vec!["late"]);
}

#[test]
fn promise_settled_inside_a_microtask_chains_within_the_same_drain() {
    let event_loop = EventLoop::new();
    let log: OrderLog = Rc::new(RefCell::new(Vec::new()));

    let (promise, resolver) = Promise::pending(&event_loop);
    let record = log.clone();
    promise.then(
        Some(Function::new(move |value| {
            record.borrow_mut().push(format!("reaction({})", value));
            Ok(Resolution::Value(value))
        })),
        None,
    );

    let settle = log.clone();
    event_loop.enqueue_microtask(MicroTask::new(move || {
        settle.borrow_mut().push("settle".to_string());
        resolver.resolve(Value::Smi(3));
        Ok(Value::Undefined)
    }));
    log_task(&event_loop, &log, "task", 0);

    event_loop.run_until_idle().unwrap();
    assert_eq!(*log.borrow(), vec!["settle", "reaction(3)", "task"]);
}

#[test]
fn stepping_observes_one_job_at_a_time() {
    let event_loop = EventLoop::new();
    let log: OrderLog = Rc::new(RefCell::new(Vec::new()));

    log_microtask(&event_loop, &log, "M1");
    log_task(&event_loop, &log, "T1", 0);
    log_microtask(&event_loop, &log, "M2");

    event_loop.step_microtask().unwrap();
    assert_eq!(*log.borrow(), vec!["M1"]);
    event_loop.step_microtask().unwrap();
    assert_eq!(*log.borrow(), vec!["M1", "M2"]);
    event_loop.step_macrotask().unwrap();
    assert_eq!(*log.borrow(), vec!["M1", "M2", "T1"]);
}

#[test]
fn identical_schedules_replay_identically() {
    fn run_once() -> Vec<String> {
        let event_loop = EventLoop::new();
        let log: OrderLog = Rc::new(RefCell::new(Vec::new()));

        log_task(&event_loop, &log, "t-20", 20);
        log_task(&event_loop, &log, "t-0", 0);
        log_microtask(&event_loop, &log, "m");

        let record = log.clone();
        Promise::resolve_with(&event_loop, Value::Smi(1)).then(
            Some(Function::new(move |value| {
                record.borrow_mut().push("p".to_string());
                Ok(Resolution::Value(value))
            })),
            None,
        );

        event_loop.run_until_idle().unwrap();
        let entries = log.borrow().clone();
        entries
    }

    assert_eq!(run_once(), run_once());
    assert_eq!(run_once(), vec!["m", "p", "t-0", "t-20"]);
}
