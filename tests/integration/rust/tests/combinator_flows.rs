//! Integration tests for combinators over mixed input kinds.
//!
//! Inputs here mix plain values, already-settled promises, promises fed
//! by timers, and raw thenable capabilities, so settle order and input
//! order genuinely diverge.

use async_runtime::{EventLoop, Promise, PromiseState, Resolution, Task, Thenable};
use core_types::{ErrorKind, SettledOutcome, Value};

fn fulfill_later(event_loop: &EventLoop, value: Value, delay_ms: u64) -> Promise {
    let (promise, resolver) = Promise::pending(event_loop);
    event_loop.enqueue_task(
        Task::new(move || {
            resolver.resolve(value);
            Ok(Value::Undefined)
        }),
        delay_ms,
    );
    promise
}

fn reject_later(event_loop: &EventLoop, reason: Value, delay_ms: u64) -> Promise {
    let (promise, resolver) = Promise::pending(event_loop);
    event_loop.enqueue_task(
        Task::new(move || {
            resolver.reject(reason);
            Ok(Value::Undefined)
        }),
        delay_ms,
    );
    promise
}

#[test]
fn all_rejects_on_first_rejection_and_discards_fulfilled_values() {
    let event_loop = EventLoop::new();
    let result = Promise::all(
        &event_loop,
        vec![
            Resolution::from(Value::Smi(1)),
            Resolution::from(Promise::reject_with(
                &event_loop,
                Value::String("e".to_string()),
            )),
            Resolution::from(Value::Smi(3)),
        ],
    );

    event_loop.run_until_idle().unwrap();
    assert_eq!(result.state(), PromiseState::Rejected);
    assert_eq!(result.reason(), Some(Value::String("e".to_string())));
    assert!(result.value().is_none());
}

#[test]
fn all_with_mixed_delays_keeps_input_order() {
    let event_loop = EventLoop::new();
    let result = Promise::all(
        &event_loop,
        vec![
            Resolution::from(fulfill_later(&event_loop, Value::Smi(1), 40)),
            Resolution::from(Value::Smi(2)),
            Resolution::from(Thenable::new(|resolver| resolver.resolve(Value::Smi(3)))),
            Resolution::from(fulfill_later(&event_loop, Value::Smi(4), 10)),
        ],
    );

    event_loop.run_until_idle().unwrap();
    assert_eq!(
        result.value(),
        Some(Value::Array(vec![
            Value::Smi(1),
            Value::Smi(2),
            Value::Smi(3),
            Value::Smi(4),
        ]))
    );
}

#[test]
fn all_settled_reports_every_input_in_order() {
    let event_loop = EventLoop::new();
    let result = Promise::all_settled(
        &event_loop,
        vec![
            Resolution::from(Value::Smi(1)),
            Resolution::from(Promise::reject_with(
                &event_loop,
                Value::String("e".to_string()),
            )),
            Resolution::from(Value::Smi(3)),
        ],
    );

    event_loop.run_until_idle().unwrap();
    let records = match result.value() {
        Some(Value::Array(records)) => records,
        other => panic!("expected array of records, got {:?}", other),
    };
    assert_eq!(records.len(), 3);
    assert_eq!(
        records[0],
        Value::Settled(Box::new(SettledOutcome::Fulfilled {
            value: Value::Smi(1)
        }))
    );
    assert_eq!(
        records[1],
        Value::Settled(Box::new(SettledOutcome::Rejected {
            reason: Value::String("e".to_string())
        }))
    );
    assert_eq!(
        records[2],
        Value::Settled(Box::new(SettledOutcome::Fulfilled {
            value: Value::Smi(3)
        }))
    );
}

#[test]
fn race_prefers_a_microtask_settle_over_any_timer_delay() {
    let event_loop = EventLoop::new();

    // Settles during the first microtask drain.
    let via_microtask = Promise::resolve_with(
        &event_loop,
        Thenable::new(|resolver| resolver.resolve(Value::Smi(1))),
    );
    let via_timer = fulfill_later(&event_loop, Value::Smi(2), 50);

    let result = Promise::race(
        &event_loop,
        vec![Resolution::from(via_microtask), Resolution::from(via_timer)],
    );

    event_loop.run_until_idle().unwrap();
    assert_eq!(result.value(), Some(Value::Smi(1)));
}

#[test]
fn any_recovers_from_early_rejections() {
    let event_loop = EventLoop::new();
    let result = Promise::any(
        &event_loop,
        vec![
            Resolution::from(Promise::reject_with(
                &event_loop,
                Value::String("nope".to_string()),
            )),
            Resolution::from(fulfill_later(&event_loop, Value::Smi(5), 30)),
        ],
    );

    event_loop.run_until_idle().unwrap();
    assert_eq!(result.value(), Some(Value::Smi(5)));
}

#[test]
fn any_aggregate_error_carries_reasons_in_input_order() {
    let event_loop = EventLoop::new();
    let result = Promise::any(
        &event_loop,
        vec![
            Resolution::from(reject_later(
                &event_loop,
                Value::String("slow".to_string()),
                30,
            )),
            Resolution::from(Promise::reject_with(
                &event_loop,
                Value::String("fast".to_string()),
            )),
        ],
    );

    event_loop.run_until_idle().unwrap();
    match result.reason() {
        Some(Value::Error(error)) => {
            assert!(matches!(error.kind, ErrorKind::AggregateError));
            assert_eq!(error.message, "All promises were rejected");
            assert_eq!(
                error.errors,
                vec![
                    Value::String("slow".to_string()),
                    Value::String("fast".to_string()),
                ]
            );
        }
        other => panic!("expected AggregateError, got {:?}", other),
    }
}

#[test]
fn nested_combinators_compose() {
    let event_loop = EventLoop::new();

    let inner = Promise::all(
        &event_loop,
        vec![
            Resolution::from(Value::Smi(1)),
            Resolution::from(fulfill_later(&event_loop, Value::Smi(2), 10)),
        ],
    );
    let result = Promise::race(
        &event_loop,
        vec![
            Resolution::from(inner),
            Resolution::from(fulfill_later(&event_loop, Value::Smi(0), 100)),
        ],
    );

    event_loop.run_until_idle().unwrap();
    assert_eq!(
        result.value(),
        Some(Value::Array(vec![Value::Smi(1), Value::Smi(2)]))
    );
}
