//! Error types for the async runtime.
//!
//! This module provides the error type carried by rejected promises and
//! returned by failing host callbacks, along with the settlement record
//! type reported by `all_settled`.

use crate::Value;
use std::fmt;

/// The kind of runtime error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation applied to a value of the wrong kind (e.g. a promise
    /// resolved with itself)
    TypeError,
    /// Value out of allowed range
    RangeError,
    /// Every input of a combinator rejected; child reasons are attached
    AggregateError,
    /// Internal runtime error
    InternalError,
}

/// A runtime error with a message and optional child reasons.
///
/// This struct represents a failure that can reject a promise. For
/// `AggregateError` the individual rejection reasons are carried in
/// `errors`, in original input order.
///
/// # Examples
///
/// ```
/// use core_types::{ErrorKind, JsError};
///
/// let error = JsError::new(ErrorKind::TypeError, "not a function");
/// assert_eq!(error.message, "not a function");
/// assert!(error.errors.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct JsError {
    /// The type of error
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
    /// Child reasons (AggregateError only, in input order)
    pub errors: Vec<Value>,
}

impl JsError {
    /// Creates a new error with no child reasons.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            errors: Vec::new(),
        }
    }

    /// Creates a `TypeError` with the given message.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, message)
    }

    /// Creates an `InternalError` with the given message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, message)
    }

    /// Creates an `AggregateError` from individual rejection reasons.
    ///
    /// The reasons keep their original input order.
    pub fn aggregate(errors: Vec<Value>) -> Self {
        Self {
            kind: ErrorKind::AggregateError,
            message: "All promises were rejected".to_string(),
            errors,
        }
    }
}

impl fmt::Display for JsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.kind {
            ErrorKind::TypeError => "TypeError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::AggregateError => "AggregateError",
            ErrorKind::InternalError => "InternalError",
        };
        write!(f, "{}: {}", name, self.message)
    }
}

impl std::error::Error for JsError {}

/// The recorded outcome of one settled promise.
///
/// `all_settled` resolves with an array of these records, index-aligned
/// with its inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum SettledOutcome {
    /// The input fulfilled with `value`
    Fulfilled {
        /// The fulfillment value
        value: Value,
    },
    /// The input rejected with `reason`
    Rejected {
        /// The rejection reason
        reason: Value,
    },
}

impl SettledOutcome {
    /// Returns the status string for this record ("fulfilled" or "rejected").
    pub fn status(&self) -> &'static str {
        match self {
            SettledOutcome::Fulfilled { .. } => "fulfilled",
            SettledOutcome::Rejected { .. } => "rejected",
        }
    }
}
