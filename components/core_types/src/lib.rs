//! Core value types and error handling for the async runtime.
//!
//! This crate provides the foundational types shared by the runtime
//! components: the dynamic value representation that flows through
//! promises, and the error types carried by rejections.
//!
//! # Overview
//!
//! - [`Value`] - Tagged representation of runtime values
//! - [`JsError`] - Runtime errors, including aggregate errors
//! - [`ErrorKind`] - Types of runtime errors
//! - [`SettledOutcome`] - Per-input settlement record for `all_settled`
//!
//! # Examples
//!
//! ```
//! use core_types::{ErrorKind, JsError, Value};
//!
//! // Create runtime values
//! let num = Value::Smi(42);
//! assert!(num.is_truthy());
//! assert_eq!(num.type_of(), "number");
//!
//! // Create an error and carry it as a value
//! let error = JsError::new(ErrorKind::TypeError, "undefined is not a function");
//! let reason = Value::from(error);
//! assert_eq!(reason.type_of(), "object");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod value;

pub use error::{ErrorKind, JsError, SettledOutcome};
pub use value::Value;
