//! Integration test suite for the deterministic async runtime
//!
//! This crate provides integration tests that verify the event loop and
//! the promise machinery work together correctly across component
//! boundaries.

/// Re-export components for test convenience
pub mod components {
    pub use async_runtime;
    pub use core_types;
}
