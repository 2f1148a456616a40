//! # tidelog testkit
//!
//! Test utilities for tidelog.
//!
//! This crate provides:
//! - Fixtures: temp-directory logs with close/crash/reopen helpers
//! - Crash-scenario helpers that damage raw files the way power cuts do
//! - Property-based generators using proptest
//! - Cross-crate integration tests for the full engine
//!
//! ## Usage
//!
//! ```rust
//! use tidelog_testkit::prelude::*;
//!
//! with_temp_log(nosync_config(), |log| {
//!     log.write(b"hello").unwrap();
//!     assert_eq!(log.index().size(), 1);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;
pub mod integration;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;
pub use integration::*;
