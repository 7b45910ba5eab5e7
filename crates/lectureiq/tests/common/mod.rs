//! Shared test utilities for lectureiq integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated runs against a temp directory and an
//!   in-memory database
//! - Scripted fakes for the transcriber, language model, resource lookup,
//!   object store and progress reporter

pub mod fakes;
pub mod harness;

pub use fakes::*;
pub use harness::TestHarness;
