//! Testing utilities for remote actions.
//!
//! This module provides:
//! - Recording mocks for the upload collaborators
//! - A callback recorder for asynchronous calls
//! - Runtime and destination fixtures

mod fixtures;
mod mocks;

pub use fixtures::{sample_destination, test_runtime, CallbackRecorder, UploadHarness};
pub use mocks::{MockDestinationProvider, MockPublisher, MockTransferExecutor};
