//! Core status types reported to asynchronous callers.
//!
//! An [`ActionStatus`] carries a failed action's error along with its
//! [`StatusCategory`] and, for stage failures, the stage tag.

mod status;

pub use status::{ActionStatus, StatusCategory};
