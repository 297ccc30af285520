//! Silent cancellation support.
//!
//! Cancelled actions stop before constructing any further stage and never
//! report to a callback.

mod token;

pub use token::CancellationToken;
