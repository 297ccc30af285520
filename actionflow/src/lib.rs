//! # Actionflow
//!
//! Composable remote actions with checkpointed retry.
//!
//! Actionflow chains independently implemented remote operations into a
//! single unit of work with:
//!
//! - **Composition**: `first_do(..).then(..)` builds a strictly sequential chain
//! - **Checkpoints**: `resume()` restarts after the last checkpoint instead of from scratch
//! - **Dual entry points**: blocking `sync()` and callback-based `call_async()`
//! - **Silent cancellation**: no callback fires once a call is cancelled
//! - **Staged upload**: [`files::SendFile`] requests a destination, transfers bytes and publishes
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use actionflow::prelude::*;
//!
//! let upload = SendFile::builder(ports, ExecutionPool::try_current().unwrap())
//!     .channel("room1")
//!     .file_name("cat.png")
//!     .byte_source(ByteSource::from(bytes))
//!     .ttl(24);
//!
//! let result = upload.sync()?;
//! println!("published at {}", result.timetoken);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod action;
pub mod cancellation;
pub mod core;
pub mod errors;
pub mod files;
pub mod observability;
pub mod retry;
pub mod runtime;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::action::{
        first_do, ready, ComposableRemoteAction, FnRemoteAction, MappingRemoteAction,
        RemoteAction, RemoteActionExt, RemoteCall, SharedAction,
    };
    pub use crate::cancellation::CancellationToken;
    pub use crate::core::{ActionStatus, StatusCategory};
    pub use crate::errors::{ActionResult, RemoteError};
    pub use crate::files::{
        ByteSource, ByteSourceStep, ChannelStep, DestinationProvider, FileDescriptor,
        FileNameStep, PublishAck, PublishFileMessage, Publisher, SendFile, TransferExecutor,
        TransferRequest, UploadDestination, UploadPorts, UploadResult,
    };
    pub use crate::observability::init_tracing;
    pub use crate::retry::{retry_with_backoff, with_retry, RetryConfig};
    pub use crate::runtime::ExecutionPool;
}
