//! Collaborators the upload pipeline depends on.
//!
//! The pipeline never talks to the network itself; each stage calls one of
//! these ports. [`UploadPorts`] bundles them so a single value can be
//! injected into the builder.

use super::models::{PublishAck, PublishFileMessage, TransferRequest, UploadDestination};
use async_trait::async_trait;
use std::sync::Arc;

/// Issues upload destinations and credentials.
#[async_trait]
pub trait DestinationProvider: Send + Sync {
    /// Requests a destination for `file_name` on `channel`.
    async fn request_destination(
        &self,
        channel: &str,
        file_name: &str,
    ) -> anyhow::Result<UploadDestination>;
}

/// Moves file bytes to a destination.
#[async_trait]
pub trait TransferExecutor: Send + Sync {
    /// Transfers the bytes described by `request`.
    async fn transfer(&self, request: TransferRequest) -> anyhow::Result<()>;
}

/// Announces uploaded files on a channel.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes `message` and returns its acknowledgment.
    async fn publish_file_message(&self, message: PublishFileMessage) -> anyhow::Result<PublishAck>;
}

/// The ports used by the upload pipeline.
#[derive(Clone)]
pub struct UploadPorts {
    /// Destination provider for the first stage.
    pub destinations: Arc<dyn DestinationProvider>,
    /// Transfer executor for the second stage.
    pub transfers: Arc<dyn TransferExecutor>,
    /// Publisher for the third stage.
    pub publisher: Arc<dyn Publisher>,
}

impl UploadPorts {
    /// Creates a new ports bundle.
    #[must_use]
    pub fn new(
        destinations: Arc<dyn DestinationProvider>,
        transfers: Arc<dyn TransferExecutor>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            destinations,
            transfers,
            publisher,
        }
    }
}

impl std::fmt::Debug for UploadPorts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadPorts").finish_non_exhaustive()
    }
}
