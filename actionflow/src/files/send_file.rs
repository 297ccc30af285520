//! Staged file upload: destination request, transfer, publish.

use super::builder::SendFileBuilder;
use super::models::{
    ByteSource, PublishAck, PublishFileMessage, TransferRequest, UploadDestination, UploadResult,
    UPLOAD_SUCCESS_STATUS,
};
use super::ports::{Publisher, TransferExecutor, UploadPorts};
use crate::action::{
    first_do, FnRemoteAction, MappingRemoteAction, RemoteAction, RemoteActionExt, RemoteCall,
    SharedAction,
};
use crate::core::ActionStatus;
use crate::errors::{ActionResult, RemoteError};
use crate::runtime::ExecutionPool;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

/// Stage tag of the destination request.
pub const DESTINATION_STAGE: &str = "destination";
/// Stage tag of the byte transfer.
pub const TRANSFER_STAGE: &str = "transfer";
/// Stage tag of the file announcement.
pub const PUBLISH_STAGE: &str = "publish";

const PIPELINE_NAME: &str = "send_file";

/// Optional settings read when the stage that needs them is built.
#[derive(Debug, Clone, Default)]
struct SendFileOptions {
    message: Option<serde_json::Value>,
    meta: Option<serde_json::Value>,
    ttl: Option<u32>,
    should_store: Option<bool>,
    cipher_key: Option<String>,
}

/// Uploads a file and announces it on a channel.
///
/// Built with [`SendFile::builder`]. The upload requests a destination,
/// transfers the bytes, then publishes a file message. A checkpoint sits
/// after the destination request, so [`SendFile::retry`] never asks for a
/// second destination once one was issued.
pub struct SendFile {
    channel: String,
    file_name: String,
    options: Arc<RwLock<SendFileOptions>>,
    call: RemoteCall<UploadResult>,
}

impl SendFile {
    /// Starts the required-parameter builder.
    #[must_use]
    pub fn builder(ports: UploadPorts, pool: ExecutionPool) -> SendFileBuilder {
        SendFileBuilder::new(ports, pool)
    }

    pub(crate) fn new(
        ports: UploadPorts,
        pool: ExecutionPool,
        channel: String,
        file_name: String,
        source: Option<ByteSource>,
    ) -> Self {
        let options = Arc::new(RwLock::new(SendFileOptions::default()));
        let has_source = source.is_some();
        let pipeline = upload_pipeline(&ports, &channel, &file_name, source, &options);
        let action = ValidatedUpload {
            channel: channel.clone(),
            file_name: file_name.clone(),
            has_source,
            pipeline,
        };

        Self {
            channel,
            file_name,
            options,
            call: RemoteCall::new(Arc::new(action), pool),
        }
    }

    /// Sets the payload published with the file.
    #[must_use]
    pub fn message(self, message: serde_json::Value) -> Self {
        self.options.write().message = Some(message);
        self
    }

    /// Sets the metadata published with the file.
    #[must_use]
    pub fn meta(self, meta: serde_json::Value) -> Self {
        self.options.write().meta = Some(meta);
        self
    }

    /// Sets the time-to-live of the file message.
    #[must_use]
    pub fn ttl(self, ttl: u32) -> Self {
        self.options.write().ttl = Some(ttl);
        self
    }

    /// Sets whether the file message is stored in history.
    #[must_use]
    pub fn should_store(self, should_store: bool) -> Self {
        self.options.write().should_store = Some(should_store);
        self
    }

    /// Sets the key handed to the transfer executor for encryption.
    #[must_use]
    pub fn cipher_key(self, cipher_key: impl Into<String>) -> Self {
        self.options.write().cipher_key = Some(cipher_key.into());
        self
    }

    /// Returns the channel.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Returns the file name.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Uploads the file, blocking the calling thread.
    pub fn sync(&self) -> ActionResult<UploadResult> {
        self.call.sync()
    }

    /// Uploads the file on the execution pool and reports to `callback`.
    ///
    /// Validation failures are reported through the callback as well.
    pub fn call_async<F>(&self, callback: F)
    where
        F: Fn(Result<UploadResult, ActionStatus>) + Send + Sync + 'static,
    {
        self.call.call_async(callback);
    }

    /// Resumes a failed asynchronous upload after the destination request.
    pub fn retry(&self) {
        self.call.retry();
    }

    /// Resumes a failed upload after the destination request, blocking.
    pub fn retry_sync(&self) -> ActionResult<UploadResult> {
        self.call.retry_sync()
    }

    /// Abandons the upload without reporting to any callback.
    pub fn silent_cancel(&self) {
        self.call.silent_cancel();
    }
}

impl std::fmt::Debug for SendFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendFile")
            .field("channel", &self.channel)
            .field("file_name", &self.file_name)
            .field("options", &*self.options.read())
            .field("call", &self.call)
            .finish()
    }
}

/// Checks the required arguments before every run of the pipeline.
struct ValidatedUpload {
    channel: String,
    file_name: String,
    has_source: bool,
    pipeline: SharedAction<UploadResult>,
}

impl ValidatedUpload {
    fn validate(&self) -> ActionResult<()> {
        if self.channel.is_empty() {
            return Err(RemoteError::ChannelMissing);
        }
        if !self.has_source {
            return Err(RemoteError::ByteSourceMissing);
        }
        if self.file_name.is_empty() {
            return Err(RemoteError::FileNameMissing);
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteAction<UploadResult> for ValidatedUpload {
    fn name(&self) -> &str {
        PIPELINE_NAME
    }

    async fn execute(&self) -> ActionResult<UploadResult> {
        self.validate()?;
        info!(channel = %self.channel, file_name = %self.file_name, "uploading file");
        self.pipeline.execute().await
    }

    async fn resume(&self) -> ActionResult<UploadResult> {
        self.validate()?;
        info!(channel = %self.channel, file_name = %self.file_name, "resuming upload");
        self.pipeline.resume().await
    }

    fn silent_cancel(&self) {
        self.pipeline.silent_cancel();
    }
}

fn upload_pipeline(
    ports: &UploadPorts,
    channel: &str,
    file_name: &str,
    source: Option<ByteSource>,
    options: &Arc<RwLock<SendFileOptions>>,
) -> SharedAction<UploadResult> {
    let request_destination = {
        let destinations = ports.destinations.clone();
        let channel = channel.to_string();
        let file_name = file_name.to_string();
        FnRemoteAction::new(DESTINATION_STAGE, move || {
            let destinations = destinations.clone();
            let channel = channel.clone();
            let file_name = file_name.clone();
            async move { destinations.request_destination(&channel, &file_name).await }
        })
    };

    let transfer = {
        let transfers = ports.transfers.clone();
        let file_name = file_name.to_string();
        let options = options.clone();
        move |destination: UploadDestination| {
            transfer_stage(
                transfers.clone(),
                file_name.clone(),
                source.clone(),
                options.clone(),
                destination,
            )
        }
    };

    let publish = {
        let publisher = ports.publisher.clone();
        let channel = channel.to_string();
        let options = options.clone();
        move |destination: UploadDestination| {
            let options = options.read().clone();
            let message = PublishFileMessage {
                channel: channel.clone(),
                file: destination.file.clone(),
                message: options.message,
                meta: options.meta,
                ttl: options.ttl,
                should_store: options.should_store,
            };
            publish_stage(publisher.clone(), message, destination)
        }
    };

    let chain = first_do(request_destination.shared())
        .then(transfer)
        .checkpoint()
        .then(publish)
        .named(PIPELINE_NAME);

    MappingRemoteAction::map(chain.shared(), |(destination, ack): (UploadDestination, PublishAck)| {
        UploadResult {
            timetoken: ack.timetoken,
            status: UPLOAD_SUCCESS_STATUS,
            file: destination.file,
        }
    })
    .shared()
}

/// Transfers the bytes and hands the destination on to the next stage.
///
/// The cipher key is read on every run, so a resumed transfer sees the
/// latest setting.
fn transfer_stage(
    transfers: Arc<dyn TransferExecutor>,
    file_name: String,
    source: Option<ByteSource>,
    options: Arc<RwLock<SendFileOptions>>,
    destination: UploadDestination,
) -> SharedAction<UploadDestination> {
    let carried = destination.clone();
    FnRemoteAction::new(TRANSFER_STAGE, move || {
        let transfers = transfers.clone();
        let cipher_key = options.read().cipher_key.clone();
        let request = source.clone().map(|source| TransferRequest {
            file_name: file_name.clone(),
            source,
            cipher_key,
            destination: destination.clone(),
        });
        async move {
            let request = request.ok_or(RemoteError::ByteSourceMissing)?;
            transfers.transfer(request).await
        }
    })
    .map(move |()| carried.clone())
    .shared()
}

/// Publishes the file message, keeping the destination alongside the ack.
fn publish_stage(
    publisher: Arc<dyn Publisher>,
    message: PublishFileMessage,
    destination: UploadDestination,
) -> SharedAction<(UploadDestination, PublishAck)> {
    FnRemoteAction::new(PUBLISH_STAGE, move || {
        let publisher = publisher.clone();
        let message = message.clone();
        async move { publisher.publish_file_message(message).await }
    })
    .map(move |ack| (destination.clone(), ack))
    .shared()
}
