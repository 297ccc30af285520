//! Staged file upload built on composed remote actions.
//!
//! [`SendFile`] chains three remote steps (request a destination, transfer
//! the bytes, publish a file message) and maps the publish acknowledgment
//! into an [`UploadResult`].

mod builder;
mod models;
mod ports;
mod send_file;

pub use builder::{
    ByteSourceStep, ChannelStep, FileNameStep, NeedsByteSource, NeedsFileName, SendFileBuilder,
};
pub use models::{
    ByteSource, FileDescriptor, FormField, PublishAck, PublishFileMessage, TransferRequest,
    UploadDestination, UploadResult, UPLOAD_SUCCESS_STATUS,
};
pub use ports::{DestinationProvider, Publisher, TransferExecutor, UploadPorts};
pub use send_file::{SendFile, DESTINATION_STAGE, PUBLISH_STAGE, TRANSFER_STAGE};
