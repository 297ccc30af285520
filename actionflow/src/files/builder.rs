//! Required-parameter builder for [`SendFile`].
//!
//! Each step exposes exactly one method and returns the next step, so the
//! channel, file name and byte source are always supplied, in that order,
//! before a [`SendFile`] exists.
//!
//! ```rust,compile_fail
//! use actionflow::files::{ByteSource, ByteSourceStep, ChannelStep, SendFile};
//! # fn demo(ports: actionflow::files::UploadPorts, pool: actionflow::runtime::ExecutionPool) {
//! // Skipping the file name does not compile.
//! let upload = SendFile::builder(ports, pool)
//!     .channel("room1")
//!     .byte_source(ByteSource::from(vec![0_u8; 10]));
//! # }
//! ```

use super::models::ByteSource;
use super::ports::UploadPorts;
use super::send_file::SendFile;
use crate::runtime::ExecutionPool;

/// Step that needs the channel.
pub trait ChannelStep {
    /// The step returned once the channel is set.
    type Next;

    /// Sets the channel the file is announced on.
    fn channel(self, channel: impl Into<String>) -> Self::Next;
}

/// Step that needs the file name.
pub trait FileNameStep {
    /// The step returned once the file name is set.
    type Next;

    /// Sets the name the file is stored under.
    fn file_name(self, file_name: impl Into<String>) -> Self::Next;
}

/// Step that needs the byte source.
pub trait ByteSourceStep {
    /// The value returned once the byte source is set.
    type Next;

    /// Sets the bytes to upload. `None` is accepted here and rejected when
    /// the upload runs.
    fn byte_source(self, source: impl Into<Option<ByteSource>>) -> Self::Next;
}

/// Entry point returned by [`SendFile::builder`].
#[derive(Debug)]
pub struct SendFileBuilder {
    ports: UploadPorts,
    pool: ExecutionPool,
}

impl SendFileBuilder {
    pub(crate) fn new(ports: UploadPorts, pool: ExecutionPool) -> Self {
        Self { ports, pool }
    }
}

impl ChannelStep for SendFileBuilder {
    type Next = NeedsFileName;

    fn channel(self, channel: impl Into<String>) -> NeedsFileName {
        NeedsFileName {
            ports: self.ports,
            pool: self.pool,
            channel: channel.into(),
        }
    }
}

/// Builder state holding the channel.
#[derive(Debug)]
pub struct NeedsFileName {
    ports: UploadPorts,
    pool: ExecutionPool,
    channel: String,
}

impl FileNameStep for NeedsFileName {
    type Next = NeedsByteSource;

    fn file_name(self, file_name: impl Into<String>) -> NeedsByteSource {
        NeedsByteSource {
            ports: self.ports,
            pool: self.pool,
            channel: self.channel,
            file_name: file_name.into(),
        }
    }
}

/// Builder state holding the channel and file name.
#[derive(Debug)]
pub struct NeedsByteSource {
    ports: UploadPorts,
    pool: ExecutionPool,
    channel: String,
    file_name: String,
}

impl ByteSourceStep for NeedsByteSource {
    type Next = SendFile;

    fn byte_source(self, source: impl Into<Option<ByteSource>>) -> SendFile {
        SendFile::new(
            self.ports,
            self.pool,
            self.channel,
            self.file_name,
            source.into(),
        )
    }
}
