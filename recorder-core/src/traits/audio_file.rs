use std::path::Path;

use crate::models::error::RecorderError;
use crate::models::format::{PacketDescription, StreamFormat};

/// Options for [`AudioFileService::create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileFlags {
    /// Replace a file already at the path instead of failing.
    pub erase_existing: bool,
}

impl Default for FileFlags {
    fn default() -> Self {
        Self { erase_existing: true }
    }
}

/// An audio container file open for packet writes.
pub trait AudioFile: Send {
    /// Write `packet_count` packets from `data`, the first landing at
    /// `starting_packet`. Returns the number of packets written.
    fn write_packets(
        &mut self,
        data: &[u8],
        packet_descriptions: &[PacketDescription],
        starting_packet: i64,
        packet_count: u32,
    ) -> Result<u32, RecorderError>;

    /// Store the codec's magic cookie in the file.
    fn set_magic_cookie(&mut self, cookie: &[u8]) -> Result<(), RecorderError>;

    /// Finalize and close. Further calls fail.
    fn close(&mut self) -> Result<(), RecorderError>;

    fn path(&self) -> &Path;
}

/// Creates audio container files.
pub trait AudioFileService {
    type File: AudioFile + 'static;

    fn create(
        &self,
        path: &Path,
        format: &StreamFormat,
        flags: FileFlags,
    ) -> Result<Self::File, RecorderError>;
}
