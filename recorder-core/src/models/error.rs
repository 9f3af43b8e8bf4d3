use thiserror::Error;

/// Errors that can occur while negotiating, capturing, or writing a recording.
///
/// Each payload names the failed operation; platform backends append the
/// underlying status code.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecorderError {
    #[error("device query failed: {0}")]
    DeviceQueryFailed(String),

    #[error("format resolution failed: {0}")]
    FormatResolutionFailed(String),

    #[error("property query failed: {0}")]
    PropertyQueryFailed(String),

    #[error("queue creation failed: {0}")]
    QueueCreationFailed(String),

    #[error("queue control failed: {0}")]
    QueueControlFailed(String),

    #[error("buffer allocation failed: {0}")]
    BufferAllocationFailed(String),

    #[error("file creation failed: {0}")]
    FileCreationFailed(String),

    #[error("packet write failed: {0}")]
    PacketWriteFailed(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("invalid state: {0}")]
    InvalidState(String),
}
