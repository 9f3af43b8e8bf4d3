//! Rendering of Core Audio `OSStatus` codes.
//!
//! Most Core Audio errors are four printable characters packed big-endian
//! (`'fmt?'`, `'!dat'`); the rest are plain negative integers (`-50`).

use recorder_core::models::error::RecorderError;

/// Format `status` as a quoted four-character code when every byte is
/// printable, otherwise as a decimal integer.
pub fn describe_status(status: i32) -> String {
    let code = status.to_be_bytes();
    if code.iter().all(|b| (0x20..=0x7e).contains(b)) {
        format!("'{}'", String::from_utf8_lossy(&code))
    } else {
        status.to_string()
    }
}

/// Map a non-zero `status` to `kind`, naming the failed operation.
pub fn check(
    status: i32,
    operation: &str,
    kind: fn(String) -> RecorderError,
) -> Result<(), RecorderError> {
    if status == 0 {
        Ok(())
    } else {
        Err(kind(format!("{} ({})", operation, describe_status(status))))
    }
}
