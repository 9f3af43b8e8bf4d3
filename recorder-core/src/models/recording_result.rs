use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::format::StreamFormat;

/// Result returned when a recording is disposed.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    pub file_path: PathBuf,
    pub packets_written: i64,
    pub frames_written: u64,
    pub duration_secs: f64,
    /// SHA-256 of the finished file, when it exists on disk.
    pub checksum: Option<String>,
    pub metadata: RecordingMetadata,
}

/// Metadata describing a finished recording.
///
/// Serializable for the JSON sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub created_at: String,
    pub file_path: String,
    pub codec: String,
    pub sample_rate: f64,
    pub channels: u32,
    pub packets_written: i64,
    pub duration_secs: f64,
    pub checksum: Option<String>,
    pub write_failures: u64,
}

impl RecordingMetadata {
    pub fn new(
        format: &StreamFormat,
        file_path: &str,
        diagnostics: &RecorderDiagnostics,
        duration_secs: f64,
        checksum: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            file_path: file_path.to_string(),
            codec: String::from_utf8_lossy(&format.format_id.fourcc()).into_owned(),
            sample_rate: format.sample_rate,
            channels: format.channels_per_frame,
            packets_written: diagnostics.packets_written,
            duration_secs,
            checksum,
            write_failures: diagnostics.write_failures,
        }
    }
}

/// Counters for debugging a capture session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecorderDiagnostics {
    pub callbacks: u64,
    pub packets_written: i64,
    pub frames_written: u64,
    pub bytes_written: u64,
    pub write_failures: u64,
    pub buffers_resubmitted: u64,
    pub buffers_released: u64,
    pub cookie_propagations: u32,
}

/// Seconds of audio represented by `frames` at `sample_rate`.
pub fn duration_for_frames(frames: u64, sample_rate: f64) -> f64 {
    if sample_rate > 0.0 {
        frames as f64 / sample_rate
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::format::FormatId;
    use approx::assert_relative_eq;

    #[test]
    fn duration_from_frames() {
        assert_relative_eq!(duration_for_frames(22050, 44100.0), 0.5);
        assert_relative_eq!(duration_for_frames(1024, 0.0), 0.0);
    }

    #[test]
    fn metadata_describes_format() {
        let format = StreamFormat::partial(FormatId::MPEG4_AAC, 48000.0, 2);
        let diagnostics = RecorderDiagnostics {
            packets_written: 300,
            write_failures: 1,
            ..Default::default()
        };
        let metadata = RecordingMetadata::new(&format, "output.caf", &diagnostics, 6.4, None);

        assert_eq!(metadata.codec, "aac ");
        assert_eq!(metadata.channels, 2);
        assert_eq!(metadata.packets_written, 300);
        assert_eq!(metadata.write_failures, 1);
        assert!(uuid::Uuid::parse_str(&metadata.id).is_ok());
    }
}
