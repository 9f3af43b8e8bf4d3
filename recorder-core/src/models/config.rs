use std::path::PathBuf;

use super::format::FormatId;

/// Number of capture buffers kept in flight.
pub const DEFAULT_BUFFER_COUNT: usize = 3;

/// Audio duration each capture buffer must hold, in seconds.
pub const DEFAULT_BUFFER_DURATION_SECS: f32 = 0.5;

/// Configuration for a recording session.
#[derive(Debug, Clone, PartialEq)]
pub struct RecorderConfiguration {
    /// Path of the CAF file to create (default: `output.caf`).
    pub output_path: PathBuf,

    /// Codec to record with (default: AAC).
    pub format_id: FormatId,

    /// Number of channels to record (default: 2).
    pub channels: u32,

    /// Size of the capture buffer pool (default: 3).
    pub buffer_count: usize,

    /// Seconds of audio per capture buffer (default: 0.5).
    pub buffer_duration_secs: f32,

    /// Overwrite an existing output file (default: true).
    pub erase_existing: bool,

    /// Write `<output>.metadata.json` when the recording is disposed (default: false).
    pub write_metadata_sidecar: bool,
}

impl RecorderConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.format_id.is_unset() {
            return Err("format id must be set".into());
        }
        if !(1..=8).contains(&self.channels) {
            return Err(format!("unsupported channel count: {}", self.channels));
        }
        if self.buffer_count == 0 {
            return Err("buffer count must be at least 1".into());
        }
        if self.buffer_duration_secs.is_nan() || self.buffer_duration_secs <= 0.0 {
            return Err(format!(
                "buffer duration must be positive: {}",
                self.buffer_duration_secs
            ));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err("output path must not be empty".into());
        }
        Ok(())
    }
}

impl Default for RecorderConfiguration {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("output.caf"),
            format_id: FormatId::MPEG4_AAC,
            channels: 2,
            buffer_count: DEFAULT_BUFFER_COUNT,
            buffer_duration_secs: DEFAULT_BUFFER_DURATION_SECS,
            erase_existing: true,
            write_metadata_sidecar: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = RecorderConfiguration::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.buffer_count, 3);
        assert_eq!(config.format_id, FormatId::MPEG4_AAC);
    }

    #[test]
    fn rejects_bad_values() {
        let zero_buffers = RecorderConfiguration {
            buffer_count: 0,
            ..Default::default()
        };
        assert!(zero_buffers.validate().is_err());

        let no_duration = RecorderConfiguration {
            buffer_duration_secs: 0.0,
            ..Default::default()
        };
        assert!(no_duration.validate().is_err());

        let nan_duration = RecorderConfiguration {
            buffer_duration_secs: f32::NAN,
            ..Default::default()
        };
        assert!(nan_duration.validate().is_err());

        let no_channels = RecorderConfiguration {
            channels: 0,
            ..Default::default()
        };
        assert!(no_channels.validate().is_err());

        let no_codec = RecorderConfiguration {
            format_id: FormatId(0),
            ..Default::default()
        };
        assert!(no_codec.validate().is_err());
    }
}
