//! Default input device queries and format completion over cpal.

use cpal::traits::{DeviceTrait, HostTrait};

use recorder_core::models::error::RecorderError;
use recorder_core::models::format::StreamFormat;
use recorder_core::traits::capture_queue::{CaptureBackend, SharedInputHandler};
use recorder_core::traits::device::{DeviceId, DeviceQuery, FormatResolver};

use crate::input_queue::CpalInputQueue;

/// Bit depth of everything this backend records.
pub const BITS_PER_CHANNEL: u32 = 16;

/// cpal has no numeric device ids; the default input device is always 0.
const DEFAULT_DEVICE: DeviceId = DeviceId(0);

/// The host's default audio system, recording linear PCM.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }
}

/// The host's current default input device.
pub(crate) fn default_input() -> Result<cpal::Device, RecorderError> {
    cpal::default_host()
        .default_input_device()
        .ok_or_else(|| RecorderError::DeviceQueryFailed("no default input device".into()))
}

/// The default input device with its preferred stream configuration.
pub(crate) fn default_input_config() -> Result<(cpal::Device, cpal::SupportedStreamConfig), RecorderError> {
    let device = default_input()?;
    let config = device
        .default_input_config()
        .map_err(|e| RecorderError::DeviceQueryFailed(format!("default input config: {}", e)))?;
    Ok((device, config))
}

impl DeviceQuery for CpalBackend {
    fn default_input_device(&self) -> Result<DeviceId, RecorderError> {
        let device = default_input()?;
        if let Ok(name) = device.name() {
            log::debug!("default input device: {}", name);
        }
        Ok(DEFAULT_DEVICE)
    }

    fn nominal_sample_rate(&self, device: DeviceId) -> Result<f64, RecorderError> {
        if device != DEFAULT_DEVICE {
            return Err(RecorderError::DeviceQueryFailed(format!("unknown device {}", device.0)));
        }
        let (_, config) = default_input_config()?;
        Ok(f64::from(config.sample_rate().0))
    }
}

impl FormatResolver for CpalBackend {
    fn complete_format(&self, partial: &StreamFormat) -> Result<StreamFormat, RecorderError> {
        if !partial.is_linear_pcm() {
            return Err(RecorderError::FormatResolutionFailed(format!(
                "no {} encoder available; record linear PCM instead",
                partial.format_id
            )));
        }
        Ok(StreamFormat::linear_pcm(
            partial.sample_rate,
            partial.channels_per_frame,
            BITS_PER_CHANNEL,
        ))
    }
}

impl CaptureBackend for CpalBackend {
    type Queue = CpalInputQueue;

    fn new_input(
        &self,
        format: &StreamFormat,
        handler: SharedInputHandler,
    ) -> Result<CpalInputQueue, RecorderError> {
        CpalInputQueue::new(format, handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recorder_core::models::format::FormatId;

    #[test]
    fn completes_linear_pcm() {
        let partial = StreamFormat::partial(FormatId::LINEAR_PCM, 48000.0, 2);
        let format = CpalBackend::new().complete_format(&partial).unwrap();

        assert_eq!(format.bytes_per_frame, 4);
        assert_eq!(format.frames_per_packet, 1);
        assert_eq!(format.bits_per_channel, 16);
    }

    #[test]
    fn rejects_compressed_formats() {
        let partial = StreamFormat::partial(FormatId::MPEG4_AAC, 48000.0, 2);
        let err = CpalBackend::new().complete_format(&partial).unwrap_err();
        assert!(matches!(err, RecorderError::FormatResolutionFailed(_)));
    }
}
