//! Format negotiation: ask the default input device for its rate, then let the
//! platform's format service complete the stream description.

use crate::models::error::RecorderError;
use crate::models::format::{FormatId, StreamFormat};
use crate::traits::device::{DeviceQuery, FormatResolver};

/// Nominal sample rate of the system's default input device.
pub fn query_default_input_sample_rate<D>(devices: &D) -> Result<f64, RecorderError>
where
    D: DeviceQuery + ?Sized,
{
    let device = devices.default_input_device()?;
    let sample_rate = devices.nominal_sample_rate(device)?;
    if !sample_rate.is_finite() || sample_rate <= 0.0 {
        return Err(RecorderError::DeviceQueryFailed(format!(
            "device {} reported nominal sample rate {}",
            device.0, sample_rate
        )));
    }
    log::debug!("default input device {} runs at {} Hz", device.0, sample_rate);
    Ok(sample_rate)
}

/// Fill in the fields the platform can infer from codec, rate, and channels.
///
/// Compressed codecs come back with zeros in bytes-per-frame and friends; that
/// is expected until an encoder instance exists.
pub fn complete_format<R>(resolver: &R, partial: &StreamFormat) -> Result<StreamFormat, RecorderError>
where
    R: FormatResolver + ?Sized,
{
    if partial.format_id.is_unset() {
        return Err(RecorderError::FormatResolutionFailed("format id is not set".into()));
    }
    if !partial.sample_rate.is_finite() || partial.sample_rate <= 0.0 {
        return Err(RecorderError::FormatResolutionFailed(format!(
            "invalid sample rate {}",
            partial.sample_rate
        )));
    }
    if partial.channels_per_frame == 0 {
        return Err(RecorderError::FormatResolutionFailed("channel count is zero".into()));
    }

    let completed = resolver.complete_format(partial)?;
    if completed.format_id != partial.format_id {
        return Err(RecorderError::FormatResolutionFailed(format!(
            "resolver changed codec from {} to {}",
            partial.format_id, completed.format_id
        )));
    }
    Ok(completed)
}

/// Negotiate a recording format for `format_id` with `channels` channels at
/// the default input device's native rate.
pub fn negotiate<B>(backend: &B, format_id: FormatId, channels: u32) -> Result<StreamFormat, RecorderError>
where
    B: DeviceQuery + FormatResolver + ?Sized,
{
    let sample_rate = query_default_input_sample_rate(backend)?;
    let partial = StreamFormat::partial(format_id, sample_rate, channels);
    let format = complete_format(backend, &partial)?;
    log::info!("negotiated format: {}", format);
    Ok(format)
}
