use crate::models::error::RecorderError;
use crate::models::format::StreamFormat;

/// Opaque identifier of an audio device issued by a [`DeviceQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub u32);

/// Device-property service: which input device is the default, and its rate.
pub trait DeviceQuery {
    /// Identifier of the system's default input device.
    fn default_input_device(&self) -> Result<DeviceId, RecorderError>;

    /// Nominal sample rate of `device`, in Hz.
    fn nominal_sample_rate(&self, device: DeviceId) -> Result<f64, RecorderError>;
}

/// Audio-format service: fills in what it can of a partial stream description.
pub trait FormatResolver {
    /// Complete `partial` (codec, rate, and channels set) as far as the
    /// platform knows without a concrete encoder instance.
    fn complete_format(&self, partial: &StreamFormat) -> Result<StreamFormat, RecorderError>;
}
