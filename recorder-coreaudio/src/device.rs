//! Core Audio device and format services.

use std::ffi::c_void;
use std::mem;
use std::ptr;

use coreaudio_sys::{
    kAudioDevicePropertyNominalSampleRate, kAudioFormatProperty_FormatInfo,
    kAudioHardwarePropertyDefaultInputDevice, kAudioObjectPropertyScopeGlobal, kAudioObjectSystemObject,
    AudioDeviceID, AudioFormatGetProperty, AudioFormatPropertyID, AudioObjectGetPropertyData, AudioObjectID,
    AudioObjectPropertyAddress, AudioObjectPropertyScope, AudioObjectPropertySelector,
    AudioStreamBasicDescription,
};

use recorder_core::models::error::RecorderError;
use recorder_core::models::format::StreamFormat;
use recorder_core::traits::capture_queue::{CaptureBackend, SharedInputHandler};
use recorder_core::traits::device::{DeviceId, DeviceQuery, FormatResolver};

use crate::asbd::{from_asbd, to_asbd};
use crate::audio_queue::CoreAudioQueue;
use crate::status::check;

/// `kAudioObjectPropertyElementMain`.
const ELEMENT_MAIN: u32 = 0;

/// `kAudioObjectUnknown`.
const UNKNOWN_OBJECT: AudioObjectID = 0;

/// The macOS audio system: HAL properties, the AudioFormat API, and
/// AudioQueue creation.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoreAudioBackend;

impl CoreAudioBackend {
    pub fn new() -> Self {
        Self
    }
}

/// Read a fixed-size global property of `object` into `value`.
fn get_property<T>(
    object: AudioObjectID,
    selector: AudioObjectPropertySelector,
    value: &mut T,
) -> i32 {
    let address = AudioObjectPropertyAddress {
        mSelector: selector,
        mScope: kAudioObjectPropertyScopeGlobal as AudioObjectPropertyScope,
        mElement: ELEMENT_MAIN,
    };
    let mut size = mem::size_of::<T>() as u32;
    // SAFETY: `value` is a valid, writable `T` of exactly `size` bytes.
    unsafe {
        AudioObjectGetPropertyData(
            object,
            &address,
            0,
            ptr::null(),
            &mut size,
            value as *mut T as *mut c_void,
        )
    }
}

impl DeviceQuery for CoreAudioBackend {
    fn default_input_device(&self) -> Result<DeviceId, RecorderError> {
        let mut device: AudioDeviceID = UNKNOWN_OBJECT;
        let status = get_property(
            kAudioObjectSystemObject as AudioObjectID,
            kAudioHardwarePropertyDefaultInputDevice as AudioObjectPropertySelector,
            &mut device,
        );
        check(status, "get default input device", RecorderError::DeviceQueryFailed)?;
        if device == UNKNOWN_OBJECT {
            return Err(RecorderError::DeviceQueryFailed("no default input device".into()));
        }
        Ok(DeviceId(device))
    }

    fn nominal_sample_rate(&self, device: DeviceId) -> Result<f64, RecorderError> {
        let mut rate: f64 = 0.0;
        let status = get_property(
            device.0,
            kAudioDevicePropertyNominalSampleRate as AudioObjectPropertySelector,
            &mut rate,
        );
        check(status, "get nominal sample rate", RecorderError::DeviceQueryFailed)?;
        Ok(rate)
    }
}

impl FormatResolver for CoreAudioBackend {
    fn complete_format(&self, partial: &StreamFormat) -> Result<StreamFormat, RecorderError> {
        let mut asbd: AudioStreamBasicDescription = to_asbd(partial);
        let mut size = mem::size_of::<AudioStreamBasicDescription>() as u32;
        // SAFETY: `asbd` is a valid description, filled in place.
        let status = unsafe {
            AudioFormatGetProperty(
                kAudioFormatProperty_FormatInfo as AudioFormatPropertyID,
                0,
                ptr::null(),
                &mut size,
                &mut asbd as *mut AudioStreamBasicDescription as *mut c_void,
            )
        };
        check(status, "get format info", RecorderError::FormatResolutionFailed)?;
        Ok(from_asbd(&asbd))
    }
}

impl CaptureBackend for CoreAudioBackend {
    type Queue = CoreAudioQueue;

    fn new_input(
        &self,
        format: &StreamFormat,
        handler: SharedInputHandler,
    ) -> Result<CoreAudioQueue, RecorderError> {
        CoreAudioQueue::new_input(format, handler)
    }
}
