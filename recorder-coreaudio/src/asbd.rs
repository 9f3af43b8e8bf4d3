//! Conversion between `StreamFormat` and `AudioStreamBasicDescription`.

use coreaudio_sys::AudioStreamBasicDescription;
use recorder_core::models::format::{FormatId, StreamFormat};

pub(crate) fn to_asbd(format: &StreamFormat) -> AudioStreamBasicDescription {
    AudioStreamBasicDescription {
        mSampleRate: format.sample_rate,
        mFormatID: format.format_id.0,
        mFormatFlags: format.format_flags,
        mBytesPerPacket: format.bytes_per_packet,
        mFramesPerPacket: format.frames_per_packet,
        mBytesPerFrame: format.bytes_per_frame,
        mChannelsPerFrame: format.channels_per_frame,
        mBitsPerChannel: format.bits_per_channel,
        mReserved: 0,
    }
}

pub(crate) fn from_asbd(asbd: &AudioStreamBasicDescription) -> StreamFormat {
    StreamFormat {
        format_id: FormatId(asbd.mFormatID),
        sample_rate: asbd.mSampleRate,
        channels_per_frame: asbd.mChannelsPerFrame,
        bytes_per_packet: asbd.mBytesPerPacket,
        bytes_per_frame: asbd.mBytesPerFrame,
        frames_per_packet: asbd.mFramesPerPacket,
        bits_per_channel: asbd.mBitsPerChannel,
        format_flags: asbd.mFormatFlags,
    }
}
