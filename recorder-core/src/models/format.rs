use std::fmt;

use serde::{Deserialize, Serialize};

/// Four-character codec tag identifying an audio data format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FormatId(pub u32);

impl FormatId {
    /// Uncompressed linear PCM (`'lpcm'`).
    pub const LINEAR_PCM: FormatId = FormatId::from_fourcc(*b"lpcm");

    /// MPEG-4 AAC (`'aac '`).
    pub const MPEG4_AAC: FormatId = FormatId::from_fourcc(*b"aac ");

    pub const fn from_fourcc(code: [u8; 4]) -> Self {
        Self(u32::from_be_bytes(code))
    }

    pub const fn fourcc(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    pub fn is_unset(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = self.fourcc();
        if code.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            write!(f, "'{}'", String::from_utf8_lossy(&code))
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Linear PCM flag: samples are IEEE floats.
pub const FORMAT_FLAG_IS_FLOAT: u32 = 1 << 0;
/// Linear PCM flag: samples are big-endian.
pub const FORMAT_FLAG_IS_BIG_ENDIAN: u32 = 1 << 1;
/// Linear PCM flag: samples are signed integers.
pub const FORMAT_FLAG_IS_SIGNED_INTEGER: u32 = 1 << 2;
/// Linear PCM flag: sample bits fill the channel slot.
pub const FORMAT_FLAG_IS_PACKED: u32 = 1 << 3;

/// Description of an audio stream: codec, rate, and frame/packet geometry.
///
/// Compressed formats leave several fields at zero until an encoder exists;
/// zero means "unknown" or "variable", never an error.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StreamFormat {
    pub format_id: FormatId,
    pub sample_rate: f64,
    pub channels_per_frame: u32,
    pub bytes_per_packet: u32,
    pub bytes_per_frame: u32,
    pub frames_per_packet: u32,
    pub bits_per_channel: u32,
    pub format_flags: u32,
}

impl StreamFormat {
    /// A hint carrying only codec, sample rate, and channel count.
    pub fn partial(format_id: FormatId, sample_rate: f64, channels_per_frame: u32) -> Self {
        Self {
            format_id,
            sample_rate,
            channels_per_frame,
            ..Default::default()
        }
    }

    /// Packed, interleaved, signed-integer little-endian PCM.
    pub fn linear_pcm(sample_rate: f64, channels_per_frame: u32, bits_per_channel: u32) -> Self {
        let bytes_per_frame = channels_per_frame * bits_per_channel / 8;
        Self {
            format_id: FormatId::LINEAR_PCM,
            sample_rate,
            channels_per_frame,
            bytes_per_packet: bytes_per_frame,
            bytes_per_frame,
            frames_per_packet: 1,
            bits_per_channel,
            format_flags: FORMAT_FLAG_IS_SIGNED_INTEGER | FORMAT_FLAG_IS_PACKED,
        }
    }

    /// Every packet has the same byte size.
    pub fn has_constant_packet_size(&self) -> bool {
        self.bytes_per_packet > 0
    }

    /// Packets must be described individually (size or frame count varies).
    pub fn needs_packet_table(&self) -> bool {
        self.bytes_per_packet == 0 || self.frames_per_packet == 0
    }

    pub fn is_linear_pcm(&self) -> bool {
        self.format_id == FormatId::LINEAR_PCM
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} Hz, {} ch, {} B/packet, {} frames/packet, {} B/frame",
            self.format_id,
            self.sample_rate,
            self.channels_per_frame,
            self.bytes_per_packet,
            self.frames_per_packet,
            self.bytes_per_frame,
        )
    }
}

/// Location and size of one packet inside a filled buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketDescription {
    pub start_offset: i64,
    pub variable_frames: u32,
    pub data_byte_size: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fourcc_round_trips_through_display() {
        assert_eq!(FormatId::MPEG4_AAC.to_string(), "'aac '");
        assert_eq!(FormatId::LINEAR_PCM.fourcc(), *b"lpcm");
        assert_eq!(FormatId(7).to_string(), "7");
    }

    #[test]
    fn linear_pcm_geometry() {
        let format = StreamFormat::linear_pcm(48000.0, 2, 16);
        assert_eq!(format.bytes_per_frame, 4);
        assert_eq!(format.bytes_per_packet, 4);
        assert_eq!(format.frames_per_packet, 1);
        assert!(format.has_constant_packet_size());
        assert!(!format.needs_packet_table());
    }

    #[test]
    fn partial_format_needs_packet_table() {
        let format = StreamFormat::partial(FormatId::MPEG4_AAC, 44100.0, 2);
        assert!(format.needs_packet_table());
        assert_eq!(format.bytes_per_frame, 0);
    }
}
