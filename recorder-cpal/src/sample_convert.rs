//! Device samples to packed, interleaved 16-bit little-endian PCM.

/// A sample type cpal can deliver.
pub trait InputSample: Copy {
    fn to_i16(self) -> i16;
}

impl InputSample for i16 {
    fn to_i16(self) -> i16 {
        self
    }
}

impl InputSample for f32 {
    fn to_i16(self) -> i16 {
        (self.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
    }
}

impl InputSample for u16 {
    fn to_i16(self) -> i16 {
        (i32::from(self) - 32768) as i16
    }
}

/// Append `samples`, interleaved at `source_channels`, to `out` as 16-bit LE
/// frames of `target_channels`.
///
/// Mono output averages every source channel. Otherwise each output channel
/// takes the matching source channel, repeating the last one when the
/// device has fewer.
pub fn append_frames<T: InputSample>(
    samples: &[T],
    source_channels: usize,
    target_channels: usize,
    out: &mut Vec<u8>,
) {
    if source_channels == 0 || target_channels == 0 {
        return;
    }
    out.reserve(samples.len() / source_channels * target_channels * 2);

    for frame in samples.chunks_exact(source_channels) {
        if target_channels == 1 && source_channels > 1 {
            let sum: i32 = frame.iter().map(|s| i32::from(s.to_i16())).sum();
            let mixed = (sum / source_channels as i32) as i16;
            out.extend_from_slice(&mixed.to_le_bytes());
            continue;
        }
        for channel in 0..target_channels {
            let sample = frame[channel.min(source_channels - 1)].to_i16();
            out.extend_from_slice(&sample.to_le_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> Vec<i16> {
        bytes.chunks_exact(2).map(|b| i16::from_le_bytes([b[0], b[1]])).collect()
    }

    #[test]
    fn float_samples_are_scaled_and_clamped() {
        let mut out = Vec::new();
        append_frames(&[0.0f32, 1.0, -1.0, 2.0], 1, 1, &mut out);
        assert_eq!(decode(&out), vec![0, 32767, -32767, 32767]);
    }

    #[test]
    fn unsigned_samples_are_recentred() {
        let mut out = Vec::new();
        append_frames(&[32768u16, 0, 65535], 1, 1, &mut out);
        assert_eq!(decode(&out), vec![0, -32768, 32767]);
    }

    #[test]
    fn mono_device_is_duplicated_to_stereo() {
        let mut out = Vec::new();
        append_frames(&[100i16, -200], 1, 2, &mut out);
        assert_eq!(decode(&out), vec![100, 100, -200, -200]);
    }

    #[test]
    fn stereo_device_is_averaged_to_mono() {
        let mut out = Vec::new();
        append_frames(&[100i16, 300, -10, -30], 2, 1, &mut out);
        assert_eq!(decode(&out), vec![200, -20]);
    }

    #[test]
    fn extra_device_channels_are_dropped() {
        let mut out = Vec::new();
        append_frames(&[1i16, 2, 3, 4, 5, 6], 3, 2, &mut out);
        assert_eq!(decode(&out), vec![1, 2, 4, 5]);
    }

    #[test]
    fn partial_frames_are_ignored() {
        let mut out = Vec::new();
        append_frames(&[1i16, 2, 3], 2, 2, &mut out);
        assert_eq!(decode(&out), vec![1, 2]);
    }
}
