use crate::models::error::RecorderError;
use crate::models::format::StreamFormat;
use crate::traits::capture_queue::CaptureQueue;

/// Bytes a capture buffer needs to hold `seconds` of audio in `format`.
///
/// `format` must be the queue's post-creation format. Constant-bitrate
/// formats size by frames; otherwise the largest possible packet is
/// multiplied by the packet count, assuming one frame per packet when the
/// codec doesn't say. Never returns room for fewer than one packet.
pub fn compute_buffer_size<Q>(format: &StreamFormat, queue: &Q, seconds: f32) -> Result<u32, RecorderError>
where
    Q: CaptureQueue + ?Sized,
{
    let frames = (f64::from(seconds) * format.sample_rate).ceil();
    if !frames.is_finite() || frames < 0.0 || frames > f64::from(u32::MAX) {
        return Err(RecorderError::BufferAllocationFailed(format!(
            "{} s at {} Hz is not a representable frame count",
            seconds, format.sample_rate
        )));
    }
    let frames = frames as u64;

    let bytes = if format.bytes_per_frame > 0 {
        frames * u64::from(format.bytes_per_frame)
    } else {
        let max_packet_size = if format.bytes_per_packet > 0 {
            format.bytes_per_packet
        } else {
            queue.max_output_packet_size().map_err(|e| match e {
                RecorderError::PropertyQueryFailed(_) => e,
                other => RecorderError::PropertyQueryFailed(format!("maximum output packet size: {}", other)),
            })?
        };

        let packets = if format.frames_per_packet > 0 {
            frames / u64::from(format.frames_per_packet)
        } else {
            // worst case: one frame per packet
            frames
        };

        packets.max(1) * u64::from(max_packet_size)
    };

    u32::try_from(bytes).map_err(|_| {
        RecorderError::BufferAllocationFailed(format!("{} byte buffer exceeds the 32-bit limit", bytes))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::format::FormatId;
    use crate::testing::FakeQueue;

    #[test]
    fn constant_bitrate_sizes_by_frames() {
        let format = StreamFormat {
            bytes_per_frame: 4,
            ..StreamFormat::partial(FormatId::LINEAR_PCM, 44100.0, 2)
        };
        let queue = FakeQueue::with_format(format);

        assert_eq!(compute_buffer_size(&format, &queue, 0.5).unwrap(), 88200);
        assert_eq!(queue.probe().max_packet_size_queries, 0);
    }

    #[test]
    fn unknown_frames_per_packet_assumes_one_frame_per_packet() {
        let format = StreamFormat {
            bytes_per_packet: 6,
            ..StreamFormat::partial(FormatId::MPEG4_AAC, 8000.0, 2)
        };
        let queue = FakeQueue::with_format(format);

        // 0.5 s at 8 kHz = 4000 frames = 4000 packets of at most 6 bytes
        assert_eq!(compute_buffer_size(&format, &queue, 0.5).unwrap(), 24000);
    }

    #[test]
    fn variable_packet_size_asks_the_queue() {
        let format = StreamFormat {
            frames_per_packet: 1024,
            ..StreamFormat::partial(FormatId::MPEG4_AAC, 44100.0, 2)
        };
        let queue = FakeQueue::with_format(format);
        queue.probe().max_packet_size = 1536;

        // ceil(22050) / 1024 = 21 packets
        assert_eq!(compute_buffer_size(&format, &queue, 0.5).unwrap(), 21 * 1536);
        assert_eq!(queue.probe().max_packet_size_queries, 1);
    }

    #[test]
    fn packet_count_never_drops_to_zero() {
        let format = StreamFormat {
            frames_per_packet: 1024,
            ..StreamFormat::partial(FormatId::MPEG4_AAC, 44100.0, 2)
        };
        let queue = FakeQueue::with_format(format);
        queue.probe().max_packet_size = 800;

        // 441 frames < 1024 frames per packet
        assert_eq!(compute_buffer_size(&format, &queue, 0.01).unwrap(), 800);

        let no_geometry = StreamFormat::partial(FormatId::MPEG4_AAC, 44100.0, 2);
        assert_eq!(compute_buffer_size(&no_geometry, &queue, 0.0).unwrap(), 800);
    }

    #[test]
    fn missing_max_packet_size_is_a_property_failure() {
        let format = StreamFormat::partial(FormatId::MPEG4_AAC, 44100.0, 2);
        let queue = FakeQueue::with_format(format);
        queue.probe().max_packet_size = 0;

        let err = compute_buffer_size(&format, &queue, 0.5).unwrap_err();
        assert!(matches!(err, RecorderError::PropertyQueryFailed(_)));
    }

    #[test]
    fn oversized_buffer_is_rejected() {
        let format = StreamFormat {
            bytes_per_frame: 1 << 20,
            ..StreamFormat::partial(FormatId::LINEAR_PCM, 192000.0, 2)
        };
        let queue = FakeQueue::with_format(format);

        let err = compute_buffer_size(&format, &queue, 60.0).unwrap_err();
        assert!(matches!(err, RecorderError::BufferAllocationFailed(_)));
    }
}
