use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::models::error::RecorderError;
use crate::models::format::StreamFormat;
use crate::models::recording_result::RecorderDiagnostics;
use crate::traits::audio_file::AudioFile;
use crate::traits::capture_queue::{BufferDisposition, FilledBuffer, InputHandler};
use crate::traits::recorder_delegate::RecorderDelegate;

/// State shared between the orchestrator and the capture queue's handler:
/// the output file, the packet cursor, and the `running` flag.
///
/// The cursor only moves forward, and only inside
/// [`on_buffer_filled`](InputHandler::on_buffer_filled).
///
/// Packets are written to the file synchronously on the queue's callback
/// thread, so a slow write holds its buffer out of the queue. The pool of
/// buffers must be large enough to keep capturing through a disk stall.
pub struct RecorderState<F: AudioFile> {
    file: Option<F>,
    packet_cursor: i64,
    frames_per_packet: u32,
    running: Arc<AtomicBool>,
    diagnostics: RecorderDiagnostics,
    delegate: Option<Arc<dyn RecorderDelegate>>,
}

impl<F: AudioFile> RecorderState<F> {
    pub fn new(running: Arc<AtomicBool>) -> Self {
        Self {
            file: None,
            packet_cursor: 0,
            frames_per_packet: 0,
            running,
            diagnostics: RecorderDiagnostics::default(),
            delegate: None,
        }
    }

    /// Attach the output file created for `format`. Packets delivered before
    /// this are counted as write failures.
    pub fn attach_file(&mut self, file: F, format: &StreamFormat) {
        self.frames_per_packet = format.frames_per_packet;
        self.file = Some(file);
    }

    pub fn set_delegate(&mut self, delegate: Option<Arc<dyn RecorderDelegate>>) {
        self.delegate = delegate;
    }

    pub fn file_mut(&mut self) -> Option<&mut F> {
        self.file.as_mut()
    }

    /// Index the next delivered packet will be written at.
    pub fn packet_cursor(&self) -> i64 {
        self.packet_cursor
    }

    pub fn diagnostics(&self) -> &RecorderDiagnostics {
        &self.diagnostics
    }

    /// Close the output file, consuming it.
    pub fn close_file(&mut self) -> Result<(), RecorderError> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| RecorderError::InvalidState("no output file attached".into()))?;
        file.close()
    }

    fn write_packets(&mut self, filled: &FilledBuffer<'_>) {
        let cursor = self.packet_cursor;
        let result = match self.file.as_mut() {
            Some(file) => file.write_packets(
                filled.data,
                filled.packet_descriptions,
                cursor,
                filled.packet_count,
            ),
            None => Err(RecorderError::PacketWriteFailed("no output file attached".into())),
        };

        match result {
            Ok(written) => {
                self.packet_cursor += i64::from(written);
                self.diagnostics.packets_written = self.packet_cursor;
                self.diagnostics.frames_written += self.frames_in(filled, written);
                self.diagnostics.bytes_written += bytes_in(filled, written);
            }
            Err(e) => {
                self.diagnostics.write_failures += 1;
                log::error!(
                    "failed to write {} packets at packet {}: {}",
                    filled.packet_count,
                    cursor,
                    e
                );
                if let Some(ref delegate) = self.delegate {
                    delegate.on_packet_write_failed(&e, filled.packet_count, cursor);
                }
            }
        }
    }

    fn frames_in(&self, filled: &FilledBuffer<'_>, written: u32) -> u64 {
        if self.frames_per_packet > 0 {
            u64::from(written) * u64::from(self.frames_per_packet)
        } else {
            filled
                .packet_descriptions
                .iter()
                .take(written as usize)
                .map(|d| u64::from(d.variable_frames))
                .sum()
        }
    }
}

fn bytes_in(filled: &FilledBuffer<'_>, written: u32) -> u64 {
    if written == filled.packet_count {
        return filled.data.len() as u64;
    }
    if filled.packet_descriptions.is_empty() {
        let per_packet = filled.data.len() as u64 / u64::from(filled.packet_count.max(1));
        return per_packet * u64::from(written);
    }
    filled
        .packet_descriptions
        .iter()
        .take(written as usize)
        .map(|d| u64::from(d.data_byte_size))
        .sum()
}

impl<F: AudioFile> InputHandler for RecorderState<F> {
    fn on_buffer_filled(&mut self, filled: FilledBuffer<'_>) -> BufferDisposition {
        self.diagnostics.callbacks += 1;

        if filled.packet_count > 0 {
            self.write_packets(&filled);
        }

        if self.running.load(Ordering::Acquire) {
            self.diagnostics.buffers_resubmitted += 1;
            BufferDisposition::Resubmit
        } else {
            self.diagnostics.buffers_released += 1;
            BufferDisposition::Release
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::format::{FormatId, PacketDescription};
    use crate::testing::{RecordingFileService, WriteCall};
    use crate::traits::audio_file::{AudioFileService, FileFlags};
    use crate::traits::capture_queue::BufferId;
    use std::path::Path;

    fn aac() -> StreamFormat {
        StreamFormat {
            frames_per_packet: 1024,
            ..StreamFormat::partial(FormatId::MPEG4_AAC, 44100.0, 2)
        }
    }

    fn state_with_file(running: bool) -> (RecorderState<crate::testing::RecordingFile>, RecordingFileService) {
        let service = RecordingFileService::default();
        let file = service.create(Path::new("out.caf"), &aac(), FileFlags::default()).unwrap();
        let mut state = RecorderState::new(Arc::new(AtomicBool::new(running)));
        state.attach_file(file, &aac());
        (state, service)
    }

    fn packets(count: u32) -> (Vec<u8>, Vec<PacketDescription>) {
        let descriptions = (0..count)
            .map(|i| PacketDescription {
                start_offset: i64::from(i * 4),
                variable_frames: 0,
                data_byte_size: 4,
            })
            .collect();
        (vec![1u8; count as usize * 4], descriptions)
    }

    fn fill<'a>(data: &'a [u8], descriptions: &'a [PacketDescription]) -> FilledBuffer<'a> {
        FilledBuffer {
            buffer: BufferId(0),
            data,
            packet_count: descriptions.len() as u32,
            packet_descriptions: descriptions,
        }
    }

    #[test]
    fn cursor_is_the_running_sum_of_delivered_packets() {
        let (mut state, service) = state_with_file(true);

        for count in [5u32, 0, 17, 1] {
            let (data, descriptions) = packets(count);
            state.on_buffer_filled(fill(&data, &descriptions));
        }

        assert_eq!(state.packet_cursor(), 23);
        let log = service.log.lock();
        let starts: Vec<(i64, u32)> = log.writes.iter().map(|w| (w.starting_packet, w.packet_count)).collect();
        // the empty delivery issues no write
        assert_eq!(starts, vec![(0, 5), (5, 17), (22, 1)]);
        assert_eq!(state.diagnostics().frames_written, 23 * 1024);
        assert_eq!(state.diagnostics().bytes_written, 23 * 4);
    }

    #[test]
    fn resubmits_only_while_running() {
        let (mut state, _service) = state_with_file(true);
        let (data, descriptions) = packets(3);

        assert_eq!(state.on_buffer_filled(fill(&data, &descriptions)), BufferDisposition::Resubmit);

        state.running.store(false, Ordering::Release);
        assert_eq!(state.on_buffer_filled(fill(&data, &descriptions)), BufferDisposition::Release);
        assert_eq!(state.on_buffer_filled(fill(&data, &[])), BufferDisposition::Release);

        // packets delivered after the stop request are still written
        assert_eq!(state.packet_cursor(), 6);
        assert_eq!(state.diagnostics().buffers_resubmitted, 1);
        assert_eq!(state.diagnostics().buffers_released, 2);
    }

    #[test]
    fn failed_write_keeps_capturing_without_moving_the_cursor() {
        let (mut state, service) = state_with_file(true);
        service.log.lock().failing_writes = 1;
        let (data, descriptions) = packets(10);

        assert_eq!(state.on_buffer_filled(fill(&data, &descriptions)), BufferDisposition::Resubmit);
        assert_eq!(state.packet_cursor(), 0);
        assert_eq!(state.diagnostics().write_failures, 1);

        state.on_buffer_filled(fill(&data, &descriptions));
        assert_eq!(state.packet_cursor(), 10);
        assert_eq!(
            service.log.lock().writes,
            vec![WriteCall {
                starting_packet: 0,
                packet_count: 10,
                bytes: 40
            }]
        );
    }

    #[test]
    fn delivery_without_a_file_counts_as_failure() {
        let mut state: RecorderState<crate::testing::RecordingFile> =
            RecorderState::new(Arc::new(AtomicBool::new(true)));
        let (data, descriptions) = packets(2);

        state.on_buffer_filled(fill(&data, &descriptions));
        assert_eq!(state.packet_cursor(), 0);
        assert_eq!(state.diagnostics().write_failures, 1);
        assert!(state.close_file().is_err());
    }
}
