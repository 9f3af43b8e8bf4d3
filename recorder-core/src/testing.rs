//! Deterministic in-memory collaborators for exercising the recorder.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::models::error::RecorderError;
use crate::models::format::{FormatId, PacketDescription, StreamFormat};
use crate::traits::audio_file::{AudioFile, AudioFileService, FileFlags};
use crate::traits::capture_queue::{
    BufferDisposition, BufferId, CaptureBackend, CaptureQueue, FilledBuffer, SharedInputHandler,
};
use crate::traits::device::{DeviceId, DeviceQuery, FormatResolver};

/// Packet size used for variable-bitrate deliveries.
pub(crate) const VBR_PACKET_BYTES: u32 = 8;

/// Everything a fake queue did, plus knobs for what it reports.
pub(crate) struct QueueProbe {
    pub requested_format: Option<StreamFormat>,
    pub format: StreamFormat,
    pub max_packet_size: u32,
    pub cookie: Option<Vec<u8>>,
    pub cookie_copy_fails: bool,
    pub allocated: Vec<u32>,
    pub enqueued: VecDeque<BufferId>,
    pub enqueue_calls: usize,
    pub started: bool,
    pub stopped: bool,
    pub start_fails: bool,
    pub max_packet_size_queries: usize,
    pub cookie_size_queries: usize,
    pub handler: Option<SharedInputHandler>,
    pub disposed: bool,
}

impl QueueProbe {
    fn new(format: StreamFormat) -> Self {
        Self {
            requested_format: None,
            format,
            max_packet_size: 0,
            cookie: None,
            cookie_copy_fails: false,
            allocated: Vec::new(),
            enqueued: VecDeque::new(),
            enqueue_calls: 0,
            started: false,
            stopped: false,
            start_fails: false,
            max_packet_size_queries: 0,
            cookie_size_queries: 0,
            handler: None,
            disposed: false,
        }
    }
}

#[derive(Clone)]
pub(crate) struct ProbeHandle(Arc<Mutex<QueueProbe>>);

impl ProbeHandle {
    pub fn lock(&self) -> MutexGuard<'_, QueueProbe> {
        self.0.lock()
    }

    /// Fill the oldest enqueued buffer with `packet_count` packets and run the
    /// handler on it, the way a capture thread would. Returns `None` when the
    /// queue is not capturing or has no buffer enqueued.
    pub fn deliver(&self, packet_count: u32) -> Option<BufferDisposition> {
        let (buffer, handler, format) = {
            let mut probe = self.0.lock();
            if !probe.started || probe.stopped {
                return None;
            }
            let buffer = probe.enqueued.pop_front()?;
            (buffer, probe.handler.clone()?, probe.format)
        };

        let packet_bytes = if format.bytes_per_packet > 0 {
            format.bytes_per_packet
        } else {
            VBR_PACKET_BYTES
        };
        let data = vec![0xA5u8; (packet_count * packet_bytes) as usize];
        let descriptions: Vec<PacketDescription> = if format.has_constant_packet_size() {
            Vec::new()
        } else {
            (0..packet_count)
                .map(|i| PacketDescription {
                    start_offset: i64::from(i * packet_bytes),
                    variable_frames: 0,
                    data_byte_size: packet_bytes,
                })
                .collect()
        };

        let disposition = handler.lock().on_buffer_filled(FilledBuffer {
            buffer,
            data: &data,
            packet_count,
            packet_descriptions: &descriptions,
        });

        if disposition == BufferDisposition::Resubmit {
            self.0.lock().enqueued.push_back(buffer);
        }
        Some(disposition)
    }
}

pub(crate) struct FakeQueue {
    probe: ProbeHandle,
}

impl FakeQueue {
    pub fn with_format(format: StreamFormat) -> Self {
        Self {
            probe: ProbeHandle(Arc::new(Mutex::new(QueueProbe::new(format)))),
        }
    }

    pub fn probe(&self) -> MutexGuard<'_, QueueProbe> {
        self.probe.lock()
    }
}

impl Drop for FakeQueue {
    fn drop(&mut self) {
        let mut probe = self.probe.lock();
        probe.disposed = true;
        probe.handler = None;
    }
}

impl CaptureQueue for FakeQueue {
    fn current_format(&self) -> Result<StreamFormat, RecorderError> {
        Ok(self.probe().format)
    }

    fn max_output_packet_size(&self) -> Result<u32, RecorderError> {
        let mut probe = self.probe();
        probe.max_packet_size_queries += 1;
        match probe.max_packet_size {
            0 => Err(RecorderError::PropertyQueryFailed("no maximum packet size".into())),
            size => Ok(size),
        }
    }

    fn magic_cookie_size(&self) -> Result<usize, RecorderError> {
        let mut probe = self.probe();
        probe.cookie_size_queries += 1;
        Ok(probe.cookie.as_ref().map_or(0, Vec::len))
    }

    fn copy_magic_cookie(&self, cookie: &mut [u8]) -> Result<usize, RecorderError> {
        let probe = self.probe();
        if probe.cookie_copy_fails {
            return Err(RecorderError::PropertyQueryFailed("cookie unavailable".into()));
        }
        let source = probe.cookie.as_deref().unwrap_or_default();
        let len = source.len().min(cookie.len());
        cookie[..len].copy_from_slice(&source[..len]);
        Ok(len)
    }

    fn allocate_buffer(&self, byte_capacity: u32) -> Result<BufferId, RecorderError> {
        let mut probe = self.probe();
        probe.allocated.push(byte_capacity);
        Ok(BufferId(probe.allocated.len() - 1))
    }

    fn enqueue_buffer(&self, buffer: BufferId) -> Result<(), RecorderError> {
        let mut probe = self.probe();
        if buffer.0 >= probe.allocated.len() {
            return Err(RecorderError::QueueControlFailed(format!("unknown buffer {}", buffer.0)));
        }
        probe.enqueue_calls += 1;
        probe.enqueued.push_back(buffer);
        Ok(())
    }

    fn start(&self) -> Result<(), RecorderError> {
        let mut probe = self.probe();
        if probe.start_fails {
            return Err(RecorderError::QueueControlFailed("start refused".into()));
        }
        probe.started = true;
        Ok(())
    }

    fn stop(&self, _immediate: bool) -> Result<(), RecorderError> {
        self.probe().stopped = true;
        Ok(())
    }
}

/// A platform whose device runs at `sample_rate` and whose queues report
/// `post_creation_format` once created.
pub(crate) struct FakeBackend {
    pub sample_rate: f64,
    pub device_fails: bool,
    pub queue_creation_fails: bool,
    pub post_creation_format: Option<StreamFormat>,
    probe: ProbeHandle,
}

impl FakeBackend {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            device_fails: false,
            queue_creation_fails: false,
            post_creation_format: None,
            probe: ProbeHandle(Arc::new(Mutex::new(QueueProbe::new(StreamFormat::default())))),
        }
    }

    pub fn probe(&self) -> ProbeHandle {
        self.probe.clone()
    }
}

impl DeviceQuery for FakeBackend {
    fn default_input_device(&self) -> Result<DeviceId, RecorderError> {
        if self.device_fails {
            return Err(RecorderError::DeviceQueryFailed("no default input device".into()));
        }
        Ok(DeviceId(42))
    }

    fn nominal_sample_rate(&self, _device: DeviceId) -> Result<f64, RecorderError> {
        Ok(self.sample_rate)
    }
}

impl FormatResolver for FakeBackend {
    fn complete_format(&self, partial: &StreamFormat) -> Result<StreamFormat, RecorderError> {
        if partial.format_id == FormatId::LINEAR_PCM {
            return Ok(StreamFormat::linear_pcm(partial.sample_rate, partial.channels_per_frame, 16));
        }
        Ok(StreamFormat {
            frames_per_packet: 1024,
            ..*partial
        })
    }
}

impl CaptureBackend for FakeBackend {
    type Queue = FakeQueue;

    fn new_input(
        &self,
        format: &StreamFormat,
        handler: SharedInputHandler,
    ) -> Result<FakeQueue, RecorderError> {
        if self.queue_creation_fails {
            return Err(RecorderError::QueueCreationFailed("format not supported".into()));
        }
        {
            let mut probe = self.probe.lock();
            probe.requested_format = Some(*format);
            probe.format = self.post_creation_format.unwrap_or(*format);
            probe.handler = Some(handler);
        }
        Ok(FakeQueue {
            probe: self.probe.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WriteCall {
    pub starting_packet: i64,
    pub packet_count: u32,
    pub bytes: usize,
}

/// Everything done to a [`RecordingFile`].
#[derive(Default)]
pub(crate) struct FileLog {
    pub created_format: Option<StreamFormat>,
    pub writes: Vec<WriteCall>,
    pub cookies: Vec<Vec<u8>>,
    pub closed: bool,
    /// Number of upcoming writes to fail.
    pub failing_writes: usize,
}

pub(crate) struct RecordingFile {
    log: Arc<Mutex<FileLog>>,
    path: PathBuf,
}

impl AudioFile for RecordingFile {
    fn write_packets(
        &mut self,
        data: &[u8],
        _packet_descriptions: &[PacketDescription],
        starting_packet: i64,
        packet_count: u32,
    ) -> Result<u32, RecorderError> {
        let mut log = self.log.lock();
        if log.failing_writes > 0 {
            log.failing_writes -= 1;
            return Err(RecorderError::PacketWriteFailed("disk full".into()));
        }
        log.writes.push(WriteCall {
            starting_packet,
            packet_count,
            bytes: data.len(),
        });
        Ok(packet_count)
    }

    fn set_magic_cookie(&mut self, cookie: &[u8]) -> Result<(), RecorderError> {
        self.log.lock().cookies.push(cookie.to_vec());
        Ok(())
    }

    fn close(&mut self) -> Result<(), RecorderError> {
        let mut log = self.log.lock();
        if log.closed {
            return Err(RecorderError::StorageError("already closed".into()));
        }
        log.closed = true;
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Clone, Default)]
pub(crate) struct RecordingFileService {
    pub log: Arc<Mutex<FileLog>>,
}

impl AudioFileService for RecordingFileService {
    type File = RecordingFile;

    fn create(
        &self,
        path: &Path,
        format: &StreamFormat,
        _flags: FileFlags,
    ) -> Result<RecordingFile, RecorderError> {
        self.log.lock().created_format = Some(*format);
        Ok(RecordingFile {
            log: Arc::clone(&self.log),
            path: path.to_path_buf(),
        })
    }
}
