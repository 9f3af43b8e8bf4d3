//! Buffer-pool input queue over a cpal input stream.
//!
//! ```text
//! [cpal callback] ── bounded channel ──→ [capture thread] → BufferPool → handler
//! ```
//!
//! `cpal::Stream` is not `Send`, so the stream lives on the capture thread
//! for its whole life. The real-time callback only converts samples and
//! `try_send`s them; when the channel is full the chunk is dropped and
//! counted as an overrun.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, SizedSample, StreamConfig};
use parking_lot::Mutex;

use recorder_core::models::error::RecorderError;
use recorder_core::models::format::StreamFormat;
use recorder_core::traits::capture_queue::{BufferId, CaptureQueue, SharedInputHandler};

use crate::device::default_input_config;
use crate::pool::BufferPool;
use crate::sample_convert::{append_frames, InputSample};

/// Converted chunks the callback may queue ahead of the capture thread.
const CHANNEL_DEPTH: usize = 64;

/// How often the capture thread checks for a stop request.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Linear-PCM input queue fed by the default input device.
pub struct CpalInputQueue {
    format: StreamFormat,
    pool: Arc<Mutex<BufferPool>>,
    stop_requested: Arc<AtomicBool>,
    overruns: Arc<AtomicU64>,
    capture_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl CpalInputQueue {
    pub fn new(format: &StreamFormat, handler: SharedInputHandler) -> Result<Self, RecorderError> {
        if !format.is_linear_pcm() || format.bytes_per_frame == 0 {
            return Err(RecorderError::QueueCreationFailed(format!(
                "unsupported capture format: {}",
                format
            )));
        }
        Ok(Self {
            format: *format,
            pool: Arc::new(Mutex::new(BufferPool::new(format.bytes_per_frame, handler))),
            stop_requested: Arc::new(AtomicBool::new(false)),
            overruns: Arc::new(AtomicU64::new(0)),
            capture_handle: Mutex::new(None),
        })
    }

    /// Chunks the stream callback dropped because the channel was full.
    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }
}

impl CaptureQueue for CpalInputQueue {
    fn current_format(&self) -> Result<StreamFormat, RecorderError> {
        Ok(self.format)
    }

    fn max_output_packet_size(&self) -> Result<u32, RecorderError> {
        Ok(self.format.bytes_per_packet)
    }

    fn magic_cookie_size(&self) -> Result<usize, RecorderError> {
        Ok(0)
    }

    fn copy_magic_cookie(&self, _cookie: &mut [u8]) -> Result<usize, RecorderError> {
        Ok(0)
    }

    fn allocate_buffer(&self, byte_capacity: u32) -> Result<BufferId, RecorderError> {
        self.pool.lock().allocate(byte_capacity)
    }

    fn enqueue_buffer(&self, buffer: BufferId) -> Result<(), RecorderError> {
        self.pool.lock().enqueue(buffer)
    }

    fn start(&self) -> Result<(), RecorderError> {
        let mut capture_handle = self.capture_handle.lock();
        if capture_handle.is_some() {
            return Err(RecorderError::QueueControlFailed("capture already running".into()));
        }
        self.stop_requested.store(false, Ordering::Release);

        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let format = self.format;
        let pool = Arc::clone(&self.pool);
        let stop_requested = Arc::clone(&self.stop_requested);
        let overruns = Arc::clone(&self.overruns);

        let handle = thread::Builder::new()
            .name("cpal-input-capture".into())
            .spawn(move || capture_loop(format, pool, stop_requested, overruns, ready_tx))
            .map_err(|e| RecorderError::QueueControlFailed(format!("failed to spawn capture thread: {}", e)))?;

        let started = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(RecorderError::QueueControlFailed("capture thread exited".into())));
        match started {
            Ok(()) => {
                *capture_handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                let _ = handle.join();
                Err(e)
            }
        }
    }

    /// Stop the stream and deliver everything it captured, including a final
    /// partial buffer, before returning. There is no encoder latency, so
    /// `immediate` changes nothing.
    fn stop(&self, _immediate: bool) -> Result<(), RecorderError> {
        self.stop_requested.store(true, Ordering::Release);
        let Some(handle) = self.capture_handle.lock().take() else {
            return Ok(());
        };
        handle
            .join()
            .map_err(|_| RecorderError::QueueControlFailed("capture thread panicked".into()))?;

        let overruns = self.overruns();
        if overruns > 0 {
            log::warn!("dropped {} input chunks while the capture thread was busy", overruns);
        }
        let dropped = self.pool.lock().dropped_bytes();
        if dropped > 0 {
            log::warn!("dropped {} bytes with no buffer enqueued", dropped);
        }
        Ok(())
    }
}

impl Drop for CpalInputQueue {
    fn drop(&mut self) {
        if let Err(e) = self.stop(true) {
            log::warn!("failed to stop capture: {}", e);
        }
    }
}

/// Capture thread body: own the stream, move chunks into the pool until a
/// stop is requested, then drain and flush.
fn capture_loop(
    format: StreamFormat,
    pool: Arc<Mutex<BufferPool>>,
    stop_requested: Arc<AtomicBool>,
    overruns: Arc<AtomicU64>,
    ready: SyncSender<Result<(), RecorderError>>,
) {
    let (chunk_tx, chunk_rx) = mpsc::sync_channel::<Vec<u8>>(CHANNEL_DEPTH);

    let stream = match open_stream(&format, chunk_tx, overruns) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    if let Err(e) = stream.play() {
        let _ = ready.send(Err(RecorderError::QueueControlFailed(format!("failed to start stream: {}", e))));
        return;
    }
    let _ = ready.send(Ok(()));
    log::debug!("capture thread running");

    while !stop_requested.load(Ordering::Acquire) {
        match chunk_rx.recv_timeout(POLL_INTERVAL) {
            Ok(bytes) => pool.lock().push(&bytes),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    // Dropping the stream drops the callback's sender.
    drop(stream);
    drain(&chunk_rx, &pool);
    pool.lock().flush();
    log::debug!("capture thread finished");
}

fn drain(chunk_rx: &Receiver<Vec<u8>>, pool: &Mutex<BufferPool>) {
    loop {
        match chunk_rx.try_recv() {
            Ok(bytes) => pool.lock().push(&bytes),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
        }
    }
}

fn open_stream(
    format: &StreamFormat,
    chunk_tx: SyncSender<Vec<u8>>,
    overruns: Arc<AtomicU64>,
) -> Result<cpal::Stream, RecorderError> {
    let (device, supported) = default_input_config()?;
    let config = StreamConfig {
        channels: supported.channels(),
        sample_rate: SampleRate(format.sample_rate as u32),
        buffer_size: cpal::BufferSize::Default,
    };
    let target_channels = format.channels_per_frame as usize;
    log::debug!(
        "opening input stream: {} ch {:?} at {} Hz → {} ch",
        config.channels,
        supported.sample_format(),
        config.sample_rate.0,
        target_channels
    );

    match supported.sample_format() {
        SampleFormat::I16 => build_stream::<i16>(&device, &config, target_channels, chunk_tx, overruns),
        SampleFormat::U16 => build_stream::<u16>(&device, &config, target_channels, chunk_tx, overruns),
        SampleFormat::F32 => build_stream::<f32>(&device, &config, target_channels, chunk_tx, overruns),
        other => Err(RecorderError::QueueCreationFailed(format!(
            "unsupported device sample format: {:?}",
            other
        ))),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    target_channels: usize,
    chunk_tx: SyncSender<Vec<u8>>,
    overruns: Arc<AtomicU64>,
) -> Result<cpal::Stream, RecorderError>
where
    T: SizedSample + InputSample + Send + 'static,
{
    let source_channels = config.channels as usize;
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let mut bytes = Vec::new();
                append_frames(data, source_channels, target_channels, &mut bytes);
                if !bytes.is_empty() && chunk_tx.try_send(bytes).is_err() {
                    overruns.fetch_add(1, Ordering::Relaxed);
                }
            },
            |err| log::error!("input stream error: {}", err),
            None,
        )
        .map_err(|e| RecorderError::QueueCreationFailed(format!("failed to build input stream: {}", e)))
}
