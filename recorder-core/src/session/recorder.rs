use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::config::RecorderConfiguration;
use crate::models::error::RecorderError;
use crate::models::format::StreamFormat;
use crate::models::recording_result::{duration_for_frames, RecorderDiagnostics, RecordingMetadata, RecordingResult};
use crate::models::state::EngineState;
use crate::processing::buffer_size::compute_buffer_size;
use crate::processing::format_negotiator::negotiate;
use crate::session::cookie::{propagate_cookie, CookieOutcome};
use crate::session::recorder_state::RecorderState;
use crate::storage::checksum::sha256_file;
use crate::storage::metadata::write_metadata;
use crate::traits::audio_file::{AudioFile, AudioFileService, FileFlags};
use crate::traits::capture_queue::{BufferId, CaptureBackend, CaptureQueue, SharedInputHandler};
use crate::traits::recorder_delegate::RecorderDelegate;

/// Resources held between `configure` and `dispose`.
///
/// Field order is drop order: the queue (and its buffers) goes before the
/// state that owns the file.
struct Session<Q: CaptureQueue, F: AudioFile> {
    queue: Q,
    recorder: Arc<Mutex<RecorderState<F>>>,
    format: StreamFormat,
    buffer_byte_size: Option<u32>,
    buffers: Vec<BufferId>,
}

/// Records the default input device to an audio file through a pool of
/// capture buffers.
///
/// ```text
/// [Device] → [Capture Queue] ⇄ N buffers → [RecorderState handler] → [File]
/// ```
///
/// Transitions: `configure` (uninitialized → configured), `start`
/// (configured → running), `stop` (running → stopped), `dispose`
/// (stopped or configured → disposed). Anything else fails with
/// [`RecorderError::InvalidState`].
pub struct Recorder<B: CaptureBackend, S: AudioFileService> {
    backend: B,
    files: S,
    config: RecorderConfiguration,
    state: EngineState,
    running: Arc<AtomicBool>,
    session: Option<Session<B::Queue, S::File>>,
    delegate: Option<Arc<dyn RecorderDelegate>>,
    cookie_propagations: u32,
    final_diagnostics: RecorderDiagnostics,
}

impl<B: CaptureBackend, S: AudioFileService> Recorder<B, S> {
    pub fn new(backend: B, files: S, config: RecorderConfiguration) -> Self {
        Self {
            backend,
            files,
            config,
            state: EngineState::Uninitialized,
            running: Arc::new(AtomicBool::new(false)),
            session: None,
            delegate: None,
            cookie_propagations: 0,
            final_diagnostics: RecorderDiagnostics::default(),
        }
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn RecorderDelegate>) {
        if let Some(ref session) = self.session {
            session.recorder.lock().set_delegate(Some(Arc::clone(&delegate)));
        }
        self.delegate = Some(delegate);
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> &RecorderConfiguration {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The queue's authoritative format, once configured.
    pub fn format(&self) -> Option<StreamFormat> {
        self.session.as_ref().map(|s| s.format)
    }

    /// Byte size of every buffer in the pool, once started.
    pub fn buffer_byte_size(&self) -> Option<u32> {
        self.session.as_ref().and_then(|s| s.buffer_byte_size)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn diagnostics(&self) -> RecorderDiagnostics {
        let mut diagnostics = match self.session {
            Some(ref session) => session.recorder.lock().diagnostics().clone(),
            None => self.final_diagnostics.clone(),
        };
        diagnostics.cookie_propagations = self.cookie_propagations;
        diagnostics
    }

    /// Negotiate the format, create the capture queue and the output file,
    /// and copy the encoder's initial magic cookie into the file.
    ///
    /// Nothing is held if this fails.
    pub fn configure(&mut self) -> Result<(), RecorderError> {
        self.require(&[EngineState::Uninitialized], "configure")?;
        self.config.validate().map_err(RecorderError::InvalidState)?;

        let requested = negotiate(&self.backend, self.config.format_id, self.config.channels)?;

        let mut recorder_state = RecorderState::new(Arc::clone(&self.running));
        recorder_state.set_delegate(self.delegate.clone());
        let recorder = Arc::new(Mutex::new(recorder_state));
        let handler: SharedInputHandler = recorder.clone();

        let queue = self.backend.new_input(&requested, handler)?;

        // The encoder may fill in fields the request left unknown; the file and
        // buffer sizing use only this copy.
        let format = queue.current_format().map_err(|e| match e {
            RecorderError::PropertyQueryFailed(_) => e,
            other => RecorderError::PropertyQueryFailed(format!("queue output format: {}", other)),
        })?;
        if format != requested {
            log::debug!("queue adjusted format to {}", format);
        }

        let flags = FileFlags {
            erase_existing: self.config.erase_existing,
        };
        let file = self.files.create(&self.config.output_path, &format, flags)?;
        recorder.lock().attach_file(file, &format);

        self.session = Some(Session {
            queue,
            recorder,
            format,
            buffer_byte_size: None,
            buffers: Vec::with_capacity(self.config.buffer_count),
        });
        self.copy_cookie("before capture");
        self.set_state(EngineState::Configured);
        Ok(())
    }

    /// Allocate and enqueue the buffer pool and start capture, configuring
    /// first if needed. Returns as soon as the queue is running.
    ///
    /// On failure after configuration, every resource is released and the
    /// recorder is disposed.
    pub fn start(&mut self) -> Result<(), RecorderError> {
        if self.state.is_uninitialized() {
            self.configure()?;
        }
        self.require(&[EngineState::Configured], "start")?;

        if let Err(e) = self.start_queue() {
            self.running.store(false, Ordering::Release);
            log::error!("failed to start capture: {}", e);
            self.release_session();
            self.set_state(EngineState::Disposed);
            return Err(e);
        }

        self.set_state(EngineState::Running);
        Ok(())
    }

    fn start_queue(&mut self) -> Result<(), RecorderError> {
        let buffer_count = self.config.buffer_count;
        let duration = self.config.buffer_duration_secs;
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| RecorderError::InvalidState("no capture session".into()))?;

        let byte_size = compute_buffer_size(&session.format, &session.queue, duration)?;
        session.buffer_byte_size = Some(byte_size);
        log::debug!("allocating {} buffers of {} bytes", buffer_count, byte_size);

        for _ in 0..buffer_count {
            let buffer = session.queue.allocate_buffer(byte_size).map_err(|e| match e {
                RecorderError::BufferAllocationFailed(_) => e,
                other => RecorderError::BufferAllocationFailed(other.to_string()),
            })?;
            session.queue.enqueue_buffer(buffer)?;
            session.buffers.push(buffer);
        }

        self.running.store(true, Ordering::Release);
        session.queue.start()
    }

    /// Stop capture. Clears `running` first so no buffer is resubmitted, then
    /// stops the queue synchronously: once this returns, every captured
    /// packet has been written and no handler call is outstanding. Finally
    /// re-copies the magic cookie, which codecs may amend at session end.
    pub fn stop(&mut self) -> Result<(), RecorderError> {
        self.require(&[EngineState::Running], "stop")?;

        self.running.store(false, Ordering::Release);
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| RecorderError::InvalidState("no capture session".into()))?;
        session.queue.stop(true)?;

        self.set_state(EngineState::Stopped);
        self.copy_cookie("after stop");
        Ok(())
    }

    /// Release the capture queue and its buffers, then close the file.
    pub fn dispose(&mut self) -> Result<RecordingResult, RecorderError> {
        self.require(&[EngineState::Stopped, EngineState::Configured], "dispose")?;

        let session = self
            .session
            .take()
            .ok_or_else(|| RecorderError::InvalidState("no capture session".into()))?;
        let Session {
            queue,
            recorder,
            format,
            ..
        } = session;
        drop(queue);

        let (close_result, path, mut diagnostics) = {
            let mut state = recorder.lock();
            let path = state.file_mut().map(|f| f.path().to_path_buf());
            (state.close_file(), path, state.diagnostics().clone())
        };
        diagnostics.cookie_propagations = self.cookie_propagations;
        self.final_diagnostics = diagnostics.clone();
        self.set_state(EngineState::Disposed);
        close_result?;

        let file_path = path.unwrap_or_else(|| self.config.output_path.clone());
        let checksum = if file_path.exists() {
            match sha256_file(&file_path) {
                Ok(checksum) => Some(checksum),
                Err(e) => {
                    log::warn!("{}", e);
                    None
                }
            }
        } else {
            None
        };

        let duration_secs = duration_for_frames(diagnostics.frames_written, format.sample_rate);
        let metadata = RecordingMetadata::new(
            &format,
            &file_path.to_string_lossy(),
            &diagnostics,
            duration_secs,
            checksum.clone(),
        );
        if self.config.write_metadata_sidecar {
            if let Err(e) = write_metadata(&metadata, &file_path) {
                log::warn!("{}", e);
            }
        }

        let result = RecordingResult {
            file_path,
            packets_written: diagnostics.packets_written,
            frames_written: diagnostics.frames_written,
            duration_secs,
            checksum,
            metadata,
        };
        log::info!(
            "recorded {} packets ({:.2} s) to {}",
            result.packets_written,
            result.duration_secs,
            result.file_path.display()
        );

        if let Some(ref delegate) = self.delegate {
            delegate.on_recording_finished(&result);
        }
        Ok(result)
    }

    // --- Internal helpers ---

    fn require(&self, allowed: &[EngineState], operation: &str) -> Result<(), RecorderError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(RecorderError::InvalidState(format!(
                "cannot {} a {} recorder",
                operation, self.state
            )))
        }
    }

    fn set_state(&mut self, state: EngineState) {
        log::info!("recorder {} → {}", self.state, state);
        self.state = state;
        if let Some(ref delegate) = self.delegate {
            delegate.on_state_changed(state);
        }
    }

    /// Cookie failures never stop a recording.
    fn copy_cookie(&mut self, when: &str) {
        let Some(ref session) = self.session else {
            return;
        };
        self.cookie_propagations += 1;

        let mut state = session.recorder.lock();
        let Some(file) = state.file_mut() else {
            return;
        };
        match propagate_cookie(&session.queue, file) {
            Ok(CookieOutcome::Copied(len)) => log::debug!("magic cookie ({} bytes) written {}", len, when),
            Ok(CookieOutcome::Absent) => log::debug!("no magic cookie {}", when),
            Err(e) => log::warn!("could not copy magic cookie {}: {}", when, e),
        }
    }

    /// Tear down whatever is held, best effort.
    fn release_session(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let Session { queue, recorder, .. } = session;
        drop(queue);

        let mut state = recorder.lock();
        self.final_diagnostics = state.diagnostics().clone();
        if let Err(e) = state.close_file() {
            log::warn!("failed to close output file: {}", e);
        }
    }
}

impl<B: CaptureBackend, S: AudioFileService> Drop for Recorder<B, S> {
    fn drop(&mut self) {
        if !self.state.holds_resources() {
            return;
        }
        if self.state.is_running() {
            self.running.store(false, Ordering::Release);
            if let Some(ref session) = self.session {
                if let Err(e) = session.queue.stop(true) {
                    log::warn!("failed to stop capture queue: {}", e);
                }
            }
        }
        self.release_session();
    }
}
