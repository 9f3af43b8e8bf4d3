//! AudioQueue input capture.
//!
//! The queue owns its buffers and an encoder (audio converter). Core Audio
//! calls [`input_callback`] on the queue's own thread each time a buffer has
//! been filled; the callback hands the packets to the recorder's handler and
//! re-enqueues the buffer when the handler asks for it.

use std::ffi::c_void;
use std::mem;
use std::ptr;
use std::slice;
use std::sync::atomic::{AtomicU32, Ordering};

use coreaudio_sys::{
    kAudioConverterCompressionMagicCookie, kAudioConverterCurrentOutputStreamDescription,
    kAudioConverterPropertyMaximumOutputPacketSize, kAudioQueueProperty_MagicCookie,
    AudioQueueAllocateBuffer, AudioQueueBufferRef, AudioQueueDispose, AudioQueueEnqueueBuffer,
    AudioQueueGetProperty, AudioQueueGetPropertySize, AudioQueueNewInput, AudioQueuePropertyID, AudioQueueRef,
    AudioQueueStart, AudioQueueStop, AudioStreamBasicDescription, AudioStreamPacketDescription, AudioTimeStamp,
};
use parking_lot::Mutex;

use recorder_core::models::error::RecorderError;
use recorder_core::models::format::{PacketDescription, StreamFormat};
use recorder_core::traits::capture_queue::{
    BufferDisposition, BufferId, CaptureQueue, FilledBuffer, SharedInputHandler,
};

use crate::asbd::{from_asbd, to_asbd};
use crate::status::{check, describe_status};

/// State the input callback reaches through the queue's user-data pointer.
struct QueueContext {
    handler: SharedInputHandler,
    /// Non-zero for constant-bitrate formats, whose callbacks carry no packet
    /// descriptions.
    bytes_per_packet: AtomicU32,
}

/// An AudioQueue recording from the default input device.
pub struct CoreAudioQueue {
    queue: AudioQueueRef,
    context: *mut QueueContext,
    buffers: Mutex<Vec<AudioQueueBufferRef>>,
}

// SAFETY: AudioQueue functions are thread-safe. The buffer list is
// Mutex-protected, and the context is only read from the callback thread
// until Drop disposes the queue synchronously and frees it.
unsafe impl Send for CoreAudioQueue {}
unsafe impl Sync for CoreAudioQueue {}

impl CoreAudioQueue {
    /// Create an input queue encoding to `format` and delivering to `handler`.
    pub fn new_input(format: &StreamFormat, handler: SharedInputHandler) -> Result<Self, RecorderError> {
        let asbd = to_asbd(format);
        let context = Box::into_raw(Box::new(QueueContext {
            handler,
            bytes_per_packet: AtomicU32::new(format.bytes_per_packet),
        }));

        let mut queue: AudioQueueRef = ptr::null_mut();
        // SAFETY: `context` stays alive until the queue is disposed in Drop.
        let status = unsafe {
            AudioQueueNewInput(
                &asbd,
                Some(input_callback),
                context as *mut c_void,
                ptr::null_mut(),
                ptr::null(),
                0,
                &mut queue,
            )
        };
        if let Err(e) = check(status, "create input queue", RecorderError::QueueCreationFailed) {
            // SAFETY: no queue references the context.
            drop(unsafe { Box::from_raw(context) });
            return Err(e);
        }

        let this = Self {
            queue,
            context,
            buffers: Mutex::new(Vec::new()),
        };
        if let Ok(actual) = this.current_format() {
            this.context().bytes_per_packet.store(actual.bytes_per_packet, Ordering::Release);
        }
        Ok(this)
    }

    fn context(&self) -> &QueueContext {
        // SAFETY: allocated in `new_input`, freed only in Drop.
        unsafe { &*self.context }
    }

    fn get_property<T>(&self, id: u32, value: &mut T, what: &str) -> Result<u32, RecorderError> {
        let mut size = mem::size_of::<T>() as u32;
        // SAFETY: `value` is a valid, writable `T` of exactly `size` bytes.
        let status = unsafe {
            AudioQueueGetProperty(
                self.queue,
                id as AudioQueuePropertyID,
                value as *mut T as *mut c_void,
                &mut size,
            )
        };
        check(status, what, RecorderError::PropertyQueryFailed)?;
        Ok(size)
    }
}

impl CaptureQueue for CoreAudioQueue {
    fn current_format(&self) -> Result<StreamFormat, RecorderError> {
        // SAFETY: plain-data struct; all-zero is a valid value.
        let mut asbd: AudioStreamBasicDescription = unsafe { mem::zeroed() };
        self.get_property(
            kAudioConverterCurrentOutputStreamDescription as u32,
            &mut asbd,
            "get queue output format",
        )?;
        Ok(from_asbd(&asbd))
    }

    fn max_output_packet_size(&self) -> Result<u32, RecorderError> {
        let mut size: u32 = 0;
        self.get_property(
            kAudioConverterPropertyMaximumOutputPacketSize as u32,
            &mut size,
            "get maximum output packet size",
        )?;
        Ok(size)
    }

    fn magic_cookie_size(&self) -> Result<usize, RecorderError> {
        let mut size: u32 = 0;
        // SAFETY: the queue is live until Drop.
        let status = unsafe {
            AudioQueueGetPropertySize(
                self.queue,
                kAudioConverterCompressionMagicCookie as AudioQueuePropertyID,
                &mut size,
            )
        };
        check(status, "get magic cookie size", RecorderError::PropertyQueryFailed)?;
        Ok(size as usize)
    }

    fn copy_magic_cookie(&self, cookie: &mut [u8]) -> Result<usize, RecorderError> {
        let mut size = cookie.len() as u32;
        // SAFETY: `cookie` is writable for `size` bytes.
        let status = unsafe {
            AudioQueueGetProperty(
                self.queue,
                kAudioQueueProperty_MagicCookie as AudioQueuePropertyID,
                cookie.as_mut_ptr() as *mut c_void,
                &mut size,
            )
        };
        check(status, "get magic cookie", RecorderError::PropertyQueryFailed)?;
        Ok((size as usize).min(cookie.len()))
    }

    fn allocate_buffer(&self, byte_capacity: u32) -> Result<BufferId, RecorderError> {
        let mut buffer: AudioQueueBufferRef = ptr::null_mut();
        // SAFETY: the queue is live; it owns the buffer until disposed.
        let status = unsafe { AudioQueueAllocateBuffer(self.queue, byte_capacity, &mut buffer) };
        check(status, "allocate queue buffer", RecorderError::BufferAllocationFailed)?;
        if buffer.is_null() {
            return Err(RecorderError::BufferAllocationFailed("queue returned no buffer".into()));
        }

        let mut buffers = self.buffers.lock();
        let id = BufferId(buffers.len());
        // SAFETY: freshly allocated, not yet enqueued.
        unsafe { (*buffer).mUserData = id.0 as *mut c_void };
        buffers.push(buffer);
        Ok(id)
    }

    fn enqueue_buffer(&self, buffer: BufferId) -> Result<(), RecorderError> {
        let raw = self
            .buffers
            .lock()
            .get(buffer.0)
            .copied()
            .ok_or_else(|| RecorderError::QueueControlFailed(format!("unknown buffer {}", buffer.0)))?;
        // SAFETY: `raw` belongs to this queue.
        let status = unsafe { AudioQueueEnqueueBuffer(self.queue, raw, 0, ptr::null()) };
        check(status, "enqueue buffer", RecorderError::QueueControlFailed)
    }

    fn start(&self) -> Result<(), RecorderError> {
        // SAFETY: the queue is live until Drop.
        let status = unsafe { AudioQueueStart(self.queue, ptr::null()) };
        check(status, "start queue", RecorderError::QueueControlFailed)
    }

    fn stop(&self, immediate: bool) -> Result<(), RecorderError> {
        // SAFETY: the queue is live until Drop. An immediate stop returns only
        // after the last callback has finished.
        let status = unsafe { AudioQueueStop(self.queue, u8::from(immediate)) };
        check(status, "stop queue", RecorderError::QueueControlFailed)
    }
}

impl Drop for CoreAudioQueue {
    fn drop(&mut self) {
        // SAFETY: disposing immediately stops callbacks before returning, so
        // the context can be freed afterwards. Buffers go with the queue.
        unsafe {
            let status = AudioQueueDispose(self.queue, 1);
            if status != 0 {
                log::warn!("failed to dispose input queue ({})", describe_status(status));
            }
            drop(Box::from_raw(self.context));
        }
        self.buffers.lock().clear();
    }
}

/// Called by Core Audio on the queue's thread when a buffer has been filled.
unsafe extern "C" fn input_callback(
    user_data: *mut c_void,
    queue: AudioQueueRef,
    buffer: AudioQueueBufferRef,
    _start_time: *const AudioTimeStamp,
    packet_description_count: u32,
    packet_descriptions: *const AudioStreamPacketDescription,
) {
    if user_data.is_null() || buffer.is_null() {
        return;
    }
    let context = &*(user_data as *const QueueContext);
    let raw = &*buffer;

    let data: &[u8] = if raw.mAudioData.is_null() {
        &[]
    } else {
        slice::from_raw_parts(raw.mAudioData as *const u8, raw.mAudioDataByteSize as usize)
    };

    let descriptions: Vec<PacketDescription> = if packet_descriptions.is_null() {
        Vec::new()
    } else {
        slice::from_raw_parts(packet_descriptions, packet_description_count as usize)
            .iter()
            .map(|d| PacketDescription {
                start_offset: d.mStartOffset,
                variable_frames: d.mVariableFramesInPacket,
                data_byte_size: d.mDataByteSize,
            })
            .collect()
    };

    // Constant-bitrate buffers arrive without descriptions.
    let bytes_per_packet = context.bytes_per_packet.load(Ordering::Acquire);
    let packet_count = if packet_description_count == 0 && bytes_per_packet > 0 {
        raw.mAudioDataByteSize / bytes_per_packet
    } else {
        packet_description_count
    };

    let disposition = context.handler.lock().on_buffer_filled(FilledBuffer {
        buffer: BufferId(raw.mUserData as usize),
        data,
        packet_count,
        packet_descriptions: &descriptions,
    });

    if disposition == BufferDisposition::Resubmit {
        let status = AudioQueueEnqueueBuffer(queue, buffer, 0, ptr::null());
        if status != 0 {
            log::error!("failed to re-enqueue buffer ({})", describe_status(status));
        }
    }
}
