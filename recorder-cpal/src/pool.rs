//! Fixed pool of capture buffers filled from a byte stream.
//!
//! Buffers cycle through three places: free (enqueued, waiting to be
//! filled), filling (at most one), and out with the handler. A buffer the
//! handler releases never returns.

use std::collections::VecDeque;

use recorder_core::models::error::RecorderError;
use recorder_core::traits::capture_queue::{BufferDisposition, BufferId, FilledBuffer, SharedInputHandler};

struct PoolBuffer {
    data: Vec<u8>,
    /// Whole frames only.
    capacity: usize,
}

pub struct BufferPool {
    buffers: Vec<PoolBuffer>,
    free: VecDeque<BufferId>,
    filling: Option<BufferId>,
    bytes_per_frame: usize,
    handler: SharedInputHandler,
    dropped_bytes: u64,
}

impl BufferPool {
    pub fn new(bytes_per_frame: u32, handler: SharedInputHandler) -> Self {
        Self {
            buffers: Vec::new(),
            free: VecDeque::new(),
            filling: None,
            bytes_per_frame: bytes_per_frame.max(1) as usize,
            handler,
            dropped_bytes: 0,
        }
    }

    pub fn allocate(&mut self, byte_capacity: u32) -> Result<BufferId, RecorderError> {
        let capacity = byte_capacity as usize / self.bytes_per_frame * self.bytes_per_frame;
        if capacity == 0 {
            return Err(RecorderError::BufferAllocationFailed(format!(
                "{} bytes cannot hold a {} byte frame",
                byte_capacity, self.bytes_per_frame
            )));
        }
        self.buffers.push(PoolBuffer {
            data: Vec::with_capacity(capacity),
            capacity,
        });
        Ok(BufferId(self.buffers.len() - 1))
    }

    pub fn enqueue(&mut self, buffer: BufferId) -> Result<(), RecorderError> {
        let entry = self
            .buffers
            .get_mut(buffer.0)
            .ok_or_else(|| RecorderError::QueueControlFailed(format!("unknown buffer {}", buffer.0)))?;
        if self.filling == Some(buffer) || self.free.contains(&buffer) {
            return Err(RecorderError::QueueControlFailed(format!("buffer {} already enqueued", buffer.0)));
        }
        entry.data.clear();
        self.free.push_back(buffer);
        Ok(())
    }

    /// Bytes discarded because no buffer was enqueued to take them.
    pub fn dropped_bytes(&self) -> u64 {
        self.dropped_bytes
    }

    /// Copy `bytes` into enqueued buffers, handing each one to the handler
    /// as it fills.
    pub fn push(&mut self, mut bytes: &[u8]) {
        while !bytes.is_empty() {
            let Some(id) = self.current() else {
                self.dropped_bytes += bytes.len() as u64;
                return;
            };
            let buffer = &mut self.buffers[id.0];
            let take = (buffer.capacity - buffer.data.len()).min(bytes.len());
            buffer.data.extend_from_slice(&bytes[..take]);
            bytes = &bytes[take..];

            if buffer.data.len() == buffer.capacity {
                self.deliver(id);
            }
        }
    }

    /// Hand over the partially filled buffer, if any. Trailing bytes short of
    /// a whole frame are discarded.
    pub fn flush(&mut self) {
        let Some(id) = self.filling else {
            return;
        };
        let buffer = &mut self.buffers[id.0];
        let whole = buffer.data.len() / self.bytes_per_frame * self.bytes_per_frame;
        buffer.data.truncate(whole);
        if whole == 0 {
            return;
        }
        self.deliver(id);
    }

    fn current(&mut self) -> Option<BufferId> {
        if self.filling.is_none() {
            self.filling = self.free.pop_front();
        }
        self.filling
    }

    fn deliver(&mut self, id: BufferId) {
        self.filling = None;
        let data = std::mem::take(&mut self.buffers[id.0].data);
        let packet_count = (data.len() / self.bytes_per_frame) as u32;

        let disposition = self.handler.lock().on_buffer_filled(FilledBuffer {
            buffer: id,
            data: &data,
            packet_count,
            packet_descriptions: &[],
        });

        let buffer = &mut self.buffers[id.0];
        buffer.data = data;
        buffer.data.clear();
        if disposition == BufferDisposition::Resubmit {
            self.free.push_back(id);
        }
    }
}
