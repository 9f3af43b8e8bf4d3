use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::models::error::RecorderError;
use crate::models::format::{PacketDescription, StreamFormat};
use crate::processing::caf_format;
use crate::traits::audio_file::{AudioFile, AudioFileService, FileFlags};

/// Creates [`CafFileWriter`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct CafFileService;

impl AudioFileService for CafFileService {
    type File = CafFileWriter;

    fn create(
        &self,
        path: &Path,
        format: &StreamFormat,
        flags: FileFlags,
    ) -> Result<CafFileWriter, RecorderError> {
        CafFileWriter::create(path, format, flags)
    }
}

/// Streaming CAF writer.
///
/// ## File Layout
///
/// ```text
/// [caff header] [desc]
/// [kuki]               ← cookie set before the first packet
/// [data: edit count | packets...]
/// [kuki]               ← cookie replaced with a different length after data began
/// [pakt]               ← variable packet sizes or frame counts
/// ```
///
/// A cookie replaced after data began keeps its slot when the length matches;
/// otherwise the old chunk is retyped `free` and the new one follows `data`.
pub struct CafFileWriter {
    path: PathBuf,
    file: Option<File>,
    format: StreamFormat,
    /// Offset one past the last chunk laid out so far.
    end: u64,
    data_chunk_offset: Option<u64>,
    data_bytes: u64,
    packet_count: i64,
    valid_frames: i64,
    packet_sizes: Vec<u32>,
    packet_frames: Vec<u32>,
    /// Offset and body length of the `kuki` chunk ahead of `data`.
    cookie_chunk: Option<(u64, usize)>,
    trailing_cookie: Option<Vec<u8>>,
}

impl CafFileWriter {
    /// Create the file and write the header and `desc` chunk for `format`.
    pub fn create(path: &Path, format: &StreamFormat, flags: FileFlags) -> Result<Self, RecorderError> {
        if !flags.erase_existing && path.exists() {
            return Err(RecorderError::FileCreationFailed(format!(
                "{} already exists",
                path.display()
            )));
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                RecorderError::FileCreationFailed(format!("failed to create directory: {}", e))
            })?;
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| RecorderError::FileCreationFailed(format!("failed to create {}: {}", path.display(), e)))?;

        let header = caf_format::file_header();
        let desc = caf_format::desc_chunk(format);
        file.write_all(&header)
            .and_then(|_| file.write_all(&desc))
            .map_err(|e| RecorderError::FileCreationFailed(format!("failed to write CAF header: {}", e)))?;

        log::debug!("created {} for {}", path.display(), format);

        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            format: *format,
            end: (header.len() + desc.len()) as u64,
            data_chunk_offset: None,
            data_bytes: 0,
            packet_count: 0,
            valid_frames: 0,
            packet_sizes: Vec::new(),
            packet_frames: Vec::new(),
            cookie_chunk: None,
            trailing_cookie: None,
        })
    }

    /// Packets written so far.
    pub fn packet_count(&self) -> i64 {
        self.packet_count
    }

    /// Audio bytes written so far, excluding chunk headers.
    pub fn data_bytes(&self) -> u64 {
        self.data_bytes
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> std::io::Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| std::io::Error::other("file is not open"))?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(bytes)
    }

    /// Lay out the `data` chunk header if no packet has been written yet.
    fn begin_data(&mut self) -> std::io::Result<u64> {
        if let Some(offset) = self.data_chunk_offset {
            return Ok(offset);
        }
        let offset = self.end;
        let mut header = caf_format::chunk_header(caf_format::CHUNK_DATA, caf_format::UNKNOWN_CHUNK_SIZE).to_vec();
        header.extend_from_slice(&0u32.to_be_bytes()); // edit count
        self.write_at(offset, &header)?;
        self.data_chunk_offset = Some(offset);
        self.end = offset + header.len() as u64;
        Ok(offset)
    }

    fn data_start(offset: u64) -> u64 {
        offset + (caf_format::CHUNK_HEADER_SIZE + caf_format::EDIT_COUNT_SIZE) as u64
    }

    fn append_cookie_chunk(&mut self, cookie: &[u8]) -> std::io::Result<()> {
        let offset = self.end;
        self.write_at(offset, &caf_format::cookie_chunk(cookie))?;
        self.cookie_chunk = Some((offset, cookie.len()));
        self.end = offset + (caf_format::CHUNK_HEADER_SIZE + cookie.len()) as u64;
        Ok(())
    }

    fn retire_cookie_chunk(&mut self) -> std::io::Result<()> {
        if let Some((offset, _)) = self.cookie_chunk.take() {
            self.write_at(offset, &caf_format::CHUNK_FREE)?;
        }
        Ok(())
    }

    /// Gather the bytes of `packet_count` packets described by `descriptions`.
    fn variable_packets(
        data: &[u8],
        descriptions: &[PacketDescription],
        packet_count: u32,
    ) -> Result<Vec<u8>, RecorderError> {
        if descriptions.len() < packet_count as usize {
            return Err(RecorderError::PacketWriteFailed(format!(
                "{} packets need descriptions but {} were given",
                packet_count,
                descriptions.len()
            )));
        }
        let mut payload = Vec::with_capacity(data.len());
        for description in &descriptions[..packet_count as usize] {
            let start = usize::try_from(description.start_offset).ok();
            let end = start.and_then(|s| s.checked_add(description.data_byte_size as usize));
            match (start, end) {
                (Some(start), Some(end)) if end <= data.len() => payload.extend_from_slice(&data[start..end]),
                _ => {
                    return Err(RecorderError::PacketWriteFailed(format!(
                        "packet at offset {} ({} bytes) lies outside a {} byte buffer",
                        description.start_offset,
                        description.data_byte_size,
                        data.len()
                    )))
                }
            }
        }
        Ok(payload)
    }
}

impl AudioFile for CafFileWriter {
    fn write_packets(
        &mut self,
        data: &[u8],
        packet_descriptions: &[PacketDescription],
        starting_packet: i64,
        packet_count: u32,
    ) -> Result<u32, RecorderError> {
        if !self.is_open() {
            return Err(RecorderError::PacketWriteFailed("file is not open".into()));
        }
        if starting_packet != self.packet_count {
            return Err(RecorderError::PacketWriteFailed(format!(
                "non-contiguous write: next packet is {}, got {}",
                self.packet_count, starting_packet
            )));
        }
        if packet_count == 0 {
            return Ok(0);
        }

        if self.format.frames_per_packet == 0 && packet_descriptions.len() < packet_count as usize {
            return Err(RecorderError::PacketWriteFailed(format!(
                "{} packets need frame counts but {} descriptions were given",
                packet_count,
                packet_descriptions.len()
            )));
        }

        let variable = !self.format.has_constant_packet_size();
        let gathered;
        let payload: &[u8] = if variable {
            gathered = Self::variable_packets(data, packet_descriptions, packet_count)?;
            &gathered
        } else {
            let len = packet_count as usize * self.format.bytes_per_packet as usize;
            if len > data.len() {
                return Err(RecorderError::PacketWriteFailed(format!(
                    "{} packets need {} bytes but the buffer holds {}",
                    packet_count,
                    len,
                    data.len()
                )));
            }
            &data[..len]
        };

        let data_chunk = self
            .begin_data()
            .map_err(|e| RecorderError::PacketWriteFailed(format!("failed to start data chunk: {}", e)))?;
        let offset = Self::data_start(data_chunk) + self.data_bytes;
        self.write_at(offset, payload)
            .map_err(|e| RecorderError::PacketWriteFailed(format!("write failed: {}", e)))?;

        self.data_bytes += payload.len() as u64;
        self.end = Self::data_start(data_chunk) + self.data_bytes;
        self.packet_count += i64::from(packet_count);

        let descriptions = packet_descriptions.iter().take(packet_count as usize);
        if variable {
            self.packet_sizes
                .extend(descriptions.clone().map(|d| d.data_byte_size));
        }
        if self.format.frames_per_packet > 0 {
            self.valid_frames += i64::from(packet_count) * i64::from(self.format.frames_per_packet);
        } else {
            self.packet_frames
                .extend(descriptions.clone().map(|d| d.variable_frames));
            self.valid_frames += descriptions.map(|d| i64::from(d.variable_frames)).sum::<i64>();
        }

        Ok(packet_count)
    }

    fn set_magic_cookie(&mut self, cookie: &[u8]) -> Result<(), RecorderError> {
        if !self.is_open() {
            return Err(RecorderError::StorageError("file is not open".into()));
        }
        if cookie.is_empty() {
            return Ok(());
        }

        let result = match (self.data_chunk_offset, self.cookie_chunk) {
            (_, Some((offset, len))) if len == cookie.len() => {
                self.trailing_cookie = None;
                self.write_at(offset + caf_format::CHUNK_HEADER_SIZE as u64, cookie)
            }
            (None, _) => self
                .retire_cookie_chunk()
                .and_then(|_| self.append_cookie_chunk(cookie)),
            (Some(_), _) => {
                self.trailing_cookie = Some(cookie.to_vec());
                self.retire_cookie_chunk()
            }
        };
        result.map_err(|e| RecorderError::StorageError(format!("failed to store magic cookie: {}", e)))
    }

    fn close(&mut self) -> Result<(), RecorderError> {
        if !self.is_open() {
            return Err(RecorderError::StorageError("file is not open".into()));
        }

        let finish = |writer: &mut Self| -> std::io::Result<()> {
            let data_chunk = writer.begin_data()?;
            let data_size = (caf_format::EDIT_COUNT_SIZE as u64 + writer.data_bytes) as i64;
            writer.write_at(data_chunk + 4, &data_size.to_be_bytes())?;

            let mut tail = Vec::new();
            if let Some(cookie) = writer.trailing_cookie.take() {
                tail.extend_from_slice(&caf_format::cookie_chunk(&cookie));
            }
            if writer.format.needs_packet_table() {
                tail.extend_from_slice(&caf_format::packet_table_chunk(
                    writer.packet_count,
                    writer.valid_frames,
                    &writer.packet_sizes,
                    &writer.packet_frames,
                ));
            }
            let end = writer.end;
            writer.write_at(end, &tail)?;
            writer.end += tail.len() as u64;

            if let Some(file) = writer.file.as_mut() {
                file.flush()?;
                file.sync_all()?;
            }
            Ok(())
        };

        let result = finish(self);
        self.file = None;
        result.map_err(|e| RecorderError::StorageError(format!("failed to finalize {}: {}", self.path.display(), e)))?;

        log::debug!(
            "closed {}: {} packets, {} bytes of audio",
            self.path.display(),
            self.packet_count,
            self.data_bytes
        );
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CafFileWriter {
    fn drop(&mut self) {
        if self.is_open() {
            if let Err(e) = self.close() {
                log::warn!("{}", e);
            }
        }
    }
}
