/// Core Audio Format (CAF) container encoding.
///
/// All integers are big-endian. A file is an 8-byte header followed by chunks,
/// each a 12-byte header (`type`, signed 64-bit `size`) and a body:
/// ```text
/// [0-3]    "caff"
/// [4-5]    file version (1)
/// [6-7]    file flags (0)
/// [8-19]   "desc" chunk header, size 32
/// [20-51]  stream description
/// [..]     "kuki" / "free" / "data" / "pakt" chunks
/// ```
use crate::models::error::RecorderError;
use crate::models::format::{StreamFormat, FORMAT_FLAG_IS_BIG_ENDIAN, FORMAT_FLAG_IS_FLOAT};

pub const FILE_HEADER_SIZE: usize = 8;
pub const CHUNK_HEADER_SIZE: usize = 12;
pub const DESC_BODY_SIZE: usize = 32;
/// The `data` chunk body opens with a 32-bit edit count.
pub const EDIT_COUNT_SIZE: usize = 4;
/// Chunk size of a `data` chunk still being written.
pub const UNKNOWN_CHUNK_SIZE: i64 = -1;

pub const CHUNK_DESC: [u8; 4] = *b"desc";
pub const CHUNK_MAGIC_COOKIE: [u8; 4] = *b"kuki";
pub const CHUNK_DATA: [u8; 4] = *b"data";
pub const CHUNK_PACKET_TABLE: [u8; 4] = *b"pakt";
pub const CHUNK_FREE: [u8; 4] = *b"free";

/// CAF's own linear PCM flags, which differ from the stream format's.
pub const CAF_LPCM_FLAG_IS_FLOAT: u32 = 1 << 0;
pub const CAF_LPCM_FLAG_IS_LITTLE_ENDIAN: u32 = 1 << 1;

pub fn file_header() -> [u8; FILE_HEADER_SIZE] {
    let mut header = [0u8; FILE_HEADER_SIZE];
    header[0..4].copy_from_slice(b"caff");
    header[4..6].copy_from_slice(&1u16.to_be_bytes());
    header[6..8].copy_from_slice(&0u16.to_be_bytes());
    header
}

pub fn chunk_header(chunk_type: [u8; 4], size: i64) -> [u8; CHUNK_HEADER_SIZE] {
    let mut header = [0u8; CHUNK_HEADER_SIZE];
    header[0..4].copy_from_slice(&chunk_type);
    header[4..12].copy_from_slice(&size.to_be_bytes());
    header
}

/// Format flags as CAF stores them in `desc`.
pub fn caf_format_flags(format: &StreamFormat) -> u32 {
    if !format.is_linear_pcm() {
        return format.format_flags;
    }
    let mut flags = 0;
    if format.format_flags & FORMAT_FLAG_IS_FLOAT != 0 {
        flags |= CAF_LPCM_FLAG_IS_FLOAT;
    }
    if format.format_flags & FORMAT_FLAG_IS_BIG_ENDIAN == 0 {
        flags |= CAF_LPCM_FLAG_IS_LITTLE_ENDIAN;
    }
    flags
}

/// The complete `desc` chunk (header and body) for `format`.
///
/// Layout of the body:
/// ```text
/// [0-7]    sample rate (f64)
/// [8-11]   format id
/// [12-15]  format flags
/// [16-19]  bytes per packet
/// [20-23]  frames per packet
/// [24-27]  channels per frame
/// [28-31]  bits per channel
/// ```
pub fn desc_chunk(format: &StreamFormat) -> [u8; CHUNK_HEADER_SIZE + DESC_BODY_SIZE] {
    let mut chunk = [0u8; CHUNK_HEADER_SIZE + DESC_BODY_SIZE];
    chunk[0..12].copy_from_slice(&chunk_header(CHUNK_DESC, DESC_BODY_SIZE as i64));

    let body = &mut chunk[CHUNK_HEADER_SIZE..];
    body[0..8].copy_from_slice(&format.sample_rate.to_be_bytes());
    body[8..12].copy_from_slice(&format.format_id.0.to_be_bytes());
    body[12..16].copy_from_slice(&caf_format_flags(format).to_be_bytes());
    body[16..20].copy_from_slice(&format.bytes_per_packet.to_be_bytes());
    body[20..24].copy_from_slice(&format.frames_per_packet.to_be_bytes());
    body[24..28].copy_from_slice(&format.channels_per_frame.to_be_bytes());
    body[28..32].copy_from_slice(&format.bits_per_channel.to_be_bytes());
    chunk
}

/// A complete `kuki` chunk carrying `cookie`.
pub fn cookie_chunk(cookie: &[u8]) -> Vec<u8> {
    let mut chunk = Vec::with_capacity(CHUNK_HEADER_SIZE + cookie.len());
    chunk.extend_from_slice(&chunk_header(CHUNK_MAGIC_COOKIE, cookie.len() as i64));
    chunk.extend_from_slice(cookie);
    chunk
}

/// Append `value` as a CAF variable-length integer: 7 bits per byte, most
/// significant group first, high bit set on every byte but the last.
pub fn encode_vlq(value: u64, out: &mut Vec<u8>) {
    let mut groups = [0u8; 10];
    let mut count = 0;
    let mut remaining = value;
    loop {
        groups[count] = (remaining & 0x7f) as u8;
        count += 1;
        remaining >>= 7;
        if remaining == 0 {
            break;
        }
    }
    for i in (0..count).rev() {
        let continuation = if i == 0 { 0 } else { 0x80 };
        out.push(groups[i] | continuation);
    }
}

/// Decode one variable-length integer, returning it and the bytes consumed.
pub fn decode_vlq(bytes: &[u8]) -> Option<(u64, usize)> {
    let mut value: u64 = 0;
    for (i, &byte) in bytes.iter().enumerate().take(10) {
        value = (value << 7) | u64::from(byte & 0x7f);
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

/// A complete `pakt` chunk.
///
/// `packet_sizes` is empty for constant bytes-per-packet formats and
/// `packet_frames` for constant frames-per-packet formats; otherwise each
/// holds one entry per packet.
pub fn packet_table_chunk(
    packet_count: i64,
    valid_frames: i64,
    packet_sizes: &[u32],
    packet_frames: &[u32],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(24 + packet_sizes.len() * 2 + packet_frames.len() * 2);
    body.extend_from_slice(&packet_count.to_be_bytes());
    body.extend_from_slice(&valid_frames.to_be_bytes());
    body.extend_from_slice(&0i32.to_be_bytes()); // priming frames
    body.extend_from_slice(&0i32.to_be_bytes()); // remainder frames

    for i in 0..packet_count.max(0) as usize {
        if let Some(&size) = packet_sizes.get(i) {
            encode_vlq(u64::from(size), &mut body);
        }
        if let Some(&frames) = packet_frames.get(i) {
            encode_vlq(u64::from(frames), &mut body);
        }
    }

    let mut chunk = Vec::with_capacity(CHUNK_HEADER_SIZE + body.len());
    chunk.extend_from_slice(&chunk_header(CHUNK_PACKET_TABLE, body.len() as i64));
    chunk.extend_from_slice(&body);
    chunk
}

/// Location of one chunk inside a CAF file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkInfo {
    pub chunk_type: [u8; 4],
    /// Offset of the chunk body.
    pub body_offset: usize,
    pub body_size: usize,
}

/// List the chunks of an in-memory CAF file.
pub fn parse_chunks(bytes: &[u8]) -> Result<Vec<ChunkInfo>, RecorderError> {
    if bytes.len() < FILE_HEADER_SIZE || &bytes[0..4] != b"caff" {
        return Err(RecorderError::StorageError("not a CAF file".into()));
    }

    let mut chunks = Vec::new();
    let mut offset = FILE_HEADER_SIZE;
    while offset < bytes.len() {
        if bytes.len() - offset < CHUNK_HEADER_SIZE {
            return Err(RecorderError::StorageError(format!("truncated chunk header at {}", offset)));
        }
        let mut chunk_type = [0u8; 4];
        chunk_type.copy_from_slice(&bytes[offset..offset + 4]);
        let mut size = [0u8; 8];
        size.copy_from_slice(&bytes[offset + 4..offset + 12]);
        let size = i64::from_be_bytes(size);

        let body_offset = offset + CHUNK_HEADER_SIZE;
        let body_size = if size == UNKNOWN_CHUNK_SIZE {
            bytes.len() - body_offset
        } else {
            usize::try_from(size)
                .ok()
                .filter(|s| body_offset + s <= bytes.len())
                .ok_or_else(|| RecorderError::StorageError(format!("chunk at {} overruns the file", offset)))?
        };

        chunks.push(ChunkInfo {
            chunk_type,
            body_offset,
            body_size,
        });
        offset = body_offset + body_size;
    }
    Ok(chunks)
}
