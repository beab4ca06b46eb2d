use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::Serialize;

use crate::error::{FrameError, Result};

/// Frame header: magic (2) + version (2) + class id (4) + function id (4) + length (4).
pub const HEADER_SIZE: usize = 16;

/// Magic bytes: "DW" (0x44 0x57).
pub const MAGIC: [u8; 2] = [0x44, 0x57];

/// Wire format version carried in every header.
pub const PROTOCOL_VERSION: u16 = 1;

/// Routing id used when a header field is unset.
pub const UNSET_ID: i32 = -1;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Default number of bytes pulled from a source per read call.
pub const DEFAULT_READ_CHUNK: usize = 8 * 1024;

/// Fixed-size envelope read at every message boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameHeader {
    /// Signature bytes, [`MAGIC`] on a well-formed header.
    pub magic: [u8; 2],
    /// Wire version, [`PROTOCOL_VERSION`] on a well-formed header.
    pub version: u16,
    /// Coarse routing class.
    pub class_id: i32,
    /// Coarse routing function within the class.
    pub function_id: i32,
    /// Number of payload bytes following the header.
    pub payload_size: u32,
}

impl FrameHeader {
    /// Create a well-formed header.
    pub fn new(class_id: i32, function_id: i32, payload_size: u32) -> Self {
        Self {
            magic: MAGIC,
            version: PROTOCOL_VERSION,
            class_id,
            function_id,
            payload_size,
        }
    }

    /// True iff magic and version match the constants of this wire format.
    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC && self.version == PROTOCOL_VERSION
    }

    /// Payload length as a buffer size.
    pub fn payload_len(&self) -> usize {
        self.payload_size as usize
    }
}

impl Default for FrameHeader {
    fn default() -> Self {
        Self::new(UNSET_ID, UNSET_ID, 0)
    }
}

/// A framed message with its routing header.
#[derive(Debug, Clone)]
pub struct Frame {
    /// The header as it appears on the wire.
    pub header: FrameHeader,
    /// The message payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame; the header length is taken from the payload.
    ///
    /// Fails with [`FrameError::PayloadTooLarge`] when the payload length does
    /// not fit the 32-bit length field.
    pub fn new(class_id: i32, function_id: i32, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        let size = wire_length(payload.len())?;
        Ok(Self {
            header: FrameHeader::new(class_id, function_id, size),
            payload,
        })
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Append the wire form of `header` to `dst`.
///
/// Wire format (little-endian):
/// ```text
/// ┌────────────┬───────────┬────────────┬─────────────┬──────────────┬─────────────────┐
/// │ Magic (2B) │ Version   │ Class id   │ Function id │ Length       │ Payload         │
/// │ 0x44 0x57  │ (2B LE)   │ (4B LE i32)│ (4B LE i32) │ (4B LE u32)  │ (Length bytes)  │
/// │ "DW"       │           │            │             │              │                 │
/// └────────────┴───────────┴────────────┴─────────────┴──────────────┴─────────────────┘
/// ```
pub fn encode_header(header: &FrameHeader, dst: &mut BytesMut) {
    dst.reserve(HEADER_SIZE);
    dst.put_slice(&header.magic);
    dst.put_u16_le(header.version);
    dst.put_i32_le(header.class_id);
    dst.put_i32_le(header.function_id);
    dst.put_u32_le(header.payload_size);
}

/// Read a header from exactly [`HEADER_SIZE`] bytes.
///
/// Never fails: validity is a property of the result, see [`FrameHeader::is_valid`].
pub fn decode_header(src: &[u8; HEADER_SIZE]) -> FrameHeader {
    let mut buf = &src[..];
    let mut magic = [0u8; 2];
    buf.copy_to_slice(&mut magic);
    FrameHeader {
        magic,
        version: buf.get_u16_le(),
        class_id: buf.get_i32_le(),
        function_id: buf.get_i32_le(),
        payload_size: buf.get_u32_le(),
    }
}

/// Encode a complete frame (header + payload) into the wire format.
pub fn encode_frame(
    class_id: i32,
    function_id: i32,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    let size = wire_length(payload.len())?;
    dst.reserve(HEADER_SIZE + payload.len());
    encode_header(&FrameHeader::new(class_id, function_id, size), dst);
    dst.put_slice(payload);
    Ok(())
}

/// Length field value for a payload of `len` bytes.
fn wire_length(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| FrameError::PayloadTooLarge {
        size: len,
        max: u32::MAX as usize,
    })
}

/// Configuration for framing.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Bytes requested from a source per read. Default: 8 KiB.
    pub read_chunk_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_chunk_size: DEFAULT_READ_CHUNK,
        }
    }
}
