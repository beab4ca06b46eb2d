/// Errors that can occur during frame encoding/decoding.
///
/// Every variant is fatal to the connection it was raised on: the wire format
/// has no resynchronization marker, so the stream cannot be recovered.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame header carries an unexpected magic or version.
    #[error("invalid frame header (magic {magic:02x?}, version {version})")]
    InvalidHeader { magic: [u8; 2], version: u16 },

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
