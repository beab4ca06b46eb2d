//! Fixed-header message framing and stream demultiplexing.
//!
//! Every message on the wire is a 16-byte header followed by its payload:
//! - A 2-byte magic number ("DW") and a 2-byte little-endian version, which
//!   together decide whether the header is valid
//! - Little-endian `i32` class and function ids for coarse routing
//! - A 4-byte little-endian payload length
//!
//! The [`Demultiplexer`] turns an incrementally delivered byte stream into
//! complete frames and hands them, in order, to a [`Delegate`].

pub mod codec;
pub mod demux;
pub mod error;
pub mod writer;

pub use codec::{
    decode_header, encode_frame, encode_header, Frame, FrameConfig, FrameHeader,
    DEFAULT_MAX_PAYLOAD, DEFAULT_READ_CHUNK, HEADER_SIZE, MAGIC, PROTOCOL_VERSION, UNSET_ID,
};
pub use demux::{from_fn, Delegate, Demultiplexer, FnDelegate, ReadSummary};
pub use error::{FrameError, Result};
pub use writer::FrameWriter;
