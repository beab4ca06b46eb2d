//! Framed, self-describing typed value documents over byte streams.
//!
//! docwire splits a byte stream into fixed-header frames and carries a
//! [`ValueDocument`](document::ValueDocument) in each payload.
//!
//! # Crate Structure
//!
//! - [`frame`]: Fixed-header framing and the incremental stream demultiplexer
//! - [`document`]: Typed value documents and their XML text form
//! - [`dispatch`]: Glue that parses frame payloads into documents and frames documents for sending

pub mod dispatch;

/// Re-export frame types.
pub mod frame {
    pub use docwire_frame::*;
}

/// Re-export document types.
pub mod document {
    pub use docwire_document::*;
}

pub use dispatch::{document_frame, send_document, DocumentDelegate, DocumentHandler};
