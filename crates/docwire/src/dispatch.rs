use std::io::Write;

use docwire_document::{ParseError, ValueDocument};
use docwire_frame::{Delegate, Frame, FrameHeader, FrameWriter, Result};
use tracing::{trace, warn};

/// Receives documents decoded from frame payloads.
pub trait DocumentHandler {
    /// Called once per frame whose payload parsed as a document.
    fn handle_document(&mut self, header: &FrameHeader, document: ValueDocument);

    /// Called when a payload is not a readable document. The stream itself
    /// stays usable.
    fn handle_parse_error(&mut self, header: &FrameHeader, error: ParseError) {
        warn!(
            class_id = header.class_id,
            function_id = header.function_id,
            size = header.payload_size,
            %error,
            "dropping unreadable document payload"
        );
    }
}

/// [`Delegate`] that parses every payload into a [`ValueDocument`].
///
/// An empty payload is delivered as an empty document.
#[derive(Debug, Default)]
pub struct DocumentDelegate<H> {
    handler: H,
}

impl<H> DocumentDelegate<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }
}

impl<H: DocumentHandler> Delegate for DocumentDelegate<H> {
    fn handle(&mut self, header: &FrameHeader, payload: &[u8]) {
        if payload.is_empty() {
            trace!(class_id = header.class_id, "empty payload");
            self.handler.handle_document(header, ValueDocument::new());
            return;
        }

        match ValueDocument::parse(payload) {
            Ok(document) => self.handler.handle_document(header, document),
            Err(err) => self.handler.handle_parse_error(header, err),
        }
    }
}

/// Build the frame carrying `document`, routed by the document's own ids.
pub fn document_frame(document: &ValueDocument) -> Result<Frame> {
    Frame::new(
        document.class_id(),
        document.function_id(),
        document.serialize(),
    )
}

/// Serialize `document` and write it as one frame.
pub fn send_document<W: Write>(writer: &mut FrameWriter<W>, document: &ValueDocument) -> Result<()> {
    writer.send(
        document.class_id(),
        document.function_id(),
        &document.serialize(),
    )
}
