use std::fs::File;
use std::io::Read;

use docwire::{DocumentDelegate, DocumentHandler};
use docwire_document::{ParseError, ValueDocument};
use docwire_frame::{Demultiplexer, FrameConfig, FrameHeader};
use tracing::{debug, info};

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_document, print_unreadable, OutputFormat};

struct Printer {
    format: OutputFormat,
    documents: usize,
    unreadable: usize,
}

impl DocumentHandler for Printer {
    fn handle_document(&mut self, header: &FrameHeader, document: ValueDocument) {
        self.documents += 1;
        print_document(header, &document, self.format);
    }

    fn handle_parse_error(&mut self, header: &FrameHeader, error: ParseError) {
        self.unreadable += 1;
        debug!(class_id = header.class_id, %error, "unreadable payload");
        print_unreadable(header, &error.to_string(), self.format);
    }
}

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    if args.chunk_size == 0 {
        return Err(CliError::usage("--chunk-size must be at least 1"));
    }

    let config = FrameConfig {
        max_payload_size: args.max_payload,
        read_chunk_size: args.chunk_size,
    };
    let printer = Printer {
        format,
        documents: 0,
        unreadable: 0,
    };
    let mut demux = Demultiplexer::with_config(DocumentDelegate::new(printer), config);

    let mut source: Box<dyn Read> = match &args.path {
        Some(path) => Box::new(
            File::open(path).map_err(|e| io_error(&format!("open {}", path.display()), e))?,
        ),
        None => Box::new(std::io::stdin().lock()),
    };

    let summary = demux
        .on_ready_read(source.as_mut())
        .map_err(|e| frame_error("decode failed", e))?;

    let printer = demux.into_delegate().into_handler();
    info!(
        frames = summary.frames,
        documents = printer.documents,
        unreadable = printer.unreadable,
        "stream decoded"
    );

    if printer.unreadable > 0 {
        return Ok(DATA_INVALID);
    }
    Ok(SUCCESS)
}
