//! Send documents over a loopback TCP connection and print what arrives.
//!
//! Run with: `cargo run -p docwire --example loopback`

use std::net::{TcpListener, TcpStream};
use std::thread;

use docwire::document::ValueDocument;
use docwire::frame::{Demultiplexer, FrameHeader, FrameWriter};
use docwire::{send_document, DocumentDelegate, DocumentHandler};

struct Print;

impl DocumentHandler for Print {
    fn handle_document(&mut self, header: &FrameHeader, document: ValueDocument) {
        println!(
            "[class {} function {}] {} bytes",
            header.class_id, header.function_id, header.payload_size
        );
        for key in document.key_names(None) {
            println!("  {key} = {:?}", document.value(None, key));
        }
        for group in document.group_names() {
            for key in document.key_names(Some(group)) {
                println!("  {group}/{key} = {:?}", document.value(Some(group), key));
            }
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;

    let server = thread::spawn(move || -> docwire::frame::Result<()> {
        let (mut stream, peer) = listener.accept()?;
        println!("accepted {peer}");
        let mut demux = Demultiplexer::new(DocumentDelegate::new(Print));
        let summary = demux.on_ready_read(&mut stream)?;
        println!("received {} frames", summary.frames);
        Ok(())
    });

    let mut writer = FrameWriter::new(TcpStream::connect(addr)?);

    let mut config = ValueDocument::new();
    config.set_class_id(1);
    config.set_function_id(2);
    config.set_value(Some("Network"), "Timeout", 30);
    config.set_value(Some("Network"), "Retries", 3);
    config.set_value(None, "Hosts", vec!["alpha", "beta"]);
    send_document(&mut writer, &config)?;

    let mut ping = ValueDocument::new();
    ping.set_class_id(1);
    ping.set_function_id(9);
    ping.set_value(None, "seq", 1u32);
    send_document(&mut writer, &ping)?;

    drop(writer);
    server.join().map_err(|_| "server thread panicked")??;
    Ok(())
}
