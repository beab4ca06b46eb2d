use clap::{Args, Subcommand};
use std::path::PathBuf;

use docwire_frame::{DEFAULT_MAX_PAYLOAD, DEFAULT_READ_CHUNK};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a document and write it as one frame.
    Encode(EncodeArgs),
    /// Read frames and print the documents they carry.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Class id written to the header and the document.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub class_id: i32,
    /// Function id written to the header and the document.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub function_id: i32,
    /// Value to store, e.g. `Network/Timeout=int:30` or `name=edge`.
    #[arg(long = "set", value_name = "[GROUP/]KEY=[TYPE:]VALUE")]
    pub set: Vec<String>,
    /// Write the frame to a file instead of stdout.
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// File holding frames. Reads stdin when omitted.
    pub path: Option<PathBuf>,
    /// Bytes requested per read.
    #[arg(long, default_value_t = DEFAULT_READ_CHUNK, env = "DOCWIRE_CHUNK_SIZE")]
    pub chunk_size: usize,
    /// Largest payload accepted before the stream is rejected.
    #[arg(long, default_value_t = DEFAULT_MAX_PAYLOAD, env = "DOCWIRE_MAX_PAYLOAD")]
    pub max_payload: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
