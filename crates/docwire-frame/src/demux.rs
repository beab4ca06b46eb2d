use std::fmt;
use std::io::{ErrorKind, Read};

use bytes::{Buf, BytesMut};
use tracing::{debug, trace};

use crate::codec::{decode_header, FrameConfig, FrameHeader, HEADER_SIZE};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Receives every complete frame produced by a [`Demultiplexer`].
///
/// `payload` borrows the demultiplexer's reusable buffer and is only valid for
/// the duration of the call. It is empty when the header announced no payload.
pub trait Delegate {
    fn handle(&mut self, header: &FrameHeader, payload: &[u8]);
}

/// Adapts a closure into a [`Delegate`]; see [`from_fn`].
pub struct FnDelegate<F>(F);

/// Wrap a closure so it can receive frames.
pub fn from_fn<F>(f: F) -> FnDelegate<F>
where
    F: FnMut(&FrameHeader, &[u8]),
{
    FnDelegate(f)
}

impl<F> Delegate for FnDelegate<F>
where
    F: FnMut(&FrameHeader, &[u8]),
{
    fn handle(&mut self, header: &FrameHeader, payload: &[u8]) {
        (self.0)(header, payload)
    }
}

impl<D: Delegate + ?Sized> Delegate for Box<D> {
    fn handle(&mut self, header: &FrameHeader, payload: &[u8]) {
        (**self).handle(header, payload)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitingHeader,
    AwaitingPayload(FrameHeader),
}

/// Outcome of one [`Demultiplexer::on_ready_read`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadSummary {
    /// Frames handed to the delegate during the call.
    pub frames: usize,
    /// The source reported end of stream.
    pub closed: bool,
}

/// Splits an incrementally delivered byte stream into frames.
///
/// Driven by "more bytes are available" notifications ([`feed`](Self::feed)
/// or [`on_ready_read`](Self::on_ready_read)); never blocks waiting for data.
/// Partial headers and payloads are kept between calls, and every frame that
/// is complete after a call has been delivered before the call returns.
///
/// Any error resets the demultiplexer; the connection it serves must be
/// closed because the wire format cannot resynchronize.
pub struct Demultiplexer<D> {
    delegate: D,
    config: FrameConfig,
    inbox: BytesMut,
    payload: Vec<u8>,
    filled: usize,
    state: State,
}

impl<D: Delegate> Demultiplexer<D> {
    /// Create a demultiplexer with default configuration.
    pub fn new(delegate: D) -> Self {
        Self::with_config(delegate, FrameConfig::default())
    }

    /// Create a demultiplexer with explicit configuration.
    pub fn with_config(delegate: D, config: FrameConfig) -> Self {
        Self {
            delegate,
            config,
            inbox: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            payload: Vec::new(),
            filled: 0,
            state: State::AwaitingHeader,
        }
    }

    /// Accept bytes delivered by the transport and emit every complete frame.
    ///
    /// Returns the number of frames handed to the delegate.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<usize> {
        self.inbox.extend_from_slice(bytes);
        self.drain()
    }

    /// Pull from a non-blocking source until it runs dry.
    ///
    /// `WouldBlock` ends the call with the partial state kept, `Interrupted` is
    /// retried, and `Ok(0)` is end of stream, handled like [`finish`](Self::finish).
    pub fn on_ready_read<R: Read + ?Sized>(&mut self, source: &mut R) -> Result<ReadSummary> {
        let chunk = self.config.read_chunk_size.max(1);
        let mut summary = ReadSummary::default();

        loop {
            let start = self.inbox.len();
            self.inbox.resize(start + chunk, 0);
            let read = source.read(&mut self.inbox[start..]);
            let got = match &read {
                Ok(n) => *n,
                Err(_) => 0,
            };
            self.inbox.truncate(start + got);

            match read {
                Ok(0) => {
                    self.finish()?;
                    summary.closed = true;
                    return Ok(summary);
                }
                Ok(n) => {
                    trace!(bytes = n, "read from source");
                    summary.frames += self.drain()?;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(summary),
                Err(err) => {
                    self.reset();
                    return Err(FrameError::Io(err));
                }
            }
        }
    }

    /// Signal end of stream.
    ///
    /// Fails with [`FrameError::ConnectionClosed`] when a header or payload is
    /// still owed; the partial message is discarded.
    pub fn finish(&mut self) -> Result<()> {
        if self.is_idle() {
            return Ok(());
        }
        debug!(
            buffered = self.inbox.len(),
            filled = self.filled,
            "stream ended inside a frame"
        );
        self.reset();
        Err(FrameError::ConnectionClosed)
    }

    /// Discard all buffered bytes and partial frame state.
    pub fn reset(&mut self) {
        self.inbox.clear();
        self.filled = 0;
        self.state = State::AwaitingHeader;
    }

    /// True when no bytes are owed: waiting for a header with nothing buffered.
    pub fn is_idle(&self) -> bool {
        self.state == State::AwaitingHeader && self.inbox.is_empty()
    }

    /// Bytes received but not yet attributed to a header or payload.
    pub fn buffered(&self) -> usize {
        self.inbox.len()
    }

    /// Replace the delegate. The previous delegate is dropped.
    pub fn set_delegate(&mut self, delegate: D) {
        self.delegate = delegate;
    }

    /// Borrow the delegate.
    pub fn delegate(&self) -> &D {
        &self.delegate
    }

    /// Mutably borrow the delegate.
    pub fn delegate_mut(&mut self) -> &mut D {
        &mut self.delegate
    }

    /// Consume the demultiplexer and return its delegate.
    pub fn into_delegate(self) -> D {
        self.delegate
    }

    /// Current configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    fn drain(&mut self) -> Result<usize> {
        let mut emitted = 0usize;

        loop {
            match self.state {
                State::AwaitingHeader => {
                    if self.inbox.len() < HEADER_SIZE {
                        return Ok(emitted);
                    }

                    let mut raw = [0u8; HEADER_SIZE];
                    self.inbox.copy_to_slice(&mut raw);
                    let header = decode_header(&raw);

                    if !header.is_valid() {
                        debug!(magic = ?header.magic, version = header.version, "rejecting frame header");
                        self.reset();
                        return Err(FrameError::InvalidHeader {
                            magic: header.magic,
                            version: header.version,
                        });
                    }

                    let size = header.payload_len();
                    if size > self.config.max_payload_size {
                        self.reset();
                        return Err(FrameError::PayloadTooLarge {
                            size,
                            max: self.config.max_payload_size,
                        });
                    }

                    if size == 0 {
                        self.emit(header);
                        emitted += 1;
                        continue;
                    }

                    self.payload.resize(size, 0);
                    self.filled = 0;
                    self.state = State::AwaitingPayload(header);
                }
                State::AwaitingPayload(header) => {
                    let size = header.payload_len();
                    let take = (size - self.filled).min(self.inbox.len());
                    if take > 0 {
                        self.inbox
                            .copy_to_slice(&mut self.payload[self.filled..self.filled + take]);
                        self.filled += take;
                    }

                    if self.filled < size {
                        trace!(filled = self.filled, size, "awaiting more payload bytes");
                        return Ok(emitted);
                    }

                    self.state = State::AwaitingHeader;
                    self.filled = 0;
                    self.emit(header);
                    emitted += 1;
                }
            }
        }
    }

    fn emit(&mut self, header: FrameHeader) {
        debug!(
            class_id = header.class_id,
            function_id = header.function_id,
            size = header.payload_size,
            "frame complete"
        );
        let payload = &self.payload[..header.payload_len()];
        self.delegate.handle(&header, payload);
    }
}

impl<D> fmt::Debug for Demultiplexer<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Demultiplexer")
            .field("state", &self.state)
            .field("buffered", &self.inbox.len())
            .field("filled", &self.filled)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;

    use super::*;
    use crate::codec::{encode_frame, encode_header, PROTOCOL_VERSION};

    #[derive(Default)]
    struct Recorder {
        frames: Vec<(FrameHeader, Vec<u8>)>,
    }

    impl Delegate for Recorder {
        fn handle(&mut self, header: &FrameHeader, payload: &[u8]) {
            self.frames.push((*header, payload.to_vec()));
        }
    }

    fn wire(frames: &[(i32, i32, &[u8])]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for (class_id, function_id, payload) in frames {
            encode_frame(*class_id, *function_id, payload, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    #[test]
    fn single_frame_in_one_call() {
        let mut demux = Demultiplexer::new(Recorder::default());
        let emitted = demux.feed(&wire(&[(1, 2, b"hello")])).unwrap();

        assert_eq!(emitted, 1);
        let frames = &demux.delegate().frames;
        assert_eq!(frames[0].0.class_id, 1);
        assert_eq!(frames[0].0.function_id, 2);
        assert_eq!(frames[0].1, b"hello");
        assert!(demux.is_idle());
    }

    #[test]
    fn one_byte_chunks_match_single_call() {
        let bytes = wire(&[(5, 6, b"reassembled payload")]);

        let mut whole = Demultiplexer::new(Recorder::default());
        whole.feed(&bytes).unwrap();

        let mut chunked = Demultiplexer::new(Recorder::default());
        let mut emitted = 0;
        for byte in &bytes {
            emitted += chunked.feed(std::slice::from_ref(byte)).unwrap();
        }

        assert_eq!(emitted, 1);
        assert_eq!(chunked.delegate().frames, whole.delegate().frames);
    }

    #[test]
    fn pipelined_frames_are_emitted_in_order() {
        let bytes = wire(&[(1, 1, b"first"), (2, 2, b"second")]);
        let mut demux = Demultiplexer::new(Recorder::default());

        assert_eq!(demux.feed(&bytes).unwrap(), 2);
        let frames = &demux.delegate().frames;
        assert_eq!((frames[0].0.class_id, frames[0].1.as_slice()), (1, b"first".as_ref()));
        assert_eq!((frames[1].0.class_id, frames[1].1.as_slice()), (2, b"second".as_ref()));
    }

    #[test]
    fn split_across_frame_boundary() {
        let bytes = wire(&[(1, 0, b"abc"), (2, 0, b"defgh")]);
        let cut = HEADER_SIZE + 3 + 5;
        let mut demux = Demultiplexer::new(Recorder::default());

        assert_eq!(demux.feed(&bytes[..cut]).unwrap(), 1);
        assert_eq!(demux.buffered(), 5);
        assert_eq!(demux.feed(&bytes[cut..]).unwrap(), 1);
        assert_eq!(demux.delegate().frames[1].1, b"defgh");
    }

    #[test]
    fn empty_payload_is_emitted_immediately() {
        let bytes = wire(&[(9, 9, b""), (3, 3, b"x")]);
        let mut demux = Demultiplexer::new(Recorder::default());

        assert_eq!(demux.feed(&bytes).unwrap(), 2);
        assert!(demux.delegate().frames[0].1.is_empty());
        assert_eq!(demux.delegate().frames[1].1, b"x");
    }

    #[test]
    fn corrupted_signature_rejects_everything() {
        let mut bytes = wire(&[(1, 1, b"payload"), (2, 2, b"valid-looking")]);
        bytes[0] ^= 0xFF;
        let mut demux = Demultiplexer::new(Recorder::default());

        let err = demux.feed(&bytes).unwrap_err();
        assert!(matches!(err, FrameError::InvalidHeader { .. }));
        assert!(demux.delegate().frames.is_empty());
        assert!(demux.is_idle());
    }

    #[test]
    fn wrong_version_rejected() {
        let mut buf = BytesMut::new();
        let header = FrameHeader {
            version: PROTOCOL_VERSION + 7,
            ..FrameHeader::new(1, 1, 0)
        };
        encode_header(&header, &mut buf);
        let mut demux = Demultiplexer::new(Recorder::default());

        let err = demux.feed(&buf).unwrap_err();
        assert!(matches!(
            err,
            FrameError::InvalidHeader { version, .. } if version == PROTOCOL_VERSION + 7
        ));
    }

    #[test]
    fn oversized_payload_rejected() {
        let cfg = FrameConfig {
            max_payload_size: 4,
            ..FrameConfig::default()
        };
        let mut demux = Demultiplexer::with_config(Recorder::default(), cfg);

        let err = demux.feed(&wire(&[(1, 1, b"too long")])).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 8, max: 4 }));
        assert!(demux.delegate().frames.is_empty());
    }

    #[test]
    fn finish_mid_payload_is_connection_closed() {
        let bytes = wire(&[(1, 1, b"truncated")]);
        let mut demux = Demultiplexer::new(Recorder::default());

        assert_eq!(demux.feed(&bytes[..HEADER_SIZE + 2]).unwrap(), 0);
        assert!(matches!(demux.finish(), Err(FrameError::ConnectionClosed)));
        assert!(demux.is_idle());
        assert!(demux.delegate().frames.is_empty());
    }

    #[test]
    fn finish_with_partial_header_is_connection_closed() {
        let mut demux = Demultiplexer::new(Recorder::default());
        demux.feed(&[0x44, 0x57, 0x01]).unwrap();

        assert!(matches!(demux.finish(), Err(FrameError::ConnectionClosed)));
    }

    #[test]
    fn finish_when_idle_is_ok() {
        let mut demux = Demultiplexer::new(Recorder::default());
        demux.feed(&wire(&[(1, 1, b"done")])).unwrap();
        assert!(demux.finish().is_ok());
    }

    #[test]
    fn payload_buffer_is_reused_between_frames() {
        let bytes = wire(&[(1, 1, b"a much longer payload"), (2, 2, b"short")]);
        let mut demux = Demultiplexer::new(Recorder::default());
        demux.feed(&bytes).unwrap();

        assert_eq!(demux.delegate().frames[1].1, b"short");
    }

    #[test]
    fn closure_delegate() {
        let mut sizes = Vec::new();
        {
            let mut demux = Demultiplexer::new(from_fn(|header: &FrameHeader, payload: &[u8]| {
                sizes.push((header.payload_size, payload.len()));
            }));
            demux.feed(&wire(&[(1, 1, b"four"), (1, 1, b"")])).unwrap();
        }
        assert_eq!(sizes, vec![(4, 4), (0, 0)]);
    }

    #[test]
    fn delegate_can_be_replaced() {
        let bytes = wire(&[(1, 1, b"one")]);
        let mut demux: Demultiplexer<Box<dyn Delegate + Send>> =
            Demultiplexer::new(Box::new(Recorder::default()));
        demux.feed(&bytes).unwrap();

        let (tx, rx) = std::sync::mpsc::channel();
        demux.set_delegate(Box::new(from_fn(
            move |header: &FrameHeader, payload: &[u8]| {
                let _ = tx.send((header.class_id, payload.to_vec()));
            },
        )));
        demux.feed(&bytes).unwrap();

        assert_eq!(rx.try_recv().unwrap(), (1, b"one".to_vec()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn on_ready_read_until_eof() {
        let bytes = wire(&[(1, 1, b"one"), (2, 2, b"two"), (3, 3, b"three")]);
        let cfg = FrameConfig {
            read_chunk_size: 5,
            ..FrameConfig::default()
        };
        let mut demux = Demultiplexer::with_config(Recorder::default(), cfg);

        let summary = demux.on_ready_read(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(summary, ReadSummary { frames: 3, closed: true });
        assert_eq!(demux.delegate().frames[2].1, b"three");
    }

    #[test]
    fn on_ready_read_eof_mid_frame() {
        let bytes = wire(&[(1, 1, b"payload")]);
        let mut demux = Demultiplexer::new(Recorder::default());

        let err = demux
            .on_ready_read(&mut Cursor::new(bytes[..HEADER_SIZE + 3].to_vec()))
            .unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    /// Hands out scripted chunks and reports `WouldBlock` between them.
    struct Scripted {
        chunks: Vec<Vec<u8>>,
        pending: bool,
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pending {
                self.pending = false;
                return Err(std::io::Error::from(ErrorKind::WouldBlock));
            }
            if self.chunks.is_empty() {
                return Ok(0);
            }
            let chunk = self.chunks.remove(0);
            let n = chunk.len().min(buf.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            self.pending = true;
            Ok(n)
        }
    }

    #[test]
    fn on_ready_read_keeps_partial_state_across_would_block() {
        let bytes = wire(&[(4, 4, b"slow")]);
        let mut source = Scripted {
            chunks: vec![bytes[..10].to_vec(), bytes[10..].to_vec()],
            pending: false,
        };
        let mut demux = Demultiplexer::new(Recorder::default());

        let first = demux.on_ready_read(&mut source).unwrap();
        assert_eq!(first, ReadSummary { frames: 0, closed: false });
        assert_eq!(demux.buffered(), 10);

        let second = demux.on_ready_read(&mut source).unwrap();
        assert_eq!(second.frames, 1);
        assert_eq!(demux.delegate().frames[0].1, b"slow");

        let last = demux.on_ready_read(&mut source).unwrap();
        assert_eq!(last, ReadSummary { frames: 0, closed: true });
    }

    struct InterruptedThenData {
        interrupted: bool,
        bytes: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.bytes.read(buf)
        }
    }

    #[test]
    fn interrupted_read_retries() {
        let mut source = InterruptedThenData {
            interrupted: false,
            bytes: Cursor::new(wire(&[(8, 8, b"ok")])),
        };
        let mut demux = Demultiplexer::new(Recorder::default());

        let summary = demux.on_ready_read(&mut source).unwrap();
        assert_eq!(summary.frames, 1);
    }

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::ConnectionReset))
        }
    }

    #[test]
    fn io_error_resets_state() {
        let bytes = wire(&[(1, 1, b"partial")]);
        let mut demux = Demultiplexer::new(Recorder::default());
        demux.feed(&bytes[..HEADER_SIZE + 1]).unwrap();

        let err = demux.on_ready_read(&mut Broken).unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::ConnectionReset));
        assert!(demux.is_idle());
    }
}
