//! Link session over a byte-stream transport.

use std::io::{ErrorKind, Read, Write};

use aero_metrics::{metric_defs, LinkLabels};
use aero_protocol::{
    verify, Endpoint, FrameFormat, FrameReassembler, MessageBuilder, MessageParser,
    ParsedMessage, ProtocolError, Signature,
};
use tracing::{debug, trace, warn};

use crate::config::LinkConfig;
use crate::error::{LinkError, LinkResult};

/// Frame counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Frames written to the transport.
    pub sent: u64,
    /// Frames accepted from the transport.
    pub received: u64,
    /// Candidate frames dropped by checksum or parse checks.
    pub rejected: u64,
    /// Stream bytes skipped while hunting for frames.
    pub discarded: u64,
}

/// One end of a telemetry link.
///
/// Owns the transport and all per-connection state: the builder slots, the
/// reassembly buffer and the reused parse result.
pub struct LinkSession<T> {
    name: String,
    local: Endpoint,
    remote: Endpoint,
    clear_after_send: bool,
    transport: T,
    builder: MessageBuilder,
    reassembler: FrameReassembler,
    parser: MessageParser,
    read_buf: Vec<u8>,
    stats: LinkStats,
    labels: LinkLabels,
    closed: bool,
}

impl<T: Read + Write> LinkSession<T> {
    /// Create a session over `transport`.
    pub fn new(config: &LinkConfig, transport: T) -> LinkResult<Self> {
        config.validate()?;
        let format = config.frame_format()?;

        debug!(
            "Link[{}]: opened {} -> {} ({} byte frames)",
            config.name,
            config.local,
            config.remote,
            format.frame_len()
        );

        Ok(LinkSession {
            name: config.name.clone(),
            local: config.local,
            remote: config.remote,
            clear_after_send: config.clear_after_send,
            transport,
            builder: MessageBuilder::with_format(format),
            reassembler: FrameReassembler::new(format),
            parser: MessageParser::new(format),
            read_buf: vec![0u8; config.read_chunk],
            stats: LinkStats::default(),
            labels: LinkLabels::new(
                config.name.clone(),
                config.local.name(),
                config.remote.name(),
            ),
            closed: false,
        })
    }

    /// Session name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Endpoint this side sends as.
    pub fn local(&self) -> Endpoint {
        self.local
    }

    /// Default recipient.
    pub fn remote(&self) -> Endpoint {
        self.remote
    }

    /// Frame format of this link.
    pub fn format(&self) -> &FrameFormat {
        self.builder.format()
    }

    /// Builder holding the payloads of the next frame.
    pub fn builder(&mut self) -> &mut MessageBuilder {
        &mut self.builder
    }

    /// Build a frame to the remote endpoint and write it.
    pub fn send(&mut self) -> LinkResult<usize> {
        self.send_to(self.remote, self.clear_after_send)
    }

    /// Build a frame addressed to `to` and write it.
    ///
    /// A capacity failure writes nothing and leaves the builder untouched.
    pub fn send_to(&mut self, to: Endpoint, clear: bool) -> LinkResult<usize> {
        let segments = self.builder.pending().count();
        let frame = self.builder.build(self.local, to, clear)?;
        let bytes = frame.to_bytes();
        self.write_frame(&bytes)?;

        metrics::histogram!(metric_defs::FRAME_PAYLOAD_BYTES.name, &self.labels.to_labels())
            .record(frame.length as f64);
        metrics::gauge!(metric_defs::PENDING_SEGMENTS.name, &self.labels.to_labels())
            .set(self.builder.pending().count() as f64);

        trace!(
            "Link[{}]: sent {} segments ({} bytes used) to {}",
            self.name,
            segments,
            frame.length,
            to
        );
        Ok(bytes.len())
    }

    /// Write an already encoded frame as is.
    pub fn write_frame(&mut self, frame: &[u8]) -> LinkResult<()> {
        self.transport.write_all(frame)?;
        self.transport.flush()?;
        self.stats.sent += 1;
        metrics::counter!(metric_defs::FRAMES_SENT.name, &self.labels.to_labels()).increment(1);
        Ok(())
    }

    /// Next message from the transport.
    ///
    /// Drains already buffered frames first and otherwise performs one read.
    /// Returns `None` when no complete valid frame is available yet; check
    /// [`is_closed`](Self::is_closed) to tell end of stream apart.
    pub fn poll(&mut self) -> LinkResult<Option<ParsedMessage>> {
        if let Some(message) = self.next_message() {
            return Ok(Some(message));
        }
        if self.read_chunk()? == 0 {
            return Ok(None);
        }
        Ok(self.next_message())
    }

    /// Next checksum-valid frame from the transport, not parsed.
    pub fn poll_frame(&mut self) -> LinkResult<Option<Vec<u8>>> {
        if let Some(frame) = self.next_valid_frame() {
            return Ok(Some(frame));
        }
        if self.read_chunk()? == 0 {
            return Ok(None);
        }
        Ok(self.next_valid_frame())
    }

    /// Feed bytes read elsewhere and return every message they complete.
    pub fn feed(&mut self, data: &[u8]) -> Vec<ParsedMessage> {
        let mut messages = Vec::new();
        // Drain between frame-sized pieces so the reassembler bound never
        // drops unscanned bytes
        for piece in data.chunks(self.format().frame_len()) {
            self.reassembler.push(piece);
            messages.extend(std::iter::from_fn(|| self.next_message()));
        }
        messages
    }

    /// Whether the transport reported end of stream.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Frame counters so far.
    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// Shared access to the transport.
    pub fn get_ref(&self) -> &T {
        &self.transport
    }

    /// Close the session and hand back the transport.
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Read once into the reassembler. Only called once buffered frames are drained.
    fn read_chunk(&mut self) -> LinkResult<usize> {
        let room = self
            .reassembler
            .max_buffered()
            .saturating_sub(self.reassembler.buffered_len())
            .clamp(1, self.read_buf.len());
        let n = match self.transport.read(&mut self.read_buf[..room]) {
            Ok(n) => n,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted) => {
                return Ok(0)
            }
            Err(e) => return Err(LinkError::Io(e)),
        };

        if n == 0 {
            if !self.closed {
                debug!("Link[{}]: transport closed", self.name);
            }
            self.closed = true;
        } else {
            self.reassembler.push(&self.read_buf[..n]);
        }
        Ok(n)
    }

    /// Next candidate frame, copied out of the reassembler.
    fn next_candidate(&mut self) -> Option<Vec<u8>> {
        let candidate = self.reassembler.peek_frame().map(<[u8]>::to_vec);
        self.sync_discarded();
        candidate
    }

    fn next_valid_frame(&mut self) -> Option<Vec<u8>> {
        loop {
            let frame = self.next_candidate()?;

            match verify(&frame, self.reassembler.format()) {
                Ok(()) => {
                    self.reassembler.consume_frame();
                    self.stats.received += 1;
                    metrics::counter!(metric_defs::FRAMES_RECEIVED.name, &self.labels.to_labels())
                        .increment(1);
                    return Some(frame);
                }
                Err(e) => self.reject(&e),
            }
        }
    }

    fn next_message(&mut self) -> Option<ParsedMessage> {
        loop {
            let frame = self.next_candidate()?;

            let parsed = verify(&frame, self.parser.format())
                .and_then(|()| self.parser.parse(&frame).cloned());
            match parsed {
                Ok(message) => {
                    self.reassembler.consume_frame();
                    self.record_received(&message);
                    return Some(message);
                }
                Err(e) => self.reject(&e),
            }
        }
    }

    fn record_received(&mut self, message: &ParsedMessage) {
        self.stats.received += 1;
        metrics::counter!(metric_defs::FRAMES_RECEIVED.name, &self.labels.to_labels())
            .increment(1);
        for signature in Signature::iter_bitmask(message.bitmask()) {
            metrics::counter!(
                metric_defs::SEGMENTS_RECEIVED.name,
                &self.labels.with("signature", signature.name())
            )
            .increment(1);
        }

        trace!(
            "Link[{}]: received {} -> {}, bitmask 0x{:04X}, {} bytes",
            self.name,
            message.from(),
            message.to(),
            message.bitmask(),
            message.length()
        );
    }

    /// Drop the current candidate's start byte; the rest is rescanned.
    fn reject(&mut self, error: &ProtocolError) {
        self.reassembler.reject_frame();
        self.stats.rejected += 1;
        metrics::counter!(
            metric_defs::FRAMES_REJECTED.name,
            &self.labels.with("reason", error.kind())
        )
        .increment(1);
        warn!("Link[{}]: dropped frame: {}", self.name, error);
    }

    fn sync_discarded(&mut self) {
        let total = self.reassembler.discarded();
        if total > self.stats.discarded {
            metrics::counter!(metric_defs::BYTES_DISCARDED.name, &self.labels.to_labels())
                .increment(total - self.stats.discarded);
            self.stats.discarded = total;
        }
    }
}

/// Forward one frame from `source` to `sink` unchanged.
///
/// Performs at most one read on `source`. Returns whether a frame was
/// forwarded. Frames failing the checksum are dropped, not forwarded.
pub fn relay<A, B>(source: &mut LinkSession<A>, sink: &mut LinkSession<B>) -> LinkResult<bool>
where
    A: Read + Write,
    B: Read + Write,
{
    if source.format() != sink.format() {
        return Err(LinkError::FormatMismatch {
            source_capacity: source.format().payload_capacity(),
            sink_capacity: sink.format().payload_capacity(),
        });
    }

    match source.poll_frame()? {
        Some(frame) => {
            sink.write_frame(&frame)?;
            trace!("Link[{}]: relayed frame to {}", source.name, sink.name);
            Ok(true)
        }
        None => Ok(false),
    }
}
