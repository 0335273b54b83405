//! Subcommand implementations.

use std::fs::File;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::path::Path;

use aero_link::{LinkConfig, LinkSession, LinkStats};
use aero_protocol::{
    registry, validate, Endpoint, FrameFormat, MessageBuilder, ParsedMessage, Payload, Signature,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{CliError, CliResult};
use crate::Command;

pub(crate) fn execute(command: &Command, config: &LinkConfig, out: &mut impl Write) -> CliResult<()> {
    match command {
        Command::Registry => {
            for row in registry_table() {
                writeln!(
                    out,
                    "{:>2}  {:<10} {:>3} bytes  offset {:>3}",
                    row.ordinal, row.signature.name(), row.size, row.offset
                )?;
            }
            writeln!(out, "arena {} bytes", registry::ARENA_SIZE)?;
        }
        Command::Encode { from, to, input } => {
            let payloads = match input {
                Some(path) => load_payloads(path)?,
                None => Vec::new(),
            };
            let hex = encode_frame(&config.frame_format()?, *from, *to, &payloads)?;
            writeln!(out, "{}", hex)?;
        }
        Command::Decode { hex } => {
            let report = decode_frame(&config.frame_format()?, hex)?;
            serde_json::to_writer_pretty(&mut *out, &report)?;
            writeln!(out)?;
        }
        Command::Monitor { input, connect } => {
            let stats = match (input, connect) {
                (_, Some(addr)) => {
                    info!("connecting to {}", addr);
                    let stream = TcpStream::connect(addr)?;
                    monitor(LinkSession::new(config, stream)?, out)?
                }
                (Some(path), None) => {
                    let file = File::open(path)?;
                    monitor(LinkSession::new(config, ReadOnly(file))?, out)?
                }
                (None, None) => {
                    monitor(LinkSession::new(config, ReadOnly(io::stdin()))?, out)?
                }
            };
            info!(
                "monitor finished: {} received, {} rejected, {} bytes discarded",
                stats.received, stats.rejected, stats.discarded
            );
        }
    }
    Ok(())
}

/// One line of the registry table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryRow {
    pub ordinal: u8,
    pub signature: Signature,
    pub size: usize,
    pub offset: usize,
}

/// Every signature with its encoded size and arena offset.
pub fn registry_table() -> Vec<RegistryRow> {
    Signature::ALL
        .into_iter()
        .map(|signature| RegistryRow {
            ordinal: signature.ordinal(),
            signature,
            size: registry::size_of(signature),
            offset: registry::arena_offset(signature),
        })
        .collect()
}

/// Encoding of a payload list file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Json,
    Yaml,
}

impl PayloadFormat {
    /// Pick the format from a file extension. Anything but `.json` is YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => PayloadFormat::Json,
            _ => PayloadFormat::Yaml,
        }
    }
}

/// Parse a payload list such as `[{"battery": {"voltage": 25, "current": 12}}]`.
pub fn parse_payloads(text: &str, format: PayloadFormat) -> CliResult<Vec<Payload>> {
    Ok(match format {
        PayloadFormat::Json => serde_json::from_str(text)?,
        PayloadFormat::Yaml => serde_yaml::from_str(text)?,
    })
}

/// Read a payload list file.
pub fn load_payloads(path: &Path) -> CliResult<Vec<Payload>> {
    let text = std::fs::read_to_string(path)?;
    parse_payloads(&text, PayloadFormat::from_path(path))
}

/// Build one frame from `payloads` and return it hex encoded.
///
/// A later payload for the same signature replaces an earlier one.
pub fn encode_frame(
    format: &FrameFormat,
    from: Endpoint,
    to: Endpoint,
    payloads: &[Payload],
) -> CliResult<String> {
    let mut builder = MessageBuilder::with_format(*format);
    for payload in payloads {
        builder.add_payload(*payload);
    }
    debug!("encoding {} segments, {} bytes", builder.pending().count(), builder.pending_len());

    let frame = builder.build(from, to, false)?;
    Ok(hex::encode(frame.to_bytes()))
}

/// Result of decoding one frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeReport {
    pub from: Endpoint,
    pub to: Endpoint,
    /// Whether the stored checksum matched.
    pub valid: bool,
    pub bitmask: u16,
    pub length: usize,
    pub payloads: Vec<Payload>,
}

impl DecodeReport {
    fn new(message: &ParsedMessage, valid: bool) -> Self {
        DecodeReport {
            from: message.from(),
            to: message.to(),
            valid,
            bitmask: message.bitmask(),
            length: message.length(),
            payloads: message.payloads().collect(),
        }
    }
}

/// Validate and parse a hex encoded frame.
///
/// A checksum mismatch is reported in the result, not as an error; parse
/// failures are errors.
pub fn decode_frame(format: &FrameFormat, text: &str) -> CliResult<DecodeReport> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = hex::decode(compact)?;
    if bytes.len() != format.frame_len() {
        return Err(CliError::Usage(format!(
            "expected a {} byte frame for payload capacity {}, got {} bytes",
            format.frame_len(),
            format.payload_capacity(),
            bytes.len()
        )));
    }

    let valid = validate(&bytes, format);
    let message = ParsedMessage::decode(&bytes, format)?;
    Ok(DecodeReport::new(&message, valid))
}

/// Print every message on `session` as a JSON line until the stream ends.
pub fn monitor<T: Read + Write>(
    mut session: LinkSession<T>,
    out: &mut impl Write,
) -> CliResult<LinkStats> {
    while !session.is_closed() {
        if let Some(message) = session.poll()? {
            serde_json::to_writer(&mut *out, &DecodeReport::new(&message, true))?;
            writeln!(out)?;
        }
    }
    Ok(session.stats())
}

/// Adapts a reader to a link transport that never sends.
pub struct ReadOnly<R>(pub R);

impl<R: Read> Read for ReadOnly<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl<R> Write for ReadOnly<R> {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "read-only transport"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
