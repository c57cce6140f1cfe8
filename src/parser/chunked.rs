//! Chunked request body decoder.
use bytes::BytesMut;

use super::{ErrorKind, ParseError, State};

const MAX_CHUNK_SIZE: u64 = u64::MAX >> 1;

/// Decoding progress reported back to the request parser.
#[derive(Debug)]
pub(crate) enum Progress {
    /// More bytes required.
    Pending,
    /// Terminal chunk and trailer section consumed.
    Done,
}

#[derive(Debug)]
enum Phase {
    /// Expecting a chunk-size line.
    Header,
    /// Expecting `n` more data bytes.
    Data(u64),
    /// Expecting the CRLF closing a chunk's data.
    DataEnd,
    /// Terminal chunk seen, consuming trailer lines.
    Trailer,
}

/// Decoder for `Transfer-Encoding: chunked` request bodies.
///
/// Chunk data is appended to the output buffer as it arrives; re-feeding
/// a partially consumed stream resumes where the previous call stopped.
#[derive(Debug)]
pub struct ChunkedDecoder {
    phase: Phase,
}

impl ChunkedDecoder {
    pub(crate) fn new() -> Self {
        Self { phase: Phase::Header }
    }

    /// Parser-visible state for the current phase.
    pub(crate) fn state(&self) -> State {
        match self.phase {
            Phase::Header | Phase::Data(_) => State::ChunkHeader,
            Phase::DataEnd | Phase::Trailer => State::ChunkComplete,
        }
    }

    pub(crate) fn decode(
        &mut self,
        buffer: &mut BytesMut,
        out: &mut BytesMut,
    ) -> Result<Progress, ParseError> {
        loop {
            match self.phase {
                Phase::Header => {
                    let Some(line) = super::take_line(buffer)? else {
                        return Ok(Progress::Pending);
                    };
                    // chunk extensions after ';' are tolerated and ignored
                    let digits = match line.iter().position(|&b| b == b';') {
                        Some(at) => &line[..at],
                        None => &line[..],
                    };
                    let digits =
                        str::from_utf8(digits).map_err(|_| ErrorKind::InvalidChunk)?;
                    let size = u64::from_str_radix(digits.trim(), 16)
                        .map_err(|_| ErrorKind::InvalidChunk)?;
                    if size > MAX_CHUNK_SIZE {
                        return Err(ErrorKind::InvalidChunk.into());
                    }
                    self.phase = if size == 0 { Phase::Trailer } else { Phase::Data(size) };
                }
                Phase::Data(remaining) => {
                    if buffer.is_empty() {
                        return Ok(Progress::Pending);
                    }
                    let take = (remaining as usize).min(buffer.len());
                    out.extend_from_slice(&buffer.split_to(take));
                    let left = remaining - take as u64;
                    self.phase = if left == 0 { Phase::DataEnd } else { Phase::Data(left) };
                }
                Phase::DataEnd => {
                    let Some(line) = super::take_line(buffer)? else {
                        return Ok(Progress::Pending);
                    };
                    if !line.is_empty() {
                        return Err(ErrorKind::InvalidChunk.into());
                    }
                    self.phase = Phase::Header;
                }
                Phase::Trailer => {
                    let Some(line) = super::take_line(buffer)? else {
                        return Ok(Progress::Pending);
                    };
                    if line.is_empty() {
                        return Ok(Progress::Done);
                    }
                    // trailer fields are consumed and discarded
                }
            }
        }
    }
}
