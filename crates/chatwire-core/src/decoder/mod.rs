//! SSE frame decoder.
//!
//! Turns the raw chunks of a chat response body into an ordered sequence of
//! logical event payloads. Chunks are never assumed to align with line or
//! event boundaries:
//!
//! 1. Bytes are decoded as UTF-8 incrementally ([`Utf8Decoder`]).
//! 2. Text is split on `\n`; the trailing incomplete segment is carried over
//!    to the next chunk and complete lines are processed immediately.
//! 3. A `\r` directly before the newline is stripped.
//! 4. Each line is interpreted according to the configured
//!    [`FramingConvention`].
//!
//! A decoder serves exactly one request: [`FrameDecoder::finish`] consumes it.

pub mod utf8;

use futures_util::{Stream, StreamExt};
use tracing::trace;

use chatwire_types::config::FramingConvention;

pub use utf8::Utf8Decoder;

/// Field prefix of an SSE data line.
const DATA_PREFIX: &str = "data:";

/// Incremental decoder for one response body.
#[derive(Debug)]
pub struct FrameDecoder {
    convention: FramingConvention,
    utf8: Utf8Decoder,
    /// Carry-over: text after the last newline seen so far.
    buffer: String,
    /// Accumulated data segments of the current event (accumulating convention).
    pending: String,
}

impl FrameDecoder {
    pub fn new(convention: FramingConvention) -> Self {
        Self {
            convention,
            utf8: Utf8Decoder::new(),
            buffer: String::new(),
            pending: String::new(),
        }
    }

    pub fn convention(&self) -> FramingConvention {
        self.convention
    }

    /// Feed a chunk of raw bytes and return every payload it completes.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Vec<String> {
        let text = self.utf8.decode(bytes);
        self.push_str(&text)
    }

    /// Feed a chunk of already decoded text and return every payload it
    /// completes.
    pub fn push_str(&mut self, chunk: &str) -> Vec<String> {
        let mut out = Vec::new();
        if chunk.is_empty() {
            return out;
        }

        if self.convention == FramingConvention::Raw {
            out.push(chunk.to_string());
            return out;
        }

        self.buffer.push_str(chunk);
        let Some(last_newline) = self.buffer.rfind('\n') else {
            return out;
        };

        let carry = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, carry);
        for line in complete[..last_newline].split('\n') {
            self.process_line(line, &mut out);
        }
        out
    }

    /// End of stream: process the carry-over as a final line, then flush any
    /// accumulated segments as a final payload.
    pub fn finish(mut self) -> Vec<String> {
        let tail = self.utf8.finish();
        let mut out = self.push_str(&tail);

        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.process_line(&line, &mut out);
        }
        if !self.pending.is_empty() {
            out.push(std::mem::take(&mut self.pending));
        }
        out
    }

    fn process_line(&mut self, raw: &str, out: &mut Vec<String>) {
        let line = raw.strip_suffix('\r').unwrap_or(raw);

        match self.convention {
            FramingConvention::Accumulating => {
                if line.is_empty() {
                    if !self.pending.is_empty() {
                        out.push(std::mem::take(&mut self.pending));
                    }
                    return;
                }
                match line.strip_prefix(DATA_PREFIX) {
                    // An empty data field stands for a line break in the text.
                    Some("") => self.pending.push('\n'),
                    Some(data) => self.pending.push_str(data),
                    None => trace!(line, "ignoring non-data line"),
                }
            }
            FramingConvention::PerLine => {
                if line.starts_with(':') {
                    return;
                }
                match line.strip_prefix(DATA_PREFIX) {
                    Some(data) => {
                        let data = data.trim();
                        if !data.is_empty() {
                            out.push(data.to_string());
                        }
                    }
                    None if line.is_empty() => {}
                    None => trace!(line, "ignoring non-data line"),
                }
            }
            FramingConvention::Raw => {}
        }
    }
}

/// Adapt a stream of byte chunks into a lazy stream of payloads.
///
/// The first chunk error ends the stream after being yielded.
pub fn decode_stream<S, B, E>(
    convention: FramingConvention,
    chunks: S,
) -> impl Stream<Item = Result<String, E>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    async_stream::try_stream! {
        let mut decoder = FrameDecoder::new(convention);
        let mut chunks = Box::pin(chunks);

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            for payload in decoder.push_bytes(chunk.as_ref()) {
                yield payload;
            }
        }

        for payload in decoder.finish() {
            yield payload;
        }
    }
}
