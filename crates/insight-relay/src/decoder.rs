// crates/insight-relay/src/decoder.rs
// Newline-delimited text decoding over arbitrarily chunked byte streams.
//
// Chunk boundaries may fall anywhere: inside a line, inside a multi-byte
// UTF-8 sequence, or between `\r` and `\n`. Lines are trimmed and blank lines
// are never emitted.

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{RelayError, Result};

/// Incremental line splitter with a UTF-8 decoder that carries partial
/// multi-byte sequences over to the next chunk.
#[derive(Debug, Default)]
pub struct LineDecoder {
    /// Decoded text not yet terminated by a newline
    buffer: String,
    /// Trailing bytes of an incomplete UTF-8 sequence
    pending: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.decode(chunk);
        self.drain_lines()
    }

    /// End of input: flush whatever is left as a final line.
    ///
    /// An incomplete multi-byte sequence at the very end is replaced with
    /// U+FFFD rather than dropped.
    pub fn finish(mut self) -> Option<String> {
        if !self.pending.is_empty() {
            let tail = String::from_utf8_lossy(&self.pending).into_owned();
            self.buffer.push_str(&tail);
            self.pending.clear();
        }
        let line = self.buffer.trim();
        (!line.is_empty()).then(|| line.to_string())
    }

    /// Bytes held back waiting for the rest of a multi-byte character
    pub fn pending_bytes(&self) -> usize {
        self.pending.len()
    }

    /// Decoded text waiting for a newline
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    fn decode(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);

        let mut start = 0;
        loop {
            match std::str::from_utf8(&self.pending[start..]) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    start = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid_end = start + e.valid_up_to();
                    if let Ok(text) = std::str::from_utf8(&self.pending[start..valid_end]) {
                        self.buffer.push_str(text);
                    }
                    match e.error_len() {
                        // Invalid sequence: substitute and keep going
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            start = valid_end + len;
                        }
                        // Incomplete sequence at the end: wait for more bytes
                        None => {
                            start = valid_end;
                            break;
                        }
                    }
                }
            }
        }

        self.pending.drain(..start);
    }

    fn drain_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        let mut consumed = 0;

        while let Some(offset) = self.buffer[consumed..].find('\n') {
            let end = consumed + offset;
            let line = self.buffer[consumed..end].trim();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
            consumed = end + 1;
        }

        self.buffer.drain(..consumed);
        lines
    }
}

/// Turn a chunked byte stream into a lazy stream of trimmed, non-empty lines.
///
/// The token is polled before each chunk is processed, before each line is
/// yielded and before the trailing line is flushed. Once it fires the stream
/// ends without emitting anything further, and unterminated trailing content
/// is discarded. A failing chunk ends the stream with a single
/// [`RelayError::Transport`].
pub fn decode_lines<S, B, E>(chunks: S, cancel: CancellationToken) -> impl Stream<Item = Result<String>>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    async_stream::stream! {
        let mut decoder = LineDecoder::new();
        futures::pin_mut!(chunks);

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(buffered = decoder.buffered().len(), "Decode loop cancelled");
                    return;
                }
                next = chunks.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    if cancel.is_cancelled() {
                        return;
                    }
                    for line in decoder.push(chunk.as_ref()) {
                        if cancel.is_cancelled() {
                            return;
                        }
                        yield Ok(line);
                    }
                }
                Some(Err(e)) => {
                    yield Err(RelayError::Transport(e.to_string()));
                    return;
                }
                None => break,
            }
        }

        if cancel.is_cancelled() {
            return;
        }
        if let Some(line) = decoder.finish() {
            yield Ok(line);
        }
    }
}
