//! Server-Sent Events (SSE) client utilities
//!
//! Incremental `text/event-stream` decoder. Bytes arrive in arbitrary
//! chunks; complete frames are emitted once their terminating blank line
//! has been seen.

use futures::stream::{Stream, StreamExt};
use tracing::trace;

use crate::{Error, Result};

/// One dispatched SSE frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    /// `event:` field, `None` for the default `message` type
    pub event: Option<String>,
    /// `data:` lines joined with `\n`
    pub data: String,
    /// `id:` field
    pub id: Option<String>,
}

/// Incremental SSE decoder
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
    pending: SseFrame,
    has_data: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of the response body, returning frames completed by it
    pub fn push(&mut self, chunk: &str) -> Vec<SseFrame> {
        self.buffer.push_str(chunk);
        let mut frames = Vec::new();

        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            let line = line.trim_end_matches('\n').trim_end_matches('\r');
            if let Some(frame) = self.process_line(line) {
                frames.push(frame);
            }
        }

        frames
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            // Comment (server keepalive)
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.pending.event = Some(value.to_string()),
            "data" => {
                if self.has_data {
                    self.pending.data.push('\n');
                }
                self.pending.data.push_str(value);
                self.has_data = true;
            }
            "id" => self.pending.id = Some(value.to_string()),
            other => trace!(field = other, "Ignoring unknown SSE field"),
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let frame = std::mem::take(&mut self.pending);
        let had_data = std::mem::replace(&mut self.has_data, false);
        if had_data || frame.event.is_some() {
            Some(frame)
        } else {
            None
        }
    }
}

/// Turn a stream of body chunks into a stream of SSE frames
///
/// Multi-byte characters may span chunks. Invalid UTF-8 is replaced rather
/// than rejected; transport errors end the stream with an [`Error::Stream`].
pub fn frames<S, B, E>(body: S) -> impl Stream<Item = Result<SseFrame>>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    async_stream::stream! {
        let body = body;
        futures::pin_mut!(body);
        let mut decoder = SseDecoder::new();
        // Trailing bytes of a UTF-8 sequence split across chunks
        let mut carry: Vec<u8> = Vec::new();
        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    carry.extend_from_slice(bytes.as_ref());
                    let complete = match std::str::from_utf8(&carry) {
                        Ok(_) => carry.len(),
                        Err(e) if e.error_len().is_none() => e.valid_up_to(),
                        Err(_) => carry.len(),
                    };
                    let rest = carry.split_off(complete);
                    let text = String::from_utf8_lossy(&carry).into_owned();
                    carry = rest;
                    for frame in decoder.push(&text) {
                        yield Ok(frame);
                    }
                }
                Err(e) => {
                    yield Err(Error::Stream(e.to_string()));
                    return;
                }
            }
        }
    }
}
