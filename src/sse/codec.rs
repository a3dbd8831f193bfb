//! Server-sent events framing
//!
//! Only the subset used here: `data`, `event` and `id` fields, comment lines,
//! and LF or CRLF line endings. `retry` and unknown fields are ignored.

use bytes::{Buf, Bytes, BytesMut};

/// Longest line accepted before the decoder gives up on the stream
pub const MAX_LINE_LEN: usize = 4 * 1024 * 1024;

/// One dispatched event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// `event:` field, if present
    pub event: Option<String>,
    /// Last `id:` field seen
    pub id: Option<String>,
    /// `data:` lines joined with `\n`
    pub data: String,
}

/// Incremental SSE decoder
///
/// Feed raw body bytes with [`extend`](Self::extend) and pull complete
/// events with [`next_event`](Self::next_event).
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: BytesMut,
    data: Vec<String>,
    event: Option<String>,
    id: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append body bytes
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes held back waiting for a line ending
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Pull the next complete event, if one is buffered
    pub fn next_event(&mut self) -> Option<SseEvent> {
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line = self.buf.split_to(pos + 1);
            let mut line = &line[..pos];
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }

            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    return Some(event);
                }
                continue;
            }

            self.process_line(&String::from_utf8_lossy(line));
        }
        None
    }

    /// Whether the buffered partial line has grown past [`MAX_LINE_LEN`]
    pub fn is_overflowing(&self) -> bool {
        self.buf.len() > MAX_LINE_LEN
    }

    /// Discard buffered state, e.g. after a reconnect
    pub fn reset(&mut self) {
        self.buf.clear();
        self.data.clear();
        self.event = None;
        self.id = None;
    }

    fn process_line(&mut self, line: &str) {
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }

        let data = self.data.join("\n");
        self.data.clear();
        Some(SseEvent {
            event,
            id: self.id.clone(),
            data,
        })
    }
}

/// Frame `data` as a single SSE event
///
/// Embedded newlines become separate `data:` lines.
pub fn encode_data(data: &str) -> Bytes {
    let mut out = BytesMut::with_capacity(data.len() + 8);
    for line in data.split('\n') {
        out.extend_from_slice(b"data: ");
        out.extend_from_slice(line.strip_suffix('\r').unwrap_or(line).as_bytes());
        out.extend_from_slice(b"\n");
    }
    out.extend_from_slice(b"\n");
    out.freeze()
}

/// A comment line, used as a keep-alive
pub fn encode_comment(text: &str) -> Bytes {
    let mut out = BytesMut::with_capacity(text.len() + 4);
    out.extend_from_slice(b": ");
    out.extend_from_slice(text.as_bytes());
    out.extend_from_slice(b"\n\n");
    out.freeze()
}

/// Skip a UTF-8 byte-order mark at the start of a stream
pub fn strip_bom(buf: &mut BytesMut) {
    if buf.starts_with(&[0xef, 0xbb, 0xbf]) {
        buf.advance(3);
    }
}
