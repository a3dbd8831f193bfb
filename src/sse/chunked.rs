//! HTTP/1.1 chunked transfer decoding

use bytes::{Buf, BytesMut};

use crate::error::ProtocolError;

/// Longest chunk-size line accepted (hex digits plus extensions)
const MAX_SIZE_LINE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Waiting for a `<hex>[;ext]\r\n` line
    Size,
    /// Remaining bytes of the current chunk
    Data(usize),
    /// CRLF after chunk data
    DataEnd,
    /// Trailer lines after the zero chunk
    Trailer,
    Done,
}

/// Incremental chunked body decoder
#[derive(Debug)]
pub struct ChunkedDecoder {
    state: State,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { state: State::Size }
    }

    /// Whether the terminating zero-length chunk has been consumed
    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Consume as much of `src` as possible, appending body bytes to `out`
    ///
    /// Incomplete framing is left in `src` for the next call.
    pub fn decode(&mut self, src: &mut BytesMut, out: &mut BytesMut) -> Result<(), ProtocolError> {
        loop {
            match self.state {
                State::Size => {
                    let Some(pos) = find_crlf(src) else {
                        if src.len() > MAX_SIZE_LINE {
                            return Err(ProtocolError::InvalidChunk("chunk size line too long".into()));
                        }
                        return Ok(());
                    };
                    let line = src.split_to(pos + 2);
                    let size = parse_size(&line[..pos])?;
                    self.state = if size == 0 { State::Trailer } else { State::Data(size) };
                }
                State::Data(remaining) => {
                    if src.is_empty() {
                        return Ok(());
                    }
                    let n = remaining.min(src.len());
                    out.extend_from_slice(&src.split_to(n));
                    self.state = if n == remaining {
                        State::DataEnd
                    } else {
                        State::Data(remaining - n)
                    };
                }
                State::DataEnd => {
                    if src.len() < 2 {
                        return Ok(());
                    }
                    if &src[..2] != b"\r\n" {
                        return Err(ProtocolError::InvalidChunk("missing CRLF after chunk data".into()));
                    }
                    src.advance(2);
                    self.state = State::Size;
                }
                State::Trailer => {
                    let Some(pos) = find_crlf(src) else {
                        return Ok(());
                    };
                    src.advance(pos + 2);
                    if pos == 0 {
                        self.state = State::Done;
                    }
                }
                State::Done => return Ok(()),
            }
        }
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

fn parse_size(line: &[u8]) -> Result<usize, ProtocolError> {
    let text = std::str::from_utf8(line)
        .map_err(|_| ProtocolError::InvalidChunk("non-ASCII chunk size".into()))?;
    let digits = text.split(';').next().unwrap_or_default().trim();
    usize::from_str_radix(digits, 16)
        .map_err(|_| ProtocolError::InvalidChunk(format!("bad chunk size {:?}", digits)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_complete_body() {
        let mut decoder = ChunkedDecoder::new();
        let mut src = BytesMut::from(&b"5\r\nhello\r\n6;ext=1\r\n world\r\n0\r\n\r\n"[..]);
        let mut out = BytesMut::new();

        decoder.decode(&mut src, &mut out).unwrap();

        assert_eq!(&out[..], b"hello world");
        assert!(decoder.is_done());
        assert!(src.is_empty());
    }

    #[test]
    fn test_decode_byte_by_byte() {
        let input = b"a\r\n0123456789\r\n3\r\nabc\r\n0\r\nX-Trailer: 1\r\n\r\n";
        let mut decoder = ChunkedDecoder::new();
        let mut src = BytesMut::new();
        let mut out = BytesMut::new();

        for &byte in input.iter() {
            src.extend_from_slice(&[byte]);
            decoder.decode(&mut src, &mut out).unwrap();
        }

        assert_eq!(&out[..], b"0123456789abc");
        assert!(decoder.is_done());
    }

    #[test]
    fn test_invalid_size() {
        let mut decoder = ChunkedDecoder::new();
        let mut src = BytesMut::from(&b"zz\r\n"[..]);
        let result = decoder.decode(&mut src, &mut BytesMut::new());

        assert!(matches!(result, Err(ProtocolError::InvalidChunk(_))));
    }

    #[test]
    fn test_missing_data_terminator() {
        let mut decoder = ChunkedDecoder::new();
        let mut src = BytesMut::from(&b"2\r\nabXY"[..]);
        let result = decoder.decode(&mut src, &mut BytesMut::new());

        assert!(matches!(result, Err(ProtocolError::InvalidChunk(_))));
    }
}
