//! HTTP/1.1 response heads for the upstream client

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, ProtocolError, Result};

/// Header list in arrival order, names lowercased
pub type Headers = Vec<(String, String)>;

/// Position just past the blank line ending a message head
pub(crate) fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|pos| pos + 4)
}

/// Read until `buf` holds a full message head; returns its length
pub(crate) async fn read_head<R>(reader: &mut R, buf: &mut BytesMut, max_head_size: usize) -> Result<usize>
where
    R: AsyncRead + Unpin,
{
    loop {
        if let Some(end) = find_head_end(buf) {
            return Ok(end);
        }
        if buf.len() > max_head_size {
            return Err(ProtocolError::HeadTooLarge(max_head_size).into());
        }
        if reader.read_buf(buf).await? == 0 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed before end of head",
            )));
        }
    }
}

/// Split a head into its start line and parsed headers
pub(crate) fn parse_head(head: &[u8]) -> std::result::Result<(String, Headers), ProtocolError> {
    let text = std::str::from_utf8(head)
        .map_err(|_| ProtocolError::MalformedMessage("head is not UTF-8".into()))?;
    let mut lines = text.split("\r\n");
    let start = lines
        .next()
        .filter(|line| !line.is_empty())
        .ok_or_else(|| ProtocolError::MalformedMessage("empty start line".into()))?;

    let mut headers = Vec::new();
    for line in lines.take_while(|line| !line.is_empty()) {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| ProtocolError::MalformedMessage(format!("bad header line {:?}", line)))?;
        headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
    }

    Ok((start.to_string(), headers))
}

pub(crate) fn header_value<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Status code from `HTTP/1.1 200 OK`
pub(crate) fn status_code(status_line: &str) -> std::result::Result<u16, ProtocolError> {
    status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| ProtocolError::MalformedMessage(format!("bad status line {:?}", status_line)))
}
