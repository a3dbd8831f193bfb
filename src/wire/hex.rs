//! Lowercase hex encoding for audio payloads

const DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Hex decoding failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HexError {
    #[error("odd number of hex digits ({0})")]
    OddLength(usize),

    #[error("invalid hex digit at offset {0}")]
    InvalidDigit(usize),
}

/// Encode bytes as lowercase hex
pub fn encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for &byte in data {
        out.push(DIGITS[(byte >> 4) as usize] as char);
        out.push(DIGITS[(byte & 0x0f) as usize] as char);
    }
    out
}

/// Decode hex (either case) into bytes
pub fn decode(text: &str) -> Result<Vec<u8>, HexError> {
    let raw = text.as_bytes();
    if raw.len() % 2 != 0 {
        return Err(HexError::OddLength(raw.len()));
    }

    let mut out = Vec::with_capacity(raw.len() / 2);
    for (i, pair) in raw.chunks_exact(2).enumerate() {
        let high = nibble(pair[0]).ok_or(HexError::InvalidDigit(i * 2))?;
        let low = nibble(pair[1]).ok_or(HexError::InvalidDigit(i * 2 + 1))?;
        out.push(high << 4 | low);
    }
    Ok(out)
}

fn nibble(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}
