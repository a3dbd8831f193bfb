//! Server-sent events transport
//!
//! - [`codec`]: SSE framing in both directions
//! - [`chunked`]: chunked transfer decoding for upstream bodies
//! - [`head`]: HTTP/1.1 response heads
//! - [`client`]: the relay's HTTP upstream ([`HttpEventSource`])

pub mod chunked;
pub mod client;
pub mod codec;
pub mod head;

pub use chunked::ChunkedDecoder;
pub use client::{ClientConfig, HttpEventSource, HttpEventStream, SourceUrl};
pub use codec::{encode_comment, encode_data, SseDecoder, SseEvent};
