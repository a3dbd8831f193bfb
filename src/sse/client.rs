//! Upstream SSE client
//!
//! Connects to a producer (or another relay) over plain HTTP/1.1 and yields
//! the `data` payload of each event.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::chunked::ChunkedDecoder;
use super::codec::{strip_bom, SseDecoder};
use super::head::{header_value, parse_head, read_head, status_code};
use crate::error::{Error, ProtocolError, Result};
use crate::relay::{EventSource, EventStream};

/// Path requested when the source URL has none
pub const DEFAULT_STREAM_PATH: &str = "/stream";

/// Parsed `http://host[:port][/path]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUrl {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl SourceUrl {
    pub fn parse(url: &str) -> std::result::Result<Self, ProtocolError> {
        let invalid = |reason: &str| ProtocolError::InvalidUrl(format!("{}: {}", url, reason));

        let rest = url
            .trim()
            .strip_prefix("http://")
            .ok_or_else(|| invalid("only http:// is supported"))?;

        let (authority, path) = match rest.find('/') {
            Some(i) => rest.split_at(i),
            None => (rest, ""),
        };

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => (host, port.parse::<u16>().map_err(|_| invalid("bad port"))?),
            None => (authority, 80),
        };
        if host.is_empty() {
            return Err(invalid("missing host"));
        }

        let path = if path.is_empty() || path == "/" {
            DEFAULT_STREAM_PATH
        } else {
            path
        };

        Ok(Self {
            host: host.to_string(),
            port,
            path: path.to_string(),
        })
    }

    /// `host:port`
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl FromStr for SourceUrl {
    type Err = ProtocolError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SourceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "http://{}:{}{}", self.host, self.port, self.path)
    }
}

/// Client connection options
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bound on TCP connect plus response head
    pub connect_timeout: Duration,

    /// Largest response head accepted
    pub max_head_size: usize,

    /// Initial read buffer size
    pub read_buffer_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            max_head_size: 16 * 1024,
            read_buffer_size: 16 * 1024,
        }
    }
}

impl ClientConfig {
    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// [`EventSource`] reading SSE over HTTP/1.1
#[derive(Debug, Clone)]
pub struct HttpEventSource {
    url: SourceUrl,
    config: ClientConfig,
}

impl HttpEventSource {
    /// Create a source for `url` with default options
    pub fn new(url: &str) -> std::result::Result<Self, ProtocolError> {
        Ok(Self::with_config(SourceUrl::parse(url)?, ClientConfig::default()))
    }

    pub fn with_config(url: SourceUrl, config: ClientConfig) -> Self {
        Self { url, config }
    }

    pub fn url(&self) -> &SourceUrl {
        &self.url
    }

    async fn open(&self) -> Result<HttpEventStream> {
        let authority = self.url.authority();
        let mut socket = TcpStream::connect(&authority).await?;
        socket.set_nodelay(true)?;

        let request = format!(
            "GET {} HTTP/1.1\r\nHost: {}\r\nAccept: text/event-stream\r\nCache-Control: no-cache\r\nConnection: keep-alive\r\n\r\n",
            self.url.path, authority
        );
        socket.write_all(request.as_bytes()).await?;

        let mut buf = BytesMut::with_capacity(self.config.read_buffer_size);
        let head_len = read_head(&mut socket, &mut buf, self.config.max_head_size).await?;
        let head = buf.split_to(head_len);
        let (status_line, headers) = parse_head(&head)?;

        let status = status_code(&status_line)?;
        if status != 200 {
            return Err(ProtocolError::UnexpectedStatus(status).into());
        }

        let chunked = header_value(&headers, "transfer-encoding")
            .map(|value| value.to_ascii_lowercase().contains("chunked"))
            .unwrap_or(false);

        tracing::debug!(url = %self.url, chunked = chunked, "Upstream response accepted");

        Ok(HttpEventStream {
            socket,
            raw: buf,
            body: BytesMut::new(),
            chunked: chunked.then(ChunkedDecoder::new),
            decoder: SseDecoder::new(),
            started: false,
        })
    }
}

impl EventSource for HttpEventSource {
    type Stream = HttpEventStream;

    async fn connect(&self) -> Result<HttpEventStream> {
        tokio::time::timeout(self.config.connect_timeout, self.open())
            .await
            .map_err(|_| Error::Timeout)?
    }

    fn describe(&self) -> String {
        self.url.to_string()
    }
}

/// Open SSE response body
#[derive(Debug)]
pub struct HttpEventStream {
    socket: TcpStream,
    /// Bytes read but not yet de-chunked
    raw: BytesMut,
    /// De-chunked body bytes awaiting the SSE decoder
    body: BytesMut,
    chunked: Option<ChunkedDecoder>,
    decoder: SseDecoder,
    started: bool,
}

impl HttpEventStream {
    fn drain_raw(&mut self) -> Result<()> {
        if self.raw.is_empty() {
            return Ok(());
        }

        match &mut self.chunked {
            Some(dechunk) => dechunk.decode(&mut self.raw, &mut self.body)?,
            None => self.body.unsplit(self.raw.split()),
        }

        if !self.started && !self.body.is_empty() {
            strip_bom(&mut self.body);
            self.started = true;
        }

        self.decoder.extend(&self.body);
        self.body.clear();
        Ok(())
    }
}

impl EventStream for HttpEventStream {
    async fn next_event(&mut self) -> Result<Option<String>> {
        loop {
            self.drain_raw()?;

            if let Some(event) = self.decoder.next_event() {
                return Ok(Some(event.data));
            }
            if self.decoder.is_overflowing() {
                return Err(ProtocolError::MalformedMessage("event exceeds maximum line length".into()).into());
            }
            if self.chunked.as_ref().is_some_and(ChunkedDecoder::is_done) {
                return Ok(None);
            }

            if self.socket.read_buf(&mut self.raw).await? == 0 {
                return Ok(None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_parse_url_defaults() {
        let url = SourceUrl::parse("http://audio-source:8000").unwrap();
        assert_eq!(url.host, "audio-source");
        assert_eq!(url.port, 8000);
        assert_eq!(url.path, "/stream");
        assert_eq!(url.to_string(), "http://audio-source:8000/stream");

        let url = SourceUrl::parse("http://localhost/").unwrap();
        assert_eq!(url.port, 80);
        assert_eq!(url.path, "/stream");
    }

    #[test]
    fn test_parse_url_with_path() {
        let url: SourceUrl = "http://10.0.0.2:8001/stream?delay=500".parse().unwrap();
        assert_eq!(url.host, "10.0.0.2");
        assert_eq!(url.path, "/stream?delay=500");
    }

    #[test]
    fn test_parse_url_errors() {
        assert!(SourceUrl::parse("https://secure:443").is_err());
        assert!(SourceUrl::parse("http://:8000").is_err());
        assert!(SourceUrl::parse("http://host:notaport").is_err());
        assert!(SourceUrl::parse("audio-source:8000").is_err());
    }

    /// Serve one connection with a canned response, returning the request head
    async fn serve_once(response: &'static [u8]) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = BytesMut::new();
            let len = read_head(&mut socket, &mut buf, 4096).await.unwrap();
            socket.write_all(response).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8(buf[..len].to_vec()).unwrap()
        });

        (url, handle)
    }

    #[tokio::test]
    async fn test_reads_plain_event_stream() {
        let (url, server) = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\n\r\ndata: {\"a\":1}\n\n: ping\n\ndata: {\"b\":2}\n\n",
        )
        .await;

        let source = HttpEventSource::new(&url).unwrap();
        let mut stream = source.connect().await.unwrap();

        assert_eq!(stream.next_event().await.unwrap().as_deref(), Some("{\"a\":1}"));
        assert_eq!(stream.next_event().await.unwrap().as_deref(), Some("{\"b\":2}"));
        assert_eq!(stream.next_event().await.unwrap(), None);

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /stream HTTP/1.1\r\n"));
        assert!(request.contains("Accept: text/event-stream"));
    }

    #[tokio::test]
    async fn test_reads_chunked_event_stream() {
        let (url, server) = serve_once(
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n7\r\ndata: x\r\n4\r\n\n\nda\r\n7\r\nta: yz\n\r\n1\r\n\n\r\n0\r\n\r\n",
        )
        .await;

        let source = HttpEventSource::new(&url).unwrap();
        let mut stream = source.connect().await.unwrap();

        assert_eq!(stream.next_event().await.unwrap().as_deref(), Some("x"));
        assert_eq!(stream.next_event().await.unwrap().as_deref(), Some("yz"));
        assert_eq!(stream.next_event().await.unwrap(), None);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_non_200() {
        let (url, server) = serve_once(b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\n\r\n").await;

        let source = HttpEventSource::new(&url).unwrap();
        let result = source.connect().await;

        assert!(matches!(
            result,
            Err(Error::Protocol(ProtocolError::UnexpectedStatus(503)))
        ));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let source = HttpEventSource::new(&format!("http://{}", addr)).unwrap();
        assert!(matches!(source.connect().await, Err(Error::Io(_))));
    }
}
