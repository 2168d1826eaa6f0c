use std::collections::HashMap;

use bytes::BytesMut;

/// A fully assembled HTTP/1.1 request (spec.md §6 "Requests are parsed
/// into `{method, path, body}`").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub keep_alive: bool,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HttpError {
    #[error("malformed request line")]
    BadRequestLine,
    #[error("malformed header line")]
    BadHeader,
    #[error("header too large")]
    HeaderTooLarge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    RequestLine,
    Headers,
    Body,
    Done,
}

/// Hand-rolled incremental parser (spec.md §4.B "HTTP"): message-begin
/// resets accumulators, header/path/body events populate them,
/// message-complete triggers dispatch. Written against fixed grammar
/// rather than pulling in a second HTTP stack, matching the original's
/// own `http_parser`-style design.
pub struct HttpParser {
    state: State,
    buf: BytesMut,
    method: String,
    path: String,
    headers: HashMap<String, String>,
    content_length: usize,
    body: Vec<u8>,
}

const MAX_HEADER_SECTION: usize = 16 * 1024;

impl HttpParser {
    pub fn new() -> HttpParser {
        HttpParser {
            state: State::RequestLine,
            buf: BytesMut::new(),
            method: String::new(),
            path: String::new(),
            headers: HashMap::new(),
            content_length: 0,
            body: Vec::new(),
        }
    }

    fn reset(&mut self) {
        self.state = State::RequestLine;
        self.method.clear();
        self.path.clear();
        self.headers.clear();
        self.content_length = 0;
        self.body.clear();
    }

    pub fn feed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Drives the state machine as far as the buffered bytes allow,
    /// returning a completed request if one is ready. `Ok(None)` means
    /// "need more data".
    pub fn try_parse(&mut self) -> Result<Option<Request>, HttpError> {
        loop {
            match self.state {
                State::RequestLine => {
                    let Some(line) = take_line(&mut self.buf) else {
                        if self.buf.len() > MAX_HEADER_SECTION {
                            return Err(HttpError::HeaderTooLarge);
                        }
                        return Ok(None);
                    };
                    let mut parts = line.split(' ');
                    let method = parts.next().ok_or(HttpError::BadRequestLine)?;
                    let path = parts.next().ok_or(HttpError::BadRequestLine)?;
                    let _version = parts.next().ok_or(HttpError::BadRequestLine)?;
                    self.method = method.to_string();
                    self.path = path.to_string();
                    self.state = State::Headers;
                }
                State::Headers => {
                    let Some(line) = take_line(&mut self.buf) else {
                        if self.buf.len() > MAX_HEADER_SECTION {
                            return Err(HttpError::HeaderTooLarge);
                        }
                        return Ok(None);
                    };
                    if line.is_empty() {
                        self.content_length = self
                            .headers
                            .get("content-length")
                            .and_then(|v| v.parse().ok())
                            .unwrap_or(0);
                        self.state = if self.content_length == 0 { State::Done } else { State::Body };
                        continue;
                    }
                    let (name, value) = line.split_once(':').ok_or(HttpError::BadHeader)?;
                    self.headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
                }
                State::Body => {
                    if self.buf.len() < self.content_length {
                        return Ok(None);
                    }
                    self.body = self.buf.split_to(self.content_length).to_vec();
                    self.state = State::Done;
                }
                State::Done => {
                    let keep_alive = self.headers.get("connection").map(|v| v.eq_ignore_ascii_case("keep-alive")).unwrap_or(true);
                    let request = Request {
                        method: std::mem::take(&mut self.method),
                        path: std::mem::take(&mut self.path),
                        headers: std::mem::take(&mut self.headers),
                        body: std::mem::take(&mut self.body),
                        keep_alive,
                    };
                    self.reset();
                    return Ok(Some(request));
                }
            }
        }
    }
}

impl Default for HttpParser {
    fn default() -> Self {
        HttpParser::new()
    }
}

/// Pulls one CRLF- or LF-terminated line out of `buf`, if a terminator is
/// present, trimming the terminator.
fn take_line(buf: &mut BytesMut) -> Option<String> {
    let pos = buf.iter().position(|&b| b == b'\n')?;
    let mut line = buf.split_to(pos + 1);
    line.truncate(line.len() - 1);
    if line.ends_with(b"\r") {
        line.truncate(line.len() - 1);
    }
    Some(String::from_utf8_lossy(&line).into_owned())
}

/// Writes a minimal HTTP/1.1 response with `Content-Type`/`Content-Length`
/// (spec.md §6 "Responses follow HTTP/1.1 framing").
pub fn encode_response(status: u16, reason: &str, content_type: &str, body: &[u8]) -> Vec<u8> {
    let head = format!("HTTP/1.1 {status} {reason}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\n\r\n", body.len());
    let mut out = head.into_bytes();
    out.extend_from_slice(body);
    out
}
