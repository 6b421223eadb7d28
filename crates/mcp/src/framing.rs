//! Frame codec for the stream transport.
//!
//! Hosts write protocol frames to stdout, often mixed with plain log
//! output (npm banners, warnings). The decoder never fails: anything that
//! is not a well-formed frame comes out as [`Frame::Noise`].

use serde::Deserialize;
use serde_json::Value;

/// Largest body the decoder accepts (16 MiB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

const HEADER: &[u8] = b"content-length:";

/// How messages are delimited on the byte stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Framing {
    /// `Content-Length: N\r\n\r\n` followed by N bytes of JSON.
    #[default]
    ContentLength,
    /// One JSON object per line.
    #[serde(alias = "lines")]
    LineDelimited,
}

/// Wrap a serialized message body for the wire.
pub fn encode(framing: Framing, body: &[u8]) -> Vec<u8> {
    match framing {
        Framing::ContentLength => {
            let header = format!("Content-Length: {}\r\n\r\n", body.len());
            let mut out = Vec::with_capacity(header.len() + body.len());
            out.extend_from_slice(header.as_bytes());
            out.extend_from_slice(body);
            out
        }
        Framing::LineDelimited => {
            let mut out = Vec::with_capacity(body.len() + 1);
            out.extend_from_slice(body);
            out.push(b'\n');
            out
        }
    }
}

/// One unit produced by the decoder.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Message(Value),
    Noise(String),
}

#[derive(Debug, Clone, Copy)]
enum State {
    /// Looking for a header line (or a JSON line).
    Idle,
    /// Header seen, skipping further headers up to the blank separator.
    Headers { length: usize },
    Body { length: usize },
    /// Oversized frame being thrown away.
    Discard { remaining: usize },
}

/// Incremental decoder; feed it bytes as they arrive.
#[derive(Debug)]
pub struct FrameDecoder {
    framing: Framing,
    buf: Vec<u8>,
    state: State,
}

impl FrameDecoder {
    pub fn new(framing: Framing) -> Self {
        Self {
            framing,
            buf: Vec::new(),
            state: State::Idle,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes received but not yet decoded.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Decode the next frame, or `None` if more bytes are needed.
    pub fn next_frame(&mut self) -> Option<Frame> {
        match self.framing {
            Framing::ContentLength => self.next_content_length(),
            Framing::LineDelimited => self.next_line_delimited(),
        }
    }

    fn next_content_length(&mut self) -> Option<Frame> {
        loop {
            match self.state {
                State::Idle => {
                    let line = self.peek_line()?;
                    if let Some(pos) = find_header(line).filter(|&pos| pos > 0) {
                        // Log text ran straight into a header: split it off.
                        let noise = lossy(&self.buf[..pos]);
                        self.buf.drain(..pos);
                        if noise.trim().is_empty() {
                            continue;
                        }
                        return Some(Frame::Noise(noise));
                    }

                    let line = self.take_line()?;
                    let text = trim_eol(&line);
                    if text.is_empty() {
                        continue;
                    }
                    if !starts_with_header(text) {
                        return Some(Frame::Noise(lossy(text)));
                    }
                    match parse_length(text) {
                        Some(length) if length > MAX_FRAME_SIZE => {
                            self.state = State::Discard { remaining: length };
                            self.skip_headers_before_discard();
                            return Some(Frame::Noise(format!(
                                "dropped oversized frame of {length} bytes (max {MAX_FRAME_SIZE})"
                            )));
                        }
                        Some(length) => self.state = State::Headers { length },
                        None => return Some(Frame::Noise(lossy(text))),
                    }
                }
                State::Headers { length } => {
                    let line = self.take_line()?;
                    if trim_eol(&line).is_empty() {
                        self.state = State::Body { length };
                    }
                }
                State::Body { length } => {
                    if self.buf.len() < length {
                        return None;
                    }
                    let body: Vec<u8> = self.buf.drain(..length).collect();
                    self.state = State::Idle;
                    return Some(match serde_json::from_slice::<Value>(&body) {
                        Ok(value) => Frame::Message(value),
                        Err(_) => Frame::Noise(lossy(&body)),
                    });
                }
                State::Discard { remaining } => {
                    let n = remaining.min(self.buf.len());
                    self.buf.drain(..n);
                    if n < remaining {
                        self.state = State::Discard {
                            remaining: remaining - n,
                        };
                        return None;
                    }
                    self.state = State::Idle;
                }
            }
        }
    }

    // The header block of an oversized frame is consumed eagerly when it is
    // already buffered; otherwise its separator is dropped with the body.
    fn skip_headers_before_discard(&mut self) {
        while let Some(line) = self.peek_line() {
            let blank = trim_eol(line).is_empty();
            let _ = self.take_line();
            if blank {
                break;
            }
        }
    }

    fn next_line_delimited(&mut self) -> Option<Frame> {
        loop {
            let line = self.take_line()?;
            let text = trim_eol(&line);
            if text.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Some(match serde_json::from_slice::<Value>(text) {
                Ok(value @ Value::Object(_)) => Frame::Message(value),
                _ => Frame::Noise(lossy(text)),
            });
        }
    }

    fn peek_line(&self) -> Option<&[u8]> {
        let end = self.buf.iter().position(|&b| b == b'\n')?;
        Some(&self.buf[..=end])
    }

    fn take_line(&mut self) -> Option<Vec<u8>> {
        let end = self.buf.iter().position(|&b| b == b'\n')?;
        Some(self.buf.drain(..=end).collect())
    }
}

fn trim_eol(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn starts_with_header(line: &[u8]) -> bool {
    line.len() >= HEADER.len() && line[..HEADER.len()].eq_ignore_ascii_case(HEADER)
}

fn find_header(line: &[u8]) -> Option<usize> {
    line.windows(HEADER.len())
        .position(|w| w.eq_ignore_ascii_case(HEADER))
}

fn parse_length(line: &[u8]) -> Option<usize> {
    std::str::from_utf8(&line[HEADER.len()..])
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}
