//! MIME (multipart JPEG push) stream framing.
//!
//! After one leading blank line the stream repeats:
//!
//! ```text
//! --<boundary>
//! HTTP/1.1 200 OK
//! Server: ADH-Web
//! Content-type: image/jpeg
//! Content-length: <N>
//!
//! <N bytes of JFIF>
//!
//! ```
//!
//! Every part is a complete JFIF, delivered as [`FrameKind::Jfif`].

use std::io::{self, BufRead, Read, Write};

use crate::error::{Result, StreamError};
use crate::frame_type::FrameKind;
use crate::framer::StreamFramer;
use crate::packet::{RawFrame, StreamMetadata};

pub const SERVER_LINE: &str = "Server: ADH-Web";
pub const CONTENT_TYPE_LINE: &str = "Content-type: image/jpeg";
const CONTENT_LENGTH_PREFIX: &str = "Content-length: ";
const STATUS_PREFIXES: [&str; 2] = ["HTTP/1.0 200", "HTTP/1.1 200"];

pub struct MimeFramer<R> {
    reader: R,
    channel: u16,
    /// Bytes consumed so far.
    offset: u64,
    /// Lines consumed so far, for error reporting.
    line: u64,
    started: bool,
}

impl<R: BufRead> MimeFramer<R> {
    /// Framer for a stream whose parts are reported on channel 1.
    pub fn new(reader: R) -> Self {
        Self::with_channel(reader, 1)
    }

    /// The MIME transport carries no channel number, so the caller supplies one.
    pub fn with_channel(reader: R, channel: u16) -> Self {
        MimeFramer {
            reader,
            channel,
            offset: 0,
            line: 0,
            started: false,
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Next line without its terminator, or `None` at end of stream.
    fn read_line(&mut self) -> Result<Option<String>> {
        let mut buf = Vec::new();
        let n = self.reader.read_until(b'\n', &mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        self.offset += n as u64;
        self.line += 1;
        while matches!(buf.last(), Some(b'\n' | b'\r')) {
            buf.pop();
        }
        let line = String::from_utf8_lossy(&buf).into_owned();
        log::trace!("MIME line {}: {:?}", self.line, line);
        Ok(Some(line))
    }

    /// A line that must be present; end of stream is a framing error.
    fn expect_line(&mut self, expected: &'static str) -> Result<String> {
        self.read_line()?.ok_or_else(|| StreamError::MimeExpectation {
            line: self.line + 1,
            expected,
            got: "end of stream".to_string(),
        })
    }

    fn mismatch(&self, expected: &'static str, got: String) -> StreamError {
        StreamError::MimeExpectation {
            line: self.line,
            expected,
            got,
        }
    }

    fn expect_exact(&mut self, wanted: &'static str) -> Result<()> {
        let line = self.expect_line(wanted)?;
        if !line.eq_ignore_ascii_case(wanted) {
            return Err(self.mismatch(wanted, line));
        }
        Ok(())
    }

    fn expect_blank(&mut self, expected: &'static str) -> Result<()> {
        let line = self.expect_line(expected)?;
        if !line.is_empty() {
            return Err(self.mismatch(expected, line));
        }
        Ok(())
    }
}

impl<R: BufRead> StreamFramer for MimeFramer<R> {
    fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        let mut boundary = match self.read_line()? {
            Some(line) => line,
            None => return Ok(None),
        };
        if !self.started && boundary.is_empty() {
            boundary = match self.read_line()? {
                Some(line) => line,
                None => return Ok(None),
            };
        }
        self.started = true;

        let offset = self.offset;
        if !boundary.starts_with("--") {
            return Err(self.mismatch("boundary line", boundary));
        }

        let status = self.expect_line("HTTP 200 status line")?;
        if !STATUS_PREFIXES.iter().any(|p| {
            status.starts_with(p) && matches!(status.as_bytes().get(p.len()), None | Some(b' '))
        }) {
            return Err(self.mismatch("HTTP 200 status line", status));
        }

        self.expect_exact(SERVER_LINE)?;
        self.expect_exact(CONTENT_TYPE_LINE)?;

        let length_line = self.expect_line("Content-length header")?;
        let has_prefix = length_line
            .get(..CONTENT_LENGTH_PREFIX.len())
            .is_some_and(|p| p.eq_ignore_ascii_case(CONTENT_LENGTH_PREFIX));
        if !has_prefix {
            return Err(self.mismatch("Content-length header", length_line));
        }
        let value = &length_line[CONTENT_LENGTH_PREFIX.len()..];
        let length: u32 = value
            .trim()
            .parse()
            .map_err(|_| StreamError::InvalidContentLength {
                line: self.line,
                value: value.to_string(),
            })?;

        self.expect_blank("blank line after headers")?;

        // Content-length is untrusted; grow as data arrives
        let mut payload = Vec::new();
        let got = self
            .reader
            .by_ref()
            .take(length as u64)
            .read_to_end(&mut payload)?;
        if got < length as usize {
            return Err(StreamError::Truncated {
                offset: self.offset,
                context: "MIME part payload",
                expected: length as usize,
                got,
            });
        }
        self.offset += got as u64;

        self.expect_blank("blank line after payload")?;

        log::debug!("MIME part at 0x{:X}, {} bytes", offset, length);

        Ok(Some(RawFrame {
            metadata: StreamMetadata {
                frame_type: FrameKind::Jfif,
                channel: self.channel,
                length,
            },
            offset,
            payload,
        }))
    }
}

/// Write the blank line that opens a MIME stream.
pub fn write_preamble<W: Write>(writer: &mut W) -> io::Result<()> {
    writer.write_all(b"\r\n")
}

/// Write one JFIF as a MIME part.
pub fn write_part<W: Write>(writer: &mut W, boundary: &str, jfif: &[u8]) -> io::Result<()> {
    write!(
        writer,
        "--{}\r\nHTTP/1.1 200 OK\r\n{}\r\n{}\r\n{}{}\r\n\r\n",
        boundary,
        SERVER_LINE,
        CONTENT_TYPE_LINE,
        CONTENT_LENGTH_PREFIX,
        jfif.len()
    )?;
    writer.write_all(jfif)?;
    writer.write_all(b"\r\n")
}
