use std::io::{ErrorKind, Read};

use crate::error::Result;
use crate::packet::RawFrame;

/// Pulls successive packets off a byte stream.
///
/// `Ok(None)` means the stream ended cleanly between packets. A stream that
/// ends part-way through a packet is an error.
pub trait StreamFramer {
    fn next_frame(&mut self) -> Result<Option<RawFrame>>;
}

/// Read until `buf` is full or the reader is exhausted; returns the byte count.
pub(crate) fn read_fully<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
