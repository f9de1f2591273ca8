//! Binary stream framing.
//!
//! Each packet is a 6-byte header followed by its payload:
//!
//! ```text
//! [frame_type: u8][channel: u8][length: u32 BE][payload: length bytes]
//! ```
//!
//! The wire channel is 0-based; [`StreamMetadata::channel`] is 1-based.

use std::io::{self, Read, Write};

use crate::error::{Result, StreamError};
use crate::frame_type::{FrameKind, frame_kind};
use crate::framer::{StreamFramer, read_fully};
use crate::packet::{RawFrame, StreamMetadata};

pub const HEADER_LEN: usize = 6;

pub struct BinaryFramer<R> {
    reader: R,
    offset: u64,
}

impl<R: Read> BinaryFramer<R> {
    pub fn new(reader: R) -> Self {
        BinaryFramer { reader, offset: 0 }
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> StreamFramer for BinaryFramer<R> {
    fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        let offset = self.offset;

        let mut header = [0u8; HEADER_LEN];
        let got = read_fully(&mut self.reader, &mut header)?;
        if got < HEADER_LEN {
            // A stream cut inside a header is treated as the end of the capture
            if got > 0 {
                log::debug!("Dropping {} trailing byte(s) at offset 0x{:X}", got, offset);
            }
            return Ok(None);
        }

        let code = header[0];
        let channel = header[1] as u16 + 1;
        let length = u32::from_be_bytes([header[2], header[3], header[4], header[5]]);
        let frame_type = frame_kind(code);
        if frame_type == FrameKind::Unknown {
            log::warn!("Unmapped frame type code {} at offset 0x{:X}", code, offset);
        }

        // Grow as data arrives rather than trusting the declared length up front.
        let mut payload = Vec::new();
        let got = self
            .reader
            .by_ref()
            .take(length as u64)
            .read_to_end(&mut payload)?;
        if got < length as usize {
            return Err(StreamError::Truncated {
                offset,
                context: "packet payload",
                expected: length as usize,
                got,
            });
        }
        self.offset += (HEADER_LEN + got) as u64;

        log::debug!(
            "{:?} packet on channel {} at 0x{:X}, {} bytes",
            frame_type,
            channel,
            offset,
            length
        );

        Ok(Some(RawFrame {
            metadata: StreamMetadata {
                frame_type,
                channel,
                length,
            },
            offset,
            payload,
        }))
    }
}

/// Write one packet in binary stream framing. `channel` is 1-based (1..=256).
pub fn write_packet<W: Write>(writer: &mut W, code: u8, channel: u16, payload: &[u8]) -> io::Result<()> {
    let wire_channel = channel
        .checked_sub(1)
        .and_then(|c| u8::try_from(c).ok())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, format!("channel {} out of range", channel)))?;
    let length = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "payload too large"))?;

    writer.write_all(&[code, wire_channel])?;
    writer.write_all(&length.to_be_bytes())?;
    writer.write_all(payload)
}
