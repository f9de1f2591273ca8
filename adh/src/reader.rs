use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;

use crate::binary::BinaryFramer;
use crate::framer::StreamFramer;
use crate::mime::MimeFramer;

/// A reader that transparently handles both plain and gzip-compressed captures.
pub enum StreamReader {
    File(BufReader<File>),
    Gzip(BufReader<GzDecoder<File>>),
}

impl Read for StreamReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            StreamReader::File(r) => r.read(buf),
            StreamReader::Gzip(r) => r.read(buf),
        }
    }
}

impl BufRead for StreamReader {
    fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
        match self {
            StreamReader::File(r) => r.fill_buf(),
            StreamReader::Gzip(r) => r.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            StreamReader::File(r) => r.consume(amt),
            StreamReader::Gzip(r) => r.consume(amt),
        }
    }
}

/// Open a capture file. Paths ending in `.gz` are decompressed as they are read.
pub fn open_stream(path: &Path) -> std::io::Result<StreamReader> {
    let is_gz = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));

    let file = File::open(path)?;
    if is_gz {
        Ok(StreamReader::Gzip(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(StreamReader::File(BufReader::new(file)))
    }
}

/// Wire transport of a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Binary,
    Mime,
}

/// Open a capture and wrap it in the framer for `transport`.
///
/// `channel` is only used by the MIME transport, which has no channel on the wire.
pub fn open_framer(path: &Path, transport: Transport, channel: u16) -> std::io::Result<Box<dyn StreamFramer>> {
    let reader = open_stream(path)?;
    Ok(match transport {
        Transport::Binary => Box::new(BinaryFramer::new(reader)),
        Transport::Mime => Box::new(MimeFramer::with_channel(reader, channel)),
    })
}
