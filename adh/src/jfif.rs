//! JFIF reconstruction for minimized JPEG frames.
//!
//! A minimized frame carries only the entropy-coded scan data plus an
//! [`ImageDataStruct`]. Everything else a decoder needs (quantization tables,
//! frame and scan headers, Huffman tables) is regenerated here from the struct:
//!
//! ```text
//! SOI APP0 | COM (comment block) | DQT luma | DQT chroma | SOF0 | DHT | SOS | scan | EOI
//! ```
//!
//! [`minimize`] is the inverse: it turns such a JFIF back into a struct and a
//! minimized payload that reconstructs to the same bytes.

use crate::comment::{CommentBlock, build_comment};
use crate::error::{Result, StreamError};
use crate::image_struct::{
    ImageDataStruct, LOCALE_LEN, PictureStruct, Resolution, StructVersion, TITLE_LEN, VideoFormat,
};

/// JPEG marker codes (second byte after 0xFF).
pub mod markers {
    pub const SOF0: u8 = 0xC0;
    pub const DHT: u8 = 0xC4;
    pub const SOI: u8 = 0xD8;
    pub const EOI: u8 = 0xD9;
    pub const SOS: u8 = 0xDA;
    pub const DQT: u8 = 0xDB;
    pub const APP0: u8 = 0xE0;
    pub const COM: u8 = 0xFE;
}

/// SOI followed by a JFIF 1.02 APP0 segment, aspect ratio 1:1, no thumbnail.
const JFIF_HEADER: [u8; 20] = [
    0xFF, markers::SOI,
    0xFF, markers::APP0, 0x00, 0x10,
    b'J', b'F', b'I', b'F', 0x00,
    0x01, 0x02, // version
    0x00, // density units
    0x00, 0x01, 0x00, 0x01, // density
    0x00, 0x00, // thumbnail
];

/// Largest comment that fits a COM segment's 16-bit length (which includes itself).
const MAX_COMMENT_LEN: usize = 0xFFFF - 2;

/// Luminance visibility constants, natural (row-major) order.
pub const LUMINANCE_BASE: [u8; 64] = [
    16, 11, 10, 16, 24, 40, 51, 61,
    12, 12, 14, 19, 26, 58, 60, 55,
    14, 13, 16, 24, 40, 57, 69, 56,
    14, 17, 22, 29, 51, 87, 80, 62,
    18, 22, 37, 56, 68, 109, 103, 77,
    24, 35, 55, 64, 81, 104, 113, 92,
    49, 64, 78, 87, 103, 121, 120, 101,
    72, 92, 95, 98, 112, 100, 103, 99,
];

/// Chrominance visibility constants, natural (row-major) order.
pub const CHROMINANCE_BASE: [u8; 64] = [
    17, 18, 24, 47, 99, 99, 99, 99,
    18, 21, 26, 66, 99, 99, 99, 99,
    24, 26, 56, 99, 99, 99, 99, 99,
    47, 66, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
];

/// Natural-order index of the k-th coefficient in zigzag order.
const ZIGZAG: [usize; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10,
    17, 24, 32, 25, 18, 11, 4, 5,
    12, 19, 26, 33, 40, 48, 41, 34,
    27, 20, 13, 6, 7, 14, 21, 28,
    35, 42, 49, 56, 57, 50, 43, 36,
    29, 22, 15, 23, 30, 37, 44, 51,
    58, 59, 52, 45, 38, 31, 39, 46,
    53, 60, 61, 54, 47, 55, 62, 63,
];

const DC_LUMINANCE_BITS: [u8; 16] = [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];
const DC_LUMINANCE_VALUES: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

const AC_LUMINANCE_BITS: [u8; 16] = [0, 2, 1, 3, 3, 2, 4, 3, 5, 5, 4, 4, 0, 0, 1, 0x7D];
const AC_LUMINANCE_VALUES: [u8; 162] = [
    0x01, 0x02, 0x03, 0x00, 0x04, 0x11, 0x05, 0x12,
    0x21, 0x31, 0x41, 0x06, 0x13, 0x51, 0x61, 0x07,
    0x22, 0x71, 0x14, 0x32, 0x81, 0x91, 0xA1, 0x08,
    0x23, 0x42, 0xB1, 0xC1, 0x15, 0x52, 0xD1, 0xF0,
    0x24, 0x33, 0x62, 0x72, 0x82, 0x09, 0x0A, 0x16,
    0x17, 0x18, 0x19, 0x1A, 0x25, 0x26, 0x27, 0x28,
    0x29, 0x2A, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39,
    0x3A, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49,
    0x4A, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59,
    0x5A, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68, 0x69,
    0x6A, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79,
    0x7A, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89,
    0x8A, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98,
    0x99, 0x9A, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6, 0xA7,
    0xA8, 0xA9, 0xAA, 0xB2, 0xB3, 0xB4, 0xB5, 0xB6,
    0xB7, 0xB8, 0xB9, 0xBA, 0xC2, 0xC3, 0xC4, 0xC5,
    0xC6, 0xC7, 0xC8, 0xC9, 0xCA, 0xD2, 0xD3, 0xD4,
    0xD5, 0xD6, 0xD7, 0xD8, 0xD9, 0xDA, 0xE1, 0xE2,
    0xE3, 0xE4, 0xE5, 0xE6, 0xE7, 0xE8, 0xE9, 0xEA,
    0xF1, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7, 0xF8,
    0xF9, 0xFA,
];

/// Length field of the single DHT segment holding both tables.
const DHT_LEN: usize = 2
    + 1 + DC_LUMINANCE_BITS.len() + DC_LUMINANCE_VALUES.len()
    + 1 + AC_LUMINANCE_BITS.len() + AC_LUMINANCE_VALUES.len();

/// Three components, all using Huffman table 0 for DC and AC, full spectral range.
const SOS_SEGMENT: [u8; 14] = [
    0xFF, markers::SOS, 0x00, 0x0C,
    0x03,
    0x01, 0x00,
    0x02, 0x00,
    0x03, 0x00,
    0x00, 0x3F, 0x00,
];

/// Luma sampling byte for 4:2:2 frames.
const SAMPLING_422: u8 = 0x22;
/// Luma sampling byte for every other (4:1:1) frame.
const SAMPLING_411: u8 = 0x21;

/// Scale a base visibility table by a quality factor.
///
/// Each entry becomes `clamp(1, 255, (base * q + 25) / 50)`, matching the
/// camera encoder's quality curve. The result stays in natural order.
pub fn scale_quant_table(base: &[u8; 64], q_factor: u32) -> Result<[u8; 64]> {
    if !(1..=255).contains(&q_factor) {
        return Err(StreamError::QFactorOutOfRange(q_factor));
    }
    let mut scaled = [0u8; 64];
    for (out, &b) in scaled.iter_mut().zip(base.iter()) {
        *out = ((b as u32 * q_factor + 25) / 50).clamp(1, 255) as u8;
    }
    Ok(scaled)
}

/// Rebuild a complete JFIF from a minimized payload.
///
/// `payload` is everything that followed the struct on the wire: the first
/// `image.start_offset` bytes are carried-over comment data, the rest is scan data.
pub fn reconstruct(image: &ImageDataStruct, payload: &[u8]) -> Result<Vec<u8>> {
    let luminance = scale_quant_table(&LUMINANCE_BASE, image.q_factor)?;
    let chrominance = scale_quant_table(&CHROMINANCE_BASE, image.q_factor)?;

    let start = image.start_offset as usize;
    if start > payload.len() {
        return Err(StreamError::ShortPayload {
            context: "minimized JPEG comment region",
            expected: start,
            got: payload.len(),
        });
    }
    let (carried, scan) = payload.split_at(start);

    let comment = build_comment(image, carried);
    if comment.len() > MAX_COMMENT_LEN {
        return Err(StreamError::CommentTooLong(comment.len()));
    }

    let mut out = Vec::with_capacity(scan.len() + comment.len() + 640);
    out.extend_from_slice(&JFIF_HEADER);

    out.extend_from_slice(&[0xFF, markers::COM]);
    out.extend_from_slice(&((comment.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(&comment);

    write_dqt(&mut out, 0, &luminance);
    write_dqt(&mut out, 1, &chrominance);
    write_sof0(&mut out, image.resolution(), image.video_format);
    write_dht(&mut out);
    out.extend_from_slice(&SOS_SEGMENT);

    out.extend_from_slice(scan);
    out.extend_from_slice(&[0xFF, markers::EOI]);
    Ok(out)
}

fn write_dqt(out: &mut Vec<u8>, table_id: u8, table: &[u8; 64]) {
    out.extend_from_slice(&[0xFF, markers::DQT, 0x00, 0x43, table_id]);
    out.extend(ZIGZAG.iter().map(|&i| table[i]));
}

fn write_sof0(out: &mut Vec<u8>, resolution: Resolution, format: VideoFormat) {
    let sampling = match format {
        VideoFormat::Jpeg422 => SAMPLING_422,
        _ => SAMPLING_411,
    };
    out.extend_from_slice(&[0xFF, markers::SOF0, 0x00, 0x11, 0x08]);
    out.extend_from_slice(&resolution.height.to_be_bytes());
    out.extend_from_slice(&resolution.width.to_be_bytes());
    out.extend_from_slice(&[
        0x03,
        0x01, sampling, 0x00,
        0x02, 0x11, 0x01,
        0x03, 0x11, 0x01,
    ]);
}

fn write_dht(out: &mut Vec<u8>) {
    out.extend_from_slice(&[0xFF, markers::DHT]);
    out.extend_from_slice(&(DHT_LEN as u16).to_be_bytes());
    out.push(0x00);
    out.extend_from_slice(&DC_LUMINANCE_BITS);
    out.extend_from_slice(&DC_LUMINANCE_VALUES);
    out.push(0x10);
    out.extend_from_slice(&AC_LUMINANCE_BITS);
    out.extend_from_slice(&AC_LUMINANCE_VALUES);
}

/// A JFIF reduced back to its struct and minimized payload.
#[derive(Debug, Clone)]
pub struct Minimized {
    pub image: ImageDataStruct,
    /// Carried-over comment bytes (`image.start_offset` of them) followed by scan data.
    pub payload: Vec<u8>,
    /// The parsed comment block, if the JFIF had one.
    pub comment: Option<CommentBlock>,
}

/// Find the first COM segment of a JFIF and return its body.
pub fn find_comment(jfif: &[u8]) -> Result<Option<&[u8]>> {
    let mut found = None;
    walk_segments(jfif, |marker, body| {
        if marker == markers::COM && found.is_none() {
            found = Some(body);
        }
        Ok(())
    })?;
    Ok(found)
}

/// Split a JFIF into an [`ImageDataStruct`] and minimized payload.
///
/// Resolution and chroma format come from SOF0, `q_factor` from matching the
/// luminance DQT against every scaled base table, and the remaining fields from
/// the comment block. Fields a JFIF cannot express are zero.
pub fn minimize(jfif: &[u8]) -> Result<Minimized> {
    let mut comment: Option<CommentBlock> = None;
    let mut luminance: Option<[u8; 64]> = None;
    let mut frame: Option<(Resolution, VideoFormat)> = None;

    let scan_start = walk_segments(jfif, |marker, body| {
        match marker {
            markers::COM if comment.is_none() => comment = Some(CommentBlock::parse(body)),
            markers::DQT => {
                for (id, table) in parse_dqt(body)? {
                    if id == 0 {
                        luminance = Some(table);
                    }
                }
            }
            markers::SOF0 => frame = Some(parse_sof0(body)?),
            _ => {}
        }
        Ok(())
    })?;

    let scan_start = scan_start.ok_or(StreamError::MalformedJfif {
        offset: jfif.len(),
        reason: "no start-of-scan segment",
    })?;
    if !jfif.ends_with(&[0xFF, markers::EOI]) || jfif.len() < scan_start + 2 {
        return Err(StreamError::MalformedJfif {
            offset: jfif.len(),
            reason: "missing end-of-image marker",
        });
    }
    let scan = &jfif[scan_start..jfif.len() - 2];

    let luminance = luminance.ok_or(StreamError::MalformedJfif {
        offset: scan_start,
        reason: "no luminance quantization table",
    })?;
    let q_factor = (1..=255u32)
        .find(|&q| scale_quant_table(&LUMINANCE_BASE, q).is_ok_and(|t| t == luminance))
        .ok_or(StreamError::UnrecognisedQuantTable)?;

    let (resolution, video_format) = frame.ok_or(StreamError::MalformedJfif {
        offset: scan_start,
        reason: "no baseline start-of-frame segment",
    })?;

    let block = comment.clone().unwrap_or_default();
    let carried = block.trailing.clone();

    let image = ImageDataStruct::builder()
        .version(StructVersion::PictureBigEndian)?
        .mode(0)?
        .camera(block.camera)?
        .video_format(video_format)?
        .start_offset(carried.len() as u32)?
        .size(scan.len() as u32)?
        .max_size(0)?
        .target_size(0)?
        .q_factor(q_factor)?
        .alarm_bitmask_high(0)?
        .status(0)?
        .session_time(block.session_time())?
        .milliseconds(block.milliseconds)?
        .res([0; 4])?
        .title(truncate(&block.title, TITLE_LEN))?
        .alarm(truncate(block.alarm_text.as_deref().unwrap_or(""), TITLE_LEN))?
        .picture(PictureStruct::with_resolution(resolution))?
        .locale(truncate(&block.locale, LOCALE_LEN))?
        .utc_offset(block.utc_offset)?
        .alarm_bitmask(0)?
        .build()?;

    let mut payload = carried;
    payload.extend_from_slice(scan);

    Ok(Minimized {
        image,
        payload,
        comment,
    })
}

/// Visit each marker segment before the scan. Returns the offset of the scan
/// data, or `None` if the image ends without a start-of-scan segment.
fn walk_segments<'a, F>(jfif: &'a [u8], mut visit: F) -> Result<Option<usize>>
where
    F: FnMut(u8, &'a [u8]) -> Result<()>,
{
    if !jfif.starts_with(&[0xFF, markers::SOI]) {
        return Err(StreamError::MalformedJfif {
            offset: 0,
            reason: "missing start-of-image marker",
        });
    }

    let mut pos = 2;
    loop {
        if pos + 1 >= jfif.len() {
            return Ok(None);
        }
        if jfif[pos] != 0xFF {
            return Err(StreamError::MalformedJfif {
                offset: pos,
                reason: "expected marker",
            });
        }
        let marker = jfif[pos + 1];
        if marker == 0xFF {
            // Fill byte
            pos += 1;
            continue;
        }
        if marker == markers::EOI {
            return Ok(None);
        }
        if pos + 4 > jfif.len() {
            return Err(StreamError::MalformedJfif {
                offset: pos,
                reason: "truncated segment length",
            });
        }
        let len = u16::from_be_bytes([jfif[pos + 2], jfif[pos + 3]]) as usize;
        let end = pos + 2 + len;
        if len < 2 || end > jfif.len() {
            return Err(StreamError::MalformedJfif {
                offset: pos,
                reason: "segment overruns image",
            });
        }
        visit(marker, &jfif[pos + 4..end])?;
        if marker == markers::SOS {
            return Ok(Some(end));
        }
        pos = end;
    }
}

/// Tables in a DQT body, converted to natural order.
fn parse_dqt(body: &[u8]) -> Result<Vec<(u8, [u8; 64])>> {
    let mut tables = Vec::new();
    let mut rest = body;
    while let Some((&pq_tq, tail)) = rest.split_first() {
        if pq_tq >> 4 != 0 || tail.len() < 64 {
            return Err(StreamError::MalformedJfif {
                offset: 0,
                reason: "unsupported quantization table",
            });
        }
        let mut table = [0u8; 64];
        for (k, &v) in tail[..64].iter().enumerate() {
            table[ZIGZAG[k]] = v;
        }
        tables.push((pq_tq & 0x0F, table));
        rest = &tail[64..];
    }
    Ok(tables)
}

fn parse_sof0(body: &[u8]) -> Result<(Resolution, VideoFormat)> {
    // precision(1) height(2) width(2) count(1) then 3 bytes per component
    if body.len() < 9 {
        return Err(StreamError::MalformedJfif {
            offset: 0,
            reason: "short start-of-frame segment",
        });
    }
    let resolution = Resolution {
        height: u16::from_be_bytes([body[1], body[2]]),
        width: u16::from_be_bytes([body[3], body[4]]),
    };
    let format = if body[7] == SAMPLING_422 {
        VideoFormat::Jpeg422
    } else {
        VideoFormat::Jpeg411
    };
    Ok((resolution, format))
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
