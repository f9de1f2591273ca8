use crate::frame_type::FrameKind;
use crate::image_struct::ImageDataStruct;

/// Per-packet header information taken from the stream framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub struct StreamMetadata {
    pub frame_type: FrameKind,
    /// 1-based channel (wire value + 1).
    pub channel: u16,
    /// Payload length in bytes, excluding the packet header.
    pub length: u32,
}

/// A framed but not yet decoded packet.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub metadata: StreamMetadata,
    /// Byte offset of the packet header within the stream.
    pub offset: u64,
    pub payload: Vec<u8>,
}

/// A complete JFIF image, either received as-is or reconstructed from a minimized frame.
#[derive(Debug, Clone)]
pub struct JfifPacket {
    pub metadata: StreamMetadata,
    pub data: Vec<u8>,
    /// The struct a minimized frame was reconstructed from. `None` for plain JFIF.
    pub image: Option<ImageDataStruct>,
}

#[derive(Debug, Clone)]
pub struct Mpeg4Packet {
    pub metadata: StreamMetadata,
    /// Elementary stream bytes.
    pub data: Vec<u8>,
    pub image: Option<ImageDataStruct>,
    /// Comment block that preceded the stream, undecoded.
    pub comment: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct InfoPacket {
    pub metadata: StreamMetadata,
    pub text: String,
}

/// Audio or unknown payload, passed through untouched.
#[derive(Debug, Clone)]
pub struct RawPacket {
    pub metadata: StreamMetadata,
    pub data: Vec<u8>,
}

/// A decoded packet, ready for delivery to a handler.
#[derive(Debug, Clone)]
pub enum Packet {
    Jfif(JfifPacket),
    Mpeg4(Mpeg4Packet),
    Info(InfoPacket),
    Audio(RawPacket),
    Unknown(RawPacket),
}

impl Packet {
    pub fn metadata(&self) -> &StreamMetadata {
        match self {
            Packet::Jfif(p) => &p.metadata,
            Packet::Mpeg4(p) => &p.metadata,
            Packet::Info(p) => &p.metadata,
            Packet::Audio(p) | Packet::Unknown(p) => &p.metadata,
        }
    }

    /// The payload bytes the packet delivers.
    pub fn data(&self) -> &[u8] {
        match self {
            Packet::Jfif(p) => &p.data,
            Packet::Mpeg4(p) => &p.data,
            Packet::Info(p) => p.text.as_bytes(),
            Packet::Audio(p) | Packet::Unknown(p) => &p.data,
        }
    }

    pub fn image(&self) -> Option<&ImageDataStruct> {
        match self {
            Packet::Jfif(p) => p.image.as_ref(),
            Packet::Mpeg4(p) => p.image.as_ref(),
            _ => None,
        }
    }
}
