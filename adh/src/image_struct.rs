use chrono::{DateTime, Utc};

use crate::error::{Result, StreamError};

/// Version code whose picture fields are stored little-endian.
pub const VERSION_PICTURE_LE: u32 = 0xDECA_DE10;
/// Version code whose picture fields are stored big-endian.
pub const VERSION_PICTURE_BE: u32 = 0xDECA_DE11;

const RES_LEN: usize = 4;
/// Width of the `title` and `alarm` text fields.
pub const TITLE_LEN: usize = 31;
/// Width of the `locale` text field.
pub const LOCALE_LEN: usize = 30;
/// Six 16-bit fields.
pub const PICTURE_STRUCT_SIZE: usize = 12;

const OFF_VERSION: usize = 0;
const OFF_MODE: usize = OFF_VERSION + 4;
const OFF_CAMERA: usize = OFF_MODE + 4;
const OFF_VIDEO_FORMAT: usize = OFF_CAMERA + 4;
const OFF_START_OFFSET: usize = OFF_VIDEO_FORMAT + 4;
const OFF_SIZE: usize = OFF_START_OFFSET + 4;
const OFF_MAX_SIZE: usize = OFF_SIZE + 4;
const OFF_TARGET_SIZE: usize = OFF_MAX_SIZE + 4;
const OFF_Q_FACTOR: usize = OFF_TARGET_SIZE + 4;
const OFF_ALARM_BITMASK_HIGH: usize = OFF_Q_FACTOR + 4;
const OFF_STATUS: usize = OFF_ALARM_BITMASK_HIGH + 4;
const OFF_SESSION_TIME: usize = OFF_STATUS + 4;
const OFF_MILLISECONDS: usize = OFF_SESSION_TIME + 4;
const OFF_RES: usize = OFF_MILLISECONDS + 4;
const OFF_TITLE: usize = OFF_RES + RES_LEN;
const OFF_ALARM: usize = OFF_TITLE + TITLE_LEN;
const OFF_PICTURE: usize = OFF_ALARM + TITLE_LEN;
const OFF_LOCALE: usize = OFF_PICTURE + PICTURE_STRUCT_SIZE;
const OFF_UTC_OFFSET: usize = OFF_LOCALE + LOCALE_LEN;
const OFF_ALARM_BITMASK: usize = OFF_UTC_OFFSET + 4;

/// Total size of an encoded image struct in bytes.
pub const IMAGE_STRUCT_SIZE: usize = OFF_ALARM_BITMASK + 4;

/// Which of the two accepted layouts a struct uses.
///
/// The layouts are identical apart from the byte order of the six
/// [`PictureStruct`] fields. Every other integer is big-endian in both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub enum StructVersion {
    /// `0xDECADE10`: picture fields little-endian.
    PictureLittleEndian,
    /// `0xDECADE11`: picture fields big-endian.
    PictureBigEndian,
}

impl StructVersion {
    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            VERSION_PICTURE_LE => Ok(StructVersion::PictureLittleEndian),
            VERSION_PICTURE_BE => Ok(StructVersion::PictureBigEndian),
            got => Err(StreamError::VersionMismatch { got }),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            StructVersion::PictureLittleEndian => VERSION_PICTURE_LE,
            StructVersion::PictureBigEndian => VERSION_PICTURE_BE,
        }
    }

    fn read_u16(self, bytes: [u8; 2]) -> u16 {
        match self {
            StructVersion::PictureLittleEndian => u16::from_le_bytes(bytes),
            StructVersion::PictureBigEndian => u16::from_be_bytes(bytes),
        }
    }

    fn write_u16(self, value: u16) -> [u8; 2] {
        match self {
            StructVersion::PictureLittleEndian => value.to_le_bytes(),
            StructVersion::PictureBigEndian => value.to_be_bytes(),
        }
    }
}

/// Compression format recorded in the struct's `video_format` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub enum VideoFormat {
    /// JPEG, 4:2:2 chroma.
    Jpeg422,
    /// JPEG, 4:1:1 chroma.
    Jpeg411,
    /// MPEG-4 predicted frame.
    Mpeg4PFrame,
    /// MPEG-4 intra frame.
    Mpeg4IFrame,
    /// A code this library does not interpret; kept so the struct re-encodes unchanged.
    Other(u32),
}

impl VideoFormat {
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => VideoFormat::Jpeg422,
            1 => VideoFormat::Jpeg411,
            2 => VideoFormat::Mpeg4PFrame,
            3 => VideoFormat::Mpeg4IFrame,
            other => VideoFormat::Other(other),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            VideoFormat::Jpeg422 => 0,
            VideoFormat::Jpeg411 => 1,
            VideoFormat::Mpeg4PFrame => 2,
            VideoFormat::Mpeg4IFrame => 3,
            VideoFormat::Other(other) => other,
        }
    }
}

/// Source and target geometry of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub struct PictureStruct {
    pub src_pixels: u16,
    pub src_lines: u16,
    pub target_pixels: u16,
    pub target_lines: u16,
    pub pixel_offset: u16,
    pub line_offset: u16,
}

impl PictureStruct {
    /// Picture with identical source and target size and no offsets.
    pub fn with_resolution(resolution: Resolution) -> Self {
        PictureStruct {
            src_pixels: resolution.width,
            src_lines: resolution.height,
            target_pixels: resolution.width,
            target_lines: resolution.height,
            pixel_offset: 0,
            line_offset: 0,
        }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution {
            width: self.target_pixels,
            height: self.target_lines,
        }
    }

    fn parse(buf: &[u8], version: StructVersion) -> Self {
        let field = |i: usize| version.read_u16([buf[i * 2], buf[i * 2 + 1]]);
        PictureStruct {
            src_pixels: field(0),
            src_lines: field(1),
            target_pixels: field(2),
            target_lines: field(3),
            pixel_offset: field(4),
            line_offset: field(5),
        }
    }

    fn write(&self, buf: &mut [u8], version: StructVersion) {
        let fields = [
            self.src_pixels,
            self.src_lines,
            self.target_pixels,
            self.target_lines,
            self.pixel_offset,
            self.line_offset,
        ];
        for (i, value) in fields.into_iter().enumerate() {
            buf[i * 2..i * 2 + 2].copy_from_slice(&version.write_u16(value));
        }
    }
}

/// Frame width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub struct Resolution {
    pub width: u16,
    pub height: u16,
}

/// The fixed-layout frame header embedded ahead of minimized JPEG and MPEG-4 payloads.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub struct ImageDataStruct {
    pub version: StructVersion,
    pub mode: u32,
    pub camera: u32,
    pub video_format: VideoFormat,
    /// Length of the comment block that follows the struct.
    pub start_offset: u32,
    pub size: u32,
    pub max_size: u32,
    pub target_size: u32,
    pub q_factor: u32,
    pub alarm_bitmask_high: u32,
    pub status: u32,
    /// Unix seconds.
    pub session_time: u32,
    pub milliseconds: u32,
    pub res: [u8; 4],
    pub title: String,
    pub alarm: String,
    pub picture: PictureStruct,
    pub locale: String,
    pub utc_offset: i32,
    pub alarm_bitmask: u32,
}

impl ImageDataStruct {
    pub fn builder() -> ImageDataStructBuilder {
        ImageDataStructBuilder::default()
    }

    /// Parse a struct from the start of `buf`. Bytes past [`IMAGE_STRUCT_SIZE`] are ignored.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < IMAGE_STRUCT_SIZE {
            return Err(StreamError::ShortPayload {
                context: "image struct",
                expected: IMAGE_STRUCT_SIZE,
                got: buf.len(),
            });
        }
        let version = StructVersion::from_code(be_u32(buf, OFF_VERSION))?;

        Ok(ImageDataStruct {
            version,
            mode: be_u32(buf, OFF_MODE),
            camera: be_u32(buf, OFF_CAMERA),
            video_format: VideoFormat::from_code(be_u32(buf, OFF_VIDEO_FORMAT)),
            start_offset: be_u32(buf, OFF_START_OFFSET),
            size: be_u32(buf, OFF_SIZE),
            max_size: be_u32(buf, OFF_MAX_SIZE),
            target_size: be_u32(buf, OFF_TARGET_SIZE),
            q_factor: be_u32(buf, OFF_Q_FACTOR),
            alarm_bitmask_high: be_u32(buf, OFF_ALARM_BITMASK_HIGH),
            status: be_u32(buf, OFF_STATUS),
            session_time: be_u32(buf, OFF_SESSION_TIME),
            milliseconds: be_u32(buf, OFF_MILLISECONDS),
            res: [buf[OFF_RES], buf[OFF_RES + 1], buf[OFF_RES + 2], buf[OFF_RES + 3]],
            title: read_str(&buf[OFF_TITLE..OFF_TITLE + TITLE_LEN]),
            alarm: read_str(&buf[OFF_ALARM..OFF_ALARM + TITLE_LEN]),
            picture: PictureStruct::parse(&buf[OFF_PICTURE..OFF_PICTURE + PICTURE_STRUCT_SIZE], version),
            locale: read_str(&buf[OFF_LOCALE..OFF_LOCALE + LOCALE_LEN]),
            utc_offset: be_u32(buf, OFF_UTC_OFFSET) as i32,
            alarm_bitmask: be_u32(buf, OFF_ALARM_BITMASK),
        })
    }

    /// Encode to exactly [`IMAGE_STRUCT_SIZE`] bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; IMAGE_STRUCT_SIZE];
        put_u32(&mut buf, OFF_VERSION, self.version.code());
        put_u32(&mut buf, OFF_MODE, self.mode);
        put_u32(&mut buf, OFF_CAMERA, self.camera);
        put_u32(&mut buf, OFF_VIDEO_FORMAT, self.video_format.code());
        put_u32(&mut buf, OFF_START_OFFSET, self.start_offset);
        put_u32(&mut buf, OFF_SIZE, self.size);
        put_u32(&mut buf, OFF_MAX_SIZE, self.max_size);
        put_u32(&mut buf, OFF_TARGET_SIZE, self.target_size);
        put_u32(&mut buf, OFF_Q_FACTOR, self.q_factor);
        put_u32(&mut buf, OFF_ALARM_BITMASK_HIGH, self.alarm_bitmask_high);
        put_u32(&mut buf, OFF_STATUS, self.status);
        put_u32(&mut buf, OFF_SESSION_TIME, self.session_time);
        put_u32(&mut buf, OFF_MILLISECONDS, self.milliseconds);
        buf[OFF_RES..OFF_RES + RES_LEN].copy_from_slice(&self.res);
        put_str(&mut buf[OFF_TITLE..OFF_TITLE + TITLE_LEN], &self.title);
        put_str(&mut buf[OFF_ALARM..OFF_ALARM + TITLE_LEN], &self.alarm);
        self.picture
            .write(&mut buf[OFF_PICTURE..OFF_PICTURE + PICTURE_STRUCT_SIZE], self.version);
        put_str(&mut buf[OFF_LOCALE..OFF_LOCALE + LOCALE_LEN], &self.locale);
        put_u32(&mut buf, OFF_UTC_OFFSET, self.utc_offset as u32);
        put_u32(&mut buf, OFF_ALARM_BITMASK, self.alarm_bitmask);
        buf
    }

    /// Target resolution from the embedded picture struct.
    pub fn resolution(&self) -> Resolution {
        self.picture.resolution()
    }

    /// Session time as a UTC timestamp.
    pub fn session_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.session_time as i64, 0)
    }
}

/// Builds an [`ImageDataStruct`], requiring every field to be set exactly once.
///
/// Setters fail with [`StreamError::FieldAlreadySet`] on a second call for the
/// same field; [`build`](Self::build) consumes the builder.
#[derive(Debug, Default)]
pub struct ImageDataStructBuilder {
    version: Option<StructVersion>,
    mode: Option<u32>,
    camera: Option<u32>,
    video_format: Option<VideoFormat>,
    start_offset: Option<u32>,
    size: Option<u32>,
    max_size: Option<u32>,
    target_size: Option<u32>,
    q_factor: Option<u32>,
    alarm_bitmask_high: Option<u32>,
    status: Option<u32>,
    session_time: Option<u32>,
    milliseconds: Option<u32>,
    res: Option<[u8; 4]>,
    title: Option<String>,
    alarm: Option<String>,
    picture: Option<PictureStruct>,
    locale: Option<String>,
    utc_offset: Option<i32>,
    alarm_bitmask: Option<u32>,
}

macro_rules! setter {
    ($name:ident: String, max $max:expr) => {
        pub fn $name(mut self, value: impl Into<String>) -> Result<Self> {
            let value = value.into();
            let width = value.chars().count();
            if width > $max {
                return Err(StreamError::FieldTooLong {
                    field: stringify!($name),
                    max: $max,
                    got: width,
                });
            }
            set_once(&mut self.$name, value, stringify!($name))?;
            Ok(self)
        }
    };
    ($name:ident: $ty:ty) => {
        pub fn $name(mut self, value: $ty) -> Result<Self> {
            set_once(&mut self.$name, value, stringify!($name))?;
            Ok(self)
        }
    };
}

impl ImageDataStructBuilder {
    setter!(version: StructVersion);
    setter!(mode: u32);
    setter!(camera: u32);
    setter!(video_format: VideoFormat);
    setter!(start_offset: u32);
    setter!(size: u32);
    setter!(max_size: u32);
    setter!(target_size: u32);
    setter!(q_factor: u32);
    setter!(alarm_bitmask_high: u32);
    setter!(status: u32);
    setter!(session_time: u32);
    setter!(milliseconds: u32);
    setter!(res: [u8; 4]);
    setter!(title: String, max TITLE_LEN);
    setter!(alarm: String, max TITLE_LEN);
    setter!(picture: PictureStruct);
    setter!(locale: String, max LOCALE_LEN);
    setter!(utc_offset: i32);
    setter!(alarm_bitmask: u32);

    pub fn build(self) -> Result<ImageDataStruct> {
        Ok(ImageDataStruct {
            version: required(self.version, "version")?,
            mode: required(self.mode, "mode")?,
            camera: required(self.camera, "camera")?,
            video_format: required(self.video_format, "video_format")?,
            start_offset: required(self.start_offset, "start_offset")?,
            size: required(self.size, "size")?,
            max_size: required(self.max_size, "max_size")?,
            target_size: required(self.target_size, "target_size")?,
            q_factor: required(self.q_factor, "q_factor")?,
            alarm_bitmask_high: required(self.alarm_bitmask_high, "alarm_bitmask_high")?,
            status: required(self.status, "status")?,
            session_time: required(self.session_time, "session_time")?,
            milliseconds: required(self.milliseconds, "milliseconds")?,
            res: required(self.res, "res")?,
            title: required(self.title, "title")?,
            alarm: required(self.alarm, "alarm")?,
            picture: required(self.picture, "picture")?,
            locale: required(self.locale, "locale")?,
            utc_offset: required(self.utc_offset, "utc_offset")?,
            alarm_bitmask: required(self.alarm_bitmask, "alarm_bitmask")?,
        })
    }
}

fn set_once<T>(slot: &mut Option<T>, value: T, field: &'static str) -> Result<()> {
    if slot.is_some() {
        return Err(StreamError::FieldAlreadySet(field));
    }
    *slot = Some(value);
    Ok(())
}

fn required<T>(slot: Option<T>, field: &'static str) -> Result<T> {
    slot.ok_or(StreamError::MissingField(field))
}

fn be_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

/// Camera text is single-byte; each byte maps to the char with the same value.
pub(crate) fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Inverse of [`decode_latin1`]. Chars above U+00FF become `?`.
pub(crate) fn encode_latin1(value: &str) -> Vec<u8> {
    value
        .chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

/// Fixed-width text: everything up to the first NUL.
fn read_str(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    decode_latin1(&field[..end])
}

/// Write `value` into a zeroed fixed-width field, truncating to the field width.
fn put_str(field: &mut [u8], value: &str) {
    let bytes = encode_latin1(value);
    let n = bytes.len().min(field.len());
    field[..n].copy_from_slice(&bytes[..n]);
    field[n..].fill(0);
}
