use crate::error::{Result, StreamError};
use crate::image_struct::{
    IMAGE_STRUCT_SIZE, ImageDataStruct, PictureStruct, Resolution, StructVersion, VideoFormat,
};

/// MPEG-4 Video Object Plane start code.
pub const VOP_START_CODE: [u8; 4] = [0x00, 0x00, 0x01, 0xB6];

/// Coding type of an MPEG-4 frame, from the VOP header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VopType {
    /// Intra-coded (keyframe).
    I,
    /// Any predicted type (P, B or S).
    P,
}

impl VopType {
    pub fn video_format(self) -> VideoFormat {
        match self {
            VopType::I => VideoFormat::Mpeg4IFrame,
            VopType::P => VideoFormat::Mpeg4PFrame,
        }
    }
}

/// An MPEG-4 payload split into its parts.
#[derive(Debug, Clone)]
pub struct Mpeg4Parts {
    pub image: ImageDataStruct,
    /// Comment block bytes, forwarded undecoded.
    pub comment: Vec<u8>,
    /// Elementary stream bytes.
    pub data: Vec<u8>,
}

/// Split an `Mpeg4` payload: struct, then `start_offset` comment bytes, then the stream.
pub fn split(payload: &[u8]) -> Result<Mpeg4Parts> {
    let image = ImageDataStruct::parse(payload)?;
    let rest = &payload[IMAGE_STRUCT_SIZE..];
    let comment_len = image.start_offset as usize;
    if comment_len > rest.len() {
        return Err(StreamError::ShortPayload {
            context: "MPEG-4 comment block",
            expected: IMAGE_STRUCT_SIZE + comment_len,
            got: payload.len(),
        });
    }
    let (comment, data) = rest.split_at(comment_len);
    Ok(Mpeg4Parts {
        image,
        comment: comment.to_vec(),
        data: data.to_vec(),
    })
}

/// Offset of the first VOP start code in `data`.
pub fn find_vop_start(data: &[u8]) -> Option<usize> {
    data.windows(VOP_START_CODE.len())
        .position(|w| w == VOP_START_CODE)
}

/// Classify a frame as I or P from the `vop_coding_type` bits that open the VOP header.
pub fn classify(data: &[u8]) -> Result<VopType> {
    let start = find_vop_start(data).ok_or(StreamError::VopStartCodeNotFound)?;
    let header = *data
        .get(start + VOP_START_CODE.len())
        .ok_or(StreamError::VopStartCodeNotFound)?;
    match header >> 6 {
        0 => Ok(VopType::I),
        _ => Ok(VopType::P),
    }
}

/// Build the struct for a minimal-stream frame that arrived without one.
pub fn minimal_struct(camera: u32, resolution: Resolution, data: &[u8]) -> Result<ImageDataStruct> {
    let vop = classify(data)?;
    ImageDataStruct::builder()
        .version(StructVersion::PictureBigEndian)?
        .mode(0)?
        .camera(camera)?
        .video_format(vop.video_format())?
        .start_offset(0)?
        .size(data.len() as u32)?
        .max_size(0)?
        .target_size(0)?
        .q_factor(0)?
        .alarm_bitmask_high(0)?
        .status(0)?
        .session_time(0)?
        .milliseconds(0)?
        .res([0; 4])?
        .title("")?
        .alarm("")?
        .picture(PictureStruct::with_resolution(resolution))?
        .locale("")?
        .utc_offset(0)?
        .alarm_bitmask(0)?
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_struct::tests::sample_struct;

    fn mpeg4_payload(comment: &[u8], data: &[u8]) -> Vec<u8> {
        let mut image = sample_struct(StructVersion::PictureBigEndian);
        image.video_format = VideoFormat::Mpeg4IFrame;
        image.start_offset = comment.len() as u32;
        let mut payload = image.to_bytes();
        payload.extend_from_slice(comment);
        payload.extend_from_slice(data);
        payload
    }

    #[test]
    fn test_split_mpeg4() {
        let payload = mpeg4_payload(b"Number: 3\0\n", &[0x00, 0x00, 0x01, 0xB6, 0x10, 0x20]);
        let parts = split(&payload).unwrap();
        assert_eq!(parts.image.camera, 3);
        assert_eq!(parts.comment, b"Number: 3\0\n");
        assert_eq!(parts.data, vec![0x00, 0x00, 0x01, 0xB6, 0x10, 0x20]);
    }

    #[test]
    fn test_split_rejects_overlong_comment() {
        let mut payload = mpeg4_payload(b"abc", b"");
        payload.truncate(IMAGE_STRUCT_SIZE + 1);
        assert!(matches!(
            split(&payload),
            Err(StreamError::ShortPayload { context: "MPEG-4 comment block", .. })
        ));
    }

    #[test]
    fn test_classify_i_frame() {
        // VOL header bytes, then VOP with vop_coding_type = 00
        let data = [0x00, 0x00, 0x01, 0x20, 0x08, 0x00, 0x00, 0x01, 0xB6, 0x10, 0xFF];
        assert_eq!(classify(&data).unwrap(), VopType::I);
    }

    #[test]
    fn test_classify_p_frame() {
        // vop_coding_type = 01
        let data = [0x00, 0x00, 0x01, 0xB6, 0x51, 0x00];
        assert_eq!(classify(&data).unwrap(), VopType::P);
        // vop_coding_type = 10 (B) still reported as predicted
        let data = [0x00, 0x00, 0x01, 0xB6, 0x80];
        assert_eq!(classify(&data).unwrap(), VopType::P);
    }

    #[test]
    fn test_classify_without_start_code_fails() {
        let data = [0x00, 0x00, 0x01, 0xB3, 0x00, 0x00, 0x00];
        assert!(matches!(classify(&data), Err(StreamError::VopStartCodeNotFound)));
        assert!(matches!(classify(&[]), Err(StreamError::VopStartCodeNotFound)));
        // Start code with no header byte after it
        assert!(matches!(
            classify(&VOP_START_CODE),
            Err(StreamError::VopStartCodeNotFound)
        ));
    }

    #[test]
    fn test_minimal_struct() {
        let res = Resolution { width: 720, height: 576 };
        let data = [0x00, 0x00, 0x01, 0xB6, 0x00];
        let image = minimal_struct(4, res, &data).unwrap();
        assert_eq!(image.camera, 4);
        assert_eq!(image.video_format, VideoFormat::Mpeg4IFrame);
        assert_eq!(image.resolution(), res);
        assert_eq!(image.size, 5);
        assert_eq!(ImageDataStruct::parse(&image.to_bytes()).unwrap(), image);
    }
}
