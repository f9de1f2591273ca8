/// Frame-type code constants as they appear in the first byte of a binary stream packet.
pub const CODE_MINIMIZED_JPEG: u8 = 0;
pub const CODE_JFIF: u8 = 1;
pub const CODE_MPEG4: u8 = 2;
pub const CODE_MPEG4_ALT: u8 = 3;
pub const CODE_AUDIO: u8 = 4;
pub const CODE_MPEG4_MINIMAL: u8 = 6;
pub const CODE_INFO: u8 = 9;

/// All frame-type codes with an explicit mapping.
pub const ALL_FRAME_CODES: &[u8] = &[
    CODE_MINIMIZED_JPEG, CODE_JFIF, CODE_MPEG4, CODE_MPEG4_ALT, CODE_AUDIO,
    CODE_MPEG4_MINIMAL, CODE_INFO,
];

/// Kind of payload carried by a single stream packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub enum FrameKind {
    /// Complete, standard JFIF image.
    Jfif,
    /// JPEG scan data behind an embedded image struct; needs JFIF reconstruction.
    MinimizedJpeg,
    /// MPEG-4 frame behind an embedded image struct and comment block.
    Mpeg4,
    /// Bare MPEG-4 elementary stream; resolution comes from elsewhere.
    Mpeg4Minimal,
    /// ASCII text block.
    Info,
    /// ADPCM audio.
    Audio,
    Unknown,
}

impl FrameKind {
    /// Short label used in CLI output and file names.
    pub fn label(self) -> &'static str {
        match self {
            FrameKind::Jfif => "jfif",
            FrameKind::MinimizedJpeg => "minjpeg",
            FrameKind::Mpeg4 => "mpeg4",
            FrameKind::Mpeg4Minimal => "mpeg4min",
            FrameKind::Info => "info",
            FrameKind::Audio => "audio",
            FrameKind::Unknown => "unknown",
        }
    }

    /// True for the kinds that end up delivered as a JFIF image.
    pub fn is_image(self) -> bool {
        matches!(self, FrameKind::Jfif | FrameKind::MinimizedJpeg)
    }

    /// True for the kinds that end up delivered as MPEG-4 video.
    pub fn is_video(self) -> bool {
        matches!(self, FrameKind::Mpeg4 | FrameKind::Mpeg4Minimal)
    }
}

/// Look up the frame kind for a wire code. Codes without a mapping are `Unknown`.
pub fn frame_kind(code: u8) -> FrameKind {
    match code {
        CODE_MINIMIZED_JPEG => FrameKind::MinimizedJpeg,
        CODE_JFIF => FrameKind::Jfif,
        CODE_MPEG4 | CODE_MPEG4_ALT => FrameKind::Mpeg4,
        CODE_AUDIO => FrameKind::Audio,
        CODE_MPEG4_MINIMAL => FrameKind::Mpeg4Minimal,
        CODE_INFO => FrameKind::Info,
        _ => FrameKind::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defined_codes() {
        let expected = [
            (0, FrameKind::MinimizedJpeg),
            (1, FrameKind::Jfif),
            (2, FrameKind::Mpeg4),
            (3, FrameKind::Mpeg4),
            (4, FrameKind::Audio),
            (5, FrameKind::Unknown),
            (6, FrameKind::Mpeg4Minimal),
            (7, FrameKind::Unknown),
            (8, FrameKind::Unknown),
            (9, FrameKind::Info),
        ];
        for (code, kind) in expected {
            assert_eq!(frame_kind(code), kind, "code {}", code);
        }
    }

    #[test]
    fn test_undefined_codes_are_unknown() {
        for code in 0..=u8::MAX {
            if !ALL_FRAME_CODES.contains(&code) {
                assert_eq!(frame_kind(code), FrameKind::Unknown, "code {}", code);
            }
        }
    }

    #[test]
    fn test_kind_classification() {
        assert!(frame_kind(CODE_JFIF).is_image());
        assert!(frame_kind(CODE_MINIMIZED_JPEG).is_image());
        assert!(!frame_kind(CODE_MPEG4).is_image());
        assert!(frame_kind(CODE_MPEG4).is_video());
        assert!(frame_kind(CODE_MPEG4_MINIMAL).is_video());
        assert!(!frame_kind(CODE_INFO).is_video());
    }
}
