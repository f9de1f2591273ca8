use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("truncated stream at offset 0x{offset:X} ({context}): expected {expected} bytes, got {got}")]
    Truncated {
        offset: u64,
        context: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("image struct version mismatch: expected 0xDECADE10 or 0xDECADE11, got 0x{got:08X}")]
    VersionMismatch { got: u32 },

    #[error("{context} too short: expected at least {expected} bytes, got {got}")]
    ShortPayload {
        context: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("MIME framing error on line {line}: expected {expected}, got {got:?}")]
    MimeExpectation {
        line: u64,
        expected: &'static str,
        got: String,
    },

    #[error("MIME framing error on line {line}: invalid Content-length {value:?}")]
    InvalidContentLength { line: u64, value: String },

    #[error("quantization factor {0} out of range (1-255)")]
    QFactorOutOfRange(u32),

    #[error("VOP start code not found; cannot classify MPEG-4 frame")]
    VopStartCodeNotFound,

    #[error("image struct field '{0}' set more than once")]
    FieldAlreadySet(&'static str),

    #[error("image struct field '{0}' was never set")]
    MissingField(&'static str),

    #[error("image struct field '{field}' is {got} bytes, maximum is {max}")]
    FieldTooLong {
        field: &'static str,
        max: usize,
        got: usize,
    },

    #[error("JFIF comment block is {0} bytes, maximum is 65533")]
    CommentTooLong(usize),

    #[error("malformed JFIF at offset 0x{offset:X}: {reason}")]
    MalformedJfif { offset: usize, reason: &'static str },

    #[error("luminance quantization table does not match any quality factor")]
    UnrecognisedQuantTable,

    #[error("packet handler failed: {0}")]
    Handler(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StreamError {
    /// Wrap a failure raised inside a packet handler.
    pub fn handler<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        StreamError::Handler(err.into())
    }
}

pub type Result<T> = std::result::Result<T, StreamError>;
