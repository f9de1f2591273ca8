use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

use crate::image_struct::{ImageDataStruct, decode_latin1, encode_latin1};

/// Value written on the `Version:` line of generated comment blocks.
pub const COMMENT_VERSION: &str = "00.02";

/// Every line of a comment block ends with a NUL followed by a newline.
const LINE_END: &[u8] = b"\0\n";

const DATE_FORMAT: &str = "%d/%m/%Y";
const TIME_FORMAT: &str = "%H:%M:%S";

const KEY_VERSION: &str = "Version";
const KEY_NUMBER: &str = "Number";
const KEY_NAME: &str = "Name";
const KEY_DATE: &str = "Date";
const KEY_TIME: &str = "Time";
const KEY_MSEC: &str = "MSec";
const KEY_LOCALE: &str = "Locale";
const KEY_UTC_OFFSET: &str = "UTCoffset";
const KEY_ALARM_TEXT: &str = "Alarm-text";

/// Fields recovered from a textual comment block.
///
/// Keys absent from the block keep their defaults: camera 0, empty title and
/// locale, date 01/01/1970, time 00:00:00, zero milliseconds and UTC offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentBlock {
    pub version: Option<String>,
    pub camera: u32,
    pub title: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub milliseconds: u32,
    pub locale: String,
    pub utc_offset: i32,
    pub alarm_text: Option<String>,
    /// Bytes after the last recognised line, kept verbatim.
    pub trailing: Vec<u8>,
}

impl Default for CommentBlock {
    fn default() -> Self {
        CommentBlock {
            version: None,
            camera: 0,
            title: String::new(),
            date: NaiveDate::default(),
            time: NaiveTime::default(),
            milliseconds: 0,
            locale: String::new(),
            utc_offset: 0,
            alarm_text: None,
            trailing: Vec::new(),
        }
    }
}

impl CommentBlock {
    /// Parse `Key: value` lines. Unparseable values fall back to the field default.
    ///
    /// Recognition stops once the generated sequence ends (`UTCoffset`, then an
    /// optional `Alarm-text`); everything after it is kept in `trailing`.
    pub fn parse(bytes: &[u8]) -> Self {
        let mut block = CommentBlock::default();
        let mut recognised_end = 0;
        let mut after_offset = false;
        let mut pos = 0;

        while pos < bytes.len() {
            let line_end = bytes[pos..]
                .iter()
                .position(|&b| b == b'\n')
                .map(|i| pos + i + 1)
                .unwrap_or(bytes.len());
            let line = decode_latin1(&bytes[pos..line_end]);
            let line = line.trim_end_matches(['\n', '\r', '\0']);

            if let Some((key, value)) = line.split_once(':') {
                if after_offset && key != KEY_ALARM_TEXT {
                    break;
                }
                let value = value.strip_prefix(' ').unwrap_or(value);
                if block.apply(key, value) {
                    recognised_end = line_end;
                    match key {
                        KEY_UTC_OFFSET => after_offset = true,
                        KEY_ALARM_TEXT => break,
                        _ => {}
                    }
                }
            } else if after_offset {
                break;
            }
            pos = line_end;
        }

        block.trailing = bytes[recognised_end..].to_vec();
        block
    }

    /// Store one key/value pair; returns false for keys this block does not know.
    fn apply(&mut self, key: &str, value: &str) -> bool {
        match key {
            KEY_VERSION => self.version = Some(value.to_string()),
            KEY_NUMBER => self.camera = parse_or_default(key, value),
            KEY_NAME => self.title = value.to_string(),
            KEY_DATE => {
                self.date = NaiveDate::parse_from_str(value, DATE_FORMAT).unwrap_or_else(|_| {
                    log::debug!("Unparseable comment date {:?}", value);
                    NaiveDate::default()
                })
            }
            KEY_TIME => {
                self.time = NaiveTime::parse_from_str(value, TIME_FORMAT).unwrap_or_else(|_| {
                    log::debug!("Unparseable comment time {:?}", value);
                    NaiveTime::default()
                })
            }
            KEY_MSEC => self.milliseconds = parse_or_default(key, value),
            KEY_LOCALE => self.locale = value.to_string(),
            KEY_UTC_OFFSET => self.utc_offset = parse_or_default(key, value),
            KEY_ALARM_TEXT => self.alarm_text = Some(value.to_string()),
            _ => return false,
        }
        true
    }

    /// Date and time combined as Unix seconds (0 when outside the `u32` range).
    pub fn session_time(&self) -> u32 {
        let ts = NaiveDateTime::new(self.date, self.time).and_utc().timestamp();
        u32::try_from(ts).unwrap_or(0)
    }
}

fn parse_or_default<T: std::str::FromStr + Default>(key: &str, value: &str) -> T {
    value.trim().parse().unwrap_or_else(|_| {
        log::debug!("Unparseable comment value for {}: {:?}", key, value);
        T::default()
    })
}

/// Render the comment block for `image`, followed by `carried` verbatim.
pub fn build_comment(image: &ImageDataStruct, carried: &[u8]) -> Vec<u8> {
    let when = DateTime::from_timestamp(image.session_time as i64, 0).unwrap_or_default();

    let mut out = Vec::with_capacity(160 + carried.len());
    let mut line = |key: &str, value: &str| {
        out.extend_from_slice(key.as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(&encode_latin1(value));
        out.extend_from_slice(LINE_END);
    };

    line(KEY_VERSION, COMMENT_VERSION);
    line(KEY_NUMBER, &image.camera.to_string());
    line(KEY_NAME, &image.title);
    line(KEY_DATE, &when.format(DATE_FORMAT).to_string());
    line(KEY_TIME, &when.format(TIME_FORMAT).to_string());
    line(KEY_MSEC, &(image.milliseconds % 1000).to_string());
    line(KEY_LOCALE, &image.locale);
    line(KEY_UTC_OFFSET, &image.utc_offset.to_string());
    if !image.alarm.is_empty() {
        line(KEY_ALARM_TEXT, &image.alarm);
    }

    out.extend_from_slice(carried);
    out
}
