use std::io::{Cursor, Write};
use std::path::PathBuf;

use adh::binary::{BinaryFramer, write_packet};
use adh::frame_type::{
    CODE_AUDIO, CODE_INFO, CODE_JFIF, CODE_MINIMIZED_JPEG, CODE_MPEG4, CODE_MPEG4_MINIMAL,
};
use adh::image_struct::{ImageDataStruct, PictureStruct, StructVersion, VideoFormat};
use adh::jfif;
use adh::mime::{MimeFramer, write_part, write_preamble};
use adh::packet::{JfifPacket, Mpeg4Packet};
use adh::reader::{Transport, open_framer};
use adh::{FrameKind, Packet, PacketHandler, Result, StreamError, process_stream};
use flate2::Compression;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha256};

fn image_struct(camera: u32, format: VideoFormat, start_offset: u32) -> ImageDataStruct {
    ImageDataStruct::builder()
        .version(StructVersion::PictureLittleEndian)
        .and_then(|b| b.mode(0))
        .and_then(|b| b.camera(camera))
        .and_then(|b| b.video_format(format))
        .and_then(|b| b.start_offset(start_offset))
        .and_then(|b| b.size(0))
        .and_then(|b| b.max_size(0))
        .and_then(|b| b.target_size(0))
        .and_then(|b| b.q_factor(75))
        .and_then(|b| b.alarm_bitmask_high(0))
        .and_then(|b| b.status(0))
        .and_then(|b| b.session_time(1_600_000_000))
        .and_then(|b| b.milliseconds(42))
        .and_then(|b| b.res([0; 4]))
        .and_then(|b| b.title(format!("Camera {}", camera)))
        .and_then(|b| b.alarm(""))
        .and_then(|b| {
            b.picture(PictureStruct {
                src_pixels: 720,
                src_lines: 576,
                target_pixels: 720,
                target_lines: 288,
                pixel_offset: 0,
                line_offset: 0,
            })
        })
        .and_then(|b| b.locale("UTC"))
        .and_then(|b| b.utc_offset(0))
        .and_then(|b| b.alarm_bitmask(0))
        .and_then(|b| b.build())
        .expect("valid struct")
}

const SCAN: &[u8] = &[0xF8, 0x01, 0xFF, 0x00, 0x7A];

fn minimized_jpeg_payload(camera: u32) -> Vec<u8> {
    let mut payload = image_struct(camera, VideoFormat::Jpeg422, 0).to_bytes();
    payload.extend_from_slice(SCAN);
    payload
}

fn mpeg4_payload(camera: u32) -> Vec<u8> {
    let comment = b"Number: 2\0\n";
    let mut payload = image_struct(camera, VideoFormat::Mpeg4IFrame, comment.len() as u32).to_bytes();
    payload.extend_from_slice(comment);
    payload.extend_from_slice(&[0x00, 0x00, 0x01, 0xB6, 0x00, 0x11]);
    payload
}

/// A capture holding one packet of every kind, on two channels.
fn mixed_capture() -> Vec<u8> {
    let mut buf = Vec::new();
    write_packet(&mut buf, CODE_MINIMIZED_JPEG, 1, &minimized_jpeg_payload(1)).unwrap();
    write_packet(&mut buf, CODE_MPEG4, 2, &mpeg4_payload(2)).unwrap();
    write_packet(&mut buf, CODE_MPEG4_MINIMAL, 2, &[0x00, 0x00, 0x01, 0xB6, 0x55]).unwrap();
    write_packet(&mut buf, CODE_INFO, 1, b"Site: Depot\0").unwrap();
    write_packet(&mut buf, CODE_AUDIO, 1, &[0x80; 16]).unwrap();
    write_packet(&mut buf, 0x2A, 3, &[1, 2, 3]).unwrap();
    buf
}

#[test]
fn test_mixed_binary_capture() {
    let mut framer = BinaryFramer::new(Cursor::new(mixed_capture()));
    let mut packets: Vec<Packet> = Vec::new();
    let count = process_stream(&mut framer, &mut packets).unwrap();
    assert_eq!(count, 6);

    let kinds: Vec<FrameKind> = packets.iter().map(|p| p.metadata().frame_type).collect();
    assert_eq!(
        kinds,
        [
            FrameKind::MinimizedJpeg,
            FrameKind::Mpeg4,
            FrameKind::Mpeg4Minimal,
            FrameKind::Info,
            FrameKind::Audio,
            FrameKind::Unknown,
        ]
    );

    // Reconstructed image
    let jpeg = packets[0].data();
    assert!(jpeg.starts_with(&[0xFF, 0xD8, 0xFF, 0xE0]));
    assert!(jpeg.ends_with(&[0x7A, 0xFF, 0xD9]));
    let comment = jfif::find_comment(jpeg).unwrap().unwrap();
    assert!(String::from_utf8_lossy(comment).contains("Number: 1\0\n"));

    // MPEG-4 with struct and comment, then a minimal frame inheriting its resolution
    match (&packets[1], &packets[2]) {
        (Packet::Mpeg4(full), Packet::Mpeg4(minimal)) => {
            assert_eq!(full.comment, b"Number: 2\0\n");
            assert_eq!(full.data, vec![0x00, 0x00, 0x01, 0xB6, 0x00, 0x11]);
            let image = minimal.image.as_ref().expect("resolution known");
            assert_eq!(image.resolution(), full.image.as_ref().unwrap().resolution());
            assert_eq!(image.video_format, VideoFormat::Mpeg4PFrame);
        }
        other => panic!("unexpected packets {:?}", other),
    }

    match &packets[3] {
        Packet::Info(info) => assert_eq!(info.text, "Site: Depot"),
        other => panic!("expected info, got {:?}", other),
    }
    assert_eq!(packets[5].metadata().channel, 3);
}

#[test]
fn test_truncated_capture_reports_error_after_good_packets() {
    let mut data = mixed_capture();
    data.truncate(data.len() - 1);
    let mut framer = BinaryFramer::new(Cursor::new(data));
    let mut packets: Vec<Packet> = Vec::new();
    let result = process_stream(&mut framer, &mut packets);
    assert!(matches!(result, Err(StreamError::Truncated { .. })));
    assert_eq!(packets.len(), 5);
}

#[test]
fn test_same_jpeg_over_both_transports() {
    let jpeg = jfif::reconstruct(&image_struct(6, VideoFormat::Jpeg411, 0), SCAN).unwrap();

    let mut binary = Vec::new();
    write_packet(&mut binary, CODE_JFIF, 1, &jpeg).unwrap();
    let mut mime = Vec::new();
    write_preamble(&mut mime).unwrap();
    write_part(&mut mime, "frame", &jpeg).unwrap();

    let mut from_binary: Vec<Packet> = Vec::new();
    process_stream(&mut BinaryFramer::new(Cursor::new(binary)), &mut from_binary).unwrap();
    let mut from_mime: Vec<Packet> = Vec::new();
    process_stream(&mut MimeFramer::new(Cursor::new(mime)), &mut from_mime).unwrap();

    assert_eq!(from_binary.len(), 1);
    assert_eq!(from_mime.len(), 1);
    assert_eq!(
        Sha256::digest(from_binary[0].data()),
        Sha256::digest(from_mime[0].data())
    );
    assert_eq!(from_binary[0].metadata(), from_mime[0].metadata());
}

struct FailOnMpeg4 {
    images: usize,
}

impl PacketHandler for FailOnMpeg4 {
    fn jfif(&mut self, _packet: JfifPacket) -> Result<()> {
        self.images += 1;
        Ok(())
    }

    fn mpeg4(&mut self, _packet: Mpeg4Packet) -> Result<()> {
        Err(StreamError::handler("video not wanted"))
    }
}

#[test]
fn test_handler_error_stops_processing() {
    let mut framer = BinaryFramer::new(Cursor::new(mixed_capture()));
    let mut handler = FailOnMpeg4 { images: 0 };
    let result = process_stream(&mut framer, &mut handler);
    match result {
        Err(StreamError::Handler(e)) => assert_eq!(e.to_string(), "video not wanted"),
        other => panic!("expected handler error, got {:?}", other),
    }
    assert_eq!(handler.images, 1);
}

#[test]
fn test_struct_serialises_to_json() {
    let image = image_struct(9, VideoFormat::Jpeg422, 0);
    let json = serde_json::to_value(&image).unwrap();
    assert_eq!(json["camera"], 9);
    assert_eq!(json["version"], "PictureLittleEndian");
    assert_eq!(json["video_format"], "Jpeg422");
    assert_eq!(json["picture"]["target_lines"], 288);
    assert_eq!(json["title"], "Camera 9");
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("adh-{}-{}", std::process::id(), name))
}

#[test]
fn test_open_gzip_capture() {
    let path = temp_path("capture.bin.gz");
    {
        let file = std::fs::File::create(&path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(&mixed_capture()).unwrap();
        encoder.finish().unwrap();
    }

    let mut framer = open_framer(&path, Transport::Binary, 1).unwrap();
    let mut packets: Vec<Packet> = Vec::new();
    let count = process_stream(framer.as_mut(), &mut packets).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(count, 6);
}

#[test]
fn test_open_plain_mime_capture() {
    let path = temp_path("capture.mime");
    {
        let mut file = std::fs::File::create(&path).unwrap();
        write_preamble(&mut file).unwrap();
        write_part(&mut file, "b", b"one").unwrap();
        write_part(&mut file, "b", b"two").unwrap();
    }

    let mut framer = open_framer(&path, Transport::Mime, 7).unwrap();
    let mut packets: Vec<Packet> = Vec::new();
    process_stream(framer.as_mut(), &mut packets).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(packets.len(), 2);
    assert_eq!(packets[1].data(), b"two");
    assert!(packets.iter().all(|p| p.metadata().channel == 7));
}
