use std::collections::HashMap;

use crate::error::Result;
use crate::frame_type::FrameKind;
use crate::framer::StreamFramer;
use crate::image_struct::{IMAGE_STRUCT_SIZE, ImageDataStruct, Resolution};
use crate::jfif;
use crate::mpeg4;
use crate::packet::{InfoPacket, JfifPacket, Mpeg4Packet, Packet, RawFrame, RawPacket};

/// Receives decoded packets, one method per frame kind.
///
/// Methods are called once per packet, in stream order. An error returned from
/// any method stops stream processing and is returned to the caller.
/// Minimized JPEG and MPEG-4-minimal packets fall through to [`jfif`](Self::jfif)
/// and [`mpeg4`](Self::mpeg4) unless overridden.
pub trait PacketHandler {
    fn jfif(&mut self, _packet: JfifPacket) -> Result<()> {
        Ok(())
    }

    fn minimized_jpeg(&mut self, packet: JfifPacket) -> Result<()> {
        self.jfif(packet)
    }

    fn mpeg4(&mut self, _packet: Mpeg4Packet) -> Result<()> {
        Ok(())
    }

    fn mpeg4_minimal(&mut self, packet: Mpeg4Packet) -> Result<()> {
        self.mpeg4(packet)
    }

    fn info(&mut self, _packet: InfoPacket) -> Result<()> {
        Ok(())
    }

    fn audio(&mut self, _packet: RawPacket) -> Result<()> {
        Ok(())
    }

    fn unknown(&mut self, _packet: RawPacket) -> Result<()> {
        Ok(())
    }
}

/// Collects every packet in arrival order.
impl PacketHandler for Vec<Packet> {
    fn jfif(&mut self, packet: JfifPacket) -> Result<()> {
        self.push(Packet::Jfif(packet));
        Ok(())
    }

    fn mpeg4(&mut self, packet: Mpeg4Packet) -> Result<()> {
        self.push(Packet::Mpeg4(packet));
        Ok(())
    }

    fn info(&mut self, packet: InfoPacket) -> Result<()> {
        self.push(Packet::Info(packet));
        Ok(())
    }

    fn audio(&mut self, packet: RawPacket) -> Result<()> {
        self.push(Packet::Audio(packet));
        Ok(())
    }

    fn unknown(&mut self, packet: RawPacket) -> Result<()> {
        self.push(Packet::Unknown(packet));
        Ok(())
    }
}

/// Turns framed payloads into typed packets and routes them to a handler.
///
/// Remembers the last resolution seen on each channel so that MPEG-4-minimal
/// frames, which carry no struct, can still be given one.
#[derive(Debug, Default)]
pub struct FrameDispatcher {
    resolutions: HashMap<u16, Resolution>,
}

impl FrameDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supply a channel's resolution out-of-band.
    pub fn set_resolution(&mut self, channel: u16, resolution: Resolution) {
        self.resolutions.insert(channel, resolution);
    }

    pub fn resolution(&self, channel: u16) -> Option<Resolution> {
        self.resolutions.get(&channel).copied()
    }

    /// Decode a framed payload according to its frame kind.
    pub fn decode(&mut self, frame: RawFrame) -> Result<Packet> {
        let RawFrame {
            metadata, payload, ..
        } = frame;

        let packet = match metadata.frame_type {
            FrameKind::Jfif => Packet::Jfif(JfifPacket {
                metadata,
                data: payload,
                image: None,
            }),
            FrameKind::MinimizedJpeg => {
                let image = ImageDataStruct::parse(&payload)?;
                self.remember(metadata.channel, &image);
                let data = jfif::reconstruct(&image, &payload[IMAGE_STRUCT_SIZE..])?;
                Packet::Jfif(JfifPacket {
                    metadata,
                    data,
                    image: Some(image),
                })
            }
            FrameKind::Mpeg4 => {
                let parts = mpeg4::split(&payload)?;
                self.remember(metadata.channel, &parts.image);
                Packet::Mpeg4(Mpeg4Packet {
                    metadata,
                    data: parts.data,
                    image: Some(parts.image),
                    comment: parts.comment,
                })
            }
            FrameKind::Mpeg4Minimal => {
                let image = match self.resolution(metadata.channel) {
                    Some(res) => Some(mpeg4::minimal_struct(
                        metadata.channel as u32,
                        res,
                        &payload,
                    )?),
                    None => {
                        log::warn!(
                            "MPEG-4 minimal frame on channel {} with no known resolution",
                            metadata.channel
                        );
                        None
                    }
                };
                Packet::Mpeg4(Mpeg4Packet {
                    metadata,
                    data: payload,
                    image,
                    comment: Vec::new(),
                })
            }
            FrameKind::Info => Packet::Info(InfoPacket {
                metadata,
                text: String::from_utf8_lossy(&payload)
                    .trim_end_matches('\0')
                    .to_string(),
            }),
            FrameKind::Audio => Packet::Audio(RawPacket {
                metadata,
                data: payload,
            }),
            FrameKind::Unknown => Packet::Unknown(RawPacket {
                metadata,
                data: payload,
            }),
        };
        Ok(packet)
    }

    /// Decode `frame` and hand it to the matching handler method.
    pub fn dispatch<H: PacketHandler + ?Sized>(&mut self, frame: RawFrame, handler: &mut H) -> Result<()> {
        let packet = self.decode(frame)?;
        deliver(packet, handler)
    }

    /// Pull every frame from `framer` and dispatch it. Returns the number of packets delivered.
    pub fn run<F, H>(&mut self, framer: &mut F, handler: &mut H) -> Result<usize>
    where
        F: StreamFramer + ?Sized,
        H: PacketHandler + ?Sized,
    {
        let mut count = 0;
        while let Some(frame) = framer.next_frame()? {
            self.dispatch(frame, handler)?;
            count += 1;
        }
        log::debug!("End of stream after {} packets", count);
        Ok(count)
    }

    fn remember(&mut self, channel: u16, image: &ImageDataStruct) {
        self.resolutions.insert(channel, image.resolution());
    }
}

/// Call the handler method matching the packet's frame kind.
pub fn deliver<H: PacketHandler + ?Sized>(packet: Packet, handler: &mut H) -> Result<()> {
    match packet {
        Packet::Jfif(p) if p.metadata.frame_type == FrameKind::MinimizedJpeg => handler.minimized_jpeg(p),
        Packet::Jfif(p) => handler.jfif(p),
        Packet::Mpeg4(p) if p.metadata.frame_type == FrameKind::Mpeg4Minimal => handler.mpeg4_minimal(p),
        Packet::Mpeg4(p) => handler.mpeg4(p),
        Packet::Info(p) => handler.info(p),
        Packet::Audio(p) => handler.audio(p),
        Packet::Unknown(p) => handler.unknown(p),
    }
}

/// Read `framer` to the end with a fresh dispatcher.
pub fn process_stream<F, H>(framer: &mut F, handler: &mut H) -> Result<usize>
where
    F: StreamFramer + ?Sized,
    H: PacketHandler + ?Sized,
{
    FrameDispatcher::new().run(framer, handler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StreamError;
    use crate::image_struct::tests::sample_struct;
    use crate::image_struct::{StructVersion, VideoFormat};
    use crate::packet::StreamMetadata;

    fn frame(kind: FrameKind, channel: u16, payload: Vec<u8>) -> RawFrame {
        RawFrame {
            metadata: StreamMetadata {
                frame_type: kind,
                channel,
                length: payload.len() as u32,
            },
            offset: 0,
            payload,
        }
    }

    #[derive(Default)]
    struct Calls(Vec<&'static str>);

    impl PacketHandler for Calls {
        fn jfif(&mut self, _: JfifPacket) -> Result<()> {
            self.0.push("jfif");
            Ok(())
        }
        fn minimized_jpeg(&mut self, _: JfifPacket) -> Result<()> {
            self.0.push("minimized_jpeg");
            Ok(())
        }
        fn mpeg4(&mut self, _: Mpeg4Packet) -> Result<()> {
            self.0.push("mpeg4");
            Ok(())
        }
        fn mpeg4_minimal(&mut self, _: Mpeg4Packet) -> Result<()> {
            self.0.push("mpeg4_minimal");
            Ok(())
        }
        fn info(&mut self, _: InfoPacket) -> Result<()> {
            self.0.push("info");
            Ok(())
        }
        fn audio(&mut self, _: RawPacket) -> Result<()> {
            self.0.push("audio");
            Ok(())
        }
        fn unknown(&mut self, _: RawPacket) -> Result<()> {
            self.0.push("unknown");
            Ok(())
        }
    }

    fn minimized_payload() -> Vec<u8> {
        let mut payload = sample_struct(StructVersion::PictureBigEndian).to_bytes();
        payload.extend_from_slice(&[0xAB, 0xCD]);
        payload
    }

    #[test]
    fn test_each_kind_reaches_its_method() {
        let mut dispatcher = FrameDispatcher::new();
        let mut calls = Calls::default();
        let mut mpeg4 = sample_struct(StructVersion::PictureBigEndian);
        mpeg4.video_format = VideoFormat::Mpeg4IFrame;

        let frames = vec![
            frame(FrameKind::Jfif, 1, vec![0xFF, 0xD8, 0xFF, 0xD9]),
            frame(FrameKind::MinimizedJpeg, 1, minimized_payload()),
            frame(FrameKind::Mpeg4, 1, mpeg4.to_bytes()),
            frame(FrameKind::Mpeg4Minimal, 1, vec![0, 0, 1, 0xB6, 0x40]),
            frame(FrameKind::Info, 1, b"hello\0\0".to_vec()),
            frame(FrameKind::Audio, 1, vec![1, 2]),
            frame(FrameKind::Unknown, 1, vec![3]),
        ];
        for f in frames {
            dispatcher.dispatch(f, &mut calls).unwrap();
        }
        assert_eq!(
            calls.0,
            ["jfif", "minimized_jpeg", "mpeg4", "mpeg4_minimal", "info", "audio", "unknown"]
        );
    }

    #[test]
    fn test_default_methods_fall_through() {
        let mut dispatcher = FrameDispatcher::new();
        let mut packets: Vec<Packet> = Vec::new();
        dispatcher
            .dispatch(frame(FrameKind::MinimizedJpeg, 2, minimized_payload()), &mut packets)
            .unwrap();
        dispatcher
            .dispatch(frame(FrameKind::Mpeg4Minimal, 2, vec![0, 0, 1, 0xB6, 0x40]), &mut packets)
            .unwrap();

        assert_eq!(packets.len(), 2);
        match &packets[0] {
            Packet::Jfif(p) => {
                assert_eq!(p.metadata.frame_type, FrameKind::MinimizedJpeg);
                assert!(p.data.starts_with(&[0xFF, 0xD8]));
                assert!(p.data.ends_with(&[0xAB, 0xCD, 0xFF, 0xD9]));
                assert_eq!(p.image.as_ref().unwrap().camera, 3);
            }
            other => panic!("expected JFIF, got {:?}", other),
        }
        match &packets[1] {
            Packet::Mpeg4(p) => {
                // Resolution learned from the minimized JPEG on the same channel.
                let image = p.image.as_ref().unwrap();
                assert_eq!(image.resolution(), Resolution { width: 352, height: 288 });
                assert_eq!(image.video_format, VideoFormat::Mpeg4PFrame);
                assert_eq!(image.camera, 2);
            }
            other => panic!("expected MPEG-4, got {:?}", other),
        }
    }

    #[test]
    fn test_mpeg4_minimal_without_resolution() {
        let mut dispatcher = FrameDispatcher::new();
        let packet = dispatcher
            .decode(frame(FrameKind::Mpeg4Minimal, 5, vec![0x01, 0x02]))
            .unwrap();
        match packet {
            Packet::Mpeg4(p) => {
                assert!(p.image.is_none());
                assert_eq!(p.data, vec![0x01, 0x02]);
            }
            other => panic!("expected MPEG-4, got {:?}", other),
        }
    }

    #[test]
    fn test_mpeg4_minimal_with_resolution_needs_vop() {
        let mut dispatcher = FrameDispatcher::new();
        dispatcher.set_resolution(5, Resolution { width: 640, height: 480 });
        let result = dispatcher.decode(frame(FrameKind::Mpeg4Minimal, 5, vec![0x01, 0x02]));
        assert!(matches!(result, Err(StreamError::VopStartCodeNotFound)));
    }

    #[test]
    fn test_info_text_trimmed() {
        let mut dispatcher = FrameDispatcher::new();
        let packet = dispatcher
            .decode(frame(FrameKind::Info, 1, b"Alarm 3 active\0\0".to_vec()))
            .unwrap();
        match packet {
            Packet::Info(p) => assert_eq!(p.text, "Alarm 3 active"),
            other => panic!("expected info, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_struct_version_is_fatal() {
        let mut dispatcher = FrameDispatcher::new();
        let mut payload = minimized_payload();
        payload[0] = 0;
        let result = dispatcher.decode(frame(FrameKind::MinimizedJpeg, 1, payload));
        assert!(matches!(result, Err(StreamError::VersionMismatch { .. })));
    }
}
