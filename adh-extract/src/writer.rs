use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use adh::comment::CommentBlock;
use adh::image_struct::ImageDataStruct;
use adh::mpeg4::{self, VopType};
use adh::packet::{InfoPacket, JfifPacket, Mpeg4Packet, RawPacket};
use adh::{PacketHandler, Result, jfif};
use chrono::{DateTime, SecondsFormat, Utc};

/// Which packet kinds are written out.
#[derive(Debug, Clone, Copy)]
pub struct Outputs {
    pub images: bool,
    pub video: bool,
    pub info: bool,
    pub audio: bool,
}

#[derive(Debug, Default)]
pub struct ExtractStats {
    pub images: usize,
    pub video_frames: usize,
    pub keyframes: usize,
    pub info: usize,
    pub audio: usize,
    pub skipped: usize,
}

/// Writes each packet of a capture to files named `<basename>_...`.
///
/// Images become one `.jpg` per packet; MPEG-4 frames, audio and info text are
/// appended to per-channel `.m4v` / `.raw` files and a single `_info.txt`.
pub struct FileExtractor {
    folder: PathBuf,
    basename: String,
    outputs: Outputs,
    video: HashMap<u16, BufWriter<File>>,
    audio: HashMap<u16, BufWriter<File>>,
    info: Option<BufWriter<File>>,
    stats: ExtractStats,
}

impl FileExtractor {
    pub fn new(folder: &Path, basename: &str, outputs: Outputs) -> Self {
        FileExtractor {
            folder: folder.to_path_buf(),
            basename: basename.to_string(),
            outputs,
            video: HashMap::new(),
            audio: HashMap::new(),
            info: None,
            stats: ExtractStats::default(),
        }
    }

    pub fn stats(&self) -> &ExtractStats {
        &self.stats
    }

    /// Flush every open output file.
    pub fn finish(mut self) -> std::io::Result<ExtractStats> {
        for writer in self.video.values_mut().chain(self.audio.values_mut()) {
            writer.flush()?;
        }
        if let Some(info) = self.info.as_mut() {
            info.flush()?;
        }
        Ok(self.stats)
    }

    fn path(&self, suffix: &str) -> PathBuf {
        self.folder.join(format!("{}_{}", self.basename, suffix))
    }

    fn channel_writer<'a>(
        writers: &'a mut HashMap<u16, BufWriter<File>>,
        path: PathBuf,
        channel: u16,
    ) -> std::io::Result<&'a mut BufWriter<File>> {
        if !writers.contains_key(&channel) {
            log::info!("Writing {}", path.display());
            writers.insert(channel, BufWriter::new(File::create(&path)?));
        }
        writers
            .get_mut(&channel)
            .ok_or_else(|| std::io::Error::other("channel writer missing"))
    }
}

/// Capture time of an image, from its struct or else from its comment block.
fn image_timestamp(image: Option<&ImageDataStruct>, data: &[u8]) -> Option<DateTime<Utc>> {
    if let Some(image) = image {
        return DateTime::from_timestamp(image.session_time as i64, image.milliseconds % 1000 * 1_000_000);
    }
    let comment = jfif::find_comment(data).ok().flatten()?;
    let block = CommentBlock::parse(comment);
    DateTime::from_timestamp(block.session_time() as i64, block.milliseconds % 1000 * 1_000_000)
}

/// Timestamp component of an image file name; `:` is not valid on every filesystem.
pub fn timestamp_label(time: Option<DateTime<Utc>>) -> String {
    match time {
        Some(t) => t.to_rfc3339_opts(SecondsFormat::Millis, true).replace(':', "."),
        None => "unknown-time".to_string(),
    }
}

impl PacketHandler for FileExtractor {
    fn jfif(&mut self, packet: JfifPacket) -> Result<()> {
        if !self.outputs.images {
            self.stats.skipped += 1;
            return Ok(());
        }

        let time = image_timestamp(packet.image.as_ref(), &packet.data);
        self.stats.images += 1;
        let path = self.path(&format!(
            "ch{}_{:06}_{}.jpg",
            packet.metadata.channel,
            self.stats.images,
            timestamp_label(time)
        ));
        log::debug!("Writing {}", path.display());
        std::fs::write(&path, &packet.data)?;
        Ok(())
    }

    fn mpeg4(&mut self, packet: Mpeg4Packet) -> Result<()> {
        if !self.outputs.video {
            self.stats.skipped += 1;
            return Ok(());
        }

        // Classification is informational only; frames without a VOP are still written
        if let Ok(VopType::I) = mpeg4::classify(&packet.data) {
            self.stats.keyframes += 1;
        }
        self.stats.video_frames += 1;

        let channel = packet.metadata.channel;
        let path = self.path(&format!("ch{}.m4v", channel));
        Self::channel_writer(&mut self.video, path, channel)?.write_all(&packet.data)?;
        Ok(())
    }

    fn info(&mut self, packet: InfoPacket) -> Result<()> {
        if !self.outputs.info {
            self.stats.skipped += 1;
            return Ok(());
        }

        if self.info.is_none() {
            let path = self.path("info.txt");
            log::info!("Writing {}", path.display());
            self.info = Some(BufWriter::new(File::create(&path)?));
        }
        if let Some(info) = self.info.as_mut() {
            writeln!(info, "[ch {}] {}", packet.metadata.channel, packet.text)?;
        }
        self.stats.info += 1;
        Ok(())
    }

    fn audio(&mut self, packet: RawPacket) -> Result<()> {
        if !self.outputs.audio {
            self.stats.skipped += 1;
            return Ok(());
        }

        let channel = packet.metadata.channel;
        let path = self.path(&format!("ch{}.raw", channel));
        Self::channel_writer(&mut self.audio, path, channel)?.write_all(&packet.data)?;
        self.stats.audio += 1;
        Ok(())
    }

    fn unknown(&mut self, packet: RawPacket) -> Result<()> {
        log::debug!(
            "Skipping unknown packet on channel {} ({} bytes)",
            packet.metadata.channel,
            packet.metadata.length
        );
        self.stats.skipped += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adh::binary::{BinaryFramer, write_packet};
    use adh::frame_type::{CODE_AUDIO, CODE_INFO, CODE_JFIF, CODE_MPEG4_MINIMAL};
    use adh::process_stream;
    use std::io::Cursor;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("adh-extract-{}-{}", std::process::id(), name));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    const ALL: Outputs = Outputs {
        images: true,
        video: true,
        info: true,
        audio: true,
    };

    #[test]
    fn test_timestamp_label() {
        let t = DateTime::from_timestamp(1_236_852_672, 250_000_000);
        assert_eq!(timestamp_label(t), "2009-03-12T10.11.12.250Z");
        assert_eq!(timestamp_label(None), "unknown-time");
    }

    #[test]
    fn test_extract_writes_per_kind_files() {
        let dir = scratch_dir("kinds");
        let mut capture = Vec::new();
        write_packet(&mut capture, CODE_JFIF, 1, &[0xFF, 0xD8, 0xFF, 0xD9]).unwrap();
        write_packet(&mut capture, CODE_MPEG4_MINIMAL, 2, &[0x00, 0x00, 0x01, 0xB6, 0x00]).unwrap();
        write_packet(&mut capture, CODE_MPEG4_MINIMAL, 2, &[0x00, 0x00, 0x01, 0xB6, 0x40]).unwrap();
        write_packet(&mut capture, CODE_INFO, 1, b"hello\0").unwrap();
        write_packet(&mut capture, CODE_AUDIO, 3, &[1, 2, 3]).unwrap();

        let mut extractor = FileExtractor::new(&dir, "cap", ALL);
        process_stream(&mut BinaryFramer::new(Cursor::new(capture)), &mut extractor).unwrap();
        let stats = extractor.finish().unwrap();

        assert_eq!(stats.images, 1);
        assert_eq!(stats.video_frames, 2);
        assert_eq!(stats.keyframes, 1);
        assert_eq!(
            std::fs::read(dir.join("cap_ch1_000001_unknown-time.jpg")).unwrap(),
            vec![0xFF, 0xD8, 0xFF, 0xD9]
        );
        assert_eq!(std::fs::read(dir.join("cap_ch2.m4v")).unwrap().len(), 10);
        assert_eq!(std::fs::read_to_string(dir.join("cap_info.txt")).unwrap(), "[ch 1] hello\n");
        assert_eq!(std::fs::read(dir.join("cap_ch3.raw")).unwrap(), vec![1, 2, 3]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_disabled_outputs_are_skipped() {
        let dir = scratch_dir("skip");
        let mut capture = Vec::new();
        write_packet(&mut capture, CODE_JFIF, 1, &[0xFF, 0xD8, 0xFF, 0xD9]).unwrap();
        write_packet(&mut capture, CODE_AUDIO, 1, &[9]).unwrap();

        let outputs = Outputs {
            images: false,
            audio: false,
            ..ALL
        };
        let mut extractor = FileExtractor::new(&dir, "cap", outputs);
        process_stream(&mut BinaryFramer::new(Cursor::new(capture)), &mut extractor).unwrap();
        assert_eq!(extractor.stats().skipped, 2);

        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
