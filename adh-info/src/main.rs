use std::path::Path;

use adh::frame_type::{ALL_FRAME_CODES, frame_kind};
use adh::image_struct::ImageDataStruct;
use adh::packet::{Packet, StreamMetadata};
use adh::reader::{Transport, open_framer};
use adh::{FrameDispatcher, FrameKind, StreamFramer, jfif, mpeg4};
use clap::Parser;
use schemars::JsonSchema;
use serde::Serialize;

#[derive(Parser)]
#[command(name = "adh-info", about = "Parse and display the packets of a captured ADH stream")]
struct Args {
    /// Input capture (.gz captures are decompressed)
    #[arg(short = 'f', long = "file")]
    file: Option<String>,

    /// Input capture (positional)
    #[arg(conflicts_with = "file", required_unless_present_any = ["file", "schema", "version"])]
    input: Option<String>,

    /// Input is a MIME (multipart JPEG) stream rather than a binary stream
    #[arg(long)]
    mime: bool,

    /// Only show packets on this channel
    #[arg(short = 'c', long = "channel")]
    channel: Option<u16>,

    /// Only show packets of this kind (jfif, minjpeg, mpeg4, mpeg4min, info, audio, unknown)
    #[arg(short = 'k', long = "kind", value_parser = parse_kind)]
    kind: Option<FrameKind>,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Print JSON schema for the output format and exit
    #[arg(long)]
    schema: bool,

    /// Display version and quit
    #[arg(long)]
    version: bool,
}

/// One line of output per packet.
#[derive(Serialize, JsonSchema)]
struct PacketSummary {
    /// Byte offset of the packet within the capture
    offset: u64,
    #[serde(flatten)]
    metadata: StreamMetadata,
    /// Struct carried by (or derived for) the packet
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<ImageDataStruct>,
    /// Comment block text, NULs removed
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
    /// Info packet text
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    /// Whether an MPEG-4 frame is an intra frame
    #[serde(skip_serializing_if = "Option::is_none")]
    keyframe: Option<bool>,
}

fn parse_kind(value: &str) -> Result<FrameKind, String> {
    ALL_FRAME_CODES
        .iter()
        .map(|&code| frame_kind(code))
        .chain([FrameKind::Unknown])
        .find(|kind| kind.label().eq_ignore_ascii_case(value))
        .ok_or_else(|| format!("unknown frame kind '{}'", value))
}

fn comment_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .replace('\0', "")
        .trim_end()
        .to_string()
}

fn summarise(offset: u64, packet: &Packet) -> PacketSummary {
    let mut summary = PacketSummary {
        offset,
        metadata: *packet.metadata(),
        image: packet.image().cloned(),
        comment: None,
        text: None,
        keyframe: None,
    };

    match packet {
        Packet::Jfif(p) => {
            // A JFIF without a readable COM segment is still listed
            if let Ok(Some(comment)) = jfif::find_comment(&p.data) {
                summary.comment = Some(comment_text(comment));
            }
        }
        Packet::Mpeg4(p) => {
            if !p.comment.is_empty() {
                summary.comment = Some(comment_text(&p.comment));
            }
            summary.keyframe = mpeg4::classify(&p.data)
                .ok()
                .map(|vop| vop == mpeg4::VopType::I);
        }
        Packet::Info(p) => summary.text = Some(p.text.clone()),
        Packet::Audio(_) | Packet::Unknown(_) => {}
    }

    summary
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Reset SIGPIPE to default so piped output (e.g. head/tail) exits cleanly
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }

    let args = Args::parse();

    if args.version {
        adh::version::print_cli_version_banner(
            "ADH Info Tool",
            env!("CARGO_PKG_VERSION"),
            env!("RELEASE_VERSION"),
            env!("GIT_COMMIT"),
        );
        return Ok(());
    }

    if args.schema {
        let schema = schemars::schema_for!(Vec<PacketSummary>);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    let file = args
        .file
        .or(args.input)
        .ok_or("file argument required")?;
    let transport = if args.mime { Transport::Mime } else { Transport::Binary };
    let mut framer = open_framer(Path::new(&file), transport, 1)?;
    let mut dispatcher = FrameDispatcher::new();

    // Every packet is decoded so channel resolutions stay current, then filtered
    let mut summaries = Vec::new();
    while let Some(frame) = framer.next_frame()? {
        let offset = frame.offset;
        let packet = dispatcher.decode(frame)?;
        let metadata = packet.metadata();

        if args.channel.is_some_and(|c| c != metadata.channel) {
            continue;
        }
        if args.kind.is_some_and(|k| k != metadata.frame_type) {
            continue;
        }
        summaries.push(summarise(offset, &packet));
    }

    if args.json {
        println!("{}", serde_json::to_string(&summaries)?);
        return Ok(());
    }

    println!(
        "{:>8} {:>4} {:>12} {:>8} {:>4} {:>12} {:>4} {:>9} {:>3} {:>24}",
        "Type", "CH", "OFFSET", "LENGTH", "CAM", "FORMAT", "Q", "RES", "KF", "TIME"
    );

    for s in &summaries {
        let (camera, format, q, res, time) = match &s.image {
            Some(image) => {
                let res = image.resolution();
                (
                    image.camera.to_string(),
                    format!("{:?}", image.video_format),
                    image.q_factor.to_string(),
                    format!("{}x{}", res.width, res.height),
                    image
                        .session_datetime()
                        .map(|t| {
                            format!("{}.{:03}", t.format("%Y-%m-%dT%H:%M:%S"), image.milliseconds % 1000)
                        })
                        .unwrap_or_default(),
                )
            }
            None => Default::default(),
        };
        let keyframe = match s.keyframe {
            Some(true) => "1",
            Some(false) => "0",
            None => "",
        };

        println!(
            "{:>8} {:>4} {:>12} {:>8} {:>4} {:>12} {:>4} {:>9} {:>3} {:>24}",
            s.metadata.frame_type.label(),
            s.metadata.channel,
            format!("0x{:X}", s.offset),
            s.metadata.length,
            camera,
            format,
            q,
            res,
            keyframe,
            time,
        );

        if let Some(text) = &s.text {
            println!("         INFO: {}", text);
        }
    }

    Ok(())
}
