mod writer;

use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser};

use adh::reader::{Transport, open_framer};
use writer::{FileExtractor, Outputs};

/// ADH Extract Tool: splits captured ADH streams into images, video, info and audio files.
#[derive(Parser)]
#[command(name = "adh-extract")]
struct Args {
    /// Inputs are MIME (multipart JPEG) streams rather than binary streams
    #[arg(long = "mime", default_value_t = false, action = ArgAction::Set)]
    mime: bool,

    /// Channel reported for MIME streams, which carry none on the wire
    #[arg(long = "mime-channel", default_value_t = 1)]
    mime_channel: u16,

    /// Write a .jpg per image packet?
    #[arg(long = "with-images", default_value_t = true, action = ArgAction::Set)]
    with_images: bool,

    /// Write per-channel MPEG-4 elementary streams?
    #[arg(long = "with-video", default_value_t = true, action = ArgAction::Set)]
    with_video: bool,

    /// Write info packet text?
    #[arg(long = "with-info", default_value_t = true, action = ArgAction::Set)]
    with_info: bool,

    /// Write per-channel raw audio?
    #[arg(long = "with-audio", default_value_t = true, action = ArgAction::Set)]
    with_audio: bool,

    /// Output directory ("SRC-FOLDER" = alongside the capture files)
    #[arg(long = "output-folder", default_value = "./")]
    output_folder: String,

    /// Stop on the first error instead of continuing and reporting failures at the end
    #[arg(long = "fail-fast", default_value_t = false, action = ArgAction::Set)]
    fail_fast: bool,

    /// Display version and quit
    #[arg(long = "version")]
    version: bool,

    /// Input capture files (.gz captures are decompressed)
    files: Vec<String>,
}

/// Convert known single-dash flags to double-dash for clap compatibility.
/// Handles both `-flag value` and `-flag=value` forms.
fn normalise_args(args: Vec<String>) -> Vec<String> {
    let known_flags = [
        "-mime",
        "-mime-channel",
        "-with-images",
        "-with-video",
        "-with-info",
        "-with-audio",
        "-output-folder",
        "-fail-fast",
        "-version",
    ];

    args.into_iter()
        .map(|arg| {
            for flag in &known_flags {
                if arg == *flag {
                    return format!("-{}", flag);
                }
                let prefix = format!("{}=", flag);
                if arg.starts_with(&prefix) {
                    return format!("-{}", arg);
                }
            }
            arg
        })
        .collect()
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let raw_args: Vec<String> = std::env::args().collect();
    let args = Args::parse_from(normalise_args(raw_args));

    if let Err(e) = run(&args) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    if args.version {
        adh::version::print_cli_version_banner(
            "ADH Extract Tool",
            env!("CARGO_PKG_VERSION"),
            env!("RELEASE_VERSION"),
            env!("GIT_COMMIT"),
        );
        return Ok(());
    }

    validate_args(args)?;
    extract_cli(args)
}

fn validate_args(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    if args.files.is_empty() {
        return Err("Expected at least one capture file as input!".into());
    }

    if !(args.with_images || args.with_video || args.with_info || args.with_audio) {
        return Err("Must enable extraction of at least one of: images, video, info, audio!".into());
    }

    if args.mime && !args.with_images {
        return Err("MIME streams only carry images; --with-images=false leaves nothing to extract".into());
    }

    Ok(())
}

/// A failure collected when not in fail-fast mode.
#[derive(Debug)]
struct DeferredError {
    file: String,
    error: String,
}

impl std::fmt::Display for DeferredError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to extract {}: {}", self.file, self.error)
    }
}

fn extract_cli(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut errors: Vec<DeferredError> = Vec::new();

    for path in &args.files {
        if let Err(e) = process_file(args, path) {
            if args.fail_fast {
                return Err(format!("{}: {}", path, e).into());
            }
            log::warn!("{}: {}", path, e);
            errors.push(DeferredError {
                file: path.clone(),
                error: e.to_string(),
            });
        }
    }

    if !errors.is_empty() {
        log::error!("");
        log::error!("OPERATION COMPLETED WITH ERRORS:");
        for e in &errors {
            log::error!("  {}", e);
        }
        return Err(format!("{} error(s) encountered during processing", errors.len()).into());
    }

    Ok(())
}

fn output_folder(args: &Args, capture: &str) -> PathBuf {
    let folder = args.output_folder.trim_end_matches(['/', '\\']);
    if folder == "SRC-FOLDER" {
        Path::new(capture)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    } else if folder.is_empty() {
        PathBuf::from("/")
    } else {
        PathBuf::from(folder)
    }
}

/// Capture file name without `.gz` and its format extension.
fn base_filename(capture: &str) -> String {
    let mut path = Path::new(capture).to_path_buf();
    if path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
    {
        path.set_extension("");
    }
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "capture".to_string())
}

fn process_file(args: &Args, capture: &str) -> Result<(), Box<dyn std::error::Error>> {
    log::info!("Extracting {}", capture);

    let transport = if args.mime { Transport::Mime } else { Transport::Binary };
    let mut framer = open_framer(Path::new(capture), transport, args.mime_channel)
        .map_err(|e| format!("Error opening capture: {}", e))?;

    let folder = output_folder(args, capture);
    std::fs::create_dir_all(&folder)?;

    let outputs = Outputs {
        images: args.with_images,
        video: args.with_video,
        info: args.with_info,
        audio: args.with_audio,
    };
    let mut extractor = FileExtractor::new(&folder, &base_filename(capture), outputs);

    let result = adh::process_stream(framer.as_mut(), &mut extractor);
    // Whatever was extracted before a failure is kept
    let stats = extractor.finish()?;
    let packets = result?;

    log::info!("\tPackets: {}", packets);
    log::info!("\tImages: {}", stats.images);
    log::info!(
        "\tVideo frames: {} ({} keyframes)",
        stats.video_frames,
        stats.keyframes
    );
    log::info!("\tInfo blocks: {}", stats.info);
    log::info!("\tAudio blocks: {}", stats.audio);
    if stats.skipped > 0 {
        log::info!("\tSkipped: {}", stats.skipped);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_single_dash_flags() {
        let args = vec![
            "adh-extract".to_string(),
            "-with-audio=false".to_string(),
            "-output-folder".to_string(),
            "out".to_string(),
            "-mime".to_string(),
            "true".to_string(),
            "capture.bin".to_string(),
        ];
        let args = Args::parse_from(normalise_args(args));
        assert!(!args.with_audio);
        assert!(args.mime);
        assert_eq!(args.output_folder, "out");
        assert_eq!(args.files, vec!["capture.bin"]);
    }

    #[test]
    fn test_base_filename() {
        assert_eq!(base_filename("/tmp/cam1.bin"), "cam1");
        assert_eq!(base_filename("cam1.mime.gz"), "cam1");
        assert_eq!(base_filename("cam1"), "cam1");
    }

    #[test]
    fn test_src_folder_output() {
        let args = Args::parse_from(["adh-extract", "--output-folder", "SRC-FOLDER", "a/b/c.bin"]);
        assert_eq!(output_folder(&args, "a/b/c.bin"), PathBuf::from("a/b"));
        assert_eq!(output_folder(&args, "c.bin"), PathBuf::from("."));
    }
}
