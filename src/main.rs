//! ZVD-FLV CLI
//!
//! Produces FLV files from synthetic or pre-encoded elementary streams and
//! walks the tag framing of existing files.

use anyhow::{bail, Context};
use byteorder::{BigEndian, ReadBytesExt};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use zvd_flv::codec::{
    AudioEncoderConfig, AudioFrame, PassthroughEncoder, VideoEncoderConfig, VideoFrame,
};
use zvd_flv::format::flv::{FlvAudioCodec, FlvTagType, FLV_HEADER_SIZE, TAG_HEADER_SIZE};
use zvd_flv::util::Buffer;
use zvd_flv::{init, Config, FlvMuxer, MuxerOptions};

#[derive(Parser)]
#[command(name = "zvd-flv")]
#[command(about = "ZVD-FLV - live FLV muxer", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mux an FLV file
    ///
    /// Without unit files a synthetic session is generated. Unit files are a
    /// sequence of records: 8-byte big-endian timestamp in microseconds, one
    /// flag byte (bit 0 = keyframe), 4-byte big-endian length, then the
    /// payload.
    Mux {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Session configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Pre-encoded video units
        #[arg(long, requires = "video_config")]
        video_units: Option<PathBuf>,

        /// AVC decoder configuration record for `--video-units`
        #[arg(long)]
        video_config: Option<PathBuf>,

        /// Pre-encoded audio units
        #[arg(long, requires = "audio_config")]
        audio_units: Option<PathBuf>,

        /// AudioSpecificConfig for `--audio-units`
        #[arg(long)]
        audio_config: Option<PathBuf>,

        /// Length of the synthetic session in milliseconds
        #[arg(long, default_value = "2000")]
        duration_ms: u64,

        /// Leave out the audio track
        #[arg(long)]
        no_audio: bool,

        /// Leave out the video track
        #[arg(long)]
        no_video: bool,
    },

    /// Walk the tag framing of an FLV file
    Inspect {
        /// Input file path
        input: PathBuf,

        /// Print only the summary line
        #[arg(short, long)]
        summary: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config {
        verbose: cli.verbose,
        debug: cli.debug,
    };
    init(config)?;

    info!("ZVD-FLV v{}", zvd_flv::VERSION);

    match cli.command {
        Commands::Mux {
            output,
            config,
            video_units,
            video_config,
            audio_units,
            audio_config,
            duration_ms,
            no_audio,
            no_video,
        } => {
            let mut options = load_options(config.as_deref())?;
            if no_audio {
                options.audio = None;
            }
            if no_video {
                options.video = None;
            }
            if options.audio.is_none() && options.video.is_none() {
                bail!("nothing to mux: both tracks are disabled");
            }

            let inputs = UnitInputs {
                video_units,
                video_config,
                audio_units,
                audio_config,
            };
            cmd_mux(&output, options, inputs, duration_ms)?;
        }
        Commands::Inspect { input, summary } => {
            cmd_inspect(&input, summary)?;
        }
    }

    Ok(())
}

struct UnitInputs {
    video_units: Option<PathBuf>,
    video_config: Option<PathBuf>,
    audio_units: Option<PathBuf>,
    audio_config: Option<PathBuf>,
}

/// One pre-encoded access unit
struct Unit {
    timestamp: i64,
    key: bool,
    data: Vec<u8>,
}

fn load_options(path: Option<&Path>) -> anyhow::Result<MuxerOptions> {
    match path {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open config {}", path.display()))?;
            let options: MuxerOptions = serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("invalid config {}", path.display()))?;
            Ok(options)
        }
        None => Ok(MuxerOptions::new()
            .with_video(VideoEncoderConfig::default())
            .with_audio(AudioEncoderConfig::default())),
    }
}

fn cmd_mux(
    output: &Path,
    options: MuxerOptions,
    inputs: UnitInputs,
    duration_ms: u64,
) -> anyhow::Result<()> {
    let file = File::create(output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    let mut muxer = FlvMuxer::new(BufWriter::new(file), options.clone());

    let mut video_units = Vec::new();
    let mut audio_units = Vec::new();

    if let Some(config) = options.video.clone() {
        let decoder_config = match &inputs.video_config {
            Some(path) => std::fs::read(path)
                .with_context(|| format!("failed to read {}", path.display()))?,
            None => synthetic_avc_config(),
        };
        video_units = match &inputs.video_units {
            Some(path) => read_units(path)?,
            None => synthetic_video(&config, duration_ms),
        };
        let encoder = PassthroughEncoder::<VideoEncoderConfig, VideoFrame>::new(Some(
            Buffer::from_vec(decoder_config),
        ));
        muxer.configure_video(Box::new(encoder), config)?;
    }

    if let Some(config) = options.audio.clone() {
        let has_asc = FlvAudioCodec::from_codec_string(&config.codec)?.has_packet_type();
        let decoder_config = match &inputs.audio_config {
            Some(path) => Some(
                std::fs::read(path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
            ),
            None if has_asc => Some(audio_specific_config(config.sample_rate, config.channel_count)),
            None => None,
        };
        audio_units = match &inputs.audio_units {
            Some(path) => read_units(path)?,
            None => synthetic_audio(&config, duration_ms),
        };
        let encoder = PassthroughEncoder::<AudioEncoderConfig, AudioFrame>::new(
            decoder_config.map(Buffer::from_vec),
        );
        muxer.configure_audio(Box::new(encoder), config)?;
    }

    muxer.start()?;

    // Feed both tracks in capture order
    let (width, height) = options
        .video
        .as_ref()
        .map(|v| (v.width, v.height))
        .unwrap_or((0, 0));
    let (sample_rate, channels) = options
        .audio
        .as_ref()
        .map(|a| (a.sample_rate, a.channel_count))
        .unwrap_or((0, 0));

    let mut video = video_units.into_iter().peekable();
    let mut audio = audio_units.into_iter().peekable();
    loop {
        let take_video = match (video.peek(), audio.peek()) {
            (Some(v), Some(a)) => v.timestamp <= a.timestamp,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        if take_video {
            if let Some(unit) = video.next() {
                let frame = VideoFrame::new(Buffer::from_vec(unit.data), width, height, unit.timestamp)
                    .with_keyframe(unit.key);
                muxer.push_video_frame(frame)?;
            }
        } else if let Some(unit) = audio.next() {
            let frame = AudioFrame::new(Buffer::from_vec(unit.data), 1024, sample_rate, channels)
                .with_timestamp(unit.timestamp);
            muxer.push_audio_frame(frame)?;
        }
    }

    muxer.stop()?;
    let tags = muxer.tags_written();
    let bytes = muxer.bytes_written();
    muxer.finish()?;
    println!("Wrote {} ({} tags, {} bytes)", output.display(), tags, bytes);
    Ok(())
}

fn read_units(path: &Path) -> anyhow::Result<Vec<Unit>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut units = Vec::new();

    loop {
        let timestamp = match reader.read_i64::<BigEndian>() {
            Ok(ts) => ts,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        };
        let flags = reader.read_u8()?;
        let len = reader.read_u32::<BigEndian>()? as usize;
        let mut data = vec![0u8; len];
        reader
            .read_exact(&mut data)
            .with_context(|| format!("truncated unit in {}", path.display()))?;
        units.push(Unit {
            timestamp,
            key: flags & 0x01 != 0,
            data,
        });
    }

    info!("Read {} units from {}", units.len(), path.display());
    Ok(units)
}

/// Baseline profile AVCDecoderConfigurationRecord with one SPS and PPS
fn synthetic_avc_config() -> Vec<u8> {
    vec![
        0x01, 0x42, 0x00, 0x1F, 0xFF, 0xE1, 0x00, 0x04, 0x67, 0x42, 0x00, 0x1F, 0x01, 0x00,
        0x02, 0x68, 0xCE,
    ]
}

/// AAC-LC AudioSpecificConfig
fn audio_specific_config(sample_rate: u32, channels: u16) -> Vec<u8> {
    const RATES: [u32; 13] = [
        96_000, 88_200, 64_000, 48_000, 44_100, 32_000, 24_000, 22_050, 16_000, 12_000, 11_025,
        8_000, 7_350,
    ];
    let index = RATES
        .iter()
        .position(|&r| r == sample_rate)
        .unwrap_or(4) as u16;
    let config = (2u16 << 11) | (index << 7) | ((channels & 0x0F) << 3);
    config.to_be_bytes().to_vec()
}

fn synthetic_video(config: &VideoEncoderConfig, duration_ms: u64) -> Vec<Unit> {
    let framerate = if config.framerate > 0.0 { config.framerate } else { 30.0 };
    let interval = (1_000_000.0 / framerate) as i64;
    let end = duration_ms as i64 * 1000;
    let mut units = Vec::new();
    let mut ts = 0i64;
    let mut index = 0u32;
    while ts < end {
        let nal_type = if index == 0 { 0x65 } else { 0x41 };
        let mut data = vec![0, 0, 0, 16, nal_type];
        data.extend((0..15).map(|i| (index as u8).wrapping_add(i)));
        units.push(Unit {
            timestamp: ts,
            key: index == 0,
            data,
        });
        index += 1;
        ts += interval;
    }
    units
}

fn synthetic_audio(config: &AudioEncoderConfig, duration_ms: u64) -> Vec<Unit> {
    if config.sample_rate == 0 {
        return Vec::new();
    }
    let end = duration_ms as i64 * 1000;
    let mut units = Vec::new();
    let mut samples = 0i64;
    loop {
        let ts = samples * 1_000_000 / config.sample_rate as i64;
        if ts >= end {
            break;
        }
        units.push(Unit {
            timestamp: ts,
            key: true,
            data: vec![0x21, 0x10, 0x04, 0x60, 0x8C, 0x1C],
        });
        samples += 1024;
    }
    units
}

fn cmd_inspect(input: &Path, summary: bool) -> anyhow::Result<()> {
    let data = std::fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;

    if data.len() < 13 || &data[..3] != b"FLV" {
        bail!("{} is not an FLV file", input.display());
    }
    let flags = data[4];
    let header_size = u32::from_be_bytes([data[5], data[6], data[7], data[8]]) as usize;
    if header_size != FLV_HEADER_SIZE as usize || header_size + 4 > data.len() {
        bail!("bad FLV header size {} in {}", header_size, input.display());
    }
    if !summary {
        println!(
            "FLV v{} video={} audio={} header={} bytes",
            data[3],
            flags & 0x01 != 0,
            flags & 0x04 != 0,
            header_size
        );
    }

    let mut pos = header_size + 4;
    let mut tags = 0usize;
    let mut last_timestamp = 0u32;
    while pos < data.len() {
        if pos + TAG_HEADER_SIZE as usize > data.len() {
            bail!("truncated tag header at offset {}", pos);
        }
        let tag = &data[pos..];
        let kind = tag[0];
        let size = u32::from_be_bytes([0, tag[1], tag[2], tag[3]]) as usize;
        let timestamp = u32::from_be_bytes([tag[7], tag[4], tag[5], tag[6]]);
        let end = pos + TAG_HEADER_SIZE as usize + size;
        if end + 4 > data.len() {
            bail!("truncated tag body at offset {}", pos);
        }
        let back = u32::from_be_bytes([data[end], data[end + 1], data[end + 2], data[end + 3]]);
        if back as usize != TAG_HEADER_SIZE as usize + size {
            bail!(
                "bad back-pointer at offset {}: {} != {}",
                end,
                back,
                TAG_HEADER_SIZE as usize + size
            );
        }
        if timestamp < last_timestamp && kind != FlvTagType::ScriptData as u8 {
            warn!("timestamp regression at tag {}: {} < {}", tags, timestamp, last_timestamp);
        }
        last_timestamp = last_timestamp.max(timestamp);

        if !summary {
            let name = match FlvTagType::from_u8(kind) {
                Some(FlvTagType::Audio) => "audio",
                Some(FlvTagType::Video) => "video",
                Some(FlvTagType::ScriptData) => "script",
                None => "unknown",
            };
            println!("#{:<5} {:<7} size={:<7} ts={}", tags, name, size, timestamp);
        }

        tags += 1;
        pos = end + 4;
    }

    println!("{}: {} tags, {} bytes, framing ok", input.display(), tags, data.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn header(data_offset: u32) -> Vec<u8> {
        let mut bytes = vec![b'F', b'L', b'V', 1, 0x05];
        bytes.extend_from_slice(&data_offset.to_be_bytes());
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes
    }

    #[test]
    fn test_inspect_rejects_bad_data_offset() {
        let dir = tempdir().unwrap();

        let good = dir.path().join("good.flv");
        std::fs::write(&good, header(9)).unwrap();
        assert!(cmd_inspect(&good, true).is_ok());

        let past_end = dir.path().join("past_end.flv");
        std::fs::write(&past_end, header(0x1000)).unwrap();
        assert!(cmd_inspect(&past_end, true).is_err());

        let short = dir.path().join("short.flv");
        std::fs::write(&short, header(5)).unwrap();
        assert!(cmd_inspect(&short, true).is_err());
    }
}
