//! `onMetaData` construction

use super::{FlvAudioCodec, FlvVideoCodec};
use super::muxer::MuxerOptions;
use crate::format::amf0::{Amf0Properties, Amf0Value};

/// Metadata map for the session described by `options`
///
/// Duration is written as 0: the file is produced live and never rewritten.
/// Data rates are in kbit/s.
pub fn build_metadata(options: &MuxerOptions) -> Amf0Properties {
    let mut meta: Amf0Properties = vec![
        ("duration".to_string(), Amf0Value::Number(0.0)),
        (
            "encoder".to_string(),
            Amf0Value::String(options.encoder_name.clone()),
        ),
    ];

    if let Some(video) = &options.video {
        let codec_id = FlvVideoCodec::from_codec_string(&video.codec)
            .map(|c| c as u8)
            .unwrap_or(FlvVideoCodec::AVC as u8);
        meta.push(("width".to_string(), Amf0Value::from(video.width)));
        meta.push(("height".to_string(), Amf0Value::from(video.height)));
        meta.push(("framerate".to_string(), Amf0Value::Number(video.framerate)));
        meta.push(("videocodecid".to_string(), Amf0Value::Number(codec_id as f64)));
        meta.push((
            "videodatarate".to_string(),
            Amf0Value::Number(video.bitrate as f64 / 1000.0),
        ));
    }

    if let Some(audio) = &options.audio {
        let codec_id = FlvAudioCodec::from_codec_string(&audio.codec)
            .map(|c| c as u8)
            .unwrap_or(FlvAudioCodec::AAC as u8);
        meta.push(("audiocodecid".to_string(), Amf0Value::Number(codec_id as f64)));
        meta.push((
            "audiosamplerate".to_string(),
            Amf0Value::from(audio.sample_rate),
        ));
        meta.push(("stereo".to_string(), Amf0Value::Boolean(audio.channel_count > 1)));
        meta.push((
            "audiodatarate".to_string(),
            Amf0Value::Number(audio.bitrate as f64 / 1000.0),
        ));
    }

    meta
}
