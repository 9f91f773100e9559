//! FLV tag encoder
//!
//! Builds the byte ranges the muxer hands to its sink: the file header, a
//! generic tag envelope, and audio, video and `onMetaData` tags. Each call
//! resets the shared writer and returns a detached snapshot, so the encoder
//! holds no state between calls beyond its scratch buffer.

use super::{
    AudioTagHeader, FlvHeader, FlvTagHeader, FlvTagType, VideoTagHeader, MAX_TAG_DATA_SIZE,
    TAG_HEADER_SIZE,
};
use crate::error::{Error, Result};
use crate::format::amf0::{Amf0Encoder, Amf0Properties};
use bytes::Bytes;

/// Name of the script data event carrying stream metadata
pub const ON_METADATA: &str = "onMetaData";

/// FLV tag encoder
#[derive(Debug, Default)]
pub struct FlvEncoder {
    amf: Amf0Encoder,
}

impl FlvEncoder {
    pub fn new() -> Self {
        FlvEncoder {
            amf: Amf0Encoder::new(),
        }
    }

    /// File header plus the zero `PreviousTagSize0` (13 bytes)
    pub fn header(&mut self, has_video: bool, has_audio: bool) -> Bytes {
        let writer = self.amf.writer_mut();
        writer.reset();
        FlvHeader::new(has_video, has_audio).write_to(writer);
        writer.write_u32(0);
        writer.to_bytes()
    }

    /// Generic tag envelope around a type-specific header and body
    pub fn tag(
        &mut self,
        tag_type: FlvTagType,
        type_header: &[u8],
        timestamp: u32,
        body: &[u8],
    ) -> Result<Bytes> {
        let data_size = type_header.len() + body.len();
        if data_size > MAX_TAG_DATA_SIZE {
            return Err(Error::format(format!(
                "{:?} tag body of {} bytes exceeds 24-bit size field",
                tag_type, data_size
            )));
        }
        let data_size = data_size as u32;

        let writer = self.amf.writer_mut();
        writer.reset();
        FlvTagHeader::new(tag_type, data_size, timestamp).write_to(writer)?;
        writer.write_bytes(type_header);
        writer.write_bytes(body);
        // Back-pointer: size of the tag just written
        writer.write_u32(TAG_HEADER_SIZE + data_size);
        Ok(writer.to_bytes())
    }

    /// Video header bytes followed by the payload
    pub fn video_tag_body(&mut self, header: &VideoTagHeader, payload: &[u8]) -> Bytes {
        let writer = self.amf.writer_mut();
        writer.reset();
        header.write_to(writer);
        writer.write_bytes(payload);
        writer.to_bytes()
    }

    /// Audio header bytes followed by the payload
    pub fn audio_tag_body(&mut self, header: &AudioTagHeader, payload: &[u8]) -> Bytes {
        let writer = self.amf.writer_mut();
        writer.reset();
        header.write_to(writer);
        writer.write_bytes(payload);
        writer.to_bytes()
    }

    /// Complete video tag
    pub fn video_tag(
        &mut self,
        header: &VideoTagHeader,
        timestamp: u32,
        payload: &[u8],
    ) -> Result<Bytes> {
        let type_header = self.video_tag_body(header, &[]);
        self.tag(FlvTagType::Video, &type_header, timestamp, payload)
    }

    /// Complete audio tag
    pub fn audio_tag(
        &mut self,
        header: &AudioTagHeader,
        timestamp: u32,
        payload: &[u8],
    ) -> Result<Bytes> {
        let type_header = self.audio_tag_body(header, &[]);
        self.tag(FlvTagType::Audio, &type_header, timestamp, payload)
    }

    /// Script data tag: `"onMetaData"` followed by an ECMA array
    pub fn metadata_tag(&mut self, metadata: &Amf0Properties) -> Result<Bytes> {
        self.amf.reset();
        self.amf.write_string(ON_METADATA)?;
        self.amf.write_ecma_array(metadata)?;
        let body = self.amf.to_bytes();
        self.tag(FlvTagType::ScriptData, &[], 0, &body)
    }
}
