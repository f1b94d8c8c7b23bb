use serde::Serialize;

use crate::structs::coding::{
    AspectRatio, AudioFormat, CharacterCode, ColorSpace, DynamicRange, FrameRate, SampleRate,
    StreamCoding, VideoFormat,
};

/// One `.clpi` file, plus the timing its owning PlayItem assigns to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClipInformation {
    /// Numeric clip id, also the file name stem.
    pub clip: u32,
    /// `"M2TS"` or `"FMTS"`, selects the stream file extension.
    pub codec: String,
    pub version: String,
    /// Start of this clip on the playlist timeline in ms.
    pub time: u64,
    /// Length of the owning PlayItem in ms.
    pub duration: u64,
    pub programs: Vec<ProgramInformation>,
}

impl ClipInformation {
    /// Streams of the first program, in declaration order.
    pub fn streams(&self) -> &[StreamInformation] {
        self.programs
            .first()
            .map(|p| p.streams.as_slice())
            .unwrap_or_default()
    }

    pub fn stream_file_extension(&self) -> String {
        self.codec.to_lowercase()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgramInformation {
    pub spn_program_sequence_start: u32,
    pub program_id: u16,
    pub streams: Vec<StreamInformation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamInformation {
    pub coding: StreamCoding,
    pub packet_identifier: u16,
    /// Set for streams carried in a SubPath clip.
    pub subpath_id: Option<u8>,
    pub subclip_id: Option<u8>,
    pub attributes: StreamAttributes,
}

impl StreamInformation {
    pub fn language(&self) -> Option<&str> {
        match &self.attributes {
            StreamAttributes::Audio(a) => Some(&a.language),
            StreamAttributes::Graphics { language } | StreamAttributes::Text { language, .. } => {
                Some(language)
            }
            _ => None,
        }
    }

    pub fn video(&self) -> Option<&VideoAttributes> {
        match &self.attributes {
            StreamAttributes::Video(v) => Some(v),
            _ => None,
        }
    }

    pub fn audio(&self) -> Option<&AudioAttributes> {
        match &self.attributes {
            StreamAttributes::Audio(a) => Some(a),
            _ => None,
        }
    }
}

/// Coding-specific part of a declared stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamAttributes {
    Video(VideoAttributes),
    Audio(AudioAttributes),
    Graphics {
        language: String,
    },
    Text {
        character_code: CharacterCode,
        language: String,
    },
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VideoAttributes {
    pub format: VideoFormat,
    pub rate: FrameRate,
    /// Only declared in CLPI.
    pub aspect: Option<AspectRatio>,
    pub oc_flag: bool,
    pub dynamic_range: DynamicRange,
    pub color_space: ColorSpace,
    pub cr_flag: bool,
    pub hdr_plus: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AudioAttributes {
    pub format: AudioFormat,
    pub rate: SampleRate,
    pub language: String,
}
