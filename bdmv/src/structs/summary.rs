//! Reconciled per-playlist description handed to players and UIs.

use std::collections::BTreeMap;
use std::fmt::Display;

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum HdrType {
    #[default]
    None,
    Hdr10,
    Hdr10Plus,
    DolbyVision,
}

impl Display for HdrType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HdrType::None => "SDR",
            HdrType::Hdr10 => "HDR10",
            HdrType::Hdr10Plus => "HDR10+",
            HdrType::DolbyVision => "Dolby Vision",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VideoStreamInfo {
    pub valid: bool,
    pub pid: u16,
    pub codec: String,
    pub width: u32,
    pub height: u32,
    /// Display aspect ratio, 0 if unknown.
    pub aspect: f64,
    pub bit_depth: u32,
    pub hdr_type: HdrType,
    pub is_3d: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AudioStreamInfo {
    pub valid: bool,
    pub pid: u16,
    pub codec: String,
    /// 0 when only the declared class is known.
    pub channels: u32,
    pub sample_rate: u32,
    pub language: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubtitleStreamInfo {
    pub valid: bool,
    pub pid: u16,
    pub codec: String,
    pub language: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlaylistInformation {
    pub playlist: u32,
    /// ms
    pub duration: u64,
    pub clips: Vec<u32>,
    /// Total play time of each clip id (ms).
    pub clip_duration: BTreeMap<u32, u64>,
    /// Chapter start times (ms).
    pub chapters: Vec<u64>,
    pub video_streams: Vec<VideoStreamInfo>,
    pub audio_streams: Vec<AudioStreamInfo>,
    pub pg_streams: Vec<SubtitleStreamInfo>,
}
