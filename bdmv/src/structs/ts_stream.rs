//! Stream parameters recovered from the transport stream itself.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::structs::coding::StreamCoding;

/// ISO 639-2 code for streams without a language.
pub const UNDETERMINED_LANGUAGE: &str = "und";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TsStreamInfo {
    pub pid: u16,
    pub stream_type: StreamCoding,
    /// Elementary stream descriptors from the PMT.
    #[serde(skip)]
    pub descriptors: Vec<Descriptor>,
    /// ISO 639 code from the PMT, `und` if absent.
    pub language: String,
    /// Number of successfully parsed codec headers.
    pub seen: u32,
    pub completed: bool,
    pub details: TsStreamDetails,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub tag: u8,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TsStreamDetails {
    Video(TsVideoStreamInfo),
    Audio(TsAudioStreamInfo),
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TsVideoStreamInfo {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u32,
    /// Sample aspect ratio from the VUI or sequence header, 0 if absent.
    pub aspect_ratio: f64,
    pub hdr10: bool,
    pub hdr10_plus: bool,
    pub dolby_vision: bool,
    pub is_3d: bool,
    pub is_enhancement_layer: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TsAudioStreamInfo {
    pub channels: u32,
    pub sample_rate: u32,
    pub is_atmos: bool,
    /// E-AC-3 dependent substream present.
    pub has_dependent_stream: bool,
    /// DTS extension substream present.
    pub has_substream: bool,
    pub is_xll: bool,
    pub is_xllx: bool,
    pub is_xllx_imax: bool,
}

impl TsStreamInfo {
    /// Creates the entry for a PMT elementary stream. Stream kinds without a
    /// header analyzer start out completed.
    pub fn new(pid: u16, stream_type: StreamCoding) -> Self {
        let details = if stream_type.is_video() {
            TsStreamDetails::Video(TsVideoStreamInfo::default())
        } else if stream_type.is_audio() {
            TsStreamDetails::Audio(TsAudioStreamInfo::default())
        } else {
            TsStreamDetails::Other
        };
        let completed = matches!(details, TsStreamDetails::Other);
        Self {
            pid,
            stream_type,
            descriptors: Vec::new(),
            language: UNDETERMINED_LANGUAGE.to_string(),
            seen: 0,
            completed,
            details,
        }
    }

    pub fn video(&self) -> Option<&TsVideoStreamInfo> {
        match &self.details {
            TsStreamDetails::Video(v) => Some(v),
            _ => None,
        }
    }

    pub fn video_mut(&mut self) -> Option<&mut TsVideoStreamInfo> {
        match &mut self.details {
            TsStreamDetails::Video(v) => Some(v),
            _ => None,
        }
    }

    pub fn audio(&self) -> Option<&TsAudioStreamInfo> {
        match &self.details {
            TsStreamDetails::Audio(a) => Some(a),
            _ => None,
        }
    }

    pub fn audio_mut(&mut self) -> Option<&mut TsAudioStreamInfo> {
        match &mut self.details {
            TsStreamDetails::Audio(a) => Some(a),
            _ => None,
        }
    }
}

/// Elementary streams of one clip keyed by PID.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StreamMap {
    pub streams: BTreeMap<u16, TsStreamInfo>,
    /// Dolby Vision enhancement-layer PIDs folded into their base layer.
    pub merged_pids: BTreeSet<u16>,
}

impl StreamMap {
    pub fn get(&self, pid: u16) -> Option<&TsStreamInfo> {
        self.streams.get(&pid)
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// True when every stream reached `completed`.
    pub fn is_complete(&self) -> bool {
        self.streams.values().all(|s| s.completed)
    }

    pub fn video_streams(&self) -> Vec<&TsStreamInfo> {
        self.streams
            .values()
            .filter(|s| s.stream_type.is_video())
            .collect()
    }

    pub fn audio_streams(&self) -> Vec<&TsStreamInfo> {
        self.streams
            .values()
            .filter(|s| s.stream_type.is_audio())
            .collect()
    }

    pub fn subtitle_streams(&self) -> Vec<&TsStreamInfo> {
        self.streams
            .values()
            .filter(|s| s.stream_type.is_subtitle())
            .collect()
    }

    /// Folds a two-layer Dolby Vision pair into its base layer.
    pub(crate) fn merge_dolby_vision_layers(&mut self) {
        let video: Vec<(u16, bool)> = self
            .video_streams()
            .iter()
            .map(|s| (s.pid, s.video().is_some_and(|v| v.dolby_vision)))
            .collect();
        let [(base, _), (enhancement, true)] = video[..] else {
            return;
        };
        if let Some(v) = self.streams.get_mut(&base).and_then(|s| s.video_mut()) {
            v.dolby_vision = true;
        }
        self.streams.remove(&enhancement);
        self.merged_pids.insert(enhancement);
        log::debug!("Merged Dolby Vision enhancement layer PID {enhancement:#06X} into PID {base:#06X}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(pid: u16, dolby_vision: bool) -> TsStreamInfo {
        let mut s = TsStreamInfo::new(pid, StreamCoding::Hevc);
        if let Some(v) = s.video_mut() {
            v.dolby_vision = dolby_vision;
        }
        s
    }

    #[test]
    fn new_streams_classify_by_type() {
        assert!(TsStreamInfo::new(0x1200, StreamCoding::PresentationGraphics).completed);
        assert!(!TsStreamInfo::new(0x1100, StreamCoding::TrueHd).completed);
        assert!(TsStreamInfo::new(0x1100, StreamCoding::TrueHd).audio().is_some());
        assert!(TsStreamInfo::new(0x1011, StreamCoding::Vc1).video().is_some());
    }

    #[test]
    fn dolby_vision_pair_is_merged() {
        let mut map = StreamMap::default();
        map.streams.insert(0x1011, video(0x1011, false));
        map.streams.insert(0x1015, video(0x1015, true));
        map.merge_dolby_vision_layers();
        assert_eq!(map.video_streams().len(), 1);
        assert!(map.get(0x1011).and_then(|s| s.video()).is_some_and(|v| v.dolby_vision));
        assert!(map.merged_pids.contains(&0x1015));
    }

    #[test]
    fn single_layer_is_left_alone() {
        let mut map = StreamMap::default();
        map.streams.insert(0x1011, video(0x1011, false));
        map.streams.insert(0x1012, video(0x1012, false));
        map.merge_dolby_vision_layers();
        assert_eq!(map.video_streams().len(), 2);
        assert!(map.merged_pids.is_empty());
    }
}
