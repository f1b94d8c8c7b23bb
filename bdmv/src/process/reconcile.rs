//! Merges declared MPLS/CLPI stream metadata with what the transport
//! stream analysis found.

use std::collections::BTreeMap;

use log::debug;

use crate::structs::clip::{StreamAttributes, StreamInformation};
use crate::structs::coding::{AspectRatio, DynamicRange, StreamCoding};
use crate::structs::playlist::BlurayPlaylistInformation;
use crate::structs::summary::{
    AudioStreamInfo, HdrType, PlaylistInformation, SubtitleStreamInfo, VideoStreamInfo,
};
use crate::structs::ts_stream::{
    StreamMap, TsAudioStreamInfo, TsStreamInfo, TsVideoStreamInfo, UNDETERMINED_LANGUAGE,
};

/// Builds the summary of one playlist.
///
/// Streams are taken from the first clip in declaration order. Values found
/// in `streams` win over the declared classes; streams missing from it keep
/// the coarse declared values, so an empty map is fine.
pub fn convert_bluray_playlist_information(
    bluray: &BlurayPlaylistInformation,
    streams: &StreamMap,
) -> PlaylistInformation {
    let mut clip_duration = BTreeMap::new();
    for clip in &bluray.clips {
        *clip_duration.entry(clip.clip).or_insert(0) += clip.duration;
    }

    let mut info = PlaylistInformation {
        playlist: bluray.playlist,
        duration: bluray.duration,
        clips: bluray.clips.iter().map(|c| c.clip).collect(),
        clip_duration,
        chapters: bluray.chapters.iter().map(|c| c.start).collect(),
        ..Default::default()
    };

    let declared = bluray.clips.first().map(|c| c.streams()).unwrap_or_default();
    for stream in declared {
        let pid = stream.packet_identifier;
        if streams.merged_pids.contains(&pid) {
            continue;
        }
        let found = streams.get(pid);
        if found.is_none() {
            debug!(
                "Playlist {:05}: PID {pid:#06X} not found in stream, using declared attributes",
                bluray.playlist
            );
        }

        let coding = stream.coding;
        if coding.is_video() {
            info.video_streams
                .push(video_stream(stream, found.and_then(|s| s.video())));
        } else if coding.is_audio() {
            info.audio_streams.push(audio_stream(stream, found));
        } else if coding.is_subtitle() {
            info.pg_streams.push(SubtitleStreamInfo {
                valid: true,
                pid,
                codec: "pgssub".into(),
                language: language(stream, found),
            });
        }
    }

    info
}

fn language(declared: &StreamInformation, found: Option<&TsStreamInfo>) -> String {
    match declared.language() {
        Some(language) if !language.is_empty() => language.to_string(),
        _ => found.map_or_else(|| UNDETERMINED_LANGUAGE.to_string(), |s| s.language.clone()),
    }
}

fn video_codec(coding: StreamCoding) -> &'static str {
    match coding {
        StreamCoding::Hevc => "hevc",
        StreamCoding::H264 | StreamCoding::H264Mvc => "h264",
        StreamCoding::Vc1 => "vc1",
        StreamCoding::Mpeg1Video => "mpeg1video",
        _ => "mpeg2video",
    }
}

fn hdr_type(
    declared: DynamicRange,
    hdr_plus: bool,
    found: Option<&TsVideoStreamInfo>,
) -> HdrType {
    if let Some(video) = found {
        if video.dolby_vision {
            return HdrType::DolbyVision;
        }
        if video.hdr10_plus {
            return HdrType::Hdr10Plus;
        }
        if video.hdr10 {
            return HdrType::Hdr10;
        }
    }
    match declared {
        DynamicRange::DolbyVision => HdrType::DolbyVision,
        DynamicRange::Hdr10Plus => HdrType::Hdr10Plus,
        DynamicRange::Hdr10 if hdr_plus => HdrType::Hdr10Plus,
        DynamicRange::Hdr10 => HdrType::Hdr10,
        _ => HdrType::None,
    }
}

fn video_stream(
    declared: &StreamInformation,
    found: Option<&TsVideoStreamInfo>,
) -> VideoStreamInfo {
    let attributes = declared.video().cloned().unwrap_or_default();
    let (mut width, mut height) = attributes.format.dimensions();
    let mut bit_depth = match attributes.dynamic_range {
        DynamicRange::Sdr => 8,
        _ => 10,
    };
    let mut sample_aspect = 0.0;

    if let Some(video) = found.filter(|v| v.width > 0 && v.height > 0) {
        width = video.width;
        height = video.height;
        bit_depth = video.bit_depth;
        sample_aspect = video.aspect_ratio;
    }

    let aspect = match attributes.aspect {
        Some(AspectRatio::Standard) => 4.0 / 3.0,
        Some(AspectRatio::Widescreen) => 16.0 / 9.0,
        _ if height == 0 => 0.0,
        _ if sample_aspect > 0.0 => width as f64 * sample_aspect / height as f64,
        _ => width as f64 / height as f64,
    };

    VideoStreamInfo {
        valid: true,
        pid: declared.packet_identifier,
        codec: video_codec(declared.coding).into(),
        width,
        height,
        aspect,
        bit_depth,
        hdr_type: hdr_type(attributes.dynamic_range, attributes.hdr_plus, found),
        is_3d: declared.coding == StreamCoding::H264Mvc || found.is_some_and(|v| v.is_3d),
    }
}

fn audio_codec(coding: StreamCoding, found: Option<&TsAudioStreamInfo>) -> &'static str {
    let atmos = found.is_some_and(|a| a.is_atmos);
    match coding {
        StreamCoding::Lpcm => "pcm",
        StreamCoding::Ac3 => "ac3",
        StreamCoding::Eac3 | StreamCoding::Eac3Secondary if atmos => "eac3_ddp_atmos",
        StreamCoding::Eac3 | StreamCoding::Eac3Secondary => "eac3",
        StreamCoding::TrueHd if atmos => "truehd_atmos",
        StreamCoding::TrueHd => "truehd",
        StreamCoding::Dts
        | StreamCoding::DtsHd
        | StreamCoding::DtsHdMaster
        | StreamCoding::DtsHdSecondary => match found {
            Some(a) if a.is_xllx_imax => "dtshd_ma_x_imax",
            Some(a) if a.is_xllx => "dtshd_ma_x",
            Some(a) if a.is_xll => "dtshd_ma",
            _ if coding == StreamCoding::DtsHdMaster => "dtshd_ma",
            Some(a) if a.has_substream => "dtshd_hra",
            _ if coding == StreamCoding::Dts => "dca",
            _ => "dtshd_hra",
        },
        StreamCoding::Mpeg1Audio => "mp1",
        _ => "mp2",
    }
}

fn audio_stream(declared: &StreamInformation, found: Option<&TsStreamInfo>) -> AudioStreamInfo {
    let analysed = found.and_then(|s| s.audio());
    let declared_rate = match &declared.attributes {
        StreamAttributes::Audio(a) => a.rate.hz(),
        _ => 0,
    };

    AudioStreamInfo {
        valid: true,
        pid: declared.packet_identifier,
        codec: audio_codec(declared.coding, analysed).into(),
        channels: analysed.map_or(0, |a| a.channels),
        sample_rate: analysed
            .map(|a| a.sample_rate)
            .filter(|&rate| rate > 0)
            .unwrap_or(declared_rate),
        language: language(declared, found),
    }
}
