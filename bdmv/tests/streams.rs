mod common;

use anyhow::{Result, anyhow};
use bdmv::process::cache::ClipCache;
use bdmv::process::disc::stream_path;
use bdmv::process::m2ts::M2tsParser;
use bdmv::process::mpls::read_mpls;
use bdmv::process::reconcile::convert_bluray_playlist_information;
use bdmv::structs::summary::HdrType;
use bdmv::structs::ts_stream::StreamMap;
use bdmv::utils::errors::{BdmvError, FormatError};

use common::*;

const VIDEO_STREAM_ID: u8 = 0xE0;
const PRIVATE_STREAM_1: u8 = 0xBD;

fn uhd_clip() -> Result<Vec<u8>> {
    Ok(M2ts::new(&[
        (0x24, VIDEO_PID, None),
        (0x83, TRUEHD_PID, Some("eng")),
        (0x81, AC3_STEREO_PID, Some("eng")),
        (0x81, AC3_SURROUND_PID, Some("fra")),
        (0x81, AC3_COMMENTARY_PID, Some("spa")),
        (0x90, PG_PID, Some("fra")),
        (0x90, PG_PID + 1, Some("eng")),
        (0x90, PG_PID + 2, Some("spa")),
        (0x90, PG_PID + 3, Some("deu")),
    ])
    .pes(VIDEO_PID, VIDEO_STREAM_ID, &hevc_dolby_vision_access_unit()?)
    .pes(VIDEO_PID, VIDEO_STREAM_ID, &access_unit_delimiter())
    .repeat(TRUEHD_PID, PRIVATE_STREAM_1, &truehd_atmos_major_sync(), 3)
    .repeat(AC3_STEREO_PID, PRIVATE_STREAM_1, &ac3_stereo(), 3)
    .repeat(AC3_SURROUND_PID, PRIVATE_STREAM_1, &ac3_5_1(), 3)
    .repeat(AC3_COMMENTARY_PID, PRIVATE_STREAM_1, &ac3_5_1(), 3)
    .build())
}

fn uhd_clpi() -> Vec<u8> {
    let subtitles: Vec<Vec<u8>> = [(1, "eng"), (2, "spa"), (3, "deu")]
        .iter()
        .map(|&(n, language)| pg_record(PG_PID + n, language))
        .collect();
    let mut records = vec![
        HEVC_RECORD,
        TRUEHD_RECORD,
        AC3_STEREO_RECORD,
        AC3_SURROUND_RECORD,
        AC3_COMMENTARY_RECORD,
        PG_RECORD,
    ];
    records.extend(subtitles.iter().map(Vec::as_slice));
    clpi(&records)
}

fn uhd_disc() -> Result<MemDisc> {
    Ok(MemDisc::new()
        .with_playlist(
            1,
            mpls(
                &[play_item(10, 0, 5000), play_item(55, 0, 120_000)],
                &[(0, 0), (1, 60_000)],
            ),
        )
        .with_clip(10, clpi(&[HEVC_RECORD]), Vec::new())
        .with_clip(55, uhd_clpi(), uhd_clip()?))
}

#[test]
fn analysis_fills_in_stream_details() -> Result<()> {
    let streams = M2tsParser::new().parse(&uhd_clip()?)?;
    assert!(streams.is_complete());
    assert_eq!(streams.len(), 9);
    assert_eq!(streams.subtitle_streams().len(), 4);

    let video = streams
        .get(VIDEO_PID)
        .and_then(|s| s.video())
        .ok_or(anyhow!("no video"))?;
    assert_eq!((video.width, video.height, video.bit_depth), (3840, 2160, 10));
    assert!(video.dolby_vision);

    let truehd = streams
        .get(TRUEHD_PID)
        .and_then(|s| s.audio())
        .ok_or(anyhow!("no TrueHD"))?;
    assert!(truehd.is_atmos);
    assert_eq!((truehd.channels, truehd.sample_rate), (16, 48000));

    let channels: Vec<u32> = [AC3_STEREO_PID, AC3_SURROUND_PID, AC3_COMMENTARY_PID]
        .iter()
        .filter_map(|&pid| streams.get(pid).and_then(|s| s.audio()))
        .map(|a| a.channels)
        .collect();
    assert_eq!(channels, [2, 6, 6]);
    assert_eq!(streams.get(AC3_SURROUND_PID).map(|s| s.language.as_str()), Some("fra"));
    Ok(())
}

#[test]
fn playlist_summary_uses_longest_clip() -> Result<()> {
    let disc = uhd_disc()?;
    let bluray = read_mpls(&disc, 1, &mut ClipCache::new())?;

    let parser = M2tsParser::new();
    let streams = parser.get_streams(&disc, &bluray)?;
    assert_eq!(disc.reads(&stream_path(10, "m2ts")), 0);
    assert_eq!(disc.reads(&stream_path(55, "m2ts")), 1);

    let info = convert_bluray_playlist_information(&bluray, &streams);
    assert_eq!(info.duration, 125_000);
    assert_eq!(info.clips, [10, 55]);
    assert_eq!(info.chapters, [0, 65_000]);

    // Stream lists come from the first clip.
    assert_eq!(info.video_streams.len(), 1);
    assert!(info.audio_streams.is_empty());
    Ok(())
}

#[test]
fn reconciled_uhd_clip() -> Result<()> {
    let disc = MemDisc::new()
        .with_playlist(2, mpls(&[play_item(55, 0, 120_000)], &[(0, 0)]))
        .with_clip(55, uhd_clpi(), uhd_clip()?);
    let bluray = read_mpls(&disc, 2, &mut ClipCache::new())?;
    let streams = M2tsParser::new().get_streams(&disc, &bluray)?;
    let info = convert_bluray_playlist_information(&bluray, &streams);

    let [video] = &info.video_streams[..] else {
        return Err(anyhow!("expected one video stream"));
    };
    assert_eq!(video.codec, "hevc");
    assert_eq!((video.width, video.height, video.bit_depth), (3840, 2160, 10));
    assert_eq!(video.hdr_type, HdrType::DolbyVision);
    assert!((video.aspect - 16.0 / 9.0).abs() < 1e-9);
    assert!(!video.is_3d);

    let audio: Vec<(&str, u32, u32, &str)> = info
        .audio_streams
        .iter()
        .map(|a| (a.codec.as_str(), a.channels, a.sample_rate, a.language.as_str()))
        .collect();
    assert_eq!(
        audio,
        [
            ("truehd_atmos", 16, 48000, "eng"),
            ("ac3", 2, 48000, "eng"),
            ("ac3", 6, 48000, "fra"),
            ("ac3", 6, 48000, "spa"),
        ]
    );

    let subtitles: Vec<(&str, &str)> = info
        .pg_streams
        .iter()
        .map(|s| (s.codec.as_str(), s.language.as_str()))
        .collect();
    assert_eq!(
        subtitles,
        [
            ("pgssub", "fra"),
            ("pgssub", "eng"),
            ("pgssub", "spa"),
            ("pgssub", "deu"),
        ]
    );
    Ok(())
}

#[test]
fn dolby_vision_layers_are_merged() -> Result<()> {
    let clip = M2ts::new(&[(0x24, VIDEO_PID, None), (0x24, DV_ENHANCEMENT_PID, None)])
    .pes(VIDEO_PID, VIDEO_STREAM_ID, &nal([0x42, 0x01], &hevc_sps_2160p()?))
    .pes(VIDEO_PID, VIDEO_STREAM_ID, &access_unit_delimiter())
    .pes(DV_ENHANCEMENT_PID, VIDEO_STREAM_ID, &nal([0x7C, 0x01], &[0x08, 0x09]))
    .pes(DV_ENHANCEMENT_PID, VIDEO_STREAM_ID, &access_unit_delimiter())
    .build();

    let streams = M2tsParser::new().parse(&clip)?;
    assert_eq!(streams.video_streams().len(), 1);
    assert!(streams.get(DV_ENHANCEMENT_PID).is_none());
    assert!(streams.merged_pids.contains(&DV_ENHANCEMENT_PID));
    let base = streams
        .get(VIDEO_PID)
        .and_then(|s| s.video())
        .ok_or(anyhow!("no base layer"))?;
    assert!(base.dolby_vision);

    let enhancement_record: &[u8] = &[0x10, 0x15, 5, 0x24, 0x81, 0x31, 0x12, 0x00];
    let disc = MemDisc::new()
        .with_playlist(3, mpls(&[play_item(7, 0, 1000)], &[]))
        .with_clip(7, clpi(&[HEVC_RECORD, enhancement_record]), clip);
    let bluray = read_mpls(&disc, 3, &mut ClipCache::new())?;
    let info = convert_bluray_playlist_information(&bluray, &streams);
    assert_eq!(info.video_streams.len(), 1);
    assert_eq!(info.video_streams[0].pid, VIDEO_PID);
    assert_eq!(info.video_streams[0].hdr_type, HdrType::DolbyVision);
    Ok(())
}

#[test]
fn declared_attributes_without_analysis() -> Result<()> {
    let disc = MemDisc::new()
        .with_playlist(4, mpls(&[play_item(55, 0, 1000)], &[]))
        .with_clip(55, clpi(&[HEVC_RECORD, TRUEHD_RECORD, PG_RECORD]), Vec::new());
    let bluray = read_mpls(&disc, 4, &mut ClipCache::new())?;
    let info = convert_bluray_playlist_information(&bluray, &StreamMap::default());

    let video = &info.video_streams[0];
    assert_eq!((video.width, video.height), (3840, 2160));
    assert_eq!(video.bit_depth, 10);
    assert_eq!(video.hdr_type, HdrType::Hdr10);

    let audio = &info.audio_streams[0];
    assert_eq!(audio.codec, "truehd");
    assert_eq!(audio.channels, 0);
    assert_eq!(audio.sample_rate, 48000);
    assert_eq!(audio.language, "eng");
    assert_eq!(info.pg_streams.len(), 1);
    Ok(())
}

#[test]
fn empty_stream_file_is_an_error() -> Result<()> {
    let disc = MemDisc::new()
        .with_playlist(4, mpls(&[play_item(55, 0, 1000)], &[]))
        .with_clip(55, clpi(&[HEVC_RECORD]), Vec::new());
    let bluray = read_mpls(&disc, 4, &mut ClipCache::new())?;
    let result = M2tsParser::new().get_streams(&disc, &bluray);
    assert!(matches!(
        result,
        Err(BdmvError::Format(FormatError::EmptyStreamFile(_)))
    ));
    Ok(())
}
