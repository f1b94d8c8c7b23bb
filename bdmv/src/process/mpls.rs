//! Movie playlist (`.mpls`) parsing and timeline derivation.
//!
//! Parsing happens in three steps:
//!
//! 1. [`parse_mpls`] decodes the file structure. Clips are only referenced
//!    by id and codec at this point.
//! 2. Every referenced clip is resolved through the [`ClipCache`], reading
//!    its `.clpi` on a miss.
//! 3. [`derive_chapters_and_timings`] lays the clips out on the playlist
//!    timeline and turns ENTRY marks into chapters.

use log::{debug, trace};
use nom::bytes::complete::take;
use nom::combinator::map;
use nom::multi::{count, length_data, length_value};
use nom::number::complete::{be_u8, be_u16, be_u32, be_u64};
use nom::sequence::{terminated, tuple};

use crate::process::cache::ClipCache;
use crate::process::clpi::{AttributeLayout, read_clpi, stream_attributes};
use crate::process::disc::{DiscReader, playlist_path};
use crate::structs::clip::{ClipInformation, StreamInformation};
use crate::structs::playlist::{
    BlurayPlaylistInformation, ChapterInformation, ConnectionCondition, MarkType, PlaybackType,
    PlayItemInformation, PlaylistMarkInformation, SecondaryAudioStream, SecondaryVideoStream,
    StillMode, StreamNumberTable, SubPathType, SubPlayItemInformation,
};
use crate::utils::bytes::{get_dword, get_string};
use crate::utils::errors::{BdmvError, FormatError, NomResult, RangeError, fail, finish};

pub const MPLS_HEADER_SIZE: usize = 40;
pub const MPLS_VERSIONS: [&str; 3] = ["0100", "0200", "0300"];

/// Ticks per millisecond of the 45 kHz playlist clock.
const CLOCK_TICKS_PER_MS: u64 = 45;

/// Extension data entry holding additional SubPaths (3D, Dolby Vision).
const EXT_SUB_PATH_ID1: u16 = 2;
const EXT_SUB_PATH_ID2: u16 = 2;

fn latin1(s: &[u8]) -> String {
    s.iter().map(|&b| b as char).collect()
}

fn clock_ms(ticks: u32) -> u64 {
    ticks as u64 / CLOCK_TICKS_PER_MS
}

/// `clip_Information_file_name` and `clip_codec_identifier`.
fn clip_reference(input: &[u8]) -> NomResult<'_, ClipInformation> {
    let (input, (name, codec)) = tuple((take(5usize), take(4usize)))(input)?;
    let name = latin1(name);
    let clip = if name.bytes().all(|b| b.is_ascii_digit()) {
        name.parse().ok()
    } else {
        None
    };
    let Some(clip) = clip else {
        return fail(FormatError::InvalidClipName(name));
    };
    let codec = latin1(codec);
    if codec != "M2TS" && codec != "FMTS" {
        return fail(FormatError::InvalidCodecId(codec));
    }
    Ok((
        input,
        ClipInformation {
            clip,
            codec,
            ..Default::default()
        },
    ))
}

/// Clip reference followed by its `ref_to_STC_id`.
fn clip_reference_with_stc(input: &[u8]) -> NomResult<'_, ClipInformation> {
    terminated(clip_reference, be_u8)(input)
}

fn stream_entry(input: &[u8]) -> NomResult<'_, (u16, Option<u8>, Option<u8>)> {
    let (rest, entry) = length_data(be_u8)(input)?;
    let (entry, stream_type) = be_u8(entry)?;
    let (_, routing) = match stream_type {
        1 => map(be_u16, |pid| (pid, None, None))(entry)?,
        2 => map(tuple((be_u8, be_u8, be_u16)), |(path, clip, pid)| {
            (pid, Some(path), Some(clip))
        })(entry)?,
        3 | 4 => map(tuple((be_u8, be_u16)), |(path, pid)| (pid, Some(path), None))(entry)?,
        other => return fail(FormatError::InvalidStreamEntryType(other)),
    };
    Ok((rest, routing))
}

fn stream(input: &[u8]) -> NomResult<'_, StreamInformation> {
    let (input, (packet_identifier, subpath_id, subclip_id)) = stream_entry(input)?;
    let (input, (coding, attributes)) = stream_attributes(input, AttributeLayout::Playlist)?;
    Ok((
        input,
        StreamInformation {
            coding,
            packet_identifier,
            subpath_id,
            subclip_id,
            attributes,
        },
    ))
}

/// Reference list padded to an even number of entries.
fn ref_list(input: &[u8]) -> NomResult<'_, Vec<u8>> {
    let (input, (num_refs, _)) = tuple((be_u8, be_u8))(input)?;
    let (input, refs) = count(be_u8, num_refs as usize)(input)?;
    let (input, _) = take(num_refs as usize % 2)(input)?;
    Ok((input, refs))
}

fn secondary_audio_stream(input: &[u8]) -> NomResult<'_, SecondaryAudioStream> {
    map(tuple((stream, ref_list)), |(stream, primary_audio_refs)| {
        SecondaryAudioStream {
            stream,
            primary_audio_refs,
        }
    })(input)
}

fn secondary_video_stream(input: &[u8]) -> NomResult<'_, SecondaryVideoStream> {
    map(
        tuple((stream, ref_list, ref_list)),
        |(stream, secondary_audio_refs, pip_pg_refs)| SecondaryVideoStream {
            stream,
            secondary_audio_refs,
            pip_pg_refs,
        },
    )(input)
}

fn stream_number_table(input: &[u8]) -> NomResult<'_, StreamNumberTable> {
    fn parser(input: &[u8]) -> NomResult<'_, StreamNumberTable> {
        let (input, (_, video, audio, pg, ig, secondary_audio, secondary_video, pip_pg, dv, _)) =
            tuple((
                take(2usize),
                be_u8,
                be_u8,
                be_u8,
                be_u8,
                be_u8,
                be_u8,
                be_u8,
                be_u8,
                take(4usize),
            ))(input)?;

        let (input, video) = count(stream, video as usize)(input)?;
        let (input, audio) = count(stream, audio as usize)(input)?;
        let (input, mut presentation_graphics) =
            count(stream, pg as usize + pip_pg as usize)(input)?;
        let pip_presentation_graphics = presentation_graphics.split_off(pg as usize);
        let (input, interactive_graphics) = count(stream, ig as usize)(input)?;
        let (input, secondary_audio) =
            count(secondary_audio_stream, secondary_audio as usize)(input)?;
        let (input, secondary_video) =
            count(secondary_video_stream, secondary_video as usize)(input)?;
        let (input, dolby_vision) = count(stream, dv as usize)(input)?;

        Ok((
            input,
            StreamNumberTable {
                video,
                audio,
                presentation_graphics,
                pip_presentation_graphics,
                interactive_graphics,
                secondary_audio,
                secondary_video,
                dolby_vision,
            },
        ))
    }

    length_value(be_u16, parser)(input)
}

fn play_item(input: &[u8]) -> NomResult<'_, PlayItemInformation> {
    fn angles(input: &[u8]) -> NomResult<'_, (bool, bool, Vec<ClipInformation>)> {
        let (input, (num_angles, flags)) = tuple((be_u8, be_u8))(input)?;
        // the primary clip counts as the first angle
        let (input, clips) =
            count(clip_reference_with_stc, num_angles.saturating_sub(1) as usize)(input)?;
        Ok((input, (flags & 0x02 != 0, flags & 0x01 != 0, clips)))
    }

    fn parser(input: &[u8]) -> NomResult<'_, PlayItemInformation> {
        let (input, (primary, flags, _stc, in_ticks, out_ticks, user_option_mask)) =
            tuple((clip_reference, be_u16, be_u8, be_u32, be_u32, be_u64))(input)?;
        let (input, (random_access, still_mode, still_time)) =
            tuple((be_u8, be_u8, be_u16))(input)?;

        let is_multi_angle = flags & 0x10 != 0;
        let connection_condition = match ConnectionCondition::try_from((flags & 0x0F) as u8) {
            Ok(cc) => cc,
            Err(e) => return fail(e),
        };

        let (input, (is_different_audios, is_seamless_angle_change, extra_angles)) =
            if is_multi_angle {
                angles(input)?
            } else {
                (input, (false, false, Vec::new()))
            };
        let (input, stn) = stream_number_table(input)?;

        let mut angle_clips = Vec::with_capacity(1 + extra_angles.len());
        angle_clips.push(primary);
        angle_clips.extend(extra_angles);

        Ok((
            input,
            PlayItemInformation {
                angle_clips,
                in_time: clock_ms(in_ticks),
                out_time: clock_ms(out_ticks),
                connection_condition,
                is_multi_angle,
                is_different_audios,
                is_seamless_angle_change,
                user_option_mask,
                random_access_flag: random_access & 0x80 != 0,
                still_mode: StillMode::from(still_mode),
                still_time,
                stn,
            },
        ))
    }

    length_value(be_u16, parser)(input)
}

fn sub_play_item(input: &[u8]) -> NomResult<'_, SubPlayItemInformation> {
    fn parser(input: &[u8]) -> NomResult<'_, SubPlayItemInformation> {
        let (input, (primary, flags, _stc, in_ticks, out_ticks)) =
            tuple((clip_reference, be_u32, be_u8, be_u32, be_u32))(input)?;
        let (input, (sync_play_item_id, sync_start_pts)) = tuple((be_u16, be_u32))(input)?;

        let mut clips = vec![primary];
        let input = if flags & 0x01 != 0 {
            let (input, (clip_count, _)) = tuple((be_u8, be_u8))(input)?;
            let (input, extra) =
                count(clip_reference_with_stc, clip_count.saturating_sub(1) as usize)(input)?;
            clips.extend(extra);
            input
        } else {
            input
        };

        Ok((
            input,
            SubPlayItemInformation {
                sub_path_id: 0,
                sub_path_type: SubPathType::default(),
                is_repeat: false,
                clips,
                connection_condition: ((flags >> 1) & 0x0F) as u8,
                in_time: clock_ms(in_ticks),
                out_time: clock_ms(out_ticks),
                sync_play_item_id,
                sync_start_pts,
            },
        ))
    }

    length_value(be_u16, parser)(input)
}

/// One SubPath, flattened into its items.
fn sub_path(input: &[u8]) -> NomResult<'_, Vec<SubPlayItemInformation>> {
    fn parser(input: &[u8]) -> NomResult<'_, Vec<SubPlayItemInformation>> {
        let (input, (_, sub_path_type, flags, _, num_items)) =
            tuple((be_u8, be_u8, be_u16, be_u8, be_u8))(input)?;
        let (input, mut items) = count(sub_play_item, num_items as usize)(input)?;
        for item in &mut items {
            item.sub_path_type = SubPathType::from(sub_path_type);
            item.is_repeat = flags & 0x01 != 0;
        }
        Ok((input, items))
    }

    length_value(be_u32, parser)(input)
}

fn sub_paths(input: &[u8], num_sub_paths: usize) -> NomResult<'_, Vec<SubPlayItemInformation>> {
    let (input, paths) = count(sub_path, num_sub_paths)(input)?;
    let items = paths
        .into_iter()
        .enumerate()
        .flat_map(|(id, items)| {
            items.into_iter().map(move |mut item| {
                item.sub_path_id = id;
                item
            })
        })
        .collect();
    Ok((input, items))
}

type PlayList = (Vec<PlayItemInformation>, Vec<SubPlayItemInformation>);

fn play_list(input: &[u8]) -> NomResult<'_, PlayList> {
    fn parser(input: &[u8]) -> NomResult<'_, PlayList> {
        let (input, (_, num_play_items, num_sub_paths)) =
            tuple((be_u16, be_u16, be_u16))(input)?;
        let (input, play_items) = count(play_item, num_play_items as usize)(input)?;
        let (input, sub_play_items) = sub_paths(input, num_sub_paths as usize)?;
        Ok((input, (play_items, sub_play_items)))
    }

    length_value(be_u32, parser)(input)
}

fn app_info(input: &[u8]) -> NomResult<'_, (PlaybackType, u16)> {
    fn parser(input: &[u8]) -> NomResult<'_, (PlaybackType, u16)> {
        let (input, (_, playback_type, playback_count, _uo_mask, _flags)) =
            tuple((be_u8, map(be_u8, PlaybackType::from), be_u16, be_u64, be_u16))(input)?;
        let playback_count = match playback_type {
            PlaybackType::Random | PlaybackType::Shuffle => playback_count,
            _ => 0,
        };
        Ok((input, (playback_type, playback_count)))
    }

    length_value(be_u32, parser)(input)
}

fn play_list_marks(input: &[u8]) -> NomResult<'_, Vec<PlaylistMarkInformation>> {
    fn mark(input: &[u8]) -> NomResult<'_, PlaylistMarkInformation> {
        map(
            tuple((be_u8, be_u8, be_u16, be_u32, be_u16, be_u32)),
            |(_, mark_type, play_item_reference, time, entry_es_pid, duration)| {
                PlaylistMarkInformation {
                    mark_type: MarkType::from(mark_type),
                    play_item_reference,
                    raw_time: clock_ms(time),
                    time: 0,
                    entry_es_pid,
                    duration: clock_ms(duration),
                }
            },
        )(input)
    }

    fn parser(input: &[u8]) -> NomResult<'_, Vec<PlaylistMarkInformation>> {
        let (input, num_marks) = be_u16(input)?;
        count(mark, num_marks as usize)(input)
    }

    length_value(be_u32, parser)(input)
}

/// SubPaths stored in the extension data block. Entry offsets are relative
/// to the start of the block.
fn extension_sub_paths(block: &[u8]) -> NomResult<'_, Vec<SubPlayItemInformation>> {
    let (_, length) = be_u32(block)?;
    if length == 0 {
        return Ok((block, Vec::new()));
    }

    let (rest, (_, _data_start, _, num_entries)) =
        tuple((be_u32, be_u32, take(3usize), be_u8))(block)?;
    let (rest, entries) =
        count(tuple((be_u16, be_u16, be_u32, be_u32)), num_entries as usize)(rest)?;

    let mut items = Vec::new();
    for (id1, id2, start, len) in entries {
        if id1 != EXT_SUB_PATH_ID1 || id2 != EXT_SUB_PATH_ID2 {
            trace!("Skipping extension data entry {id1}/{id2}");
            continue;
        }
        let (_, data) = take(len as usize)(block.get(start as usize..).unwrap_or_default())?;
        let (_, container) = length_data(be_u32)(data)?;
        let (container, num_sub_paths) = be_u16(container)?;
        let (_, sub_play_items) = sub_paths(container, num_sub_paths as usize)?;
        items.extend(sub_play_items);
    }

    Ok((rest, items))
}

fn block_at<'a>(buf: &'a [u8], offset: usize) -> Result<&'a [u8], RangeError> {
    buf.get(offset..).ok_or(RangeError::Bytes {
        offset,
        width: 4,
        len: buf.len(),
    })
}

/// Parses a whole `.mpls` file held in memory.
///
/// Clips are left unresolved: each carries only its id and codec. The
/// timeline is derived from the PlayItems alone.
pub fn parse_mpls(playlist: u32, buf: &[u8]) -> Result<BlurayPlaylistInformation, BdmvError> {
    if buf.len() < MPLS_HEADER_SIZE {
        return Err(FormatError::TooShort {
            len: buf.len(),
            min: MPLS_HEADER_SIZE,
        }
        .into());
    }

    let magic = get_string(buf, 0, 4)?;
    if magic != "MPLS" {
        return Err(FormatError::InvalidMagic {
            kind: "MPLS",
            found: magic,
        }
        .into());
    }
    let version = get_string(buf, 4, 4)?;
    if !MPLS_VERSIONS.contains(&version.as_str()) {
        return Err(FormatError::UnsupportedVersion {
            kind: "MPLS",
            version,
        }
        .into());
    }

    let play_list_start = get_dword(buf, 8)? as usize;
    let marks_start = get_dword(buf, 12)? as usize;
    let extension_start = get_dword(buf, 16)? as usize;

    let (playback_type, playback_count) =
        finish(app_info(block_at(buf, MPLS_HEADER_SIZE)?))?;
    let (play_items, sub_play_items) = finish(play_list(block_at(buf, play_list_start)?))?;
    if play_items.is_empty() {
        return Err(FormatError::NoPlayItems.into());
    }
    for (index, item) in play_items.iter().enumerate() {
        if item.out_time <= item.in_time {
            return Err(FormatError::InvalidPlayItemTimes {
                index,
                in_time: item.in_time,
                out_time: item.out_time,
            }
            .into());
        }
    }

    let playlist_marks = finish(play_list_marks(block_at(buf, marks_start)?))?;
    for (index, mark) in playlist_marks.iter().enumerate() {
        if mark.play_item_reference as usize >= play_items.len() {
            return Err(FormatError::InvalidPlayItemReference {
                index,
                reference: mark.play_item_reference as usize,
                count: play_items.len(),
            }
            .into());
        }
    }

    let extension_sub_play_items = match extension_start {
        0 => Vec::new(),
        start => finish(extension_sub_paths(block_at(buf, start)?))?,
    };

    let mut info = BlurayPlaylistInformation {
        playlist,
        version,
        duration: 0,
        playback_type,
        playback_count,
        clips: play_items
            .iter()
            .map(|p| p.primary_clip().cloned().unwrap_or_default())
            .collect(),
        play_items,
        sub_play_items,
        extension_sub_play_items,
        playlist_marks,
        chapters: Vec::new(),
    };
    derive_chapters_and_timings(&mut info);
    Ok(info)
}

/// Lays clips out on the playlist timeline, re-bases marks and builds the
/// chapter list from ENTRY marks.
///
/// Depends only on PlayItem times and raw mark times, so running it again
/// yields the same result.
pub fn derive_chapters_and_timings(info: &mut BlurayPlaylistInformation) {
    let mut time = 0;
    for (item, clip) in info.play_items.iter_mut().zip(info.clips.iter_mut()) {
        let duration = item.duration();
        clip.time = time;
        clip.duration = duration;
        for angle in &mut item.angle_clips {
            angle.time = time;
            angle.duration = duration;
        }
        time += duration;
    }
    info.duration = time;

    for mark in &mut info.playlist_marks {
        let reference = mark.play_item_reference as usize;
        let (Some(item), Some(clip)) = (info.play_items.get(reference), info.clips.get(reference))
        else {
            continue;
        };
        mark.time = (clip.time + mark.raw_time).saturating_sub(item.in_time);
    }

    let entries: Vec<usize> = info
        .playlist_marks
        .iter()
        .enumerate()
        .filter(|(_, m)| m.mark_type == MarkType::Entry)
        .map(|(i, _)| i)
        .collect();

    info.chapters.clear();
    for (n, &i) in entries.iter().enumerate() {
        let start = info.playlist_marks[i].time;
        let end = entries
            .get(n + 1)
            .map_or(info.duration, |&next| info.playlist_marks[next].time);
        if end < start {
            debug!(
                "Playlist {:05}: chapter {} ends at {end} before it starts at {start}",
                info.playlist,
                n + 1
            );
        }
        let duration = end.saturating_sub(start);
        info.playlist_marks[i].duration = duration;
        info.chapters.push(ChapterInformation {
            chapter: n as u32 + 1,
            start,
            duration,
        });
    }
}

fn resolve_clip(
    disc: &dyn DiscReader,
    cache: &mut ClipCache,
    clip: &mut ClipInformation,
) -> Result<(), BdmvError> {
    let resolved = match cache.get(clip.clip) {
        Some(cached) => cached.clone(),
        None => {
            let parsed = read_clpi(disc, clip.clip)?;
            cache.insert(parsed.clone());
            parsed
        }
    };
    *clip = ClipInformation {
        codec: std::mem::take(&mut clip.codec),
        time: clip.time,
        duration: clip.duration,
        ..resolved
    };
    Ok(())
}

/// Reads `BDMV/PLAYLIST/<playlist>.mpls` and every clip it references.
///
/// Clips already in `cache` are not read again; freshly parsed clips are
/// added to it. Any unreadable clip fails the whole playlist.
pub fn read_mpls(
    disc: &dyn DiscReader,
    playlist: u32,
    cache: &mut ClipCache,
) -> Result<BlurayPlaylistInformation, BdmvError> {
    let path = playlist_path(playlist);
    let buf = disc
        .read(&path, None)
        .map_err(|e| BdmvError::io(disc.describe(&path), e))?;

    let mut info = parse_mpls(playlist, &buf).inspect_err(|e| {
        debug!("Failed to parse {}: {e}", disc.describe(&path).display());
    })?;

    let clips = info
        .play_items
        .iter_mut()
        .flat_map(|p| p.angle_clips.iter_mut())
        .chain(info.clips.iter_mut())
        .chain(
            info.sub_play_items
                .iter_mut()
                .chain(info.extension_sub_play_items.iter_mut())
                .flat_map(|s| s.clips.iter_mut()),
        );
    for clip in clips {
        resolve_clip(disc, cache, clip).inspect_err(|e| {
            debug!("Playlist {playlist:05}: clip {:05} unresolved: {e}", clip.clip);
        })?;
    }

    trace!(
        "Playlist {playlist:05}: {} play item(s), {} chapter(s), {} ms",
        info.play_items.len(),
        info.chapters.len(),
        info.duration
    );
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::coding::StreamCoding;
    use anyhow::Result;

    fn play_item_bytes(clip: &str, cc: u8, in_ticks: u32, out_ticks: u32) -> Vec<u8> {
        let mut body = clip.as_bytes().to_vec();
        body.extend_from_slice(b"M2TS");
        body.extend_from_slice(&(cc as u16).to_be_bytes());
        body.push(0);
        body.extend_from_slice(&in_ticks.to_be_bytes());
        body.extend_from_slice(&out_ticks.to_be_bytes());
        body.extend_from_slice(&[0; 8]);
        body.extend_from_slice(&[0x80, 0, 0, 0]);
        // STN: one HEVC video and one secondary audio with a single ref
        let mut stn = vec![0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0];
        stn.extend_from_slice(&[3, 1, 0x10, 0x11, 4, 0x24, 0x81, 0x12, 0x40]);
        stn.extend_from_slice(&[3, 1, 0x1A, 0x00, 5, 0xA1, 0x31, b'e', b'n', b'g', 1, 0, 0, 0]);
        body.extend_from_slice(&(stn.len() as u16).to_be_bytes());
        body.extend_from_slice(&stn);

        let mut item = (body.len() as u16).to_be_bytes().to_vec();
        item.extend_from_slice(&body);
        item
    }

    fn mpls(items: &[Vec<u8>], marks: &[(u8, u16, u32)]) -> Vec<u8> {
        let mut buf = b"MPLS0300".to_vec();
        let app_info = [0u8, 0, 0, 14, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        let mut play_list = vec![0, 0];
        play_list.extend_from_slice(&(items.len() as u16).to_be_bytes());
        play_list.extend_from_slice(&[0, 0]);
        for item in items {
            play_list.extend_from_slice(item);
        }
        let mut mark_block = (marks.len() as u16).to_be_bytes().to_vec();
        for &(kind, reference, ticks) in marks {
            mark_block.extend_from_slice(&[0, kind]);
            mark_block.extend_from_slice(&reference.to_be_bytes());
            mark_block.extend_from_slice(&ticks.to_be_bytes());
            mark_block.extend_from_slice(&[0xFF, 0xFF, 0, 0, 0, 0]);
        }

        let play_list_start = (MPLS_HEADER_SIZE + app_info.len()) as u32;
        let marks_start = play_list_start + 4 + play_list.len() as u32;
        buf.extend_from_slice(&play_list_start.to_be_bytes());
        buf.extend_from_slice(&marks_start.to_be_bytes());
        buf.extend_from_slice(&[0; 24]);
        buf.extend_from_slice(&app_info);
        buf.extend_from_slice(&(play_list.len() as u32).to_be_bytes());
        buf.extend_from_slice(&play_list);
        buf.extend_from_slice(&(mark_block.len() as u32).to_be_bytes());
        buf.extend_from_slice(&mark_block);
        buf
    }

    fn two_item_playlist() -> Vec<u8> {
        mpls(
            &[
                play_item_bytes("00001", 1, 45 * 1000, 45 * 61_000),
                play_item_bytes("00002", 6, 45 * 2000, 45 * 32_000),
            ],
            &[
                (1, 0, 45 * 1000),
                (1, 0, 45 * 31_000),
                (2, 1, 45 * 2000),
                (1, 1, 45 * 12_000),
            ],
        )
    }

    #[test]
    fn play_items_and_stream_table() -> Result<()> {
        let info = parse_mpls(800, &two_item_playlist())?;
        assert_eq!(info.playback_type, PlaybackType::Sequential);
        assert_eq!(info.play_items.len(), 2);

        let first = &info.play_items[0];
        assert_eq!(first.primary_clip().map(|c| c.clip), Some(1));
        assert_eq!((first.in_time, first.out_time), (1000, 61_000));
        assert_eq!(first.connection_condition, ConnectionCondition::NonSeamless);
        assert!(first.random_access_flag);
        assert_eq!(info.play_items[1].connection_condition, ConnectionCondition::Seamless);

        let stn = &first.stn;
        assert_eq!(stn.video.len(), 1);
        assert_eq!(stn.video[0].coding, StreamCoding::Hevc);
        assert_eq!(stn.video[0].packet_identifier, 0x1011);
        assert!(stn.video[0].video().is_some_and(|v| v.hdr_plus));
        assert_eq!(stn.secondary_audio.len(), 1);
        assert_eq!(stn.secondary_audio[0].stream.packet_identifier, 0x1A00);
        assert_eq!(stn.secondary_audio[0].stream.language(), Some("eng"));
        assert_eq!(stn.secondary_audio[0].primary_audio_refs, [0]);
        Ok(())
    }

    #[test]
    fn duration_is_sum_of_play_items() -> Result<()> {
        let info = parse_mpls(800, &two_item_playlist())?;
        let sum: u64 = info.play_items.iter().map(|p| p.out_time - p.in_time).sum();
        assert_eq!(info.duration, sum);
        assert_eq!(info.duration, 90_000);
        assert_eq!(info.clips[1].time, 60_000);
        assert_eq!(info.clips[1].duration, 30_000);
        Ok(())
    }

    #[test]
    fn marks_are_rebased_into_chapters() -> Result<()> {
        let info = parse_mpls(800, &two_item_playlist())?;
        let times: Vec<u64> = info.playlist_marks.iter().map(|m| m.time).collect();
        assert_eq!(times, [0, 30_000, 60_000, 70_000]);

        let chapters: Vec<(u32, u64, u64)> = info
            .chapters
            .iter()
            .map(|c| (c.chapter, c.start, c.duration))
            .collect();
        assert_eq!(
            chapters,
            [(1, 0, 30_000), (2, 30_000, 40_000), (3, 70_000, 20_000)]
        );
        assert_eq!(info.playlist_marks[2].duration, 0);
        Ok(())
    }

    #[test]
    fn derivation_is_idempotent() -> Result<()> {
        let mut info = parse_mpls(800, &two_item_playlist())?;
        let before = info.clone();
        derive_chapters_and_timings(&mut info);
        derive_chapters_and_timings(&mut info);
        assert_eq!(info, before);
        Ok(())
    }

    #[test]
    fn invalid_connection_condition_fails() {
        let buf = mpls(&[play_item_bytes("00001", 3, 0, 45_000)], &[]);
        assert!(matches!(
            parse_mpls(1, &buf),
            Err(BdmvError::Format(FormatError::InvalidConnectionCondition(3)))
        ));
    }

    #[test]
    fn header_validation() {
        let mut buf = two_item_playlist();
        buf[4..8].copy_from_slice(b"0400");
        assert!(matches!(
            parse_mpls(1, &buf),
            Err(BdmvError::Format(FormatError::UnsupportedVersion { .. }))
        ));
        buf[0] = b'm';
        assert!(matches!(
            parse_mpls(1, &buf),
            Err(BdmvError::Format(FormatError::InvalidMagic { .. }))
        ));
    }

    #[test]
    fn dangling_mark_reference_fails() {
        let buf = mpls(&[play_item_bytes("00001", 1, 0, 45_000)], &[(1, 1, 0)]);
        assert!(matches!(
            parse_mpls(1, &buf),
            Err(BdmvError::Format(FormatError::InvalidPlayItemReference { .. }))
        ));
    }
}
