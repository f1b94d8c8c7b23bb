//! Clip information (`.clpi`) parsing.
//!
//! Only the ProgramInfo block is interpreted. The stream coding records it
//! carries share their layout with the MPLS stream attributes, so the record
//! parser here serves both files.

use log::{debug, trace};
use nom::bytes::complete::take;
use nom::combinator::map;
use nom::multi::{count, length_data, length_value};
use nom::number::complete::{be_u8, be_u16, be_u32};
use nom::sequence::tuple;

use crate::process::disc::{DiscReader, clip_info_path};
use crate::structs::clip::{
    AudioAttributes, ClipInformation, ProgramInformation, StreamAttributes, StreamInformation,
    VideoAttributes,
};
use crate::structs::coding::StreamCoding;
use crate::utils::bytes::{get_dword, get_string};
use crate::utils::errors::{BdmvError, FormatError, NomResult, RangeError, finish};

pub const CLPI_HEADER_SIZE: usize = 28;

/// Where a stream attribute record was read from; the video layout differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttributeLayout {
    Playlist,
    ClipInfo,
}

pub(crate) fn language(input: &[u8]) -> NomResult<'_, String> {
    map(take(3usize), |s: &[u8]| s.iter().map(|&b| b as char).collect())(input)
}

fn video_attributes(
    input: &[u8],
    coding: StreamCoding,
    layout: AttributeLayout,
) -> NomResult<'_, VideoAttributes> {
    let (mut input, format_rate) = be_u8(input)?;
    let mut video = VideoAttributes {
        format: (format_rate >> 4).into(),
        rate: (format_rate & 0x0F).into(),
        ..Default::default()
    };

    if layout == AttributeLayout::ClipInfo {
        let (rest, flags) = be_u8(input)?;
        video.aspect = Some((flags >> 4).into());
        video.oc_flag = flags & 0x02 != 0;
        if coding == StreamCoding::Hevc {
            video.cr_flag = flags & 0x01 != 0;
        }
        input = rest;
    }

    if coding == StreamCoding::Hevc {
        let (rest, (range_space, flags)) = tuple((be_u8, be_u8))(input)?;
        video.dynamic_range = (range_space >> 4).into();
        video.color_space = (range_space & 0x0F).into();
        match layout {
            AttributeLayout::Playlist => {
                video.cr_flag = flags & 0x80 != 0;
                video.hdr_plus = flags & 0x40 != 0;
            }
            AttributeLayout::ClipInfo => video.hdr_plus = flags & 0x80 != 0,
        }
        input = rest;
    }

    Ok((input, video))
}

fn coding_info(
    input: &[u8],
    layout: AttributeLayout,
) -> NomResult<'_, (StreamCoding, StreamAttributes)> {
    let (input, coding) = map(be_u8, StreamCoding::from)(input)?;
    let (input, attributes) = match coding {
        c if c.is_video() => {
            let (input, video) = video_attributes(input, c, layout)?;
            (input, StreamAttributes::Video(video))
        }
        c if c.is_audio() => map(tuple((be_u8, language)), |(format_rate, language)| {
            StreamAttributes::Audio(AudioAttributes {
                format: (format_rate >> 4).into(),
                rate: (format_rate & 0x0F).into(),
                language,
            })
        })(input)?,
        StreamCoding::PresentationGraphics | StreamCoding::InteractiveGraphics => {
            map(language, |language| StreamAttributes::Graphics { language })(input)?
        }
        StreamCoding::TextSubtitle => map(tuple((be_u8, language)), |(code, language)| {
            StreamAttributes::Text {
                character_code: code.into(),
                language,
            }
        })(input)?,
        _ => (input, StreamAttributes::Other),
    };
    Ok((input, (coding, attributes)))
}

/// Length-prefixed stream attribute record. Bytes past the fields this
/// parser knows are skipped.
pub(crate) fn stream_attributes(
    input: &[u8],
    layout: AttributeLayout,
) -> NomResult<'_, (StreamCoding, StreamAttributes)> {
    let (input, record) = length_data(be_u8)(input)?;
    let (_, parsed) = coding_info(record, layout)?;
    Ok((input, parsed))
}

fn program_stream(input: &[u8]) -> NomResult<'_, StreamInformation> {
    let (input, packet_identifier) = be_u16(input)?;
    let (input, (coding, attributes)) = stream_attributes(input, AttributeLayout::ClipInfo)?;
    Ok((
        input,
        StreamInformation {
            coding,
            packet_identifier,
            subpath_id: None,
            subclip_id: None,
            attributes,
        },
    ))
}

fn program(input: &[u8]) -> NomResult<'_, ProgramInformation> {
    let (input, (spn_program_sequence_start, program_id, num_streams, _num_groups)) =
        tuple((be_u32, be_u16, be_u8, be_u8))(input)?;
    let (input, streams) = count(program_stream, num_streams as usize)(input)?;
    Ok((
        input,
        ProgramInformation {
            spn_program_sequence_start,
            program_id,
            streams,
        },
    ))
}

fn program_info(input: &[u8]) -> NomResult<'_, Vec<ProgramInformation>> {
    fn parser(input: &[u8]) -> NomResult<'_, Vec<ProgramInformation>> {
        let (input, (_, num_programs)) = tuple((be_u8, be_u8))(input)?;
        count(program, num_programs as usize)(input)
    }

    length_value(be_u32, parser)(input)
}

/// Parses a whole `.clpi` file held in memory.
pub fn parse_clpi(clip: u32, buf: &[u8]) -> Result<ClipInformation, BdmvError> {
    if buf.len() < CLPI_HEADER_SIZE {
        return Err(FormatError::TooShort {
            len: buf.len(),
            min: CLPI_HEADER_SIZE,
        }
        .into());
    }

    let magic = get_string(buf, 0, 4)?;
    if magic != "HDMV" {
        return Err(FormatError::InvalidMagic {
            kind: "CLPI",
            found: magic,
        }
        .into());
    }
    let version = get_string(buf, 4, 4)?;

    let program_info_start = get_dword(buf, 12)? as usize;
    let block = buf.get(program_info_start..).ok_or(RangeError::Bytes {
        offset: program_info_start,
        width: 4,
        len: buf.len(),
    })?;
    let programs = finish(program_info(block))?;

    trace!(
        "Clip {clip:05}: version {version}, {} program(s), {} stream(s) in program 0",
        programs.len(),
        programs.first().map_or(0, |p| p.streams.len())
    );

    Ok(ClipInformation {
        clip,
        codec: "M2TS".into(),
        version,
        time: 0,
        duration: 0,
        programs,
    })
}

/// Reads `BDMV/CLIPINF/<clip>.clpi` from the disc.
pub fn read_clpi(disc: &dyn DiscReader, clip: u32) -> Result<ClipInformation, BdmvError> {
    let path = clip_info_path(clip);
    let buf = disc
        .read(&path, None)
        .map_err(|e| BdmvError::io(disc.describe(&path), e))?;
    parse_clpi(clip, &buf).inspect_err(|e| {
        debug!("Failed to parse {}: {e}", disc.describe(&path).display());
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::coding::{AspectRatio, DynamicRange, VideoFormat};
    use anyhow::Result;

    fn clpi(program_info: &[u8]) -> Vec<u8> {
        let mut buf = b"HDMV0300".to_vec();
        buf.extend_from_slice(&[0, 0, 0, 0]);
        buf.extend_from_slice(&(CLPI_HEADER_SIZE as u32).to_be_bytes());
        buf.extend_from_slice(&[0; 12]);
        buf.extend_from_slice(&(program_info.len() as u32).to_be_bytes());
        buf.extend_from_slice(program_info);
        buf
    }

    fn uhd_program() -> Vec<u8> {
        let mut p = vec![0, 1];
        p.extend_from_slice(&[0, 0, 0, 0, 0x01, 0x00, 3, 1]);
        // HEVC 2160p 23.976, 16:9, HDR10, BT.2020
        p.extend_from_slice(&[0x10, 0x11, 5, 0x24, 0x81, 0x31, 0x12, 0x00]);
        // TrueHD multichannel 48 kHz, eng
        p.extend_from_slice(&[0x11, 0x00, 5, 0x83, 0x61, b'e', b'n', b'g']);
        // PG, fra
        p.extend_from_slice(&[0x12, 0x00, 4, 0x90, b'f', b'r', b'a']);
        p
    }

    #[test]
    fn program_streams_in_declaration_order() -> Result<()> {
        let info = parse_clpi(1, &clpi(&uhd_program()))?;
        assert_eq!(info.version, "0300");
        assert_eq!(info.codec, "M2TS");
        assert_eq!(info.programs.len(), 1);
        assert_eq!(info.programs[0].program_id, 0x0100);

        let streams = info.streams();
        let pids: Vec<u16> = streams.iter().map(|s| s.packet_identifier).collect();
        assert_eq!(pids, [0x1011, 0x1100, 0x1200]);

        let video = streams[0].video().ok_or(anyhow::anyhow!("no video"))?;
        assert_eq!(video.format, VideoFormat::Progressive2160);
        assert_eq!(video.aspect, Some(AspectRatio::Widescreen));
        assert!(video.cr_flag);
        assert_eq!(video.dynamic_range, DynamicRange::Hdr10);
        assert_eq!(streams[1].language(), Some("eng"));
        assert_eq!(streams[2].coding, StreamCoding::PresentationGraphics);
        assert_eq!(streams[2].language(), Some("fra"));
        Ok(())
    }

    #[test]
    fn bad_header_and_truncation_fail() {
        let mut buf = clpi(&uhd_program());
        assert!(matches!(
            parse_clpi(1, &buf[..20]),
            Err(BdmvError::Format(FormatError::TooShort { .. }))
        ));

        let len = buf.len();
        buf.truncate(len - 2);
        assert!(matches!(parse_clpi(1, &buf), Err(BdmvError::Range(_))));

        buf[0] = b'X';
        assert!(matches!(
            parse_clpi(1, &buf),
            Err(BdmvError::Format(FormatError::InvalidMagic { .. }))
        ));
    }
}
