//! Elementary stream discovery in BDAV MPEG-2 transport streams.
//!
//! Only a bounded prefix of each clip file is read. PAT and PMT sections
//! name the elementary streams; their PES payloads are then handed to the
//! codec analyzers in [`audio`] and [`video`] until every stream reports
//! completion or the prefix is used up.

pub mod audio;
pub mod packet;
pub mod psi;
pub mod video;

use std::collections::{BTreeSet, HashMap};

use log::{debug, trace};

use crate::process::disc::{DiscReader, stream_path};
use crate::process::m2ts::packet::{PesAssembler, PesPacket, SectionAssembler, TsPacket};
use crate::process::m2ts::psi::{parse_pat, parse_pmt};
use crate::process::m2ts::video::VideoCodec;
use crate::structs::coding::StreamCoding;
use crate::structs::playlist::BlurayPlaylistInformation;
use crate::structs::ts_stream::{StreamMap, TsStreamDetails, TsStreamInfo};
use crate::utils::errors::{BdmvError, FormatError, RangeError};

pub const BDAV_PACKET_SIZE: usize = 192;
pub const TS_PACKET_SIZE: usize = 188;
pub const TIMESTAMP_SIZE: usize = BDAV_PACKET_SIZE - TS_PACKET_SIZE;
pub const PACKETS_TO_PARSE: usize = 2000;
/// Audio streams need this many parsed headers before they count as done.
pub const HEADERS_PARSED_FOR_COMPLETE: u32 = 2;

const PAT_PID: u16 = 0x0000;
const PRIVATE_STREAM_1: u8 = 0xBD;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct M2tsParser {
    packet_limit: usize,
}

impl Default for M2tsParser {
    fn default() -> Self {
        Self::new()
    }
}

impl M2tsParser {
    pub fn new() -> Self {
        Self {
            packet_limit: PACKETS_TO_PARSE,
        }
    }

    /// Overrides how many BDAV packets are inspected per clip.
    pub fn with_packet_limit(packet_limit: usize) -> Self {
        Self { packet_limit }
    }

    pub fn packet_limit(&self) -> usize {
        self.packet_limit
    }

    /// Demultiplexes a BDAV stream prefix already in memory.
    ///
    /// Streams still incomplete when the prefix runs out are returned as
    /// they are; see [`StreamMap::is_complete`].
    pub fn parse(&self, buf: &[u8]) -> Result<StreamMap, BdmvError> {
        let mut demux = Demux::default();

        let mut offset = 0;
        let mut count = 0;
        while count < self.packet_limit && offset + BDAV_PACKET_SIZE <= buf.len() {
            trace!("BDAV packet {count} at offset {offset:#X}");
            demux.packet(&buf[offset + TIMESTAMP_SIZE..offset + BDAV_PACKET_SIZE])?;
            count += 1;
            offset += BDAV_PACKET_SIZE;

            if demux.pmt_parsed && demux.streams.is_complete() {
                break;
            }
        }

        let mut streams = demux.streams;
        streams.merge_dolby_vision_layers();
        Ok(streams)
    }

    /// Reads the prefix of `BDMV/STREAM/<clip>.<extension>` and parses it.
    pub fn get_streams_from_file(
        &self,
        disc: &dyn DiscReader,
        clip: u32,
        extension: &str,
    ) -> Result<StreamMap, BdmvError> {
        let path = stream_path(clip, extension);
        let file = disc.describe(&path);
        debug!("Analysing {}", file.display());

        let buf = disc
            .read(&path, Some(BDAV_PACKET_SIZE * self.packet_limit))
            .map_err(|e| BdmvError::io(&file, e))?;
        if buf.is_empty() {
            return Err(FormatError::EmptyStreamFile(file.display().to_string()).into());
        }

        let streams = self.parse(&buf)?;
        if !streams.is_complete() {
            debug!(
                "Not all stream details determined from {} - may need packet limit increase",
                file.display()
            );
        }
        debug!("Finished analysing {}", file.display());
        Ok(streams)
    }

    /// Streams of the longest PlayItem's primary clip. When the playlist has
    /// a stereoscopic extension clip whose single video stream is 3D, the
    /// main video stream is flagged as 3D too.
    pub fn get_streams(
        &self,
        disc: &dyn DiscReader,
        playlist: &BlurayPlaylistInformation,
    ) -> Result<StreamMap, BdmvError> {
        let clip = playlist
            .longest_play_item()
            .and_then(|item| item.angle_clips.first())
            .ok_or(FormatError::NoPlayItems)?;
        let mut streams =
            self.get_streams_from_file(disc, clip.clip, &clip.stream_file_extension())?;

        let extension_clip = playlist
            .extension_sub_play_items
            .first()
            .and_then(|item| item.clips.first());
        if let Some(extension_clip) = extension_clip {
            let stereo = self.get_streams_from_file(
                disc,
                extension_clip.clip,
                &extension_clip.stream_file_extension(),
            )?;
            let stereo_video = stereo.video_streams();
            if let [only] = stereo_video[..] {
                if only.video().is_some_and(|v| v.is_3d) {
                    let main_video = streams
                        .streams
                        .values_mut()
                        .find(|s| s.stream_type.is_video())
                        .and_then(|s| s.video_mut());
                    if let Some(video) = main_video {
                        video.is_3d = true;
                    }
                }
            }
        }

        Ok(streams)
    }
}

/// Per-file demultiplexer state.
#[derive(Debug, Default)]
struct Demux {
    streams: StreamMap,
    pmt_pids: BTreeSet<u16>,
    sections: HashMap<u16, SectionAssembler>,
    pes: HashMap<u16, PesAssembler>,
    pmt_parsed: bool,
}

impl Demux {
    fn packet(&mut self, raw: &[u8]) -> Result<(), RangeError> {
        let Some(packet) = TsPacket::parse(raw)? else {
            debug!("Dropping transport packet without sync byte");
            return Ok(());
        };
        if packet.payload.is_empty() {
            return Ok(());
        }

        if packet.pid == PAT_PID {
            if let Some(pids) = parse_pat(packet.payload, packet.payload_unit_start)? {
                for pid in pids {
                    self.pmt_pids.insert(pid);
                    self.sections.entry(pid).or_default();
                }
            }
            return Ok(());
        }

        if self.pmt_pids.contains(&packet.pid) {
            let sections = self
                .sections
                .entry(packet.pid)
                .or_default()
                .push(packet.payload, packet.payload_unit_start)?;
            for section in sections {
                if !parse_pmt(&section, &mut self.streams)? {
                    break;
                }
                self.pmt_parsed = true;
            }
            return Ok(());
        }

        let Some(stream) = self.streams.streams.get_mut(&packet.pid) else {
            return Ok(());
        };
        if stream.completed {
            return Ok(());
        }

        for pes in self.pes.entry(packet.pid).or_default().push(&packet) {
            if let Some(pes) = PesPacket::parse(&pes) {
                analyze(stream, &pes)?;
            }
            if stream.completed {
                break;
            }
        }
        Ok(())
    }
}

/// Routes one PES payload to the analyzer for the stream's coding.
fn analyze(stream: &mut TsStreamInfo, pes: &PesPacket<'_>) -> Result<(), RangeError> {
    let stream_type = stream.stream_type;
    let data = pes.data;

    match &mut stream.details {
        TsStreamDetails::Video(info) => {
            let definitive = match stream_type {
                StreamCoding::Hevc => video::parse_nal(data, VideoCodec::H265, info)?,
                StreamCoding::H264 => video::parse_nal(data, VideoCodec::H264, info)?,
                StreamCoding::H264Mvc => {
                    let definitive = video::parse_nal(data, VideoCodec::H264, info)?;
                    info.is_3d = true;
                    definitive
                }
                StreamCoding::Vc1 => video::parse_vc1(data, info)?,
                StreamCoding::Mpeg2Video => video::parse_mpeg2(data, info)?,
                _ => true,
            };
            if definitive {
                stream.completed = true;
            }
        }
        TsStreamDetails::Audio(info) => {
            let headers = match stream_type {
                StreamCoding::Ac3 | StreamCoding::Eac3 | StreamCoding::Eac3Secondary => {
                    audio::parse_ac3(data, info)?
                }
                StreamCoding::Dts
                | StreamCoding::DtsHd
                | StreamCoding::DtsHdMaster
                | StreamCoding::DtsHdSecondary => audio::parse_dts(data, info)?,
                StreamCoding::TrueHd => audio::parse_truehd(data, info)?,
                StreamCoding::Lpcm if pes.stream_id == PRIVATE_STREAM_1 => {
                    audio::parse_lpcm(data, info)?
                }
                StreamCoding::Lpcm => 0,
                _ => {
                    stream.completed = true;
                    return Ok(());
                }
            };
            stream.seen += headers;
            if stream.seen >= HEADERS_PARSED_FOR_COMPLETE {
                stream.completed = true;
            }
        }
        TsStreamDetails::Other => stream.completed = true,
    }
    Ok(())
}
