#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;
use bdmv::process::disc::{DiscReader, clip_info_path, playlist_path, stream_path};
use bitstream_io::{BigEndian, BitWrite, BitWriter};

pub const PMT_PID: u16 = 0x0100;
pub const VIDEO_PID: u16 = 0x1011;
pub const DV_ENHANCEMENT_PID: u16 = 0x1015;
pub const TRUEHD_PID: u16 = 0x1100;
pub const AC3_STEREO_PID: u16 = 0x1101;
pub const AC3_SURROUND_PID: u16 = 0x1102;
pub const AC3_COMMENTARY_PID: u16 = 0x1103;
pub const PG_PID: u16 = 0x1200;

const BDAV_PACKET_SIZE: usize = 192;

/// Disc image held in memory that counts reads per file.
#[derive(Debug, Default)]
pub struct MemDisc {
    files: HashMap<PathBuf, Vec<u8>>,
    reads: RefCell<HashMap<PathBuf, usize>>,
}

impl MemDisc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: PathBuf, data: Vec<u8>) -> &mut Self {
        self.files.insert(path, data);
        self
    }

    pub fn with_playlist(mut self, playlist: u32, data: Vec<u8>) -> Self {
        self.add(playlist_path(playlist), data);
        self
    }

    pub fn with_clip(mut self, clip: u32, clpi: Vec<u8>, m2ts: Vec<u8>) -> Self {
        self.add(clip_info_path(clip), clpi);
        self.add(stream_path(clip, "m2ts"), m2ts);
        self
    }

    pub fn reads(&self, path: &Path) -> usize {
        self.reads.borrow().get(path).copied().unwrap_or(0)
    }
}

impl DiscReader for MemDisc {
    fn read(&self, path: &Path, max_bytes: Option<usize>) -> io::Result<Vec<u8>> {
        let data = self
            .files
            .get(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))?;
        *self.reads.borrow_mut().entry(path.to_path_buf()).or_insert(0) += 1;
        let len = max_bytes.map_or(data.len(), |m| m.min(data.len()));
        Ok(data[..len].to_vec())
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<String>> {
        let mut names: Vec<String> = self
            .files
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        names.sort();
        Ok(names)
    }
}

/// CLPI file whose first program carries `records`, each a complete stream
/// entry plus attributes.
pub fn clpi(records: &[&[u8]]) -> Vec<u8> {
    let mut program_info = vec![0, 1];
    program_info.extend_from_slice(&[0, 0, 0, 0, 0x01, 0x00, records.len() as u8, 1]);
    for record in records {
        program_info.extend_from_slice(record);
    }

    let mut buf = b"HDMV0300".to_vec();
    buf.extend_from_slice(&[0, 0, 0, 0]);
    buf.extend_from_slice(&28u32.to_be_bytes());
    buf.extend_from_slice(&[0; 12]);
    buf.extend_from_slice(&(program_info.len() as u32).to_be_bytes());
    buf.extend_from_slice(&program_info);
    buf
}

/// HEVC 2160p, 16:9, HDR10.
pub const HEVC_RECORD: &[u8] = &[0x10, 0x11, 5, 0x24, 0x81, 0x31, 0x12, 0x00];
/// TrueHD multichannel 48 kHz, eng.
pub const TRUEHD_RECORD: &[u8] = &[0x11, 0x00, 5, 0x83, 0x61, b'e', b'n', b'g'];
/// AC-3 stereo 48 kHz, eng.
pub const AC3_STEREO_RECORD: &[u8] = &[0x11, 0x01, 5, 0x81, 0x31, b'e', b'n', b'g'];
/// AC-3 multichannel 48 kHz, fra.
pub const AC3_SURROUND_RECORD: &[u8] = &[0x11, 0x02, 5, 0x81, 0x61, b'f', b'r', b'a'];
/// AC-3 multichannel 48 kHz, spa.
pub const AC3_COMMENTARY_RECORD: &[u8] = &[0x11, 0x03, 5, 0x81, 0x61, b's', b'p', b'a'];
pub const PG_RECORD: &[u8] = &[0x12, 0x00, 4, 0x90, b'f', b'r', b'a'];

pub fn pg_record(pid: u16, language: &str) -> Vec<u8> {
    let mut record = pid.to_be_bytes().to_vec();
    record.extend_from_slice(&[4, 0x90]);
    record.extend_from_slice(language.as_bytes());
    record
}

/// One PlayItem with an empty stream number table.
pub fn play_item(clip: u32, in_ms: u32, out_ms: u32) -> Vec<u8> {
    let mut body = format!("{clip:05}M2TS").into_bytes();
    body.extend_from_slice(&1u16.to_be_bytes());
    body.push(0);
    body.extend_from_slice(&(in_ms * 45).to_be_bytes());
    body.extend_from_slice(&(out_ms * 45).to_be_bytes());
    body.extend_from_slice(&[0; 8]);
    body.extend_from_slice(&[0x80, 0, 0, 0]);
    body.extend_from_slice(&14u16.to_be_bytes());
    body.extend_from_slice(&[0; 14]);

    let mut item = (body.len() as u16).to_be_bytes().to_vec();
    item.extend_from_slice(&body);
    item
}

/// Sequential playlist. Marks are entry marks given as
/// `(play item, ms on the clip timeline)`.
pub fn mpls(items: &[Vec<u8>], marks: &[(u16, u32)]) -> Vec<u8> {
    let app_info = [0u8, 0, 0, 14, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
    let mut play_list = vec![0, 0];
    play_list.extend_from_slice(&(items.len() as u16).to_be_bytes());
    play_list.extend_from_slice(&[0, 0]);
    for item in items {
        play_list.extend_from_slice(item);
    }
    let mut mark_block = (marks.len() as u16).to_be_bytes().to_vec();
    for &(reference, ms) in marks {
        mark_block.extend_from_slice(&[0, 1]);
        mark_block.extend_from_slice(&reference.to_be_bytes());
        mark_block.extend_from_slice(&(ms * 45).to_be_bytes());
        mark_block.extend_from_slice(&[0xFF, 0xFF, 0, 0, 0, 0]);
    }

    let play_list_start = (40 + app_info.len()) as u32;
    let marks_start = play_list_start + 4 + play_list.len() as u32;
    let mut buf = b"MPLS0300".to_vec();
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

/// Builder for a BDAV stream file with one program.
#[derive(Debug, Default)]
pub struct M2ts {
    packets: Vec<u8>,
    continuity: HashMap<u16, u8>,
}

impl M2ts {
    /// Starts with the PAT and a PMT listing `(stream_type, pid, language)`.
    pub fn new(streams: &[(u8, u16, Option<&str>)]) -> Self {
        let mut m2ts = Self::default();
        m2ts.packet(
            0,
            true,
            &[
                0x00, 0x00, 0xB0, 0x0D, 0x00, 0x01, 0xC1, 0x00, 0x00, 0x00, 0x01, 0xE1, 0x00,
                0x00, 0x00, 0x00, 0x00,
            ],
        );

        let mut section = vec![0x02, 0xB0, 0x00, 0x00, 0x01, 0xC1, 0x00, 0x00];
        section.extend_from_slice(&[0xF0, 0x01, 0xF0, 0x00]);
        for &(stream_type, pid, language) in streams {
            section.push(stream_type);
            section.extend_from_slice(&(0xE000 | pid).to_be_bytes());
            match language {
                Some(language) => {
                    section.extend_from_slice(&[0xF0, 0x06, 0x0A, 0x04]);
                    section.extend_from_slice(language.as_bytes());
                    section.push(0);
                }
                None => section.extend_from_slice(&[0xF0, 0x00]),
            }
        }
        section.extend_from_slice(&[0, 0, 0, 0]);
        section[2] = (section.len() - 3) as u8;

        let mut payload = vec![0x00];
        payload.extend(section);
        m2ts.packet(PMT_PID, true, &payload);
        m2ts
    }

    fn packet(&mut self, pid: u16, pusi: bool, payload: &[u8]) {
        let cc = self.continuity.entry(pid).or_insert(0);
        let mut p = vec![0x00, 0x00, 0x00, 0x00, 0x47];
        p.push(((pid >> 8) as u8 & 0x1F) | if pusi { 0x40 } else { 0 });
        p.push(pid as u8);
        p.push(0x10 | (*cc & 0x0F));
        p.extend_from_slice(payload);
        p.resize(BDAV_PACKET_SIZE, 0xFF);
        *cc = cc.wrapping_add(1);
        self.packets.extend(p);
    }

    /// One PES packet fitting a single transport packet.
    pub fn pes(mut self, pid: u16, stream_id: u8, data: &[u8]) -> Self {
        let mut pes = vec![0x00, 0x00, 0x01, stream_id, 0x00, 0x00, 0x80, 0x80, 0x05];
        pes.extend_from_slice(&[0x21, 0x00, 0x01, 0x00, 0x01]);
        pes.extend_from_slice(data);
        self.packet(pid, true, &pes);
        self
    }

    /// `data` sent as `count` separate PES packets.
    pub fn repeat(mut self, pid: u16, stream_id: u8, data: &[u8], count: usize) -> Self {
        for _ in 0..count {
            self = self.pes(pid, stream_id, data);
        }
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.packets
    }
}

pub fn nal(header: [u8; 2], payload: &[u8]) -> Vec<u8> {
    let mut unit = vec![0x00, 0x00, 0x00, 0x01];
    unit.extend_from_slice(&header);
    unit.extend_from_slice(payload);
    unit
}

/// HEVC Main 10 sequence parameter set for 3840x2160.
pub fn hevc_sps_2160p() -> Result<Vec<u8>> {
    let mut w = BitWriter::endian(Vec::new(), BigEndian);
    let ue = |w: &mut BitWriter<Vec<u8>, BigEndian>, value: u32| -> Result<()> {
        let code = value + 1;
        let len = 32 - code.leading_zeros();
        w.write_var::<u32>(len - 1, 0)?;
        w.write_var::<u32>(len, code)?;
        Ok(())
    };

    w.write_var::<u32>(4, 0)?;
    w.write_var::<u32>(3, 0)?;
    w.write_bit(true)?;
    w.write_var::<u32>(8, 0x02)?;
    w.write_var::<u32>(32, 0x2000_0000)?;
    w.write_var::<u32>(16, 0x9000)?;
    w.write_var::<u32>(32, 0)?;
    w.write_var::<u32>(8, 153)?;
    ue(&mut w, 0)?;
    ue(&mut w, 1)?;
    ue(&mut w, 3840)?;
    ue(&mut w, 2160)?;
    w.write_bit(false)?;
    ue(&mut w, 2)?;
    ue(&mut w, 2)?;
    ue(&mut w, 4)?;
    w.write_bit(true)?;
    for value in [5, 0, 0, 0, 3, 0, 3, 0, 0] {
        ue(&mut w, value)?;
    }
    w.write_bit(false)?;
    w.write_bit(true)?;
    w.write_bit(true)?;
    w.write_bit(false)?;
    ue(&mut w, 1)?;
    ue(&mut w, 1)?;
    ue(&mut w, 0)?;
    ue(&mut w, 0)?;
    w.write_bit(true)?;
    w.write_bit(false)?;
    w.write_bit(true)?;
    w.write_bit(true)?;
    w.write_bit(true)?; // vui_parameters_present_flag
    w.write_bit(true)?;
    w.write_var::<u32>(8, 1)?;
    w.write_bit(true)?;
    w.byte_align()?;
    Ok(w.into_writer())
}

/// HEVC access unit holding the SPS and a Dolby Vision RPU.
pub fn hevc_dolby_vision_access_unit() -> Result<Vec<u8>> {
    let mut au = nal([0x46, 0x01], &[0x10]);
    au.extend(nal([0x42, 0x01], &hevc_sps_2160p()?));
    au.extend(nal([0x7C, 0x01], &[0x08, 0x09, 0x0A]));
    Ok(au)
}

pub fn access_unit_delimiter() -> Vec<u8> {
    nal([0x46, 0x01], &[0x10])
}

/// AC-3 sync frame header, 48 kHz. `bsi` holds acmod and the flags up to
/// lfeon.
pub fn ac3_frame(bsi: [u8; 2]) -> Vec<u8> {
    vec![0x0B, 0x77, 0x00, 0x00, 0x1C, 0x40, bsi[0], bsi[1], 0, 0]
}

pub fn ac3_stereo() -> Vec<u8> {
    ac3_frame([0b0100_0000, 0x00])
}

pub fn ac3_5_1() -> Vec<u8> {
    ac3_frame([0b1110_0001, 0x00])
}

/// TrueHD major sync announcing a 16 channel Atmos presentation.
pub fn truehd_atmos_major_sync() -> Vec<u8> {
    let mut frame = vec![0x10, 0x11, 0x22, 0x33];
    frame.extend_from_slice(&[0xF8, 0x72, 0x6F, 0xBA]);
    frame.extend_from_slice(&0x0400_007Cu32.to_be_bytes());
    frame.extend_from_slice(&0xB752u16.to_be_bytes());
    frame.extend_from_slice(&[0x00, 0x00, 0, 0, 0, 0]);
    frame.extend_from_slice(&[0x40, 0x80]);
    frame.extend_from_slice(&1u64.to_be_bytes());
    frame.extend_from_slice(&(15u32 << 12).to_be_bytes());
    frame.extend_from_slice(&[0; 4]);
    frame
}
