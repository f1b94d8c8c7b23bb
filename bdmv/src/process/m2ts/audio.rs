//! Audio elementary stream header analyzers.
//!
//! Each analyzer inspects one PES payload and returns how many codec
//! headers it parsed; the caller counts them towards completion.

use log::trace;

use crate::structs::ts_stream::TsAudioStreamInfo;
use crate::utils::bitstream_io::BitReader;
use crate::utils::bytes::{find, get_bits, get_bits64, get_byte, get_dword, get_qword, get_word};
use crate::utils::errors::RangeError;

const AC3_SYNC_WORD: u16 = 0x0B77;
const AC3_SAMPLE_RATES: [u32; 4] = [48000, 44100, 32000, 0];
const AC3_CHANNEL_COUNTS: [u32; 8] = [2, 1, 2, 3, 3, 4, 4, 5];
const EAC3_BLOCKS_PER_SYNCFRAME: [u32; 4] = [1, 2, 3, 6];
const EAC3_SINGLE_CHANNEL_MASK: u32 = 0b0000_0001_1000_1010;
const EAC3_DUAL_CHANNEL_MASK: u32 = 0b0000_0110_0111_0100;

const DTS_SYNC_CORE: u32 = 0x7FFE_8001;
const DTS_SYNC_SUBSTREAM: u32 = 0x6458_2025;
const DTS_SUBSTREAM: [u8; 4] = [0x64, 0x58, 0x20, 0x25];
const DTS_XLL: [u8; 4] = [0x41, 0xA2, 0x95, 0x47];
const DTS_XLL_X: [u8; 4] = [0x02, 0x00, 0x08, 0x50];
const DTS_XLL_X_IMAX: [u8; 4] = [0xF1, 0x40, 0x00, 0xD0];
const DTS_HEADER_SIZE: usize = 14;
const DTS_SAMPLE_RATES: [u32; 16] = [
    8000, 16000, 32000, 64000, 128000, 22050, 44100, 88200, 176400, 352800, 12000, 24000, 48000,
    96000, 192000, 384000,
];
const DTS_CHANNEL_COUNTS: [u32; 16] = [1, 2, 2, 2, 2, 3, 3, 4, 4, 5, 6, 6, 6, 7, 8, 8];

const TRUEHD_SYNC: [u8; 3] = [0xF8, 0x72, 0x6F];
const TRUEHD_SIGNATURE: u16 = 0xB752;
const TRUEHD_MINIMUM_HEADER_SIZE: usize = 26;
const DOLBY_FLAG: u8 = 0xBA;
const TRUEHD_SAMPLE_RATES: [u32; 16] = [
    48000, 96000, 192000, 0, 0, 0, 0, 0, 44100, 88200, 176400, 0, 0, 0, 0, 0,
];
const CH8_SINGLE_CHANNEL_MASK: u32 = 0b1_1001_1000_0110;
const CH8_DUAL_CHANNEL_MASK: u32 = 0b0_0110_0111_1001;
const CH8_16_SINGLE_CHANNEL_ALTERNATE_MASK: u32 = 0b00110;
const CH8_16_DUAL_CHANNEL_ALTERNATE_MASK: u32 = 0b11001;

const LPCM_CHANNEL_COUNTS: [u32; 16] = [0, 1, 0, 2, 3, 3, 4, 4, 5, 6, 7, 8, 0, 0, 0, 0];

fn lpcm_sample_rate(code: u32) -> Option<u32> {
    match code {
        1 => Some(48000),
        4 => Some(96000),
        5 => Some(192000),
        _ => None,
    }
}

/// AC-3 and E-AC-3, told apart by `bsid`.
pub fn parse_ac3(buf: &[u8], audio: &mut TsAudioStreamInfo) -> Result<u32, RangeError> {
    let Some(offset) = buf
        .windows(2)
        .position(|w| u16::from_be_bytes([w[0], w[1]]) == AC3_SYNC_WORD)
    else {
        return Ok(0);
    };
    if offset + 8 >= buf.len() {
        return Ok(0);
    }

    let bsid = get_bits(get_dword(buf, offset + 2)?, 8, 5)?;
    match bsid {
        16 => parse_eac3(&buf[offset + 2..], audio),
        6 | 8 => parse_legacy_ac3(buf, offset, audio),
        _ => {
            trace!("Unsupported AC-3 bsid {bsid}");
            Ok(0)
        }
    }
}

fn parse_legacy_ac3(
    buf: &[u8],
    offset: usize,
    audio: &mut TsAudioStreamInfo,
) -> Result<u32, RangeError> {
    let fscod = get_bits(get_byte(buf, offset + 4)? as u32, 8, 2)?;
    let bsi = get_word(buf, offset + 6)? as u32;
    let acmod = get_bits(bsi, 16, 3)?;

    audio.sample_rate = AC3_SAMPLE_RATES[fscod as usize];
    audio.channels = AC3_CHANNEL_COUNTS[acmod as usize];

    // cmixlev, surmixlev and dsurmod precede lfeon depending on acmod
    let mut skipped = 0;
    if acmod & 0x01 != 0 && acmod != 0x01 {
        skipped += 2;
    }
    if acmod & 0x04 != 0 {
        skipped += 2;
    }
    if acmod == 0x02 {
        skipped += 2;
    }
    if get_bits(bsi, 13 - skipped, 1)? == 1 {
        audio.channels += 1;
    }

    Ok(1)
}

/// Fields of the E-AC-3 `bsi()` that steer the rest of the header walk.
#[derive(Debug, Clone, Copy)]
struct Eac3Bsi {
    strmtyp: u32,
    fscod: u32,
    numblkscod: u32,
    acmod: u32,
    lfeon: bool,
}

/// `buf` starts right after the sync word.
fn parse_eac3(buf: &[u8], audio: &mut TsAudioStreamInfo) -> Result<u32, RangeError> {
    let mut br = BitReader::new(buf);
    let Some(bsi) = eac3_channels_and_rate(&mut br, audio)? else {
        return Ok(0);
    };
    skip_eac3_header(&mut br, &bsi)?;
    if has_joint_object_coding(&mut br)? {
        audio.is_atmos = true;
    }
    Ok(1)
}

fn eac3_channels_and_rate(
    br: &mut BitReader<'_>,
    audio: &mut TsAudioStreamInfo,
) -> Result<Option<Eac3Bsi>, RangeError> {
    let strmtyp = br.read_bits(2)?;
    br.skip_bits(14)?; // substreamid, frmsiz
    let bsi = Eac3Bsi {
        strmtyp,
        fscod: br.read_bits(2)?,
        numblkscod: br.read_bits(2)?,
        acmod: br.read_bits(3)?,
        lfeon: br.read_bit()?,
    };

    let bsid = br.read_bits(5)?;
    if bsid <= 10 {
        return Ok(None);
    }

    br.skip_bits(5)?; // dialnorm
    if br.read_bit()? {
        br.skip_bits(8)?; // compr
    }
    if bsi.acmod == 0 {
        br.skip_bits(5)?; // dialnorm2
        if br.read_bit()? {
            br.skip_bits(8)?; // compr2
        }
    }

    let chanmap = if bsi.strmtyp == 1 && br.read_bit()? {
        Some(br.read_bits(16)?)
    } else {
        None
    };

    if bsi.fscod < 3 {
        audio.sample_rate = AC3_SAMPLE_RATES[bsi.fscod as usize];
    } else if bsi.numblkscod < 3 {
        audio.sample_rate = AC3_SAMPLE_RATES[bsi.numblkscod as usize] / 2;
    }

    let channels = match chanmap {
        Some(map) => {
            (map & EAC3_DUAL_CHANNEL_MASK).count_ones() * 2
                + (map & EAC3_SINGLE_CHANNEL_MASK).count_ones()
        }
        None => AC3_CHANNEL_COUNTS[bsi.acmod as usize] + bsi.lfeon as u32,
    };

    match bsi.strmtyp {
        0 => audio.channels = channels,
        1 => {
            audio.channels += channels;
            audio.has_dependent_stream = true;
        }
        _ => {}
    }

    Ok(Some(bsi))
}

fn skip_eac3_header(br: &mut BitReader<'_>, bsi: &Eac3Bsi) -> Result<(), RangeError> {
    if br.read_bit()? {
        skip_eac3_mixing_metadata(br, bsi)?;
    }
    if br.read_bit()? {
        skip_eac3_info_metadata(br, bsi)?;
    }
    if bsi.strmtyp == 0 && bsi.numblkscod != 3 {
        br.skip_bits(1)?; // convsync
    }
    if bsi.strmtyp == 2 && (bsi.numblkscod == 3 || br.read_bit()?) {
        br.skip_bits(6)?; // frmsizecod
    }
    Ok(())
}

fn skip_eac3_mixing_metadata(br: &mut BitReader<'_>, bsi: &Eac3Bsi) -> Result<(), RangeError> {
    if bsi.acmod > 2 {
        br.skip_bits(2)?; // dmixmod
    }
    if bsi.acmod & 1 != 0 && bsi.acmod > 2 {
        br.skip_bits(6)?; // ltrtcmixlev, lorocmixlev
    }
    if bsi.acmod & 4 != 0 {
        br.skip_bits(6)?; // ltrtsurmixlev, lorosurmixlev
    }
    if bsi.lfeon && br.read_bit()? {
        br.skip_bits(5)?; // lfemixlevcod
    }
    if bsi.strmtyp != 0 {
        return Ok(());
    }

    if br.read_bit()? {
        br.skip_bits(6)?; // pgmscl
    }
    if bsi.acmod == 0 && br.read_bit()? {
        br.skip_bits(6)?; // pgmscl2
    }
    if br.read_bit()? {
        br.skip_bits(6)?; // extpgmscl
    }

    match br.read_bits(2)? {
        1 => br.skip_bits(5)?,
        2 => br.skip_bits(12)?,
        3 => {
            let mixdeflen = br.read_bits(5)?;
            if br.read_bit()? {
                br.skip_bits(5)?;
                for _ in 0..7 {
                    if br.read_bit()? {
                        br.skip_bits(4)?;
                    }
                }
                if br.read_bit()? {
                    for _ in 0..2 {
                        if br.read_bit()? {
                            br.skip_bits(4)?;
                        }
                    }
                }
            }
            if br.read_bit()? {
                br.skip_bits(5)?; // spchdat
                if br.read_bit()? {
                    br.skip_bits(7)?;
                    if br.read_bit()? {
                        br.skip_bits(8)?;
                    }
                }
            }
            br.skip_bits(8 * (mixdeflen + 2))?;
            br.byte_align();
        }
        _ => {}
    }

    if bsi.acmod < 2 {
        if br.read_bit()? {
            br.skip_bits(14)?; // panmean, paninfo
        }
        if bsi.acmod == 0 && br.read_bit()? {
            br.skip_bits(14)?; // panmean2, paninfo2
        }
    }

    if br.read_bit()? {
        if bsi.numblkscod == 0 {
            br.skip_bits(5)?;
        } else {
            for _ in 0..EAC3_BLOCKS_PER_SYNCFRAME[bsi.numblkscod as usize] {
                if br.read_bit()? {
                    br.skip_bits(14)?;
                }
            }
        }
    }
    Ok(())
}

fn skip_eac3_info_metadata(br: &mut BitReader<'_>, bsi: &Eac3Bsi) -> Result<(), RangeError> {
    br.skip_bits(5)?; // bsmod, copyrightb, origbs
    if bsi.acmod == 2 {
        br.skip_bits(4)?; // dsurmod, dheadphonmod
    }
    if bsi.acmod >= 6 {
        br.skip_bits(2)?; // dsurexmod
    }
    if br.read_bit()? {
        br.skip_bits(8)?; // mixlevel, roomtyp, adconvtyp
    }
    if bsi.acmod == 0 && br.read_bit()? {
        br.skip_bits(8)?;
    }
    if bsi.fscod < 3 {
        br.skip_bits(1)?; // sourcefscod
    }
    Ok(())
}

/// Scans `addbsi` for the JOC extension marker.
fn has_joint_object_coding(br: &mut BitReader<'_>) -> Result<bool, RangeError> {
    if !br.read_bit()? {
        return Ok(false);
    }
    let addbsil = br.read_bits(6)?;
    for _ in 0..=addbsil {
        if br.read_bits(8)? == 1 {
            return Ok(true);
        }
    }
    Ok(false)
}

/// DTS core or extension substream, with DTS-HD, XLL and DTS:X detection.
pub fn parse_dts(buf: &[u8], audio: &mut TsAudioStreamInfo) -> Result<u32, RangeError> {
    if buf.len() < DTS_HEADER_SIZE {
        return Ok(0);
    }

    let Some((sync_pos, sync)) = (0..=buf.len() - 4).find_map(|i| {
        let word = u32::from_be_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);
        (word == DTS_SYNC_CORE || word == DTS_SYNC_SUBSTREAM).then_some((i, word))
    }) else {
        return Ok(0);
    };

    let mut substream = sync == DTS_SYNC_SUBSTREAM;
    if sync == DTS_SYNC_CORE {
        if sync_pos + DTS_HEADER_SIZE >= buf.len() {
            return Ok(0);
        }

        let header = get_qword(buf, sync_pos + 4)?;
        let amode = get_bits64(header, 36, 6)? as usize;
        let sfreq = get_bits64(header, 30, 4)? as usize;
        let lff = get_bits64(header, 11, 2)?;

        audio.sample_rate = DTS_SAMPLE_RATES[sfreq];
        if let Some(&channels) = DTS_CHANNEL_COUNTS.get(amode) {
            audio.channels = channels;
        }
        if lff == 1 || lff == 2 {
            audio.channels += 1;
        }

        substream = find(buf, sync_pos + DTS_HEADER_SIZE, &DTS_SUBSTREAM).is_some();
    }

    if substream {
        audio.has_substream = true;
        let from = sync_pos + 10;
        if find(buf, from, &DTS_XLL).is_some() {
            audio.is_xll = true;
        }
        if find(buf, from, &DTS_XLL_X).is_some() {
            audio.is_xllx = true;
        }
        if find(buf, from, &DTS_XLL_X_IMAX).is_some() {
            audio.is_xllx_imax = true;
        }
    }

    Ok(1)
}

/// Every TrueHD major sync in the payload is parsed.
pub fn parse_truehd(buf: &[u8], audio: &mut TsAudioStreamInfo) -> Result<u32, RangeError> {
    let mut headers = 0;
    let mut offset = 0;
    while let Some(pos) = find(buf, offset, &TRUEHD_SYNC) {
        if buf.len() - pos < TRUEHD_MINIMUM_HEADER_SIZE {
            break;
        }
        if get_word(buf, pos + 8)? != TRUEHD_SIGNATURE {
            break;
        }
        if get_byte(buf, pos + 3)? == DOLBY_FLAG {
            parse_truehd_major_sync(&buf[pos..], audio)?;
            headers += 1;
        }
        offset = pos + TRUEHD_MINIMUM_HEADER_SIZE;
    }
    Ok(headers)
}

fn presentation_channels(assignment: u32, single_mask: u32, dual_mask: u32) -> u32 {
    (assignment & dual_mask).count_ones() * 2 + (assignment & single_mask).count_ones()
}

fn parse_truehd_major_sync(buf: &[u8], audio: &mut TsAudioStreamInfo) -> Result<(), RangeError> {
    let format_info = get_dword(buf, 4)?;
    let flags = get_word(buf, 10)? as u32;

    audio.sample_rate = TRUEHD_SAMPLE_RATES[get_bits(format_info, 32, 4)? as usize];

    let ch6_multichannel_type = get_bits(format_info, 28, 1)? == 1;
    let ch8_multichannel_type = get_bits(format_info, 27, 1)? == 1;
    let ch2_modifier = get_bits(format_info, 26, 2)?;
    let ch6_assignment = get_bits(format_info, 22, 5)?;
    let ch8_assignment = get_bits(format_info, 15, 13)?;
    let ch8_alternate = get_bits(flags, 12, 1)? == 1;

    audio.channels = if ch8_multichannel_type {
        if ch8_alternate {
            presentation_channels(
                ch8_assignment,
                CH8_16_SINGLE_CHANNEL_ALTERNATE_MASK,
                CH8_16_DUAL_CHANNEL_ALTERNATE_MASK,
            )
        } else {
            presentation_channels(ch8_assignment, CH8_SINGLE_CHANNEL_MASK, CH8_DUAL_CHANNEL_MASK)
        }
    } else if ch6_multichannel_type {
        presentation_channels(
            ch6_assignment,
            CH8_16_SINGLE_CHANNEL_ALTERNATE_MASK,
            CH8_16_DUAL_CHANNEL_ALTERNATE_MASK,
        )
    } else if ch2_modifier == 3 {
        1
    } else {
        2
    };

    let substreams = get_bits(get_byte(buf, 16)? as u32, 8, 4)?;
    let ch16_present = get_bits(get_byte(buf, 17)? as u32, 8, 1)? == 1;
    let extra_channel_meaning = get_bits64(get_qword(buf, 18)?, 1, 1)? == 1;
    if extra_channel_meaning && ch16_present {
        let extra = get_dword(buf, 26)?;
        audio.channels = get_bits(extra, 17, 5)? + 1;
    }

    audio.is_atmos = ch16_present && substreams == 4;
    Ok(())
}

/// HDMV LPCM header preceding the samples.
pub fn parse_lpcm(buf: &[u8], audio: &mut TsAudioStreamInfo) -> Result<u32, RangeError> {
    if get_byte(buf, 1)? & 0xA0 != 0xA0 {
        return Ok(0);
    }

    let header = get_byte(buf, 2)? as u32;
    audio.channels = LPCM_CHANNEL_COUNTS[get_bits(header, 8, 4)? as usize];
    if let Some(rate) = lpcm_sample_rate(get_bits(header, 4, 4)?) {
        audio.sample_rate = rate;
    }
    Ok(1)
}
