//! Program association and program map tables.

use log::debug;

use crate::process::m2ts::packet::PID_MASK;
use crate::structs::coding::StreamCoding;
use crate::structs::ts_stream::{Descriptor, StreamMap, TsStreamInfo};
use crate::utils::bytes::{get_byte, get_string, get_word};
use crate::utils::errors::RangeError;

pub const PAT_TABLE_ID: u8 = 0x00;
pub const PMT_TABLE_ID: u8 = 0x02;

const PSI_HEADER_SIZE: usize = 3;
const LONG_HEADER_SIZE: usize = 5;
const CRC_SIZE: usize = 4;
const PMT_HEADER_SIZE: usize = 4;
const ELEMENTARY_STREAM_HEADER_SIZE: usize = 5;
const SECTION_SYNTAX_INDICATOR_MASK: u16 = 0x8000;
const LENGTH_MASK: u16 = 0x3FF;
const ISO_639_LANGUAGE_DESCRIPTOR: u8 = 0x0A;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TableInformation {
    /// Start of the table body.
    offset: usize,
    /// Body length without the long header and CRC.
    data_length: usize,
}

fn common_header(
    section: &[u8],
    table_id: u8,
    payload_unit_start: bool,
) -> Result<Option<TableInformation>, RangeError> {
    let mut offset = if payload_unit_start {
        get_byte(section, 0)? as usize + 1
    } else {
        0
    };

    let found = get_byte(section, offset)?;
    if found != table_id {
        debug!("Expected table id {table_id:#04X}, found {found:#04X}");
        return Ok(None);
    }

    let header = get_word(section, offset + 1)?;
    let long_header = if header & SECTION_SYNTAX_INDICATOR_MASK != 0 {
        LONG_HEADER_SIZE
    } else {
        0
    };
    let section_length = (header & LENGTH_MASK) as usize;
    offset += PSI_HEADER_SIZE + long_header;
    if section_length + PSI_HEADER_SIZE > section.len() {
        return Ok(None);
    }

    Ok(section_length
        .checked_sub(long_header + CRC_SIZE)
        .map(|data_length| TableInformation {
            offset,
            data_length,
        }))
}

/// Program map PIDs announced by a PAT packet, `None` if the payload does
/// not hold a PAT.
pub fn parse_pat(
    payload: &[u8],
    payload_unit_start: bool,
) -> Result<Option<Vec<u16>>, RangeError> {
    let Some(table) = common_header(payload, PAT_TABLE_ID, payload_unit_start)? else {
        return Ok(None);
    };

    let mut pids = Vec::new();
    let mut i = 0;
    while i + 4 <= table.data_length {
        let program_number = get_word(payload, table.offset + i)?;
        if program_number != 0 {
            let pid = get_word(payload, table.offset + i + 2)? & PID_MASK;
            debug!("Found PMT PID {pid:#06X} for program {program_number}");
            pids.push(pid);
        }
        i += 4;
    }
    Ok(Some(pids))
}

/// Adds the elementary streams of one assembled PMT section to `streams`.
/// PIDs already known keep their state. Returns false when the section is
/// not a PMT.
pub fn parse_pmt(section: &[u8], streams: &mut StreamMap) -> Result<bool, RangeError> {
    let Some(table) = common_header(section, PMT_TABLE_ID, false)? else {
        return Ok(false);
    };

    let program_info_length = (get_word(section, table.offset + 2)? & LENGTH_MASK) as usize;
    let offset = table.offset + PMT_HEADER_SIZE;
    let end = table.data_length.saturating_sub(PMT_HEADER_SIZE);

    let mut i = program_info_length;
    while i < end {
        i += pmt_entry(section, offset + i, streams)?;
    }
    Ok(true)
}

/// Parses one elementary stream entry and returns its size.
fn pmt_entry(
    section: &[u8],
    offset: usize,
    streams: &mut StreamMap,
) -> Result<usize, RangeError> {
    let stream_type = StreamCoding::from(get_byte(section, offset)?);
    let pid = get_word(section, offset + 1)? & PID_MASK;
    let es_info_length = (get_word(section, offset + 3)? & LENGTH_MASK) as usize;

    if !streams.streams.contains_key(&pid) {
        let start = offset + ELEMENTARY_STREAM_HEADER_SIZE;
        let (descriptors, language) = descriptors(section, start, start + es_info_length)?;

        let mut info = TsStreamInfo::new(pid, stream_type);
        info.descriptors = descriptors;
        if let Some(language) = language {
            info.language = language;
        }
        debug!(
            "Found stream at offset {offset:#08X}: {stream_type} ({:#04X}), PID {pid:#06X}, language {}",
            stream_type.code(),
            info.language
        );
        streams.streams.insert(pid, info);
    }

    Ok(ELEMENTARY_STREAM_HEADER_SIZE + es_info_length)
}

fn descriptors(
    section: &[u8],
    mut offset: usize,
    end: usize,
) -> Result<(Vec<Descriptor>, Option<String>), RangeError> {
    let mut descriptors = Vec::new();
    let mut language = None;

    while offset + 2 <= end && offset < section.len() {
        let tag = get_byte(section, offset)?;
        let length = get_byte(section, offset + 1)? as usize;
        let Some(data) = section.get(offset + 2..offset + 2 + length) else {
            break;
        };

        if tag == ISO_639_LANGUAGE_DESCRIPTOR && length >= 4 {
            language = Some(get_string(section, offset + 2, 3)?);
        }
        descriptors.push(Descriptor {
            tag,
            data: data.to_vec(),
        });
        offset += 2 + length;
    }

    Ok((descriptors, language))
}
