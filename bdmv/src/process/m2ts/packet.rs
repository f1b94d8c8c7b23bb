//! Transport packet framing and payload reassembly.

use crate::utils::bytes::{get_bits, get_byte, get_word};
use crate::utils::errors::RangeError;

pub const SYNC_BYTE: u8 = 0x47;
pub const TS_HEADER_SIZE: usize = 4;
pub const PES_HEADER_SIZE: usize = 9;
const PES_HEADER_LENGTH_OFFSET: usize = 8;
const ADAPTATION_FIELD_MASK: u8 = 0x02;
const PAYLOAD_MASK: u8 = 0x01;
const SECTION_LENGTH_MASK: u16 = 0x3FF;
pub const PID_MASK: u16 = 0x1FFF;

/// Stream ids whose PES packets carry no elementary stream data.
const SYSTEM_STREAM_IDS: [u8; 8] = [0xBC, 0xBE, 0xBF, 0xF0, 0xF1, 0xF2, 0xF8, 0xFF];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TsPacket<'a> {
    pub pid: u16,
    pub payload_unit_start: bool,
    pub continuity_counter: u8,
    /// Empty when the adaptation field control signals no payload.
    pub payload: &'a [u8],
}

impl<'a> TsPacket<'a> {
    /// Parses one 188-byte transport packet. `None` when the sync byte is
    /// wrong or the adaptation field runs past the packet.
    pub fn parse(packet: &'a [u8]) -> Result<Option<Self>, RangeError> {
        if get_byte(packet, 0)? != SYNC_BYTE {
            return Ok(None);
        }

        let header = get_word(packet, 1)? as u32;
        let payload_unit_start = get_bits(header, 15, 1)? == 1;
        let pid = get_bits(header, 13, 13)? as u16;
        let control = get_byte(packet, 3)? as u32;
        let adaptation_field_control = get_bits(control, 6, 2)? as u8;
        let continuity_counter = get_bits(control, 4, 4)? as u8;

        let mut start = TS_HEADER_SIZE;
        if adaptation_field_control & ADAPTATION_FIELD_MASK != 0 {
            start += get_byte(packet, 4)? as usize + 1;
        }
        if start > packet.len() {
            return Ok(None);
        }

        let payload = if adaptation_field_control & PAYLOAD_MASK != 0 {
            &packet[start..]
        } else {
            &[]
        };

        Ok(Some(Self {
            pid,
            payload_unit_start,
            continuity_counter,
            payload,
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PesPacket<'a> {
    pub stream_id: u8,
    /// Elementary stream bytes after the optional PES header.
    pub data: &'a [u8],
}

impl<'a> PesPacket<'a> {
    /// `None` for anything that is not a PES packet of an elementary stream.
    pub fn parse(packet: &'a [u8]) -> Option<Self> {
        if packet.len() < PES_HEADER_SIZE || !packet.starts_with(&[0x00, 0x00, 0x01]) {
            return None;
        }
        let stream_id = packet[3];
        if SYSTEM_STREAM_IDS.contains(&stream_id) {
            return None;
        }
        let offset = PES_HEADER_SIZE + packet[PES_HEADER_LENGTH_OFFSET] as usize;
        let data = packet.get(offset..)?;
        Some(Self { stream_id, data })
    }
}

/// Rebuilds PSI sections that span several transport packets.
#[derive(Debug, Clone, Default)]
pub struct SectionAssembler {
    buffer: Vec<u8>,
    needed: usize,
}

impl SectionAssembler {
    /// Feeds one packet payload and returns every section it completes.
    ///
    /// A payload unit start resets any partial section and honours the
    /// pointer field; several short sections may finish in one packet.
    pub fn push(
        &mut self,
        payload: &[u8],
        payload_unit_start: bool,
    ) -> Result<Vec<Vec<u8>>, RangeError> {
        let mut sections = Vec::new();
        if payload.is_empty() {
            return Ok(sections);
        }

        let (mut start, mut pointer) = if payload_unit_start {
            self.buffer.clear();
            self.needed = 0;
            (1, get_byte(payload, 0)? as usize)
        } else {
            (0, 0)
        };

        let len = payload.len();
        while start + pointer < len {
            let offset = start + pointer;
            if self.needed == 0 {
                if offset + 3 > len {
                    break;
                }
                let section_length = get_word(payload, offset + 1)? & SECTION_LENGTH_MASK;
                self.needed = section_length as usize + 3;
            }

            let available = len - offset;
            if available < self.needed {
                self.buffer.extend_from_slice(&payload[offset..]);
                self.needed -= available;
                break;
            }

            self.buffer.extend_from_slice(&payload[offset..offset + self.needed]);
            sections.push(std::mem::take(&mut self.buffer));
            start = offset + self.needed;
            self.needed = 0;
            pointer = 0;
        }

        Ok(sections)
    }
}

/// Rebuilds PES packets of one PID, dropping partial data on a continuity
/// counter gap.
#[derive(Debug, Clone, Default)]
pub struct PesAssembler {
    buffer: Vec<u8>,
    last_counter: Option<u8>,
    started: bool,
}

impl PesAssembler {
    /// A PES packet is emitted when the next payload unit starts.
    pub fn push(&mut self, packet: &TsPacket<'_>) -> Vec<Vec<u8>> {
        let mut packets = Vec::new();

        if let Some(last) = self.last_counter {
            if packet.continuity_counter != (last + 1) & 0x0F {
                log::trace!(
                    "PID {:#06X}: continuity counter {} after {last}, dropping partial PES",
                    packet.pid,
                    packet.continuity_counter
                );
                self.buffer.clear();
                self.started = false;
            }
        }
        self.last_counter = Some(packet.continuity_counter);

        if packet.payload_unit_start {
            if !self.buffer.is_empty() {
                packets.push(std::mem::take(&mut self.buffer));
            }
            self.started = true;
        }

        if self.started {
            self.buffer.extend_from_slice(packet.payload);
        }

        packets
    }
}
