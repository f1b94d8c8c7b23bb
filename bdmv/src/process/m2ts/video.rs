//! Video elementary stream header analyzers.
//!
//! A single sequence header is definitive, so every analyzer reports
//! whether it found one and the caller marks the stream completed.

use log::trace;

use crate::structs::ts_stream::TsVideoStreamInfo;
use crate::utils::bitstream_io::BitReader;
use crate::utils::bytes::{find, get_bits, get_bits64, get_byte, get_dword, get_word};
use crate::utils::errors::RangeError;

const NAL_START_CODE: [u8; 3] = [0x00, 0x00, 0x01];
const VC1_SEQUENCE_HEADER: [u8; 4] = [0x00, 0x00, 0x01, 0x0F];
const MPEG2_SEQUENCE_HEADER: [u8; 4] = [0x00, 0x00, 0x01, 0xB3];

const H264_PROFILE_MAIN: u32 = 77;
const H264_PROFILE_HIGH: u32 = 100;
const H264_NAL_SEI: u32 = 6;
const H264_NAL_SPS: u32 = 7;
const H264_PREFIX_NAL_UNIT: u32 = 14;
const H264_CODED_SLICE_EXTENSION: u32 = 20;
const H264_CODED_SLICE_EXTENSION_DEPTH_VIEW: u32 = 21;
const H265_NAL_SPS: u32 = 33;
const H265_NAL_SEI_PREFIX: u32 = 39;
const H265_NAL_SEI_SUFFIX: u32 = 40;
const DOLBY_VISION_RPU: u32 = 62;
const DOLBY_VISION_RPU_HEADER: u32 = 0x7C01;
const DOLBY_VISION_EL: u32 = 63;
const DOLBY_VISION_EL_HEADER: u32 = 0x7E01;

const EXTENDED_SAR: u32 = 255;

// Syntax element limits, taken from the highest levels of each codec.
const MAX_BIT_DEPTH_MINUS8: u32 = 8;
const MAX_DPB_SIZE: u32 = 16;
const MAX_SHORT_TERM_REF_PIC_SETS: u32 = 64;
const H265_MAX_LUMA_DIMENSION: u32 = 16888;
const H264_MAX_DIMENSION_IN_MBS: u32 = 1055;
const VC1_EXTENDED_SAR: u64 = 15;

const SEI_REGISTERED_ITU_T_T35: u32 = 4;
const SEI_UNREGISTERED: u32 = 5;
const SEI_MASTERING_DISPLAY_COLOUR_VOLUME: u32 = 137;
const SEI_CONTENT_LIGHT_LEVEL_INFO: u32 = 144;

const ITU_T_T35_COUNTRY_USA: u8 = 0xB5;
const ITU_T_T35_PROVIDER_DOLBY: u16 = 0x003B;
const ITU_T_T35_PROVIDER_SAMSUNG: u16 = 0x003C;

const DOLBY_VISION_PROFILE_7_UUID: [u8; 16] = [
    0x17, 0xFC, 0x11, 0xB4, 0x2D, 0xE2, 0x4E, 0x96, 0xA9, 0xA4, 0x23, 0xE0, 0xD9, 0x01, 0x68, 0xE9,
];

/// Sample aspect ratios indexed by `aspect_ratio_idc`.
const ASPECT_RATIOS: [f64; 17] = [
    0.0,
    1.0,
    12.0 / 11.0,
    10.0 / 11.0,
    16.0 / 11.0,
    40.0 / 33.0,
    24.0 / 11.0,
    20.0 / 11.0,
    32.0 / 11.0,
    80.0 / 33.0,
    18.0 / 11.0,
    15.0 / 11.0,
    64.0 / 33.0,
    160.0 / 99.0,
    4.0 / 3.0,
    3.0 / 2.0,
    2.0,
];

const MPEG2_DISPLAY_ASPECT_RATIOS: [f64; 5] = [0.0, 1.0, 3.0 / 4.0, 9.0 / 16.0, 1.0 / 2.21];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    H264,
    H265,
}

fn vc1_aspect_ratio(index: u64) -> f64 {
    match index {
        0..=13 => ASPECT_RATIOS[index as usize],
        _ => 0.0,
    }
}

/// Strips `00 00 03` emulation prevention from a NAL unit payload. The
/// leading header-sized bytes are copied as is.
pub fn remove_emulation_prevention(buf: &[u8], codec: VideoCodec) -> Vec<u8> {
    if buf.len() < 3 {
        return buf.to_vec();
    }

    let header = match codec {
        VideoCodec::H264 => 1,
        VideoCodec::H265 => 2,
    };
    let mut unit = Vec::with_capacity(buf.len());
    unit.extend_from_slice(&buf[..header]);

    let mut pos = header;
    while pos < buf.len() {
        let Some(zero) = buf[pos..].iter().position(|&b| b == 0).map(|z| z + pos) else {
            unit.extend_from_slice(&buf[pos..]);
            break;
        };
        unit.extend_from_slice(&buf[pos..zero]);
        if buf.get(zero + 1) == Some(&0x00) && buf.get(zero + 2) == Some(&0x03) {
            unit.extend_from_slice(&[0x00, 0x00]);
            pos = zero + 3;
        } else {
            unit.push(0x00);
            pos = zero + 1;
        }
    }
    unit
}

/// Walks the NAL units of an H.264 or H.265 payload. Returns true once a
/// sequence parameter set was parsed.
pub fn parse_nal(
    buf: &[u8],
    codec: VideoCodec,
    video: &mut TsVideoStreamInfo,
) -> Result<bool, RangeError> {
    if buf.len() < 4 {
        return Ok(false);
    }

    let mut sps_found = false;
    let mut offset = 0;
    while let Some(start) = find(buf, offset, &NAL_START_CODE) {
        if buf.len() - start < 5 {
            break;
        }

        let mut pos = start + NAL_START_CODE.len();
        let end = find(buf, pos, &NAL_START_CODE);

        let (nal_unit_type, header) = match codec {
            VideoCodec::H264 => {
                let header = get_byte(buf, pos)? as u32;
                pos += 1;
                (get_bits(header, 5, 5)?, header)
            }
            VideoCodec::H265 => {
                let header = get_word(buf, pos)? as u32;
                pos += 2;
                if get_bits(header, 9, 6)? > 0 {
                    video.is_enhancement_layer = true;
                }
                (get_bits(header, 15, 6)?, header)
            }
        };
        trace!("NAL unit type {nal_unit_type}");

        if codec == VideoCodec::H264 {
            pos = check_for_3d(buf, pos, nal_unit_type, video)?;
        }

        let stop = end.unwrap_or(buf.len());
        let payload = buf.get(pos..stop).unwrap_or_default();
        let unit = remove_emulation_prevention(payload, codec);
        sps_found |= process_nal_unit(&unit, codec, nal_unit_type, header, video)?;

        match end {
            Some(end) => offset = end,
            None => break,
        }
    }
    Ok(sps_found)
}

/// MVC and 3D-AVC markers in the NAL unit header extension. Returns the
/// position past the extension.
fn check_for_3d(
    buf: &[u8],
    pos: usize,
    nal_unit_type: u32,
    video: &mut TsVideoStreamInfo,
) -> Result<usize, RangeError> {
    if !matches!(
        nal_unit_type,
        H264_PREFIX_NAL_UNIT | H264_CODED_SLICE_EXTENSION | H264_CODED_SLICE_EXTENSION_DEPTH_VIEW
    ) {
        return Ok(pos);
    }

    let extension_flag = get_bits(get_byte(buf, pos)? as u32, 8, 1)? == 1;
    let depth_view = nal_unit_type == H264_CODED_SLICE_EXTENSION_DEPTH_VIEW;
    if depth_view && extension_flag {
        video.is_3d = true;
        return Ok(pos + 2);
    }
    if !depth_view && !extension_flag {
        video.is_3d = true;
    }
    Ok(pos + 3)
}

fn process_nal_unit(
    unit: &[u8],
    codec: VideoCodec,
    nal_unit_type: u32,
    header: u32,
    video: &mut TsVideoStreamInfo,
) -> Result<bool, RangeError> {
    match (codec, nal_unit_type) {
        (VideoCodec::H264, H264_NAL_SPS) => return parse_h264_sps(unit, video),
        (VideoCodec::H265, H265_NAL_SPS) => return parse_h265_sps(unit, video),
        (VideoCodec::H264, H264_NAL_SEI)
        | (VideoCodec::H265, H265_NAL_SEI_PREFIX | H265_NAL_SEI_SUFFIX) => {
            parse_sei(unit, video)?
        }
        (VideoCodec::H265, DOLBY_VISION_RPU) if header == DOLBY_VISION_RPU_HEADER => {
            video.dolby_vision = true;
        }
        (VideoCodec::H265, DOLBY_VISION_EL) if header == DOLBY_VISION_EL_HEADER => {
            video.dolby_vision = true;
        }
        _ => {}
    }
    Ok(false)
}

fn skip_profile_tier_level(
    br: &mut BitReader<'_>,
    profile_present: bool,
    max_sub_layers_minus1: u32,
) -> Result<(), RangeError> {
    if profile_present {
        br.skip_bits(88)?;
    }
    br.skip_bits(8)?; // general_level_idc

    let mut sub_layers = Vec::with_capacity(max_sub_layers_minus1 as usize);
    for _ in 0..max_sub_layers_minus1 {
        sub_layers.push((br.read_bit()?, br.read_bit()?));
    }
    if max_sub_layers_minus1 > 0 {
        br.skip_bits((8 - max_sub_layers_minus1) * 2)?;
    }
    for (profile, level) in sub_layers {
        if profile {
            br.skip_bits(88)?;
        }
        if level {
            br.skip_bits(8)?;
        }
    }
    Ok(())
}

fn skip_scaling_list_data(br: &mut BitReader<'_>) -> Result<(), RangeError> {
    for size_id in 0..4u32 {
        let matrices = if size_id == 3 { 2 } else { 6 };
        for _ in 0..matrices {
            if !br.read_bit()? {
                br.skip_ue()?; // scaling_list_pred_matrix_id_delta
                continue;
            }
            let coefficients = 64.min(1 << (4 + (size_id << 1)));
            if size_id > 1 {
                br.skip_se()?; // scaling_list_dc_coef_minus8
            }
            for _ in 0..coefficients {
                br.skip_se()?;
            }
        }
    }
    Ok(())
}

fn skip_short_term_ref_pic_set(
    br: &mut BitReader<'_>,
    index: u32,
    num_sets: u32,
) -> Result<(), RangeError> {
    if index != 0 && br.read_bit()? {
        if index == num_sets {
            br.skip_ue()?; // delta_idx_minus1
        }
        br.skip_bits(1)?; // delta_rps_sign
        br.skip_ue()?; // abs_delta_rps_minus1
        return Ok(());
    }

    let negative = br.read_ue_max("num_negative_pics", MAX_DPB_SIZE)?;
    let positive = br.read_ue_max("num_positive_pics", MAX_DPB_SIZE)?;
    for _ in 0..negative + positive {
        br.skip_ue()?; // delta_poc_minus1
        br.skip_bits(1)?; // used_by_curr_pic_flag
    }
    Ok(())
}

/// Sample aspect ratio from the VUI, 0 when absent.
fn parse_vui(br: &mut BitReader<'_>) -> Result<f64, RangeError> {
    if !br.read_bit()? {
        return Ok(0.0);
    }
    let idc = br.read_bits(8)?;
    if idc == EXTENDED_SAR {
        let width = br.read_bits(16)?;
        let height = br.read_bits(16)?;
        return Ok(if height > 0 {
            width as f64 / height as f64
        } else {
            0.0
        });
    }
    Ok(ASPECT_RATIOS.get(idc as usize).copied().unwrap_or(0.0))
}

pub fn parse_h265_sps(buf: &[u8], video: &mut TsVideoStreamInfo) -> Result<bool, RangeError> {
    trace!("Parsing H.265 SPS");
    let mut br = BitReader::new(buf);

    br.skip_bits(4)?; // sps_video_parameter_set_id
    let max_sub_layers_minus1 = br.read_bits(3)?;
    br.skip_bits(1)?; // sps_temporal_id_nesting_flag
    skip_profile_tier_level(&mut br, true, max_sub_layers_minus1)?;

    br.skip_ue()?; // sps_seq_parameter_set_id
    let chroma_format_idc = br.read_ue()?;
    if chroma_format_idc == 3 {
        br.skip_bits(1)?; // separate_colour_plane_flag
    }

    let mut width = br.read_ue_max("pic_width_in_luma_samples", H265_MAX_LUMA_DIMENSION)?;
    let mut height = br.read_ue_max("pic_height_in_luma_samples", H265_MAX_LUMA_DIMENSION)?;
    if br.read_bit()? {
        let left = br.read_ue_max("conf_win_left_offset", width)?;
        let right = br.read_ue_max("conf_win_right_offset", width)?;
        let top = br.read_ue_max("conf_win_top_offset", height)?;
        let bottom = br.read_ue_max("conf_win_bottom_offset", height)?;
        let sub_width = if matches!(chroma_format_idc, 1 | 2) { 2 } else { 1 };
        let sub_height = if chroma_format_idc == 1 { 2 } else { 1 };
        width = width.saturating_sub((left + right) * sub_width);
        height = height.saturating_sub((top + bottom) * sub_height);
    }
    video.width = width;
    video.height = height;
    video.bit_depth = br.read_ue_max("bit_depth_luma_minus8", MAX_BIT_DEPTH_MINUS8)? + 8;

    br.skip_ue()?; // bit_depth_chroma_minus8
    br.skip_ue()?; // log2_max_pic_order_cnt_lsb_minus4

    let first = if br.read_bit()? { 0 } else { max_sub_layers_minus1 };
    for _ in first..=max_sub_layers_minus1 {
        br.skip_ue()?; // sps_max_dec_pic_buffering_minus1
        br.skip_ue()?; // sps_max_num_reorder_pics
        br.skip_ue()?; // sps_max_latency_increase_plus1
    }

    for _ in 0..6 {
        br.skip_ue()?; // coding and transform block sizes, hierarchy depths
    }

    if br.read_bit()? && br.read_bit()? {
        skip_scaling_list_data(&mut br)?;
    }

    br.skip_bits(2)?; // amp_enabled_flag, sample_adaptive_offset_enabled_flag
    if br.read_bit()? {
        br.skip_bits(8)?; // pcm sample bit depths
        br.skip_ue()?;
        br.skip_ue()?;
        br.skip_bits(1)?; // pcm_loop_filter_disabled_flag
    }

    let num_short_term_ref_pic_sets =
        br.read_ue_max("num_short_term_ref_pic_sets", MAX_SHORT_TERM_REF_PIC_SETS)?;
    for i in 0..num_short_term_ref_pic_sets {
        skip_short_term_ref_pic_set(&mut br, i, num_short_term_ref_pic_sets)?;
    }

    if br.read_bit()? {
        for _ in 0..br.read_ue_max("num_long_term_ref_pics_sps", 32)? {
            br.skip_ue()?; // lt_ref_pic_poc_lsb_sps
            br.skip_bits(1)?; // used_by_curr_pic_lt_sps_flag
        }
    }

    br.skip_bits(2)?; // sps_temporal_mvp_enabled_flag, strong_intra_smoothing_enabled_flag
    if br.read_bit()? {
        video.aspect_ratio = parse_vui(&mut br)?;
    }
    Ok(true)
}

/// Only Main and High profile, the ones Blu-ray allows, are parsed.
pub fn parse_h264_sps(buf: &[u8], video: &mut TsVideoStreamInfo) -> Result<bool, RangeError> {
    trace!("Parsing H.264 SPS");
    let mut br = BitReader::new(buf);

    let profile_idc = br.read_bits(8)?;
    br.skip_bits(16)?; // constraint flags, level_idc
    br.skip_ue()?; // seq_parameter_set_id

    match profile_idc {
        H264_PROFILE_HIGH => {
            let chroma_format = br.read_ue()?;
            if chroma_format == 3 {
                br.skip_bits(1)?;
            }
            video.bit_depth = br.read_ue_max("bit_depth_luma_minus8", MAX_BIT_DEPTH_MINUS8)? + 8;
            br.skip_ue()?; // bit_depth_chroma_minus8
            br.skip_bits(1)?; // qpprime_y_zero_transform_bypass_flag
            if br.read_bit()? {
                br.skip_bits(if chroma_format != 3 { 8 } else { 12 })?;
            }
        }
        H264_PROFILE_MAIN => video.bit_depth = 8,
        _ => return Ok(false),
    }

    br.skip_ue()?; // log2_max_frame_num_minus4
    match br.read_ue()? {
        0 => br.skip_ue()?, // log2_max_pic_order_cnt_lsb_minus4
        1 => {
            br.skip_bits(1)?; // delta_pic_order_always_zero_flag
            br.skip_se()?; // offset_for_non_ref_pic
            br.skip_se()?; // offset_for_top_to_bottom_field
            for _ in 0..br.read_ue_max("num_ref_frames_in_pic_order_cnt_cycle", 255)? {
                br.skip_se()?;
            }
        }
        _ => {}
    }

    br.skip_ue()?; // max_num_ref_frames
    br.skip_bits(1)?; // gaps_in_frame_num_value_allowed_flag

    let width_in_mbs = br.read_ue_max("pic_width_in_mbs_minus1", H264_MAX_DIMENSION_IN_MBS)? + 1;
    let height_in_map_units =
        br.read_ue_max("pic_height_in_map_units_minus1", H264_MAX_DIMENSION_IN_MBS)? + 1;
    let frame_mbs_only = br.read_bit()?;
    if !frame_mbs_only {
        br.skip_bits(1)?; // mb_adaptive_frame_field_flag
    }
    br.skip_bits(1)?; // direct_8x8_inference_flag

    let (mut left, mut right, mut top, mut bottom) = (0, 0, 0, 0);
    if br.read_bit()? {
        left = br.read_ue_max("frame_crop_left_offset", width_in_mbs * 8)?;
        right = br.read_ue_max("frame_crop_right_offset", width_in_mbs * 8)?;
        top = br.read_ue_max("frame_crop_top_offset", height_in_map_units * 16)?;
        bottom = br.read_ue_max("frame_crop_bottom_offset", height_in_map_units * 16)?;
    }

    let field_factor = if frame_mbs_only { 1 } else { 2 };
    video.width = (width_in_mbs * 16).saturating_sub((left + right) * 2);
    video.height = (field_factor * height_in_map_units * 16).saturating_sub((top + bottom) * 2);

    if br.read_bit()? {
        video.aspect_ratio = parse_vui(&mut br)?;
    }
    Ok(true)
}

/// `ff`-extended payload type or size.
fn sei_number(buf: &[u8], offset: &mut usize) -> Option<u32> {
    let mut value: u32 = 0;
    while *buf.get(*offset)? == 0xFF {
        value = value.saturating_add(255);
        *offset += 1;
    }
    value += buf[*offset] as u32;
    *offset += 1;
    Some(value)
}

fn parse_itu_t_t35(buf: &[u8], video: &mut TsVideoStreamInfo) -> Result<(), RangeError> {
    if buf.len() < 3 {
        return Ok(());
    }
    if get_byte(buf, 0)? != ITU_T_T35_COUNTRY_USA {
        return Ok(());
    }
    match get_word(buf, 1)? {
        ITU_T_T35_PROVIDER_SAMSUNG => video.hdr10_plus = true,
        ITU_T_T35_PROVIDER_DOLBY => video.dolby_vision = true,
        _ => {}
    }
    Ok(())
}

/// HDR10 static metadata, HDR10+ and Dolby Vision markers in SEI messages.
pub fn parse_sei(buf: &[u8], video: &mut TsVideoStreamInfo) -> Result<(), RangeError> {
    if buf.len() < 2 {
        return Ok(());
    }

    let mut offset = 0;
    while offset < buf.len() - 2 {
        let Some(payload_type) = sei_number(buf, &mut offset) else {
            break;
        };
        let Some(payload_size) = sei_number(buf, &mut offset) else {
            break;
        };
        trace!("SEI payload type {payload_type}, {payload_size} bytes");

        match payload_type {
            SEI_MASTERING_DISPLAY_COLOUR_VOLUME | SEI_CONTENT_LIGHT_LEVEL_INFO => {
                video.hdr10 = true;
            }
            SEI_UNREGISTERED => {
                if buf.get(offset..offset + 16) == Some(&DOLBY_VISION_PROFILE_7_UUID[..]) {
                    video.dolby_vision = true;
                }
            }
            SEI_REGISTERED_ITU_T_T35 => {
                parse_itu_t_t35(buf.get(offset..).unwrap_or_default(), video)?;
            }
            _ => {}
        }
        offset += payload_size as usize;
    }
    Ok(())
}

/// VC-1 Advanced Profile sequence header.
pub fn parse_vc1(buf: &[u8], video: &mut TsVideoStreamInfo) -> Result<bool, RangeError> {
    let Some(start) = find(buf, 0, &VC1_SEQUENCE_HEADER) else {
        return Ok(false);
    };
    if buf.len() - start < 8 {
        return Ok(false);
    }
    trace!("Parsing VC-1 sequence header");

    let offset = start + VC1_SEQUENCE_HEADER.len();
    if get_bits(get_word(buf, offset)? as u32, 16, 2)? != 3 {
        return Ok(false);
    }

    let header = get_dword(buf, offset + 2)?;
    video.width = (get_bits(header, 32, 12)? + 1) * 2;
    video.height = (get_bits(header, 20, 12)? + 1) * 2;

    if get_bits(header, 2, 1)? == 1 {
        let display = ((header as u64) << 32) | get_dword(buf, offset + 6)? as u64;
        video.width = get_bits64(display, 33, 14)? as u32 + 1;
        video.height = get_bits64(display, 19, 14)? as u32 + 1;
        if get_bits64(display, 5, 1)? == 1 {
            let aspect_ratio = get_bits64(display, 4, 4)?;
            video.aspect_ratio = if aspect_ratio == VC1_EXTENDED_SAR {
                let sar = get_dword(buf, offset + 10)?;
                let horizontal = get_bits(sar, 32, 8)?;
                let vertical = get_bits(sar, 24, 8)?;
                if vertical > 0 {
                    horizontal as f64 / vertical as f64
                } else {
                    0.0
                }
            } else {
                vc1_aspect_ratio(aspect_ratio)
            };
        }
    }

    video.bit_depth = 8;
    Ok(true)
}

pub fn parse_mpeg2(buf: &[u8], video: &mut TsVideoStreamInfo) -> Result<bool, RangeError> {
    let Some(start) = find(buf, 0, &MPEG2_SEQUENCE_HEADER) else {
        return Ok(false);
    };
    if buf.len() - start < 8 {
        return Ok(false);
    }
    trace!("Parsing MPEG-2 sequence header");

    let header = get_dword(buf, start + MPEG2_SEQUENCE_HEADER.len())?;
    let width = get_bits(header, 32, 12)?;
    let height = get_bits(header, 20, 12)?;
    video.width = width;
    video.height = height;

    let aspect_ratio_information = get_bits(header, 8, 4)? as usize;
    match MPEG2_DISPLAY_ASPECT_RATIOS.get(aspect_ratio_information) {
        Some(&ratio) if aspect_ratio_information < 2 => video.aspect_ratio = ratio,
        Some(&ratio) => {
            video.aspect_ratio = if height > 0 {
                ratio * width as f64 / height as f64
            } else {
                0.0
            }
        }
        None => {}
    }

    video.bit_depth = 8;
    Ok(true)
}
