//! H.264 NAL classification and SPS inspection

use bitstream_io::{BigEndian, BitRead, BitReader};
use serde::Serialize;

use super::utils::{remove_ep, se, ue};
use crate::constants::{NAL_IDR, NAL_OFFSET, NAL_P_FRAME, NAL_PPS, NAL_SPS};

/// NAL unit kind read from the header byte after a 4-byte start prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NalKind {
    Sps,
    Pps,
    Idr,
    PFrame,
    Other(u8),
    /// Payload too short to carry a NAL header.
    Empty,
}

impl NalKind {
    pub fn classify(payload: &[u8]) -> Self {
        match payload.get(NAL_OFFSET) {
            None => NalKind::Empty,
            Some(&NAL_SPS) => NalKind::Sps,
            Some(&NAL_PPS) => NalKind::Pps,
            Some(&NAL_IDR) => NalKind::Idr,
            Some(&NAL_P_FRAME) => NalKind::PFrame,
            Some(&b) => NalKind::Other(b),
        }
    }
}

/// Coded picture parameters taken from a sequence parameter set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpsInfo {
    pub profile_idc: u8,
    pub level_idc:   u8,
    pub width:       u32,
    pub height:      u32,
    pub chroma:      &'static str,
    pub interlaced:  bool,
}

/// Parses the SPS carried by a payload already classified as [`NalKind::Sps`].
pub fn parse_sps_payload(payload: &[u8]) -> Option<SpsInfo> {
    parse_avc_sps(payload.get(NAL_OFFSET + 1..)?)
}

fn parse_avc_sps(raw: &[u8]) -> Option<SpsInfo> {
    let rbsp = remove_ep(raw);
    let mut br = BitReader::endian(&rbsp[..], BigEndian);

    let profile_idc = br.read::<8, u8>().ok()?;
    br.skip(8).ok()?;                               // constraint flags
    let level_idc = br.read::<8, u8>().ok()?;
    ue(&mut br)?;                                   // seq_parameter_set_id

    let mut chroma_format_idc = 1;
    if matches!(
        profile_idc,
        100 | 110 | 122 | 244 | 44 | 83 | 86 | 118 | 128 | 138 | 139 | 134 | 135
    ) {
        chroma_format_idc = ue(&mut br)?;
        if chroma_format_idc == 3 {
            br.skip(1).ok()?; // separate_colour_plane_flag
        }
        ue(&mut br)?; // bit_depth_luma_minus8
        ue(&mut br)?; // bit_depth_chroma_minus8
        br.skip(1).ok()?; // qpprime_y_zero_transform_bypass_flag

        if br.read::<1, u8>().ok()? != 0 {
            let lists = if chroma_format_idc == 3 { 12 } else { 8 };
            for idx in 0..lists {
                if br.read::<1, u8>().ok()? != 0 {
                    skip_scaling_list(&mut br, if idx < 6 { 16 } else { 64 })?;
                }
            }
        }
    }

    ue(&mut br)?; // log2_max_frame_num_minus4
    match ue(&mut br)? {
        0 => {
            ue(&mut br)?; // log2_max_pic_order_cnt_lsb_minus4
        }
        1 => {
            br.skip(1).ok()?; // delta_pic_order_always_zero_flag
            se(&mut br)?;
            se(&mut br)?;
            let n = ue(&mut br)?;
            for _ in 0..n {
                se(&mut br)?;
            }
        }
        _ => {}
    }
    ue(&mut br)?; // max_num_ref_frames
    br.skip(1).ok()?; // gaps_in_frame_num_value_allowed_flag

    let pic_width_in_mbs_minus1 = ue(&mut br)?;
    let pic_height_in_map_units_minus1 = ue(&mut br)?;
    let frame_mbs_only_flag = br.read::<1, u8>().ok()? != 0;
    if !frame_mbs_only_flag {
        br.skip(1).ok()?; // mb_adaptive_frame_field_flag
    }
    br.skip(1).ok()?; // direct_8x8_inference_flag

    let (crop_l, crop_r, crop_t, crop_b) = if br.read::<1, u8>().ok()? != 0 {
        (ue(&mut br)?, ue(&mut br)?, ue(&mut br)?, ue(&mut br)?)
    } else {
        (0, 0, 0, 0)
    };

    let field_factor = 2 - u32::from(frame_mbs_only_flag);
    let crop_unit_x = match chroma_format_idc {
        0 | 3 => 1,
        _ => 2,
    };
    let crop_unit_y = match chroma_format_idc {
        0 | 3 => field_factor,
        _ => 2 * field_factor,
    };

    let width = pic_width_in_mbs_minus1
        .checked_add(1)?
        .checked_mul(16)?
        .checked_sub(crop_l.checked_add(crop_r)?.checked_mul(crop_unit_x)?)?;
    let height = pic_height_in_map_units_minus1
        .checked_add(1)?
        .checked_mul(16 * field_factor)?
        .checked_sub(crop_t.checked_add(crop_b)?.checked_mul(crop_unit_y)?)?;

    Some(SpsInfo {
        profile_idc,
        level_idc,
        width,
        height,
        chroma: match chroma_format_idc {
            0 => "4:0:0",
            1 => "4:2:0",
            2 => "4:2:2",
            3 => "4:4:4",
            _ => "?",
        },
        interlaced: !frame_mbs_only_flag,
    })
}

fn skip_scaling_list<R: std::io::Read>(br: &mut BitReader<R, BigEndian>, size: usize) -> Option<()> {
    let mut last = 8i32;
    let mut next = 8i32;
    for _ in 0..size {
        if next != 0 {
            next = (last + se(br)? + 256) % 256;
        }
        if next != 0 {
            last = next;
        }
    }
    Some(())
}
