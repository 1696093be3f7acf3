//! Vertex record layouts and decoding.
//!
//! The MODL flags select one of four fixed vertex layouts. All of them share
//! the same shape:
//!
//! - position: 3 x f32 (12 bytes)
//! - bone weights: 4 x u8, `w / 255`
//! - bone indices: 4 x u8, region-local (see the bone lookup table)
//! - normal: 4 x u8, `n * 2 / 255 - 1`; the fourth byte is not used
//! - uv block: N x u16; the first two are the UV, `uv / 2046`, V flipped
//! - tangent: 4 x u8, same mapping as the normal
//!
//! N is 2, 4, 6 or 8 depending on the layout. The uv words after the first
//! two are reserved and skipped.

use tracing::debug;
use winnow::Parser;
use winnow::binary::{le_u8, le_u16};

use crate::data::parser_utils::{
    Reference, Vec3, Vec4, WResult, parse_records, parse_vec3, skip_reserved,
};
use crate::data::tags::TagTable;
use crate::error::{M3Error, M3Result};

/// MODL flag bit set when the model carries vertex data.
pub const HAS_VERTICES: u32 = 0x20000;
/// MODL flag bits that select the vertex layout.
pub const VERTEX_VERSION_MASK: u32 = 0x1E0000;

/// The known vertex layouts, named by the length of their uv block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VertexFormat {
    UvWords2,
    UvWords4,
    UvWords6,
    UvWords8,
}

impl VertexFormat {
    pub const ALL: [VertexFormat; 4] = [
        VertexFormat::UvWords2,
        VertexFormat::UvWords4,
        VertexFormat::UvWords6,
        VertexFormat::UvWords8,
    ];

    /// Select the layout from MODL flags. Bits outside
    /// [`VERTEX_VERSION_MASK`] are ignored.
    pub fn from_flags(flags: u32) -> M3Result<Self> {
        match flags & VERTEX_VERSION_MASK {
            0x020000 => Ok(VertexFormat::UvWords2),
            0x060000 => Ok(VertexFormat::UvWords4),
            0x0A0000 => Ok(VertexFormat::UvWords6),
            0x120000 => Ok(VertexFormat::UvWords8),
            other => Err(M3Error::UnsupportedVertexVersion { flags: other }),
        }
    }

    /// The masked flag value that selects this layout.
    pub fn flags(self) -> u32 {
        match self {
            VertexFormat::UvWords2 => 0x020000,
            VertexFormat::UvWords4 => 0x060000,
            VertexFormat::UvWords6 => 0x0A0000,
            VertexFormat::UvWords8 => 0x120000,
        }
    }

    pub fn uv_block_words(self) -> usize {
        match self {
            VertexFormat::UvWords2 => 2,
            VertexFormat::UvWords4 => 4,
            VertexFormat::UvWords6 => 6,
            VertexFormat::UvWords8 => 8,
        }
    }

    /// Size of one vertex record in bytes, position included.
    pub fn stride(self) -> usize {
        12 + 4 + 4 + 4 + 2 * self.uv_block_words() + 4
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vertex {
    pub position: Vec3,
    pub bone_weights: [f32; 4],
    pub bone_indices: [u8; 4],
    pub normal: Vec3,
    pub tangent: Vec4,
    /// Texture coordinate with V already flipped into texture space.
    pub uv: [f32; 2],
}

pub fn dequantize_weight(raw: u8) -> f32 {
    f32::from(raw) / 255.0
}

/// Map a byte onto `[-1, 1]`.
pub fn dequantize_unit(raw: u8) -> f32 {
    f32::from(raw) * 2.0 / 255.0 - 1.0
}

/// Decode a raw UV pair and flip V.
pub fn dequantize_uv(raw: [u16; 2]) -> [f32; 2] {
    let u = f32::from(raw[0]) / 2046.0;
    let v = f32::from(raw[1]) / 2046.0;
    [u, 1.0 - v]
}

fn parse_byte4(input: &mut &[u8]) -> WResult<[u8; 4]> {
    let a = le_u8.parse_next(input)?;
    let b = le_u8.parse_next(input)?;
    let c = le_u8.parse_next(input)?;
    let d = le_u8.parse_next(input)?;
    Ok([a, b, c, d])
}

fn parse_vertex(format: VertexFormat) -> impl FnMut(&mut &[u8]) -> WResult<Vertex> {
    move |input: &mut &[u8]| {
        let position = parse_vec3(input)?;
        let weights = parse_byte4(input)?;
        let bone_indices = parse_byte4(input)?;
        let normal = parse_byte4(input)?;
        let u = le_u16.parse_next(input)?;
        let v = le_u16.parse_next(input)?;
        // Remaining uv words: reserved, not reverse-engineered.
        skip_reserved(input, 2 * (format.uv_block_words() - 2))?;
        let tangent = parse_byte4(input)?;

        Ok(Vertex {
            position,
            bone_weights: weights.map(dequantize_weight),
            bone_indices,
            normal: [
                dequantize_unit(normal[0]),
                dequantize_unit(normal[1]),
                dequantize_unit(normal[2]),
            ],
            tangent: tangent.map(dequantize_unit),
            uv: dequantize_uv([u, v]),
        })
    }
}

/// Decode the vertex block. The `U8__` tag's entry count is the block's byte
/// length, which must divide exactly into records of the selected layout.
pub fn decode_vertices(
    file_data: &[u8],
    tags: &TagTable,
    vertex_ref: Reference,
    vertex_flags: u32,
) -> M3Result<Vec<Vertex>> {
    let format = VertexFormat::from_flags(vertex_flags)?;
    let range = tags.resolve(vertex_ref)?;
    if range.count == 0 {
        return Ok(Vec::new());
    }
    let byte_len = tags.tag_for(vertex_ref)?.count as usize;
    let stride = format.stride();

    if byte_len % stride != 0 {
        return Err(M3Error::RecordMisalignment {
            what: "vertex block",
            len: byte_len,
            stride,
        });
    }

    let count = byte_len / stride;
    let vertices = parse_records(file_data, range.offset, count, stride, parse_vertex(format))?;
    debug!(count, stride, format = ?format, "decoded vertices");
    Ok(vertices)
}
