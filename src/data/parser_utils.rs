//! Shared winnow-based parsing utilities used by the tag table, MODL, vertex,
//! bone and material parsers.
//!
//! All multi-byte values in an M3 file are little-endian. Record readers here
//! never index into file data directly: every record is bounds-checked with
//! [`record_bytes`] first, so a short file surfaces as
//! [`M3Error::TruncatedInput`] instead of a panic.

use winnow::Parser;
use winnow::binary::{le_f32, le_u16, le_u32};
use winnow::error::ContextError;
use winnow::token::take;

use crate::error::{M3Error, M3Result};

/// Common result type for winnow parsers.
pub type WResult<T> = Result<T, winnow::error::ErrMode<ContextError>>;

pub type Vec3 = [f32; 3];
pub type Vec4 = [f32; 4];

/// Size of a [`Reference`] on disk.
pub const REFERENCE_SIZE: usize = 8;
/// Size of an [`AnimReference`] on disk.
pub const ANIM_REFERENCE_SIZE: usize = 8;

/// A `(count, tag index)` pair. This is the format's only pointer mechanism:
/// the byte offset lives in the tag table, the count travels with the reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reference {
    pub entry_count: u32,
    pub tag_index: u32,
}

impl Reference {
    /// References with no entries point at nothing, whatever their tag index says.
    pub fn is_absent(&self) -> bool {
        self.entry_count == 0
    }
}

/// Identifies the animation track that drives a bone property.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnimReference {
    pub flags: u16,
    pub anim_flags: u16,
    pub anim_id: u32,
}

/// Rotation in logical `(w, x, y, z)` order.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn to_array(self) -> [f32; 4] {
        [self.w, self.x, self.y, self.z]
    }
}

/// Row-major 4x4 float matrix, as stored.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Matrix4x4(pub [[f32; 4]; 4]);

pub fn parse_reference(input: &mut &[u8]) -> WResult<Reference> {
    let entry_count = le_u32.parse_next(input)?;
    let tag_index = le_u32.parse_next(input)?;
    Ok(Reference {
        entry_count,
        tag_index,
    })
}

pub fn parse_anim_reference(input: &mut &[u8]) -> WResult<AnimReference> {
    let flags = le_u16.parse_next(input)?;
    let anim_flags = le_u16.parse_next(input)?;
    let anim_id = le_u32.parse_next(input)?;
    Ok(AnimReference {
        flags,
        anim_flags,
        anim_id,
    })
}

pub fn parse_vec3(input: &mut &[u8]) -> WResult<Vec3> {
    let x = le_f32.parse_next(input)?;
    let y = le_f32.parse_next(input)?;
    let z = le_f32.parse_next(input)?;
    Ok([x, y, z])
}

pub fn parse_vec4(input: &mut &[u8]) -> WResult<Vec4> {
    let x = le_f32.parse_next(input)?;
    let y = le_f32.parse_next(input)?;
    let z = le_f32.parse_next(input)?;
    let w = le_f32.parse_next(input)?;
    Ok([x, y, z, w])
}

/// Quaternions are stored `x, y, z, w`; this moves `w` to the front.
pub fn parse_quaternion(input: &mut &[u8]) -> WResult<Quaternion> {
    let [x, y, z, w] = parse_vec4(input)?;
    Ok(Quaternion { w, x, y, z })
}

pub fn parse_matrix(input: &mut &[u8]) -> WResult<Matrix4x4> {
    let mut rows = [[0.0f32; 4]; 4];
    for row in rows.iter_mut() {
        *row = parse_vec4(input)?;
    }
    Ok(Matrix4x4(rows))
}

/// Skip a reserved region. These are fields that have not been
/// reverse-engineered; their size is fixed by the record layout.
pub fn skip_reserved(input: &mut &[u8], len: usize) -> WResult<()> {
    let _: &[u8] = take(len).parse_next(input)?;
    Ok(())
}

/// Return `file_data[offset..offset + len]`, or `TruncatedInput` if any of it
/// lies past the end of the file.
pub fn record_bytes(file_data: &[u8], offset: usize, len: usize) -> M3Result<&[u8]> {
    offset
        .checked_add(len)
        .filter(|end| *end <= file_data.len())
        .map(|end| &file_data[offset..end])
        .ok_or_else(|| M3Error::truncated(offset, len, file_data.len()))
}

/// Run `parser` over the `size`-byte record at `offset`.
pub fn parse_record<'a, O>(
    file_data: &'a [u8],
    offset: usize,
    size: usize,
    parser: impl FnOnce(&mut &'a [u8]) -> WResult<O>,
) -> M3Result<O> {
    let mut input = record_bytes(file_data, offset, size)?;
    parser(&mut input).map_err(|_| M3Error::truncated(offset, size, file_data.len()))
}

/// Parse `count` consecutive records of `stride` bytes each, starting at `offset`.
///
/// Each record is handed to `parser` as its own `stride`-byte slice, so a
/// parser that reads less than the stride does not shift later records.
pub fn parse_records<'a, O>(
    file_data: &'a [u8],
    offset: usize,
    count: usize,
    stride: usize,
    mut parser: impl FnMut(&mut &'a [u8]) -> WResult<O>,
) -> M3Result<Vec<O>> {
    let total = count
        .checked_mul(stride)
        .ok_or_else(|| M3Error::truncated(offset, usize::MAX, file_data.len()))?;
    let bytes = record_bytes(file_data, offset, total)?;

    let mut result = Vec::with_capacity(count);
    for (i, mut record) in bytes.chunks_exact(stride).enumerate() {
        let record_offset = offset + i * stride;
        let value = parser(&mut record)
            .map_err(|_| M3Error::truncated(record_offset, stride, file_data.len()))?;
        result.push(value);
    }
    Ok(result)
}

/// Decode a string field: the bytes up to the first NUL, lossily as UTF-8.
pub fn string_from_bytes(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
