//! Parser for the top-level MODL record and the geometry tables it points at.
//!
//! MODL is the root of every M3 file: the header's model reference names its
//! tag, and the tag's version selects the record layout. Only versions 20 and
//! 23 are known; they differ by one reference that 23 inserts after the
//! lights reference.

use tracing::{debug, warn};
use winnow::Parser;
use winnow::binary::{le_f32, le_u16, le_u32};

use crate::data::parser_utils::{
    REFERENCE_SIZE, Reference, Vec3, WResult, parse_record, parse_records, parse_reference,
    parse_vec3, skip_reserved,
};
use crate::data::tags::{TagTable, read_string};
use crate::error::{M3Error, M3Result};
use crate::models::geometry::{self, Submesh};
use crate::models::material::{self, Material};
use crate::models::skeleton::{self, Skeleton};
use crate::models::vertex_format::{
    self, HAS_VERTICES, VERTEX_VERSION_MASK, Vertex, VertexFormat,
};

/// Item size of a `DIV_` record.
pub const DIVISION_SIZE: usize = 4 * REFERENCE_SIZE + 4;
/// Item size of a `REGN` record.
pub const REGION_SIZE: usize = 28;

/// The MODL record layouts this decoder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ModelVersion {
    V20,
    V23,
}

impl ModelVersion {
    pub fn from_tag_version(version: u32) -> M3Result<Self> {
        match version {
            20 => Ok(ModelVersion::V20),
            23 => Ok(ModelVersion::V23),
            version => Err(M3Error::UnsupportedModelVersion { version }),
        }
    }

    pub fn number(self) -> u32 {
        match self {
            ModelVersion::V20 => 20,
            ModelVersion::V23 => 23,
        }
    }

    /// Bytes of the record that are decoded. Anything past the materials
    /// reference is left alone.
    pub fn decoded_size(self) -> usize {
        let base = 232;
        match self {
            ModelVersion::V20 => base,
            ModelVersion::V23 => base + REFERENCE_SIZE,
        }
    }
}

/// The decoded prefix of a MODL record. Sequence, attachment, light and
/// camera references are read to keep the layout honest but are not followed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelBlock {
    pub version: ModelVersion,
    pub name: Reference,
    pub internal_version: u32,
    pub sequence_headers: Reference,
    pub sequence_data: Reference,
    pub sequence_lookup: Reference,
    pub sts: Reference,
    pub bones: Reference,
    pub flags: u32,
    pub vertices: Reference,
    pub divisions: Reference,
    pub bone_lookup: Reference,
    pub extents: [Vec3; 2],
    pub radius: f32,
    pub attachments: Reference,
    pub attachment_lookup: Reference,
    pub lights: Reference,
    /// Only present in version 23.
    pub shbx: Option<Reference>,
    pub cameras: Reference,
    pub material_lookup: Reference,
    pub materials: Reference,
}

fn parse_model_block(version: ModelVersion) -> impl FnOnce(&mut &[u8]) -> WResult<ModelBlock> {
    move |input: &mut &[u8]| {
        let name = parse_reference(input)?;
        let internal_version = le_u32.parse_next(input)?;
        let sequence_headers = parse_reference(input)?;
        let sequence_data = parse_reference(input)?;
        let sequence_lookup = parse_reference(input)?;
        skip_reserved(input, 12)?;
        let sts = parse_reference(input)?;
        let bones = parse_reference(input)?;
        skip_reserved(input, 4)?;
        let flags = le_u32.parse_next(input)?;
        let vertices = parse_reference(input)?;
        let divisions = parse_reference(input)?;
        let bone_lookup = parse_reference(input)?;
        let min = parse_vec3(input)?;
        let max = parse_vec3(input)?;
        let radius = le_f32.parse_next(input)?;
        skip_reserved(input, 52)?;
        let attachments = parse_reference(input)?;
        let attachment_lookup = parse_reference(input)?;
        let lights = parse_reference(input)?;
        let shbx = match version {
            ModelVersion::V23 => Some(parse_reference(input)?),
            ModelVersion::V20 => None,
        };
        let cameras = parse_reference(input)?;
        // One reference between cameras and the material lookup: reserved.
        skip_reserved(input, REFERENCE_SIZE)?;
        let material_lookup = parse_reference(input)?;
        let materials = parse_reference(input)?;

        Ok(ModelBlock {
            version,
            name,
            internal_version,
            sequence_headers,
            sequence_data,
            sequence_lookup,
            sts,
            bones,
            flags,
            vertices,
            divisions,
            bone_lookup,
            extents: [min, max],
            radius,
            attachments,
            attachment_lookup,
            lights,
            shbx,
            cameras,
            material_lookup,
            materials,
        })
    }
}

/// Read the MODL record the header's model reference points at.
pub fn read_model_block(
    file_data: &[u8],
    tags: &TagTable,
    model_ref: Reference,
) -> M3Result<ModelBlock> {
    let tag = tags.tag_for(model_ref)?;
    if &tag.name != b"LDOM" {
        warn!(name = %tag.display_name(), "model reference does not point at a MODL tag");
    }
    let version = ModelVersion::from_tag_version(tag.version)?;
    parse_record(
        file_data,
        tag.offset as usize,
        version.decoded_size(),
        parse_model_block(version),
    )
}

/// A `DIV_` record: one mesh division and its geometry tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Division {
    pub faces: Reference,
    pub regions: Reference,
    pub batches: Reference,
    pub msec: Reference,
}

fn parse_division(input: &mut &[u8]) -> WResult<Division> {
    let faces = parse_reference(input)?;
    let regions = parse_reference(input)?;
    let batches = parse_reference(input)?;
    let msec = parse_reference(input)?;
    skip_reserved(input, 4)?;
    Ok(Division {
        faces,
        regions,
        batches,
        msec,
    })
}

/// A submesh: a slice of the vertex array and a slice of the face index array.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Region {
    pub vertex_offset: u32,
    pub vertex_count: u32,
    pub index_offset: u32,
    pub index_count: u32,
    pub bone_count: u16,
    /// First entry of this region's range in the bone lookup table.
    pub bone_index_start: u16,
    /// Length of this region's range in the bone lookup table.
    pub bone_count2: u16,
}

fn parse_region(input: &mut &[u8]) -> WResult<Region> {
    skip_reserved(input, 4)?;
    let vertex_offset = le_u16.parse_next(input)?;
    let vertex_count = le_u16.parse_next(input)?;
    let index_offset = le_u32.parse_next(input)?;
    let index_count = le_u32.parse_next(input)?;
    let bone_count = le_u16.parse_next(input)?;
    let bone_index_start = le_u16.parse_next(input)?;
    let bone_count2 = le_u16.parse_next(input)?;
    skip_reserved(input, 6)?;
    Ok(Region {
        vertex_offset: u32::from(vertex_offset),
        vertex_count: u32::from(vertex_count),
        index_offset,
        index_count,
        bone_count,
        bone_index_start,
        bone_count2,
    })
}

/// Read the first division. Models carry one; any further divisions are
/// ignored. `None` when the reference is absent.
pub fn read_division(
    file_data: &[u8],
    tags: &TagTable,
    divisions_ref: Reference,
) -> M3Result<Option<Division>> {
    let range = tags.resolve(divisions_ref)?;
    if range.count == 0 {
        return Ok(None);
    }
    if range.count > 1 {
        debug!(count = range.count, "model has more than one division, using the first");
    }
    parse_record(file_data, range.offset, DIVISION_SIZE, parse_division).map(Some)
}

pub fn read_regions(
    file_data: &[u8],
    tags: &TagTable,
    regions_ref: Reference,
) -> M3Result<Vec<Region>> {
    let range = tags.resolve(regions_ref)?;
    parse_records(file_data, range.offset, range.count, REGION_SIZE, parse_region)
}

/// Read a `U16_` block: face indices or the bone lookup table.
pub fn read_u16_array(
    file_data: &[u8],
    tags: &TagTable,
    reference: Reference,
) -> M3Result<Vec<u16>> {
    let range = tags.resolve(reference)?;
    parse_records(file_data, range.offset, range.count, 2, |input: &mut &[u8]| {
        le_u16.parse_next(input)
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Extents {
    pub min: Vec3,
    pub max: Vec3,
    pub radius: f32,
}

/// A fully decoded model.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Model {
    pub name: String,
    pub version: ModelVersion,
    pub flags: u32,
    pub vertex_format: VertexFormat,
    pub extents: Extents,
    /// Every vertex of the model; face indices point into this array.
    pub vertices: Vec<Vertex>,
    pub regions: Vec<Region>,
    pub face_indices: Vec<u16>,
    pub bone_lookup: Vec<u16>,
    pub submeshes: Vec<Submesh>,
    pub skeleton: Skeleton,
    pub materials: Vec<Material>,
}

/// Decode the MODL record at `model_ref` and everything it references.
pub fn decode_model(file_data: &[u8], tags: &TagTable, model_ref: Reference) -> M3Result<Model> {
    let block = read_model_block(file_data, tags, model_ref)?;
    debug!(
        version = block.version.number(),
        flags = block.flags,
        "read MODL"
    );

    if block.flags & HAS_VERTICES == 0 {
        return Err(M3Error::MissingGeometry { flags: block.flags });
    }
    let vertex_flags = block.flags & VERTEX_VERSION_MASK;
    let vertex_format = VertexFormat::from_flags(vertex_flags)?;
    let vertices = vertex_format::decode_vertices(file_data, tags, block.vertices, vertex_flags)?;

    let (regions, face_indices) = match read_division(file_data, tags, block.divisions)? {
        Some(division) => (
            read_regions(file_data, tags, division.regions)?,
            read_u16_array(file_data, tags, division.faces)?,
        ),
        None => (Vec::new(), Vec::new()),
    };
    debug!(
        regions = regions.len(),
        face_indices = face_indices.len(),
        "read division"
    );

    let bone_lookup = read_u16_array(file_data, tags, block.bone_lookup)?;
    let mut submeshes = geometry::assemble(&regions, &vertices, &face_indices)?;
    geometry::bind_bone_lookup(&mut submeshes, &bone_lookup)?;

    let bone_records = skeleton::read_bone_records(file_data, tags, block.bones)?;
    let skeleton = skeleton::assemble_bones(file_data, tags, &bone_records)?;
    skeleton.validate_acyclic()?;

    let materials = material::read_materials(file_data, tags, block.materials)?;
    let name = read_string(file_data, tags, block.name)?;

    Ok(Model {
        name,
        version: block.version,
        flags: block.flags,
        vertex_format,
        extents: Extents {
            min: block.extents[0],
            max: block.extents[1],
            radius: block.radius,
        },
        vertices,
        regions,
        face_indices,
        bone_lookup,
        submeshes,
        skeleton,
        materials,
    })
}
