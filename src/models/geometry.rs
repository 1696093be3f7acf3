//! Turns regions into renderable submeshes.
//!
//! A region names a slice of the model's vertex array and a slice of its
//! 16-bit face index array. The face indices are offsets into the *whole*
//! vertex array, not into the region's slice, so triangles and their UVs are
//! always looked up globally.

use std::ops::Range;

use itertools::Itertools;
use tracing::debug;

use crate::error::{M3Error, M3Result};
use crate::models::modl::Region;
use crate::models::vertex_format::Vertex;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Triangle {
    /// Indices into the model's vertex array.
    pub indices: [u32; 3],
    /// UV of each corner, taken from the vertex the corner references.
    pub uvs: [[f32; 2]; 3],
}

/// Vertices bound to one region. Members are assigned with weight 1.0 and
/// replace any earlier weight; groups do not blend across regions.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VertexGroup {
    pub name: String,
    /// Indices into the model's vertex array.
    pub vertices: Vec<u32>,
    pub weight: f32,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Submesh {
    pub region: Region,
    /// Copy of the region's slice of the vertex array.
    pub vertices: Vec<Vertex>,
    pub triangles: Vec<Triangle>,
    pub vertex_group: VertexGroup,
    /// Skeleton bone for each region-local bone index a vertex may use.
    pub bone_lookup: Vec<u16>,
}

impl Submesh {
    /// The region's range in the model's vertex array.
    pub fn vertex_range(&self) -> Range<usize> {
        let start = self.region.vertex_offset as usize;
        start..start.saturating_add(self.region.vertex_count as usize)
    }

    /// Map a vertex's region-local bone index to a skeleton bone index.
    pub fn skeleton_bone(&self, local: u8) -> Option<u16> {
        self.bone_lookup.get(local as usize).copied()
    }
}

pub fn group_name(region_index: usize) -> String {
    format!("Group{region_index:02}")
}

fn checked_range(
    what: &'static str,
    start: u32,
    count: u32,
    len: usize,
) -> M3Result<Range<usize>> {
    let start = start as usize;
    let end = start.checked_add(count as usize).unwrap_or(usize::MAX);
    if end > len {
        return Err(M3Error::IndexOutOfRange {
            what,
            index: end,
            len,
        });
    }
    Ok(start..end)
}

fn triangle(vertices: &[Vertex], corners: [u16; 3]) -> M3Result<Triangle> {
    let mut uvs = [[0.0f32; 2]; 3];
    for (uv, &index) in uvs.iter_mut().zip(&corners) {
        let vertex = vertices
            .get(index as usize)
            .ok_or(M3Error::IndexOutOfRange {
                what: "face index",
                index: index as usize,
                len: vertices.len(),
            })?;
        *uv = vertex.uv;
    }
    Ok(Triangle {
        indices: corners.map(u32::from),
        uvs,
    })
}

/// Split the model's vertices and face indices into one submesh per region.
pub fn assemble(
    regions: &[Region],
    vertices: &[Vertex],
    face_indices: &[u16],
) -> M3Result<Vec<Submesh>> {
    let mut submeshes = Vec::with_capacity(regions.len());

    for (i, region) in regions.iter().enumerate() {
        let vertex_range = checked_range(
            "region vertex range",
            region.vertex_offset,
            region.vertex_count,
            vertices.len(),
        )?;
        let index_range = checked_range(
            "region index range",
            region.index_offset,
            region.index_count,
            face_indices.len(),
        )?;

        let faces = &face_indices[index_range];
        if faces.len() % 3 != 0 {
            return Err(M3Error::RecordMisalignment {
                what: "region face indices",
                len: faces.len(),
                stride: 3,
            });
        }

        let triangles = faces
            .iter()
            .copied()
            .tuples()
            .map(|(a, b, c)| triangle(vertices, [a, b, c]))
            .collect::<M3Result<Vec<_>>>()?;

        let vertex_group = VertexGroup {
            name: group_name(i),
            vertices: vertex_range.clone().map(|v| v as u32).collect(),
            weight: 1.0,
        };

        debug!(
            region = i,
            vertices = vertex_range.len(),
            triangles = triangles.len(),
            "assembled submesh"
        );

        submeshes.push(Submesh {
            region: *region,
            vertices: vertices[vertex_range].to_vec(),
            triangles,
            vertex_group,
            bone_lookup: Vec::new(),
        });
    }

    Ok(submeshes)
}

/// Give each submesh its slice of the model's bone lookup table.
pub fn bind_bone_lookup(submeshes: &mut [Submesh], bone_lookup: &[u16]) -> M3Result<()> {
    for submesh in submeshes.iter_mut() {
        let range = checked_range(
            "region bone lookup range",
            u32::from(submesh.region.bone_index_start),
            u32::from(submesh.region.bone_count2),
            bone_lookup.len(),
        )?;
        submesh.bone_lookup = bone_lookup[range].to_vec();
    }
    Ok(())
}
