//! Bone records and the skeleton assembled from them.
//!
//! Bones carry local-space transforms and a parent index only. Composing
//! world transforms is left to the caller; [`Skeleton::validate_acyclic`]
//! guarantees that walking parent links terminates.

use tracing::debug;
use winnow::Parser;
use winnow::binary::{le_i16, le_u32};

use crate::data::parser_utils::{
    ANIM_REFERENCE_SIZE, AnimReference, Quaternion, REFERENCE_SIZE, Reference, Vec3, WResult,
    parse_anim_reference, parse_quaternion, parse_records, parse_reference, parse_vec3,
    skip_reserved,
};
use crate::data::tags::{TagTable, read_string};
use crate::error::{M3Error, M3Result};

/// Item size of a `BONE` record.
pub const BONE_SIZE: usize = 4 + REFERENCE_SIZE + 4 + 4 + 3 * ANIM_REFERENCE_SIZE
    + (12 + 16)
    + (16 + 20)
    + 12
    + 36;

/// A `BONE` record as stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneRecord {
    pub name: Reference,
    pub flags: u32,
    pub parent: i16,
    pub position_anim: AnimReference,
    pub position: Vec3,
    pub rotation_anim: AnimReference,
    pub rotation: Quaternion,
    pub scale_anim: AnimReference,
    pub scale: Vec3,
}

fn parse_bone_record(input: &mut &[u8]) -> WResult<BoneRecord> {
    skip_reserved(input, 4)?;
    let name = parse_reference(input)?;
    let flags = le_u32.parse_next(input)?;
    let parent = le_i16.parse_next(input)?;
    skip_reserved(input, 2)?;
    let position_anim = parse_anim_reference(input)?;
    let position = parse_vec3(input)?;
    skip_reserved(input, 16)?;
    let rotation_anim = parse_anim_reference(input)?;
    let rotation = parse_quaternion(input)?;
    skip_reserved(input, 20)?;
    let scale_anim = parse_anim_reference(input)?;
    let scale = parse_vec3(input)?;
    // A vec3 and six words follow; reserved, not reverse-engineered.
    skip_reserved(input, 12 + 24)?;
    Ok(BoneRecord {
        name,
        flags,
        parent,
        position_anim,
        position,
        rotation_anim,
        rotation,
        scale_anim,
        scale,
    })
}

/// Read every record of the `BONE` block a MODL points at.
pub fn read_bone_records(
    file_data: &[u8],
    tags: &TagTable,
    bones_ref: Reference,
) -> M3Result<Vec<BoneRecord>> {
    let range = tags.resolve(bones_ref)?;
    parse_records(file_data, range.offset, range.count, BONE_SIZE, parse_bone_record)
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bone {
    pub name: String,
    /// Index of the parent bone, `-1` for a root.
    pub parent: i16,
    pub local_position: Vec3,
    pub local_rotation: Quaternion,
    pub local_scale: Vec3,
    pub flags: u32,
    pub position_anim: AnimReference,
    pub rotation_anim: AnimReference,
    pub scale_anim: AnimReference,
}

impl Bone {
    /// The parent's index, or `None` for a root. Does not check that the
    /// parent exists; see [`Skeleton::validate_acyclic`].
    pub fn parent_index(&self) -> Option<usize> {
        usize::try_from(self.parent).ok()
    }
}

/// Bones in declared order; a bone's position is the id `parent` refers to.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Skeleton {
    pub bones: Vec<Bone>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    Unvisited,
    InProgress,
    Done,
}

impl Skeleton {
    pub fn new(bones: Vec<Bone>) -> Self {
        Self { bones }
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|bone| bone.name == name)
    }

    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        self.bones
            .iter()
            .enumerate()
            .filter(|(_, bone)| bone.parent_index().is_none())
            .map(|(i, _)| i)
    }

    pub fn children(&self, parent: usize) -> impl Iterator<Item = usize> + '_ {
        self.bones
            .iter()
            .enumerate()
            .filter(move |(_, bone)| bone.parent_index() == Some(parent))
            .map(|(i, _)| i)
    }

    /// Check that every parent index names a bone and that no chain of
    /// parents loops back on itself.
    ///
    /// The format does not promise parents precede their children, so this
    /// walks each chain with a visited set rather than comparing indices.
    pub fn validate_acyclic(&self) -> M3Result<()> {
        let len = self.bones.len();
        let mut state = vec![Visit::Unvisited; len];
        let mut chain = Vec::new();

        for start in 0..len {
            chain.clear();
            let mut current = Some(start);
            while let Some(i) = current {
                match state[i] {
                    Visit::Done => break,
                    Visit::InProgress => return Err(M3Error::CyclicHierarchy { bone: i }),
                    Visit::Unvisited => {
                        state[i] = Visit::InProgress;
                        chain.push(i);
                        current = self.checked_parent(i)?;
                    }
                }
            }
            for &i in &chain {
                state[i] = Visit::Done;
            }
        }
        Ok(())
    }

    fn checked_parent(&self, bone: usize) -> M3Result<Option<usize>> {
        let parent = self.bones[bone].parent;
        match parent {
            -1 => Ok(None),
            p if p >= 0 && (p as usize) < self.bones.len() => Ok(Some(p as usize)),
            _ => Err(M3Error::DanglingParent {
                bone,
                parent,
                len: self.bones.len(),
            }),
        }
    }
}

/// Build the skeleton from bone records, resolving each bone's name.
/// Declared order is preserved.
pub fn assemble_bones(
    file_data: &[u8],
    tags: &TagTable,
    records: &[BoneRecord],
) -> M3Result<Skeleton> {
    let mut bones = Vec::with_capacity(records.len());
    for record in records {
        bones.push(Bone {
            name: read_string(file_data, tags, record.name)?,
            parent: record.parent,
            local_position: record.position,
            local_rotation: record.rotation,
            local_scale: record.scale,
            flags: record.flags,
            position_anim: record.position_anim,
            rotation_anim: record.rotation_anim,
            scale_anim: record.scale_anim,
        });
    }
    debug!(bones = bones.len(), "assembled skeleton");
    Ok(Skeleton::new(bones))
}
