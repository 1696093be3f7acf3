//! Materials and their texture layers.
//!
//! A `MAT_` record holds thirteen layer references, one per channel slot.
//! Each layer (`LAYR`) in turn references the `CHAR` block holding its texture
//! path. Only the diffuse, specular and normal slots are resolved; the other
//! ten layer references are kept as stored.

use std::path::PathBuf;

use tracing::debug;

use crate::data::parser_utils::{
    REFERENCE_SIZE, Reference, WResult, parse_record, parse_records, parse_reference,
    skip_reserved,
};
use crate::data::tags::{TagTable, read_string};
use crate::error::M3Result;

/// Number of layer slots in a material.
pub const LAYER_SLOTS: usize = 13;
/// Item size of a `MAT_` record.
pub const MATERIAL_SIZE: usize = REFERENCE_SIZE + 40 + LAYER_SLOTS * REFERENCE_SIZE + 60;
/// Leading part of a `LAYR` record that is decoded.
const LAYER_PREFIX_SIZE: usize = 4 + REFERENCE_SIZE;

/// Channels whose layer slots are resolved to texture paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TextureChannel {
    Diffuse,
    Specular,
    Normal,
}

impl TextureChannel {
    pub const ALL: [TextureChannel; 3] = [
        TextureChannel::Diffuse,
        TextureChannel::Specular,
        TextureChannel::Normal,
    ];

    /// Position of this channel's layer reference within a material.
    pub fn layer_slot(self) -> usize {
        match self {
            TextureChannel::Diffuse => 0,
            TextureChannel::Specular => 2,
            TextureChannel::Normal => 9,
        }
    }
}

/// A `MAT_` record as stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialRecord {
    pub name: Reference,
    pub layers: [Reference; LAYER_SLOTS],
}

fn parse_material_record(input: &mut &[u8]) -> WResult<MaterialRecord> {
    let name = parse_reference(input)?;
    skip_reserved(input, 40)?;
    let mut layers = [Reference::default(); LAYER_SLOTS];
    for layer in layers.iter_mut() {
        *layer = parse_reference(input)?;
    }
    skip_reserved(input, 60)?;
    Ok(MaterialRecord { name, layers })
}

fn parse_layer_path_ref(input: &mut &[u8]) -> WResult<Reference> {
    skip_reserved(input, 4)?;
    parse_reference(input)
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TextureSlot {
    pub channel: TextureChannel,
    /// The path exactly as stored in the file.
    pub stored_path: String,
    /// Last component of the stored path. Textures are looked up next to the
    /// model file under this name.
    pub file_name: String,
    /// `file_name` joined with the model's directory. Only set when the model
    /// was loaded from a path.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Material {
    pub name: String,
    pub layers: [Reference; LAYER_SLOTS],
    pub textures: Vec<TextureSlot>,
}

impl Material {
    pub fn texture(&self, channel: TextureChannel) -> Option<&TextureSlot> {
        self.textures.iter().find(|slot| slot.channel == channel)
    }
}

/// Base name of a stored texture path. Paths may use either separator.
pub fn texture_file_name(stored_path: &str) -> &str {
    stored_path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(stored_path)
}

/// Follow a layer reference to its texture path. `None` when the layer or
/// its path reference is absent.
fn read_layer_path(
    file_data: &[u8],
    tags: &TagTable,
    layer_ref: Reference,
) -> M3Result<Option<String>> {
    let range = tags.resolve(layer_ref)?;
    if range.count == 0 {
        return Ok(None);
    }
    let path_ref = parse_record(file_data, range.offset, LAYER_PREFIX_SIZE, parse_layer_path_ref)?;
    if path_ref.is_absent() {
        return Ok(None);
    }
    let path = read_string(file_data, tags, path_ref)?;
    Ok(Some(path))
}

pub fn read_material_records(
    file_data: &[u8],
    tags: &TagTable,
    materials_ref: Reference,
) -> M3Result<Vec<MaterialRecord>> {
    let range = tags.resolve(materials_ref)?;
    parse_records(
        file_data,
        range.offset,
        range.count,
        MATERIAL_SIZE,
        parse_material_record,
    )
}

/// Decode every material and resolve its diffuse, specular and normal
/// texture paths.
pub fn read_materials(
    file_data: &[u8],
    tags: &TagTable,
    materials_ref: Reference,
) -> M3Result<Vec<Material>> {
    let records = read_material_records(file_data, tags, materials_ref)?;
    let mut materials = Vec::with_capacity(records.len());

    for record in records {
        let mut textures = Vec::new();
        for channel in TextureChannel::ALL {
            let layer_ref = record.layers[channel.layer_slot()];
            if let Some(stored_path) = read_layer_path(file_data, tags, layer_ref)? {
                let file_name = texture_file_name(&stored_path).to_string();
                textures.push(TextureSlot {
                    channel,
                    stored_path,
                    file_name,
                    path: None,
                });
            }
        }

        materials.push(Material {
            name: read_string(file_data, tags, record.name)?,
            layers: record.layers,
            textures,
        });
    }

    debug!(materials = materials.len(), "decoded materials");
    Ok(materials)
}
