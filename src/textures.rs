//! Finding texture files on disk for a decoded model.
//!
//! Materials store texture paths from the authoring machine. Only the base
//! name is kept and looked up next to the model file. A missing texture is a
//! warning, never a decode failure.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::models::material::{TextureChannel, TextureSlot};
use crate::models::modl::Model;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TextureLookup {
    /// Index into [`Model::materials`].
    pub material: usize,
    pub channel: TextureChannel,
    pub path: PathBuf,
    pub exists: bool,
}

/// Where a texture slot is expected to live for a model in `model_dir`.
pub fn texture_path(model_dir: &Path, slot: &TextureSlot) -> PathBuf {
    model_dir.join(&slot.file_name)
}

/// Fill in [`TextureSlot::path`] for every slot of every material.
pub fn resolve_texture_paths(model: &mut Model, model_dir: &Path) {
    for slot in model.materials.iter_mut().flat_map(|m| m.textures.iter_mut()) {
        slot.path = Some(texture_path(model_dir, slot));
    }
}

/// Check every texture slot of every material against `model_dir`.
pub fn locate_textures(model: &Model, model_dir: &Path) -> Vec<TextureLookup> {
    let mut lookups = Vec::new();
    for (material_index, material) in model.materials.iter().enumerate() {
        for slot in &material.textures {
            let path = texture_path(model_dir, slot);
            let exists = path.is_file();
            if exists {
                debug!(material = %material.name, channel = ?slot.channel, path = %path.display(), "found texture");
            } else {
                warn!(
                    material = %material.name,
                    channel = ?slot.channel,
                    path = %path.display(),
                    "texture not found"
                );
            }
            lookups.push(TextureLookup {
                material: material_index,
                channel: slot.channel,
                path,
                exists,
            });
        }
    }
    lookups
}
