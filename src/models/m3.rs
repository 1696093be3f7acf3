use std::fs::File;
use std::path::Path;

use memmap2::MmapOptions;
use rootcause::prelude::*;
use tracing::debug;

use crate::data::tags::{read_header, read_tag_table};
use crate::error::M3Result;
use crate::models::modl::{Model, decode_model};
use crate::textures::resolve_texture_paths;

/// Decode a complete M3 file held in memory.
///
/// Either the whole model decodes or an error is returned; nothing partial
/// escapes.
pub fn decode(file_data: &[u8]) -> M3Result<Model> {
    let header = read_header(file_data)?;
    let tags = read_tag_table(file_data, &header)?;
    decode_model(file_data, &tags, header.model)
}

/// Memory-map the file at `path` and decode it. The mapping is released
/// before returning, whether or not decoding succeeded.
///
/// Texture slots come back with their paths resolved against the file's
/// directory.
pub fn load(path: &Path) -> Result<Model, Report> {
    let file = File::open(path).context("Failed to open M3 file")?;
    let mmap = unsafe { MmapOptions::new().map(&file) }.context("Failed to map M3 file")?;
    debug!(path = %path.display(), len = mmap.len(), "mapped M3 file");

    let mut model = decode(&mmap).context("Failed to decode M3 model")?;
    let model_dir = path.parent().unwrap_or(Path::new("."));
    resolve_texture_paths(&mut model, model_dir);
    Ok(model)
}
