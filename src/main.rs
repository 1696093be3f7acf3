use std::path::{Path, PathBuf};

use clap::Parser;
use rootcause::prelude::*;
use tracing_subscriber::EnvFilter;

use m3model::models::m3;
use m3model::models::modl::Model;
use m3model::textures::locate_textures;

/// Decode an M3 model and describe its contents
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Print the decoded model as JSON instead of a summary
    #[clap(long)]
    json: bool,

    /// Look for the model's textures next to the file and warn about missing ones
    #[clap(long)]
    check_textures: bool,

    /// .m3 file to decode
    path: PathBuf,
}

fn print_summary(model: &Model) {
    println!("{} (MODL v{})", model.name, model.version.number());
    println!(
        "  vertices: {} ({:?}, {} byte records)",
        model.vertices.len(),
        model.vertex_format,
        model.vertex_format.stride()
    );
    println!(
        "  extents: {:?} .. {:?}, radius {}",
        model.extents.min, model.extents.max, model.extents.radius
    );

    println!("  submeshes: {}", model.submeshes.len());
    for submesh in &model.submeshes {
        println!(
            "    {}: {} vertices, {} triangles, {} bones",
            submesh.vertex_group.name,
            submesh.vertices.len(),
            submesh.triangles.len(),
            submesh.bone_lookup.len()
        );
    }

    println!("  bones: {}", model.skeleton.len());
    for bone in &model.skeleton.bones {
        match bone.parent_index() {
            Some(parent) => println!("    {} -> {}", bone.name, model.skeleton.bones[parent].name),
            None => println!("    {}", bone.name),
        }
    }

    println!("  materials: {}", model.materials.len());
    for material in &model.materials {
        println!("    {}", material.name);
        for slot in &material.textures {
            match &slot.path {
                Some(path) => println!("      {:?}: {}", slot.channel, path.display()),
                None => println!("      {:?}: {}", slot.channel, slot.stored_path),
            }
        }
    }
}

fn main() -> Result<(), Report> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let model = m3::load(&args.path)?;

    if args.check_textures {
        let model_dir = args.path.parent().unwrap_or(Path::new("."));
        let lookups = locate_textures(&model, model_dir);
        let missing = lookups.iter().filter(|l| !l.exists).count();
        tracing::info!(textures = lookups.len(), missing, "checked textures");
    }

    if args.json {
        let json = serde_json::to_string_pretty(&model).context("Failed to serialize model")?;
        println!("{json}");
    } else {
        print_summary(&model);
    }

    Ok(())
}
