//! Decoder for M3 model files: tag table, MODL record, packed vertices,
//! regions, skeleton and material texture paths.

/// Low-level binary plumbing: primitive parsers and the tag table
pub mod data;
/// Error definitions
pub mod error;
/// Decoded model records and the decoders that build them
pub mod models;
/// Locating a model's texture files on disk
pub mod textures;

pub use error::{M3Error, M3Result};
pub use models::m3::{decode, load};
pub use models::modl::Model;
