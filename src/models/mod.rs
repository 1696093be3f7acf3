pub mod geometry;
pub mod m3;
pub mod material;
pub mod modl;
pub mod skeleton;
pub mod vertex_format;
