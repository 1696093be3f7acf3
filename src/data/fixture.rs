//! Synthetic M3 files for tests.
//!
//! [`M3Builder`] lays out blocks and a tag table exactly like the format does;
//! [`FixtureModel`] sits on top of it and writes a complete MODL with its
//! vertex, division, region, bone and material blocks.

use crate::data::parser_utils::{AnimReference, Reference};
use crate::data::tags::M3_MAGIC;

/// Little-endian byte sink.
#[derive(Default)]
pub struct Writer {
    pub bytes: Vec<u8>,
}

impl Writer {
    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn i16(&mut self, v: i16) -> &mut Self {
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn f32(&mut self, v: f32) -> &mut Self {
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn floats(&mut self, values: &[f32]) -> &mut Self {
        for v in values {
            self.f32(*v);
        }
        self
    }

    pub fn reference(&mut self, r: Reference) -> &mut Self {
        self.u32(r.entry_count).u32(r.tag_index)
    }

    pub fn anim_reference(&mut self, r: AnimReference) -> &mut Self {
        self.u16(r.flags).u16(r.anim_flags).u32(r.anim_id)
    }

    pub fn raw(&mut self, data: &[u8]) -> &mut Self {
        self.bytes.extend_from_slice(data);
        self
    }

    /// Filler for reserved fields. Non-zero so a misaligned read shows up.
    pub fn reserved(&mut self, len: usize) -> &mut Self {
        self.bytes.extend(std::iter::repeat_n(0xAB, len));
        self
    }
}

struct Block {
    name: [u8; 4],
    version: u32,
    count: u32,
    data: Vec<u8>,
}

/// Assembles header, blocks and tag table into file bytes.
#[derive(Default)]
pub struct M3Builder {
    blocks: Vec<Block>,
}

impl M3Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a block; `name` is given in display order (`*b"MODL"`).
    pub fn add_block(&mut self, name: [u8; 4], version: u32, count: u32, data: Vec<u8>) -> u32 {
        let mut stored = name;
        stored.reverse();
        self.blocks.push(Block {
            name: stored,
            version,
            count,
            data,
        });
        (self.blocks.len() - 1) as u32
    }

    /// Add a NUL-terminated `CHAR` block and return a reference to it.
    pub fn add_string(&mut self, s: &str) -> Reference {
        let mut data = s.as_bytes().to_vec();
        data.push(0);
        let count = data.len() as u32;
        let tag_index = self.add_block(*b"CHAR", 0, count, data);
        Reference {
            entry_count: count,
            tag_index,
        }
    }

    pub fn build(&self, model_tag: u32) -> Vec<u8> {
        let header_size = 20;
        let mut body = vec![0u8; header_size];
        let mut offsets = Vec::with_capacity(self.blocks.len());
        for block in &self.blocks {
            while body.len() % 16 != 0 {
                body.push(0xAA);
            }
            offsets.push(body.len() as u32);
            body.extend_from_slice(&block.data);
        }
        while body.len() % 16 != 0 {
            body.push(0xAA);
        }

        let tag_table_offset = body.len() as u32;
        let mut w = Writer::default();
        for (block, offset) in self.blocks.iter().zip(&offsets) {
            w.raw(&block.name)
                .u32(*offset)
                .u32(block.count)
                .u32(block.version);
        }
        body.extend_from_slice(&w.bytes);

        let mut header = Writer::default();
        header
            .raw(&M3_MAGIC)
            .u32(tag_table_offset)
            .u32(self.blocks.len() as u32)
            .reference(Reference {
                entry_count: 1,
                tag_index: model_tag,
            });
        body[..header_size].copy_from_slice(&header.bytes);
        body
    }
}

#[derive(Clone, Debug)]
pub struct FixtureVertex {
    pub position: [f32; 3],
    pub weights: [u8; 4],
    pub bone_indices: [u8; 4],
    pub normal: [u8; 4],
    pub uv: [u16; 2],
    pub tangent: [u8; 4],
}

impl FixtureVertex {
    pub fn new(position: [f32; 3], uv: [u16; 2]) -> Self {
        Self {
            position,
            weights: [255, 0, 0, 0],
            bone_indices: [0, 0, 0, 0],
            normal: [255, 0, 128, 255],
            uv,
            tangent: [0, 255, 0, 255],
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct FixtureRegion {
    pub vertex_offset: u16,
    pub vertex_count: u16,
    pub index_offset: u32,
    pub index_count: u32,
    pub bone_count: u16,
    pub bone_index_start: u16,
    pub bone_count2: u16,
}

#[derive(Clone, Debug)]
pub struct FixtureBone {
    pub name: String,
    pub parent: i16,
    pub position: [f32; 3],
    /// Stored order: x, y, z, w.
    pub rotation_xyzw: [f32; 4],
    pub scale: [f32; 3],
}

impl FixtureBone {
    pub fn new(name: &str, parent: i16) -> Self {
        Self {
            name: name.to_string(),
            parent,
            position: [0.0, 0.0, 1.0],
            rotation_xyzw: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0, 1.0, 1.0],
        }
    }
}

#[derive(Clone, Debug)]
pub struct FixtureMaterial {
    pub name: String,
    /// `(layer slot, stored texture path)`
    pub layers: Vec<(usize, String)>,
}

/// Everything needed to write a complete, decodable M3 file.
#[derive(Clone, Debug)]
pub struct FixtureModel {
    pub name: String,
    pub version: u32,
    pub flags: u32,
    pub vertices: Vec<FixtureVertex>,
    pub faces: Vec<u16>,
    pub regions: Vec<FixtureRegion>,
    pub bone_lookup: Vec<u16>,
    pub bones: Vec<FixtureBone>,
    pub materials: Vec<FixtureMaterial>,
    pub extents: [[f32; 3]; 2],
    pub radius: f32,
}

impl FixtureModel {
    /// One region, one triangle, one bone and one material with all three
    /// consumed texture channels.
    pub fn triangle() -> Self {
        Self {
            name: "Triangle".to_string(),
            version: 20,
            flags: 0x020000,
            vertices: vec![
                FixtureVertex::new([0.0, 0.0, 0.0], [0, 2046]),
                FixtureVertex::new([1.0, 0.0, 0.0], [2046, 2046]),
                FixtureVertex::new([0.0, 1.0, 0.0], [1023, 1023]),
            ],
            faces: vec![0, 1, 2],
            regions: vec![FixtureRegion {
                vertex_offset: 0,
                vertex_count: 3,
                index_offset: 0,
                index_count: 3,
                bone_count: 1,
                bone_index_start: 0,
                bone_count2: 1,
            }],
            bone_lookup: vec![0],
            bones: vec![FixtureBone::new("Root", -1)],
            materials: vec![FixtureMaterial {
                name: "Mat01".to_string(),
                layers: vec![
                    (0, "Assets\\Textures\\tri_diff.dds".to_string()),
                    (2, "Assets/Textures/tri_spec.dds".to_string()),
                    (9, "tri_normal.dds".to_string()),
                ],
            }],
            extents: [[-1.0, -1.0, -1.0], [1.0, 1.0, 1.0]],
            radius: 1.5,
        }
    }

    fn uv_block_words(&self) -> usize {
        match self.flags & 0x1E0000 {
            0x060000 => 4,
            0x0A0000 => 6,
            0x120000 => 8,
            _ => 2,
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let mut b = M3Builder::new();
        let name = b.add_string(&self.name);

        let vertices = if self.vertices.is_empty() {
            Reference::default()
        } else {
            let mut w = Writer::default();
            for v in &self.vertices {
                w.floats(&v.position)
                    .raw(&v.weights)
                    .raw(&v.bone_indices)
                    .raw(&v.normal)
                    .u16(v.uv[0])
                    .u16(v.uv[1]);
                for _ in 2..self.uv_block_words() {
                    w.u16(0xBEEF);
                }
                w.raw(&v.tangent);
            }
            let len = w.bytes.len() as u32;
            Reference {
                entry_count: len,
                tag_index: b.add_block(*b"U8__", 0, len, w.bytes),
            }
        };

        let faces = self.u16_block(&mut b, &self.faces);

        let regions = if self.regions.is_empty() {
            Reference::default()
        } else {
            let mut w = Writer::default();
            for r in &self.regions {
                w.reserved(4)
                    .u16(r.vertex_offset)
                    .u16(r.vertex_count)
                    .u32(r.index_offset)
                    .u32(r.index_count)
                    .u16(r.bone_count)
                    .u16(r.bone_index_start)
                    .u16(r.bone_count2)
                    .reserved(6);
            }
            let count = self.regions.len() as u32;
            Reference {
                entry_count: count,
                tag_index: b.add_block(*b"REGN", 3, count, w.bytes),
            }
        };

        let division = {
            let mut w = Writer::default();
            w.reference(faces)
                .reference(regions)
                .reference(Reference::default())
                .reference(Reference::default())
                .reserved(4);
            Reference {
                entry_count: 1,
                tag_index: b.add_block(*b"DIV_", 2, 1, w.bytes),
            }
        };

        let bone_lookup = self.u16_block(&mut b, &self.bone_lookup);

        let bones = if self.bones.is_empty() {
            Reference::default()
        } else {
            let mut w = Writer::default();
            for (i, bone) in self.bones.iter().enumerate() {
                let bone_name = b.add_string(&bone.name);
                let anim = |n: u32| AnimReference {
                    flags: 0,
                    anim_flags: 6,
                    anim_id: (i as u32) * 3 + n,
                };
                w.reserved(4)
                    .reference(bone_name)
                    .u32(0)
                    .i16(bone.parent)
                    .reserved(2)
                    .anim_reference(anim(0))
                    .floats(&bone.position)
                    .reserved(16)
                    .anim_reference(anim(1))
                    .floats(&bone.rotation_xyzw)
                    .reserved(20)
                    .anim_reference(anim(2))
                    .floats(&bone.scale)
                    .reserved(12)
                    .reserved(24);
            }
            let count = self.bones.len() as u32;
            Reference {
                entry_count: count,
                tag_index: b.add_block(*b"BONE", 1, count, w.bytes),
            }
        };

        let materials = if self.materials.is_empty() {
            Reference::default()
        } else {
            let mut w = Writer::default();
            for material in &self.materials {
                let material_name = b.add_string(&material.name);
                let mut layers = [Reference::default(); 13];
                for (slot, path) in &material.layers {
                    let path = b.add_string(path);
                    let mut layer = Writer::default();
                    layer.reserved(4).reference(path).reserved(4);
                    layers[*slot] = Reference {
                        entry_count: 1,
                        tag_index: b.add_block(*b"LAYR", 22, 1, layer.bytes),
                    };
                }
                w.reference(material_name).reserved(40);
                for layer in layers {
                    w.reference(layer);
                }
                w.reserved(60);
            }
            let count = self.materials.len() as u32;
            Reference {
                entry_count: count,
                tag_index: b.add_block(*b"MAT_", 15, count, w.bytes),
            }
        };

        let mut w = Writer::default();
        w.reference(name)
            .u32(0)
            .reference(Reference::default())
            .reference(Reference::default())
            .reference(Reference::default())
            .reserved(12)
            .reference(Reference::default())
            .reference(bones)
            .reserved(4)
            .u32(self.flags)
            .reference(vertices)
            .reference(division)
            .reference(bone_lookup)
            .floats(&self.extents[0])
            .floats(&self.extents[1])
            .f32(self.radius)
            .reserved(52)
            .reference(Reference::default())
            .reference(Reference::default())
            .reference(Reference::default());
        if self.version == 23 {
            w.reference(Reference::default());
        }
        w.reference(Reference::default())
            .reference(Reference::default())
            .reference(Reference::default())
            .reference(materials);
        let model = b.add_block(*b"MODL", self.version, 1, w.bytes);

        b.build(model)
    }

    fn u16_block(&self, b: &mut M3Builder, values: &[u16]) -> Reference {
        if values.is_empty() {
            return Reference::default();
        }
        let mut w = Writer::default();
        for v in values {
            w.u16(*v);
        }
        let count = values.len() as u32;
        Reference {
            entry_count: count,
            tag_index: b.add_block(*b"U16_", 0, count, w.bytes),
        }
    }
}
