use thiserror::Error;

/// Errors produced while decoding an M3 file.
///
/// Every variant is terminal for the decode attempt: no partial model is
/// returned once one of these is raised.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum M3Error {
    #[error("bad magic: expected {expected:?}, found {found:?}")]
    BadMagic { expected: [u8; 4], found: [u8; 4] },
    #[error("truncated input: need 0x{needed:X} bytes at offset 0x{offset:X}, have 0x{available:X}")]
    TruncatedInput {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("reference to tag {tag_index} but the tag table only has {tag_count} entries")]
    BadReference { tag_index: u32, tag_count: usize },
    #[error("reference declares {entry_count} entries but tag {tag_index} only holds {available}")]
    ReferenceOverrun {
        tag_index: u32,
        entry_count: u32,
        available: u32,
    },
    #[error("unsupported MODL version {version}")]
    UnsupportedModelVersion { version: u32 },
    #[error("unsupported vertex format flags {flags:#X}")]
    UnsupportedVertexVersion { flags: u32 },
    #[error("{what}: length {len} is not a multiple of the record size {stride}")]
    RecordMisalignment {
        what: &'static str,
        len: usize,
        stride: usize,
    },
    #[error("model has no vertices (flags {flags:#X})")]
    MissingGeometry { flags: u32 },
    #[error("{what}: index {index} is out of range for {len} entries")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },
    #[error("bone {bone} is part of a parent cycle")]
    CyclicHierarchy { bone: usize },
    #[error("bone {bone} has parent {parent} outside of a {len}-bone skeleton")]
    DanglingParent { bone: usize, parent: i16, len: usize },
}

impl M3Error {
    pub(crate) fn truncated(offset: usize, needed: usize, available: usize) -> Self {
        M3Error::TruncatedInput {
            offset,
            needed,
            available,
        }
    }
}

pub type M3Result<T> = Result<T, M3Error>;
