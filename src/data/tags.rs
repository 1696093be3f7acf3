//! The M3 header and tag table.
//!
//! An M3 file is a flat sequence of typed blocks. The tag table at the end of
//! the file describes each block with a four character name, a byte offset,
//! an entry count and a version. Every structural link in the file is a
//! [`Reference`] into this table rather than a byte offset.

use tracing::{debug, trace};
use winnow::Parser;
use winnow::binary::le_u32;
use winnow::token::take;

use crate::data::parser_utils::{
    REFERENCE_SIZE, Reference, WResult, parse_record, parse_records, parse_reference,
    record_bytes, string_from_bytes,
};
use crate::error::{M3Error, M3Result};

/// File signature as it appears on disk. The display form is `MD33`; like
/// tag names it is stored reversed.
pub const M3_MAGIC: [u8; 4] = *b"33DM";

/// magic + tag table offset + tag count + MODL reference
pub const HEADER_SIZE: usize = 4 + 4 + 4 + REFERENCE_SIZE;
pub const TAG_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Header {
    pub magic: [u8; 4],
    pub tag_table_offset: u32,
    pub tag_count: u32,
    pub model: Reference,
}

/// One block descriptor from the tag table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tag {
    /// Block type, stored reversed (`LDOM` for a MODL block).
    pub name: [u8; 4],
    pub offset: u32,
    pub count: u32,
    pub version: u32,
}

impl Tag {
    /// The block type in its usual reading order, e.g. `MODL`.
    pub fn display_name(&self) -> String {
        let mut name = self.name;
        name.reverse();
        String::from_utf8_lossy(&name).into_owned()
    }
}

/// Byte range a [`Reference`] points at: the referenced tag's offset and the
/// reference's own entry count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    pub offset: usize,
    pub count: usize,
}

/// All tags of a file, indexed by their position in the table.
#[derive(Debug, Clone, Default)]
pub struct TagTable {
    tags: Vec<Tag>,
}

impl TagTable {
    pub fn new(tags: Vec<Tag>) -> Self {
        Self { tags }
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn get(&self, index: u32) -> Option<&Tag> {
        self.tags.get(index as usize)
    }

    /// The tag a reference names, whether or not the reference has entries.
    pub fn tag_for(&self, reference: Reference) -> M3Result<&Tag> {
        self.get(reference.tag_index)
            .ok_or(M3Error::BadReference {
                tag_index: reference.tag_index,
                tag_count: self.tags.len(),
            })
    }

    pub fn resolve(&self, reference: Reference) -> M3Result<ResolvedRange> {
        resolve(self, reference)
    }
}

/// Resolve a reference to the byte offset of its tag and the entry count it
/// declares.
///
/// A reference may name fewer entries than its tag holds, never more.
/// An absent reference (`entry_count == 0`) never fails. Its offset is the
/// tag's when the index is valid and zero otherwise; there is nothing to read
/// either way.
pub fn resolve(tags: &TagTable, reference: Reference) -> M3Result<ResolvedRange> {
    if reference.is_absent() {
        let offset = tags
            .get(reference.tag_index)
            .map_or(0, |tag| tag.offset as usize);
        return Ok(ResolvedRange { offset, count: 0 });
    }

    let tag = tags.tag_for(reference)?;
    if reference.entry_count > tag.count {
        return Err(M3Error::ReferenceOverrun {
            tag_index: reference.tag_index,
            entry_count: reference.entry_count,
            available: tag.count,
        });
    }
    Ok(ResolvedRange {
        offset: tag.offset as usize,
        count: reference.entry_count as usize,
    })
}

fn parse_header_fields(input: &mut &[u8]) -> WResult<Header> {
    let magic: &[u8] = take(4usize).parse_next(input)?;
    let tag_table_offset = le_u32.parse_next(input)?;
    let tag_count = le_u32.parse_next(input)?;
    let model = parse_reference(input)?;
    Ok(Header {
        magic: [magic[0], magic[1], magic[2], magic[3]],
        tag_table_offset,
        tag_count,
        model,
    })
}

fn parse_tag(input: &mut &[u8]) -> WResult<Tag> {
    let name: &[u8] = take(4usize).parse_next(input)?;
    let offset = le_u32.parse_next(input)?;
    let count = le_u32.parse_next(input)?;
    let version = le_u32.parse_next(input)?;
    Ok(Tag {
        name: [name[0], name[1], name[2], name[3]],
        offset,
        count,
        version,
    })
}

/// Read the fixed-size file header and check its signature.
pub fn read_header(file_data: &[u8]) -> M3Result<Header> {
    let header = parse_record(file_data, 0, HEADER_SIZE, parse_header_fields)?;
    if header.magic != M3_MAGIC {
        return Err(M3Error::BadMagic {
            expected: M3_MAGIC,
            found: header.magic,
        });
    }
    Ok(header)
}

/// Read the `header.tag_count` tag records at `header.tag_table_offset`.
pub fn read_tag_table(file_data: &[u8], header: &Header) -> M3Result<TagTable> {
    let tags = parse_records(
        file_data,
        header.tag_table_offset as usize,
        header.tag_count as usize,
        TAG_SIZE,
        parse_tag,
    )?;

    debug!(
        tag_count = tags.len(),
        offset = header.tag_table_offset,
        "read tag table"
    );
    for (i, tag) in tags.iter().enumerate() {
        trace!(
            index = i,
            name = %tag.display_name(),
            offset = tag.offset,
            count = tag.count,
            version = tag.version,
            "tag"
        );
    }

    Ok(TagTable::new(tags))
}

/// Read the string a `CHAR` reference points at: `entry_count` bytes,
/// cut at the first NUL.
pub fn read_string(file_data: &[u8], tags: &TagTable, reference: Reference) -> M3Result<String> {
    let range = tags.resolve(reference)?;
    if range.count == 0 {
        return Ok(String::new());
    }
    let bytes = record_bytes(file_data, range.offset, range.count)?;
    Ok(string_from_bytes(bytes))
}
