//! Base types for the structure of a DBPF file.

use std::io::Cursor;

use binrw::{BinRead, BinWrite};
use byteorder::{ByteOrder, LittleEndian};

use crate::{compression::CompressionMethod, error::FormatError, key::ResourceKey};

/// The two header layouts, told apart by their magic
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Variant {
    /// `DBPF`: 32-bit offsets and sizes
    Narrow,
    /// `DBBF`: 64-bit offsets and sizes
    Wide,
}

impl Variant {
    pub const NARROW_MAGIC: [u8; 4] = *b"DBPF";
    pub const WIDE_MAGIC: [u8; 4] = *b"DBBF";

    /// Identify the variant from the first four bytes of a file
    pub fn from_magic(magic: [u8; 4]) -> Result<Self, FormatError> {
        match magic {
            Self::NARROW_MAGIC => Ok(Variant::Narrow),
            Self::WIDE_MAGIC => Ok(Variant::Wide),
            _ => Err(FormatError::InvalidMagic(magic)),
        }
    }

    /// Size of the fixed header in bytes
    pub fn header_size(self) -> usize {
        match self {
            Variant::Narrow => NarrowHeader::SIZE,
            Variant::Wide => WideHeader::SIZE,
        }
    }

    /// Width of an entry's data offset in the index
    pub fn offset_width(self) -> usize {
        match self {
            Variant::Narrow => 4,
            Variant::Wide => 8,
        }
    }
}

/// `DBPF` header, all fields little endian
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(magic = b"DBPF", little)]
pub struct NarrowHeader {
    pub major_version: u32,
    pub minor_version: u32,
    pub user_major_version: u32,
    pub user_minor_version: u32,
    pub flags: u32,
    pub created: u32,
    pub modified: u32,
    pub index_major_version: u32,
    pub index_count: u32,
    /// Index position used by version 1 packages
    pub legacy_index_offset: u32,
    pub index_size: u32,
    pub hole_count: u32,
    pub hole_offset: u32,
    pub hole_size: u32,
    pub index_minor_version: u32,
    #[brw(pad_after = 28)]
    pub index_offset: u32,
}

impl NarrowHeader {
    pub const SIZE: usize = 96;
}

/// `DBBF` header, all fields little endian
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(magic = b"DBBF", little)]
pub struct WideHeader {
    pub major_version: u32,
    pub minor_version: u32,
    pub user_major_version: u32,
    pub user_minor_version: u32,
    pub flags: u32,
    pub created: u32,
    pub modified: u32,
    pub index_major_version: u32,
    pub index_count: u32,
    pub index_size: u64,
    pub hole_count: u32,
    pub index_minor_version: u32,
    pub index_offset: u64,
    pub hole_offset: u64,
    #[brw(pad_after = 40)]
    pub hole_size: u64,
}

impl WideHeader {
    pub const SIZE: usize = 120;
}

/// Free space bookkeeping carried in the header
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Holes {
    pub count: u32,
    pub offset: u64,
    pub size: u64,
}

/// Header fields of either variant, widened to 64 bits
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DbpfHeader {
    pub variant: Variant,
    pub major_version: u32,
    pub minor_version: u32,
    pub user_major_version: u32,
    pub user_minor_version: u32,
    pub flags: u32,
    pub created: u32,
    pub modified: u32,
    pub index_major_version: u32,
    pub index_minor_version: u32,
    pub index_count: u32,
    pub index_offset: u64,
    pub index_size: u64,
    pub holes: Holes,
}

impl From<NarrowHeader> for DbpfHeader {
    fn from(h: NarrowHeader) -> Self {
        Self {
            variant: Variant::Narrow,
            major_version: h.major_version,
            minor_version: h.minor_version,
            user_major_version: h.user_major_version,
            user_minor_version: h.user_minor_version,
            flags: h.flags,
            created: h.created,
            modified: h.modified,
            index_major_version: h.index_major_version,
            index_minor_version: h.index_minor_version,
            index_count: h.index_count,
            index_offset: h.index_offset.into(),
            index_size: h.index_size.into(),
            holes: Holes {
                count: h.hole_count,
                offset: h.hole_offset.into(),
                size: h.hole_size.into(),
            },
        }
    }
}

impl From<WideHeader> for DbpfHeader {
    fn from(h: WideHeader) -> Self {
        Self {
            variant: Variant::Wide,
            major_version: h.major_version,
            minor_version: h.minor_version,
            user_major_version: h.user_major_version,
            user_minor_version: h.user_minor_version,
            flags: h.flags,
            created: h.created,
            modified: h.modified,
            index_major_version: h.index_major_version,
            index_minor_version: h.index_minor_version,
            index_count: h.index_count,
            index_offset: h.index_offset,
            index_size: h.index_size,
            holes: Holes {
                count: h.hole_count,
                offset: h.hole_offset,
                size: h.hole_size,
            },
        }
    }
}

impl DbpfHeader {
    /// Parse a header from `data`, which must hold at least [`Variant::header_size`] bytes
    pub fn parse(variant: Variant, data: &[u8]) -> binrw::BinResult<Self> {
        let mut cursor = Cursor::new(data);
        Ok(match variant {
            Variant::Narrow => NarrowHeader::read(&mut cursor)?.into(),
            Variant::Wide => WideHeader::read(&mut cursor)?.into(),
        })
    }

    /// Check the container and index versions, returning the index layout they imply
    pub fn index_layout(&self) -> Result<IndexLayout, FormatError> {
        if !matches!(self.major_version, 2 | 3) {
            return Err(FormatError::UnsupportedVersion {
                what: "package",
                major: self.major_version,
                minor: self.minor_version,
            });
        }

        match (self.index_major_version, self.index_minor_version) {
            (0, 3) => Ok(IndexLayout::Flagged),
            (0, 0) => Ok(IndexLayout::Compact),
            (major, minor) => Err(FormatError::UnsupportedVersion {
                what: "index",
                major,
                minor,
            }),
        }
    }
}

/// Record layouts selected by the index version
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IndexLayout {
    /// Index version 3: a flags word hoists constant type or group ids out of the records,
    /// and every record carries an uncompressed size and a 16-bit compression field.
    Flagged,
    /// Index version 0: full keys; bit 31 of the size word marks a compressed record, which is
    /// then followed by its uncompressed size.
    Compact,
}

/// Ids shared by every record of a version 3 index
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct IndexHeader {
    pub type_flags: u32,
    pub type_id: Option<u32>,
    pub group: Option<u32>,
    pub unknown: Option<u32>,
}

impl IndexHeader {
    pub const CONSTANT_TYPE: u32 = 1 << 0;
    pub const CONSTANT_GROUP: u32 = 1 << 1;
    pub const UNKNOWN: u32 = 1 << 2;
}

/// One parsed index record
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub key: ResourceKey,
    /// Offset of the stored bytes from the start of the file
    pub offset: u64,
    /// Size of the stored bytes
    pub stored_size: u32,
    /// Size after decompression; the stored size for raw entries
    pub uncompressed_size: u32,
    pub compression: CompressionMethod,
    /// Whether the record was committed when the package was saved
    pub committed: bool,
}

impl IndexEntry {
    pub fn is_compressed(&self) -> bool {
        self.compression.is_compressed()
    }
}

const SIZE_MASK: u32 = 0x7FFF_FFFF;
const COMPRESSED_BIT: u32 = 0x8000_0000;
const COMPRESSION_NONE: u16 = 0x0000;
const COMPRESSION_REFPACK: u16 = 0xFFFF;

struct IndexReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> IndexReader<'a> {
    fn take(&mut self, width: usize) -> Result<&'a [u8], FormatError> {
        let end = self.position + width;
        let bytes = self
            .data
            .get(self.position..end)
            .ok_or(FormatError::TruncatedData {
                what: "index",
                needed: end as u64,
                available: self.data.len() as u64,
            })?;
        self.position = end;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8, FormatError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, FormatError> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    fn u32(&mut self) -> Result<u32, FormatError> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    fn offset(&mut self, variant: Variant) -> Result<u64, FormatError> {
        match variant {
            Variant::Narrow => self.u32().map(u64::from),
            Variant::Wide => Ok(LittleEndian::read_u64(self.take(8)?)),
        }
    }
}

/// Parse the `count` records of an index block, in the order they are stored
pub fn parse_index(
    data: &[u8],
    variant: Variant,
    layout: IndexLayout,
    count: u32,
) -> Result<Vec<IndexEntry>, FormatError> {
    if count == 0 {
        return Ok(Vec::new());
    }

    let mut reader = IndexReader { data, position: 0 };

    let constants = match layout {
        IndexLayout::Flagged => {
            let type_flags = reader.u32()?;
            let mut optional = |flag: u32| -> Result<Option<u32>, FormatError> {
                if type_flags & flag != 0 {
                    reader.u32().map(Some)
                } else {
                    Ok(None)
                }
            };
            IndexHeader {
                type_flags,
                type_id: optional(IndexHeader::CONSTANT_TYPE)?,
                group: optional(IndexHeader::CONSTANT_GROUP)?,
                unknown: optional(IndexHeader::UNKNOWN)?,
            }
        }
        IndexLayout::Compact => IndexHeader::default(),
    };

    // Every record is at least 20 bytes, so a count the block cannot hold is not preallocated
    let mut entries = Vec::with_capacity((count as usize).min(data.len() / 20));
    for _ in 0..count {
        let type_id = match constants.type_id {
            Some(type_id) => type_id,
            None => reader.u32()?,
        };
        let group = match constants.group {
            Some(group) => group,
            None => reader.u32()?,
        };
        let instance = reader.u32()?;
        let offset = reader.offset(variant)?;
        let key = ResourceKey::new(group, instance, type_id);

        let entry = match layout {
            IndexLayout::Flagged => {
                let stored_size = reader.u32()? & SIZE_MASK;
                let uncompressed_size = reader.u32()?;
                let compression = match reader.u16()? {
                    COMPRESSION_NONE => CompressionMethod::None,
                    COMPRESSION_REFPACK => CompressionMethod::RefPack,
                    other => return Err(FormatError::InvalidCompressionFlag(other)),
                };
                let committed = reader.u8()? != 0;
                reader.u8()?;

                IndexEntry {
                    key,
                    offset,
                    stored_size,
                    uncompressed_size: if compression.is_compressed() {
                        uncompressed_size
                    } else {
                        stored_size
                    },
                    compression,
                    committed,
                }
            }
            IndexLayout::Compact => {
                let size = reader.u32()?;
                let stored_size = size & SIZE_MASK;
                let (compression, uncompressed_size) = if size & COMPRESSED_BIT != 0 {
                    (CompressionMethod::RefPack, reader.u32()?)
                } else {
                    (CompressionMethod::None, stored_size)
                };

                IndexEntry {
                    key,
                    offset,
                    stored_size,
                    uncompressed_size,
                    compression,
                    committed: true,
                }
            }
        };
        entries.push(entry);
    }

    Ok(entries)
}
