//! This library reads **DBPF** packages, the archive format *Spore* stores its game data in.
//!
//! # DBPF Package Format Documentation
//!
//! A package is a header, the entry data, and an index describing every entry. Each entry is named by a
//! [`ResourceKey`], a triple of 32-bit hashes (group, instance, type). Two header layouts exist: the
//! classic `DBPF` one with 32-bit offsets and the `DBBF` one with 64-bit offsets used for large packages.
//!
//! ## Header
//!
//! | Offset `DBPF` | Offset `DBBF` | Field                 | Description                                      |
//! |---------------|---------------|-----------------------|--------------------------------------------------|
//! | 0x00          | 0x00          | Magic                 | 4 bytes: `DBPF` or `DBBF`                        |
//! | 0x04          | 0x04          | Major version         | 4 bytes: 2 or 3                                  |
//! | 0x08          | 0x08          | Minor version         | 4 bytes                                          |
//! | 0x0C          | 0x0C          | User version          | 2 x 4 bytes                                      |
//! | 0x14          | 0x14          | Flags                 | 4 bytes                                          |
//! | 0x18          | 0x18          | Created, modified     | 2 x 4 bytes: timestamps                          |
//! | 0x20          | 0x20          | Index major version   | 4 bytes: 0                                       |
//! | 0x24          | 0x24          | Index entry count     | 4 bytes                                          |
//! | 0x28          |               | Legacy index offset   | 4 bytes: unused by version 2 and 3               |
//! | 0x2C          | 0x28          | Index size            | 4 bytes / 8 bytes                                |
//! | 0x30          | 0x30          | Hole count            | 4 bytes                                          |
//! | 0x34          | 0x40          | Hole offset           | 4 bytes / 8 bytes                                |
//! | 0x38          | 0x48          | Hole size             | 4 bytes / 8 bytes                                |
//! | 0x3C          | 0x34          | Index minor version   | 4 bytes: 3 or 0                                  |
//! | 0x40          | 0x38          | Index offset          | 4 bytes / 8 bytes                                |
//!
//! The narrow header is padded to 96 bytes, the wide one to 120 bytes.
//!
//! ## Index
//!
//! Index version 0.3 starts with a flags word. Bit 0 means every record shares one type id, bit 1 one
//! group id, and bit 2 an unknown value; each set bit is followed by that shared value, in that order.
//! Every record then holds:
//!
//! - **Type id**, **Group id**: 4 bytes each, only when not shared.
//! - **Instance id**: 4 bytes.
//! - **Offset**: 4 bytes, or 8 bytes in `DBBF` packages.
//! - **Stored size**: 4 bytes, the top bit is a flag and not part of the size.
//! - **Uncompressed size**: 4 bytes.
//! - **Compression**: 2 bytes, `0x0000` for raw data and `0xFFFF` for RefPack.
//! - **Committed**: 1 byte, followed by 1 byte of padding.
//!
//! Index version 0.0 stores type, group, instance and offset for each record, followed by a size word
//! whose top bit marks compressed data. Compressed records carry their uncompressed size in 4 more bytes.
//!
//! ## Compression
//!
//! Compressed entries use RefPack, an LZ77 variant described in [`compression`].
//!
//! ## Additional Information
//!
//! - **File Extension**: `.package`
//! - **Endianness**: Little-endian for all header and index fields, big-endian for RefPack sizes
//!

pub mod compression;
pub mod error;
pub mod extract;
pub mod key;
pub mod read;
pub mod source;
pub mod types;

pub use compression::{decompress, CompressionMethod};
pub use extract::{
    entry_path, EntryInfo, EntryProgress, EntrySummary, ExtractAll, ExtractEvent, ExtractOptions,
    ExtractSummary,
};
pub use key::ResourceKey;
pub use read::DbpfArchive;
pub use source::ByteSource;
pub use types::{IndexEntry, Variant};

pub use spore_registry;
