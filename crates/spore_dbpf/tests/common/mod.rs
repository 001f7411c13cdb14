#![allow(dead_code)]

use std::io::{Cursor, Write};

use binrw::BinWrite;
use byteorder::{LittleEndian, WriteBytesExt};
use spore_dbpf::{
    types::{NarrowHeader, WideHeader},
    ResourceKey, Variant,
};

/// `"SporeModer"` five times, RefPack compressed to 20 bytes
pub const SPORE_MODER: [u8; 20] = [
    0x10, 0xFB, 0x00, 0x00, 0x32, 0xE1, b'S', b'p', b'o', b'r', b'e', b'M', b'o', b'd', 0xA4,
    0x80, 0x09, b'e', b'r', 0xFC,
];

pub const RAW_KEY: ResourceKey = ResourceKey::new(0x12345678, 0x9ABCDEF0, 0x2F4E681C);
pub const PACKED_KEY: ResourceKey = ResourceKey::new(0x00000001, 0x00000002, 0x00000003);

pub fn spore_moder() -> Vec<u8> {
    b"SporeModer".repeat(5)
}

pub fn raw_payload() -> Vec<u8> {
    (0..100u8).collect()
}

#[derive(Debug, Clone)]
struct Record {
    key: ResourceKey,
    data: Vec<u8>,
    /// Uncompressed size for RefPack records
    packed: Option<u32>,
    offset_override: Option<u64>,
}

/// Assembles packages in memory: header, entry data, then a version 0.3 or 0.0 index
#[derive(Debug, Clone)]
pub struct PackageBuilder {
    variant: Variant,
    compact: bool,
    records: Vec<Record>,
}

impl PackageBuilder {
    pub fn narrow() -> Self {
        Self {
            variant: Variant::Narrow,
            compact: false,
            records: Vec::new(),
        }
    }

    pub fn wide() -> Self {
        Self {
            variant: Variant::Wide,
            ..Self::narrow()
        }
    }

    /// Use the version 0.0 index layout
    pub fn compact(mut self) -> Self {
        self.compact = true;
        self
    }

    pub fn raw(mut self, key: ResourceKey, data: &[u8]) -> Self {
        self.records.push(Record {
            key,
            data: data.to_vec(),
            packed: None,
            offset_override: None,
        });
        self
    }

    pub fn packed(mut self, key: ResourceKey, data: &[u8], uncompressed_size: u32) -> Self {
        self.records.push(Record {
            key,
            data: data.to_vec(),
            packed: Some(uncompressed_size),
            offset_override: None,
        });
        self
    }

    /// A raw record whose offset points at `offset` instead of its data
    pub fn dangling(mut self, key: ResourceKey, size: usize, offset: u64) -> Self {
        self.records.push(Record {
            key,
            data: vec![0; size],
            packed: None,
            offset_override: Some(offset),
        });
        self
    }

    /// The two entry package used throughout the tests
    pub fn scenario() -> Self {
        Self::narrow()
            .raw(RAW_KEY, &raw_payload())
            .packed(PACKED_KEY, &SPORE_MODER, 50)
    }

    pub fn build(&self) -> Vec<u8> {
        let header_size = self.variant.header_size();
        let mut package = vec![0u8; header_size];

        let mut offsets = Vec::with_capacity(self.records.len());
        for record in &self.records {
            offsets.push(
                record
                    .offset_override
                    .unwrap_or(package.len() as u64),
            );
            package.extend_from_slice(&record.data);
        }

        let index_offset = package.len() as u64;
        let index = self.index(&offsets);
        package.extend_from_slice(&index);

        let mut header = Cursor::new(Vec::with_capacity(header_size));
        let index_minor_version = if self.compact { 0 } else { 3 };
        match self.variant {
            Variant::Narrow => NarrowHeader {
                major_version: 2,
                index_count: self.records.len() as u32,
                index_size: index.len() as u32,
                index_minor_version,
                index_offset: index_offset as u32,
                ..Default::default()
            }
            .write(&mut header)
            .unwrap(),
            Variant::Wide => WideHeader {
                major_version: 3,
                index_count: self.records.len() as u32,
                index_size: index.len() as u64,
                index_minor_version,
                index_offset,
                ..Default::default()
            }
            .write(&mut header)
            .unwrap(),
        }
        let header = header.into_inner();
        assert_eq!(header.len(), header_size);
        package[..header_size].copy_from_slice(&header);

        package
    }

    fn index(&self, offsets: &[u64]) -> Vec<u8> {
        let mut index = Vec::new();
        if self.records.is_empty() {
            return index;
        }
        if !self.compact {
            index.write_u32::<LittleEndian>(0).unwrap();
        }

        for (record, &offset) in self.records.iter().zip(offsets) {
            index.write_u32::<LittleEndian>(record.key.type_id).unwrap();
            index.write_u32::<LittleEndian>(record.key.group).unwrap();
            index.write_u32::<LittleEndian>(record.key.instance).unwrap();
            match self.variant {
                Variant::Narrow => index.write_u32::<LittleEndian>(offset as u32).unwrap(),
                Variant::Wide => index.write_u64::<LittleEndian>(offset).unwrap(),
            }

            let stored = record.data.len() as u32;
            if self.compact {
                match record.packed {
                    Some(size) => {
                        index.write_u32::<LittleEndian>(stored | 0x8000_0000).unwrap();
                        index.write_u32::<LittleEndian>(size).unwrap();
                    }
                    None => index.write_u32::<LittleEndian>(stored).unwrap(),
                }
            } else {
                index.write_u32::<LittleEndian>(stored | 0x8000_0000).unwrap();
                index
                    .write_u32::<LittleEndian>(record.packed.unwrap_or(stored))
                    .unwrap();
                let compression = if record.packed.is_some() { 0xFFFF } else { 0 };
                index.write_u16::<LittleEndian>(compression).unwrap();
                index.write_all(&[1, 0]).unwrap();
            }
        }

        index
    }
}
