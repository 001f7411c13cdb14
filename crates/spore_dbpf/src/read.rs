//! Types for reading DBPF packages
//!

use std::{
    collections::{hash_map, HashMap},
    fs::File,
    path::Path,
};

use tracing::{debug, instrument, warn};

use crate::{
    compression::{self, CompressionMethod},
    error::{Error, FormatError, Result},
    key::ResourceKey,
    source::ByteSource,
    types::{parse_index, DbpfHeader, IndexEntry, Variant},
};

/// DBPF package reader
///
/// Opening a package reads its header and index only; entry data is read on demand with
/// positioned reads, so a shared reference can be used from several threads at once.
///
/// ```no_run
/// fn list_package_contents(path: &str) -> spore_dbpf::error::Result<()> {
///     let dbpf = spore_dbpf::DbpfArchive::open(path)?;
///
///     for entry in dbpf.entries() {
///         let data = dbpf.read_entry_data(entry)?;
///         println!("{}: {} bytes", entry.key, data.len());
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct DbpfArchive<S> {
    source: S,
    source_len: u64,
    header: DbpfHeader,
    entries: Vec<IndexEntry>,
    first_by_key: HashMap<ResourceKey, usize>,
}

impl DbpfArchive<File> {
    /// Open the package at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(File::open(path)?)
    }
}

impl<S: ByteSource> DbpfArchive<S> {
    /// Read a package's header and index from `source`.
    ///
    /// On failure the source is dropped before returning.
    #[instrument(skip_all, err)]
    pub fn new(source: S) -> Result<DbpfArchive<S>> {
        let source_len = source.len()?;

        let header = Self::read_header(&source, source_len)?;
        debug!(
            variant = ?header.variant,
            version = %format_args!("{}.{}", header.major_version, header.minor_version),
            entries = header.index_count,
            "header parsed"
        );

        let entries = Self::read_index(&source, source_len, &header)?;
        debug!(entries = entries.len(), "index parsed");

        let mut first_by_key = HashMap::with_capacity(entries.len());
        let mut duplicates = 0usize;
        for (index, entry) in entries.iter().enumerate() {
            match first_by_key.entry(entry.key) {
                hash_map::Entry::Vacant(slot) => {
                    slot.insert(index);
                }
                hash_map::Entry::Occupied(_) => duplicates += 1,
            }
        }
        if duplicates > 0 {
            warn!(duplicates, "package repeats resource keys, lookups use the first record");
        }

        Ok(DbpfArchive {
            source,
            source_len,
            header,
            entries,
            first_by_key,
        })
    }

    fn read_header(source: &S, source_len: u64) -> Result<DbpfHeader> {
        let mut magic = [0u8; 4];
        if source_len < magic.len() as u64 {
            return Err(truncated("header", magic.len() as u64, source_len));
        }
        source.read_exact_at(&mut magic, 0)?;

        let variant = Variant::from_magic(magic)?;
        let size = variant.header_size();
        if source_len < size as u64 {
            return Err(truncated("header", size as u64, source_len));
        }

        let bytes = source.read_vec_at(0, size)?;
        Ok(DbpfHeader::parse(variant, &bytes)?)
    }

    fn read_index(source: &S, source_len: u64, header: &DbpfHeader) -> Result<Vec<IndexEntry>> {
        let layout = header.index_layout()?;

        let end = header
            .index_offset
            .checked_add(header.index_size)
            .filter(|&end| end <= source_len)
            .ok_or_else(|| {
                truncated(
                    "index",
                    header.index_offset.saturating_add(header.index_size),
                    source_len,
                )
            })?;
        let size = usize::try_from(end - header.index_offset)
            .map_err(|_| truncated("index", end, source_len))?;

        let block = source.read_vec_at(header.index_offset, size)?;
        Ok(parse_index(
            &block,
            header.variant,
            layout,
            header.index_count,
        )?)
    }

    /// Close the package, handing back the byte source
    pub fn close(self) -> S {
        self.source
    }

    /// Bytes of an entry as stored in the package
    pub fn read_raw(&self, entry: &IndexEntry) -> Result<Vec<u8>> {
        let size = u64::from(entry.stored_size);
        if entry
            .offset
            .checked_add(size)
            .map_or(true, |end| end > self.source_len)
        {
            return Err(FormatError::EntryOutOfBounds {
                key: entry.key,
                offset: entry.offset,
                size,
                available: self.source_len,
            }
            .into());
        }

        Ok(self
            .source
            .read_vec_at(entry.offset, entry.stored_size as usize)?)
    }

    /// Bytes of an entry, decompressed if the index marks it as compressed
    #[instrument(skip_all, fields(key = %entry.key), err)]
    pub fn read_entry_data(&self, entry: &IndexEntry) -> Result<Vec<u8>> {
        let raw = self.read_raw(entry)?;
        match entry.compression {
            CompressionMethod::None => Ok(raw),
            CompressionMethod::RefPack => {
                compression::decompress(&raw, Some(entry.uncompressed_size as usize)).map_err(
                    |source| Error::Decode {
                        key: Some(entry.key),
                        source,
                    },
                )
            }
        }
    }

    /// Bytes of the first entry with `key`
    pub fn read_entry(&self, key: &ResourceKey) -> Result<Vec<u8>> {
        let entry = self.by_key(key).ok_or(Error::NotFound(*key))?;
        self.read_entry_data(entry)
    }
}

impl<S> DbpfArchive<S> {
    /// Fields of the package header
    pub fn header(&self) -> &DbpfHeader {
        &self.header
    }

    /// Which header layout the package uses
    pub fn variant(&self) -> Variant {
        self.header.variant
    }

    /// Package format version as `(major, minor)`
    pub fn version(&self) -> (u32, u32) {
        (self.header.major_version, self.header.minor_version)
    }

    /// Index format version as `(major, minor)`
    pub fn index_version(&self) -> (u32, u32) {
        (
            self.header.index_major_version,
            self.header.index_minor_version,
        )
    }

    /// Number of records in the index
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether this package contains no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index records in the order they are stored
    pub fn entries(&self) -> std::slice::Iter<'_, IndexEntry> {
        self.entries.iter()
    }

    /// Record at `index` in stored order
    pub fn by_index(&self, index: usize) -> Option<&IndexEntry> {
        self.entries.get(index)
    }

    /// Position of the first record with `key`
    pub fn index_of(&self, key: &ResourceKey) -> Option<usize> {
        self.first_by_key.get(key).copied()
    }

    /// First record with `key` in stored order
    pub fn by_key(&self, key: &ResourceKey) -> Option<&IndexEntry> {
        self.index_of(key).map(|index| &self.entries[index])
    }

    /// Number of records sharing `key`
    pub fn count_of(&self, key: &ResourceKey) -> usize {
        match self.index_of(key) {
            Some(first) => self.entries[first..]
                .iter()
                .filter(|entry| entry.key == *key)
                .count(),
            None => 0,
        }
    }

    /// Total size of all entries once decompressed
    pub fn decompressed_size(&self) -> u64 {
        self.entries
            .iter()
            .map(|entry| u64::from(entry.uncompressed_size))
            .sum()
    }
}

fn truncated(what: &'static str, needed: u64, available: u64) -> Error {
    FormatError::TruncatedData {
        what,
        needed,
        available,
    }
    .into()
}
