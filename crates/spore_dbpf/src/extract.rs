//! Listing, lookup and extraction of package entries.

use std::{
    collections::HashSet,
    fmt,
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use bon::Builder;
use spore_registry::{hex, NameRegistry, Table};
use tracing::{debug, info, instrument, warn};

use crate::{
    compression::CompressionMethod,
    error::{Error, Result},
    key::ResourceKey,
    read::DbpfArchive,
    source::ByteSource,
    types::IndexEntry,
};

/// One line of a package listing
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EntrySummary {
    /// Position in the index
    pub index: usize,
    pub key: ResourceKey,
    pub compression: CompressionMethod,
    pub stored_size: u32,
    pub uncompressed_size: u32,
}

impl EntrySummary {
    fn new(index: usize, entry: &IndexEntry) -> Self {
        Self {
            index,
            key: entry.key,
            compression: entry.compression,
            stored_size: entry.stored_size,
            uncompressed_size: entry.uncompressed_size,
        }
    }
}

impl fmt::Display for EntrySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.compression.is_compressed() {
            write!(
                f,
                "{} | compressed | {} -> {} bytes",
                self.key, self.stored_size, self.uncompressed_size
            )
        } else {
            write!(
                f,
                "{} | uncompressed | {} bytes",
                self.key, self.uncompressed_size
            )
        }
    }
}

/// Everything the index records about one entry
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// Position of the record in the index
    pub index: usize,
    pub key: ResourceKey,
    pub offset: u64,
    pub stored_size: u32,
    pub uncompressed_size: u32,
    pub compression: CompressionMethod,
    pub committed: bool,
    /// Records in the package with the same key, this one included
    pub records_with_key: usize,
}

/// Options for [`DbpfArchive::extract_all`]
#[derive(Debug, Clone, Default, Builder)]
pub struct ExtractOptions {
    /// Log every extracted entry at info level instead of debug
    #[builder(default)]
    pub verbose: bool,

    /// Replace files that already exist instead of failing those entries
    #[builder(default)]
    pub overwrite: bool,

    /// Checked between entries; once set, extraction stops and reports what it has done
    pub cancel: Option<Arc<AtomicBool>>,
}

/// Progress reported by [`ExtractAll`]
#[derive(Debug)]
pub enum ExtractEvent {
    /// One entry was written, or failed
    Entry(EntryProgress),
    /// Always the last event
    Finished(ExtractSummary),
}

/// Outcome of extracting a single entry
#[derive(Debug)]
pub struct EntryProgress {
    /// Position of the record in the index
    pub index: usize,
    /// Number of records in the package
    pub total: usize,
    pub key: ResourceKey,
    /// Output path, relative to the extraction root
    pub path: PathBuf,
    /// Bytes written, or why the entry could not be extracted
    pub outcome: Result<u64>,
}

/// Final report of [`ExtractAll`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub total: usize,
    pub extracted: usize,
    /// Keys of the records that could not be extracted, in index order
    pub failed: Vec<ResourceKey>,
    /// Whether extraction stopped early because it was cancelled
    pub cancelled: bool,
}

impl ExtractSummary {
    /// Records that were neither extracted nor failed
    pub fn remaining(&self) -> usize {
        self.total - self.extracted - self.failed.len()
    }

    /// Whether every record was extracted
    pub fn is_complete(&self) -> bool {
        self.extracted == self.total
    }
}

/// Characters that cannot appear in a file name on common filesystems
fn is_reserved(c: char) -> bool {
    matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || c.is_control()
}

/// A path component for `hash`: its registry name when it is usable, its hex form otherwise
fn component(registry: Option<&NameRegistry>, table: Table, hash: u32) -> String {
    registry
        .and_then(|registry| registry.lookup(table, hash))
        .map(|name| {
            name.chars()
                .map(|c| if is_reserved(c) { '_' } else { c })
                .collect::<String>()
        })
        .filter(|name| is_usable(name))
        .unwrap_or_else(|| hex(hash))
}

/// Whether a sanitised name can be used as a path component on common filesystems.
///
/// Windows refuses device names such as `CON` or `com1.txt`, and drops trailing dots and spaces.
fn is_usable(name: &str) -> bool {
    if matches!(name.trim(), "" | "." | "..") || name.ends_with(['.', ' ']) {
        return false;
    }

    let stem = name.split('.').next().unwrap_or(name).trim_end().to_lowercase();
    let device = match (stem.get(..3), stem.get(3..)) {
        (Some("con" | "prn" | "aux" | "nul"), Some("")) => true,
        (Some("com" | "lpt"), Some(number)) => {
            number.len() == 1 && number.bytes().all(|b| b.is_ascii_digit())
        }
        _ => false,
    };
    !device
}

/// Relative output path `<group>/<instance>.<type>` for `key`, before collision handling
pub fn entry_path(key: &ResourceKey, registry: Option<&NameRegistry>) -> PathBuf {
    let group = component(registry, Table::File, key.group);
    let instance = component(registry, Table::File, key.instance);
    let extension = component(registry, Table::Type, key.type_id);
    PathBuf::from(group).join(format!("{instance}.{extension}"))
}

/// Output paths already handed out during one extraction.
///
/// Paths compare case-insensitively. The first claimant of `<name>.<ext>` keeps it; later ones
/// get `<name>-<n>.<ext>` with the smallest free `n` starting at 1.
#[derive(Debug, Default)]
struct PathClaims {
    taken: HashSet<String>,
}

impl PathClaims {
    fn claim(&mut self, key: &ResourceKey, registry: Option<&NameRegistry>) -> PathBuf {
        let group = component(registry, Table::File, key.group);
        let instance = component(registry, Table::File, key.instance);
        let extension = component(registry, Table::Type, key.type_id);

        let mut file_name = format!("{instance}.{extension}");
        let mut suffix = 0usize;
        while !self
            .taken
            .insert(format!("{group}/{file_name}").to_lowercase())
        {
            suffix += 1;
            file_name = format!("{instance}-{suffix}.{extension}");
        }

        PathBuf::from(group).join(file_name)
    }
}

impl<S: ByteSource> DbpfArchive<S> {
    /// Summaries of the first `limit` records (all when `None`) in index order
    pub fn list_entries(
        &self,
        limit: Option<usize>,
    ) -> impl ExactSizeIterator<Item = EntrySummary> + '_ {
        self.entries()
            .enumerate()
            .take(limit.unwrap_or(usize::MAX))
            .map(|(index, entry)| EntrySummary::new(index, entry))
    }

    /// Summaries of the records whose key, or name from `registry`, contains `pattern`
    /// ignoring case
    pub fn entries_matching<'a>(
        &'a self,
        pattern: &str,
        registry: Option<&'a NameRegistry>,
    ) -> impl Iterator<Item = EntrySummary> + 'a {
        let pattern = pattern.to_lowercase();
        self.entries()
            .enumerate()
            .filter(move |(_, entry)| {
                let plain = entry.key.to_string().to_lowercase();
                plain.contains(&pattern)
                    || registry.is_some_and(|registry| {
                        entry
                            .key
                            .display_with(registry)
                            .to_string()
                            .to_lowercase()
                            .contains(&pattern)
                    })
            })
            .map(|(index, entry)| EntrySummary::new(index, entry))
    }

    /// Index details of the first record with `key`
    pub fn entry_info(&self, key: &ResourceKey) -> Result<EntryInfo> {
        let index = self.index_of(key).ok_or(Error::NotFound(*key))?;
        let entry = &self.entries().as_slice()[index];

        Ok(EntryInfo {
            index,
            key: entry.key,
            offset: entry.offset,
            stored_size: entry.stored_size,
            uncompressed_size: entry.uncompressed_size,
            compression: entry.compression,
            committed: entry.committed,
            records_with_key: self.count_of(key),
        })
    }

    /// Write the data of the first record with `key` to `writer`, returning the bytes written
    pub fn extract_entry_to<W: Write>(&self, key: &ResourceKey, mut writer: W) -> Result<u64> {
        let data = self.read_entry(key)?;
        writer.write_all(&data)?;
        writer.flush()?;
        Ok(data.len() as u64)
    }

    /// Write the data of the first record with `key` to the file at `destination`,
    /// creating missing parent directories
    #[instrument(skip(self, destination), fields(destination = %destination.as_ref().display()), err)]
    pub fn extract_entry(&self, key: &ResourceKey, destination: impl AsRef<Path>) -> Result<u64> {
        let destination = destination.as_ref();
        let data = self.read_entry(key)?;

        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)?;
        }
        File::create(destination)?.write_all(&data)?;

        Ok(data.len() as u64)
    }

    /// Extract every record below `root`, one event per record followed by a summary.
    ///
    /// Nothing is done until the returned iterator is advanced. Failures of single records are
    /// reported in their event and extraction carries on.
    pub fn extract_all<'a>(
        &'a self,
        root: impl AsRef<Path>,
        registry: Option<&'a NameRegistry>,
        options: ExtractOptions,
    ) -> ExtractAll<'a, S> {
        ExtractAll {
            archive: self,
            registry,
            root: root.as_ref().to_path_buf(),
            options,
            next: 0,
            claims: PathClaims::default(),
            summary: ExtractSummary {
                total: self.len(),
                ..Default::default()
            },
            finished: false,
        }
    }
}

/// Lazy extraction of a whole package, see [`DbpfArchive::extract_all`]
pub struct ExtractAll<'a, S> {
    archive: &'a DbpfArchive<S>,
    registry: Option<&'a NameRegistry>,
    root: PathBuf,
    options: ExtractOptions,
    next: usize,
    claims: PathClaims,
    summary: ExtractSummary,
    finished: bool,
}

impl<S: ByteSource> ExtractAll<'_, S> {
    /// Consume the remaining events, returning the final summary
    pub fn run(self) -> ExtractSummary {
        let mut summary = ExtractSummary::default();
        for event in self {
            if let ExtractEvent::Finished(done) = event {
                summary = done;
            }
        }
        summary
    }

    fn is_cancelled(&self) -> bool {
        self.options
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    fn write(&self, entry: &IndexEntry, path: &Path) -> Result<u64> {
        let data = self.archive.read_entry_data(entry)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = if self.options.overwrite {
            File::create(path)?
        } else {
            File::create_new(path)?
        };

        let mut out = BufWriter::new(file);
        out.write_all(&data)?;
        out.flush()?;
        Ok(data.len() as u64)
    }

    fn finish(&mut self, cancelled: bool) -> ExtractEvent {
        self.finished = true;
        self.summary.cancelled = cancelled;

        let summary = &self.summary;
        if cancelled {
            warn!(
                extracted = summary.extracted,
                failed = summary.failed.len(),
                remaining = summary.remaining(),
                "extraction cancelled"
            );
        } else {
            info!(
                extracted = summary.extracted,
                failed = summary.failed.len(),
                "extraction finished"
            );
        }

        ExtractEvent::Finished(std::mem::take(&mut self.summary))
    }
}

impl<S: ByteSource> Iterator for ExtractAll<'_, S> {
    type Item = ExtractEvent;

    fn next(&mut self) -> Option<ExtractEvent> {
        if self.finished {
            return None;
        }
        if self.is_cancelled() {
            return Some(self.finish(true));
        }

        let index = self.next;
        let Some(entry) = self.archive.by_index(index) else {
            return Some(self.finish(false));
        };
        self.next += 1;

        let relative = self.claims.claim(&entry.key, self.registry);
        let outcome = self.write(entry, &self.root.join(&relative));

        match &outcome {
            Ok(bytes) => {
                self.summary.extracted += 1;
                if self.options.verbose {
                    info!(key = %entry.key, path = %relative.display(), bytes, "extracted");
                } else {
                    debug!(key = %entry.key, path = %relative.display(), bytes, "extracted");
                }
            }
            Err(e) => {
                self.summary.failed.push(entry.key);
                warn!(key = %entry.key, path = %relative.display(), error = %e, "unable to extract");
            }
        }

        Some(ExtractEvent::Entry(EntryProgress {
            index,
            total: self.summary.total,
            key: entry.key,
            path: relative,
            outcome,
        }))
    }
}
