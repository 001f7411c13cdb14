//! The three registries loaded together from one directory.

use std::{
    borrow::Cow,
    fs::File,
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use once_cell::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use crate::{
    error::Result,
    hash::{compute_hash, hex, prefixed_hash_literal},
    table::{HashTable, TableReport},
};

static SHARED: OnceCell<Arc<NameRegistry>> = OnceCell::new();

/// Selects one of the registry tables
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Table {
    /// `reg_file.txt`: group and instance names
    File,
    /// `reg_type.txt`: type names, used as file extensions
    Type,
    /// `reg_property.txt`: property names
    Property,
}

impl Table {
    /// All tables, in load order
    pub const ALL: [Table; 3] = [Table::File, Table::Type, Table::Property];

    /// Name of the registry file backing this table
    pub fn file_name(self) -> &'static str {
        match self {
            Table::File => "reg_file.txt",
            Table::Type => "reg_type.txt",
            Table::Property => "reg_property.txt",
        }
    }
}

/// Per table outcome of [`NameRegistry::load`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub file: TableReport,
    pub types: TableReport,
    pub property: TableReport,
}

impl LoadReport {
    /// Report for a single table
    pub fn table(&self, table: Table) -> TableReport {
        match table {
            Table::File => self.file,
            Table::Type => self.types,
            Table::Property => self.property,
        }
    }

    /// Lines skipped across all tables
    pub fn skipped(&self) -> usize {
        self.file.skipped + self.types.skipped + self.property.skipped
    }
}

/// Read-only hash to name lookup over the file, type and property registries.
///
/// Lookups never fail: a hash that is not registered is simply absent, and callers render
/// it with [`hex`] instead.
#[derive(Debug, Clone, Default)]
pub struct NameRegistry {
    root: PathBuf,
    file: HashTable,
    types: HashTable,
    property: HashTable,
    report: LoadReport,
}

impl NameRegistry {
    /// Load the process wide registry from `root` the first time this is called.
    ///
    /// Concurrent first callers block until a single load has finished; every later call returns
    /// the same handle, whatever `root` it passes. A failed load leaves the registry uninitialised
    /// so a later call may retry.
    pub fn init(root: impl AsRef<Path>) -> Result<Arc<NameRegistry>> {
        let root = root.as_ref();
        let shared = SHARED.get_or_try_init(|| Self::load(root).map(Arc::new))?;
        if shared.root != root {
            debug!(
                requested = %root.display(),
                loaded = %shared.root.display(),
                "name registry already initialised"
            );
        }
        Ok(Arc::clone(shared))
    }

    /// The process wide registry, if [`NameRegistry::init`] has completed
    pub fn shared() -> Option<Arc<NameRegistry>> {
        SHARED.get().cloned()
    }

    /// Read `reg_file.txt`, `reg_type.txt` and `reg_property.txt` from `root`.
    ///
    /// A registry file that does not exist yields an empty table.
    #[instrument(skip_all, fields(root = %root.as_ref().display()), err)]
    pub fn load(root: impl AsRef<Path>) -> Result<NameRegistry> {
        let root = root.as_ref();
        let mut registry = NameRegistry {
            root: root.to_path_buf(),
            ..Default::default()
        };

        for table in Table::ALL {
            let path = root.join(table.file_name());
            let (loaded, report) = match File::open(&path) {
                Ok(file) => HashTable::read(file)?,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    warn!(path = %path.display(), "registry file not found");
                    (HashTable::new(), TableReport::default())
                }
                Err(e) => return Err(e.into()),
            };

            info!(
                registry = table.file_name(),
                loaded = report.loaded,
                skipped = report.skipped,
                "loaded registry"
            );

            match table {
                Table::File => (registry.file, registry.report.file) = (loaded, report),
                Table::Type => (registry.types, registry.report.types) = (loaded, report),
                Table::Property => {
                    (registry.property, registry.report.property) = (loaded, report)
                }
            }
        }

        Ok(registry)
    }

    /// Directory the registries were read from
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lines loaded and skipped while reading the registries
    pub fn report(&self) -> LoadReport {
        self.report
    }

    /// Borrow one of the tables
    pub fn table(&self, table: Table) -> &HashTable {
        match table {
            Table::File => &self.file,
            Table::Type => &self.types,
            Table::Property => &self.property,
        }
    }

    /// Mutably borrow one of the tables, for registering names before the registry is shared
    pub fn table_mut(&mut self, table: Table) -> &mut HashTable {
        match table {
            Table::File => &mut self.file,
            Table::Type => &mut self.types,
            Table::Property => &mut self.property,
        }
    }

    /// Name registered for `hash` in `table`
    pub fn lookup(&self, table: Table, hash: u32) -> Option<&str> {
        self.table(table).name(hash)
    }

    /// Name registered for `hash` in `table`, or its hex form
    pub fn lookup_or_hex(&self, table: Table, hash: u32) -> Cow<'_, str> {
        match self.lookup(table, hash) {
            Some(name) => Cow::Borrowed(name),
            None => Cow::Owned(hex(hash)),
        }
    }

    /// File or instance name for `hash`
    pub fn file_name(&self, hash: u32) -> Option<&str> {
        self.lookup(Table::File, hash)
    }

    /// Type name (extension) for `hash`
    pub fn type_name(&self, hash: u32) -> Option<&str> {
        self.lookup(Table::Type, hash)
    }

    /// Property name for `hash`
    pub fn property_name(&self, hash: u32) -> Option<&str> {
        self.lookup(Table::Property, hash)
    }

    /// Hash for `name` in `table`.
    ///
    /// Explicit hex literals (`0x1234`, `#1234`) are taken as they are, then the registry is
    /// consulted case-insensitively, and anything else is hashed with [`compute_hash`].
    pub fn hash_of(&self, table: Table, name: &str) -> u32 {
        prefixed_hash_literal(name)
            .or_else(|| self.table(table).hash(name))
            .unwrap_or_else(|| compute_hash(name))
    }

    /// Hash for a file or instance name
    pub fn file_hash(&self, name: &str) -> u32 {
        self.hash_of(Table::File, name)
    }

    /// Hash for a type name
    pub fn type_hash(&self, name: &str) -> u32 {
        self.hash_of(Table::Type, name)
    }

    /// Hash for a property name
    pub fn property_hash(&self, name: &str) -> u32 {
        self.hash_of(Table::Property, name)
    }
}
