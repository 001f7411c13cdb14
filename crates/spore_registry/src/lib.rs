//! This library loads the hash registries used to turn *Spore* resource ids back into readable names.
//!
//! # Registry Format Documentation
//!
//! Spore identifies resources, folders, file types and properties by 32-bit FNV-1a hashes of their names.
//! The names themselves are not stored in the packages, so tools ship plain text registries that map the
//! hashes back to names. Three registries live side by side in one directory:
//!
//! | File               | Table                          | Used for                                 |
//! |--------------------|--------------------------------|------------------------------------------|
//! | `reg_file.txt`     | [`Table::File`]                | Group folders and instance (file) names  |
//! | `reg_type.txt`     | [`Table::Type`]                | Type ids rendered as file extensions     |
//! | `reg_property.txt` | [`Table::Property`]            | Property ids inside property lists       |
//!
//! ## Line Format
//!
//! Every registry is read in a single pass, one entry per line:
//!
//! - `name<TAB>hash`: the hash is hexadecimal with an optional `0x` or `#` prefix.
//! - `name`: a name without a hash is registered under the hash of its lowercase form.
//! - Empty lines and lines starting with `#` are ignored.
//!
//! A line whose hash cannot be parsed is skipped and counted in the [`LoadReport`]; it never aborts the load.
//!
//! ## Hashing
//!
//! The hash is the standard 32-bit FNV-1a, see [`compute_hash`].
//!
//! ```no_run
//! # fn doit() -> spore_registry::error::Result<()> {
//! use spore_registry::{NameRegistry, Table};
//!
//! let registry = NameRegistry::init("registries")?;
//! let hash = spore_registry::compute_hash("sporemaster");
//!
//! match registry.lookup(Table::File, hash) {
//!     Some(name) => println!("{name}"),
//!     None => println!("{}", spore_registry::hex(hash)),
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod hash;
pub mod registry;
pub mod table;

pub use hash::{compute_hash, hex, parse_hash_literal};
pub use registry::{LoadReport, NameRegistry, Table};
pub use table::HashTable;
