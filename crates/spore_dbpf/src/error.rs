//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

use crate::compression::DecodeError;
use crate::key::{ParseKeyError, ResourceKey};

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent wrapper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// file is not a valid package
    #[error(transparent)]
    #[diagnostic(transparent)]
    Format(#[from] FormatError),

    /// no entry with the requested key
    #[error("no entry for {0}")]
    NotFound(ResourceKey),

    /// the payload of an entry could not be decompressed
    #[error("unable to decompress {}", .key.map_or_else(|| "payload".to_owned(), |k| k.to_string()))]
    Decode {
        key: Option<ResourceKey>,
        #[source]
        source: DecodeError,
    },

    /// text is not a resource key
    #[error(transparent)]
    Parse(#[from] ParseKeyError),

    /// Transparent wrapper for [`spore_registry::error::Error`]
    #[error(transparent)]
    Registry(#[from] spore_registry::error::Error),
}

impl From<DecodeError> for Error {
    fn from(source: DecodeError) -> Self {
        Error::Decode { key: None, source }
    }
}

/// Errors in the container structure itself
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// magic is neither `DBPF` nor `DBBF`
    #[error("unrecognised package magic {0:02X?}")]
    InvalidMagic([u8; 4]),

    /// version outside of what this library understands
    #[error("unsupported {what} version {major}.{minor}")]
    UnsupportedVersion {
        what: &'static str,
        major: u32,
        minor: u32,
    },

    /// the source ends before the data the header or index describes
    #[error("truncated {what}: needs {needed} bytes, {available} available")]
    TruncatedData {
        what: &'static str,
        needed: u64,
        available: u64,
    },

    /// unknown value in an index record's compression field
    #[error("unknown compression flag 0x{0:04X}")]
    InvalidCompressionFlag(u16),

    /// an entry's data range lies outside the source
    #[error("data for {key} at {offset}+{size} lies outside the {available} byte package")]
    EntryOutOfBounds {
        key: ResourceKey,
        offset: u64,
        size: u64,
        available: u64,
    },
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
