//! A single hash to name table and the registry line parser.

use std::{
    collections::HashMap,
    hash::BuildHasherDefault,
    io::{BufRead, BufReader, Read},
};

use nohash::NoHashHasher;
use tracing::debug;

use crate::{
    error::Result,
    hash::{compute_hash, parse_hash_literal},
};

type HashKeyed<V> = HashMap<u32, V, BuildHasherDefault<NoHashHasher<u32>>>;

/// What a single registry line contributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Line<'a> {
    /// Empty or comment line
    Blank,
    /// A name with its hash
    Entry(&'a str, u32),
    /// The line could not be understood
    Malformed,
}

impl<'a> Line<'a> {
    pub(crate) fn parse(raw: &'a str) -> Line<'a> {
        let line = raw.trim_end_matches(|c| c == '\r' || c == '\n');
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Line::Blank;
        }

        match line.split_once('\t') {
            Some((name, hash)) => {
                let name = name.trim();
                match parse_hash_literal(hash) {
                    Ok(hash) if !name.is_empty() => Line::Entry(name, hash),
                    _ => Line::Malformed,
                }
            }
            None => Line::Entry(trimmed, compute_hash(&trimmed.to_lowercase())),
        }
    }
}

/// Number of lines taken from and skipped in one registry file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableReport {
    /// Entries added to the table
    pub loaded: usize,
    /// Malformed lines that were ignored
    pub skipped: usize,
}

/// Mapping from 32-bit hashes to names, with a case-insensitive reverse mapping.
#[derive(Debug, Clone, Default)]
pub struct HashTable {
    names: HashKeyed<Box<str>>,
    hashes: HashMap<Box<str>, u32>,
}

impl HashTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every line of a registry, skipping the ones that do not parse.
    pub fn read<R: Read>(reader: R) -> Result<(Self, TableReport)> {
        let mut table = Self::new();
        let mut report = TableReport::default();

        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        let mut number = 0usize;
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            number += 1;

            let parsed = match std::str::from_utf8(&buf) {
                Ok(line) => Line::parse(line),
                Err(_) => Line::Malformed,
            };
            match parsed {
                Line::Blank => {}
                Line::Entry(name, hash) => {
                    table.insert(name, hash);
                    report.loaded += 1;
                }
                Line::Malformed => {
                    debug!(
                        line = number,
                        text = %String::from_utf8_lossy(&buf).trim_end(),
                        "skipping malformed registry line"
                    );
                    report.skipped += 1;
                }
            }
        }

        Ok((table, report))
    }

    /// Register `name` under `hash`. A later name for the same hash replaces the earlier one.
    pub fn insert(&mut self, name: &str, hash: u32) {
        self.hashes.insert(name.to_lowercase().into(), hash);
        self.names.insert(hash, name.into());
    }

    /// Name registered for `hash`, if any
    pub fn name(&self, hash: u32) -> Option<&str> {
        self.names.get(&hash).map(AsRef::as_ref)
    }

    /// Hash registered for `name`, compared case-insensitively
    pub fn hash(&self, name: &str) -> Option<u32> {
        self.hashes.get(name.to_lowercase().as_str()).copied()
    }

    /// Number of distinct hashes in the table
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the table holds no names
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
