//! Event signature registry.
//!
//! Built once from a newline-delimited list of canonical event declarations
//! and never mutated afterwards, so it can be shared behind an `Arc` and read
//! from any number of tasks without locking.

use alloy_primitives::B256;
use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};
use tracing::{debug, warn};

use crate::{
    error::RegistryError,
    signature::{event_signature_hash, normalize_declaration},
};

/// The declaration list compiled into the binary.
pub const BUNDLED_SIGNATURES: &str = include_str!("../signatures/event_signatures.txt");

/// Read-only map of event signature hash → declaration text.
#[derive(Debug, Clone, Default)]
pub struct SignatureRegistry {
    by_hash: HashMap<B256, String>,
}

impl SignatureRegistry {
    /// An empty registry. Every lookup falls back to the unknown-event label.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from in-memory declarations. Malformed entries are skipped.
    pub fn from_declarations<I, S>(declarations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Self::empty();
        for (idx, line) in declarations.into_iter().enumerate() {
            registry.insert_line(idx + 1, line.as_ref());
        }
        registry
    }

    /// Load from any line-oriented reader.
    ///
    /// Only a failing read is an error; malformed lines are logged and skipped.
    pub fn load<R: BufRead>(reader: R) -> Result<Self, RegistryError> {
        let mut registry = Self::empty();
        for (idx, line) in reader.lines().enumerate() {
            registry.insert_line(idx + 1, &line?);
        }
        debug!(signatures = registry.len(), "signature registry loaded");
        Ok(registry)
    }

    /// Load a declaration file from disk.
    pub fn load_file(path: &Path) -> Result<Self, RegistryError> {
        let file = File::open(path).map_err(|source| RegistryError::Unreadable {
            path: path.display().to_string(),
            source,
        })?;
        Self::load(BufReader::new(file))
    }

    /// The list shipped with eventscope (ERC-20/721/1155, WETH, Uniswap, ...).
    pub fn bundled() -> Self {
        Self::from_declarations(BUNDLED_SIGNATURES.lines())
    }

    fn insert_line(&mut self, line_no: usize, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("//") {
            return;
        }
        match normalize_declaration(trimmed) {
            Some(declaration) => {
                // last write wins on duplicates
                self.by_hash
                    .insert(event_signature_hash(&declaration), declaration);
            }
            None => warn!(line = line_no, text = trimmed, "skipping malformed event declaration"),
        }
    }

    /// Look up the declaration registered for `hash`.
    pub fn lookup(&self, hash: &B256) -> Option<&str> {
        self.by_hash.get(hash).map(String::as_str)
    }

    /// Registered declaration, or `Unknown Event 0x<hash>`.
    pub fn lookup_or_default(&self, hash: &B256) -> String {
        match self.lookup(hash) {
            Some(name) => name.to_string(),
            None => unknown_event_label(hash),
        }
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    /// All (hash, declaration) pairs, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&B256, &str)> {
        self.by_hash.iter().map(|(h, d)| (h, d.as_str()))
    }
}

/// Label used for signatures the registry does not know.
pub fn unknown_event_label(hash: &B256) -> String {
    format!("Unknown Event {hash:#x}")
}
