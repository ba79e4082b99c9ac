//! Intermediate representation model.
//!
//! This module provides:
//! - The manifold data model (types, signatures, arguments, hooks)
//! - LIL parsing into a validated manifold graph
//! - The export table and per-language source blobs
//!
//! Everything here is built once from the frontend output and is read-only
//! afterwards.

mod graph;
mod parser;
mod types;

use std::collections::BTreeMap;

pub use graph::ManifoldGraph;
pub use parser::LilParser;
pub use types::{Argument, Atom, FailAction, HookPoint, Manifold, Signature, Type};

use crate::error::{Error, Result};

/// Mapping from exported names to manifold ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportTable {
    entries: BTreeMap<String, String>,
}

impl ExportTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an export.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is already exported or is not usable on
    /// a command line.
    pub fn insert(&mut self, name: String, mid: String) -> Result<()> {
        let usable = !name.is_empty()
            && !name.starts_with('-')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !usable {
            return Err(Error::InvalidExport(format!("'{name}' is not a valid command name")));
        }
        if self.entries.contains_key(&name) {
            return Err(Error::InvalidExport(format!("'{name}' is exported twice")));
        }
        self.entries.insert(name, mid);
        Ok(())
    }

    /// Resolve an exported name to its manifold id.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Exports sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A fully loaded program: graph, exports, and raw source per language.
#[derive(Debug)]
pub struct Program {
    pub graph: ManifoldGraph,
    pub exports: ExportTable,
    pub sources: BTreeMap<String, String>,
}

impl Program {
    /// Parse a LIL stream.
    pub fn from_lil(lil: &str) -> Result<Self> {
        LilParser::new().parse_str(lil)
    }

    /// Raw source for a language, empty if none was given.
    pub fn source(&self, lang: &str) -> &str {
        self.sources.get(lang).map(String::as_str).unwrap_or("")
    }
}
