//! Protein alias registry
//!
//! Built from a STRING-style alias table (`protein_id<TAB>alias<TAB>sources`).
//! Maps gene symbols to the proteins they encode and each protein back to a
//! display symbol. The registry is an ordinary value owned by one analysis.

use crate::input::open_text;
use rustc_hash::{FxHashMap, FxHashSet};
use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;
use std::io::{self, BufRead};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Alias sources whose names are treated as the official gene symbol
const PREFERRED_SOURCES: &[&str] = &["BioMart_HUGO", "Ensembl_HGNC"];

#[derive(Error, Debug)]
pub enum RegistryError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Line with fewer than two columns
    #[error("Malformed alias table line {line}: {content}")]
    Malformed { line: usize, content: String },
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Interned protein identifier (e.g. `9606.ENSP00000269305`).
///
/// Clones share one allocation; ordering and equality are by the id string.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProteinId(Arc<str>);

impl ProteinId {
    pub fn new(id: &str) -> Self {
        ProteinId(Arc::from(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ProteinId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProteinId {
    fn from(id: &str) -> Self {
        ProteinId::new(id)
    }
}

impl fmt::Display for ProteinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ProteinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

#[derive(Debug, Default)]
pub struct ProteinRegistry {
    proteins: FxHashSet<ProteinId>,
    by_symbol: FxHashMap<String, BTreeSet<ProteinId>>,
    /// Display symbol per protein and whether it came from a preferred source
    symbols: FxHashMap<ProteinId, (String, bool)>,
}

impl ProteinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an alias table, gzip or plain
    pub fn load(path: impl AsRef<Path>) -> RegistryResult<Self> {
        let path = path.as_ref();
        info!("Loading protein aliases from {:?}", path);
        let registry = Self::from_reader(open_text(path)?)?;
        info!(
            "Loaded {} proteins under {} symbols",
            registry.protein_count(),
            registry.symbol_count()
        );
        Ok(registry)
    }

    /// Parse `protein_id<TAB>alias[<TAB>sources]` lines; `#` lines are headers
    pub fn from_reader<R: BufRead>(reader: R) -> RegistryResult<Self> {
        let mut registry = Self::new();
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            if line.starts_with('#') || line.trim().is_empty() {
                continue;
            }
            let mut fields = line.split('\t');
            match (fields.next(), fields.next()) {
                (Some(protein), Some(alias)) if !protein.is_empty() && !alias.is_empty() => {
                    registry.register(protein, alias, fields.next().unwrap_or(""));
                }
                _ => {
                    return Err(RegistryError::Malformed {
                        line: number + 1,
                        content: line,
                    })
                }
            }
        }
        Ok(registry)
    }

    /// Record that `alias` names `protein` according to `sources`
    pub fn register(&mut self, protein: &str, alias: &str, sources: &str) {
        let id = self.resolve(protein);
        self.proteins.insert(id.clone());
        self.by_symbol
            .entry(alias.to_string())
            .or_default()
            .insert(id.clone());

        let preferred = PREFERRED_SOURCES.iter().any(|s| sources.contains(s));
        match self.symbols.get(&id) {
            Some((_, true)) => {}
            Some((_, false)) if !preferred => {}
            _ => {
                self.symbols.insert(id, (alias.to_string(), preferred));
            }
        }
    }

    /// The registered id when known, a fresh one otherwise
    pub fn resolve(&self, protein: &str) -> ProteinId {
        self.proteins
            .get(protein)
            .cloned()
            .unwrap_or_else(|| ProteinId::new(protein))
    }

    /// Proteins encoded by a gene symbol
    pub fn proteins_for(&self, symbol: &str) -> Option<&BTreeSet<ProteinId>> {
        self.by_symbol.get(symbol)
    }

    pub fn symbol_of(&self, protein: &ProteinId) -> Option<&str> {
        self.symbols.get(protein).map(|(symbol, _)| symbol.as_str())
    }

    /// Gene symbol when known, the raw protein id otherwise
    pub fn display_name<'a>(&'a self, protein: &'a ProteinId) -> &'a str {
        self.symbol_of(protein).unwrap_or(protein.as_str())
    }

    pub fn contains(&self, protein: &str) -> bool {
        self.proteins.contains(protein)
    }

    pub fn protein_count(&self) -> usize {
        self.proteins.len()
    }

    pub fn symbol_count(&self) -> usize {
        self.by_symbol.len()
    }
}
