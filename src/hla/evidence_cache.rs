
use simple_error::bail;
use std::collections::btree_map::Entry::{Occupied, Vacant};
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::data_types::evidence_table::EvidenceTable;

/// The pair of tables produced by one gene pipeline
#[derive(Clone, Debug)]
pub struct GeneTables {
    pub nucleotide: EvidenceTable,
    pub amino_acid: EvidenceTable
}

/// Per-gene evidence tables, filled once per gene and then only read
#[derive(Clone, Debug, Default)]
pub struct EvidenceTableCache {
    tables: BTreeMap<String, GeneTables>
}

impl EvidenceTableCache {
    pub fn new() -> EvidenceTableCache {
        Default::default()
    }

    /// Stores the tables for a gene
    /// # Errors
    /// * if the gene already has tables
    pub fn insert(&mut self, gene: String, nucleotide: EvidenceTable, amino_acid: EvidenceTable) -> Result<(), Box<dyn std::error::Error>> {
        match self.tables.entry(gene) {
            Occupied(entry) => bail!("Evidence tables for {} are already cached", entry.key()),
            Vacant(entry) => {
                entry.insert(GeneTables { nucleotide, amino_acid });
                Ok(())
            }
        }
    }

    pub fn genes(&self) -> impl Iterator<Item = &String> {
        self.tables.keys()
    }

    pub fn get(&self, gene: &str) -> Option<&GeneTables> {
        self.tables.get(gene)
    }

    pub fn nucleotide_table(&self, gene: &str) -> Option<&EvidenceTable> {
        self.tables.get(gene).map(|t| &t.nucleotide)
    }

    pub fn amino_acid_table(&self, gene: &str) -> Option<&EvidenceTable> {
        self.tables.get(gene).map(|t| &t.amino_acid)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &GeneTables)> {
        self.tables.iter()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Cache that can be written from several threads; the lock is only held for the insert.
/// For cohort-level callers whose gene pipelines insert concurrently; a single run aggregates through `EvidenceTableCache` instead.
#[derive(Debug, Default)]
pub struct SharedEvidenceCache {
    inner: Mutex<EvidenceTableCache>
}

impl SharedEvidenceCache {
    pub fn new() -> SharedEvidenceCache {
        Default::default()
    }

    /// Stores the tables for a gene
    /// # Errors
    /// * if the lock was poisoned
    /// * if the gene already has tables
    pub fn insert(&self, gene: String, nucleotide: EvidenceTable, amino_acid: EvidenceTable) -> Result<(), Box<dyn std::error::Error>> {
        let mut cache = match self.inner.lock() {
            Ok(c) => c,
            Err(e) => bail!("Evidence cache lock was poisoned: {e}")
        };
        cache.insert(gene, nucleotide, amino_acid)
    }

    /// Releases the underlying cache once all writers are done
    /// # Errors
    /// * if the lock was poisoned
    pub fn into_inner(self) -> Result<EvidenceTableCache, Box<dyn std::error::Error>> {
        match self.inner.into_inner() {
            Ok(c) => Ok(c),
            Err(e) => bail!("Evidence cache lock was poisoned: {e}")
        }
    }
}
