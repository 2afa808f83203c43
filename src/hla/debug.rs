
use serde::Serialize;
use simple_error::bail;
use std::collections::btree_map::Entry::{Occupied, Vacant};
use std::collections::{BTreeMap, BTreeSet};
use strum::IntoEnumIterator;

use crate::data_types::fragment::{Fragment, FragmentScope};
use crate::hla::anchor::UnmatchedIndelTally;

/// Thresholds derived from the high-quality fragment count
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct EvidenceThresholds {
    /// Number of fragments with at least one high-quality base
    pub high_quality_fragments: usize,
    /// Minimum support for the all-fragment tables
    pub min_evidence: usize,
    /// Minimum support for the high-quality tables
    pub min_high_qual_evidence: usize
}

/// Counts of what happened to the fragments of a single gene
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GenePipelineStats {
    /// Fragments handed to the gene pipeline
    pub input_fragments: usize,
    /// Dropped because no high-quality bases remained
    pub quality_dropped: usize,
    /// Rebuilt because at least one observation lacked evidence
    pub nucleotide_rebuilt: usize,
    /// Dropped because nucleotide filtering removed everything
    pub nucleotide_dropped: usize,
    /// Gained a base at a splice boundary
    pub splice_enriched: usize,
    /// Dropped because no amino acids survived
    pub amino_acid_dropped: usize,
    /// Trusted fragments returned
    pub output_fragments: usize
}

/// QC summary for a genotyping run, gets converted into JSON
#[derive(Default, Serialize)]
pub struct EvidenceDebug {
    /// Thresholds used for this run
    thresholds: Option<EvidenceThresholds>,
    /// Total input fragments, after validation
    total_fragments: usize,
    /// Per-gene pipeline statistics
    gene_stats: BTreeMap<String, GenePipelineStats>,
    /// Reads that could not be anchored
    unmatched_indels: UnmatchedIndelTally,
    /// Fragment IDs discarded because their mate could not be anchored
    discarded_mates: BTreeSet<String>,
    /// Fragment ID to validation error
    malformed_fragments: BTreeMap<String, String>,
    /// Final scope of every fragment that reached allele matching, or was excluded before it
    scope_counts: BTreeMap<String, usize>
}

impl EvidenceDebug {
    /// Constructor, every scope starts at zero so the report always has the same shape
    pub fn new() -> EvidenceDebug {
        EvidenceDebug {
            scope_counts: FragmentScope::iter()
                .map(|s| (s.to_string(), 0))
                .collect(),
            ..Default::default()
        }
    }

    pub fn set_thresholds(&mut self, thresholds: EvidenceThresholds) {
        self.thresholds = Some(thresholds);
    }

    pub fn set_total_fragments(&mut self, total: usize) {
        self.total_fragments = total;
    }

    /// Adds the stats for a gene
    /// # Errors
    /// * if the gene has already been added
    pub fn add_gene_stats(&mut self, gene: String, stats: GenePipelineStats) -> Result<(), Box<dyn std::error::Error>> {
        match self.gene_stats.entry(gene) {
            Occupied(entry) => {
                bail!("Entry {} is already occupied", entry.key());
            },
            Vacant(entry) => {
                entry.insert(stats);
                Ok(())
            }
        }
    }

    pub fn set_unmatched_indels(&mut self, tally: UnmatchedIndelTally, discarded_mates: BTreeSet<String>) {
        self.unmatched_indels = tally;
        self.discarded_mates = discarded_mates;
    }

    pub fn add_malformed(&mut self, fragment_id: String, error: String) {
        self.malformed_fragments.insert(fragment_id, error);
    }

    /// Increments the counter for the fragment's current scope
    pub fn add_scope(&mut self, fragment: &Fragment) {
        *self.scope_counts.entry(fragment.scope().to_string()).or_insert(0) += 1;
    }

    // getters
    pub fn thresholds(&self) -> Option<&EvidenceThresholds> {
        self.thresholds.as_ref()
    }

    pub fn total_fragments(&self) -> usize {
        self.total_fragments
    }

    pub fn gene_stats(&self) -> &BTreeMap<String, GenePipelineStats> {
        &self.gene_stats
    }

    pub fn unmatched_indels(&self) -> &UnmatchedIndelTally {
        &self.unmatched_indels
    }

    pub fn discarded_mates(&self) -> &BTreeSet<String> {
        &self.discarded_mates
    }

    pub fn malformed_fragments(&self) -> &BTreeMap<String, String> {
        &self.malformed_fragments
    }

    pub fn scope_count(&self, scope: FragmentScope) -> usize {
        self.scope_counts.get(&scope.to_string()).copied().unwrap_or(0)
    }
}
