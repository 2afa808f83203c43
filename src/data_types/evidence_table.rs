
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::data_types::fragment::Fragment;

/// The coordinate space and value type that an evidence table was built from
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, strum_macros::Display)]
pub enum EvidenceLevel {
    #[strum(to_string = "nucleotide")]
    Nucleotide,
    #[strum(to_string = "amino_acid")]
    AminoAcid
}

/// Per-locus tally of how many fragments support each observed value.
/// Immutable once built, all threshold queries use the count it was built with.
#[derive(Clone, Debug, Serialize)]
pub struct EvidenceTable {
    /// The level this table was built at
    level: EvidenceLevel,
    /// Minimum support for a value to be trusted
    min_count: usize,
    /// locus -> value -> supporting fragment count
    counts: BTreeMap<usize, BTreeMap<u8, usize>>
}

impl EvidenceTable {
    /// Tallies every fragment's observations at the requested level.
    /// # Arguments
    /// * `level` - whether to count working nucleotides or amino acids
    /// * `min_count` - the evidence threshold for this table
    /// * `fragments` - the fragments to count
    pub fn build<'a>(level: EvidenceLevel, min_count: usize, fragments: impl IntoIterator<Item = &'a Fragment>) -> EvidenceTable {
        let mut counts: BTreeMap<usize, BTreeMap<u8, usize>> = Default::default();
        for fragment in fragments {
            match level {
                EvidenceLevel::Nucleotide => {
                    for (locus, base, _quality) in fragment.nucleotide_iter() {
                        *counts.entry(locus).or_default().entry(base).or_insert(0) += 1;
                    }
                },
                EvidenceLevel::AminoAcid => {
                    for (locus, amino_acid) in fragment.amino_acid_iter() {
                        *counts.entry(locus).or_default().entry(amino_acid).or_insert(0) += 1;
                    }
                }
            }
        }

        EvidenceTable {
            level,
            min_count,
            counts
        }
    }

    /// Shortcut for a nucleotide table
    pub fn nucleotides<'a>(min_count: usize, fragments: impl IntoIterator<Item = &'a Fragment>) -> EvidenceTable {
        Self::build(EvidenceLevel::Nucleotide, min_count, fragments)
    }

    /// Shortcut for an amino acid table
    pub fn amino_acids<'a>(min_count: usize, fragments: impl IntoIterator<Item = &'a Fragment>) -> EvidenceTable {
        Self::build(EvidenceLevel::AminoAcid, min_count, fragments)
    }

    // getters
    pub fn level(&self) -> EvidenceLevel {
        self.level
    }

    pub fn min_count(&self) -> usize {
        self.min_count
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// All loci with at least one observation, in order
    pub fn loci(&self) -> impl Iterator<Item = usize> + '_ {
        self.counts.keys().copied()
    }

    /// The raw value counts at a locus
    pub fn values(&self, locus: usize) -> Option<&BTreeMap<u8, usize>> {
        self.counts.get(&locus)
    }

    /// Number of supporting fragments for a specific value
    pub fn count(&self, locus: usize, value: u8) -> usize {
        self.counts.get(&locus)
            .and_then(|c| c.get(&value))
            .copied()
            .unwrap_or(0)
    }

    /// Total number of observations at a locus, regardless of value
    pub fn depth(&self, locus: usize) -> usize {
        self.counts.get(&locus)
            .map(|c| c.values().sum())
            .unwrap_or(0)
    }

    /// Returns every value at the locus with support at or above the threshold.
    /// An empty set means the locus is inconclusive.
    pub fn values_at_or_above_threshold(&self, locus: usize) -> BTreeSet<u8> {
        match self.counts.get(&locus) {
            Some(c) => c.iter()
                .filter(|(_v, &count)| count >= self.min_count)
                .map(|(&v, _count)| v)
                .collect(),
            None => Default::default()
        }
    }

    /// Returns the single trusted value at a locus, if exactly one clears the threshold
    pub fn homozygous_value(&self, locus: usize) -> Option<u8> {
        let values = self.values_at_or_above_threshold(locus);
        if values.len() == 1 {
            values.into_iter().next()
        } else {
            None
        }
    }

    /// Loci where exactly one value clears the threshold
    pub fn homozygous_loci(&self) -> Vec<usize> {
        self.loci()
            .filter(|&l| self.values_at_or_above_threshold(l).len() == 1)
            .collect()
    }

    /// Loci where more than one value clears the threshold
    pub fn heterozygous_loci(&self) -> Vec<usize> {
        self.loci()
            .filter(|&l| self.values_at_or_above_threshold(l).len() > 1)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Creates `count` copies of a single-base fragment
    fn repeated_fragments(locus: usize, base: u8, count: usize) -> Vec<Fragment> {
        (0..count)
            .map(|i| Fragment::new(format!("{}_{i}", base as char), ["HLA-A".to_string()], vec![locus], vec![base], vec![37]))
            .collect()
    }

    #[test]
    fn test_threshold() {
        let mut fragments = repeated_fragments(4, b'A', 10);
        fragments.extend(repeated_fragments(4, b'C', 2));

        let table = EvidenceTable::nucleotides(5, &fragments);
        assert_eq!(table.values_at_or_above_threshold(4), BTreeSet::from([b'A']));
        assert_eq!(table.depth(4), 12);
        assert_eq!(table.count(4, b'C'), 2);
        assert_eq!(table.homozygous_loci(), vec![4]);
        assert!(table.heterozygous_loci().is_empty());

        let table = EvidenceTable::nucleotides(1, &fragments);
        assert_eq!(table.values_at_or_above_threshold(4), BTreeSet::from([b'A', b'C']));
        assert!(table.homozygous_loci().is_empty());
        assert_eq!(table.heterozygous_loci(), vec![4]);
        assert_eq!(table.homozygous_value(4), None);
    }

    #[test]
    fn test_inconclusive() {
        let fragments = repeated_fragments(2, b'G', 2);
        let table = EvidenceTable::nucleotides(3, &fragments);
        assert!(table.values_at_or_above_threshold(2).is_empty());
        assert!(table.values_at_or_above_threshold(100).is_empty());
        assert_eq!(table.depth(100), 0);
        assert!(table.homozygous_loci().is_empty());
    }

    #[test]
    fn test_amino_acid_table() {
        let mut fragments: Vec<Fragment> = (0..4)
            .map(|i| Fragment::new(format!("r{i}"), ["HLA-A".to_string()], vec![3, 4, 5], b"ATG".to_vec(), vec![30; 3]))
            .collect();
        for f in fragments.iter_mut() {
            f.build_amino_acids();
        }

        let table = EvidenceTable::amino_acids(2, &fragments);
        assert_eq!(table.level(), EvidenceLevel::AminoAcid);
        assert_eq!(table.loci().collect::<Vec<usize>>(), vec![1]);
        assert_eq!(table.homozygous_value(1), Some(b'M'));
        assert_eq!(table.min_count(), 2);
    }
}
