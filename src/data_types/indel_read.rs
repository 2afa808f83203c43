
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The kind of length-changing event found in a read alignment
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, strum_macros::Display)]
pub enum IndelType {
    #[strum(to_string = "INS")]
    Insertion,
    #[strum(to_string = "DEL")]
    Deletion
}

/// A single insertion or deletion relative to the gene's coding sequence
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct IndelEvent {
    /// Insertion or deletion
    pub indel_type: IndelType,
    /// Nucleotide locus the event was reported at
    pub locus: usize,
    /// Number of bases inserted or deleted
    pub length: usize
}

/// A read that cannot be placed on the fixed per-base grid because of an indel or soft clip.
/// Bases are in coding orientation and include any soft-clipped bases.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct IndelRead {
    /// Shared with the mate, if there is one
    pub fragment_id: String,
    /// Genes the read was extracted for
    pub genes: BTreeSet<String>,
    /// Coding bases of the read, soft clips included
    pub bases: String,
    /// Base qualities, parallel to `bases`
    pub qualities: Vec<u8>,
    /// Nucleotide locus of the first aligned (non-clipped) base
    pub aligned_start: usize,
    /// Soft-clipped bases at the start of the read
    #[serde(default)]
    pub soft_clip_start: usize,
    /// Soft-clipped bases at the end of the read
    #[serde(default)]
    pub soft_clip_end: usize,
    /// Indels reported by the aligner
    #[serde(default)]
    pub indels: Vec<IndelEvent>
}

impl IndelRead {
    pub fn has_insertion(&self) -> bool {
        self.indels.iter().any(|i| i.indel_type == IndelType::Insertion)
    }

    pub fn has_deletion(&self) -> bool {
        self.indels.iter().any(|i| i.indel_type == IndelType::Deletion)
    }

    /// The largest indel, or the largest soft clip if that is bigger
    pub fn max_indel_length(&self) -> usize {
        self.indels.iter()
            .map(|i| i.length)
            .chain([self.soft_clip_start, self.soft_clip_end])
            .max()
            .unwrap_or(0)
    }

    /// Approximate nucleotide locus of the first read base, before correcting for indels
    pub fn read_start(&self) -> isize {
        self.aligned_start as isize - self.soft_clip_start as isize
    }

    /// Mean base quality, used for every base we assign to an anchored read
    pub fn mean_quality(&self) -> u8 {
        if self.qualities.is_empty() {
            0
        } else {
            let total: usize = self.qualities.iter().map(|&q| q as usize).sum();
            (total / self.qualities.len()) as u8
        }
    }

    /// Keys used when tallying reads that could not be anchored; one per event
    pub fn tally_keys(&self) -> Vec<String> {
        let gene_label = self.genes.iter().cloned().collect::<Vec<String>>().join(",");
        if self.indels.is_empty() {
            vec![format!("{gene_label}:{}:SOFTCLIP:{}", self.aligned_start, self.soft_clip_start.max(self.soft_clip_end))]
        } else {
            self.indels.iter()
                .map(|i| format!("{gene_label}:{}:{}:{}", i.locus, i.indel_type, i.length))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_read(indels: Vec<IndelEvent>, clip: usize) -> IndelRead {
        IndelRead {
            fragment_id: "pair_1".to_string(),
            genes: BTreeSet::from(["HLA-A".to_string()]),
            bases: "ATGGCT".to_string(),
            qualities: vec![30, 30, 30, 40, 40, 40],
            aligned_start: 12,
            soft_clip_start: clip,
            soft_clip_end: 0,
            indels
        }
    }

    #[test]
    fn test_indel_summary() {
        let read = test_read(vec![
            IndelEvent { indel_type: IndelType::Deletion, locus: 15, length: 3 },
            IndelEvent { indel_type: IndelType::Insertion, locus: 20, length: 6 }
        ], 2);
        assert!(read.has_insertion());
        assert!(read.has_deletion());
        assert_eq!(read.max_indel_length(), 6);
        assert_eq!(read.read_start(), 10);
        assert_eq!(read.mean_quality(), 35);
        assert_eq!(read.tally_keys(), vec!["HLA-A:15:DEL:3".to_string(), "HLA-A:20:INS:6".to_string()]);
    }

    #[test]
    fn test_soft_clip_only() {
        let read = test_read(vec![], 4);
        assert!(!read.has_insertion());
        assert!(!read.has_deletion());
        assert_eq!(read.max_indel_length(), 4);
        assert_eq!(read.tally_keys(), vec!["HLA-A:12:SOFTCLIP:4".to_string()]);
    }
}
