
use serde::{Deserialize, Serialize};

use crate::hla::alleles::HlaAllele;

/// Reference value that is consistent with any observation
pub const WILDCARD: &str = "*";
/// Reference value for a locus removed by a deletion
pub const DELETION: &str = ".";

/// Strength of agreement between observed values and a reference sequence
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, strum_macros::Display)]
pub enum SequenceMatchType {
    /// Every compared position matched exactly
    Full,
    /// Matched, but at least one position only via a wildcard
    Partial,
    /// Every compared position was a wildcard
    Wild,
    /// At least one mismatch at a non-wildcard position, or nothing to compare
    None
}

/// Ordered per-locus reference values for one candidate allele.
/// A locus value is a single residue, a wildcard, a deletion, or an insertion folded into several characters.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ReferenceAlleleSequence {
    /// The allele this sequence belongs to
    allele: HlaAllele,
    /// One entry per locus
    sequence: Vec<String>
}

impl ReferenceAlleleSequence {
    pub fn new(allele: HlaAllele, sequence: Vec<String>) -> ReferenceAlleleSequence {
        ReferenceAlleleSequence {
            allele,
            sequence
        }
    }

    /// Builds a sequence with one locus per character, mostly useful for simple references
    /// # Arguments
    /// * `allele` - the allele this sequence belongs to
    /// * `sequence` - each character becomes one locus
    pub fn from_residues(allele: HlaAllele, sequence: &str) -> ReferenceAlleleSequence {
        Self::new(allele, sequence.chars().map(String::from).collect())
    }

    // getters
    pub fn allele(&self) -> &HlaAllele {
        &self.allele
    }

    pub fn sequence(&self) -> &[String] {
        &self.sequence
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn value(&self, locus: usize) -> Option<&str> {
        self.sequence.get(locus).map(|s| s.as_str())
    }

    pub fn is_wildcard(&self, locus: usize) -> bool {
        self.value(locus) == Some(WILDCARD)
    }

    pub fn is_deletion(&self, locus: usize) -> bool {
        self.value(locus) == Some(DELETION)
    }

    pub fn is_insertion(&self, locus: usize) -> bool {
        self.value(locus).map(|v| v.len() > 1).unwrap_or(false)
    }

    /// Returns the single-byte value at a locus, if it is a plain residue
    pub fn residue(&self, locus: usize) -> Option<u8> {
        match self.value(locus) {
            Some(v) if v.len() == 1 && v != WILDCARD && v != DELETION => Some(v.as_bytes()[0]),
            _ => None
        }
    }

    /// Classifies how well a set of observations matches this sequence.
    /// # Arguments
    /// * `loci` - the loci being compared
    /// * `values` - the observed values, parallel to `loci`
    /// # Panics
    /// * if `loci` and `values` differ in length
    pub fn match_type(&self, loci: &[usize], values: &[u8]) -> SequenceMatchType {
        assert_eq!(loci.len(), values.len());
        if loci.is_empty() {
            return SequenceMatchType::None;
        }

        let mut wildcards = 0;
        for (&locus, &value) in loci.iter().zip(values.iter()) {
            match self.value(locus) {
                Some(WILDCARD) => wildcards += 1,
                Some(DELETION) => return SequenceMatchType::None,
                Some(reference) => {
                    if reference.len() != 1 || reference.as_bytes()[0] != value {
                        return SequenceMatchType::None;
                    }
                },
                // out of range is a mismatch
                None => return SequenceMatchType::None
            };
        }

        if wildcards == loci.len() {
            SequenceMatchType::Wild
        } else if wildcards > 0 {
            SequenceMatchType::Partial
        } else {
            SequenceMatchType::Full
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_sequence(sequence: &str) -> ReferenceAlleleSequence {
        ReferenceAlleleSequence::from_residues(HlaAllele::new("A*01:01").unwrap(), sequence)
    }

    #[test]
    fn test_match_type() {
        let reference = test_sequence("ACG*T");
        assert_eq!(reference.match_type(&[0, 1, 2], b"ACG"), SequenceMatchType::Full);
        assert_eq!(reference.match_type(&[2, 3, 4], b"GAT"), SequenceMatchType::Partial);
        assert_eq!(reference.match_type(&[3], b"C"), SequenceMatchType::Wild);
        assert_eq!(reference.match_type(&[0, 3], b"TC"), SequenceMatchType::None);
        // out of range and empty
        assert_eq!(reference.match_type(&[5], b"A"), SequenceMatchType::None);
        assert_eq!(reference.match_type(&[], b""), SequenceMatchType::None);
    }

    #[test]
    fn test_indel_values() {
        let allele = HlaAllele::new("B*07:02").unwrap();
        let reference = ReferenceAlleleSequence::new(
            allele,
            vec!["M".to_string(), "RV".to_string(), ".".to_string(), "*".to_string()]
        );
        assert!(reference.is_insertion(1));
        assert!(reference.is_deletion(2));
        assert!(reference.is_wildcard(3));
        assert_eq!(reference.residue(0), Some(b'M'));
        assert_eq!(reference.residue(1), None);
        assert_eq!(reference.residue(2), None);

        // an observation never matches a folded insertion or a deletion
        assert_eq!(reference.match_type(&[1], b"R"), SequenceMatchType::None);
        assert_eq!(reference.match_type(&[2], b"."), SequenceMatchType::None);
    }
}
