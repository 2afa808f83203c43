
use serde::{Deserialize, Serialize};
use simple_error::bail;
use std::collections::BTreeSet;

use crate::data_types::errors::FragmentError;
use crate::util::sequence::translate_codon;

/// Classification tag for a fragment, tracks why a fragment was kept or excluded
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, strum_macros::Display, strum_macros::EnumIter)]
pub enum FragmentScope {
    /// Nothing has classified this fragment yet
    #[default]
    #[strum(to_string = "UNSET")]
    Unset,
    /// All observations were removed by quality or evidence filtering
    #[strum(to_string = "BASE_QUAL_FILTERED")]
    BaseQualFiltered,
    /// No amino acids survived amino acid evidence filtering
    #[strum(to_string = "NO_AMINO_ACIDS")]
    NoAminoAcids,
    /// Mate of an indel read that could not be anchored
    #[strum(to_string = "UNMATCHED_INDEL")]
    UnmatchedIndel,
    /// Compared against candidates but nothing matched
    #[strum(to_string = "UNMATCHED_AMINO_ACID")]
    UnmatchedAminoAcid,
    /// No informative loci were covered
    #[strum(to_string = "NO_HET_LOCI")]
    NoHetLoci,
    /// Only wildcard matches were found
    #[strum(to_string = "WILD_ONLY")]
    WildOnly,
    /// Has at least one full or partial allele match
    #[strum(to_string = "CANDIDATE")]
    Candidate
}

/// Serialized form of a fragment as handed over by the read extraction step
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FragmentRecord {
    /// Read or read-pair name
    pub id: String,
    /// Genes the read was extracted for
    pub genes: BTreeSet<String>,
    /// Nucleotide loci in the spliced coding coordinate space
    pub loci: Vec<usize>,
    /// Bases, one character per locus
    pub bases: String,
    /// Base qualities, one per locus
    pub qualities: Vec<u8>
}

impl From<FragmentRecord> for Fragment {
    fn from(record: FragmentRecord) -> Self {
        Fragment::new(
            record.id,
            record.genes,
            record.loci,
            record.bases.into_bytes(),
            record.qualities
        )
    }
}

impl From<&Fragment> for FragmentRecord {
    /// Captures the working observations, raw ones are not exported
    fn from(fragment: &Fragment) -> Self {
        FragmentRecord {
            id: fragment.id.clone(),
            genes: fragment.genes.clone(),
            loci: fragment.loci.clone(),
            bases: String::from_utf8_lossy(&fragment.bases).into_owned(),
            qualities: fragment.qualities.clone()
        }
    }
}

/// Evidence from a single read or merged read-pair.
/// The raw observations are preserved, all filtering happens on the working copy.
#[derive(Clone, Debug, PartialEq)]
pub struct Fragment {
    /// Read or read-pair name
    id: String,
    /// Candidate genes for this fragment
    genes: BTreeSet<String>,
    /// Raw nucleotide loci
    raw_loci: Vec<usize>,
    /// Raw bases
    raw_bases: Vec<u8>,
    /// Raw base qualities
    raw_qualities: Vec<u8>,
    /// Working nucleotide loci
    loci: Vec<usize>,
    /// Working bases
    bases: Vec<u8>,
    /// Working base qualities
    qualities: Vec<u8>,
    /// Amino acid loci, derived from codon-complete nucleotides
    amino_acid_loci: Vec<usize>,
    /// Amino acids, parallel to `amino_acid_loci`
    amino_acids: Vec<u8>,
    /// Set once the quality filter has been applied
    quality_filtered: bool,
    /// Number of times amino acids have been built
    amino_acid_builds: usize,
    /// Current classification
    scope: FragmentScope
}

impl Fragment {
    /// Creates a new fragment, no checks are performed here; see `validate()`.
    /// # Arguments
    /// * `id` - the read or read-pair name
    /// * `genes` - the candidate genes
    /// * `loci` - nucleotide loci, expected to be strictly increasing
    /// * `bases` - one base per locus
    /// * `qualities` - one quality per locus
    pub fn new(id: String, genes: impl IntoIterator<Item = String>, loci: Vec<usize>, bases: Vec<u8>, qualities: Vec<u8>) -> Fragment {
        Fragment {
            id,
            genes: genes.into_iter().collect(),
            raw_loci: loci.clone(),
            raw_bases: bases.clone(),
            raw_qualities: qualities.clone(),
            loci,
            bases,
            qualities,
            amino_acid_loci: vec![],
            amino_acids: vec![],
            quality_filtered: false,
            amino_acid_builds: 0,
            scope: FragmentScope::Unset
        }
    }

    /// Builds a copy of this fragment with a replacement set of working nucleotides.
    /// Raw observations, genes, and scope carry over; amino acids must be built again.
    pub fn with_nucleotides(&self, loci: Vec<usize>, bases: Vec<u8>, qualities: Vec<u8>) -> Fragment {
        Fragment {
            id: self.id.clone(),
            genes: self.genes.clone(),
            raw_loci: self.raw_loci.clone(),
            raw_bases: self.raw_bases.clone(),
            raw_qualities: self.raw_qualities.clone(),
            loci,
            bases,
            qualities,
            amino_acid_loci: vec![],
            amino_acids: vec![],
            quality_filtered: self.quality_filtered,
            amino_acid_builds: 0,
            scope: self.scope
        }
    }

    // getters
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn genes(&self) -> &BTreeSet<String> {
        &self.genes
    }

    pub fn nucleotide_loci(&self) -> &[usize] {
        &self.loci
    }

    pub fn nucleotides(&self) -> &[u8] {
        &self.bases
    }

    pub fn qualities(&self) -> &[u8] {
        &self.qualities
    }

    pub fn raw_nucleotide_loci(&self) -> &[usize] {
        &self.raw_loci
    }

    pub fn raw_nucleotides(&self) -> &[u8] {
        &self.raw_bases
    }

    pub fn amino_acid_loci(&self) -> &[usize] {
        &self.amino_acid_loci
    }

    pub fn amino_acids(&self) -> &[u8] {
        &self.amino_acids
    }

    pub fn is_quality_filtered(&self) -> bool {
        self.quality_filtered
    }

    pub fn amino_acids_built(&self) -> bool {
        self.amino_acid_builds > 0
    }

    pub fn scope(&self) -> FragmentScope {
        self.scope
    }

    pub fn contains_gene(&self, gene: &str) -> bool {
        self.genes.contains(gene)
    }

    /// Adds a gene to the candidate set, returns false if it was already present
    pub fn add_gene(&mut self, gene: String) -> bool {
        self.genes.insert(gene)
    }

    /// Returns true if there are no working nucleotides left
    pub fn is_empty(&self) -> bool {
        self.loci.is_empty()
    }

    /// The largest raw nucleotide locus, which is what the read actually spans
    pub fn max_locus(&self) -> Option<usize> {
        self.raw_loci.last().copied()
    }

    pub fn contains_nucleotide(&self, locus: usize) -> bool {
        self.loci.binary_search(&locus).is_ok()
    }

    /// Returns the working base at a locus, if present
    pub fn nucleotide(&self, locus: usize) -> Option<u8> {
        self.loci.binary_search(&locus).ok()
            .map(|i| self.bases[i])
    }

    /// Returns the working base quality at a locus, if present
    pub fn nucleotide_quality(&self, locus: usize) -> Option<u8> {
        self.loci.binary_search(&locus).ok()
            .map(|i| self.qualities[i])
    }

    pub fn contains_amino_acid(&self, locus: usize) -> bool {
        self.amino_acid_loci.binary_search(&locus).is_ok()
    }

    /// Returns the amino acid at an amino acid locus, if present
    pub fn amino_acid(&self, locus: usize) -> Option<u8> {
        self.amino_acid_loci.binary_search(&locus).ok()
            .map(|i| self.amino_acids[i])
    }

    /// Iterates over the working (locus, base, quality) observations
    pub fn nucleotide_iter(&self) -> impl Iterator<Item = (usize, u8, u8)> + '_ {
        self.loci.iter().zip(self.bases.iter()).zip(self.qualities.iter())
            .map(|((&l, &b), &q)| (l, b, q))
    }

    /// Iterates over the (locus, amino acid) observations
    pub fn amino_acid_iter(&self) -> impl Iterator<Item = (usize, u8)> + '_ {
        self.amino_acid_loci.iter().copied()
            .zip(self.amino_acids.iter().copied())
    }

    /// Drops all working observations below the minimum base quality.
    /// Repeat calls have no effect.
    /// # Arguments
    /// * `min_quality` - the minimum base quality to keep
    pub fn quality_filter(&mut self, min_quality: u8) {
        if self.quality_filtered {
            return;
        }

        let mut loci = Vec::with_capacity(self.loci.len());
        let mut bases = Vec::with_capacity(self.loci.len());
        let mut qualities = Vec::with_capacity(self.loci.len());
        for (l, b, q) in self.nucleotide_iter().filter(|&(_l, _b, q)| q >= min_quality) {
            loci.push(l);
            bases.push(b);
            qualities.push(q);
        }
        self.loci = loci;
        self.bases = bases;
        self.qualities = qualities;
        self.quality_filtered = true;
    }

    /// Derives amino acids from every codon-aligned locus that has all three of its bases present.
    /// This is expected to run exactly once per fragment, extra builds are reported by `validate()`.
    pub fn build_amino_acids(&mut self) {
        self.amino_acid_builds += 1;
        self.amino_acid_loci.clear();
        self.amino_acids.clear();

        let n = self.loci.len();
        let mut i = 0;
        while i + 2 < n {
            let locus = self.loci[i];
            if locus % 3 == 0 && self.loci[i + 1] == locus + 1 && self.loci[i + 2] == locus + 2 {
                self.amino_acid_loci.push(locus / 3);
                self.amino_acids.push(translate_codon(&self.bases[i..i + 3]));
                i += 3;
            } else {
                i += 1;
            }
        }
    }

    /// Keeps only the amino acids accepted by the provided predicate
    /// # Arguments
    /// * `keep` - called with (amino acid locus, amino acid); return true to keep
    pub fn filter_amino_acids<F>(&mut self, mut keep: F) where F: FnMut(usize, u8) -> bool {
        let (loci, amino_acids): (Vec<usize>, Vec<u8>) = self.amino_acid_iter()
            .filter(|&(l, aa)| keep(l, aa))
            .unzip();
        self.amino_acid_loci = loci;
        self.amino_acids = amino_acids;
    }

    /// Inserts a single working observation at its sorted position.
    /// Returns false if the locus was already present, in which case nothing changes.
    /// # Arguments
    /// * `locus` - the nucleotide locus to add
    /// * `base` - the base to add
    /// * `quality` - the quality assigned to the added base
    pub fn enrich(&mut self, locus: usize, base: u8, quality: u8) -> bool {
        match self.loci.binary_search(&locus) {
            Ok(_) => false,
            Err(index) => {
                self.loci.insert(index, locus);
                self.bases.insert(index, base);
                self.qualities.insert(index, quality);
                true
            }
        }
    }

    /// Merges the other half of a read-pair into this fragment.
    /// When both halves cover a locus, the higher quality observation is kept.
    /// # Arguments
    /// * `other` - the mate fragment, must have the same ID
    /// # Errors
    /// * if the fragment IDs differ
    /// * if either fragment already has amino acids built
    pub fn merge(&mut self, other: &Fragment) -> Result<(), Box<dyn std::error::Error>> {
        if self.id != other.id {
            bail!("Cannot merge fragment {} with fragment {}", self.id, other.id);
        }
        if self.amino_acids_built() || other.amino_acids_built() {
            bail!("Cannot merge fragment {} after amino acids are built", self.id);
        }

        self.genes.extend(other.genes.iter().cloned());
        let (raw_loci, raw_bases, raw_qualities) = merge_observations(
            (&self.raw_loci, &self.raw_bases, &self.raw_qualities),
            (&other.raw_loci, &other.raw_bases, &other.raw_qualities)
        );
        let (loci, bases, qualities) = merge_observations(
            (&self.loci, &self.bases, &self.qualities),
            (&other.loci, &other.bases, &other.qualities)
        );
        self.raw_loci = raw_loci;
        self.raw_bases = raw_bases;
        self.raw_qualities = raw_qualities;
        self.loci = loci;
        self.bases = bases;
        self.qualities = qualities;
        Ok(())
    }

    /// Attempts to change the scope of this fragment.
    /// An unset scope accepts anything, otherwise a change requires `force`.
    /// Returns true if the fragment ends up with the requested scope.
    /// # Arguments
    /// * `scope` - the requested scope
    /// * `force` - if true, overrides any existing scope
    pub fn set_scope(&mut self, scope: FragmentScope, force: bool) -> bool {
        if self.scope == scope {
            true
        } else if self.scope == FragmentScope::Unset || force {
            self.scope = scope;
            true
        } else {
            false
        }
    }

    /// Checks the fragment for internal consistency
    /// # Arguments
    /// * `max_genes` - the maximum number of candidate genes allowed
    /// # Errors
    /// * if the gene set is empty or too large
    /// * if the raw or working arrays differ in length or are not strictly increasing by locus
    /// * if amino acids were built more than once, or built and found empty
    pub fn validate(&self, max_genes: usize) -> Result<(), FragmentError> {
        if self.genes.is_empty() {
            return Err(FragmentError::NoGenes);
        }
        if self.genes.len() > max_genes {
            return Err(FragmentError::TooManyGenes { count: self.genes.len(), max: max_genes });
        }

        for (loci, bases, qualities) in [
            (&self.raw_loci, &self.raw_bases, &self.raw_qualities),
            (&self.loci, &self.bases, &self.qualities)
        ] {
            if loci.len() != bases.len() || loci.len() != qualities.len() {
                return Err(FragmentError::LengthMismatch { loci: loci.len(), bases: bases.len(), qualities: qualities.len() });
            }
            if let Some(index) = loci.windows(2).position(|w| w[0] >= w[1]) {
                return Err(FragmentError::UnsortedLoci { index: index + 1 });
            }
        }

        if self.amino_acid_builds > 1 {
            return Err(FragmentError::RepeatedAminoAcidBuild { count: self.amino_acid_builds });
        }
        if self.amino_acid_builds == 1 && self.amino_acids.is_empty() {
            return Err(FragmentError::EmptyAminoAcids);
        }
        Ok(())
    }
}

/// Merges two sorted observation sets, preferring the higher quality entry on shared loci
fn merge_observations(first: (&[usize], &[u8], &[u8]), second: (&[usize], &[u8], &[u8])) -> (Vec<usize>, Vec<u8>, Vec<u8>) {
    let capacity = first.0.len() + second.0.len();
    let mut loci = Vec::with_capacity(capacity);
    let mut bases = Vec::with_capacity(capacity);
    let mut qualities = Vec::with_capacity(capacity);

    let (mut i, mut j) = (0, 0);
    while i < first.0.len() || j < second.0.len() {
        let take_first = if i >= first.0.len() {
            false
        } else if j >= second.0.len() {
            true
        } else {
            match first.0[i].cmp(&second.0[j]) {
                std::cmp::Ordering::Less => true,
                std::cmp::Ordering::Greater => false,
                std::cmp::Ordering::Equal => {
                    // shared locus, keep the better of the two and skip the other
                    let keep_first = first.2[i] >= second.2[j];
                    if keep_first { j += 1; } else { i += 1; }
                    keep_first
                }
            }
        };

        if take_first {
            loci.push(first.0[i]);
            bases.push(first.1[i]);
            qualities.push(first.2[i]);
            i += 1;
        } else {
            loci.push(second.0[j]);
            bases.push(second.1[j]);
            qualities.push(second.2[j]);
            j += 1;
        }
    }
    (loci, bases, qualities)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_fragment(loci: Vec<usize>, bases: &[u8], qualities: Vec<u8>) -> Fragment {
        Fragment::new("read_1".to_string(), ["HLA-A".to_string()], loci, bases.to_vec(), qualities)
    }

    #[test]
    fn test_accessors() {
        let fragment = test_fragment(vec![3, 4, 7], b"ACG", vec![30, 31, 32]);
        assert!(fragment.contains_gene("HLA-A"));
        assert!(!fragment.contains_gene("HLA-B"));
        assert!(fragment.contains_nucleotide(4));
        assert!(!fragment.contains_nucleotide(5));
        assert_eq!(fragment.nucleotide(7), Some(b'G'));
        assert_eq!(fragment.nucleotide(8), None);
        assert_eq!(fragment.nucleotide_quality(3), Some(30));
        assert_eq!(fragment.max_locus(), Some(7));
    }

    #[test]
    fn test_quality_filter_idempotent() {
        let mut fragment = test_fragment(vec![0, 1, 2, 3], b"ACGT", vec![35, 10, 35, 20]);
        fragment.quality_filter(30);
        assert_eq!(fragment.nucleotide_loci(), &[0, 2]);
        assert_eq!(fragment.nucleotides(), b"AG");
        assert!(fragment.is_quality_filtered());

        let once = fragment.clone();
        fragment.quality_filter(30);
        assert_eq!(fragment, once);

        // a different threshold also has no effect after the first pass
        fragment.quality_filter(36);
        assert_eq!(fragment, once);

        // raw copy is untouched
        assert_eq!(fragment.raw_nucleotide_loci(), &[0, 1, 2, 3]);
    }

    #[test]
    fn test_build_amino_acids() {
        // codon 0 complete (ATG), codon 1 missing locus 4, codon 2 complete (TGG)
        let mut fragment = test_fragment(
            vec![0, 1, 2, 3, 5, 6, 7, 8],
            b"ATGGTTGG",
            vec![30; 8]
        );
        fragment.build_amino_acids();
        assert_eq!(fragment.amino_acid_loci(), &[0, 2]);
        assert_eq!(fragment.amino_acids(), b"MW");
        assert!(fragment.contains_amino_acid(2));
        assert!(!fragment.contains_amino_acid(1));
        assert_eq!(fragment.amino_acid(0), Some(b'M'));
        assert!(fragment.validate(3).is_ok());
    }

    #[test]
    fn test_build_amino_acids_unaligned() {
        // starts mid-codon, only codon 1 (loci 3-5) is complete
        let mut fragment = test_fragment(vec![1, 2, 3, 4, 5, 6], b"TGGCTA", vec![30; 6]);
        fragment.build_amino_acids();
        assert_eq!(fragment.amino_acid_loci(), &[1]);
        assert_eq!(fragment.amino_acids(), b"A");
    }

    #[test]
    fn test_repeat_build_invalid() {
        let mut fragment = test_fragment(vec![0, 1, 2], b"ATG", vec![30; 3]);
        fragment.build_amino_acids();
        fragment.build_amino_acids();
        assert_eq!(fragment.validate(3), Err(FragmentError::RepeatedAminoAcidBuild { count: 2 }));
    }

    #[test]
    fn test_empty_amino_acids_invalid() {
        let mut fragment = test_fragment(vec![0, 1], b"AT", vec![30; 2]);
        fragment.build_amino_acids();
        assert_eq!(fragment.validate(3), Err(FragmentError::EmptyAminoAcids));
    }

    #[test]
    fn test_validate() {
        let fragment = test_fragment(vec![0, 1, 2], b"ATG", vec![30; 3]);
        assert!(fragment.validate(3).is_ok());

        let no_genes = Fragment::new("r".to_string(), Vec::<String>::new(), vec![0], b"A".to_vec(), vec![30]);
        assert_eq!(no_genes.validate(3), Err(FragmentError::NoGenes));

        let genes = ["HLA-A", "HLA-B", "HLA-C", "HLA-H"].iter().map(|g| g.to_string());
        let too_many = Fragment::new("r".to_string(), genes, vec![0], b"A".to_vec(), vec![30]);
        assert_eq!(too_many.validate(3), Err(FragmentError::TooManyGenes { count: 4, max: 3 }));

        let mismatch = test_fragment(vec![0, 1], b"A", vec![30, 30]);
        assert_eq!(mismatch.validate(3), Err(FragmentError::LengthMismatch { loci: 2, bases: 1, qualities: 2 }));

        let unsorted = test_fragment(vec![0, 2, 2], b"AAA", vec![30; 3]);
        assert_eq!(unsorted.validate(3), Err(FragmentError::UnsortedLoci { index: 2 }));
    }

    #[test]
    fn test_enrich() {
        let mut fragment = test_fragment(vec![0, 2, 5], b"AGT", vec![30; 3]);
        assert!(fragment.enrich(1, b'C', 37));
        assert_eq!(fragment.nucleotide_loci(), &[0, 1, 2, 5]);
        assert_eq!(fragment.nucleotides(), b"ACGT");
        assert_eq!(fragment.qualities(), &[30, 37, 30, 30]);

        // existing locus is left alone
        assert!(!fragment.enrich(2, b'T', 40));
        assert_eq!(fragment.nucleotide(2), Some(b'G'));
        assert!(fragment.validate(3).is_ok());
    }

    #[test]
    fn test_merge() {
        let mut first = test_fragment(vec![0, 1, 2], b"ACG", vec![30, 20, 30]);
        let second = Fragment::new("read_1".to_string(), ["HLA-B".to_string()], vec![1, 2, 3], b"TTA".to_vec(), vec![35, 10, 30]);
        first.merge(&second).unwrap();
        assert_eq!(first.nucleotide_loci(), &[0, 1, 2, 3]);
        assert_eq!(first.nucleotides(), b"ATGA");
        assert_eq!(first.qualities(), &[30, 35, 30, 30]);
        assert!(first.contains_gene("HLA-B"));
        assert!(first.validate(3).is_ok());

        let other = Fragment::new("read_2".to_string(), ["HLA-A".to_string()], vec![0], b"A".to_vec(), vec![30]);
        assert!(first.merge(&other).is_err());
    }

    #[test]
    fn test_scope_transitions() {
        let mut fragment = test_fragment(vec![0], b"A", vec![30]);
        assert_eq!(fragment.scope(), FragmentScope::Unset);
        assert!(fragment.set_scope(FragmentScope::Candidate, false));
        // same scope is fine
        assert!(fragment.set_scope(FragmentScope::Candidate, false));
        // a change needs force
        assert!(!fragment.set_scope(FragmentScope::WildOnly, false));
        assert_eq!(fragment.scope(), FragmentScope::Candidate);
        assert!(fragment.set_scope(FragmentScope::WildOnly, true));
        assert_eq!(fragment.scope(), FragmentScope::WildOnly);
        assert_eq!(fragment.scope().to_string(), "WILD_ONLY");
    }

    #[test]
    fn test_from_record() {
        let record: FragmentRecord = serde_json::from_str(
            r#"{"id": "r1", "genes": ["HLA-C"], "loci": [9, 10, 11], "bases": "GCT", "qualities": [30, 30, 30]}"#
        ).unwrap();
        let fragment = Fragment::from(record);
        assert_eq!(fragment.id(), "r1");
        assert_eq!(fragment.nucleotides(), b"GCT");
        assert!(fragment.contains_gene("HLA-C"));

        // exports reflect filtering
        let mut fragment = fragment;
        fragment.quality_filter(35);
        let exported = FragmentRecord::from(&fragment);
        assert!(exported.loci.is_empty());
        assert!(exported.bases.is_empty());
    }
}
