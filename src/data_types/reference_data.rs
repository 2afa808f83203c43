
use serde::{Deserialize, Serialize};
use simple_error::bail;
use std::collections::btree_map::Entry::{Occupied, Vacant};
use std::collections::{BTreeMap, BTreeSet};

use crate::data_types::reference_sequence::ReferenceAlleleSequence;

/// Everything we know about the candidate alleles for a single gene
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GeneReference {
    /// Length of the spliced coding sequence in nucleotides
    coding_length: usize,
    /// Amino acid loci that sit on an exon boundary
    #[serde(default)]
    splice_boundaries: BTreeSet<usize>,
    /// Nucleotide loci where the candidates are known to differ
    #[serde(default)]
    heterozygous_loci: BTreeSet<usize>,
    /// Candidate nucleotide sequences
    nucleotide_sequences: Vec<ReferenceAlleleSequence>,
    /// Candidate amino acid sequences
    amino_acid_sequences: Vec<ReferenceAlleleSequence>
}

impl GeneReference {
    pub fn new(
        coding_length: usize, splice_boundaries: BTreeSet<usize>, heterozygous_loci: BTreeSet<usize>,
        nucleotide_sequences: Vec<ReferenceAlleleSequence>, amino_acid_sequences: Vec<ReferenceAlleleSequence>
    ) -> GeneReference {
        GeneReference {
            coding_length,
            splice_boundaries,
            heterozygous_loci,
            nucleotide_sequences,
            amino_acid_sequences
        }
    }

    // getters
    pub fn coding_length(&self) -> usize {
        self.coding_length
    }

    pub fn splice_boundaries(&self) -> &BTreeSet<usize> {
        &self.splice_boundaries
    }

    pub fn heterozygous_loci(&self) -> &BTreeSet<usize> {
        &self.heterozygous_loci
    }

    pub fn nucleotide_sequences(&self) -> &[ReferenceAlleleSequence] {
        &self.nucleotide_sequences
    }

    pub fn amino_acid_sequences(&self) -> &[ReferenceAlleleSequence] {
        &self.amino_acid_sequences
    }
}

/// Immutable reference context for a genotyping run, keyed by gene name (e.g. "HLA-A").
/// This gets built once and handed to every component that needs candidate sequences.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ReferenceData {
    /// The per-gene reference
    genes: BTreeMap<String, GeneReference>
}

impl ReferenceData {
    pub fn new() -> ReferenceData {
        Default::default()
    }

    /// Adds a gene to the reference
    /// # Arguments
    /// * `gene_name` - the gene, e.g. "HLA-A"
    /// * `reference` - the candidates and loci for that gene
    /// # Errors
    /// * if the gene was already added
    pub fn add_gene(&mut self, gene_name: String, reference: GeneReference) -> Result<(), Box<dyn std::error::Error>> {
        match self.genes.entry(gene_name) {
            Occupied(entry) => bail!("Entry for {} is already occupied.", entry.key()),
            Vacant(entry) => {
                entry.insert(reference);
                Ok(())
            }
        }
    }

    /// Should be called after loading to verify that everything required to run the algorithms is present.
    /// # Errors
    /// * if no genes are defined
    /// * if a gene has no amino acid candidates
    /// * if a candidate belongs to a different gene, is empty, or is longer than the coding sequence
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.genes.is_empty() {
            bail!("Reference data does not contain any genes.");
        }

        for (gene_name, gene_ref) in self.genes.iter() {
            if gene_ref.amino_acid_sequences.is_empty() {
                bail!("No amino acid candidates found for \"{gene_name}\".");
            }

            let max_amino_acids = gene_ref.coding_length / 3;
            for (sequences, max_len) in [
                (&gene_ref.nucleotide_sequences, gene_ref.coding_length),
                (&gene_ref.amino_acid_sequences, max_amino_acids)
            ] {
                for seq in sequences.iter() {
                    let allele = seq.allele();
                    if allele.gene_name() != *gene_name {
                        bail!("Candidate {allele} is listed under \"{gene_name}\".");
                    }
                    if seq.is_empty() || seq.sequence().iter().any(|v| v.is_empty()) {
                        bail!("Candidate {allele} has empty sequence values.");
                    }
                    if seq.len() > max_len {
                        bail!("Candidate {allele} has {} loci, but \"{gene_name}\" only allows {max_len}.", seq.len());
                    }
                }
            }

            if let Some(&boundary) = gene_ref.splice_boundaries.iter().next_back() {
                if boundary >= max_amino_acids {
                    bail!("Splice boundary {boundary} is outside the coding sequence of \"{gene_name}\".");
                }
            }
        }
        Ok(())
    }

    // getters
    pub fn genes(&self) -> &BTreeMap<String, GeneReference> {
        &self.genes
    }

    pub fn gene(&self, gene_name: &str) -> Option<&GeneReference> {
        self.genes.get(gene_name)
    }

    pub fn gene_names(&self) -> impl Iterator<Item = &String> {
        self.genes.keys()
    }

    pub fn coding_length(&self, gene_name: &str) -> Option<usize> {
        self.genes.get(gene_name).map(|g| g.coding_length)
    }

    /// All candidate nucleotide sequences across every gene
    pub fn nucleotide_sequences(&self) -> impl Iterator<Item = &ReferenceAlleleSequence> {
        self.genes.values().flat_map(|g| g.nucleotide_sequences.iter())
    }

    /// All candidate amino acid sequences across every gene
    pub fn amino_acid_sequences(&self) -> impl Iterator<Item = &ReferenceAlleleSequence> {
        self.genes.values().flat_map(|g| g.amino_acid_sequences.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::hla::alleles::HlaAllele;

    fn simple_gene(allele: &str, nucleotides: &str, amino_acids: &str) -> GeneReference {
        let allele = HlaAllele::new(allele).unwrap();
        GeneReference::new(
            nucleotides.len(),
            BTreeSet::from([1]),
            Default::default(),
            vec![ReferenceAlleleSequence::from_residues(allele.clone(), nucleotides)],
            vec![ReferenceAlleleSequence::from_residues(allele, amino_acids)]
        )
    }

    #[test]
    fn test_valid_reference() {
        let mut reference = ReferenceData::new();
        reference.add_gene("HLA-A".to_string(), simple_gene("A*01:01", "ATGGCTTGG", "MAW")).unwrap();
        reference.add_gene("HLA-B".to_string(), simple_gene("B*07:02", "ATGGCTTGC", "MAC")).unwrap();
        assert!(reference.validate().is_ok());
        assert_eq!(reference.coding_length("HLA-B"), Some(9));
        assert_eq!(reference.gene_names().count(), 2);
        assert_eq!(reference.amino_acid_sequences().count(), 2);

        // double insert
        assert!(reference.add_gene("HLA-A".to_string(), simple_gene("A*01:01", "ATG", "M")).is_err());
    }

    #[test]
    fn test_invalid_reference() {
        assert!(ReferenceData::new().validate().is_err());

        // wrong gene
        let mut reference = ReferenceData::new();
        reference.add_gene("HLA-A".to_string(), simple_gene("B*07:02", "ATGGCTTGG", "MAW")).unwrap();
        assert!(reference.validate().is_err());

        // amino acids longer than the coding sequence allows
        let mut reference = ReferenceData::new();
        reference.add_gene("HLA-A".to_string(), simple_gene("A*01:01", "ATGGCTTGG", "MAWW")).unwrap();
        assert!(reference.validate().is_err());
    }

    #[test]
    fn test_load_json() {
        let json = r#"{"genes": {"HLA-C": {
            "coding_length": 6,
            "splice_boundaries": [0],
            "nucleotide_sequences": [{"allele": "C*01:02", "sequence": ["A", "T", "G", "*", "C", "T"]}],
            "amino_acid_sequences": [{"allele": "C*01:02", "sequence": ["M", "*"]}]
        }}}"#;
        let reference: ReferenceData = serde_json::from_str(json).unwrap();
        assert!(reference.validate().is_ok());
        let gene = reference.gene("HLA-C").unwrap();
        assert!(gene.heterozygous_loci().is_empty());
        assert!(gene.nucleotide_sequences()[0].is_wildcard(3));
    }
}
