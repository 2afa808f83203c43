
use log::{debug, trace};
use rayon::prelude::*;
use std::collections::BTreeSet;

use crate::data_types::fragment::{Fragment, FragmentScope};
use crate::data_types::fragment_alleles::FragmentAlleles;
use crate::data_types::reference_data::{GeneReference, ReferenceData};
use crate::data_types::reference_sequence::{ReferenceAlleleSequence, SequenceMatchType};
use crate::hla::alleles::HlaAllele;
use crate::hla::evidence_cache::EvidenceTableCache;

/// Protein-level allele sets for a single comparison level
#[derive(Clone, Debug, Default, PartialEq)]
struct MatchSets {
    full: BTreeSet<HlaAllele>,
    partial: BTreeSet<HlaAllele>,
    wild: BTreeSet<HlaAllele>
}

impl MatchSets {
    /// Makes the three sets disjoint; a stronger match always wins
    fn collapse(&mut self) {
        self.partial.retain(|a| !self.full.contains(a));
        let full = &self.full;
        let partial = &self.partial;
        self.wild.retain(|a| !full.contains(a) && !partial.contains(a));
    }

    fn is_empty(&self) -> bool {
        self.full.is_empty() && self.partial.is_empty() && self.wild.is_empty()
    }
}

/// Scores trusted fragments against every candidate reference allele
pub struct AlleleMatcher<'a> {
    /// Source of the candidate sequences
    reference: &'a ReferenceData,
    /// Nucleotide loci that are compared
    heterozygous_loci: BTreeSet<usize>,
    /// Amino acid loci that are compared, None compares every locus the fragment has
    phasing_loci: Option<BTreeSet<usize>>
}

impl<'a> AlleleMatcher<'a> {
    /// Basic constructor
    /// # Arguments
    /// * `reference` - the candidate alleles
    /// * `heterozygous_loci` - nucleotide loci to compare
    /// * `phasing_loci` - amino acid loci to compare, None means no restriction
    pub fn new(reference: &'a ReferenceData, heterozygous_loci: BTreeSet<usize>, phasing_loci: Option<BTreeSet<usize>>) -> AlleleMatcher<'a> {
        AlleleMatcher {
            reference,
            heterozygous_loci,
            phasing_loci
        }
    }

    /// Derives the compared loci from the cached evidence tables.
    /// Nucleotide loci are the heterozygous loci of each gene, restricted to the reference candidates when provided.
    /// Amino acid loci are the heterozygous loci of each gene.
    /// # Arguments
    /// * `reference` - the candidate alleles
    /// * `cache` - the aggregated per-gene evidence tables
    pub fn from_evidence(reference: &'a ReferenceData, cache: &EvidenceTableCache) -> AlleleMatcher<'a> {
        let mut heterozygous_loci: BTreeSet<usize> = Default::default();
        let mut phasing_loci: BTreeSet<usize> = Default::default();
        for (gene, tables) in cache.iter() {
            let candidate_loci = reference.gene(gene)
                .map(|g| g.heterozygous_loci())
                .filter(|c| !c.is_empty());
            let gene_loci = tables.nucleotide.heterozygous_loci();
            let gene_loci: Vec<usize> = match candidate_loci {
                Some(c) => gene_loci.into_iter().filter(|l| c.contains(l)).collect(),
                None => gene_loci
            };
            debug!("{gene}: {} heterozygous nucleotide loci, {} heterozygous amino acid loci",
                gene_loci.len(), tables.amino_acid.heterozygous_loci().len());
            heterozygous_loci.extend(gene_loci);
            phasing_loci.extend(tables.amino_acid.heterozygous_loci());
        }
        Self::new(reference, heterozygous_loci, Some(phasing_loci))
    }

    pub fn heterozygous_loci(&self) -> &BTreeSet<usize> {
        &self.heterozygous_loci
    }

    pub fn phasing_loci(&self) -> Option<&BTreeSet<usize>> {
        self.phasing_loci.as_ref()
    }

    /// Matches every fragment, tags it with a scope, and returns only the informative results.
    /// Output order follows the fragment order.
    /// # Arguments
    /// * `fragments` - trusted fragments with amino acids built; their scope is updated
    pub fn match_fragments(&self, fragments: &mut [Fragment]) -> Vec<FragmentAlleles> {
        let results: Vec<Option<FragmentAlleles>> = fragments.par_iter_mut()
            .map(|fragment| {
                let (alleles, scope) = self.match_fragment(fragment);
                fragment.set_scope(scope, false);
                if alleles.is_uninformative() {
                    trace!("Fragment {} is uninformative: {scope}", fragment.id());
                    None
                } else {
                    Some(alleles)
                }
            })
            .collect();
        results.into_iter().flatten().collect()
    }

    /// Scores one fragment against every candidate of the genes it belongs to.
    /// Returns the reconciled alleles and the scope the fragment should receive.
    /// # Arguments
    /// * `fragment` - a trusted fragment with amino acids built
    pub fn match_fragment(&self, fragment: &Fragment) -> (FragmentAlleles, FragmentScope) {
        let (nucleotide_loci, nucleotides): (Vec<usize>, Vec<u8>) = fragment.nucleotide_iter()
            .filter(|(l, _b, _q)| self.heterozygous_loci.contains(l))
            .map(|(l, b, _q)| (l, b))
            .unzip();
        let (amino_acid_loci, amino_acids): (Vec<usize>, Vec<u8>) = fragment.amino_acid_iter()
            .filter(|(l, _aa)| self.phasing_loci.as_ref().map(|p| p.contains(l)).unwrap_or(true))
            .unzip();

        let genes: Vec<&GeneReference> = fragment.genes().iter()
            .filter_map(|g| self.reference.gene(g))
            .collect();
        let amino_acid_sets = classify(
            genes.iter().flat_map(|g| g.amino_acid_sequences().iter()),
            &amino_acid_loci, &amino_acids
        );
        let nucleotide_sets = classify(
            genes.iter().flat_map(|g| g.nucleotide_sequences().iter()),
            &nucleotide_loci, &nucleotides
        );

        let reconciled = if nucleotide_loci.is_empty() {
            amino_acid_sets
        } else {
            reconcile(amino_acid_sets, &nucleotide_sets)
        };

        let scope = if amino_acid_loci.is_empty() {
            FragmentScope::NoHetLoci
        } else if reconciled.is_empty() {
            FragmentScope::UnmatchedAminoAcid
        } else if reconciled.full.is_empty() && reconciled.partial.is_empty() {
            FragmentScope::WildOnly
        } else {
            FragmentScope::Candidate
        };

        let alleles = FragmentAlleles::new(fragment.id().to_string(), reconciled.full, reconciled.partial, reconciled.wild);
        (alleles, scope)
    }
}

/// Classifies the observed values against a set of candidate sequences and collapses the result to protein level
fn classify<'b>(sequences: impl Iterator<Item = &'b ReferenceAlleleSequence>, loci: &[usize], values: &[u8]) -> MatchSets {
    let mut sets = MatchSets::default();
    if loci.is_empty() {
        return sets;
    }

    for sequence in sequences {
        let allele = sequence.allele().as_four_digit();
        match sequence.match_type(loci, values) {
            SequenceMatchType::Full => sets.full.insert(allele),
            SequenceMatchType::Partial => sets.partial.insert(allele),
            SequenceMatchType::Wild => sets.wild.insert(allele),
            SequenceMatchType::None => false
        };
    }
    sets.collapse();
    sets
}

/// Combines amino acid and nucleotide matches.
/// An amino acid Full stays Full only with nucleotide Full support, and drops to Partial with nucleotide Partial support.
/// An amino acid Partial needs nucleotide Partial support; nucleotide Full does not upgrade it.
/// Wild matches pass through.
fn reconcile(amino_acid: MatchSets, nucleotide: &MatchSets) -> MatchSets {
    let mut reconciled = MatchSets {
        wild: amino_acid.wild,
        ..Default::default()
    };
    for allele in amino_acid.full.into_iter() {
        if nucleotide.full.contains(&allele) {
            reconciled.full.insert(allele);
        } else if nucleotide.partial.contains(&allele) {
            reconciled.partial.insert(allele);
        }
    }
    for allele in amino_acid.partial.into_iter() {
        if nucleotide.partial.contains(&allele) {
            reconciled.partial.insert(allele);
        }
    }
    reconciled
}
