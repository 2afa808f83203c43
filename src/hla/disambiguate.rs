
use log::{debug, trace};
use std::collections::{BTreeMap, BTreeSet};

use crate::data_types::fragment::Fragment;
use crate::data_types::reference_data::{GeneReference, ReferenceData};
use crate::data_types::reference_sequence::WILDCARD;

/// Decides whether fragments extracted for one gene should also count towards a paralogous gene.
pub struct GeneDisambiguator {
    /// Coding length for each gene
    coding_lengths: BTreeMap<String, usize>,
    /// For each ordered gene pair (a < b), the lowest locus where they can be told apart, if any
    unique_boundaries: BTreeMap<(String, String), Option<usize>>,
    /// Upper bound on the number of genes per fragment
    max_ploidy: usize
}

impl GeneDisambiguator {
    /// Precomputes the unique boundary for every gene pair in the reference
    /// # Arguments
    /// * `reference` - the reference context
    /// * `max_ploidy` - fragments never gain genes beyond this count
    pub fn new(reference: &ReferenceData, max_ploidy: usize) -> GeneDisambiguator {
        let coding_lengths: BTreeMap<String, usize> = reference.genes().iter()
            .map(|(g, r)| (g.clone(), r.coding_length()))
            .collect();

        let mut unique_boundaries: BTreeMap<(String, String), Option<usize>> = Default::default();
        let genes: Vec<(&String, &GeneReference)> = reference.genes().iter().collect();
        for (i, (gene_a, ref_a)) in genes.iter().enumerate() {
            for (gene_b, ref_b) in genes.iter().skip(i + 1) {
                let boundary = find_unique_boundary(ref_a, ref_b);
                debug!("Unique boundary for {gene_a}/{gene_b}: {boundary:?}");
                unique_boundaries.insert(((*gene_a).clone(), (*gene_b).clone()), boundary);
            }
        }

        GeneDisambiguator {
            coding_lengths,
            unique_boundaries,
            max_ploidy
        }
    }

    /// Returns the unique boundary for a gene pair, in either order.
    /// The outer option is None for unknown pairs, the inner one is None when the pair is never distinguishable.
    pub fn unique_boundary(&self, gene_a: &str, gene_b: &str) -> Option<Option<usize>> {
        let key = if gene_a <= gene_b {
            (gene_a.to_string(), gene_b.to_string())
        } else {
            (gene_b.to_string(), gene_a.to_string())
        };
        self.unique_boundaries.get(&key).copied()
    }

    /// Adds every paralogous gene the fragment cannot be distinguished from.
    /// Returns the genes that were added.
    /// # Arguments
    /// * `fragment` - the fragment to update
    pub fn disambiguate(&self, fragment: &mut Fragment) -> Vec<String> {
        let max_locus = match fragment.max_locus() {
            Some(m) => m,
            None => return vec![]
        };

        // only genes from extraction can pull in others
        let original_genes: BTreeSet<String> = fragment.genes().clone();
        let mut added: Vec<String> = vec![];
        for (gene_b, &coding_length) in self.coding_lengths.iter() {
            if fragment.genes().len() >= self.max_ploidy {
                break;
            }
            if fragment.contains_gene(gene_b) || max_locus >= coding_length {
                continue;
            }

            let ambiguous = original_genes.iter().any(|gene_a| {
                match self.unique_boundary(gene_a, gene_b) {
                    Some(None) => true,
                    Some(Some(boundary)) => max_locus < boundary,
                    // the extraction gene is not in the reference
                    None => false
                }
            });
            if ambiguous {
                trace!("Adding {gene_b} to fragment {}", fragment.id());
                fragment.add_gene(gene_b.clone());
                added.push(gene_b.clone());
            }
        }
        added
    }
}

/// Finds the lowest nucleotide locus where no candidate of one gene shares a value with any candidate of the other.
/// Wildcards make a locus indistinguishable.
fn find_unique_boundary(ref_a: &GeneReference, ref_b: &GeneReference) -> Option<usize> {
    let shared_length = ref_a.coding_length().min(ref_b.coding_length());
    (0..shared_length).find(|&locus| {
        let values_a = locus_values(ref_a, locus);
        let values_b = locus_values(ref_b, locus);
        match (values_a, values_b) {
            (Some(a), Some(b)) => a.is_disjoint(&b),
            _ => false
        }
    })
}

/// All candidate values at a nucleotide locus, or None if any candidate lacks it or has a wildcard
fn locus_values(reference: &GeneReference, locus: usize) -> Option<BTreeSet<&str>> {
    let mut values: BTreeSet<&str> = Default::default();
    for seq in reference.nucleotide_sequences().iter() {
        match seq.value(locus) {
            Some(WILDCARD) | None => return None,
            Some(v) => values.insert(v)
        };
    }
    if values.is_empty() { None } else { Some(values) }
}
