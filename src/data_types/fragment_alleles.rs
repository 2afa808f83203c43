
use serde::Serialize;
use std::collections::BTreeSet;

use crate::hla::alleles::HlaAllele;

/// Links one fragment to the candidate alleles it supports.
/// Created once per fragment, later stages only filter it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FragmentAlleles {
    /// The fragment this result is for
    fragment_id: String,
    /// Alleles matched exactly
    full: BTreeSet<HlaAllele>,
    /// Alleles matched only with the help of wildcards
    partial: BTreeSet<HlaAllele>,
    /// Alleles that were wildcards at every compared position
    wild: BTreeSet<HlaAllele>
}

impl FragmentAlleles {
    pub fn new(fragment_id: String, full: BTreeSet<HlaAllele>, partial: BTreeSet<HlaAllele>, wild: BTreeSet<HlaAllele>) -> FragmentAlleles {
        FragmentAlleles {
            fragment_id,
            full,
            partial,
            wild
        }
    }

    // getters
    pub fn fragment_id(&self) -> &str {
        &self.fragment_id
    }

    pub fn full(&self) -> &BTreeSet<HlaAllele> {
        &self.full
    }

    pub fn partial(&self) -> &BTreeSet<HlaAllele> {
        &self.partial
    }

    pub fn wild(&self) -> &BTreeSet<HlaAllele> {
        &self.wild
    }

    /// True if there is no full or partial support; wild matches alone carry no signal
    pub fn is_uninformative(&self) -> bool {
        self.full.is_empty() && self.partial.is_empty()
    }

    /// True if the allele appears in any of the three partitions
    pub fn contains(&self, allele: &HlaAllele) -> bool {
        self.full.contains(allele) || self.partial.contains(allele) || self.wild.contains(allele)
    }

    /// Returns a copy restricted to the provided alleles
    /// # Arguments
    /// * `alleles` - the alleles to keep
    pub fn filter(&self, alleles: &BTreeSet<HlaAllele>) -> FragmentAlleles {
        FragmentAlleles {
            fragment_id: self.fragment_id.clone(),
            full: self.full.intersection(alleles).cloned().collect(),
            partial: self.partial.intersection(alleles).cloned().collect(),
            wild: self.wild.intersection(alleles).cloned().collect()
        }
    }
}
