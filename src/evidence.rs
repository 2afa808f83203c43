
use itertools::Itertools;
use log::{debug, info, warn};
use rustc_hash::FxHashMap as HashMap;
use std::collections::btree_map::Entry::{Occupied, Vacant};
use std::collections::{BTreeMap, BTreeSet};

use crate::data_types::fragment::{Fragment, FragmentScope};
use crate::data_types::fragment_alleles::FragmentAlleles;
use crate::data_types::indel_read::IndelRead;
use crate::data_types::reference_data::ReferenceData;
use crate::hla::allele_matcher::AlleleMatcher;
use crate::hla::anchor::{anchor_reads, IndelAnchorMatcher};
use crate::hla::config::EvidenceConfig;
use crate::hla::debug::{EvidenceDebug, EvidenceThresholds};
use crate::hla::disambiguate::GeneDisambiguator;
use crate::hla::evidence_cache::EvidenceTableCache;
use crate::hla::pipeline::{derive_thresholds, EvidencePipeline};

/// Everything a genotyping run produces for the downstream solver
pub struct EvidenceResult {
    /// Trusted fragments for each gene, with scopes set by allele matching
    pub gene_fragments: BTreeMap<String, Vec<Fragment>>,
    /// Per-gene nucleotide and amino acid evidence
    pub cache: EvidenceTableCache,
    /// Informative allele matches, one per fragment
    pub fragment_alleles: Vec<FragmentAlleles>,
    /// Thresholds used for the run
    pub thresholds: EvidenceThresholds,
    /// QC summary
    pub debug: EvidenceDebug
}

/// Main entry point for turning a sample's fragments into scored allele evidence.
/// # Arguments
/// * `config` - algorithm constants
/// * `reference` - the candidate alleles and reference context
/// * `fragments` - the sample's gene-attributed fragments
/// * `indel_reads` - reads that need anchoring before they can become fragments
/// # Errors
/// * if the config or reference data are invalid
/// * if an anchored read cannot be merged with its mate
/// * if a gene produces evidence tables twice
pub fn run_evidence(
    config: &EvidenceConfig, reference: &ReferenceData, fragments: Vec<Fragment>, indel_reads: &[IndelRead]
) -> Result<EvidenceResult, Box<dyn std::error::Error>> {
    config.validate()?;
    reference.validate()?;
    let mut debug = EvidenceDebug::new();

    // malformed fragments are reported, not fatal
    let mut fragments = validate_fragments(fragments, config.max_ploidy, &mut debug);
    info!("Loaded {} valid fragments.", fragments.len());

    let disambiguator = GeneDisambiguator::new(reference, config.max_ploidy);
    let mut disambiguated = 0;
    for fragment in fragments.iter_mut() {
        if !disambiguator.disambiguate(fragment).is_empty() {
            disambiguated += 1;
        }
    }
    debug!("Added paralogous genes to {disambiguated} fragments.");

    if !indel_reads.is_empty() {
        fragments = add_indel_reads(config, reference, &disambiguator, fragments, indel_reads, &mut debug)?;
    }
    debug.set_total_fragments(fragments.len());

    let thresholds = derive_thresholds(config, &fragments);
    info!(
        "Evidence thresholds from {} high quality fragments: min_evidence={}, min_high_qual_evidence={}",
        thresholds.high_quality_fragments, thresholds.min_evidence, thresholds.min_high_qual_evidence
    );
    debug.set_thresholds(thresholds);

    let pipeline = EvidencePipeline::new(config, reference, thresholds);
    let gene_results = pipeline.process_all(&fragments);

    let mut cache = EvidenceTableCache::new();
    let mut gene_fragments: BTreeMap<String, Vec<Fragment>> = Default::default();
    for gene_evidence in gene_results.into_iter() {
        for fragment in gene_evidence.excluded.iter() {
            debug.add_scope(fragment);
        }
        debug.add_gene_stats(gene_evidence.gene.clone(), gene_evidence.stats)?;
        cache.insert(gene_evidence.gene.clone(), gene_evidence.nucleotide_table, gene_evidence.amino_acid_table)?;
        gene_fragments.insert(gene_evidence.gene, gene_evidence.fragments);
    }

    // a fragment trusted in several genes is only scored once, from its first gene
    let mut unique_fragments: Vec<Fragment> = gene_fragments.values()
        .flatten()
        .unique_by(|f| f.id().to_string())
        .cloned()
        .collect();

    let matcher = AlleleMatcher::from_evidence(reference, &cache);
    let fragment_alleles = matcher.match_fragments(&mut unique_fragments);
    for fragment in unique_fragments.iter() {
        debug.add_scope(fragment);
    }
    info!("Found {} informative fragments out of {} trusted fragments.", fragment_alleles.len(), unique_fragments.len());

    // carry the matching scopes back to the per-gene collections
    let scopes: HashMap<&str, _> = unique_fragments.iter()
        .map(|f| (f.id(), f.scope()))
        .collect();
    for fragments in gene_fragments.values_mut() {
        for fragment in fragments.iter_mut() {
            if let Some(&scope) = scopes.get(fragment.id()) {
                fragment.set_scope(scope, false);
            }
        }
    }

    Ok(EvidenceResult {
        gene_fragments,
        cache,
        fragment_alleles,
        thresholds,
        debug
    })
}

/// Runs a second sample against the evidence of a completed run and keeps the fragments without novel amino acids
/// # Arguments
/// * `config` - algorithm constants, should match the reference run
/// * `reference` - the candidate alleles and reference context
/// * `reference_result` - the completed run for the reference sample
/// * `comparison` - the second sample's fragments
pub fn comparison_coverage_fragments(
    config: &EvidenceConfig, reference: &ReferenceData, reference_result: &EvidenceResult, comparison: Vec<Fragment>
) -> Vec<Fragment> {
    let mut comparison_debug = EvidenceDebug::new();
    let mut comparison = validate_fragments(comparison, config.max_ploidy, &mut comparison_debug);
    let disambiguator = GeneDisambiguator::new(reference, config.max_ploidy);
    for fragment in comparison.iter_mut() {
        disambiguator.disambiguate(fragment);
    }

    let pipeline = EvidencePipeline::new(config, reference, reference_result.thresholds);
    let kept = pipeline.comparison_coverage_fragments(&reference_result.cache, &comparison);
    info!("Kept {} of {} comparison fragments.", kept.len(), comparison.len());
    kept
}

/// Splits off fragments that fail validation, recording each failure
fn validate_fragments(fragments: Vec<Fragment>, max_genes: usize, debug: &mut EvidenceDebug) -> Vec<Fragment> {
    let mut valid = Vec::with_capacity(fragments.len());
    for fragment in fragments.into_iter() {
        match fragment.validate(max_genes) {
            Ok(()) => valid.push(fragment),
            Err(e) => {
                debug!("Excluding malformed fragment {}: {e}", fragment.id());
                debug.add_malformed(fragment.id().to_string(), e.to_string());
            }
        }
    }
    let malformed = debug.malformed_fragments().len();
    if malformed > 0 {
        warn!("Excluded {malformed} malformed fragments.");
    }
    valid
}

/// Anchors the indel reads, then merges each one into its mate or drops the mate when anchoring failed
/// # Errors
/// * if an anchored read cannot be merged into its mate
fn add_indel_reads(
    config: &EvidenceConfig, reference: &ReferenceData, disambiguator: &GeneDisambiguator,
    fragments: Vec<Fragment>, indel_reads: &[IndelRead], debug: &mut EvidenceDebug
) -> Result<Vec<Fragment>, Box<dyn std::error::Error>> {
    let matcher = IndelAnchorMatcher::new(reference, config);
    debug!("Built anchor indices for {} candidates.", matcher.num_candidates());
    let summary = anchor_reads(&matcher, indel_reads);
    info!(
        "Anchored {} of {} indel reads, discarding {} mates.",
        summary.fragments.len(), indel_reads.len(), summary.discarded_mates.len()
    );

    let (discarded, mut fragments): (Vec<Fragment>, Vec<Fragment>) = fragments.into_iter()
        .partition(|f| summary.discarded_mates.contains(f.id()));
    for mut fragment in discarded.into_iter() {
        fragment.set_scope(FragmentScope::UnmatchedIndel, false);
        debug.add_scope(&fragment);
    }

    let mut index: BTreeMap<String, usize> = Default::default();
    for (i, fragment) in fragments.iter().enumerate() {
        // duplicate IDs would make the merge target ambiguous, first one wins
        index.entry(fragment.id().to_string()).or_insert(i);
    }

    let mut anchored_indices: BTreeSet<usize> = Default::default();
    for mut anchored in summary.fragments.into_iter() {
        disambiguator.disambiguate(&mut anchored);
        match index.entry(anchored.id().to_string()) {
            Occupied(entry) => {
                fragments[*entry.get()].merge(&anchored)?;
                anchored_indices.insert(*entry.get());
            },
            Vacant(entry) => {
                entry.insert(fragments.len());
                anchored_indices.insert(fragments.len());
                fragments.push(anchored);
            }
        }
    }

    // a joined pair carries the genes of both reads, which can exceed the ploidy bound
    let mut valid = Vec::with_capacity(fragments.len());
    for (i, fragment) in fragments.into_iter().enumerate() {
        if anchored_indices.contains(&i) {
            if let Err(e) = fragment.validate(config.max_ploidy) {
                warn!("Excluding anchored fragment {}: {e}", fragment.id());
                debug.add_malformed(fragment.id().to_string(), e.to_string());
                continue;
            }
        }
        valid.push(fragment);
    }

    debug.set_unmatched_indels(summary.unmatched, summary.discarded_mates);
    Ok(valid)
}
