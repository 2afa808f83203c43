
use log::{debug, info, trace};
use rayon::prelude::*;
use rustc_hash::FxHashSet as HashSet;
use std::collections::{BTreeMap, BTreeSet};

use crate::data_types::evidence_table::EvidenceTable;
use crate::data_types::fragment::{Fragment, FragmentScope};
use crate::data_types::reference_data::ReferenceData;
use crate::hla::config::EvidenceConfig;
use crate::hla::debug::{EvidenceThresholds, GenePipelineStats};
use crate::hla::evidence_cache::EvidenceTableCache;

/// Derives the run-wide thresholds from the number of fragments with any high-quality base
/// # Arguments
/// * `config` - provides the base quality cutoff, floor, and factors
/// * `fragments` - every validated fragment in the sample
pub fn derive_thresholds(config: &EvidenceConfig, fragments: &[Fragment]) -> EvidenceThresholds {
    let high_quality_fragments = fragments.iter()
        .filter(|f| f.qualities().iter().any(|&q| q >= config.min_base_quality))
        .count();
    thresholds_for_count(config, high_quality_fragments)
}

/// Thresholds for a known high-quality fragment count
pub fn thresholds_for_count(config: &EvidenceConfig, high_quality_fragments: usize) -> EvidenceThresholds {
    let n = high_quality_fragments as f64;
    let scaled_evidence = (n * config.min_evidence_factor).round() as usize;
    let min_high_qual_evidence = (n * config.min_high_qual_evidence_factor).round() as usize;
    EvidenceThresholds {
        high_quality_fragments,
        min_evidence: config.min_evidence.max(scaled_evidence),
        min_high_qual_evidence
    }
}

/// Everything a single gene pipeline produces
#[derive(Clone, Debug)]
pub struct GeneEvidence {
    /// The gene this is for
    pub gene: String,
    /// Trusted fragments with amino acids built
    pub fragments: Vec<Fragment>,
    /// Fragments that were dropped, tagged with the reason
    pub excluded: Vec<Fragment>,
    /// Nucleotide evidence over the trusted fragments
    pub nucleotide_table: EvidenceTable,
    /// Amino acid evidence used for amino acid filtering
    pub amino_acid_table: EvidenceTable,
    /// What happened along the way
    pub stats: GenePipelineStats
}

/// Turns raw gene-attributed fragments into the trusted evidence set for allele matching
pub struct EvidencePipeline<'a> {
    /// Algorithm constants
    config: &'a EvidenceConfig,
    /// Reference context, provides the splice boundaries
    reference: &'a ReferenceData,
    /// Run-wide thresholds
    thresholds: EvidenceThresholds
}

impl<'a> EvidencePipeline<'a> {
    pub fn new(config: &'a EvidenceConfig, reference: &'a ReferenceData, thresholds: EvidenceThresholds) -> EvidencePipeline<'a> {
        EvidencePipeline {
            config,
            reference,
            thresholds
        }
    }

    pub fn thresholds(&self) -> &EvidenceThresholds {
        &self.thresholds
    }

    /// Runs every reference gene in parallel; each gene works on its own copies of the fragments.
    /// Results are in gene order.
    /// # Arguments
    /// * `fragments` - all fragments for the sample, already disambiguated
    pub fn process_all(&self, fragments: &[Fragment]) -> Vec<GeneEvidence> {
        let genes: Vec<&String> = self.reference.gene_names().collect();
        genes.into_par_iter()
            .map(|gene| self.process_gene(gene, fragments))
            .collect()
    }

    /// Runs the full evidence pipeline for one gene.
    /// # Arguments
    /// * `gene` - the gene to process
    /// * `fragments` - fragments for the sample, only those attributed to `gene` are used
    pub fn process_gene(&self, gene: &str, fragments: &[Fragment]) -> GeneEvidence {
        let mut stats = GenePipelineStats::default();
        let mut excluded: Vec<Fragment> = vec![];

        // copies, the originals are reused by other genes
        let working: Vec<Fragment> = fragments.iter()
            .filter(|f| f.contains_gene(gene))
            .cloned()
            .collect();
        stats.input_fragments = working.len();

        let (working, high_qual) = self.split_high_quality(working, &mut stats, &mut excluded);
        let (mut working, high_qual_table) = self.filter_nucleotides(working, &high_qual, &mut stats, &mut excluded);

        let boundaries: BTreeSet<usize> = self.reference.gene(gene)
            .map(|g| g.splice_boundaries().clone())
            .unwrap_or_default();
        stats.splice_enriched = self.enrich_splice_boundaries(&boundaries, &high_qual_table, &mut working);

        let (working, amino_acid_table) = self.filter_amino_acids(working, &mut stats, &mut excluded);
        let nucleotide_table = EvidenceTable::nucleotides(self.thresholds.min_evidence, &working);
        stats.output_fragments = working.len();

        info!(
            "{gene}: {} input fragments, {} quality dropped, {} rebuilt, {} enriched, {} amino acid dropped, {} trusted",
            stats.input_fragments, stats.quality_dropped, stats.nucleotide_rebuilt,
            stats.splice_enriched, stats.amino_acid_dropped, stats.output_fragments
        );

        GeneEvidence {
            gene: gene.to_string(),
            fragments: working,
            excluded,
            nucleotide_table,
            amino_acid_table,
            stats
        }
    }

    /// Builds a quality-filtered view of every fragment and discards those with no high-quality bases.
    /// Returns the surviving fragments (unfiltered) and their high-quality views, in the same order.
    fn split_high_quality(&self, fragments: Vec<Fragment>, stats: &mut GenePipelineStats, excluded: &mut Vec<Fragment>) -> (Vec<Fragment>, Vec<Fragment>) {
        let mut kept: Vec<Fragment> = Vec::with_capacity(fragments.len());
        let mut high_qual: Vec<Fragment> = Vec::with_capacity(fragments.len());
        for mut fragment in fragments.into_iter() {
            let mut hq = fragment.clone();
            hq.quality_filter(self.config.min_base_quality);
            if hq.is_empty() {
                trace!("Fragment {} has no high quality bases", fragment.id());
                fragment.set_scope(FragmentScope::BaseQualFiltered, false);
                stats.quality_dropped += 1;
                excluded.push(fragment);
            } else {
                kept.push(fragment);
                high_qual.push(hq);
            }
        }
        (kept, high_qual)
    }

    /// Keeps each observation only if both the high-quality and the all-fragment tables support it.
    /// Loci with less raw depth than the configured floor are left alone.
    /// Returns the filtered fragments and the high-quality table.
    /// # Arguments
    /// * `fragments` - fragments with their full working observations
    /// * `high_qual` - the quality-filtered views
    /// * `stats` - updated with rebuilt and dropped counts
    /// * `excluded` - receives fragments with nothing left
    pub fn filter_nucleotides(
        &self, fragments: Vec<Fragment>, high_qual: &[Fragment], stats: &mut GenePipelineStats, excluded: &mut Vec<Fragment>
    ) -> (Vec<Fragment>, EvidenceTable) {
        let high_qual_table = EvidenceTable::nucleotides(self.thresholds.min_high_qual_evidence, high_qual);
        let all_table = EvidenceTable::nucleotides(self.thresholds.min_evidence, &fragments);

        // None means the locus bypasses filtering
        let allowed: BTreeMap<usize, Option<BTreeSet<u8>>> = all_table.loci()
            .map(|locus| {
                if all_table.depth(locus) < self.config.min_depth_filter {
                    (locus, None)
                } else {
                    let hq_values = high_qual_table.values_at_or_above_threshold(locus);
                    let all_values = all_table.values_at_or_above_threshold(locus);
                    (locus, Some(hq_values.intersection(&all_values).copied().collect()))
                }
            })
            .collect();

        let mut filtered: Vec<Fragment> = Vec::with_capacity(fragments.len());
        for mut fragment in fragments.into_iter() {
            let mut loci = vec![];
            let mut bases = vec![];
            let mut qualities = vec![];
            for (locus, base, quality) in fragment.nucleotide_iter() {
                let keep = match allowed.get(&locus) {
                    Some(Some(values)) => values.contains(&base),
                    Some(None) => true,
                    None => false
                };
                if keep {
                    loci.push(locus);
                    bases.push(base);
                    qualities.push(quality);
                }
            }

            if loci.len() == fragment.nucleotide_loci().len() {
                filtered.push(fragment);
            } else if loci.is_empty() {
                trace!("Fragment {} lost all nucleotide observations", fragment.id());
                fragment.set_scope(FragmentScope::BaseQualFiltered, false);
                stats.nucleotide_dropped += 1;
                excluded.push(fragment);
            } else {
                stats.nucleotide_rebuilt += 1;
                filtered.push(fragment.with_nucleotides(loci, bases, qualities));
            }
        }
        (filtered, high_qual_table)
    }

    /// Fills in a single missing base of a splice boundary codon when the codon is homozygous.
    /// Returns the number of fragments that gained at least one base.
    /// # Arguments
    /// * `boundaries` - amino acid loci that sit on exon boundaries
    /// * `high_qual_table` - high-quality nucleotide evidence, provides the consensus codon
    /// * `fragments` - updated in place
    pub fn enrich_splice_boundaries(&self, boundaries: &BTreeSet<usize>, high_qual_table: &EvidenceTable, fragments: &mut [Fragment]) -> usize {
        let mut enriched: Vec<bool> = vec![false; fragments.len()];
        for &boundary in boundaries.iter() {
            let codon_loci = [3 * boundary, 3 * boundary + 1, 3 * boundary + 2];
            let consensus: Option<Vec<u8>> = codon_loci.iter()
                .map(|&l| high_qual_table.homozygous_value(l))
                .collect();
            let consensus = match consensus {
                Some(c) => c,
                None => continue
            };

            for (i, fragment) in fragments.iter_mut().enumerate() {
                let missing: Vec<usize> = (0..3)
                    .filter(|&j| !fragment.contains_nucleotide(codon_loci[j]))
                    .collect();
                if missing.len() == 1 {
                    let j = missing[0];
                    if fragment.enrich(codon_loci[j], consensus[j], self.config.min_base_quality) {
                        trace!("Enriched fragment {} at locus {}", fragment.id(), codon_loci[j]);
                        enriched[i] = true;
                    }
                }
            }
        }
        enriched.iter().filter(|&&e| e).count()
    }

    /// Builds amino acids on a copy to derive the amino acid evidence, then applies it to the fragments.
    /// Fragments left without amino acids are excluded.
    /// Returns the trusted fragments and the amino acid table.
    pub fn filter_amino_acids(&self, fragments: Vec<Fragment>, stats: &mut GenePipelineStats, excluded: &mut Vec<Fragment>) -> (Vec<Fragment>, EvidenceTable) {
        let amino_acid_table = {
            let mut copies = fragments.clone();
            for copy in copies.iter_mut() {
                copy.build_amino_acids();
            }
            EvidenceTable::amino_acids(self.thresholds.min_evidence, &copies)
        };
        let allowed: BTreeMap<usize, BTreeSet<u8>> = amino_acid_table.loci()
            .map(|l| (l, amino_acid_table.values_at_or_above_threshold(l)))
            .collect();

        let mut trusted: Vec<Fragment> = Vec::with_capacity(fragments.len());
        for mut fragment in fragments.into_iter() {
            fragment.build_amino_acids();
            fragment.filter_amino_acids(|locus, aa| {
                allowed.get(&locus).map(|v| v.contains(&aa)).unwrap_or(false)
            });
            if fragment.amino_acids().is_empty() {
                trace!("Fragment {} has no supported amino acids", fragment.id());
                fragment.set_scope(FragmentScope::NoAminoAcids, false);
                stats.amino_acid_dropped += 1;
                excluded.push(fragment);
            } else {
                trusted.push(fragment);
            }
        }
        (trusted, amino_acid_table)
    }

    /// Filters a second sample's fragments down to those without novel amino acid evidence.
    /// A value is novel when it clears threshold in the comparison sample but not in the reference sample's tables.
    /// # Arguments
    /// * `reference_tables` - the cached tables from the reference sample
    /// * `comparison` - the second sample's fragments, already validated and disambiguated
    pub fn comparison_coverage_fragments(&self, reference_tables: &EvidenceTableCache, comparison: &[Fragment]) -> Vec<Fragment> {
        let mut seen: HashSet<String> = Default::default();
        let mut results: Vec<Fragment> = vec![];

        for gene in self.reference.gene_names() {
            let mut stats = GenePipelineStats::default();
            let mut excluded: Vec<Fragment> = vec![];
            let working: Vec<Fragment> = comparison.iter()
                .filter(|f| f.contains_gene(gene))
                .cloned()
                .collect();

            let (working, high_qual) = self.split_high_quality(working, &mut stats, &mut excluded);
            let (mut working, _hq_table) = self.filter_nucleotides(working, &high_qual, &mut stats, &mut excluded);
            for fragment in working.iter_mut() {
                fragment.build_amino_acids();
            }

            let comparison_table = EvidenceTable::amino_acids(self.thresholds.min_evidence, &working);
            let reference_table = reference_tables.amino_acid_table(gene);
            let novel: BTreeMap<usize, BTreeSet<u8>> = comparison_table.loci()
                .filter_map(|locus| {
                    let reference_values = reference_table
                        .map(|t| t.values_at_or_above_threshold(locus))
                        .unwrap_or_default();
                    let novel_values: BTreeSet<u8> = comparison_table.values_at_or_above_threshold(locus)
                        .difference(&reference_values)
                        .copied()
                        .collect();
                    if novel_values.is_empty() { None } else { Some((locus, novel_values)) }
                })
                .collect();
            debug!("{gene}: {} loci with novel comparison evidence", novel.len());

            for fragment in working.into_iter() {
                let has_novel = fragment.amino_acid_iter()
                    .any(|(l, aa)| novel.get(&l).map(|v| v.contains(&aa)).unwrap_or(false));
                if !has_novel && seen.insert(fragment.id().to_string()) {
                    results.push(fragment);
                }
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::data_types::reference_data::GeneReference;
    use crate::data_types::reference_sequence::ReferenceAlleleSequence;
    use crate::hla::alleles::HlaAllele;

    fn test_reference(boundaries: &[usize]) -> ReferenceData {
        let allele = HlaAllele::new("A*01:01").unwrap();
        let gene = GeneReference::new(
            30,
            boundaries.iter().copied().collect(),
            Default::default(),
            vec![ReferenceAlleleSequence::from_residues(allele.clone(), "ATGGCTGTTCTGTCTCCTCGTACTGGTGAA")],
            vec![ReferenceAlleleSequence::from_residues(allele, "MAVLSPRTGE")]
        );
        let mut reference = ReferenceData::new();
        reference.add_gene("HLA-A".to_string(), gene).unwrap();
        reference
    }

    fn fragment(id: &str, loci: Vec<usize>, bases: &[u8]) -> Fragment {
        let n = loci.len();
        Fragment::new(id.to_string(), ["HLA-A".to_string()], loci, bases.to_vec(), vec![37; n])
    }

    fn fixed_thresholds(min_evidence: usize, min_high_qual_evidence: usize) -> EvidenceThresholds {
        EvidenceThresholds {
            high_quality_fragments: 0,
            min_evidence,
            min_high_qual_evidence
        }
    }

    #[test]
    fn test_thresholds() {
        let config = EvidenceConfig {
            min_evidence: 2,
            min_evidence_factor: 0.05,
            min_high_qual_evidence_factor: 0.02,
            ..Default::default()
        };
        let thresholds = thresholds_for_count(&config, 103);
        assert_eq!(thresholds.min_evidence, 5);
        assert_eq!(thresholds.min_high_qual_evidence, 2);

        // floor applies for small counts
        let thresholds = thresholds_for_count(&config, 10);
        assert_eq!(thresholds.min_evidence, 2);
        assert_eq!(thresholds.min_high_qual_evidence, 0);

        let mut fragments = vec![fragment("hq", vec![0], b"A")];
        fragments.push(Fragment::new("lq".to_string(), ["HLA-A".to_string()], vec![0], b"A".to_vec(), vec![10]));
        assert_eq!(derive_thresholds(&config, &fragments).high_quality_fragments, 1);
    }

    #[test]
    fn test_end_to_end_homozygous() {
        let config = EvidenceConfig {
            min_evidence: 2,
            min_evidence_factor: 0.05,
            min_high_qual_evidence_factor: 0.01,
            ..Default::default()
        };
        let reference = test_reference(&[]);

        let mut fragments: Vec<Fragment> = (0..100)
            .map(|i| fragment(&format!("a_{i}"), vec![9, 10, 11], b"GAT"))
            .collect();
        fragments.extend((0..3).map(|i| fragment(&format!("g_{i}"), vec![9, 10, 11], b"GGT")));

        let thresholds = derive_thresholds(&config, &fragments);
        assert_eq!(thresholds.min_evidence, 5);
        let pipeline = EvidencePipeline::new(&config, &reference, thresholds);
        let result = pipeline.process_gene("HLA-A", &fragments);

        assert_eq!(result.nucleotide_table.values_at_or_above_threshold(10), BTreeSet::from([b'A']));
        assert!(result.nucleotide_table.homozygous_loci().contains(&10));
        assert_eq!(result.fragments.len(), 100);
        assert_eq!(result.stats.nucleotide_rebuilt, 3);
        assert_eq!(result.stats.amino_acid_dropped, 3);
        assert!(result.excluded.iter().all(|f| f.scope() == FragmentScope::NoAminoAcids));
        assert_eq!(result.amino_acid_table.homozygous_value(3), Some(b'D'));
    }

    #[test]
    fn test_low_depth_bypass() {
        let config = EvidenceConfig::default();
        let reference = test_reference(&[]);
        let pipeline = EvidencePipeline::new(&config, &reference, fixed_thresholds(2, 1));

        let mut fragments: Vec<Fragment> = (0..3).map(|i| fragment(&format!("a_{i}"), vec![4], b"A")).collect();
        fragments.push(fragment("g", vec![4], b"G"));

        // depth of 4 is under the default floor, so the singleton G survives
        let mut stats = GenePipelineStats::default();
        let mut excluded = vec![];
        let (filtered, _) = pipeline.filter_nucleotides(fragments.clone(), &fragments, &mut stats, &mut excluded);
        assert_eq!(filtered.len(), 4);

        // with a lower floor it is removed
        let config = EvidenceConfig { min_depth_filter: 2, ..Default::default() };
        let pipeline = EvidencePipeline::new(&config, &reference, fixed_thresholds(2, 1));
        let (filtered, _) = pipeline.filter_nucleotides(fragments.clone(), &fragments, &mut stats, &mut excluded);
        assert_eq!(filtered.len(), 3);
        assert_eq!(stats.nucleotide_dropped, 1);
        assert_eq!(excluded[0].id(), "g");
        assert_eq!(excluded[0].scope(), FragmentScope::BaseQualFiltered);
    }

    #[test]
    fn test_low_quality_rescued() {
        let config = EvidenceConfig { min_depth_filter: 1, ..Default::default() };
        let reference = test_reference(&[]);
        let pipeline = EvidencePipeline::new(&config, &reference, fixed_thresholds(2, 2));

        // the low quality A is confirmed by high quality reads, the low quality C is not
        let mut fragments: Vec<Fragment> = (0..3).map(|i| fragment(&format!("a_{i}"), vec![6, 7], b"GA")).collect();
        fragments.push(Fragment::new("lq_a".to_string(), ["HLA-A".to_string()], vec![6, 7], b"GA".to_vec(), vec![37, 5]));
        fragments.push(Fragment::new("lq_c".to_string(), ["HLA-A".to_string()], vec![6, 7], b"GC".to_vec(), vec![37, 5]));
        fragments.push(Fragment::new("lq_c2".to_string(), ["HLA-A".to_string()], vec![6, 7], b"GC".to_vec(), vec![37, 5]));

        let mut stats = GenePipelineStats::default();
        let mut excluded = vec![];
        let (kept, high_qual) = pipeline.split_high_quality(fragments, &mut stats, &mut excluded);
        let (filtered, _) = pipeline.filter_nucleotides(kept, &high_qual, &mut stats, &mut excluded);
        let lq_a = filtered.iter().find(|f| f.id() == "lq_a").unwrap();
        assert_eq!(lq_a.nucleotide(7), Some(b'A'));
        let lq_c = filtered.iter().find(|f| f.id() == "lq_c").unwrap();
        assert_eq!(lq_c.nucleotide_loci(), &[6]);
        assert_eq!(stats.nucleotide_rebuilt, 2);
    }

    #[test]
    fn test_splice_repair_middle() {
        let config = EvidenceConfig::default();
        let reference = test_reference(&[1]);
        let pipeline = EvidencePipeline::new(&config, &reference, fixed_thresholds(2, 2));

        let mut fragments: Vec<Fragment> = (0..10)
            .map(|i| fragment(&format!("full_{i}"), vec![0, 1, 2, 3, 4, 5], b"ATGGCT"))
            .collect();
        fragments.push(fragment("gap", vec![0, 1, 2, 3, 5], b"ATGGT"));
        let high_qual_table = EvidenceTable::nucleotides(2, &fragments);

        let enriched = pipeline.enrich_splice_boundaries(&BTreeSet::from([1]), &high_qual_table, &mut fragments);
        assert_eq!(enriched, 1);
        let gap = fragments.last().unwrap();
        assert_eq!(gap.nucleotide_loci(), &[0, 1, 2, 3, 4, 5]);
        assert_eq!(gap.nucleotide(4), Some(b'C'));
        assert_eq!(gap.nucleotide_quality(4), Some(config.min_base_quality));
        // the complete fragments are untouched
        assert_eq!(fragments[0].nucleotide_loci().len(), 6);
    }

    #[test]
    fn test_splice_repair_requires_homozygous() {
        let config = EvidenceConfig::default();
        let reference = test_reference(&[1]);
        let pipeline = EvidencePipeline::new(&config, &reference, fixed_thresholds(2, 2));

        let mut fragments: Vec<Fragment> = (0..5).map(|i| fragment(&format!("c_{i}"), vec![3, 4, 5], b"GCT")).collect();
        fragments.extend((0..5).map(|i| fragment(&format!("t_{i}"), vec![3, 4, 5], b"GTT")));
        fragments.push(fragment("gap", vec![3, 5], b"GT"));
        let high_qual_table = EvidenceTable::nucleotides(2, &fragments);

        assert_eq!(pipeline.enrich_splice_boundaries(&BTreeSet::from([1]), &high_qual_table, &mut fragments), 0);
        assert!(!fragments.last().unwrap().contains_nucleotide(4));

        // missing two of three is never repaired
        let mut fragments: Vec<Fragment> = (0..5).map(|i| fragment(&format!("c_{i}"), vec![3, 4, 5], b"GCT")).collect();
        fragments.push(fragment("gap", vec![3], b"G"));
        let high_qual_table = EvidenceTable::nucleotides(2, &fragments);
        assert_eq!(pipeline.enrich_splice_boundaries(&BTreeSet::from([1]), &high_qual_table, &mut fragments), 0);
    }

    #[test]
    fn test_amino_acid_monotonic() {
        let config = EvidenceConfig { min_depth_filter: 1, ..Default::default() };
        let reference = test_reference(&[1]);
        let pipeline = EvidencePipeline::new(&config, &reference, fixed_thresholds(2, 1));

        let mut fragments: Vec<Fragment> = (0..6)
            .map(|i| fragment(&format!("f_{i}"), vec![0, 1, 2, 3, 4, 5, 6, 7], b"ATGGCTGT"))
            .collect();
        fragments.push(fragment("gap", vec![1, 2, 3, 5, 6, 7, 8], b"TGGTGTT"));
        fragments.push(fragment("odd", vec![2, 3, 4, 5, 6], b"GGCTG"));

        let result = pipeline.process_gene("HLA-A", &fragments);
        assert_eq!(result.stats.splice_enriched, 1);
        for f in result.fragments.iter() {
            // every amino acid must come from a codon that is fully present
            for &aa_locus in f.amino_acid_loci().iter() {
                for locus in 3 * aa_locus..3 * aa_locus + 3 {
                    assert!(f.contains_nucleotide(locus), "{} missing {locus}", f.id());
                }
            }
            assert!(f.validate(3).is_ok());
        }
        let gap = result.fragments.iter().find(|f| f.id() == "gap").unwrap();
        // the unsupported trailing base was removed, so only the repaired codon translates
        assert_eq!(gap.amino_acid_loci(), &[1]);
        assert_eq!(gap.amino_acids(), b"A");
    }

    #[test]
    fn test_process_all() {
        let config = EvidenceConfig::default();
        let reference = test_reference(&[]);
        let pipeline = EvidencePipeline::new(&config, &reference, fixed_thresholds(2, 1));
        let fragments: Vec<Fragment> = (0..4).map(|i| fragment(&format!("f_{i}"), vec![0, 1, 2], b"ATG")).collect();

        let results = pipeline.process_all(&fragments);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].gene, "HLA-A");
        assert_eq!(results[0].fragments.len(), 4);
        // originals are not modified
        assert!(!fragments[0].amino_acids_built());
    }

    #[test]
    fn test_comparison_coverage() {
        let config = EvidenceConfig::default();
        let reference = test_reference(&[]);
        let pipeline = EvidencePipeline::new(&config, &reference, fixed_thresholds(2, 1));

        let sample: Vec<Fragment> = (0..4).map(|i| fragment(&format!("s_{i}"), vec![0, 1, 2], b"ATG")).collect();
        let result = pipeline.process_gene("HLA-A", &sample);
        let mut cache = EvidenceTableCache::new();
        cache.insert("HLA-A".to_string(), result.nucleotide_table, result.amino_acid_table).unwrap();

        // comparison sample has a K at locus 0 that the reference sample never saw
        let mut comparison: Vec<Fragment> = (0..3).map(|i| fragment(&format!("m_{i}"), vec![0, 1, 2], b"ATG")).collect();
        comparison.extend((0..3).map(|i| fragment(&format!("k_{i}"), vec![0, 1, 2], b"AAG")));
        let kept = pipeline.comparison_coverage_fragments(&cache, &comparison);
        let kept_ids: Vec<&str> = kept.iter().map(|f| f.id()).collect();
        assert_eq!(kept_ids, vec!["m_0", "m_1", "m_2"]);
    }
}
