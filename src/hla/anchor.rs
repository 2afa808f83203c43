
use bio::alphabets::Alphabet;
use bio::data_structures::bwt::{bwt, less, Less, Occ, BWT};
use bio::data_structures::fmindex::{BackwardSearchResult, FMIndex, FMIndexable};
use bio::data_structures::suffix_array::{suffix_array, RawSuffixArray};
use log::{debug, trace};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::data_types::fragment::Fragment;
use crate::data_types::indel_read::IndelRead;
use crate::data_types::reference_data::ReferenceData;
use crate::data_types::reference_sequence::{ReferenceAlleleSequence, DELETION};
use crate::hla::alleles::HlaAllele;
use crate::hla::config::EvidenceConfig;
use crate::util::sequence::{is_concrete_base, translate_sequence, UNKNOWN_AMINO_ACID};

/// Terminates every indexed text, must sort before all other symbols
const SENTINEL: u8 = b'$';
/// Every symbol that can appear in an indexed text
const INDEX_SYMBOLS: &[u8] = b"$*ACDEFGHIKLMNPQRSTVWXY";
/// Sampling rate for the occurrence array
const OCC_SAMPLING: u32 = 3;

/// Exact-match index over one flattened amino acid sequence.
/// Each position of the flattened text remembers which locus it came from.
struct AnchorIndex {
    /// Source locus for each text position (excluding the sentinel)
    loci: Vec<usize>,
    /// Suffix array of `text`
    suffix_array: RawSuffixArray,
    /// FM-index of `text`
    fm_index: FMIndex<BWT, Less, Occ>
}

impl AnchorIndex {
    /// Builds the index from locus values
    /// # Arguments
    /// * `sequence` - the candidate amino acid sequence
    /// * `expand_insertions` - if true, folded insertions are expanded; otherwise only their first residue is kept
    fn new(sequence: &ReferenceAlleleSequence, expand_insertions: bool) -> AnchorIndex {
        let mut text: Vec<u8> = Vec::with_capacity(sequence.len() + 1);
        let mut loci: Vec<usize> = Vec::with_capacity(sequence.len());
        for (locus, value) in sequence.sequence().iter().enumerate() {
            // deletions never contribute anything to the text
            if value == DELETION {
                continue;
            }
            let residues = match value.as_bytes().first() {
                Some(_) if expand_insertions => value.as_bytes(),
                Some(first) => std::slice::from_ref(first),
                // nothing to index for an empty value
                None => continue
            };
            for &r in residues.iter() {
                // anything outside the alphabet would break the index
                text.push(if INDEX_SYMBOLS.contains(&r) && r != SENTINEL { r } else { UNKNOWN_AMINO_ACID });
                loci.push(locus);
            }
        }
        text.push(SENTINEL);

        let alphabet = Alphabet::new(INDEX_SYMBOLS);
        let suffix_array = suffix_array(&text);
        let bwt_text = bwt(&text, &suffix_array);
        let less_table = less(&bwt_text, &alphabet);
        let occ = Occ::new(&bwt_text, OCC_SAMPLING, &alphabet);
        let fm_index = FMIndex::new(bwt_text, less_table, occ);

        AnchorIndex {
            loci,
            suffix_array,
            fm_index
        }
    }

    /// Returns every text position where the pattern occurs exactly, sorted
    fn find(&self, pattern: &[u8]) -> Vec<usize> {
        if pattern.is_empty() || pattern.iter().any(|c| *c == SENTINEL || !INDEX_SYMBOLS.contains(c)) {
            return vec![];
        }
        match self.fm_index.backward_search(pattern.iter()) {
            BackwardSearchResult::Complete(interval) => {
                let mut positions = interval.occ(&self.suffix_array);
                positions.sort_unstable();
                positions
            },
            BackwardSearchResult::Partial(_, _) | BackwardSearchResult::Absent => vec![]
        }
    }

    /// True if the text position is the first residue of its locus
    fn is_locus_start(&self, position: usize) -> bool {
        position < self.loci.len() && (position == 0 || self.loci[position - 1] != self.loci[position])
    }

    /// Walks forward from a hit, keeping every locus whose full value fits inside the matched length
    /// # Arguments
    /// * `position` - the text position of the hit, expected to be a locus start
    /// * `length` - the number of matched residues
    fn extend(&self, position: usize, length: usize) -> Vec<usize> {
        let end = (position + length).min(self.loci.len());
        let mut matched: Vec<usize> = vec![];
        let mut index = position;
        while index < end {
            let locus = self.loci[index];
            let mut next = index;
            while next < self.loci.len() && self.loci[next] == locus {
                next += 1;
            }
            if next > end {
                // the read ends partway through an insertion
                break;
            }
            matched.push(locus);
            index = next;
        }
        matched
    }
}

/// One candidate allele with both of its indexes
struct AnchorCandidate {
    /// Gene this candidate belongs to
    gene_name: String,
    /// The allele
    allele: HlaAllele,
    /// Nucleotide sequence for the allele, used to assign bases to anchored loci
    nucleotides: ReferenceAlleleSequence,
    /// Index with insertions expanded
    inserted: AnchorIndex,
    /// Index with deletions removed and insertions collapsed
    deleted: AnchorIndex
}

/// A successful placement of a read inside one candidate
#[derive(Debug)]
struct AnchorHit {
    /// Index into the candidate list
    candidate: usize,
    /// Number of amino acid loci covered
    amino_acid_count: usize,
    /// Nucleotide locus -> reference base
    bases: BTreeMap<usize, u8>
}

/// Re-anchors reads with indels or soft clips by exact search of their translation in every candidate.
/// Read-only once built, so it can be shared across threads.
pub struct IndelAnchorMatcher {
    /// All indexed candidates
    candidates: Vec<AnchorCandidate>,
    /// Extra amino acids of tolerance on each side of the window
    window_slack: isize,
    /// Minimum translated read length to attempt a search
    min_anchor_length: usize
}

impl IndelAnchorMatcher {
    /// Builds the indexes for every candidate that has both an amino acid and a nucleotide sequence.
    /// # Arguments
    /// * `reference` - the reference context
    /// * `config` - provides the window slack and minimum anchor length
    pub fn new(reference: &ReferenceData, config: &EvidenceConfig) -> IndelAnchorMatcher {
        let mut candidates: Vec<AnchorCandidate> = vec![];
        for (gene_name, gene_ref) in reference.genes().iter() {
            let nucleotide_lookup: BTreeMap<&HlaAllele, &ReferenceAlleleSequence> = gene_ref.nucleotide_sequences().iter()
                .map(|s| (s.allele(), s))
                .collect();
            // amino acid candidates are usually protein level, so fall back to the first matching nucleotide allele
            let mut protein_lookup: BTreeMap<HlaAllele, &ReferenceAlleleSequence> = Default::default();
            for seq in gene_ref.nucleotide_sequences().iter() {
                protein_lookup.entry(seq.allele().as_four_digit()).or_insert(seq);
            }

            for aa_seq in gene_ref.amino_acid_sequences().iter() {
                let opt_nucleotides = nucleotide_lookup.get(aa_seq.allele()).copied()
                    .or_else(|| protein_lookup.get(&aa_seq.allele().as_four_digit()).copied());
                let nucleotides = match opt_nucleotides {
                    Some(n) => n.clone(),
                    None => {
                        debug!("Skipping anchor index for {}, no nucleotide sequence", aa_seq.allele());
                        continue;
                    }
                };
                candidates.push(AnchorCandidate {
                    gene_name: gene_name.clone(),
                    allele: aa_seq.allele().clone(),
                    nucleotides,
                    inserted: AnchorIndex::new(aa_seq, true),
                    deleted: AnchorIndex::new(aa_seq, false)
                });
            }
        }
        debug!("Built anchor indexes for {} candidates", candidates.len());

        IndelAnchorMatcher {
            candidates,
            window_slack: config.anchor_window_slack as isize,
            min_anchor_length: config.min_anchor_length
        }
    }

    pub fn num_candidates(&self) -> usize {
        self.candidates.len()
    }

    /// Attempts to anchor a read.
    /// Returns a fragment built from reference codons at the anchored loci, or None if no in-window hit exists.
    /// # Arguments
    /// * `read` - the indel or soft-clipped read
    pub fn anchor(&self, read: &IndelRead) -> Option<Fragment> {
        let read_start = read.read_start();
        let frame_offset = (-read_start).rem_euclid(3) as usize;
        if frame_offset >= read.bases.len() {
            return None;
        }
        let translated = translate_sequence(&read.bases.as_bytes()[frame_offset..]);
        if translated.len() < self.min_anchor_length {
            trace!("Read {} is too short to anchor", read.fragment_id);
            return None;
        }

        // the true start can move by up to the largest indel in either direction
        let max_indel = read.max_indel_length() as isize;
        let window_start = (read_start - max_indel).div_euclid(3) - self.window_slack;
        let window_end = (read.aligned_start as isize + max_indel).div_euclid(3) + self.window_slack;

        let use_inserted = read.has_insertion() || !read.has_deletion();
        let use_deleted = read.has_deletion() || !read.has_insertion();

        let mut hits: Vec<AnchorHit> = vec![];
        for (candidate_index, candidate) in self.candidates.iter().enumerate() {
            if !read.genes.is_empty() && !read.genes.contains(&candidate.gene_name) {
                continue;
            }

            let mut indexes: Vec<&AnchorIndex> = vec![];
            if use_inserted {
                indexes.push(&candidate.inserted);
            }
            if use_deleted {
                indexes.push(&candidate.deleted);
            }

            for index in indexes.into_iter() {
                for position in index.find(&translated).into_iter() {
                    if !index.is_locus_start(position) {
                        continue;
                    }
                    let start_locus = index.loci[position] as isize;
                    if start_locus < window_start || start_locus > window_end {
                        trace!("Read {} hit {} at {start_locus}, outside [{window_start}, {window_end}]", read.fragment_id, candidate.allele);
                        continue;
                    }

                    let matched_loci = index.extend(position, translated.len());
                    let bases = reference_codons(&candidate.nucleotides, &matched_loci);
                    hits.push(AnchorHit {
                        candidate: candidate_index,
                        amino_acid_count: matched_loci.len(),
                        bases
                    });
                }
            }
        }

        let best_count = hits.iter().map(|h| h.amino_acid_count).max()?;
        let best_hits: Vec<&AnchorHit> = hits.iter()
            .filter(|h| h.amino_acid_count == best_count)
            .collect();

        // only keep loci where every best placement agrees on the base
        let mut consensus: BTreeMap<usize, u8> = best_hits[0].bases.clone();
        for hit in best_hits.iter().skip(1) {
            consensus.retain(|locus, base| hit.bases.get(locus) == Some(base));
        }
        if consensus.is_empty() {
            return None;
        }

        let genes: BTreeSet<String> = if read.genes.is_empty() {
            best_hits.iter().map(|h| self.candidates[h.candidate].gene_name.clone()).collect()
        } else {
            read.genes.clone()
        };
        trace!("Anchored read {} to {} loci across {} placements", read.fragment_id, consensus.len(), best_hits.len());

        let quality = read.mean_quality();
        let (loci, bases): (Vec<usize>, Vec<u8>) = consensus.into_iter().unzip();
        let qualities = vec![quality; loci.len()];
        Some(Fragment::new(read.fragment_id.clone(), genes, loci, bases, qualities))
    }
}

/// Expands amino acid loci into their nucleotide loci, taking bases from the reference codons
fn reference_codons(nucleotides: &ReferenceAlleleSequence, amino_acid_loci: &[usize]) -> BTreeMap<usize, u8> {
    let mut bases: BTreeMap<usize, u8> = Default::default();
    for &aa_locus in amino_acid_loci.iter() {
        for locus in 3 * aa_locus..3 * aa_locus + 3 {
            if let Some(base) = nucleotides.residue(locus) {
                if is_concrete_base(base) {
                    bases.insert(locus, base);
                }
            }
        }
    }
    bases
}

/// Counts of reads that could not be anchored, keyed by gene, locus, type, and length
#[derive(Clone, Debug, Default, Serialize)]
pub struct UnmatchedIndelTally {
    counts: BTreeMap<String, usize>
}

impl UnmatchedIndelTally {
    pub fn new() -> UnmatchedIndelTally {
        Default::default()
    }

    /// Records every event on the read
    pub fn record(&mut self, read: &IndelRead) {
        for key in read.tally_keys().into_iter() {
            *self.counts.entry(key).or_insert(0) += 1;
        }
    }

    pub fn counts(&self) -> &BTreeMap<String, usize> {
        &self.counts
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

/// Output of anchoring a batch of reads
#[derive(Debug, Default)]
pub struct AnchorSummary {
    /// Fragments created from anchored reads
    pub fragments: Vec<Fragment>,
    /// Reads that could not be anchored
    pub unmatched: UnmatchedIndelTally,
    /// Fragment IDs whose mates must be discarded
    pub discarded_mates: BTreeSet<String>
}

/// Anchors all reads in parallel and gathers the results.
/// # Arguments
/// * `matcher` - the pre-built matcher
/// * `reads` - the reads to anchor
pub fn anchor_reads(matcher: &IndelAnchorMatcher, reads: &[IndelRead]) -> AnchorSummary {
    let results: Vec<Option<Fragment>> = reads.par_iter()
        .map(|read| matcher.anchor(read))
        .collect();

    let mut summary = AnchorSummary::default();
    for (read, result) in reads.iter().zip(results.into_iter()) {
        match result {
            Some(fragment) => summary.fragments.push(fragment),
            None => {
                debug!("Unable to anchor read {}, discarding mate", read.fragment_id);
                summary.unmatched.record(read);
                summary.discarded_mates.insert(read.fragment_id.clone());
            }
        }
    }

    // a pair with one unanchored read loses the other read too
    summary.fragments.retain(|f| !summary.discarded_mates.contains(f.id()));
    summary
}
