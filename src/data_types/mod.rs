
/// Typed errors for fragment validation
pub mod errors;
/// Per-locus value counts with a support threshold
pub mod evidence_table;
/// Contains the fragment definition, the unit of read evidence
pub mod fragment;
/// Allele match results for a single fragment
pub mod fragment_alleles;
/// Reads that carry indels or soft clips and need anchoring
pub mod indel_read;
/// Contains the reference context for every gene: candidates, boundaries, and coding lengths
pub mod reference_data;
/// Per-locus reference values for a candidate allele
pub mod reference_sequence;
