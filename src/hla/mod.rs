
/// Scores fragments against the candidate reference alleles
pub mod allele_matcher;
/// Contains definitions related to HLA alleles
pub mod alleles;
/// Anchors indel and soft-clipped reads against candidate amino acid sequences
pub mod anchor;
/// Tunable constants for the evidence run
pub mod config;
/// Contains debug out functionality that is targeted to HLA
pub mod debug;
/// Attributes ambiguous fragments to paralogous genes
pub mod disambiguate;
/// Per-gene storage for the evidence tables
pub mod evidence_cache;
/// Quality filtering, splice repair, and amino acid filtering for each gene
pub mod pipeline;
