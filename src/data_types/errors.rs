/// Errors that can be produced while validating a fragment, these result in the fragment being excluded
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum FragmentError {
    #[error("fragment has no candidate genes")]
    NoGenes,
    #[error("fragment has {count} candidate genes, maximum is {max}")]
    TooManyGenes { count: usize, max: usize },
    #[error("nucleotide arrays differ in length: {loci} loci, {bases} bases, {qualities} qualities")]
    LengthMismatch { loci: usize, bases: usize, qualities: usize },
    #[error("nucleotide loci are not strictly increasing at index {index}")]
    UnsortedLoci { index: usize },
    #[error("amino acids were built but none were found")]
    EmptyAminoAcids,
    #[error("amino acids were built {count} times")]
    RepeatedAminoAcidBuild { count: usize }
}
