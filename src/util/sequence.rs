
/// Placeholder residue for any codon that cannot be translated (ambiguous bases or stop codons)
pub const UNKNOWN_AMINO_ACID: u8 = b'X';

/// Standard genetic code, indexed by the base-4 encoding of the codon (A=0, C=1, G=2, T=3).
/// Stop codons are reported as the unknown residue so they never collide with reference wildcards.
const GENETIC_CODE: [u8; 64] = [
    b'K', b'N', b'K', b'N', // AAx
    b'T', b'T', b'T', b'T', // ACx
    b'R', b'S', b'R', b'S', // AGx
    b'I', b'I', b'M', b'I', // ATx
    b'Q', b'H', b'Q', b'H', // CAx
    b'P', b'P', b'P', b'P', // CCx
    b'R', b'R', b'R', b'R', // CGx
    b'L', b'L', b'L', b'L', // CTx
    b'E', b'D', b'E', b'D', // GAx
    b'A', b'A', b'A', b'A', // GCx
    b'G', b'G', b'G', b'G', // GGx
    b'V', b'V', b'V', b'V', // GTx
    b'X', b'Y', b'X', b'Y', // TAx
    b'S', b'S', b'S', b'S', // TCx
    b'X', b'C', b'W', b'C', // TGx
    b'L', b'F', b'L', b'F', // TTx
];

/// Translates a single codon into the single-letter amino acid code.
/// Anything that is not exactly three unambiguous bases becomes `UNKNOWN_AMINO_ACID`.
/// # Arguments
/// * `codon` - the three bases to translate
pub fn translate_codon(codon: &[u8]) -> u8 {
    if codon.len() != 3 {
        return UNKNOWN_AMINO_ACID;
    }

    let mut index: usize = 0;
    for c in codon.iter() {
        let v = match c {
            b'A' | b'a' => 0,
            b'C' | b'c' => 1,
            b'G' | b'g' => 2,
            b'T' | b't' | b'U' | b'u' => 3,
            _ => return UNKNOWN_AMINO_ACID
        };
        index = (index << 2) + v;
    }
    GENETIC_CODE[index]
}

/// Translates a coding sequence in frame, any trailing partial codon is ignored.
/// # Arguments
/// * `sequence` - the coding bases, assumed to start on a codon boundary
pub fn translate_sequence(sequence: &[u8]) -> Vec<u8> {
    sequence.chunks_exact(3)
        .map(translate_codon)
        .collect()
}

/// Returns true if the value is one of the four concrete DNA bases
pub fn is_concrete_base(base: u8) -> bool {
    matches!(base, b'A' | b'C' | b'G' | b'T')
}
