
/// Contains all the CLI related functionality
pub mod cli;
/// Contains any specialized data types that are shared across the tooling
pub mod data_types;
/// Contains the top-level run that turns fragments into scored allele evidence
pub mod evidence;
/// Contains the specialized functionality for HLA evidence and allele matching
pub mod hla;
/// Contains generic utilities that are handy wrappers
pub mod util;
