
/// the main CLI module
pub mod core;
/// the evidence CLI subcommand for scoring fragments against candidate alleles
pub mod evidence;
