
use clap::Args;
use log::{info, warn};
use simple_error::bail;
use std::path::PathBuf;

use crate::cli::core::{AFTER_HELP, check_optional_filename, check_required_filename};

#[derive(Args, Clone, Default)]
#[clap(author, about,
    after_help = &**AFTER_HELP)]
pub struct EvidenceSettings {
    /// Input reference data file with the candidate alleles (JSON)
    #[clap(required = true)]
    #[clap(short = 'r')]
    #[clap(long = "reference")]
    #[clap(value_name = "JSON")]
    #[clap(help_heading = Some("Input/Output"))]
    pub reference_filename: PathBuf,

    /// Input fragment file for the sample (JSON)
    #[clap(required = true)]
    #[clap(short = 'f')]
    #[clap(long = "fragments")]
    #[clap(value_name = "JSON")]
    #[clap(help_heading = Some("Input/Output"))]
    pub fragments_filename: PathBuf,

    /// Input indel and soft-clipped reads that need anchoring (JSON)
    #[clap(long = "indel-reads")]
    #[clap(value_name = "JSON")]
    #[clap(help_heading = Some("Input/Output"))]
    pub indel_reads_filename: Option<PathBuf>,

    /// Fragments from a second sample to filter against this sample's evidence (JSON)
    #[clap(long = "comparison-fragments")]
    #[clap(value_name = "JSON")]
    #[clap(help_heading = Some("Input/Output"))]
    pub comparison_filename: Option<PathBuf>,

    /// Output folder for the allele matches, evidence tables, and QC report
    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output-folder")]
    #[clap(value_name = "DIR")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_folder: PathBuf,

    /// Optional override of the evidence constants (JSON)
    #[clap(long = "config")]
    #[clap(value_name = "JSON")]
    #[clap(help_heading = Some("Evidence"))]
    pub config_filename: Option<PathBuf>,

    /// Number of threads to use for the per-gene pipelines
    #[clap(short = 't')]
    #[clap(long = "threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    pub threads: usize,

    /// Enable verbose output.
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

/// Checks the evidence settings and logs them
/// # Errors
/// * if the output folder exists but is a file
pub fn check_evidence_settings(mut settings: EvidenceSettings) -> Result<EvidenceSettings, Box<dyn std::error::Error>> {
    info!("Inputs:");

    check_required_filename(&settings.reference_filename, "Reference JSON");
    check_required_filename(&settings.fragments_filename, "Fragments JSON");
    check_optional_filename(settings.indel_reads_filename.as_deref(), "Indel reads JSON");
    check_optional_filename(settings.comparison_filename.as_deref(), "Comparison fragments JSON");
    check_optional_filename(settings.config_filename.as_deref(), "Evidence config JSON");

    info!("\tReference: {:?}", settings.reference_filename);
    info!("\tFragments: {:?}", settings.fragments_filename);
    if let Some(filename) = settings.indel_reads_filename.as_ref() {
        info!("\tIndel reads: {filename:?}");
    } else {
        warn!("\tIndel reads: None provided, indel anchoring is disabled");
    }
    if let Some(filename) = settings.comparison_filename.as_ref() {
        info!("\tComparison fragments: {filename:?}");
    }
    if let Some(filename) = settings.config_filename.as_ref() {
        info!("\tEvidence config: {filename:?}");
    }

    info!("Outputs:");
    if settings.output_folder.is_file() {
        bail!("--output-folder must be a directory: {:?}", settings.output_folder);
    }
    info!("\tOutput folder: {:?}", settings.output_folder);

    if settings.threads == 0 {
        settings.threads = 1;
    }
    info!("Threads: {}", settings.threads);

    Ok(settings)
}
