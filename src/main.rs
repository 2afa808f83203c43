
use log::{LevelFilter, error, info};

use hlaevidence::cli::evidence::{EvidenceSettings, check_evidence_settings};
use hlaevidence::cli::core::{Commands, get_cli};
use hlaevidence::data_types::fragment::{Fragment, FragmentRecord};
use hlaevidence::data_types::indel_read::IndelRead;
use hlaevidence::data_types::reference_data::ReferenceData;
use hlaevidence::evidence::{EvidenceResult, comparison_coverage_fragments, run_evidence};
use hlaevidence::hla::config::EvidenceConfig;
use hlaevidence::util::file_io::{load_json, save_json, write_evidence_tsv};

/// Loads a fragment file and converts every record into a fragment
fn load_fragments(filename: &std::path::Path, label: &str) -> Vec<Fragment> {
    info!("Loading {label} from {filename:?}...");
    let records: Vec<FragmentRecord> = match load_json(filename) {
        Ok(r) => r,
        Err(e) => {
            error!("Error while loading {label}: {e}");
            std::process::exit(exitcode::IOERR);
        }
    };
    records.into_iter().map(Fragment::from).collect()
}

/// This will run the "evidence" mode of the tool
/// # Arguments
/// * `settings` - the EvidenceSettings object
fn run_evidence_mode(settings: EvidenceSettings) {
    let filter_level: LevelFilter = match settings.verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace
    };

    // immediately setup logging first
    env_logger::builder()
        .format_timestamp_millis()
        .filter_level(filter_level)
        .init();

    // okay, now we can check all the other settings
    let cli_settings: EvidenceSettings = match check_evidence_settings(settings) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while processing CLI settings: {e}");
            std::process::exit(exitcode::USAGE);
        }
    };

    match rayon::ThreadPoolBuilder::new().num_threads(cli_settings.threads).build_global() {
        Ok(()) => {},
        Err(e) => {
            error!("Error while building thread pool: {e}");
            std::process::exit(exitcode::OSERR);
        }
    };

    info!("Creating output folder at {:?}...", cli_settings.output_folder);
    match std::fs::create_dir_all(&cli_settings.output_folder) {
        Ok(()) => {},
        Err(e) => {
            error!("Error while creating output folder: {e}");
            std::process::exit(exitcode::IOERR);
        }
    };

    let config: EvidenceConfig = if let Some(config_filename) = cli_settings.config_filename.as_ref() {
        match load_json(config_filename) {
            Ok(c) => c,
            Err(e) => {
                error!("Error while loading evidence config: {e}");
                std::process::exit(exitcode::IOERR);
            }
        }
    } else {
        EvidenceConfig::default()
    };
    if let Err(e) = config.validate() {
        error!("Error while validating evidence config: {e}");
        std::process::exit(exitcode::USAGE);
    }
    info!("Evidence config: {config:#?}");

    info!("Loading reference data from {:?}...", cli_settings.reference_filename);
    let reference: ReferenceData = match load_json(&cli_settings.reference_filename) {
        Ok(r) => r,
        Err(e) => {
            error!("Error while loading reference data: {e}");
            std::process::exit(exitcode::IOERR);
        }
    };
    if let Err(e) = reference.validate() {
        error!("Error while validating reference data: {e}");
        std::process::exit(exitcode::IOERR);
    }
    info!("Loaded reference data for {} genes.", reference.genes().len());

    let fragments = load_fragments(&cli_settings.fragments_filename, "fragments");
    let indel_reads: Vec<IndelRead> = if let Some(filename) = cli_settings.indel_reads_filename.as_ref() {
        info!("Loading indel reads from {filename:?}...");
        match load_json(filename) {
            Ok(r) => r,
            Err(e) => {
                error!("Error while loading indel reads: {e}");
                std::process::exit(exitcode::IOERR);
            }
        }
    } else {
        vec![]
    };

    let result: EvidenceResult = match run_evidence(&config, &reference, fragments, &indel_reads) {
        Ok(r) => r,
        Err(e) => {
            error!("Error while building fragment evidence: {e}");
            std::process::exit(exitcode::DATAERR);
        }
    };

    let alleles_filename = cli_settings.output_folder.join("fragment_alleles.json");
    info!("Saving fragment alleles to {alleles_filename:?}");
    if let Err(e) = save_json(&result.fragment_alleles, &alleles_filename) {
        error!("Error while writing fragment alleles to file: {e}");
        std::process::exit(exitcode::IOERR);
    }

    let debug_filename = cli_settings.output_folder.join("qc_debug.json");
    info!("Saving QC report to {debug_filename:?}");
    if let Err(e) = save_json(&result.debug, &debug_filename) {
        error!("Error while writing QC report to file: {e}");
        std::process::exit(exitcode::IOERR);
    }

    for (gene, tables) in result.cache.iter() {
        for (label, table) in [("nucleotide", &tables.nucleotide), ("amino_acid", &tables.amino_acid)] {
            let table_filename = cli_settings.output_folder.join(format!("{gene}.{label}_evidence.tsv"));
            if let Err(e) = write_evidence_tsv(table, &table_filename) {
                error!("Error while writing {gene} {label} evidence to file: {e}");
                std::process::exit(exitcode::IOERR);
            }
        }
    }
    info!("Saved evidence tables for {} genes.", result.cache.len());

    if let Some(filename) = cli_settings.comparison_filename.as_ref() {
        let comparison = load_fragments(filename, "comparison fragments");
        let kept = comparison_coverage_fragments(&config, &reference, &result, comparison);
        let records: Vec<FragmentRecord> = kept.iter().map(FragmentRecord::from).collect();

        let coverage_filename = cli_settings.output_folder.join("comparison_coverage_fragments.json");
        info!("Saving comparison coverage fragments to {coverage_filename:?}");
        if let Err(e) = save_json(&records, &coverage_filename) {
            error!("Error while writing comparison coverage fragments to file: {e}");
            std::process::exit(exitcode::IOERR);
        }
    }
}

fn main() {
    let cli = get_cli();
    match cli.command {
        Commands::Evidence(settings) => {
            run_evidence_mode(*settings);
        }
    }

    info!("Process finished successfully.");
}
