
use std::collections::BTreeSet;
use std::io::{BufWriter, Write};
use std::fs::File;
use std::path::Path;

use crate::data_types::evidence_table::EvidenceTable;

/// Helper function that loads a file into some type, helpful generic
/// # Arguments
/// * `filename` - the file path to open and parse
/// # Errors
/// * if the file does not open properly
/// * if the deserialization throws errors
pub fn load_json<T: serde::de::DeserializeOwned>(filename: &Path) -> Result<T, Box<dyn std::error::Error>> {
    let fp: Box<dyn std::io::Read> = if filename.extension().unwrap_or_default() == "gz" {
        Box::new(
            flate2::read::MultiGzDecoder::new(
                File::open(filename)?
            )
        )
    } else {
        Box::new(File::open(filename)?)
    };
    let result: T = serde_json::from_reader(fp)?;
    Ok(result)
}

/// This will save a generic serializable struct to JSON.
/// # Arguments
/// * `data` - the data in memory
/// * `out_filename` - user provided path to write to
/// # Errors
/// * if opening or writing to the file throw errors
/// * if JSON serialization throws errors
pub fn save_json<T: serde::Serialize>(data: &T, out_filename: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let file: Box<dyn std::io::Write> = if out_filename.extension().unwrap_or_default() == "gz" {
        Box::new(
            flate2::write::GzEncoder::new(
                File::create(out_filename)?,
                flate2::Compression::best()
            )
        )
    } else {
        Box::new(File::create(out_filename)?)
    };
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, data)?;
    writer.flush()?;
    Ok(())
}

/// Writes an evidence table as a TSV with one row per locus and one column per observed value.
/// Cells hold the raw count for that value, including counts below the table threshold.
/// # Arguments
/// * `table` - the evidence to write
/// * `filename` - location to save the TSV to
/// # Errors
/// * if the file cannot be created or written
pub fn write_evidence_tsv(table: &EvidenceTable, filename: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut csv_writer: csv::Writer<File> = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(filename)?;

    // every value seen anywhere gets a column
    let observed: BTreeSet<u8> = table.loci()
        .filter_map(|l| table.values(l))
        .flat_map(|counts| counts.keys().copied())
        .collect();

    let mut header: Vec<String> = vec!["locus".to_string(), "depth".to_string()];
    header.extend(observed.iter().map(|&v| (v as char).to_string()));
    csv_writer.write_record(&header)?;

    for locus in table.loci() {
        let mut row: Vec<String> = vec![locus.to_string(), table.depth(locus).to_string()];
        row.extend(observed.iter().map(|&v| table.count(locus, v).to_string()));
        csv_writer.write_record(&row)?;
    }
    csv_writer.flush()?;
    Ok(())
}
