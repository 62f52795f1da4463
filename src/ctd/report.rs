//! Turn a raw CTD report into a clean TSV ready for COPY.
//!
//! Raw reports are gzipped TSV with a `#` comment preamble and no header
//! row. The extractor streams the file (the interaction reports are
//! multi-gigabyte), skips comments, pads ragged rows, applies the
//! registry's identifier normalization, and emits a header row of database
//! column names.

use crate::ctd::registry::TableConfig;
use anyhow::{bail, Context};
use flate2::read::GzDecoder;
use itertools::Itertools;
use log::debug;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

/// Extract one report. Returns the number of data rows written.
pub fn extract_table(
    gz_path: &PathBuf,
    out_path: &PathBuf,
    config: &TableConfig,
) -> Result<u64, anyhow::Error> {
    debug!(
        "Extracting {} into {}...",
        gz_path.display(),
        out_path.display()
    );

    let file = File::open(gz_path)
        .with_context(|| format!("Failed to open {}", gz_path.display()))?;
    let reader = BufReader::new(GzDecoder::new(file));

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(out_path)
        .with_context(|| format!("Failed to create {}", out_path.display()))?;

    writer.write_record(config.columns.iter().map(|c| c.name))?;

    let expected = config.columns.len();
    let mut rows: u64 = 0;
    let mut line_number: u64 = 0;

    for line in reader.lines() {
        let line = line.with_context(|| format!("Failed to read {}", gz_path.display()))?;
        line_number += 1;

        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut values = line.split('\t').collect::<Vec<&str>>();
        if values.len() > expected {
            bail!(
                "{} line {}: {} fields, expected at most {} ({})",
                gz_path.display(),
                line_number,
                values.len(),
                expected,
                config.columns.iter().map(|c| c.field).join(", ")
            );
        }
        // Trailing empty fields are routinely dropped by the upstream export.
        values.resize(expected, "");

        let record = config
            .columns
            .iter()
            .zip(values)
            .map(|(column, value)| match column.strip_prefix {
                Some(prefix) => value.strip_prefix(prefix).unwrap_or(value),
                None => value,
            })
            .collect::<Vec<&str>>();

        writer.write_record(&record)?;
        rows += 1;
    }

    writer.flush()?;
    debug!("Extracted {} rows from {}.", rows, gz_path.display());

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctd::registry;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn write_gz(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let file = File::create(&path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(content.as_bytes()).unwrap();
        encoder.finish().unwrap();
        path
    }

    const CHEMICALS_REPORT: &str = "\
# CTD_chemicals.tsv.gz
#
# Fields:
# ChemicalName\tChemicalID\tCasRN\tDefinition\tParentIDs\tTreeNumbers\tParentTreeNumbers\tSynonyms
#
Gefitinib\tMESH:D000077156\t184475-35-2\tA quinazoline derivative.\tD011799\tD03.633.100\tD03.633\tIressa|ZD1839
Benzene\tMESH:D001554\t71-43-2
";

    #[test]
    fn test_extract_strips_comments_and_prefixes_and_pads() {
        let dir = tempfile::tempdir().unwrap();
        let gz_path = write_gz(&dir, "CTD_chemicals.tsv.gz", CHEMICALS_REPORT);
        let out_path = dir.path().join("chemical.tsv");

        let config = registry::get("chemical").unwrap();
        let rows = extract_table(&gz_path, &out_path, config).unwrap();
        assert_eq!(rows, 2);

        let content = std::fs::read_to_string(&out_path).unwrap();
        let lines = content.lines().collect::<Vec<&str>>();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "chemical_name\tchemical_id\tcas_rn\tdefinition\tparent_ids\ttree_numbers\tparent_tree_numbers\tsynonyms"
        );
        // The MESH: prefix is stripped and the short row is padded out.
        assert!(lines[1].starts_with("Gefitinib\tD000077156\t184475-35-2"));
        assert_eq!(lines[2], "Benzene\tD001554\t71-43-2\t\t\t\t\t");
    }

    #[test]
    fn test_extract_rejects_overlong_rows() {
        let dir = tempfile::tempdir().unwrap();
        let gz_path = write_gz(
            &dir,
            "CTD_pathways.tsv.gz",
            "# preamble\nGlycolysis\tKEGG:hsa00010\tunexpected\n",
        );
        let out_path = dir.path().join("pathway.tsv");

        let config = registry::get("pathway").unwrap();
        let err = extract_table(&gz_path, &out_path, config).unwrap_err();
        assert!(err.to_string().contains("3 fields"));
        assert!(err.to_string().contains("PathwayName"));
    }

    #[test]
    fn test_extract_output_validates_and_deserializes() {
        use crate::model::core::{CheckData, Chemical};

        let dir = tempfile::tempdir().unwrap();
        let gz_path = write_gz(&dir, "CTD_chemicals.tsv.gz", CHEMICALS_REPORT);
        let out_path = dir.path().join("chemical.tsv");

        let config = registry::get("chemical").unwrap();
        extract_table(&gz_path, &out_path, config).unwrap();

        let errors = Chemical::check_csv_is_valid(&out_path);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);

        let records: Vec<Chemical> = Chemical::get_records(&out_path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].chemical_id, "D000077156");
        assert_eq!(records[0].synonyms.as_deref(), Some("Iressa|ZD1839"));
        assert_eq!(records[1].definition, None);
    }
}
