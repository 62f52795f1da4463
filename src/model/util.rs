//! Shared plumbing for the model module: delimiter detection, row counting,
//! the staging-table bulk load, and CSV validation error reporting.

use log::{debug, error, warn};
use std::fmt;
use std::{error::Error, path::PathBuf};

/// A validation problem found while checking a data file before import.
#[derive(Debug)]
pub struct ValidationError {
    message: String,
    fields: Vec<String>,
}

impl ValidationError {
    pub fn new(message: &str, fields: Vec<String>) -> Self {
        ValidationError {
            message: message.to_string(),
            fields,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fields.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{} [fields: {}]", self.message, self.fields.join(", "))
        }
    }
}

impl Error for ValidationError {}

pub fn get_delimiter(filepath: &PathBuf) -> Result<u8, Box<dyn Error>> {
    let suffix = match filepath.extension() {
        Some(suffix) => suffix.to_str().unwrap(),
        None => return Err("File has no extension".into()),
    };

    if suffix == "csv" {
        Ok(b',')
    } else if suffix == "tsv" {
        Ok(b'\t')
    } else {
        Err(format!("Unsupported file type: {}", suffix).into())
    }
}

/// Clear all rows of a table, if the table exists.
pub async fn drop_table(pool: &sqlx::PgPool, table: &str) {
    debug!("Clearing table {}...", table);
    sqlx::query(&format!(
        "
        DO $$ BEGIN
        IF EXISTS (SELECT FROM information_schema.tables
                    WHERE  table_schema = 'public'
                    AND    table_name   = '{}')
        THEN
            DELETE FROM {};
        END IF;
        END $$;
        ",
        table, table
    ))
    .execute(pool)
    .await
    .unwrap();
}

pub async fn count_rows(pool: &sqlx::PgPool, table: &str) -> Result<i64, anyhow::Error> {
    let total = sqlx::query_as::<_, (i64,)>(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await?;

    Ok(total.0)
}

/// Bulk-load a clean delimited file into a table through a staging table, so
/// rows already present (by the table's unique columns) are left alone.
pub async fn import_file_in_loop(
    pool: &sqlx::PgPool,
    filepath: &PathBuf,
    table_name: &str,
    expected_columns: &Vec<String>,
    unique_columns: &Vec<String>,
    delimiter: u8,
) -> Result<(), Box<dyn Error>> {
    match sqlx::query("DROP TABLE IF EXISTS ctd_staging")
        .execute(pool)
        .await
    {
        Ok(_) => {}
        Err(_) => {}
    }

    let mut tx = pool.begin().await?;
    sqlx::query(&format!(
        "CREATE TEMPORARY TABLE ctd_staging (LIKE {} INCLUDING DEFAULTS)",
        table_name
    ))
    .execute(&mut tx)
    .await?;

    let columns = expected_columns.join(",");
    let query_str = format!(
        "COPY ctd_staging ({}) FROM '{}' DELIMITER E'{}' CSV HEADER",
        columns,
        filepath.display(),
        delimiter as char
    );

    debug!("Importing query string: {}", query_str);

    sqlx::query(&query_str).execute(&mut tx).await?;

    let where_clause = unique_columns
        .iter()
        .map(|c| format!("{}.{} = ctd_staging.{}", table_name, c, c))
        .collect::<Vec<String>>()
        .join(" AND ");

    sqlx::query(&format!(
        "INSERT INTO {} ({})
         SELECT {} FROM ctd_staging
         WHERE NOT EXISTS (SELECT 1 FROM {} WHERE {})
         ON CONFLICT DO NOTHING",
        table_name, columns, columns, table_name, where_clause
    ))
    .execute(&mut tx)
    .await?;

    tx.commit().await?;

    match sqlx::query("DROP TABLE IF EXISTS ctd_staging")
        .execute(pool)
        .await
    {
        Ok(_) => {}
        Err(_) => {}
    };

    Ok(())
}

pub fn parse_csv_error(e: &csv::Error) -> String {
    match *e.kind() {
        csv::ErrorKind::Deserialize {
            pos: Some(ref pos),
            ref err,
            ..
        } => {
            format!(
                "Failed to deserialize the data, line: {}, column: {}, details: ({})",
                pos.line(),
                pos.record() + 1,
                err.kind()
            )
        }
        _ => {
            format!("Failed to parse CSV: ({})", e)
        }
    }
}

pub fn show_errors(errors: &Vec<Box<dyn std::error::Error>>, show_all_errors: bool) {
    if !show_all_errors {
        let total = errors.len();
        let num = if total > 3 { 3 } else { total };
        warn!("Found {} errors, only show the {} validation errors, if you want to see all errors, use --show-all-errors.", total, num);
        for e in errors.iter().take(3) {
            error!("{}", e);
        }

        if total == num {
            return;
        } else {
            warn!("Hide {} validation errors.", errors.len() - num);
        }
    } else {
        for e in errors {
            error!("{}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_delimiter() {
        assert_eq!(get_delimiter(&PathBuf::from("chemical.tsv")).unwrap(), b'\t');
        assert_eq!(get_delimiter(&PathBuf::from("chemical.csv")).unwrap(), b',');
        assert!(get_delimiter(&PathBuf::from("chemical.gz")).is_err());
        assert!(get_delimiter(&PathBuf::from("chemical")).is_err());
    }

    #[test]
    fn test_validation_error_display() {
        let plain = ValidationError::new("bad row", vec![]);
        assert_eq!(plain.to_string(), "bad row");

        let with_fields = ValidationError::new(
            "bad row",
            vec!["chemical_id".to_string(), "cas_rn".to_string()],
        );
        assert_eq!(
            with_fields.to_string(),
            "bad row [fields: chemical_id, cas_rn]"
        );
    }
}
