//! The database schema for the application. One record struct per CTD table,
//! each doubling as the CSV row type for the clean report files and as the
//! sqlx row type for queries.

use super::util::{get_delimiter, parse_csv_error, ValidationError};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use log::{debug, info};
use poem_openapi::Object;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{error::Error, option::Option, path::PathBuf};
use validator::Validate;

pub const DEFAULT_MAX_LENGTH: u64 = 64;
pub const DEFAULT_MIN_LENGTH: u64 = 1;

lazy_static! {
    // Chemical identifiers are bare MeSH accessions, e.g. "D015738" or "C112297".
    pub static ref CHEMICAL_ID_REGEX: Regex = Regex::new(r"^[CD][0-9]+$").unwrap();
    // Gene identifiers are Entrez Gene ids, e.g. "1017".
    pub static ref GENE_ID_REGEX: Regex = Regex::new(r"^[0-9]+$").unwrap();
    // Disease identifiers keep their namespace, e.g. "MESH:D003920" or "OMIM:125853".
    pub static ref DISEASE_ID_REGEX: Regex = Regex::new(r"^(MESH|OMIM):[A-Za-z0-9\.]+$").unwrap();
    // Pathway identifiers, e.g. "KEGG:hsa00010" or "REACT:R-HSA-109582".
    pub static ref PATHWAY_ID_REGEX: Regex = Regex::new(r"^(KEGG|REACT):[A-Za-z0-9\-\.]+$").unwrap();
    // Interaction type codes, e.g. "exp", "act", "w".
    pub static ref ACTION_CODE_REGEX: Regex = Regex::new(r"^[a-z]+$").unwrap();
    pub static ref TAXONOMY_ID_REGEX: Regex = Regex::new(r"^[0-9]+$").unwrap();
}

/// Accept a chemical identifier with or without its "MESH:" prefix and return
/// the bare accession, which is what the tables store.
pub fn normalize_chemical_id(chemical_id: &str) -> &str {
    chemical_id.strip_prefix("MESH:").unwrap_or(chemical_id)
}

pub trait CheckData {
    fn check_csv_is_valid(filepath: &PathBuf) -> Vec<Box<dyn Error>>;

    // Implement the check function
    fn check_csv_is_valid_default<
        S: for<'de> serde::Deserialize<'de> + Validate + std::fmt::Debug,
    >(
        filepath: &PathBuf,
    ) -> Vec<Box<dyn Error>> {
        info!("Start to check the csv file: {:?}", filepath);
        let mut validation_errors: Vec<Box<dyn Error>> = vec![];
        let delimiter = match get_delimiter(filepath) {
            Ok(d) => d,
            Err(e) => {
                validation_errors.push(Box::new(ValidationError::new(
                    &format!("Failed to get delimiter: ({})", e),
                    vec![],
                )));
                return validation_errors;
            }
        };

        let mut reader = match csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .from_path(filepath)
        {
            Ok(r) => r,
            Err(e) => {
                validation_errors.push(Box::new(ValidationError::new(
                    &format!("Failed to read CSV: ({})", e),
                    vec![],
                )));
                return validation_errors;
            }
        };

        debug!(
            "Start to deserialize the csv file, real columns: {:?}, expected columns: {:?}",
            reader.headers().unwrap().into_iter().collect::<Vec<_>>(),
            Self::fields()
        );
        let mut line_number = 1;
        for result in reader.deserialize::<S>() {
            line_number += 1;

            match result {
                Ok(data) => match data.validate() {
                    Ok(_) => {
                        continue;
                    }
                    Err(e) => {
                        validation_errors.push(Box::new(ValidationError::new(
                            &format!(
                                "Failed to validate the data, line: {}, details: ({})",
                                line_number, e
                            ),
                            vec![],
                        )));
                        continue;
                    }
                },
                Err(e) => {
                    let error_msg = parse_csv_error(&e);

                    validation_errors.push(Box::new(ValidationError::new(&error_msg, vec![])));

                    continue;
                }
            };
        }

        validation_errors
    }

    /// The database columns the clean file carries, in file order.
    fn fields() -> Vec<String>;

    /// The columns that identify a row for deduplication on import.
    fn unique_fields() -> Vec<String>;

    fn get_column_names(filepath: &PathBuf) -> Result<Vec<String>, Box<dyn Error>> {
        let delimiter = get_delimiter(filepath)?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .from_path(filepath)?;

        let headers = reader.headers()?;
        let mut column_names = Vec::new();
        let expected_columns = Self::fields();
        for header in headers {
            let column = header.to_string();
            if expected_columns.contains(&column) {
                column_names.push(column);
            } else {
                continue;
            }
        }

        Ok(column_names)
    }

    fn get_records<S: for<'de> serde::Deserialize<'de> + Validate + std::fmt::Debug>(
        filepath: &PathBuf,
    ) -> Result<Vec<S>, Box<dyn Error>> {
        debug!("Start to get records from the csv file: {:?}", filepath);
        let delimiter = get_delimiter(filepath)?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .from_path(filepath)?;

        let mut records = Vec::new();
        for result in reader.deserialize::<S>() {
            let record: S = result?;
            records.push(record);
        }

        debug!("Get {} records successfully.", records.len());

        Ok(records)
    }
}

/// A page of records from one table, for the HTTP API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Object)]
pub struct RecordResponse<S>
where
    S: Serialize
        + for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow>
        + std::fmt::Debug
        + std::marker::Unpin
        + Send
        + Sync
        + poem_openapi::types::Type
        + poem_openapi::types::ParseFromJSON
        + poem_openapi::types::ToJSON,
{
    /// data
    pub records: Vec<S>,
    /// total num
    pub total: u64,
    /// current page index
    pub page: u64,
    /// default 10
    pub page_size: u64,
}

impl<
        S: Serialize
            + for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow>
            + std::fmt::Debug
            + std::marker::Unpin
            + Send
            + Sync
            + poem_openapi::types::Type
            + poem_openapi::types::ParseFromJSON
            + poem_openapi::types::ToJSON,
    > RecordResponse<S>
{
    pub async fn get_records(
        pool: &sqlx::PgPool,
        table_name: &str,
        page: Option<u64>,
        page_size: Option<u64>,
        order_by: Option<&str>,
    ) -> Result<RecordResponse<S>, anyhow::Error> {
        let order_by_str = if order_by.is_none() {
            "".to_string()
        } else {
            format!("ORDER BY {}", order_by.unwrap())
        };

        let page = match page {
            Some(page) => page,
            None => 1,
        };

        let page_size = match page_size {
            Some(page_size) => page_size,
            None => 10,
        };

        let limit = page_size;
        let offset = (page - 1) * page_size;

        let sql_str = format!(
            "SELECT * FROM {} {} LIMIT {} OFFSET {}",
            table_name, order_by_str, limit, offset
        );

        let records = sqlx::query_as::<_, S>(sql_str.as_str())
            .fetch_all(pool)
            .await?;

        let sql_str = format!("SELECT COUNT(*) FROM {}", table_name);

        let total = sqlx::query_as::<_, (i64,)>(sql_str.as_str())
            .fetch_one(pool)
            .await?;

        Ok(RecordResponse {
            records,
            total: total.0 as u64,
            page,
            page_size,
        })
    }
}

/// A chemical from the CTD chemical vocabulary (MeSH subset).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Object, sqlx::FromRow, Validate)]
pub struct Chemical {
    // Ignore this field when deserialize from csv
    #[serde(skip_deserializing)]
    #[oai(read_only)]
    pub id: i64,

    pub chemical_name: String,

    #[validate(length(
        max = "DEFAULT_MAX_LENGTH",
        min = "DEFAULT_MIN_LENGTH",
        message = "The length of chemical_id should be between 1 and 64."
    ))]
    #[validate(regex(
        path = "CHEMICAL_ID_REGEX",
        message = "The chemical id is invalid. It should be a bare MeSH accession such as 'D015738'."
    ))]
    pub chemical_id: String,

    #[oai(skip_serializing_if_is_none)]
    pub cas_rn: Option<String>,

    #[oai(skip_serializing_if_is_none)]
    pub definition: Option<String>,

    #[oai(skip_serializing_if_is_none)]
    pub parent_ids: Option<String>,

    #[oai(skip_serializing_if_is_none)]
    pub tree_numbers: Option<String>,

    #[oai(skip_serializing_if_is_none)]
    pub parent_tree_numbers: Option<String>,

    #[oai(skip_serializing_if_is_none)]
    pub synonyms: Option<String>,
}

impl CheckData for Chemical {
    fn check_csv_is_valid(filepath: &PathBuf) -> Vec<Box<dyn Error>> {
        Self::check_csv_is_valid_default::<Chemical>(filepath)
    }

    fn unique_fields() -> Vec<String> {
        vec!["chemical_id".to_string()]
    }

    fn fields() -> Vec<String> {
        vec![
            "chemical_name".to_string(),
            "chemical_id".to_string(),
            "cas_rn".to_string(),
            "definition".to_string(),
            "parent_ids".to_string(),
            "tree_numbers".to_string(),
            "parent_tree_numbers".to_string(),
            "synonyms".to_string(),
        ]
    }
}

impl Chemical {
    /// Look up a chemical by MeSH identifier, with or without the "MESH:" prefix.
    pub async fn get_by_mesh(
        pool: &sqlx::PgPool,
        mesh_id: &str,
    ) -> Result<Option<Chemical>, anyhow::Error> {
        let chemical = sqlx::query_as::<_, Chemical>(
            "SELECT * FROM ctd_chemical WHERE chemical_id = $1",
        )
        .bind(normalize_chemical_id(mesh_id))
        .fetch_optional(pool)
        .await?;

        Ok(chemical)
    }

    pub async fn get_by_cas(
        pool: &sqlx::PgPool,
        cas_rn: &str,
    ) -> Result<Option<Chemical>, anyhow::Error> {
        let chemical =
            sqlx::query_as::<_, Chemical>("SELECT * FROM ctd_chemical WHERE cas_rn = $1")
                .bind(cas_rn)
                .fetch_optional(pool)
                .await?;

        Ok(chemical)
    }

    pub async fn list(
        pool: &sqlx::PgPool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Chemical>, anyhow::Error> {
        let chemicals = sqlx::query_as::<_, Chemical>(
            "SELECT * FROM ctd_chemical ORDER BY chemical_id LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(chemicals)
    }
}

/// A gene from the CTD gene vocabulary (Entrez).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Object, sqlx::FromRow, Validate)]
pub struct Gene {
    #[serde(skip_deserializing)]
    #[oai(read_only)]
    pub id: i64,

    pub gene_symbol: String,

    #[oai(skip_serializing_if_is_none)]
    pub gene_name: Option<String>,

    #[validate(length(
        max = "DEFAULT_MAX_LENGTH",
        min = "DEFAULT_MIN_LENGTH",
        message = "The length of gene_id should be between 1 and 64."
    ))]
    #[validate(regex(
        path = "GENE_ID_REGEX",
        message = "The gene id is invalid. It should be an Entrez Gene identifier such as '1017'."
    ))]
    pub gene_id: String,

    #[oai(skip_serializing_if_is_none)]
    pub alt_gene_ids: Option<String>,

    #[oai(skip_serializing_if_is_none)]
    pub synonyms: Option<String>,

    #[oai(skip_serializing_if_is_none)]
    pub biogrid_ids: Option<String>,

    #[oai(skip_serializing_if_is_none)]
    pub pharmgkb_ids: Option<String>,

    #[oai(skip_serializing_if_is_none)]
    pub uniprot_ids: Option<String>,
}

impl CheckData for Gene {
    fn check_csv_is_valid(filepath: &PathBuf) -> Vec<Box<dyn Error>> {
        Self::check_csv_is_valid_default::<Gene>(filepath)
    }

    fn unique_fields() -> Vec<String> {
        vec!["gene_id".to_string()]
    }

    fn fields() -> Vec<String> {
        vec![
            "gene_symbol".to_string(),
            "gene_name".to_string(),
            "gene_id".to_string(),
            "alt_gene_ids".to_string(),
            "synonyms".to_string(),
            "biogrid_ids".to_string(),
            "pharmgkb_ids".to_string(),
            "uniprot_ids".to_string(),
        ]
    }
}

impl Gene {
    pub async fn get_by_entrez_id(
        pool: &sqlx::PgPool,
        entrez_id: &str,
    ) -> Result<Option<Gene>, anyhow::Error> {
        let gene = sqlx::query_as::<_, Gene>("SELECT * FROM ctd_gene WHERE gene_id = $1")
            .bind(entrez_id)
            .fetch_optional(pool)
            .await?;

        Ok(gene)
    }

    pub async fn list(
        pool: &sqlx::PgPool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Gene>, anyhow::Error> {
        let genes = sqlx::query_as::<_, Gene>(
            "SELECT * FROM ctd_gene ORDER BY gene_symbol LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(genes)
    }
}

/// A disease from the CTD disease vocabulary (MEDIC: MeSH plus OMIM).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Object, sqlx::FromRow, Validate)]
pub struct Disease {
    #[serde(skip_deserializing)]
    #[oai(read_only)]
    pub id: i64,

    pub disease_name: String,

    #[validate(length(
        max = "DEFAULT_MAX_LENGTH",
        min = "DEFAULT_MIN_LENGTH",
        message = "The length of disease_id should be between 1 and 64."
    ))]
    #[validate(regex(
        path = "DISEASE_ID_REGEX",
        message = "The disease id is invalid. It should keep its namespace, such as 'MESH:D003920' or 'OMIM:125853'."
    ))]
    pub disease_id: String,

    #[oai(skip_serializing_if_is_none)]
    pub alt_disease_ids: Option<String>,

    #[oai(skip_serializing_if_is_none)]
    pub definition: Option<String>,

    #[oai(skip_serializing_if_is_none)]
    pub parent_ids: Option<String>,

    #[oai(skip_serializing_if_is_none)]
    pub tree_numbers: Option<String>,

    #[oai(skip_serializing_if_is_none)]
    pub parent_tree_numbers: Option<String>,

    #[oai(skip_serializing_if_is_none)]
    pub synonyms: Option<String>,

    #[oai(skip_serializing_if_is_none)]
    pub slim_mappings: Option<String>,
}

impl CheckData for Disease {
    fn check_csv_is_valid(filepath: &PathBuf) -> Vec<Box<dyn Error>> {
        Self::check_csv_is_valid_default::<Disease>(filepath)
    }

    fn unique_fields() -> Vec<String> {
        vec!["disease_id".to_string()]
    }

    fn fields() -> Vec<String> {
        vec![
            "disease_name".to_string(),
            "disease_id".to_string(),
            "alt_disease_ids".to_string(),
            "definition".to_string(),
            "parent_ids".to_string(),
            "tree_numbers".to_string(),
            "parent_tree_numbers".to_string(),
            "synonyms".to_string(),
            "slim_mappings".to_string(),
        ]
    }
}

impl Disease {
    pub async fn get_by_id(
        pool: &sqlx::PgPool,
        disease_id: &str,
    ) -> Result<Option<Disease>, anyhow::Error> {
        let disease =
            sqlx::query_as::<_, Disease>("SELECT * FROM ctd_disease WHERE disease_id = $1")
                .bind(disease_id)
                .fetch_optional(pool)
                .await?;

        Ok(disease)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Object, sqlx::FromRow, Validate)]
pub struct Pathway {
    #[serde(skip_deserializing)]
    #[oai(read_only)]
    pub id: i64,

    pub pathway_name: String,

    #[validate(regex(
        path = "PATHWAY_ID_REGEX",
        message = "The pathway id is invalid. It should be a KEGG or Reactome identifier, such as 'KEGG:hsa00010'."
    ))]
    pub pathway_id: String,
}

impl CheckData for Pathway {
    fn check_csv_is_valid(filepath: &PathBuf) -> Vec<Box<dyn Error>> {
        Self::check_csv_is_valid_default::<Pathway>(filepath)
    }

    fn unique_fields() -> Vec<String> {
        vec!["pathway_id".to_string()]
    }

    fn fields() -> Vec<String> {
        vec!["pathway_name".to_string(), "pathway_id".to_string()]
    }
}

/// A chemical-gene interaction type from the CTD action vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Object, sqlx::FromRow, Validate)]
pub struct Action {
    #[serde(skip_deserializing)]
    #[oai(read_only)]
    pub id: i64,

    pub type_name: String,

    #[validate(regex(
        path = "ACTION_CODE_REGEX",
        message = "The action code is invalid. It should be a short lowercase code such as 'exp'."
    ))]
    pub code: String,

    #[oai(skip_serializing_if_is_none)]
    pub description: Option<String>,

    #[oai(skip_serializing_if_is_none)]
    pub parent_code: Option<String>,
}

impl CheckData for Action {
    fn check_csv_is_valid(filepath: &PathBuf) -> Vec<Box<dyn Error>> {
        Self::check_csv_is_valid_default::<Action>(filepath)
    }

    fn unique_fields() -> Vec<String> {
        vec!["code".to_string()]
    }

    fn fields() -> Vec<String> {
        vec![
            "type_name".to_string(),
            "code".to_string(),
            "description".to_string(),
            "parent_code".to_string(),
        ]
    }
}

/// A curated or inferred chemical-gene interaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Object, sqlx::FromRow, Validate)]
pub struct ChemGeneIxn {
    #[serde(skip_deserializing)]
    #[oai(read_only)]
    pub id: i64,

    pub chemical_name: String,

    #[validate(regex(path = "CHEMICAL_ID_REGEX"))]
    pub chemical_id: String,

    #[oai(skip_serializing_if_is_none)]
    pub cas_rn: Option<String>,

    pub gene_symbol: String,

    #[validate(regex(path = "GENE_ID_REGEX"))]
    pub gene_id: String,

    #[oai(skip_serializing_if_is_none)]
    pub gene_forms: Option<String>,

    #[oai(skip_serializing_if_is_none)]
    pub organism: Option<String>,

    #[oai(skip_serializing_if_is_none)]
    #[validate(regex(path = "TAXONOMY_ID_REGEX"))]
    pub organism_id: Option<String>,

    pub interaction: String,

    #[oai(skip_serializing_if_is_none)]
    pub interaction_actions: Option<String>,

    #[oai(skip_serializing_if_is_none)]
    pub pmids: Option<String>,
}

impl CheckData for ChemGeneIxn {
    fn check_csv_is_valid(filepath: &PathBuf) -> Vec<Box<dyn Error>> {
        Self::check_csv_is_valid_default::<ChemGeneIxn>(filepath)
    }

    fn unique_fields() -> Vec<String> {
        vec![
            "chemical_id".to_string(),
            "gene_id".to_string(),
            "organism_id".to_string(),
            "interaction".to_string(),
        ]
    }

    fn fields() -> Vec<String> {
        vec![
            "chemical_name".to_string(),
            "chemical_id".to_string(),
            "cas_rn".to_string(),
            "gene_symbol".to_string(),
            "gene_id".to_string(),
            "gene_forms".to_string(),
            "organism".to_string(),
            "organism_id".to_string(),
            "interaction".to_string(),
            "interaction_actions".to_string(),
            "pmids".to_string(),
        ]
    }
}

impl ChemGeneIxn {
    pub async fn get_by_id(
        pool: &sqlx::PgPool,
        ixn_id: i64,
    ) -> Result<Option<ChemGeneIxn>, anyhow::Error> {
        let ixn = sqlx::query_as::<_, ChemGeneIxn>("SELECT * FROM ctd_chem_gene_ixn WHERE id = $1")
            .bind(ixn_id)
            .fetch_optional(pool)
            .await?;

        Ok(ixn)
    }

    /// All interactions a chemical participates in. The id may carry a
    /// "MESH:" prefix.
    pub async fn for_chemical(
        pool: &sqlx::PgPool,
        chemical_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<ChemGeneIxn>, anyhow::Error> {
        let sql_str = match limit {
            Some(limit) => format!(
                "SELECT * FROM ctd_chem_gene_ixn WHERE chemical_id = $1 ORDER BY id LIMIT {}",
                limit
            ),
            None => "SELECT * FROM ctd_chem_gene_ixn WHERE chemical_id = $1 ORDER BY id"
                .to_string(),
        };

        let ixns = sqlx::query_as::<_, ChemGeneIxn>(&sql_str)
            .bind(normalize_chemical_id(chemical_id))
            .fetch_all(pool)
            .await?;

        Ok(ixns)
    }

    pub async fn for_gene(
        pool: &sqlx::PgPool,
        gene_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<ChemGeneIxn>, anyhow::Error> {
        let sql_str = match limit {
            Some(limit) => format!(
                "SELECT * FROM ctd_chem_gene_ixn WHERE gene_id = $1 ORDER BY id LIMIT {}",
                limit
            ),
            None => "SELECT * FROM ctd_chem_gene_ixn WHERE gene_id = $1 ORDER BY id".to_string(),
        };

        let ixns = sqlx::query_as::<_, ChemGeneIxn>(&sql_str)
            .bind(gene_id)
            .fetch_all(pool)
            .await?;

        Ok(ixns)
    }
}

/// A curated or inferred chemical-disease association.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Object, sqlx::FromRow, Validate)]
pub struct ChemicalDisease {
    #[serde(skip_deserializing)]
    #[oai(read_only)]
    pub id: i64,

    pub chemical_name: String,

    #[validate(regex(path = "CHEMICAL_ID_REGEX"))]
    pub chemical_id: String,

    #[oai(skip_serializing_if_is_none)]
    pub cas_rn: Option<String>,

    pub disease_name: String,

    #[validate(regex(path = "DISEASE_ID_REGEX"))]
    pub disease_id: String,

    #[oai(skip_serializing_if_is_none)]
    pub direct_evidence: Option<String>,

    #[oai(skip_serializing_if_is_none)]
    pub inference_gene_symbol: Option<String>,

    #[oai(skip_serializing_if_is_none)]
    pub inference_score: Option<f64>,

    #[oai(skip_serializing_if_is_none)]
    pub omim_ids: Option<String>,

    #[oai(skip_serializing_if_is_none)]
    pub pmids: Option<String>,
}

impl CheckData for ChemicalDisease {
    fn check_csv_is_valid(filepath: &PathBuf) -> Vec<Box<dyn Error>> {
        Self::check_csv_is_valid_default::<ChemicalDisease>(filepath)
    }

    fn unique_fields() -> Vec<String> {
        vec![
            "chemical_id".to_string(),
            "disease_id".to_string(),
            "direct_evidence".to_string(),
            "inference_gene_symbol".to_string(),
        ]
    }

    fn fields() -> Vec<String> {
        vec![
            "chemical_name".to_string(),
            "chemical_id".to_string(),
            "cas_rn".to_string(),
            "disease_name".to_string(),
            "disease_id".to_string(),
            "direct_evidence".to_string(),
            "inference_gene_symbol".to_string(),
            "inference_score".to_string(),
            "omim_ids".to_string(),
            "pmids".to_string(),
        ]
    }
}

impl ChemicalDisease {
    pub async fn for_chemical(
        pool: &sqlx::PgPool,
        chemical_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<ChemicalDisease>, anyhow::Error> {
        let sql_str = match limit {
            Some(limit) => format!(
                "SELECT * FROM ctd_chemical_disease WHERE chemical_id = $1 ORDER BY id LIMIT {}",
                limit
            ),
            None => "SELECT * FROM ctd_chemical_disease WHERE chemical_id = $1 ORDER BY id"
                .to_string(),
        };

        let associations = sqlx::query_as::<_, ChemicalDisease>(&sql_str)
            .bind(normalize_chemical_id(chemical_id))
            .fetch_all(pool)
            .await?;

        Ok(associations)
    }
}

/// One row per table per population run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Object, sqlx::FromRow)]
pub struct UpdateRecord {
    #[oai(read_only)]
    pub id: i64,

    pub table_name: String,

    pub row_count: i64,

    pub populated_at: DateTime<Utc>,
}

impl UpdateRecord {
    pub async fn log(
        pool: &sqlx::PgPool,
        table_name: &str,
        row_count: i64,
    ) -> Result<(), anyhow::Error> {
        sqlx::query("INSERT INTO ctd_update (table_name, row_count) VALUES ($1, $2)")
            .bind(table_name)
            .bind(row_count)
            .execute(pool)
            .await?;

        Ok(())
    }

    pub async fn latest(pool: &sqlx::PgPool) -> Result<Option<UpdateRecord>, anyhow::Error> {
        let record = sqlx::query_as::<_, UpdateRecord>(
            "SELECT * FROM ctd_update ORDER BY populated_at DESC, id DESC LIMIT 1",
        )
        .fetch_optional(pool)
        .await?;

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tsv(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_normalize_chemical_id() {
        assert_eq!(normalize_chemical_id("MESH:C490728"), "C490728");
        assert_eq!(normalize_chemical_id("C490728"), "C490728");
        assert_eq!(normalize_chemical_id("D015738"), "D015738");
    }

    #[test]
    fn test_check_chemical_csv_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tsv(
            &dir,
            "chemical.tsv",
            "chemical_name\tchemical_id\tcas_rn\tdefinition\tparent_ids\ttree_numbers\tparent_tree_numbers\tsynonyms\n\
             Gefitinib\tD000077156\t184475-35-2\tA quinazoline derivative.\t\tD03.633.100\t\tIressa\n",
        );

        let errors = Chemical::check_csv_is_valid(&path);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);

        let records: Vec<Chemical> = Chemical::get_records(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].chemical_id, "D000077156");
        assert_eq!(records[0].cas_rn.as_deref(), Some("184475-35-2"));
        assert_eq!(records[0].parent_ids, None);
    }

    #[test]
    fn test_check_chemical_csv_rejects_prefixed_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tsv(
            &dir,
            "chemical.tsv",
            "chemical_name\tchemical_id\tcas_rn\tdefinition\tparent_ids\ttree_numbers\tparent_tree_numbers\tsynonyms\n\
             Gefitinib\tMESH:D000077156\t\t\t\t\t\t\n",
        );

        let errors = Chemical::check_csv_is_valid(&path);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("line: 2"));
    }

    #[test]
    fn test_check_ixn_csv_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tsv(
            &dir,
            "chem_gene_ixn.tsv",
            "chemical_name\tchemical_id\tcas_rn\tgene_symbol\tgene_id\tgene_forms\torganism\torganism_id\tinteraction\tinteraction_actions\tpmids\n\
             Gefitinib\tD000077156\t\tEGFR\t1956\tprotein\tHomo sapiens\t9606\tGefitinib results in decreased activity of EGFR protein\tdecreases^activity\t15020611|16011858\n\
             Gefitinib\tD000077156\t\tEGFR\tnot-a-gene-id\tprotein\tHomo sapiens\t9606\tbroken row\t\t\n",
        );

        let errors = ChemGeneIxn::check_csv_is_valid(&path);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("line: 3"));
    }

    #[test]
    fn test_chemical_disease_inference_score_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tsv(
            &dir,
            "chemical_disease.tsv",
            "chemical_name\tchemical_id\tcas_rn\tdisease_name\tdisease_id\tdirect_evidence\tinference_gene_symbol\tinference_score\tomim_ids\tpmids\n\
             Gefitinib\tD000077156\t\tCarcinoma, Non-Small-Cell Lung\tMESH:D002289\ttherapeutic\t\t\t\t15020611\n\
             Benzene\tD001554\t71-43-2\tLeukemia\tMESH:D007938\t\tTP53\t34.18\t\t16143535\n",
        );

        let errors = ChemicalDisease::check_csv_is_valid(&path);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);

        let records: Vec<ChemicalDisease> = ChemicalDisease::get_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].inference_score, None);
        assert_eq!(records[1].inference_score, Some(34.18));
    }

    #[test]
    fn test_get_column_names_keeps_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tsv(
            &dir,
            "pathway.tsv",
            "pathway_name\tpathway_id\nGlycolysis / Gluconeogenesis\tKEGG:hsa00010\n",
        );

        let columns = Pathway::get_column_names(&path).unwrap();
        assert_eq!(columns, vec!["pathway_name", "pathway_id"]);
    }
}
