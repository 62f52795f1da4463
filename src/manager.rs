//! The manager owns the database connection pool and the report cache
//! directory, and drives the population workflow end to end.

use anyhow::{anyhow, bail};
use chrono::{DateTime, Utc};
use log::info;
use poem_openapi::Object;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::ctd::{download, registry, report};
use crate::model::core::{
    Action, CheckData, ChemGeneIxn, Chemical, ChemicalDisease, Disease, Gene, Pathway,
    UpdateRecord,
};
use crate::model::util::{count_rows, drop_table, get_delimiter, import_file_in_loop, show_errors};
use crate::{connect_db, run_migrations};

pub const DEFAULT_DATA_DIR: &str = "data/ctd";

/// Options for a population run, mirroring the knobs of the upstream
/// reports: which tables, whether to refresh cached files, and how strict to
/// be about validation.
#[derive(Debug, Default, Clone)]
pub struct PopulateOptions {
    /// Override the report urls. Must match the selected tables in order.
    pub urls: Option<Vec<String>>,
    /// Re-download report files even when they are already cached.
    pub force_download: bool,
    /// Load only these tables.
    pub only_tables: Option<Vec<String>>,
    /// Load everything except these tables.
    pub exclude_tables: Option<Vec<String>>,
    /// Skip CSV validation of the extracted files.
    pub skip_check: bool,
    /// Report every validation error instead of the first three.
    pub show_all_errors: bool,
}

/// Row counts of the CTD tables plus the time of the most recent load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Object)]
pub struct DatabaseSummary {
    pub chemicals: i64,
    pub genes: i64,
    pub diseases: i64,
    pub pathways: i64,
    pub actions: i64,
    pub chemical_gene_interactions: i64,
    pub chemical_disease_associations: i64,

    #[oai(skip_serializing_if_is_none)]
    pub last_populated_at: Option<DateTime<Utc>>,
}

impl DatabaseSummary {
    pub async fn from_pool(pool: &sqlx::PgPool) -> Result<DatabaseSummary, anyhow::Error> {
        Ok(DatabaseSummary {
            chemicals: count_rows(pool, "ctd_chemical").await?,
            genes: count_rows(pool, "ctd_gene").await?,
            diseases: count_rows(pool, "ctd_disease").await?,
            pathways: count_rows(pool, "ctd_pathway").await?,
            actions: count_rows(pool, "ctd_action").await?,
            chemical_gene_interactions: count_rows(pool, "ctd_chem_gene_ixn").await?,
            chemical_disease_associations: count_rows(pool, "ctd_chemical_disease").await?,
            last_populated_at: UpdateRecord::latest(pool).await?.map(|r| r.populated_at),
        })
    }
}

pub struct Manager {
    pool: sqlx::PgPool,
    database_url: String,
    data_dir: PathBuf,
}

impl Manager {
    /// Open a connection pool. The database url falls back to DATABASE_URL,
    /// the report cache directory to CTD_DATA_DIR and then to
    /// [`DEFAULT_DATA_DIR`]. Connecting performs no writes.
    pub async fn connect(
        database_url: Option<&str>,
        data_dir: Option<PathBuf>,
    ) -> Result<Manager, anyhow::Error> {
        let database_url = match database_url {
            Some(v) => v.to_string(),
            None => match std::env::var("DATABASE_URL") {
                Ok(v) => v,
                Err(_) => bail!("DATABASE_URL is not set."),
            },
        };

        let data_dir = match data_dir {
            Some(d) => d,
            None => match std::env::var("CTD_DATA_DIR") {
                Ok(v) => PathBuf::from(v),
                Err(_) => PathBuf::from(DEFAULT_DATA_DIR),
            },
        };

        let pool = connect_db(&database_url, 10).await;

        Ok(Manager {
            pool,
            database_url,
            data_dir,
        })
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Update the CTD database:
    ///
    /// 1. ensures the schema via the embedded migrations
    /// 2. clears the selected tables (full reload)
    /// 3. downloads the report files (cached files are kept unless forced)
    /// 4. extracts each report into a clean TSV and validates it
    /// 5. bulk-loads each table and records the run in ctd_update
    ///
    /// Returns the number of extracted rows per table. A failure aborts the
    /// run; tables already loaded stay loaded.
    pub async fn populate(
        &self,
        options: &PopulateOptions,
    ) -> Result<Vec<(String, u64)>, anyhow::Error> {
        let tables = registry::select(
            options.only_tables.as_ref(),
            options.exclude_tables.as_ref(),
        )?;

        let urls = match &options.urls {
            Some(urls) => {
                if urls.len() != tables.len() {
                    bail!(
                        "Got {} urls for {} selected tables. Url overrides map to the selected tables in order.",
                        urls.len(),
                        tables.len()
                    );
                }
                urls.clone()
            }
            None => tables.iter().map(|t| t.url()).collect(),
        };

        info!("Update CTD database from {:?}", urls);

        run_migrations(&self.database_url).await?;

        for config in &tables {
            drop_table(&self.pool, config.table).await;
        }

        let files = download::download_reports(&urls, &self.data_dir, options.force_download).await?;

        let mut loaded = Vec::new();
        for (config, gz_path) in tables.iter().zip(files.iter()) {
            let clean_path = self.data_dir.join(config.clean_file_name());
            let rows = report::extract_table(gz_path, &clean_path, config)?;

            if !options.skip_check {
                let validation_errors = match config.name {
                    "chemical" => Chemical::check_csv_is_valid(&clean_path),
                    "gene" => Gene::check_csv_is_valid(&clean_path),
                    "disease" => Disease::check_csv_is_valid(&clean_path),
                    "pathway" => Pathway::check_csv_is_valid(&clean_path),
                    "action" => Action::check_csv_is_valid(&clean_path),
                    "chem_gene_ixn" => ChemGeneIxn::check_csv_is_valid(&clean_path),
                    "chemical_disease" => ChemicalDisease::check_csv_is_valid(&clean_path),
                    other => bail!("Invalid table name: {}", other),
                };

                if !validation_errors.is_empty() {
                    show_errors(&validation_errors, options.show_all_errors);
                    bail!("Invalid file: {}", clean_path.display());
                } else {
                    info!("{} is valid.", clean_path.display());
                }
            }

            let unique_columns = match config.name {
                "chemical" => Chemical::unique_fields(),
                "gene" => Gene::unique_fields(),
                "disease" => Disease::unique_fields(),
                "pathway" => Pathway::unique_fields(),
                "action" => Action::unique_fields(),
                "chem_gene_ixn" => ChemGeneIxn::unique_fields(),
                "chemical_disease" => ChemicalDisease::unique_fields(),
                other => bail!("Invalid table name: {}", other),
            };

            let delimiter = get_delimiter(&clean_path).map_err(|e| anyhow!("{}", e))?;

            import_file_in_loop(
                &self.pool,
                &clean_path,
                config.table,
                &config.column_names(),
                &unique_columns,
                delimiter,
            )
            .await
            .map_err(|e| {
                anyhow!(
                    "Failed to import data into the {} table: {}",
                    config.table,
                    e
                )
            })?;

            let count = count_rows(&self.pool, config.table).await?;
            UpdateRecord::log(&self.pool, config.table, count).await?;
            info!("{} imported ({} rows).", config.table, count);

            loaded.push((config.table.to_string(), rows));
        }

        Ok(loaded)
    }

    /// Whether a population run has happened, judged by the presence of
    /// chemical-gene interactions. A missing table counts as not populated.
    pub async fn is_populated(&self) -> bool {
        match count_rows(&self.pool, "ctd_chem_gene_ixn").await {
            Ok(n) => n > 0,
            Err(_) => false,
        }
    }

    /// Drop every CTD table, including the migration bookkeeping, so the next
    /// populate rebuilds the schema from scratch.
    pub async fn drop_all(&self) -> Result<(), anyhow::Error> {
        let mut tables = registry::TABLES
            .iter()
            .map(|t| t.table)
            .collect::<Vec<&str>>();
        tables.push("ctd_update");
        tables.push("_sqlx_migrations");

        for table in tables {
            sqlx::query(&format!("DROP TABLE IF EXISTS {} CASCADE", table))
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    pub async fn count_chemicals(&self) -> Result<i64, anyhow::Error> {
        count_rows(&self.pool, "ctd_chemical").await
    }

    pub async fn count_genes(&self) -> Result<i64, anyhow::Error> {
        count_rows(&self.pool, "ctd_gene").await
    }

    pub async fn count_diseases(&self) -> Result<i64, anyhow::Error> {
        count_rows(&self.pool, "ctd_disease").await
    }

    pub async fn count_pathways(&self) -> Result<i64, anyhow::Error> {
        count_rows(&self.pool, "ctd_pathway").await
    }

    pub async fn count_actions(&self) -> Result<i64, anyhow::Error> {
        count_rows(&self.pool, "ctd_action").await
    }

    pub async fn count_chemical_gene_interactions(&self) -> Result<i64, anyhow::Error> {
        count_rows(&self.pool, "ctd_chem_gene_ixn").await
    }

    pub async fn count_chemical_disease_associations(&self) -> Result<i64, anyhow::Error> {
        count_rows(&self.pool, "ctd_chemical_disease").await
    }

    pub async fn summarize(&self) -> Result<DatabaseSummary, anyhow::Error> {
        DatabaseSummary::from_pool(&self.pool).await
    }

    pub async fn get_chemical_by_mesh(
        &self,
        mesh_id: &str,
    ) -> Result<Option<Chemical>, anyhow::Error> {
        Chemical::get_by_mesh(&self.pool, mesh_id).await
    }

    pub async fn get_chemical_by_cas(
        &self,
        cas_rn: &str,
    ) -> Result<Option<Chemical>, anyhow::Error> {
        Chemical::get_by_cas(&self.pool, cas_rn).await
    }

    pub async fn get_gene_by_entrez_id(
        &self,
        entrez_id: &str,
    ) -> Result<Option<Gene>, anyhow::Error> {
        Gene::get_by_entrez_id(&self.pool, entrez_id).await
    }

    pub async fn get_interaction_by_id(
        &self,
        ixn_id: i64,
    ) -> Result<Option<ChemGeneIxn>, anyhow::Error> {
        ChemGeneIxn::get_by_id(&self.pool, ixn_id).await
    }

    pub async fn list_chemicals(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Chemical>, anyhow::Error> {
        Chemical::list(&self.pool, limit, offset).await
    }

    pub async fn list_genes(&self, limit: i64, offset: i64) -> Result<Vec<Gene>, anyhow::Error> {
        Gene::list(&self.pool, limit, offset).await
    }

    pub async fn interactions_for_chemical(
        &self,
        mesh_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<ChemGeneIxn>, anyhow::Error> {
        ChemGeneIxn::for_chemical(&self.pool, mesh_id, limit).await
    }

    pub async fn interactions_for_gene(
        &self,
        entrez_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<ChemGeneIxn>, anyhow::Error> {
        ChemGeneIxn::for_gene(&self.pool, entrez_id, limit).await
    }

    pub async fn diseases_for_chemical(
        &self,
        mesh_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<ChemicalDisease>, anyhow::Error> {
        ChemicalDisease::for_chemical(&self.pool, mesh_id, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    // These tests need a live PostgreSQL instance and are skipped unless
    // DATABASE_URL is set.
    async fn test_manager() -> Option<Manager> {
        let database_url = match std::env::var("DATABASE_URL") {
            Ok(v) => v,
            Err(_) => return None,
        };

        let data_dir = tempfile::tempdir().unwrap().into_path();
        Some(
            Manager::connect(Some(&database_url), Some(data_dir))
                .await
                .unwrap(),
        )
    }

    fn seed_report(data_dir: &Path, file_name: &str, content: &str) {
        let file = std::fs::File::create(data_dir.join(file_name)).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(content.as_bytes()).unwrap();
        encoder.finish().unwrap();
    }

    #[tokio::test]
    async fn test_connect_does_not_write() {
        let manager = match test_manager().await {
            Some(m) => m,
            None => return,
        };

        // Connecting must leave the database usable but untouched.
        sqlx::query("SELECT 1").execute(manager.pool()).await.unwrap();
    }

    #[tokio::test]
    async fn test_populate_from_cached_reports() {
        let manager = match test_manager().await {
            Some(m) => m,
            None => return,
        };

        std::fs::create_dir_all(manager.data_dir()).unwrap();
        seed_report(
            manager.data_dir(),
            "CTD_pathways.tsv.gz",
            "# preamble\nGlycolysis / Gluconeogenesis\tKEGG:hsa00010\nApoptosis\tKEGG:hsa04210\n",
        );
        seed_report(
            manager.data_dir(),
            "CTD_chem_gene_ixn_types.tsv.gz",
            "# preamble\nexpression\texp\tstudied expression\t\nactivity\tact\tstudied activity\t\n",
        );

        // The reports are already cached, so no network traffic happens.
        let options = PopulateOptions {
            only_tables: Some(vec!["pathway".to_string(), "action".to_string()]),
            ..Default::default()
        };
        let loaded = manager.populate(&options).await.unwrap();
        assert_eq!(
            loaded,
            vec![("ctd_pathway".to_string(), 2), ("ctd_action".to_string(), 2)]
        );

        assert_eq!(manager.count_pathways().await.unwrap(), 2);
        assert_eq!(manager.count_actions().await.unwrap(), 2);

        let summary = manager.summarize().await.unwrap();
        assert!(summary.last_populated_at.is_some());

        // A second run is a reload, not an accumulation.
        let loaded = manager.populate(&options).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(manager.count_pathways().await.unwrap(), 2);

        manager.drop_all().await.unwrap();
        assert!(!manager.is_populated().await);
    }
}
