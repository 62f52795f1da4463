//! The table registry: one entry per CTD report file we load, with the
//! mapping from the report's field order to our database columns.

use anyhow::bail;

pub const URL_BASE: &str = "https://ctdbase.org/reports/";

/// One report column, in file order.
pub struct Column {
    /// The field name CTD documents in the report preamble.
    pub field: &'static str,
    /// The database column it lands in.
    pub name: &'static str,
    /// Prefix to strip at extract time, e.g. "MESH:" on chemical ids.
    pub strip_prefix: Option<&'static str>,
}

pub struct TableConfig {
    /// Short name used by --only/--exclude and for the clean file.
    pub name: &'static str,
    /// Destination table.
    pub table: &'static str,
    /// Report file published under URL_BASE.
    pub file_name: &'static str,
    pub columns: &'static [Column],
}

impl TableConfig {
    pub fn url(&self) -> String {
        format!("{}{}", URL_BASE, self.file_name)
    }

    pub fn clean_file_name(&self) -> String {
        format!("{}.tsv", self.name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.to_string()).collect()
    }
}

const fn col(field: &'static str, name: &'static str) -> Column {
    Column {
        field,
        name,
        strip_prefix: None,
    }
}

pub static TABLES: &[TableConfig] = &[
    TableConfig {
        name: "chemical",
        table: "ctd_chemical",
        file_name: "CTD_chemicals.tsv.gz",
        columns: &[
            col("ChemicalName", "chemical_name"),
            Column {
                field: "ChemicalID",
                name: "chemical_id",
                strip_prefix: Some("MESH:"),
            },
            col("CasRN", "cas_rn"),
            col("Definition", "definition"),
            col("ParentIDs", "parent_ids"),
            col("TreeNumbers", "tree_numbers"),
            col("ParentTreeNumbers", "parent_tree_numbers"),
            col("Synonyms", "synonyms"),
        ],
    },
    TableConfig {
        name: "gene",
        table: "ctd_gene",
        file_name: "CTD_genes.tsv.gz",
        columns: &[
            col("GeneSymbol", "gene_symbol"),
            col("GeneName", "gene_name"),
            col("GeneID", "gene_id"),
            col("AltGeneIDs", "alt_gene_ids"),
            col("Synonyms", "synonyms"),
            col("BioGRIDIDs", "biogrid_ids"),
            col("PharmGKBIDs", "pharmgkb_ids"),
            col("UniProtIDs", "uniprot_ids"),
        ],
    },
    TableConfig {
        name: "disease",
        table: "ctd_disease",
        file_name: "CTD_diseases.tsv.gz",
        columns: &[
            col("DiseaseName", "disease_name"),
            col("DiseaseID", "disease_id"),
            col("AltDiseaseIDs", "alt_disease_ids"),
            col("Definition", "definition"),
            col("ParentIDs", "parent_ids"),
            col("TreeNumbers", "tree_numbers"),
            col("ParentTreeNumbers", "parent_tree_numbers"),
            col("Synonyms", "synonyms"),
            col("SlimMappings", "slim_mappings"),
        ],
    },
    TableConfig {
        name: "pathway",
        table: "ctd_pathway",
        file_name: "CTD_pathways.tsv.gz",
        columns: &[col("PathwayName", "pathway_name"), col("PathwayID", "pathway_id")],
    },
    TableConfig {
        name: "action",
        table: "ctd_action",
        file_name: "CTD_chem_gene_ixn_types.tsv.gz",
        columns: &[
            col("TypeName", "type_name"),
            col("Code", "code"),
            col("Description", "description"),
            col("ParentCode", "parent_code"),
        ],
    },
    TableConfig {
        name: "chem_gene_ixn",
        table: "ctd_chem_gene_ixn",
        file_name: "CTD_chem_gene_ixns.tsv.gz",
        columns: &[
            col("ChemicalName", "chemical_name"),
            col("ChemicalID", "chemical_id"),
            col("CasRN", "cas_rn"),
            col("GeneSymbol", "gene_symbol"),
            col("GeneID", "gene_id"),
            col("GeneForms", "gene_forms"),
            col("Organism", "organism"),
            col("OrganismID", "organism_id"),
            col("Interaction", "interaction"),
            col("InteractionActions", "interaction_actions"),
            col("PubMedIDs", "pmids"),
        ],
    },
    TableConfig {
        name: "chemical_disease",
        table: "ctd_chemical_disease",
        file_name: "CTD_chemicals_diseases.tsv.gz",
        columns: &[
            col("ChemicalName", "chemical_name"),
            col("ChemicalID", "chemical_id"),
            col("CasRN", "cas_rn"),
            col("DiseaseName", "disease_name"),
            col("DiseaseID", "disease_id"),
            col("DirectEvidence", "direct_evidence"),
            col("InferenceGeneSymbol", "inference_gene_symbol"),
            col("InferenceScore", "inference_score"),
            col("OmimIDs", "omim_ids"),
            col("PubMedIDs", "pmids"),
        ],
    },
];

pub fn get(name: &str) -> Option<&'static TableConfig> {
    TABLES.iter().find(|t| t.name == name)
}

/// The URLs a full population run downloads.
pub fn default_urls() -> Vec<String> {
    TABLES.iter().map(|t| t.url()).collect()
}

/// Resolve --only/--exclude selections against the registry. Unknown table
/// names are an error rather than a silent no-op.
pub fn select(
    only: Option<&Vec<String>>,
    exclude: Option<&Vec<String>>,
) -> Result<Vec<&'static TableConfig>, anyhow::Error> {
    for name in only.iter().flat_map(|v| v.iter()) {
        if get(name).is_none() {
            bail!(
                "Unknown table: {}. Known tables are {}.",
                name,
                known_tables().join(", ")
            );
        }
    }

    for name in exclude.iter().flat_map(|v| v.iter()) {
        if get(name).is_none() {
            bail!(
                "Unknown table: {}. Known tables are {}.",
                name,
                known_tables().join(", ")
            );
        }
    }

    let selected = TABLES
        .iter()
        .filter(|t| match only {
            Some(only) => only.iter().any(|name| name == t.name),
            None => true,
        })
        .filter(|t| match exclude {
            Some(exclude) => !exclude.iter().any(|name| name == t.name),
            None => true,
        })
        .collect::<Vec<_>>();

    if selected.is_empty() {
        bail!("The table selection is empty.");
    }

    Ok(selected)
}

pub fn known_tables() -> Vec<&'static str> {
    TABLES.iter().map(|t| t.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::core::{
        Action, CheckData, ChemGeneIxn, Chemical, ChemicalDisease, Disease, Gene, Pathway,
    };

    #[test]
    fn test_default_urls_cover_every_table() {
        let urls = default_urls();
        assert_eq!(urls.len(), TABLES.len());
        assert!(urls
            .iter()
            .any(|u| u == "https://ctdbase.org/reports/CTD_chemicals.tsv.gz"));
        assert!(urls.iter().all(|u| u.starts_with(URL_BASE)));
    }

    #[test]
    fn test_registry_columns_match_model_fields() {
        for config in TABLES {
            let fields = match config.name {
                "chemical" => Chemical::fields(),
                "gene" => Gene::fields(),
                "disease" => Disease::fields(),
                "pathway" => Pathway::fields(),
                "action" => Action::fields(),
                "chem_gene_ixn" => ChemGeneIxn::fields(),
                "chemical_disease" => ChemicalDisease::fields(),
                other => panic!("no model for table {}", other),
            };
            assert_eq!(config.column_names(), fields, "table {}", config.name);
        }
    }

    #[test]
    fn test_select_only_and_exclude() {
        let all = select(None, None).unwrap();
        assert_eq!(all.len(), TABLES.len());

        let only = vec!["chemical".to_string(), "gene".to_string()];
        let selected = select(Some(&only), None).unwrap();
        assert_eq!(
            selected.iter().map(|t| t.name).collect::<Vec<_>>(),
            vec!["chemical", "gene"]
        );

        let exclude = vec!["chem_gene_ixn".to_string()];
        let selected = select(None, Some(&exclude)).unwrap();
        assert!(selected.iter().all(|t| t.name != "chem_gene_ixn"));
        assert_eq!(selected.len(), TABLES.len() - 1);
    }

    #[test]
    fn test_select_rejects_unknown_table() {
        let only = vec!["exposure_event".to_string()];
        assert!(select(Some(&only), None).is_err());

        let exclude = vec!["nope".to_string()];
        assert!(select(None, Some(&exclude)).is_err());
    }

    #[test]
    fn test_clean_file_name() {
        let config = get("chemical").unwrap();
        assert_eq!(config.clean_file_name(), "chemical.tsv");
        assert_eq!(config.table, "ctd_chemical");
    }
}
