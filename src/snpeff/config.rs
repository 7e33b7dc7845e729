//! Run-scoped snpEff configuration.
//!
//! The config is rendered from scratch for every run into the run's staging
//! directory: all supported codon tables, one genome named after the run and a
//! `codonTable` entry per annotated contig. Nothing shared is ever modified.
use std::fs;
use std::path::{Path, PathBuf};

use derive_new::new;
use itertools::Itertools;
use log::{debug, info, warn};
use serde_derive::Serialize;
use snafu::{ensure, ResultExt};
use tera::{Context, Tera};

use crate::coding_table::{CodingTable, GeneticCode, GENETIC_CODES};
use crate::errors;

pub const CONFIG_FILE: &str = "snpEff.config";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, new)]
pub struct ContigCode {
    pub contig: String,
    pub code: &'static str,
}

#[derive(Serialize)]
struct ConfigEntry {
    key: String,
    code: &'static str,
}

#[derive(Serialize)]
struct CodonTable {
    name: &'static str,
    codons: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfiguration {
    /// Unique per run; names the genome and its database directory.
    pub genome_id: String,
    pub staging_dir: PathBuf,
    pub data_dir: PathBuf,
    pub config_path: PathBuf,
    pub contigs: Vec<ContigCode>,
}

impl RunConfiguration {
    /// Directory snpEff reads `genes.*` from and writes the database into.
    pub fn genome_dir(&self) -> PathBuf {
        self.data_dir.join(&self.genome_id)
    }
}

#[derive(Debug, Clone, new)]
pub struct DatabaseConfigBuilder<'a> {
    coding_table: &'a CodingTable,
    /// Used for contigs without an explicit or default entry.
    fallback: Option<&'static GeneticCode>,
}

impl DatabaseConfigBuilder<'_> {
    /// Pick a genetic code for every contig: explicit entry, then `default`, then the fallback.
    pub fn assign(&self, contigs: &[String]) -> errors::Result<Vec<ContigCode>> {
        let mut unmapped = Vec::new();
        let mut assigned = Vec::with_capacity(contigs.len());
        for contig in contigs {
            match (self.coding_table.get(contig), self.fallback) {
                (Some(code), _) => assigned.push(ContigCode::new(contig.clone(), code.name())),
                (None, Some(fallback)) => {
                    info!(
                        "No coding table set for '{}', using snpEff's fallback {}",
                        contig, fallback
                    );
                    assigned.push(ContigCode::new(contig.clone(), fallback.name()));
                }
                (None, None) => {
                    warn!("Cannot annotate VCF, no coding table set for '{}'", contig);
                    unmapped.push(contig.clone());
                }
            }
        }
        ensure!(
            unmapped.is_empty(),
            errors::NoDefaultCodingTable { contigs: unmapped }
        );
        Ok(assigned)
    }

    /// Assign codes and write the config into `staging_dir`.
    pub fn build(
        &self,
        contigs: &[String],
        genome_id: &str,
        staging_dir: &Path,
    ) -> errors::Result<RunConfiguration> {
        let contigs = self.assign(contigs)?;
        let data_dir = staging_dir.join("data");
        fs::create_dir_all(&data_dir).context(errors::StagingIo {
            action: "create",
            path: data_dir.clone(),
        })?;

        let config_path = staging_dir.join(CONFIG_FILE);
        let content = render(genome_id, &data_dir, &contigs)?;
        debug!("Writing config to {}", config_path.display());
        fs::write(&config_path, content).context(errors::StagingIo {
            action: "write",
            path: config_path.clone(),
        })?;

        Ok(RunConfiguration {
            genome_id: genome_id.to_owned(),
            staging_dir: staging_dir.to_owned(),
            data_dir,
            config_path,
            contigs,
        })
    }
}

pub fn render(genome_id: &str, data_dir: &Path, contigs: &[ContigCode]) -> errors::Result<String> {
    let mut templates = Tera::default();
    templates
        .add_raw_template(CONFIG_FILE, include_str!("config.tera"))
        .context(errors::ConfigTemplate)?;
    let codon_tables = GENETIC_CODES
        .iter()
        .map(|code| CodonTable {
            name: code.name(),
            codons: code.codons(),
        })
        .collect_vec();

    let entries = contigs
        .iter()
        .map(|entry| ConfigEntry {
            key: property_key(&entry.contig),
            code: entry.code,
        })
        .collect_vec();

    let mut context = Context::new();
    context.insert("data_dir", &format!("{}/", data_dir.display()));
    context.insert("genome_id", &property_key(genome_id));
    context.insert("contigs", &entries);
    context.insert("codon_tables", &codon_tables);
    templates
        .render(CONFIG_FILE, &context)
        .context(errors::ConfigTemplate)
}

/// Escape a Java properties key, where `:`, `=` and whitespace end the key.
fn property_key(key: &str) -> String {
    let mut escaped = String::with_capacity(key.len());
    for c in key.chars() {
        if matches!(c, '\\' | ':' | '=' | ' ' | '\t' | '#' | '!') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Outcome of comparing the VCF's contigs with the annotation and the coding table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContigCheck {
    /// VCF contigs without annotation data; their calls pass through unannotated.
    pub without_annotation: Vec<String>,
    /// Coding table entries naming contigs that do not occur in the VCF.
    pub unmapped_entries: Vec<String>,
}

pub fn check_contigs(
    vcf_contigs: &[String],
    annotation_contigs: &[String],
    coding_table: &CodingTable,
) -> ContigCheck {
    info!("Checking that the VCF and GTF/GFF contigs are consistent");
    let without_annotation = vcf_contigs
        .iter()
        .filter(|contig| !annotation_contigs.contains(*contig))
        .cloned()
        .collect_vec();
    for contig in &without_annotation {
        warn!("Could not annotate contig '{}', no annotation data", contig);
    }
    if !vcf_contigs.is_empty() && without_annotation.len() == vcf_contigs.len() {
        warn!("None of the VCF contigs occur in the annotation file, no record will be annotated");
    }

    let unmapped_entries = coding_table
        .contigs()
        .filter(|contig| !vcf_contigs.iter().any(|c| c == contig))
        .map(|contig| contig.to_owned())
        .collect_vec();
    for contig in &unmapped_entries {
        warn!(
            "Coding table entry for '{}' is unused, the contig does not occur in the VCF",
            contig
        );
    }

    ContigCheck {
        without_annotation,
        unmapped_entries,
    }
}
