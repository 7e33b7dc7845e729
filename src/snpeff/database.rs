//! Inspect the GFF/GTF input, stage it for snpEff and build the run's database.
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use itertools::Itertools;
use log::{debug, info};
use snafu::ResultExt;

use super::config::RunConfiguration;
use super::executables::Executables;
use super::java_args;
use crate::errors;
use crate::process::{Invocation, Sink, ToolRunner};

const FASTA_MARKER: &str = "##FASTA";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationFormat {
    Gff3,
    Gtf22,
}

impl AnnotationFormat {
    /// GTF if the file name ends in `.gtf` or `.gtf.gz` (any case), GFF3 otherwise.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let name = path
            .as_ref()
            .file_name()
            .map(|name| name.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if name.ends_with(".gtf") || name.ends_with(".gtf.gz") {
            AnnotationFormat::Gtf22
        } else {
            AnnotationFormat::Gff3
        }
    }

    /// `snpEff build` flag selecting the parser.
    pub fn build_flag(self) -> &'static str {
        match self {
            AnnotationFormat::Gff3 => "-gff3",
            AnnotationFormat::Gtf22 => "-gtf22",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            AnnotationFormat::Gff3 => "gff",
            AnnotationFormat::Gtf22 => "gtf",
        }
    }
}

/// An annotation file that has been checked to carry its reference sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationFile {
    pub path: PathBuf,
    pub format: AnnotationFormat,
    pub compressed: bool,
    /// Contigs with features, in order of first appearance.
    pub contigs: Vec<String>,
}

impl AnnotationFile {
    /// Scan the file for contigs and the embedded FASTA section.
    /// Fails with `MissingReferenceSequence` before anything is staged or run.
    pub fn inspect<P: AsRef<Path>>(path: P) -> errors::Result<Self> {
        let path = path.as_ref();
        debug!("Getting the contigs from the annotation file");
        let compressed = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("gz"));
        let read_err = |_: &mut io::Error| errors::StagingIo {
            action: "read",
            path: path.to_owned(),
        };
        let file = File::open(path).with_context(read_err)?;
        let (contigs, has_fasta) = if compressed {
            scan(BufReader::new(MultiGzDecoder::new(file)))
        } else {
            scan(BufReader::new(file))
        }
        .with_context(read_err)?;

        if !has_fasta {
            return errors::MissingReferenceSequence { path }.fail();
        }
        Ok(AnnotationFile {
            path: path.to_owned(),
            format: AnnotationFormat::from_path(path),
            compressed,
            contigs,
        })
    }

    /// File name snpEff looks for in the genome directory.
    pub fn staged_name(&self) -> String {
        format!(
            "genes.{}{}",
            self.format.extension(),
            if self.compressed { ".gz" } else { "" }
        )
    }
}

/// Contigs of all feature lines before the `##FASTA` marker, and whether the marker was seen.
pub fn scan<R: BufRead>(reader: R) -> io::Result<(Vec<String>, bool)> {
    let mut contigs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim_end() == FASTA_MARKER {
            return Ok((contigs.into_iter().unique().collect(), true));
        }
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        if let Some(contig) = line.split('\t').next() {
            contigs.push(contig.trim().to_owned());
        }
    }
    Ok((contigs.into_iter().unique().collect(), false))
}

/// A database built by snpEff for exactly one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationDatabase {
    pub genome_id: String,
    pub directory: PathBuf,
}

/// Copy the annotation file into the genome directory and run `snpEff build` on it.
pub fn build_database(
    annotation: &AnnotationFile,
    config: &RunConfiguration,
    executables: &Executables,
    java_heap: &str,
    debug: bool,
    runner: &dyn ToolRunner,
) -> errors::Result<AnnotationDatabase> {
    let genome_dir = config.genome_dir();
    fs::create_dir_all(&genome_dir).context(errors::StagingIo {
        action: "create",
        path: genome_dir.clone(),
    })?;
    let staged = genome_dir.join(annotation.staged_name());
    debug!(
        "Staging {} as {}",
        annotation.path.display(),
        staged.display()
    );
    fs::copy(&annotation.path, &staged).context(errors::StagingIo {
        action: "copy annotation file to",
        path: staged.clone(),
    })?;

    let mut args = java_args(executables, java_heap);
    args.extend(
        vec![
            "build",
            annotation.format.build_flag(),
            "-verbose",
            config.genome_id.as_str(),
            "-c",
        ]
        .into_iter()
        .map(Into::into),
    );
    args.push(config.config_path.clone().into_os_string());
    // Our stdout may be the output VCF.
    let (stdout, stderr) = if debug {
        (Sink::Stderr, Sink::Inherit)
    } else {
        (Sink::Capture, Sink::Capture)
    };
    let invocation = Invocation::new(executables.java.clone(), args)
        .current_dir(&config.staging_dir)
        .stdout(stdout)
        .stderr(stderr);

    info!("Building snpeff database");
    let output = runner.run(&invocation)?;
    if !debug {
        keep_log(&config.staging_dir.join("snpeff_build_db.o"), &output.stdout)?;
        keep_log(&config.staging_dir.join("snpeff_build_db.e"), &output.stderr)?;
    }
    if !output.success() {
        return errors::DatabaseBuild {
            status: output.status(),
            stderr: if debug {
                "(diagnostics were printed above)".to_owned()
            } else {
                output.stderr_lossy()
            },
        }
        .fail();
    }

    Ok(AnnotationDatabase {
        genome_id: config.genome_id.clone(),
        directory: genome_dir,
    })
}

/// Keep captured diagnostics next to the run's other staging files.
pub(crate) fn keep_log(path: &Path, content: &[u8]) -> errors::Result<()> {
    fs::write(path, content).context(errors::StagingIo {
        action: "write",
        path: path.to_owned(),
    })
}
