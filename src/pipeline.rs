//! One annotation run, start to finish.
//!
//! Everything happens strictly in sequence: validate the inputs, write a
//! run-scoped config, build the database, annotate, then merge snpEff's output
//! back into the input calls. The staging directory is unique to the run and is
//! removed when the run ends, successfully or not, unless it is kept on request.
use std::fs::File;
use std::io::{self, BufRead, BufWriter};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use snafu::ResultExt;
use tempfile::TempDir;

use crate::coding_table::{self, CodingTable, GeneticCode};
use crate::errors;
use crate::process::ToolRunner;
use crate::snpeff::annotate::{annotate, AnnotationOptions, RunSummary};
use crate::snpeff::config::{check_contigs, DatabaseConfigBuilder};
use crate::snpeff::database::{build_database, AnnotationFile};
use crate::snpeff::executables;
use crate::vcf::issues::{count_issues, report_issues};
use crate::vcf::merge::{merge_headers, merge_with_stats};
use crate::vcf::{self, Origin, Vcf};

const STAGING_PREFIX: &str = "snpeff_data_dir_";
const STAGED_INPUT: &str = "input.vcf";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Coding table specification; without one every contig gets the fallback code.
    pub coding_table: Option<String>,
    pub fallback: bool,
    pub snpeff: Option<PathBuf>,
    pub java: Option<PathBuf>,
    pub java_heap: String,
    pub summary: PathBuf,
    pub html_summary: Option<PathBuf>,
    pub keep: bool,
    pub debug: bool,
    /// Directory the staging directory is created in.
    pub staging_root: PathBuf,
}

/// The run's staging directory.
struct Workspace {
    dir: Option<TempDir>,
    keep: bool,
}

impl Workspace {
    fn create(root: &Path, keep: bool) -> errors::Result<Self> {
        // Paths under the workspace are handed to tools running inside it.
        let root = root.canonicalize().context(errors::StagingIo {
            action: "resolve",
            path: root.to_owned(),
        })?;
        let dir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&root)
            .context(errors::StagingIo {
                action: "create staging directory in",
                path: root.clone(),
            })?;
        debug!("Staging in {}", dir.path().display());
        Ok(Workspace {
            dir: Some(dir),
            keep,
        })
    }

    fn path(&self) -> &Path {
        self.dir.as_ref().map_or_else(|| Path::new("."), |dir| dir.path())
    }

    /// Unique per run, also used as the genome id.
    fn name(&self) -> String {
        self.path()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            if self.keep {
                let path = dir.keep();
                info!("Keeping the staging directory {}", path.display());
            } else {
                debug!("Removing {}", dir.path().display());
            }
        }
    }
}

/// Annotate the calls read from `input` against `annotation_path`.
pub fn annotate_vcf<R: BufRead>(
    annotation_path: &Path,
    input: R,
    options: &RunOptions,
    runner: &dyn ToolRunner,
) -> errors::Result<(Vcf, RunSummary)> {
    let coding_table = match &options.coding_table {
        Some(spec) => coding_table::resolve(spec)?,
        None => CodingTable::default(),
    };
    let annotation = AnnotationFile::inspect(annotation_path)?;
    let original = vcf::read(input, Origin::Input)?;
    if original.records.is_empty() {
        warn!("The input VCF contains no records");
    }
    check_contigs(&original.contigs(), &annotation.contigs, &coding_table);
    let fallback = if options.fallback {
        Some(GeneticCode::fallback())
    } else {
        None
    };
    let builder = DatabaseConfigBuilder::new(&coding_table, fallback);
    // Fail on unmapped contigs before anything is staged.
    builder.assign(&annotation.contigs)?;

    let workspace = Workspace::create(&options.staging_root, options.keep)?;
    let config = builder.build(&annotation.contigs, &workspace.name(), workspace.path())?;
    let executables =
        executables::resolve(options.snpeff.as_deref(), options.java.as_deref(), runner)?;

    let staged = workspace.path().join(STAGED_INPUT);
    stage_input(&original, &staged)?;

    build_database(
        &annotation,
        &config,
        &executables,
        &options.java_heap,
        options.debug,
        runner,
    )?;
    let annotation_options = AnnotationOptions::new(
        options.java_heap.clone(),
        options.debug,
        options.html_summary.clone(),
    );
    let (output, mut summary) = annotate(&staged, &config, &executables, &annotation_options, runner)?;
    let annotated = vcf::read(output, Origin::Annotator)?;

    info!("Merging annotations into the input records");
    let header = merge_headers(&original.header, &annotated.header);
    let (records, stats) = merge_with_stats(&original.records, annotated.records);
    let issues = count_issues(&records);
    report_issues(&issues);

    summary.processed = records.len();
    summary.annotated = stats.annotated;
    summary.passed_through = stats.passed_through;
    summary.issues = issues;
    summary.retain(&options.summary, options.html_summary.as_deref())?;

    Ok((Vcf { header, records }, summary))
}

fn stage_input(calls: &Vcf, path: &Path) -> errors::Result<()> {
    let io_err = |_: &mut io::Error| errors::StagingIo {
        action: "write",
        path: path.to_owned(),
    };
    let file = File::create(path).with_context(io_err)?;
    vcf::write(calls, BufWriter::new(file)).with_context(io_err)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::process::fake::{failed, ok, FakeRunner};
    use crate::process::{Invocation, Sink, ToolOutput};
    use crate::snpeff::database::tests::MINIMAL_GFF;
    use crate::vcf::tests::{calls, CALLS};

    struct Fixture {
        _dir: tempfile::TempDir,
        gff: PathBuf,
        options: RunOptions,
    }

    fn fixture(coding_table: Option<&str>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let gff = dir.path().join("minimal.gff");
        fs::write(&gff, MINIMAL_GFF).unwrap();
        let jar = dir.path().join("snpEff.jar");
        fs::write(&jar, b"").unwrap();
        let staging_root = dir.path().join("work");
        fs::create_dir(&staging_root).unwrap();
        let options = RunOptions {
            coding_table: coding_table.map(|spec| spec.to_owned()),
            fallback: true,
            snpeff: Some(jar),
            java: Some(PathBuf::from("java")),
            java_heap: "4g".to_owned(),
            summary: dir.path().join("calls.csv"),
            html_summary: None,
            keep: false,
            debug: false,
            staging_root,
        };
        Fixture {
            _dir: dir,
            gff,
            options,
        }
    }

    /// Plays `java -version`, `snpEff build` and `snpEff ann`. Annotates chr1 calls
    /// and emits them in reverse order.
    fn fake_java(invocation: &Invocation) -> ToolOutput {
        let args = invocation
            .args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        if args.iter().any(|arg| arg == "-version") {
            return ToolOutput {
                code: Some(0),
                stdout: Vec::new(),
                stderr: b"openjdk version \"17.0.2\" 2022-01-18\n".to_vec(),
            };
        }
        if args.iter().any(|arg| arg == "ann") {
            let input = fs::read_to_string(args.last().unwrap()).unwrap();
            let mut header = Vec::new();
            let mut records = Vec::new();
            for line in input.lines() {
                if line.starts_with("##") {
                    header.push(line.to_owned());
                } else if line.starts_with('#') {
                    header.push("##SnpEffVersion=\"5.0\"".to_owned());
                    header.push(line.to_owned());
                } else if line.starts_with("chr1\t") {
                    let mut fields = line.split('\t').map(|f| f.to_owned()).collect::<Vec<_>>();
                    fields[7] = format!("{};ANN={}|missense_variant", fields[7], fields[4]);
                    records.push(fields.join("\t"));
                } else {
                    records.push(line.to_owned());
                }
            }
            records.reverse();
            header.extend(records);
            if let Sink::File(path) = &invocation.stdout {
                fs::write(path, header.join("\n") + "\n").unwrap();
            }
            fs::write(invocation.arg_after("-csvStats").unwrap(), "# stats\n").unwrap();
        }
        ok()
    }

    fn staging_dirs(root: &Path) -> usize {
        fs::read_dir(root).unwrap().count()
    }

    #[test]
    fn bogus_coding_table_spawns_nothing() {
        let fx = fixture(Some("Bogus"));
        let runner = FakeRunner::new(fake_java);
        let result = annotate_vcf(&fx.gff, CALLS.as_bytes(), &fx.options, &runner);
        assert!(matches!(
            result,
            Err(errors::Error::UnknownCodingTable { .. })
        ));
        assert!(runner.invocations.borrow().is_empty());
        assert_eq!(staging_dirs(&fx.options.staging_root), 0);
    }

    #[test]
    fn annotates_in_input_order() {
        let fx = fixture(Some("default: Standard"));
        let runner = FakeRunner::new(fake_java);
        let (vcf, summary) = annotate_vcf(&fx.gff, CALLS.as_bytes(), &fx.options, &runner).unwrap();

        assert_eq!(runner.calls_with("build"), 1);
        assert_eq!(runner.calls_with("ann"), 1);

        let input = calls();
        assert_eq!(vcf.records.len(), input.records.len());
        for (merged, original) in vcf.records.iter().zip(&input.records) {
            assert_eq!(merged.key(), original.key());
            assert_eq!(merged.samples, original.samples);
        }
        assert_eq!(
            vcf.records[0].annotation().as_deref(),
            Some("ANN=G|missense_variant")
        );
        assert_eq!(
            vcf.records[1].annotation().as_deref(),
            Some("ANN=T|missense_variant")
        );
        assert_eq!(vcf.records[2], input.records[2]);
        assert!(vcf
            .header
            .meta
            .iter()
            .any(|line| line.starts_with("##SnpEffVersion")));
        assert_eq!(vcf.header.columns, input.header.columns);

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.annotated, 2);
        assert_eq!(summary.passed_through, 1);
        assert_eq!(summary.csv, fx.options.summary);
        assert!(fx.options.summary.is_file());
        assert_eq!(staging_dirs(&fx.options.staging_root), 0);
    }

    #[test]
    fn failed_build_cleans_up_and_skips_annotation() {
        let fx = fixture(None);
        let runner = FakeRunner::new(|inv| {
            if inv.args.iter().any(|arg| arg == "build") {
                failed(1, "could not build")
            } else {
                fake_java(inv)
            }
        });
        assert!(matches!(
            annotate_vcf(&fx.gff, CALLS.as_bytes(), &fx.options, &runner),
            Err(errors::Error::DatabaseBuild { .. })
        ));
        assert_eq!(runner.calls_with("ann"), 0);
        assert_eq!(staging_dirs(&fx.options.staging_root), 0);
    }

    #[test]
    fn kept_staging_directory_survives() {
        let mut fx = fixture(Some("Standard"));
        fx.options.keep = true;
        let runner = FakeRunner::new(fake_java);
        annotate_vcf(&fx.gff, CALLS.as_bytes(), &fx.options, &runner).unwrap();

        let kept = fs::read_dir(&fx.options.staging_root)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect::<Vec<_>>();
        assert_eq!(kept.len(), 1);
        let name = kept[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(STAGING_PREFIX));
        assert!(kept[0].join("snpEff.config").is_file());
        assert!(kept[0].join("data").join(&name).join("genes.gff").is_file());
        assert!(kept[0].join("snpeff_build_db.e").is_file());
    }

    #[test]
    fn missing_default_without_fallback_fails_before_staging() {
        let mut fx = fixture(Some("{chrM: Vertebrate_Mitochondrial}"));
        fx.options.fallback = false;
        let runner = FakeRunner::new(fake_java);
        assert!(matches!(
            annotate_vcf(&fx.gff, CALLS.as_bytes(), &fx.options, &runner),
            Err(errors::Error::NoDefaultCodingTable { .. })
        ));
        assert!(runner.invocations.borrow().is_empty());
        assert_eq!(staging_dirs(&fx.options.staging_root), 0);
    }
}
