//! Run `snpEff ann` once against the staged calls and the run's database.
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use derive_new::new;
use log::{debug, info};
use snafu::ResultExt;

use super::config::RunConfiguration;
use super::database::keep_log;
use super::executables::Executables;
use super::java_args;
use crate::errors;
use crate::process::{Invocation, Sink, ToolRunner};
use crate::vcf::issues::IssueCounts;

const OUTPUT_VCF: &str = "snpeff_output.vcf";
const CSV_STATS: &str = "snpeff_summary.csv";
const HTML_STATS: &str = "snpeff_summary.html";

/// Annotation steps snpEff would otherwise add but that are not wanted here.
const SKIPPED_EFFECTS: &[&str] = &[
    "-no-downstream",
    "-no-intergenic",
    "-no-intron",
    "-no-upstream",
    "-no-utr",
];

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct AnnotationOptions {
    pub java_heap: String,
    /// Stream snpEff's diagnostics instead of capturing them.
    pub debug: bool,
    /// Retain snpEff's HTML stats here as well.
    pub html_summary: Option<PathBuf>,
}

/// What is left of a run once the staging directory is gone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// snpEff's CSV stats.
    pub csv: PathBuf,
    pub html: Option<PathBuf>,
    pub processed: usize,
    pub annotated: usize,
    pub passed_through: usize,
    pub issues: IssueCounts,
}

impl RunSummary {
    /// Move the stats files out of the staging directory.
    pub fn retain(&mut self, csv: &Path, html: Option<&Path>) -> errors::Result<()> {
        move_file(&self.csv, csv)?;
        self.csv = csv.to_owned();
        if let (Some(staged), Some(target)) = (self.html.as_ref(), html) {
            move_file(staged, target)?;
            self.html = Some(target.to_owned());
        } else {
            self.html = None;
        }
        Ok(())
    }

    pub fn log(&self) {
        info!(
            "Annotated {} of {} record(s), {} passed through without annotation",
            self.annotated, self.processed, self.passed_through
        );
        let issues: usize = self.issues.values().sum();
        if issues > 0 {
            info!("{} record(s) carry annotator warnings or errors", issues);
        }
        info!("snpEff summary written to {}", self.csv.display());
        if let Some(html) = &self.html {
            info!("snpEff HTML summary written to {}", html.display());
        }
    }
}

fn move_file(from: &Path, to: &Path) -> errors::Result<()> {
    debug!("Moving {} to {}", from.display(), to.display());
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    // Different file systems.
    fs::copy(from, to).context(errors::StagingIo {
        action: "copy summary to",
        path: to.to_owned(),
    })?;
    Ok(())
}

/// Annotate `vcf` and hand back a reader over snpEff's output plus the stats it wrote.
pub fn annotate(
    vcf: &Path,
    config: &RunConfiguration,
    executables: &Executables,
    options: &AnnotationOptions,
    runner: &dyn ToolRunner,
) -> errors::Result<(BufReader<File>, RunSummary)> {
    let staging = &config.staging_dir;
    let output = staging.join(OUTPUT_VCF);
    let csv = staging.join(CSV_STATS);
    let html = staging.join(HTML_STATS);

    let mut args = java_args(executables, &options.java_heap);
    args.extend(
        ["ann", "-nodownload", "-verbose"]
            .iter()
            .chain(SKIPPED_EFFECTS)
            .map(Into::into),
    );
    args.push("-csvStats".into());
    args.push(csv.clone().into_os_string());
    args.push("-stats".into());
    args.push(html.clone().into_os_string());
    args.push("-c".into());
    args.push(config.config_path.clone().into_os_string());
    args.push(config.genome_id.clone().into());
    args.push(vcf.to_owned().into_os_string());

    let invocation = Invocation::new(executables.java.clone(), args)
        .current_dir(staging)
        .stdout(Sink::File(output.clone()))
        .stderr(if options.debug {
            Sink::Inherit
        } else {
            Sink::Capture
        });

    info!("Annotating {}", vcf.display());
    let result = runner.run(&invocation)?;
    if !options.debug {
        keep_log(&staging.join("snpeff_annotate.e"), &result.stderr)?;
    }
    if !result.success() {
        return errors::AnnotatorInvocation {
            vcf,
            status: result.status(),
            stderr: if options.debug {
                "(diagnostics were printed above)".to_owned()
            } else {
                result.stderr_lossy()
            },
        }
        .fail();
    }

    let reader = File::open(&output).context(errors::StagingIo {
        action: "open",
        path: output.clone(),
    })?;
    let summary = RunSummary {
        csv,
        html: options.html_summary.as_ref().map(|_| html),
        ..Default::default()
    };
    Ok((BufReader::new(reader), summary))
}
