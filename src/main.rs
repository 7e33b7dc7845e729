//! snpeff-build-and-run: annotate variants with snpEff against a database built on the fly
//! from a GFF/GTF file with embedded sequence.
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::{error, LevelFilter};
use structopt::StructOpt;

use cli::Command::*;
use crate::pipeline::RunOptions;
use crate::process::ProcessRunner;

mod cli;
pub mod coding_table;
pub mod errors;
pub mod pipeline;
pub mod process;
pub mod snpeff;
pub mod vcf;

const STDIO: &str = "-";

fn main() {
    if let Err(e) = run() {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = cli::SnpEffBuildAndRun::from_args();
    let debug = matches!(args.cmd, Annotate { debug: true, .. });

    fern::Dispatch::new()
        .format(|out, message, _| out.finish(format_args!("{}", message)))
        .level(if args.verbose || debug {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .chain(io::stderr())
        .apply()
        .context("failed to set up logging")?;

    match args.cmd {
        Annotate {
            annotation_file,
            vcf_file,
            output,
            coding_table,
            no_fallback_coding_table,
            summary,
            html_summary,
            snpeff_exec,
            java_exec,
            java_heap,
            keep,
            debug,
        } => {
            let summary = summary.unwrap_or_else(|| default_summary(output.as_deref()));
            let options = RunOptions {
                coding_table,
                fallback: !no_fallback_coding_table,
                snpeff: snpeff_exec,
                java: java_exec,
                java_heap,
                summary,
                html_summary,
                keep,
                debug,
                staging_root: PathBuf::from("."),
            };
            let input = open_input(&vcf_file)?;
            let (annotated, run_summary) =
                pipeline::annotate_vcf(&annotation_file, input, &options, &ProcessRunner)?;
            write_output(&annotated, output.as_deref())?;
            run_summary.log();
        }
        CodingTables {} => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            for code in coding_table::GENETIC_CODES.iter() {
                writeln!(out, "{}", code)?;
            }
        }
    }
    Ok(())
}

/// `<output>.csv`, or `snpeff_summary.csv` when the VCF goes to STDOUT.
fn default_summary(output: Option<&Path>) -> PathBuf {
    match output {
        Some(path) if path != Path::new(STDIO) => {
            let mut name = OsString::from(path.as_os_str());
            name.push(".csv");
            PathBuf::from(name)
        }
        _ => PathBuf::from("snpeff_summary.csv"),
    }
}

fn open_input(path: &Path) -> Result<Box<dyn BufRead>> {
    if path == Path::new(STDIO) {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(path)
        .map_err(|e| anyhow!("failed to open input VCF {}: {}", path.display(), e))?;
    Ok(Box::new(BufReader::new(file)))
}

fn write_output(annotated: &vcf::Vcf, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) if path != Path::new(STDIO) => {
            let file = File::create(path)
                .map_err(|e| anyhow!("failed to create output VCF {}: {}", path.display(), e))?;
            vcf::write(annotated, BufWriter::new(file))
                .map_err(|e| anyhow!("failed to write output VCF {}: {}", path.display(), e))
        }
        _ => {
            let stdout = io::stdout();
            let out = stdout.lock();
            vcf::write(annotated, BufWriter::new(out))
                .map_err(|e| anyhow!("failed to write output VCF: {}", e))
        }
    }
}
