//! Locate `snpEff.jar` and a Java runtime able to run it.
use std::path::{Path, PathBuf};

use itertools::Itertools;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

use crate::errors;
use crate::process::{Invocation, ToolRunner};

pub const SNPEFF_JAR: &str = "snpEff.jar";

const EXTRA_JAVA_CANDIDATES: &[&str] = &["/software/bin/java"];

lazy_static! {
    static ref OPENJDK_RE: Regex = Regex::new(r"^openjdk").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Executables {
    pub java: PathBuf,
    pub snpeff: PathBuf,
}

/// Validate explicit paths, or search for defaults where none were given.
pub fn resolve(
    snpeff: Option<&Path>,
    java: Option<&Path>,
    runner: &dyn ToolRunner,
) -> errors::Result<Executables> {
    let snpeff = resolve_snpeff(snpeff, Path::new("."))?;
    let java = resolve_java(java, runner)?;
    debug!("Using '{}' with '{}'", snpeff.display(), java.display());
    Ok(Executables { java, snpeff })
}

/// `explicit`, else `snpEff.jar` in `workdir`, else `snpEff.jar` on `PATH`.
pub fn resolve_snpeff(explicit: Option<&Path>, workdir: &Path) -> errors::Result<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(absolute(path));
        }
        return errors::ExecutableNotFound {
            name: SNPEFF_JAR,
            searched: path.display().to_string(),
        }
        .fail();
    }
    let local = workdir.join(SNPEFF_JAR);
    if local.is_file() {
        return Ok(absolute(&local));
    }
    which::which(SNPEFF_JAR).or_else(|_| {
        errors::ExecutableNotFound {
            name: SNPEFF_JAR,
            searched: format!("{}, PATH", local.display()),
        }
        .fail()
    })
}

/// `explicit` if it is a suitable runtime, else the first suitable candidate.
pub fn resolve_java(explicit: Option<&Path>, runner: &dyn ToolRunner) -> errors::Result<PathBuf> {
    if let Some(path) = explicit {
        let path = &absolute(path);
        return match check_java(path, runner) {
            Ok(()) => Ok(path.to_owned()),
            Err(reason) => errors::UnsuitableRuntime { path, reason }.fail(),
        };
    }

    let candidates = which::which("java")
        .into_iter()
        .chain(EXTRA_JAVA_CANDIDATES.iter().map(PathBuf::from))
        .collect_vec();
    for java in &candidates {
        match check_java(java, runner) {
            Ok(()) => {
                debug!("Using '{}'", java.display());
                return Ok(java.clone());
            }
            Err(reason) => debug!("Skipping '{}': {}", java.display(), reason),
        }
    }
    errors::ExecutableNotFound {
        name: "a suitable version of Java",
        searched: if candidates.is_empty() {
            "PATH".to_owned()
        } else {
            candidates.iter().map(|c| c.display()).join(", ")
        },
    }
    .fail()
}

/// snpEff runs inside the staging directory, so existing paths are made absolute.
/// Bare names are left for the `PATH` lookup.
fn absolute(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_owned())
}

/// `<java> -Xmx10m -version` must succeed and report an OpenJDK build.
fn check_java(java: &Path, runner: &dyn ToolRunner) -> Result<(), String> {
    let invocation = Invocation::new(java.to_owned(), vec!["-Xmx10m".into(), "-version".into()]);
    let output = runner
        .run(&invocation)
        .map_err(|e| format!("could not be executed ({})", e))?;
    if !output.success() {
        return Err(format!("`-version` failed with {}", output.status()));
    }
    // Java prints its version banner to stderr.
    let banner = if output.stderr.is_empty() {
        String::from_utf8_lossy(&output.stdout).into_owned()
    } else {
        output.stderr_lossy()
    };
    match banner.lines().next() {
        Some(first) if OPENJDK_RE.is_match(first) => Ok(()),
        Some(first) => Err(format!("expected an OpenJDK runtime, found {:?}", first)),
        None => Err("`-version` printed nothing".to_owned()),
    }
}
