//! Driving snpEff: run-scoped config, database build and annotation.
pub mod annotate;
pub mod config;
pub mod database;
pub mod executables;

use std::ffi::OsString;

use executables::Executables;

/// Leading `java` arguments shared by every snpEff call: heap size and jar.
pub(crate) fn java_args(executables: &Executables, java_heap: &str) -> Vec<OsString> {
    vec![
        format!("-Xmx{}", java_heap).into(),
        "-jar".into(),
        executables.snpeff.clone().into_os_string(),
    ]
}
