use std::path::PathBuf;

use snafu::Snafu;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
#[snafu(context(suffix(false)))]
pub enum Error {
    #[snafu(display("Could not parse coding table specification {:?}: {}", spec, reason))]
    MalformedSpec { spec: String, reason: String },

    #[snafu(display(
        "Could not find coding table(s) {}, see `snpeff-build-and-run coding-tables` for the supported names",
        names.join(", ")
    ))]
    UnknownCodingTable { names: Vec<String> },

    #[snafu(display(
        "Could not find coding tables for all contigs, no coding table set for {} and no default given",
        contigs.join(", ")
    ))]
    NoDefaultCodingTable { contigs: Vec<String> },

    #[snafu(display("Could not find {} (looked at: {})", name, searched))]
    ExecutableNotFound { name: String, searched: String },

    #[snafu(display("Needs an OpenJDK runtime, {} is not suitable: {}", path.display(), reason))]
    UnsuitableRuntime { path: PathBuf, reason: String },

    #[snafu(display(
        "Annotation file {} has no embedded reference sequence (missing ##FASTA section)",
        path.display()
    ))]
    MissingReferenceSequence { path: PathBuf },

    #[snafu(display(
        "Problem building the database from your annotation file ({}):\n{}",
        status,
        stderr
    ))]
    DatabaseBuild { status: String, stderr: String },

    #[snafu(display("Problem annotating {} ({}):\n{}", vcf.display(), status, stderr))]
    AnnotatorInvocation {
        vcf: PathBuf,
        status: String,
        stderr: String,
    },

    #[snafu(display("Could not parse annotator output at line {}: {}", line, reason))]
    MalformedAnnotatorOutput { line: usize, reason: String },

    #[snafu(display("Could not parse input VCF at line {}: {}", line, reason))]
    MalformedVcf { line: usize, reason: String },

    #[snafu(display("Could not read {}", origin))]
    VcfRead {
        origin: String,
        source: std::io::Error,
    },

    #[snafu(display("Failed to run {}", program.display()))]
    ToolSpawn {
        program: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Failed to {} {}", action, path.display()))]
    StagingIo {
        action: String,
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Failed to render snpEff config"))]
    ConfigTemplate { source: tera::Error },
}
