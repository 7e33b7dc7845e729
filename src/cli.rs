use std::path::PathBuf;
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(
    about = "Build a throwaway snpEff database from a GFF/GTF with embedded sequence and annotate a VCF against it.",
    name = "snpeff-build-and-run"
)]
pub(crate) struct SnpEffBuildAndRun {
    #[structopt(long, short, help = "Verbose output.")]
    pub(crate) verbose: bool,

    #[structopt(subcommand)]
    pub(crate) cmd: Command,
}

#[derive(StructOpt)]
pub(crate) enum Command {
    /// Annotate a VCF with snpEff using a database built from the given annotation file.
    ///
    /// The annotation file must be GFF3 or GTF 2.2 (optionally gzipped) with the
    /// reference sequence embedded after a ##FASTA line. Every input record is
    /// written out in input order, annotated where snpEff could annotate it.
    ///
    /// Example:
    /// snpeff-build-and-run annotate -c '{chrM: Vertebrate_Mitochondrial, default: Standard}' \
    ///     genome.gff calls.vcf > annotated.vcf
    Annotate {
        /// GFF3 or GTF file with an embedded reference sequence.
        #[structopt(parse(from_os_str))]
        annotation_file: PathBuf,

        /// VCF to annotate, `-` for STDIN.
        #[structopt(parse(from_os_str))]
        vcf_file: PathBuf,

        /// Output VCF, STDOUT if not given.
        #[structopt(long, short, parse(from_os_str))]
        output: Option<PathBuf>,

        /// Genetic code per contig, e.g. `Standard` or
        /// `{chrM: Vertebrate_Mitochondrial, default: Standard}`.
        /// Run `snpeff-build-and-run coding-tables` for the supported names.
        #[structopt(long, short)]
        coding_table: Option<String>,

        /// Fail for contigs without a coding table instead of using snpEff's
        /// fallback (Bacterial_and_Plant_Plastid).
        #[structopt(long)]
        no_fallback_coding_table: bool,

        /// Where to keep snpEff's CSV summary [default: <output>.csv, or
        /// snpeff_summary.csv when writing to STDOUT].
        #[structopt(long, parse(from_os_str))]
        summary: Option<PathBuf>,

        /// Also keep snpEff's HTML summary at this path.
        #[structopt(long, parse(from_os_str))]
        html_summary: Option<PathBuf>,

        /// Path to snpEff.jar [default: ./snpEff.jar, then PATH].
        #[structopt(long, parse(from_os_str))]
        snpeff_exec: Option<PathBuf>,

        /// Java runtime to run snpEff with [default: first OpenJDK found].
        #[structopt(long, parse(from_os_str))]
        java_exec: Option<PathBuf>,

        /// Maximum Java heap size.
        #[structopt(long, default_value = "4g")]
        java_heap: String,

        /// Keep the staging directory with the database, config and snpEff logs.
        #[structopt(long)]
        keep: bool,

        /// Print snpEff's diagnostics instead of capturing them.
        #[structopt(long)]
        debug: bool,
    },

    /// Print the supported genetic code names, one per line.
    CodingTables {},
}
