//! Look for well-known snpEff warning and error codes in annotated records.
use std::collections::BTreeMap;

use log::{info, warn};

use super::VariantRecord;

const KNOWN_ISSUES: &[(&str, &str)] = &[
    (
        "WARNING_REF_DOES_NOT_MATCH_GENOME",
        "The reference base in your VCF didn't match the base in the annotation file. Are you sure you have the right reference?",
    ),
    (
        "WARNING_SEQUENCE_NOT_AVAILABLE",
        "A reference sequence was not available in your annotation file. Please check that a reference sequence is available for every contig in your VCF",
    ),
    (
        "WARNING_TRANSCRIPT_NO_START_CODON",
        "Start codon does not match any 'start' codon in the CodonTable. This usually indicates an error on the reference genome (or database) but could be also due to a misconfigured codon table for the genome.",
    ),
    (
        "ERROR_CHROMOSOME_NOT_FOUND",
        "A contig in your VCF could not be found in your annotation file. Are you sure that contigs use consistent names between your input data and the reference?",
    ),
    (
        "ERROR_OUT_OF_CHROMOSOME_RANGE",
        "One of your variants appears to be in a position beyond the end of the reference sequence. Please check that your reference sequence matches your input data",
    ),
];

/// Number of records mentioning each known issue code.
pub type IssueCounts = BTreeMap<&'static str, usize>;

pub fn count_issues(records: &[VariantRecord]) -> IssueCounts {
    let mut counts = IssueCounts::new();
    for annotation in records.iter().filter_map(VariantRecord::annotation) {
        for &(code, _) in KNOWN_ISSUES {
            if annotation.contains(code) {
                *counts.entry(code).or_insert(0) += 1;
            }
        }
    }
    counts
}

/// Log one warning per issue code seen. Returns whether anything was reported.
pub fn report_issues(counts: &IssueCounts) -> bool {
    info!("Checking the annotated VCF for common issues");
    for &(code, explanation) in KNOWN_ISSUES {
        if let Some(count) = counts.get(code) {
            warn!("{} instances of '{}': {}", count, code, explanation);
        }
    }
    if counts.is_empty() {
        false
    } else {
        warn!("There were problems during the annotation, please review the warnings for details");
        true
    }
}
