//! Reconcile snpEff's output with the calls it was given.
//!
//! snpEff may drop records it cannot process and does not promise to keep their
//! order. The merged result always has exactly the input records, in input order;
//! a record takes the annotation of the first not yet consumed output record with
//! the same (CHROM, POS, REF, ALT), and passes through untouched otherwise.
use std::collections::{HashMap, HashSet, VecDeque};

use log::{debug, warn};

use super::{Header, VariantKey, VariantRecord};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Records in the merged output that carry an annotation.
    pub annotated: usize,
    /// Records left without an annotation.
    pub passed_through: usize,
    /// Annotator records that matched no input record.
    pub unmatched: usize,
}

pub fn merge(original: &[VariantRecord], annotated: Vec<VariantRecord>) -> Vec<VariantRecord> {
    merge_with_stats(original, annotated).0
}

pub fn merge_with_stats(
    original: &[VariantRecord],
    annotated: Vec<VariantRecord>,
) -> (Vec<VariantRecord>, MergeStats) {
    let mut pending: HashMap<VariantKey, VecDeque<VariantRecord>> = HashMap::new();
    for rec in annotated {
        pending.entry(rec.key()).or_default().push_back(rec);
    }

    let mut stats = MergeStats::default();
    let merged: Vec<VariantRecord> = original
        .iter()
        .map(|rec| {
            let merged = match pending.get_mut(&rec.key()).and_then(VecDeque::pop_front) {
                Some(hit) => rec.with_annotation(hit.annotation().as_deref()),
                None => {
                    debug!(
                        "No annotator output for {}:{} {}>{}",
                        rec.chrom, rec.pos, rec.reference, rec.alternate
                    );
                    rec.clone()
                }
            };
            if merged.is_annotated() {
                stats.annotated += 1;
            } else {
                stats.passed_through += 1;
            }
            merged
        })
        .collect();

    stats.unmatched = pending.values().map(VecDeque::len).sum();
    if stats.unmatched > 0 {
        warn!(
            "{} annotator record(s) did not correspond to any input record and were ignored",
            stats.unmatched
        );
    }
    (merged, stats)
}

/// Input header extended by the meta lines the annotator added (INFO definitions,
/// program version, command line). The column line is the input's.
pub fn merge_headers(original: &Header, annotated: &Header) -> Header {
    let known: HashSet<&str> = original.meta.iter().map(|line| line.as_str()).collect();
    let mut meta = original.meta.clone();
    meta.extend(
        annotated
            .meta
            .iter()
            .filter(|line| !known.contains(line.as_str()))
            .cloned(),
    );
    Header {
        meta,
        columns: original.columns.clone(),
    }
}
