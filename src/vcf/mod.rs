//! Line-level VCF handling: just enough structure to stage calls for snpEff and to
//! reconcile its output with the input. Header lines and all non-key columns are
//! carried verbatim.
pub mod issues;
pub mod merge;

use std::fmt;
use std::io::{BufRead, Write};

use itertools::Itertools;
use snafu::ResultExt;

use crate::errors;

/// INFO keys written by snpEff. Together they make up a record's annotation.
pub const ANNOTATION_KEYS: &[&str] = &["ANN", "EFF", "LOF", "NMD"];

const MISSING: &str = ".";

/// Where a VCF stream came from; decides which error a parse failure becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Input,
    Annotator,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Origin::Input => f.write_str("input VCF"),
            Origin::Annotator => f.write_str("annotator output"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    /// `##` lines, in file order.
    pub meta: Vec<String>,
    /// The `#CHROM ...` column line.
    pub columns: String,
}

/// Identity of a call for matching purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariantKey {
    pub chrom: String,
    pub pos: u64,
    pub reference: String,
    pub alternate: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantRecord {
    /// Position of the record in the stream it was read from.
    pub ordinal: usize,
    pub chrom: String,
    pub pos: u64,
    /// POS as written in the file.
    pub position: String,
    pub id: String,
    pub reference: String,
    pub alternate: String,
    pub qual: String,
    pub filter: String,
    /// The INFO column as written, including any annotator entries.
    pub info: String,
    /// FORMAT and sample columns.
    pub samples: Vec<String>,
}

impl VariantRecord {
    pub fn from_line(line: &str, ordinal: usize) -> Result<Self, String> {
        let fields = line.split('\t').collect_vec();
        if fields.len() < 8 {
            return Err(format!(
                "expected at least 8 tab-separated columns, found {}",
                fields.len()
            ));
        }
        let pos = fields[1]
            .parse::<u64>()
            .map_err(|_| format!("invalid POS {:?}", fields[1]))?;
        if fields[0].is_empty() {
            return Err("empty CHROM".to_owned());
        }
        if fields[3].is_empty() || fields[4].is_empty() {
            return Err("empty REF or ALT".to_owned());
        }

        Ok(VariantRecord {
            ordinal,
            chrom: fields[0].to_owned(),
            pos,
            position: fields[1].to_owned(),
            id: fields[2].to_owned(),
            reference: fields[3].to_owned(),
            alternate: fields[4].to_owned(),
            qual: fields[5].to_owned(),
            filter: fields[6].to_owned(),
            info: fields[7].to_owned(),
            samples: fields[8..].iter().map(|s| (*s).to_owned()).collect(),
        })
    }

    pub fn key(&self) -> VariantKey {
        VariantKey {
            chrom: self.chrom.clone(),
            pos: self.pos,
            reference: self.reference.clone(),
            alternate: self.alternate.clone(),
        }
    }

    /// The annotator's INFO entries (`ANN=...;LOF=...`), if any.
    pub fn annotation(&self) -> Option<String> {
        let entries = self
            .info
            .split(';')
            .filter(|entry| is_annotation_entry(entry))
            .collect_vec();
        if entries.is_empty() {
            None
        } else {
            Some(entries.join(";"))
        }
    }

    pub fn is_annotated(&self) -> bool {
        self.info.split(';').any(is_annotation_entry)
    }

    /// This record with its annotator entries replaced by `annotation`.
    /// INFO is left byte for byte as it is when the annotation does not change.
    pub fn with_annotation(&self, annotation: Option<&str>) -> VariantRecord {
        if self.annotation().as_deref() == annotation {
            return self.clone();
        }
        let entries = self
            .info
            .split(';')
            .filter(|entry| !entry.is_empty() && *entry != MISSING && !is_annotation_entry(entry))
            .chain(annotation)
            .join(";");
        VariantRecord {
            info: if entries.is_empty() {
                MISSING.to_owned()
            } else {
                entries
            },
            ..self.clone()
        }
    }
}

fn is_annotation_entry(entry: &str) -> bool {
    ANNOTATION_KEYS.contains(&entry.split('=').next().unwrap_or(""))
}

impl fmt::Display for VariantRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.chrom,
            self.position,
            self.id,
            self.reference,
            self.alternate,
            self.qual,
            self.filter,
            self.info
        )?;
        for sample in &self.samples {
            write!(f, "\t{}", sample)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vcf {
    pub header: Header,
    pub records: Vec<VariantRecord>,
}

impl Vcf {
    /// Contigs referenced by the records, in order of first appearance.
    pub fn contigs(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|rec| rec.chrom.as_str())
            .unique()
            .map(|chrom| chrom.to_owned())
            .collect()
    }
}

/// Read a whole VCF stream.
pub fn read<R: BufRead>(reader: R, origin: Origin) -> errors::Result<Vcf> {
    let malformed = |line: usize, reason: String| match origin {
        Origin::Input => errors::Error::MalformedVcf { line, reason },
        Origin::Annotator => errors::Error::MalformedAnnotatorOutput { line, reason },
    };

    let mut vcf = Vcf::default();
    let mut seen_columns = false;
    for (i, line) in reader.lines().enumerate() {
        let line = line.context(errors::VcfRead {
            origin: origin.to_string(),
        })?;
        let line = line.trim_end_matches('\r');
        let lineno = i + 1;
        if line.is_empty() {
            continue;
        }
        if line.starts_with("##") {
            if seen_columns {
                return Err(malformed(
                    lineno,
                    "meta-information line after the #CHROM header".to_owned(),
                ));
            }
            vcf.header.meta.push(line.to_owned());
        } else if line.starts_with('#') {
            if seen_columns {
                return Err(malformed(lineno, "duplicate #CHROM header".to_owned()));
            }
            if !line.starts_with("#CHROM") {
                return Err(malformed(lineno, format!("unexpected header line {:?}", line)));
            }
            vcf.header.columns = line.to_owned();
            seen_columns = true;
        } else {
            if !seen_columns {
                return Err(malformed(
                    lineno,
                    "record before the #CHROM header".to_owned(),
                ));
            }
            let ordinal = vcf.records.len();
            let record =
                VariantRecord::from_line(line, ordinal).map_err(|reason| malformed(lineno, reason))?;
            vcf.records.push(record);
        }
    }
    if !seen_columns {
        return Err(malformed(0, "missing #CHROM header".to_owned()));
    }
    Ok(vcf)
}

pub fn write<W: Write>(vcf: &Vcf, mut writer: W) -> std::io::Result<()> {
    for line in &vcf.header.meta {
        writeln!(writer, "{}", line)?;
    }
    writeln!(writer, "{}", vcf.header.columns)?;
    for record in &vcf.records {
        writeln!(writer, "{}", record)?;
    }
    writer.flush()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const CALLS: &str = "##fileformat=VCFv4.2\n\
##contig=<ID=chr1,length=120>\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tsample\n\
chr1\t10\t.\tA\tG\t50\tPASS\tDP=10\tGT\t0/1\n\
chr1\t42\trs1\tC\tT\t.\t.\t.\tGT\t1/1\n\
chr2\t7\t.\tG\tGA\t12.5\tPASS\tDP=3;AF=0.5\tGT\t0/1\n";

    pub(crate) fn calls() -> Vcf {
        read(CALLS.as_bytes(), Origin::Input).unwrap()
    }

    #[test]
    fn reads_header_and_records() {
        let vcf = calls();
        assert_eq!(vcf.header.meta.len(), 2);
        assert!(vcf.header.columns.starts_with("#CHROM\tPOS"));
        assert_eq!(vcf.records.len(), 3);
        let rec = &vcf.records[2];
        assert_eq!(rec.ordinal, 2);
        assert_eq!(rec.chrom, "chr2");
        assert_eq!(rec.pos, 7);
        assert_eq!(rec.reference, "G");
        assert_eq!(rec.alternate, "GA");
        assert_eq!(rec.info, "DP=3;AF=0.5");
        assert_eq!(rec.annotation(), None);
        assert_eq!(rec.samples, vec!["GT", "0/1"]);
        assert_eq!(vcf.contigs(), vec!["chr1", "chr2"]);
    }

    #[test]
    fn writes_input_back_unchanged() {
        let mut out = Vec::new();
        write(&calls(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), CALLS);
    }

    #[test]
    fn annotation_entries_are_found_in_info() {
        let rec = VariantRecord::from_line(
            "chr1\t10\t.\tA\tG\t50\tPASS\tDP=10;ANN=G|missense_variant;LOF=(g|1|1|1.00)",
            0,
        )
        .unwrap();
        assert!(rec.is_annotated());
        assert_eq!(
            rec.annotation().as_deref(),
            Some("ANN=G|missense_variant;LOF=(g|1|1|1.00)")
        );
        assert_eq!(
            rec.with_annotation(Some("ANN=G|synonymous_variant")).info,
            "DP=10;ANN=G|synonymous_variant"
        );
        assert_eq!(rec.with_annotation(None).info, "DP=10");

        let bare = VariantRecord::from_line("chr1\t10\t.\tA\tG\t50\tPASS\t.", 0).unwrap();
        assert_eq!(bare.annotation(), None);
        assert_eq!(bare.with_annotation(Some("ANN=G|x")).info, "ANN=G|x");
        assert_eq!(bare.with_annotation(None), bare);
    }

    #[test]
    fn unchanged_records_are_written_verbatim() {
        let line = "chr9\t0010\t.\tA\tG\t50\tPASS\tANN=G|old;;DP=10\tGT\t0/1";
        let rec = VariantRecord::from_line(line, 0).unwrap();
        assert_eq!(rec.pos, 10);
        assert_eq!(rec.to_string(), line);
        assert_eq!(rec.with_annotation(Some("ANN=G|old")).to_string(), line);
    }

    #[test]
    fn malformed_records_are_reported_by_origin() {
        let broken = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\nchr1\tten\t.\tA\tG\t.\t.\t.\n";
        match read(broken.as_bytes(), Origin::Input) {
            Err(errors::Error::MalformedVcf { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected {:?}", other),
        }
        match read(broken.as_bytes(), Origin::Annotator) {
            Err(errors::Error::MalformedAnnotatorOutput { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            read("chr1\t1\t.\tA\tG\t.\t.\t.\n".as_bytes(), Origin::Annotator),
            Err(errors::Error::MalformedAnnotatorOutput { .. })
        ));
        assert!(matches!(
            read("".as_bytes(), Origin::Annotator),
            Err(errors::Error::MalformedAnnotatorOutput { line: 0, .. })
        ));
        assert!(matches!(
            read(
                "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\nchr1\t1\t.\tA\n".as_bytes(),
                Origin::Annotator
            ),
            Err(errors::Error::MalformedAnnotatorOutput { .. })
        ));
    }
}
