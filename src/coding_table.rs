//! Genetic codes understood by snpEff and the contig to code mapping given on the command line.
//!
//! A coding table specification is either a bare code name, which becomes the default,
//! or a set of `contig: code` pairs (optionally wrapped in braces) in which the key
//! `default` may appear once.
//!
//! ## Examples:
//! ```text
//! Standard
//! default: Bacterial_and_Plant_Plastid
//! {chrM: Vertebrate_Mitochondrial, default: Standard}
//! ```
//!
use std::fmt;
use std::str::FromStr;

use itertools::Itertools;
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;

use crate::errors;

pub const DEFAULT_KEY: &str = "default";

/// Code snpEff falls back to when a contig has no codon table configured.
pub const FALLBACK_CODE: &str = "Bacterial_and_Plant_Plastid";

const BASES: &[u8] = b"TCAG";

lazy_static! {
    static ref PAIR_RE: Regex = Regex::new(r"^(?P<key>.+?)\s*:\s*(?P<value>[^:\s]+)$").unwrap();
    static ref NAME_RE: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").unwrap();
}

/// A codon table in NCBI layout: 64 amino acids (and start markers) for the codons
/// TTT, TTC, TTA, TTG, TCT, ... GGG.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct GeneticCode {
    name: &'static str,
    amino_acids: &'static str,
    starts: &'static str,
}

const STANDARD: (&str, &str) = (
    "FFLLSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
    "---M------**--*----M---------------M----------------------------",
);
const VERTEBRATE_MITO: (&str, &str) = (
    "FFLLSSSSYY**CCWWLLLLPPPPHHQQRRRRIIMMTTTTNNKKSS**VVVVAAAADDEEGGGG",
    "----------**--------------------MMMM----------**---M------------",
);
const YEAST_MITO: (&str, &str) = (
    "FFLLSSSSYY**CCWWTTTTPPPPHHQQRRRRIIMMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
    "----------**----------------------MM---------------M------------",
);
const MOLD_MITO: (&str, &str) = (
    "FFLLSSSSYY**CCWWLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
    "--MM------**-------M------------MMMM---------------M------------",
);
const INVERTEBRATE_MITO: (&str, &str) = (
    "FFLLSSSSYY**CCWWLLLLPPPPHHQQRRRRIIMMTTTTNNKKSSSSVVVVAAAADDEEGGGG",
    "---M------**--------------------MMMM---------------M------------",
);
const CILIATE_NUCLEAR: (&str, &str) = (
    "FFLLSSSSYYQQCC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
    "--------------*--------------------M----------------------------",
);
const ECHINODERM_MITO: (&str, &str) = (
    "FFLLSSSSYY**CCWWLLLLPPPPHHQQRRRRIIIMTTTTNNNKSSSSVVVVAAAADDEEGGGG",
    "----------**-----------------------M---------------M------------",
);
const EUPLOTID_NUCLEAR: (&str, &str) = (
    "FFLLSSSSYY**CCCWLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
    "----------**-----------------------M----------------------------",
);
const PLASTID: (&str, &str) = (
    "FFLLSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
    "---M------**--*----M------------MMMM---------------M------------",
);
const ALT_YEAST_NUCLEAR: (&str, &str) = (
    "FFLLSSSSYY**CC*WLLLSPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
    "----------**--*----M---------------M----------------------------",
);
const ASCIDIAN_MITO: (&str, &str) = (
    "FFLLSSSSYY**CCWWLLLLPPPPHHQQRRRRIIMMTTTTNNKKSSGGVVVVAAAADDEEGGGG",
    "---M------**----------------------MM---------------M------------",
);
const ALT_FLATWORM_MITO: (&str, &str) = (
    "FFLLSSSSYYY*CCWWLLLLPPPPHHQQRRRRIIIMTTTTNNNKSSSSVVVVAAAADDEEGGGG",
    "-----------*-----------------------M----------------------------",
);
const BLEPHARISMA: (&str, &str) = (
    "FFLLSSSSYY*QCC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
    "----------*---*--------------------M----------------------------",
);
const CHLOROPHYCEAN_MITO: (&str, &str) = (
    "FFLLSSSSYY*LCC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
    "----------*---*--------------------M----------------------------",
);
const TREMATODE_MITO: (&str, &str) = (
    "FFLLSSSSYY**CCWWLLLLPPPPHHQQRRRRIIMMTTTTNNNKSSSSVVVVAAAADDEEGGGG",
    "----------**-----------------------M---------------M------------",
);
const SCENEDESMUS_MITO: (&str, &str) = (
    "FFLLSS*SYY*LCC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
    "------*---*---*--------------------M----------------------------",
);
const THRAUSTOCHYTRIUM_MITO: (&str, &str) = (
    "FF*LSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG",
    "--*-------**--*-----------------M--M---------------M------------",
);

const fn code(name: &'static str, table: (&'static str, &'static str)) -> GeneticCode {
    GeneticCode {
        name,
        amino_acids: table.0,
        starts: table.1,
    }
}

/// Every code name snpEff accepts in a `codonTable` entry, in alphabetical order.
pub static GENETIC_CODES: [GeneticCode; 25] = [
    code("Alternative_Flatworm_Mitochondrial", ALT_FLATWORM_MITO),
    code("Alternative_Yeast_Nuclear", ALT_YEAST_NUCLEAR),
    code("Ascidian_Mitochondrial", ASCIDIAN_MITO),
    code("Bacterial_and_Plant_Plastid", PLASTID),
    code("Blepharisma_Macronuclear", BLEPHARISMA),
    code("Chlorophycean_Mitochondrial", CHLOROPHYCEAN_MITO),
    code("Ciliate_Nuclear", CILIATE_NUCLEAR),
    code("Coelenterate", MOLD_MITO),
    code("Dasycladacean_Nuclear", CILIATE_NUCLEAR),
    code("Echinoderm_Mitochondrial", ECHINODERM_MITO),
    code("Euplotid_Nuclear", EUPLOTID_NUCLEAR),
    code("Flatworm_Mitochondrial", ECHINODERM_MITO),
    code("Hexamita_Nuclear", CILIATE_NUCLEAR),
    code("Invertebrate_Mitochondrial", INVERTEBRATE_MITO),
    code("Mitochondrial", VERTEBRATE_MITO),
    code("Mold_Mitochondrial", MOLD_MITO),
    code("Mycoplasma", MOLD_MITO),
    code("Protozoan_Mitochondrial", MOLD_MITO),
    code("Scenedesmus_obliquus_Mitochondrial", SCENEDESMUS_MITO),
    code("Spiroplasma", MOLD_MITO),
    code("Standard", STANDARD),
    code("Thraustochytrium_Mitochondrial", THRAUSTOCHYTRIUM_MITO),
    code("Trematode_Mitochondrial", TREMATODE_MITO),
    code("Vertebrate_Mitochondrial", VERTEBRATE_MITO),
    code("Yeast_Mitochondrial", YEAST_MITO),
];

impl GeneticCode {
    pub fn by_name(name: &str) -> Option<&'static GeneticCode> {
        GENETIC_CODES.iter().find(|code| code.name == name)
    }

    pub fn fallback() -> &'static GeneticCode {
        // FALLBACK_CODE is a member of GENETIC_CODES, checked in tests.
        GeneticCode::by_name(FALLBACK_CODE).unwrap_or(&GENETIC_CODES[3])
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Render the table the way snpEff's config expects it, e.g. `TTT/F, TTC/F, ..., TTG/L+`.
    /// Start codons carry a trailing `+`.
    pub fn codons(&self) -> String {
        let amino_acids = self.amino_acids.as_bytes();
        let starts = self.starts.as_bytes();
        BASES
            .iter()
            .cartesian_product(BASES)
            .cartesian_product(BASES)
            .enumerate()
            .map(|(i, ((&first, &second), &third))| {
                format!(
                    "{}{}{}/{}{}",
                    first as char,
                    second as char,
                    third as char,
                    amino_acids[i] as char,
                    if starts[i] == b'M' { "+" } else { "" }
                )
            })
            .join(", ")
    }
}

impl fmt::Display for GeneticCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Contig to genetic code assignment for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodingTable {
    default: Option<&'static GeneticCode>,
    contigs: Vec<(String, &'static GeneticCode)>,
}

impl CodingTable {
    pub fn default_code(&self) -> Option<&'static GeneticCode> {
        self.default
    }

    /// The explicitly configured code for `contig`, falling back to the `default` entry.
    pub fn get(&self, contig: &str) -> Option<&'static GeneticCode> {
        self.contigs
            .iter()
            .find(|(name, _)| name == contig)
            .map(|(_, code)| *code)
            .or(self.default)
    }

    /// Contigs with an explicit (non-default) entry, in specification order.
    pub fn contigs(&self) -> impl Iterator<Item = &str> {
        self.contigs.iter().map(|(name, _)| name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.default.is_none() && self.contigs.is_empty()
    }
}

impl FromStr for CodingTable {
    type Err = errors::Error;

    fn from_str(spec: &str) -> errors::Result<Self> {
        resolve(spec)
    }
}

/// Parse and validate a coding table specification.
pub fn resolve(spec: &str) -> errors::Result<CodingTable> {
    debug!("Parsing the coding table");
    let entries = parse_entries(spec)?;

    let unknown = entries
        .iter()
        .map(|(_, name)| name.as_str())
        .filter(|name| GeneticCode::by_name(name).is_none())
        .unique()
        .map(|name| name.to_owned())
        .collect_vec();
    for name in &unknown {
        warn!("Could not find coding table '{}'", name);
    }
    if !unknown.is_empty() {
        return errors::UnknownCodingTable { names: unknown }.fail();
    }

    let mut table = CodingTable::default();
    for (key, name) in entries {
        let code = GeneticCode::by_name(&name).ok_or_else(|| errors::Error::UnknownCodingTable {
            names: vec![name.clone()],
        })?;
        if key == DEFAULT_KEY {
            table.default = Some(code);
        } else {
            table.contigs.push((key, code));
        }
    }
    Ok(table)
}

fn parse_entries(spec: &str) -> errors::Result<Vec<(String, String)>> {
    let malformed = |reason: &str| {
        errors::MalformedSpec {
            spec,
            reason: reason.to_owned(),
        }
        .fail()
    };

    let trimmed = spec.trim();
    if trimmed.is_empty() {
        return malformed("specification is empty");
    }

    let inner = if trimmed.starts_with('{') {
        if !trimmed.ends_with('}') || trimmed.len() < 2 {
            return malformed("unbalanced braces");
        }
        &trimmed[1..trimmed.len() - 1]
    } else if trimmed.ends_with('}') {
        return malformed("unbalanced braces");
    } else {
        trimmed
    };

    if !inner.contains(':') {
        let name = unquote(inner.trim());
        if !NAME_RE.is_match(name) {
            return malformed("expected a coding table name or `contig: code` pairs");
        }
        return Ok(vec![(DEFAULT_KEY.to_owned(), name.to_owned())]);
    }

    let mut entries: Vec<(String, String)> = Vec::new();
    for pair in inner.split(|c| c == ',' || c == '\n') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let caps = match PAIR_RE.captures(pair) {
            Some(caps) => caps,
            None => return malformed(&format!("cannot read pair {:?}", pair)),
        };
        let key = unquote(caps["key"].trim());
        let value = unquote(&caps["value"]);
        if key.is_empty() || value.is_empty() {
            return malformed(&format!("cannot read pair {:?}", pair));
        }
        if entries.iter().any(|(existing, _)| existing == key) {
            return malformed(&format!("duplicate key '{}'", key));
        }
        entries.push((key.to_owned(), value.to_owned()));
    }
    if entries.is_empty() {
        return malformed("no `contig: code` pairs given");
    }
    Ok(entries)
}

fn unquote(token: &str) -> &str {
    token.trim_matches(|c| c == '"' || c == '\'')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_code_has_a_full_table() {
        assert_eq!(GENETIC_CODES.len(), 25);
        for code in GENETIC_CODES.iter() {
            assert_eq!(code.amino_acids.len(), 64, "{}", code.name);
            assert_eq!(code.starts.len(), 64, "{}", code.name);
            for (aa, start) in code.amino_acids.bytes().zip(code.starts.bytes()) {
                if start == b'*' {
                    assert_eq!(aa, b'*', "{}", code.name);
                }
            }
        }
        assert!(GeneticCode::by_name(FALLBACK_CODE).is_some());
        assert_eq!(GeneticCode::fallback().name(), FALLBACK_CODE);
    }

    #[test]
    fn standard_codons_render_like_snpeff_config() {
        let codons = GeneticCode::by_name("Standard").unwrap().codons();
        assert!(codons.starts_with("TTT/F, TTC/F, TTA/L, TTG/L+, TCT/S"));
        assert!(codons.contains("TAA/*, TAG/*"));
        assert!(codons.contains("ATG/M+"));
        assert!(codons.ends_with("GGG/G"));
        assert_eq!(codons.split(", ").count(), 64);
    }

    #[test]
    fn bare_name_becomes_default() {
        let table = resolve("Standard").unwrap();
        assert_eq!(table.default_code().map(|c| c.name()), Some("Standard"));
        assert_eq!(table.contigs().count(), 0);
        assert_eq!(table.get("anything").map(|c| c.name()), Some("Standard"));
    }

    #[test]
    fn default_pair_without_braces() {
        let table = resolve("default: Standard").unwrap();
        assert_eq!(table.default_code().map(|c| c.name()), Some("Standard"));
        assert_eq!(table.contigs().count(), 0);
    }

    #[test]
    fn mapping_with_contigs_and_default() {
        let table: CodingTable = "{chrM: Vertebrate_Mitochondrial, 'default': \"Standard\"}"
            .parse()
            .unwrap();
        assert_eq!(
            table.get("chrM").map(|c| c.name()),
            Some("Vertebrate_Mitochondrial")
        );
        assert_eq!(table.get("chr1").map(|c| c.name()), Some("Standard"));
        assert_eq!(table.contigs().collect_vec(), vec!["chrM"]);
    }

    #[test]
    fn contig_names_may_contain_colons() {
        let table = resolve("{HLA-A*01:01: Standard}").unwrap();
        assert_eq!(table.get("HLA-A*01:01").map(|c| c.name()), Some("Standard"));
        assert!(table.default_code().is_none());
    }

    #[test]
    fn unknown_codes_are_rejected() {
        for spec in &["Bogus", "default: Bogus", "{chr1: Standard, chr2: Bogus}"] {
            match resolve(spec) {
                Err(errors::Error::UnknownCodingTable { names }) => {
                    assert_eq!(names, vec!["Bogus".to_owned()])
                }
                other => panic!("unexpected result for {}: {:?}", spec, other),
            }
        }
    }

    #[test]
    fn malformed_specs_are_rejected() {
        for spec in &[
            "",
            "   ",
            "{chr1: Standard",
            "chr1: Standard}",
            "Two Words",
            "{: Standard}",
            "{default: Standard, default: Mitochondrial}",
            "{,}",
        ] {
            assert!(
                matches!(resolve(spec), Err(errors::Error::MalformedSpec { .. })),
                "{:?} should be malformed",
                spec
            );
        }
    }
}
