//! Extraction of search results from engine-native tab-delimited files
//!
//! Each search engine lays its results out differently. A [`RawResultAdapter`]
//! binds an engine's columns to the handful of fields the synopsis pipeline
//! needs; everything downstream is engine-agnostic.

use std::sync::Arc;

use csv::StringRecord;
use serde::{Deserialize, Serialize};

use crate::result::{RawResult, ScoreOrder};
use crate::Error;

/// Problems with a single input row. These never abort a run: the row is
/// skipped and the problem recorded in the error log.
#[derive(Debug, Clone, PartialEq)]
pub enum RowError {
    MissingField(String),
    InvalidNumber { column: String, value: String },
    EmptyPeptide,
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowError::MissingField(column) => write!(f, "missing value for column `{}`", column),
            RowError::InvalidNumber { column, value } => {
                write!(f, "column `{}`: `{}` is not a number", column, value)
            }
            RowError::EmptyPeptide => f.write_str("peptide has no residues"),
        }
    }
}

pub trait RawResultAdapter {
    /// Engine name, used in log messages
    fn name(&self) -> &str;

    fn score_order(&self) -> ScoreOrder;

    /// Bind column positions from the header row of an input file
    fn parse_header(&mut self, header: &StringRecord) -> Result<(), Error>;

    /// Engine-specific columns carried into the synopsis, in output order
    fn column_headers(&self) -> Vec<String>;

    /// Extract candidates from one row. Rows listing several proteins yield
    /// one candidate per protein.
    fn parse_row(&self, record: &StringRecord) -> Result<Vec<RawResult>, RowError>;
}

/// Column names of a tab-delimited result file
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ColumnLayout {
    pub name: String,
    pub scan: String,
    pub charge: String,
    pub peptide: String,
    pub score: String,
    pub protein: String,
    pub protein_expectation: Option<String>,
    pub protein_intensity: Option<String>,
    /// Separator for cells listing several proteins
    pub protein_delimiter: Option<char>,
    #[serde(default)]
    pub score_order: ScoreOrder,
    /// Columns copied verbatim into the synopsis
    #[serde(default)]
    pub passthrough: Vec<String>,
}

/// Column layouts of search engines supported out of the box
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EnginePreset {
    /// Sage `results.sage.tsv`
    Sage,
    /// MS-GF+ tab-delimited output (`MzIDToTsv`)
    Msgf,
}

impl EnginePreset {
    pub fn layout(&self) -> ColumnLayout {
        let strings = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        match self {
            EnginePreset::Sage => ColumnLayout {
                name: "sage".into(),
                scan: "scannr".into(),
                charge: "charge".into(),
                peptide: "peptide".into(),
                score: "sage_discriminant_score".into(),
                protein: "proteins".into(),
                protein_expectation: None,
                protein_intensity: None,
                protein_delimiter: Some(';'),
                score_order: ScoreOrder::HigherIsBetter,
                passthrough: strings(&[
                    "filename",
                    "expmass",
                    "calcmass",
                    "hyperscore",
                    "spectrum_q",
                    "peptide_q",
                    "protein_q",
                ]),
            },
            EnginePreset::Msgf => ColumnLayout {
                name: "msgf".into(),
                scan: "ScanNum".into(),
                charge: "Charge".into(),
                peptide: "Peptide".into(),
                score: "SpecEValue".into(),
                protein: "Protein".into(),
                protein_expectation: None,
                protein_intensity: None,
                protein_delimiter: Some(';'),
                score_order: ScoreOrder::LowerIsBetter,
                passthrough: strings(&[
                    "#SpecFile",
                    "Precursor",
                    "IsotopeError",
                    "PrecursorError(ppm)",
                    "MSGFScore",
                    "EValue",
                ]),
            },
        }
    }

    /// Decimal places these engines report modification masses with
    pub fn mass_digits(&self) -> u8 {
        match self {
            EnginePreset::Sage => 4,
            EnginePreset::Msgf => 3,
        }
    }
}

#[derive(Default, Debug, Clone)]
struct Columns {
    scan: usize,
    charge: usize,
    peptide: usize,
    score: usize,
    protein: usize,
    protein_expectation: Option<usize>,
    protein_intensity: Option<usize>,
    passthrough: Vec<Option<usize>>,
}

/// Adapter for any tab-delimited engine output described by a [`ColumnLayout`]
#[derive(Debug, Clone)]
pub struct TabularAdapter {
    layout: ColumnLayout,
    columns: Option<Columns>,
}

/// Read a scan number from either a bare integer or a native spectrum ID,
/// e.g. `controllerType=0 controllerNumber=1 scan=3456`
pub fn parse_scan(s: &str) -> Option<u32> {
    let s = s.trim();
    if let Ok(scan) = s.parse() {
        return Some(scan);
    }
    let (_, rest) = s.rsplit_once("scan=")?;
    let digits = rest
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .unwrap_or_default();
    digits.parse().ok()
}

/// Strip MS-GF+ style `(pre=K,post=R)` context from a protein name
fn protein_name(s: &str) -> &str {
    let s = s.trim();
    match s.rfind("(pre=") {
        Some(ix) if s.ends_with(')') => &s[..ix],
        _ => s,
    }
}

impl TabularAdapter {
    pub fn new(layout: ColumnLayout) -> Self {
        TabularAdapter {
            layout,
            columns: None,
        }
    }

    fn field<'r>(&self, record: &'r StringRecord, ix: usize, name: &str) -> Result<&'r str, RowError> {
        match record.get(ix).map(str::trim) {
            Some(s) if !s.is_empty() => Ok(s),
            _ => Err(RowError::MissingField(name.into())),
        }
    }

    fn number<T: std::str::FromStr>(
        &self,
        record: &StringRecord,
        ix: usize,
        name: &str,
    ) -> Result<T, RowError> {
        let value = self.field(record, ix, name)?;
        value.parse().map_err(|_| RowError::InvalidNumber {
            column: name.into(),
            value: value.into(),
        })
    }

    fn optional_number(
        &self,
        record: &StringRecord,
        ix: Option<usize>,
        name: &Option<String>,
    ) -> Result<Option<f64>, RowError> {
        match (ix, name) {
            (Some(ix), Some(name)) => match record.get(ix).map(str::trim) {
                None | Some("") => Ok(None),
                Some(_) => self.number(record, ix, name).map(Some),
            },
            _ => Ok(None),
        }
    }
}

impl RawResultAdapter for TabularAdapter {
    fn name(&self) -> &str {
        &self.layout.name
    }

    fn score_order(&self) -> ScoreOrder {
        self.layout.score_order
    }

    fn parse_header(&mut self, header: &StringRecord) -> Result<(), Error> {
        let position = |name: &str| header.iter().position(|h| h.trim() == name);
        let required = |name: &str| {
            position(name).ok_or_else(|| Error::MissingColumn {
                engine: self.layout.name.clone(),
                column: name.into(),
            })
        };

        let columns = Columns {
            scan: required(&self.layout.scan)?,
            charge: required(&self.layout.charge)?,
            peptide: required(&self.layout.peptide)?,
            score: required(&self.layout.score)?,
            protein: required(&self.layout.protein)?,
            protein_expectation: self.layout.protein_expectation.as_deref().and_then(position),
            protein_intensity: self.layout.protein_intensity.as_deref().and_then(position),
            passthrough: self
                .layout
                .passthrough
                .iter()
                .map(|name| {
                    let ix = position(name);
                    if ix.is_none() {
                        log::warn!(
                            "{}: column `{}` not found, it will be left empty",
                            self.layout.name,
                            name
                        );
                    }
                    ix
                })
                .collect(),
        };
        self.columns = Some(columns);
        Ok(())
    }

    fn column_headers(&self) -> Vec<String> {
        self.layout
            .passthrough
            .iter()
            .map(|name| name.trim_start_matches('#').to_string())
            .collect()
    }

    fn parse_row(&self, record: &StringRecord) -> Result<Vec<RawResult>, RowError> {
        let columns = match &self.columns {
            Some(columns) => columns,
            None => return Err(RowError::MissingField("header".into())),
        };
        let layout = &self.layout;

        let scan_field = self.field(record, columns.scan, &layout.scan)?;
        let scan = parse_scan(scan_field).ok_or_else(|| RowError::InvalidNumber {
            column: layout.scan.clone(),
            value: scan_field.into(),
        })?;
        let charge_field = self.field(record, columns.charge, &layout.charge)?;
        let charge = charge_field
            .trim_end_matches('+')
            .parse::<u8>()
            .map_err(|_| RowError::InvalidNumber {
                column: layout.charge.clone(),
                value: charge_field.into(),
            })?;
        let peptide = self.field(record, columns.peptide, &layout.peptide)?;
        let score = self.number::<f64>(record, columns.score, &layout.score)?;
        let proteins = self.field(record, columns.protein, &layout.protein)?;
        let protein_expectation =
            self.optional_number(record, columns.protein_expectation, &layout.protein_expectation)?;
        let protein_intensity =
            self.optional_number(record, columns.protein_intensity, &layout.protein_intensity)?;

        let engine_columns = columns
            .passthrough
            .iter()
            .map(|ix| {
                ix.and_then(|ix| record.get(ix))
                    .unwrap_or_default()
                    .to_string()
            })
            .collect::<Vec<_>>();

        let proteins: Vec<&str> = match layout.protein_delimiter {
            Some(delim) => proteins
                .split(delim)
                .map(protein_name)
                .filter(|p| !p.is_empty())
                .collect(),
            None => vec![protein_name(proteins)],
        };

        Ok(proteins
            .into_iter()
            .map(|protein| RawResult {
                scan,
                charge,
                peptide: peptide.into(),
                score,
                protein: Arc::new(protein.into()),
                protein_expectation,
                protein_intensity,
                engine_columns: engine_columns.clone(),
            })
            .collect())
    }
}
