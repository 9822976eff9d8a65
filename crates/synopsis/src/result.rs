use std::sync::Arc;

use crate::sequence::{LocatedModification, ParsedSequence};

/// Index of a [`SearchResult`] within the arena of one pipeline run
#[derive(Copy, Clone, Default, Debug, Hash, PartialEq, PartialOrd, Ord, Eq)]
pub struct ResultIx(pub u32);

/// Which direction of the primary score is better
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreOrder {
    /// Probabilities, X-corr, discriminant scores
    HigherIsBetter,
    /// E-values, p-values
    LowerIsBetter,
}

impl Default for ScoreOrder {
    fn default() -> Self {
        Self::HigherIsBetter
    }
}

impl ScoreOrder {
    /// Order two scores best-first
    pub fn compare(&self, a: f64, b: f64) -> std::cmp::Ordering {
        match self {
            ScoreOrder::HigherIsBetter => b.total_cmp(&a),
            ScoreOrder::LowerIsBetter => a.total_cmp(&b),
        }
    }

    /// Does `score` pass `threshold`?
    pub fn passes(&self, score: f64, threshold: f64) -> bool {
        match self {
            ScoreOrder::HigherIsBetter => score >= threshold,
            ScoreOrder::LowerIsBetter => score <= threshold,
        }
    }
}

/// One candidate identification, as extracted from engine-native columns
#[derive(Clone, Debug, PartialEq, Default)]
pub struct RawResult {
    pub scan: u32,
    pub charge: u8,
    /// Peptide string, possibly with flanking residues and modifications
    pub peptide: String,
    pub score: f64,
    pub protein: Arc<String>,
    pub protein_expectation: Option<f64>,
    pub protein_intensity: Option<f64>,
    /// Engine-specific values copied into the synopsis, in the adapter's
    /// column order
    pub engine_columns: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct SearchResult {
    /// Assigned when the result is written, 1-based
    pub result_id: u32,
    pub scan: u32,
    pub charge: u8,
    pub peptide: String,
    pub clean_sequence: String,
    pub prefix: Option<char>,
    pub suffix: Option<char>,
    pub modifications: Vec<LocatedModification>,
    pub score: f64,
    pub protein: Arc<String>,
    pub protein_expectation: Option<f64>,
    pub protein_intensity: Option<f64>,
    pub engine_columns: Vec<String>,

    pub monoisotopic: f64,
    pub mod_description: String,
    pub rank: u32,
    pub fdr: f64,
    pub q_value: f64,
}

impl SearchResult {
    /// Combine a raw row with its parsed peptide, computing mass and the
    /// canonical modification description
    pub fn new(raw: RawResult, parsed: ParsedSequence) -> Self {
        let monoisotopic = parsed.monoisotopic();
        let mod_description = parsed.mod_description();
        SearchResult {
            result_id: 0,
            scan: raw.scan,
            charge: raw.charge,
            peptide: raw.peptide,
            clean_sequence: parsed.clean,
            prefix: parsed.prefix,
            suffix: parsed.suffix,
            modifications: parsed.modifications,
            score: raw.score,
            protein: raw.protein,
            protein_expectation: raw.protein_expectation,
            protein_intensity: raw.protein_intensity,
            engine_columns: raw.engine_columns,
            monoisotopic,
            mod_description,
            rank: 0,
            fdr: 1.0,
            q_value: 1.0,
        }
    }

    /// Do `self` and `other` describe the same peptide-spectrum match,
    /// differing at most in the protein they map to?
    pub fn same_identification(&self, other: &SearchResult) -> bool {
        self.scan == other.scan
            && self.charge == other.charge
            && self.clean_sequence == other.clean_sequence
            && self.mod_description == other.mod_description
    }
}
