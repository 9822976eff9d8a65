//! Target-decoy false discovery rate and q-value estimation
//!
//! Results are walked best score first. Rows describing the same
//! identification (same scan, charge and modified peptide, differing only in
//! the protein they map to) are collapsed into a single decision: the
//! identification is a decoy only if *every* protein it maps to is a decoy.

use regex::{Regex, RegexSet};

use crate::rank::ChunkByGroup;
use crate::result::{ResultIx, ScoreOrder, SearchResult};

/// Recognizes decoy (reversed/shuffled) protein names
#[derive(Debug, Clone)]
pub struct DecoyMatcher {
    patterns: RegexSet,
}

impl DecoyMatcher {
    /// Build a matcher from glob-style patterns, where `*` matches any run of
    /// characters: `rev_*` matches reversed-sequence prefixes, `*_REVERSED`
    /// suffixes.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| {
                let parts = p
                    .as_ref()
                    .split('*')
                    .map(regex::escape)
                    .collect::<Vec<_>>();
                format!("^{}$", parts.join(".*"))
            })
            .collect::<Vec<_>>();
        Ok(DecoyMatcher {
            patterns: RegexSet::new(patterns)?,
        })
    }

    /// Match decoys with an arbitrary regular expression
    pub fn from_regex(regex: &Regex) -> Result<Self, regex::Error> {
        Ok(DecoyMatcher {
            patterns: RegexSet::new([regex.as_str()])?,
        })
    }

    pub fn is_decoy(&self, protein: &str) -> bool {
        self.patterns.is_match(protein)
    }
}

impl Default for DecoyMatcher {
    fn default() -> Self {
        DecoyMatcher::new(&["rev_*", "XXX_*"]).expect("static decoy patterns")
    }
}

/// Counts of collapsed identifications at the end of an FDR walk
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FdrSummary {
    pub forward: usize,
    pub reverse: usize,
    /// Forward identifications with q <= 0.01
    pub passing: usize,
}

/// Sort `indices` best score first. Ties are broken by scan, charge and
/// peptide so that rows describing the same identification are adjacent.
pub fn sort_by_score(arena: &[SearchResult], indices: &mut [ResultIx], order: ScoreOrder) {
    indices.sort_by(|a, b| {
        let (a, b) = (&arena[a.0 as usize], &arena[b.0 as usize]);
        order
            .compare(a.score, b.score)
            .then_with(|| a.scan.cmp(&b.scan))
            .then_with(|| a.charge.cmp(&b.charge))
            .then_with(|| a.clean_sequence.cmp(&b.clean_sequence))
            .then_with(|| a.mod_description.cmp(&b.mod_description))
    });
}

/// Assign FDR and q-value in place.
///
/// # Invariants
/// * `indices` must be sorted best score first (see [`sort_by_score`])
/// * afterwards, q-value never increases as score improves
pub fn compute_fdr_and_q_value(
    arena: &mut [SearchResult],
    indices: &[ResultIx],
    decoys: &DecoyMatcher,
) -> FdrSummary {
    let mut forward = 0usize;
    let mut reverse = 0usize;

    let runs = indices
        .chunk_by_group(|a, b| arena[a.0 as usize].same_identification(&arena[b.0 as usize]))
        .collect::<Vec<_>>();

    let mut decisions = Vec::with_capacity(runs.len());
    for run in &runs {
        let decoy = run
            .iter()
            .all(|ix| decoys.is_decoy(&arena[ix.0 as usize].protein));
        match decoy {
            true => reverse += 1,
            false => forward += 1,
        }
        let fdr = match forward {
            0 => 1.0,
            _ => reverse as f64 / forward as f64,
        };
        decisions.push((decoy, fdr));
    }

    // Q-value is the minimum FDR at any worse-or-equal score threshold
    let mut q_min = 1.0f64;
    let mut passing = 0;
    for (run, (decoy, fdr)) in runs.iter().zip(decisions).rev() {
        q_min = q_min.min(fdr);
        if !decoy && q_min <= 0.01 {
            passing += 1;
        }
        for ix in run.iter() {
            let result = &mut arena[ix.0 as usize];
            result.fdr = fdr;
            result.q_value = q_min;
        }
    }

    FdrSummary {
        forward,
        reverse,
        passing,
    }
}
