use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::mass::is_valid_residue;

/// Enzyme specificity, used to judge how a reported peptide was cleaved from
/// its protein
#[derive(Debug, Clone)]
pub struct Enzyme {
    // Regex for matching cleavage residues
    regex: Regex,
    // Skip cleaving if the site is followed by this AA
    pub skip_suffix: Option<char>,
    // Cleave at c-terminal?
    pub c_terminal: bool,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct EnzymeBuilder {
    pub cleave_at: Option<String>,
    pub restrict: Option<char>,
    pub c_terminal: Option<bool>,
}

impl Default for EnzymeBuilder {
    fn default() -> Self {
        Self {
            cleave_at: Some("KR".into()),
            restrict: Some('P'),
            c_terminal: Some(true),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InvalidEnzyme {
    Residue(char),
    Restriction(char),
}

impl std::fmt::Display for InvalidEnzyme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidEnzyme::Residue(c) => {
                write!(f, "enzyme cleavage sequence contains non-amino acid `{}`", c)
            }
            InvalidEnzyme::Restriction(c) => {
                write!(f, "enzyme cleavage restriction is non-amino acid `{}`", c)
            }
        }
    }
}

impl std::error::Error for InvalidEnzyme {}

impl EnzymeBuilder {
    /// `None` for non-specific cleavage
    pub fn build(self) -> Result<Option<Enzyme>, InvalidEnzyme> {
        let cleave = self.cleave_at.unwrap_or_else(|| "KR".into());
        Enzyme::new(&cleave, self.restrict, self.c_terminal.unwrap_or(true))
    }
}

/// Cleavage state reported in the sequence-to-protein table
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum CleavageState {
    NonSpecific = 0,
    Partial = 1,
    Full = 2,
}

/// Protein terminus state reported in the sequence-to-protein table
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProteinTerminus {
    None = 0,
    NTerm = 1,
    CTerm = 2,
    Both = 3,
}

impl ProteinTerminus {
    pub fn from_flanks(prefix: Option<char>, suffix: Option<char>) -> Self {
        match (prefix == Some('-'), suffix == Some('-')) {
            (true, true) => ProteinTerminus::Both,
            (true, false) => ProteinTerminus::NTerm,
            (false, true) => ProteinTerminus::CTerm,
            (false, false) => ProteinTerminus::None,
        }
    }
}

impl Enzyme {
    pub fn new(
        cleave: &str,
        skip_suffix: Option<char>,
        c_terminal: bool,
    ) -> Result<Option<Self>, InvalidEnzyme> {
        if let Some(c) = cleave.chars().find(|c| !is_valid_residue(*c)) {
            return Err(InvalidEnzyme::Residue(c));
        }
        if let Some(c) = skip_suffix.filter(|c| !is_valid_residue(*c)) {
            return Err(InvalidEnzyme::Restriction(c));
        }
        if cleave.is_empty() {
            return Ok(None);
        }
        let regex = Regex::new(&format!("^[{}]$", cleave))
            .map_err(|_| InvalidEnzyme::Residue(cleave.chars().next().unwrap_or(' ')))?;
        Ok(Some(Enzyme {
            regex,
            skip_suffix,
            c_terminal,
        }))
    }

    pub fn trypsin() -> Self {
        Enzyme {
            regex: Regex::new("^[KR]$").expect("static regex"),
            skip_suffix: Some('P'),
            c_terminal: true,
        }
    }

    fn cleaves(&self, c: char) -> bool {
        let mut buf = [0u8; 4];
        self.regex.is_match(c.encode_utf8(&mut buf))
    }

    /// Is the bond between `left` and `right` a cleavage site?
    fn is_site(&self, left: char, right: char) -> bool {
        // (cleaved residue, residue that blocks cleavage when adjacent)
        let (site, next) = match self.c_terminal {
            true => (left, right),
            false => (right, left),
        };
        self.cleaves(site) && self.skip_suffix.map(|s| next != s).unwrap_or(true)
    }

    /// Judge how specifically `sequence`, flanked by `prefix` and `suffix`,
    /// was cleaved. A `-` flank is a protein terminus and always counts as
    /// specific; an unknown flank is given the benefit of the doubt.
    pub fn cleavage_state(
        &self,
        prefix: Option<char>,
        sequence: &str,
        suffix: Option<char>,
    ) -> CleavageState {
        let (first, last) = match (sequence.chars().next(), sequence.chars().last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return CleavageState::NonSpecific,
        };

        let n_side = match prefix {
            None | Some('-') => true,
            Some(p) => self.is_site(p, first),
        };
        let c_side = match suffix {
            None | Some('-') => true,
            Some(s) => self.is_site(last, s),
        };

        match (n_side, c_side) {
            (true, true) => CleavageState::Full,
            (false, false) => CleavageState::NonSpecific,
            _ => CleavageState::Partial,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tryptic_states() {
        let trypsin = Enzyme::trypsin();
        assert_eq!(
            trypsin.cleavage_state(Some('K'), "APEPTIDEK", Some('A')),
            CleavageState::Full
        );
        assert_eq!(
            trypsin.cleavage_state(Some('-'), "MPEPTIDER", Some('-')),
            CleavageState::Full
        );
        // K before P is not cleaved
        assert_eq!(
            trypsin.cleavage_state(Some('K'), "PEPTIDEK", Some('P')),
            CleavageState::NonSpecific
        );
        assert_eq!(
            trypsin.cleavage_state(Some('K'), "EPTIDEK", Some('P')),
            CleavageState::Partial
        );
        assert_eq!(
            trypsin.cleavage_state(Some('A'), "PEPTIDE", Some('G')),
            CleavageState::NonSpecific
        );
        assert_eq!(
            trypsin.cleavage_state(None, "PEPTIDEK", None),
            CleavageState::Full
        );
    }

    #[test]
    fn n_terminal_enzyme() {
        // Asp-N cleaves before D
        let aspn = Enzyme::new("D", None, false).unwrap().unwrap();
        assert_eq!(
            aspn.cleavage_state(Some('A'), "DPEPTIE", Some('D')),
            CleavageState::Full
        );
        assert_eq!(
            aspn.cleavage_state(Some('A'), "PEPTIE", Some('D')),
            CleavageState::Partial
        );
    }

    #[test]
    fn builder() {
        let enzyme = EnzymeBuilder::default().build().unwrap().unwrap();
        assert_eq!(enzyme.skip_suffix, Some('P'));
        assert!(EnzymeBuilder {
            cleave_at: Some("".into()),
            ..Default::default()
        }
        .build()
        .unwrap()
        .is_none());
        assert_eq!(
            EnzymeBuilder {
                cleave_at: Some("K$".into()),
                ..Default::default()
            }
            .build()
            .unwrap_err(),
            InvalidEnzyme::Residue('$')
        );
        assert_eq!(
            Enzyme::new("KŁ", None, true).unwrap_err(),
            InvalidEnzyme::Residue('Ł')
        );
        assert_eq!(
            Enzyme::new("KR", Some('Ł'), true).unwrap_err(),
            InvalidEnzyme::Restriction('Ł')
        );
    }

    #[test]
    fn terminus() {
        assert_eq!(ProteinTerminus::from_flanks(Some('-'), Some('K')), ProteinTerminus::NTerm);
        assert_eq!(ProteinTerminus::from_flanks(Some('-'), Some('-')), ProteinTerminus::Both);
        assert_eq!(ProteinTerminus::from_flanks(None, None), ProteinTerminus::None);
    }
}
