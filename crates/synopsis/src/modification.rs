use std::{
    collections::HashMap,
    fmt::Display,
    str::FromStr,
    sync::Arc,
};

use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};

use crate::mass::{is_valid_residue, same_mass};

/// Precision used when deciding whether two catalog entries describe the
/// same modification
const DEFINITION_DIGITS: u8 = 4;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModificationType {
    Static,
    Dynamic,
    Isotopic,
    ProteinNTerminus,
    ProteinCTerminus,
    PeptideNTerminus,
    PeptideCTerminus,
}

impl ModificationType {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ModificationType::ProteinNTerminus
                | ModificationType::ProteinCTerminus
                | ModificationType::PeptideNTerminus
                | ModificationType::PeptideCTerminus
        )
    }

    /// Is this modification applied to every matching site, rather than
    /// being annotated in the peptide string?
    pub fn is_fixed(&self) -> bool {
        !matches!(self, ModificationType::Dynamic)
    }
}

/// Where a residue sits relative to the ends of its peptide and protein
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum TerminusState {
    #[default]
    None,
    PeptideNTerminus,
    PeptideCTerminus,
    ProteinNTerminus,
    ProteinCTerminus,
    /// Single-residue peptide: both peptide termini
    Both,
}

impl TerminusState {
    /// Terminus state of the residue at 1-based `position` in a peptide of
    /// `len` residues. A `-` flanking residue marks a protein terminus.
    pub fn at(position: usize, len: usize, prefix: Option<char>, suffix: Option<char>) -> Self {
        match (position == 1, position == len) {
            (true, true) => TerminusState::Both,
            (true, false) if prefix == Some('-') => TerminusState::ProteinNTerminus,
            (true, false) => TerminusState::PeptideNTerminus,
            (false, true) if suffix == Some('-') => TerminusState::ProteinCTerminus,
            (false, true) => TerminusState::PeptideCTerminus,
            (false, false) => TerminusState::None,
        }
    }

    /// Narrow `Both` to the end of a single-residue peptide that a terminal
    /// modification of `kind` sits on. Each end is a protein terminus when
    /// its flank is `-`.
    pub fn side_of(self, kind: ModificationType, prefix: Option<char>, suffix: Option<char>) -> Self {
        if self != TerminusState::Both {
            return self;
        }
        match kind {
            ModificationType::PeptideNTerminus | ModificationType::ProteinNTerminus => {
                match prefix {
                    Some('-') => TerminusState::ProteinNTerminus,
                    _ => TerminusState::PeptideNTerminus,
                }
            }
            ModificationType::PeptideCTerminus | ModificationType::ProteinCTerminus => {
                match suffix {
                    Some('-') => TerminusState::ProteinCTerminus,
                    _ => TerminusState::PeptideCTerminus,
                }
            }
            _ => self,
        }
    }

    pub fn is_n_terminal(&self) -> bool {
        matches!(
            self,
            TerminusState::PeptideNTerminus | TerminusState::ProteinNTerminus | TerminusState::Both
        )
    }

    pub fn is_c_terminal(&self) -> bool {
        matches!(
            self,
            TerminusState::PeptideCTerminus | TerminusState::ProteinCTerminus | TerminusState::Both
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ModificationDefinition {
    pub mass: f64,
    /// Residues (or terminus markers `^`, `$`, `[`, `]`) this modification
    /// can occur on. Empty means any residue.
    pub targets: Vec<char>,
    pub kind: ModificationType,
    /// Display character used by symbol-annotated search engines
    pub symbol: Option<char>,
    pub tag: String,
}

impl ModificationDefinition {
    pub fn new<S: Into<String>>(mass: f64, targets: &str, kind: ModificationType, tag: S) -> Self {
        let mut targets = targets.chars().collect::<Vec<_>>();
        targets.sort_unstable();
        targets.dedup();
        Self {
            mass,
            targets,
            kind,
            symbol: None,
            tag: tag.into(),
        }
    }

    pub fn with_symbol(mut self, symbol: char) -> Self {
        self.symbol = Some(symbol);
        self
    }

    fn residue_allowed(&self, residue: Option<char>, terminus: TerminusState) -> bool {
        if self.targets.is_empty() {
            return true;
        }
        self.targets.iter().any(|&t| match t {
            '^' => terminus.is_n_terminal(),
            '$' => terminus.is_c_terminal(),
            '[' => terminus == TerminusState::ProteinNTerminus,
            ']' => terminus == TerminusState::ProteinCTerminus,
            t => Some(t) == residue,
        })
    }

    /// Can this modification occur on `residue` at the given terminus state?
    pub fn applies_to(&self, residue: Option<char>, terminus: TerminusState) -> bool {
        let site = match self.kind {
            ModificationType::PeptideNTerminus => terminus.is_n_terminal(),
            ModificationType::PeptideCTerminus => terminus.is_c_terminal(),
            ModificationType::ProteinNTerminus => terminus == TerminusState::ProteinNTerminus,
            ModificationType::ProteinCTerminus => terminus == TerminusState::ProteinCTerminus,
            _ => true,
        };
        site && self.residue_allowed(residue, terminus)
    }

    fn equivalent(&self, other: &ModificationDefinition) -> bool {
        self.kind == other.kind
            && same_mass(self.mass, other.mass, DEFINITION_DIGITS)
            && (self.kind != ModificationType::Static || self.targets == other.targets)
            && (self.kind == ModificationType::Static || self.symbol == other.symbol)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum InvalidModification {
    Empty,
    InvalidResidue(char),
    TooLong(String),
    DuplicateSymbol(char),
    SymbolIsResidue(char),
}

impl Display for InvalidModification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidModification::Empty => f.write_str("empty modification specificity"),
            InvalidModification::InvalidResidue(c) => write!(f, "unrecognized residue ({})", c),
            InvalidModification::TooLong(s) => write!(f, "{} is too long", s),
            InvalidModification::DuplicateSymbol(c) => {
                write!(f, "symbol `{}` is already used by another modification", c)
            }
            InvalidModification::SymbolIsResidue(c) => {
                write!(f, "symbol `{}` cannot be an amino acid letter", c)
            }
        }
    }
}

impl std::error::Error for InvalidModification {}

/// The set of modifications a search was configured with
#[derive(Default, Debug, Clone)]
pub struct ModificationCatalog {
    definitions: Vec<Arc<ModificationDefinition>>,
    by_symbol: FnvHashMap<char, usize>,
    by_tag: FnvHashMap<String, Vec<usize>>,
}

impl ModificationCatalog {
    /// Add a definition to the catalog. If a valid definition is equivalent
    /// to one already present, that one is returned instead.
    pub fn register(
        &mut self,
        definition: ModificationDefinition,
    ) -> Result<Arc<ModificationDefinition>, InvalidModification> {
        for &t in &definition.targets {
            if !is_valid_residue(t) && !matches!(t, '^' | '$' | '[' | ']') {
                return Err(InvalidModification::InvalidResidue(t));
            }
        }
        if let Some(symbol) = definition.symbol.filter(|c| c.is_ascii_alphabetic()) {
            return Err(InvalidModification::SymbolIsResidue(symbol));
        }
        if let Some(existing) = self.definitions.iter().find(|d| d.equivalent(&definition)) {
            return Ok(existing.clone());
        }
        if let Some(symbol) = definition.symbol.filter(|c| self.by_symbol.contains_key(c)) {
            return Err(InvalidModification::DuplicateSymbol(symbol));
        }

        let ix = self.definitions.len();
        if let Some(symbol) = definition.symbol {
            self.by_symbol.insert(symbol, ix);
        }
        self.by_tag
            .entry(definition.tag.clone())
            .or_default()
            .push(ix);
        let definition = Arc::new(definition);
        self.definitions.push(definition.clone());
        Ok(definition)
    }

    pub fn lookup_by_symbol(&self, symbol: char) -> Option<&Arc<ModificationDefinition>> {
        self.by_symbol.get(&symbol).map(|&ix| &self.definitions[ix])
    }

    /// Find a definition of type `kind` whose mass equals `mass` once both are
    /// rounded to `digits` decimal places, and which can occur on `residue`.
    /// There is no nearest-neighbour fallback: a mass that does not round to
    /// a catalog mass is not found.
    pub fn lookup_by_mass(
        &self,
        mass: f64,
        kind: ModificationType,
        residue: Option<char>,
        terminus: TerminusState,
        digits: u8,
    ) -> Option<&Arc<ModificationDefinition>> {
        self.definitions.iter().find(|def| {
            def.kind == kind
                && same_mass(def.mass, mass, digits)
                && def.residue_allowed(residue, terminus)
        })
    }

    pub fn lookup_by_tag(
        &self,
        tag: &str,
        residue: Option<char>,
        terminus: TerminusState,
    ) -> Option<&Arc<ModificationDefinition>> {
        let candidates = self.by_tag.get(tag)?;
        candidates
            .iter()
            .map(|&ix| &self.definitions[ix])
            .find(|def| def.applies_to(residue, terminus))
            .or_else(|| candidates.first().map(|&ix| &self.definitions[ix]))
    }

    /// Definitions that are attached to every matching site without being
    /// annotated in the peptide string
    pub fn fixed(&self) -> impl Iterator<Item = &Arc<ModificationDefinition>> {
        self.definitions.iter().filter(|def| def.kind.is_fixed())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ModificationDefinition>> {
        self.definitions.iter()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Shorthand for a fixed modification site, e.g. `C` or `^` (peptide
/// N-terminus) or `]K` (C-terminal lysine of a protein)
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModificationSpecificity {
    PeptideN(Option<u8>),
    PeptideC(Option<u8>),
    ProteinN(Option<u8>),
    ProteinC(Option<u8>),
    Residue(u8),
}

impl ModificationSpecificity {
    fn kind(&self) -> ModificationType {
        match self {
            ModificationSpecificity::PeptideN(_) => ModificationType::PeptideNTerminus,
            ModificationSpecificity::PeptideC(_) => ModificationType::PeptideCTerminus,
            ModificationSpecificity::ProteinN(_) => ModificationType::ProteinNTerminus,
            ModificationSpecificity::ProteinC(_) => ModificationType::ProteinCTerminus,
            ModificationSpecificity::Residue(_) => ModificationType::Static,
        }
    }

    fn targets(&self) -> String {
        match self {
            ModificationSpecificity::PeptideN(r)
            | ModificationSpecificity::PeptideC(r)
            | ModificationSpecificity::ProteinN(r)
            | ModificationSpecificity::ProteinC(r) => {
                r.map(|r| (r as char).to_string()).unwrap_or_default()
            }
            ModificationSpecificity::Residue(r) => (*r as char).to_string(),
        }
    }
}

impl FromStr for ModificationSpecificity {
    type Err = InvalidModification;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.chars().count() > 2 {
            return Err(InvalidModification::TooLong(s.into()));
        }
        let residue = |rest: &str| -> Result<Option<u8>, InvalidModification> {
            match rest.chars().next() {
                Some(c) if is_valid_residue(c) => Ok(Some(c as u8)),
                Some(c) => Err(InvalidModification::InvalidResidue(c)),
                None => Ok(None),
            }
        };
        if let Some(rest) = s.strip_prefix('^') {
            return residue(rest).map(ModificationSpecificity::PeptideN);
        }
        if let Some(rest) = s.strip_prefix('$') {
            return residue(rest).map(ModificationSpecificity::PeptideC);
        }
        if let Some(rest) = s.strip_prefix('[') {
            return residue(rest).map(ModificationSpecificity::ProteinN);
        }
        if let Some(rest) = s.strip_prefix(']') {
            return residue(rest).map(ModificationSpecificity::ProteinC);
        }
        if s.chars().count() > 1 {
            return Err(InvalidModification::TooLong(s.into()));
        }
        match residue(s)? {
            Some(c) => Ok(ModificationSpecificity::Residue(c)),
            None => Err(InvalidModification::Empty),
        }
    }
}

/// A single modification entry of the parameter file
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ModificationEntry {
    pub mass: f64,
    /// Target residues and/or terminus markers; empty for any residue
    #[serde(default)]
    pub residues: String,
    pub symbol: Option<char>,
    pub tag: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<ModificationType>,
}

/// Modifications section of the parameter file
#[derive(Deserialize, Serialize, Default, Clone, Debug)]
pub struct ModificationBuilder {
    /// Fixed modifications keyed by specificity, e.g. `{"C": 57.021464}`
    pub static_mods: Option<HashMap<String, f64>>,
    /// Fixed modification tags, keyed by the same specificity strings
    pub static_tags: Option<HashMap<String, String>>,
    /// Fully specified modifications; `type` defaults to `dynamic`
    pub entries: Option<Vec<ModificationEntry>>,
}

/// Default mass correction tag for modifications configured without one
pub fn default_tag(mass: f64) -> String {
    let mut s = format!("{:+.4}", mass);
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    s
}

impl ModificationBuilder {
    /// Build the catalog. Any invalid entry fails the whole catalog, since
    /// results cannot be interpreted against a partial modification list.
    pub fn build(self) -> Result<ModificationCatalog, InvalidModification> {
        let mut catalog = ModificationCatalog::default();
        let tags = self.static_tags.unwrap_or_default();

        let mut static_mods = self.static_mods.unwrap_or_default().into_iter().collect::<Vec<_>>();
        // Registration order decides which definition wins ambiguous lookups
        static_mods.sort_by(|a, b| a.0.cmp(&b.0));
        for (s, mass) in static_mods {
            let spec = ModificationSpecificity::from_str(&s)?;
            let tag = tags.get(&s).cloned().unwrap_or_else(|| default_tag(mass));
            catalog.register(ModificationDefinition::new(
                mass,
                &spec.targets(),
                spec.kind(),
                tag,
            ))?;
        }

        for entry in self.entries.unwrap_or_default() {
            let tag = entry.tag.unwrap_or_else(|| default_tag(entry.mass));
            let mut def = ModificationDefinition::new(
                entry.mass,
                &entry.residues,
                entry.kind.unwrap_or(ModificationType::Dynamic),
                tag,
            );
            def.symbol = entry.symbol;
            catalog.register(def)?;
        }

        log::trace!("loaded {} modification definitions", catalog.len());
        Ok(catalog)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_modifications() {
        use InvalidModification::*;
        use ModificationSpecificity::*;
        assert_eq!("[".parse::<ModificationSpecificity>(), Ok(ProteinN(None)));
        assert_eq!(
            "[M".parse::<ModificationSpecificity>(),
            Ok(ProteinN(Some(b'M')))
        );
        assert_eq!(
            "]M".parse::<ModificationSpecificity>(),
            Ok(ProteinC(Some(b'M')))
        );
        assert_eq!("M".parse::<ModificationSpecificity>(), Ok(Residue(b'M')));
        assert_eq!(
            "Z".parse::<ModificationSpecificity>(),
            Err(InvalidResidue('Z'))
        );
        assert_eq!("".parse::<ModificationSpecificity>(), Err(Empty));
        assert_eq!(
            "MK".parse::<ModificationSpecificity>(),
            Err(TooLong("MK".into()))
        );
        assert_eq!(
            "Ł".parse::<ModificationSpecificity>(),
            Err(InvalidResidue('Ł'))
        );
        assert_eq!(
            "[Ł".parse::<ModificationSpecificity>(),
            Err(InvalidResidue('Ł'))
        );
    }

    fn catalog() -> ModificationCatalog {
        let mut catalog = ModificationCatalog::default();
        catalog
            .register(ModificationDefinition::new(
                57.021464,
                "C",
                ModificationType::Static,
                "IodoAcet",
            ))
            .unwrap();
        catalog
            .register(
                ModificationDefinition::new(15.994915, "M", ModificationType::Dynamic, "Plus1Oxy")
                    .with_symbol('*'),
            )
            .unwrap();
        catalog
            .register(
                ModificationDefinition::new(79.966331, "STY", ModificationType::Dynamic, "Phosph")
                    .with_symbol('#'),
            )
            .unwrap();
        catalog
            .register(ModificationDefinition::new(
                42.010565,
                "",
                ModificationType::ProteinNTerminus,
                "Acetyl",
            ))
            .unwrap();
        catalog
    }

    #[test]
    fn symbol_lookup() {
        let catalog = catalog();
        assert_eq!(catalog.lookup_by_symbol('*').unwrap().tag, "Plus1Oxy");
        assert_eq!(catalog.lookup_by_symbol('#').unwrap().tag, "Phosph");
        assert!(catalog.lookup_by_symbol('@').is_none());
    }

    #[test]
    fn mass_lookup_requires_rounded_equality() {
        let catalog = catalog();
        let dynamic = ModificationType::Dynamic;
        let none = TerminusState::None;
        assert_eq!(
            catalog
                .lookup_by_mass(79.9663, dynamic, Some('S'), none, 3)
                .unwrap()
                .tag,
            "Phosph"
        );
        // Wrong residue
        assert!(catalog
            .lookup_by_mass(79.9663, dynamic, Some('K'), none, 3)
            .is_none());
        // Close, but not equal at this precision
        assert!(catalog
            .lookup_by_mass(79.96, dynamic, Some('S'), none, 3)
            .is_none());
        // Integer-mass engines
        assert!(catalog
            .lookup_by_mass(80.0, dynamic, Some('T'), none, 0)
            .is_some());
        // Wrong type
        assert!(catalog
            .lookup_by_mass(57.021, ModificationType::Dynamic, Some('C'), none, 3)
            .is_none());
    }

    #[test]
    fn register_rejects_conflicts() {
        let mut catalog = catalog();
        let before = catalog.len();
        // Equivalent definition is folded into the existing entry
        let existing = catalog
            .register(ModificationDefinition::new(
                57.02146,
                "C",
                ModificationType::Static,
                "Carbamidomethyl",
            ))
            .unwrap();
        assert_eq!(existing.tag, "IodoAcet");
        assert_eq!(catalog.len(), before);

        assert_eq!(
            catalog.register(
                ModificationDefinition::new(0.984016, "NQ", ModificationType::Dynamic, "Deamide")
                    .with_symbol('*')
            ),
            Err(InvalidModification::DuplicateSymbol('*'))
        );
        assert_eq!(
            catalog.register(
                ModificationDefinition::new(0.984016, "NQ", ModificationType::Dynamic, "Deamide")
                    .with_symbol('N')
            ),
            Err(InvalidModification::SymbolIsResidue('N'))
        );
        assert_eq!(
            catalog.register(ModificationDefinition::new(
                1.0,
                "Z",
                ModificationType::Dynamic,
                "Bogus"
            )),
            Err(InvalidModification::InvalidResidue('Z'))
        );
        assert_eq!(
            catalog.register(ModificationDefinition::new(
                1.0,
                "KŁ",
                ModificationType::Dynamic,
                "Bogus"
            )),
            Err(InvalidModification::InvalidResidue('Ł'))
        );
    }

    #[test]
    fn equivalent_definitions_are_still_validated() {
        let mut catalog = catalog();
        let before = catalog.len();
        // Same type, mass and symbol as Phosph, but an unknown target residue
        assert_eq!(
            catalog.register(
                ModificationDefinition::new(79.966331, "STZ", ModificationType::Dynamic, "Phosph")
                    .with_symbol('#')
            ),
            Err(InvalidModification::InvalidResidue('Z'))
        );
        assert_eq!(catalog.len(), before);

        // A valid re-registration under the same symbol folds into the original
        let phosph = catalog
            .register(
                ModificationDefinition::new(79.96633, "Y", ModificationType::Dynamic, "Phospho")
                    .with_symbol('#'),
            )
            .unwrap();
        assert_eq!(phosph.tag, "Phosph");
        assert_eq!(catalog.len(), before);
    }

    #[test]
    fn invalid_modifications_are_errors() {
        let err: Box<dyn std::error::Error> = Box::new(InvalidModification::DuplicateSymbol('*'));
        assert_eq!(
            err.to_string(),
            "symbol `*` is already used by another modification"
        );
    }

    #[test]
    fn terminal_applicability() {
        let catalog = catalog();
        let acetyl = catalog
            .lookup_by_tag("Acetyl", Some('M'), TerminusState::ProteinNTerminus)
            .unwrap();
        assert!(acetyl.applies_to(Some('M'), TerminusState::ProteinNTerminus));
        assert!(!acetyl.applies_to(Some('M'), TerminusState::PeptideNTerminus));
        assert!(!acetyl.applies_to(Some('M'), TerminusState::None));

        let terminus = TerminusState::at(1, 7, Some('-'), Some('K'));
        assert_eq!(terminus, TerminusState::ProteinNTerminus);
        assert_eq!(
            TerminusState::at(7, 7, Some('K'), Some('R')),
            TerminusState::PeptideCTerminus
        );
        assert_eq!(TerminusState::at(1, 1, None, None), TerminusState::Both);

        // Single-residue peptide at the start of a protein
        let single = TerminusState::at(1, 1, Some('-'), Some('R'));
        let n = single.side_of(ModificationType::ProteinNTerminus, Some('-'), Some('R'));
        assert!(acetyl.applies_to(Some('K'), n));
        let c = single.side_of(ModificationType::ProteinCTerminus, Some('-'), Some('R'));
        assert_eq!(c, TerminusState::PeptideCTerminus);
        assert_eq!(
            TerminusState::None.side_of(ModificationType::ProteinNTerminus, Some('-'), None),
            TerminusState::None
        );
        assert_eq!(TerminusState::at(3, 7, None, None), TerminusState::None);
    }

    #[test]
    fn build_from_parameters() {
        let json = r#"{
            "static_mods": { "C": 57.021464, "^": 229.162932 },
            "static_tags": { "C": "IodoAcet" },
            "entries": [
                { "mass": 15.994915, "residues": "M", "symbol": "*", "tag": "Plus1Oxy" },
                { "mass": 79.966331, "residues": "STY" }
            ]
        }"#;
        let builder: ModificationBuilder = serde_json::from_str(json).unwrap();
        let catalog = builder.build().unwrap();
        assert_eq!(catalog.len(), 4);

        let tmt = catalog
            .lookup_by_mass(
                229.1629,
                ModificationType::PeptideNTerminus,
                Some('A'),
                TerminusState::PeptideNTerminus,
                4,
            )
            .unwrap();
        assert_eq!(tmt.tag, "+229.1629");
        assert_eq!(catalog.lookup_by_symbol('*').unwrap().tag, "Plus1Oxy");
        assert_eq!(
            catalog
                .lookup_by_tag("+79.9663", Some('S'), TerminusState::None)
                .unwrap()
                .kind,
            ModificationType::Dynamic
        );

        let bad: ModificationBuilder =
            serde_json::from_str(r#"{ "static_mods": { "B": 1.0 } }"#).unwrap();
        assert_eq!(
            bad.build().unwrap_err(),
            InvalidModification::InvalidResidue('B')
        );
    }

    #[test]
    fn default_tags() {
        assert_eq!(default_tag(15.994915), "+15.9949");
        assert_eq!(default_tag(-17.0265), "-17.0265");
        assert_eq!(default_tag(42.0), "+42");
    }
}
