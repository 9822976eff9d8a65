//! Parsing of modification-annotated peptide strings
//!
//! Search engines report modified peptides in one of two ways: a symbol
//! following the modified residue (`PEPM*TIDE`), or the modification mass
//! (`PEPM+15.995TIDE`, `PEPC[+57.0215]TIDE`). Both are handled by a single
//! left-to-right scan, after which fixed (static and terminal) modifications
//! are attached purely from residue identity.

use std::fmt::Write;
use std::sync::Arc;

use crate::mass::{peptide_mass, same_mass};
use crate::modification::{
    ModificationCatalog, ModificationDefinition, ModificationType, TerminusState,
};

/// Precision used to decide whether two modifications at the same terminal
/// residue are the same chemical change
const DUPLICATE_DIGITS: u8 = 4;

#[derive(Clone, Debug, PartialEq)]
pub struct LocatedModification {
    pub definition: Arc<ModificationDefinition>,
    pub residue: char,
    /// 1-based position in the clean sequence
    pub position: usize,
    pub terminus: TerminusState,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct ParsedSequence {
    pub clean: String,
    pub prefix: Option<char>,
    pub suffix: Option<char>,
    pub modifications: Vec<LocatedModification>,
    /// Modifications that could not be resolved, and were dropped
    pub unresolved: Vec<UnresolvedModification>,
}

impl ParsedSequence {
    /// Monoisotopic mass of the peptide, including all located modifications
    pub fn monoisotopic(&self) -> f64 {
        peptide_mass(&self.clean)
            + self
                .modifications
                .iter()
                .map(|m| m.definition.mass)
                .sum::<f64>()
    }

    /// Canonical modification description, see [`ModDescription`]
    pub fn mod_description(&self) -> String {
        ModDescription::format(&self.modifications)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum UnresolvedModification {
    /// A mass run that could not be read as a number
    MalformedMass { position: usize, text: String },
    /// A mass that does not match any catalog entry at the configured precision
    UnknownMass {
        position: usize,
        residue: char,
        mass: f64,
    },
}

impl std::fmt::Display for UnresolvedModification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnresolvedModification::MalformedMass { position, text } => {
                write!(f, "unparseable modification mass `{}` at position {}", text, position)
            }
            UnresolvedModification::UnknownMass {
                position,
                residue,
                mass,
            } => write!(
                f,
                "no modification of mass {} defined for {}{}",
                mass, residue, position
            ),
        }
    }
}

enum Annotation {
    Symbol(Arc<ModificationDefinition>),
    Mass(String),
}

/// Parses peptide strings against one modification catalog. The parser holds
/// no global state, so differently configured parsers can coexist.
pub struct SequenceParser<'a> {
    catalog: &'a ModificationCatalog,
    /// Decimal places used when matching annotated masses against the catalog
    mass_digits: u8,
    /// Permit a fixed terminal modification on a residue that already carries
    /// a modification of the same mass (e.g. methylation of both carboxyl
    /// groups of a C-terminal Asp/Glu)
    allow_duplicate_terminal: bool,
}

/// Split `X.PEPTIDE.Y` flanking residue notation. `-` marks a protein terminus.
fn split_flanks(input: &str) -> (Option<char>, &str, Option<char>) {
    let bytes = input.as_bytes();
    let is_flank = |b: u8| b.is_ascii_alphabetic() || b == b'-';

    let (prefix, start) = match bytes {
        [p, b'.', ..] if is_flank(*p) && bytes.len() > 2 => (Some(*p as char), 2),
        _ => (None, 0),
    };

    let n = bytes.len();
    let (suffix, end) = if n >= 2 && n - 2 >= start && bytes[n - 2] == b'.' && is_flank(bytes[n - 1])
    {
        (Some(bytes[n - 1] as char), n - 2)
    } else {
        (None, n)
    };

    (prefix, &input[start..end], suffix)
}

impl<'a> SequenceParser<'a> {
    pub fn new(catalog: &'a ModificationCatalog, mass_digits: u8) -> Self {
        Self {
            catalog,
            mass_digits,
            allow_duplicate_terminal: false,
        }
    }

    pub fn allow_duplicate_terminal(mut self, allow: bool) -> Self {
        self.allow_duplicate_terminal = allow;
        self
    }

    pub fn parse(&self, input: &str) -> ParsedSequence {
        let (prefix, core, suffix) = split_flanks(input.trim());

        let mut clean = String::with_capacity(core.len());
        let mut annotations: Vec<(usize, Annotation)> = Vec::new();

        let mut residue_index = 0;
        let mut parsing_mod_mass = false;
        let mut mod_mass = String::new();

        // Annotations preceding the first residue belong to the N-terminus
        let mut flush = |residue_index: usize, mod_mass: &mut String, parsing: &mut bool| {
            if *parsing {
                let text = std::mem::take(mod_mass);
                // A lone sign is a separator (`[+42.01]-PEPTIDE`), not a mass
                if text.len() > 1 {
                    annotations.push((residue_index.max(1), Annotation::Mass(text)));
                }
                *parsing = false;
            }
        };

        let mut symbols = Vec::new();
        for c in core.chars() {
            match c {
                'A'..='Z' => {
                    flush(residue_index, &mut mod_mass, &mut parsing_mod_mass);
                    residue_index += 1;
                    clean.push(c);
                }
                '+' | '-' => {
                    flush(residue_index, &mut mod_mass, &mut parsing_mod_mass);
                    parsing_mod_mass = true;
                    mod_mass.push(c);
                }
                '0'..='9' | '.' if parsing_mod_mass => mod_mass.push(c),
                _ => {
                    flush(residue_index, &mut mod_mass, &mut parsing_mod_mass);
                    if let Some(def) = self.catalog.lookup_by_symbol(c) {
                        symbols.push((residue_index.max(1), Annotation::Symbol(def.clone())));
                    }
                }
            }
        }
        flush(residue_index, &mut mod_mass, &mut parsing_mod_mass);
        annotations.extend(symbols);
        annotations.sort_by_key(|(position, _)| *position);

        let mut parsed = ParsedSequence {
            clean,
            prefix,
            suffix,
            ..Default::default()
        };

        let len = parsed.clean.len();
        if len == 0 {
            return parsed;
        }

        for (position, annotation) in annotations {
            let position = position.min(len);
            let residue = parsed.clean.as_bytes()[position - 1] as char;
            let terminus = TerminusState::at(position, len, prefix, suffix);

            let definition = match annotation {
                Annotation::Symbol(def) => def,
                Annotation::Mass(text) => {
                    // Mass at the final residue may carry the flank separator
                    let number = text.strip_suffix('.').unwrap_or(&text);
                    let mass = match number.parse::<f64>() {
                        Ok(mass) => mass,
                        Err(_) => {
                            parsed
                                .unresolved
                                .push(UnresolvedModification::MalformedMass { position, text });
                            continue;
                        }
                    };
                    match self.resolve_mass(mass, residue, terminus, prefix, suffix) {
                        Some(def) => def.clone(),
                        None => {
                            parsed.unresolved.push(UnresolvedModification::UnknownMass {
                                position,
                                residue,
                                mass,
                            });
                            continue;
                        }
                    }
                }
            };

            parsed.modifications.push(LocatedModification {
                definition,
                residue,
                position,
                terminus,
            });
        }

        self.attach_fixed(&mut parsed);
        parsed
    }

    /// Resolve an annotated mass. Dynamic modifications are preferred, then
    /// terminal and static modifications for engines that annotate every
    /// modification with its mass.
    fn resolve_mass(
        &self,
        mass: f64,
        residue: char,
        terminus: TerminusState,
        prefix: Option<char>,
        suffix: Option<char>,
    ) -> Option<&Arc<ModificationDefinition>> {
        let mut kinds = vec![ModificationType::Dynamic];
        if terminus.is_n_terminal() {
            kinds.extend([
                ModificationType::PeptideNTerminus,
                ModificationType::ProteinNTerminus,
            ]);
        }
        if terminus.is_c_terminal() {
            kinds.extend([
                ModificationType::PeptideCTerminus,
                ModificationType::ProteinCTerminus,
            ]);
        }
        kinds.extend([ModificationType::Static, ModificationType::Isotopic]);

        kinds.into_iter().find_map(|kind| {
            let terminus = terminus.side_of(kind, prefix, suffix);
            self.catalog
                .lookup_by_mass(mass, kind, Some(residue), terminus, self.mass_digits)
                .filter(|def| def.applies_to(Some(residue), terminus))
        })
    }

    /// Second pass: attach static, isotopic and terminal modifications from
    /// residue identity alone
    fn attach_fixed(&self, parsed: &mut ParsedSequence) {
        let len = parsed.clean.len();
        let residues = parsed.clean.chars().collect::<Vec<_>>();

        let mut fixed = Vec::new();
        for (ix, &residue) in residues.iter().enumerate() {
            let position = ix + 1;
            let terminus = TerminusState::at(position, len, parsed.prefix, parsed.suffix);

            for def in self.catalog.fixed().filter(|def| !def.kind.is_terminal()) {
                // Isotopic labels with no target list apply to every residue;
                // a static modification needs an explicit residue
                if def.kind == ModificationType::Static && def.targets.is_empty() {
                    continue;
                }
                if !def.applies_to(Some(residue), terminus) {
                    continue;
                }
                let already = parsed
                    .modifications
                    .iter()
                    .any(|m| m.position == position && Arc::ptr_eq(&m.definition, def));
                if !already {
                    fixed.push(LocatedModification {
                        definition: def.clone(),
                        residue,
                        position,
                        terminus,
                    });
                }
            }
        }
        parsed.modifications.extend(fixed);

        let mut ends = vec![1];
        if len > 1 {
            ends.push(len);
        }
        for position in ends {
            let residue = residues[position - 1];
            let at = TerminusState::at(position, len, parsed.prefix, parsed.suffix);
            for def in self.catalog.fixed().filter(|def| def.kind.is_terminal()) {
                let terminus = at.side_of(def.kind, parsed.prefix, parsed.suffix);
                if !def.applies_to(Some(residue), terminus) {
                    continue;
                }
                let n_side = matches!(
                    def.kind,
                    ModificationType::PeptideNTerminus | ModificationType::ProteinNTerminus
                );
                // A single-residue peptide is visited once, for both termini
                if len > 1 && n_side != (position == 1) {
                    continue;
                }
                let duplicate = parsed.modifications.iter().any(|m| {
                    m.position == position
                        && (Arc::ptr_eq(&m.definition, def)
                            || (!self.allow_duplicate_terminal
                                && same_mass(m.definition.mass, def.mass, DUPLICATE_DIGITS)))
                });
                if !duplicate {
                    parsed.modifications.push(LocatedModification {
                        definition: def.clone(),
                        residue,
                        position,
                        terminus,
                    });
                }
            }
        }

        parsed
            .modifications
            .sort_by(|a, b| a.position.cmp(&b.position));
    }
}

/// Canonical, order-independent encoding of a peptide's modifications:
/// `<residue><position>:<tag>` entries joined by commas, sorted by position
/// then tag, e.g. `M3:Plus1Oxy,C5:IodoAcet`
pub struct ModDescription;

#[derive(Clone, Debug, PartialEq)]
pub enum InvalidModDescription {
    Malformed(String),
    PositionOutOfRange(String),
    UnknownTag(String),
}

impl std::fmt::Display for InvalidModDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidModDescription::Malformed(s) => write!(f, "malformed modification `{}`", s),
            InvalidModDescription::PositionOutOfRange(s) => {
                write!(f, "modification `{}` lies outside of the peptide", s)
            }
            InvalidModDescription::UnknownTag(s) => {
                write!(f, "modification `{}` is not in the catalog", s)
            }
        }
    }
}

impl ModDescription {
    pub fn format(modifications: &[LocatedModification]) -> String {
        let mut sorted = modifications.iter().collect::<Vec<_>>();
        sorted.sort_by(|a, b| {
            a.position
                .cmp(&b.position)
                .then_with(|| a.definition.tag.cmp(&b.definition.tag))
        });

        let mut s = String::new();
        for (ix, m) in sorted.into_iter().enumerate() {
            if ix > 0 {
                s.push(',');
            }
            // Writing to a String cannot fail
            let _ = write!(s, "{}{}:{}", m.residue, m.position, m.definition.tag);
        }
        s
    }

    /// Read a canonical description back into located modifications
    pub fn parse(
        description: &str,
        clean: &str,
        prefix: Option<char>,
        suffix: Option<char>,
        catalog: &ModificationCatalog,
    ) -> Result<Vec<LocatedModification>, InvalidModDescription> {
        let len = clean.len();
        let mut modifications = Vec::new();
        for item in description.split(',').filter(|s| !s.is_empty()) {
            let malformed = || InvalidModDescription::Malformed(item.into());
            let (site, tag) = item.split_once(':').ok_or_else(malformed)?;
            let mut chars = site.chars();
            let residue = chars.next().ok_or_else(malformed)?;
            let position = chars
                .as_str()
                .parse::<usize>()
                .map_err(|_| malformed())?;
            if position == 0 || position > len || clean.as_bytes()[position - 1] as char != residue
            {
                return Err(InvalidModDescription::PositionOutOfRange(item.into()));
            }
            let terminus = TerminusState::at(position, len, prefix, suffix);
            let definition = catalog
                .lookup_by_tag(tag, Some(residue), terminus)
                .ok_or_else(|| InvalidModDescription::UnknownTag(item.into()))?;
            modifications.push(LocatedModification {
                definition: definition.clone(),
                residue,
                position,
                terminus,
            });
        }
        Ok(modifications)
    }
}
