pub const H2O: f64 = 18.0105646863;

pub const VALID_AA: [u8; 22] = [
    b'A', b'C', b'D', b'E', b'F', b'G', b'H', b'I', b'K', b'L', b'M', b'N', b'P', b'Q', b'R', b'S',
    b'T', b'V', b'W', b'Y', b'U', b'O',
];

/// Is `c` one of the [`VALID_AA`] residue letters?
pub fn is_valid_residue(c: char) -> bool {
    c.is_ascii() && VALID_AA.contains(&(c as u8))
}

pub trait Mass {
    fn monoisotopic(&self) -> f64;
}

impl Mass for u8 {
    /// Residue masses for the 22 proteinogenic amino acids. Ambiguous codes
    /// (B, J, X, Z) contribute nothing to the peptide mass.
    fn monoisotopic(&self) -> f64 {
        match self {
            b'A' => 71.0371137878,
            b'R' => 156.1011110281,
            b'N' => 114.0429274472,
            b'D' => 115.0269430320,
            b'C' => 103.0091844778,
            b'E' => 129.0425930962,
            b'Q' => 128.0585775114,
            b'G' => 57.0214637236,
            b'H' => 137.0589118624,
            b'I' => 113.0840639804,
            b'L' => 113.0840639804,
            b'K' => 128.0949630177,
            b'M' => 131.0404846062,
            b'F' => 147.0684139162,
            b'P' => 97.0527638520,
            b'S' => 87.0320284099,
            b'T' => 101.0476784741,
            b'W' => 186.0793129535,
            b'Y' => 163.0633285383,
            b'V' => 99.0684139162,
            b'U' => 150.9536355878,
            b'O' => 237.1477268371,
            _ => 0.0,
        }
    }
}

impl Mass for char {
    fn monoisotopic(&self) -> f64 {
        match u8::try_from(*self) {
            Ok(b) => b.monoisotopic(),
            Err(_) => 0.0,
        }
    }
}

/// Monoisotopic mass of an unmodified peptide (residues + water)
pub fn peptide_mass(sequence: &str) -> f64 {
    sequence.bytes().map(|b| b.monoisotopic()).sum::<f64>() + H2O
}

/// Are `a` and `b` equal once both are rounded to `digits` decimal places?
pub fn same_mass(a: f64, b: f64, digits: u8) -> bool {
    // Compare the scaled integers rather than the rescaled floats so that
    // e.g. 0.1 + 0.2 and 0.3 agree
    let scale = 10f64.powi(digits as i32);
    (a * scale).round() == (b * scale).round()
}
