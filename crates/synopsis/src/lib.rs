pub mod adapter;
pub mod cleavage;
pub mod error_log;
pub mod fdr;
pub mod mass;
pub mod modification;
pub mod output;
pub mod pipeline;
pub mod rank;
pub mod result;
pub mod sequence;
pub mod unique;

use std::path::Path;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Csv(csv::Error),
    Json(serde_json::Error),
    Modification(modification::InvalidModification),
    Enzyme(cleavage::InvalidEnzyme),
    DecoyPattern(regex::Error),
    MissingColumn { engine: String, column: String },
    Input { path: String, source: std::io::Error },
    Output { path: String, source: std::io::Error },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => e.fmt(f),
            Self::Csv(e) => e.fmt(f),
            Self::Json(e) => e.fmt(f),
            Self::Modification(e) => write!(f, "invalid modification: {}", e),
            Self::Enzyme(e) => write!(f, "invalid enzyme: {}", e),
            Self::DecoyPattern(e) => write!(f, "invalid decoy pattern: {}", e),
            Self::MissingColumn { engine, column } => {
                write!(f, "{} input is missing required column `{}`", engine, column)
            }
            Self::Input { path, source } => write!(f, "cannot read `{}`: {}", path, source),
            Self::Output { path, source } => write!(f, "cannot create `{}`: {}", path, source),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<modification::InvalidModification> for Error {
    fn from(e: modification::InvalidModification) -> Self {
        Self::Modification(e)
    }
}

impl From<cleavage::InvalidEnzyme> for Error {
    fn from(e: cleavage::InvalidEnzyme) -> Self {
        Self::Enzyme(e)
    }
}

impl From<regex::Error> for Error {
    fn from(e: regex::Error) -> Self {
        Self::DecoyPattern(e)
    }
}

pub fn read_json<P, T>(path: P) -> Result<T, Error>
where
    P: AsRef<Path>,
    T: for<'de> serde::Deserialize<'de>,
{
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| Error::Input {
        path: path.display().to_string(),
        source,
    })?;
    Ok(serde_json::from_str(&contents)?)
}
