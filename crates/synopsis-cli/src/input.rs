use anyhow::{ensure, Context};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};
use synopsis_core::{
    adapter::{ColumnLayout, EnginePreset},
    cleavage::EnzymeBuilder,
    error_log::MAX_ERROR_LOG_LEN,
    modification::ModificationBuilder,
    pipeline::Settings,
    rank::RankGrouping,
};

/// Either a built-in engine name or a full column layout
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum EngineConfig {
    Preset(EnginePreset),
    Layout(ColumnLayout),
}

impl EngineConfig {
    pub fn layout(&self) -> ColumnLayout {
        match self {
            EngineConfig::Preset(preset) => preset.layout(),
            EngineConfig::Layout(layout) => layout.clone(),
        }
    }

    fn default_mass_digits(&self) -> u8 {
        match self {
            EngineConfig::Preset(preset) => preset.mass_digits(),
            EngineConfig::Layout(_) => 0,
        }
    }
}

#[derive(Serialize)]
/// Actual run parameters - may include overrides or default values not set by user
pub struct Parameters {
    pub version: String,
    pub engine: EngineConfig,
    pub input_paths: Vec<String>,
    pub output_directory: String,
    pub modifications: ModificationBuilder,
    pub enzyme: EnzymeBuilder,
    pub decoy_patterns: Vec<String>,

    #[serde(skip_serializing)]
    pub settings: Settings,
}

#[derive(Deserialize, Default)]
/// Input parameters deserialized from JSON file
pub struct Input {
    engine: Option<EngineConfig>,
    input_paths: Option<Vec<String>>,
    output_directory: Option<String>,
    modifications: Option<ModificationBuilder>,
    mass_digits: Option<u8>,
    decoy_patterns: Option<Vec<String>>,
    allow_duplicate_terminal_mods: Option<bool>,
    rank_grouping: Option<RankGrouping>,
    score_threshold: Option<f64>,
    enzyme: Option<EnzymeBuilder>,
    max_error_log_len: Option<usize>,
}

impl Input {
    pub fn from_arguments(matches: ArgMatches) -> anyhow::Result<Self> {
        let path = matches
            .get_one::<String>("parameters")
            .context("`parameters` must be set")?;
        let mut input = Input::load(path)
            .with_context(|| format!("Failed to read parameters from `{path}`"))?;

        // Handle JSON configuration overrides
        if let Some(output_directory) = matches.get_one::<String>("output_directory") {
            log::trace!("overriding `output_directory` parameter.");
            input.output_directory = Some(output_directory.into());
        }
        if let Some(input_paths) = matches.get_many::<String>("input_paths") {
            log::trace!("overriding `input_paths` parameter.");
            input.input_paths = Some(input_paths.into_iter().map(|p| p.into()).collect());
        }

        ensure!(
            input.input_paths.as_ref().map_or(false, |p| !p.is_empty()),
            "`input_paths` must be set. For more information try '--help'"
        );

        Ok(input)
    }

    pub fn load<S: AsRef<str>>(path: S) -> anyhow::Result<Self> {
        synopsis_core::read_json(path.as_ref()).map_err(anyhow::Error::from)
    }

    pub fn build(self) -> anyhow::Result<Parameters> {
        let engine = self.engine.unwrap_or(EngineConfig::Preset(EnginePreset::Sage));
        let input_paths = self.input_paths.unwrap_or_default();
        ensure!(!input_paths.is_empty(), "no input files were given");

        let decoy_patterns = self
            .decoy_patterns
            .unwrap_or_else(|| vec!["rev_*".into(), "XXX_*".into()]);
        ensure!(
            !decoy_patterns.is_empty(),
            "`decoy_patterns` must contain at least one pattern"
        );

        if let Some(threshold) = self.score_threshold {
            ensure!(threshold.is_finite(), "`score_threshold` must be a number");
        }

        let mass_digits = self
            .mass_digits
            .unwrap_or_else(|| engine.default_mass_digits());
        ensure!(mass_digits <= 6, "`mass_digits` must be between 0 and 6");

        let output_directory = match self.output_directory {
            Some(path) => {
                std::fs::create_dir_all(&path)
                    .with_context(|| format!("Failed to create output directory `{path}`"))?;
                path
            }
            None => std::env::current_dir()?.display().to_string(),
        };

        let settings = Settings {
            mass_digits,
            allow_duplicate_terminal_mods: self.allow_duplicate_terminal_mods.unwrap_or(false),
            rank_grouping: self.rank_grouping.unwrap_or_default(),
            score_threshold: self.score_threshold,
            max_error_log_len: self.max_error_log_len.unwrap_or(MAX_ERROR_LOG_LEN),
        };

        Ok(Parameters {
            version: clap::crate_version!().into(),
            engine,
            input_paths,
            output_directory,
            modifications: self.modifications.unwrap_or_default(),
            enzyme: self.enzyme.unwrap_or_default(),
            decoy_patterns,
            settings,
        })
    }
}
