use super::input::Parameters;
use anyhow::Context;
use log::info;
use rayon::prelude::*;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;
use synopsis_core::adapter::TabularAdapter;
use synopsis_core::fdr::DecoyMatcher;
use synopsis_core::pipeline::{Pipeline, Summary};

pub struct Runner {
    pub parameters: Parameters,
    pipeline: Pipeline,
    start: Instant,
}

impl Runner {
    pub fn new(parameters: Parameters) -> anyhow::Result<Self> {
        let start = Instant::now();
        let catalog = parameters
            .modifications
            .clone()
            .build()
            .context("Invalid modification definitions")?;
        let decoys = DecoyMatcher::new(&parameters.decoy_patterns[..])
            .context("Invalid decoy patterns")?;
        let enzyme = parameters
            .enzyme
            .clone()
            .build()
            .context("Invalid enzyme definition")?;

        info!("- {} modification definitions", catalog.len());
        let pipeline = Pipeline::new(catalog, decoys, enzyme, parameters.settings.clone());
        Ok(Self {
            parameters,
            pipeline,
            start,
        })
    }

    /// Raising this flag stops every file at its next row
    pub fn abort_flag(&self) -> Arc<AtomicBool> {
        self.pipeline.abort_flag()
    }

    fn process(&self, path: &str) -> anyhow::Result<Summary> {
        let mut adapter = TabularAdapter::new(self.parameters.engine.layout());
        self.pipeline
            .process_file(&mut adapter, path, &self.parameters.output_directory)
            .with_context(|| format!("Failed to process `{path}`"))
    }

    /// Process every input file, `parallel` at a time. Each file is an
    /// independent run; a failure in one file does not stop the others.
    pub fn run(&self, parallel: usize) -> anyhow::Result<Vec<Summary>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(parallel.max(1))
            .build()?;

        let results = pool.install(|| {
            self.parameters
                .input_paths
                .par_iter()
                .map(|path| (path, self.process(path)))
                .collect::<Vec<_>>()
        });

        let mut summaries = Vec::with_capacity(results.len());
        let mut failed = 0;
        for (path, result) in results {
            match result {
                Ok(summary) => summaries.push(summary),
                Err(e) => {
                    log::error!("{}: {:?}", path, e);
                    failed += 1;
                }
            }
        }

        let path = Path::new(&self.parameters.output_directory).join("results.json");
        let json = serde_json::to_string_pretty(&self.parameters)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write `{}`", path.display()))?;

        info!(
            "processed {} of {} files in {} ms",
            summaries.len(),
            self.parameters.input_paths.len(),
            self.start.elapsed().as_millis()
        );
        anyhow::ensure!(
            failed == 0,
            "{} of {} files failed",
            failed,
            self.parameters.input_paths.len()
        );
        Ok(summaries)
    }
}
