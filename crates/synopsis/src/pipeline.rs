//! Orchestration of one synopsis run over one input file
//!
//! Rows flow through the stages strictly in order: adapter extraction,
//! score threshold, peptide parsing and mass computation, ranking within
//! each scan, FDR and q-value estimation, and finally the synopsis and
//! cross-reference writers.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::adapter::RawResultAdapter;
use crate::cleavage::Enzyme;
use crate::error_log::{ErrorLog, MAX_ERROR_LOG_LEN};
use crate::fdr::{compute_fdr_and_q_value, sort_by_score, DecoyMatcher};
use crate::modification::ModificationCatalog;
use crate::output::{OutputPaths, SynopsisWriter};
use crate::rank::{assign_ranks, RankGrouping};
use crate::result::{ResultIx, SearchResult};
use crate::sequence::SequenceParser;
use crate::Error;

#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    /// Decimal places used when matching annotated masses against the catalog
    pub mass_digits: u8,
    pub allow_duplicate_terminal_mods: bool,
    pub rank_grouping: RankGrouping,
    /// Results not passing this score are discarded before ranking
    pub score_threshold: Option<f64>,
    pub max_error_log_len: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            mass_digits: 0,
            allow_duplicate_terminal_mods: false,
            rank_grouping: RankGrouping::Scan,
            score_threshold: None,
            max_error_log_len: MAX_ERROR_LOG_LEN,
        }
    }
}

/// Counters describing a finished run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Input rows read, excluding the header
    pub rows: usize,
    /// Results written to the synopsis
    pub kept: usize,
    pub unique_sequences: usize,
    pub forward: usize,
    pub reverse: usize,
    /// Forward identifications at 1% q-value
    pub passing: usize,
    pub errors: usize,
    /// Reading stopped early because the abort flag was raised
    pub aborted: bool,
}

pub struct Pipeline {
    catalog: ModificationCatalog,
    decoys: DecoyMatcher,
    enzyme: Option<Enzyme>,
    settings: Settings,
    abort: Arc<AtomicBool>,
}

impl Pipeline {
    pub fn new(
        catalog: ModificationCatalog,
        decoys: DecoyMatcher,
        enzyme: Option<Enzyme>,
        settings: Settings,
    ) -> Self {
        Pipeline {
            catalog,
            decoys,
            enzyme,
            settings,
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Setting this flag stops the run after the current row. Everything
    /// read so far is still ranked and written.
    pub fn abort_flag(&self) -> Arc<AtomicBool> {
        self.abort.clone()
    }

    /// Run every stage over `input`, writing to `writers` (synopsis,
    /// ResultToSeqMap, SeqInfo, ModDetails, SeqToProteinMap)
    pub fn run<A, R, W>(&self, adapter: &mut A, input: R, writers: [W; 5]) -> Result<Summary, Error>
    where
        A: RawResultAdapter,
        R: Read,
        W: Write,
    {
        let start = Instant::now();
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .quoting(false)
            .has_headers(true)
            .from_reader(input);

        let header = rdr.headers()?.clone();
        adapter.parse_header(&header)?;

        let parser = SequenceParser::new(&self.catalog, self.settings.mass_digits)
            .allow_duplicate_terminal(self.settings.allow_duplicate_terminal_mods);
        let order = adapter.score_order();
        let mut errors = ErrorLog::with_capacity(self.settings.max_error_log_len);
        let mut summary = Summary::default();
        let mut arena: Vec<SearchResult> = Vec::new();

        let mut record = csv::StringRecord::new();
        loop {
            if self.abort.load(Ordering::Relaxed) {
                log::warn!("{}: aborted after {} rows", adapter.name(), summary.rows);
                summary.aborted = true;
                break;
            }
            // Line numbers are 1-based and include the header
            let line = summary.rows + 2;
            match rdr.read_record(&mut record) {
                Ok(true) => {}
                Ok(false) => break,
                // The file itself cannot be read any further
                Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => return Err(e.into()),
                Err(e) => {
                    summary.rows += 1;
                    errors.push(format!("line {}: {}", line, e));
                    continue;
                }
            }
            summary.rows += 1;

            let candidates = match adapter.parse_row(&record) {
                Ok(candidates) => candidates,
                Err(e) => {
                    errors.push(format!("line {}: {}", line, e));
                    continue;
                }
            };

            for raw in candidates {
                if let Some(threshold) = self.settings.score_threshold {
                    if !order.passes(raw.score, threshold) {
                        continue;
                    }
                }
                let parsed = parser.parse(&raw.peptide);
                for unresolved in &parsed.unresolved {
                    errors.push(format!("line {}: {}: {}", line, raw.peptide, unresolved));
                }
                if parsed.clean.is_empty() {
                    errors.push(format!("line {}: `{}` has no residues", line, raw.peptide));
                    continue;
                }
                arena.push(SearchResult::new(raw, parsed));
            }
        }

        log::trace!(
            "{}: {} candidates from {} rows",
            adapter.name(),
            arena.len(),
            summary.rows
        );

        // Rank within each scan (or scan + charge) partition
        let mut indices = (0..arena.len() as u32).map(ResultIx).collect::<Vec<_>>();
        let grouping = self.settings.rank_grouping;
        grouping.sort(&arena, &mut indices);
        let lengths = grouping
            .partitions(&arena, &indices)
            .map(|p| p.len())
            .collect::<Vec<_>>();
        let mut rest = indices.as_mut_slice();
        for len in lengths {
            let (partition, tail) = rest.split_at_mut(len);
            assign_ranks(&mut arena, partition, order);
            rest = tail;
        }

        let mut by_score = indices.clone();
        sort_by_score(&arena, &mut by_score, order);
        let fdr = compute_fdr_and_q_value(&mut arena, &by_score, &self.decoys);
        summary.forward = fdr.forward;
        summary.reverse = fdr.reverse;
        summary.passing = fdr.passing;

        let mut writer = SynopsisWriter::new(writers, &adapter.column_headers(), self.enzyme.clone())?;
        for ix in &indices {
            writer.write(&mut arena[ix.0 as usize])?;
        }
        writer.flush()?;
        summary.kept = arena.len();
        summary.unique_sequences = writer.unique_sequences();
        summary.errors = errors.len() + errors.dropped();

        errors.report(adapter.name());
        log::info!(
            "{}: {} rows, {} results, {} unique sequences, {} passing 1% q-value in {} ms",
            adapter.name(),
            summary.rows,
            summary.kept,
            summary.unique_sequences,
            summary.passing,
            start.elapsed().as_millis()
        );
        Ok(summary)
    }

    /// Process one input file into the five output tables in `output_directory`
    pub fn process_file<A, P, Q>(
        &self,
        adapter: &mut A,
        input_path: P,
        output_directory: Q,
    ) -> Result<Summary, Error>
    where
        A: RawResultAdapter,
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let input_path = input_path.as_ref();
        let input = File::open(input_path)
            .map(BufReader::new)
            .map_err(|source| Error::Input {
                path: input_path.display().to_string(),
                source,
            })?;
        let paths = OutputPaths::new(output_directory, &OutputPaths::base_name(input_path));
        let writers = paths.create()?;
        log::info!(
            "{}: writing {}",
            input_path.display(),
            paths.synopsis.display()
        );
        self.run(adapter, input, writers)
    }
}
