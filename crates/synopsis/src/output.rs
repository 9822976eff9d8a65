//! Synopsis and cross-reference table writers
//!
//! One run produces five tab-delimited files that share a single
//! [`UniqueSequenceRegistry`]:
//! * `<base>_syn.txt`: one row per retained result
//! * `<base>_syn_ResultToSeqMap.txt`: one row per result
//! * `<base>_syn_SeqInfo.txt`, `<base>_syn_ModDetails.txt`: written once per
//!   unique sequence
//! * `<base>_syn_SeqToProteinMap.txt`: written once per (sequence, protein)

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fnv::FnvHashSet;

use crate::cleavage::{CleavageState, Enzyme, ProteinTerminus};
use crate::result::SearchResult;
use crate::unique::UniqueSequenceRegistry;
use crate::Error;

fn writer<W: Write>(inner: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(inner)
}

/// Locations of the five output files of one run
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPaths {
    pub synopsis: PathBuf,
    pub result_to_seq: PathBuf,
    pub seq_info: PathBuf,
    pub mod_details: PathBuf,
    pub seq_to_protein: PathBuf,
}

impl OutputPaths {
    pub fn new<P: AsRef<Path>>(directory: P, base_name: &str) -> Self {
        let path = |suffix: &str| directory.as_ref().join(format!("{}{}", base_name, suffix));
        OutputPaths {
            synopsis: path("_syn.txt"),
            result_to_seq: path("_syn_ResultToSeqMap.txt"),
            seq_info: path("_syn_SeqInfo.txt"),
            mod_details: path("_syn_ModDetails.txt"),
            seq_to_protein: path("_syn_SeqToProteinMap.txt"),
        }
    }

    /// Base name for the outputs of `input`: the file name without its
    /// extension(s), e.g. `run1` for `run1.sage.tsv`
    pub fn base_name(input: &Path) -> String {
        let name = input
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "results".into());
        match name.split_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem.to_string(),
            _ => name,
        }
    }

    /// Create all five files. If any of them cannot be created, none of the
    /// run's output is written.
    pub fn create(&self) -> Result<[BufWriter<File>; 5], Error> {
        let create = |path: &PathBuf| {
            File::create(path)
                .map(BufWriter::new)
                .map_err(|source| Error::Output {
                    path: path.display().to_string(),
                    source,
                })
        };
        Ok([
            create(&self.synopsis)?,
            create(&self.result_to_seq)?,
            create(&self.seq_info)?,
            create(&self.mod_details)?,
            create(&self.seq_to_protein)?,
        ])
    }
}

/// Writes the four normalized tables that accompany a synopsis file.
///
/// Gating, which downstream consumers rely on when joining these tables:
/// * a ResultToSeqMap row for every result
/// * SeqInfo and ModDetails rows only the first time a unique sequence is seen
/// * a SeqToProteinMap row only the first time a (unique sequence, protein)
///   pair is seen
pub struct CrossReferenceWriter<W: Write> {
    result_to_seq: csv::Writer<W>,
    seq_info: csv::Writer<W>,
    mod_details: csv::Writer<W>,
    seq_to_protein: csv::Writer<W>,
    registry: UniqueSequenceRegistry,
    seq_proteins: FnvHashSet<(u32, Arc<String>)>,
    enzyme: Option<Enzyme>,
}

impl<W: Write> CrossReferenceWriter<W> {
    pub fn new(
        result_to_seq: W,
        seq_info: W,
        mod_details: W,
        seq_to_protein: W,
        enzyme: Option<Enzyme>,
    ) -> Result<Self, Error> {
        let mut xref = CrossReferenceWriter {
            result_to_seq: writer(result_to_seq),
            seq_info: writer(seq_info),
            mod_details: writer(mod_details),
            seq_to_protein: writer(seq_to_protein),
            registry: UniqueSequenceRegistry::default(),
            seq_proteins: FnvHashSet::default(),
            enzyme,
        };
        xref.result_to_seq
            .write_record(["Result_ID", "Unique_Seq_ID"])?;
        xref.seq_info.write_record([
            "Unique_Seq_ID",
            "Mod_Count",
            "Mod_Description",
            "Monoisotopic_Mass",
        ])?;
        xref.mod_details
            .write_record(["Unique_Seq_ID", "Mass_Correction_Tag", "Position"])?;
        xref.seq_to_protein.write_record([
            "Unique_Seq_ID",
            "Cleavage_State",
            "Terminus_State",
            "Protein_Name",
            "Protein_Expectation_Value_Log(e)",
            "Protein_Intensity_Log(I)",
        ])?;
        Ok(xref)
    }

    /// Look up (or issue) the unique sequence ID for `result`. The flag is
    /// true when this is the first result with this sequence and
    /// modifications.
    pub fn assign(&mut self, result: &SearchResult) -> (u32, bool) {
        let (id, existing) = self
            .registry
            .get_or_assign_id(&result.clean_sequence, &result.mod_description);
        (id, !existing)
    }

    pub fn unique_sequences(&self) -> usize {
        self.registry.len()
    }

    fn cleavage_state(&self, result: &SearchResult) -> CleavageState {
        match &self.enzyme {
            Some(enzyme) => {
                enzyme.cleavage_state(result.prefix, &result.clean_sequence, result.suffix)
            }
            None => CleavageState::Full,
        }
    }

    pub fn record_result(
        &mut self,
        result: &SearchResult,
        unique_seq_id: u32,
        first_of_sequence: bool,
    ) -> Result<(), Error> {
        let mut int = itoa::Buffer::new();
        let mut id = itoa::Buffer::new();
        let id = id.format(unique_seq_id);

        self.result_to_seq
            .write_record([int.format(result.result_id), id])?;

        if first_of_sequence {
            let mut record = csv::ByteRecord::new();
            record.push_field(id.as_bytes());
            record.push_field(int.format(result.modifications.len()).as_bytes());
            record.push_field(result.mod_description.as_bytes());
            record.push_field(format!("{:.7}", result.monoisotopic).as_bytes());
            self.seq_info.write_byte_record(&record)?;

            for m in &result.modifications {
                self.mod_details.write_record([
                    id,
                    m.definition.tag.as_str(),
                    int.format(m.position),
                ])?;
            }
        }

        if self
            .seq_proteins
            .insert((unique_seq_id, result.protein.clone()))
        {
            let mut float = ryu::Buffer::new();
            let mut record = csv::ByteRecord::new();
            record.push_field(id.as_bytes());
            record.push_field(int.format(self.cleavage_state(result) as u8).as_bytes());
            record.push_field(
                int.format(ProteinTerminus::from_flanks(result.prefix, result.suffix) as u8)
                    .as_bytes(),
            );
            record.push_field(result.protein.as_bytes());
            record.push_field(
                float
                    .format(result.protein_expectation.unwrap_or_default())
                    .as_bytes(),
            );
            record.push_field(
                float
                    .format(result.protein_intensity.unwrap_or_default())
                    .as_bytes(),
            );
            self.seq_to_protein.write_byte_record(&record)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), Error> {
        self.result_to_seq.flush()?;
        self.seq_info.flush()?;
        self.mod_details.flush()?;
        self.seq_to_protein.flush()?;
        Ok(())
    }

    /// Flush and hand back the underlying writers
    pub fn into_inner(self) -> Result<[W; 4], Error> {
        let inner = |w: csv::Writer<W>| w.into_inner().map_err(|e| Error::Io(e.into_error()));
        Ok([
            inner(self.result_to_seq)?,
            inner(self.seq_info)?,
            inner(self.mod_details)?,
            inner(self.seq_to_protein)?,
        ])
    }
}

/// The synopsis table plus its cross-reference tables
pub struct SynopsisWriter<W: Write> {
    synopsis: csv::Writer<W>,
    xref: CrossReferenceWriter<W>,
    next_result_id: u32,
}

impl<W: Write> SynopsisWriter<W> {
    /// `writers` are, in order: synopsis, ResultToSeqMap, SeqInfo, ModDetails,
    /// SeqToProteinMap
    pub fn new(
        writers: [W; 5],
        engine_columns: &[String],
        enzyme: Option<Enzyme>,
    ) -> Result<Self, Error> {
        let [synopsis, result_to_seq, seq_info, mod_details, seq_to_protein] = writers;
        let mut synopsis = writer(synopsis);

        let mut headers = csv::StringRecord::from(vec![
            "Result_ID",
            "Scan",
            "Charge",
            "Peptide",
            "Protein",
            "Score",
        ]);
        headers.extend(engine_columns);
        headers.extend(["Monoisotopic_Mass", "Rank", "FDR", "QValue"]);
        synopsis.write_record(&headers)?;

        Ok(SynopsisWriter {
            synopsis,
            xref: CrossReferenceWriter::new(
                result_to_seq,
                seq_info,
                mod_details,
                seq_to_protein,
                enzyme,
            )?,
            next_result_id: 1,
        })
    }

    /// Assign the next result ID to `result` and write it to all tables
    pub fn write(&mut self, result: &mut SearchResult) -> Result<(), Error> {
        result.result_id = self.next_result_id;
        self.next_result_id += 1;

        let mut int = itoa::Buffer::new();
        let mut float = ryu::Buffer::new();
        let mut record = csv::ByteRecord::new();
        record.push_field(int.format(result.result_id).as_bytes());
        record.push_field(int.format(result.scan).as_bytes());
        record.push_field(int.format(result.charge).as_bytes());
        record.push_field(result.peptide.as_bytes());
        record.push_field(result.protein.as_bytes());
        record.push_field(float.format(result.score).as_bytes());
        for value in &result.engine_columns {
            record.push_field(value.as_bytes());
        }
        record.push_field(format!("{:.7}", result.monoisotopic).as_bytes());
        record.push_field(int.format(result.rank).as_bytes());
        record.push_field(float.format(result.fdr).as_bytes());
        record.push_field(float.format(result.q_value).as_bytes());
        self.synopsis.write_byte_record(&record)?;

        let (unique_seq_id, first) = self.xref.assign(result);
        self.xref.record_result(result, unique_seq_id, first)
    }

    pub fn unique_sequences(&self) -> usize {
        self.xref.unique_sequences()
    }

    pub fn flush(&mut self) -> Result<(), Error> {
        self.synopsis.flush()?;
        self.xref.flush()
    }

    pub fn into_inner(self) -> Result<[W; 5], Error> {
        let synopsis = self
            .synopsis
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))?;
        let [a, b, c, d] = self.xref.into_inner()?;
        Ok([synopsis, a, b, c, d])
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::modification::{ModificationDefinition, ModificationType, TerminusState};
    use crate::sequence::LocatedModification;

    fn result(peptide: &str, protein: &str) -> SearchResult {
        SearchResult {
            scan: 1,
            charge: 2,
            peptide: peptide.into(),
            clean_sequence: peptide.into(),
            prefix: Some('K'),
            suffix: Some('-'),
            protein: Arc::new(protein.into()),
            monoisotopic: 799.359964,
            ..Default::default()
        }
    }

    fn tables(xref: CrossReferenceWriter<Vec<u8>>) -> Vec<String> {
        xref.into_inner()
            .unwrap()
            .into_iter()
            .map(|b| String::from_utf8(b).unwrap())
            .collect()
    }

    #[test]
    fn three_tier_gating() {
        let mut xref =
            CrossReferenceWriter::new(vec![], vec![], vec![], vec![], Some(Enzyme::trypsin()))
                .unwrap();

        let phospho = Arc::new(ModificationDefinition::new(
            79.966331,
            "STY",
            ModificationType::Dynamic,
            "Phosph",
        ));
        let mut a = result("APEPTIDEK", "Protein_A");
        a.modifications.push(LocatedModification {
            definition: phospho,
            residue: 'T',
            position: 5,
            terminus: TerminusState::None,
        });
        a.mod_description = "T5:Phosph".into();
        a.monoisotopic += 79.966331;

        let mut rows = vec![
            a.clone(),
            {
                let mut b = a.clone();
                b.protein = Arc::new("Protein_B".into());
                b
            },
            a.clone(),
            result("APEPTIDEK", "Protein_A"),
        ];
        for (ix, r) in rows.iter_mut().enumerate() {
            r.result_id = ix as u32 + 1;
            let (id, first) = xref.assign(r);
            xref.record_result(r, id, first).unwrap();
        }
        assert_eq!(xref.unique_sequences(), 2);

        let tables = tables(xref);
        assert_eq!(
            tables[0],
            "Result_ID\tUnique_Seq_ID\n1\t1\n2\t1\n3\t1\n4\t2\n"
        );
        assert_eq!(
            tables[1],
            "Unique_Seq_ID\tMod_Count\tMod_Description\tMonoisotopic_Mass\n\
             1\t1\tT5:Phosph\t879.3262950\n\
             2\t0\t\t799.3599640\n"
        );
        assert_eq!(
            tables[2],
            "Unique_Seq_ID\tMass_Correction_Tag\tPosition\n1\tPhosph\t5\n"
        );
        assert_eq!(
            tables[3],
            "Unique_Seq_ID\tCleavage_State\tTerminus_State\tProtein_Name\t\
             Protein_Expectation_Value_Log(e)\tProtein_Intensity_Log(I)\n\
             1\t2\t2\tProtein_A\t0.0\t0.0\n\
             1\t2\t2\tProtein_B\t0.0\t0.0\n\
             2\t2\t2\tProtein_A\t0.0\t0.0\n"
        );
    }

    #[test]
    fn synopsis_rows() {
        let writers = [vec![], vec![], vec![], vec![], vec![]];
        let mut syn = SynopsisWriter::new(writers, &["hyperscore".to_string()], None).unwrap();
        let mut r = result("PEPTIDE", "Protein_A");
        r.score = 0.5;
        r.rank = 1;
        r.fdr = 0.0;
        r.q_value = 0.0;
        r.engine_columns = vec!["31.2".into()];
        syn.write(&mut r).unwrap();
        assert_eq!(r.result_id, 1);

        let [synopsis, ..] = syn.into_inner().unwrap();
        assert_eq!(
            String::from_utf8(synopsis).unwrap(),
            "Result_ID\tScan\tCharge\tPeptide\tProtein\tScore\thyperscore\tMonoisotopic_Mass\tRank\tFDR\tQValue\n\
             1\t1\t2\tPEPTIDE\tProtein_A\t0.5\t31.2\t799.3599640\t1\t0.0\t0.0\n"
        );
    }

    #[test]
    fn output_paths() {
        let paths = OutputPaths::new("/tmp/out", "run1");
        assert_eq!(paths.synopsis, PathBuf::from("/tmp/out/run1_syn.txt"));
        assert_eq!(
            paths.seq_to_protein,
            PathBuf::from("/tmp/out/run1_syn_SeqToProteinMap.txt")
        );
        assert_eq!(OutputPaths::base_name(Path::new("/data/run1.sage.tsv")), "run1");
        assert_eq!(OutputPaths::base_name(Path::new("run2")), "run2");
    }
}
