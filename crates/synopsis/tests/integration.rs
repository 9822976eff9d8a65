use std::collections::HashMap;

use synopsis_core::adapter::{EnginePreset, TabularAdapter};
use synopsis_core::cleavage::Enzyme;
use synopsis_core::fdr::DecoyMatcher;
use synopsis_core::modification::{ModificationBuilder, ModificationEntry};
use synopsis_core::output::OutputPaths;
use synopsis_core::pipeline::{Pipeline, Settings};

fn pipeline() -> Result<Pipeline, synopsis_core::Error> {
    let entry = |mass: f64, residues: &str, tag: &str| ModificationEntry {
        mass,
        residues: residues.into(),
        symbol: None,
        tag: Some(tag.into()),
        kind: None,
    };
    let catalog = ModificationBuilder {
        static_mods: Some(HashMap::from([("C".to_string(), 57.021464)])),
        static_tags: Some(HashMap::from([("C".to_string(), "IodoAcet".to_string())])),
        entries: Some(vec![
            entry(15.994915, "M", "Plus1Oxy"),
            entry(42.010565, "", "Acetyl"),
        ]),
    }
    .build()?;

    let settings = Settings {
        mass_digits: EnginePreset::Sage.mass_digits(),
        ..Default::default()
    };
    Ok(Pipeline::new(
        catalog,
        DecoyMatcher::new(&["rev_*"])?,
        Some(Enzyme::trypsin()),
        settings,
    ))
}

fn table(path: &std::path::Path) -> Vec<Vec<String>> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .skip(1)
        .map(|line| line.split('\t').map(String::from).collect())
        .collect()
}

#[test]
fn sage_results() -> Result<(), synopsis_core::Error> {
    let directory = std::env::temp_dir().join("synopsis-core-integration");
    std::fs::create_dir_all(&directory)?;

    let pipeline = pipeline()?;
    let mut adapter = TabularAdapter::new(EnginePreset::Sage.layout());
    let summary = pipeline.process_file(&mut adapter, "../../tests/run1.sage.tsv", &directory)?;

    assert_eq!(summary.rows, 7);
    assert_eq!(summary.kept, 7);
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.unique_sequences, 6);
    assert_eq!(summary.forward, 5);
    assert_eq!(summary.reverse, 1);
    assert!(!summary.aborted);

    let paths = OutputPaths::new(&directory, "run1");

    let synopsis = table(&paths.synopsis);
    assert_eq!(synopsis.len(), 7);
    let peptides = synopsis.iter().map(|r| r[3].as_str()).collect::<Vec<_>>();
    assert_eq!(
        peptides,
        vec![
            "PEPTIDE",
            "PEPTIDE",
            "PEPTIDEK",
            "M[+15.9949]PEPTIDEK",
            "[+42.0106]-PEPTIDEK",
            "LESLIEK",
            "ACDEFK"
        ]
    );
    // Result_ID, Scan, Charge, Peptide, Protein, Score, 7 engine columns,
    // Monoisotopic_Mass, Rank, FDR, QValue
    assert!(synopsis.iter().all(|r| r.len() == 17));
    let ranks = synopsis.iter().map(|r| r[14].as_str()).collect::<Vec<_>>();
    assert_eq!(ranks, vec!["1", "1", "2", "1", "1", "1", "1"]);
    assert_eq!(synopsis[5][16], "0.2");
    assert_eq!(synopsis[6][16], "0.0");

    let result_to_seq = table(&paths.result_to_seq);
    let unique_ids = result_to_seq.iter().map(|r| r[1].as_str()).collect::<Vec<_>>();
    assert_eq!(unique_ids, vec!["1", "1", "2", "3", "4", "5", "6"]);

    let seq_info = table(&paths.seq_info);
    let descriptions = seq_info.iter().map(|r| r[2].as_str()).collect::<Vec<_>>();
    assert_eq!(
        descriptions,
        vec!["", "", "M1:Plus1Oxy", "P1:Acetyl", "", "C2:IodoAcet"]
    );

    let mod_details = table(&paths.mod_details);
    assert_eq!(
        mod_details,
        vec![
            vec!["3", "Plus1Oxy", "1"],
            vec!["4", "Acetyl", "1"],
            vec!["6", "IodoAcet", "2"],
        ]
    );

    let seq_to_protein = table(&paths.seq_to_protein);
    assert_eq!(seq_to_protein.len(), 7);
    assert_eq!(seq_to_protein[1][3], "rev_Protein_B");

    Ok(())
}

#[test]
fn missing_input_is_fatal() -> Result<(), synopsis_core::Error> {
    let pipeline = pipeline()?;
    let mut adapter = TabularAdapter::new(EnginePreset::Sage.layout());
    let directory = std::env::temp_dir();
    match pipeline.process_file(&mut adapter, "../../tests/missing.sage.tsv", &directory) {
        Err(synopsis_core::Error::Input { path, .. }) => assert!(path.ends_with("missing.sage.tsv")),
        other => panic!("unexpected {:?}", other),
    }
    Ok(())
}
