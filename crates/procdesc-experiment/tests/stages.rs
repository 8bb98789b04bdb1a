use approx::assert_relative_eq;
use procdesc_experiment::flatten::{flatten_results, FlatValue};
use procdesc_experiment::{flatten, BasicEvaluator, GenerationRunner, ScoreImporter};
use procdesc_llm::{DescriptionGenerator, Generation, GenerationError, GenerationRequest, Usage};
use procdesc_model::layout::{self, DESCRIPTION_FILE};
use procdesc_model::{
    BasicEvaluation, DiagramAnnotation, ExperimentError, GenerationResult, ModelCatalog,
    ModelSpec, Parameters, Prompt, ResultsDir, ScoreFragment, ScoreSheet, Testcase, TestcaseUid,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::tempdir;

// ============================================================================
// Fixtures
// ============================================================================

/// Answers every request with fixed text and usage, remembering what it was asked.
struct ScriptedGenerator {
    text: String,
    usage: Usage,
    seen: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    fn new(text: &str, prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            text: text.to_string(),
            usage: Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
            seen: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

impl DescriptionGenerator for ScriptedGenerator {
    fn generate(&self, request: &GenerationRequest) -> Result<Generation, GenerationError> {
        self.seen.lock().unwrap().push(request.clone());
        Ok(Generation {
            text: self.text.clone(),
            usage: self.usage,
        })
    }
}

struct Unreachable;

impl DescriptionGenerator for Unreachable {
    fn generate(&self, _: &GenerationRequest) -> Result<Generation, GenerationError> {
        Err(GenerationError::Network("connection refused".to_string()))
    }
}

fn catalog() -> ModelCatalog {
    ModelCatalog::new(vec![ModelSpec::new("gpt-4", 8_192, 0.03, 0.06)])
}

fn annotation(id: &str) -> DiagramAnnotation {
    DiagramAnnotation {
        model_id: id.to_string(),
        serialized_model: format!("<definitions id=\"{id}\"/>"),
        activities_count: 2,
        events_count: 2,
        gateways_count: 1,
        type_activities_count: BTreeMap::from([("task".to_string(), 2)]),
        type_events_count: BTreeMap::from([
            ("endEvent".to_string(), 1),
            ("startEvent".to_string(), 1),
        ]),
        type_gateways_count: BTreeMap::from([("exclusiveGateway".to_string(), 1)]),
        cnc: 1.0,
        durfee: 1,
        nodes_count: 5,
        sequence_flows_count: 5,
        pools_count: 0,
        lanes_count: 0,
        tokens_count: 40,
        characters_count: 120,
        supported_chatgpt_models: vec!["gpt-4".to_string()],
        chatgpt_model_pricings_usd: BTreeMap::from([("gpt-4".to_string(), 0.0012)]),
        dir: PathBuf::from(format!("datasets/annotated/ds/{id}")),
    }
}

fn testcase(model: &str) -> Testcase {
    Testcase {
        dataset_name: "ds".to_string(),
        annotation: annotation("Def_1"),
        prompt: Prompt {
            name: "plain.txt".to_string(),
            text: "Describe this process.".to_string(),
        },
        temperature: 0.5,
        chatgpt_model: model.to_string(),
    }
}

fn uid(s: &str) -> TestcaseUid {
    TestcaseUid::parse(s).unwrap()
}

fn fragment(entries: &[(&str, f64)]) -> ScoreFragment {
    let mut f = ScoreFragment::new();
    for (k, v) in entries {
        f.insert(*k, *v);
    }
    f
}

/// A testcase directory with every artifact the flattener reads.
fn write_complete_testcase(results: &ResultsDir, id: &str, score: &[(&str, f64)]) -> PathBuf {
    let u = uid(id);
    let dir = results.testcase_dir(&u);
    fs::create_dir_all(&dir).unwrap();
    let case = testcase("gpt-4");
    layout::write_json_pretty(&dir.join("annotated_model.json"), &case.annotation).unwrap();
    layout::write_json_pretty(&dir.join("parameters.json"), &case.parameters(u)).unwrap();
    let result = GenerationResult {
        generated_description: "First the order arrives.".to_string(),
        real_prompt_tokens: 10,
        real_completion_tokens: 5,
        real_total_tokens: 15,
        billed_estimate: 0.0006,
    };
    layout::write_json_pretty(&dir.join("generation_result.json"), &result).unwrap();
    let basic = BasicEvaluation {
        sent_count: 1,
        word_count: 5,
    };
    layout::write_json_pretty(&dir.join("basic_eval.json"), &basic).unwrap();
    for sheet in ScoreSheet::ALL {
        layout::write_json_pretty(&dir.join(sheet.json_file_name()), &fragment(score)).unwrap();
    }
    dir
}

fn write_sheets(pool: &Path, overall: &str, sca: &str, components: &str) {
    fs::create_dir_all(pool).unwrap();
    fs::write(pool.join("taasc_results.csv"), overall).unwrap();
    fs::write(pool.join("taasc_results_sca.csv"), sca).unwrap();
    fs::write(pool.join("taasc_results_components.csv"), components).unwrap();
}

// ============================================================================
// Generation runner
// ============================================================================

#[test]
fn every_run_gets_its_own_directory() {
    let root = tempdir().unwrap();
    let generator = ScriptedGenerator::new("The clerk files the claim.", 1000, 500);
    let runner = GenerationRunner::with_results_root(&generator, catalog(), root.path());

    let cases = vec![testcase("gpt-4"); 3];
    let uids = runner.run_all(&cases).unwrap();
    assert_eq!(uids.len(), 3);
    assert_eq!(generator.calls(), 3);

    let results = ResultsDir::for_dataset(root.path(), "ds");
    let listed: Vec<TestcaseUid> = results.testcases().unwrap().into_iter().map(|(u, _)| u).collect();
    let mut expected = uids.clone();
    expected.sort();
    assert_eq!(listed, expected);

    for u in &uids {
        let dir = results.testcase_dir(u);
        for file in [
            "generation_result.json",
            "generated_description.txt",
            "annotated_model.json",
            "parameters.json",
        ] {
            assert!(dir.join(file).is_file(), "{file} missing for {u}");
        }
        let pooled = fs::read_to_string(results.pooled_description(u)).unwrap();
        assert_eq!(pooled, "The clerk files the claim.");

        let params: Parameters = layout::read_json(&dir.join("parameters.json")).unwrap();
        assert_eq!(&params.uid, u);
        assert_eq!(params.seed, 123);
        assert_eq!(params.prompt_name, "plain.txt");
        assert_eq!(params.dataset_name, "ds");
    }
}

#[test]
fn request_carries_prompt_as_system_and_diagram_as_user() {
    let root = tempdir().unwrap();
    let generator = ScriptedGenerator::new("text", 1, 1);
    let runner = GenerationRunner::with_results_root(&generator, catalog(), root.path());
    runner.run(&testcase("gpt-4")).unwrap();

    let seen = generator.seen.lock().unwrap();
    assert_eq!(seen[0].model, "gpt-4");
    assert_eq!(seen[0].seed, 123);
    assert_relative_eq!(seen[0].temperature, 0.5);
    assert_eq!(seen[0].system, "Describe this process.");
    assert_eq!(seen[0].user, "<definitions id=\"Def_1\"/>");
}

#[test]
fn billing_uses_input_and_output_prices() {
    let root = tempdir().unwrap();
    let generator = ScriptedGenerator::new("text", 1000, 500);
    let runner = GenerationRunner::with_results_root(&generator, catalog(), root.path());
    let u = runner.run(&testcase("gpt-4")).unwrap();

    let dir = ResultsDir::for_dataset(root.path(), "ds").testcase_dir(&u);
    let result: GenerationResult = layout::read_json(&dir.join("generation_result.json")).unwrap();
    assert_eq!(result.real_prompt_tokens, 1000);
    assert_eq!(result.real_completion_tokens, 500);
    assert_eq!(result.real_total_tokens, 1500);
    assert_relative_eq!(result.billed_estimate, 0.03 + 0.03, epsilon = 1e-12);
}

#[test]
fn zero_usage_bills_nothing() {
    let root = tempdir().unwrap();
    let generator = ScriptedGenerator::new("", 0, 0);
    let runner = GenerationRunner::with_results_root(&generator, catalog(), root.path());
    let u = runner.run(&testcase("gpt-4")).unwrap();

    let dir = ResultsDir::for_dataset(root.path(), "ds").testcase_dir(&u);
    let result: GenerationResult = layout::read_json(&dir.join("generation_result.json")).unwrap();
    assert_eq!(result.billed_estimate, 0.0);
    assert_eq!(fs::read_to_string(dir.join(DESCRIPTION_FILE)).unwrap(), "");
}

#[test]
fn unknown_model_fails_before_calling_out() {
    let root = tempdir().unwrap();
    let generator = ScriptedGenerator::new("text", 1, 1);
    let runner = GenerationRunner::with_results_root(&generator, catalog(), root.path());
    let err = runner.run(&testcase("gpt-5")).unwrap_err();
    assert!(matches!(err, ExperimentError::UnknownModel { .. }));
    assert_eq!(generator.calls(), 0);
}

#[test]
fn service_failure_leaves_no_testcase_behind() {
    let root = tempdir().unwrap();
    let runner = GenerationRunner::with_results_root(Unreachable, catalog(), root.path());
    let err = runner.run(&testcase("gpt-4")).unwrap_err();
    match err {
        ExperimentError::ExternalService { model, message } => {
            assert_eq!(model, "gpt-4");
            assert!(message.contains("connection refused"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(!root.path().join("ds").exists());
}

// ============================================================================
// Basic evaluator
// ============================================================================

#[test]
fn evaluator_writes_counts_per_testcase() {
    let root = tempdir().unwrap();
    let generator = ScriptedGenerator::new("The order arrives. It is checked.", 1, 1);
    let runner = GenerationRunner::with_results_root(&generator, catalog(), root.path());
    let u = runner.run(&testcase("gpt-4")).unwrap();

    let results = ResultsDir::for_dataset(root.path(), "ds");
    let evals = BasicEvaluator::default().evaluate_results(&results).unwrap();
    assert_eq!(evals.len(), 1);
    let expected = BasicEvaluation {
        sent_count: 2,
        word_count: 8,
    };
    assert_eq!(evals[0], (u.clone(), expected));

    let written: BasicEvaluation =
        layout::read_json(&results.testcase_dir(&u).join("basic_eval.json")).unwrap();
    assert_eq!(written, expected);
}

#[test]
fn evaluator_requires_the_description() {
    let root = tempdir().unwrap();
    let results = ResultsDir::new(root.path());
    fs::create_dir_all(root.path().join("orphan")).unwrap();
    let err = BasicEvaluator::default().evaluate_results(&results).unwrap_err();
    assert!(matches!(err, ExperimentError::MissingArtifact { .. }));
}

// ============================================================================
// Score importer
// ============================================================================

#[test]
fn importer_writes_each_row_to_its_own_testcase() {
    let root = tempdir().unwrap();
    let results = ResultsDir::new(root.path());
    fs::create_dir_all(results.testcase_dir(&uid("0202680c"))).unwrap();
    fs::create_dir_all(results.testcase_dir(&uid("7f3a"))).unwrap();
    write_sheets(
        &results.descriptions_dir(),
        "filename,lsa_overall,wn_overall\ndesc_0202680c.txt,0.25,1\ndesc_7f3a.txt,0.5,2\n",
        "filename,sca\nC:\\tmp\\sca_parsed_files\\desc_0202680c.txt,3\n",
        "filename,comp_a,comp_b\n/tmp/desc_0202680c.txt, 4 ,5\n/tmp/desc_7f3a.txt,6,7\n",
    );

    let written = ScoreImporter::import(&results).unwrap();
    assert_eq!(written[&ScoreSheet::Overall], 2);
    assert_eq!(written[&ScoreSheet::SubComponentAlignment], 1);
    assert_eq!(written[&ScoreSheet::Components], 2);

    let a = results.testcase_dir(&uid("0202680c"));
    let overall: ScoreFragment = layout::read_json(&a.join("taasc_results.json")).unwrap();
    assert_eq!(overall, fragment(&[("lsa_overall", 0.25), ("wn_overall", 1.0)]));
    let components: ScoreFragment = layout::read_json(&a.join("taasc_results_components.json")).unwrap();
    assert_eq!(components, fragment(&[("comp_a", 4.0), ("comp_b", 5.0)]));

    let b = results.testcase_dir(&uid("7f3a"));
    let overall: ScoreFragment = layout::read_json(&b.join("taasc_results.json")).unwrap();
    assert_eq!(overall.get("lsa_overall"), Some(0.5));
    assert!(!b.join("taasc_results_sca.json").exists());
}

#[test]
fn importer_requires_all_three_sheets_before_writing() {
    let root = tempdir().unwrap();
    let results = ResultsDir::new(root.path());
    fs::create_dir_all(results.testcase_dir(&uid("u1"))).unwrap();
    let pool = results.descriptions_dir();
    fs::create_dir_all(&pool).unwrap();
    fs::write(pool.join("taasc_results.csv"), "filename,x\ndesc_u1.txt,1\n").unwrap();
    fs::write(pool.join("taasc_results_sca.csv"), "filename,y\ndesc_u1.txt,1\n").unwrap();

    match ScoreImporter::import(&results) {
        Err(ExperimentError::MissingScoreFile { path }) => {
            assert!(path.ends_with("taasc_results_components.csv"))
        }
        other => panic!("expected MissingScoreFile, got {other:?}"),
    }
    assert!(!results.testcase_dir(&uid("u1")).join("taasc_results.json").exists());
}

#[test]
fn importer_rejects_rows_for_unknown_testcases() {
    let root = tempdir().unwrap();
    let results = ResultsDir::new(root.path());
    write_sheets(
        &results.descriptions_dir(),
        "filename,x\ndesc_ghost.txt,1\n",
        "filename,y\n",
        "filename,z\n",
    );
    let err = ScoreImporter::import(&results).unwrap_err();
    assert!(matches!(err, ExperimentError::UnknownTestcase { ref uid, .. } if uid == "ghost"));
}

#[test]
fn non_finite_scores_survive_import_and_flatten() {
    let root = tempdir().unwrap();
    let results = ResultsDir::new(root.path());
    write_complete_testcase(&results, "u1", &[]);
    write_sheets(
        &results.descriptions_dir(),
        "filename,x\ndesc_u1.txt,nan\n",
        "filename,y\n/pool/desc_u1.txt,inf\n",
        "filename,z\n/pool/desc_u1.txt,-inf\n",
    );

    ScoreImporter::import(&results).unwrap();
    let overall: ScoreFragment =
        layout::read_json(&results.testcase_dir(&uid("u1")).join("taasc_results.json")).unwrap();
    assert!(overall.get("x").unwrap().is_nan());

    assert_eq!(flatten(&results).unwrap(), 1);
    let mut reader = csv::Reader::from_path(results.final_results()).unwrap();
    let header: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
    let row = reader.records().next().unwrap().unwrap();
    let at = |name: &str| header.iter().position(|h| h == name).unwrap();
    assert_eq!(&row[at("taasc_x")], "nan");
    assert_eq!(&row[at("taasc_sca_y")], "inf");
    assert_eq!(&row[at("taasc_components_z")], "-inf");
}

// ============================================================================
// Flattener
// ============================================================================

#[test]
fn flattens_two_testcases_into_header_plus_two_rows() {
    let root = tempdir().unwrap();
    let results = ResultsDir::new(root.path());
    write_complete_testcase(&results, "a", &[("score", 0.25)]);
    write_complete_testcase(&results, "b", &[("score", 1.0)]);
    fs::create_dir_all(results.descriptions_dir()).unwrap();

    assert_eq!(flatten(&results).unwrap(), 2);

    let mut reader = csv::Reader::from_path(results.final_results()).unwrap();
    let header: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
    let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), 2);

    assert_eq!(
        &header[..9],
        &[
            "uid",
            "dataset",
            "model_id",
            "chatgpt_model",
            "temperature",
            "prompt_name",
            "seed",
            "sent_count",
            "word_count",
        ]
    );
    let at = |name: &str| header.iter().position(|h| h == name).unwrap();
    assert!(at("md_dir") < at("md_type_activities_count_task"));
    assert!(at("md_type_gateways_count_exclusiveGateway") < at("genres_real_prompt_tokens"));
    assert!(at("genres_billed_estimate") < at("taasc_score"));
    assert!(at("taasc_score") < at("taasc_sca_score"));
    assert!(at("taasc_sca_score") < at("taasc_components_score"));
    assert!(!header.iter().any(|h| h == "md_serialized_model" || h == "genres_generated_description"));

    assert_eq!(&rows[0][at("uid")], "a");
    assert_eq!(&rows[0][at("temperature")], "0.5");
    assert_eq!(&rows[0][at("seed")], "123");
    assert_eq!(&rows[0][at("md_cnc")], "1.0");
    assert_eq!(&rows[0][at("taasc_sca_score")], "0.25");
    assert_eq!(&rows[1][at("uid")], "b");
    assert_eq!(&rows[1][at("taasc_components_score")], "1.0");
}

#[test]
fn missing_artifact_aborts_without_output() {
    let root = tempdir().unwrap();
    let results = ResultsDir::new(root.path());
    write_complete_testcase(&results, "a", &[("score", 0.25)]);
    let b = write_complete_testcase(&results, "b", &[("score", 1.0)]);
    fs::remove_file(b.join("taasc_results_sca.json")).unwrap();

    let err = flatten(&results).unwrap_err();
    assert!(matches!(err, ExperimentError::MissingArtifact { .. }));
    assert!(!results.final_results().exists());
}

#[test]
fn differing_score_columns_are_a_header_mismatch() {
    let root = tempdir().unwrap();
    let results = ResultsDir::new(root.path());
    write_complete_testcase(&results, "a", &[("score", 0.25)]);
    write_complete_testcase(&results, "b", &[("score", 1.0), ("extra", 2.0)]);

    let err = flatten(&results).unwrap_err();
    assert!(matches!(err, ExperimentError::HeaderMismatch { ref uid, .. } if uid == "b"));
    assert!(!results.final_results().exists());
}

#[test]
fn empty_results_directory_fails() {
    let root = tempdir().unwrap();
    let results = ResultsDir::new(root.path());
    fs::create_dir_all(results.descriptions_dir()).unwrap();
    assert!(matches!(
        flatten_results(&results),
        Err(ExperimentError::EmptyResultSet { .. })
    ));
}

#[test]
fn values_keep_their_types() {
    let root = tempdir().unwrap();
    let results = ResultsDir::new(root.path());
    write_complete_testcase(&results, "a", &[("score", 3.0)]);
    let records = flatten_results(&results).unwrap();
    let r = &records[0];
    assert_eq!(r.get("md_nodes_count"), Some(&FlatValue::Int(5)));
    assert_eq!(r.get("taasc_score"), Some(&FlatValue::Float(3.0)));
    assert_eq!(r.get("dataset"), Some(&FlatValue::Text("ds".to_string())));
}
