//! Generation runner: one external call and one artifact directory per testcase.

use procdesc_llm::{DescriptionGenerator, GenerationRequest};
use procdesc_model::layout::{
    self, ANNOTATION_FILE, DEFAULT_RESULTS_ROOT, DESCRIPTION_FILE, GENERATION_RESULT_FILE,
    PARAMETERS_FILE,
};
use procdesc_model::{
    ExperimentError, GenerationResult, ModelCatalog, Result, ResultsDir, Testcase, TestcaseUid,
    TokenUsage, GENERATION_SEED,
};
use std::path::{Path, PathBuf};

pub struct GenerationRunner<G: DescriptionGenerator> {
    generator: G,
    catalog: ModelCatalog,
    results_root: PathBuf,
}

impl<G: DescriptionGenerator> GenerationRunner<G> {
    /// Runner writing under `results/` in the working directory.
    pub fn new(generator: G, catalog: ModelCatalog) -> Self {
        Self::with_results_root(generator, catalog, DEFAULT_RESULTS_ROOT)
    }

    pub fn with_results_root(generator: G, catalog: ModelCatalog, root: impl Into<PathBuf>) -> Self {
        Self {
            generator,
            catalog,
            results_root: root.into(),
        }
    }

    pub fn results_root(&self) -> &Path {
        &self.results_root
    }

    /// Run every testcase in order; the first failure aborts the batch.
    pub fn run_all(&self, testcases: &[Testcase]) -> Result<Vec<TestcaseUid>> {
        let mut uids = Vec::with_capacity(testcases.len());
        for (i, testcase) in testcases.iter().enumerate() {
            tracing::info!(
                n = i + 1,
                of = testcases.len(),
                diagram = %testcase.annotation.model_id,
                model = %testcase.chatgpt_model,
                temperature = testcase.temperature,
                prompt = %testcase.prompt.name,
                "generating"
            );
            uids.push(self.run(testcase)?);
        }
        Ok(uids)
    }

    /// Generate one description and persist its artifacts under a fresh uid.
    pub fn run(&self, testcase: &Testcase) -> Result<TestcaseUid> {
        let spec = self.catalog.require(&testcase.chatgpt_model)?;

        let request = GenerationRequest {
            model: testcase.chatgpt_model.clone(),
            temperature: testcase.temperature,
            seed: GENERATION_SEED,
            system: testcase.prompt.text.clone(),
            user: testcase.annotation.serialized_model.clone(),
        };
        let generation = self.generator.generate(&request).map_err(|e| {
            ExperimentError::ExternalService {
                model: testcase.chatgpt_model.clone(),
                message: e.to_string(),
            }
        })?;

        let usage = TokenUsage {
            prompt_tokens: generation.usage.prompt_tokens,
            completion_tokens: generation.usage.completion_tokens,
            total_tokens: generation.usage.total_tokens,
        };
        let result = GenerationResult::new(generation.text, usage, spec.billed_estimate(&usage));

        let results = ResultsDir::for_dataset(&self.results_root, &testcase.dataset_name);
        let (uid, dir) = self.claim_testcase_dir(&results)?;
        let parameters = testcase.parameters(uid.clone());

        layout::write_json_pretty(&dir.join(GENERATION_RESULT_FILE), &result)?;
        layout::write_text(&dir.join(DESCRIPTION_FILE), &result.generated_description)?;

        layout::ensure_dir(&results.descriptions_dir())?;
        layout::write_text(&results.pooled_description(&uid), &result.generated_description)?;

        layout::write_json_pretty(&dir.join(ANNOTATION_FILE), &testcase.annotation)?;
        layout::write_json_pretty(&dir.join(PARAMETERS_FILE), &parameters)?;

        tracing::info!(
            uid = %uid,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            billed_estimate = result.billed_estimate,
            dir = %dir.display(),
            "generated"
        );
        Ok(uid)
    }

    // A fresh directory per testcase; never reuse one that already exists.
    fn claim_testcase_dir(&self, results: &ResultsDir) -> Result<(TestcaseUid, PathBuf)> {
        layout::ensure_dir(results.root())?;
        loop {
            let uid = TestcaseUid::mint();
            let dir = results.testcase_dir(&uid);
            match std::fs::create_dir(&dir) {
                Ok(()) => return Ok((uid, dir)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    tracing::warn!(uid = %uid, "testcase directory already exists, minting again");
                }
                Err(e) => return Err(ExperimentError::io(&dir, e)),
            }
        }
    }
}
