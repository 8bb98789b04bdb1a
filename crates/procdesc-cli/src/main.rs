//! procdesc CLI
//!
//! One subcommand per pipeline stage:
//! - `annotate`: diagram metrics, token counts and model fit per dataset
//! - `generate`: expand the experiment metadata and generate every testcase
//! - `evaluate`: sentence/word counts per generated description
//! - `import-scores`: scoring-tool sheets into per-testcase fragments
//! - `flatten`: every testcase's artifacts into `final_results.csv`
//! - `tokens`: token estimate for a single diagram

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use procdesc_annotate::{Annotator, Gpt2TokenCounter, TokenCounter};
use procdesc_experiment::{BasicEvaluator, GenerationRunner, ScoreImporter};
use procdesc_llm::OpenAiChatClient;
use procdesc_model::layout;
use procdesc_model::{require_existing, ModelCatalog, ResultsDir};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "procdesc")]
#[command(
    author,
    version,
    about = "Batch experiment: natural-language descriptions of BPMN diagrams"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Annotate every diagram directory in a dataset (writes `annotated_model.json`).
    Annotate {
        /// Dataset directory (`<dataset>/<diagram>/<name>.bpmn`)
        dataset_dir: PathBuf,
    },

    /// Generate descriptions for every testcase of an experiment.
    ///
    /// Requires `OPENAI_API_KEY`; `OPENAI_BASE_URL` overrides the endpoint.
    Generate {
        /// Experiment metadata JSON (results go to `results/<dataset>/<uid>/`)
        metadata: PathBuf,
    },

    /// Count sentences and words of every generated description (writes `basic_eval.json`).
    Evaluate {
        /// Results directory of one dataset (`results/<dataset>`)
        results_dir: PathBuf,
    },

    /// Import the scoring tool's CSV sheets from `descriptions/` into each testcase.
    ImportScores {
        /// Results directory of one dataset
        results_dir: PathBuf,
    },

    /// Join every testcase's artifacts into `final_results.csv`.
    Flatten {
        /// Results directory of one dataset
        results_dir: PathBuf,
    },

    /// Print the token estimate of a single diagram file.
    Tokens {
        /// A `.bpmn` file
        diagram: PathBuf,
    },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Annotate { dataset_dir } => cmd_annotate(&dataset_dir),
        Commands::Generate { metadata } => cmd_generate(&metadata),
        Commands::Evaluate { results_dir } => cmd_evaluate(&results_dir),
        Commands::ImportScores { results_dir } => cmd_import_scores(&results_dir),
        Commands::Flatten { results_dir } => cmd_flatten(&results_dir),
        Commands::Tokens { diagram } => cmd_tokens(&diagram),
    }
}

fn cmd_annotate(dataset_dir: &Path) -> Result<()> {
    require_existing(dataset_dir)?;
    println!(
        "{} dataset {}",
        "Annotating".green().bold(),
        dataset_dir.display()
    );

    let annotator = Annotator::new(ModelCatalog::builtin(), Gpt2TokenCounter::new()?);
    let annotations = annotator.annotate_dataset(dataset_dir)?;
    for a in &annotations {
        println!(
            "  {} {} (tokens={}, models={})",
            "→".cyan(),
            a.model_id,
            a.tokens_count,
            a.supported_chatgpt_models.join(",")
        );
    }
    println!("  {} {} diagrams annotated", "→".yellow(), annotations.len());
    Ok(())
}

fn cmd_generate(metadata: &Path) -> Result<()> {
    require_existing(metadata)?;
    println!(
        "{} testcases from {}",
        "Generating".green().bold(),
        metadata.display()
    );

    let testcases = procdesc_experiment::expand(metadata)?;
    println!("  {} {} testcases", "→".yellow(), testcases.len());

    let client = OpenAiChatClient::from_env()?;
    let runner = GenerationRunner::new(client, ModelCatalog::builtin());
    let uids = runner.run_all(&testcases)?;

    if let Some(first) = testcases.first() {
        let results = ResultsDir::for_dataset(runner.results_root(), &first.dataset_name);
        println!(
            "  {} {} testcases under {}",
            "→".cyan(),
            uids.len(),
            results.root().display()
        );
    }
    Ok(())
}

fn cmd_evaluate(results_dir: &Path) -> Result<()> {
    require_existing(results_dir)?;
    println!(
        "{} descriptions in {}",
        "Evaluating".green().bold(),
        results_dir.display()
    );

    let evals = BasicEvaluator::default().evaluate_results(&ResultsDir::new(results_dir))?;
    for (uid, eval) in &evals {
        println!(
            "  {} {} (sentences={}, words={})",
            "→".cyan(),
            uid,
            eval.sent_count,
            eval.word_count
        );
    }
    Ok(())
}

fn cmd_import_scores(results_dir: &Path) -> Result<()> {
    require_existing(results_dir)?;
    println!(
        "{} scores into {}",
        "Importing".green().bold(),
        results_dir.display()
    );

    let written = ScoreImporter::import(&ResultsDir::new(results_dir))?;
    for (sheet, n) in &written {
        println!(
            "  {} {} ({} testcases)",
            "→".cyan(),
            sheet.json_file_name(),
            n
        );
    }
    Ok(())
}

fn cmd_flatten(results_dir: &Path) -> Result<()> {
    require_existing(results_dir)?;
    println!(
        "{} results in {}",
        "Flattening".green().bold(),
        results_dir.display()
    );

    let results = ResultsDir::new(results_dir);
    let rows = procdesc_experiment::flatten(&results)?;
    println!(
        "  {} {} (rows={})",
        "→".cyan(),
        results.final_results().display(),
        rows
    );
    Ok(())
}

fn cmd_tokens(diagram: &Path) -> Result<()> {
    require_existing(diagram)?;
    let text = layout::read_text(diagram)?;
    let counter = Gpt2TokenCounter::new()?;
    println!("Number of tokens in the BPMN model: {}", counter.count(&text));
    Ok(())
}
