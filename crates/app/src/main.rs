use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use ledgermatch_import::{read_transactions_file, write_transactions_file};
use ledgermatch_matching::{
    LlmConfig, LlmMatcher, MatchingEngine, OpenAiClient, RuleMatcher, DEFAULT_SECONDARY_THRESHOLD,
};
use ledgermatch_store::{ChartStore, MappingStore, RuleStore};

#[derive(Parser)]
#[command(
    name = "ledgermatch",
    version,
    about = "Categorize bank/credit-card transactions against a chart of accounts"
)]
struct Cli {
    /// Input CSV file of transactions
    input: PathBuf,

    /// Chart of accounts JSON file
    #[arg(long, default_value = "config/chart_of_accounts.json")]
    chart_of_accounts: PathBuf,

    /// Rules JSON file
    #[arg(long, default_value = "data/rules.json")]
    rules: PathBuf,

    /// Description-to-account mappings JSON file
    #[arg(long, default_value = "data/mappings.json")]
    mappings: PathBuf,

    /// Output CSV path (default: input name with `_categorized` appended)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Confidence below which the secondary matcher retries a transaction
    #[arg(long, default_value_t = DEFAULT_SECONDARY_THRESHOLD)]
    secondary_threshold: f64,

    /// Enable the LLM fallback pass (requires OPENAI_API_KEY)
    #[arg(long)]
    llm: bool,

    /// Model used by the LLM fallback
    #[arg(long, default_value = "gpt-4o-mini")]
    llm_model: String,
}

fn output_path(input: &PathBuf, output: Option<PathBuf>) -> PathBuf {
    if let Some(path) = output {
        return path;
    }
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("transactions");
    input.with_file_name(format!("{stem}_categorized.csv"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let chart = Arc::new(
        ChartStore::new(&cli.chart_of_accounts)
            .load()
            .with_context(|| {
                format!(
                    "failed to load chart of accounts from {}",
                    cli.chart_of_accounts.display()
                )
            })?,
    );

    // Rule/mapping load failures degrade to empty sets; matching continues
    // with reduced quality rather than aborting the run.
    let rules = RuleStore::new(&cli.rules).load_or_default();
    let mappings = MappingStore::new(&cli.mappings).load_or_default();

    let mut engine = MatchingEngine::new();
    engine.add_matcher(Box::new(RuleMatcher::new(chart.clone(), rules, mappings)));

    if cli.llm {
        // The API key is resolved here, at the outermost layer, and injected;
        // the matcher itself never reads the environment.
        let api_key = std::env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY must be set when --llm is enabled")?;
        let config = LlmConfig {
            model: cli.llm_model.clone(),
            ..LlmConfig::default()
        };
        let client = OpenAiClient::new(api_key, config)?;
        engine.add_matcher(Box::new(LlmMatcher::new(chart.clone(), client)));
    }

    let mut transactions = read_transactions_file(&cli.input)
        .with_context(|| format!("failed to read transactions from {}", cli.input.display()))?;

    engine.process_transactions(&mut transactions, cli.secondary_threshold)?;

    let output = output_path(&cli.input, cli.output);
    write_transactions_file(&output, &transactions, &chart)
        .with_context(|| format!("failed to write output to {}", output.display()))?;

    let matched = transactions.iter().filter(|t| t.is_matched()).count();
    let review = transactions.iter().filter(|t| t.needs_review()).count();
    println!(
        "Processed {} transactions: {} matched, {} need review",
        transactions.len(),
        matched,
        review
    );
    println!("Output written to {}", output.display());
    Ok(())
}
