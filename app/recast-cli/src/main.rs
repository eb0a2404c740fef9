use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use shodh_recast::{
    CreativityLevel, Domain, LengthProfile, PipelineConfig, TaskKind, TransformPipeline,
    TransformationRequest, TransformationResult,
};

#[derive(Parser, Debug)]
#[command(name = "recast", version, about = "Paraphrase and summarize text with fallbacks")]
struct Cli {
    /// JSON pipeline config; defaults apply to missing fields.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Print the full result, including the attempt log, as JSON.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rewrite text in different words.
    Paraphrase(ParaphraseArgs),
    /// Condense text.
    Summarize(SummarizeArgs),
}

#[derive(Args, Debug)]
struct ParaphraseArgs {
    /// conservative, balanced or creative
    #[arg(long, default_value = "balanced")]
    level: String,
    #[arg(long, default_value_t = 3)]
    count: usize,
    #[arg(long, default_value_t = TransformationRequest::DEFAULT_MAX_NEW_TOKENS)]
    max_new_tokens: usize,
    /// Model alias (t5, bart) or model id.
    #[arg(long)]
    model: Option<String>,
    /// Input text; read from stdin when omitted.
    text: Option<String>,
}

#[derive(Args, Debug)]
struct SummarizeArgs {
    /// Skip classification and use this domain's prompt.
    #[arg(long)]
    domain: Option<String>,
    /// short, medium or long
    #[arg(long, default_value = "medium")]
    length: String,
    #[arg(long, default_value = "balanced")]
    level: String,
    /// Input text; read from stdin when omitted.
    text: Option<String>,
}

fn read_input(text: Option<String>) -> Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }
    let stdin = io::stdin();
    if stdin.is_terminal() {
        bail!("no input text given (pass it as an argument or pipe it on stdin)");
    }
    let mut buf = String::new();
    stdin
        .lock()
        .read_to_string(&mut buf)
        .context("failed to read stdin")?;
    Ok(buf)
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn print_result(result: &TransformationResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }
    for text in result.texts() {
        println!("{}", text);
    }
    if result.used_rule_fallback {
        tracing::warn!("Engine output was unusable; result comes from the rule-based fallback");
    }
    Ok(())
}

fn build_request(command: Commands) -> Result<TransformationRequest> {
    let request = match command {
        Commands::Paraphrase(args) => {
            let mut request =
                TransformationRequest::new(read_input(args.text)?, TaskKind::Paraphrase)?
                    .with_level(CreativityLevel::parse_or_default(&args.level))
                    .with_candidate_count(args.count)?
                    .with_max_new_tokens(args.max_new_tokens);
            if let Some(model) = args.model {
                request = request.with_model_key(model);
            }
            request
        }
        Commands::Summarize(args) => {
            let domain = args
                .domain
                .as_deref()
                .map(str::parse::<Domain>)
                .transpose()?;
            let length: LengthProfile = args.length.parse()?;
            TransformationRequest::new(read_input(args.text)?, TaskKind::Summary)?
                .with_level(CreativityLevel::parse_or_default(&args.level))
                .with_domain_override(domain)
                .with_length_profile(length)
        }
    };
    Ok(request)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    let request = build_request(cli.command)?;

    let pipeline = TransformPipeline::open(config)?;
    pipeline.warm_up().await;

    let result = pipeline.transform(&request).await;
    print_result(&result, cli.json)
}
