//! LoanLens - loan application analysis and insight reports
//!
//! A CLI tool that cleans a loan-application CSV, derives financial
//! features, aggregates approval and revenue views per lender and
//! optionally asks a chat-completions model for an executive report.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Any fatal error (invalid arguments, missing column, bad config, I/O)

use anyhow::{Context, Result};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use loanlens::cli::{Args, OutputFormat};
use loanlens::config::{Config, CONFIG_FILE_NAME};
use loanlens::dataset::RawTable;
use loanlens::insights::{
    ClientConfig, InsightPipeline, Insights, OpenAiClient, PromptContext, RetryPolicy,
};
use loanlens::models::{Report, ReportMetadata};
use loanlens::pipeline::{AnalysisBundle, LoanPipeline};
use loanlens::{analysis, export, report};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Config decides the log level, so it loads before tracing is up
    let (mut config, source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(config.log_level(&args))?;

    info!("LoanLens v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    source.log();

    match run_analysis(args, config).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Analysis failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .loanlens.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize lookup tables, segment edges, model, and more.");
    Ok(())
}

/// Initialize logging. `RUST_LOG` wins over the verbosity settings.
fn init_logging(level: Level) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::default().add_directive(LevelFilter::from_level(level).into())
    });

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Run the complete analysis workflow.
async fn run_analysis(args: Args, config: Config) -> Result<()> {
    let start_time = Instant::now();

    let input = args
        .input
        .clone()
        .context("An input CSV is required (--input)")?;

    // Step 1: Load and analyze
    println!("📥 Loading applications: {}", input.display());
    let raw = RawTable::from_csv_path(&input)?;
    let records_read = raw.len();
    info!("Read {} records", records_read);

    let pipeline = LoanPipeline::from_config(&config)?;
    println!("🔬 Deriving features and computing views...");
    let bundle = pipeline.run(raw)?;

    // Step 2: Export artifacts
    let output_dir = config.general.output_dir.clone();
    export::prepare_output_dir(&output_dir)?;

    let processed_csv = export::write_processed_data(&output_dir, &bundle)?;
    let text_summary = analysis::summary::text_summary(&bundle, config.report.preview_rows);
    export::write_text_summary(&output_dir, &text_summary)?;
    export::write_aggregate_views(&output_dir, &bundle)?;

    // Step 3: Narrative insights
    let insights =
        generate_insights(&args, &config, &bundle, text_summary, &processed_csv).await;
    if let Some(ref insights) = insights {
        export::write_insights(&output_dir, insights)?;
    }

    // Step 4: Build the report
    println!("📝 Generating report...");

    let metadata = ReportMetadata {
        input: input.display().to_string(),
        analysis_date: Utc::now(),
        model_used: insights.as_ref().map(|_| config.model.name.clone()),
        records_read,
        records_analyzed: bundle.enriched.len(),
        duration_seconds: start_time.elapsed().as_secs_f64(),
    };

    let report = Report {
        metadata,
        cleaning: bundle.cleaning.clone(),
        derivation: bundle.derivation.clone(),
        correlation: if config.report.include_correlation {
            bundle.correlation.clone()
        } else {
            None
        },
        views: bundle.views.clone(),
        omitted_views: bundle.omitted.clone(),
        insights,
    };

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };

    let report_path = output_dir.join(args.format.report_file_name());
    std::fs::write(&report_path, &output)
        .with_context(|| format!("Failed to write report to {}", report_path.display()))?;

    // Print summary
    println!("\n📊 Analysis Summary:");
    println!(
        "   Records: {} read, {} analyzed ({} duplicates removed)",
        records_read,
        bundle.enriched.len(),
        bundle.cleaning.duplicates_removed
    );
    println!("   Views: {}", bundle.view_names().join(", "));
    if !bundle.omitted.is_empty() {
        println!("   Omitted: {}", bundle.omitted.len());
    }
    println!(
        "   Insights: {}",
        if report.insights.is_some() { "generated" } else { "skipped" }
    );
    println!("   Duration: {:.1}s", report.metadata.duration_seconds);
    println!(
        "\n✅ Analysis complete! Report saved to: {}",
        report_path.display()
    );

    Ok(())
}

/// Run the insight stages. Failures are logged and yield `None`.
async fn generate_insights(
    args: &Args,
    config: &Config,
    bundle: &AnalysisBundle,
    text_summary: String,
    processed_csv: &str,
) -> Option<Insights> {
    if args.skip_insights {
        info!("Skipping insight generation (--skip-insights)");
        return None;
    }

    let Some(api_key) = args.api_key.clone().filter(|key| !key.is_empty()) else {
        warn!("No API key (--api-key or OPENAI_API_KEY); skipping insight generation");
        return None;
    };

    let client = match OpenAiClient::new(ClientConfig {
        api_url: config.model.api_url.clone(),
        api_key,
        model: config.model.name.clone(),
        temperature: config.model.temperature,
        max_tokens: config.model.max_tokens,
        timeout_seconds: config.model.timeout_seconds,
    }) {
        Ok(client) => client,
        Err(e) => {
            warn!("Insight generation unavailable: {:#}", e);
            return None;
        }
    };

    println!("🤖 Generating insights with {}...", client.model());

    let context = PromptContext::new(
        bundle,
        text_summary,
        processed_csv,
        config.report.sample_chars,
    );
    let insight_pipeline = InsightPipeline::new(
        client,
        RetryPolicy::new(
            config.model.retries,
            Duration::from_millis(config.model.retry_delay_ms),
        ),
    );

    let spinner = (!args.quiet).then(insight_spinner);

    match insight_pipeline.run(&context).await {
        Ok(insights) => {
            if let Some(pb) = spinner {
                pb.finish_with_message("Insights complete");
            }
            Some(insights)
        }
        Err(e) => {
            if let Some(pb) = spinner {
                pb.abandon_with_message("Insights failed");
            }
            warn!("Insight generation failed, report will have no narrative: {:#}", e);
            None
        }
    }
}

fn insight_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        pb.set_style(style);
    }
    pb.set_message("Waiting for model responses...");
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Where the configuration came from. Logged once tracing is up.
enum ConfigSource {
    Explicit(PathBuf),
    DefaultFile,
    Builtin,
    DefaultFileInvalid(anyhow::Error),
}

impl ConfigSource {
    fn log(&self) {
        match self {
            ConfigSource::Explicit(path) => info!("Loaded config from: {}", path.display()),
            ConfigSource::DefaultFile => info!("Loaded default config from {}", CONFIG_FILE_NAME),
            ConfigSource::Builtin => debug!("No config file found, using defaults"),
            ConfigSource::DefaultFileInvalid(e) => {
                warn!("Failed to load config, using defaults: {:#}", e)
            }
        }
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<(Config, ConfigSource)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigSource::Explicit(config_path.clone())));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, ConfigSource::DefaultFile)),
        Ok(None) => Ok((Config::default(), ConfigSource::Builtin)),
        Err(e) => Ok((Config::default(), ConfigSource::DefaultFileInvalid(e))),
    }
}
