//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// LoanLens - loan application analysis and insight reports
///
/// Cleans a loan-application CSV, derives financial features, computes
/// approval and revenue views per lender, and optionally asks an
/// OpenAI-compatible model for a narrative executive report.
///
/// Examples:
///   loanlens --input data/loans.csv
///   loanlens --input data/loans.csv --output-dir results --format json
///   loanlens --input data/loans.csv --skip-insights
///   loanlens --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Loan application CSV to analyze
    #[arg(short, long, value_name = "CSV", required_unless_present = "init_config")]
    pub input: Option<PathBuf>,

    /// Directory for exported results
    ///
    /// Defaults to the config value (exported_results).
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .loanlens.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Report format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Chat-completions model used for insights
    #[arg(short, long, env = "LOANLENS_MODEL")]
    pub model: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, value_name = "URL", env = "LOANLENS_API_URL")]
    pub api_url: Option<String>,

    /// API key for the insight model
    #[arg(long, value_name = "KEY", env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Temperature for model responses (0.0 - 2.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Skip narrative insight generation
    #[arg(long)]
    pub skip_insights: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .loanlens.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl OutputFormat {
    /// Report file name for this format.
    pub fn report_file_name(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "report.md",
            OutputFormat::Json => "report.json",
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        match self.input {
            Some(ref input) => {
                if !input.exists() {
                    return Err(format!("Input file does not exist: {}", input.display()));
                }
                if !input.is_file() {
                    return Err(format!("Input path is not a file: {}", input.display()));
                }
            }
            None => return Err("An input CSV is required (--input)".to_string()),
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 2.0".to_string());
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `RUST_LOG` takes precedence when set.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
