//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.loanlens.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::PipelineResult;
use crate::features::{
    self, FeatureTables, FicoScale, SegmentScale, Segmenter, DEFAULT_DEBT_TO_INCOME_EDGES,
    DEFAULT_FICO_SCALE, DEFAULT_HIGH_FICO_THRESHOLD, DEFAULT_INCOME_TO_LOAN_EDGES,
};
use crate::models::columns;

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = ".loanlens.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Feature derivation tables.
    #[serde(default)]
    pub features: FeaturesConfig,

    /// Segment edges.
    #[serde(default)]
    pub segments: SegmentsConfig,

    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory for exported results.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            verbose: false,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("exported_results")
}

/// Lookup tables injected into the feature deriver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    /// `High_FICO` is 1 when the score is strictly above this.
    #[serde(default = "default_high_fico_threshold")]
    pub high_fico_threshold: f64,

    /// FICO group labels, lowest first.
    #[serde(default = "default_fico_scale")]
    pub fico_scale: Vec<String>,

    /// Loan reason to purpose group.
    #[serde(default = "features::default_reason_groups")]
    pub reason_groups: BTreeMap<String, String>,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            high_fico_threshold: default_high_fico_threshold(),
            fico_scale: default_fico_scale(),
            reason_groups: features::default_reason_groups(),
        }
    }
}

fn default_high_fico_threshold() -> f64 {
    DEFAULT_HIGH_FICO_THRESHOLD
}

fn default_fico_scale() -> Vec<String> {
    DEFAULT_FICO_SCALE.iter().map(|s| s.to_string()).collect()
}

/// Lower edges of the segment scales.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentsConfig {
    #[serde(default = "default_debt_to_income_edges")]
    pub debt_to_income: Vec<f64>,

    #[serde(default = "default_income_to_loan_edges")]
    pub income_to_loan: Vec<f64>,
}

impl Default for SegmentsConfig {
    fn default() -> Self {
        Self {
            debt_to_income: default_debt_to_income_edges(),
            income_to_loan: default_income_to_loan_edges(),
        }
    }
}

fn default_debt_to_income_edges() -> Vec<f64> {
    DEFAULT_DEBT_TO_INCOME_EDGES.to_vec()
}

fn default_income_to_loan_edges() -> Vec<f64> {
    DEFAULT_INCOME_TO_LOAN_EDGES.to_vec()
}

/// Insight model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Chat-completions model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens in each response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Attempts per insight stage.
    #[serde(default = "default_retries")]
    pub retries: usize,

    /// Base delay between attempts; grows linearly.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            api_url: default_api_url(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_timeout(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

fn default_model() -> String {
    "gpt-4-turbo".to_string()
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_temperature() -> f32 {
    0.5
}

fn default_max_tokens() -> u32 {
    1500
}

fn default_timeout() -> u64 {
    120
}

fn default_retries() -> usize {
    3
}

fn default_retry_delay_ms() -> u64 {
    2000
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Rows shown in the text summary preview.
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,

    /// Characters of processed CSV sent with each prompt.
    #[serde(default = "default_sample_chars")]
    pub sample_chars: usize,

    /// Include the correlation matrix table in the report.
    #[serde(default = "default_true")]
    pub include_correlation: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            preview_rows: default_preview_rows(),
            sample_chars: default_sample_chars(),
            include_correlation: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_preview_rows() -> usize {
    5
}

fn default_sample_chars() -> usize {
    1000
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.loanlens.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when explicitly provided.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output_dir) = args.output_dir {
            self.general.output_dir = output_dir.clone();
        }
        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref api_url) = args.api_url {
            self.model.api_url = api_url.clone();
        }
        if let Some(temperature) = args.temperature {
            self.model.temperature = temperature;
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Log level for this run. `--quiet` beats a verbose config file.
    pub fn log_level(&self, args: &crate::cli::Args) -> tracing::Level {
        match args.log_level() {
            tracing::Level::INFO if self.general.verbose => tracing::Level::DEBUG,
            level => level,
        }
    }

    /// Lookup tables for the feature deriver.
    pub fn feature_tables(&self) -> PipelineResult<FeatureTables> {
        Ok(FeatureTables {
            fico_scale: FicoScale::new(self.features.fico_scale.clone())?,
            reason_groups: self.features.reason_groups.clone(),
            high_fico_threshold: self.features.high_fico_threshold,
        })
    }

    /// Segmenter built from the configured edges.
    pub fn segmenter(&self) -> PipelineResult<Segmenter> {
        Ok(Segmenter::new(
            SegmentScale::new(
                columns::DEBT_TO_INCOME_SEGMENT,
                self.segments.debt_to_income.clone(),
            )?,
            SegmentScale::new(
                columns::INCOME_TO_LOAN_SEGMENT,
                self.segments.income_to_loan.clone(),
            )?,
        ))
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model.name, "gpt-4-turbo");
        assert_eq!(config.model.max_tokens, 1500);
        assert_eq!(config.features.high_fico_threshold, 700.0);
        assert_eq!(config.features.fico_scale.len(), 5);
        assert_eq!(
            config.features.reason_groups.get("medical_expense").map(String::as_str),
            Some("Emergency")
        );
        assert_eq!(config.general.output_dir, PathBuf::from("exported_results"));
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output_dir = "out"
verbose = true

[features]
high_fico_threshold = 680.0

[features.reason_groups]
vacation = "Leisure"

[segments]
debt_to_income = [0.0, 0.5]

[model]
name = "gpt-4o-mini"
temperature = 0.2
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output_dir, PathBuf::from("out"));
        assert!(config.general.verbose);
        assert_eq!(config.features.high_fico_threshold, 680.0);
        assert_eq!(config.features.reason_groups.len(), 1);
        assert_eq!(config.features.fico_scale.len(), 5);
        assert_eq!(config.segments.debt_to_income, vec![0.0, 0.5]);
        assert_eq!(config.segments.income_to_loan, vec![0.0, 0.1, 0.3, 0.5, 1.0]);
        assert_eq!(config.model.name, "gpt-4o-mini");
        assert_eq!(config.model.temperature, 0.2);
        assert_eq!(config.model.retries, 3);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[segments]"));
        assert!(toml_str.contains("[model]"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.segments.debt_to_income, DEFAULT_DEBT_TO_INCOME_EDGES.to_vec());
    }

    #[test]
    fn test_load_from_dir() {
        let dir = TempDir::new().unwrap();
        assert!(Config::load_from_dir(dir.path()).unwrap().is_none());

        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[report]\npreview_rows = 3\n",
        )
        .unwrap();
        let config = Config::load_from_dir(dir.path()).unwrap().unwrap();
        assert_eq!(config.report.preview_rows, 3);
        assert!(config.report.include_correlation);
    }

    #[test]
    fn test_verbose_config_raises_log_level() {
        use clap::Parser;

        let args = crate::cli::Args::parse_from(["loanlens", "--input", "loans.csv"]);
        let mut config: Config = toml::from_str("[general]\nverbose = true\n").unwrap();
        config.merge_with_args(&args);
        assert_eq!(config.log_level(&args), tracing::Level::DEBUG);

        assert_eq!(Config::default().log_level(&args), tracing::Level::INFO);

        let quiet = crate::cli::Args::parse_from(["loanlens", "--input", "loans.csv", "--quiet"]);
        assert_eq!(config.log_level(&quiet), tracing::Level::ERROR);
    }

    #[test]
    fn test_invalid_edges_rejected() {
        let mut config = Config::default();
        config.segments.income_to_loan = vec![0.0, 0.3, 0.1];
        let err = config.segmenter().unwrap_err();
        assert!(matches!(err, PipelineError::InvalidScale { .. }));
    }

    #[test]
    fn test_feature_tables_from_config() {
        let mut config = Config::default();
        config.features.fico_scale = vec!["Low".to_string(), "High".to_string()];
        let tables = config.feature_tables().unwrap();
        assert_eq!(tables.fico_scale.labels(), &["Low", "High"]);
    }
}
