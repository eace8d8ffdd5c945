use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

pub const CONFIG_FILE_NAME: &str = ".strata.toml";

/// Top-level configuration from `.strata.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub classify: ClassifyConfig,
}

/// Per-file resource limits for extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: usize,
    #[serde(default = "default_time_budget_ms")]
    pub time_budget_ms: u64,
    #[serde(default = "default_true")]
    pub parallel: bool,
}

fn default_max_file_bytes() -> usize {
    2 * 1024 * 1024
}

fn default_time_budget_ms() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: default_max_file_bytes(),
            time_budget_ms: default_time_budget_ms(),
            parallel: true,
        }
    }
}

/// Blend of the per-language OOP-ness sub-score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_structural_weight")]
    pub structural_weight: f64,
    #[serde(default = "default_solid_weight")]
    pub solid_weight: f64,
    #[serde(default = "default_pattern_points")]
    pub pattern_points: f64,
    #[serde(default = "default_pattern_bonus_cap")]
    pub pattern_bonus_cap: f64,
}

fn default_structural_weight() -> f64 {
    0.6
}
fn default_solid_weight() -> f64 {
    0.3
}
fn default_pattern_points() -> f64 {
    5.0
}
fn default_pattern_bonus_cap() -> f64 {
    10.0
}

impl ScoringConfig {
    /// Weights must be finite and non-negative or the composite leaves [0, 100].
    pub fn validate(&self) -> Result<()> {
        let weights = [
            ("structural_weight", self.structural_weight),
            ("solid_weight", self.solid_weight),
            ("pattern_points", self.pattern_points),
            ("pattern_bonus_cap", self.pattern_bonus_cap),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                anyhow::bail!("[scoring] {name} must be a finite, non-negative number (got {value})");
            }
        }
        Ok(())
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            structural_weight: default_structural_weight(),
            solid_weight: default_solid_weight(),
            pattern_points: default_pattern_points(),
            pattern_bonus_cap: default_pattern_bonus_cap(),
        }
    }
}

/// Glob patterns used to infer file roles when a manifest omits them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyConfig {
    #[serde(default = "default_public_interface_patterns")]
    pub public_interface: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_public_interface_patterns() -> Vec<String> {
    vec![
        "**/*.h".to_string(),
        "**/*.hh".to_string(),
        "**/*.hpp".to_string(),
        "**/*.hxx".to_string(),
        "**/include/**".to_string(),
    ]
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            public_interface: default_public_interface_patterns(),
            exclude: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from a `.strata.toml` file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        let config: Config = toml::from_str(&content).with_context(|| {
            format!(
                "failed to parse '{}'. Run `strata init` to create a valid config file",
                path.display()
            )
        })?;
        config
            .scoring
            .validate()
            .with_context(|| format!("invalid configuration in '{}'", path.display()))?;
        Ok(config)
    }

    /// Load from `.strata.toml` in the given directory or any ancestor, or return defaults.
    pub fn load_or_default(dir: &Path) -> Self {
        let start = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        let mut current = start.as_path();
        loop {
            let config_path = current.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return match Self::load(&config_path) {
                    Ok(config) => config,
                    Err(e) => {
                        warn!(
                            "failed to load config from '{}': {e:#}. Using defaults.",
                            config_path.display()
                        );
                        Self::default()
                    }
                };
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }
        Self::default()
    }

    /// Generate default TOML content for `strata init`.
    pub fn default_toml() -> String {
        r#"# strata - structural analysis and project scoring

[analysis]
# Files above this size are rejected before parsing
max_file_bytes = 2097152
# Per-file extraction budget; slower files are reported as unavailable
time_budget_ms = 10000
parallel = true

[scoring]
# OOP-ness blend: structural usage and SOLID weights, plus a pattern bonus
structural_weight = 0.6
solid_weight = 0.3
pattern_points = 5.0
pattern_bonus_cap = 10.0

[classify]
# Files matching these globs are treated as public interfaces (headers)
public_interface = ["**/*.h", "**/*.hh", "**/*.hpp", "**/*.hxx", "**/include/**"]
# exclude = ["third_party/**", "**/vendor/**"]
"#
        .to_string()
    }
}
