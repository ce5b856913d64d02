use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::causal::TraversalOptions;
use crate::retrieval::{BudgetManager, RelevanceScorer, RetrievalEngine, ScoringWeights};
use crate::validation::{ContradictionDetector, TemporalValidator};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct CortexConfig {
    pub log: LogConfig,
    pub storage: StorageConfig,
    pub retrieval: RetrievalConfig,
    pub causal: CausalConfig,
    pub validation: ValidationConfig,
    /// Problems found while applying env overrides. Loading happens before
    /// logging is set up, so the caller reports these.
    #[serde(skip)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_token_budget: usize,
    /// How many memories are fetched from the store before scoring.
    pub candidate_limit: usize,
    pub min_confidence: f64,
    pub recency_half_life_days: f64,
    /// Access count that maps to the top of the access-frequency curve.
    pub reference_access_count: u64,
    pub chars_per_token: usize,
    pub weights: ScoringWeights,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CausalConfig {
    /// Unbounded when absent; cycles are still cut by the visited set.
    pub max_depth: Option<usize>,
    pub min_strength: f64,
    pub max_nodes: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ValidationConfig {
    /// Knowledge overlap below this is treated as an unrelated claim.
    pub similarity_floor: f64,
    pub expiry_warning_days: i64,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".into() }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_cortex_dir()
            .join("cortex.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_token_budget: 2000,
            candidate_limit: 200,
            min_confidence: 0.0,
            recency_half_life_days: 30.0,
            reference_access_count: 100,
            chars_per_token: 4,
            weights: ScoringWeights::default(),
        }
    }
}

impl Default for CausalConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_strength: 0.0,
            max_nodes: None,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            similarity_floor: 0.3,
            expiry_warning_days: 7,
        }
    }
}

/// Returns `~/.cortex/`, or `.cortex/` when no home directory is known.
pub fn default_cortex_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cortex")
}

/// Returns the default config file path: `~/.cortex/config.toml`
pub fn default_config_path() -> PathBuf {
    default_cortex_dir().join("config.toml")
}

impl CortexConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            CortexConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (CORTEX_DB, CORTEX_LOG_LEVEL,
    /// CORTEX_TOKEN_BUDGET). An unparseable budget is ignored and noted in
    /// `warnings`.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("CORTEX_DB") {
            self.storage.db_path = val;
        }
        if let Some(val) = var("CORTEX_LOG_LEVEL") {
            self.log.level = val;
        }
        if let Some(val) = var("CORTEX_TOKEN_BUDGET") {
            match val.parse() {
                Ok(budget) => self.retrieval.default_token_budget = budget,
                Err(e) => self
                    .warnings
                    .push(format!("ignoring CORTEX_TOKEN_BUDGET={val:?}: {e}")),
            }
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    pub fn retrieval_engine(&self) -> RetrievalEngine {
        let r = &self.retrieval;
        let scorer = RelevanceScorer::new()
            .with_weights(r.weights.clone())
            .with_recency_half_life(r.recency_half_life_days)
            .with_reference_access_count(r.reference_access_count);
        RetrievalEngine::new(scorer, BudgetManager::new(r.chars_per_token))
            .with_candidate_limit(r.candidate_limit)
            .with_min_confidence(r.min_confidence)
    }

    pub fn traversal_options(&self) -> TraversalOptions {
        TraversalOptions {
            max_depth: self.causal.max_depth,
            min_strength: self.causal.min_strength,
            max_nodes: self.causal.max_nodes,
            compute_confidence: true,
        }
    }

    pub fn contradiction_detector(&self) -> ContradictionDetector {
        ContradictionDetector::new().with_similarity_floor(self.validation.similarity_floor)
    }

    pub fn temporal_validator(&self) -> TemporalValidator {
        TemporalValidator::new(self.validation.expiry_warning_days)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = CortexConfig::default();
        assert_eq!(config.log.level, "info");
        assert_eq!(config.retrieval.default_token_budget, 2000);
        assert_eq!(config.retrieval.chars_per_token, 4);
        assert_eq!(config.causal.max_depth, None);
        assert_eq!(config.validation.similarity_floor, 0.3);
        assert!(config.storage.db_path.ends_with("cortex.db"));
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[log]
level = "debug"

[storage]
db_path = "/tmp/test.db"

[retrieval]
candidate_limit = 50

[retrieval.weights]
confidence = 0.5

[causal]
max_depth = 3
min_strength = 0.25
"#;
        let config: CortexConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.storage.db_path, "/tmp/test.db");
        assert_eq!(config.retrieval.candidate_limit, 50);
        assert_eq!(config.retrieval.weights.confidence, 0.5);
        assert_eq!(config.causal.max_depth, Some(3));
        assert_eq!(config.causal.min_strength, 0.25);
        // defaults still apply for unset fields
        assert_eq!(config.retrieval.default_token_budget, 2000);
        assert_eq!(
            config.retrieval.weights.importance,
            ScoringWeights::default().importance
        );
        assert_eq!(config.causal.max_nodes, None);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = CortexConfig::default();
        std::env::set_var("CORTEX_DB", "/tmp/override.db");
        std::env::set_var("CORTEX_LOG_LEVEL", "trace");
        std::env::set_var("CORTEX_TOKEN_BUDGET", "512");

        config.apply_env_overrides();

        assert_eq!(config.storage.db_path, "/tmp/override.db");
        assert_eq!(config.log.level, "trace");
        assert_eq!(config.retrieval.default_token_budget, 512);

        // Clean up
        std::env::remove_var("CORTEX_DB");
        std::env::remove_var("CORTEX_LOG_LEVEL");
        std::env::remove_var("CORTEX_TOKEN_BUDGET");
    }

    #[test]
    fn bad_token_budget_is_reported_not_applied() {
        let mut config = CortexConfig::default();
        let default_budget = config.retrieval.default_token_budget;
        config.apply_overrides(|key| (key == "CORTEX_TOKEN_BUDGET").then(|| "lots".to_string()));

        assert_eq!(config.retrieval.default_token_budget, default_budget);
        assert_eq!(config.warnings.len(), 1);
        assert!(config.warnings[0].contains("CORTEX_TOKEN_BUDGET"));
    }

    #[test]
    fn expand_tilde_leaves_absolute_paths() {
        assert_eq!(expand_tilde("/var/db/cortex.db"), PathBuf::from("/var/db/cortex.db"));
    }

    #[test]
    fn causal_section_maps_to_traversal_options() {
        let mut config = CortexConfig::default();
        config.causal.max_depth = Some(2);
        let options = config.traversal_options();
        assert_eq!(options.max_depth, Some(2));
        assert!(options.compute_confidence);
    }
}
