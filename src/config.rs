//! Agent configuration, loadable from TOML.

use crate::error::{Result, SearchError};
use crate::strategies::{Replacement, SearchOptions};
use serde::Deserialize;
use std::time::Duration;

/// Which search drives an agent's decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Alpha-beta against an adversarial opponent.
    AlphaBeta,
    /// Expectimax against a uniformly random opponent.
    Expectimax,
    /// One-step risk sampling.
    MonteCarlo,
    /// Alpha-beta with the root fanned out over a thread pool.
    ParallelAlphaBeta,
}

fn default_strategy() -> StrategyKind {
    StrategyKind::AlphaBeta
}

fn default_max_depth() -> u8 {
    4
}

fn default_samples() -> u32 {
    1
}

fn default_table_byte_size() -> usize {
    1_000_000
}

fn default_replacement() -> Replacement {
    Replacement::TwoTier
}

/// Configuration for a [`SearchAgent`](crate::SearchAgent).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    #[serde(default = "default_strategy")]
    pub strategy: StrategyKind,

    /// Deepest iteration to search.
    #[serde(default = "default_max_depth")]
    pub max_depth: u8,

    /// Wall-clock limit per decision. Overrides `max_depth` when set.
    pub time_limit_ms: Option<u64>,

    /// Node limit per decision for the serial searches.
    pub max_nodes: Option<u64>,

    /// Trials per candidate for Monte Carlo.
    #[serde(default = "default_samples")]
    pub samples: u32,

    #[serde(default = "default_table_byte_size")]
    pub table_byte_size: usize,

    #[serde(default = "default_replacement")]
    pub replacement: Replacement,

    /// Search every node with a full window. Only useful for checking results.
    pub disable_pruning: bool,

    /// Seed for sampling strategies. Entropy-seeded when absent.
    pub seed: Option<u64>,

    /// Worker threads for the parallel search. Defaults to one per CPU.
    pub threads: Option<usize>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            max_depth: default_max_depth(),
            time_limit_ms: None,
            max_nodes: None,
            samples: default_samples(),
            table_byte_size: default_table_byte_size(),
            replacement: default_replacement(),
            disable_pruning: false,
            seed: None,
            threads: None,
        }
    }
}

impl AgentConfig {
    pub fn new(strategy: StrategyKind) -> Self {
        Self { strategy, ..Self::default() }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: AgentConfig =
            toml::from_str(text).map_err(|e| SearchError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(SearchError::InvalidConfig("max_depth must be at least 1".into()));
        }
        if self.samples == 0 {
            return Err(SearchError::InvalidConfig("samples must be at least 1".into()));
        }
        if self.time_limit_ms == Some(0) {
            return Err(SearchError::InvalidConfig("time_limit_ms must be positive".into()));
        }
        if self.threads == Some(0) {
            return Err(SearchError::InvalidConfig("threads must be at least 1".into()));
        }
        Ok(())
    }

    /// Builder pattern: set the depth budget.
    pub fn with_max_depth(mut self, depth: u8) -> Self {
        self.max_depth = depth;
        self
    }

    /// Builder pattern: set the wall-clock budget.
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit_ms = Some(limit.as_millis() as u64);
        self
    }

    /// Builder pattern: set the node budget.
    pub fn with_max_nodes(mut self, nodes: u64) -> Self {
        self.max_nodes = Some(nodes);
        self
    }

    /// Builder pattern: set trials per candidate.
    pub fn with_samples(mut self, samples: u32) -> Self {
        self.samples = samples;
        self
    }

    /// Builder pattern: set the sampling seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_ms.map(Duration::from_millis)
    }

    /// Tree search options implied by this config.
    pub fn search_options(&self) -> SearchOptions {
        SearchOptions::new()
            .with_table_byte_size(self.table_byte_size)
            .with_replacement_strategy(self.replacement)
            .with_pruning(!self.disable_pruning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AgentConfig::default();
        assert_eq!(config.strategy, StrategyKind::AlphaBeta);
        assert_eq!(config.max_depth, 4);
        assert_eq!(config.samples, 1);
        assert_eq!(config.table_byte_size, 1_000_000);
        assert_eq!(config.replacement, Replacement::TwoTier);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let config = AgentConfig::from_toml_str(
            r#"
            strategy = "expectimax"
            max_depth = 3
            time_limit_ms = 250
            replacement = "depth_preferred"
            seed = 42
            "#,
        )
        .unwrap();
        assert_eq!(config.strategy, StrategyKind::Expectimax);
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.time_limit(), Some(Duration::from_millis(250)));
        assert_eq!(config.replacement, Replacement::DepthPreferred);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.samples, 1);
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(AgentConfig::from_toml_str("").unwrap(), AgentConfig::default());
    }

    #[test]
    fn test_rejects_bad_values() {
        for text in &[
            "max_depth = 0",
            "samples = 0",
            "time_limit_ms = 0",
            "threads = 0",
            "strategy = \"negascout\"",
            "max_depth = \"deep\"",
        ] {
            assert!(
                matches!(AgentConfig::from_toml_str(text), Err(SearchError::InvalidConfig(_))),
                "accepted {}",
                text
            );
        }
    }

    #[test]
    fn test_builders() {
        let config = AgentConfig::new(StrategyKind::MonteCarlo).with_samples(20).with_seed(7);
        assert_eq!(config.samples, 20);
        assert_eq!(config.seed, Some(7));
        assert!(AgentConfig::default().with_max_depth(0).validate().is_err());
    }
}
