//! Top-level run configuration.

use crate::grid::ScenarioGrid;
use crate::parallel::ParallelConfig;
use crate::search::SearchConfig;
use backreach_core::{BackreachError, Quanta, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Every setting of a run. Missing sections and fields take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackreachConfig {
    #[serde(default)]
    pub quanta: Quanta,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub parallel: ParallelConfig,
    #[serde(default)]
    pub grid: ScenarioGrid,
}

impl BackreachConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| BackreachError::InvalidConfig(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            BackreachError::InvalidConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        self.quanta.validate()?;
        self.grid.validate()?;
        if !(self.search.counterexample_separation >= 0.0) {
            return Err(BackreachError::InvalidConfig(format!(
                "counterexample_separation must be non-negative, got {}",
                self.search.counterexample_separation
            )));
        }
        if self.parallel.max_threads == Some(0) {
            return Err(BackreachError::InvalidConfig(
                "max_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
