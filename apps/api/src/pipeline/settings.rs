use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::extraction::vocabulary::VocabularySettings;
use crate::scoring::engine::ScoringConfig;

/// Bundled settings used when no `SHORTLIST_PIPELINE_CONFIG` is set.
const DEFAULT_SETTINGS: &str = include_str!("../../config/pipeline.json");

/// Everything the pipeline needs besides the documents: dictionaries and scoring rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineSettings {
    #[serde(default)]
    pub vocabulary: VocabularySettings,
    #[serde(default)]
    pub scoring: ScoringConfig,
}

impl PipelineSettings {
    /// Reads settings from `path`, or the bundled defaults when `path` is `None`.
    /// Only parses; semantic validation happens in `Pipeline::from_settings`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).with_context(|| {
                    format!("Failed to read pipeline settings from '{}'", path.display())
                })?;
                let settings = Self::from_json(&raw)
                    .with_context(|| format!("Invalid pipeline settings in '{}'", path.display()))?;
                info!(path = %path.display(), "Loaded pipeline settings");
                Ok(settings)
            }
            None => {
                info!("Using bundled pipeline settings");
                Self::from_json(DEFAULT_SETTINGS).context("Bundled pipeline settings are invalid")
            }
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}
