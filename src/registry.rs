//! Champion model registry
//!
//! Candidates are registered with their out-of-sample CV metrics. A candidate
//! replaces the champion only when its CV Brier score is strictly lower.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use crate::error::{EngineError, Result};
use crate::validation::CvMetrics;

/// One registered model version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub version: String,
    pub cv: CvMetrics,
    pub registered_at: DateTime<Utc>,
    pub is_champion: bool,
}

#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: HashMap<String, Vec<ModelEntry>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a version, or replace the metrics of an existing one
    pub fn register(&mut self, model_key: &str, version: &str, cv: CvMetrics) {
        let entries = self.models.entry(model_key.to_string()).or_default();
        match entries.iter_mut().find(|e| e.version == version) {
            Some(entry) => {
                entry.cv = cv;
                entry.registered_at = Utc::now();
            }
            None => entries.push(ModelEntry {
                version: version.to_string(),
                cv,
                registered_at: Utc::now(),
                is_champion: false,
            }),
        }
    }

    pub fn champion(&self, model_key: &str) -> Option<&ModelEntry> {
        self.models
            .get(model_key)
            .and_then(|entries| entries.iter().find(|e| e.is_champion))
    }

    pub fn versions(&self, model_key: &str) -> &[ModelEntry] {
        self.models.get(model_key).map_or(&[], Vec::as_slice)
    }

    /// Register `version` and promote it if there is no champion or its CV
    /// Brier beats the champion's. Returns whether it was promoted.
    pub fn maybe_promote(&mut self, model_key: &str, version: &str, cv: &CvMetrics) -> Result<bool> {
        if !cv.brier_mean.is_finite() {
            return Err(EngineError::Model(format!(
                "{} {}: non-finite CV brier {}",
                model_key, version, cv.brier_mean
            )));
        }

        let champion_brier = self.champion(model_key).map(|c| c.cv.brier_mean);
        self.register(model_key, version, cv.clone());

        let promote = match champion_brier {
            None => true,
            Some(current) => cv.brier_mean < current,
        };

        if promote {
            if let Some(entries) = self.models.get_mut(model_key) {
                for entry in entries.iter_mut() {
                    entry.is_champion = entry.version == version;
                }
            }
            info!(
                "Promoted {} {} to champion (cv brier {:.4}, previous {:?})",
                model_key, version, cv.brier_mean, champion_brier
            );
        } else {
            info!(
                "Kept champion for {}: candidate {} cv brier {:.4} does not beat {:?}",
                model_key, version, cv.brier_mean, champion_brier
            );
        }

        Ok(promote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cv(brier: f64) -> CvMetrics {
        CvMetrics {
            brier_mean: brier,
            ..CvMetrics::fallback()
        }
    }

    #[test]
    fn test_first_candidate_becomes_champion() {
        let mut registry = ModelRegistry::new();
        assert!(registry.champion("nrl_win").is_none());
        assert!(registry.maybe_promote("nrl_win", "v1", &cv(0.24)).unwrap());
        assert_eq!(registry.champion("nrl_win").unwrap().version, "v1");
    }

    #[test]
    fn test_promotion_requires_strictly_lower_brier() {
        let mut registry = ModelRegistry::new();
        registry.maybe_promote("nrl_win", "v1", &cv(0.22)).unwrap();

        assert!(!registry.maybe_promote("nrl_win", "v2", &cv(0.22)).unwrap());
        assert!(!registry.maybe_promote("nrl_win", "v3", &cv(0.23)).unwrap());
        assert_eq!(registry.champion("nrl_win").unwrap().version, "v1");

        assert!(registry.maybe_promote("nrl_win", "v4", &cv(0.21)).unwrap());
        assert_eq!(registry.champion("nrl_win").unwrap().version, "v4");
        assert_eq!(registry.versions("nrl_win").len(), 4);
        assert_eq!(
            registry.versions("nrl_win").iter().filter(|e| e.is_champion).count(),
            1
        );
    }

    #[test]
    fn test_keys_are_independent() {
        let mut registry = ModelRegistry::new();
        registry.maybe_promote("a", "v1", &cv(0.20)).unwrap();
        assert!(registry.maybe_promote("b", "v1", &cv(0.30)).unwrap());
        assert!(registry.versions("missing").is_empty());
    }

    #[test]
    fn test_register_replaces_metrics() {
        let mut registry = ModelRegistry::new();
        registry.register("a", "v1", cv(0.3));
        registry.register("a", "v1", cv(0.2));
        assert_eq!(registry.versions("a").len(), 1);
        assert_eq!(registry.versions("a")[0].cv.brier_mean, 0.2);
        assert!(registry.champion("a").is_none());
    }

    #[test]
    fn test_non_finite_brier_rejected() {
        let mut registry = ModelRegistry::new();
        assert!(registry.maybe_promote("a", "v1", &cv(f64::NAN)).is_err());
    }
}
