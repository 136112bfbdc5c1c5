//! Model Roster
//!
//! The ordered list of backend models a generation falls back through. The
//! order is a user-visible contract, so it is derived by a stable sort over
//! fixed preference markers and never depends on randomness.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

/// Substituted whenever no usable model can be discovered.
pub const DEFAULT_ROSTER: &[&str] = &["gemini-1.5-flash"];

/// A model as reported by the capability source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCapability {
    pub identifier: String,
    pub supports_generation: bool,
}

/// Anything that can list the models available to the current credentials.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CapabilitySource: Send + Sync {
    async fn list_models(&self) -> anyhow::Result<Vec<ModelCapability>>;
}

/// Preference class of a model identifier. Lower sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreferenceTier {
    Lite,
    Standard,
    HighCapability,
    Unrecognized,
}

impl PreferenceTier {
    /// Markers in match order; `flash-lite` must hit `lite` before `flash`.
    const MARKERS: [(&'static str, PreferenceTier); 3] = [
        ("lite", PreferenceTier::Lite),
        ("flash", PreferenceTier::Standard),
        ("pro", PreferenceTier::HighCapability),
    ];

    pub fn of(identifier: &str) -> Self {
        let lower = identifier.to_lowercase();
        Self::MARKERS
            .iter()
            .find(|(marker, _)| lower.contains(marker))
            .map(|(_, tier)| *tier)
            .unwrap_or(PreferenceTier::Unrecognized)
    }
}

/// A non-empty, ordered list of model identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelRoster {
    models: Vec<String>,
}

impl ModelRoster {
    /// Orders `identifiers` by preference tier, keeping the source order within a tier.
    pub fn build<I, S>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut models = dedup(identifiers);
        models.sort_by_key(|id| PreferenceTier::of(id));
        Self::non_empty(models)
    }

    /// Uses `identifiers` exactly in the given order.
    pub fn from_override<I, S>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::non_empty(dedup(identifiers))
    }

    /// The hardcoded fallback roster.
    pub fn fallback() -> Self {
        Self {
            models: DEFAULT_ROSTER.iter().map(|m| m.to_string()).collect(),
        }
    }

    /// Builds the roster for a session.
    ///
    /// A non-empty `preference_override` bypasses discovery entirely.
    /// Otherwise the source is queried once; if it fails or yields no
    /// generation-capable model, the fallback roster is used.
    pub async fn discover(
        source: &dyn CapabilitySource,
        preference_override: Option<&[String]>,
    ) -> Self {
        if let Some(models) = preference_override.filter(|m| !m.is_empty()) {
            info!(models = ?models, "Using model preference override");
            return Self::from_override(models.iter().cloned());
        }

        match source.list_models().await {
            Ok(capabilities) => {
                let roster = Self::build(
                    capabilities
                        .into_iter()
                        .filter(|c| c.supports_generation)
                        .map(|c| c.identifier),
                );
                info!(models = ?roster.models, "Model roster built");
                roster
            }
            Err(e) => {
                warn!(error = ?e, "Capability source unavailable, using default roster");
                Self::fallback()
            }
        }
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// The model tried first.
    pub fn primary(&self) -> &str {
        &self.models[0]
    }

    fn non_empty(models: Vec<String>) -> Self {
        if models.is_empty() {
            warn!("No usable models, using default roster");
            Self::fallback()
        } else {
            Self { models }
        }
    }
}

fn dedup<I, S>(identifiers: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    identifiers
        .into_iter()
        .map(Into::into)
        .filter(|id| !id.trim().is_empty())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn cap(id: &str, supports_generation: bool) -> ModelCapability {
        ModelCapability {
            identifier: id.to_string(),
            supports_generation,
        }
    }

    #[test]
    fn test_tier_markers() {
        assert_eq!(PreferenceTier::of("gemini-2.0-flash-lite"), PreferenceTier::Lite);
        assert_eq!(PreferenceTier::of("gemini-1.5-flash"), PreferenceTier::Standard);
        assert_eq!(PreferenceTier::of("gemini-1.5-PRO"), PreferenceTier::HighCapability);
        assert_eq!(PreferenceTier::of("gemma-3-27b-it"), PreferenceTier::Unrecognized);
    }

    #[test]
    fn test_build_sorts_by_tier_and_keeps_ties_in_source_order() {
        let roster = ModelRoster::build([
            "gemma-3",
            "gemini-1.5-pro",
            "gemini-2.0-flash",
            "gemini-2.0-flash-lite",
            "gemini-1.5-flash",
            "gemini-2.5-pro",
            "gemini-1.5-flash-lite",
        ]);

        assert_eq!(
            roster.models(),
            [
                "gemini-2.0-flash-lite",
                "gemini-1.5-flash-lite",
                "gemini-2.0-flash",
                "gemini-1.5-flash",
                "gemini-1.5-pro",
                "gemini-2.5-pro",
                "gemma-3",
            ]
        );
    }

    #[test]
    fn test_build_is_deterministic() {
        let source = vec!["b-pro", "a-flash", "c", "d-flash", "e-pro"];
        assert_eq!(ModelRoster::build(source.clone()), ModelRoster::build(source));
    }

    #[test]
    fn test_build_empty_uses_fallback() {
        let roster = ModelRoster::build(Vec::<String>::new());
        assert_eq!(roster, ModelRoster::fallback());
        assert!(roster.len() >= 1);
    }

    #[test]
    fn test_build_drops_duplicates_and_blanks() {
        let roster = ModelRoster::build(["x-flash", "", "x-flash", "y-pro"]);
        assert_eq!(roster.models(), ["x-flash", "y-pro"]);
    }

    #[test]
    fn test_override_keeps_given_order() {
        let roster = ModelRoster::from_override(["m-pro", "m-flash-lite", "m-pro"]);
        assert_eq!(roster.models(), ["m-pro", "m-flash-lite"]);
        assert_eq!(roster.primary(), "m-pro");
    }

    #[tokio::test]
    async fn test_discover_filters_non_generating_models() {
        let mut source = MockCapabilitySource::new();
        source.expect_list_models().times(1).returning(|| {
            Ok(vec![
                cap("gemini-1.5-pro", true),
                cap("text-embedding-004", false),
                cap("gemini-1.5-flash", true),
            ])
        });

        let roster = ModelRoster::discover(&source, None).await;
        assert_eq!(roster.models(), ["gemini-1.5-flash", "gemini-1.5-pro"]);
    }

    #[tokio::test]
    async fn test_discover_absorbs_source_failure() {
        let mut source = MockCapabilitySource::new();
        source
            .expect_list_models()
            .times(1)
            .returning(|| Err(anyhow!("connection refused")));

        let roster = ModelRoster::discover(&source, None).await;
        assert_eq!(roster, ModelRoster::fallback());
    }

    #[tokio::test]
    async fn test_discover_with_no_generating_models_uses_fallback() {
        let mut source = MockCapabilitySource::new();
        source
            .expect_list_models()
            .returning(|| Ok(vec![cap("embedding-001", false)]));

        let roster = ModelRoster::discover(&source, None).await;
        assert_eq!(roster, ModelRoster::fallback());
    }

    #[tokio::test]
    async fn test_override_skips_the_source() {
        let mut source = MockCapabilitySource::new();
        source.expect_list_models().times(0);

        let preferred = vec!["custom-pro".to_string(), "custom-flash".to_string()];
        let roster = ModelRoster::discover(&source, Some(preferred.as_slice())).await;
        assert_eq!(roster.models(), ["custom-pro", "custom-flash"]);
    }

    #[tokio::test]
    async fn test_empty_override_falls_through_to_source() {
        let mut source = MockCapabilitySource::new();
        source
            .expect_list_models()
            .times(1)
            .returning(|| Ok(vec![cap("only-flash", true)]));

        let empty: Vec<String> = Vec::new();
        let roster = ModelRoster::discover(&source, Some(empty.as_slice())).await;
        assert_eq!(roster.models(), ["only-flash"]);
    }
}
