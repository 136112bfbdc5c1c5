//! Prompt Templates
//!
//! The wording of the pupil persona and the evaluator are template data, not
//! logic. Built-in templates are compiled into the crate; a prompts directory
//! with `pupil_persona.md` and/or `evaluator.md` overrides them.

use anyhow::Context;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

const BUILTIN_PUPIL_PERSONA: &str = include_str!("../prompts/pupil_persona.md");
const BUILTIN_EVALUATOR: &str = include_str!("../prompts/evaluator.md");

/// The two instruction templates the core expands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplates {
    /// Placeholders: `{name} {age} {grade} {topic} {mastered} {in_progress}`.
    pub pupil_persona: String,
    /// Placeholders: `{name} {age} {grade} {topic}`.
    pub evaluator: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            pupil_persona: BUILTIN_PUPIL_PERSONA.to_string(),
            evaluator: BUILTIN_EVALUATOR.to_string(),
        }
    }
}

impl PromptTemplates {
    /// Loads templates from the `*.md` files in `dir`, keyed by file stem.
    ///
    /// Templates missing from the directory keep their built-in text.
    pub fn from_dir(dir: &Path) -> anyhow::Result<Self> {
        let mut prompts = load_prompts(dir)?;
        let mut templates = Self::default();

        if let Some(text) = prompts.remove("pupil_persona") {
            info!(path = %dir.display(), "Using pupil_persona.md from prompts directory");
            templates.pupil_persona = text;
        }
        if let Some(text) = prompts.remove("evaluator") {
            info!(path = %dir.display(), "Using evaluator.md from prompts directory");
            templates.evaluator = text;
        }
        for unused in prompts.keys() {
            debug!(prompt = %unused, "Ignoring unrecognised prompt file");
        }
        Ok(templates)
    }
}

fn load_prompts(dir: &Path) -> anyhow::Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read prompts directory {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = fs::read_to_string(&path)?;
            prompts.insert(key, content);
        }
    }
    Ok(prompts)
}

/// Expands `{key}` placeholders in a single left-to-right pass.
///
/// Substituted values are not scanned again, and placeholders with no
/// matching key are copied through unchanged.
pub fn expand(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let key = &after[..close];
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, value)| (*value, close))
        });
        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
