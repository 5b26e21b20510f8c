//! Batch prompt files.
//!
//! Either a JSON array of strings, or plain text with one prompt per line.
//! Blank lines are ignored in the plain form.

use std::path::Path;

use anyhow::Context;

pub fn load(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read prompt file {}", path.display()))?;
    parse(&content).with_context(|| format!("invalid prompt file {}", path.display()))
}

pub fn parse(content: &str) -> anyhow::Result<Vec<String>> {
    let trimmed = content.trim_start();
    if trimmed.starts_with('[') {
        let prompts: Vec<String> =
            serde_json::from_str(trimmed).context("expected a JSON array of strings")?;
        return Ok(prompts);
    }
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
