use anyhow::{Context, Result};
use serde::Serialize;

use strata_core::pipeline::ProjectAnalysis;
use strata_core::ranking::Ranking;

fn render<T: Serialize>(value: &T, compact: bool, what: &str) -> Result<String> {
    let rendered = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    rendered.with_context(|| format!("failed to serialize {what}"))
}

/// Format a full project analysis as JSON.
pub fn format_analysis(analysis: &ProjectAnalysis, compact: bool) -> Result<String> {
    render(analysis, compact, "project analysis")
}

/// Format a ranking as JSON.
pub fn format_ranking(ranking: &Ranking, compact: bool) -> Result<String> {
    render(ranking, compact, "ranking")
}
