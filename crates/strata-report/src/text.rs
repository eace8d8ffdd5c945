use std::collections::BTreeMap;
use std::path::PathBuf;

use colored::Colorize;

use strata_core::complexity::{ComplexityInsight, ComplexityReport, InsightSeverity};
use strata_core::pipeline::ProjectAnalysis;
use strata_core::ranking::Ranking;
use strata_core::scoring::{
    LanguageStatus, ProjectScore, ALGORITHMIC_MAX, ARCHITECTURE_MAX, MATURITY_MAX, QUALITY_MAX,
};

fn banded(value: f64, max: f64) -> String {
    let text = format!("{value:.1}");
    let percent = if max > 0.0 { value / max * 100.0 } else { 0.0 };
    if percent >= 80.0 {
        text.green().to_string()
    } else if percent >= 50.0 {
        text.yellow().to_string()
    } else {
        text.red().to_string()
    }
}

/// Format a full project analysis for terminal output.
pub fn format_analysis(analysis: &ProjectAnalysis, verbose: bool) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "\n{}\n",
        format!("Strata - {}", analysis.project_name).bold()
    ));
    out.push_str(&format!("{}\n", "=".repeat(40)));
    out.push_str(&format!("Path:   {}\n", analysis.project_path));
    out.push_str(&format!("Digest: {}\n\n", short_digest(&analysis.input_digest)));

    out.push_str(&format_score(&analysis.score));

    if !analysis.score.languages.is_empty() {
        out.push_str(&format!("\n{}\n{}\n", "Languages".bold(), "-".repeat(40)));
        for lang in &analysis.score.languages {
            match lang.status {
                LanguageStatus::Analyzed => {
                    out.push_str(&format!(
                        "  {:<8} {} files  OOP {:.1}/6  SOLID {:.1}/5  {:.1}%  {}\n",
                        lang.language,
                        lang.files_analyzed,
                        lang.oop_score,
                        lang.solid_score,
                        lang.oopness,
                        lang.coding_style.dimmed(),
                    ));
                    if !lang.design_patterns.is_empty() {
                        out.push_str(&format!(
                            "           patterns: {}\n",
                            lang.design_patterns.join(", ")
                        ));
                    }
                }
                LanguageStatus::Unavailable => {
                    out.push_str(&format!(
                        "  {:<8} {}\n",
                        lang.language,
                        "analysis unavailable".yellow()
                    ));
                }
            }
        }
    }

    if let Some(ref complexity) = analysis.complexity {
        out.push_str(&format_complexity(complexity, verbose));
    }

    if !analysis.failures.is_empty() {
        out.push_str(&format!(
            "\n{} ({})\n{}\n",
            "Skipped files".yellow().bold(),
            analysis.failures.len(),
            "-".repeat(40)
        ));
        for failure in &analysis.failures {
            out.push_str(&format!(
                "  {} [{}] {}\n",
                failure.path.display(),
                failure.language,
                failure.reason
            ));
        }
    }

    out.push('\n');
    out
}

fn short_digest(digest: &str) -> &str {
    digest.get(..12).unwrap_or(digest)
}

/// The four categories, the composite and their justifications.
pub fn format_score(score: &ProjectScore) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{}: {}/100\n",
        "Composite Score".bold(),
        banded(score.composite_score, 100.0)
    ));

    let rows = [
        ("Code Architecture", score.code_architecture, ARCHITECTURE_MAX, &score.justifications.code_architecture),
        ("Code Quality", score.code_quality, QUALITY_MAX, &score.justifications.code_quality),
        ("Project Maturity", score.project_maturity, MATURITY_MAX, &score.justifications.project_maturity),
        ("Algorithmic Quality", score.algorithmic_quality, ALGORITHMIC_MAX, &score.justifications.algorithmic_quality),
    ];
    for (label, value, max, justification) in rows {
        out.push_str(&format!(
            "  {:<21}{}/{max:.0}\n",
            format!("{label}:"),
            banded(value, max)
        ));
        if !justification.is_empty() {
            out.push_str(&format!("    {}\n", justification.dimmed()));
        }
    }

    if !score.design_patterns.is_empty() {
        out.push_str(&format!(
            "  {}: {}\n",
            "Design patterns".cyan(),
            score.design_patterns.join(", ")
        ));
    }
    out
}

/// Complexity summary split into good practices and opportunities, with
/// per-file findings when `verbose`.
pub fn format_complexity(report: &ComplexityReport, verbose: bool) -> String {
    let mut out = String::new();
    out.push_str(&format!("\n{}\n{}\n", "Algorithmic Complexity".bold(), "-".repeat(40)));
    if report.total_files_analyzed == 0 {
        out.push_str("  No Python files analyzed.\n");
        return out;
    }
    out.push_str(&format!(
        "  Files analyzed: {}\n  Optimization awareness: {}/100 ({})\n",
        report.total_files_analyzed,
        banded(report.optimization_score, 100.0),
        report.assessment()
    ));

    let mut good = Vec::new();
    let mut opportunities = Vec::new();
    for (category, count) in &report.summary {
        let is_good = report
            .insights
            .iter()
            .any(|i| i.category == *category && i.severity == InsightSeverity::GoodPractice);
        let line = format!("    {}: {count}", category.as_str().replace('_', " "));
        if is_good {
            good.push(line);
        } else {
            opportunities.push(line);
        }
    }
    if !good.is_empty() {
        out.push_str(&format!("  {}\n", "Good practices:".green()));
        for line in good {
            out.push_str(&format!("{line}\n"));
        }
    }
    if !opportunities.is_empty() {
        out.push_str(&format!("  {}\n", "Opportunities:".yellow()));
        for line in opportunities {
            out.push_str(&format!("{line}\n"));
        }
    }

    if verbose && !report.insights.is_empty() {
        let mut by_file: BTreeMap<&PathBuf, Vec<&ComplexityInsight>> = BTreeMap::new();
        for insight in &report.insights {
            by_file.entry(&insight.file).or_default().push(insight);
        }
        for (file, insights) in by_file {
            out.push_str(&format!("\n  {}\n", file.display().to_string().bold()));
            for insight in insights {
                let marker = match insight.severity {
                    InsightSeverity::GoodPractice => "+".green().to_string(),
                    InsightSeverity::Suggestion => "!".yellow().to_string(),
                    InsightSeverity::Info => "i".blue().to_string(),
                };
                out.push_str(&format!(
                    "    {marker} line {}: {}\n",
                    insight.line, insight.description
                ));
                if let Some(ref snippet) = insight.code_snippet {
                    out.push_str(&format!("        {}\n", snippet.dimmed()));
                }
            }
        }
    }
    out
}

/// Leaderboard of the best entry per project.
pub fn format_ranking(ranking: &Ranking) -> String {
    let mut out = String::new();
    out.push_str(&format!("\n{}\n", "Strata - Project Ranking".bold()));
    out.push_str(&format!("{}\n", "=".repeat(40)));
    out.push_str(&format!(
        "{} distinct project(s), showing top {}\n\n",
        ranking.total_distinct,
        ranking.top.len()
    ));

    if ranking.top.is_empty() {
        out.push_str("No scored projects recorded.\n");
        return out;
    }

    for (position, entry) in ranking.top.iter().enumerate() {
        out.push_str(&format!(
            "  {:>2}. {:<24} {}/100  {}\n",
            position + 1,
            entry.project_name,
            banded(entry.score.composite_score, 100.0),
            entry.analyzed_at.format("%Y-%m-%d %H:%M").to_string().dimmed(),
        ));
        out.push_str(&format!("      {}\n", entry.project_path.dimmed()));
    }
    out
}
