use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::complexity::ComplexityReport;
use crate::config::ScoringConfig;
use crate::facts::StructuralFacts;
use crate::oop::{self, OOP_MAX, SOLID_MAX};
use crate::patterns::RULESET_VERSION;
use crate::types::{CoverageEstimate, HygieneSignals, Language};

pub const ARCHITECTURE_MAX: f64 = 30.0;
pub const QUALITY_MAX: f64 = 25.0;
pub const MATURITY_MAX: f64 = 25.0;
pub const ALGORITHMIC_MAX: f64 = 20.0;

const LARGE_FILE_BYTES: u64 = 1024 * 1024;

/// Per-category explanation of how the points were earned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreJustifications {
    pub code_architecture: String,
    pub code_quality: String,
    pub project_maturity: String,
    pub algorithmic_quality: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageStatus {
    Analyzed,
    Unavailable,
}

/// One language's contribution to the architecture category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageScore {
    pub language: String,
    pub status: LanguageStatus,
    pub files_analyzed: usize,
    pub files_failed: usize,
    pub oop_score: f64,
    pub solid_score: f64,
    pub pattern_bonus: f64,
    /// 0-100 blend of OOP usage, SOLID heuristics and the pattern bonus.
    pub oopness: f64,
    pub coding_style: String,
    pub design_patterns: Vec<String>,
}

/// Bounded, explainable project score. Only ever recomputed, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectScore {
    pub code_architecture: f64,
    pub code_quality: f64,
    pub project_maturity: f64,
    pub algorithmic_quality: f64,
    pub composite_score: f64,
    pub justifications: ScoreJustifications,
    pub design_patterns: Vec<String>,
    pub languages: Vec<LanguageScore>,
    pub ruleset_version: u32,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Score a project with the default weights.
pub fn analyze_project(
    facts_per_language: &BTreeMap<Language, StructuralFacts>,
    complexity: Option<&ComplexityReport>,
    hygiene: &HygieneSignals,
) -> ProjectScore {
    analyze_project_with(facts_per_language, complexity, hygiene, &ScoringConfig::default())
}

/// Score a project. Pure: the same inputs always produce the same score.
pub fn analyze_project_with(
    facts_per_language: &BTreeMap<Language, StructuralFacts>,
    complexity: Option<&ComplexityReport>,
    hygiene: &HygieneSignals,
    config: &ScoringConfig,
) -> ProjectScore {
    let (architecture, languages, architecture_note) =
        score_architecture(facts_per_language, hygiene, config);
    let (quality, quality_note) = score_quality(hygiene);
    let (maturity, maturity_note) = score_maturity(hygiene);
    let (algorithmic, algorithmic_note) = score_algorithmic(complexity);

    let code_architecture = round2(architecture.clamp(0.0, ARCHITECTURE_MAX));
    let code_quality = round2(quality.clamp(0.0, QUALITY_MAX));
    let project_maturity = round2(maturity.clamp(0.0, MATURITY_MAX));
    let algorithmic_quality = round2(algorithmic.clamp(0.0, ALGORITHMIC_MAX));
    let composite_score =
        round2(code_architecture + code_quality + project_maturity + algorithmic_quality)
            .clamp(0.0, 100.0);

    let design_patterns: BTreeSet<String> = facts_per_language
        .values()
        .filter(|facts| facts.files_analyzed > 0)
        .flat_map(|facts| facts.design_patterns.iter().cloned())
        .collect();

    ProjectScore {
        code_architecture,
        code_quality,
        project_maturity,
        algorithmic_quality,
        composite_score,
        justifications: ScoreJustifications {
            code_architecture: architecture_note,
            code_quality: quality_note,
            project_maturity: maturity_note,
            algorithmic_quality: algorithmic_note,
        },
        design_patterns: design_patterns.into_iter().collect(),
        languages,
        ruleset_version: RULESET_VERSION,
    }
}

fn language_score(language: Language, facts: &StructuralFacts, config: &ScoringConfig) -> LanguageScore {
    let profile = oop::profile(language, facts);
    let structural_pct = profile.oop_score / OOP_MAX * 100.0;
    let solid_pct = profile.solid_score / SOLID_MAX * 100.0;
    let pattern_bonus = (facts.design_patterns.len() as f64 * config.pattern_points)
        .min(config.pattern_bonus_cap)
        .max(0.0);
    let oopness = (structural_pct * config.structural_weight
        + solid_pct * config.solid_weight
        + pattern_bonus)
        .clamp(0.0, 100.0);

    LanguageScore {
        language: language.to_string(),
        status: LanguageStatus::Analyzed,
        files_analyzed: facts.files_analyzed,
        files_failed: facts.files_failed,
        oop_score: profile.oop_score,
        solid_score: round2(profile.solid_score),
        pattern_bonus,
        oopness: round2(oopness),
        coding_style: profile.coding_style,
        design_patterns: facts.design_patterns.iter().cloned().collect(),
    }
}

fn unavailable(tag: &str, files_failed: usize) -> LanguageScore {
    LanguageScore {
        language: tag.to_string(),
        status: LanguageStatus::Unavailable,
        files_analyzed: 0,
        files_failed,
        oop_score: 0.0,
        solid_score: 0.0,
        pattern_bonus: 0.0,
        oopness: 0.0,
        coding_style: String::new(),
        design_patterns: Vec::new(),
    }
}

fn score_architecture(
    facts_per_language: &BTreeMap<Language, StructuralFacts>,
    hygiene: &HygieneSignals,
    config: &ScoringConfig,
) -> (f64, Vec<LanguageScore>, String) {
    let mut scores = Vec::new();
    let mut notes = Vec::new();

    for (language, facts) in facts_per_language {
        if facts.files_analyzed == 0 {
            notes.push(format!(
                "{language}: analysis unavailable ({} file(s) failed)",
                facts.files_failed
            ));
            scores.push(unavailable(language.tag(), facts.files_failed));
            continue;
        }
        let score = language_score(*language, facts, config);
        let patterns = if score.design_patterns.is_empty() {
            "none".to_string()
        } else {
            score.design_patterns.join(", ")
        };
        notes.push(format!(
            "{language}: OOP {}/6, SOLID {}/5, patterns {patterns} -> {:.1}/100 ({})",
            score.oop_score, score.solid_score, score.oopness, score.coding_style
        ));
        scores.push(score);
    }

    // Languages the collector saw but no extractor produced facts for
    for tag in hygiene.languages.keys() {
        let reason = match tag.parse::<Language>() {
            Ok(language) if facts_per_language.contains_key(&language) => continue,
            Ok(_) => "no files analyzed",
            Err(_) => "no structural extractor",
        };
        notes.push(format!("{tag}: analysis unavailable ({reason})"));
        scores.push(unavailable(tag, 0));
    }

    let analyzed: Vec<f64> = scores
        .iter()
        .filter(|s| s.status == LanguageStatus::Analyzed)
        .map(|s| s.oopness)
        .collect();

    if analyzed.is_empty() {
        notes.insert(0, "no analyzable source: architecture unavailable".to_string());
        return (0.0, scores, notes.join("; "));
    }

    let mean = analyzed.iter().sum::<f64>() / analyzed.len() as f64;
    let points = mean * ARCHITECTURE_MAX / 100.0;
    notes.insert(
        0,
        format!(
            "mean OOP-ness {:.1}/100 over {} language(s) -> {:.2}/30",
            mean,
            analyzed.len(),
            points
        ),
    );
    (points, scores, notes.join("; "))
}

fn score_quality(hygiene: &HygieneSignals) -> (f64, String) {
    let mut points: f64 = 0.0;
    let mut notes = Vec::new();

    match hygiene.test_ratio() {
        None => notes.push("test ratio unavailable: no code files reported (0/10)".to_string()),
        Some(ratio) => {
            let (tier, label) = if hygiene.test_file_count == 0 {
                (0.0, "no tests measured")
            } else if ratio < 0.1 {
                (2.0, "minimal test coverage")
            } else if ratio < 0.3 {
                (5.0, "moderate test coverage")
            } else if ratio < 0.5 {
                (7.0, "good test coverage")
            } else {
                (10.0, "strong test coverage")
            };
            points += tier;
            notes.push(format!("test ratio {ratio:.2}, {label} ({tier}/10)"));
        }
    }

    if hygiene.has_readme {
        points += 5.0;
        notes.push("README present (5/5)".to_string());
    } else if hygiene.doc_file_count > 0 {
        points += 2.0;
        notes.push(format!(
            "{} documentation file(s) but no README (2/5)",
            hygiene.doc_file_count
        ));
    } else {
        notes.push("no documentation found (0/5)".to_string());
    }

    let depth = hygiene.directory_depth;
    let (tier, label) = match depth {
        0 => (0.0, "directory depth not reported or flat"),
        1 => (3.0, "shallow directory structure"),
        2..=6 => (5.0, "organized directory structure"),
        _ => (3.0, "deeply nested directory structure"),
    };
    points += tier;
    notes.push(format!("{label}, depth {depth} ({tier}/5)"));

    let configs = hygiene.config_file_count;
    let tier = match configs {
        0 => 0.0,
        1 | 2 => 1.0,
        _ => 3.0,
    };
    points += tier;
    notes.push(format!("{configs} config file(s) ({tier}/3)"));

    if hygiene.largest_file_size == 0 {
        notes.push("largest file size not reported (0/2)".to_string());
    } else if hygiene.largest_file_size < LARGE_FILE_BYTES {
        points += 2.0;
        notes.push("all files under 1 MiB (2/2)".to_string());
    } else {
        notes.push(format!(
            "largest file is {} bytes, over 1 MiB (0/2)",
            hygiene.largest_file_size
        ));
    }

    (points.min(QUALITY_MAX), notes.join("; "))
}

fn score_maturity(hygiene: &HygieneSignals) -> (f64, String) {
    let mut points: f64 = 0.0;
    let mut notes = Vec::new();

    if hygiene.has_ci_cd {
        points += 8.0;
        notes.push("CI/CD configured (8/8)".to_string());
    } else {
        notes.push("no CI/CD configuration (0/8)".to_string());
    }

    if hygiene.has_docker {
        points += 5.0;
        notes.push("containerized (5/5)".to_string());
    } else {
        notes.push("no container setup (0/5)".to_string());
    }

    if hygiene.is_git_repo {
        let history = match hygiene.total_commits {
            c if c >= 100 => 4.0,
            c if c >= 20 => 2.0,
            _ => 0.0,
        };
        points += 3.0 + history;
        notes.push(format!(
            "git repository with {} commit(s) ({}/7)",
            hygiene.total_commits,
            3.0 + history
        ));
    } else {
        notes.push("not a git repository (0/7)".to_string());
    }

    if hygiene.has_tests {
        let coverage = match hygiene.test_coverage_estimate {
            CoverageEstimate::High => 3.0,
            CoverageEstimate::Medium => 2.0,
            CoverageEstimate::Low | CoverageEstimate::None => 0.0,
        };
        points += 2.0 + coverage;
        notes.push(format!(
            "test infrastructure present, {} coverage estimate ({}/5)",
            hygiene.test_coverage_estimate,
            2.0 + coverage
        ));
    } else {
        notes.push("no test infrastructure detected (0/5)".to_string());
    }

    (points.min(MATURITY_MAX), notes.join("; "))
}

fn score_algorithmic(complexity: Option<&ComplexityReport>) -> (f64, String) {
    let Some(report) = complexity.filter(|r| r.total_files_analyzed > 0) else {
        return (
            0.0,
            "algorithmic analysis unavailable: no Python sources analyzed".to_string(),
        );
    };

    let score = report.optimization_score.clamp(0.0, 100.0);
    let points = score * ALGORITHMIC_MAX / 100.0;
    let nested = report
        .summary
        .get(&crate::complexity::InsightCategory::NestedLoops)
        .copied()
        .unwrap_or(0);
    let note = format!(
        "optimization score {score:.1}/100 ({}) over {} file(s): {} good practice(s), {} nested loop(s) -> {points:.2}/20",
        report.assessment(),
        report.total_files_analyzed,
        report.good_practice_count(),
        nested,
    );
    (points, note)
}
