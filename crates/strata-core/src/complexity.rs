use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ExtractionError;
use crate::types::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightSeverity {
    Info,
    Suggestion,
    GoodPractice,
}

impl fmt::Display for InsightSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsightSeverity::Info => write!(f, "info"),
            InsightSeverity::Suggestion => write!(f, "suggestion"),
            InsightSeverity::GoodPractice => write!(f, "good_practice"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightCategory {
    NestedLoops,
    InefficientLookup,
    InefficientMembershipTest,
    EfficientDataStructure,
    SetOperations,
    DictLookup,
    ListComprehension,
    GeneratorExpression,
    SortingWithKey,
    BinarySearch,
    Memoization,
}

impl InsightCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightCategory::NestedLoops => "nested_loops",
            InsightCategory::InefficientLookup => "inefficient_lookup",
            InsightCategory::InefficientMembershipTest => "inefficient_membership_test",
            InsightCategory::EfficientDataStructure => "efficient_data_structure",
            InsightCategory::SetOperations => "set_operations",
            InsightCategory::DictLookup => "dict_lookup",
            InsightCategory::ListComprehension => "list_comprehension",
            InsightCategory::GeneratorExpression => "generator_expression",
            InsightCategory::SortingWithKey => "sorting_with_key",
            InsightCategory::BinarySearch => "binary_search",
            InsightCategory::Memoization => "memoization",
        }
    }
}

impl fmt::Display for InsightCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One observation about algorithmic choices at a source line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityInsight {
    pub file: PathBuf,
    pub line: usize,
    pub category: InsightCategory,
    pub severity: InsightSeverity,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_snippet: Option<String>,
}

impl ComplexityInsight {
    pub fn new(
        file: &Path,
        line: usize,
        category: InsightCategory,
        severity: InsightSeverity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            file: file.to_path_buf(),
            line,
            category,
            severity,
            description: description.into(),
            code_snippet: None,
        }
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        let snippet = snippet.into();
        if !snippet.is_empty() {
            self.code_snippet = Some(snippet);
        }
        self
    }
}

/// Per-file complexity pass. Only languages with a walker register one.
pub trait ComplexityAnalyzer: Send + Sync {
    fn language(&self) -> Language;

    /// Insights for one file. A file that does not parse is an error, so it
    /// is never counted as analyzed.
    fn analyze(&self, path: &Path, source: &str) -> Result<Vec<ComplexityInsight>, ExtractionError>;
}

/// Insights across a project plus the derived optimization-awareness score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplexityReport {
    pub total_files_analyzed: usize,
    pub insights: Vec<ComplexityInsight>,
    pub summary: BTreeMap<InsightCategory, usize>,
    pub optimization_score: f64,
}

impl ComplexityReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, insights: Vec<ComplexityInsight>) {
        self.total_files_analyzed += 1;
        for insight in insights {
            self.add_insight(insight);
        }
    }

    pub fn add_insight(&mut self, insight: ComplexityInsight) {
        *self.summary.entry(insight.category).or_insert(0) += 1;
        self.insights.push(insight);
    }

    fn count(&self, category: InsightCategory) -> usize {
        self.summary.get(&category).copied().unwrap_or(0)
    }

    pub fn good_practice_count(&self) -> usize {
        self.insights
            .iter()
            .filter(|i| i.severity == InsightSeverity::GoodPractice)
            .count()
    }

    /// Recompute `optimization_score` from the insight counts.
    ///
    /// Zero files analyzed scores 0. Otherwise the score starts at 50, gains
    /// up to 40 for good practices and loses up to 30/25/15 for nested loops,
    /// inefficient lookups and inefficient membership tests.
    pub fn calculate_score(&mut self) -> f64 {
        if self.total_files_analyzed == 0 {
            self.optimization_score = 0.0;
            return 0.0;
        }

        let good = self.good_practice_count() as f64;
        let nested = self.count(InsightCategory::NestedLoops) as f64;
        let lookups = self.count(InsightCategory::InefficientLookup) as f64;
        let membership = self.count(InsightCategory::InefficientMembershipTest) as f64;

        let mut score: f64 = 50.0;
        score += (good * 5.0).min(40.0);
        score -= (nested * 10.0).min(30.0);
        score -= (lookups * 8.0).min(25.0);
        score -= (membership * 5.0).min(15.0);

        self.optimization_score = score.clamp(0.0, 100.0);
        self.optimization_score
    }

    /// Sort insights by file then line so reports are stable.
    pub fn sort(&mut self) {
        self.insights.sort_by(|a, b| {
            a.file
                .cmp(&b.file)
                .then(a.line.cmp(&b.line))
                .then(a.category.cmp(&b.category))
        });
    }

    /// One-word reading of the score.
    pub fn assessment(&self) -> &'static str {
        if self.optimization_score >= 75.0 {
            "strong"
        } else if self.optimization_score >= 50.0 {
            "moderate"
        } else {
            "limited"
        }
    }

    pub fn insights_with(&self, severity: InsightSeverity) -> impl Iterator<Item = &ComplexityInsight> {
        self.insights.iter().filter(move |i| i.severity == severity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insight(category: InsightCategory, severity: InsightSeverity) -> ComplexityInsight {
        ComplexityInsight::new(Path::new("a.py"), 1, category, severity, "test")
    }

    #[test]
    fn test_empty_report_scores_zero() {
        let mut report = ComplexityReport::new();
        assert_eq!(report.calculate_score(), 0.0);
    }

    #[test]
    fn test_clean_file_scores_fifty() {
        let mut report = ComplexityReport::new();
        report.add_file(vec![]);
        assert_eq!(report.calculate_score(), 50.0);
        assert_eq!(report.assessment(), "moderate");
    }

    #[test]
    fn test_good_practices_capped_at_forty() {
        let mut report = ComplexityReport::new();
        report.add_file(
            (0..12)
                .map(|_| insight(InsightCategory::SetOperations, InsightSeverity::GoodPractice))
                .collect(),
        );
        assert_eq!(report.calculate_score(), 90.0);
        assert_eq!(report.assessment(), "strong");
    }

    #[test]
    fn test_penalties_are_capped() {
        let mut report = ComplexityReport::new();
        let mut insights = Vec::new();
        for _ in 0..10 {
            insights.push(insight(InsightCategory::NestedLoops, InsightSeverity::Suggestion));
            insights.push(insight(InsightCategory::InefficientLookup, InsightSeverity::Suggestion));
            insights.push(insight(
                InsightCategory::InefficientMembershipTest,
                InsightSeverity::Suggestion,
            ));
        }
        report.add_file(insights);
        assert_eq!(report.calculate_score(), 0.0, "50 - 30 - 25 - 15 clamps to 0");
        assert_eq!(report.assessment(), "limited");
    }

    #[test]
    fn test_mixed_score() {
        let mut report = ComplexityReport::new();
        report.add_file(vec![
            insight(InsightCategory::Memoization, InsightSeverity::GoodPractice),
            insight(InsightCategory::SortingWithKey, InsightSeverity::GoodPractice),
            insight(InsightCategory::NestedLoops, InsightSeverity::Suggestion),
        ]);
        assert_eq!(report.calculate_score(), 50.0);
        assert_eq!(report.summary[&InsightCategory::NestedLoops], 1);
    }

    #[test]
    fn test_info_nested_loops_still_penalized() {
        let mut report = ComplexityReport::new();
        report.add_file(vec![insight(InsightCategory::NestedLoops, InsightSeverity::Info)]);
        assert_eq!(report.calculate_score(), 40.0);
    }

    #[test]
    fn test_category_serializes_snake_case() {
        let json = serde_json::to_string(&InsightCategory::InefficientMembershipTest).unwrap();
        assert_eq!(json, "\"inefficient_membership_test\"");
        let json = serde_json::to_string(&InsightSeverity::GoodPractice).unwrap();
        assert_eq!(json, "\"good_practice\"");
    }
}
