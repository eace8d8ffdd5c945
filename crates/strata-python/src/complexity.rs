//! Algorithmic-awareness walker for Python sources.
//!
//! One pre-order pass over the tree. Loop depth is the number of enclosing
//! `for`/`while` statements, so nesting is detected without visitor state.

use std::path::Path;

use tree_sitter::Node;
use tracing::debug;

use strata_core::analyzer::{node_line, node_text, walk_tree};
use strata_core::complexity::{
    ComplexityAnalyzer, ComplexityInsight, InsightCategory, InsightSeverity,
};
use strata_core::error::ExtractionError;
use strata_core::types::Language;

use crate::{decorators_of, parse_strict};

const LOOPS: &[&str] = &["for_statement", "while_statement"];
const LIST_HINTS: &[&str] = &["list", "array", "items"];
const MEMOIZERS: &[&str] = &["lru_cache", "cache", "memoize"];

pub struct PythonComplexityAnalyzer {
    grammar: tree_sitter::Language,
}

impl PythonComplexityAnalyzer {
    pub fn new() -> Self {
        Self {
            grammar: tree_sitter_python::LANGUAGE.into(),
        }
    }
}

impl Default for PythonComplexityAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl ComplexityAnalyzer for PythonComplexityAnalyzer {
    fn language(&self) -> Language {
        Language::Python
    }

    fn analyze(&self, path: &Path, source: &str) -> Result<Vec<ComplexityInsight>, ExtractionError> {
        let tree = parse_strict(&self.grammar, path, source)?;
        let mut walker = Walker {
            path,
            source,
            insights: Vec::new(),
        };
        walk_tree(tree.root_node(), |node| walker.visit(node));
        debug!(path = %path.display(), insights = walker.insights.len(), "complexity pass done");
        Ok(walker.insights)
    }
}

struct Walker<'a> {
    path: &'a Path,
    source: &'a str,
    insights: Vec<ComplexityInsight>,
}

impl Walker<'_> {
    fn push(
        &mut self,
        node: Node,
        category: InsightCategory,
        severity: InsightSeverity,
        description: impl Into<String>,
    ) {
        let line = node_line(node);
        let snippet = self
            .source
            .lines()
            .nth(line - 1)
            .map(str::trim)
            .unwrap_or_default();
        self.insights.push(
            ComplexityInsight::new(self.path, line, category, severity, description)
                .with_snippet(snippet),
        );
    }

    fn visit(&mut self, node: Node) {
        match node.kind() {
            "for_statement" => self.visit_for(node),
            "while_statement" => {
                if loop_depth(node) >= 2 {
                    self.push(
                        node,
                        InsightCategory::NestedLoops,
                        InsightSeverity::Suggestion,
                        "Nested while loop detected. Review for potential optimization.",
                    );
                }
            }
            "comparison_operator" => self.visit_comparison(node),
            "list_comprehension" => {
                let mut cursor = node.walk();
                let generators = node
                    .named_children(&mut cursor)
                    .filter(|c| c.kind() == "for_in_clause")
                    .count();
                if generators == 1 {
                    self.push(
                        node,
                        InsightCategory::ListComprehension,
                        InsightSeverity::GoodPractice,
                        "List comprehension used (efficient and Pythonic).",
                    );
                }
            }
            "generator_expression" => self.push(
                node,
                InsightCategory::GeneratorExpression,
                InsightSeverity::GoodPractice,
                "Generator expression used (memory efficient, lazy evaluation).",
            ),
            "call" => self.visit_call(node),
            "assignment" => self.visit_assignment(node),
            "function_definition" => self.visit_function(node),
            _ => {}
        }
    }

    fn visit_for(&mut self, node: Node) {
        let depth = loop_depth(node);
        if depth < 2 {
            return;
        }
        let (severity, complexity) = if depth == 2 {
            (InsightSeverity::Suggestion, "O(n²)".to_string())
        } else {
            (InsightSeverity::Info, format!("O(n^{depth})"))
        };
        self.push(
            node,
            InsightCategory::NestedLoops,
            severity,
            format!(
                "Nested loop detected ({complexity} complexity). Consider if this can be \
                 optimized with better data structures or algorithms."
            ),
        );
    }

    /// `x in some_list` inside a loop.
    fn visit_comparison(&mut self, node: Node) {
        if loop_depth(node) == 0 {
            return;
        }
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        for pair in children.windows(2) {
            let (op, rhs) = (pair[0], pair[1]);
            if !matches!(op.kind(), "in" | "not in") || rhs.kind() != "identifier" {
                continue;
            }
            let name = node_text(rhs, self.source);
            let lowered = name.to_lowercase();
            if LIST_HINTS.iter().any(|hint| lowered.contains(hint)) {
                self.push(
                    node,
                    InsightCategory::InefficientMembershipTest,
                    InsightSeverity::Suggestion,
                    format!(
                        "Membership test inside loop on '{name}'. Consider using a set or \
                         dict for O(1) lookups instead of O(n)."
                    ),
                );
            }
        }
    }

    fn visit_call(&mut self, node: Node) {
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        let (name, is_method) = match function.kind() {
            "identifier" => (node_text(function, self.source), false),
            "attribute" => match function.child_by_field_name("attribute") {
                Some(attr) => (node_text(attr, self.source), true),
                None => return,
            },
            _ => return,
        };

        match name {
            "sort" | "sorted" if has_keyword(node, "key", self.source) => self.push(
                node,
                InsightCategory::SortingWithKey,
                InsightSeverity::GoodPractice,
                "Sorting with custom key function (demonstrates awareness of sort optimization).",
            ),
            n if n.starts_with("bisect") => self.push(
                node,
                InsightCategory::BinarySearch,
                InsightSeverity::GoodPractice,
                "Binary search used (O(log n) - demonstrates algorithm knowledge).",
            ),
            "set" if !is_method => self.push(
                node,
                InsightCategory::SetOperations,
                InsightSeverity::GoodPractice,
                "Set created for efficient O(1) operations.",
            ),
            "dict" if !is_method => self.push(
                node,
                InsightCategory::DictLookup,
                InsightSeverity::GoodPractice,
                "Dictionary created for efficient O(1) lookups.",
            ),
            "index" if is_method && loop_depth(node) > 0 => self.push(
                node,
                InsightCategory::InefficientLookup,
                InsightSeverity::Suggestion,
                "Linear .index() lookup inside a loop. Consider a dict mapping values to positions.",
            ),
            _ => {}
        }
    }

    fn visit_assignment(&mut self, node: Node) {
        let Some(right) = node.child_by_field_name("right") else {
            return;
        };
        let description = match right.kind() {
            "set" => "Set used for O(1) membership tests (efficient choice).",
            "dictionary" => "Dictionary used for O(1) lookups (efficient choice).",
            _ => return,
        };
        self.push(
            node,
            InsightCategory::EfficientDataStructure,
            InsightSeverity::GoodPractice,
            description,
        );
    }

    fn visit_function(&mut self, node: Node) {
        let decorators = decorators_of(node, self.source);
        for decorator in decorators {
            let name = decorator.rsplit('.').next().unwrap_or(&decorator);
            if MEMOIZERS.contains(&name) {
                self.push(
                    node,
                    InsightCategory::Memoization,
                    InsightSeverity::GoodPractice,
                    format!(
                        "Memoization decorator (@{name}) used - reduces time complexity \
                         through caching."
                    ),
                );
            }
        }
    }
}

/// Loops enclosing `node` (itself included) within its own function body.
fn loop_depth(node: Node) -> usize {
    let mut depth = usize::from(LOOPS.contains(&node.kind()));
    let mut current = node.parent();
    while let Some(parent) = current {
        match parent.kind() {
            "function_definition" | "lambda" => break,
            kind if LOOPS.contains(&kind) => depth += 1,
            _ => {}
        }
        current = parent.parent();
    }
    depth
}

fn has_keyword(call: Node, keyword: &str, source: &str) -> bool {
    let Some(arguments) = call.child_by_field_name("arguments") else {
        return false;
    };
    let mut cursor = arguments.walk();
    let found = arguments.named_children(&mut cursor).any(|arg| {
        arg.kind() == "keyword_argument"
            && arg
                .child_by_field_name("name")
                .is_some_and(|n| node_text(n, source) == keyword)
    });
    found
}
