use std::path::{Path, PathBuf};

use tree_sitter::{Node, Tree};

use crate::error::ExtractionError;
use crate::facts::StructuralFacts;
use crate::types::{FileRole, Language};

/// A parsed source file with its tree-sitter AST and original content.
pub struct ParsedFile {
    pub path: PathBuf,
    pub tree: Tree,
    pub content: String,
}

/// Trait that each language extractor must implement.
///
/// Extraction is pure: the same source and role always produce the same
/// facts, which is what lets the pipeline fan files out across threads.
pub trait StructuralExtractor: Send + Sync {
    fn language(&self) -> Language;

    /// File extensions this extractor handles (e.g., &["py"])
    fn file_extensions(&self) -> &[&str];

    /// Parse a source file. Fails only when the grammar rejects the file
    /// under this language's syntax policy.
    fn parse_file(&self, path: &Path, content: &str) -> Result<ParsedFile, ExtractionError>;

    /// Collect structural facts from a parsed file.
    fn extract_facts(&self, parsed: &ParsedFile, role: FileRole) -> StructuralFacts;

    /// Parse and extract in one step.
    fn extract(
        &self,
        path: &Path,
        content: &str,
        role: FileRole,
    ) -> Result<StructuralFacts, ExtractionError> {
        let parsed = self.parse_file(path, content)?;
        let mut facts = self.extract_facts(&parsed, role);
        facts.files_analyzed = 1;
        Ok(facts)
    }
}

/// Source text covered by `node`.
pub fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

/// 1-based line of the node's first byte.
pub fn node_line(node: Node) -> usize {
    node.start_position().row + 1
}

/// Visit every node in pre-order without recursion.
pub fn walk_tree<'tree>(root: Node<'tree>, mut visit: impl FnMut(Node<'tree>)) {
    let mut cursor = root.walk();
    loop {
        visit(cursor.node());
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.node() == root {
                return;
            }
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

/// First descendant (including `node` itself) of the given kind, pre-order.
pub fn find_descendant<'tree>(node: Node<'tree>, kind: &str) -> Option<Node<'tree>> {
    let mut found = None;
    walk_tree(node, |n| {
        if found.is_none() && n.kind() == kind {
            found = Some(n);
        }
    });
    found
}

/// Nearest ancestor whose kind is one of `kinds`.
pub fn enclosing<'tree>(node: Node<'tree>, kinds: &[&str]) -> Option<Node<'tree>> {
    let mut current = node.parent();
    while let Some(parent) = current {
        if kinds.contains(&parent.kind()) {
            return Some(parent);
        }
        current = parent.parent();
    }
    None
}

/// Strip generic/template arguments and namespace qualifiers from a type
/// reference: `java.util.List<String>` -> `List`, `::ns::Base<T>` -> `Base`.
pub fn simple_type_name(text: &str) -> String {
    let base = text.split('<').next().unwrap_or(text).trim();
    base.rsplit(|c| c == '.' || c == ':')
        .find(|segment| !segment.is_empty())
        .unwrap_or(base)
        .trim()
        .to_string()
}

/// Describe the first syntax error in a tree, if any.
pub fn first_syntax_error(root: Node, source: &str) -> Option<String> {
    if !root.has_error() {
        return None;
    }
    let mut message = None;
    walk_tree(root, |n| {
        if message.is_none() && (n.is_error() || n.is_missing()) {
            let snippet: String = node_text(n, source).chars().take(40).collect();
            message = Some(format!(
                "syntax error at line {}: '{}'",
                node_line(n),
                snippet.trim()
            ));
        }
    });
    Some(message.unwrap_or_else(|| "syntax error".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_type_name() {
        assert_eq!(simple_type_name("Base"), "Base");
        assert_eq!(simple_type_name("java.util.List<String>"), "List");
        assert_eq!(simple_type_name("::ns::Base<T, U>"), "Base");
        assert_eq!(simple_type_name("std::vector<int>"), "vector");
        assert_eq!(simple_type_name("Map.Entry"), "Entry");
    }
}
