use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use anyhow::{Context, Result};
use tree_sitter::{Node, Parser, Query, QueryCursor, StreamingIterator};
use tracing::debug;

use strata_core::analyzer::{
    enclosing, first_syntax_error, node_text, simple_type_name, walk_tree, ParsedFile,
    StructuralExtractor,
};
use strata_core::error::ExtractionError;
use strata_core::facts::StructuralFacts;
use strata_core::types::{FileRole, Language, Visibility};

const TYPE_DECLARATIONS: &[&str] = &[
    "class_declaration",
    "interface_declaration",
    "enum_declaration",
    "record_declaration",
];

const TYPE_BODIES: &[&str] = &["class_body", "interface_body", "enum_body", "enum_body_declarations"];

const SINGLETON_ACCESSORS: &[&str] = &["getInstance", "instance", "getDefault"];

/// Java structural extractor using tree-sitter.
pub struct JavaExtractor {
    grammar: tree_sitter::Language,
    package_query: Query,
    annotation_query: Query,
    lambda_query: Query,
    anonymous_query: Query,
}

impl JavaExtractor {
    pub fn new() -> Result<Self> {
        let grammar: tree_sitter::Language = tree_sitter_java::LANGUAGE.into();

        let package_query = Query::new(
            &grammar,
            r#"
            (package_declaration (scoped_identifier) @package)
            (package_declaration (identifier) @package)
            "#,
        )
        .context("failed to compile package query")?;

        // Annotations anywhere: types, members, parameters
        let annotation_query = Query::new(
            &grammar,
            r#"
            (marker_annotation name: (_) @annotation)
            (annotation name: (_) @annotation)
            "#,
        )
        .context("failed to compile annotation query")?;

        let lambda_query = Query::new(&grammar, "(lambda_expression) @lambda")
            .context("failed to compile lambda query")?;

        let anonymous_query = Query::new(
            &grammar,
            "(object_creation_expression (class_body) @body)",
        )
        .context("failed to compile anonymous class query")?;

        Ok(Self {
            grammar,
            package_query,
            annotation_query,
            lambda_query,
            anonymous_query,
        })
    }
}

impl StructuralExtractor for JavaExtractor {
    fn language(&self) -> Language {
        Language::Java
    }

    fn file_extensions(&self) -> &[&str] {
        &["java"]
    }

    fn parse_file(&self, path: &Path, content: &str) -> Result<ParsedFile, ExtractionError> {
        let parse_error = |message: String| ExtractionError::Parse {
            language: Language::Java,
            path: path.to_path_buf(),
            message,
        };
        let mut parser = Parser::new();
        parser
            .set_language(&self.grammar)
            .map_err(|e| parse_error(format!("failed to set Java language: {e}")))?;
        let tree = parser
            .parse(content, None)
            .ok_or_else(|| parse_error("parser produced no tree".to_string()))?;
        if let Some(message) = first_syntax_error(tree.root_node(), content) {
            return Err(parse_error(message));
        }
        Ok(ParsedFile {
            path: path.to_path_buf(),
            tree,
            content: content.to_string(),
        })
    }

    fn extract_facts(&self, parsed: &ParsedFile, _role: FileRole) -> StructuralFacts {
        let mut facts = StructuralFacts::default();
        let root = parsed.tree.root_node();
        let source = parsed.content.as_str();

        for package in captures(&self.package_query, "package", parsed) {
            facts.namespaces.insert(package);
        }
        for annotation in captures(&self.annotation_query, "annotation", parsed) {
            facts.record_annotation(simple_type_name(&annotation));
        }
        facts.lambdas = captures(&self.lambda_query, "lambda", parsed).len();
        facts.anonymous_classes = captures(&self.anonymous_query, "body", parsed).len();

        walk_tree(root, |node| {
            if TYPE_DECLARATIONS.contains(&node.kind()) {
                extract_type(node, source, &mut facts);
            }
        });

        debug!(
            path = %parsed.path.display(),
            types = facts.type_count(),
            methods = facts.methods.total(),
            "extracted java facts"
        );
        facts
    }
}

/// Text of every capture named `name` across all matches.
fn captures(query: &Query, name: &str, parsed: &ParsedFile) -> Vec<String> {
    let Some(idx) = query.capture_names().iter().position(|n| *n == name) else {
        return Vec::new();
    };
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, parsed.tree.root_node(), parsed.content.as_bytes());
    let mut found = Vec::new();
    while let Some(m) = matches.next() {
        for capture in m.captures {
            if capture.index as usize == idx {
                found.push(node_text(capture.node, &parsed.content).to_string());
            }
        }
    }
    found
}

/// Modifier keywords and annotation names attached to a declaration.
struct Modifiers {
    keywords: Vec<String>,
    annotations: Vec<String>,
}

impl Modifiers {
    fn of(node: Node, source: &str) -> Self {
        let mut keywords = Vec::new();
        let mut annotations = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() != "modifiers" {
                continue;
            }
            let mut inner = child.walk();
            for modifier in child.children(&mut inner) {
                match modifier.kind() {
                    "marker_annotation" | "annotation" => {
                        if let Some(name) = modifier.child_by_field_name("name") {
                            annotations.push(simple_type_name(node_text(name, source)));
                        }
                    }
                    keyword => keywords.push(keyword.to_string()),
                }
            }
        }
        Self {
            keywords,
            annotations,
        }
    }

    fn has(&self, keyword: &str) -> bool {
        self.keywords.iter().any(|k| k == keyword)
    }

    fn visibility(&self, in_interface: bool) -> Visibility {
        if self.has("private") {
            Visibility::Private
        } else if self.has("protected") {
            Visibility::Protected
        } else if self.has("public") || in_interface {
            Visibility::Public
        } else {
            Visibility::Package
        }
    }
}

/// Type names listed under a `superclass`, `super_interfaces` or
/// `extends_interfaces` node.
fn referenced_types(node: Node, source: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "type_list" {
            let mut inner = child.walk();
            for ty in child.named_children(&mut inner) {
                names.push(simple_type_name(node_text(ty, source)));
            }
        } else {
            names.push(simple_type_name(node_text(child, source)));
        }
    }
    names.retain(|n| !n.is_empty());
    names
}

fn extract_type(node: Node, source: &str, facts: &mut StructuralFacts) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source).to_string();
    let modifiers = Modifiers::of(node, source);
    let is_interface = node.kind() == "interface_declaration";

    facts.type_names.insert(name.clone());
    if enclosing(node, TYPE_BODIES).is_some() {
        facts.nested_classes += 1;
    }
    if node.child_by_field_name("type_parameters").is_some() {
        facts.generic_types += 1;
    }

    match node.kind() {
        "class_declaration" | "record_declaration" => {
            facts.total_classes += 1;
            if modifiers.has("abstract") {
                facts.abstract_types.insert(name.clone());
            }
        }
        "interface_declaration" => {
            facts.interface_count += 1;
            facts.abstract_types.insert(name.clone());
        }
        "enum_declaration" => facts.enum_count += 1,
        _ => {}
    }

    let mut parents = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if matches!(
            child.kind(),
            "superclass" | "super_interfaces" | "extends_interfaces"
        ) {
            parents.extend(referenced_types(child, source));
        }
    }
    if !parents.is_empty() {
        facts.classes_with_inheritance += 1;
        for parent in parents {
            facts.add_edge(parent, name.clone());
        }
    }

    if let Some(body) = node.child_by_field_name("body") {
        extract_members(body, source, is_interface, facts);
    }
}

fn extract_members(body: Node, source: &str, is_interface: bool, facts: &mut StructuralFacts) {
    let mut method_names: HashMap<String, usize> = HashMap::new();
    let mut field_names: BTreeSet<String> = BTreeSet::new();

    let mut members = Vec::new();
    let mut cursor = body.walk();
    for child in body.named_children(&mut cursor) {
        if child.kind() == "enum_body_declarations" {
            let mut inner = child.walk();
            members.extend(child.named_children(&mut inner));
        } else {
            members.push(child);
        }
    }

    for member in members {
        match member.kind() {
            "method_declaration" => {
                let modifiers = Modifiers::of(member, source);
                facts.methods.record(modifiers.visibility(is_interface));
                if modifiers.annotations.iter().any(|a| a == "Override") {
                    facts.override_methods += 1;
                }
                let Some(name) = member.child_by_field_name("name") else {
                    continue;
                };
                let name = node_text(name, source).to_string();
                if modifiers.has("static") {
                    if SINGLETON_ACCESSORS.contains(&name.as_str()) {
                        facts.singleton_accessors += 1;
                    }
                    facts.function_names.insert(name.clone());
                }
                *method_names.entry(name).or_insert(0) += 1;
            }
            "field_declaration" | "constant_declaration" => {
                let modifiers = Modifiers::of(member, source);
                let visibility = modifiers.visibility(is_interface);
                let mut inner = member.walk();
                for declarator in member.named_children(&mut inner) {
                    if declarator.kind() != "variable_declarator" {
                        continue;
                    }
                    facts.fields.record(visibility);
                    if let Some(name) = declarator.child_by_field_name("name") {
                        field_names.insert(node_text(name, source).to_string());
                    }
                }
            }
            _ => {}
        }
    }

    facts.method_overloads += method_names
        .values()
        .map(|count| count.saturating_sub(1))
        .sum::<usize>();
    facts.getter_setter_pairs += field_names
        .iter()
        .filter(|field| has_accessor_pair(field, &method_names))
        .count();
}

/// `getX`/`isX` together with `setX` for field `x`.
fn has_accessor_pair(field: &str, methods: &HashMap<String, usize>) -> bool {
    let mut chars = field.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let capitalized: String = first.to_uppercase().chain(chars).collect();
    let getter = methods.contains_key(&format!("get{capitalized}"))
        || methods.contains_key(&format!("is{capitalized}"));
    getter && methods.contains_key(&format!("set{capitalized}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn extract(content: &str) -> StructuralFacts {
        let extractor = JavaExtractor::new().unwrap();
        let path = PathBuf::from("src/main/java/com/example/Shapes.java");
        extractor
            .extract(&path, content, FileRole::Implementation)
            .unwrap()
    }

    #[test]
    fn test_class_hierarchy() {
        let facts = extract(
            r#"
package com.example.shapes;

public abstract class Shape {
    protected String name;
    public abstract double area();
}

public class Circle extends Shape {
    private double radius;

    @Override
    public double area() { return Math.PI * radius * radius; }
}

public class Square extends Shape implements Comparable<Square> {
    private double side;

    @Override
    public double area() { return side * side; }

    @Override
    public int compareTo(Square other) { return 0; }
}
"#,
        );
        assert_eq!(facts.total_classes, 3);
        assert!(facts.abstract_types.contains("Shape"));
        assert_eq!(facts.classes_with_inheritance, 2);
        assert_eq!(facts.inheritance["Shape"].len(), 2);
        assert!(facts.inheritance["Comparable"].contains("Square"), "generic args stripped");
        assert_eq!(facts.override_methods, 3);
        assert_eq!(facts.fields.private, 2);
        assert_eq!(facts.fields.protected, 1);
        assert_eq!(facts.annotations["Override"], 3);
        assert!(facts.namespaces.contains("com.example.shapes"));
        assert_eq!(facts.files_analyzed, 1);
    }

    #[test]
    fn test_interfaces_enums_and_generics() {
        let facts = extract(
            r#"
public interface Repository<T, ID> {
    T findById(ID id);
    void save(T entity);
}

interface Cache extends Repository<String, Long> {}

enum Color { RED, GREEN; private int code; }

class Box<T> {
    T value;
}
"#,
        );
        assert_eq!(facts.interface_count, 2);
        assert_eq!(facts.enum_count, 1);
        assert_eq!(facts.total_classes, 1);
        assert_eq!(facts.generic_types, 2);
        assert_eq!(facts.methods.public, 2, "interface methods are public");
        assert_eq!(facts.fields.package, 1);
        assert_eq!(facts.fields.private, 1, "enum body field");
        assert!(facts.inheritance["Repository"].contains("Cache"));
    }

    #[test]
    fn test_overloads_lambdas_and_anonymous() {
        let facts = extract(
            r#"
import java.util.*;

public class Calculator {
    public int add(int a, int b) { return a + b; }
    public double add(double a, double b) { return a + b; }
    public int add(int a, int b, int c) { return a + b + c; }

    void run(List<Integer> items) {
        items.forEach(x -> System.out.println(x));
        Comparator<Integer> cmp = (a, b) -> a - b;
        Runnable r = new Runnable() {
            public void run() {}
        };
    }

    static class Inner {}
}
"#,
        );
        assert_eq!(facts.method_overloads, 2);
        assert_eq!(facts.lambdas, 2);
        assert_eq!(facts.anonymous_classes, 1);
        assert_eq!(facts.nested_classes, 1);
        assert_eq!(facts.methods.package, 1);
        assert_eq!(facts.methods.public, 3);
    }

    #[test]
    fn test_getter_setter_pairs_and_singleton() {
        let facts = extract(
            r#"
@Service
public class ConfigSingleton {
    private static ConfigSingleton instance;
    private String name;
    private boolean active;
    private int unpaired;

    private ConfigSingleton() {}

    public static ConfigSingleton getInstance() { return instance; }
    public String getName() { return name; }
    public void setName(String name) { this.name = name; }
    public boolean isActive() { return active; }
    public void setActive(boolean active) { this.active = active; }
    public int getUnpaired() { return unpaired; }
}
"#,
        );
        assert_eq!(facts.getter_setter_pairs, 2);
        assert_eq!(facts.singleton_accessors, 1);
        assert!(facts.has_annotation("Service"));
        assert!(facts.function_names.contains("getInstance"));
        assert_eq!(facts.fields.private, 4);
    }

    #[test]
    fn test_syntax_error_is_parse_failure() {
        let extractor = JavaExtractor::new().unwrap();
        let result = extractor.extract(
            Path::new("Broken.java"),
            "public class Broken { void f( { }",
            FileRole::Implementation,
        );
        assert!(matches!(result, Err(ExtractionError::Parse { .. })));
    }

    #[test]
    fn test_empty_file() {
        let facts = extract("");
        assert_eq!(facts.type_count(), 0);
        assert_eq!(facts.files_analyzed, 1);
    }

    #[test]
    fn test_controller_annotation() {
        let facts = extract(
            r#"
@RestController
public class UserController {
    @GetMapping("/users")
    public List<User> list() { return null; }
}
"#,
        );
        assert!(facts.has_annotation("RestController"));
        assert!(facts.has_annotation("GetMapping"));
        assert!(facts.type_names.contains("UserController"));
    }
}
