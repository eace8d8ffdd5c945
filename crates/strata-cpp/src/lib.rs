use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;
use tree_sitter::{Node, Parser};
use tracing::debug;

use strata_core::analyzer::{
    enclosing, find_descendant, node_text, simple_type_name, walk_tree, ParsedFile,
    StructuralExtractor,
};
use strata_core::error::ExtractionError;
use strata_core::facts::StructuralFacts;
use strata_core::types::{FileRole, Language, Visibility};

const SINGLETON_ACCESSORS: &[&str] = &["getInstance", "instance", "get_instance"];
const BASE_KINDS: &[&str] = &["type_identifier", "qualified_identifier", "template_type"];

/// C++ structural extractor. Tolerant of syntax errors like the C extractor.
pub struct CppExtractor {
    grammar: tree_sitter::Language,
    pure_virtual: Regex,
}

impl CppExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            grammar: tree_sitter_cpp::LANGUAGE.into(),
            pure_virtual: Regex::new(r"=\s*0\s*;?\s*$")
                .context("failed to compile pure virtual pattern")?,
        })
    }
}

impl StructuralExtractor for CppExtractor {
    fn language(&self) -> Language {
        Language::Cpp
    }

    fn file_extensions(&self) -> &[&str] {
        &["cpp", "cc", "cxx", "hpp", "hh", "hxx"]
    }

    fn parse_file(&self, path: &Path, content: &str) -> Result<ParsedFile, ExtractionError> {
        let parse_error = |message: String| ExtractionError::Parse {
            language: Language::Cpp,
            path: path.to_path_buf(),
            message,
        };
        let mut parser = Parser::new();
        parser
            .set_language(&self.grammar)
            .map_err(|e| parse_error(format!("failed to set C++ language: {e}")))?;
        let tree = parser
            .parse(content, None)
            .ok_or_else(|| parse_error("parser produced no tree".to_string()))?;
        if tree.root_node().has_error() {
            debug!(path = %path.display(), "tolerating syntax errors in C++ source");
        }
        Ok(ParsedFile {
            path: path.to_path_buf(),
            tree,
            content: content.to_string(),
        })
    }

    fn extract_facts(&self, parsed: &ParsedFile, _role: FileRole) -> StructuralFacts {
        let mut facts = StructuralFacts::default();
        let source = parsed.content.as_str();

        walk_tree(parsed.tree.root_node(), |node| match node.kind() {
            "class_specifier" | "struct_specifier" => {
                self.class_specifier(node, source, &mut facts);
            }
            "template_declaration" => facts.generic_types += 1,
            "template_type" => facts.generic_instantiations += 1,
            "namespace_definition" => {
                if let Some(name) = node.child_by_field_name("name") {
                    facts.namespaces.insert(node_text(name, source).to_string());
                }
            }
            "using_declaration" => {
                let text = node_text(node, source);
                if let Some(rest) = text.strip_prefix("using namespace") {
                    let name = rest.trim().trim_end_matches(';').trim();
                    if !name.is_empty() {
                        facts.namespaces.insert(name.to_string());
                    }
                }
            }
            "lambda_expression" => facts.lambdas += 1,
            "function_definition" | "declaration" => {
                if enclosing(node, &["field_declaration_list", "compound_statement"]).is_none() {
                    if let Some(name) = free_function_name(node, source) {
                        facts.function_names.insert(name);
                    }
                }
            }
            _ => {}
        });

        debug!(
            path = %parsed.path.display(),
            classes = facts.total_classes,
            structs = facts.struct_count,
            methods = facts.methods.total(),
            "extracted c++ facts"
        );
        facts
    }
}

impl CppExtractor {
    fn class_specifier(&self, node: Node, source: &str, facts: &mut StructuralFacts) {
        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        let Some(name) = node.child_by_field_name("name") else {
            return;
        };
        let name = simple_type_name(node_text(name, source));
        let is_struct = node.kind() == "struct_specifier";

        if is_struct {
            facts.struct_count += 1;
        } else {
            facts.total_classes += 1;
        }
        facts.type_names.insert(name.clone());
        if enclosing(node, &["field_declaration_list"]).is_some() {
            facts.nested_classes += 1;
        }

        let mut bases = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() != "base_class_clause" {
                continue;
            }
            let mut inner = child.walk();
            for base in child.named_children(&mut inner) {
                if BASE_KINDS.contains(&base.kind()) {
                    bases.push(simple_type_name(node_text(base, source)));
                }
            }
        }
        if !bases.is_empty() {
            facts.classes_with_inheritance += 1;
            for base in bases {
                facts.add_edge(base, name.clone());
            }
        }

        let mut access = if is_struct {
            Visibility::Public
        } else {
            Visibility::Private
        };
        let mut is_abstract = false;
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            match member.kind() {
                "access_specifier" => {
                    access = match node_text(member, source).trim_end_matches(':').trim() {
                        "public" => Visibility::Public,
                        "protected" => Visibility::Protected,
                        _ => Visibility::Private,
                    };
                }
                "field_declaration" | "declaration" | "function_definition" => {
                    match self.member(member, source, &name, access, facts) {
                        Member::PureVirtual => is_abstract = true,
                        Member::Method | Member::Field | Member::Other => {}
                    }
                }
                "template_declaration" => {
                    let mut inner = member.walk();
                    let templated: Vec<Node> = member
                        .named_children(&mut inner)
                        .filter(|c| matches!(c.kind(), "field_declaration" | "declaration" | "function_definition"))
                        .collect();
                    for decl in templated {
                        self.member(decl, source, &name, access, facts);
                    }
                }
                _ => {}
            }
        }
        if is_abstract {
            facts.abstract_types.insert(name);
        }
    }

    fn member(
        &self,
        member: Node,
        source: &str,
        class_name: &str,
        access: Visibility,
        facts: &mut StructuralFacts,
    ) -> Member {
        let Some(function) = find_function_declarator(member) else {
            if member.kind() != "field_declaration" {
                return Member::Other;
            }
            // `T x, y;` declares two fields
            let mut cursor = member.walk();
            let declared = member
                .children_by_field_name("declarator", &mut cursor)
                .count();
            for _ in 0..declared {
                facts.fields.record(access);
            }
            return if declared == 0 { Member::Other } else { Member::Field };
        };

        let Some(declarator) = function.child_by_field_name("declarator") else {
            return Member::Other;
        };
        let method_name = node_text(declarator, source);
        let simple = simple_type_name(method_name.trim_start_matches('~'));
        if simple == class_name {
            // Constructors and destructors
            return Member::Other;
        }

        facts.methods.record(access);
        if declarator.kind() == "operator_name" || method_name.starts_with("operator") {
            facts.operator_overloads += 1;
        }

        let text = node_text(member, source);
        let pure = member.kind() != "function_definition" && self.pure_virtual.is_match(text.trim());
        if pure || has_token(member, "virtual") {
            facts.virtual_methods += 1;
        }
        let overrides = find_descendant(function, "virtual_specifier")
            .is_some_and(|s| node_text(s, source) == "override");
        if overrides {
            facts.override_methods += 1;
        }
        if has_static(member, source) && SINGLETON_ACCESSORS.contains(&method_name) {
            facts.singleton_accessors += 1;
        }

        if pure {
            Member::PureVirtual
        } else {
            Member::Method
        }
    }
}

enum Member {
    Method,
    PureVirtual,
    Field,
    Other,
}

/// The function declarator of a member, looking through pointer and
/// reference declarators (`Foo& operator=(...)`, `Foo* clone()`).
fn find_function_declarator(member: Node) -> Option<Node> {
    let mut current = member.child_by_field_name("declarator")?;
    loop {
        match current.kind() {
            "function_declarator" => return Some(current),
            "pointer_declarator" | "reference_declarator" => {
                current = current
                    .child_by_field_name("declarator")
                    .or_else(|| current.named_child(0))?;
            }
            _ => return None,
        }
    }
}

fn has_token(node: Node, kind: &str) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|c| c.kind() == kind || (c.kind() == "virtual_function_specifier" && kind == "virtual"));
    found
}

fn has_static(node: Node, source: &str) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|c| c.kind() == "storage_class_specifier" && node_text(c, source) == "static");
    found
}

/// Name of a namespace-scope function definition or prototype. Out-of-line
/// member definitions (`Foo::bar`) are skipped.
fn free_function_name(node: Node, source: &str) -> Option<String> {
    let function = find_function_declarator(node)?;
    let declarator = function.child_by_field_name("declarator")?;
    (declarator.kind() == "identifier").then(|| node_text(declarator, source).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(content: &str) -> StructuralFacts {
        CppExtractor::new()
            .unwrap()
            .extract(Path::new("shapes.cpp"), content, FileRole::Implementation)
            .unwrap()
    }

    #[test]
    fn test_abstract_class_and_overrides() {
        let facts = extract(
            r#"
class Shape {
public:
    virtual ~Shape() = default;
    virtual double area() const = 0;
    virtual void draw() const;
protected:
    int id;
};

class Circle : public Shape {
public:
    explicit Circle(double r) : radius(r) {}
    double area() const override { return 3.14 * radius * radius; }
private:
    double radius;
};

struct Square : Shape {
    double side;
    double area() const override;
};
"#,
        );
        assert_eq!(facts.total_classes, 2);
        assert_eq!(facts.struct_count, 1);
        assert!(facts.abstract_types.contains("Shape"));
        assert_eq!(facts.abstract_types.len(), 1);
        assert_eq!(facts.inheritance["Shape"].len(), 2);
        assert_eq!(facts.classes_with_inheritance, 2);
        assert_eq!(facts.virtual_methods, 2, "area and draw, destructor excluded");
        assert_eq!(facts.override_methods, 2);
        assert_eq!(facts.fields.protected, 1);
        assert_eq!(facts.fields.private, 1);
        assert_eq!(facts.fields.public, 1, "struct members default to public");
        assert_eq!(facts.methods.public, 4);
    }

    #[test]
    fn test_default_access() {
        let facts = extract(
            r#"
class Hidden {
    int secret;
    void helper();
};
"#,
        );
        assert_eq!(facts.fields.private, 1);
        assert_eq!(facts.methods.private, 1);
    }

    #[test]
    fn test_templates_namespaces_and_operators() {
        let facts = extract(
            r#"
#include <vector>
using namespace std;

namespace geometry {

template <typename T>
class Vec2 {
public:
    Vec2 operator+(const Vec2& other) const;
    bool operator==(const Vec2& other) const;
    T x, y;
};

}

int main() {
    std::vector<int> values;
    auto twice = [](int v) { return v * 2; };
    return 0;
}
"#,
        );
        assert_eq!(facts.generic_types, 1);
        assert!(facts.generic_instantiations >= 1);
        assert!(facts.namespaces.contains("geometry"));
        assert!(facts.namespaces.contains("std"));
        assert_eq!(facts.operator_overloads, 2);
        assert_eq!(facts.fields.public, 2);
        assert_eq!(facts.lambdas, 1);
        assert!(facts.function_names.contains("main"));
    }

    #[test]
    fn test_nested_and_singleton() {
        let facts = extract(
            r#"
class Logger {
public:
    static Logger& getInstance();
    void log(const char* msg);
private:
    Logger();
    struct Entry {
        int level;
    };
};
"#,
        );
        assert_eq!(facts.singleton_accessors, 1);
        assert_eq!(facts.nested_classes, 1);
        assert_eq!(facts.methods.public, 2);
        assert_eq!(facts.methods.private, 0, "constructor is not a method");
    }

    #[test]
    fn test_forward_declaration_is_not_a_class() {
        let facts = extract("class Widget;\nstruct Gadget;\n");
        assert_eq!(facts.type_count(), 0);
    }
}
