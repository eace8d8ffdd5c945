use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;
use tree_sitter::{Node, Parser};
use tracing::debug;

use strata_core::analyzer::{node_text, walk_tree, ParsedFile, StructuralExtractor};
use strata_core::error::ExtractionError;
use strata_core::facts::StructuralFacts;
use strata_core::types::{FileRole, Language, Visibility};

const ALLOCATORS: &[&str] = &["malloc", "calloc", "realloc"];
const CONSTRUCTOR_SUFFIXES: &[&str] = &["_create", "_new"];
const DESTRUCTOR_SUFFIXES: &[&str] = &["_destroy", "_free", "_delete"];
const CALLBACK_HINTS: &[&str] = &["callback", "listener", "handler", "notify", "on_"];

/// C structural extractor.
///
/// Parsing is tolerant: preprocessor-heavy sources routinely leave local
/// error nodes, so only a parser that yields no tree is a failure.
pub struct CExtractor {
    grammar: tree_sitter::Language,
    oop_naming: Regex,
}

impl CExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            grammar: tree_sitter_c::LANGUAGE.into(),
            oop_naming: Regex::new(r"^[A-Z][A-Za-z0-9]*_[a-z]\w*$")
                .context("failed to compile OOP naming pattern")?,
        })
    }

    fn record_function_name(&self, name: &str, facts: &mut StructuralFacts) {
        facts.function_names.insert(name.to_string());
        if let Some(base) = strip_any_suffix(name, CONSTRUCTOR_SUFFIXES) {
            facts.constructor_bases.insert(base.to_string());
        }
        if let Some(base) = strip_any_suffix(name, DESTRUCTOR_SUFFIXES) {
            facts.destructor_bases.insert(base.to_string());
        }
    }

    fn function_definition(&self, node: Node, source: &str, role: FileRole, facts: &mut StructuralFacts) {
        let Some(name) = node
            .child_by_field_name("declarator")
            .and_then(function_identifier)
        else {
            return;
        };
        let name = node_text(name, source);

        facts.total_functions += 1;
        if is_static(node, source) {
            facts.static_functions += 1;
            facts.methods.record(Visibility::Private);
        } else {
            facts.methods.record(Visibility::Public);
        }
        match role {
            FileRole::PublicInterface => facts.header_functions += 1,
            FileRole::Implementation => facts.implementation_functions += 1,
        }
        if self.oop_naming.is_match(name) {
            facts.oop_style_functions += 1;
        }
        self.record_function_name(name, facts);
    }

    /// Prototypes in a public header.
    fn declaration(&self, node: Node, source: &str, role: FileRole, facts: &mut StructuralFacts) {
        let mut cursor = node.walk();
        for declarator in node.children_by_field_name("declarator", &mut cursor) {
            let Some(name) = function_identifier(declarator) else {
                continue;
            };
            if role == FileRole::PublicInterface {
                facts.header_functions += 1;
            }
            self.record_function_name(node_text(name, source), facts);
        }
    }
}

impl StructuralExtractor for CExtractor {
    fn language(&self) -> Language {
        Language::C
    }

    fn file_extensions(&self) -> &[&str] {
        &["c", "h"]
    }

    fn parse_file(&self, path: &Path, content: &str) -> Result<ParsedFile, ExtractionError> {
        let parse_error = |message: String| ExtractionError::Parse {
            language: Language::C,
            path: path.to_path_buf(),
            message,
        };
        let mut parser = Parser::new();
        parser
            .set_language(&self.grammar)
            .map_err(|e| parse_error(format!("failed to set C language: {e}")))?;
        let tree = parser
            .parse(content, None)
            .ok_or_else(|| parse_error("parser produced no tree".to_string()))?;
        if tree.root_node().has_error() {
            debug!(path = %path.display(), "tolerating syntax errors in C source");
        }
        Ok(ParsedFile {
            path: path.to_path_buf(),
            tree,
            content: content.to_string(),
        })
    }

    fn extract_facts(&self, parsed: &ParsedFile, role: FileRole) -> StructuralFacts {
        let mut facts = StructuralFacts::default();
        let source = parsed.content.as_str();

        walk_tree(parsed.tree.root_node(), |node| match node.kind() {
            "function_definition" => self.function_definition(node, source, role, &mut facts),
            "declaration" => self.declaration(node, source, role, &mut facts),
            "struct_specifier" => struct_specifier(node, source, role, &mut facts),
            "enum_specifier" => {
                if node.child_by_field_name("body").is_some() {
                    facts.enum_count += 1;
                }
            }
            "type_definition" => facts.typedefs += 1,
            "call_expression" => {
                let callee = node
                    .child_by_field_name("function")
                    .filter(|f| f.kind() == "identifier")
                    .map(|f| node_text(f, source));
                match callee {
                    Some(name) if ALLOCATORS.contains(&name) => facts.malloc_calls += 1,
                    Some("free") => facts.free_calls += 1,
                    _ => {}
                }
            }
            _ => {}
        });

        debug!(
            path = %parsed.path.display(),
            role = %role,
            structs = facts.struct_count,
            functions = facts.total_functions,
            "extracted c facts"
        );
        facts
    }
}

fn strip_any_suffix<'a>(name: &'a str, suffixes: &[&str]) -> Option<&'a str> {
    suffixes
        .iter()
        .find_map(|suffix| name.strip_suffix(suffix))
        .filter(|base| !base.is_empty())
}

fn is_static(node: Node, source: &str) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|c| c.kind() == "storage_class_specifier" && node_text(c, source) == "static");
    found
}

/// The identifier named by a function declarator, looking through pointer
/// declarators (`struct Foo *Foo_create(void)`). Function-pointer variables
/// (`int (*cb)(void)`) are not functions and yield `None`.
fn function_identifier(declarator: Node) -> Option<Node> {
    let mut current = declarator;
    loop {
        match current.kind() {
            "pointer_declarator" => current = current.child_by_field_name("declarator")?,
            "function_declarator" => {
                let inner = current.child_by_field_name("declarator")?;
                return (inner.kind() == "identifier").then_some(inner);
            }
            _ => return None,
        }
    }
}

/// `int (*name)(...)` field: a function declarator wrapping a parenthesized
/// pointer declarator. Returns the field name.
fn function_pointer_field<'a>(declarator: Node, source: &'a str) -> Option<&'a str> {
    if declarator.kind() != "function_declarator" {
        return None;
    }
    let inner = declarator.child_by_field_name("declarator")?;
    if inner.kind() != "parenthesized_declarator" {
        return None;
    }
    let mut name = None;
    walk_tree(inner, |n| {
        if name.is_none() && n.kind() == "field_identifier" {
            name = Some(node_text(n, source));
        }
    });
    name
}

/// Name of a struct: its own tag, or the typedef name for
/// `typedef struct { ... } Name;`.
fn struct_name<'a>(node: Node, source: &'a str) -> Option<&'a str> {
    if let Some(name) = node.child_by_field_name("name") {
        return Some(node_text(name, source));
    }
    let parent = node.parent()?;
    if parent.kind() != "type_definition" {
        return None;
    }
    parent
        .child_by_field_name("declarator")
        .filter(|d| d.kind() == "type_identifier")
        .map(|d| node_text(d, source))
}

fn struct_specifier(node: Node, source: &str, role: FileRole, facts: &mut StructuralFacts) {
    let Some(body) = node.child_by_field_name("body") else {
        // `struct Foo;` or `typedef struct Foo Foo;` in a header
        let forward = node.parent().is_some_and(|p| {
            p.kind() == "type_definition"
                || (p.kind() == "declaration" && p.child_by_field_name("declarator").is_none())
        });
        if forward && role == FileRole::PublicInterface {
            if let Some(name) = struct_name(node, source) {
                facts.forward_declared_structs.insert(name.to_string());
            }
        }
        return;
    };

    facts.struct_count += 1;
    if let Some(name) = struct_name(node, source) {
        facts.type_names.insert(name.to_string());
        let defined = match role {
            FileRole::PublicInterface => &mut facts.header_defined_structs,
            FileRole::Implementation => &mut facts.implementation_defined_structs,
        };
        defined.insert(name.to_string());
    }

    let mut pointer_fields = 0;
    let mut cursor = body.walk();
    for field in body.named_children(&mut cursor) {
        if field.kind() != "field_declaration" {
            continue;
        }
        let mut inner = field.walk();
        for declarator in field.children_by_field_name("declarator", &mut inner) {
            match function_pointer_field(declarator, source) {
                Some(name) => {
                    pointer_fields += 1;
                    let lowered = name.to_lowercase();
                    if CALLBACK_HINTS.iter().any(|hint| lowered.contains(hint)) {
                        facts.callback_fields += 1;
                    }
                }
                None => facts.fields.record(Visibility::Public),
            }
        }
    }
    facts.function_pointer_fields += pointer_fields;
    if pointer_fields >= 2 {
        facts.vtable_structs += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract_as(path: &str, role: FileRole, content: &str) -> StructuralFacts {
        CExtractor::new()
            .unwrap()
            .extract(Path::new(path), content, role)
            .unwrap()
    }

    fn extract(content: &str) -> StructuralFacts {
        extract_as("test.c", FileRole::Implementation, content)
    }

    #[test]
    fn test_empty_file() {
        let facts = extract("");
        assert_eq!(facts.struct_count, 0);
        assert_eq!(facts.total_functions, 0);
        assert_eq!(facts.files_analyzed, 1);
    }

    #[test]
    fn test_simple_struct() {
        let facts = extract("struct Point {\n    int x;\n    int y;\n};\n");
        assert_eq!(facts.struct_count, 1);
        assert_eq!(facts.fields.public, 2);
        assert!(facts.implementation_defined_structs.contains("Point"));
    }

    #[test]
    fn test_static_functions_are_private() {
        let facts = extract(
            r#"
int add(int a, int b) {
    return a + b;
}

static int multiply(int a, int b) {
    return a * b;
}
"#,
        );
        assert_eq!(facts.total_functions, 2);
        assert_eq!(facts.static_functions, 1);
        assert_eq!(facts.methods.private, 1);
        assert_eq!(facts.implementation_functions, 2);
        assert_eq!(facts.encapsulation_ratio(), 50.0);
    }

    #[test]
    fn test_oop_naming() {
        let facts = extract(
            r#"
void Vector_push(int value) {}
void String_append(char* str) {}
void helper_function() {}
"#,
        );
        assert_eq!(facts.oop_style_functions, 2);
    }

    #[test]
    fn test_function_pointer_vtable() {
        let facts = extract(
            r#"
struct Operations {
    int (*add)(int, int);
    int (*subtract)(int, int);
    int (*multiply)(int, int);
};
"#,
        );
        assert_eq!(facts.function_pointer_fields, 3);
        assert_eq!(facts.vtable_structs, 1);
        assert_eq!(facts.fields.total(), 0, "function pointers are not data fields");
    }

    #[test]
    fn test_callback_fields() {
        let facts = extract(
            r#"
typedef struct {
    void (*on_change)(void *ctx);
    void (*event_handler)(int);
    int count;
} Emitter;
"#,
        );
        assert_eq!(facts.callback_fields, 2);
        assert!(facts.type_names.contains("Emitter"), "anonymous struct takes typedef name");
        assert_eq!(facts.typedefs, 1);
    }

    #[test]
    fn test_malloc_free_and_factory() {
        let facts = extract(
            r#"
#include <stdlib.h>

struct Object* Object_create() {
    return malloc(sizeof(struct Object));
}

void Object_destroy(struct Object* obj) {
    free(obj);
}

void* grow(void* p) {
    return realloc(p, 64);
}
"#,
        );
        assert_eq!(facts.malloc_calls, 2);
        assert_eq!(facts.free_calls, 1);
        assert!(facts.constructor_bases.contains("Object"));
        assert_eq!(facts.constructor_destructor_pairs(), 1);
        assert!(facts.function_names.contains("Object_create"));
    }

    #[test]
    fn test_opaque_struct_across_header_and_source() {
        let extractor = CExtractor::new().unwrap();
        let header = extractor
            .extract(
                Path::new("include/vector.h"),
                r#"
typedef struct Vector Vector;
struct Vector *Vector_new(void);
void Vector_free(struct Vector *v);
"#,
                FileRole::PublicInterface,
            )
            .unwrap();
        let source = extractor
            .extract(
                Path::new("src/vector.c"),
                r#"
#include "vector.h"
struct Vector { int *data; int len; };
struct Vector *Vector_new(void) { return 0; }
void Vector_free(struct Vector *v) {}
static void grow(struct Vector *v) {}
"#,
                FileRole::Implementation,
            )
            .unwrap();

        assert!(header.forward_declared_structs.contains("Vector"));
        assert_eq!(header.header_functions, 2);
        assert_eq!(header.total_functions, 0, "prototypes are not definitions");

        let mut merged = header.clone();
        merged.merge(&source);
        assert_eq!(merged.opaque_structs().into_iter().collect::<Vec<_>>(), vec!["Vector"]);
        assert_eq!(merged.constructor_destructor_pairs(), 1);
        assert_eq!(merged.implementation_functions, 3);
    }

    #[test]
    fn test_header_definition_is_not_opaque() {
        let facts = extract_as(
            "point.h",
            FileRole::PublicInterface,
            "struct Point;\nstruct Point { int x; };\n",
        );
        assert!(facts.header_defined_structs.contains("Point"));
        assert!(facts.opaque_structs().is_empty());
    }

    #[test]
    fn test_tolerates_preprocessor_noise() {
        let facts = extract(
            r#"
#define DECLARE(name) int name##_count
DECLARE(widget);
#ifdef FEATURE
int enabled(void) { return 1; }
#endif
int main(void) { return 0; }
"#,
        );
        assert!(facts.total_functions >= 1);
        assert!(facts.error.is_none());
    }

    #[test]
    fn test_enums() {
        let facts = extract("enum Color { RED, GREEN };\nenum Color c;\n");
        assert_eq!(facts.enum_count, 1);
    }
}
