pub mod complexity;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use tree_sitter::{Node, Parser};
use tracing::debug;

use strata_core::analyzer::{
    enclosing, first_syntax_error, node_text, simple_type_name, walk_tree, ParsedFile,
    StructuralExtractor,
};
use strata_core::error::ExtractionError;
use strata_core::facts::StructuralFacts;
use strata_core::types::{FileRole, Language, Visibility};

pub use complexity::PythonComplexityAnalyzer;

const ABSTRACT_BASES: &[&str] = &["ABC", "Protocol"];
const ENUM_BASES: &[&str] = &["Enum", "IntEnum", "StrEnum", "Flag", "IntFlag"];
const IGNORED_BASES: &[&str] = &["object", "Generic"];
const LIFECYCLE_DUNDERS: &[&str] = &["__init__", "__new__", "__del__"];
const SINGLETON_ACCESSORS: &[&str] = &["instance", "get_instance", "getInstance"];

/// Python structural extractor using tree-sitter.
pub struct PythonExtractor {
    grammar: tree_sitter::Language,
}

impl PythonExtractor {
    pub fn new() -> Self {
        Self {
            grammar: tree_sitter_python::LANGUAGE.into(),
        }
    }
}

impl Default for PythonExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse with the Python grammar, rejecting any tree with syntax errors.
pub(crate) fn parse_strict(
    grammar: &tree_sitter::Language,
    path: &Path,
    content: &str,
) -> Result<tree_sitter::Tree, ExtractionError> {
    let parse_error = |message: String| ExtractionError::Parse {
        language: Language::Python,
        path: path.to_path_buf(),
        message,
    };
    let mut parser = Parser::new();
    parser
        .set_language(grammar)
        .map_err(|e| parse_error(format!("failed to set Python language: {e}")))?;
    let tree = parser
        .parse(content, None)
        .ok_or_else(|| parse_error("parser produced no tree".to_string()))?;
    if let Some(message) = first_syntax_error(tree.root_node(), content) {
        return Err(parse_error(message));
    }
    Ok(tree)
}

impl StructuralExtractor for PythonExtractor {
    fn language(&self) -> Language {
        Language::Python
    }

    fn file_extensions(&self) -> &[&str] {
        &["py", "pyi"]
    }

    fn parse_file(&self, path: &Path, content: &str) -> Result<ParsedFile, ExtractionError> {
        let tree = parse_strict(&self.grammar, path, content)?;
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

        let mut classes = Vec::new();
        walk_tree(root, |node| match node.kind() {
            "class_definition" => {
                if let Some(class) = ClassInfo::collect(node, source) {
                    classes.push(class);
                }
            }
            "lambda" => facts.lambdas += 1,
            "decorator" => {
                if let Some(name) = decorator_name(node, source) {
                    facts.record_annotation(last_segment(&name));
                }
            }
            "function_definition" => {
                if enclosing(node, &["class_definition", "function_definition"]).is_none() {
                    if let Some(name) = node.child_by_field_name("name") {
                        facts.function_names.insert(node_text(name, source).to_string());
                    }
                }
            }
            _ => {}
        });

        let methods_by_class: BTreeMap<&str, BTreeSet<&str>> = classes
            .iter()
            .map(|c| (c.name.as_str(), c.methods.iter().map(|m| m.name.as_str()).collect()))
            .collect();
        let bases_by_class: BTreeMap<&str, &[String]> = classes
            .iter()
            .map(|c| (c.name.as_str(), c.bases.as_slice()))
            .collect();

        for class in &classes {
            class.record(&mut facts);
            facts.override_methods += class
                .methods
                .iter()
                .filter(|m| !LIFECYCLE_DUNDERS.contains(&m.name.as_str()))
                .filter(|m| {
                    inherited_method(&class.bases, &m.name, &methods_by_class, &bases_by_class)
                })
                .count();
        }

        debug!(
            path = %parsed.path.display(),
            classes = facts.total_classes,
            methods = facts.methods.total(),
            "extracted python facts"
        );
        facts
    }
}

/// Whether any (transitive) base defined in the same file declares `method`.
fn inherited_method(
    bases: &[String],
    method: &str,
    methods_by_class: &BTreeMap<&str, BTreeSet<&str>>,
    bases_by_class: &BTreeMap<&str, &[String]>,
) -> bool {
    let mut pending: Vec<&str> = bases.iter().map(String::as_str).collect();
    let mut seen = BTreeSet::new();
    while let Some(base) = pending.pop() {
        if !seen.insert(base) {
            continue;
        }
        if methods_by_class
            .get(base)
            .is_some_and(|methods| methods.contains(method))
        {
            return true;
        }
        if let Some(grand) = bases_by_class.get(base) {
            pending.extend(grand.iter().map(String::as_str));
        }
    }
    false
}

fn visibility_of(name: &str) -> Visibility {
    let dunder = name.starts_with("__") && name.ends_with("__");
    if name.starts_with("__") && !dunder {
        Visibility::Private
    } else if name.starts_with('_') && !dunder {
        Visibility::Protected
    } else {
        Visibility::Public
    }
}

fn last_segment(name: &str) -> String {
    name.rsplit('.').next().unwrap_or(name).to_string()
}

/// Dotted name of a decorator: `property`, `x.setter`, `functools.lru_cache`.
/// Call arguments are dropped.
pub(crate) fn decorator_name(decorator: Node, source: &str) -> Option<String> {
    let mut expr = decorator.named_child(0)?;
    if expr.kind() == "call" {
        expr = expr.child_by_field_name("function")?;
    }
    match expr.kind() {
        "identifier" | "attribute" => Some(node_text(expr, source).to_string()),
        _ => None,
    }
}

/// The decorators attached to a definition, when it is wrapped in a
/// `decorated_definition`.
pub(crate) fn decorators_of(definition: Node, source: &str) -> Vec<String> {
    let Some(parent) = definition.parent() else {
        return Vec::new();
    };
    if parent.kind() != "decorated_definition" {
        return Vec::new();
    }
    let mut cursor = parent.walk();
    parent
        .named_children(&mut cursor)
        .filter(|child| child.kind() == "decorator")
        .filter_map(|d| decorator_name(d, source))
        .collect()
}

/// A body made only of a docstring and `raise NotImplementedError`.
fn raises_not_implemented(body: Node, source: &str) -> bool {
    let mut raised = false;
    let mut cursor = body.walk();
    for statement in body.named_children(&mut cursor) {
        match statement.kind() {
            "raise_statement" if node_text(statement, source).contains("NotImplementedError") => {
                raised = true;
            }
            "expression_statement"
                if statement
                    .named_child(0)
                    .is_some_and(|expr| expr.kind() == "string") => {}
            "comment" => {}
            _ => return false,
        }
    }
    raised
}

struct MethodInfo {
    name: String,
    decorators: Vec<String>,
    abstract_body: bool,
}

impl MethodInfo {
    fn has_decorator(&self, name: &str) -> bool {
        self.decorators.iter().any(|d| last_segment(d) == name)
    }

    fn is_abstract(&self) -> bool {
        self.abstract_body || self.has_decorator("abstractmethod")
    }
}

struct ClassInfo {
    name: String,
    bases: Vec<String>,
    generic: bool,
    abstract_base: bool,
    enum_base: bool,
    protocol: bool,
    nested: bool,
    methods: Vec<MethodInfo>,
    fields: BTreeSet<String>,
}

impl ClassInfo {
    fn collect(node: Node, source: &str) -> Option<Self> {
        let name = node_text(node.child_by_field_name("name")?, source).to_string();
        let mut class = ClassInfo {
            name,
            bases: Vec::new(),
            generic: node.child_by_field_name("type_parameters").is_some(),
            abstract_base: false,
            enum_base: false,
            protocol: false,
            nested: enclosing(node, &["class_definition"]).is_some(),
            methods: Vec::new(),
            fields: BTreeSet::new(),
        };

        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            class.collect_bases(superclasses, source);
        }
        if let Some(body) = node.child_by_field_name("body") {
            class.collect_members(body, source);
        }
        Some(class)
    }

    fn collect_bases(&mut self, superclasses: Node, source: &str) {
        let mut cursor = superclasses.walk();
        for arg in superclasses.named_children(&mut cursor) {
            let base = match arg.kind() {
                "identifier" | "attribute" => simple_type_name(node_text(arg, source)),
                "subscript" => match arg.child_by_field_name("value") {
                    Some(value) => simple_type_name(node_text(value, source)),
                    None => continue,
                },
                "keyword_argument" => {
                    let is_metaclass = arg
                        .child_by_field_name("name")
                        .is_some_and(|n| node_text(n, source) == "metaclass");
                    let value = arg
                        .child_by_field_name("value")
                        .map(|v| simple_type_name(node_text(v, source)));
                    if is_metaclass && value.as_deref() == Some("ABCMeta") {
                        self.abstract_base = true;
                    }
                    continue;
                }
                _ => continue,
            };
            match base.as_str() {
                "Generic" => self.generic = true,
                "Protocol" => self.protocol = true,
                b if ENUM_BASES.contains(&b) => self.enum_base = true,
                _ => {}
            }
            if ABSTRACT_BASES.contains(&base.as_str()) {
                self.abstract_base = true;
            }
            if !IGNORED_BASES.contains(&base.as_str()) {
                self.bases.push(base);
            }
        }
    }

    fn collect_members(&mut self, body: Node, source: &str) {
        let mut cursor = body.walk();
        for statement in body.named_children(&mut cursor) {
            let definition = match statement.kind() {
                "function_definition" => Some(statement),
                "decorated_definition" => statement
                    .child_by_field_name("definition")
                    .filter(|d| d.kind() == "function_definition"),
                "expression_statement" => {
                    // Class attributes
                    if let Some(assignment) = statement.named_child(0) {
                        if assignment.kind() == "assignment" {
                            if let Some(left) = assignment.child_by_field_name("left") {
                                if left.kind() == "identifier" {
                                    self.fields.insert(node_text(left, source).to_string());
                                }
                            }
                        }
                    }
                    None
                }
                _ => None,
            };
            let Some(function) = definition else {
                continue;
            };
            let Some(name) = function.child_by_field_name("name") else {
                continue;
            };
            let abstract_body = function
                .child_by_field_name("body")
                .is_some_and(|b| raises_not_implemented(b, source));
            self.methods.push(MethodInfo {
                name: node_text(name, source).to_string(),
                decorators: decorators_of(function, source),
                abstract_body,
            });
            self.collect_self_fields(function, source);
        }
    }

    /// `self.x = ...` anywhere in a method body.
    fn collect_self_fields(&mut self, function: Node, source: &str) {
        let Some(body) = function.child_by_field_name("body") else {
            return;
        };
        walk_tree(body, |node| {
            if node.kind() != "assignment" {
                return;
            }
            let Some(left) = node.child_by_field_name("left") else {
                return;
            };
            if left.kind() != "attribute" {
                return;
            }
            let is_self = left
                .child_by_field_name("object")
                .is_some_and(|o| node_text(o, source) == "self");
            if let (true, Some(attr)) = (is_self, left.child_by_field_name("attribute")) {
                self.fields.insert(node_text(attr, source).to_string());
            }
        });
    }

    fn record(&self, facts: &mut StructuralFacts) {
        facts.type_names.insert(self.name.clone());
        if self.protocol {
            facts.interface_count += 1;
        } else if self.enum_base {
            facts.enum_count += 1;
        } else {
            facts.total_classes += 1;
        }
        if self.nested {
            facts.nested_classes += 1;
        }
        if self.generic {
            facts.generic_types += 1;
        }
        if !self.bases.is_empty() {
            facts.classes_with_inheritance += 1;
            for base in &self.bases {
                facts.add_edge(base.clone(), self.name.clone());
            }
        }
        if self.abstract_base || self.methods.iter().any(MethodInfo::is_abstract) {
            facts.abstract_types.insert(self.name.clone());
        }

        let mut properties = BTreeSet::new();
        let mut setters = BTreeSet::new();
        for method in &self.methods {
            facts.methods.record(visibility_of(&method.name));
            if method.has_decorator("property") || method.has_decorator("cached_property") {
                facts.properties += 1;
                properties.insert(method.name.as_str());
            }
            if method
                .decorators
                .iter()
                .any(|d| d.as_str() == format!("{}.setter", method.name))
            {
                setters.insert(method.name.as_str());
            }
            let dunder = method.name.len() > 4
                && method.name.starts_with("__")
                && method.name.ends_with("__");
            if dunder && !LIFECYCLE_DUNDERS.contains(&method.name.as_str()) {
                facts.operator_overloads += 1;
            }
            let class_level =
                method.has_decorator("classmethod") || method.has_decorator("staticmethod");
            if class_level && SINGLETON_ACCESSORS.contains(&method.name.as_str()) {
                facts.singleton_accessors += 1;
            }
        }
        facts.getter_setter_pairs += properties.intersection(&setters).count();

        for field in &self.fields {
            facts.fields.record(visibility_of(field));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(content: &str) -> StructuralFacts {
        PythonExtractor::new()
            .extract(Path::new("pkg/shapes.py"), content, FileRole::Implementation)
            .unwrap()
    }

    #[test]
    fn test_abstract_base_and_subclasses() {
        let facts = extract(
            r#"
from abc import ABC, abstractmethod

class Shape(ABC):
    @abstractmethod
    def area(self):
        pass

    def describe(self):
        return f"{self.__class__.__name__} with area {self.area()}"

class Circle(Shape):
    def __init__(self, radius):
        self._radius = radius

    def area(self):
        return 3.14159 * self._radius ** 2

class Square(Shape):
    def __init__(self, side):
        self.__side = side

    def area(self):
        return self.__side ** 2
"#,
        );
        assert_eq!(facts.total_classes, 3);
        assert!(facts.abstract_types.contains("Shape"));
        assert_eq!(facts.abstract_types.len(), 1);
        assert_eq!(facts.classes_with_inheritance, 3, "ABC counts as a base");
        assert_eq!(facts.inheritance["Shape"].len(), 2);
        assert_eq!(facts.override_methods, 2, "area overrides, __init__ does not");
        assert_eq!(facts.methods.public, 6);
        assert_eq!(facts.fields.protected, 1);
        assert_eq!(facts.fields.private, 1);
        assert_eq!(facts.annotations["abstractmethod"], 1);
    }

    #[test]
    fn test_visibility_rules() {
        let facts = extract(
            r#"
class Account:
    def deposit(self, amount): ...
    def _audit(self): ...
    def __encrypt(self): ...
    def __repr__(self): return "Account"
    def __eq__(self, other): return True
    def __init__(self): ...
"#,
        );
        assert_eq!(facts.methods.public, 4, "dunders are public");
        assert_eq!(facts.methods.protected, 1);
        assert_eq!(facts.methods.private, 1);
        assert_eq!(facts.operator_overloads, 2, "__init__ is not an operator overload");
    }

    #[test]
    fn test_properties_and_setter_pairs() {
        let facts = extract(
            r#"
from functools import cached_property

class Temperature:
    def __init__(self):
        self._celsius = 0

    @property
    def celsius(self):
        return self._celsius

    @celsius.setter
    def celsius(self, value):
        self._celsius = value

    @property
    def fahrenheit(self):
        return self._celsius * 9 / 5 + 32

    @cached_property
    def kelvin(self):
        return self._celsius + 273.15
"#,
        );
        assert_eq!(facts.properties, 3);
        assert_eq!(facts.getter_setter_pairs, 1);
        assert!(facts.has_annotation("setter"));
    }

    #[test]
    fn test_not_implemented_body_is_abstract() {
        let facts = extract(
            r#"
class Exporter:
    def export(self, data):
        """Write data somewhere."""
        raise NotImplementedError

class Plain:
    def run(self):
        raise ValueError("nope")
"#,
        );
        assert!(facts.abstract_types.contains("Exporter"));
        assert!(!facts.abstract_types.contains("Plain"));
    }

    #[test]
    fn test_protocol_enum_generic_and_metaclass() {
        let facts = extract(
            r#"
from typing import Generic, Protocol, TypeVar
from enum import Enum
from abc import ABCMeta

T = TypeVar("T")

class Drawable(Protocol):
    def draw(self) -> None: ...

class Color(Enum):
    RED = 1
    GREEN = 2

class Stack(Generic[T]):
    def push(self, item: T) -> None: ...

class Base(metaclass=ABCMeta):
    pass
"#,
        );
        assert_eq!(facts.interface_count, 1);
        assert_eq!(facts.enum_count, 1);
        assert_eq!(facts.total_classes, 2);
        assert_eq!(facts.generic_types, 1);
        assert!(facts.abstract_types.contains("Drawable"));
        assert!(facts.abstract_types.contains("Base"));
        assert!(!facts.inheritance.contains_key("Generic"));
        assert_eq!(facts.fields.public, 2, "enum members are class attributes");
    }

    #[test]
    fn test_singleton_lambdas_and_functions() {
        let facts = extract(
            r#"
class Config:
    _instance = None

    @classmethod
    def get_instance(cls):
        if cls._instance is None:
            cls._instance = cls()
        return cls._instance

    class Inner:
        pass

def create_app():
    handler = lambda req: req
    return sorted([3, 1, 2], key=lambda x: -x)
"#,
        );
        assert_eq!(facts.singleton_accessors, 1);
        assert_eq!(facts.lambdas, 2);
        assert_eq!(facts.nested_classes, 1);
        assert!(facts.function_names.contains("create_app"));
        assert!(!facts.function_names.contains("get_instance"));
        assert_eq!(facts.fields.protected, 1);
    }

    #[test]
    fn test_syntax_error_is_parse_failure() {
        let result = PythonExtractor::new().extract(
            Path::new("broken.py"),
            "class Broken(:\n    def f(self)\n",
            FileRole::Implementation,
        );
        assert!(matches!(result, Err(ExtractionError::Parse { .. })));
    }
}
