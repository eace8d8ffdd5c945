//! Design-pattern heuristics as a declarative rule table.
//!
//! Each rule is a named predicate over aggregated [`StructuralFacts`]. Adding
//! or changing a rule bumps [`RULESET_VERSION`] so stored scores can be told
//! apart from ones computed with a different table.

use std::collections::BTreeSet;

use crate::facts::StructuralFacts;

pub const RULESET_VERSION: u32 = 1;

/// A single pattern heuristic.
pub struct PatternRule {
    pub name: &'static str,
    pub description: &'static str,
    pub matches: fn(&StructuralFacts) -> bool,
}

pub const PATTERN_RULES: &[PatternRule] = &[
    PatternRule {
        name: "Factory",
        description: "creation functions (X_create, create_*, make_*) or a *Factory type",
        matches: is_factory,
    },
    PatternRule {
        name: "Singleton",
        description: "static self accessor, @Singleton, or a *Singleton type",
        matches: is_singleton,
    },
    PatternRule {
        name: "Strategy",
        description: "vtable-style struct, abstract type with two or more children, or a *Strategy type",
        matches: is_strategy,
    },
    PatternRule {
        name: "Observer",
        description: "callback/listener function-pointer fields or an Observer/Listener type",
        matches: is_observer,
    },
    PatternRule {
        name: "Builder",
        description: "*Builder type",
        matches: is_builder,
    },
    PatternRule {
        name: "Repository",
        description: "*Repository type or @Repository",
        matches: is_repository,
    },
    PatternRule {
        name: "Service",
        description: "*Service type or @Service",
        matches: is_service,
    },
    PatternRule {
        name: "Controller",
        description: "*Controller type or @Controller/@RestController",
        matches: is_controller,
    },
];

/// Names of every rule in the table, in table order.
pub fn known_patterns() -> impl Iterator<Item = &'static str> {
    PATTERN_RULES.iter().map(|rule| rule.name)
}

/// Evaluate every rule against `facts`.
pub fn detect_patterns(facts: &StructuralFacts) -> BTreeSet<String> {
    PATTERN_RULES
        .iter()
        .filter(|rule| (rule.matches)(facts))
        .map(|rule| rule.name.to_string())
        .collect()
}

fn any_type_contains(facts: &StructuralFacts, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    facts
        .type_names
        .iter()
        .any(|name| name.to_lowercase().contains(&needle))
}

fn any_type_ends_with(facts: &StructuralFacts, suffix: &str) -> bool {
    let suffix = suffix.to_lowercase();
    facts
        .type_names
        .iter()
        .any(|name| name.len() > suffix.len() && name.to_lowercase().ends_with(&suffix))
}

/// `create_widget`, `createWidget`, `make_widget`, `makeWidget`.
fn is_creation_name(name: &str) -> bool {
    ["create", "make"].iter().any(|verb| {
        name.strip_prefix(verb)
            .and_then(|rest| rest.chars().next())
            .is_some_and(|c| c == '_' || c.is_ascii_uppercase())
    })
}

fn is_factory(facts: &StructuralFacts) -> bool {
    !facts.constructor_bases.is_empty()
        || any_type_contains(facts, "Factory")
        || facts.function_names.iter().any(|name| is_creation_name(name))
}

fn is_singleton(facts: &StructuralFacts) -> bool {
    facts.singleton_accessors > 0
        || facts.has_annotation("Singleton")
        || any_type_contains(facts, "Singleton")
}

fn is_strategy(facts: &StructuralFacts) -> bool {
    facts.vtable_structs > 0
        || any_type_contains(facts, "Strategy")
        || facts.abstract_types.iter().any(|name| {
            facts
                .inheritance
                .get(name)
                .is_some_and(|children| children.len() >= 2)
        })
}

fn is_observer(facts: &StructuralFacts) -> bool {
    facts.callback_fields > 0
        || any_type_contains(facts, "Observer")
        || any_type_contains(facts, "Observable")
        || any_type_ends_with(facts, "Listener")
}

fn is_builder(facts: &StructuralFacts) -> bool {
    any_type_ends_with(facts, "Builder")
}

fn is_repository(facts: &StructuralFacts) -> bool {
    any_type_ends_with(facts, "Repository") || facts.has_annotation("Repository")
}

fn is_service(facts: &StructuralFacts) -> bool {
    any_type_ends_with(facts, "Service") || facts.has_annotation("Service")
}

fn is_controller(facts: &StructuralFacts) -> bool {
    any_type_ends_with(facts, "Controller")
        || facts.has_annotation("Controller")
        || facts.has_annotation("RestController")
}
