//! Per-language OOP usage and SOLID heuristics over aggregated facts.
//!
//! Every language reports an OOP score out of [`OOP_MAX`] and a SOLID score
//! out of [`SOLID_MAX`]; what earns a point differs per language family.

use serde::{Deserialize, Serialize};

use crate::facts::StructuralFacts;
use crate::types::Language;

pub const OOP_MAX: f64 = 6.0;
pub const SOLID_MAX: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OopProfile {
    pub oop_score: f64,
    pub solid_score: f64,
    pub coding_style: String,
}

pub fn profile(language: Language, facts: &StructuralFacts) -> OopProfile {
    let (oop_score, solid_score) = match language {
        Language::Python => (python_oop(facts), python_solid(facts)),
        Language::Java => (java_oop(facts), java_solid(facts)),
        Language::C => (c_oop(facts), c_solid(facts)),
        Language::Cpp => (cpp_oop(facts), cpp_solid(facts)),
    };
    OopProfile {
        oop_score,
        solid_score,
        coding_style: coding_style(language, oop_score).to_string(),
    }
}

pub fn coding_style(language: Language, oop_score: f64) -> &'static str {
    match language {
        Language::C => {
            if oop_score <= 0.0 {
                "Pure Procedural"
            } else if oop_score <= 2.0 {
                "Structured C"
            } else if oop_score <= 4.0 {
                "OOP-Influenced C"
            } else {
                "Advanced OOP-Style C"
            }
        }
        _ => {
            if oop_score <= 0.0 {
                "Procedural/Functional"
            } else if oop_score <= 2.0 {
                "Basic OOP"
            } else if oop_score <= 4.0 {
                "Moderate OOP"
            } else {
                "Advanced OOP"
            }
        }
    }
}

fn point(condition: bool) -> f64 {
    if condition {
        1.0
    } else {
        0.0
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    part as f64 / whole.max(1) as f64
}

#[derive(Clone, Copy, PartialEq)]
enum Size {
    Small,
    Medium,
    Large,
}

impl Size {
    fn of(classes: usize) -> Self {
        match classes {
            0..=2 => Size::Small,
            3..=9 => Size::Medium,
            _ => Size::Large,
        }
    }
}

/// Size-tiered: expectations grow with the number of classes.
fn python_oop(facts: &StructuralFacts) -> f64 {
    let classes = facts.total_classes;
    let size = Size::of(classes);
    let abstractions = facts.abstract_types.len();
    let depth = facts.inheritance_depth;
    let methods = facts.methods.total();
    let overloads = facts.operator_overloads;
    let mut score = point(classes > 0);

    let abstraction_ratio = ratio(abstractions, classes);
    score += match size {
        Size::Small => point(abstractions > 0),
        Size::Medium if abstraction_ratio >= 0.15 => 1.0,
        Size::Medium if abstraction_ratio > 0.0 => 0.5,
        Size::Large if abstraction_ratio >= 0.2 => 1.0,
        Size::Large if abstraction_ratio >= 0.1 => 0.5,
        _ => 0.0,
    };

    score += match size {
        Size::Small => point(depth > 0),
        Size::Medium if depth >= 2 => 1.0,
        Size::Medium if depth > 0 => 0.5,
        Size::Large if depth >= 3 => 1.0,
        Size::Large if depth > 1 => 0.5,
        _ => 0.0,
    };

    if methods > 0 {
        let hidden = ratio(facts.methods.encapsulated(), methods);
        let threshold = match size {
            Size::Small => 0.4,
            Size::Medium => 0.5,
            Size::Large => 0.6,
        };
        if hidden >= threshold {
            score += 1.0;
        } else if hidden > 0.0 {
            score += 0.5;
        }
    }

    let poly_ratio = ratio(overloads, methods);
    match size {
        Size::Small => {
            score += point(overloads > 0);
            // A property alone only guarantees the class point
            if overloads > 0 || facts.properties > 0 {
                score = score.max(1.0);
            }
        }
        Size::Medium => {
            score += if methods > 0 && poly_ratio >= 0.12 {
                1.0
            } else if overloads > 0 {
                0.5
            } else {
                0.0
            };
        }
        Size::Large => {
            score += if methods == 0 {
                if overloads > 0 { 0.5 } else { 0.0 }
            } else if poly_ratio >= 0.18 {
                1.0
            } else if poly_ratio >= 0.08 {
                0.5
            } else {
                0.0
            };
        }
    }

    let advanced = facts.properties.min(1) + usize::from(!facts.design_patterns.is_empty());
    score += match size {
        Size::Small => point(!facts.design_patterns.is_empty() && facts.properties == 0 && overloads == 0),
        _ if advanced >= 2 => 1.0,
        _ if advanced > 0 => 0.5,
        _ => 0.0,
    };

    score.round_ties_even().min(OOP_MAX)
}

fn python_solid(facts: &StructuralFacts) -> f64 {
    let classes = facts.total_classes;
    let size = Size::of(classes);
    let methods = facts.methods.total();
    let abstractions = facts.abstract_types.len();
    let abstraction_ratio = ratio(abstractions, classes);
    let mut score: f64 = 0.0;

    // Single responsibility: methods per class in a sensible band
    if classes > 0 {
        let avg = methods as f64 / classes as f64;
        score += match size {
            Size::Small if (1.0..=20.0).contains(&avg) => 1.0,
            Size::Medium if (3.0..=15.0).contains(&avg) => 1.0,
            Size::Medium if (1.0..=25.0).contains(&avg) => 0.7,
            Size::Large if (4.0..=12.0).contains(&avg) => 1.0,
            Size::Large if (2.0..=18.0).contains(&avg) => 0.7,
            Size::Small if avg > 0.0 => 0.5,
            _ if avg > 0.0 => 0.3,
            _ => 0.0,
        };
    }

    // Open/closed: abstractions to extend against
    score += match size {
        Size::Small => point(abstractions > 0),
        Size::Medium if abstraction_ratio >= 0.18 => 1.0,
        Size::Medium if abstraction_ratio >= 0.1 => 0.7,
        Size::Medium if abstractions > 0 => 0.4,
        Size::Large if abstraction_ratio >= 0.25 => 1.0,
        Size::Large if abstraction_ratio >= 0.15 => 0.7,
        Size::Large if abstractions >= 3 => 0.5,
        Size::Large if abstractions > 0 => 0.3,
        _ => 0.0,
    };

    // Liskov: subclasses that actually refine their bases
    if facts.classes_with_inheritance > 0 {
        let override_ratio = ratio(facts.override_methods, facts.classes_with_inheritance);
        let threshold = match size {
            Size::Small => 0.5,
            Size::Medium => 0.7,
            Size::Large => 1.0,
        };
        score += if override_ratio >= threshold {
            1.0
        } else if facts.override_methods > 0 {
            0.5
        } else {
            0.3
        };
    }

    // Interface segregation
    score += match size {
        Size::Small => point(abstractions > 0),
        Size::Medium if abstractions >= 2 => 1.0,
        Size::Medium if abstractions > 0 => 0.5,
        Size::Large if abstraction_ratio >= 0.3 => 1.0,
        Size::Large if abstraction_ratio >= 0.18 => 0.7,
        Size::Large if abstractions >= 4 => 0.5,
        Size::Large if abstractions > 0 => 0.3,
        _ => 0.0,
    };

    // Dependency inversion: access through properties instead of raw state
    let properties = facts.properties;
    let needed = match size {
        Size::Small => 1,
        Size::Medium => 2,
        Size::Large => 3,
    };
    score += if properties >= needed {
        1.0
    } else if properties > 0 {
        0.5
    } else {
        0.0
    };

    score.min(SOLID_MAX)
}

fn java_oop(facts: &StructuralFacts) -> f64 {
    let hidden = facts.methods.encapsulated() + facts.fields.encapsulated();
    point(facts.total_classes + facts.interface_count > 0)
        + point(!facts.abstract_types.is_empty() || facts.interface_count > 0)
        + point(facts.inheritance_depth > 0 || facts.classes_with_inheritance > 0)
        + point(hidden > 0)
        + point(facts.override_methods > 0 || facts.method_overloads > 0)
        + point(facts.generic_types > 0 || facts.lambdas > 0 || !facts.design_patterns.is_empty())
}

fn java_solid(facts: &StructuralFacts) -> f64 {
    let types = facts.total_classes + facts.interface_count;
    let methods = facts.methods.total();
    let mut score: f64 = 0.0;

    if facts.total_classes > 0 {
        let avg = ratio(methods, facts.total_classes);
        score += if (3.0..=15.0).contains(&avg) {
            1.0
        } else if avg > 0.0 {
            0.5
        } else {
            0.0
        };
    }

    score += if facts.interface_count > 0 && facts.classes_with_inheritance > 0 {
        1.0
    } else if facts.classes_with_inheritance > 0 {
        0.5
    } else {
        0.0
    };

    if facts.classes_with_inheritance > 0 {
        let override_ratio = ratio(facts.override_methods, facts.classes_with_inheritance);
        score += if override_ratio >= 0.5 {
            1.0
        } else if override_ratio > 0.0 {
            0.5
        } else {
            0.0
        };
    }

    score += match facts.interface_count {
        0 => 0.0,
        1 => 0.5,
        _ => 1.0,
    };

    // Interfaces are recorded as abstract types too
    let abstraction_ratio = ratio(facts.abstract_types.len(), types);
    score += if abstraction_ratio >= 0.2 {
        1.0
    } else if abstraction_ratio > 0.0 {
        0.5
    } else {
        0.0
    };

    score.min(SOLID_MAX)
}

fn cpp_oop(facts: &StructuralFacts) -> f64 {
    point(facts.total_classes + facts.struct_count > 0)
        + point(!facts.abstract_types.is_empty())
        + point(facts.inheritance_depth > 0 || facts.classes_with_inheritance > 0)
        + point(facts.methods.encapsulated() + facts.fields.encapsulated() > 0)
        + point(facts.virtual_methods + facts.override_methods + facts.operator_overloads > 0)
        + point(
            facts.generic_types > 0
                || !facts.namespaces.is_empty()
                || !facts.design_patterns.is_empty(),
        )
}

fn cpp_solid(facts: &StructuralFacts) -> f64 {
    let types = facts.total_classes + facts.struct_count;
    let methods = facts.methods.total();
    let abstractions = facts.abstract_types.len();
    let mut score: f64 = 0.0;

    if types > 0 {
        let avg = ratio(methods, types);
        score += if (3.0..=15.0).contains(&avg) {
            1.0
        } else if avg > 0.0 {
            0.5
        } else {
            0.0
        };
    }

    score += if facts.classes_with_inheritance > 0 && facts.virtual_methods > 0 {
        1.0
    } else if facts.classes_with_inheritance > 0 {
        0.5
    } else {
        0.0
    };

    score += if abstractions >= 3 {
        1.0
    } else if abstractions > 0 {
        0.5
    } else {
        0.0
    };

    score += if facts.design_patterns.contains("Strategy") || facts.design_patterns.contains("Factory") {
        1.0
    } else if !facts.design_patterns.is_empty() {
        0.5
    } else {
        0.0
    };

    score += point(facts.generic_types > 0);

    score.min(SOLID_MAX)
}

fn c_oop(facts: &StructuralFacts) -> f64 {
    point(facts.struct_count > 0)
        + point(!facts.opaque_structs().is_empty() || facts.static_functions > 0)
        + point(facts.function_pointer_fields > 0)
        + point(facts.vtable_structs > 0)
        + point(facts.oop_style_functions > 0)
        + point(!facts.design_patterns.is_empty())
}

fn c_solid(facts: &StructuralFacts) -> f64 {
    let mut score: f64 = 0.0;

    // One struct, a handful of functions operating on it
    if facts.struct_count > 0 && facts.total_functions > 0 {
        let avg = ratio(facts.total_functions, facts.struct_count);
        score += if (3.0..=15.0).contains(&avg) { 1.0 } else { 0.5 };
    }

    // Extension through function tables
    score += point(facts.vtable_structs > 0);

    // Substitutable lifetimes: every constructor has a destructor
    let pairs = facts.constructor_destructor_pairs();
    if pairs > 0 {
        score += if pairs >= facts.constructor_bases.len() { 1.0 } else { 0.5 };
    }

    // Narrow headers over wide implementations
    if facts.header_functions > 0 && facts.header_functions < facts.implementation_functions {
        score += 1.0;
    }

    // Callers depend on opaque handles
    score += point(!facts.opaque_structs().is_empty());

    score.min(SOLID_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Visibility;

    #[test]
    fn test_empty_facts_score_zero_everywhere() {
        let facts = StructuralFacts::default();
        for language in Language::ALL {
            let p = profile(language, &facts);
            assert_eq!(p.oop_score, 0.0, "{language} oop should be zero");
            assert_eq!(p.solid_score, 0.0, "{language} solid should be zero");
        }
        assert_eq!(profile(Language::C, &facts).coding_style, "Pure Procedural");
        assert_eq!(profile(Language::Java, &facts).coding_style, "Procedural/Functional");
    }

    #[test]
    fn test_java_full_score() {
        let mut facts = StructuralFacts {
            total_classes: 10,
            interface_count: 5,
            inheritance_depth: 3,
            override_methods: 5,
            generic_types: 3,
            ..Default::default()
        };
        facts.abstract_types.insert("Base".to_string());
        for _ in 0..20 {
            facts.methods.record(Visibility::Private);
        }
        assert_eq!(java_oop(&facts), 6.0);
        let solid = java_solid(&facts);
        assert!((0.0..=SOLID_MAX).contains(&solid));
    }

    #[test]
    fn test_c_full_score() {
        let mut facts = StructuralFacts {
            struct_count: 10,
            static_functions: 20,
            function_pointer_fields: 10,
            vtable_structs: 3,
            oop_style_functions: 25,
            ..Default::default()
        };
        facts.design_patterns.insert("Factory".to_string());
        facts.design_patterns.insert("Strategy".to_string());
        assert_eq!(c_oop(&facts), 6.0);
        assert_eq!(coding_style(Language::C, 6.0), "Advanced OOP-Style C");
    }

    #[test]
    fn test_c_solid_without_lifetimes_or_opaque_handles() {
        let facts = StructuralFacts {
            struct_count: 10,
            total_functions: 100,
            static_functions: 50,
            vtable_structs: 3,
            header_functions: 20,
            implementation_functions: 80,
            ..Default::default()
        };
        assert_eq!(c_solid(&facts), 3.0);
    }

    #[test]
    fn test_cpp_score() {
        let mut facts = StructuralFacts {
            total_classes: 3,
            classes_with_inheritance: 2,
            virtual_methods: 4,
            generic_types: 1,
            ..Default::default()
        };
        facts.abstract_types.insert("Shape".to_string());
        facts.fields.record(Visibility::Private);
        assert_eq!(cpp_oop(&facts), 6.0);
        assert_eq!(profile(Language::Cpp, &facts).coding_style, "Advanced OOP");
    }

    #[test]
    fn test_python_small_project() {
        let mut facts = StructuralFacts {
            total_classes: 2,
            inheritance_depth: 1,
            classes_with_inheritance: 1,
            override_methods: 1,
            properties: 1,
            ..Default::default()
        };
        facts.abstract_types.insert("Animal".to_string());
        facts.methods.record(Visibility::Public);
        facts.methods.record(Visibility::Private);
        let p = profile(Language::Python, &facts);
        assert_eq!(p.oop_score, 4.0);
        assert_eq!(p.solid_score, 5.0);
        assert_eq!(p.coding_style, "Moderate OOP");
    }

    #[test]
    fn test_python_property_does_not_add_polymorphism_point() {
        let mut facts = StructuralFacts {
            total_classes: 2,
            inheritance_depth: 1,
            properties: 1,
            ..Default::default()
        };
        facts.abstract_types.insert("Base".to_string());
        assert_eq!(python_oop(&facts), 3.0, "classes, abstraction, inheritance only");

        facts.operator_overloads = 1;
        assert_eq!(python_oop(&facts), 4.0, "a dunder overload earns the point");
    }

    #[test]
    fn test_python_medium_project() {
        let mut facts = StructuralFacts {
            total_classes: 5,
            inheritance_depth: 1,
            ..Default::default()
        };
        facts.abstract_types.insert("Base".to_string());
        for _ in 0..10 {
            facts.methods.record(Visibility::Public);
        }
        // 1 + 1 + 0.5, and 2.5 rounds half to even
        assert_eq!(python_oop(&facts), 2.0);

        facts.operator_overloads = 2;
        facts.methods.record(Visibility::Public);
        facts.methods.record(Visibility::Public);
        // overload ratio 2/12 clears the 0.12 bar: 3.5 rounds to 4
        assert_eq!(python_oop(&facts), 4.0);
    }

    #[test]
    fn test_python_large_project() {
        let mut facts = StructuralFacts {
            total_classes: 10,
            inheritance_depth: 2,
            operator_overloads: 2,
            properties: 1,
            ..Default::default()
        };
        facts.abstract_types.insert("Base".to_string());
        facts.abstract_types.insert("Plugin".to_string());
        facts.design_patterns.insert("Factory".to_string());
        for _ in 0..10 {
            facts.methods.record(Visibility::Private);
            facts.methods.record(Visibility::Public);
        }
        // 1 + 1 + 0.5 depth + 0.5 encapsulation + 0.5 overloads + 1 advanced = 4.5
        assert_eq!(python_oop(&facts), 4.0);

        // 0.7 each for method spread, abstraction and segregation, 0.5 for one property
        let solid = python_solid(&facts);
        assert!((solid - 2.6).abs() < 1e-9, "got {solid}");
    }

    #[test]
    fn test_scores_never_exceed_maximums() {
        let mut facts = StructuralFacts {
            total_classes: 40,
            interface_count: 20,
            struct_count: 10,
            inheritance_depth: 9,
            classes_with_inheritance: 30,
            virtual_methods: 50,
            override_methods: 50,
            operator_overloads: 50,
            properties: 50,
            generic_types: 10,
            vtable_structs: 10,
            function_pointer_fields: 20,
            oop_style_functions: 10,
            static_functions: 10,
            total_functions: 10,
            ..Default::default()
        };
        facts.design_patterns.insert("Factory".to_string());
        for _ in 0..100 {
            facts.methods.record(Visibility::Private);
        }
        for language in Language::ALL {
            let p = profile(language, &facts);
            assert!(p.oop_score <= OOP_MAX);
            assert!(p.solid_score <= SOLID_MAX);
        }
    }

    #[test]
    fn test_coding_style_bands() {
        assert_eq!(coding_style(Language::Java, 1.0), "Basic OOP");
        assert_eq!(coding_style(Language::Java, 3.0), "Moderate OOP");
        assert_eq!(coding_style(Language::C, 1.0), "Structured C");
        assert_eq!(coding_style(Language::C, 3.0), "OOP-Influenced C");
    }
}
