use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::types::VisibilityCounts;

/// Normalized structural facts for one file, or for a whole project after
/// aggregation. Every language extractor produces this same shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuralFacts {
    // Class-like types
    pub total_classes: usize,
    pub interface_count: usize,
    pub struct_count: usize,
    pub enum_count: usize,
    pub abstract_types: BTreeSet<String>,
    pub type_names: BTreeSet<String>,
    pub nested_classes: usize,
    pub anonymous_classes: usize,

    // Inheritance
    pub classes_with_inheritance: usize,
    pub inheritance: BTreeMap<String, BTreeSet<String>>,
    pub inheritance_depth: usize,

    // Encapsulation
    pub methods: VisibilityCounts,
    pub fields: VisibilityCounts,
    pub properties: usize,
    pub getter_setter_pairs: usize,

    // Polymorphism
    pub virtual_methods: usize,
    pub override_methods: usize,
    pub operator_overloads: usize,
    pub method_overloads: usize,

    // Language features
    pub generic_types: usize,
    pub generic_instantiations: usize,
    pub lambdas: usize,
    pub namespaces: BTreeSet<String>,
    pub annotations: BTreeMap<String, usize>,
    pub singleton_accessors: usize,
    pub function_names: BTreeSet<String>,

    // Manual-memory signals
    pub total_functions: usize,
    pub static_functions: usize,
    pub header_functions: usize,
    pub implementation_functions: usize,
    pub function_pointer_fields: usize,
    pub callback_fields: usize,
    pub vtable_structs: usize,
    pub typedefs: usize,
    pub oop_style_functions: usize,
    pub malloc_calls: usize,
    pub free_calls: usize,
    pub constructor_bases: BTreeSet<String>,
    pub destructor_bases: BTreeSet<String>,
    pub forward_declared_structs: BTreeSet<String>,
    pub header_defined_structs: BTreeSet<String>,
    pub implementation_defined_structs: BTreeSet<String>,

    pub design_patterns: BTreeSet<String>,

    pub files_analyzed: usize,
    pub files_failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StructuralFacts {
    /// Zeroed facts for a file that could not be analyzed.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            files_failed: 1,
            error: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Total class-like declarations of any kind.
    pub fn type_count(&self) -> usize {
        self.total_classes + self.interface_count + self.struct_count + self.enum_count
    }

    pub fn add_edge(&mut self, parent: impl Into<String>, child: impl Into<String>) {
        self.inheritance
            .entry(parent.into())
            .or_default()
            .insert(child.into());
    }

    pub fn record_annotation(&mut self, name: impl Into<String>) {
        *self.annotations.entry(name.into()).or_insert(0) += 1;
    }

    pub fn has_annotation(&self, name: &str) -> bool {
        self.annotations.get(name).is_some_and(|n| *n > 0)
    }

    /// Structs forward-declared in a header and completed only in an
    /// implementation file.
    pub fn opaque_structs(&self) -> BTreeSet<&str> {
        self.forward_declared_structs
            .intersection(&self.implementation_defined_structs)
            .filter(|name| !self.header_defined_structs.contains(*name))
            .map(String::as_str)
            .collect()
    }

    /// `Type_create`/`Type_destroy` style pairs sharing a base name.
    pub fn constructor_destructor_pairs(&self) -> usize {
        self.constructor_bases
            .intersection(&self.destructor_bases)
            .count()
    }

    /// Share of functions with file (static) scope, as a percentage.
    pub fn encapsulation_ratio(&self) -> f64 {
        if self.total_functions == 0 {
            return 0.0;
        }
        self.static_functions as f64 / self.total_functions as f64 * 100.0
    }

    /// 0-10 rating of allocation discipline: balanced malloc/free counts and
    /// paired constructor/destructor functions.
    pub fn memory_safety_score(&self) -> f64 {
        if self.malloc_calls == 0 && self.free_calls == 0 {
            return if self.constructor_destructor_pairs() > 0 { 10.0 } else { 5.0 };
        }
        let balance = if self.malloc_calls == 0 {
            1.0
        } else {
            (self.free_calls as f64 / self.malloc_calls as f64).min(1.0)
        };
        let pairing: f64 = if self.constructor_destructor_pairs() > 0 { 1.0 } else { 0.0 };
        (balance * 7.0 + pairing * 3.0).clamp(0.0, 10.0)
    }

    /// Fold `other` into `self`. Counts add, sets union, depth takes the max.
    /// The operation is commutative and associative, so per-file facts can be
    /// produced in any order.
    pub fn merge(&mut self, other: &StructuralFacts) {
        self.total_classes += other.total_classes;
        self.interface_count += other.interface_count;
        self.struct_count += other.struct_count;
        self.enum_count += other.enum_count;
        self.abstract_types.extend(other.abstract_types.iter().cloned());
        self.type_names.extend(other.type_names.iter().cloned());
        self.nested_classes += other.nested_classes;
        self.anonymous_classes += other.anonymous_classes;

        self.classes_with_inheritance += other.classes_with_inheritance;
        for (parent, children) in &other.inheritance {
            self.inheritance
                .entry(parent.clone())
                .or_default()
                .extend(children.iter().cloned());
        }
        self.inheritance_depth = self.inheritance_depth.max(other.inheritance_depth);

        self.methods.merge(&other.methods);
        self.fields.merge(&other.fields);
        self.properties += other.properties;
        self.getter_setter_pairs += other.getter_setter_pairs;

        self.virtual_methods += other.virtual_methods;
        self.override_methods += other.override_methods;
        self.operator_overloads += other.operator_overloads;
        self.method_overloads += other.method_overloads;

        self.generic_types += other.generic_types;
        self.generic_instantiations += other.generic_instantiations;
        self.lambdas += other.lambdas;
        self.namespaces.extend(other.namespaces.iter().cloned());
        for (name, count) in &other.annotations {
            *self.annotations.entry(name.clone()).or_insert(0) += count;
        }
        self.singleton_accessors += other.singleton_accessors;
        self.function_names.extend(other.function_names.iter().cloned());

        self.total_functions += other.total_functions;
        self.static_functions += other.static_functions;
        self.header_functions += other.header_functions;
        self.implementation_functions += other.implementation_functions;
        self.function_pointer_fields += other.function_pointer_fields;
        self.callback_fields += other.callback_fields;
        self.vtable_structs += other.vtable_structs;
        self.typedefs += other.typedefs;
        self.oop_style_functions += other.oop_style_functions;
        self.malloc_calls += other.malloc_calls;
        self.free_calls += other.free_calls;
        self.constructor_bases.extend(other.constructor_bases.iter().cloned());
        self.destructor_bases.extend(other.destructor_bases.iter().cloned());
        self.forward_declared_structs
            .extend(other.forward_declared_structs.iter().cloned());
        self.header_defined_structs
            .extend(other.header_defined_structs.iter().cloned());
        self.implementation_defined_structs
            .extend(other.implementation_defined_structs.iter().cloned());

        self.design_patterns.extend(other.design_patterns.iter().cloned());

        self.files_analyzed += other.files_analyzed;
        self.files_failed += other.files_failed;
    }
}

/// Fold per-file facts into one project record. Failed records only bump
/// `files_failed`; their (zeroed) counts never reach the aggregate.
pub fn aggregate<'a, I>(facts: I) -> StructuralFacts
where
    I: IntoIterator<Item = &'a StructuralFacts>,
{
    facts
        .into_iter()
        .fold(StructuralFacts::default(), |mut acc, file| {
            if file.is_failed() {
                acc.files_failed += file.files_failed.max(1);
            } else {
                acc.merge(file);
            }
            acc
        })
}
