//! Schema compilation
//!
//! Turns loosely validated field descriptors into executable extraction rules.

use super::selector::{CssSelectorSyntax, SelectorSyntax};
use super::types::{CompiledSchema, DataType, ExtractionRule, FieldDescriptor};
use std::collections::HashSet;

/// Compiles field descriptors into a rule tree using CSS selector syntax
///
/// See [`compile_with`].
pub fn compile(descriptors: &[FieldDescriptor]) -> CompiledSchema {
    compile_with(descriptors, &CssSelectorSyntax)
}

/// Compiles field descriptors into a rule tree
///
/// Compilation never fails. Fields are dropped when they cannot be used:
/// - fallback selectors with invalid syntax are discarded
/// - an invalid primary selector is replaced by the first valid fallback,
///   and the field is dropped when there is none
/// - fields with an unknown data type are dropped
/// - an `object` field whose nested fields all drop is dropped itself
/// - a repeated name keeps only its first occurrence
///
/// Nested fields on a scalar descriptor are ignored.
pub fn compile_with<S>(descriptors: &[FieldDescriptor], syntax: &S) -> CompiledSchema
where
    S: SelectorSyntax + ?Sized,
{
    let rules = compile_fields(descriptors, syntax);
    let schema = CompiledSchema::new(rules);

    tracing::debug!(
        "Compiled {} descriptors into {} rules ({} leaf fields)",
        descriptors.len(),
        schema.rules().len(),
        schema.total_leaf_count()
    );

    schema
}

fn compile_fields<S>(descriptors: &[FieldDescriptor], syntax: &S) -> Vec<ExtractionRule>
where
    S: SelectorSyntax + ?Sized,
{
    let mut names = HashSet::new();
    let mut rules = Vec::with_capacity(descriptors.len());

    for descriptor in descriptors {
        let Some(rule) = compile_field(descriptor, syntax) else {
            continue;
        };

        if !names.insert(rule.name().to_string()) {
            tracing::debug!("Dropping repeated field '{}'", rule.name());
            continue;
        }

        rules.push(rule);
    }

    rules
}

fn compile_field<S>(descriptor: &FieldDescriptor, syntax: &S) -> Option<ExtractionRule>
where
    S: SelectorSyntax + ?Sized,
{
    let name = descriptor.name.trim();
    if name.is_empty() {
        tracing::debug!("Dropping field without a name");
        return None;
    }

    let mut fallbacks: Vec<String> = descriptor
        .fallback_selectors
        .iter()
        .map(|s| s.trim())
        .filter(|s| {
            let valid = syntax.is_valid(s);
            if !valid {
                tracing::debug!("Field '{}': discarding fallback selector '{}'", name, s);
            }
            valid
        })
        .map(str::to_string)
        .collect();

    let primary = descriptor.primary_selector.trim();
    let primary = if syntax.is_valid(primary) {
        primary.to_string()
    } else if fallbacks.is_empty() {
        tracing::debug!(
            "Dropping field '{}': invalid primary selector '{}' and no usable fallback",
            name,
            primary
        );
        return None;
    } else {
        let promoted = fallbacks.remove(0);
        tracing::debug!(
            "Field '{}': invalid primary selector '{}', using fallback '{}'",
            name,
            primary,
            promoted
        );
        promoted
    };

    match descriptor.data_type {
        DataType::Object => {
            let nested = compile_fields(&descriptor.nested_fields, syntax);
            let group = ExtractionRule::group(name.to_string(), primary, fallbacks, nested);
            if group.is_none() {
                tracing::debug!("Dropping object field '{}': no usable nested fields", name);
            }
            group
        }
        data_type => {
            let Some(scalar) = data_type.scalar() else {
                tracing::debug!("Dropping field '{}': unsupported data type", name);
                return None;
            };
            if !descriptor.nested_fields.is_empty() {
                tracing::debug!(
                    "Field '{}' is scalar, ignoring {} nested fields",
                    name,
                    descriptor.nested_fields.len()
                );
            }
            Some(ExtractionRule::leaf(name.to_string(), primary, fallbacks, scalar))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{RuleKind, ScalarType};

    #[test]
    fn test_compile_valid_leaves() {
        let schema = compile(&[
            FieldDescriptor::leaf("title", "h1", DataType::String),
            FieldDescriptor::leaf("ects", "span.ects", DataType::Integer),
        ]);

        assert_eq!(schema.rules().len(), 2);
        assert_eq!(schema.total_leaf_count(), 2);
        assert_eq!(schema.rules()[1].kind(), &RuleKind::Leaf(ScalarType::Integer));
    }

    #[test]
    fn test_invalid_fallbacks_discarded() {
        let schema = compile(&[FieldDescriptor::leaf("title", "h1.title", DataType::String)
            .with_fallbacks(&["div[[", "h1", ""])]);

        let rule = &schema.rules()[0];
        assert_eq!(rule.primary_selector(), "h1.title");
        assert_eq!(rule.fallback_selectors(), &["h1".to_string()]);
    }

    #[test]
    fn test_invalid_primary_promotes_first_valid_fallback() {
        let schema = compile(&[FieldDescriptor::leaf("title", "h1:contains('x')", DataType::String)
            .with_fallbacks(&[">>", "h1", ".heading"])]);

        let rule = &schema.rules()[0];
        assert_eq!(rule.primary_selector(), "h1");
        assert_eq!(rule.fallback_selectors(), &[".heading".to_string()]);
    }

    #[test]
    fn test_invalid_primary_without_fallback_dropped() {
        let schema = compile(&[
            FieldDescriptor::leaf("title", "div[[", DataType::String),
            FieldDescriptor::leaf("ects", ".ects", DataType::Integer),
        ]);

        assert_eq!(schema.rules().len(), 1);
        assert_eq!(schema.rules()[0].name(), "ects");
    }

    #[test]
    fn test_object_with_no_usable_children_dropped() {
        let schema = compile(&[FieldDescriptor::group(
            "contact",
            ".contact",
            vec![FieldDescriptor::leaf("email", "a[[", DataType::String)],
        )]);

        assert!(schema.is_empty());
        assert!(schema.rules().is_empty());
    }

    #[test]
    fn test_object_keeps_valid_children() {
        let schema = compile(&[FieldDescriptor::group(
            "contact",
            ".contact",
            vec![
                FieldDescriptor::leaf("email", ".email", DataType::String),
                FieldDescriptor::leaf("phone", "))", DataType::String),
            ],
        )]);

        assert_eq!(schema.total_leaf_count(), 1);
        match schema.rules()[0].kind() {
            RuleKind::Group(nested) => {
                assert_eq!(nested.len(), 1);
                assert_eq!(nested[0].name(), "email");
            }
            other => panic!("expected group, got {:?}", other),
        }
    }

    #[test]
    fn test_scalar_ignores_nested_fields() {
        let mut descriptor = FieldDescriptor::leaf("title", "h1", DataType::String);
        descriptor.nested_fields = vec![FieldDescriptor::leaf("x", ".x", DataType::String)];

        let schema = compile(&[descriptor]);
        assert_eq!(schema.total_leaf_count(), 1);
        assert_eq!(schema.rules()[0].kind(), &RuleKind::Leaf(ScalarType::String));
    }

    #[test]
    fn test_unknown_type_and_blank_name_dropped() {
        let schema = compile(&[
            FieldDescriptor::leaf("tags", ".tag", DataType::Unknown),
            FieldDescriptor::leaf("  ", "h1", DataType::String),
        ]);
        assert!(schema.is_empty());
    }

    #[test]
    fn test_repeated_name_keeps_first() {
        let schema = compile(&[
            FieldDescriptor::leaf("title", "h1", DataType::String),
            FieldDescriptor::leaf("title", "h2", DataType::String),
        ]);
        assert_eq!(schema.rules().len(), 1);
        assert_eq!(schema.rules()[0].primary_selector(), "h1");
    }

    #[test]
    fn test_compile_with_custom_syntax() {
        struct OnlyIds;
        impl SelectorSyntax for OnlyIds {
            fn is_valid(&self, selector: &str) -> bool {
                selector.starts_with('#')
            }
        }

        let schema = compile_with(
            &[
                FieldDescriptor::leaf("title", "#title", DataType::String),
                FieldDescriptor::leaf("ects", ".ects", DataType::Integer),
            ],
            &OnlyIds,
        );
        assert_eq!(schema.total_leaf_count(), 1);
    }
}
