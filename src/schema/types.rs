use serde::{Deserialize, Deserializer, Serialize};

/// Declared type of a schema field, as produced by the schema generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    Integer,
    Float,
    Boolean,
    Object,

    /// Anything the generator invented that we cannot convert to
    #[serde(other)]
    Unknown,
}

impl DataType {
    /// The scalar type for leaf fields, None for `object` and unknown types
    pub fn scalar(&self) -> Option<ScalarType> {
        match self {
            Self::String => Some(ScalarType::String),
            Self::Integer => Some(ScalarType::Integer),
            Self::Float => Some(ScalarType::Float),
            Self::Boolean => Some(ScalarType::Boolean),
            Self::Object | Self::Unknown => None,
        }
    }
}

impl Default for DataType {
    fn default() -> Self {
        Self::String
    }
}

/// Type of a leaf field's converted value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    String,
    Integer,
    Float,
    Boolean,
}

/// One field of an extraction schema, before compilation
///
/// Descriptors come from the schema generator and are not trusted: selectors
/// may be malformed and `null` is accepted wherever a list or string is
/// expected. Extra keys (such as the legacy `is_mandatory`) are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FieldDescriptor {
    pub name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub primary_selector: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub fallback_selectors: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub data_type: DataType,

    #[serde(default, deserialize_with = "null_as_default")]
    pub nested_fields: Vec<FieldDescriptor>,
}

impl FieldDescriptor {
    /// Creates a scalar descriptor without fallbacks
    pub fn leaf(name: &str, primary_selector: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            primary_selector: primary_selector.to_string(),
            fallback_selectors: Vec::new(),
            data_type,
            nested_fields: Vec::new(),
        }
    }

    /// Adds fallback selectors, tried in order when the primary misses
    pub fn with_fallbacks(mut self, fallbacks: &[&str]) -> Self {
        self.fallback_selectors = fallbacks.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Creates an `object` descriptor scoping its nested fields to one element
    pub fn group(name: &str, primary_selector: &str, nested: Vec<FieldDescriptor>) -> Self {
        Self {
            name: name.to_string(),
            primary_selector: primary_selector.to_string(),
            fallback_selectors: Vec::new(),
            data_type: DataType::Object,
            nested_fields: nested,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// What a compiled rule produces
///
/// A group always has at least one nested rule; the compiler drops groups
/// whose children all failed to compile.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleKind {
    Leaf(ScalarType),
    Group(Vec<ExtractionRule>),
}

/// A compiled extraction rule whose selectors are all known to be valid
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRule {
    name: String,
    primary_selector: String,
    fallback_selectors: Vec<String>,
    kind: RuleKind,
}

impl ExtractionRule {
    /// Creates a leaf rule
    pub fn leaf(
        name: String,
        primary_selector: String,
        fallback_selectors: Vec<String>,
        data_type: ScalarType,
    ) -> Self {
        Self {
            name,
            primary_selector,
            fallback_selectors,
            kind: RuleKind::Leaf(data_type),
        }
    }

    /// Creates a group rule; returns None when `nested` is empty
    pub fn group(
        name: String,
        primary_selector: String,
        fallback_selectors: Vec<String>,
        nested: Vec<ExtractionRule>,
    ) -> Option<Self> {
        if nested.is_empty() {
            return None;
        }

        Some(Self {
            name,
            primary_selector,
            fallback_selectors,
            kind: RuleKind::Group(nested),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn primary_selector(&self) -> &str {
        &self.primary_selector
    }

    pub fn fallback_selectors(&self) -> &[String] {
        &self.fallback_selectors
    }

    pub fn kind(&self) -> &RuleKind {
        &self.kind
    }

    /// Primary selector followed by the fallbacks, in trial order
    pub fn selectors(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary_selector.as_str())
            .chain(self.fallback_selectors.iter().map(String::as_str))
    }

    /// Number of leaf fields in this rule's subtree
    pub fn leaf_count(&self) -> usize {
        match &self.kind {
            RuleKind::Leaf(_) => 1,
            RuleKind::Group(nested) => nested.iter().map(ExtractionRule::leaf_count).sum(),
        }
    }
}

/// The rule tree of one crawl job
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledSchema {
    rules: Vec<ExtractionRule>,
    total_leaf_count: usize,
}

impl CompiledSchema {
    /// Wraps a rule list, counting its leaves
    pub fn new(rules: Vec<ExtractionRule>) -> Self {
        let total_leaf_count = rules.iter().map(ExtractionRule::leaf_count).sum();
        Self {
            rules,
            total_leaf_count,
        }
    }

    pub fn rules(&self) -> &[ExtractionRule] {
        &self.rules
    }

    pub fn total_leaf_count(&self) -> usize {
        self.total_leaf_count
    }

    /// True when no field survived compilation
    pub fn is_empty(&self) -> bool {
        self.total_leaf_count == 0
    }

    /// Every selector string used anywhere in the tree
    pub fn all_selectors(&self) -> Vec<&str> {
        fn walk<'a>(rules: &'a [ExtractionRule], out: &mut Vec<&'a str>) {
            for rule in rules {
                out.extend(rule.selectors());
                if let RuleKind::Group(nested) = rule.kind() {
                    walk(nested, out);
                }
            }
        }

        let mut out = Vec::new();
        walk(&self.rules, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_from_generator_json() {
        let json = r#"{
            "name": "title",
            "primary_selector": "h1.title",
            "fallback_selectors": ["h1"],
            "data_type": "string",
            "nested_fields": null,
            "is_mandatory": true
        }"#;
        let d: FieldDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(d.name, "title");
        assert_eq!(d.fallback_selectors, vec!["h1".to_string()]);
        assert_eq!(d.data_type, DataType::String);
        assert!(d.nested_fields.is_empty());
    }

    #[test]
    fn test_unknown_data_type() {
        let json = r#"{"name": "tags", "primary_selector": ".tag", "data_type": "array"}"#;
        let d: FieldDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(d.data_type, DataType::Unknown);
        assert_eq!(d.data_type.scalar(), None);
    }

    #[test]
    fn test_missing_data_type_defaults_to_string() {
        let json = r#"{"name": "title", "primary_selector": "h1"}"#;
        let d: FieldDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(d.data_type, DataType::String);
    }

    #[test]
    fn test_empty_group_is_unrepresentable() {
        let group = ExtractionRule::group("fees".into(), ".fees".into(), vec![], vec![]);
        assert!(group.is_none());
    }

    #[test]
    fn test_leaf_count_recurses() {
        let nested = vec![
            ExtractionRule::leaf("email".into(), ".email".into(), vec![], ScalarType::String),
            ExtractionRule::leaf("phone".into(), ".phone".into(), vec![], ScalarType::String),
        ];
        let contact =
            ExtractionRule::group("contact".into(), ".contact".into(), vec![], nested).unwrap();
        let title = ExtractionRule::leaf("title".into(), "h1".into(), vec![], ScalarType::String);

        let schema = CompiledSchema::new(vec![title, contact]);
        assert_eq!(schema.total_leaf_count(), 3);
        assert_eq!(
            schema.all_selectors(),
            vec!["h1", ".contact", ".email", ".phone"]
        );
    }

    #[test]
    fn test_selectors_in_trial_order() {
        let rule = ExtractionRule::leaf(
            "title".into(),
            "h1.title".into(),
            vec!["h1".into(), ".heading".into()],
            ScalarType::String,
        );
        let order: Vec<&str> = rule.selectors().collect();
        assert_eq!(order, vec!["h1.title", "h1", ".heading"]);
    }
}
