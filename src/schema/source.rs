use super::types::{DataType, FieldDescriptor};
use super::{SchemaError, SchemaResult};
use serde::Deserialize;
use std::future::Future;
use std::path::{Path, PathBuf};

/// Produces the field descriptors used for one crawl job
///
/// A source may look at a sample course page (for example a model that
/// writes selectors from the page's markup), or ignore it and read a
/// prepared schema.
pub trait SchemaSource {
    /// Whether [`SchemaSource::generate`] makes use of the page content
    const WANTS_PAGE_CONTENT: bool = false;

    fn generate(
        &self,
        page_content: &str,
        target_fields: &[String],
    ) -> impl Future<Output = SchemaResult<Vec<FieldDescriptor>>> + Send;
}

/// A schema document read from a JSON file
#[derive(Debug, Clone)]
pub struct JsonSchemaSource {
    path: PathBuf,
}

impl JsonSchemaSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the document and keeps only the requested fields
    ///
    /// An empty `target_fields` keeps every field.
    pub fn load(&self, target_fields: &[String]) -> SchemaResult<Vec<FieldDescriptor>> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| SchemaError::Read {
            path: self.path.display().to_string(),
            source: e,
        })?;

        let descriptors = parse_schema_document(&content)?;
        if target_fields.is_empty() {
            return Ok(descriptors);
        }

        Ok(select_fields(descriptors, &group_target_fields(target_fields)))
    }
}

impl SchemaSource for JsonSchemaSource {
    fn generate(
        &self,
        _page_content: &str,
        target_fields: &[String],
    ) -> impl Future<Output = SchemaResult<Vec<FieldDescriptor>>> + Send {
        std::future::ready(self.load(target_fields))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SchemaDocument {
    Wrapped { fields: Vec<FieldDescriptor> },
    Bare(Vec<FieldDescriptor>),
}

/// Parses a schema document
///
/// Accepts either a bare JSON array of field descriptors or an object with a
/// `fields` array.
pub fn parse_schema_document(json: &str) -> SchemaResult<Vec<FieldDescriptor>> {
    let document: SchemaDocument = serde_json::from_str(json)?;
    Ok(match document {
        SchemaDocument::Wrapped { fields } => fields,
        SchemaDocument::Bare(fields) => fields,
    })
}

/// A requested field, possibly with requested sub-fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetField {
    pub name: String,
    pub children: Vec<TargetField>,
}

/// Groups dot-separated target names into a tree
///
/// `["title", "contact.email", "contact.phone"]` becomes `title` and
/// `contact { email, phone }`, in first-seen order.
pub fn group_target_fields(names: &[String]) -> Vec<TargetField> {
    let mut roots: Vec<TargetField> = Vec::new();

    for name in names {
        let mut level = &mut roots;
        for part in name.split('.').map(str::trim).filter(|p| !p.is_empty()) {
            let index = match level.iter().position(|t| t.name == part) {
                Some(index) => index,
                None => {
                    level.push(TargetField {
                        name: part.to_string(),
                        children: Vec::new(),
                    });
                    level.len() - 1
                }
            };
            level = &mut level[index].children;
        }
    }

    roots
}

/// Keeps the descriptors named by `targets`, in target order
///
/// An object target with children keeps only the named nested fields; an
/// object target without children keeps all of them.
fn select_fields(descriptors: Vec<FieldDescriptor>, targets: &[TargetField]) -> Vec<FieldDescriptor> {
    let mut selected = Vec::with_capacity(targets.len());

    for target in targets {
        let Some(descriptor) = descriptors.iter().find(|d| d.name.trim() == target.name) else {
            tracing::debug!("Schema has no field named '{}'", target.name);
            continue;
        };

        let mut descriptor = descriptor.clone();
        if descriptor.data_type == DataType::Object && !target.children.is_empty() {
            descriptor.nested_fields =
                select_fields(std::mem::take(&mut descriptor.nested_fields), &target.children);
        }
        selected.push(descriptor);
    }

    selected
}
