use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::SbValue;

/// Tag consulted when no struct tag override is configured.
pub const DEFAULT_STRUCT_TAG: &str = "rhai";

/// Alias that removes a field from the converted value.
pub const SKIP_FIELD_ALIAS: &str = "-";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordField {
    pub name: String,
    pub value: SbValue,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

/// A host-side structured value whose field names depend on the active struct tag.
///
/// Each field keeps its own name plus optional per-tag aliases, e.g. a field
/// `Nick` tagged `json:"nick"` shows up as `nick` when the tag is `json` and as
/// `Nick` under any other tag.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    pub type_name: String,
    pub fields: Vec<RecordField>,
}

impl Record {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<SbValue>) -> Self {
        self.fields.push(RecordField {
            name: name.into(),
            value: value.into(),
            tags: BTreeMap::new(),
        });
        self
    }

    pub fn tagged_field(
        mut self,
        name: impl Into<String>,
        value: impl Into<SbValue>,
        tags: &[(&str, &str)],
    ) -> Self {
        self.fields.push(RecordField {
            name: name.into(),
            value: value.into(),
            tags: tags
                .iter()
                .map(|(tag, alias)| (tag.to_string(), alias.to_string()))
                .collect(),
        });
        self
    }

    /// Key used for `field` under `tag`, or `None` when the field is skipped.
    pub fn key_for<'a>(field: &'a RecordField, tag: &str) -> Option<&'a str> {
        match field.tags.get(tag).map(String::as_str) {
            Some(SKIP_FIELD_ALIAS) => None,
            Some(alias) if !alias.is_empty() => Some(alias),
            _ => Some(field.name.as_str()),
        }
    }

    /// Flattens the record into a map keyed by the aliases of `tag`.
    /// Later fields win when two fields collapse onto the same key.
    pub fn to_map(&self, tag: &str) -> BTreeMap<String, SbValue> {
        let mut out = BTreeMap::new();
        for field in &self.fields {
            if let Some(key) = Self::key_for(field, tag) {
                out.insert(key.to_string(), field.value.clone());
            }
        }
        out
    }
}
