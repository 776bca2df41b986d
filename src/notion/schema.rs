//! Database schema discovery and property value extraction.
//!
//! Property names differ between databases (and languages), so each logical
//! field is located by trying an override first, then a list of candidate
//! names, checking the property type each time.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde_json::Value;

use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySchema {
    pub id: String,
    pub kind: String,
}

/// Property name -> schema, from `GET /databases/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseSchema {
    properties: BTreeMap<String, PropertySchema>,
}

/// A resolved property: its name (for filters and writes), id (for the
/// property item endpoint) and type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyRef {
    pub name: String,
    pub id: String,
    pub kind: String,
}

impl DatabaseSchema {
    pub fn from_json(body: &Value) -> Result<Self, StoreError> {
        let properties = body
            .get("properties")
            .and_then(Value::as_object)
            .ok_or_else(|| StoreError::Decode("database has no properties object".into()))?;

        Ok(Self {
            properties: properties
                .iter()
                .map(|(name, prop)| {
                    let schema = PropertySchema {
                        id: prop
                            .get("id")
                            .and_then(Value::as_str)
                            .unwrap_or(name)
                            .to_string(),
                        kind: prop
                            .get("type")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                    };
                    (name.clone(), schema)
                })
                .collect(),
        })
    }

    /// First of `override_name` then `candidates` that exists with one of `kinds`.
    pub fn find(
        &self,
        override_name: Option<&str>,
        candidates: &[&str],
        kinds: &[&str],
    ) -> Option<PropertyRef> {
        override_name
            .into_iter()
            .chain(candidates.iter().copied())
            .find_map(|name| {
                let schema = self.properties.get(name)?;
                kinds.contains(&schema.kind.as_str()).then(|| PropertyRef {
                    name: name.to_string(),
                    id: schema.id.clone(),
                    kind: schema.kind.clone(),
                })
            })
    }

    /// The single `title` property of the database.
    pub fn title(&self) -> Option<PropertyRef> {
        self.properties
            .iter()
            .find(|(_, schema)| schema.kind == "title")
            .map(|(name, schema)| PropertyRef {
                name: name.clone(),
                id: schema.id.clone(),
                kind: schema.kind.clone(),
            })
    }
}

// ── Value extraction ─────────────────────────────────────────

fn property<'a>(page: &'a Value, name: &str) -> Option<&'a Value> {
    page.get("properties")?.get(name)
}

fn plain_text(items: &Value) -> String {
    items
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("plain_text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}

pub fn page_id(page: &Value) -> Result<String, StoreError> {
    page.get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| StoreError::Decode("page without id".into()))
}

pub fn title_text(page: &Value, name: &str) -> String {
    property(page, name)
        .and_then(|prop| prop.get("title"))
        .map(plain_text)
        .unwrap_or_default()
}

pub fn rich_text(page: &Value, name: &str) -> String {
    property(page, name)
        .and_then(|prop| prop.get("rich_text"))
        .map(plain_text)
        .unwrap_or_default()
}

/// Related page ids and whether the inline list was truncated.
pub fn relation_ids(page: &Value, name: &str) -> (Vec<String>, bool) {
    let Some(prop) = property(page, name) else {
        return (Vec::new(), false);
    };
    let ids = prop
        .get("relation")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("id").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let has_more = prop
        .get("has_more")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    (ids, has_more)
}

/// Option name of a `select` or `status` property.
pub fn option_name(page: &Value, name: &str) -> Option<String> {
    let prop = property(page, name)?;
    ["select", "status"]
        .iter()
        .find_map(|kind| prop.get(kind)?.get("name")?.as_str())
        .map(str::to_string)
}

/// Start date of a `date` property. Date-times keep only the date part.
pub fn date_start(page: &Value, name: &str) -> Option<NaiveDate> {
    let start = property(page, name)?.get("date")?.get("start")?.as_str()?;
    NaiveDate::parse_from_str(start.get(..10)?, "%Y-%m-%d").ok()
}

/// A `checkbox` property, or a `formula` property producing a boolean.
pub fn checkbox(page: &Value, name: &str) -> bool {
    let Some(prop) = property(page, name) else {
        return false;
    };
    prop.get("checkbox")
        .and_then(Value::as_bool)
        .or_else(|| prop.pointer("/formula/boolean").and_then(Value::as_bool))
        .unwrap_or(false)
}

/// A `number`, numeric `formula` or numeric `rollup` property.
pub fn number(page: &Value, name: &str) -> Option<f64> {
    let prop = property(page, name)?;
    prop.get("number")
        .and_then(Value::as_f64)
        .or_else(|| prop.pointer("/formula/number").and_then(Value::as_f64))
        .or_else(|| prop.pointer("/rollup/number").and_then(Value::as_f64))
}
