//! Works database adapter.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::sync::OnceCell;

use super::client::NotionClient;
use super::full_relation;
use super::schema::{self, DatabaseSchema, PropertyRef};
use crate::config::WorkPropertyOverrides;
use crate::error::StoreError;
use crate::model::{TagId, Work, WorkFilter};
use crate::store::{Result, WorkStore};

const TAG_CANDIDATES: &[&str] = &["タグ", "Tags"];
const DATE_CANDIDATES: &[&str] = &["完成日", "Completed"];
const READY_CANDIDATES: &[&str] = &["整備済み", "整備済", "Ready"];

/// Resolved property names of the works database.
#[derive(Debug, Clone)]
pub struct WorkProperties {
    pub title: Option<PropertyRef>,
    pub tags: PropertyRef,
    pub completed_date: Option<PropertyRef>,
    /// A `checkbox`, or a `formula` evaluating to a boolean.
    pub ready: Option<PropertyRef>,
}

impl WorkProperties {
    pub fn resolve(schema: &DatabaseSchema, overrides: &WorkPropertyOverrides) -> Result<Self> {
        let tags = schema
            .find(overrides.tags.as_deref(), TAG_CANDIDATES, &["relation"])
            .ok_or_else(|| {
                StoreError::Schema("works database has no tag relation property".into())
            })?;

        Ok(Self {
            title: schema.title(),
            tags,
            completed_date: schema.find(
                overrides.completed_date.as_deref(),
                DATE_CANDIDATES,
                &["date"],
            ),
            ready: schema.find(
                overrides.ready.as_deref(),
                READY_CANDIDATES,
                &["checkbox", "formula"],
            ),
        })
    }

    /// Translate `filter` into a database query filter. Criteria that need a
    /// property the database lacks are a schema error rather than ignored.
    pub fn query_filter(&self, filter: &WorkFilter) -> Result<Option<Value>> {
        let mut clauses = Vec::new();

        if filter.from.is_some() || filter.to.is_some() {
            let date = self.completed_date.as_ref().ok_or_else(|| {
                StoreError::Schema("works database has no completed date property".into())
            })?;
            if let Some(from) = filter.from {
                clauses.push(json!({
                    "property": date.name,
                    "date": { "on_or_after": from.format("%Y-%m-%d").to_string() }
                }));
            }
            if let Some(to) = filter.to {
                clauses.push(json!({
                    "property": date.name,
                    "date": { "on_or_before": to.format("%Y-%m-%d").to_string() }
                }));
            }
        }

        if let Some(tag_id) = &filter.tag_id {
            clauses.push(json!({
                "property": self.tags.name,
                "relation": { "contains": tag_id }
            }));
        }

        if filter.unprepared_only {
            let ready = self.ready.as_ref().ok_or_else(|| {
                StoreError::Schema("works database has no ready property".into())
            })?;
            let condition = json!({ "checkbox": { "equals": false } });
            clauses.push(if ready.kind == "formula" {
                json!({ "property": ready.name, "formula": condition })
            } else {
                let mut clause = condition;
                clause["property"] = json!(ready.name);
                clause
            });
        }

        Ok((!clauses.is_empty()).then(|| json!({ "and": clauses })))
    }
}

pub struct NotionWorkStore {
    client: NotionClient,
    database_id: String,
    overrides: WorkPropertyOverrides,
    properties: OnceCell<WorkProperties>,
}

impl NotionWorkStore {
    pub fn new(
        client: NotionClient,
        database_id: impl Into<String>,
        overrides: WorkPropertyOverrides,
    ) -> Self {
        Self {
            client,
            database_id: database_id.into(),
            overrides,
            properties: OnceCell::new(),
        }
    }

    async fn properties(&self) -> Result<&WorkProperties> {
        self.properties
            .get_or_try_init(|| async {
                let schema = self.client.retrieve_database(&self.database_id).await?;
                WorkProperties::resolve(&schema, &self.overrides)
            })
            .await
    }

    async fn parse_page(&self, page: &Value, props: &WorkProperties) -> Result<Work> {
        let id = schema::page_id(page)?;
        let tag_ids = full_relation(&self.client, page, &id, &props.tags).await?;

        Ok(Work {
            title: props
                .title
                .as_ref()
                .map(|prop| schema::title_text(page, &prop.name))
                .unwrap_or_default(),
            completed_date: props
                .completed_date
                .as_ref()
                .and_then(|prop| schema::date_start(page, &prop.name)),
            ready: props
                .ready
                .as_ref()
                .is_some_and(|prop| schema::checkbox(page, &prop.name)),
            tag_ids,
            id,
        })
    }
}

#[async_trait]
impl WorkStore for NotionWorkStore {
    async fn query_works(&self, filter: &WorkFilter) -> Result<Vec<Work>> {
        let props = self.properties().await?;
        let pages = self
            .client
            .query_database(&self.database_id, props.query_filter(filter)?)
            .await?;

        let mut works = Vec::with_capacity(pages.len());
        for page in &pages {
            works.push(self.parse_page(page, props).await?);
        }
        tracing::debug!(works = works.len(), "works loaded");
        Ok(works)
    }

    async fn patch_work_tags(&self, work_id: &str, tag_ids: &[TagId]) -> Result<()> {
        let props = self.properties().await?;
        let relation: Vec<Value> = tag_ids.iter().map(|id| json!({ "id": id })).collect();

        let mut properties = Map::new();
        properties.insert(props.tags.name.clone(), json!({ "relation": relation }));
        self.client
            .update_page(work_id, Value::Object(properties))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn schema(ready_kind: &str) -> DatabaseSchema {
        DatabaseSchema::from_json(&json!({ "properties": {
            "作品名": { "id": "title", "type": "title" },
            "タグ": { "id": "t", "type": "relation" },
            "完成日": { "id": "d", "type": "date" },
            "整備済み": { "id": "r", "type": ready_kind }
        }}))
        .unwrap()
    }

    fn props(ready_kind: &str) -> WorkProperties {
        WorkProperties::resolve(&schema(ready_kind), &WorkPropertyOverrides::default()).unwrap()
    }

    #[test]
    fn empty_filter_queries_everything() {
        assert_eq!(props("checkbox").query_filter(&WorkFilter::default()).unwrap(), None);
    }

    #[test]
    fn filter_clauses_are_anded() {
        let filter = WorkFilter {
            from: NaiveDate::from_ymd_opt(2025, 1, 1),
            to: NaiveDate::from_ymd_opt(2025, 3, 31),
            tag_id: Some("tag-1".into()),
            unprepared_only: true,
        };
        let query = props("checkbox").query_filter(&filter).unwrap().unwrap();
        assert_eq!(
            query,
            json!({ "and": [
                { "property": "完成日", "date": { "on_or_after": "2025-01-01" } },
                { "property": "完成日", "date": { "on_or_before": "2025-03-31" } },
                { "property": "タグ", "relation": { "contains": "tag-1" } },
                { "property": "整備済み", "checkbox": { "equals": false } }
            ]})
        );
    }

    #[test]
    fn formula_ready_flag_nests_the_checkbox_condition() {
        let filter = WorkFilter {
            unprepared_only: true,
            ..Default::default()
        };
        let query = props("formula").query_filter(&filter).unwrap().unwrap();
        assert_eq!(
            query,
            json!({ "and": [
                { "property": "整備済み", "formula": { "checkbox": { "equals": false } } }
            ]})
        );
    }

    #[test]
    fn missing_property_for_a_criterion_is_a_schema_error() {
        let schema = DatabaseSchema::from_json(&json!({ "properties": {
            "Tags": { "id": "t", "type": "relation" }
        }}))
        .unwrap();
        let props = WorkProperties::resolve(&schema, &WorkPropertyOverrides::default()).unwrap();
        let filter = WorkFilter {
            from: NaiveDate::from_ymd_opt(2025, 1, 1),
            ..Default::default()
        };
        assert!(matches!(props.query_filter(&filter), Err(StoreError::Schema(_))));
    }

    #[test]
    fn overrides_take_precedence() {
        let schema = DatabaseSchema::from_json(&json!({ "properties": {
            "タグ": { "id": "t", "type": "relation" },
            "公開可": { "id": "p", "type": "checkbox" },
            "整備済み": { "id": "r", "type": "checkbox" }
        }}))
        .unwrap();
        let overrides = WorkPropertyOverrides {
            ready: Some("公開可".into()),
            ..Default::default()
        };
        let props = WorkProperties::resolve(&schema, &overrides).unwrap();
        assert_eq!(props.ready.unwrap().name, "公開可");
    }

    #[test]
    fn works_database_needs_a_tag_relation() {
        let schema = DatabaseSchema::from_json(&json!({ "properties": {
            "Tags": { "id": "t", "type": "multi_select" }
        }}))
        .unwrap();
        assert!(matches!(
            WorkProperties::resolve(&schema, &WorkPropertyOverrides::default()),
            Err(StoreError::Schema(_))
        ));
    }
}
