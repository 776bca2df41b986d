//! Tags database adapter.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::sync::OnceCell;

use super::client::NotionClient;
use super::full_relation;
use super::schema::{self, DatabaseSchema, PropertyRef};
use crate::config::StatusLabels;
use crate::error::StoreError;
use crate::model::{Tag, TagId, TagStatus};
use crate::store::{Result, TagStore};

const STATUS_CANDIDATES: &[&str] = &["ステータス", "Status"];
const MERGE_CANDIDATES: &[&str] = &["統合先", "Merge To"];
const PARENT_CANDIDATES: &[&str] = &["親タグ", "Parents"];
const CHILD_CANDIDATES: &[&str] = &["子タグ", "Children"];
const ALIAS_CANDIDATES: &[&str] = &["別名", "Aliases"];
const USAGE_CANDIDATES: &[&str] = &["使用数", "Usage Count"];

/// Resolved property names of the tags database. Only the title is required.
#[derive(Debug, Clone)]
pub struct TagProperties {
    pub title: PropertyRef,
    pub status: Option<PropertyRef>,
    pub merge_to: Option<PropertyRef>,
    pub parents: Option<PropertyRef>,
    pub children: Option<PropertyRef>,
    pub aliases: Option<PropertyRef>,
    pub usage_count: Option<PropertyRef>,
}

impl TagProperties {
    pub fn resolve(schema: &DatabaseSchema) -> Result<Self> {
        let title = schema
            .title()
            .ok_or_else(|| StoreError::Schema("tags database has no title property".into()))?;

        Ok(Self {
            title,
            status: schema.find(None, STATUS_CANDIDATES, &["select", "status"]),
            merge_to: schema.find(None, MERGE_CANDIDATES, &["relation", "rich_text"]),
            parents: schema.find(None, PARENT_CANDIDATES, &["relation"]),
            children: schema.find(None, CHILD_CANDIDATES, &["relation"]),
            aliases: schema.find(None, ALIAS_CANDIDATES, &["rich_text", "multi_select"]),
            usage_count: schema.find(None, USAGE_CANDIDATES, &["number", "formula", "rollup"]),
        })
    }
}

/// Map a stored status label onto `TagStatus`. Comparison ignores ASCII
/// case; anything unrecognised (including blank) counts as active.
pub fn parse_status(label: Option<&str>, labels: &StatusLabels) -> TagStatus {
    let Some(label) = label.map(str::trim).filter(|label| !label.is_empty()) else {
        return TagStatus::Active;
    };
    if label.eq_ignore_ascii_case(&labels.merged) {
        TagStatus::Merged
    } else if label.eq_ignore_ascii_case(&labels.hidden) {
        TagStatus::Hidden
    } else {
        TagStatus::Active
    }
}

/// Split a free-text alias field on commas, ideographic commas and newlines.
pub fn split_aliases(text: &str) -> Vec<String> {
    text.split([',', '、', '，', '\n'])
        .map(str::trim)
        .filter(|alias| !alias.is_empty())
        .map(str::to_string)
        .collect()
}

fn aliases(page: &Value, prop: &PropertyRef) -> Vec<String> {
    if prop.kind == "multi_select" {
        return page
            .pointer(&format!("/properties/{}/multi_select", escape_pointer(&prop.name)))
            .and_then(Value::as_array)
            .map(|options| {
                options
                    .iter()
                    .filter_map(|option| option.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
    }
    split_aliases(&schema::rich_text(page, &prop.name))
}

fn escape_pointer(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

pub struct NotionTagStore {
    client: NotionClient,
    database_id: String,
    labels: StatusLabels,
    properties: OnceCell<TagProperties>,
}

impl NotionTagStore {
    pub fn new(client: NotionClient, database_id: impl Into<String>, labels: StatusLabels) -> Self {
        Self {
            client,
            database_id: database_id.into(),
            labels,
            properties: OnceCell::new(),
        }
    }

    async fn properties(&self) -> Result<&TagProperties> {
        self.properties
            .get_or_try_init(|| async {
                let schema = self.client.retrieve_database(&self.database_id).await?;
                TagProperties::resolve(&schema)
            })
            .await
    }

    async fn parse_page(&self, page: &Value, props: &TagProperties) -> Result<Tag> {
        let id = schema::page_id(page)?;
        let status = parse_status(
            props
                .status
                .as_ref()
                .and_then(|prop| schema::option_name(page, &prop.name))
                .as_deref(),
            &self.labels,
        );

        let merge_to = match &props.merge_to {
            Some(prop) if prop.kind == "relation" => {
                schema::relation_ids(page, &prop.name).0.into_iter().next()
            }
            Some(prop) => {
                Some(schema::rich_text(page, &prop.name)).filter(|id| !id.trim().is_empty())
            }
            None => None,
        };

        let parents = match &props.parents {
            Some(prop) => full_relation(&self.client, page, &id, prop).await?,
            None => Vec::new(),
        };
        let children = match &props.children {
            Some(prop) => full_relation(&self.client, page, &id, prop).await?,
            None => Vec::new(),
        };

        Ok(Tag {
            name: schema::title_text(page, &props.title.name).trim().to_string(),
            status,
            merge_to: merge_to.filter(|_| status == TagStatus::Merged),
            parents: parents.into_iter().collect(),
            children: children.into_iter().collect(),
            aliases: props
                .aliases
                .as_ref()
                .map(|prop| aliases(page, prop))
                .unwrap_or_default(),
            usage_count: props
                .usage_count
                .as_ref()
                .and_then(|prop| schema::number(page, &prop.name))
                .map(|n| n.max(0.0) as u64)
                .unwrap_or(0),
            id,
        })
    }
}

#[async_trait]
impl TagStore for NotionTagStore {
    async fn load_all_tags(&self) -> Result<Vec<Tag>> {
        let props = self.properties().await?;
        let pages = self.client.query_database(&self.database_id, None).await?;

        let mut tags = Vec::with_capacity(pages.len());
        for page in &pages {
            tags.push(self.parse_page(page, props).await?);
        }
        tracing::debug!(tags = tags.len(), "tags loaded");
        Ok(tags)
    }

    fn default_active_status(&self) -> &str {
        &self.labels.active
    }

    async fn create_tag(&self, name: &str) -> Result<TagId> {
        let props = self.properties().await?;

        let mut properties = Map::new();
        properties.insert(
            props.title.name.clone(),
            json!({ "title": [{ "text": { "content": name } }] }),
        );
        if let Some(status) = &props.status {
            let mut value = Map::new();
            value.insert(
                status.kind.clone(),
                json!({ "name": self.default_active_status() }),
            );
            properties.insert(status.name.clone(), Value::Object(value));
        }

        let id = self
            .client
            .create_page(&self.database_id, Value::Object(properties))
            .await?;
        tracing::info!(tag_id = %id, name, "tag created");
        Ok(id)
    }
}
