//! Thin Notion REST client.
//!
//! Only the four calls the adapters need: database schema, paginated
//! database query, paginated relation property, and page create/update.

use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};

use super::schema::DatabaseSchema;
use crate::config::NotionConfig;
use crate::error::StoreError;

const PAGE_SIZE: u32 = 100;

#[derive(Clone)]
pub struct NotionClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
    api_version: String,
}

#[derive(Deserialize)]
struct ListPage {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

impl NotionClient {
    pub fn new(config: &NotionConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: config.api_base.clone(),
            token: config.token.clone(),
            api_version: config.api_version.clone(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/{}", self.api_base, path))
            .bearer_auth(&self.token)
            .header("Notion-Version", &self.api_version)
    }

    async fn send(&self, request: RequestBuilder, resource: &str) -> Result<Value, StoreError> {
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                resource: resource.to_string(),
                status,
                body,
            });
        }

        Ok(response.json().await?)
    }

    pub async fn retrieve_database(&self, database_id: &str) -> Result<DatabaseSchema, StoreError> {
        let path = format!("databases/{database_id}");
        let body = self.send(self.request(Method::GET, &path), &path).await?;
        DatabaseSchema::from_json(&body)
    }

    /// Every page of a database query, following `next_cursor` until
    /// `has_more` is false. Pages are fetched one after another.
    pub async fn query_database(
        &self,
        database_id: &str,
        filter: Option<Value>,
    ) -> Result<Vec<Value>, StoreError> {
        let path = format!("databases/{database_id}/query");
        let mut results = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({ "page_size": PAGE_SIZE });
            if let Some(filter) = &filter {
                body["filter"] = filter.clone();
            }
            if let Some(cursor) = &cursor {
                body["start_cursor"] = json!(cursor);
            }

            let page: ListPage = serde_json::from_value(
                self.send(self.request(Method::POST, &path).json(&body), &path)
                    .await?,
            )?;
            results.extend(page.results);

            match (page.has_more, page.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        tracing::debug!(database_id, pages = results.len(), "database query drained");
        Ok(results)
    }

    /// All related page ids of a relation property, for pages whose inline
    /// relation list was truncated.
    pub async fn relation_property(
        &self,
        page_id: &str,
        property_id: &str,
    ) -> Result<Vec<String>, StoreError> {
        let path = format!("pages/{page_id}/properties/{property_id}");
        let mut ids = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut request = self
                .request(Method::GET, &path)
                .query(&[("page_size", PAGE_SIZE.to_string())]);
            if let Some(cursor) = &cursor {
                request = request.query(&[("start_cursor", cursor)]);
            }

            let page: ListPage = serde_json::from_value(self.send(request, &path).await?)?;
            ids.extend(page.results.iter().filter_map(|item| {
                item.pointer("/relation/id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            }));

            match (page.has_more, page.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        Ok(ids)
    }

    pub async fn update_page(&self, page_id: &str, properties: Value) -> Result<(), StoreError> {
        let path = format!("pages/{page_id}");
        self.send(
            self.request(Method::PATCH, &path)
                .json(&json!({ "properties": properties })),
            &path,
        )
        .await?;
        Ok(())
    }

    /// Create a page in `database_id` and return the new page id.
    pub async fn create_page(
        &self,
        database_id: &str,
        properties: Value,
    ) -> Result<String, StoreError> {
        let body = self
            .send(
                self.request(Method::POST, "pages").json(&json!({
                    "parent": { "database_id": database_id },
                    "properties": properties,
                })),
                "pages",
            )
            .await?;

        body.get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| StoreError::Decode("created page has no id".into()))
    }
}
