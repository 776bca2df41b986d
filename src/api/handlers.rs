//! Admin handlers.
//!
//! GET  /health             - liveness
//! POST /api/tags/recalc    - dry-run or apply a recalculation
//! GET  /api/tags/lint      - tag graph diagnostics
//! POST /api/tags           - find or create a tag by name

use std::sync::Arc;

use axum::{body::Bytes, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::error::AppError;
use crate::config::RecalcDefaults;
use crate::error::RecalcError;
use crate::model::{TagId, WorkFilter};
use crate::recalc::{
    parse_date, LintReport, RecalcEngine, RecalcMode, RecalcOptions, RecalcReport,
};
use crate::store::StoreProvider;
use crate::tag_ops;

/// Body of `POST /api/tags/recalc`. Every field is optional; an empty body
/// is a dry run over all works.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecalcRequest {
    pub apply: bool,
    pub dry_run: Option<bool>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub tag_id: Option<String>,
    pub unprepared_only: bool,
    pub max_updates: Option<usize>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl RecalcRequest {
    pub fn into_options(self) -> Result<RecalcOptions, RecalcError> {
        if self.apply && self.dry_run == Some(true) {
            return Err(RecalcError::InvalidRequest(
                "apply and dryRun are mutually exclusive".into(),
            ));
        }

        let filter = WorkFilter {
            from: non_blank(self.from)
                .map(|value| parse_date("from", &value))
                .transpose()?,
            to: non_blank(self.to)
                .map(|value| parse_date("to", &value))
                .transpose()?,
            tag_id: non_blank(self.tag_id),
            unprepared_only: self.unprepared_only,
        };

        Ok(RecalcOptions {
            mode: if self.apply {
                RecalcMode::Apply
            } else {
                RecalcMode::DryRun
            },
            filter,
            max_updates: self.max_updates,
        })
    }
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn recalc(
    Extension(stores): Extension<Arc<dyn StoreProvider>>,
    Extension(defaults): Extension<RecalcDefaults>,
    body: Bytes,
) -> Result<(StatusCode, Json<RecalcReport>), AppError> {
    let request: RecalcRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RecalcRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| RecalcError::InvalidRequest(format!("malformed body: {e}")))?
    };
    let options = request.into_options()?;

    let report = RecalcEngine::from_provider(stores.as_ref())
        .with_defaults(defaults)
        .run(&options)
        .await?;

    let status = if report.succeeded() {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    Ok((status, Json(report)))
}

pub async fn lint(
    Extension(stores): Extension<Arc<dyn StoreProvider>>,
) -> Result<Json<LintReport>, AppError> {
    let report = RecalcEngine::from_provider(stores.as_ref()).lint().await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct CreateTagRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CreateTagResponse {
    pub id: TagId,
    pub created: bool,
}

pub async fn create_tag(
    Extension(stores): Extension<Arc<dyn StoreProvider>>,
    body: Bytes,
) -> Result<(StatusCode, Json<CreateTagResponse>), AppError> {
    let request: CreateTagRequest = serde_json::from_slice(&body)
        .map_err(|e| RecalcError::InvalidRequest(format!("malformed body: {e}")))?;

    let store = stores.tag_store();
    let (id, created) = tag_ops::find_or_create_tag(store.as_ref(), &request.name).await?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(CreateTagResponse { id, created })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn request(body: &str) -> RecalcRequest {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn empty_object_is_a_dry_run() {
        let options = request("{}").into_options().unwrap();
        assert_eq!(options, RecalcOptions::dry_run());
    }

    #[test]
    fn full_request_maps_to_options() {
        let options = request(
            r#"{"apply":true,"from":"2025-01-01","to":"2025-06-30","tagId":"t1",
                "unpreparedOnly":true,"maxUpdates":40}"#,
        )
        .into_options()
        .unwrap();
        assert_eq!(options.mode, RecalcMode::Apply);
        assert_eq!(options.filter.from, NaiveDate::from_ymd_opt(2025, 1, 1));
        assert_eq!(options.filter.to, NaiveDate::from_ymd_opt(2025, 6, 30));
        assert_eq!(options.filter.tag_id.as_deref(), Some("t1"));
        assert!(options.filter.unprepared_only);
        assert_eq!(options.max_updates, Some(40));
    }

    #[test]
    fn conflicting_modes_are_rejected() {
        let err = request(r#"{"apply":true,"dryRun":true}"#)
            .into_options()
            .unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn blank_fields_are_ignored_and_bad_dates_rejected() {
        let options = request(r#"{"from":"","tagId":"  "}"#).into_options().unwrap();
        assert!(options.filter.is_empty());
        assert!(request(r#"{"to":"June"}"#).into_options().is_err());
    }
}
