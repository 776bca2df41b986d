//! Recalculation engine.
//!
//! One run: load tags and candidate works concurrently, build the tag graph,
//! diff every work against its normalized tag set, then either report
//! (dry run) or patch works one at a time up to the update cap.

pub mod diff;

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::RecalcDefaults;
use crate::error::RecalcError;
use crate::model::{WorkFilter, WorkId};
use crate::store::{StoreProvider, TagStore, WorkStore};
use crate::tag_graph::{GraphDiagnostics, TagGraph};

pub use diff::{compute_change, normalize_tag_set, plan_changes, Change};

/// Upper bound for a per-call `max_updates`.
pub const MAX_UPDATES_LIMIT: usize = 1000;
/// Changes included in a report.
pub const SAMPLE_LIMIT: usize = 10;
/// Examples spelled out per warning category.
pub const WARNING_DETAIL_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecalcMode {
    #[default]
    DryRun,
    Apply,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecalcOptions {
    pub mode: RecalcMode,
    pub filter: WorkFilter,
    /// Per-call cap on writes. Clamped to `1..=MAX_UPDATES_LIMIT`.
    pub max_updates: Option<usize>,
}

impl RecalcOptions {
    pub fn dry_run() -> Self {
        Self::default()
    }

    pub fn apply() -> Self {
        Self {
            mode: RecalcMode::Apply,
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, filter: WorkFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_max_updates(mut self, max_updates: usize) -> Self {
        self.max_updates = Some(max_updates);
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.mode == RecalcMode::DryRun
    }

    pub fn validate(&self) -> Result<(), RecalcError> {
        if let (Some(from), Some(to)) = (self.filter.from, self.filter.to) {
            if from > to {
                return Err(RecalcError::InvalidRequest(format!(
                    "from ({from}) is after to ({to})"
                )));
            }
        }
        if self
            .filter
            .tag_id
            .as_deref()
            .is_some_and(|id| id.trim().is_empty())
        {
            return Err(RecalcError::InvalidRequest("tagId is blank".into()));
        }
        Ok(())
    }

    pub fn effective_max_updates(&self, default: usize) -> usize {
        self.max_updates
            .unwrap_or(default)
            .clamp(1, MAX_UPDATES_LIMIT)
    }
}

/// Parse a `YYYY-MM-DD` request field.
pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate, RecalcError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        RecalcError::InvalidRequest(format!("{field} must be YYYY-MM-DD, got {value:?}"))
    })
}

/// The write that stopped an apply run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyFailure {
    pub work_id: WorkId,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecalcReport {
    pub dry_run: bool,
    pub scanned: usize,
    pub changed: usize,
    pub updated: usize,
    /// `changed - updated`; re-run until it reaches zero.
    pub remaining: usize,
    pub warnings: Vec<String>,
    /// Parent cycles found in the tag graph.
    pub cycles: usize,
    pub samples: Vec<Change>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ApplyFailure>,
}

impl RecalcReport {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

/// Graph health without touching works.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LintReport {
    pub tags: usize,
    pub redirects: usize,
    pub warnings: Vec<String>,
    pub diagnostics: GraphDiagnostics,
}

pub struct RecalcEngine {
    tags: Arc<dyn TagStore>,
    works: Arc<dyn WorkStore>,
    defaults: RecalcDefaults,
}

impl RecalcEngine {
    pub fn new(tags: Arc<dyn TagStore>, works: Arc<dyn WorkStore>) -> Self {
        Self {
            tags,
            works,
            defaults: RecalcDefaults::default(),
        }
    }

    pub fn from_provider(provider: &dyn StoreProvider) -> Self {
        Self::new(provider.tag_store(), provider.work_store())
    }

    pub fn with_defaults(mut self, defaults: RecalcDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_pace(mut self, pace: Duration) -> Self {
        self.defaults.pace = pace;
        self
    }

    async fn load_graph(&self) -> Result<TagGraph, RecalcError> {
        let tags = self
            .tags
            .load_all_tags()
            .await
            .map_err(|source| RecalcError::StoreRead {
                resource: "tags",
                source,
            })?;
        Ok(TagGraph::build(tags))
    }

    pub async fn run(&self, options: &RecalcOptions) -> Result<RecalcReport, RecalcError> {
        options.validate()?;

        let (graph, works) = tokio::join!(
            self.load_graph(),
            self.works.query_works(&options.filter)
        );
        let graph = graph?;
        let works = works.map_err(|source| RecalcError::StoreRead {
            resource: "works",
            source,
        })?;

        let diagnostics = graph.diagnostics();
        let warnings = diagnostics.warnings(&graph, WARNING_DETAIL_LIMIT);
        for warning in &warnings {
            tracing::warn!("{warning}");
        }

        let changes = plan_changes(&graph, &works);
        tracing::info!(
            tags = graph.len(),
            scanned = works.len(),
            changed = changes.len(),
            dry_run = options.is_dry_run(),
            "recalculation planned"
        );

        let mut report = RecalcReport {
            dry_run: options.is_dry_run(),
            scanned: works.len(),
            changed: changes.len(),
            cycles: diagnostics.parent_cycles.len(),
            warnings,
            samples: changes.iter().take(SAMPLE_LIMIT).cloned().collect(),
            ..RecalcReport::default()
        };

        if options.mode == RecalcMode::Apply {
            let cap = options.effective_max_updates(self.defaults.max_updates);
            self.apply(&changes[..changes.len().min(cap)], &mut report)
                .await;
        }

        report.remaining = report.changed - report.updated;
        Ok(report)
    }

    /// Write `changes` in order, pacing every write after the first. Stops
    /// at the first failure; earlier writes stand.
    async fn apply(&self, changes: &[Change], report: &mut RecalcReport) {
        for (index, change) in changes.iter().enumerate() {
            if index > 0 && !self.defaults.pace.is_zero() {
                tokio::time::sleep(self.defaults.pace).await;
            }

            match self
                .works
                .patch_work_tags(&change.work_id, &change.after)
                .await
            {
                Ok(()) => {
                    report.updated += 1;
                    tracing::debug!(
                        work_id = %change.work_id,
                        tags = change.after.len(),
                        "work updated"
                    );
                }
                Err(err) => {
                    tracing::error!(
                        work_id = %change.work_id,
                        updated = report.updated,
                        error = %err,
                        "apply stopped"
                    );
                    report.failure = Some(ApplyFailure {
                        work_id: change.work_id.clone(),
                        message: err.to_string(),
                    });
                    return;
                }
            }
        }

        tracing::info!(updated = report.updated, "apply finished");
    }

    pub async fn lint(&self) -> Result<LintReport, RecalcError> {
        let graph = self.load_graph().await?;
        let diagnostics = graph.diagnostics();

        Ok(LintReport {
            tags: graph.len(),
            redirects: graph.redirect_count(),
            warnings: diagnostics.warnings(&graph, WARNING_DETAIL_LIMIT),
            diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_updates_is_clamped() {
        assert_eq!(RecalcOptions::apply().effective_max_updates(120), 120);
        assert_eq!(RecalcOptions::apply().with_max_updates(0).effective_max_updates(120), 1);
        assert_eq!(
            RecalcOptions::apply()
                .with_max_updates(50_000)
                .effective_max_updates(120),
            MAX_UPDATES_LIMIT
        );
    }

    #[test]
    fn inverted_date_range_is_rejected() {
        let options = RecalcOptions::dry_run().with_filter(WorkFilter {
            from: NaiveDate::from_ymd_opt(2025, 5, 1),
            to: NaiveDate::from_ymd_opt(2025, 4, 1),
            ..Default::default()
        });
        let err = options.validate().unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn blank_tag_filter_is_rejected() {
        let options = RecalcOptions::dry_run().with_filter(WorkFilter {
            tag_id: Some("  ".into()),
            ..Default::default()
        });
        assert!(options.validate().is_err());
    }

    #[test]
    fn parse_date_reports_the_field() {
        assert_eq!(
            parse_date("from", "2025-01-31").unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()
        );
        let err = parse_date("to", "31/01/2025").unwrap_err();
        assert!(err.to_string().contains("to must be YYYY-MM-DD"));
    }

    #[test]
    fn report_serializes_in_camel_case() {
        let report = RecalcReport {
            dry_run: true,
            scanned: 3,
            changed: 1,
            remaining: 1,
            ..Default::default()
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["dryRun"], true);
        assert_eq!(json["remaining"], 1);
        assert!(json.get("failure").is_none());
    }
}
