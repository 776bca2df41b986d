//! End-to-end recalculation runs against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use pretty_assertions::assert_eq;

use gallery_admin::recalc::{RecalcEngine, RecalcOptions};
use gallery_admin::store::MemoryStore;
use gallery_admin::{RecalcError, Tag, Work, WorkFilter};

// ── Helpers ────────────────────────────────────────────────────

fn engine(store: &Arc<MemoryStore>) -> RecalcEngine {
    RecalcEngine::from_provider(store).with_pace(Duration::ZERO)
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn hierarchy() -> Vec<Tag> {
    vec![
        Tag::new("parent", "Parent"),
        Tag::new("child", "Child").with_parent("parent"),
        Tag::new("a", "A"),
        Tag::new("b", "B").merged_into("a"),
    ]
}

async fn tags_of(store: &MemoryStore, work_id: &str) -> Vec<String> {
    let mut tags = store.work(work_id).await.unwrap().tag_ids;
    tags.sort();
    tags
}

// ── Scenarios ──────────────────────────────────────────────────

#[tokio::test]
async fn simple_merge_rewrites_to_destination() {
    let store = Arc::new(MemoryStore::new(
        hierarchy(),
        vec![Work::new("w1", "Bowl").with_tags(["b"])],
    ));

    let report = engine(&store).run(&RecalcOptions::apply()).await.unwrap();
    assert_eq!((report.changed, report.updated, report.remaining), (1, 1, 0));
    assert_eq!(tags_of(&store, "w1").await, vec!["a"]);
}

#[tokio::test]
async fn parent_is_propagated() {
    let store = Arc::new(MemoryStore::new(
        hierarchy(),
        vec![Work::new("w1", "Spoon").with_tags(["child"])],
    ));

    let report = engine(&store).run(&RecalcOptions::apply()).await.unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(tags_of(&store, "w1").await, vec!["child", "parent"]);
}

#[tokio::test]
async fn already_normalized_work_is_not_counted() {
    let store = Arc::new(MemoryStore::new(
        hierarchy(),
        vec![
            Work::new("w1", "").with_tags(["child", "parent"]),
            Work::new("w2", "").with_tags(["b"]),
        ],
    ));

    let report = engine(&store).run(&RecalcOptions::dry_run()).await.unwrap();
    assert_eq!(report.scanned, 2);
    assert_eq!(report.changed, 1);
    assert_eq!(report.samples[0].work_id, "w2");
}

#[tokio::test]
async fn dangling_merge_warns_and_keeps_the_tag() {
    let store = Arc::new(MemoryStore::new(
        vec![Tag::new("x", "X").merged_into("")],
        vec![Work::new("w1", "").with_tags(["x"])],
    ));

    let report = engine(&store).run(&RecalcOptions::dry_run()).await.unwrap();
    assert_eq!(report.changed, 0);
    assert_eq!(
        report.warnings,
        vec!["1 merged tag(s) without a merge target: X [x]"]
    );
}

#[tokio::test]
async fn hidden_tags_normalize_like_any_other() {
    let store = Arc::new(MemoryStore::new(
        vec![
            Tag::new("genre", "Genre").hidden(),
            Tag::new("sculpture", "Sculpture").hidden().with_parent("genre"),
            Tag::new("bust", "Bust").with_parent("sculpture"),
            Tag::new("old", "Old").merged_into("sculpture"),
        ],
        vec![
            Work::new("w1", "").with_tags(["bust"]),
            Work::new("w2", "").with_tags(["old"]),
            Work::new("w3", "").with_tags(["sculpture", "genre"]),
        ],
    ));

    let report = engine(&store).run(&RecalcOptions::apply()).await.unwrap();
    assert_eq!((report.scanned, report.changed, report.updated), (3, 2, 2));
    assert!(report.warnings.is_empty());
    assert_eq!(tags_of(&store, "w1").await, vec!["bust", "genre", "sculpture"]);
    assert_eq!(tags_of(&store, "w2").await, vec!["genre", "sculpture"]);
    assert_eq!(tags_of(&store, "w3").await, vec!["genre", "sculpture"]);
}

#[tokio::test]
async fn dry_run_writes_nothing() {
    let store = Arc::new(MemoryStore::new(
        hierarchy(),
        vec![Work::new("w1", "").with_tags(["b"])],
    ));

    let report = engine(&store).run(&RecalcOptions::dry_run()).await.unwrap();
    assert!(report.dry_run);
    assert_eq!((report.changed, report.updated, report.remaining), (1, 0, 1));
    assert!(store.patches().await.is_empty());
}

#[tokio::test]
async fn second_run_finds_nothing_to_change() {
    let store = Arc::new(MemoryStore::new(
        hierarchy(),
        vec![
            Work::new("w1", "").with_tags(["b", "child"]),
            Work::new("w2", "").with_tags(["child"]),
        ],
    ));

    let first = engine(&store).run(&RecalcOptions::apply()).await.unwrap();
    assert_eq!(first.updated, 2);
    let second = engine(&store).run(&RecalcOptions::apply()).await.unwrap();
    assert_eq!(second.changed, 0);
    assert_eq!(second.updated, 0);
}

#[tokio::test]
async fn cap_limits_writes_and_reports_the_backlog() {
    let works: Vec<Work> = (0..150)
        .map(|i| Work::new(format!("w{i:03}"), "").with_tags(["child"]))
        .collect();
    let store = Arc::new(MemoryStore::new(hierarchy(), works));

    let report = engine(&store)
        .run(&RecalcOptions::apply().with_max_updates(120))
        .await
        .unwrap();
    assert_eq!(report.changed, 150);
    assert_eq!(report.updated, 120);
    assert_eq!(report.remaining, 30);
    assert_eq!(report.samples.len(), 10);

    let drain = engine(&store).run(&RecalcOptions::apply()).await.unwrap();
    assert_eq!((drain.changed, drain.updated, drain.remaining), (30, 30, 0));
}

#[tokio::test]
async fn write_failure_stops_the_run() {
    let works: Vec<Work> = (1..=4)
        .map(|i| Work::new(format!("w{i}"), "").with_tags(["b"]))
        .collect();
    let store = Arc::new(MemoryStore::new(hierarchy(), works));
    store.fail_writes_for("w3").await;

    let report = engine(&store).run(&RecalcOptions::apply()).await.unwrap();
    assert_eq!(report.updated, 2);
    assert_eq!(report.remaining, 2);
    let failure = report.failure.expect("failure reported");
    assert_eq!(failure.work_id, "w3");

    let patched: Vec<String> = store.patches().await.into_iter().map(|(id, _)| id).collect();
    assert_eq!(patched, vec!["w1", "w2"]);
    assert_eq!(tags_of(&store, "w4").await, vec!["b"]);
}

#[tokio::test]
async fn filters_select_candidate_works() {
    let store = Arc::new(MemoryStore::new(
        hierarchy(),
        vec![
            Work::new("jan", "").with_tags(["b"]).completed_on(date("2025-01-15")),
            Work::new("feb", "").with_tags(["b"]).completed_on(date("2025-02-15")),
            Work::new("undated", "").with_tags(["b"]),
            Work::new("ready", "")
                .with_tags(["b"])
                .completed_on(date("2025-01-20"))
                .ready(true),
        ],
    ));

    let options = RecalcOptions::dry_run().with_filter(WorkFilter {
        from: Some(date("2025-01-01")),
        to: Some(date("2025-01-31")),
        unprepared_only: true,
        ..Default::default()
    });
    let report = engine(&store).run(&options).await.unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.samples[0].work_id, "jan");
}

#[tokio::test]
async fn invalid_range_is_rejected_before_reading() {
    let store = Arc::new(MemoryStore::new(vec![], vec![]));
    store.fail_reads().await;

    let options = RecalcOptions::dry_run().with_filter(WorkFilter {
        from: Some(date("2025-03-01")),
        to: Some(date("2025-02-01")),
        ..Default::default()
    });
    let err = engine(&store).run(&options).await.unwrap_err();
    assert!(matches!(err, RecalcError::InvalidRequest(_)));
}

#[tokio::test]
async fn read_failure_aborts_without_writes() {
    let store = Arc::new(MemoryStore::new(
        hierarchy(),
        vec![Work::new("w1", "").with_tags(["b"])],
    ));
    store.fail_reads().await;

    let err = engine(&store).run(&RecalcOptions::apply()).await.unwrap_err();
    assert!(matches!(err, RecalcError::StoreRead { .. }));
    assert_eq!(err.http_status(), 502);
    assert!(store.patches().await.is_empty());
}

#[tokio::test]
async fn parent_cycles_are_reported_not_fatal() {
    let store = Arc::new(MemoryStore::new(
        vec![
            Tag::new("a", "A").with_parent("b"),
            Tag::new("b", "B").with_parent("c"),
            Tag::new("c", "C").with_parent("a"),
        ],
        vec![Work::new("w1", "").with_tags(["a"])],
    ));

    let report = engine(&store).run(&RecalcOptions::apply()).await.unwrap();
    assert_eq!(report.cycles, 1);
    assert!(report.warnings.iter().any(|w| w.starts_with("parent cycle: A [a]")));
    assert_eq!(tags_of(&store, "w1").await, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn lint_reports_graph_health() {
    let store = Arc::new(MemoryStore::new(hierarchy(), vec![]));
    let report = RecalcEngine::from_provider(&store).lint().await.unwrap();
    assert_eq!(report.tags, 4);
    assert_eq!(report.redirects, 1);
    assert!(report.warnings.is_empty());
}

#[tokio::test(start_paused = true)]
async fn writes_are_paced() {
    let works: Vec<Work> = (1..=3)
        .map(|i| Work::new(format!("w{i}"), "").with_tags(["b"]))
        .collect();
    let store = Arc::new(MemoryStore::new(hierarchy(), works));

    let started = tokio::time::Instant::now();
    let report = RecalcEngine::from_provider(&store)
        .with_pace(Duration::from_millis(350))
        .run(&RecalcOptions::apply())
        .await
        .unwrap();

    assert_eq!(report.updated, 3);
    assert_eq!(started.elapsed(), Duration::from_millis(700));
}
