//! Gallery admin - tag consolidation and recalculation
//!
//! Keeps every work's tag assignment consistent with the tag taxonomy:
//! merged tags are replaced by their destination and every ancestor of an
//! assigned tag is added.
//!
//! ## Flow
//! Tag store -> `TagGraph` -> `RecalcEngine` <- work store, then either a
//! dry-run report or paced, capped writes back to the work store.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gallery_admin::recalc::{RecalcEngine, RecalcOptions};
//! use gallery_admin::store::MemoryStore;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let store = Arc::new(MemoryStore::from_file("snapshot.json")?);
//! let report = RecalcEngine::from_provider(&store).run(&RecalcOptions::dry_run()).await?;
//! println!("{} of {} works need changes", report.changed, report.scanned);
//! # Ok(())
//! # }
//! ```

// Error taxonomy
pub mod error;

// Environment configuration
pub mod config;

// Records and the in-memory graph
pub mod model;
pub mod normalize;
pub mod tag_graph;

// Engine
pub mod recalc;
pub mod report;
pub mod tag_ops;

// Store seams and adapters
pub mod notion;
pub mod store;

// HTTP surface
#[cfg(feature = "server")]
pub mod api;

pub use error::{ConfigError, RecalcError, StoreError};
pub use model::{Tag, TagId, TagStatus, Work, WorkFilter, WorkId};
pub use recalc::{RecalcEngine, RecalcMode, RecalcOptions, RecalcReport};
pub use tag_graph::TagGraph;
