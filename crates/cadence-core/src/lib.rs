//! # Cadence Core Library
//!
//! Recurring task tracking: rule validation, occurrence generation and the
//! lifecycle that keeps each parent task's generated instances in step
//! with its rule.
//!
//! ## Features
//!
//! - **Closed rule model**: daily, weekly (optionally on chosen weekdays)
//!   and monthly (fixed date or last day) cadences with an end condition
//! - **Deterministic generation**: lazy, finite, restartable occurrence
//!   sequences with a hard cap
//! - **Atomic regeneration**: a parent's instance set is always replaced
//!   as one unit
//! - **Injected capabilities**: identity allocation, clock and storage are
//!   all traits, so tests run against fixed time and in-memory storage
//!
//! ## Core Modules
//!
//! - [`recurrence`]: Rule types, validation and human-readable summaries
//! - [`occurrence`]: Occurrence generation
//! - [`materialization`]: Instance records built from occurrences
//! - [`lifecycle`]: The recurrence lifecycle manager
//! - [`store`]: Storage capability with in-memory and SQLite backends
//! - [`templates`]: Saved task templates with relative due dates
//! - [`db`]: Database connection and migration management
//! - [`models`]: Core data structures and transfer objects
//! - [`error`]: Error types
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cadence_core::{
//!     clock::SystemClock, db, identity::UuidV7Allocator,
//!     lifecycle::RecurrenceLifecycleManager, models::NewTaskData,
//!     occurrence::GeneratorConfig, recurrence::{EndCondition, RecurrenceRule},
//!     store::SqliteStore,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), cadence_core::error::CoreError> {
//!     let pool = db::establish_connection("tasks.db").await?;
//!     let manager = RecurrenceLifecycleManager::new(
//!         SqliteStore::new(pool),
//!         Arc::new(UuidV7Allocator),
//!         Arc::new(SystemClock),
//!         GeneratorConfig::default(),
//!     );
//!
//!     let change = manager
//!         .create_task(NewTaskData {
//!             title: "Water the plants".to_string(),
//!             recurrence: Some(RecurrenceRule::daily(2).ending(EndCondition::After { count: 10 })),
//!             ..Default::default()
//!         })
//!         .await?;
//!     println!("Created {} with {:?}", change.task.title, change.regeneration);
//!
//!     Ok(())
//! }
//! ```

pub mod calendar;
pub mod clock;
pub mod db;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod materialization;
pub mod models;
pub mod occurrence;
pub mod recurrence;
pub mod store;
pub mod templates;
