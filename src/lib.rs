//! Interactive tabular transformation sessions that export as faithful pandas code.
//!
//! A [`core::Session`] holds a base table, a linear history of
//! [`op::ActionSpec`]s and a cursor. Every action is validated and executed
//! through the closed [`registry::ActionRegistry`]; the same registry's
//! templates let [`codegen`] write a script or notebook that recomputes the
//! table at the cursor.
//!
//! # Examples
//!
//! In-memory usage with [`core::Session`]:
//! ```
//! use tabstudio::{
//!     codegen::ExportFormat,
//!     core::Session,
//!     loader::LoadDescriptor,
//!     op::{ActionSpec, Operation},
//!     table::{Column, Table},
//!     types::SessionId,
//! };
//!
//! let base = Table::new(vec![
//!     Column::ints("A", [1, 2, 3, 4, 5]),
//!     Column::ints("B", [10, 20, 30, 40, 50]),
//! ])
//! .expect("table");
//! let mut session = Session::new(SessionId::new(), LoadDescriptor::new("data.csv", "csv"), base);
//! session
//!     .apply_action(ActionSpec::single(
//!         "Keep A above 2",
//!         Operation::new("filter_rows")
//!             .with("column", "A")
//!             .with("operator", ">")
//!             .with("value", 2),
//!     ))
//!     .expect("apply");
//! assert_eq!(session.materialized().row_count(), 3);
//!
//! let script = session.export(ExportFormat::Script).expect("export");
//! assert!(script.content.contains("df = df[df['A'] > 2]"));
//! ```
//!
//! Runtime usage with a SQLite store:
//! ```no_run
//! use tabstudio::{
//!     config::StudioConfig,
//!     loader::LoadDescriptor,
//!     op::{ActionSpec, Operation},
//!     runtime::Studio,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let cfg = StudioConfig { storage_path: Some("sessions.db".into()), ..StudioConfig::default() };
//! let studio = Studio::open(cfg).expect("open store");
//! let handle = studio.load(LoadDescriptor::new("sales.csv", "csv")).await.expect("load");
//! handle
//!     .apply(ActionSpec::single("Drop notes", Operation::new("drop_column").with("column", "notes")))
//!     .await
//!     .expect("apply");
//! let rows = handle.preview(None).await.expect("preview");
//! println!("{rows:?}");
//! studio.shutdown().await.expect("shutdown");
//! # }
//! ```
#![deny(missing_docs)]

/// Script and notebook generation.
pub mod codegen;
/// TOML configuration with environment overrides.
pub mod config;
/// Sessions and time travel.
pub mod core;
/// Applying and replaying action specs.
pub mod engine;
/// Dataset loading.
pub mod loader;
/// Operation and action spec model.
pub mod op;
/// Session storage abstraction with memory and SQLite implementations.
pub mod persist;
/// Column statistics and cleaning suggestions.
pub mod profile;
/// The closed action vocabulary, executors and templates.
pub mod registry;
/// Per-session async runtime.
pub mod runtime;
/// Immutable columnar tables.
pub mod table;
/// Shared identifiers and whitelists.
pub mod types;
