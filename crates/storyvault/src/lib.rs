//! # Storyvault Architecture
//!
//! Storyvault is the **persistence and merge core** of a story-writing tool. A writer keeps a
//! database of story entities (characters, plots, world elements, tags, relationships, ...)
//! and this library keeps that database consistent across every place it is stored, imports
//! outside JSON documents without duplicating records, and moves files around without letting
//! a momentary I/O hiccup corrupt anything.
//!
//! Like its CLI, the library is UI agnostic: nothing here prints, prompts or exits.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (api.rs)                                         │
//! │  - The lifecycle manager the UI talks to                    │
//! │  - Returns `Result<CmdResult>`, flattened by `Outcome`      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Command Layer (commands/*.rs)                              │
//! │  - create / load / switch / import / export / delete / ...  │
//! │  - Owns the working set, decides what gets persisted        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!               ┌──────────────┼───────────────┐
//!               ▼              ▼               ▼
//! ┌──────────────────┐ ┌───────────────┐ ┌──────────────────────┐
//! │ store::tiers     │ │ merge         │ │ store::files         │
//! │ generic + named  │ │ duplicate     │ │ bounded-retry async  │
//! │ key-value tiers  │ │ detection     │ │ file operations      │
//! └──────────────────┘ └───────────────┘ └──────────────────────┘
//! ```
//!
//! ## Storage Tiers
//!
//! Every collection of the active database lives in three places at once:
//!
//! 1. **Working set**: the [`model::Database`] value owned by the command layer.
//! 2. **Key-value tiers**: a generic key (`characters`) kept for older readers, and a named
//!    key (`My Novel_characters`) that is authoritative whenever it holds data.
//! 3. **Database file**: `<database dir>/<name>.json`, the on-disk mirror and the last line of
//!    recovery when the tiers have been cleared.
//!
//! ## Module Overview
//!
//! - [`api`]: The facade and lifecycle state machine
//! - [`commands`]: One module per lifecycle operation
//! - [`store`]: Key-value backends, the tier store and the resilient file store
//! - [`merge`]: Identity and fuzzy duplicate rules for imports
//! - [`document`]: The JSON document format and its validation
//! - [`model`]: `Database`, `Collections`, `CollectionKind`
//! - [`tags`]: Tag records and name normalization
//! - [`paths`]: Named locations, path normalization, database name sanitizing
//! - [`config`]: Configuration loading
//! - [`init`]: Wiring everything together for a client
//! - [`error`]: Error types and the UI-facing error taxonomy

pub mod api;
pub mod commands;
pub mod config;
pub mod document;
pub mod error;
pub mod init;
pub mod merge;
pub mod model;
pub mod paths;
pub mod store;
pub mod tags;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
