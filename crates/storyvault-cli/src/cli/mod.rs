//! # CLI Behavior
//!
//! This is **one possible UI client** for storyvault, not the application itself.
//! The CLI is the only place that knows about terminal I/O, exit codes and output formatting.
//!
//! ## Naked Execution (`storyvault`)
//!
//! Running `storyvault` with no arguments lists the known databases, marking the current one.
//!
//! ## Structured Output
//!
//! `--json` prints the library's `Outcome` (`success`, `errorKind`, `message`, `result`)
//! instead of styled text, on success and on failure alike.
//!
//! ## Logging
//!
//! Library diagnostics go to stderr through `tracing`. `-v` raises the level to `info`,
//! `-vv` to `debug`; `STORYVAULT_LOG` takes an `EnvFilter` directive and wins over `-v`.
//!
//! ## Module Structure
//!
//! - `commands`: context setup, dispatch to the API, output selection
//! - `render`: styled terminal output
//! - `setup`: argument parsing via clap

mod commands;
mod render;
pub mod setup;

pub use commands::run;
