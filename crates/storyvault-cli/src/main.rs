//! # Storyvault CLI Architecture
//!
//! The binary is intentionally thin: the CLI lives in `src/cli/`, while this file only
//! starts the runtime, invokes `cli::run()` and handles process termination.
//!
//! ## Workspace Structure
//!
//! - `crates/storyvault/`: core library with UI-agnostic persistence and merge logic
//! - `crates/storyvault-cli/`: this CLI tool, depends on the `storyvault` library
//!
//! ## Layering
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI Layer (crates/storyvault-cli/src/cli/)                 │
//! │  - clap argument parsing (setup.rs)                         │
//! │  - Context wiring + dispatch (commands.rs)                  │
//! │  - Terminal rendering with console styles (render.rs)       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (crates/storyvault/src/api.rs)                   │
//! │  - Dispatches to command modules                            │
//! │  - Returns structured `CmdResult` values                    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Command Layer (crates/storyvault/src/commands/*)           │
//! │  - Tiers, files, merge; no stdout/stderr or process exits   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Testing Approach
//!
//! - **Commands and API**: unit and integration tests in the library crate.
//! - **CLI**: rendering is tested with canned `CmdResult` values; `tests/cli_e2e.rs`
//!   drives the real binary against a temporary data directory.

mod cli;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
