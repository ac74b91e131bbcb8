//! # CLI Layer
//!
//! The CLI layer is the **only** place in the codebase that:
//! - Knows about terminal I/O (stdout, stderr)
//! - Installs a `tracing` subscriber
//! - Handles argument parsing
//! - Formats output for human consumption
//!
//! ## Responsibilities
//!
//! 1. **Argument Parsing**: convert shell arguments into typed commands via clap
//! 2. **Context Setup**: initialize the API from the data directory and configuration
//! 3. **Dispatch**: route each command to one API call
//! 4. **Output**: styled text, or the JSON `Outcome` with `--json`
//! 5. **Error Handling**: errors bubble up to `main`, which prints them and exits non-zero

use super::render;
use super::setup::{Cli, Commands, TagCommands};
use anyhow::{anyhow, bail, Result};
use clap::Parser;
use serde_json::Value;
use storyvault::api::{Outcome, StoryApi};
use storyvault::commands::{CmdMessage, CmdResult};
use storyvault::config::StoryConfig;
use storyvault::error::StoryError;
use storyvault::init::{global_data_dir, initialize, load_config, StoryContext};
use storyvault::merge::ImportMode;
use storyvault::model::CollectionKind;
use storyvault::paths::LocationKind;
use storyvault::store::FsKv;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const LOG_ENV_VAR: &str = "STORYVAULT_LOG";

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Config is read-only and must work even when the store cannot be opened.
    if let Some(Commands::Config { key }) = &cli.command {
        return handle_config(&cli, key.as_deref());
    }

    let mut ctx = initialize(cli.data.clone())?;
    let command = cli.command.unwrap_or(Commands::List);
    debug!(?command, data_dir = %ctx.data_dir.display(), "dispatching");
    let result = dispatch(&mut ctx, command).await;

    if cli.json {
        let outcome = Outcome::from(result);
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        if !outcome.success {
            bail!(outcome.message.unwrap_or_default());
        }
        return Ok(());
    }

    let result = result?;
    print!("{}", render::render_result(&result));
    Ok(())
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        })
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn dispatch(
    ctx: &mut StoryContext,
    command: Commands,
) -> storyvault::error::Result<CmdResult> {
    let api: &mut StoryApi<FsKv> = &mut ctx.api;
    match command {
        Commands::Create { name } => api.create(&name).await,
        Commands::Load { name, file } => {
            if file {
                api.load_from_file(&name).await
            } else {
                api.load(&name).await
            }
        }
        Commands::Switch { name } => api.switch_to(&name).await,
        Commands::List => api.list_databases().await,
        Commands::Status => Ok(status(api)),
        Commands::Import { path, merge } => {
            let mode = if merge {
                ImportMode::Merge
            } else {
                ImportMode::Replace
            };
            api.import_file(&path, mode).await
        }
        Commands::Export { destination } => api.export_to(destination.as_deref()).await,
        Commands::Save => api.save().await,
        Commands::Backup { list, name } => {
            if list {
                api.list_backups(name.as_deref()).await
            } else {
                api.backup().await
            }
        }
        Commands::Delete { name } => api.delete(&name).await,
        Commands::Add { collection, record } => {
            let record = parse_record(&collection, &record)?;
            api.upsert_record(&collection, record).await
        }
        Commands::Remove { collection, id } => api.remove_record(&collection, &id).await,
        Commands::Tag { action } => match action.unwrap_or(TagCommands::List) {
            TagCommands::List => api.list_tags(),
            TagCommands::Create { name, color } => api.create_tag(&name, color.as_deref()).await,
            TagCommands::Rename { tag, new_name } => api.rename_tag(&tag, &new_name).await,
            TagCommands::Delete { tag } => api.delete_tag(&tag).await,
        },
        Commands::Doctor { fix_ids } => api.doctor(fix_ids).await,
        Commands::Paths => Ok(paths(ctx)),
        Commands::Config { .. } => Err(StoryError::Api(
            "config is read before the store is opened".to_string(),
        )),
    }
}

fn status(api: &StoryApi<FsKv>) -> CmdResult {
    match api.database() {
        Some(db) => CmdResult::default().with_database(db),
        None => {
            let mut result = CmdResult::default();
            result.add_message(CmdMessage::info(
                "No database is open. Create one with `storyvault create <name>`.",
            ));
            result
        }
    }
}

fn paths(ctx: &StoryContext) -> CmdResult {
    let mut result = CmdResult::default().with_path(ctx.data_dir.clone());
    for kind in LocationKind::ALL {
        let line = match ctx.api.paths().resolve(kind) {
            Some(path) => format!("{}: {}", kind, path.display()),
            None => format!("{}: (not set)", kind),
        };
        result.add_message(CmdMessage::info(line));
    }
    result
}

/// String collections take the argument as-is; everything else must be a JSON object.
fn parse_record(collection: &str, raw: &str) -> storyvault::error::Result<Value> {
    let scalar = collection
        .parse::<CollectionKind>()
        .map(CollectionKind::is_scalar)
        .unwrap_or(false);
    if scalar && !raw.trim_start().starts_with('"') {
        return Ok(Value::String(raw.to_string()));
    }
    Ok(serde_json::from_str(raw)?)
}

fn handle_config(cli: &Cli, key: Option<&str>) -> Result<()> {
    let mut dirs = vec![global_data_dir()?];
    if let Some(data) = &cli.data {
        if !dirs.contains(data) {
            dirs.push(data.clone());
        }
    }
    let config: StoryConfig = load_config(&dirs)?;
    let entries = config.entries();

    match key {
        None => {
            if cli.json {
                let map: serde_json::Map<String, Value> = entries
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), Value::String(v)))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&map)?);
            } else {
                for (k, v) in entries {
                    println!("{} = {}", k, v);
                }
            }
        }
        Some(wanted) => {
            let normalized = wanted.replace('-', "_");
            let (_, value) = entries
                .into_iter()
                .find(|(k, _)| *k == normalized)
                .ok_or_else(|| anyhow!("Unknown config key: {}", wanted))?;
            println!("{}", value);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_record_plain_text_for_string_collections() {
        assert_eq!(
            parse_record("titles", "The Long Road").unwrap(),
            Value::String("The Long Road".to_string())
        );
        assert_eq!(
            parse_record("series", "\"Quoted\"").unwrap(),
            Value::String("Quoted".to_string())
        );
    }

    #[test]
    fn test_parse_record_json_for_objects() {
        let record = parse_record("character", r#"{"firstName": "Ana"}"#).unwrap();
        assert_eq!(record["firstName"], "Ana");
        assert!(parse_record("character", "Ana").is_err());
    }
}
