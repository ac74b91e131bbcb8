use crate::commands::{CmdMessage, CmdResult, Vault};
use crate::document::{render_document, StampKind};
use crate::error::Result;
use crate::paths::{file_stamp, sanitize_name, LocationKind};
use crate::store::kv::KeyValueBackend;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes the working set to a document stamped with `exportDate`.
///
/// With no destination, the file goes to the documents directory as
/// `<name>_export_<timestamp>.json`. A destination that is an existing directory gets the
/// same file name inside it; anything else is used as the file path. The tiers are never
/// touched.
pub async fn run<K: KeyValueBackend>(
    vault: &mut Vault<K>,
    destination: Option<&Path>,
) -> Result<CmdResult> {
    let db = vault.require_active()?;
    let file_name = format!(
        "{}_export_{}.json",
        sanitize_name(&db.name),
        file_stamp(Utc::now())
    );

    let path: PathBuf = match destination {
        None => vault.paths.require(LocationKind::Documents)?.join(&file_name),
        Some(dest) => match vault.files.stat(dest).await {
            Ok(Some(stat)) if stat.is_dir => dest.join(&file_name),
            _ => dest.to_path_buf(),
        },
    };

    let text = render_document(&db, StampKind::Export)?;
    vault.files.write_file(&path, &text).await?;
    info!(database = %db.name, path = %path.display(), "exported database");

    let mut result = CmdResult::default()
        .with_database(&db)
        .with_path(path.clone());
    result.add_message(CmdMessage::success(format!(
        "Exported '{}' to {}",
        db.name,
        path.display()
    )));
    Ok(result)
}
