use crate::commands::{CmdResult, DatabaseListing, Vault};
use crate::error::Result;
use crate::paths::LocationKind;
use crate::store::files::ListOptions;
use crate::store::kv::KeyValueBackend;
use std::collections::BTreeMap;

/// Every database known to the tiers or present as a file in the database directory.
pub async fn run<K: KeyValueBackend>(vault: &Vault<K>) -> Result<CmdResult> {
    let current = vault.tiers.current()?;
    let mut listings: BTreeMap<String, DatabaseListing> = BTreeMap::new();

    for name in vault.tiers.database_names()? {
        let records = vault.tiers.read_database(&name)?.collections.total();
        listings.insert(
            name.clone(),
            DatabaseListing {
                current: current.as_deref() == Some(name.as_str()),
                name,
                in_tiers: true,
                file: None,
                records,
            },
        );
    }

    if let Some(dir) = vault.paths.resolve(LocationKind::Database) {
        let files = vault
            .files
            .list_files(&dir, &ListOptions::default().with_extensions(["json"]))
            .await?;
        for path in files {
            let Some(name) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            let listing = listings
                .entry(name.clone())
                .or_insert_with(|| DatabaseListing {
                    current: current.as_deref() == Some(name.as_str()),
                    name,
                    in_tiers: false,
                    file: None,
                    records: 0,
                });
            listing.file = Some(path);
        }
    }

    Ok(CmdResult {
        databases: listings.into_values().collect(),
        ..CmdResult::default()
    })
}
