use crate::commands::{persist, CmdMessage, CmdResult, DoctorReport, FileMirror, Vault};
use crate::error::Result;
use crate::model::{ensure_record_id, record_id, CollectionKind};
use crate::store::kv::KeyValueBackend;
use crate::tags::{rewrite_tag_references, TAGGABLE};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{info, warn};

/// Checks the active database for problems and fixes the ones that are safe to fix.
///
/// Tag references pointing at missing tags are always removed. Object records without an
/// id are reported, and given one when `assign_ids` is set. Duplicate tag names are only
/// reported: picking a winner is the writer's call.
pub async fn run<K: KeyValueBackend>(vault: &mut Vault<K>, assign_ids: bool) -> Result<CmdResult> {
    let mut db = vault.require_active()?;
    let mut report = DoctorReport::default();

    let tag_ids: HashSet<String> = db.collections.tags.iter().filter_map(record_id).collect();
    for kind in TAGGABLE {
        for record in db.collections.get_mut(kind).iter_mut() {
            report.dangling_tag_references += rewrite_tag_references(record, |id| {
                tag_ids.contains(id).then(|| id.to_string())
            });
        }
    }

    let mut seen = HashSet::new();
    for tag in &db.collections.tags {
        if let Some(name) = tag.get("name").and_then(Value::as_str) {
            if !seen.insert(name.trim().to_lowercase()) {
                report.duplicate_tag_names.push(name.to_string());
            }
        }
    }

    for kind in CollectionKind::ALL.into_iter().filter(|k| !k.is_scalar()) {
        let mut missing = 0;
        for record in db.collections.get_mut(kind).iter_mut() {
            if record_id(record).is_some() {
                continue;
            }
            let Value::Object(map) = record else {
                continue;
            };
            missing += 1;
            if assign_ids {
                ensure_record_id(map);
                report.ids_assigned += 1;
            }
        }
        if missing > 0 {
            report.records_without_id.insert(kind.key().to_string(), missing);
        }
    }

    let changed = report.dangling_tag_references > 0 || report.ids_assigned > 0;
    if changed {
        db.touch();
        persist(vault, db, FileMirror::Write).await?;
    }

    let mut result = CmdResult::default();
    if report.is_clean() {
        result.add_message(CmdMessage::success("No problems found"));
    } else {
        warn!(
            dangling = report.dangling_tag_references,
            duplicate_tags = report.duplicate_tag_names.len(),
            "database has consistency problems"
        );
        if report.dangling_tag_references > 0 {
            result.add_message(CmdMessage::warning(format!(
                "Removed {} reference(s) to missing tags",
                report.dangling_tag_references
            )));
        }
        for name in &report.duplicate_tag_names {
            result.add_message(CmdMessage::warning(format!(
                "Tag name '{}' is used more than once",
                name
            )));
        }
        for (collection, count) in &report.records_without_id {
            result.add_message(CmdMessage::warning(format!(
                "{} record(s) in {} have no id",
                count, collection
            )));
        }
        if report.ids_assigned > 0 {
            result.add_message(CmdMessage::info(format!(
                "Assigned {} id(s)",
                report.ids_assigned
            )));
        }
    }
    info!(clean = report.is_clean(), changed, "doctor finished");
    result.doctor = Some(report);
    Ok(result)
}
