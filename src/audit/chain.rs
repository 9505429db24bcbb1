use sha2::{Digest, Sha256};

use crate::models::change_log::ChangeLogEntry;
use crate::utils::timestamp;

/// SHA256(prev_hash || canonical entry), hex encoded.
///
/// The canonical form is the entry's content fields as a JSON object with
/// sorted keys; `id` and the hashes themselves are not part of it.
pub fn entry_hash(entry: &ChangeLogEntry) -> String {
    let canonical = serde_json::json!({
        "task_id": entry.task_id.to_string(),
        "field_name": entry.field_name,
        "old_value": entry.old_value,
        "new_value": entry.new_value,
        "changed_by": entry.changed_by.to_string(),
        "changed_at": timestamp(entry.changed_at),
    });

    let mut hasher = Sha256::new();
    if let Some(prev) = &entry.prev_hash {
        hasher.update(prev.as_bytes());
    }
    hasher.update(canonical.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Index of the first entry whose link or hash does not check out.
pub fn first_broken_link(entries: &[ChangeLogEntry]) -> Option<usize> {
    let mut prev: Option<&str> = None;
    for (idx, entry) in entries.iter().enumerate() {
        if entry.prev_hash.as_deref() != prev || entry_hash(entry) != entry.hash {
            return Some(idx);
        }
        prev = Some(entry.hash.as_str());
    }
    None
}
