//!
//! The merge engine: reconciles two replicas' views of the data set by
//! byte range. Because every record authenticates its own
//! `(replica, offset)`, two views of the same file agree on their common
//! prefix, so grafting the missing suffix is safe exactly when the
//! remote payload starts at or before our end-of-file.

use crate::error::{MergeError, StoreError};
use crate::store::Store;
use crate::types::{offset_of, OffsetMap};

/// Per-replica `(start_offset, bytes)` payload exchanged during sync.
/// Log bytes are ASCII by construction, so they travel as strings.
pub type SyncData = std::collections::BTreeMap<String, (u64, String)>;

/// The raw bytes of every replica the remote is behind on, each from the
/// remote's offset to our end-of-file.
pub fn missing_data(
    store: &Store,
    local: &OffsetMap,
    remote: &OffsetMap,
) -> Result<SyncData, StoreError> {
    let mut data = SyncData::new();
    for (app_id, &local_off) in local {
        let remote_off = offset_of(remote, app_id);
        if local_off > remote_off {
            let bytes = store.raw_range(app_id, remote_off)?;
            let bytes = String::from_utf8(bytes).map_err(|_| StoreError::Corrupt {
                app_id: app_id.clone(),
                offset: remote_off,
                reason: "log is not valid UTF-8",
            })?;
            data.insert(app_id.clone(), (remote_off, bytes));
        }
    }
    Ok(data)
}

/// Whether every range in the payload starts at or before our own
/// end-of-file for its replica. A gap means the sender's view holds
/// bytes we have no witness for, and grafting is refused.
pub fn is_gapless(local: &OffsetMap, data: &SyncData) -> bool {
    data.iter()
        .all(|(app_id, (start, _))| *start <= offset_of(local, app_id))
}

/// Graft each replica's bytes past the local/remote overlap onto the
/// local file. Callers hold the exclusive lock; a payload that starts
/// past end-of-file is refused here regardless of earlier checks.
pub fn insert_data(store: &Store, local: &OffsetMap, data: &SyncData) -> Result<(), MergeError> {
    for (app_id, (start, bytes)) in data {
        let local_off = offset_of(local, app_id);
        let overlap = local_off
            .checked_sub(*start)
            .ok_or_else(|| MergeError::Gap(app_id.clone()))? as usize;
        let tail = bytes.as_bytes().get(overlap..).unwrap_or(&[]);
        if tail.is_empty() {
            tracing::debug!(%app_id, "nothing new past the overlap");
            continue;
        }
        store.raw_write(app_id, local_off, tail)?;
    }
    Ok(())
}
