use anyhow::{Context, Result};
use std::{fs, path::Path};
use tracing::{debug, info, warn};

use crate::config::atomic_rename;
use crate::model::{Snapshot, SAVE_VERSION};

/// Reads the saved companion.
///
/// A missing, unreadable or corrupt file means "no saved state". A record
/// written under another version is deleted and treated the same way.
pub fn load_snapshot(path: &Path) -> Option<Snapshot> {
    let s = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(err) => {
            debug!(path = %path.display(), %err, "no saved companion");
            return None;
        }
    };
    let snapshot = match serde_json::from_str::<Snapshot>(&s) {
        Ok(v) => v,
        Err(err) => {
            warn!(path = %path.display(), %err, "saved companion unreadable, starting fresh");
            return None;
        }
    };
    if snapshot.version != SAVE_VERSION {
        info!(
            path = %path.display(),
            found = snapshot.version,
            expected = SAVE_VERSION,
            "discarding save from another version"
        );
        if let Err(err) = fs::remove_file(path) {
            warn!(path = %path.display(), %err, "could not remove stale save");
        }
        return None;
    }
    Some(snapshot)
}

pub fn save_atomic(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(snapshot)?;
    fs::write(&tmp, data).with_context(|| format!("writing {}", tmp.display()))?;
    atomic_rename(&tmp, path)?;
    debug!(path = %path.display(), "companion saved");
    Ok(())
}
