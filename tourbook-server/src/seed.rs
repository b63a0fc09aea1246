//! Development data import
//!
//! A seed directory holds one JSON array per collection (`tours.json`,
//! `users.json`, ...). Missing files are skipped; a file that is not an
//! array of objects aborts startup.

use std::path::Path;

use tourbook_service::error::{Error, Result};
use tourbook_service::store::{Document, MemoryStore};

use crate::resources::COLLECTIONS;

/// Import every seed file found in `dir`; returns `(collection, count)` pairs
pub async fn import_dir(store: &MemoryStore, dir: &Path) -> Result<Vec<(&'static str, usize)>> {
    let is_dir = tokio::fs::metadata(dir)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false);
    if !is_dir {
        return Err(Error::seed(dir, "not a directory"));
    }

    let mut imported = Vec::new();
    for collection in COLLECTIONS {
        let path = dir.join(format!("{collection}.json"));
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(collection, path = %path.display(), "No seed file");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let documents: Vec<Document> =
            serde_json::from_str(&raw).map_err(|e| Error::seed(&path, e.to_string()))?;
        let count = store.import(collection, documents)?;
        tracing::info!(collection, count, "Seeded collection from {}", path.display());
        imported.push((collection, count));
    }
    Ok(imported)
}
