//! Catalog ids still waiting for a detail record

use crate::storage::{Storage, StorageResult};
use std::collections::HashSet;

/// Ids present in the catalog collection but absent from the detail one
///
/// Reads both id sets from the store on every call. The result is unordered.
pub fn pending_detail_ids(storage: &dyn Storage) -> StorageResult<HashSet<String>> {
    let enriched = storage.detail_ids()?;
    let pending: HashSet<String> = storage
        .catalog_ids()?
        .into_iter()
        .filter(|id| !enriched.contains(id))
        .collect();

    tracing::debug!(
        "{} catalog ids pending enrichment ({} already enriched)",
        pending.len(),
        enriched.len()
    );

    Ok(pending)
}
