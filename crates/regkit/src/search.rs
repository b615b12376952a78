//! Key search.

use crate::accumulate::PathList;
use crate::enumerate::Enumerator;
use crate::error::{RegistryError, RegistryResult};
use crate::matcher::SearchTerm;
use crate::path::KeyPath;
use crate::store::RegistryKey;

/// Every key below `root` that matches `term`, in enumeration order.
/// Paths are relative to `root`.
///
/// An empty result is fine when there are keys but none match. A `root`
/// with no keys at all fails with [`RegistryError::NoNodesEnumerated`].
#[tracing::instrument(skip(enumerator, root))]
pub fn find_nodes<K: RegistryKey>(
    enumerator: &Enumerator,
    root: &K,
    term: &str,
) -> RegistryResult<PathList> {
    let term = SearchTerm::new(term)?;
    let all = enumerator.list_all_descendants(root, &KeyPath::root())?;
    if all.is_empty() {
        return Err(RegistryError::NoNodesEnumerated);
    }
    let total = all.len();
    let found: PathList = all.into_iter().filter(|p| term.matches(p)).collect();
    tracing::debug!(total, found = found.len(), "search finished");
    Ok(found)
}
