//! Startup reconciliation of the fingerprint registry against the index

use crate::error::Result;
use crate::providers::VectorIndex;
use crate::storage::FingerprintRegistry;
use crate::types::ReconcileReport;

/// Bring the registry back in line with the index
///
/// - A fingerprint without an index record is purged, so the chunk is
///   embedded again on the next run.
/// - An index record without a fingerprint is marked; the stored vector
///   is kept and nothing is re-embedded.
///
/// Must not run concurrently with an indexing commit.
pub async fn reconcile(
    registry: &FingerprintRegistry,
    index: &dyn VectorIndex,
) -> Result<ReconcileReport> {
    let indexed = index.content_hashes().await?;
    let marked = registry.all()?;

    let orphaned: Vec<_> = marked.difference(&indexed).collect();
    let unmarked: Vec<_> = indexed.difference(&marked).collect();

    let mut report = ReconcileReport::default();
    if !orphaned.is_empty() {
        tracing::warn!(
            "Consistency violation: {} fingerprints have no index record, purging",
            orphaned.len()
        );
        report.purged = registry.purge_many(orphaned)?;
    }
    if !unmarked.is_empty() {
        tracing::warn!(
            "Consistency violation: {} index records have no fingerprint, marking",
            unmarked.len()
        );
        report.healed = registry.mark_many(unmarked)?;
    }

    tracing::info!(
        "Reconciled {} on {} records: {} purged, {} healed",
        index.name(),
        indexed.len(),
        report.purged,
        report.healed
    );
    Ok(report)
}
