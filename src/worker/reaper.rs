//! Activate handler: delete every cache generation except the current one

use crate::config::WorkerConfig;
use crate::error::{SwCacheError, SwCacheResult};
use crate::host::CacheStorage;
use futures_util::future::join_all;
use tracing::{debug, info, warn};

/// Outcome of a successful activation cleanup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReapReport {
    /// Stale namespaces this pass deleted
    pub deleted: Vec<String>,
    /// Stale namespaces that were already gone when deletion ran
    pub already_absent: Vec<String>,
}

impl ReapReport {
    /// Number of stale namespaces handled, deleted or not
    pub fn stale_count(&self) -> usize {
        self.deleted.len() + self.already_absent.len()
    }
}

/// Delete every namespace whose name differs from the current generation.
///
/// Deletions run concurrently and are all awaited. A namespace that vanished
/// in the meantime counts as cleaned up; any other storage error fails the
/// activation once every deletion has been attempted.
pub async fn activate(
    config: &WorkerConfig,
    storage: &dyn CacheStorage,
) -> SwCacheResult<ReapReport> {
    let generation = config.generation();

    let names = storage.keys().await.map_err(|e| SwCacheError::Activation {
        generation: generation.to_string(),
        failures: vec![format!("listing namespaces: {}", e)],
    })?;

    let stale: Vec<String> = names.into_iter().filter(|name| name != generation).collect();
    if stale.is_empty() {
        debug!("No stale generations to remove");
        return Ok(ReapReport::default());
    }

    info!("Removing {} stale generation(s): {}", stale.len(), stale.join(", "));

    let outcomes = join_all(stale.into_iter().map(|name| async move {
        let outcome = storage.delete(&name).await;
        (name, outcome)
    }))
    .await;

    let mut report = ReapReport::default();
    let mut failures = Vec::new();
    for (name, outcome) in outcomes {
        match outcome {
            Ok(true) => {
                debug!("Deleted generation {}", name);
                report.deleted.push(name);
            }
            Ok(false) => {
                debug!("Generation {} was already absent", name);
                report.already_absent.push(name);
            }
            Err(e) => {
                warn!("Failed to delete generation {}: {}", name, e);
                failures.push(format!("{}: {}", name, e));
            }
        }
    }

    if !failures.is_empty() {
        return Err(SwCacheError::Activation {
            generation: generation.to_string(),
            failures,
        });
    }

    Ok(report)
}
