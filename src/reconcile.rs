use std::{fmt::Display, future::Future, time::Instant};

use tracing::{error, info, warn};

use crate::{
    backend::InventoryLister,
    model::{ModelOutcome, ModelRef, PresentSet, ReconcileEntry, ReconcileReport},
};

/// Fetches every desired model the lister does not report, one at a time.
///
/// The inventory is queried once per pass. A failed inventory query is treated
/// as an empty inventory, and a failed fetch is recorded without stopping the
/// pass, so the next entry is always attempted.
pub async fn reconcile<L, F, Fut, E>(
    desired: &[ModelRef],
    lister: &L,
    mut fetch: F,
) -> ReconcileReport
where
    L: InventoryLister + ?Sized,
    F: FnMut(ModelRef) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    let (present, inventory_confirmed) = match lister.list_present().await {
        Ok(present) => (present, true),
        Err(err) => {
            warn!(error = %err, "inventory query failed, assuming no models are cached");
            (PresentSet::new(), false)
        }
    };

    let mut entries = Vec::with_capacity(desired.len());

    for model in desired {
        if present.contains(model) {
            info!(%model, "model already present");
            entries.push(ReconcileEntry {
                model: model.clone(),
                outcome: ModelOutcome::AlreadyPresent,
            });
            continue;
        }

        info!(%model, "fetching model");
        let start = Instant::now();
        let outcome = match fetch(model.clone()).await {
            Ok(()) => {
                info!(%model, elapsed_ms = start.elapsed().as_millis(), "model fetched");
                ModelOutcome::Fetched
            }
            Err(err) => {
                error!(%model, error = %err, "failed to fetch model, continuing");
                ModelOutcome::FetchFailed {
                    error: err.to_string(),
                }
            }
        };
        entries.push(ReconcileEntry {
            model: model.clone(),
            outcome,
        });
    }

    let report = ReconcileReport {
        entries,
        inventory_confirmed,
    };
    info!(
        present = report.already_present().count(),
        fetched = report.fetched().count(),
        failed = report.failed().count(),
        "reconciliation finished"
    );
    report
}
