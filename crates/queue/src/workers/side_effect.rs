//! Side-effect worker.

use std::sync::Arc;

use apalis::prelude::*;
use chrono::Utc;
use mediateam_core::SideEffectExecutor;
use tracing::{debug, error, warn};

use crate::jobs::SideEffectJob;

/// Worker function for executing queued side effects.
///
/// Server-side failures are returned as retryable; anything else aborts the job.
///
/// # Errors
/// Returns an error if the side effect fails.
pub async fn side_effect_worker(
    job: SideEffectJob,
    executor: Data<SideEffectExecutor>,
) -> Result<(), Error> {
    let kind = job.effect.kind();
    let queued_ms = (Utc::now() - job.enqueued_at).num_milliseconds();

    match executor.execute(&job.effect).await {
        Ok(()) => {
            debug!(kind, queued_ms, "Side effect completed");
            Ok(())
        }
        Err(e) if e.is_server_error() => {
            warn!(kind, error = %e, "Side effect failed, will retry");
            Err(Error::Failed(Arc::new(Box::new(e))))
        }
        Err(e) => {
            error!(kind, error = %e, effect = ?job.effect, "Side effect dropped");
            Err(Error::Abort(Arc::new(Box::new(e))))
        }
    }
}
