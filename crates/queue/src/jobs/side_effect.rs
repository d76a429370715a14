//! Side-effect job.

use chrono::{DateTime, Utc};
use mediateam_core::SideEffect;
use serde::{Deserialize, Serialize};

/// Job carrying one side effect to a queue worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideEffectJob {
    /// The effect to execute.
    pub effect: SideEffect,

    /// When the effect was queued.
    pub enqueued_at: DateTime<Utc>,
}

impl SideEffectJob {
    /// Create a new side-effect job stamped with the current time.
    #[must_use]
    pub fn new(effect: SideEffect) -> Self {
        Self {
            effect,
            enqueued_at: Utc::now(),
        }
    }
}
