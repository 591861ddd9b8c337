use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use super::ReconcileError;

/// Progress of one in-flight attempt through reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilePhase {
    PendingSubmit,
    Aggregating,
    ModelPrimaryPending,
    ModelTargetPending,
    Merging,
    Persisting,
    Complete,
    Failed,
}

impl ReconcilePhase {
    pub fn can_transition_to(&self, next: ReconcilePhase) -> bool {
        use ReconcilePhase::*;
        match (self, next) {
            (Complete | Failed, _) => false,
            (_, Failed) => true,
            (PendingSubmit, Aggregating)
            | (Aggregating, ModelPrimaryPending)
            | (ModelPrimaryPending, ModelTargetPending)
            | (ModelTargetPending, Merging)
            | (Merging, Persisting)
            | (Persisting, Complete) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcilePhase::PendingSubmit => "pending_submit",
            ReconcilePhase::Aggregating => "aggregating",
            ReconcilePhase::ModelPrimaryPending => "model_primary_pending",
            ReconcilePhase::ModelTargetPending => "model_target_pending",
            ReconcilePhase::Merging => "merging",
            ReconcilePhase::Persisting => "persisting",
            ReconcilePhase::Complete => "complete",
            ReconcilePhase::Failed => "failed",
        }
    }
}

impl fmt::Display for ReconcilePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Records the ordered phase trace and rejects illegal transitions
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    trace: Vec<ReconcilePhase>,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            trace: vec![ReconcilePhase::PendingSubmit],
        }
    }

    pub fn current(&self) -> ReconcilePhase {
        self.trace
            .last()
            .copied()
            .unwrap_or(ReconcilePhase::PendingSubmit)
    }

    pub fn advance(&mut self, next: ReconcilePhase) -> Result<(), ReconcileError> {
        let current = self.current();
        if !current.can_transition_to(next) {
            warn!(from = %current, to = %next, "Rejected reconcile phase transition");
            return Err(ReconcileError::Internal(format!(
                "illegal phase transition {} -> {}",
                current, next
            )));
        }
        debug!(from = %current, to = %next, "Reconcile phase");
        self.trace.push(next);
        Ok(())
    }

    /// Moves to `Failed` unless the attempt already finished
    pub fn fail(&mut self) {
        if self.current().can_transition_to(ReconcilePhase::Failed) {
            self.trace.push(ReconcilePhase::Failed);
        }
    }

    pub fn trace(&self) -> &[ReconcilePhase] {
        &self.trace
    }
}
