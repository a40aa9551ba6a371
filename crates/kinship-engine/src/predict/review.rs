//! Reviewer decisions on predictions.
//!
//! `New → Confirmed`, `New → Dismissed`, `New | Confirmed → Applied`.
//! Dismissed and Applied are terminal.

use chrono::Utc;

use kinship_core::{
    Actor, AppliedRef, GraphError, PredictedRelationship, PredictionStatus, ReviewAction,
};

/// Reject any transition outside the review lifecycle.
pub fn check_transition(
    status: PredictionStatus,
    action: &ReviewAction,
) -> Result<(), GraphError> {
    use PredictionStatus::*;
    let allowed = matches!(
        (status, action),
        (New, ReviewAction::Confirm)
            | (New, ReviewAction::Dismiss { .. })
            | (New | Confirmed, ReviewAction::Apply)
    );
    if allowed {
        Ok(())
    } else {
        Err(GraphError::InvalidTransition {
            from: status,
            action: action.as_str(),
        })
    }
}

fn resolved(
    prediction: &PredictedRelationship,
    status: PredictionStatus,
    actor: &Actor,
) -> PredictedRelationship {
    let mut next = prediction.clone();
    next.status = status;
    next.resolved_at = Some(Utc::now());
    next.resolved_by = Some(actor.id.clone());
    next
}

pub fn confirmed(prediction: &PredictedRelationship, actor: &Actor) -> PredictedRelationship {
    resolved(prediction, PredictionStatus::Confirmed, actor)
}

pub fn dismissed(
    prediction: &PredictedRelationship,
    reason: Option<String>,
    actor: &Actor,
) -> PredictedRelationship {
    let mut next = resolved(prediction, PredictionStatus::Dismissed, actor);
    next.dismiss_reason = reason;
    next
}

/// The row held as Applied while its record is being created.
pub fn claimed(prediction: &PredictedRelationship, actor: &Actor) -> PredictedRelationship {
    let mut next = resolved(prediction, PredictionStatus::Applied, actor);
    next.applied_ref = None;
    next
}

pub fn applied(
    prediction: &PredictedRelationship,
    record: AppliedRef,
    actor: &Actor,
) -> PredictedRelationship {
    let mut next = resolved(prediction, PredictionStatus::Applied, actor);
    next.applied_ref = Some(record);
    next.last_failure = None;
    next
}

/// The prediction with a rejected apply recorded; the status is unchanged.
pub fn apply_failed(prediction: &PredictedRelationship, error: &GraphError) -> PredictedRelationship {
    let mut next = prediction.clone();
    next.last_failure = Some(format!("{}: {}", error.code(), error));
    next
}
