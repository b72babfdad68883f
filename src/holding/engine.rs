use time::OffsetDateTime;

use crate::holding::types::{
    Eligibility, HoldingAction, HoldingContract, HoldingEffect, HoldingPressure, HoldingScope,
    HoldingSubject, IneligibleReason,
};

/// First failing precondition wins.
pub fn can_create_contract(
    has_trust_baseline: bool,
    has_active_preview: bool,
    has_active_contract: bool,
) -> Eligibility {
    if !has_trust_baseline {
        return Eligibility::refused(IneligibleReason::TrustMissing);
    }
    if has_active_preview {
        return Eligibility::refused(IneligibleReason::InterruptPreviewActive);
    }
    if has_active_contract {
        return Eligibility::refused(IneligibleReason::ContractAlreadyActive);
    }
    Eligibility::allowed()
}

fn scope_matches(scope: HoldingScope, subject: HoldingSubject) -> bool {
    match scope {
        HoldingScope::Human => subject == HoldingSubject::Human,
        HoldingScope::Institution => matches!(
            subject,
            HoldingSubject::Institution | HoldingSubject::ExternalDerived
        ),
    }
}

pub fn apply_contract(
    contract: &HoldingContract,
    pressure: &HoldingPressure,
    now: OffsetDateTime,
) -> HoldingEffect {
    if !contract.is_active_at(now) || contract.circle_id_hash != pressure.circle_id_hash {
        return HoldingEffect::NoEffect;
    }
    if !scope_matches(contract.scope, pressure.subject) {
        return HoldingEffect::NoEffect;
    }
    if pressure.horizon > contract.max_horizon {
        return HoldingEffect::NoEffect;
    }
    if pressure.magnitude > contract.max_magnitude {
        return HoldingEffect::NoEffect;
    }

    match contract.action {
        HoldingAction::HoldSilently => HoldingEffect::Hold,
        HoldingAction::QueueProof => HoldingEffect::QueueProof,
    }
}
