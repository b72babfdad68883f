use crate::escalation::types::EscalationCap;

/// Reduction-only combination of a current allowance and a ceiling.
///
/// The result never orders above `current`; every cap source in the crate goes
/// through this primitive.
pub fn clamp_pressure_allowance(current: EscalationCap, cap: EscalationCap) -> EscalationCap {
    if cap.order() < current.order() {
        cap
    } else {
        current
    }
}

/// Folds any number of ceilings into `current`.
pub fn clamp_all(
    current: EscalationCap,
    ceilings: impl IntoIterator<Item = EscalationCap>,
) -> EscalationCap {
    ceilings
        .into_iter()
        .fold(current, clamp_pressure_allowance)
}
