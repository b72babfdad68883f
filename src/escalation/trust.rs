use crate::escalation::{clamp::clamp_pressure_allowance, types::EscalationCap};

/// Ceiling applied while the relationship with a circle is fragile.
pub const FRAGILE_TRUST_CEILING: EscalationCap = EscalationCap::SurfaceOnly;

/// Read-only view of trust state owned by the trust subsystem.
pub trait TrustSource: Send + Sync {
    fn has_baseline(&self, circle_id_hash: &str) -> bool;
    fn is_fragile(&self, circle_id_hash: &str) -> bool;
}

pub fn apply_trust_clamp(cap: EscalationCap, fragile: bool) -> EscalationCap {
    if fragile {
        clamp_pressure_allowance(cap, FRAGILE_TRUST_CEILING)
    } else {
        cap
    }
}
