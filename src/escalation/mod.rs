pub mod clamp;
pub mod resolver;
pub mod trust;
pub mod types;

pub use clamp::{clamp_all, clamp_pressure_allowance};
pub use resolver::{CapSources, UrgencyResolver, baseline_level, level_to_cap, resolve};
pub use trust::{FRAGILE_TRUST_CEILING, TrustSource, apply_trust_clamp};
pub use types::{
    CircleType, EscalationCap, HorizonBucket, InterruptAllowance, MagnitudeBucket, PressureInput,
    ReasonBucket, ResolutionStatus, UrgencyLevel, UrgencyResolution, WindowSignal,
};
