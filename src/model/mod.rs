pub mod outcome;
pub mod result;
pub mod snapshot;

pub use outcome::{AcquisitionOutcome, AcquisitionStatus};
pub use result::{MaxPainResult, PremiumBias};
pub use snapshot::{OptionChainSnapshot, StrikeRow};

/// Standard US equity option contract multiplier.
pub const CONTRACT_MULTIPLIER: u64 = 100;
