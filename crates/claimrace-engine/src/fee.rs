//! Fee selection for claim attempts.

use rand::seq::SliceRandom;

use claimrace_core::Fee;

use crate::error::{EngineError, EngineResult};

/// Competitive fee tiers drawn from in sponsor mode (stroops).
pub const DEFAULT_COMPETITIVE_FEES: [u64; 5] =
    [3_200_000, 9_400_000, 5_000_000, 7_500_000, 12_000_000];

/// Fixed fee for unsponsored claims (stroops).
pub const DEFAULT_DIRECT_FEE: u64 = 15_000_000;

/// Fee used by the relay monitor's transfer (stroops).
pub const DEFAULT_TRANSFER_FEE: u64 = 5_000_000;

/// Inputs available to a fee policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeContext {
    pub worker_id: usize,
    /// 1-based attempt number.
    pub attempt: u32,
    /// Whether a sponsor pays the fee.
    pub sponsored: bool,
}

/// Chooses the fee bid for one attempt.
pub trait FeePolicy: Send + Sync {
    fn next_fee(&self, ctx: &FeeContext) -> Fee;
}

/// Random competitive tier when sponsored, fixed high fee otherwise.
///
/// Varying the bid keeps workers from colliding on identical fees against
/// external competitors.
#[derive(Debug, Clone)]
pub struct TieredFeePolicy {
    competitive: Vec<Fee>,
    direct: Fee,
}

impl TieredFeePolicy {
    pub fn new(competitive: Vec<Fee>, direct: Fee) -> EngineResult<Self> {
        if competitive.is_empty() {
            return Err(EngineError::InvalidConfig(
                "competitive fee tiers must not be empty".to_string(),
            ));
        }
        Ok(Self {
            competitive,
            direct,
        })
    }

    pub fn tiers(&self) -> &[Fee] {
        &self.competitive
    }
}

impl Default for TieredFeePolicy {
    fn default() -> Self {
        Self {
            competitive: DEFAULT_COMPETITIVE_FEES.iter().copied().map(Fee).collect(),
            direct: Fee(DEFAULT_DIRECT_FEE),
        }
    }
}

impl FeePolicy for TieredFeePolicy {
    fn next_fee(&self, ctx: &FeeContext) -> Fee {
        if !ctx.sponsored {
            return self.direct;
        }
        self.competitive
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(self.direct)
    }
}

/// Same fee on every attempt.
#[derive(Debug, Clone, Copy)]
pub struct FixedFeePolicy(pub Fee);

impl FeePolicy for FixedFeePolicy {
    fn next_fee(&self, _ctx: &FeeContext) -> Fee {
        self.0
    }
}
