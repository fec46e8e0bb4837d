//! Funding calendar and contribution pricing.
//!
//! The stage is never stored. It is derived from the current tick and the
//! round boundaries:
//!
//!   tick <  funding_start   → NotStarted
//!   tick <  round_two       → Round1
//!   tick <  round_three     → Round2
//!   tick <  funding_end     → Round3
//!   otherwise               → Ended
//!
//! A tick equal to a boundary belongs to the stage that starts there.

use serde::{Deserialize, Serialize};

use crate::constants::FUNDING_ROUNDS;
use crate::error::SaleError;
use crate::params::TokenEconomics;
use crate::types::{Balance, Tick};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    NotStarted,
    Round1,
    Round2,
    Round3,
    Ended,
}

impl Stage {
    /// Zero-based bonus round index, or `None` outside the funding period.
    pub fn round_index(&self) -> Option<usize> {
        match self {
            Stage::Round1 => Some(0),
            Stage::Round2 => Some(1),
            Stage::Round3 => Some(2),
            Stage::NotStarted | Stage::Ended => None,
        }
    }

    pub fn is_funding(&self) -> bool {
        self.round_index().is_some()
    }
}

/// The four boundary ticks of the funding period.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FundingSchedule {
    pub funding_start: Tick,
    pub round_two: Tick,
    pub round_three: Tick,
    pub funding_end: Tick,
}

impl FundingSchedule {
    /// Split `duration` into three rounds of `duration / 3` ticks; the integer
    /// remainder extends round three.
    pub fn new(funding_start: Tick, duration: Tick) -> Self {
        let round_len = duration / FUNDING_ROUNDS;
        Self {
            funding_start,
            round_two: funding_start.saturating_add(round_len),
            round_three: funding_start.saturating_add(2 * round_len),
            funding_end: funding_start.saturating_add(duration),
        }
    }

    pub fn stage_at(&self, tick: Tick) -> Stage {
        if tick < self.funding_start {
            Stage::NotStarted
        } else if tick < self.round_two {
            Stage::Round1
        } else if tick < self.round_three {
            Stage::Round2
        } else if tick < self.funding_end {
            Stage::Round3
        } else {
            Stage::Ended
        }
    }
}

impl TokenEconomics {
    /// Bonus multiplier (percent) for `stage`, or `None` outside the rounds.
    pub fn bonus_multiplier(&self, stage: Stage) -> Option<u128> {
        stage.round_index().map(|i| self.bonus_multipliers[i])
    }

    /// Tokens minted for `amount` wei contributed during `stage`.
    ///
    /// tokens = exchange_rate_cents × bonus × floor(amount / conversion_divisor)
    ///
    /// Integer arithmetic only; the remainder of the division is dropped.
    pub fn tokens_for(&self, amount: Balance, stage: Stage) -> Result<Balance, SaleError> {
        let bonus = self
            .bonus_multiplier(stage)
            .ok_or(SaleError::WrongStage { stage })?;
        let scaled = amount / self.conversion_divisor;
        self.exchange_rate_cents
            .checked_mul(bonus)
            .and_then(|rate| rate.checked_mul(scaled))
            .ok_or(SaleError::Overflow("token conversion"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{UNITS_PER_TOKEN, WEI_PER_ETH};

    #[test]
    fn boundaries_belong_to_the_stage_that_starts_there() {
        let s = FundingSchedule::new(100, 30);
        assert_eq!(s.stage_at(99), Stage::NotStarted);
        assert_eq!(s.stage_at(100), Stage::Round1);
        assert_eq!(s.stage_at(109), Stage::Round1);
        assert_eq!(s.stage_at(110), Stage::Round2);
        assert_eq!(s.stage_at(120), Stage::Round3);
        assert_eq!(s.stage_at(129), Stage::Round3);
        assert_eq!(s.stage_at(130), Stage::Ended);
        assert_eq!(s.stage_at(u64::MAX), Stage::Ended);
    }

    #[test]
    fn remainder_extends_round_three() {
        let s = FundingSchedule::new(10, 10);
        assert_eq!((s.round_two, s.round_three, s.funding_end), (13, 16, 20));
        assert_eq!(s.stage_at(19), Stage::Round3);
    }

    #[test]
    fn one_eth_in_round_one_is_625_tokens() {
        let econ = TokenEconomics::default();
        let tokens = econ.tokens_for(WEI_PER_ETH, Stage::Round1).unwrap();
        assert_eq!(tokens, 625 * UNITS_PER_TOKEN);
    }

    #[test]
    fn bonus_decreases_across_rounds() {
        let econ = TokenEconomics::default();
        let r1 = econ.tokens_for(WEI_PER_ETH, Stage::Round1).unwrap();
        let r2 = econ.tokens_for(WEI_PER_ETH, Stage::Round2).unwrap();
        let r3 = econ.tokens_for(WEI_PER_ETH, Stage::Round3).unwrap();
        assert!(r1 > r2 && r2 > r3);
    }

    #[test]
    fn fractional_remainder_is_dropped() {
        let econ = TokenEconomics::default();
        // 19_999 wei → floor(19_999 / 10_000) = 1
        let tokens = econ.tokens_for(19_999, Stage::Round3).unwrap();
        assert_eq!(tokens, 50_000 * 105);
        assert_eq!(econ.tokens_for(9_999, Stage::Round1).unwrap(), 0);
    }

    #[test]
    fn no_price_outside_rounds() {
        let econ = TokenEconomics::default();
        assert!(matches!(
            econ.tokens_for(WEI_PER_ETH, Stage::Ended),
            Err(SaleError::WrongStage { stage: Stage::Ended })
        ));
        assert!(econ.bonus_multiplier(Stage::NotStarted).is_none());
    }
}
