// 6.0 transition.rs: wager status state machine with its balance math.
// pending → won | lost comes from settlement. won ↔ lost is a manual correction.
// a transition is validated completely before anything is mutated.

use crate::types::{Amount, WagerStatus};
use serde::{Deserialize, Serialize};

/// How won ↔ lost corrections move the balance.
///
/// `Legacy` keeps the platform's historical formula: lost → won debits
/// payout + 2·stake after checking balance ≥ payout − 2·stake, and won → lost
/// applies the inverse credit behind the same check. `Symmetric` undoes the
/// original settlement instead: lost → won credits payout, won → lost debits
/// payout and requires balance ≥ payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionPolicy {
    #[default]
    Legacy,
    Symmetric,
}

/// Balance change a transition will apply, plus the minimum balance that must
/// hold before it is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceEffect {
    pub delta: Amount,
    pub min_balance: Option<Amount>,
}

impl BalanceEffect {
    fn unchecked(delta: Amount) -> Self {
        Self { delta, min_balance: None }
    }

    fn guarded(delta: Amount, min_balance: Amount) -> Self {
        Self {
            delta,
            min_balance: Some(min_balance),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Wager status is already {0}")]
    AlreadyInStatus(WagerStatus),

    #[error("Cannot change status from {from} to {to}")]
    IllegalTransition { from: WagerStatus, to: WagerStatus },
}

pub fn is_legal(from: WagerStatus, to: WagerStatus) -> bool {
    use WagerStatus::*;
    matches!((from, to), (Pending, Won) | (Pending, Lost) | (Won, Lost) | (Lost, Won))
}

/// Validates `from → to` and returns its balance effect.
pub fn plan_transition(
    from: WagerStatus,
    to: WagerStatus,
    stake: Amount,
    payout: Amount,
    policy: CorrectionPolicy,
) -> Result<BalanceEffect, TransitionError> {
    if from == to {
        return Err(TransitionError::AlreadyInStatus(from));
    }
    if !is_legal(from, to) {
        return Err(TransitionError::IllegalTransition { from, to });
    }

    let double_stake = stake.mul(rust_decimal::Decimal::TWO);

    let effect = match (from, to, policy) {
        (WagerStatus::Pending, WagerStatus::Won, _) => BalanceEffect::unchecked(payout.sub(stake)),
        (WagerStatus::Pending, WagerStatus::Lost, _) => BalanceEffect::unchecked(stake.negate()),

        (WagerStatus::Lost, WagerStatus::Won, CorrectionPolicy::Legacy) => {
            BalanceEffect::guarded(payout.add(double_stake).negate(), payout.sub(double_stake))
        }
        (WagerStatus::Won, WagerStatus::Lost, CorrectionPolicy::Legacy) => {
            BalanceEffect::guarded(payout.add(double_stake), payout.sub(double_stake))
        }

        (WagerStatus::Lost, WagerStatus::Won, CorrectionPolicy::Symmetric) => BalanceEffect::unchecked(payout),
        (WagerStatus::Won, WagerStatus::Lost, CorrectionPolicy::Symmetric) => {
            BalanceEffect::guarded(payout.negate(), payout)
        }

        _ => return Err(TransitionError::IllegalTransition { from, to }),
    };

    Ok(effect)
}
