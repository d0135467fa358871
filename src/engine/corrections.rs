// 8.3 engine/corrections.rs: manual status changes through the transition guard.
// legality and balance are checked before the wager or the balance moves.

use super::core::Engine;
use super::results::{CorrectionResult, EngineError};
use crate::events::{EventPayload, StatusCorrectedEvent};
use crate::transition::plan_transition;
use crate::types::{Amount, WagerId, WagerStatus};
use crate::wager::Wager;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Raw correction request; `status` arrives as text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionRequest {
    pub wager_id: WagerId,
    pub status: String,
}

// previous status, balance delta, balance after
type Applied = (WagerStatus, Amount, Amount);

impl Engine {
    pub fn apply_correction(&self, request: CorrectionRequest) -> Result<CorrectionResult, EngineError> {
        let target: WagerStatus = request.status.parse()?;
        self.correct_wager_status(request.wager_id, target)
    }

    pub fn correct_wager_status(&self, wager_id: WagerId, target: WagerStatus) -> Result<CorrectionResult, EngineError> {
        let policy = self.config.correction_policy;

        // the wager's write lock is held while the balance moves, so a racing
        // correction on the same wager sees the new status
        let outcome = self.wagers.update_status(wager_id, |wager: &Wager| -> Result<(WagerStatus, Applied), EngineError> {
            let effect = plan_transition(wager.status, target, wager.stake_amount(), wager.payout, policy)?;
            let new_balance = self
                .accounts
                .increment_if_at_least(wager.user_id, effect.min_balance, effect.delta)?;
            Ok((target, (wager.status, effect.delta, new_balance)))
        });

        let (wager, (from, balance_delta, new_balance)) = match outcome {
            None => return Err(EngineError::WagerNotFound(wager_id)),
            Some(Err(e)) => {
                warn!(wager = wager_id.0, to = %target, error = %e, "correction refused");
                return Err(e);
            }
            Some(Ok(done)) => done,
        };

        info!(
            wager = wager_id.0,
            user = wager.user_id.0,
            from = %from,
            to = %target,
            delta = %balance_delta,
            "wager status corrected"
        );

        self.emit_event(EventPayload::StatusCorrected(StatusCorrectedEvent {
            wager_id,
            user_id: wager.user_id,
            from,
            to: target,
            balance_delta,
            new_balance,
        }));

        Ok(CorrectionResult {
            wager,
            from,
            balance_delta,
            new_balance,
        })
    }
}
