// 8.2 engine/placement.rs: wager placement. validate, price, fold into the
// margin chain (ordinary) or check the balance directly (tiered), then append.
// 8.2.1 checked placement asks the outcome feed that the market is still open first.

use super::core::Engine;
use super::results::{EngineError, Placement};
use crate::events::{EventPayload, MarginUpdatedEvent, WagerPlacedEvent, WagerRejectedEvent};
use crate::margin::{fold_wager, LedgerError, MarginKey, MarginSnapshot};
use crate::outcome_feed::market_is_open;
use crate::pnl::{calculate_profit_and_loss, payout, ProfitLoss};
use crate::types::{Amount, SelectionId, UserId};
use crate::wager::{PlaceWager, ValidatedWager};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

impl Engine {
    pub fn place_wager(&self, user_id: UserId, request: PlaceWager) -> Result<Placement, EngineError> {
        let market_id = request.market_id.clone();
        self.try_place(user_id, request)
            .map_err(|e| self.rejected(user_id, market_id, e))
    }

    /// Placement behind a live-odds lookup: the market must still be quoted by
    /// the outcome feed. Malformed requests are rejected before the feed is called.
    pub async fn place_wager_checked(&self, user_id: UserId, request: PlaceWager) -> Result<Placement, EngineError> {
        let market_id = request.market_id.clone();
        let input = match request.validate(&self.config.placement) {
            Ok(input) => input,
            Err(e) => return Err(self.rejected(user_id, market_id, e.into())),
        };

        let timeout = Duration::from_millis(self.config.settlement.feed_timeout_ms);
        let open = market_is_open(self.settlement.feed(), input.category, &input.market_id, timeout).await;
        match open {
            Ok(true) => self.place_wager(user_id, request),
            Ok(false) => Err(self.rejected(user_id, market_id, EngineError::OddsExpired(input.market_id))),
            Err(e) => Err(self.rejected(user_id, market_id, e.into())),
        }
    }

    fn rejected(&self, user_id: UserId, market_id: String, error: EngineError) -> EngineError {
        warn!(user = user_id.0, market = %market_id, error = %error, "wager rejected");
        self.emit_event(EventPayload::WagerRejected(WagerRejectedEvent {
            user_id,
            market_id,
            reason: error.to_string(),
        }));
        error
    }

    fn try_place(&self, user_id: UserId, request: PlaceWager) -> Result<Placement, EngineError> {
        // 1. account must exist and be active
        let account = self.accounts.get(user_id).ok_or(EngineError::UserNotFound(user_id))?;
        if account.is_banned() {
            return Err(EngineError::UserBanned(user_id));
        }

        // 2. validate and price
        let input = request.validate(&self.config.placement)?;
        let profit_loss = calculate_profit_and_loss(input.stake, input.price, input.side, input.category);

        // exposure spans every market of the user, so placements for one user
        // run one at a time from the headroom check until the wager is recorded
        let lock = self.placement_lock(user_id);
        let _placing = lock.lock();

        // 3. reserve margin
        let margin = match input.selection_id {
            Some(selection_id) if !input.category.is_tiered() => {
                Some(self.fold_into_chain(user_id, &input, selection_id, &profit_loss)?)
            }
            _ => {
                self.check_headroom(user_id, profit_loss.loss.abs())?;
                None
            }
        };

        // 4. record
        let wager_payout = payout(input.stake, &profit_loss);
        let wager = self.wagers.append(user_id, input, wager_payout, self.time());

        info!(
            wager = wager.id.0,
            user = user_id.0,
            market = %wager.market_id,
            category = %wager.category,
            side = %wager.side,
            stake = %wager.stake,
            "wager placed"
        );

        self.emit_event(EventPayload::WagerPlaced(WagerPlacedEvent {
            wager_id: wager.id,
            user_id,
            event_id: wager.event_id.clone(),
            market_id: wager.market_id.clone(),
            category: wager.category,
            side: wager.side,
            stake: wager.stake_amount(),
            payout: wager.payout,
        }));

        if let Some(snapshot) = &margin {
            self.emit_event(EventPayload::MarginUpdated(MarginUpdatedEvent {
                user_id,
                market_id: snapshot.market_id.clone(),
                selection_id: snapshot.selection_id,
                profit: snapshot.profit,
                loss: snapshot.loss,
                version: snapshot.version,
            }));
        }

        Ok(Placement {
            wager,
            profit_loss,
            margin: margin.map(|s| (*s).clone()),
        })
    }

    /// Compare-and-swap loop on the market's margin chain. A conflicting write
    /// means the chain moved underneath, so the fold and the balance check are
    /// redone against the new latest snapshot.
    fn fold_into_chain(
        &self,
        user_id: UserId,
        input: &ValidatedWager,
        selection_id: SelectionId,
        profit_loss: &ProfitLoss,
    ) -> Result<Arc<MarginSnapshot>, EngineError> {
        let key = MarginKey::new(user_id, input.event_id.clone(), input.market_id.clone());
        let attempts = self.config.placement.max_margin_retries;

        for attempt in 1..=attempts {
            let prior = self.margins.latest(&key);
            let fold = fold_wager(prior.as_deref(), selection_id, input.side, profit_loss);

            self.check_headroom(user_id, fold.required_headroom)?;

            let expected = prior.as_ref().map(|s| s.version);
            match self.margins.append(&key, expected, &fold, self.time()) {
                Ok(snapshot) => return Ok(snapshot),
                Err(LedgerError::VersionConflict { actual, .. }) => {
                    debug!(user = user_id.0, market = %key.market_id, attempt, ?actual, "margin chain moved, retrying");
                }
            }
        }

        warn!(user = user_id.0, market = %key.market_id, attempts, "margin contention");
        Err(EngineError::MarginContention { attempts })
    }

    /// Fails when the balance left after current exposure cannot cover `required`.
    pub(super) fn check_headroom(&self, user_id: UserId, required: Amount) -> Result<(), EngineError> {
        let balance = self.accounts.balance(user_id)?;
        let exposure = self.total_exposure(user_id)?;
        let available = balance.sub(exposure);

        if available < required {
            return Err(EngineError::InsufficientBalance { required, available });
        }
        Ok(())
    }
}
