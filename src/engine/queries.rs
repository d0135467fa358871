// 8.4 engine/queries.rs: read side. exposure, margins, wager history, accounts.

use super::core::Engine;
use super::results::EngineError;
use crate::account::Account;
use crate::exposure::{snapshot_exposure, tiered_exposure_unordered, ExposureSummary, TieredLeg};
use crate::margin::{MarginKey, MarginSnapshot};
use crate::types::{Amount, EventId, MarketId, UserId, WagerId};
use crate::wager::{Wager, WagerFilter};
use std::collections::BTreeMap;

impl Engine {
    /// Worst-case loss over every ordinary market the user still has pending wagers in.
    pub fn ordinary_exposure(&self, user_id: UserId) -> Amount {
        self.wagers
            .pending_ordinary_markets(user_id)
            .into_iter()
            .filter_map(|(event_id, market_id)| self.margins.latest(&MarginKey::new(user_id, event_id, market_id)))
            .map(|s| snapshot_exposure(s.profit, s.loss))
            .sum()
    }

    /// Signed exposure per tiered market of one event.
    pub fn tiered_exposure(&self, user_id: UserId, event_id: &EventId) -> BTreeMap<MarketId, Amount> {
        let mut legs: BTreeMap<MarketId, Vec<TieredLeg>> = BTreeMap::new();
        for wager in self.wagers.pending_tiered_for(user_id, event_id) {
            if let Some(leg) = TieredLeg::from_wager(&wager) {
                legs.entry(wager.market_id).or_default().push(leg);
            }
        }

        legs.into_iter()
            .map(|(market_id, legs)| (market_id, tiered_exposure_unordered(legs)))
            .collect()
    }

    pub fn exposure_summary(&self, user_id: UserId) -> ExposureSummary {
        let tiered: Amount = self
            .wagers
            .pending_tiered_events(user_id)
            .iter()
            .flat_map(|event_id| self.tiered_exposure(user_id, event_id).into_values())
            .map(|exposure| exposure.abs())
            .sum();

        ExposureSummary {
            ordinary: self.ordinary_exposure(user_id),
            tiered,
        }
    }

    pub fn total_exposure(&self, user_id: UserId) -> Result<Amount, EngineError> {
        if !self.accounts.contains(user_id) {
            return Err(EngineError::UserNotFound(user_id));
        }
        Ok(self.exposure_summary(user_id).total())
    }

    pub fn current_margins(&self, user_id: UserId, event_id: &EventId) -> BTreeMap<MarketId, MarginSnapshot> {
        self.margins
            .current_for_event(user_id, event_id)
            .into_iter()
            .map(|(market_id, snapshot)| (market_id, (*snapshot).clone()))
            .collect()
    }

    pub fn margin_history(&self, user_id: UserId, event_id: &EventId, market_id: &MarketId) -> Vec<MarginSnapshot> {
        let key = MarginKey::new(user_id, event_id.clone(), market_id.clone());
        self.margins.history(&key).iter().map(|s| (**s).clone()).collect()
    }

    pub fn wager(&self, wager_id: WagerId) -> Result<Wager, EngineError> {
        self.wagers.get(wager_id).ok_or(EngineError::WagerNotFound(wager_id))
    }

    /// The user's wagers, newest first, optionally narrowed to one event.
    pub fn wager_history(&self, user_id: UserId, event_id: Option<&EventId>) -> Vec<Wager> {
        self.wagers.query(&WagerFilter {
            user_id: Some(user_id),
            event_id: event_id.cloned(),
            ..Default::default()
        })
    }

    pub fn query_wagers(&self, filter: &WagerFilter) -> Vec<Wager> {
        self.wagers.query(filter)
    }

    pub fn account(&self, user_id: UserId) -> Result<Account, EngineError> {
        self.accounts.get(user_id).ok_or(EngineError::UserNotFound(user_id))
    }
}
