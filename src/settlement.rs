// 9.1 settlement.rs: resolves pending wagers of a finished event against official outcomes.
//
// a pass: load pending wagers → fetch outcomes per category in bounded batches →
// decide won/lost → reduce balance deltas per user → commit statuses and deltas.
// only still-pending wagers are ever picked up, so a repeat pass never double-applies.

use crate::account::{AccountBook, AccountError};
use crate::config::SettlementConfig;
use crate::outcome_feed::{fetch_outcomes, OutcomeFeed, Outcome};
use crate::pnl::calculate_profit_and_loss;
use crate::types::{Amount, Category, EventId, MarketId, Side, UserId, WagerId, WagerStatus};
use crate::wager::Wager;
use crate::wager_book::WagerBook;
use futures::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Decides a wager against its market outcome. `None` when the outcome shape
/// does not fit the category.
pub fn decide_wager(wager: &Wager, outcome: &Outcome) -> Option<bool> {
    match (wager.category, outcome) {
        (Category::MatchOdds | Category::Bookmaker, Outcome::Selection(winner)) => {
            let picked = wager.selection_id == Some(*winner);
            Some(match wager.side {
                Side::Back => picked,
                Side::Lay => !picked,
            })
        }
        (Category::Fancy, Outcome::Score(score)) => {
            let threshold = wager.fancy_threshold?;
            Some(match wager.side {
                Side::Back => threshold <= *score,
                Side::Lay => threshold > *score,
            })
        }
        _ => None,
    }
}

/// Balance change a decided wager realizes.
pub fn settlement_delta(wager: &Wager, won: bool) -> Amount {
    calculate_profit_and_loss(wager.stake, wager.price, wager.side, wager.category).realized(won)
}

/// Commutative per-user sum. order of `entries` never matters.
pub fn accumulate_deltas(entries: impl IntoIterator<Item = (UserId, Amount)>) -> BTreeMap<UserId, Amount> {
    let mut deltas = BTreeMap::new();
    for (user_id, delta) in entries {
        let slot = deltas.entry(user_id).or_insert_with(Amount::zero);
        *slot = slot.add(delta);
    }
    deltas
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettlementPlan {
    pub status_updates: Vec<(WagerId, WagerStatus)>,
    pub balance_deltas: BTreeMap<UserId, Amount>,
    pub unresolved: usize,
}

/// Pure planning step: decides every pending wager with a known outcome.
pub fn plan_settlement(pending: &[Wager], outcomes: &HashMap<(Category, MarketId), Outcome>) -> SettlementPlan {
    let mut plan = SettlementPlan::default();
    let mut deltas = Vec::with_capacity(pending.len());

    for wager in pending.iter().filter(|w| w.is_pending()) {
        let decision = outcomes
            .get(&(wager.category, wager.market_id.clone()))
            .and_then(|outcome| {
                let decision = decide_wager(wager, outcome);
                if decision.is_none() {
                    warn!(wager = wager.id.0, market = %wager.market_id, ?outcome, "outcome does not fit market category");
                }
                decision
            });

        match decision {
            Some(won) => {
                let status = if won { WagerStatus::Won } else { WagerStatus::Lost };
                plan.status_updates.push((wager.id, status));
                deltas.push((wager.user_id, settlement_delta(wager, won)));
            }
            None => plan.unresolved += 1,
        }
    }

    plan.balance_deltas = accumulate_deltas(deltas);
    plan
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReport {
    pub event_id: Option<EventId>,
    pub settled: usize,
    pub won: usize,
    pub lost: usize,
    pub unresolved: usize,
    pub failed_batches: usize,
    pub balance_deltas: BTreeMap<UserId, Amount>,
}

impl SettlementReport {
    pub fn total_delta(&self) -> Amount {
        self.balance_deltas.values().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettlementError {
    #[error("Settlement already running for event {0}")]
    PassInFlight(EventId),

    #[error("Account error: {0}")]
    Account(#[from] AccountError),
}

/// Removes the event from the in-flight set when the pass ends, however it ends.
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<EventId>>,
    event_id: EventId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.event_id);
    }
}

pub struct SettlementProcessor {
    wagers: Arc<WagerBook>,
    accounts: Arc<AccountBook>,
    feed: Arc<dyn OutcomeFeed>,
    config: SettlementConfig,
    in_flight: Mutex<HashSet<EventId>>,
}

impl std::fmt::Debug for SettlementProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettlementProcessor")
            .field("feed", &self.feed.source_name())
            .field("config", &self.config)
            .finish()
    }
}

impl SettlementProcessor {
    pub fn new(
        wagers: Arc<WagerBook>,
        accounts: Arc<AccountBook>,
        feed: Arc<dyn OutcomeFeed>,
        config: SettlementConfig,
    ) -> Self {
        Self {
            wagers,
            accounts,
            feed,
            config,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    fn claim(&self, event_id: &EventId) -> Result<InFlightGuard<'_>, SettlementError> {
        let mut in_flight = self.in_flight.lock();
        if !in_flight.insert(event_id.clone()) {
            return Err(SettlementError::PassInFlight(event_id.clone()));
        }
        Ok(InFlightGuard {
            in_flight: &self.in_flight,
            event_id: event_id.clone(),
        })
    }

    pub fn feed(&self) -> &dyn OutcomeFeed {
        self.feed.as_ref()
    }

    pub fn is_in_flight(&self, event_id: &EventId) -> bool {
        self.in_flight.lock().contains(event_id)
    }

    /// Runs one settlement pass for `event_id`.
    pub async fn settle_event(&self, event_id: &EventId) -> Result<SettlementReport, SettlementError> {
        let _guard = self.claim(event_id)?;

        let pending = self.wagers.pending_for_event(event_id);
        if pending.is_empty() {
            debug!(event = %event_id, "no pending wagers");
            return Ok(SettlementReport {
                event_id: Some(event_id.clone()),
                ..Default::default()
            });
        }

        let mut by_category: BTreeMap<Category, BTreeSet<MarketId>> = BTreeMap::new();
        for wager in &pending {
            by_category.entry(wager.category).or_default().insert(wager.market_id.clone());
        }

        let timeout = Duration::from_millis(self.config.feed_timeout_ms);
        let feed = self.feed.as_ref();
        let fetches = by_category.into_iter().map(|(category, markets)| async move {
            let markets: Vec<MarketId> = markets.into_iter().collect();
            let fetched = fetch_outcomes(feed, category, &markets, self.config.feed_batch_size, timeout).await;
            (category, fetched)
        });

        let mut outcomes = HashMap::new();
        let mut failed_batches = 0;
        for (category, fetched) in join_all(fetches).await {
            failed_batches += fetched.failed_batches;
            for (market_id, outcome) in fetched.outcomes {
                outcomes.insert((category, market_id), outcome);
            }
        }

        let plan = plan_settlement(&pending, &outcomes);
        let report = self.commit(event_id, plan, failed_batches)?;

        info!(
            event = %event_id,
            settled = report.settled,
            won = report.won,
            lost = report.lost,
            unresolved = report.unresolved,
            failed_batches = report.failed_batches,
            "settlement pass complete"
        );
        Ok(report)
    }

    fn commit(
        &self,
        event_id: &EventId,
        plan: SettlementPlan,
        failed_batches: usize,
    ) -> Result<SettlementReport, SettlementError> {
        if let Some(missing) = plan.balance_deltas.keys().find(|id| !self.accounts.contains(**id)) {
            warn!(event = %event_id, user = missing.0, "settlement aborted, account missing");
            return Err(AccountError::NotFound(*missing).into());
        }

        // a concurrent correction may have moved some wagers since planning.
        // deltas are rebuilt from what actually transitioned.
        let applied = self.wagers.commit_settlement(&plan.status_updates);

        let mut report = SettlementReport {
            event_id: Some(event_id.clone()),
            unresolved: plan.unresolved,
            failed_batches,
            ..Default::default()
        };

        let mut deltas = Vec::with_capacity(applied.len());
        for wager in &applied {
            let won = wager.status == WagerStatus::Won;
            if won {
                report.won += 1;
            } else {
                report.lost += 1;
            }
            deltas.push((wager.user_id, settlement_delta(wager, won)));
        }
        report.settled = applied.len();
        report.balance_deltas = accumulate_deltas(deltas);

        if applied.len() < plan.status_updates.len() {
            debug!(
                event = %event_id,
                skipped = plan.status_updates.len() - applied.len(),
                "wagers no longer pending at commit"
            );
        }

        self.accounts.apply_batch(&report.balance_deltas)?;
        Ok(report)
    }

    /// Runs passes for several events concurrently. each event's result is independent.
    pub async fn settle_events(&self, event_ids: &[EventId]) -> Vec<(EventId, Result<SettlementReport, SettlementError>)> {
        let passes = event_ids.iter().map(|event_id| async move {
            let result = self.settle_event(event_id).await;
            (event_id.clone(), result)
        });
        join_all(passes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Price, SelectionId, Timestamp};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn wager(id: u64, user: u64, category: Category, side: Side, selection: Option<u64>, threshold: Option<Decimal>) -> Wager {
        Wager {
            id: WagerId(id),
            user_id: UserId(user),
            event_id: EventId::new("e1"),
            market_id: MarketId::new("m1"),
            match_name: "A v B".into(),
            selection_name: "A".into(),
            category,
            side,
            selection_id: selection.map(SelectionId),
            fancy_threshold: threshold,
            stake: dec!(100),
            price: Price::new_unchecked(dec!(2)),
            status: WagerStatus::Pending,
            payout: Amount::new(dec!(200)),
            created_at: Timestamp(0),
        }
    }

    #[test]
    fn selection_markets() {
        let winner = Outcome::Selection(SelectionId(1));
        for category in [Category::MatchOdds, Category::Bookmaker] {
            assert_eq!(decide_wager(&wager(1, 1, category, Side::Back, Some(1), None), &winner), Some(true));
            assert_eq!(decide_wager(&wager(1, 1, category, Side::Back, Some(2), None), &winner), Some(false));
            assert_eq!(decide_wager(&wager(1, 1, category, Side::Lay, Some(1), None), &winner), Some(false));
            assert_eq!(decide_wager(&wager(1, 1, category, Side::Lay, Some(2), None), &winner), Some(true));
        }
    }

    #[test]
    fn fancy_markets_compare_threshold() {
        let score = Outcome::Score(dec!(50));
        let back_at = |t| wager(1, 1, Category::Fancy, Side::Back, None, Some(t));
        let lay_at = |t| wager(1, 1, Category::Fancy, Side::Lay, None, Some(t));

        assert_eq!(decide_wager(&back_at(dec!(50)), &score), Some(true));
        assert_eq!(decide_wager(&back_at(dec!(51)), &score), Some(false));
        assert_eq!(decide_wager(&lay_at(dec!(51)), &score), Some(true));
        assert_eq!(decide_wager(&lay_at(dec!(50)), &score), Some(false));
    }

    #[test]
    fn mismatched_outcome_shape_is_undecided() {
        let w = wager(1, 1, Category::Fancy, Side::Back, None, Some(dec!(10)));
        assert_eq!(decide_wager(&w, &Outcome::Selection(SelectionId(1))), None);
        let w = wager(1, 1, Category::MatchOdds, Side::Back, Some(1), None);
        assert_eq!(decide_wager(&w, &Outcome::Score(dec!(1))), None);
    }

    #[test]
    fn plan_leaves_unknown_markets_pending() {
        let known = wager(1, 1, Category::MatchOdds, Side::Back, Some(1), None);
        let mut unknown = wager(2, 1, Category::MatchOdds, Side::Back, Some(1), None);
        unknown.market_id = MarketId::new("m2");

        let mut outcomes = HashMap::new();
        outcomes.insert((Category::MatchOdds, MarketId::new("m1")), Outcome::Selection(SelectionId(1)));

        let plan = plan_settlement(&[known, unknown], &outcomes);
        assert_eq!(plan.status_updates, vec![(WagerId(1), WagerStatus::Won)]);
        assert_eq!(plan.unresolved, 1);
        // match odds back 100 @ 2 → +100
        assert_eq!(plan.balance_deltas[&UserId(1)].value(), dec!(100));
    }

    #[test]
    fn deltas_accumulate_per_user() {
        let deltas = accumulate_deltas([
            (UserId(1), Amount::new(dec!(100))),
            (UserId(2), Amount::new(dec!(-50))),
            (UserId(1), Amount::new(dec!(-30))),
        ]);
        assert_eq!(deltas[&UserId(1)].value(), dec!(70));
        assert_eq!(deltas[&UserId(2)].value(), dec!(-50));
    }
}
