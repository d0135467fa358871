//! Net profit/loss positions for ordinary (selection) markets.
//!
//! Each (user, event, market) has a chain of immutable snapshots. A snapshot's
//! `profit` is the user's result if `selection_id` wins, `loss` is the result
//! if any other selection wins. Every new wager folds into the latest snapshot
//! and produces the next version of the chain.
//!
//! Writes are compare-and-swap on the chain's latest version, so two
//! placements racing on the same key cannot both build on the same
//! predecessor.

use crate::pnl::ProfitLoss;
use crate::types::{Amount, EventId, MarketId, SelectionId, Side, Timestamp, UserId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarginKey {
    pub user_id: UserId,
    pub event_id: EventId,
    pub market_id: MarketId,
}

impl MarginKey {
    pub fn new(user_id: UserId, event_id: EventId, market_id: MarketId) -> Self {
        Self {
            user_id,
            event_id,
            market_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MarginVersion(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginSnapshot {
    pub user_id: UserId,
    pub event_id: EventId,
    pub market_id: MarketId,
    pub selection_id: SelectionId,
    pub profit: Amount,
    pub loss: Amount,
    pub version: MarginVersion,
    pub created_at: Timestamp,
}

impl MarginSnapshot {
    pub fn key(&self) -> MarginKey {
        MarginKey::new(self.user_id, self.event_id.clone(), self.market_id.clone())
    }

    /// Worst of the two outcomes, floored at zero. Zero means no liability.
    pub fn worst_outcome(&self) -> Amount {
        worst_of(self.profit, self.loss)
    }
}

fn worst_of(profit: Amount, loss: Amount) -> Amount {
    profit.min(loss).min(Amount::zero())
}

/// 4.1: result of folding one wager into a chain, before it is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarginFold {
    pub selection_id: SelectionId,
    pub profit: Amount,
    pub loss: Amount,
    /// Extra liability this wager adds on top of the prior snapshot.
    pub required_headroom: Amount,
}

/// Folds a wager's economics into the prior snapshot of its market.
///
/// Without a prior, a back wager stores (profit, loss) and a lay wager stores
/// (loss, profit). With a prior, the wager's profit lands on the prior's profit
/// slot when `same_selection == is_back`, otherwise on the loss slot. The
/// result is keyed by the new wager's selection, so the slots swap when the
/// selection changes.
pub fn fold_wager(prior: Option<&MarginSnapshot>, selection_id: SelectionId, side: Side, pnl: &ProfitLoss) -> MarginFold {
    let (profit, loss, prior_worst) = match prior {
        None => {
            let (profit, loss) = match side {
                Side::Back => (pnl.profit, pnl.loss),
                Side::Lay => (pnl.loss, pnl.profit),
            };
            (profit, loss, Amount::zero())
        }
        Some(snapshot) => {
            let same_selection = snapshot.selection_id == selection_id;
            let aligned = same_selection == side.is_back();

            let new_profit = snapshot.profit.add(if aligned { pnl.profit } else { pnl.loss });
            let new_loss = snapshot.loss.add(if aligned { pnl.loss } else { pnl.profit });

            let (profit, loss) = if same_selection {
                (new_profit, new_loss)
            } else {
                (new_loss, new_profit)
            };
            (profit, loss, snapshot.worst_outcome())
        }
    };

    let worsening = worst_of(profit, loss).abs().sub(prior_worst.abs());
    let required_headroom = worsening.max(Amount::zero());

    MarginFold {
        selection_id,
        profit,
        loss,
        required_headroom,
    }
}

/// Replays an ordered sequence of (selection, side, economics) from an empty chain.
pub fn replay<'a>(wagers: impl IntoIterator<Item = (SelectionId, Side, &'a ProfitLoss)>) -> Option<(SelectionId, Amount, Amount)> {
    let mut current: Option<MarginSnapshot> = None;
    for (selection_id, side, pnl) in wagers {
        let fold = fold_wager(current.as_ref(), selection_id, side, pnl);
        let version = current.as_ref().map_or(1, |s| s.version.0 + 1);
        current = Some(MarginSnapshot {
            user_id: UserId(0),
            event_id: EventId::new(""),
            market_id: MarketId::new(""),
            selection_id: fold.selection_id,
            profit: fold.profit,
            loss: fold.loss,
            version: MarginVersion(version),
            created_at: Timestamp(0),
        });
    }
    current.map(|s| (s.selection_id, s.profit, s.loss))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Margin chain moved: expected {expected:?}, latest {actual:?}")]
    VersionConflict {
        expected: Option<MarginVersion>,
        actual: Option<MarginVersion>,
    },
}

/// 4.2: versioned margin chains. history is kept, the last entry is current.
#[derive(Debug, Default)]
pub struct MarginLedger {
    chains: RwLock<HashMap<MarginKey, Vec<Arc<MarginSnapshot>>>>,
}

impl MarginLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self, key: &MarginKey) -> Option<Arc<MarginSnapshot>> {
        self.chains.read().get(key).and_then(|chain| chain.last().cloned())
    }

    /// Appends the next version if the chain's latest still equals `expected`.
    pub fn append(
        &self,
        key: &MarginKey,
        expected: Option<MarginVersion>,
        fold: &MarginFold,
        created_at: Timestamp,
    ) -> Result<Arc<MarginSnapshot>, LedgerError> {
        let mut chains = self.chains.write();
        let chain = chains.entry(key.clone()).or_default();

        let actual = chain.last().map(|s| s.version);
        if actual != expected {
            return Err(LedgerError::VersionConflict { expected, actual });
        }

        let snapshot = Arc::new(MarginSnapshot {
            user_id: key.user_id,
            event_id: key.event_id.clone(),
            market_id: key.market_id.clone(),
            selection_id: fold.selection_id,
            profit: fold.profit,
            loss: fold.loss,
            version: MarginVersion(actual.map_or(1, |v| v.0 + 1)),
            created_at,
        });
        chain.push(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    pub fn history(&self, key: &MarginKey) -> Vec<Arc<MarginSnapshot>> {
        self.chains.read().get(key).cloned().unwrap_or_default()
    }

    /// Current snapshot of every market the user holds in one event.
    pub fn current_for_event(&self, user_id: UserId, event_id: &EventId) -> BTreeMap<MarketId, Arc<MarginSnapshot>> {
        self.chains
            .read()
            .iter()
            .filter(|(key, _)| key.user_id == user_id && &key.event_id == event_id)
            .filter_map(|(key, chain)| chain.last().map(|s| (key.market_id.clone(), Arc::clone(s))))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pnl::calculate_profit_and_loss;
    use crate::types::{Category, Price};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn pl(stake: Decimal, price: Decimal, side: Side) -> ProfitLoss {
        calculate_profit_and_loss(stake, Price::new_unchecked(price), side, Category::MatchOdds)
    }

    fn key() -> MarginKey {
        MarginKey::new(UserId(1), EventId::new("e1"), MarketId::new("1.1"))
    }

    #[test]
    fn first_back_wager_stores_profit_and_loss() {
        let fold = fold_wager(None, SelectionId(1), Side::Back, &pl(dec!(1000), dec!(2.5), Side::Back));
        assert_eq!(fold.profit.value(), dec!(1500));
        assert_eq!(fold.loss.value(), dec!(-1000));
        assert_eq!(fold.required_headroom.value(), dec!(1000));
    }

    #[test]
    fn first_lay_wager_swaps_slots() {
        let fold = fold_wager(None, SelectionId(1), Side::Lay, &pl(dec!(1000), dec!(2.5), Side::Lay));
        // if selection 1 wins the layer pays 1500
        assert_eq!(fold.profit.value(), dec!(-1500));
        assert_eq!(fold.loss.value(), dec!(1000));
        assert_eq!(fold.required_headroom.value(), dec!(1500));
    }

    #[test]
    fn opposing_selection_moves_ownership() {
        let ledger = MarginLedger::new();
        let first = fold_wager(None, SelectionId(1), Side::Back, &pl(dec!(1000), dec!(2.5), Side::Back));
        let snap = ledger.append(&key(), None, &first, Timestamp(1)).unwrap();

        let second = fold_wager(Some(&snap), SelectionId(2), Side::Back, &pl(dec!(500), dec!(3), Side::Back));
        // newProfit = 1500 - 500 = 1000 (selection 1 wins), newLoss = -1000 + 1000 = 0 (selection 2 wins)
        assert_eq!(second.selection_id, SelectionId(2));
        assert_eq!(second.profit.value(), dec!(0));
        assert_eq!(second.loss.value(), dec!(1000));
        assert_eq!(second.required_headroom.value(), dec!(0));

        let snap = ledger.append(&key(), Some(snap.version), &second, Timestamp(2)).unwrap();
        assert_eq!(snap.version, MarginVersion(2));
        assert_eq!(snap.worst_outcome().value(), dec!(0));
    }

    #[test]
    fn lay_on_same_selection_hedges_back() {
        let back = fold_wager(None, SelectionId(1), Side::Back, &pl(dec!(100), dec!(3), Side::Back));
        let prior = MarginSnapshot {
            user_id: UserId(1),
            event_id: EventId::new("e1"),
            market_id: MarketId::new("1.1"),
            selection_id: back.selection_id,
            profit: back.profit,
            loss: back.loss,
            version: MarginVersion(1),
            created_at: Timestamp(0),
        };
        let lay = fold_wager(Some(&prior), SelectionId(1), Side::Lay, &pl(dec!(100), dec!(3), Side::Lay));
        // back +200/-100, lay on same at same price: -200/+100 → flat
        assert_eq!(lay.profit.value(), dec!(0));
        assert_eq!(lay.loss.value(), dec!(0));
        assert_eq!(lay.required_headroom.value(), dec!(0));
    }

    #[test]
    fn stale_version_is_rejected() {
        let ledger = MarginLedger::new();
        let fold = fold_wager(None, SelectionId(1), Side::Back, &pl(dec!(10), dec!(2), Side::Back));
        ledger.append(&key(), None, &fold, Timestamp(1)).unwrap();

        let err = ledger.append(&key(), None, &fold, Timestamp(2)).unwrap_err();
        assert_eq!(
            err,
            LedgerError::VersionConflict {
                expected: None,
                actual: Some(MarginVersion(1)),
            }
        );
        assert_eq!(ledger.history(&key()).len(), 1);
    }

    #[test]
    fn replay_is_deterministic() {
        let a = pl(dec!(1000), dec!(2.5), Side::Back);
        let b = pl(dec!(500), dec!(3), Side::Back);
        let c = pl(dec!(200), dec!(4), Side::Lay);
        let seq = [(SelectionId(1), Side::Back, &a), (SelectionId(2), Side::Back, &b), (SelectionId(1), Side::Lay, &c)];

        let first = replay(seq);
        let second = replay(seq);
        assert_eq!(first, second);
        assert!(first.is_some());
    }

    #[test]
    fn current_for_event_picks_latest() {
        let ledger = MarginLedger::new();
        let f1 = fold_wager(None, SelectionId(1), Side::Back, &pl(dec!(10), dec!(2), Side::Back));
        let s1 = ledger.append(&key(), None, &f1, Timestamp(1)).unwrap();
        let f2 = fold_wager(Some(&s1), SelectionId(1), Side::Back, &pl(dec!(10), dec!(2), Side::Back));
        ledger.append(&key(), Some(s1.version), &f2, Timestamp(2)).unwrap();

        let other = MarginKey::new(UserId(1), EventId::new("e2"), MarketId::new("1.9"));
        ledger.append(&other, None, &f1, Timestamp(3)).unwrap();

        let current = ledger.current_for_event(UserId(1), &EventId::new("e1"));
        assert_eq!(current.len(), 1);
        assert_eq!(current[&MarketId::new("1.1")].profit.value(), dec!(20));
    }
}
