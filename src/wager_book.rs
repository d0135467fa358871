// 3.5 wager_book.rs: append-only store of placed wagers. source of truth for
// exposure and settlement. wagers are never deleted; only status changes.

use crate::types::{Amount, EventId, MarketId, Timestamp, UserId, WagerId, WagerStatus};
use crate::wager::{ValidatedWager, Wager, WagerFilter};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug)]
struct BookState {
    wagers: BTreeMap<WagerId, Wager>,
    next_id: u64,
}

#[derive(Debug)]
pub struct WagerBook {
    state: RwLock<BookState>,
}

impl Default for WagerBook {
    fn default() -> Self {
        Self::new()
    }
}

impl WagerBook {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(BookState {
                wagers: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    pub fn append(&self, user_id: UserId, input: ValidatedWager, payout: Amount, created_at: Timestamp) -> Wager {
        let mut state = self.state.write();
        let id = WagerId(state.next_id);
        state.next_id += 1;

        let wager = Wager {
            id,
            user_id,
            event_id: input.event_id,
            market_id: input.market_id,
            match_name: input.match_name,
            selection_name: input.selection_name,
            category: input.category,
            side: input.side,
            selection_id: input.selection_id,
            fancy_threshold: input.fancy_threshold,
            stake: input.stake,
            price: input.price,
            status: WagerStatus::Pending,
            payout,
            created_at,
        };
        state.wagers.insert(id, wager.clone());
        wager
    }

    pub fn get(&self, id: WagerId) -> Option<Wager> {
        self.state.read().wagers.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.read().wagers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Matching wagers, newest first.
    pub fn query(&self, filter: &WagerFilter) -> Vec<Wager> {
        let state = self.state.read();
        let mut found: Vec<Wager> = state.wagers.values().filter(|w| filter.matches(w)).cloned().collect();
        found.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        found
    }

    pub fn pending_for_event(&self, event_id: &EventId) -> Vec<Wager> {
        self.state
            .read()
            .wagers
            .values()
            .filter(|w| w.is_pending() && &w.event_id == event_id)
            .cloned()
            .collect()
    }

    /// Markets where the user still holds pending ordinary (non-tiered) wagers.
    pub fn pending_ordinary_markets(&self, user_id: UserId) -> BTreeSet<(EventId, MarketId)> {
        self.state
            .read()
            .wagers
            .values()
            .filter(|w| w.user_id == user_id && w.is_pending() && !w.is_tiered())
            .map(|w| (w.event_id.clone(), w.market_id.clone()))
            .collect()
    }

    /// Events where the user still holds pending tiered wagers.
    pub fn pending_tiered_events(&self, user_id: UserId) -> BTreeSet<EventId> {
        self.state
            .read()
            .wagers
            .values()
            .filter(|w| w.user_id == user_id && w.is_pending() && w.is_tiered())
            .map(|w| w.event_id.clone())
            .collect()
    }

    pub fn pending_tiered_for(&self, user_id: UserId, event_id: &EventId) -> Vec<Wager> {
        self.state
            .read()
            .wagers
            .values()
            .filter(|w| w.user_id == user_id && w.is_pending() && w.is_tiered() && &w.event_id == event_id)
            .cloned()
            .collect()
    }

    /// Applies a settlement batch atomically. Only wagers still pending are
    /// transitioned; the returned list holds exactly those.
    pub fn commit_settlement(&self, updates: &[(WagerId, WagerStatus)]) -> Vec<Wager> {
        let mut state = self.state.write();
        let mut applied = Vec::with_capacity(updates.len());

        for (id, status) in updates {
            if let Some(wager) = state.wagers.get_mut(id) {
                if wager.is_pending() && !status.is_pending() {
                    wager.status = *status;
                    applied.push(wager.clone());
                }
            }
        }

        applied
    }

    /// Runs `decide` against the current wager while holding the write lock and
    /// stores the status it returns. `None` if the wager does not exist.
    pub fn update_status<T, E>(
        &self,
        id: WagerId,
        decide: impl FnOnce(&Wager) -> Result<(WagerStatus, T), E>,
    ) -> Option<Result<(Wager, T), E>> {
        let mut state = self.state.write();
        let wager = state.wagers.get_mut(&id)?;
        Some(decide(wager).map(|(status, extra)| {
            wager.status = status;
            (wager.clone(), extra)
        }))
    }
}
