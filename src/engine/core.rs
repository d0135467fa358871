// 8.0 engine/core.rs: main engine. holds accounts, the wager book, margin chains,
// the settlement processor and the audit log.

use super::results::EngineError;
use crate::account::{AccountBook, AccountStatus};
use crate::config::EngineConfig;
use crate::events::{AccountOpenedEvent, AuditEvent, AuditId, DepositEvent, EventPayload, UserBannedEvent};
use crate::margin::MarginLedger;
use crate::outcome_feed::OutcomeFeed;
use crate::settlement::SettlementProcessor;
use crate::types::{Amount, Timestamp, UserId};
use crate::wager_book::WagerBook;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug)]
pub(super) struct AuditLog {
    pub(super) events: Vec<AuditEvent>,
    pub(super) next_id: u64,
}

/** 8.1: main engine struct. all state lives here, shareable across threads */
#[derive(Debug)]
pub struct Engine {
    pub(super) config: EngineConfig,
    pub(super) accounts: Arc<AccountBook>,
    pub(super) wagers: Arc<WagerBook>,
    pub(super) margins: MarginLedger,
    pub(super) settlement: SettlementProcessor,
    pub(super) audit: Mutex<AuditLog>,
    // one guard per user; held from the headroom check until the wager is recorded
    pub(super) placement_locks: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
    pub(super) next_user_id: AtomicU64,
    pub(super) current_time: AtomicI64,
}

impl Engine {
    pub fn new(config: EngineConfig, feed: Arc<dyn OutcomeFeed>) -> Result<Self, EngineError> {
        config.validate()?;

        let accounts = Arc::new(AccountBook::new());
        let wagers = Arc::new(WagerBook::new());
        let settlement = SettlementProcessor::new(
            Arc::clone(&wagers),
            Arc::clone(&accounts),
            feed,
            config.settlement.clone(),
        );

        Ok(Self {
            config,
            accounts,
            wagers,
            margins: MarginLedger::new(),
            settlement,
            audit: Mutex::new(AuditLog {
                events: Vec::new(),
                next_id: 1,
            }),
            placement_locks: Mutex::new(HashMap::new()),
            next_user_id: AtomicU64::new(1),
            current_time: AtomicI64::new(Timestamp::now().as_millis()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_time(&self, timestamp: Timestamp) {
        self.current_time.store(timestamp.as_millis(), Ordering::SeqCst);
    }

    pub fn time(&self) -> Timestamp {
        Timestamp::from_millis(self.current_time.load(Ordering::SeqCst))
    }

    pub fn advance_time(&self, millis: i64) {
        self.current_time.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn create_account(&self) -> UserId {
        let id = UserId(self.next_user_id.fetch_add(1, Ordering::SeqCst));
        self.accounts.open(id, self.time());
        self.emit_event(EventPayload::AccountOpened(AccountOpenedEvent { user_id: id }));
        debug!(user = id.0, "account opened");
        id
    }

    pub(super) fn placement_lock(&self, user_id: UserId) -> Arc<Mutex<()>> {
        Arc::clone(self.placement_locks.lock().entry(user_id).or_default())
    }

    pub fn balance(&self, user_id: UserId) -> Result<Amount, EngineError> {
        Ok(self.accounts.balance(user_id)?)
    }

    pub fn deposit(&self, user_id: UserId, amount: Amount) -> Result<Amount, EngineError> {
        let new_balance = self.accounts.increment(user_id, amount)?;
        self.emit_event(EventPayload::Deposit(DepositEvent {
            user_id,
            amount,
            new_balance,
        }));
        Ok(new_balance)
    }

    pub fn ban_user(&self, user_id: UserId) -> Result<(), EngineError> {
        self.set_banned(user_id, true)
    }

    pub fn unban_user(&self, user_id: UserId) -> Result<(), EngineError> {
        self.set_banned(user_id, false)
    }

    fn set_banned(&self, user_id: UserId, banned: bool) -> Result<(), EngineError> {
        let status = if banned { AccountStatus::Banned } else { AccountStatus::Active };
        self.accounts.set_status(user_id, status)?;
        self.emit_event(EventPayload::UserBanned(UserBannedEvent { user_id, banned }));
        info!(user = user_id.0, banned, "account status changed");
        Ok(())
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.audit.lock().events.clone()
    }

    pub fn recent_events(&self, count: usize) -> Vec<AuditEvent> {
        let audit = self.audit.lock();
        let start = audit.events.len().saturating_sub(count);
        audit.events[start..].to_vec()
    }

    pub(super) fn emit_event(&self, payload: EventPayload) {
        let mut audit = self.audit.lock();
        let event = AuditEvent::new(AuditId(audit.next_id), self.time(), payload);
        audit.next_id += 1;
        audit.events.push(event);

        if audit.events.len() > self.config.max_events {
            let drain_count = audit.events.len() - self.config.max_events;
            audit.events.drain(0..drain_count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome_feed::InMemoryOutcomeFeed;

    fn engine() -> Engine {
        Engine::new(EngineConfig::default(), Arc::new(InMemoryOutcomeFeed::new())).unwrap()
    }

    #[test]
    fn clock_starts_at_wall_time() {
        let before = Timestamp::now().as_millis();
        let engine = engine();
        assert!(engine.time().as_millis() >= before);

        engine.set_time(Timestamp::from_millis(1_000));
        engine.advance_time(500);
        assert_eq!(engine.time(), Timestamp::from_millis(1_500));
    }

    #[test]
    fn accounts_are_stamped_with_engine_time() {
        let engine = engine();
        engine.set_time(Timestamp::from_millis(42));
        let user = engine.create_account();
        assert_eq!(engine.account(user).unwrap().created_at, Timestamp::from_millis(42));
    }

    #[test]
    fn placement_lock_is_shared_per_user() {
        let engine = engine();
        let a = engine.placement_lock(UserId(1));
        let b = engine.placement_lock(UserId(1));
        let other = engine.placement_lock(UserId(2));
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &other));
    }
}
