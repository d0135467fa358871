// 11.0: every state change produces an event. used for audit trails and for
// notifying external systems. the EventPayload enum lists all event types.

use crate::margin::MarginVersion;
use crate::types::{Amount, Category, EventId, MarketId, SelectionId, Side, Timestamp, UserId, WagerId, WagerStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AuditId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: AuditId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl AuditEvent {
    pub fn new(id: AuditId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self { id, timestamp, payload }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    // Account events
    AccountOpened(AccountOpenedEvent),
    Deposit(DepositEvent),
    UserBanned(UserBannedEvent),

    // Placement events
    WagerPlaced(WagerPlacedEvent),
    WagerRejected(WagerRejectedEvent),
    MarginUpdated(MarginUpdatedEvent),

    // Settlement events
    SettlementCompleted(SettlementCompletedEvent),
    StatusCorrected(StatusCorrectedEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountOpenedEvent {
    pub user_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositEvent {
    pub user_id: UserId,
    pub amount: Amount,
    pub new_balance: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBannedEvent {
    pub user_id: UserId,
    pub banned: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WagerPlacedEvent {
    pub wager_id: WagerId,
    pub user_id: UserId,
    pub event_id: EventId,
    pub market_id: MarketId,
    pub category: Category,
    pub side: Side,
    pub stake: Amount,
    pub payout: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WagerRejectedEvent {
    pub user_id: UserId,
    pub market_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginUpdatedEvent {
    pub user_id: UserId,
    pub market_id: MarketId,
    pub selection_id: SelectionId,
    pub profit: Amount,
    pub loss: Amount,
    pub version: MarginVersion,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementCompletedEvent {
    pub event_id: EventId,
    pub settled: usize,
    pub unresolved: usize,
    pub total_delta: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusCorrectedEvent {
    pub wager_id: WagerId,
    pub user_id: UserId,
    pub from: WagerStatus,
    pub to: WagerStatus,
    pub balance_delta: Amount,
    pub new_balance: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn payload_is_tagged() {
        let event = AuditEvent::new(
            AuditId(1),
            Timestamp(10),
            EventPayload::Deposit(DepositEvent {
                user_id: UserId(3),
                amount: Amount::new(dec!(100)),
                new_balance: Amount::new(dec!(100)),
            }),
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["payload"]["type"], "deposit");
        assert_eq!(json["payload"]["user_id"], 3);
    }
}
