// 8.0.2: result types and errors for engine operations.

use crate::account::AccountError;
use crate::config::ConfigError;
use crate::margin::MarginSnapshot;
use crate::outcome_feed::FeedError;
use crate::pnl::ProfitLoss;
use crate::settlement::SettlementError;
use crate::transition::TransitionError;
use crate::types::{Amount, EventId, MarketId, ParseError, UserId, WagerId, WagerStatus};
use crate::wager::{ValidationError, Wager};

#[derive(Debug, Clone)]
pub struct Placement {
    pub wager: Wager,
    pub profit_loss: ProfitLoss,
    // absent for tiered markets
    pub margin: Option<MarginSnapshot>,
}

#[derive(Debug, Clone)]
pub struct CorrectionResult {
    pub wager: Wager,
    pub from: WagerStatus,
    pub balance_delta: Amount,
    pub new_balance: Amount,
}

/// Coarse classification callers map onto responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    BusinessRule,
    NotFound,
    UpstreamUnavailable,
    Configuration,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("User {0:?} not found")]
    UserNotFound(UserId),

    #[error("Wager {0:?} not found")]
    WagerNotFound(WagerId),

    #[error("User {0:?} is banned")]
    UserBanned(UserId),

    #[error("Validation error: {0}")]
    Validation(ValidationError),

    #[error("Invalid category '{0}'")]
    InvalidCategory(String),

    #[error("Invalid side '{0}'")]
    InvalidSide(String),

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: Amount, available: Amount },

    #[error("Wager status is already {0}")]
    AlreadyInStatus(WagerStatus),

    #[error("Cannot change status from {from} to {to}")]
    IllegalTransition { from: WagerStatus, to: WagerStatus },

    #[error("Margin chain kept moving after {attempts} attempts")]
    MarginContention { attempts: u32 },

    #[error("Settlement already running for event {0}")]
    PassInFlight(EventId),

    #[error("Outcome feed unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Odds expired for market {0}")]
    OddsExpired(MarketId),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::UserNotFound(_) | EngineError::WagerNotFound(_) => ErrorKind::NotFound,
            EngineError::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            EngineError::Config(_) => ErrorKind::Configuration,
            EngineError::UserBanned(_)
            | EngineError::InvalidCategory(_)
            | EngineError::InvalidSide(_)
            | EngineError::InsufficientBalance { .. }
            | EngineError::AlreadyInStatus(_)
            | EngineError::IllegalTransition { .. }
            | EngineError::MarginContention { .. }
            | EngineError::PassInFlight(_)
            | EngineError::OddsExpired(_) => ErrorKind::BusinessRule,
        }
    }
}

impl From<ParseError> for EngineError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::InvalidCategory(raw) => EngineError::InvalidCategory(raw),
            ParseError::InvalidSide(raw) => EngineError::InvalidSide(raw),
            other => EngineError::Validation(ValidationError::Parse(other)),
        }
    }
}

impl From<ValidationError> for EngineError {
    fn from(e: ValidationError) -> Self {
        match e {
            ValidationError::Parse(parse) => parse.into(),
            other => EngineError::Validation(other),
        }
    }
}

impl From<AccountError> for EngineError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::NotFound(id) => EngineError::UserNotFound(id),
            AccountError::InsufficientBalance { required, available } => {
                EngineError::InsufficientBalance { required, available }
            }
        }
    }
}

impl From<TransitionError> for EngineError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::AlreadyInStatus(status) => EngineError::AlreadyInStatus(status),
            TransitionError::IllegalTransition { from, to } => EngineError::IllegalTransition { from, to },
        }
    }
}

impl From<SettlementError> for EngineError {
    fn from(e: SettlementError) -> Self {
        match e {
            SettlementError::PassInFlight(event_id) => EngineError::PassInFlight(event_id),
            SettlementError::Account(account) => account.into(),
        }
    }
}

impl From<FeedError> for EngineError {
    fn from(e: FeedError) -> Self {
        EngineError::UpstreamUnavailable(e.to_string())
    }
}
