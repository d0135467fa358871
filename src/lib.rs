// wager-core: risk-exposure and settlement engine for a wagering platform.
// exposure-first architecture: no wager is accepted that the balance cannot cover.
// all money math is decimal; settlement is the only part that touches I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: ids, Side, Category, WagerStatus, Price, Amount
//   2.x  pnl.rs: profit/loss per side and category, payout
//   3.x  wager.rs: wager record, placement request + validation, filters
//   3.5  wager_book.rs: append-only wager store
//   4.x  margin.rs: versioned per-market margin chains, wager folding
//   5.x  exposure.rs: ordinary exposure, tiered bracket sweep
//   6.x  transition.rs: status state machine and balance effects
//   7.x  config.rs: placement limits, feed batching, env presets
//   8.x  engine/: engine facade: placement, queries, corrections, settlement
//   9.x  outcome_feed.rs: outcome feed trait, bounded batch fetching, open-market lookup
//   9.1  settlement.rs: settlement planning and single-flight passes
//   10.x account.rs: balances and account status
//   11.x events.rs: state transition events for audit

// core modules
pub mod account;
pub mod engine;
pub mod events;
pub mod exposure;
pub mod margin;
pub mod pnl;
pub mod transition;
pub mod types;
pub mod wager;
pub mod wager_book;

// integration modules
pub mod config;
pub mod outcome_feed;
pub mod settlement;

// re exports for convenience
pub use account::*;
pub use engine::*;
pub use events::*;
pub use exposure::*;
pub use margin::*;
pub use pnl::*;
pub use transition::*;
pub use types::*;
pub use wager::*;
pub use wager_book::WagerBook;
pub use config::{ConfigError, EngineConfig, Environment, PlacementConfig, SettlementConfig};
pub use outcome_feed::{
    fetch_outcomes, market_is_open, FeedError, InMemoryOutcomeFeed, MarketOutcome, Outcome, OutcomeFeed, RunnerPrice,
};
pub use settlement::{plan_settlement, SettlementError, SettlementPlan, SettlementProcessor, SettlementReport};
