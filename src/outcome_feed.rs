// Outcome feed integration
//
// The engine does not care where official results come from. A feed answers a
// batch of market ids with prices and, once a market is resolved, its winner.
// Calls are batched, run in parallel and bounded by a timeout; a batch that
// fails or times out simply yields no outcomes for its ids.
//
// Placement asks the same feed whether a market still quotes prices. A market
// the feed does not know, or one already resolved, is closed for new wagers.

use crate::types::{Category, MarketId, SelectionId};
use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Official result of a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Outcome {
    /// Winning selection of a match odds or bookmaker market.
    Selection(SelectionId),
    /// Final number of a fancy market.
    Score(Decimal),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerPrice {
    pub selection_id: SelectionId,
    pub back: Option<Decimal>,
    pub lay: Option<Decimal>,
}

/// One market as reported by the feed. `winner` absent means unresolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketOutcome {
    pub market_id: MarketId,
    #[serde(default)]
    pub runners: Vec<RunnerPrice>,
    pub winner: Option<Outcome>,
}

impl MarketOutcome {
    pub fn unresolved(market_id: MarketId) -> Self {
        Self {
            market_id,
            runners: Vec::new(),
            winner: None,
        }
    }

    pub fn resolved(market_id: MarketId, winner: Outcome) -> Self {
        Self {
            market_id,
            runners: Vec::new(),
            winner: Some(winner),
        }
    }

    /// Live market quoting `runners`.
    pub fn open(market_id: MarketId, runners: Vec<RunnerPrice>) -> Self {
        Self {
            market_id,
            runners,
            winner: None,
        }
    }

    /// Still trading: no winner yet and at least one runner quoted.
    pub fn is_open(&self) -> bool {
        self.winner.is_none() && !self.runners.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    #[error("Feed unavailable: {0}")]
    Unavailable(String),

    #[error("Feed call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Batch of {size} exceeds feed limit {limit}")]
    BatchTooLarge { size: usize, limit: usize },
}

#[async_trait]
pub trait OutcomeFeed: Send + Sync {
    /// Looks up a batch of markets of one category.
    async fn fetch(&self, category: Category, market_ids: &[MarketId]) -> Result<Vec<MarketOutcome>, FeedError>;

    fn source_name(&self) -> &str;
}

/// Resolved outcomes of one category, gathered across batches.
#[derive(Debug, Clone, Default)]
pub struct FetchedOutcomes {
    pub outcomes: HashMap<MarketId, Outcome>,
    pub failed_batches: usize,
    pub batches: usize,
}

/// Requests `market_ids` in chunks of at most `batch_size`, all chunks in
/// parallel. A failed or timed-out chunk contributes nothing.
pub async fn fetch_outcomes(
    feed: &dyn OutcomeFeed,
    category: Category,
    market_ids: &[MarketId],
    batch_size: usize,
    timeout: Duration,
) -> FetchedOutcomes {
    let batch_size = batch_size.max(1);
    let calls = market_ids.chunks(batch_size).map(|chunk| async move {
        match tokio::time::timeout(timeout, feed.fetch(category, chunk)).await {
            Ok(Ok(markets)) => Ok(markets),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(FeedError::Timeout(timeout)),
        }
    });

    let mut fetched = FetchedOutcomes::default();
    for result in join_all(calls).await {
        fetched.batches += 1;
        match result {
            Ok(markets) => {
                for market in markets {
                    if let Some(winner) = market.winner {
                        fetched.outcomes.insert(market.market_id, winner);
                    }
                }
            }
            Err(e) => {
                fetched.failed_batches += 1;
                warn!(feed = feed.source_name(), %category, error = %e, "outcome batch failed, markets left unresolved");
            }
        }
    }

    debug!(
        %category,
        requested = market_ids.len(),
        resolved = fetched.outcomes.len(),
        failed_batches = fetched.failed_batches,
        "fetched outcomes"
    );
    fetched
}

/// Single-market lookup used before accepting a wager. Errors and timeouts
/// are returned, not swallowed: placement cannot proceed on unknown odds.
pub async fn market_is_open(
    feed: &dyn OutcomeFeed,
    category: Category,
    market_id: &MarketId,
    timeout: Duration,
) -> Result<bool, FeedError> {
    let markets = tokio::time::timeout(timeout, feed.fetch(category, std::slice::from_ref(market_id)))
        .await
        .map_err(|_| FeedError::Timeout(timeout))??;

    Ok(markets
        .iter()
        .any(|market| &market.market_id == market_id && market.is_open()))
}

/// In-memory feed for tests and simulation. Markets can be made to fail or
/// stall so partial-failure paths are reachable.
#[derive(Debug, Default)]
pub struct InMemoryOutcomeFeed {
    markets: RwLock<HashMap<(Category, MarketId), MarketOutcome>>,
    failing: RwLock<HashSet<MarketId>>,
    stalled: RwLock<HashMap<MarketId, Duration>>,
    max_batch: Option<usize>,
    calls: AtomicUsize,
}

impl InMemoryOutcomeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects calls carrying more than `limit` ids, like the upstream service.
    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.max_batch = Some(limit);
        self
    }

    pub fn publish(&self, category: Category, outcome: MarketOutcome) {
        self.markets.write().insert((category, outcome.market_id.clone()), outcome);
    }

    pub fn open_market(&self, category: Category, market_id: MarketId, runners: Vec<RunnerPrice>) {
        self.publish(category, MarketOutcome::open(market_id, runners));
    }

    pub fn resolve(&self, category: Category, market_id: MarketId, winner: Outcome) {
        self.publish(category, MarketOutcome::resolved(market_id, winner));
    }

    /// Any batch that contains `market_id` fails.
    pub fn fail_market(&self, market_id: MarketId) {
        self.failing.write().insert(market_id);
    }

    /// Any batch that contains `market_id` sleeps for `delay` first.
    pub fn stall_market(&self, market_id: MarketId, delay: Duration) {
        self.stalled.write().insert(market_id, delay);
    }

    pub fn heal(&self) {
        self.failing.write().clear();
        self.stalled.write().clear();
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OutcomeFeed for InMemoryOutcomeFeed {
    async fn fetch(&self, category: Category, market_ids: &[MarketId]) -> Result<Vec<MarketOutcome>, FeedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(limit) = self.max_batch {
            if market_ids.len() > limit {
                return Err(FeedError::BatchTooLarge {
                    size: market_ids.len(),
                    limit,
                });
            }
        }

        let delay = {
            let stalled = self.stalled.read();
            market_ids.iter().filter_map(|id| stalled.get(id).copied()).max()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(id) = market_ids.iter().find(|id| self.failing.read().contains(*id)) {
            return Err(FeedError::Unavailable(format!("market {} unavailable", id)));
        }

        let markets = self.markets.read();
        Ok(market_ids
            .iter()
            .filter_map(|id| markets.get(&(category, id.clone())).cloned())
            .collect())
    }

    fn source_name(&self) -> &str {
        "in-memory"
    }
}
