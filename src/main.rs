//! Wagering engine simulation.
//!
//! Walks the engine through placement with hedging, tiered exposure,
//! settlement with a flaky outcome feed, and manual status corrections.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use wager_core::*;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .init();

    println!("Wagering Engine Simulation");
    println!("Margin Chains, Tiered Exposure, Batched Settlement\n");

    scenario_1_hedged_placement();
    scenario_2_tiered_exposure();
    scenario_3_settlement_with_feed_outage().await;
    scenario_4_status_corrections().await;

    println!("\nAll simulations completed successfully.");
}

fn new_engine(feed: Arc<InMemoryOutcomeFeed>) -> Engine {
    match Engine::new(EngineConfig::default(), feed) {
        Ok(engine) => engine,
        Err(e) => panic!("default config rejected: {e}"),
    }
}

fn selection_wager(event: &str, market: &str, selection: u64, side: &str, stake: Decimal, price: Decimal) -> PlaceWager {
    PlaceWager {
        event_id: event.into(),
        match_name: "Lions v Tigers".into(),
        market_id: market.into(),
        selection: format!("runner {selection}"),
        selection_id: Some(SelectionId(selection)),
        fancy_threshold: None,
        stake,
        price,
        category: "match odds".into(),
        side: side.into(),
    }
}

fn fancy_wager(event: &str, market: &str, side: &str, stake: Decimal, threshold: Decimal) -> PlaceWager {
    PlaceWager {
        event_id: event.into(),
        match_name: "Lions v Tigers".into(),
        market_id: market.into(),
        selection: format!("over {threshold}"),
        selection_id: None,
        fancy_threshold: Some(threshold),
        stake,
        price: dec!(100),
        category: "fancy".into(),
        side: side.into(),
    }
}

/// Back one runner, then hedge on the other: the second wager needs no headroom.
fn scenario_1_hedged_placement() {
    println!("Scenario 1: Hedged Placement\n");

    let engine = new_engine(Arc::new(InMemoryOutcomeFeed::new()));
    let alice = engine.create_account();
    engine.deposit(alice, Amount::new(dec!(10000))).unwrap();

    let first = engine
        .place_wager(alice, selection_wager("evt-1", "1.100", 1, "back", dec!(1000), dec!(2.5)))
        .unwrap();
    println!(
        "  Alice backs runner 1: 1000 @ 2.5, profit {}, loss {}, payout {}",
        first.profit_loss.profit, first.profit_loss.loss, first.wager.payout
    );

    let second = engine
        .place_wager(alice, selection_wager("evt-1", "1.100", 2, "back", dec!(500), dec!(3)))
        .unwrap();
    let margin = second.margin.unwrap();
    println!(
        "  Alice backs runner 2: 500 @ 3, margin now on selection {}: profit {}, loss {}",
        margin.selection_id.0, margin.profit, margin.loss
    );
    println!("  Exposure: {}\n", engine.total_exposure(alice).unwrap());
}

/// Bracketed fancy wagers on one market.
fn scenario_2_tiered_exposure() {
    println!("Scenario 2: Tiered Exposure\n");

    let engine = new_engine(Arc::new(InMemoryOutcomeFeed::new()));
    let bob = engine.create_account();
    engine.deposit(bob, Amount::new(dec!(5000))).unwrap();

    engine.place_wager(bob, fancy_wager("evt-2", "1.200-F1", "back", dec!(1000), dec!(50))).unwrap();
    println!("  Bob backs over 50 for 1000");
    engine.place_wager(bob, fancy_wager("evt-2", "1.200-F1", "lay", dec!(1000), dec!(60))).unwrap();
    println!("  Bob lays over 60 for 1000");

    for (market, exposure) in engine.tiered_exposure(bob, &EventId::new("evt-2")) {
        println!("  Market {}: exposure {}", market, exposure);
    }
    let summary = engine.exposure_summary(bob);
    println!("  Ordinary {}, tiered {}, total {}\n", summary.ordinary, summary.tiered, summary.total());
}

/// Placement checks the feed for live odds. Then one market's feed batch
/// fails and its wagers stay pending until the next pass.
async fn scenario_3_settlement_with_feed_outage() {
    println!("Scenario 3: Settlement With Feed Outage\n");

    let feed = Arc::new(InMemoryOutcomeFeed::new());
    let engine = new_engine(Arc::clone(&feed));
    let carol = engine.create_account();
    engine.deposit(carol, Amount::new(dec!(10000))).unwrap();

    let runner = RunnerPrice {
        selection_id: SelectionId(1),
        back: Some(dec!(2)),
        lay: Some(dec!(2.02)),
    };
    feed.open_market(Category::MatchOdds, MarketId::new("1.300"), vec![runner]);
    engine
        .place_wager_checked(carol, selection_wager("evt-3", "1.300", 1, "back", dec!(1000), dec!(2)))
        .await
        .unwrap();
    match engine
        .place_wager_checked(carol, selection_wager("evt-3", "1.301", 1, "back", dec!(100), dec!(2)))
        .await
    {
        Ok(_) => println!("  Unexpected: unquoted market accepted"),
        Err(e) => println!("  Unquoted market refused: {}", e),
    }
    engine.place_wager(carol, fancy_wager("evt-3", "1.300-F1", "back", dec!(200), dec!(40))).unwrap();

    feed.resolve(Category::MatchOdds, MarketId::new("1.300"), Outcome::Selection(SelectionId(1)));
    feed.resolve(Category::Fancy, MarketId::new("1.300-F1"), Outcome::Score(dec!(35)));
    feed.fail_market(MarketId::new("1.300-F1"));

    let report = engine.settle_event(&EventId::new("evt-3")).await.unwrap();
    println!(
        "  First pass: settled {}, unresolved {}, failed batches {}, delta {}",
        report.settled,
        report.unresolved,
        report.failed_batches,
        report.total_delta()
    );

    feed.heal();
    let report = engine.settle_event(&EventId::new("evt-3")).await.unwrap();
    println!(
        "  Second pass: settled {}, unresolved {}, delta {}",
        report.settled,
        report.unresolved,
        report.total_delta()
    );

    let report = engine.settle_event(&EventId::new("evt-3")).await.unwrap();
    println!("  Third pass: settled {}, delta {}", report.settled, report.total_delta());
    println!("  Carol balance: {}\n", engine.balance(carol).unwrap());
}

/// Corrections after settlement, including one the guard refuses.
async fn scenario_4_status_corrections() {
    println!("Scenario 4: Status Corrections\n");

    let feed = Arc::new(InMemoryOutcomeFeed::new());
    let engine = new_engine(Arc::clone(&feed));
    let dave = engine.create_account();
    engine.deposit(dave, Amount::new(dec!(2000))).unwrap();

    let placed = engine
        .place_wager(dave, selection_wager("evt-4", "1.400", 1, "back", dec!(100), dec!(3)))
        .unwrap();
    feed.resolve(Category::MatchOdds, MarketId::new("1.400"), Outcome::Selection(SelectionId(2)));
    engine.settle_event(&EventId::new("evt-4")).await.unwrap();
    println!("  Wager settled lost, balance {}", engine.balance(dave).unwrap());

    match engine.correct_wager_status(placed.wager.id, WagerStatus::Lost) {
        Ok(_) => println!("  Unexpected: repeat correction accepted"),
        Err(e) => println!("  Lost -> lost refused: {}", e),
    }

    match engine.apply_correction(CorrectionRequest {
        wager_id: placed.wager.id,
        status: "won".into(),
    }) {
        Ok(result) => println!(
            "  Lost -> won applied: delta {}, balance {}",
            result.balance_delta, result.new_balance
        ),
        Err(e) => println!("  Lost -> won refused: {}", e),
    }

    match engine.apply_correction(CorrectionRequest {
        wager_id: placed.wager.id,
        status: "pending".into(),
    }) {
        Ok(_) => println!("  Unexpected: reopen accepted"),
        Err(e) => println!("  Won -> pending refused ({:?}): {}", e.kind(), e),
    }

    println!("  Audit events recorded: {}", engine.events().len());
}
