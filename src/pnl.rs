//! Wager economics.
//!
//! Every wager has two outcomes: it wins and realizes `profit`, or it loses and
//! realizes `loss` (always negative). Match odds use decimal prices, bookmaker
//! and fancy markets quote a percentage rate.

use crate::types::{Amount, Category, ParseError, Price, Side};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitLoss {
    pub profit: Amount,
    pub loss: Amount,
}

impl ProfitLoss {
    /// Balance change realized when the wager resolves.
    pub fn realized(&self, won: bool) -> Amount {
        if won {
            self.profit
        } else {
            self.loss
        }
    }
}

/// Placement bounds stake and price through `PlacementConfig`; outside those
/// bounds the liability saturates at the decimal range instead of panicking.
pub fn calculate_profit_and_loss(stake: Decimal, price: Price, side: Side, category: Category) -> ProfitLoss {
    let price = price.value();

    let liability = match category {
        Category::MatchOdds => stake.saturating_mul(price - Decimal::ONE),
        Category::Bookmaker | Category::Fancy => stake.saturating_mul(price) / dec!(100),
    };

    let (profit, loss) = match side {
        Side::Back => (liability, -stake),
        Side::Lay => (stake, -liability),
    };

    ProfitLoss {
        profit: Amount::new(profit),
        loss: Amount::new(loss),
    }
}

/// Text entry point: parses category and side before computing.
pub fn profit_and_loss_from_text(
    stake: Decimal,
    price: Price,
    side: &str,
    category: &str,
) -> Result<ProfitLoss, ParseError> {
    let category: Category = category.parse()?;
    let side: Side = side.parse()?;
    Ok(calculate_profit_and_loss(stake, price, side, category))
}

/// Payout credited on a win: the stake back plus profit. fixed at placement.
pub fn payout(stake: Decimal, pnl: &ProfitLoss) -> Amount {
    Amount::new(stake).add(pnl.profit)
}
