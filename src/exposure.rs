// 5.0 exposure.rs: worst-case loss across a user's pending wagers.
// 5.1 ordinary markets read it off the current margin snapshot.
// 5.2 tiered (fancy) markets sweep the wagers ordered by threshold.
//
// per-market tiered exposure is reported as a negative liability. totals are positive.

use crate::margin::MarginSnapshot;
use crate::types::{Amount, Side};
use crate::wager::Wager;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Worst-case loss of one ordinary market, as a positive amount.
pub fn snapshot_exposure(profit: Amount, loss: Amount) -> Amount {
    let zero = Amount::zero();
    if profit < zero && loss > zero {
        profit.abs()
    } else if profit < zero && loss < zero {
        profit.abs().max(loss.abs())
    } else if loss < zero {
        loss.abs()
    } else {
        zero
    }
}

pub fn ordinary_exposure<'a>(snapshots: impl IntoIterator<Item = &'a MarginSnapshot>) -> Amount {
    snapshots.into_iter().map(|s| snapshot_exposure(s.profit, s.loss)).sum()
}

/// One pending wager of a tiered market, stripped down to what the sweep needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TieredLeg {
    pub side: Side,
    pub stake: Decimal,
    pub threshold: Decimal,
}

impl TieredLeg {
    pub fn from_wager(wager: &Wager) -> Option<Self> {
        Some(Self {
            side: wager.side,
            stake: wager.stake,
            threshold: wager.fancy_threshold?,
        })
    }

    fn rated(&self) -> Decimal {
        self.stake * self.threshold / dec!(100)
    }
}

/// Stable ascending sort by threshold. ties keep arrival order.
pub fn order_legs(legs: &mut [TieredLeg]) {
    legs.sort_by(|a, b| a.threshold.cmp(&b.threshold));
}

/// Exposure of one tiered market over legs already ordered by threshold.
///
/// When the first back leg sits before the last lay leg, the legs between them
/// bracket an interval whose net is taken in absolute value. Every leg below the
/// first back is a lay and counts at its rated value; every leg above the last
/// lay is a back and counts at full stake.
/// Otherwise every back leg risks its stake and every lay leg its rated value.
pub fn tiered_market_exposure(ordered: &[TieredLeg]) -> Amount {
    let first_back = ordered.iter().position(|l| l.side == Side::Back);
    let last_lay = ordered.iter().rposition(|l| l.side == Side::Lay);

    let exposure = match (first_back, last_lay) {
        (Some(b), Some(l)) if b < l => {
            let below: Decimal = ordered[..b].iter().map(TieredLeg::rated).sum();

            let bracket: Decimal = ordered[b..=l]
                .iter()
                .map(|leg| match leg.side {
                    Side::Back => leg.rated(),
                    Side::Lay => -leg.rated(),
                })
                .sum();

            let above: Decimal = ordered[l + 1..].iter().map(|leg| leg.stake).sum();

            below + bracket.abs() + above
        }
        _ => ordered
            .iter()
            .map(|leg| match leg.side {
                Side::Back => leg.stake,
                Side::Lay => leg.rated(),
            })
            .sum(),
    };

    Amount::new(-exposure)
}

/// Orders the legs then sweeps. The input order only matters for ties.
pub fn tiered_exposure_unordered(mut legs: Vec<TieredLeg>) -> Amount {
    order_legs(&mut legs);
    tiered_market_exposure(&legs)
}

/// Aggregated exposure view for one user.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExposureSummary {
    pub ordinary: Amount,
    pub tiered: Amount,
}

impl ExposureSummary {
    pub fn total(&self) -> Amount {
        self.ordinary.add(self.tiered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn back(stake: Decimal, threshold: Decimal) -> TieredLeg {
        TieredLeg { side: Side::Back, stake, threshold }
    }

    fn lay(stake: Decimal, threshold: Decimal) -> TieredLeg {
        TieredLeg { side: Side::Lay, stake, threshold }
    }

    fn amt(v: Decimal) -> Amount {
        Amount::new(v)
    }

    #[test]
    fn snapshot_rules() {
        assert_eq!(snapshot_exposure(amt(dec!(-300)), amt(dec!(200))), amt(dec!(300)));
        assert_eq!(snapshot_exposure(amt(dec!(-300)), amt(dec!(-500))), amt(dec!(500)));
        assert_eq!(snapshot_exposure(amt(dec!(1500)), amt(dec!(-1000))), amt(dec!(1000)));
        assert_eq!(snapshot_exposure(amt(dec!(0)), amt(dec!(1000))), amt(dec!(0)));
        assert_eq!(snapshot_exposure(amt(dec!(100)), amt(dec!(100))), amt(dec!(0)));
    }

    #[test]
    fn empty_market_has_no_exposure() {
        assert_eq!(tiered_market_exposure(&[]), Amount::zero());
        assert_eq!(ordinary_exposure(std::iter::empty()), Amount::zero());
    }

    #[test]
    fn single_back_risks_stake() {
        assert_eq!(tiered_market_exposure(&[back(dec!(1000), dec!(50))]).value(), dec!(-1000));
    }

    #[test]
    fn single_lay_risks_rated_value() {
        assert_eq!(tiered_market_exposure(&[lay(dec!(1000), dec!(50))]).value(), dec!(-500));
    }

    #[test]
    fn lay_below_back_is_not_bracketed() {
        // lay@40 then back@60: no back before a lay → fallback sum
        let legs = [lay(dec!(100), dec!(40)), back(dec!(200), dec!(60))];
        // 100*40/100 + 200
        assert_eq!(tiered_market_exposure(&legs).value(), dec!(-240));
    }

    #[test]
    fn bracket_nets_interval() {
        // lay@30 | back@50 lay@70 | lay@90
        let legs = [
            lay(dec!(100), dec!(30)),
            back(dec!(100), dec!(50)),
            lay(dec!(200), dec!(70)),
            lay(dec!(300), dec!(90)),
        ];
        // bracket [1..=3]: +50 - 140 - 270 = -360 → 360
        // below: 100*30/100 = 30, above: none
        assert_eq!(tiered_market_exposure(&legs).value(), dec!(-390));
    }

    #[test]
    fn bracket_with_tail_and_head() {
        // back@20 lay@40 back@60 : last lay is index 1
        let legs = [back(dec!(100), dec!(20)), lay(dec!(100), dec!(40)), back(dec!(500), dec!(60))];
        // bracket [0..=1]: +20 - 40 = -20 → 20; above: stake 500
        assert_eq!(tiered_market_exposure(&legs).value(), dec!(-520));
    }

    #[test]
    fn lays_below_and_backs_above_the_bracket() {
        let legs = [
            lay(dec!(100), dec!(10)),
            back(dec!(100), dec!(30)),
            lay(dec!(100), dec!(50)),
            back(dec!(100), dec!(70)),
            back(dec!(100), dec!(90)),
        ];
        // below: 10 rated; bracket: +30 - 50 → 20; above: two backs at full stake 200
        assert_eq!(tiered_market_exposure(&legs).value(), dec!(-230));
    }

    #[test]
    fn ordering_is_stable_for_ties() {
        let legs = vec![lay(dec!(100), dec!(50)), back(dec!(100), dec!(50)), lay(dec!(300), dec!(50))];
        let first = tiered_exposure_unordered(legs.clone());
        let second = tiered_exposure_unordered(legs);
        assert_eq!(first, second);
        // order kept: lay, back, lay → bracket [1..=2]: 50 - 150 = -100 → 100, below: 50
        assert_eq!(first.value(), dec!(-150));
    }

    #[test]
    fn summary_total() {
        let summary = ExposureSummary {
            ordinary: amt(dec!(1000)),
            tiered: amt(dec!(500)),
        };
        assert_eq!(summary.total().value(), dec!(1500));
    }
}
