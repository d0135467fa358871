// 3.0 wager.rs: the wager record, the placement request and its validation.
// 3.1 a wager's payout is fixed at creation. only status ever changes.

use crate::config::PlacementConfig;
use crate::types::{Amount, Category, EventId, MarketId, ParseError, Price, SelectionId, Side, Timestamp, UserId, WagerId, WagerStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wager {
    pub id: WagerId,
    pub user_id: UserId,
    pub event_id: EventId,
    pub market_id: MarketId,
    pub match_name: String,
    pub selection_name: String,
    pub category: Category,
    pub side: Side,
    // absent for fancy
    pub selection_id: Option<SelectionId>,
    // fancy only
    pub fancy_threshold: Option<Decimal>,
    pub stake: Decimal,
    pub price: Price,
    pub status: WagerStatus,
    pub payout: Amount,
    pub created_at: Timestamp,
}

impl Wager {
    pub fn is_pending(&self) -> bool {
        self.status.is_pending()
    }

    pub fn is_tiered(&self) -> bool {
        self.category.is_tiered()
    }

    pub fn stake_amount(&self) -> Amount {
        Amount::new(self.stake)
    }
}

/// 3.2: raw placement input. category and side arrive as free text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaceWager {
    pub event_id: String,
    #[serde(rename = "match")]
    pub match_name: String,
    pub market_id: String,
    pub selection: String,
    pub selection_id: Option<SelectionId>,
    pub fancy_threshold: Option<Decimal>,
    pub stake: Decimal,
    pub price: Decimal,
    pub category: String,
    pub side: String,
}

/// 3.3: placement input after validation. every field is typed.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedWager {
    pub event_id: EventId,
    pub match_name: String,
    pub market_id: MarketId,
    pub selection_name: String,
    pub selection_id: Option<SelectionId>,
    pub fancy_threshold: Option<Decimal>,
    pub stake: Decimal,
    pub price: Price,
    pub category: Category,
    pub side: Side,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Stake must be positive, got {0}")]
    NonPositiveStake(Decimal),

    #[error("Price must be positive, got {0}")]
    NonPositivePrice(Decimal),

    #[error("Selection id is required for {0} markets")]
    SelectionIdRequired(Category),

    #[error("Fancy markets require a threshold")]
    ThresholdRequired,

    #[error("Stake {stake} outside allowed range [{min}, {max}]")]
    StakeOutOfRange { stake: Decimal, min: Decimal, max: Decimal },

    #[error("Price {price} exceeds the maximum {max}")]
    PriceOutOfRange { price: Decimal, max: Decimal },

    #[error("Threshold {threshold} exceeds the maximum {max}")]
    ThresholdOutOfRange { threshold: Decimal, max: Decimal },

    #[error("{0}")]
    Parse(#[from] ParseError),
}

impl PlaceWager {
    pub fn validate(&self, limits: &PlacementConfig) -> Result<ValidatedWager, ValidationError> {
        for (name, value) in [
            ("eventId", &self.event_id),
            ("match", &self.match_name),
            ("marketId", &self.market_id),
            ("selection", &self.selection),
            ("category", &self.category),
            ("side", &self.side),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField(name));
            }
        }

        if self.stake <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveStake(self.stake));
        }
        let price = Price::new(self.price).ok_or(ValidationError::NonPositivePrice(self.price))?;

        // ceilings keep every later product inside decimal range
        if self.stake > limits.max_stake {
            return Err(ValidationError::StakeOutOfRange {
                stake: self.stake,
                min: Decimal::ZERO,
                max: limits.max_stake,
            });
        }
        if self.price > limits.max_price {
            return Err(ValidationError::PriceOutOfRange {
                price: self.price,
                max: limits.max_price,
            });
        }

        let category: Category = self.category.parse()?;
        let side: Side = self.side.parse()?;

        let (selection_id, fancy_threshold) = match category {
            Category::Fancy => {
                let threshold = self.fancy_threshold.ok_or(ValidationError::ThresholdRequired)?;
                if threshold.abs() > limits.max_price {
                    return Err(ValidationError::ThresholdOutOfRange {
                        threshold,
                        max: limits.max_price,
                    });
                }
                if self.stake < limits.fancy_min_stake || self.stake > limits.fancy_max_stake {
                    return Err(ValidationError::StakeOutOfRange {
                        stake: self.stake,
                        min: limits.fancy_min_stake,
                        max: limits.fancy_max_stake,
                    });
                }
                (None, Some(threshold))
            }
            _ => {
                let selection_id = self.selection_id.ok_or(ValidationError::SelectionIdRequired(category))?;
                (Some(selection_id), None)
            }
        };

        Ok(ValidatedWager {
            event_id: EventId::new(self.event_id.trim()),
            match_name: self.match_name.clone(),
            market_id: MarketId::new(self.market_id.trim()),
            selection_name: self.selection.clone(),
            selection_id,
            fancy_threshold,
            stake: self.stake,
            price,
            category,
            side,
        })
    }
}

/// 3.4: query filter over the wager book. `None` fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WagerFilter {
    pub status: Option<WagerStatus>,
    pub user_id: Option<UserId>,
    pub selection_id: Option<SelectionId>,
    pub event_id: Option<EventId>,
    pub category: Option<Category>,
    pub side: Option<Side>,
}

impl WagerFilter {
    pub fn matches(&self, wager: &Wager) -> bool {
        self.status.map_or(true, |s| wager.status == s)
            && self.user_id.map_or(true, |u| wager.user_id == u)
            && self.selection_id.map_or(true, |s| wager.selection_id == Some(s))
            && self.event_id.as_ref().map_or(true, |e| &wager.event_id == e)
            && self.category.map_or(true, |c| wager.category == c)
            && self.side.map_or(true, |s| wager.side == s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn match_odds_request() -> PlaceWager {
        PlaceWager {
            event_id: "evt-1".into(),
            match_name: "Lions v Tigers".into(),
            market_id: "1.100".into(),
            selection: "Lions".into(),
            selection_id: Some(SelectionId(11)),
            fancy_threshold: None,
            stake: dec!(1000),
            price: dec!(2.5),
            category: " Match Odds".into(),
            side: "BACK".into(),
        }
    }

    fn fancy_request(stake: Decimal) -> PlaceWager {
        PlaceWager {
            market_id: "1.100-F2".into(),
            selection: "Runs over 50".into(),
            selection_id: None,
            fancy_threshold: Some(dec!(50)),
            stake,
            price: dec!(100),
            category: "fancy".into(),
            side: "lay".into(),
            ..match_odds_request()
        }
    }

    #[test]
    fn valid_match_odds_request() {
        let v = match_odds_request().validate(&PlacementConfig::default()).unwrap();
        assert_eq!(v.category, Category::MatchOdds);
        assert_eq!(v.side, Side::Back);
        assert_eq!(v.selection_id, Some(SelectionId(11)));
        assert_eq!(v.fancy_threshold, None);
    }

    #[test]
    fn missing_fields_rejected() {
        let mut req = match_odds_request();
        req.market_id = "  ".into();
        assert_eq!(
            req.validate(&PlacementConfig::default()),
            Err(ValidationError::MissingField("marketId"))
        );
    }

    #[test]
    fn non_fancy_requires_selection() {
        let mut req = match_odds_request();
        req.selection_id = None;
        assert_eq!(
            req.validate(&PlacementConfig::default()),
            Err(ValidationError::SelectionIdRequired(Category::MatchOdds))
        );
    }

    #[test]
    fn fancy_requires_threshold_and_stake_range() {
        let limits = PlacementConfig::default();
        assert!(fancy_request(dec!(100)).validate(&limits).is_ok());
        assert!(fancy_request(dec!(500000)).validate(&limits).is_ok());
        assert!(matches!(
            fancy_request(dec!(99)).validate(&limits),
            Err(ValidationError::StakeOutOfRange { .. })
        ));
        assert!(matches!(
            fancy_request(dec!(500001)).validate(&limits),
            Err(ValidationError::StakeOutOfRange { .. })
        ));

        let mut req = fancy_request(dec!(1000));
        req.fancy_threshold = None;
        assert_eq!(req.validate(&limits), Err(ValidationError::ThresholdRequired));
    }

    #[test]
    fn invalid_category_and_side_surface_parse_errors() {
        let mut req = match_odds_request();
        req.category = "futures".into();
        assert!(matches!(
            req.validate(&PlacementConfig::default()),
            Err(ValidationError::Parse(ParseError::InvalidCategory(_)))
        ));

        let mut req = match_odds_request();
        req.side = "short".into();
        assert!(matches!(
            req.validate(&PlacementConfig::default()),
            Err(ValidationError::Parse(ParseError::InvalidSide(_)))
        ));
    }

    #[test]
    fn non_positive_amounts_rejected() {
        let mut req = match_odds_request();
        req.stake = dec!(0);
        assert_eq!(
            req.validate(&PlacementConfig::default()),
            Err(ValidationError::NonPositiveStake(dec!(0)))
        );

        let mut req = match_odds_request();
        req.price = dec!(-2);
        assert_eq!(
            req.validate(&PlacementConfig::default()),
            Err(ValidationError::NonPositivePrice(dec!(-2)))
        );
    }

    #[test]
    fn stake_and_price_ceilings() {
        let limits = PlacementConfig::default();

        let mut req = match_odds_request();
        req.stake = Decimal::MAX / dec!(10);
        assert_eq!(
            req.validate(&limits),
            Err(ValidationError::StakeOutOfRange {
                stake: Decimal::MAX / dec!(10),
                min: Decimal::ZERO,
                max: limits.max_stake,
            })
        );

        let mut req = match_odds_request();
        req.price = dec!(1000.01);
        assert_eq!(
            req.validate(&limits),
            Err(ValidationError::PriceOutOfRange {
                price: dec!(1000.01),
                max: limits.max_price,
            })
        );

        let mut req = fancy_request(dec!(1000));
        req.fancy_threshold = Some(dec!(-5000));
        assert!(matches!(req.validate(&limits), Err(ValidationError::ThresholdOutOfRange { .. })));

        let mut req = match_odds_request();
        req.stake = limits.max_stake;
        req.price = limits.max_price;
        assert!(req.validate(&limits).is_ok());
    }
}
