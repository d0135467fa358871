// 7.0 config.rs: all settings in one place. placement limits, settlement batching, corrections.
// 7.1 presets per environment, validated before the engine starts.

use crate::transition::CorrectionPolicy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/** 7.2: placement limits. stakes and prices are bounded, margin CAS retries are capped */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    // Minimum stake on a fancy market
    pub fancy_min_stake: Decimal,
    // Maximum stake on a fancy market (5 lakh)
    pub fancy_max_stake: Decimal,
    // Hard ceiling on any stake
    pub max_stake: Decimal,
    // Hard ceiling on any price, fancy rate and fancy threshold
    pub max_price: Decimal,
    // Attempts at the margin compare-and-swap before giving up
    pub max_margin_retries: u32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            fancy_min_stake: Decimal::new(100, 0),
            fancy_max_stake: Decimal::new(500_000, 0),
            max_stake: Decimal::new(10_000_000, 0),
            max_price: Decimal::new(1_000, 0),
            max_margin_retries: 8,
        }
    }
}

// margin folds add many stake × price products; keep six orders of magnitude spare
const ARITHMETIC_HEADROOM: i64 = 1_000_000;

/** 7.3: outcome feed batching during settlement */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementConfig {
    // Market ids per feed call
    pub feed_batch_size: usize,
    // Per-call timeout; a slow call degrades to "no result"
    pub feed_timeout_ms: u64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            feed_batch_size: 50,
            feed_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub placement: PlacementConfig,
    pub settlement: SettlementConfig,
    pub correction_policy: CorrectionPolicy,
    // Maximum number of audit events retained in memory
    pub max_events: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            placement: PlacementConfig::default(),
            settlement: SettlementConfig::default(),
            correction_policy: CorrectionPolicy::default(),
            max_events: 100_000,
        }
    }
}

impl EngineConfig {
    // Staging runs against a slower feed with smaller batches
    pub fn staging() -> Self {
        let mut config = Self::default();
        config.settlement.feed_batch_size = 25;
        config.settlement.feed_timeout_ms = 10_000;
        config
    }

    // Production keeps the upstream batch limit and a tight timeout
    pub fn production() -> Self {
        let mut config = Self::default();
        config.settlement.feed_timeout_ms = 3_000;
        config.placement.max_margin_retries = 16;
        config.max_events = 1_000_000;
        config
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(|e| ConfigError::Parse { reason: e.to_string() })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.placement.fancy_min_stake <= Decimal::ZERO {
            return Err(ConfigError::InvalidPlacement {
                reason: "Fancy min stake must be positive".to_string(),
            });
        }

        if self.placement.fancy_min_stake > self.placement.fancy_max_stake {
            return Err(ConfigError::InvalidPlacement {
                reason: "Fancy min stake must not exceed max".to_string(),
            });
        }

        if self.placement.max_stake < self.placement.fancy_max_stake || self.placement.max_price <= Decimal::ZERO {
            return Err(ConfigError::InvalidPlacement {
                reason: "Stake and price ceilings must cover the fancy range".to_string(),
            });
        }

        let worst_product = self
            .placement
            .max_stake
            .checked_mul(self.placement.max_price)
            .and_then(|p| p.checked_mul(Decimal::from(ARITHMETIC_HEADROOM)));
        if worst_product.is_none() {
            return Err(ConfigError::InvalidPlacement {
                reason: "Stake and price ceilings overflow decimal arithmetic".to_string(),
            });
        }

        if self.placement.max_margin_retries == 0 {
            return Err(ConfigError::InvalidPlacement {
                reason: "Need at least one margin attempt".to_string(),
            });
        }

        // upstream feed rejects more than 50 ids per call
        if self.settlement.feed_batch_size == 0 || self.settlement.feed_batch_size > 50 {
            return Err(ConfigError::InvalidSettlement {
                reason: "Feed batch size must be within 1..=50".to_string(),
            });
        }

        if self.settlement.feed_timeout_ms == 0 {
            return Err(ConfigError::InvalidSettlement {
                reason: "Feed timeout must be positive".to_string(),
            });
        }

        if self.max_events == 0 {
            return Err(ConfigError::InvalidAudit {
                reason: "Audit log must retain at least one event".to_string(),
            });
        }

        Ok(())
    }
}

// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid placement config: {reason}")]
    InvalidPlacement { reason: String },

    #[error("Invalid settlement config: {reason}")]
    InvalidSettlement { reason: String },

    #[error("Invalid audit config: {reason}")]
    InvalidAudit { reason: String },

    #[error("Config parse error: {reason}")]
    Parse { reason: String },
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn config(&self) -> EngineConfig {
        match self {
            Environment::Development => EngineConfig::default(),
            Environment::Staging => EngineConfig::staging(),
            Environment::Production => EngineConfig::production(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.settlement.feed_batch_size, 50);
        assert_eq!(config.correction_policy, CorrectionPolicy::Legacy);
    }

    #[test]
    fn test_environment_presets() {
        assert!(Environment::Development.config().validate().is_ok());
        assert!(Environment::Staging.config().validate().is_ok());
        assert!(Environment::Production.config().validate().is_ok());
        assert_eq!(Environment::Staging.config().settlement.feed_batch_size, 25);
    }

    #[test]
    fn test_invalid_batch_size() {
        let mut config = EngineConfig::default();
        config.settlement.feed_batch_size = 51;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidSettlement { .. })));

        config.settlement.feed_batch_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidSettlement { .. })));
    }

    #[test]
    fn test_invalid_stake_bounds() {
        let mut config = EngineConfig::default();
        config.placement.fancy_min_stake = Decimal::new(1_000_000, 0);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidPlacement { .. })));
    }

    #[test]
    fn test_unbounded_ceilings_rejected() {
        let mut config = EngineConfig::default();
        config.placement.max_stake = Decimal::MAX;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidPlacement { .. })));

        let mut config = EngineConfig::default();
        config.placement.max_stake = Decimal::new(1_000, 0);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidPlacement { .. })));

        let mut config = EngineConfig::default();
        config.placement.max_price = Decimal::ZERO;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidPlacement { .. })));
    }

    #[test]
    fn test_placement_limits_default_when_absent() {
        let json = r#"{"placement":{"fancy_min_stake":"100","fancy_max_stake":"500000","max_margin_retries":4},
            "settlement":{"feed_batch_size":50,"feed_timeout_ms":5000},
            "correction_policy":"legacy","max_events":10}"#;
        let config = EngineConfig::from_json(json).unwrap();
        assert_eq!(config.placement.max_stake, Decimal::new(10_000_000, 0));
        assert_eq!(config.placement.max_margin_retries, 4);
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = EngineConfig::production();
        let json = serde_json::to_string(&config).unwrap();
        let back = EngineConfig::from_json(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_config_json_rejects_garbage() {
        assert!(matches!(EngineConfig::from_json("{"), Err(ConfigError::Parse { .. })));

        let mut config = EngineConfig::default();
        config.settlement.feed_timeout_ms = 0;
        let json = serde_json::to_string(&config).unwrap();
        assert!(matches!(EngineConfig::from_json(&json), Err(ConfigError::InvalidSettlement { .. })));
    }

    #[test]
    fn test_symmetric_policy_from_json() {
        let mut config = EngineConfig::default();
        config.correction_policy = CorrectionPolicy::Symmetric;
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"symmetric\""));
        assert_eq!(EngineConfig::from_json(&json).unwrap().correction_policy, CorrectionPolicy::Symmetric);
    }
}
