use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use pairpool_types::{
    Address, Amount, PoolError, PoolId, PoolPair, PoolResult, RedeemTieBreak, TokenId,
    TokenMetadata, BPS_DENOMINATOR, DEFAULT_CONFIRMATION_ROUNDS, DEFAULT_POLL_INTERVAL_MS,
    MAX_TOKEN_DECIMALS,
};

use crate::errors::{SdkError, SdkResult};

/// Engine configuration loaded from a TOML file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Account whose positions the engine manages
    pub owner: Address,

    /// Finality polls per confirmation wait
    #[serde(default = "default_confirmation_rounds")]
    pub confirmation_rounds: u32,

    /// Delay between finality polls in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Tolerance applied to simulated outputs when setting `min_out` (basis points)
    #[serde(default)]
    pub slippage_bps: u64,

    /// Raise short allowances automatically instead of rejecting the operation
    #[serde(default = "default_auto_approve")]
    pub auto_approve: bool,

    /// Rule for choosing between two valid redeemable pairs
    #[serde(default)]
    pub redeem_tie_break: RedeemTieBreak,

    /// Token registry
    pub tokens: Vec<TokenMetadata>,

    /// Pools the engine may operate on
    pub pools: Vec<PoolConfig>,
}

/// Configuration for an individual pool
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PoolConfig {
    pub pool_id: PoolId,

    /// Pool contract account, the spender of every allowance
    pub pool_address: Address,

    pub token_a: TokenId,
    pub token_b: TokenId,

    /// Liquidity token id; the pool's own id when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_token: Option<TokenId>,
}

fn default_confirmation_rounds() -> u32 {
    DEFAULT_CONFIRMATION_ROUNDS
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_auto_approve() -> bool {
    true
}

impl EngineConfig {
    /// Load configuration from TOML file
    pub fn load(path: impl AsRef<Path>) -> SdkResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;

        let config: EngineConfig = toml::from_str(&content).map_err(|e| {
            SdkError::config(format!("Failed to parse config file {}: {}", path.display(), e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn from_toml(content: &str) -> SdkResult<Self> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| SdkError::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> SdkResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SdkError::config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> PoolResult<()> {
        if self.pools.is_empty() {
            return Err(PoolError::invalid_parameter("pools", "empty", "at least one pool"));
        }

        if self.confirmation_rounds == 0 {
            return Err(PoolError::invalid_parameter("confirmation_rounds", "0", "at least 1"));
        }

        if self.slippage_bps > BPS_DENOMINATOR {
            return Err(PoolError::invalid_parameter(
                "slippage_bps",
                &self.slippage_bps.to_string(),
                "at most 10000 (100%)",
            ));
        }

        for token in &self.tokens {
            if token.decimals > MAX_TOKEN_DECIMALS {
                return Err(PoolError::invalid_parameter(
                    &format!("tokens[{}].decimals", token.id),
                    &token.decimals.to_string(),
                    "at most 77",
                ));
            }
        }

        for pool in &self.pools {
            pool.validate(self)?;
        }

        Ok(())
    }

    pub fn token(&self, id: TokenId) -> PoolResult<&TokenMetadata> {
        self.tokens
            .iter()
            .find(|t| t.id == id)
            .ok_or(PoolError::UnknownToken(id))
    }

    pub fn pool(&self, id: PoolId) -> PoolResult<&PoolConfig> {
        self.pools
            .iter()
            .find(|p| p.pool_id == id)
            .ok_or(PoolError::UnknownPool(id))
    }

    /// Token registry keyed by id
    pub fn registry(&self) -> HashMap<TokenId, TokenMetadata> {
        self.tokens.iter().map(|t| (t.id, t.clone())).collect()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl PoolConfig {
    fn validate(&self, config: &EngineConfig) -> PoolResult<()> {
        if self.token_a == self.token_b {
            return Err(PoolError::invalid_configuration(
                &format!("pool {}", self.pool_id),
                "token_a and token_b must differ",
            ));
        }

        if self.pool_address.as_str().is_empty() {
            return Err(PoolError::invalid_parameter("pool_address", "empty", "non-empty address"));
        }

        config.token(self.token_a)?;
        config.token(self.token_b)?;
        Ok(())
    }

    pub fn pool_pair(&self) -> PoolPair {
        PoolPair {
            pool_id: self.pool_id,
            pool_address: self.pool_address.clone(),
            pool_token: self.pool_token.unwrap_or(TokenId(self.pool_id.0)),
            token_a: self.token_a,
            token_b: self.token_b,
        }
    }
}

/// Example configuration with the VIA/WVOI pool
pub fn example_config() -> EngineConfig {
    EngineConfig {
        owner: Address::new("USERADDRESS"),
        confirmation_rounds: DEFAULT_CONFIRMATION_ROUNDS,
        poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        slippage_bps: 0,
        auto_approve: true,
        redeem_tie_break: RedeemTieBreak::MinimizeClaim,
        tokens: vec![
            TokenMetadata {
                id: TokenId(6779767),
                name: "Voi Incentive Asset".to_string(),
                symbol: "VIA".to_string(),
                decimals: 6,
                total_supply: Amount::new(10_000_000_000_000_000),
            },
            TokenMetadata {
                id: TokenId(6778021),
                name: "Wrapped Voi".to_string(),
                symbol: "WVOI".to_string(),
                decimals: 6,
                total_supply: Amount::new(10_000_000_000_000_000),
            },
        ],
        pools: vec![PoolConfig {
            pool_id: PoolId(23223146),
            pool_address: Address::new("POOLADDRESS"),
            token_a: TokenId(6779767),
            token_b: TokenId(6778021),
            pool_token: None,
        }],
    }
}

/// Create example configuration file
pub fn create_example_config(path: impl AsRef<Path>) -> SdkResult<()> {
    example_config().save(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        let mut config = example_config();
        assert!(config.validate().is_ok());

        config.confirmation_rounds = 0;
        assert!(config.validate().is_err());

        let mut config = example_config();
        config.slippage_bps = 10_001;
        assert!(config.validate().is_err());

        let mut config = example_config();
        config.pools.clear();
        assert!(config.validate().is_err());

        let mut config = example_config();
        config.tokens[0].decimals = 78;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pool_tokens_must_be_registered_and_distinct() {
        let mut config = example_config();
        config.pools[0].token_b = TokenId(42);
        assert_eq!(config.validate(), Err(PoolError::UnknownToken(TokenId(42))));

        let mut config = example_config();
        config.pools[0].token_b = config.pools[0].token_a;
        assert!(matches!(
            config.validate(),
            Err(PoolError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_defaults_apply_when_omitted() {
        let content = r#"
            owner = "ME"

            [[tokens]]
            id = 1
            name = "Alpha"
            symbol = "ALP"
            decimals = 6
            total_supply = "1000000"

            [[tokens]]
            id = 2
            name = "Beta"
            symbol = "BET"
            decimals = 8
            total_supply = "1000000"

            [[pools]]
            pool_id = 3
            pool_address = "POOL"
            token_a = 1
            token_b = 2
        "#;

        let config = EngineConfig::from_toml(content).unwrap();
        assert_eq!(config.confirmation_rounds, 4);
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.slippage_bps, 0);
        assert!(config.auto_approve);
        assert_eq!(config.redeem_tie_break, RedeemTieBreak::MinimizeClaim);
        assert_eq!(config.pools[0].pool_pair().pool_token, TokenId(3));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pairpool.toml");

        create_example_config(&path).unwrap();
        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded, example_config());
        assert_eq!(loaded.token(TokenId(6778021)).unwrap().symbol, "WVOI");
        assert!(loaded.pool(PoolId(1)).is_err());
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "owner = ").unwrap();

        assert!(matches!(EngineConfig::load(&path), Err(SdkError::Config(_))));
        assert!(matches!(
            EngineConfig::load(dir.path().join("missing.toml")),
            Err(SdkError::Io(_))
        ));
    }
}
