//! Pairpool command-line front end
//!
//! Validates configuration, projects pool views from raw figures and runs
//! a scripted demo against the in-memory ledger.

mod demo;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pairpool_math::scale_to_atomic;
use pairpool_sdk::{create_example_config, project_pool_view, EngineConfig, PoolView, PoolViewQuery};
use pairpool_types::{PoolId, PoolTokenSupply, Rate, Reserves, TokenMetadata};

#[derive(Parser, Debug)]
#[command(name = "pairpool")]
#[command(about = "Two-asset liquidity pool accounting and transaction engine")]
struct Cli {
    /// Override log level
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load and validate a configuration file
    Validate {
        #[arg(short, long, default_value = "pairpool.toml")]
        config: PathBuf,
    },

    /// Project share, redeemable pair and TVL from raw pool figures
    View {
        #[arg(short, long, default_value = "pairpool.toml")]
        config: PathBuf,

        /// Pool id from the configuration
        #[arg(long)]
        pool: u64,

        /// User reserves in whole units of token A and token B
        #[arg(long, num_args = 2, value_names = ["A", "B"], required = true)]
        reserves: Vec<String>,

        /// User pool-token balance and total minted
        #[arg(long, num_args = 2, value_names = ["USER", "TOTAL"], required = true)]
        supply: Vec<String>,

        /// Pool-wide balances of token A and token B; sets the target rate
        #[arg(long, num_args = 2, value_names = ["A", "B"])]
        pool_balances: Option<Vec<String>>,

        /// Pool tokens an add-liquidity would mint
        #[arg(long)]
        incoming: Option<String>,
    },

    /// Run a scripted sequence against the in-memory ledger
    Demo {
        #[arg(short, long, default_value = "pairpool.toml")]
        config: PathBuf,

        /// Pool id; the first configured pool when omitted
        #[arg(long)]
        pool: Option<u64>,
    },

    /// Write an example configuration file
    InitConfig {
        #[arg(short, long, default_value = "pairpool.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref())?;

    match cli.command {
        Command::Validate { config } => {
            let config = load_config(&config)?;
            println!(
                "Configuration valid: {} tokens, {} pools",
                config.tokens.len(),
                config.pools.len()
            );
        }
        Command::View {
            config,
            pool,
            reserves,
            supply,
            pool_balances,
            incoming,
        } => {
            let config = load_config(&config)?;
            let figures = ViewFigures {
                reserves: (&reserves[0], &reserves[1]),
                supply: (&supply[0], &supply[1]),
                pool_balances: pool_balances.as_ref().map(|b| (b[0].as_str(), b[1].as_str())),
                incoming: incoming.as_deref(),
            };
            print!("{}", view_report(&config, PoolId(pool), &figures)?);
        }
        Command::Demo { config, pool } => {
            let config = load_config(&config)?;
            let pool_id = match pool {
                Some(id) => PoolId(id),
                None => config
                    .pools
                    .first()
                    .map(|p| p.pool_id)
                    .context("configuration has no pools")?,
            };
            demo::run(&config, pool_id).await?;
        }
        Command::InitConfig { output } => {
            create_example_config(&output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Example configuration written to {}", output.display());
        }
    }

    Ok(())
}

fn init_logging(log_level: Option<&str>) -> Result<()> {
    let level = log_level
        .and_then(|level| level.parse().ok())
        .unwrap_or(tracing::Level::INFO);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("pairpool={level},pairpool_sdk={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

fn load_config(path: &Path) -> Result<EngineConfig> {
    let config = EngineConfig::load(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    info!("Loaded configuration for {} pools", config.pools.len());
    Ok(config)
}

/// Raw decimal figures for the `view` command
struct ViewFigures<'a> {
    reserves: (&'a str, &'a str),
    supply: (&'a str, &'a str),
    pool_balances: Option<(&'a str, &'a str)>,
    incoming: Option<&'a str>,
}

fn view_report(config: &EngineConfig, pool_id: PoolId, figures: &ViewFigures<'_>) -> Result<String> {
    let pair = config.pool(pool_id)?.pool_pair();
    let token_a = config.token(pair.token_a)?;
    let token_b = config.token(pair.token_b)?;
    let lp_decimals = config
        .token(pair.pool_token)
        .map(|t| t.decimals)
        .unwrap_or(0);

    let parse_pair = |(a, b): (&str, &str)| -> Result<Reserves> {
        Ok(Reserves::new(
            scale_to_atomic(a, token_a.decimals).with_context(|| format!("bad {} amount", token_a.symbol))?,
            scale_to_atomic(b, token_b.decimals).with_context(|| format!("bad {} amount", token_b.symbol))?,
        ))
    };

    let user_reserves = parse_pair(figures.reserves)?;
    let pool_balances = figures.pool_balances.map(parse_pair).transpose()?.unwrap_or_default();
    let supply = PoolTokenSupply::new(
        scale_to_atomic(figures.supply.0, lp_decimals)?,
        scale_to_atomic(figures.supply.1, lp_decimals)?,
    )?;
    let incoming = figures
        .incoming
        .map(|value| scale_to_atomic(value, lp_decimals))
        .transpose()?;

    let view = project_pool_view(&PoolViewQuery {
        user_reserves,
        supply,
        rate: Rate::from_pool_balances(&pool_balances),
        pool_balances,
        incoming,
        tie_break: config.redeem_tie_break,
    })?;

    Ok(render_view(pool_id, &view, token_a, token_b))
}

pub(crate) fn render_view(
    pool_id: PoolId,
    view: &PoolView,
    token_a: &TokenMetadata,
    token_b: &TokenMetadata,
) -> String {
    let amount = |value, token: &TokenMetadata| {
        format!(
            "{} {}",
            pairpool_math::scale_to_decimal(value, token.decimals),
            token.symbol
        )
    };

    let mut out = String::new();
    let _ = writeln!(out, "Pool {} ({}/{})", pool_id, token_a.symbol, token_b.symbol);
    let _ = writeln!(out, "  Share:           {}%", view.share);
    match &view.redeemable {
        Some(pair) => {
            let _ = writeln!(
                out,
                "  Redeemable:      {} + {}",
                amount(pair.out_a, token_a),
                amount(pair.out_b, token_b)
            );
        }
        None => {
            let _ = writeln!(out, "  Redeemable:      none");
        }
    }
    if let Some(share) = &view.new_share_on_add {
        let _ = writeln!(out, "  Share after add: {}%", share);
    }
    let _ = writeln!(
        out,
        "  TVL:             {}",
        amount(view.total_value_locked, token_a)
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pairpool_sdk::example_config;

    #[test]
    fn test_view_report_scenario() {
        let config = example_config();
        let figures = ViewFigures {
            reserves: ("1,000", "300"),
            supply: ("250", "1000"),
            pool_balances: Some(("2000", "1000")),
            incoming: Some("500"),
        };

        let report = view_report(&config, PoolId(23223146), &figures).unwrap();
        assert_eq!(
            report,
            "Pool 23223146 (VIA/WVOI)\n\
             \x20 Share:           25.000000%\n\
             \x20 Redeemable:      600.000000 VIA + 300.000000 WVOI\n\
             \x20 Share after add: 50.000000%\n\
             \x20 TVL:             4000.000000 VIA\n"
        );
    }

    #[test]
    fn test_view_report_without_pool_rate() {
        let config = example_config();
        let figures = ViewFigures {
            reserves: ("1", "1"),
            supply: ("0", "0"),
            pool_balances: None,
            incoming: None,
        };

        let report = view_report(&config, PoolId(23223146), &figures).unwrap();
        assert!(report.contains("Share:           0.000000%"));
        assert!(report.contains("Redeemable:      none"));
        assert!(!report.contains("Share after add"));
    }

    #[test]
    fn test_view_report_rejects_bad_input() {
        let config = example_config();
        let figures = ViewFigures {
            reserves: ("1.0000001", "1"),
            supply: ("0", "0"),
            pool_balances: None,
            incoming: None,
        };
        assert!(view_report(&config, PoolId(23223146), &figures).is_err());

        let figures = ViewFigures {
            reserves: ("1", "1"),
            supply: ("5", "4"),
            pool_balances: None,
            incoming: None,
        };
        assert!(view_report(&config, PoolId(23223146), &figures).is_err());
        assert!(view_report(&config, PoolId(1), &figures).is_err());
    }

    #[test]
    fn test_init_config_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pairpool.toml");
        create_example_config(&path).unwrap();
        assert_eq!(load_config(&path).unwrap(), example_config());
    }

    #[test]
    fn test_cli_parses_view_arguments() {
        let cli = Cli::try_parse_from([
            "pairpool",
            "view",
            "--pool",
            "7",
            "--reserves",
            "1",
            "2",
            "--supply",
            "3",
            "4",
        ])
        .unwrap();
        match cli.command {
            Command::View {
                pool,
                reserves,
                supply,
                pool_balances,
                ..
            } => {
                assert_eq!(pool, 7);
                assert_eq!(reserves, vec!["1", "2"]);
                assert_eq!(supply, vec!["3", "4"]);
                assert!(pool_balances.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
