//! Scripted demo against the in-memory ledger

use anyhow::Result;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{info, warn};

use pairpool_math::safe_mul;
use pairpool_sdk::testing::InMemoryLedger;
use pairpool_sdk::{EngineConfig, PipelineEvent, TransactionPipeline};
use pairpool_types::{pow10, Amount, OperationRequest, PoolId, Reserves, Side, SwapDirection};

use crate::render_view;

/// Seed a 2:1 pool, then deposit, add, swap and remove while printing progress
pub async fn run(config: &EngineConfig, pool_id: PoolId) -> Result<()> {
    let pair = config.pool(pool_id)?.pool_pair();
    let token_a = config.token(pair.token_a)?;
    let token_b = config.token(pair.token_b)?;
    let unit_a = pow10(token_a.decimals)?;
    let unit_b = pow10(token_b.decimals)?;
    let whole_a = |n: u128| safe_mul(Amount::new(n), unit_a);
    let whole_b = |n: u128| safe_mul(Amount::new(n), unit_b);

    let ledger = Arc::new(InMemoryLedger::new());
    ledger.create_pool(
        &pair,
        Reserves::new(whole_a(2_000)?, whole_b(1_000)?),
        Amount::new(1_000_000),
    );
    ledger.mint(pair.token_a, &config.owner, whole_a(1_000)?);
    ledger.mint(pair.token_b, &config.owner, whole_b(1_000)?);

    let pipeline = TransactionPipeline::from_config(config, pool_id, ledger.ports())?;
    info!("Demo ledger seeded for pool {}", pool_id);

    let steps = [
        OperationRequest::DepositReserve {
            side: Side::A,
            amount: whole_a(300)?,
        },
        OperationRequest::DepositReserve {
            side: Side::B,
            amount: whole_b(100)?,
        },
        OperationRequest::AddLiquidity { percent: 50 },
        OperationRequest::Swap {
            direction: SwapDirection::AForB,
            amount: whole_a(10)?,
        },
        OperationRequest::RemoveLiquidity { percent: 25 },
    ];

    for request in steps {
        println!("{}:", request.kind());
        let mut events = pipeline.run_operation(request).await?;
        while let Some(event) = events.next().await {
            match event {
                PipelineEvent::Transition { status, .. } => println!("  -> {}", status),
                PipelineEvent::Committed(summary) => {
                    println!("  {} (tx {}, round {})", summary, summary.tx_id, summary.confirmed_round)
                }
                PipelineEvent::Failed { reason, .. } => {
                    warn!("Demo step failed: {}", reason);
                    println!("  failed: {}", reason);
                }
            }
        }
    }

    let view = pipeline.view().await?;
    print!("{}", render_view(pool_id, &view, token_a, token_b));
    Ok(())
}
