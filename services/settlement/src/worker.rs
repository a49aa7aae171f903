//! Trade-fill consumer
//!
//! Pulls broadcast fills and applies them to the ledger, acknowledging only
//! after the settlement transaction has committed. A store outage leaves
//! the delivery unacknowledged so the fabric redelivers it; replays are
//! absorbed by the store's conflict-skip, so redelivery is always safe.

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use fabric::{ExchangeKind, Fabric, FabricError};
use ledger_store::LedgerStore;
use types::messages::{CodecError, Event};
use types::topology;

use crate::engine::SettlementEngine;

/// Settlement stage configuration.
#[derive(Debug, Clone)]
pub struct SettlementConfig {
    /// Per-consumer in-flight limit.
    pub prefetch: usize,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self { prefetch: 50 }
    }
}

/// Errors that terminate a settlement consumer.
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("fabric failure: {0}")]
    Fabric(#[from] FabricError),

    #[error("codec failure: {0}")]
    Codec(#[from] CodecError),
}

/// Declare the exchange, queue, and binding this stage relies on.
/// Idempotent; safe to call from every consumer.
pub fn declare_topology(fabric: &Fabric) -> Result<(), FabricError> {
    fabric.declare_exchange(topology::TRADES_EXCHANGE, ExchangeKind::Fanout)?;
    fabric.declare_queue(topology::SETTLE_QUEUE)?;
    fabric.bind(topology::SETTLE_QUEUE, topology::TRADES_EXCHANGE, "")?;
    Ok(())
}

/// One settlement-stage consumer.
pub struct SettlementWorker {
    fabric: Fabric,
    engine: SettlementEngine,
    config: SettlementConfig,
}

impl SettlementWorker {
    pub fn new(fabric: Fabric, store: Arc<dyn LedgerStore>, config: SettlementConfig) -> Self {
        Self {
            fabric,
            engine: SettlementEngine::new(store),
            config,
        }
    }

    /// Consume until the fabric closes.
    pub async fn run(self) -> Result<(), SettlementError> {
        declare_topology(&self.fabric)?;
        let mut sub = self
            .fabric
            .subscribe(topology::SETTLE_QUEUE, self.config.prefetch)?;
        info!(queue = topology::SETTLE_QUEUE, "settlement ledger listening");

        while let Some(delivery) = sub.recv().await? {
            let fill = match Event::decode(&delivery.payload) {
                Ok(Event::TradeFill(fill)) => fill,
                Ok(other) => {
                    // Producer bug: this queue only ever carries fills.
                    // Requeueing would spin forever, so drop loudly.
                    error!(event = ?other, "unexpected event on settle queue, discarding");
                    sub.ack(delivery.tag)?;
                    continue;
                }
                Err(err) => {
                    error!(error = %err, "undecodable payload on settle queue, discarding");
                    sub.ack(delivery.tag)?;
                    continue;
                }
            };

            if delivery.redelivered {
                debug!(trade_id = %fill.trade_id, "processing redelivered fill");
            }

            match self.engine.apply(&fill).await {
                Ok(receipt) => {
                    info!(
                        trade_id = %fill.trade_id,
                        symbol = %fill.symbol,
                        qty = fill.qty,
                        price = %fill.price,
                        buyer_cash_after = %receipt.buyer_cash_after,
                        buyer_pos_after = receipt.buyer_pos_after,
                        seller_cash_after = %receipt.seller_cash_after,
                        seller_pos_after = receipt.seller_pos_after,
                        "trade settled"
                    );
                    sub.ack(delivery.tag)?;
                }
                Err(err) => {
                    warn!(
                        trade_id = %fill.trade_id,
                        error = %err,
                        "settlement aborted, leaving fill for redelivery"
                    );
                    sub.nack(delivery.tag, true)?;
                    // Let other tasks run before the redelivery comes back.
                    tokio::task::yield_now().await;
                }
            }
        }
        Ok(())
    }
}

/// Spawn a pool of independent consumers competing on the settle queue.
pub fn spawn_pool(
    fabric: &Fabric,
    store: &Arc<dyn LedgerStore>,
    config: &SettlementConfig,
    consumers: usize,
) -> Vec<JoinHandle<Result<(), SettlementError>>> {
    (0..consumers)
        .map(|_| {
            let worker = SettlementWorker::new(fabric.clone(), Arc::clone(store), config.clone());
            tokio::spawn(worker.run())
        })
        .collect()
}
