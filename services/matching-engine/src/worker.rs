//! Accepted-order consumer
//!
//! Pulls accepted orders, produces the fill, broadcasts it on the fanout
//! exchange, then acknowledges. A symbol with no reference price keeps the
//! delivery unacknowledged — configuration faults must stay visible and
//! retryable, never silently discarded.

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info};

use fabric::{ExchangeKind, Fabric, FabricError};
use types::messages::{CodecError, Event};
use types::prices::PriceTable;
use types::topology;

use crate::engine::MatchingEngine;

/// Matching stage configuration.
#[derive(Debug, Clone)]
pub struct MatchingConfig {
    /// Per-consumer in-flight limit.
    pub prefetch: usize,
    /// The fixed counterparty on the opposite side of every fill.
    pub market_maker: String,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            prefetch: 50,
            market_maker: "mm".to_string(),
        }
    }
}

/// Errors that terminate a matching consumer.
#[derive(Debug, Error)]
pub enum MatchingError {
    #[error("fabric failure: {0}")]
    Fabric(#[from] FabricError),

    #[error("codec failure: {0}")]
    Codec(#[from] CodecError),
}

/// Declare the exchanges, queues, and bindings this stage relies on.
/// Idempotent; safe to call from every consumer.
pub fn declare_topology(fabric: &Fabric) -> Result<(), FabricError> {
    fabric.declare_exchange(topology::EVENTS_EXCHANGE, ExchangeKind::Direct)?;
    fabric.declare_exchange(topology::TRADES_EXCHANGE, ExchangeKind::Fanout)?;

    fabric.declare_queue(topology::ACCEPTED_QUEUE)?;
    fabric.bind(
        topology::ACCEPTED_QUEUE,
        topology::EVENTS_EXCHANGE,
        topology::RK_ACCEPTED,
    )?;

    Ok(())
}

/// One matching-stage consumer.
pub struct MatchingWorker {
    fabric: Fabric,
    engine: MatchingEngine,
    config: MatchingConfig,
}

impl MatchingWorker {
    pub fn new(fabric: Fabric, prices: PriceTable, config: MatchingConfig) -> Self {
        let engine = MatchingEngine::new(prices, types::ids::UserId::new(&config.market_maker));
        Self {
            fabric,
            engine,
            config,
        }
    }

    /// Consume until the fabric closes.
    pub async fn run(self) -> Result<(), MatchingError> {
        declare_topology(&self.fabric)?;
        let mut sub = self
            .fabric
            .subscribe(topology::ACCEPTED_QUEUE, self.config.prefetch)?;
        info!(queue = topology::ACCEPTED_QUEUE, "matching engine listening");

        while let Some(delivery) = sub.recv().await? {
            let accepted = match Event::decode(&delivery.payload) {
                Ok(Event::OrderAccepted(accepted)) => accepted,
                Ok(other) => {
                    // Producer bug: this queue only ever carries accepted
                    // orders. Requeueing would spin forever, so drop loudly.
                    error!(event = ?other, "unexpected event on accepted queue, discarding");
                    sub.ack(delivery.tag)?;
                    continue;
                }
                Err(err) => {
                    error!(error = %err, "undecodable payload on accepted queue, discarding");
                    sub.ack(delivery.tag)?;
                    continue;
                }
            };

            match self.engine.match_order(&accepted) {
                Ok(fill) => {
                    info!(
                        trade_id = %fill.trade_id,
                        symbol = %fill.symbol,
                        qty = fill.qty,
                        price = %fill.price,
                        buy_user = %fill.buy_user,
                        sell_user = %fill.sell_user,
                        "order filled"
                    );
                    let payload = Event::TradeFill(fill).encode()?;
                    self.fabric
                        .publish(topology::TRADES_EXCHANGE, "", payload)?;
                    sub.ack(delivery.tag)?;
                }
                Err(err) => {
                    error!(
                        order_id = %accepted.order_id,
                        error = %err,
                        "no fill possible, leaving order for redelivery"
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

/// Spawn a pool of independent consumers.
pub fn spawn_pool(
    fabric: &Fabric,
    prices: &PriceTable,
    config: &MatchingConfig,
    consumers: usize,
) -> Vec<JoinHandle<Result<(), MatchingError>>> {
    (0..consumers)
        .map(|_| {
            let worker = MatchingWorker::new(fabric.clone(), prices.clone(), config.clone());
            tokio::spawn(worker.run())
        })
        .collect()
}
