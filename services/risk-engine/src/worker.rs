//! New-order consumer
//!
//! Pulls `order.v1` payloads off the new-orders queue, validates them, and
//! publishes the disposition before acknowledging — the publish is the side
//! effect the ack attests to. Undecodable or wrong-schema payloads become
//! `bad_type` rejections: this queue is fed by external intake, so every
//! message deserves a terminal disposition rather than a requeue loop.

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use fabric::{ExchangeKind, Fabric, FabricError};
use ledger_store::LedgerStore;
use types::messages::{
    salvage_order_id, CodecError, Disposition, Event, OrderRejected, RejectReason,
};
use types::prices::PriceTable;
use types::topology;

use crate::engine::RiskEngine;

/// Risk stage configuration.
#[derive(Debug, Clone)]
pub struct RiskConfig {
    /// Per-consumer in-flight limit.
    pub prefetch: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self { prefetch: 50 }
    }
}

/// Errors that terminate a risk consumer.
#[derive(Debug, Error)]
pub enum RiskError {
    #[error("fabric failure: {0}")]
    Fabric(#[from] FabricError),

    #[error("codec failure: {0}")]
    Codec(#[from] CodecError),
}

/// Declare the exchanges, queues, and bindings this stage relies on.
/// Idempotent; safe to call from every consumer.
pub fn declare_topology(fabric: &Fabric) -> Result<(), FabricError> {
    fabric.declare_exchange(topology::ORDERS_EXCHANGE, ExchangeKind::Direct)?;
    fabric.declare_exchange(topology::EVENTS_EXCHANGE, ExchangeKind::Direct)?;

    fabric.declare_queue(topology::NEW_ORDERS_QUEUE)?;
    fabric.bind(
        topology::NEW_ORDERS_QUEUE,
        topology::ORDERS_EXCHANGE,
        topology::RK_NEW,
    )?;

    fabric.declare_queue(topology::ACCEPTED_QUEUE)?;
    fabric.bind(
        topology::ACCEPTED_QUEUE,
        topology::EVENTS_EXCHANGE,
        topology::RK_ACCEPTED,
    )?;

    fabric.declare_queue(topology::REJECTED_QUEUE)?;
    fabric.bind(
        topology::REJECTED_QUEUE,
        topology::EVENTS_EXCHANGE,
        topology::RK_REJECTED,
    )?;

    Ok(())
}

/// One risk-stage consumer.
pub struct RiskWorker {
    fabric: Fabric,
    engine: RiskEngine,
    config: RiskConfig,
}

impl RiskWorker {
    pub fn new(
        fabric: Fabric,
        store: Arc<dyn LedgerStore>,
        prices: PriceTable,
        config: RiskConfig,
    ) -> Self {
        Self {
            fabric,
            engine: RiskEngine::new(store, prices),
            config,
        }
    }

    /// Consume until the fabric closes.
    pub async fn run(self) -> Result<(), RiskError> {
        declare_topology(&self.fabric)?;
        let mut sub = self
            .fabric
            .subscribe(topology::NEW_ORDERS_QUEUE, self.config.prefetch)?;
        info!(queue = topology::NEW_ORDERS_QUEUE, "risk validator listening");

        while let Some(delivery) = sub.recv().await? {
            let disposition = match Event::decode(&delivery.payload) {
                Ok(Event::NewOrder(order)) => match self.engine.validate(&order).await {
                    Ok(disposition) => disposition,
                    Err(err) => {
                        warn!(
                            order_id = %order.order_id,
                            error = %err,
                            "validation blocked, leaving order for redelivery"
                        );
                        sub.nack(delivery.tag, true)?;
                        // Let other tasks run before the redelivery comes back.
                        tokio::task::yield_now().await;
                        continue;
                    }
                },
                Ok(_) | Err(_) => {
                    let order_id = salvage_order_id(&delivery.payload);
                    warn!(?order_id, "non-order payload on new-orders queue");
                    Disposition::Rejected(OrderRejected {
                        order_id,
                        reason: RejectReason::BadType,
                    })
                }
            };

            match &disposition {
                Disposition::Accepted(accepted) => info!(
                    order_id = %accepted.order_id,
                    symbol = %accepted.symbol,
                    qty = accepted.qty,
                    side = ?accepted.side,
                    "order accepted"
                ),
                Disposition::Rejected(rejected) => info!(
                    order_id = ?rejected.order_id,
                    reason = rejected.reason.code(),
                    "order rejected"
                ),
            }

            let routing_key = disposition.routing_key();
            let payload = disposition.into_event().encode()?;
            self.fabric
                .publish(topology::EVENTS_EXCHANGE, routing_key, payload)?;
            sub.ack(delivery.tag)?;
        }
        Ok(())
    }
}

/// Spawn a pool of independent consumers, each with its own subscription
/// and in-flight window.
pub fn spawn_pool(
    fabric: &Fabric,
    store: &Arc<dyn LedgerStore>,
    prices: &PriceTable,
    config: &RiskConfig,
    consumers: usize,
) -> Vec<JoinHandle<Result<(), RiskError>>> {
    (0..consumers)
        .map(|_| {
            let worker = RiskWorker::new(
                fabric.clone(),
                Arc::clone(store),
                prices.clone(),
                config.clone(),
            );
            tokio::spawn(worker.run())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_store::MemoryLedgerStore;
    use rust_decimal::Decimal;
    use serde_json::json;
    use types::ids::{OrderId, UserId};

    async fn recv_event(fabric: &Fabric, queue: &str) -> Event {
        let mut sub = fabric.subscribe(queue, 10).unwrap();
        let delivery = sub.recv().await.unwrap().unwrap();
        let event = Event::decode(&delivery.payload).unwrap();
        sub.ack(delivery.tag).unwrap();
        event
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_worker_publishes_accepted_disposition() {
        let fabric = Fabric::new();
        let store = Arc::new(MemoryLedgerStore::new());
        store.seed_user(&UserId::new("u1"), Decimal::from(1000));
        declare_topology(&fabric).unwrap();

        let store_dyn: Arc<dyn LedgerStore> = store;
        let handles = spawn_pool(
            &fabric,
            &store_dyn,
            &PriceTable::default(),
            &RiskConfig::default(),
            1,
        );

        let order = Event::NewOrder(types::messages::NewOrder {
            order_id: OrderId::from_string("o1"),
            user_id: UserId::new("u1"),
            symbol: "AAPL".to_string(),
            side: "BUY".to_string(),
            qty: json!(2),
        });
        fabric
            .publish(
                topology::ORDERS_EXCHANGE,
                topology::RK_NEW,
                order.encode().unwrap(),
            )
            .unwrap();

        match recv_event(&fabric, topology::ACCEPTED_QUEUE).await {
            Event::OrderAccepted(accepted) => {
                assert_eq!(accepted.order_id, OrderId::from_string("o1"));
                assert_eq!(accepted.qty, 2);
            }
            other => panic!("Expected OrderAccepted, got {:?}", other),
        }

        fabric.close();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_worker_maps_foreign_payload_to_bad_type() {
        let fabric = Fabric::new();
        let store: Arc<dyn LedgerStore> = Arc::new(MemoryLedgerStore::new());
        declare_topology(&fabric).unwrap();

        let handles = spawn_pool(
            &fabric,
            &store,
            &PriceTable::default(),
            &RiskConfig::default(),
            1,
        );

        fabric
            .publish(
                topology::ORDERS_EXCHANGE,
                topology::RK_NEW,
                br#"{"type":"order.v9","order_id":"o9"}"#.to_vec(),
            )
            .unwrap();

        match recv_event(&fabric, topology::REJECTED_QUEUE).await {
            Event::OrderRejected(rejected) => {
                assert_eq!(rejected.order_id, Some(OrderId::from_string("o9")));
                assert_eq!(rejected.reason, RejectReason::BadType);
            }
            other => panic!("Expected OrderRejected, got {:?}", other),
        }

        fabric.close();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
    }
}
