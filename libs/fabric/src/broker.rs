//! Topic/queue broker core
//!
//! Holds the exchange and queue topology and routes published messages into
//! bound queues. Direct exchanges route on exact key match; fanout exchanges
//! copy to every bound queue. Unroutable messages are dropped, which matches
//! broker default behavior for unbound routing keys.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tracing::{debug, info};

use crate::consumer::Subscription;
use crate::error::FabricError;

/// Exchange routing behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    /// Deliver to queues bound with the exact routing key.
    Direct,
    /// Deliver to every bound queue, ignoring the routing key.
    Fanout,
}

/// A message sitting in a queue, ready for (re)delivery.
#[derive(Debug, Clone)]
pub(crate) struct QueuedMessage {
    pub payload: Vec<u8>,
    pub redelivered: bool,
}

#[derive(Debug, Default)]
pub(crate) struct QueueInner {
    pub ready: VecDeque<QueuedMessage>,
    pub next_tag: u64,
    pub closed: bool,
}

/// Shared per-queue state: the ready buffer plus a wakeup for consumers.
pub(crate) struct QueueState {
    pub inner: Mutex<QueueInner>,
    pub notify: Notify,
}

impl QueueState {
    fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner::default()),
            notify: Notify::new(),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Binding {
    routing_key: String,
    queue_name: String,
    queue: Arc<QueueState>,
}

struct Exchange {
    kind: ExchangeKind,
    bindings: Vec<Binding>,
}

#[derive(Default)]
struct FabricState {
    exchanges: HashMap<String, Exchange>,
    queues: HashMap<String, Arc<QueueState>>,
    closed: bool,
}

/// In-process message fabric handle.
///
/// Cheap to clone; all clones share the same topology and queues. Provides
/// at-least-once delivery: a message leaves a queue only on acknowledgement,
/// and unacknowledged deliveries return to the queue for redelivery.
#[derive(Clone)]
pub struct Fabric {
    state: Arc<Mutex<FabricState>>,
}

impl Fabric {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FabricState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FabricState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Declare an exchange. Idempotent for a matching kind; redeclaring with
    /// a different kind is an error.
    pub fn declare_exchange(&self, name: &str, kind: ExchangeKind) -> Result<(), FabricError> {
        let mut state = self.lock();
        if state.closed {
            return Err(FabricError::Closed);
        }
        match state.exchanges.get(name) {
            Some(existing) if existing.kind != kind => Err(FabricError::ExchangeKindMismatch {
                name: name.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                debug!(exchange = name, ?kind, "exchange declared");
                state.exchanges.insert(
                    name.to_string(),
                    Exchange {
                        kind,
                        bindings: Vec::new(),
                    },
                );
                Ok(())
            }
        }
    }

    /// Declare a queue. Idempotent.
    pub fn declare_queue(&self, name: &str) -> Result<(), FabricError> {
        let mut state = self.lock();
        if state.closed {
            return Err(FabricError::Closed);
        }
        if !state.queues.contains_key(name) {
            debug!(queue = name, "queue declared");
            state
                .queues
                .insert(name.to_string(), Arc::new(QueueState::new()));
        }
        Ok(())
    }

    /// Bind a queue to an exchange under a routing key. Idempotent.
    pub fn bind(&self, queue: &str, exchange: &str, routing_key: &str) -> Result<(), FabricError> {
        let mut state = self.lock();
        if state.closed {
            return Err(FabricError::Closed);
        }
        let queue_state = state
            .queues
            .get(queue)
            .cloned()
            .ok_or_else(|| FabricError::UnknownQueue(queue.to_string()))?;
        let ex = state
            .exchanges
            .get_mut(exchange)
            .ok_or_else(|| FabricError::UnknownExchange(exchange.to_string()))?;
        let already_bound = ex
            .bindings
            .iter()
            .any(|b| b.routing_key == routing_key && b.queue_name == queue);
        if !already_bound {
            ex.bindings.push(Binding {
                routing_key: routing_key.to_string(),
                queue_name: queue.to_string(),
                queue: queue_state,
            });
        }
        Ok(())
    }

    /// Publish a payload to an exchange.
    ///
    /// The message is enqueued on every matching binding before this call
    /// returns; delivery to consumers happens as they pull.
    pub fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: Vec<u8>,
    ) -> Result<(), FabricError> {
        let state = self.lock();
        if state.closed {
            return Err(FabricError::Closed);
        }
        let ex = state
            .exchanges
            .get(exchange)
            .ok_or_else(|| FabricError::UnknownExchange(exchange.to_string()))?;

        let targets: Vec<&Binding> = ex
            .bindings
            .iter()
            .filter(|b| match ex.kind {
                ExchangeKind::Direct => b.routing_key == routing_key,
                ExchangeKind::Fanout => true,
            })
            .collect();

        if targets.is_empty() {
            debug!(exchange, routing_key, "unroutable message dropped");
            return Ok(());
        }

        for binding in targets {
            let mut inner = binding.queue.lock();
            inner.ready.push_back(QueuedMessage {
                payload: payload.clone(),
                redelivered: false,
            });
            drop(inner);
            binding.queue.notify.notify_one();
        }
        Ok(())
    }

    /// Open a pull-based subscription on a queue with the given in-flight
    /// limit.
    pub fn subscribe(&self, queue: &str, prefetch: usize) -> Result<Subscription, FabricError> {
        let state = self.lock();
        let queue_state = state
            .queues
            .get(queue)
            .cloned()
            .ok_or_else(|| FabricError::UnknownQueue(queue.to_string()))?;
        Ok(Subscription::new(queue_state, prefetch))
    }

    /// Close the fabric: subsequent declares and publishes fail, and every
    /// consumer's `recv` returns `None` once its queue is drained.
    pub fn close(&self) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        info!("fabric closing");
        for queue in state.queues.values() {
            queue.lock().closed = true;
            queue.notify.notify_waiters();
        }
    }
}

impl Default for Fabric {
    fn default() -> Self {
        Self::new()
    }
}
