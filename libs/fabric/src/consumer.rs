//! Pull-based queue consumers
//!
//! A [`Subscription`] hands out deliveries one at a time and tracks what is
//! outstanding. The acknowledgement contract is what makes processing
//! at-least-once: a delivery leaves the queue for good only on `ack`, a
//! `nack` with requeue puts it back at the front marked redelivered, and a
//! dropped subscription requeues everything it still held — the crash path
//! of a consumer that died mid-message.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::broker::{QueueState, QueuedMessage};
use crate::error::FabricError;

/// One received message. The `tag` settles it via [`Subscription::ack`] or
/// [`Subscription::nack`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub tag: u64,
    /// True when this message was previously delivered and returned unacked.
    pub redelivered: bool,
    pub payload: Vec<u8>,
}

/// A consumer bound to one queue, holding at most `prefetch` outstanding
/// deliveries.
pub struct Subscription {
    queue: Arc<QueueState>,
    prefetch: usize,
    unacked: HashMap<u64, QueuedMessage>,
}

impl Subscription {
    pub(crate) fn new(queue: Arc<QueueState>, prefetch: usize) -> Self {
        Self {
            queue,
            prefetch,
            unacked: HashMap::new(),
        }
    }

    /// Receive the next delivery.
    ///
    /// Waits until a message is available; returns `Ok(None)` once the
    /// fabric is closed and the queue drained, which is the consumer loop's
    /// termination signal. Receiving past the in-flight limit is an error —
    /// a consumer must settle deliveries before asking for more.
    pub async fn recv(&mut self) -> Result<Option<Delivery>, FabricError> {
        if self.unacked.len() >= self.prefetch {
            return Err(FabricError::PrefetchExceeded {
                limit: self.prefetch,
            });
        }
        loop {
            let notified = self.queue.notify.notified();
            {
                let mut inner = self.queue.lock();
                if let Some(message) = inner.ready.pop_front() {
                    let tag = inner.next_tag;
                    inner.next_tag += 1;
                    let delivery = Delivery {
                        tag,
                        redelivered: message.redelivered,
                        payload: message.payload.clone(),
                    };
                    self.unacked.insert(tag, message);
                    return Ok(Some(delivery));
                }
                if inner.closed {
                    return Ok(None);
                }
            }
            notified.await;
        }
    }

    /// Settle a delivery as fully processed.
    pub fn ack(&mut self, tag: u64) -> Result<(), FabricError> {
        self.unacked
            .remove(&tag)
            .map(|_| ())
            .ok_or(FabricError::UnknownDeliveryTag(tag))
    }

    /// Reject a delivery. With `requeue` it returns to the front of the
    /// queue marked redelivered; otherwise it is discarded.
    pub fn nack(&mut self, tag: u64, requeue: bool) -> Result<(), FabricError> {
        let mut message = self
            .unacked
            .remove(&tag)
            .ok_or(FabricError::UnknownDeliveryTag(tag))?;
        if requeue {
            message.redelivered = true;
            let mut inner = self.queue.lock();
            inner.ready.push_front(message);
            drop(inner);
            self.queue.notify.notify_one();
        } else {
            debug!(tag, "delivery discarded");
        }
        Ok(())
    }

    /// Number of outstanding (unsettled) deliveries.
    pub fn in_flight(&self) -> usize {
        self.unacked.len()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.unacked.is_empty() {
            return;
        }
        debug!(
            count = self.unacked.len(),
            "subscription dropped with outstanding deliveries, requeueing"
        );
        let mut inner = self.queue.lock();
        for (_, mut message) in self.unacked.drain() {
            message.redelivered = true;
            inner.ready.push_front(message);
        }
        drop(inner);
        self.queue.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{ExchangeKind, Fabric};

    fn fabric_with_queue() -> Fabric {
        let fabric = Fabric::new();
        fabric.declare_exchange("ex", ExchangeKind::Direct).unwrap();
        fabric.declare_queue("q").unwrap();
        fabric.bind("q", "ex", "k").unwrap();
        fabric
    }

    #[tokio::test]
    async fn test_ack_settles_delivery() {
        let fabric = fabric_with_queue();
        fabric.publish("ex", "k", b"m1".to_vec()).unwrap();

        let mut sub = fabric.subscribe("q", 10).unwrap();
        let delivery = sub.recv().await.unwrap().unwrap();
        assert_eq!(sub.in_flight(), 1);
        sub.ack(delivery.tag).unwrap();
        assert_eq!(sub.in_flight(), 0);

        // Settled messages never come back.
        fabric.close();
        assert!(sub.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_nack_requeues_as_redelivered() {
        let fabric = fabric_with_queue();
        fabric.publish("ex", "k", b"m1".to_vec()).unwrap();

        let mut sub = fabric.subscribe("q", 10).unwrap();
        let first = sub.recv().await.unwrap().unwrap();
        assert!(!first.redelivered);
        sub.nack(first.tag, true).unwrap();

        let second = sub.recv().await.unwrap().unwrap();
        assert!(second.redelivered);
        assert_eq!(second.payload, b"m1");
        sub.ack(second.tag).unwrap();
    }

    #[tokio::test]
    async fn test_nack_without_requeue_discards() {
        let fabric = fabric_with_queue();
        fabric.publish("ex", "k", b"m1".to_vec()).unwrap();

        let mut sub = fabric.subscribe("q", 10).unwrap();
        let delivery = sub.recv().await.unwrap().unwrap();
        sub.nack(delivery.tag, false).unwrap();

        fabric.close();
        assert!(sub.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dropped_subscription_requeues_unacked() {
        let fabric = fabric_with_queue();
        fabric.publish("ex", "k", b"m1".to_vec()).unwrap();

        {
            let mut sub = fabric.subscribe("q", 10).unwrap();
            let _delivery = sub.recv().await.unwrap().unwrap();
            // Dropped without ack: consumer crashed mid-message.
        }

        let mut sub = fabric.subscribe("q", 10).unwrap();
        let delivery = sub.recv().await.unwrap().unwrap();
        assert!(delivery.redelivered);
        assert_eq!(delivery.payload, b"m1");
        sub.ack(delivery.tag).unwrap();
    }

    #[tokio::test]
    async fn test_prefetch_limit_enforced() {
        let fabric = fabric_with_queue();
        fabric.publish("ex", "k", b"m1".to_vec()).unwrap();
        fabric.publish("ex", "k", b"m2".to_vec()).unwrap();

        let mut sub = fabric.subscribe("q", 1).unwrap();
        let first = sub.recv().await.unwrap().unwrap();
        assert_eq!(
            sub.recv().await,
            Err(FabricError::PrefetchExceeded { limit: 1 })
        );

        sub.ack(first.tag).unwrap();
        let second = sub.recv().await.unwrap().unwrap();
        assert_eq!(second.payload, b"m2");
        sub.ack(second.tag).unwrap();
    }

    #[tokio::test]
    async fn test_competing_consumers_split_the_queue() {
        let fabric = fabric_with_queue();
        for i in 0..4u8 {
            fabric.publish("ex", "k", vec![i]).unwrap();
        }

        let mut sub_a = fabric.subscribe("q", 10).unwrap();
        let mut sub_b = fabric.subscribe("q", 10).unwrap();

        let a1 = sub_a.recv().await.unwrap().unwrap();
        let b1 = sub_b.recv().await.unwrap().unwrap();
        let a2 = sub_a.recv().await.unwrap().unwrap();
        let b2 = sub_b.recv().await.unwrap().unwrap();

        let mut seen: Vec<u8> = [&a1, &b1, &a2, &b2]
            .iter()
            .map(|d| d.payload[0])
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3]);

        for (sub, delivery) in [(&mut sub_a, a1), (&mut sub_b, b1)] {
            sub.ack(delivery.tag).unwrap();
        }
    }

    #[tokio::test]
    async fn test_recv_waits_for_publish() {
        let fabric = fabric_with_queue();
        let waiter = {
            let fabric = fabric.clone();
            tokio::spawn(async move {
                let mut sub = fabric.subscribe("q", 10).unwrap();
                let delivery = sub.recv().await.unwrap().unwrap();
                sub.ack(delivery.tag).unwrap();
                delivery.payload
            })
        };

        tokio::task::yield_now().await;
        fabric.publish("ex", "k", b"late".to_vec()).unwrap();

        assert_eq!(waiter.await.unwrap(), b"late");
    }
}
