use crate::Counters;
use crate::error::Error;
use crate::queue::SubscriptionQueue;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use pubsub_broker::{Delivery, Message};
use tracing::trace;

/// A message received from an in-memory subscription.
///
/// Unless acknowledged, the message is put back on its subscription once the
/// ack deadline passes.
#[derive(Debug)]
pub struct MemoryDelivery {
    message: Message,
    queue: Arc<SubscriptionQueue>,
    counters: Arc<Counters>,
    ack_deadline: Duration,
    acked: bool,
}

impl MemoryDelivery {
    pub(crate) const fn new(
        message: Message,
        queue: Arc<SubscriptionQueue>,
        counters: Arc<Counters>,
        ack_deadline: Duration,
    ) -> Self {
        Self {
            message,
            queue,
            counters,
            ack_deadline,
            acked: false,
        }
    }
}

#[async_trait]
impl Delivery for MemoryDelivery {
    type Error = Error;

    fn message(&self) -> &Message {
        &self.message
    }

    async fn ack(mut self) -> Result<(), Error> {
        if self.queue.is_deleted() {
            return Err(Error::SubscriptionNotFound(self.queue.id.clone()));
        }

        self.acked = true;
        self.counters.acknowledged.fetch_add(1, Ordering::Relaxed);

        Ok(())
    }
}

impl Drop for MemoryDelivery {
    fn drop(&mut self) {
        if self.acked {
            return;
        }

        // outside a runtime nothing can wait out the deadline, so the message is lost
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let queue = Arc::clone(&self.queue);
        let message = self.message.clone();
        let ack_deadline = self.ack_deadline;

        handle.spawn(async move {
            tokio::time::sleep(ack_deadline).await;
            trace!(subscription = %queue.id, message = %message.id, "redelivering");
            queue.push(message).await;
        });
    }
}
