//! In-memory implementation of the broker crate.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod delivery;
mod error;
mod queue;

pub use delivery::MemoryDelivery;
pub use error::Error;

use queue::SubscriptionQueue;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use pubsub_broker::{Attributes, Broker, Deliveries, Message, Subscription, Topic};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Options for the in-memory broker.
#[derive(Clone, Debug)]
pub struct MemoryBrokerOptions {
    /// How long an unacknowledged delivery waits before it is redelivered.
    pub ack_deadline: Duration,
}

impl Default for MemoryBrokerOptions {
    fn default() -> Self {
        Self {
            ack_deadline: Duration::from_secs(10),
        }
    }
}

/// Counters of broker-side activity, for assertions in tests.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MemoryBrokerStats {
    /// Messages accepted by `publish`.
    pub published: u64,

    /// Deliveries acknowledged.
    pub acknowledged: u64,

    /// Calls to `close`.
    pub closed: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub published: AtomicU64,
    pub acknowledged: AtomicU64,
    pub closed: AtomicU64,
}

#[derive(Debug, Default)]
struct BrokerState {
    /// topic id -> ids of subscriptions bound to it
    topics: BTreeMap<String, Vec<String>>,
    subscriptions: HashMap<String, Arc<SubscriptionQueue>>,
}

/// A broker that lives entirely in process memory.
///
/// Clones share the same topics and subscriptions. Delivery is at-least-once:
/// a delivery dropped without an ack is redelivered after the ack deadline.
#[derive(Clone, Debug)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
    counters: Arc<Counters>,
    options: MemoryBrokerOptions,
}

impl MemoryBroker {
    /// Creates an empty broker.
    #[must_use]
    pub fn new(options: MemoryBrokerOptions) -> Self {
        Self {
            state: Arc::new(Mutex::new(BrokerState::default())),
            counters: Arc::new(Counters::default()),
            options,
        }
    }

    /// Deletes a subscription. Active receivers observe a fatal error.
    ///
    /// # Errors
    /// Returns an error if the subscription does not exist.
    pub async fn delete_subscription(&self, subscription_id: &str) -> Result<(), Error> {
        let mut state = self.state.lock().await;

        let queue = state
            .subscriptions
            .remove(subscription_id)
            .ok_or_else(|| Error::SubscriptionNotFound(subscription_id.to_string()))?;

        if let Some(bound) = state.topics.get_mut(&queue.topic_id) {
            bound.retain(|id| id != subscription_id);
        }
        drop(state);

        queue.delete();
        debug!(subscription = subscription_id, "deleted subscription");

        Ok(())
    }

    /// Returns a snapshot of the activity counters.
    #[must_use]
    pub fn stats(&self) -> MemoryBrokerStats {
        MemoryBrokerStats {
            published: self.counters.published.load(Ordering::Relaxed),
            acknowledged: self.counters.acknowledged.load(Ordering::Relaxed),
            closed: self.counters.closed.load(Ordering::Relaxed),
        }
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new(MemoryBrokerOptions::default())
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    type Error = Error;
    type Delivery = MemoryDelivery;

    async fn list_topics(&self) -> Result<Vec<Topic>, Error> {
        let state = self.state.lock().await;

        Ok(state.topics.keys().cloned().map(Topic::new).collect())
    }

    async fn topic_exists(&self, topic_id: &str) -> Result<bool, Error> {
        Ok(self.state.lock().await.topics.contains_key(topic_id))
    }

    async fn create_topic(&self, topic_id: &str) -> Result<Topic, Error> {
        let mut state = self.state.lock().await;

        if state.topics.contains_key(topic_id) {
            return Err(Error::TopicExists(topic_id.to_string()));
        }
        state.topics.insert(topic_id.to_string(), Vec::new());
        drop(state);

        debug!(topic = topic_id, "created topic");

        Ok(Topic::new(topic_id))
    }

    async fn publish(
        &self,
        topic_id: &str,
        payload: Bytes,
        attributes: Attributes,
    ) -> Result<String, Error> {
        let queues = {
            let state = self.state.lock().await;
            let bound = state
                .topics
                .get(topic_id)
                .ok_or_else(|| Error::TopicNotFound(topic_id.to_string()))?;

            bound
                .iter()
                .filter_map(|id| state.subscriptions.get(id).cloned())
                .collect::<Vec<_>>()
        };

        let message = Message {
            id: Uuid::new_v4().to_string(),
            payload,
            attributes,
            publish_time: Utc::now(),
        };

        for queue in queues {
            queue.push(message.clone()).await;
        }

        self.counters.published.fetch_add(1, Ordering::Relaxed);
        debug!(topic = topic_id, message = %message.id, "published");

        Ok(message.id)
    }

    async fn subscription_exists(&self, subscription_id: &str) -> Result<bool, Error> {
        Ok(self
            .state
            .lock()
            .await
            .subscriptions
            .contains_key(subscription_id))
    }

    async fn create_subscription(
        &self,
        topic_id: &str,
        subscription_id: &str,
    ) -> Result<Subscription, Error> {
        let mut state = self.state.lock().await;

        if state.subscriptions.contains_key(subscription_id) {
            return Err(Error::SubscriptionExists(subscription_id.to_string()));
        }

        let bound = state
            .topics
            .get_mut(topic_id)
            .ok_or_else(|| Error::TopicNotFound(topic_id.to_string()))?;
        bound.push(subscription_id.to_string());

        state.subscriptions.insert(
            subscription_id.to_string(),
            Arc::new(SubscriptionQueue::new(
                subscription_id.to_string(),
                topic_id.to_string(),
            )),
        );
        drop(state);

        debug!(
            topic = topic_id,
            subscription = subscription_id,
            "created subscription"
        );

        Ok(Subscription {
            id: subscription_id.to_string(),
            topic_id: topic_id.to_string(),
        })
    }

    async fn receive(
        &self,
        subscription_id: &str,
    ) -> Result<Deliveries<MemoryDelivery, Error>, Error> {
        let queue = self
            .state
            .lock()
            .await
            .subscriptions
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| Error::SubscriptionNotFound(subscription_id.to_string()))?;

        let counters = Arc::clone(&self.counters);
        let ack_deadline = self.options.ack_deadline;

        // the deletion error is yielded once, then the stream ends
        let deliveries = futures::stream::unfold(Some(queue), move |queue| {
            let counters = Arc::clone(&counters);
            async move {
                let queue = queue?;
                if let Some(message) = queue.next().await {
                    let delivery =
                        MemoryDelivery::new(message, Arc::clone(&queue), counters, ack_deadline);
                    Some((Ok(delivery), Some(queue)))
                } else {
                    Some((Err(Error::SubscriptionDeleted(queue.id.clone())), None))
                }
            }
        });

        Ok(deliveries.boxed())
    }

    async fn close(self) -> Result<(), Error> {
        self.counters.closed.fetch_add(1, Ordering::Relaxed);

        Ok(())
    }
}
