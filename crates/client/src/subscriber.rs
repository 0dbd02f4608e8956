use crate::Error;
use crate::receive::{self, ReceiveSummary};

use std::io::Write;

use pubsub_broker::{Broker, IdKind, Subscription, validate_id};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Subscribing side of the CLI: subscription management and the receive loop.
#[derive(Clone, Debug)]
pub struct Subscriber<B>
where
    B: Broker,
{
    broker: B,
}

impl<B> Subscriber<B>
where
    B: Broker,
{
    /// Creates a subscriber on top of a connected broker.
    pub const fn new(broker: B) -> Self {
        Self { broker }
    }

    /// Creates a subscription bound to an existing topic.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the topic is missing and
    /// [`Error::AlreadyExists`] if the subscription id is taken.
    pub async fn create_subscription(
        &self,
        topic_id: &str,
        subscription_id: &str,
    ) -> Result<Subscription, Error<B::Error>> {
        validate_id(IdKind::Topic, topic_id)?;
        validate_id(IdKind::Subscription, subscription_id)?;

        if !self
            .broker
            .topic_exists(topic_id)
            .await
            .map_err(Error::Broker)?
        {
            return Err(Error::NotFound {
                kind: IdKind::Topic,
                id: topic_id.to_string(),
            });
        }

        if self
            .broker
            .subscription_exists(subscription_id)
            .await
            .map_err(Error::Broker)?
        {
            return Err(Error::AlreadyExists {
                kind: IdKind::Subscription,
                id: subscription_id.to_string(),
            });
        }

        let subscription = self
            .broker
            .create_subscription(topic_id, subscription_id)
            .await
            .map_err(Error::Broker)?;
        debug!(
            topic = topic_id,
            subscription = subscription_id,
            "subscription created"
        );

        Ok(subscription)
    }

    /// Streams messages from the subscription to `sink` until `shutdown` is
    /// cancelled, acknowledging each one when `should_ack` is set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] before anything is written if the
    /// subscription does not exist. See [`receive::run`] for failures while
    /// listening.
    pub async fn subscribe<W>(
        &self,
        subscription_id: &str,
        should_ack: bool,
        sink: &mut W,
        shutdown: &CancellationToken,
    ) -> Result<ReceiveSummary, Error<B::Error>>
    where
        W: Write + Send,
    {
        validate_id(IdKind::Subscription, subscription_id)?;

        if !self
            .broker
            .subscription_exists(subscription_id)
            .await
            .map_err(Error::Broker)?
        {
            return Err(Error::NotFound {
                kind: IdKind::Subscription,
                id: subscription_id.to_string(),
            });
        }

        receive::run(&self.broker, subscription_id, should_ack, sink, shutdown).await
    }

    /// Releases the broker connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Broker`] if the broker fails to shut down cleanly.
    pub async fn close(self) -> Result<(), Error<B::Error>> {
        self.broker.close().await.map_err(Error::Broker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use assert_matches::assert_matches;
    use bytes::Bytes;
    use futures::StreamExt;
    use pubsub_broker::{Attributes, Delivery};
    use pubsub_broker_memory::{MemoryBroker, MemoryBrokerOptions};
    use tokio::time::{sleep, timeout};

    const GRACE: Duration = Duration::from_secs(5);

    async fn broker_with_subscription(ack_deadline: Duration) -> MemoryBroker {
        let broker = MemoryBroker::new(MemoryBrokerOptions { ack_deadline });
        broker.create_topic("t1").await.unwrap();
        broker.create_subscription("t1", "s1").await.unwrap();
        broker
    }

    fn cancel_after(shutdown: &CancellationToken, delay: Duration) {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            sleep(delay).await;
            shutdown.cancel();
        });
    }

    #[tokio::test]
    async fn test_create_subscription_requires_topic() {
        let subscriber = Subscriber::new(MemoryBroker::default());

        let result = subscriber.create_subscription("ghost", "s1").await;

        assert_matches!(
            result,
            Err(Error::NotFound { kind: IdKind::Topic, id }) if id == "ghost"
        );
    }

    #[tokio::test]
    async fn test_create_subscription_once() {
        let broker = MemoryBroker::default();
        broker.create_topic("t1").await.unwrap();
        broker.create_topic("t2").await.unwrap();
        let subscriber = Subscriber::new(broker);

        let subscription = subscriber.create_subscription("t1", "s1").await.unwrap();
        assert_eq!(subscription.topic_id, "t1");

        // the id is taken regardless of topic
        let result = subscriber.create_subscription("t2", "s1").await;
        assert_matches!(
            result,
            Err(Error::AlreadyExists { kind: IdKind::Subscription, id }) if id == "s1"
        );
    }

    #[tokio::test]
    async fn test_subscribe_to_missing_subscription() {
        let subscriber = Subscriber::new(MemoryBroker::default());
        let mut out = Vec::new();

        let result = subscriber
            .subscribe("sub-x", false, &mut out, &CancellationToken::new())
            .await;

        assert_matches!(
            result,
            Err(Error::NotFound { kind: IdKind::Subscription, id }) if id == "sub-x"
        );
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_with_ack() {
        let broker = broker_with_subscription(Duration::from_secs(10)).await;
        let attributes = Attributes::from([("origin".to_string(), "test".to_string())]);
        let first = broker
            .publish("t1", Bytes::from_static(b"hello"), attributes)
            .await
            .unwrap();
        let second = broker
            .publish("t1", Bytes::from_static(b"world"), Attributes::new())
            .await
            .unwrap();

        let shutdown = CancellationToken::new();
        let watcher = {
            let broker = broker.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                while broker.stats().acknowledged < 2 {
                    sleep(Duration::from_millis(5)).await;
                }
                shutdown.cancel();
            })
        };

        let subscriber = Subscriber::new(broker.clone());
        let mut out = Vec::new();
        let summary = timeout(GRACE, subscriber.subscribe("s1", true, &mut out, &shutdown))
            .await
            .unwrap()
            .unwrap();
        watcher.await.unwrap();

        assert_eq!(
            summary,
            ReceiveSummary {
                received: 2,
                acknowledged: 2
            }
        );
        assert_eq!(broker.stats().acknowledged, 2);

        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with(
            "Listening for messages on subscription s1...\nPress Ctrl+C to exit\n\n"
        ));
        assert!(out.contains(&format!("Received message: ID={first}\nData: hello\n")));
        assert!(out.contains("Attributes:\n  origin: test\n"));
        assert!(out.contains(&format!("Message acknowledged: ID={first}\n\n")));
        assert!(out.contains(&format!("Message acknowledged: ID={second}\n\n")));
        assert!(!out.contains("not acknowledged"));
        assert!(out.ends_with("Subscription stopped: cancelled\n"));
    }

    #[tokio::test]
    async fn test_subscribe_without_ack_never_acks() {
        let broker = broker_with_subscription(Duration::from_secs(10)).await;
        broker
            .publish("t1", Bytes::from_static(b"hello"), Attributes::new())
            .await
            .unwrap();

        let shutdown = CancellationToken::new();
        cancel_after(&shutdown, Duration::from_millis(200));

        let subscriber = Subscriber::new(broker.clone());
        let mut out = Vec::new();
        let summary = timeout(GRACE, subscriber.subscribe("s1", false, &mut out, &shutdown))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            summary,
            ReceiveSummary {
                received: 1,
                acknowledged: 0
            }
        );
        assert_eq!(broker.stats().acknowledged, 0);

        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("Message not acknowledged (--ack flag not provided)\n\n"));
        assert!(!out.contains("Message acknowledged"));
    }

    #[tokio::test]
    async fn test_unacked_message_comes_back() {
        let broker = broker_with_subscription(Duration::from_millis(30)).await;
        let id = broker
            .publish("t1", Bytes::from_static(b"hello"), Attributes::new())
            .await
            .unwrap();

        let shutdown = CancellationToken::new();
        cancel_after(&shutdown, Duration::from_millis(300));

        let subscriber = Subscriber::new(broker);
        let mut out = Vec::new();
        let summary = timeout(GRACE, subscriber.subscribe("s1", false, &mut out, &shutdown))
            .await
            .unwrap()
            .unwrap();

        assert!(summary.received >= 2);
        let out = String::from_utf8(out).unwrap();
        let rendered = format!("Received message: ID={id}\n");
        assert!(out.matches(rendered.as_str()).count() >= 2);
    }

    #[tokio::test]
    async fn test_no_messages_handled_after_cancel() {
        let broker = broker_with_subscription(Duration::from_secs(10)).await;
        let shutdown = CancellationToken::new();
        cancel_after(&shutdown, Duration::from_millis(50));

        let subscriber = Subscriber::new(broker.clone());
        let mut out = Vec::new();
        timeout(GRACE, subscriber.subscribe("s1", true, &mut out, &shutdown))
            .await
            .unwrap()
            .unwrap();

        // the worker is gone, so a message published now waits for the next receiver
        broker
            .publish("t1", Bytes::from_static(b"late"), Attributes::new())
            .await
            .unwrap();
        sleep(Duration::from_millis(50)).await;
        assert_eq!(broker.stats().acknowledged, 0);

        let mut deliveries = broker.receive("s1").await.unwrap();
        let delivery = timeout(GRACE, deliveries.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(delivery.message().payload, Bytes::from_static(b"late"));
    }

    #[tokio::test]
    async fn test_deleted_subscription_fails_subscribe() {
        let broker = broker_with_subscription(Duration::from_secs(10)).await;
        let shutdown = CancellationToken::new();
        {
            let broker = broker.clone();
            tokio::spawn(async move {
                sleep(Duration::from_millis(50)).await;
                broker.delete_subscription("s1").await.unwrap();
            });
        }

        let subscriber = Subscriber::new(broker);
        let mut out = Vec::new();
        let result = timeout(GRACE, subscriber.subscribe("s1", true, &mut out, &shutdown))
            .await
            .unwrap();

        assert_matches!(
            result,
            Err(Error::Broker(pubsub_broker_memory::Error::SubscriptionDeleted(id))) if id == "s1"
        );
        assert!(!shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn test_close_releases_broker() {
        let broker = MemoryBroker::default();
        let subscriber = Subscriber::new(broker.clone());

        subscriber.close().await.unwrap();

        assert_eq!(broker.stats().closed, 1);
    }
}
