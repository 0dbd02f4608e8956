//! Abstract interface for the publish/subscribe broker the CLI talks to.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Deliveries are received messages carrying their acknowledgement capability.
pub mod delivery;

/// Identifier rules shared by projects, topics and subscriptions.
pub mod id;

/// Messages, topics and subscriptions.
pub mod message;

pub use delivery::Delivery;
pub use id::{IdKind, InvalidId, validate_id};
pub use message::{Attributes, Message, Subscription, Topic};

use std::error::Error;
use std::fmt::Debug;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

/// Marker trait for broker errors
pub trait BrokerError: Error + Send + Sync + 'static {}

/// Stream of deliveries returned by [`Broker::receive`].
pub type Deliveries<X, E> = BoxStream<'static, Result<X, E>>;

/// A trait representing a client of a hosted publish/subscribe broker.
///
/// Every operation is a round trip to the broker. Nothing is cached locally, and
/// durability, ordering and redelivery are the broker's concern.
#[async_trait]
pub trait Broker
where
    Self: Clone + Debug + Send + Sync + 'static,
{
    /// The error type for the broker.
    type Error: BrokerError;

    /// The delivery type produced by [`Broker::receive`].
    type Delivery: Delivery<Error = Self::Error>;

    /// Lists every topic in the configured project, sorted by id.
    async fn list_topics(&self) -> Result<Vec<Topic>, Self::Error>;

    /// Checks whether the topic exists.
    async fn topic_exists(&self, topic_id: &str) -> Result<bool, Self::Error>;

    /// Creates the topic.
    async fn create_topic(&self, topic_id: &str) -> Result<Topic, Self::Error>;

    /// Publishes a message and waits for the broker to confirm it, returning the assigned id.
    async fn publish(
        &self,
        topic_id: &str,
        payload: Bytes,
        attributes: Attributes,
    ) -> Result<String, Self::Error>;

    /// Checks whether the subscription exists.
    async fn subscription_exists(&self, subscription_id: &str) -> Result<bool, Self::Error>;

    /// Creates a subscription bound to the topic.
    async fn create_subscription(
        &self,
        topic_id: &str,
        subscription_id: &str,
    ) -> Result<Subscription, Self::Error>;

    /// Starts receiving from the subscription.
    ///
    /// The returned stream yields deliveries until it reports a fatal error or
    /// is dropped. Dropping it stops reception.
    async fn receive(
        &self,
        subscription_id: &str,
    ) -> Result<Deliveries<Self::Delivery, Self::Error>, Self::Error>;

    /// Releases the connection to the broker.
    async fn close(self) -> Result<(), Self::Error>;
}
