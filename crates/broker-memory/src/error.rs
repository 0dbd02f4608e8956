use pubsub_broker::BrokerError;
use thiserror::Error;

/// Errors that can occur in the in-memory broker.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// The subscription already exists.
    #[error("subscription '{0}' already exists")]
    SubscriptionExists(String),

    /// The subscription was deleted while it was being received from.
    #[error("subscription '{0}' was deleted")]
    SubscriptionDeleted(String),

    /// The subscription does not exist.
    #[error("subscription '{0}' not found")]
    SubscriptionNotFound(String),

    /// The topic already exists.
    #[error("topic '{0}' already exists")]
    TopicExists(String),

    /// The topic does not exist.
    #[error("topic '{0}' not found")]
    TopicNotFound(String),
}

impl BrokerError for Error {}
