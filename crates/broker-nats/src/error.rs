use std::path::PathBuf;

use pubsub_broker::{BrokerError, InvalidId};
use thiserror::Error;

/// Errors that can occur when talking to NATS `JetStream`.
#[derive(Debug, Error)]
pub enum Error {
    /// Acknowledging a message failed.
    #[error("failed to acknowledge message: {0}")]
    Ack(String),

    /// Flushing the connection on close failed.
    #[error("failed to flush connection: {0}")]
    Close(String),

    /// Connecting to the server failed.
    #[error("failed to connect to NATS: {0}")]
    Connect(#[from] async_nats::ConnectError),

    /// A consumer could not be created for a new subscription.
    #[error("failed to create consumer: {0}")]
    CreateConsumer(#[from] async_nats::jetstream::stream::ConsumerError),

    /// The subscriptions KV bucket could not be created.
    #[error("failed to create subscriptions bucket: {0}")]
    CreateKeyValue(#[from] async_nats::jetstream::context::CreateKeyValueError),

    /// A stream could not be created for a new topic.
    #[error("failed to create stream: {0}")]
    CreateStream(#[from] async_nats::jetstream::context::CreateStreamError),

    /// The credentials file could not be loaded.
    #[error("failed to load credentials from {path}: {source}")]
    Credentials {
        /// The credentials file.
        path: PathBuf,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Looking up a subscription binding failed.
    #[error("failed to read subscription binding: {0}")]
    Entry(#[from] async_nats::jetstream::kv::EntryError),

    /// The consumer backing a subscription could not be loaded.
    #[error("failed to get consumer: {0}")]
    GetConsumer(String),

    /// The stream backing a topic could not be loaded.
    #[error("failed to get stream: {0}")]
    GetStream(#[from] async_nats::jetstream::context::GetStreamError),

    /// The project id breaks the naming rules.
    #[error(transparent)]
    InvalidProject(#[from] InvalidId),

    /// Listing streams failed.
    #[error("failed to list streams: {0}")]
    ListStreams(String),

    /// A received message carried no `JetStream` metadata.
    #[error("received message without JetStream metadata: {0}")]
    Metadata(String),

    /// Opening the message stream of a consumer failed.
    #[error("failed to start receiving: {0}")]
    Messages(#[from] async_nats::jetstream::consumer::StreamError),

    /// Publishing failed or was not acknowledged.
    #[error("failed to publish: {0}")]
    Publish(#[from] async_nats::jetstream::context::PublishError),

    /// Storing a subscription binding failed.
    #[error("failed to store subscription binding: {0}")]
    Put(#[from] async_nats::jetstream::kv::PutError),

    /// The message stream reported a failure.
    #[error("receive error: {0}")]
    Receive(#[from] async_nats::jetstream::consumer::pull::MessagesError),

    /// The subscription binding does not name a topic.
    #[error("subscription '{0}' has a corrupt topic binding")]
    CorruptBinding(String),

    /// The subscription does not exist.
    #[error("subscription '{0}' not found")]
    SubscriptionNotFound(String),

    /// The topic does not exist.
    #[error("topic '{0}' not found")]
    TopicNotFound(String),
}

impl BrokerError for Error {}
