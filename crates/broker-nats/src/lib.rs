//! Broker backed by NATS `JetStream`.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod delivery;
mod error;
pub mod naming;

pub use delivery::NatsDelivery;
pub use error::Error;

use std::path::PathBuf;
use std::pin::pin;
use std::time::Duration;

use async_nats::jetstream::consumer::{AckPolicy, pull};
use async_nats::jetstream::context::{GetStreamError, GetStreamErrorKind};
use async_nats::jetstream::kv::{Config as KvConfig, Store as KvStore};
use async_nats::jetstream::stream::Config as StreamConfig;
use async_nats::jetstream::{self, Context as JetStreamContext, ErrorCode};
use async_nats::{Client, ConnectOptions};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use pubsub_broker::{
    Attributes, Broker, Deliveries, IdKind, Subscription, Topic, validate_id,
};
use tracing::debug;

/// Client name announced to the server.
const CLIENT_NAME: &str = "pubsub-cli";

/// Options for connecting a `NatsBroker`.
#[derive(Clone, Debug)]
pub struct NatsBrokerOptions {
    /// Server URL, e.g. `nats://localhost:4222`.
    pub url: String,

    /// Project all topics and subscriptions are namespaced under.
    pub project: String,

    /// Optional `.creds` file for authentication.
    pub credentials_file: Option<PathBuf>,

    /// How long to wait for the initial connection.
    pub connect_timeout: Duration,
}

/// Broker using NATS JS.
#[derive(Clone, Debug)]
pub struct NatsBroker {
    client: Client,
    jetstream_context: JetStreamContext,
    project: String,
}

impl NatsBroker {
    /// Connects to the server described by `options`.
    ///
    /// # Errors
    ///
    /// Fails if the project id is invalid, the credentials file cannot be
    /// read, or the server cannot be reached within the timeout.
    pub async fn connect(
        NatsBrokerOptions {
            url,
            project,
            credentials_file,
            connect_timeout,
        }: NatsBrokerOptions,
    ) -> Result<Self, Error> {
        validate_id(IdKind::Project, &project)?;

        let mut connect_options = ConnectOptions::new()
            .name(CLIENT_NAME)
            .connection_timeout(connect_timeout);

        if let Some(path) = credentials_file {
            connect_options = connect_options
                .credentials_file(&path)
                .await
                .map_err(|source| Error::Credentials { path, source })?;
        }

        debug!(%url, %project, "connecting");
        let client = connect_options.connect(url.as_str()).await?;

        Ok(Self::new(client, project))
    }

    /// Creates a broker on top of an existing client.
    #[must_use]
    pub fn new(client: Client, project: String) -> Self {
        let jetstream_context = jetstream::new(client.clone());

        Self {
            client,
            jetstream_context,
            project,
        }
    }

    /// The project this broker is scoped to.
    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Walks every stream, calling `f` with each subject until it returns true.
    async fn find_subject<F>(&self, mut f: F) -> Result<(), Error>
    where
        F: FnMut(&str) -> bool + Send,
    {
        let mut streams = pin!(self.jetstream_context.streams());

        while let Some(info) = streams.next().await {
            let info = info.map_err(|e| Error::ListStreams(e.to_string()))?;
            if info.config.subjects.iter().any(|subject| f(subject.as_str())) {
                return Ok(());
            }
        }

        Ok(())
    }

    async fn get_kv_store(&self) -> Result<KvStore, Error> {
        let config = KvConfig {
            bucket: naming::subscriptions_bucket(&self.project),
            history: 1,
            ..Default::default()
        };

        Ok(self.jetstream_context.create_key_value(config).await?)
    }

    async fn subscription_topic(&self, subscription_id: &str) -> Result<Option<String>, Error> {
        let Some(bytes) = self.get_kv_store().await?.get(subscription_id).await? else {
            return Ok(None);
        };

        String::from_utf8(bytes.to_vec())
            .map(Some)
            .map_err(|_| Error::CorruptBinding(subscription_id.to_string()))
    }
}

#[async_trait]
impl Broker for NatsBroker {
    type Error = Error;
    type Delivery = NatsDelivery;

    async fn list_topics(&self) -> Result<Vec<Topic>, Error> {
        let mut topics = Vec::new();

        self.find_subject(|subject| {
            if let Some(topic_id) = naming::topic_from_subject(&self.project, subject) {
                topics.push(Topic::new(topic_id));
            }
            false
        })
        .await?;

        topics.sort();
        topics.dedup();

        Ok(topics)
    }

    async fn topic_exists(&self, topic_id: &str) -> Result<bool, Error> {
        let wanted = naming::topic_subject(&self.project, topic_id);
        let mut found = false;

        self.find_subject(|subject| {
            found = subject == wanted;
            found
        })
        .await?;

        Ok(found)
    }

    async fn create_topic(&self, topic_id: &str) -> Result<Topic, Error> {
        let config = StreamConfig {
            name: naming::stream_name(&self.project, topic_id),
            subjects: vec![naming::topic_subject(&self.project, topic_id)],
            ..Default::default()
        };

        self.jetstream_context.create_stream(config).await?;
        debug!(topic = topic_id, "created stream");

        Ok(Topic::new(topic_id))
    }

    async fn publish(
        &self,
        topic_id: &str,
        payload: Bytes,
        attributes: Attributes,
    ) -> Result<String, Error> {
        let subject = naming::topic_subject(&self.project, topic_id);

        let ack_future = if attributes.is_empty() {
            self.jetstream_context.publish(subject, payload).await?
        } else {
            let headers = delivery::headers_from_attributes(&attributes);
            self.jetstream_context
                .publish_with_headers(subject, headers, payload)
                .await?
        };

        let ack = ack_future.await?;

        Ok(ack.sequence.to_string())
    }

    async fn subscription_exists(&self, subscription_id: &str) -> Result<bool, Error> {
        Ok(self.subscription_topic(subscription_id).await?.is_some())
    }

    async fn create_subscription(
        &self,
        topic_id: &str,
        subscription_id: &str,
    ) -> Result<Subscription, Error> {
        let stream = self
            .jetstream_context
            .get_stream(naming::stream_name(&self.project, topic_id))
            .await?;

        stream
            .create_consumer(pull::Config {
                durable_name: Some(subscription_id.to_string()),
                ack_policy: AckPolicy::Explicit,
                ..Default::default()
            })
            .await?;

        self.get_kv_store()
            .await?
            .put(subscription_id, Bytes::from(topic_id.to_string()))
            .await?;

        debug!(
            topic = topic_id,
            subscription = subscription_id,
            "created consumer"
        );

        Ok(Subscription {
            id: subscription_id.to_string(),
            topic_id: topic_id.to_string(),
        })
    }

    async fn receive(
        &self,
        subscription_id: &str,
    ) -> Result<Deliveries<NatsDelivery, Error>, Error> {
        let topic_id = self
            .subscription_topic(subscription_id)
            .await?
            .ok_or_else(|| Error::SubscriptionNotFound(subscription_id.to_string()))?;

        let stream = self
            .jetstream_context
            .get_stream(naming::stream_name(&self.project, &topic_id))
            .await
            .map_err(|e| get_stream_error(&topic_id, e))?;

        let consumer: jetstream::consumer::Consumer<pull::Config> = stream
            .get_consumer(subscription_id)
            .await
            .map_err(|e| Error::GetConsumer(e.to_string()))?;

        let messages = consumer.messages().await?;

        Ok(messages
            .map(|result| result.map_err(Error::from).and_then(NatsDelivery::try_from))
            .boxed())
    }

    async fn close(self) -> Result<(), Error> {
        self.client
            .flush()
            .await
            .map_err(|e| Error::Close(e.to_string()))
    }
}

/// Only a missing stream means the bound topic is gone; timeouts and
/// permission failures keep their own error.
fn get_stream_error(topic_id: &str, error: GetStreamError) -> Error {
    match error.kind() {
        GetStreamErrorKind::JetStream(e) if e.error_code() == ErrorCode::STREAM_NOT_FOUND => {
            Error::TopicNotFound(topic_id.to_string())
        }
        _ => Error::GetStream(error),
    }
}
