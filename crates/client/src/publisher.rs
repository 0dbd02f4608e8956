use crate::Error;

use std::path::Path;

use bytes::Bytes;
use pubsub_broker::{Attributes, Broker, IdKind, Topic, validate_id};
use tracing::debug;

/// Publishing side of the CLI: topic management and message publication.
///
/// Holds no state beyond the broker handle. Every call is a round trip, plus an
/// existence check where a missing or duplicate topic must be reported.
#[derive(Clone, Debug)]
pub struct Publisher<B>
where
    B: Broker,
{
    broker: B,
}

impl<B> Publisher<B>
where
    B: Broker,
{
    /// Creates a publisher on top of a connected broker.
    pub const fn new(broker: B) -> Self {
        Self { broker }
    }

    /// Lists the topics of the project, sorted by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Broker`] if listing fails.
    pub async fn list_topics(&self) -> Result<Vec<Topic>, Error<B::Error>> {
        self.broker.list_topics().await.map_err(Error::Broker)
    }

    /// Creates a topic.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] if the topic is already present.
    pub async fn create_topic(&self, topic_id: &str) -> Result<Topic, Error<B::Error>> {
        validate_id(IdKind::Topic, topic_id)?;

        if self
            .broker
            .topic_exists(topic_id)
            .await
            .map_err(Error::Broker)?
        {
            return Err(Error::AlreadyExists {
                kind: IdKind::Topic,
                id: topic_id.to_string(),
            });
        }

        let topic = self
            .broker
            .create_topic(topic_id)
            .await
            .map_err(Error::Broker)?;
        debug!(topic = topic_id, "topic created");

        Ok(topic)
    }

    /// Publishes a payload without attributes, returning the broker-assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the topic does not exist.
    pub async fn publish(
        &self,
        topic_id: &str,
        payload: impl Into<Bytes> + Send,
    ) -> Result<String, Error<B::Error>> {
        self.publish_with_attributes(topic_id, payload, Attributes::new())
            .await
    }

    /// Publishes a payload with attributes, returning the broker-assigned id
    /// once the broker has confirmed the message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the topic does not exist. Nothing is
    /// published in that case.
    pub async fn publish_with_attributes(
        &self,
        topic_id: &str,
        payload: impl Into<Bytes> + Send,
        attributes: Attributes,
    ) -> Result<String, Error<B::Error>> {
        validate_id(IdKind::Topic, topic_id)?;

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

        let message_id = self
            .broker
            .publish(topic_id, payload.into(), attributes)
            .await
            .map_err(Error::Broker)?;
        debug!(topic = topic_id, message = %message_id, "message published");

        Ok(message_id)
    }

    /// Reads the whole file and publishes its bytes unchanged.
    ///
    /// The file is read before the topic is checked.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, otherwise fails like
    /// [`Publisher::publish_with_attributes`].
    pub async fn publish_from_file(
        &self,
        topic_id: &str,
        path: impl AsRef<Path> + Send,
        attributes: Attributes,
    ) -> Result<String, Error<B::Error>> {
        let path = path.as_ref();
        let payload = tokio::fs::read(path).await.map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), bytes = payload.len(), "read payload");

        self.publish_with_attributes(topic_id, payload, attributes)
            .await
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

    use std::io::Write;

    use assert_matches::assert_matches;
    use futures::StreamExt;
    use pubsub_broker::Delivery;
    use pubsub_broker_memory::MemoryBroker;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_create_topic_once() {
        let publisher = Publisher::new(MemoryBroker::default());

        let topic = publisher.create_topic("t1").await.unwrap();
        assert_eq!(topic.id, "t1");

        let result = publisher.create_topic("t1").await;
        assert_matches!(
            result,
            Err(Error::AlreadyExists { kind: IdKind::Topic, id }) if id == "t1"
        );
    }

    #[tokio::test]
    async fn test_create_topic_rejects_invalid_id() {
        let publisher = Publisher::new(MemoryBroker::default());

        let result = publisher.create_topic("orders.eu").await;

        assert_matches!(result, Err(Error::InvalidId(_)));
        assert!(publisher.list_topics().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_topics_empty() {
        let publisher = Publisher::new(MemoryBroker::default());

        assert!(publisher.list_topics().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_publish_then_list() {
        let publisher = Publisher::new(MemoryBroker::default());
        publisher.create_topic("t1").await.unwrap();

        let id = publisher.publish("t1", &b"hello"[..]).await.unwrap();

        assert!(!id.is_empty());
        assert!(publisher.list_topics().await.unwrap().contains(&Topic::new("t1")));
    }

    #[tokio::test]
    async fn test_publish_to_missing_topic() {
        let broker = MemoryBroker::default();
        let publisher = Publisher::new(broker.clone());

        let result = publisher.publish("ghost", &b"hello"[..]).await;

        assert_matches!(
            result,
            Err(Error::NotFound { kind: IdKind::Topic, id }) if id == "ghost"
        );
        assert_eq!(broker.stats().published, 0);
    }

    #[tokio::test]
    async fn test_publish_from_file_forwards_exact_bytes() {
        let broker = MemoryBroker::default();
        let publisher = Publisher::new(broker.clone());
        publisher.create_topic("t1").await.unwrap();
        broker.create_subscription("t1", "s1").await.unwrap();
        let mut deliveries = broker.receive("s1").await.unwrap();

        let payload: Vec<u8> = (0..=255).chain([0xff, 0xfe, b'\n']).collect();
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&payload).unwrap();

        let attributes = Attributes::from([("origin".to_string(), "file".to_string())]);
        let id = publisher
            .publish_from_file("t1", file.path(), attributes.clone())
            .await
            .unwrap();

        let delivery = deliveries.next().await.unwrap().unwrap();
        assert_eq!(delivery.message().id, id);
        assert_eq!(delivery.message().payload.len(), payload.len());
        assert_eq!(delivery.message().payload, Bytes::from(payload));
        assert_eq!(delivery.message().attributes, attributes);
    }

    #[tokio::test]
    async fn test_publish_from_missing_file() {
        let broker = MemoryBroker::default();
        let publisher = Publisher::new(broker.clone());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.bin");

        // the file is read before the topic is checked
        let result = publisher
            .publish_from_file("ghost", &path, Attributes::new())
            .await;

        assert_matches!(result, Err(Error::Io { path: p, .. }) if p == path);
        assert_eq!(broker.stats().published, 0);
    }

    #[tokio::test]
    async fn test_publish_empty_file() {
        let publisher = Publisher::new(MemoryBroker::default());
        publisher.create_topic("t1").await.unwrap();
        let file = NamedTempFile::new().unwrap();

        let id = publisher
            .publish_from_file("t1", file.path(), Attributes::new())
            .await
            .unwrap();

        assert!(!id.is_empty());
    }

    #[tokio::test]
    async fn test_close_releases_broker() {
        let broker = MemoryBroker::default();
        let publisher = Publisher::new(broker.clone());

        publisher.close().await.unwrap();

        assert_eq!(broker.stats().closed, 1);
    }
}
