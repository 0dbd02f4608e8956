use crate::error::Error;
use crate::naming::is_reserved_header;

use async_nats::HeaderMap;
use async_nats::jetstream;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pubsub_broker::{Attributes, Delivery, Message};

/// A message pulled from a `JetStream` consumer.
///
/// Dropping it without acking leaves redelivery to the server once the
/// consumer's ack wait expires.
#[derive(Debug)]
pub struct NatsDelivery {
    message: Message,
    inner: jetstream::Message,
}

impl TryFrom<jetstream::Message> for NatsDelivery {
    type Error = Error;

    fn try_from(inner: jetstream::Message) -> Result<Self, Error> {
        let (id, publish_time) = {
            let info = inner.info().map_err(|e| Error::Metadata(e.to_string()))?;
            let published = info.published;

            (
                info.stream_sequence.to_string(),
                DateTime::<Utc>::from_timestamp(
                    published.unix_timestamp(),
                    published.nanosecond(),
                )
                .unwrap_or_default(),
            )
        };

        let message = Message {
            id,
            payload: inner.payload.clone(),
            attributes: inner
                .headers
                .as_ref()
                .map(attributes_from_headers)
                .unwrap_or_default(),
            publish_time,
        };

        Ok(Self { message, inner })
    }
}

#[async_trait]
impl Delivery for NatsDelivery {
    type Error = Error;

    fn message(&self) -> &Message {
        &self.message
    }

    async fn ack(self) -> Result<(), Error> {
        self.inner
            .ack()
            .await
            .map_err(|e| Error::Ack(e.to_string()))
    }
}

pub fn attributes_from_headers(headers: &HeaderMap) -> Attributes {
    headers
        .iter()
        .filter_map(|(name, values)| {
            let name = name.to_string();
            if is_reserved_header(&name) {
                return None;
            }
            values.first().map(|value| (name, value.to_string()))
        })
        .collect()
}

pub fn headers_from_attributes(attributes: &Attributes) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (key, value) in attributes {
        headers.insert(key.as_str(), value.as_str());
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attributes_skip_reserved_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("origin", "test");
        headers.insert("Nats-Msg-Id", "abc");

        let attributes = attributes_from_headers(&headers);

        assert_eq!(attributes.len(), 1);
        assert_eq!(attributes.get("origin").map(String::as_str), Some("test"));
    }

    #[test]
    fn test_headers_carry_attributes() {
        let attributes = Attributes::from([
            ("origin".to_string(), "test".to_string()),
            ("priority".to_string(), "high".to_string()),
        ]);

        let headers = headers_from_attributes(&attributes);

        assert_eq!(attributes_from_headers(&headers), attributes);
    }
}
