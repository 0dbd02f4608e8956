use crate::args::{Command, PublisherCommand, SubscriberCommand};
use crate::error::Error;

use std::io::Write;

use pubsub_broker::{Attributes, Broker};
use pubsub_client::{Publisher, Subscriber};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Runs one command against `broker`, then closes the broker whatever the outcome.
pub async fn execute<B, W>(
    broker: B,
    command: Command,
    out: &mut W,
    shutdown: &CancellationToken,
) -> Result<(), Error<B::Error>>
where
    B: Broker,
    W: Write + Send,
{
    let result = dispatch(&broker, command, out, shutdown).await;

    if let Err(e) = broker.close().await {
        warn!(error = %e, "failed to close broker connection");
    }

    result
}

async fn dispatch<B, W>(
    broker: &B,
    command: Command,
    out: &mut W,
    shutdown: &CancellationToken,
) -> Result<(), Error<B::Error>>
where
    B: Broker,
    W: Write + Send,
{
    match command {
        Command::Publisher { command } => {
            run_publisher(Publisher::new(broker.clone()), command, out).await
        }
        Command::Subscriber { command } => {
            run_subscriber(Subscriber::new(broker.clone()), command, out, shutdown).await
        }
    }
}

async fn run_publisher<B, W>(
    publisher: Publisher<B>,
    command: PublisherCommand,
    out: &mut W,
) -> Result<(), Error<B::Error>>
where
    B: Broker,
    W: Write + Send,
{
    match command {
        PublisherCommand::Topic { project } => {
            writeln!(out, "Topics in project {project}:")?;

            let topics = publisher
                .list_topics()
                .await
                .map_err(Error::command("list topics"))?;

            for topic in &topics {
                writeln!(out, "- {}", topic.id)?;
            }

            if topics.is_empty() {
                writeln!(out, "No topics found in this project.")?;
            }
        }

        PublisherCommand::CreateTopic { topic, .. } => {
            let topic = publisher
                .create_topic(&topic)
                .await
                .map_err(Error::command("create topic"))?;

            writeln!(out, "Topic created: {}", topic.id)?;
        }

        PublisherCommand::Publish {
            topic,
            message_payload_file,
            attributes,
            ..
        } => {
            let attributes: Attributes = attributes.into_iter().collect();
            let message_id = publisher
                .publish_from_file(&topic, &message_payload_file, attributes)
                .await
                .map_err(Error::command("publish message"))?;

            writeln!(out, "Message published to topic {topic} with ID: {message_id}")?;
        }
    }

    Ok(())
}

async fn run_subscriber<B, W>(
    subscriber: Subscriber<B>,
    command: SubscriberCommand,
    out: &mut W,
    shutdown: &CancellationToken,
) -> Result<(), Error<B::Error>>
where
    B: Broker,
    W: Write + Send,
{
    match command {
        SubscriberCommand::CreateSubscription {
            topic,
            subscription,
            ..
        } => {
            let subscription = subscriber
                .create_subscription(&topic, &subscription)
                .await
                .map_err(Error::command("create subscription"))?;

            writeln!(
                out,
                "Subscription {} created for topic {}",
                subscription.id, subscription.topic_id
            )?;
        }

        SubscriberCommand::Subscribe {
            subscription, ack, ..
        } => {
            let summary = subscriber
                .subscribe(&subscription, ack, out, shutdown)
                .await
                .map_err(Error::command("subscribe"))?;

            info!(
                received = summary.received,
                acknowledged = summary.acknowledged,
                "receive loop finished"
            );
        }
    }

    Ok(())
}
