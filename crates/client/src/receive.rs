//! The receive loop behind [`crate::Subscriber::subscribe`].
//!
//! One worker task pulls deliveries from the broker and forwards them over a
//! bounded channel. The calling task renders and acknowledges them, so it is
//! the only writer to the output sink. Cancellation is checked between
//! messages, never during one.

use crate::Error;

use std::io::{self, Write};

use chrono::SecondsFormat;
use futures::StreamExt;
use pubsub_broker::{Broker, Deliveries, Delivery, Message};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

/// Counts reported once the loop stops.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ReceiveSummary {
    /// Messages rendered, redeliveries included.
    pub received: u64,

    /// Messages acknowledged.
    pub acknowledged: u64,
}

/// Runs the receive loop until `shutdown` is cancelled or the delivery stream fails.
///
/// # Errors
///
/// Returns [`Error::Broker`] if the stream or an ack fails, [`Error::StreamClosed`]
/// if the stream ends on its own, and [`Error::Output`] if the sink fails.
pub async fn run<B, W>(
    broker: &B,
    subscription_id: &str,
    should_ack: bool,
    sink: &mut W,
    shutdown: &CancellationToken,
) -> Result<ReceiveSummary, Error<B::Error>>
where
    B: Broker,
    W: Write + Send,
{
    writeln!(sink, "Listening for messages on subscription {subscription_id}...")?;
    writeln!(sink, "Press Ctrl+C to exit")?;
    writeln!(sink)?;
    sink.flush()?;

    let deliveries = broker
        .receive(subscription_id)
        .await
        .map_err(Error::Broker)?;
    debug!(subscription = subscription_id, "listening");

    drive(deliveries, sink, subscription_id, should_ack, shutdown).await
}

async fn drive<D, W>(
    deliveries: Deliveries<D, D::Error>,
    sink: &mut W,
    subscription_id: &str,
    should_ack: bool,
    shutdown: &CancellationToken,
) -> Result<ReceiveSummary, Error<D::Error>>
where
    D: Delivery,
    W: Write + Send,
{
    let worker_token = shutdown.child_token();
    let (tx, mut rx) = mpsc::channel(1);
    let worker = tokio::spawn(forward(deliveries, tx, worker_token.clone()));

    let result = listen(&mut rx, sink, subscription_id, should_ack, shutdown).await;

    // anything still buffered is dropped unacknowledged and left for redelivery
    worker_token.cancel();
    drop(rx);
    let joined = worker.await;

    match (result, joined) {
        (Ok(_) | Err(Error::StreamClosed), Err(join_error)) => Err(Error::Worker(join_error)),
        (result, _) => result,
    }
}

async fn forward<X, E>(
    mut deliveries: Deliveries<X, E>,
    tx: mpsc::Sender<Result<X, E>>,
    token: CancellationToken,
) where
    X: Send + 'static,
    E: Send + 'static,
{
    loop {
        let item = tokio::select! {
            () = token.cancelled() => break,
            item = deliveries.next() => item,
        };

        // end of stream: dropping the sender tells the loop
        let Some(item) = item else {
            break;
        };
        let fatal = item.is_err();

        tokio::select! {
            () = token.cancelled() => break,
            sent = tx.send(item) => {
                if sent.is_err() {
                    break;
                }
            }
        }

        if fatal {
            break;
        }
    }

    trace!("receive worker stopped");
}

async fn listen<D, W>(
    rx: &mut mpsc::Receiver<Result<D, D::Error>>,
    sink: &mut W,
    subscription_id: &str,
    should_ack: bool,
    shutdown: &CancellationToken,
) -> Result<ReceiveSummary, Error<D::Error>>
where
    D: Delivery,
    W: Write + Send,
{
    let mut summary = ReceiveSummary::default();

    loop {
        tokio::select! {
            biased;

            () = shutdown.cancelled() => {
                writeln!(sink, "Subscription stopped: cancelled")?;
                sink.flush()?;
                info!(
                    subscription = subscription_id,
                    received = summary.received,
                    acknowledged = summary.acknowledged,
                    "subscription stopped"
                );
                return Ok(summary);
            }

            item = rx.recv() => {
                let delivery = item.ok_or(Error::StreamClosed)?.map_err(Error::Broker)?;
                handle(delivery, sink, should_ack, &mut summary).await?;
            }
        }
    }
}

async fn handle<D, W>(
    delivery: D,
    sink: &mut W,
    should_ack: bool,
    summary: &mut ReceiveSummary,
) -> Result<(), Error<D::Error>>
where
    D: Delivery,
    W: Write + Send,
{
    let id = delivery.message().id.clone();
    render(sink, delivery.message())?;
    summary.received += 1;

    if should_ack {
        delivery.ack().await.map_err(Error::Broker)?;
        summary.acknowledged += 1;
        writeln!(sink, "Message acknowledged: ID={id}")?;
        debug!(message = %id, "acknowledged");
    } else {
        drop(delivery);
        writeln!(sink, "Message not acknowledged (--ack flag not provided)")?;
        debug!(message = %id, "left unacknowledged");
    }

    writeln!(sink)?;
    sink.flush()?;

    Ok(())
}

/// Writes the console rendering of one received message.
///
/// # Errors
///
/// Fails if the sink does.
pub fn render<W: Write>(sink: &mut W, message: &Message) -> io::Result<()> {
    writeln!(sink, "Received message: ID={}", message.id)?;
    writeln!(sink, "Data: {}", String::from_utf8_lossy(&message.payload))?;

    if !message.attributes.is_empty() {
        writeln!(sink, "Attributes:")?;
        for (key, value) in &message.attributes {
            writeln!(sink, "  {key}: {value}")?;
        }
    }

    writeln!(
        sink,
        "PublishTime: {}",
        message
            .publish_time
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    )?;
    writeln!(sink)
}
