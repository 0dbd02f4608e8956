use crate::BrokerError;
use crate::message::Message;

use std::fmt::Debug;

use async_trait::async_trait;

/// A single receipt of a message by a subscription.
///
/// Dropping a delivery without calling [`Delivery::ack`] leaves the message
/// for redelivery once the broker's ack deadline passes.
#[async_trait]
pub trait Delivery
where
    Self: Debug + Send + Sized + 'static,
{
    /// The error type for acknowledgements.
    type Error: BrokerError;

    /// The received message.
    fn message(&self) -> &Message;

    /// Tells the broker the message was processed and must not be redelivered.
    async fn ack(self) -> Result<(), Self::Error>;
}
