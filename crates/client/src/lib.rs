//! Publisher and subscriber facades over a [`pubsub_broker::Broker`].
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod publisher;
pub mod receive;
mod subscriber;

pub use error::Error;
pub use publisher::Publisher;
pub use receive::ReceiveSummary;
pub use subscriber::Subscriber;
