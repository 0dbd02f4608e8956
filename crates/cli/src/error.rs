use pubsub_broker::{BrokerError, InvalidId};
use thiserror::Error;

/// CLI-specific error type
#[derive(Debug, Error)]
pub enum Error<E>
where
    E: BrokerError,
{
    /// A facade operation failed
    #[error("failed to {action}: {source}")]
    Command {
        /// What the command was doing.
        action: &'static str,
        /// The facade error.
        source: pubsub_client::Error<E>,
    },

    /// Connecting to the broker failed
    #[error("failed to connect to broker: {0}")]
    Connect(#[source] E),

    /// The project id breaks the naming rules
    #[error(transparent)]
    InvalidProject(#[from] InvalidId),

    /// Writing command output failed
    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

impl<E> Error<E>
where
    E: BrokerError,
{
    /// Wraps a facade error with the action that produced it.
    pub fn command(action: &'static str) -> impl FnOnce(pubsub_client::Error<E>) -> Self {
        move |source| Self::Command { action, source }
    }
}
