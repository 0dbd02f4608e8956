use std::path::PathBuf;

use pubsub_broker::{BrokerError, IdKind, InvalidId};
use thiserror::Error;
use tokio::task::JoinError;

/// Errors returned by the publisher and subscriber.
#[derive(Debug, Error)]
pub enum Error<E>
where
    E: BrokerError,
{
    /// A topic or subscription with this id already exists.
    #[error("{kind} '{id}' already exists")]
    AlreadyExists {
        /// What kind of resource collided.
        kind: IdKind,
        /// The colliding id.
        id: String,
    },

    /// The broker reported a failure.
    #[error("broker error: {0}")]
    Broker(#[source] E),

    /// The id breaks the naming rules.
    #[error(transparent)]
    InvalidId(#[from] InvalidId),

    /// The payload file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// The payload file.
        path: PathBuf,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// A referenced topic or subscription does not exist.
    #[error("{kind} '{id}' not found")]
    NotFound {
        /// What kind of resource is missing.
        kind: IdKind,
        /// The missing id.
        id: String,
    },

    /// Writing to the output sink failed.
    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),

    /// The delivery stream ended without reporting an error.
    #[error("delivery stream closed unexpectedly")]
    StreamClosed,

    /// The receive worker panicked.
    #[error("receive worker failed: {0}")]
    Worker(#[from] JoinError),
}
