use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Clone, Debug, Parser)]
#[command(name = "pubsub-cli", version, about = "A CLI for publish/subscribe messaging", long_about = None)]
pub struct Args {
    /// NATS server URL
    #[arg(long, default_value = "nats://localhost:4222", env = "PUBSUB_NATS_URL")]
    pub nats_url: String,

    /// NATS credentials file
    #[arg(long, env = "PUBSUB_NATS_CREDS")]
    pub nats_creds: Option<PathBuf>,

    /// Connection timeout in seconds
    #[arg(long, default_value_t = 5, env = "PUBSUB_CONNECT_TIMEOUT")]
    pub connect_timeout: u64,

    /// Log filter, e.g. `info` or `pubsub_client=debug`
    #[arg(long, default_value = "warn", env = "PUBSUB_LOG")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Publisher commands
    Publisher {
        #[command(subcommand)]
        command: PublisherCommand,
    },

    /// Subscriber commands
    Subscriber {
        #[command(subcommand)]
        command: SubscriberCommand,
    },
}

#[derive(Clone, Debug, Subcommand)]
pub enum PublisherCommand {
    /// List topics
    Topic {
        /// Project ID
        #[arg(long, env = "PUBSUB_PROJECT")]
        project: String,
    },

    /// Create a new topic
    CreateTopic {
        /// Project ID
        #[arg(long, env = "PUBSUB_PROJECT")]
        project: String,

        /// Topic ID to create
        #[arg(long)]
        topic: String,
    },

    /// Publish a message to a topic
    Publish {
        /// Project ID
        #[arg(long, env = "PUBSUB_PROJECT")]
        project: String,

        /// Topic ID to publish to
        #[arg(long)]
        topic: String,

        /// Path to the file containing the message payload to publish
        #[arg(long)]
        message_payload_file: PathBuf,

        /// Message attribute as KEY=VALUE, may be repeated
        #[arg(long = "attribute", value_parser = parse_attribute)]
        attributes: Vec<(String, String)>,
    },
}

#[derive(Clone, Debug, Subcommand)]
pub enum SubscriberCommand {
    /// Create a subscription for a topic
    CreateSubscription {
        /// Project ID
        #[arg(long, env = "PUBSUB_PROJECT")]
        project: String,

        /// Topic ID to subscribe to
        #[arg(long)]
        topic: String,

        /// Subscription ID to create
        #[arg(long)]
        subscription: String,
    },

    /// Subscribe to a subscription
    Subscribe {
        /// Project ID
        #[arg(long, env = "PUBSUB_PROJECT")]
        project: String,

        /// Subscription ID to subscribe to
        #[arg(long)]
        subscription: String,

        /// Acknowledge received messages
        #[arg(long)]
        ack: bool,
    },
}

impl Command {
    /// The project the command operates in.
    pub fn project(&self) -> &str {
        match self {
            Self::Publisher { command } => match command {
                PublisherCommand::Topic { project }
                | PublisherCommand::CreateTopic { project, .. }
                | PublisherCommand::Publish { project, .. } => project,
            },
            Self::Subscriber { command } => match command {
                SubscriberCommand::CreateSubscription { project, .. }
                | SubscriberCommand::Subscribe { project, .. } => project,
            },
        }
    }

    /// Whether the command runs until interrupted.
    pub const fn is_long_running(&self) -> bool {
        matches!(
            self,
            Self::Subscriber {
                command: SubscriberCommand::Subscribe { .. }
            }
        )
    }
}

/// Parses `KEY=VALUE`. The value may be empty and may itself contain `=`.
fn parse_attribute(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid attribute '{s}': expected KEY=VALUE"))?;

    if key.is_empty() {
        return Err(format!("invalid attribute '{s}': key is empty"));
    }

    if key.chars().any(|c| c == ':' || c.is_whitespace() || c.is_control()) {
        return Err(format!(
            "invalid attribute '{s}': key must not contain ':' or whitespace"
        ));
    }

    Ok((key.to_string(), value.to_string()))
}
