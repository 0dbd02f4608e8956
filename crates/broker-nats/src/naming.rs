//! How projects, topics and subscriptions map onto `JetStream` names.
//!
//! A topic is a stream `<project>_<topic>` capturing the single subject
//! `<project>.<topic>`. Subscriptions are durable consumers named after the
//! subscription, and their topic bindings live in the KV bucket
//! `<project>-subscriptions`. Ids never contain `.`, so the subject is the
//! unambiguous identity of a topic.

/// The subject a topic's messages are published to.
pub fn topic_subject(project: &str, topic_id: &str) -> String {
    format!("{project}.{topic_id}")
}

/// The topic id behind a subject, if the subject belongs to the project.
pub fn topic_from_subject<'a>(project: &str, subject: &'a str) -> Option<&'a str> {
    subject
        .strip_prefix(project)?
        .strip_prefix('.')
        .filter(|topic| !topic.is_empty() && !topic.contains(['.', '*', '>']))
}

/// The name of the stream backing a topic.
pub fn stream_name(project: &str, topic_id: &str) -> String {
    format!("{project}_{topic_id}")
}

/// The KV bucket holding subscription to topic bindings.
pub fn subscriptions_bucket(project: &str) -> String {
    format!("{project}-subscriptions")
}

/// Headers `JetStream` reserves for itself; they are not message attributes.
pub fn is_reserved_header(name: &str) -> bool {
    name.get(..5)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("nats-"))
}
