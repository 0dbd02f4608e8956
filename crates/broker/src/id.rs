use std::fmt::{Display, Formatter, Result as FmtResult};

use thiserror::Error;

const MAX_ID_LEN: usize = 255;

/// What an identifier names.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IdKind {
    /// A project (namespace for topics and subscriptions).
    Project,

    /// A topic.
    Topic,

    /// A subscription.
    Subscription,
}

impl Display for IdKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Project => f.write_str("project"),
            Self::Topic => f.write_str("topic"),
            Self::Subscription => f.write_str("subscription"),
        }
    }
}

/// An identifier that breaks the naming rules.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error(
    "invalid {kind} id '{id}' - must be 1-255 characters, start with a letter, and contain only letters, digits, '-' or '_'"
)]
pub struct InvalidId {
    /// What the identifier names.
    pub kind: IdKind,

    /// The rejected identifier.
    pub id: String,
}

/// Checks an identifier against the naming rules.
///
/// Valid ids are usable verbatim as NATS subject tokens, stream and consumer
/// names, and KV bucket names and keys.
///
/// # Errors
/// Returns [`InvalidId`] if the id is empty, too long, does not start with an
/// ASCII letter, or contains anything other than ASCII letters, digits, `-` or `_`.
pub fn validate_id(kind: IdKind, id: &str) -> Result<(), InvalidId> {
    let starts_with_letter = id.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    let allowed = id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if starts_with_letter && allowed && id.len() <= MAX_ID_LEN {
        Ok(())
    } else {
        Err(InvalidId {
            kind,
            id: id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_simple_ids() {
        assert!(validate_id(IdKind::Topic, "t1").is_ok());
        assert!(validate_id(IdKind::Subscription, "sub-x").is_ok());
        assert!(validate_id(IdKind::Project, "my_project-2").is_ok());
    }

    #[test]
    fn test_rejects_subject_metacharacters() {
        for id in ["a.b", "a*", "a>", "a b", "a/b"] {
            assert_eq!(
                validate_id(IdKind::Topic, id),
                Err(InvalidId {
                    kind: IdKind::Topic,
                    id: id.to_string()
                })
            );
        }
    }

    #[test]
    fn test_rejects_empty_and_leading_non_letter() {
        assert!(validate_id(IdKind::Topic, "").is_err());
        assert!(validate_id(IdKind::Topic, "1topic").is_err());
        assert!(validate_id(IdKind::Topic, "-topic").is_err());
    }

    #[test]
    fn test_length_limit() {
        let longest = "a".repeat(MAX_ID_LEN);
        assert!(validate_id(IdKind::Topic, &longest).is_ok());

        let too_long = "a".repeat(MAX_ID_LEN + 1);
        assert!(validate_id(IdKind::Topic, &too_long).is_err());
    }

    #[test]
    fn test_error_message_names_kind() {
        let err = validate_id(IdKind::Subscription, "bad.id").unwrap_err();
        assert!(err.to_string().starts_with("invalid subscription id 'bad.id'"));
    }
}
