use std::fmt::Display;

use chrono::{DateTime, Utc};
use teloxide::types::{ChatId, MessageId, UserId};
use url::Url;

/// A single host name, lowercased.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct Domain(String);

impl Domain {
    /// Returns [`None`] for URLs without a host, like `mailto:` links.
    pub fn from_url(url: &Url) -> Option<Self> {
        url.host_str().map(|x| Self(x.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        self.as_ref()
    }
}

impl AsRef<str> for Domain {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Whoever wrote a message. Channel posts and anonymous admins have none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: UserId,
    /// Pretty name for notices, like `@username` or a full name.
    pub name: String,
}

/// A text message or a media caption seen in a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedMessage {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub author: Option<Author>,
    /// Text or caption.
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Joined,
    Left,
}

/// A "user has joined/left" service message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceNotice {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub kind: ServiceKind,
    pub timestamp: DateTime<Utc>,
}

/// An entry of a chat's recent history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecentMessage {
    Text(ObservedMessage),
    Service(ServiceNotice),
}

impl RecentMessage {
    pub fn message_id(&self) -> MessageId {
        match self {
            RecentMessage::Text(m) => m.message_id,
            RecentMessage::Service(n) => n.message_id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            RecentMessage::Text(m) => m.timestamp,
            RecentMessage::Service(n) => n.timestamp,
        }
    }
}

/// Status of an account in a chat, as far as moderation cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MembershipStatus {
    Owner,
    Administrator,
    Member,
    Restricted,
    Left,
    Kicked,
}

impl MembershipStatus {
    /// True if the engine holding this status in a chat should moderate it.
    #[must_use]
    pub fn is_monitorable(self) -> bool {
        matches!(
            self,
            MembershipStatus::Owner | MembershipStatus::Administrator | MembershipStatus::Member
        )
    }
}

impl Display for MembershipStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MembershipStatus::Owner => "owner",
            MembershipStatus::Administrator => "administrator",
            MembershipStatus::Member => "member",
            MembershipStatus::Restricted => "restricted",
            MembershipStatus::Left => "left",
            MembershipStatus::Kicked => "kicked",
        };
        f.write_str(name)
    }
}

/// Everything the moderation engine reacts to, independent of the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationEvent {
    Text(ObservedMessage),
    MembershipChange {
        chat_id: ChatId,
        new_status: MembershipStatus,
        is_engine_account: bool,
    },
    ServiceNotice(ServiceNotice),
    Callback {
        data: Option<String>,
    },
}

/// An allowed link waiting for the next health check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub url: String,
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub author: Option<Author>,
    pub first_seen: DateTime<Utc>,
    /// Text of the message the link came from. Shown as its title in summaries.
    pub context: String,
}

impl Link {
    pub fn from_message(message: &ObservedMessage, url: &str) -> Self {
        Link {
            url: url.to_string(),
            chat_id: message.chat_id,
            message_id: message.message_id,
            author: message.author.clone(),
            first_seen: message.timestamp,
            context: message.text.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn domain_is_lowercased() {
        let url = Url::parse("https://BLNDev.COM/a").unwrap();
        assert_eq!(Domain::from_url(&url).unwrap().as_str(), "blndev.com");
    }

    #[test]
    fn no_domain_without_host() {
        let url = Url::parse("mailto:someone@example.com").unwrap();
        assert!(Domain::from_url(&url).is_none());
    }

    #[test]
    fn monitorable_statuses() {
        assert!(MembershipStatus::Administrator.is_monitorable());
        assert!(MembershipStatus::Member.is_monitorable());
        assert!(MembershipStatus::Owner.is_monitorable());
        assert!(!MembershipStatus::Restricted.is_monitorable());
        assert!(!MembershipStatus::Left.is_monitorable());
        assert!(!MembershipStatus::Kicked.is_monitorable());
    }
}
