use std::sync::Arc;

use bot_commons::{teloxide_retry, useful_methods::BotSendChunked};
use chrono::{DateTime, Utc};
use teloxide::{
    prelude::Requester,
    types::{
        Chat, ChatId, ChatMemberKind, ChatMemberUpdated, Message, MessageId, User, UserId,
    },
    Bot,
};

use super::{ChatPlatform, PlatformError};
use crate::{
    types::{
        Author, MembershipStatus, ModerationEvent, ObservedMessage, RecentMessage, ServiceKind,
        ServiceNotice,
    },
    window::MessageWindow,
};

/// [`ChatPlatform`] on top of a teloxide [`Bot`].
///
/// The Bot API has no way to read chat history, so recent messages are served
/// from the [`MessageWindow`] that the moderator fills as messages come in.
#[derive(Clone)]
pub struct TelegramPlatform {
    bot: Bot,
    me: UserId,
    window: Arc<MessageWindow>,
}

impl TelegramPlatform {
    pub fn new(bot: Bot, me: UserId, window: Arc<MessageWindow>) -> Self {
        Self { bot, me, window }
    }
}

impl ChatPlatform for TelegramPlatform {
    fn engine_user_id(&self) -> UserId {
        self.me
    }

    async fn delete_message(&self, chat: ChatId, message: MessageId) -> Result<(), PlatformError> {
        teloxide_retry!(self.bot.delete_message(chat, message).await)?;
        Ok(())
    }

    async fn send_message(&self, chat: ChatId, html: &str) -> Result<MessageId, PlatformError> {
        let sent = self.bot.send_html_chunked(chat, html).await?;
        sent.last()
            .map(|x| x.id)
            .ok_or_else(|| PlatformError::Other("nothing to send".to_string()))
    }

    async fn ban_member(&self, chat: ChatId, user: UserId) -> Result<(), PlatformError> {
        teloxide_retry!(self.bot.ban_chat_member(chat, user).await)?;
        Ok(())
    }

    async fn membership_status(
        &self,
        chat: ChatId,
        user: UserId,
    ) -> Result<MembershipStatus, PlatformError> {
        let member = teloxide_retry!(self.bot.get_chat_member(chat, user).await)?;
        Ok(status_from_kind(&member.kind))
    }

    async fn fetch_recent_messages(
        &self,
        chat: ChatId,
        since: DateTime<Utc>,
    ) -> Vec<RecentMessage> {
        self.window.recent(chat, since)
    }
}

pub fn status_from_kind(kind: &ChatMemberKind) -> MembershipStatus {
    if kind.is_owner() {
        MembershipStatus::Owner
    } else if kind.is_administrator() {
        MembershipStatus::Administrator
    } else if kind.is_member() {
        MembershipStatus::Member
    } else if kind.is_restricted() {
        MembershipStatus::Restricted
    } else if kind.is_banned() {
        MembershipStatus::Kicked
    } else {
        MembershipStatus::Left
    }
}

/// `@username` if there is one, full name otherwise.
#[must_use]
pub fn user_name_prettyprint(user: &User) -> String {
    if let Some(username) = &user.username {
        format!("@{username}")
    } else {
        user.full_name()
    }
}

/// Turn a message into an event, if it's one moderation cares about.
///
/// Join/leave service messages become [`ModerationEvent::ServiceNotice`];
/// messages with text or a caption become [`ModerationEvent::Text`]. A message
/// sent on behalf of a chat (a channel post, or an anonymous admin) has no
/// author.
pub fn event_from_message(message: &Message) -> Option<ModerationEvent> {
    let service_kind = if message.new_chat_members().is_some() {
        Some(ServiceKind::Joined)
    } else if message.left_chat_member().is_some() {
        Some(ServiceKind::Left)
    } else {
        None
    };

    if let Some(kind) = service_kind {
        return Some(ModerationEvent::ServiceNotice(ServiceNotice {
            chat_id: message.chat.id,
            message_id: message.id,
            kind,
            timestamp: message.date,
        }));
    }

    let text = message.text().or_else(|| message.caption())?;

    let author = match (&message.sender_chat, &message.from) {
        (Some(_), _) | (None, None) => None,
        (None, Some(user)) => Some(Author {
            id: user.id,
            name: user_name_prettyprint(user),
        }),
    };

    Some(ModerationEvent::Text(ObservedMessage {
        chat_id: message.chat.id,
        message_id: message.id,
        author,
        text: text.to_string(),
        timestamp: message.date,
    }))
}

/// Turn a chat member update into a [`ModerationEvent::MembershipChange`].
pub fn event_from_member_update(update: &ChatMemberUpdated, me: UserId) -> ModerationEvent {
    ModerationEvent::MembershipChange {
        chat_id: update.chat.id,
        new_status: status_from_kind(&update.new_chat_member.kind),
        is_engine_account: update.new_chat_member.user.id == me,
    }
}

/// True for chats that are never moderated.
pub fn is_ignored_chat(chat: &Chat) -> bool {
    chat.is_private()
}
