use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{ChatMemberUpdated, Me},
    RequestError,
};

use crate::{
    moderation::Moderator,
    platform::telegram::{
        event_from_member_update, event_from_message, is_ignored_chat, TelegramPlatform,
    },
    types::ModerationEvent,
};

pub type BotModerator = Arc<Moderator<TelegramPlatform>>;

/// New and edited messages and channel posts alike.
pub async fn handle_message(message: Message, moderator: BotModerator) -> Result<(), RequestError> {
    if is_ignored_chat(&message.chat) {
        return Ok(());
    }

    if let Some(event) = event_from_message(&message) {
        moderator.handle_event(event).await;
    }

    Ok(())
}

/// Membership changes, of the bot itself or of anyone else.
pub async fn handle_member_update(
    update: ChatMemberUpdated,
    me: Me,
    moderator: BotModerator,
) -> Result<(), RequestError> {
    if is_ignored_chat(&update.chat) {
        return Ok(());
    }

    let event = event_from_member_update(&update, me.id);
    moderator.handle_event(event).await;
    Ok(())
}

/// There are no buttons to press, but answer so the client stops spinning.
pub async fn handle_callback_query(
    bot: Bot,
    query: CallbackQuery,
    moderator: BotModerator,
) -> Result<(), RequestError> {
    moderator
        .handle_event(ModerationEvent::Callback {
            data: query.data.clone(),
        })
        .await;

    bot.answer_callback_query(query.id).await?;
    Ok(())
}
