use teloxide::types::{ChatId, MessageId};

use crate::{
    notices,
    platform::ChatPlatform,
    state::ModerationState,
    types::Author,
    warnings::Escalation,
};

/// Delete a message, logging rather than returning any failure. Returns true
/// if the message is gone, whether it was this call that deleted it or not.
pub async fn delete_message_logged<P: ChatPlatform>(
    platform: &P,
    state: &ModerationState,
    chat: ChatId,
    message: MessageId,
) -> bool {
    let deleted = match platform.delete_message(chat, message).await {
        Ok(()) => true,
        Err(e) => {
            e.log(&format!("delete message {message} in {chat}"));
            e.is_ignorable()
        }
    };

    if deleted {
        state.window.forget_message(chat, message);
    }
    deleted
}

/// Send a notice, logging any failure.
pub async fn send_notice<P: ChatPlatform>(platform: &P, chat: ChatId, text: &str) {
    if let Err(e) = platform.send_message(chat, text).await {
        e.log(&format!("send a notice to {chat}"));
    }
}

/// Deal with a message that contains a disallowed link: delete it, then warn
/// or ban its author. Messages without an author are only deleted.
pub async fn enforce_violation<P: ChatPlatform>(
    platform: &P,
    state: &ModerationState,
    chat: ChatId,
    message: MessageId,
    author: Option<&Author>,
) {
    delete_message_logged(platform, state, chat, message).await;

    let Some(author) = author else {
        log::debug!("Removed an authorless message {message} in {chat}");
        return;
    };

    let threshold = state.ledger.threshold();
    let (count, escalation) = state.ledger.record_violation(author.id);

    match escalation {
        Escalation::Warn => {
            log::info!("Warning {count}/{threshold} for {} in {chat}", author.name);
            let text = notices::warning(
                &author.name,
                count,
                threshold,
                &state.policy.allowed_domains(),
            );
            send_notice(platform, chat, &text).await;
        }
        Escalation::Ban => {
            log::info!("Banning {} from {chat} after {count} warnings", author.name);
            // The counter is already reset, and a failed ban is not retried.
            match platform.ban_member(chat, author.id).await {
                Ok(()) => {
                    send_notice(platform, chat, &notices::ban(&author.name, threshold)).await;
                }
                Err(e) => e.log(&format!("ban {} from {chat}", author.name)),
            }
        }
    }
}
