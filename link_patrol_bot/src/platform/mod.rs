//! What the moderation engine needs from a messaging platform.

pub mod telegram;

use std::future::Future;

use chrono::{DateTime, Utc};
use teloxide::{
    types::{ChatId, MessageId, UserId},
    ApiError, RequestError,
};
use thiserror::Error;

use crate::types::{MembershipStatus, RecentMessage};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlatformError {
    /// The message or member is already gone. Someone else probably got to it first.
    #[error("target is already gone")]
    Gone,
    #[error("not enough rights: {0}")]
    Forbidden(String),
    #[error("rate limited")]
    RateLimited,
    #[error("{0}")]
    Other(String),
}

impl PlatformError {
    /// True for failures that are expected and not worth a warning.
    pub fn is_ignorable(&self) -> bool {
        matches!(self, PlatformError::Gone)
    }

    /// Log this failure of `what`, at a level befitting it.
    pub fn log(&self, what: &str) {
        if self.is_ignorable() {
            log::debug!("Failed to {what}: {self}");
        } else {
            log::warn!("Failed to {what}: {self}");
        }
    }
}

impl From<RequestError> for PlatformError {
    fn from(value: RequestError) -> Self {
        match value {
            RequestError::Api(
                ApiError::MessageToDeleteNotFound
                | ApiError::MessageIdInvalid
                | ApiError::UserNotFound,
            ) => PlatformError::Gone,
            RequestError::Api(
                e @ (ApiError::MessageCantBeDeleted
                | ApiError::NotEnoughRightsToRestrict
                | ApiError::BotKicked
                | ApiError::ChatNotFound),
            ) => PlatformError::Forbidden(e.to_string()),
            RequestError::RetryAfter(_) => PlatformError::RateLimited,
            e => PlatformError::Other(e.to_string()),
        }
    }
}

/// Chat operations the engine performs. Implemented for Telegram by
/// [`telegram::TelegramPlatform`].
pub trait ChatPlatform: Send + Sync {
    /// ID of the account the engine acts as.
    fn engine_user_id(&self) -> UserId;

    fn delete_message(
        &self,
        chat: ChatId,
        message: MessageId,
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;

    /// Send an HTML message. Returns the ID of the (last) sent message.
    fn send_message(
        &self,
        chat: ChatId,
        html: &str,
    ) -> impl Future<Output = Result<MessageId, PlatformError>> + Send;

    fn ban_member(
        &self,
        chat: ChatId,
        user: UserId,
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;

    fn membership_status(
        &self,
        chat: ChatId,
        user: UserId,
    ) -> impl Future<Output = Result<MembershipStatus, PlatformError>> + Send;

    /// Messages of this chat no older than `since`, oldest first. May be
    /// limited to however many the platform can provide.
    fn fetch_recent_messages(
        &self,
        chat: ChatId,
        since: DateTime<Utc>,
    ) -> impl Future<Output = Vec<RecentMessage>> + Send;
}
