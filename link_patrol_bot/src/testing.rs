//! Fakes of the outside world for tests.

#![allow(clippy::unwrap_used)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Utc};
use teloxide::types::{ChatId, MessageId, UserId};

use crate::{
    config::Config,
    platform::{ChatPlatform, PlatformError},
    probe::{LinkProber, ProbeError, ProbeReply},
    state::ModerationState,
    types::{Author, MembershipStatus, ObservedMessage, RecentMessage},
};

pub const ENGINE: UserId = UserId(42);
pub const CHAT: ChatId = ChatId(-1001);
pub const USER: UserId = UserId(1000);

#[derive(Default)]
pub struct FakeChats {
    pub deleted: Vec<(ChatId, MessageId)>,
    pub sent: Vec<(ChatId, String)>,
    pub banned: Vec<(ChatId, UserId)>,
    pub status_queries: Vec<ChatId>,
    pub statuses: HashMap<ChatId, MembershipStatus>,
    pub history: HashMap<ChatId, Vec<RecentMessage>>,
    pub fail_status_queries: bool,
    pub fail_sends: bool,
    pub fail_bans: bool,
    pub already_deleted: Vec<MessageId>,
    next_message_id: i32,
}

/// In-memory [`ChatPlatform`] that records everything done through it.
/// Clones share the same state.
#[derive(Clone, Default)]
pub struct FakePlatform {
    pub chats: Arc<Mutex<FakeChats>>,
}

impl FakePlatform {
    pub fn with(&self, f: impl FnOnce(&mut FakeChats)) {
        f(&mut self.chats.lock().unwrap());
    }

    pub fn deleted(&self) -> Vec<(ChatId, MessageId)> {
        self.chats.lock().unwrap().deleted.clone()
    }

    pub fn sent(&self) -> Vec<(ChatId, String)> {
        self.chats.lock().unwrap().sent.clone()
    }

    pub fn banned(&self) -> Vec<(ChatId, UserId)> {
        self.chats.lock().unwrap().banned.clone()
    }

    pub fn status_queries(&self) -> Vec<ChatId> {
        self.chats.lock().unwrap().status_queries.clone()
    }
}

impl ChatPlatform for FakePlatform {
    fn engine_user_id(&self) -> UserId {
        ENGINE
    }

    async fn delete_message(&self, chat: ChatId, message: MessageId) -> Result<(), PlatformError> {
        let mut chats = self.chats.lock().unwrap();
        if chats.already_deleted.contains(&message) || chats.deleted.contains(&(chat, message)) {
            return Err(PlatformError::Gone);
        }
        chats.deleted.push((chat, message));
        Ok(())
    }

    async fn send_message(&self, chat: ChatId, html: &str) -> Result<MessageId, PlatformError> {
        let mut chats = self.chats.lock().unwrap();
        if chats.fail_sends {
            return Err(PlatformError::Forbidden("can't send messages".to_string()));
        }
        chats.sent.push((chat, html.to_string()));
        chats.next_message_id += 1;
        Ok(MessageId(10_000 + chats.next_message_id))
    }

    async fn ban_member(&self, chat: ChatId, user: UserId) -> Result<(), PlatformError> {
        let mut chats = self.chats.lock().unwrap();
        if chats.fail_bans {
            return Err(PlatformError::Forbidden("can't ban".to_string()));
        }
        chats.banned.push((chat, user));
        Ok(())
    }

    async fn membership_status(
        &self,
        chat: ChatId,
        _user: UserId,
    ) -> Result<MembershipStatus, PlatformError> {
        let mut chats = self.chats.lock().unwrap();
        chats.status_queries.push(chat);
        if chats.fail_status_queries {
            return Err(PlatformError::Other("no answer".to_string()));
        }
        Ok(chats
            .statuses
            .get(&chat)
            .copied()
            .unwrap_or(MembershipStatus::Left))
    }

    async fn fetch_recent_messages(
        &self,
        chat: ChatId,
        since: DateTime<Utc>,
    ) -> Vec<RecentMessage> {
        self.chats
            .lock()
            .unwrap()
            .history
            .get(&chat)
            .map(|x| {
                x.iter()
                    .filter(|m| m.timestamp() >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// [`LinkProber`] answering from a script; unscripted URLs answer 200.
#[derive(Clone, Default)]
pub struct ScriptedProber {
    pub replies: Arc<Mutex<HashMap<String, Result<ProbeReply, ProbeError>>>>,
    pub probed: Arc<Mutex<Vec<String>>>,
}

impl ScriptedProber {
    pub fn reply(&self, url: &str, status: u16, location: Option<&str>) {
        self.replies.lock().unwrap().insert(
            url.to_string(),
            Ok(ProbeReply {
                status,
                location: location.map(ToString::to_string),
            }),
        );
    }

    pub fn fail(&self, url: &str) {
        self.replies
            .lock()
            .unwrap()
            .insert(url.to_string(), Err(ProbeError("connection reset".to_string())));
    }

    pub fn probed(&self) -> Vec<String> {
        let mut probed = self.probed.lock().unwrap().clone();
        probed.sort();
        probed
    }
}

impl LinkProber for ScriptedProber {
    async fn probe(&self, url: &str) -> Result<ProbeReply, ProbeError> {
        self.probed.lock().unwrap().push(url.to_string());
        self.replies
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or(Ok(ProbeReply {
                status: 200,
                location: None,
            }))
    }
}

pub fn state_with_threshold(threshold: u32) -> Arc<ModerationState> {
    let config = Config {
        warning_threshold: threshold,
        ..Config::default()
    };
    Arc::new(ModerationState::new(&config))
}

pub fn message(id: i32, text: &str) -> ObservedMessage {
    ObservedMessage {
        chat_id: CHAT,
        message_id: MessageId(id),
        author: Some(Author {
            id: USER,
            name: "@someone".to_string(),
        }),
        text: text.to_string(),
        timestamp: Utc::now(),
    }
}
