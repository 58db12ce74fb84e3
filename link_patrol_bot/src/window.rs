use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, PoisonError},
};

use chrono::{DateTime, TimeDelta, Utc};
use teloxide::types::{ChatId, MessageId};

use crate::types::RecentMessage;

/// Bounded, time-ordered buffer of recent messages per chat.
///
/// Telegram bots can't read chat history, so this is what the health checker
/// rescans instead. Entries older than the retention window are pruned, and
/// each chat keeps at most `capacity` entries.
#[derive(Debug)]
pub struct MessageWindow {
    retention: TimeDelta,
    capacity: usize,
    chats: Mutex<HashMap<ChatId, VecDeque<RecentMessage>>>,
}

impl MessageWindow {
    pub fn new(retention: TimeDelta, capacity: usize) -> Self {
        Self {
            retention,
            capacity: capacity.max(1),
            chats: Mutex::new(HashMap::new()),
        }
    }

    pub fn record(&self, chat: ChatId, message: RecentMessage) {
        let now = Utc::now();
        let mut chats = self.chats.lock().unwrap_or_else(PoisonError::into_inner);
        let entries = chats.entry(chat).or_default();

        // Edits replace the earlier version.
        entries.retain(|x| x.message_id() != message.message_id());

        // Keep it sorted; messages mostly arrive in order, so search from the back.
        let position = entries
            .iter()
            .rposition(|x| x.timestamp() <= message.timestamp())
            .map_or(0, |x| x + 1);
        entries.insert(position, message);

        prune(entries, now - self.retention, self.capacity);
    }

    /// Messages of this chat no older than `since`, oldest first.
    pub fn recent(&self, chat: ChatId, since: DateTime<Utc>) -> Vec<RecentMessage> {
        let now = Utc::now();
        let mut chats = self.chats.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(entries) = chats.get_mut(&chat) else {
            return Vec::new();
        };

        prune(entries, now - self.retention, self.capacity);

        entries
            .iter()
            .filter(|x| x.timestamp() >= since)
            .cloned()
            .collect()
    }

    /// Drop a message, typically because it got deleted.
    pub fn forget_message(&self, chat: ChatId, message_id: MessageId) {
        let mut chats = self.chats.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entries) = chats.get_mut(&chat) {
            entries.retain(|x| x.message_id() != message_id);
        }
    }

    pub fn forget_chat(&self, chat: ChatId) {
        self.chats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&chat);
    }
}

fn prune(entries: &mut VecDeque<RecentMessage>, oldest: DateTime<Utc>, capacity: usize) {
    while entries.front().is_some_and(|x| x.timestamp() < oldest) {
        entries.pop_front();
    }
    while entries.len() > capacity {
        entries.pop_front();
    }
}
