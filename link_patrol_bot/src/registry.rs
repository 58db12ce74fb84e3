use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use teloxide::types::ChatId;

use crate::types::Link;

/// Allowed links seen per chat since the last health check.
#[derive(Debug, Default)]
pub struct ActiveLinkRegistry {
    chats: Mutex<HashMap<ChatId, HashMap<String, Link>>>,
}

impl ActiveLinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update a link, keyed by chat and URL. A link seen again keeps
    /// its original `first_seen`, but takes the newer message and context.
    ///
    /// Only the latest message posting a URL is remembered, so if the link
    /// breaks, earlier posts of it stay up.
    pub fn register(&self, link: Link) {
        let mut chats = self.chats.lock().unwrap_or_else(PoisonError::into_inner);
        let links = chats.entry(link.chat_id).or_default();

        match links.get_mut(&link.url) {
            Some(existing) => {
                let first_seen = existing.first_seen.min(link.first_seen);
                *existing = link;
                existing.first_seen = first_seen;
            }
            None => {
                links.insert(link.url.clone(), link);
            }
        }
    }

    /// All links of this chat, oldest first.
    pub fn snapshot(&self, chat: ChatId) -> Vec<Link> {
        let mut links: Vec<Link> = self
            .chats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&chat)
            .map(|x| x.values().cloned().collect())
            .unwrap_or_default();
        links.sort_by(|a, b| a.first_seen.cmp(&b.first_seen).then(a.url.cmp(&b.url)));
        links
    }

    pub fn len(&self, chat: ChatId) -> usize {
        self.chats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&chat)
            .map_or(0, HashMap::len)
    }

    pub fn is_empty(&self, chat: ChatId) -> bool {
        self.len(chat) == 0
    }

    pub fn clear(&self, chat: ChatId) {
        self.chats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&chat);
    }

    /// Drop every chat for which `keep` returns false.
    pub fn retain_chats(&self, mut keep: impl FnMut(ChatId) -> bool) {
        self.chats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|chat, _| keep(*chat));
    }
}
