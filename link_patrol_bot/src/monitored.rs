use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use teloxide::types::ChatId;

use crate::{platform::PlatformError, types::MembershipStatus};

/// How a chat's monitoring changed after an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Started,
    Stopped,
    Unchanged,
}

/// Which chats get moderated.
///
/// A chat is monitored while the engine's own account is an owner, admin or
/// member there. Chats that were seen but aren't monitored are remembered too,
/// so that only chats never seen before trigger a status lookup.
#[derive(Debug, Default)]
pub struct MonitoredChats {
    chats: Mutex<HashMap<ChatId, bool>>,
}

impl MonitoredChats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a status reported for the engine's own account.
    pub fn apply_status(&self, chat: ChatId, status: MembershipStatus) -> Transition {
        self.set(chat, status.is_monitorable())
    }

    /// Apply the answer to an authoritative status lookup.
    ///
    /// Failing to find out means not moderating for now. The chat goes back to
    /// unknown, so the next message from it triggers another lookup.
    pub fn reconcile(
        &self,
        chat: ChatId,
        status: Result<MembershipStatus, PlatformError>,
    ) -> Transition {
        match status {
            Ok(status) => self.apply_status(chat, status),
            Err(e) => {
                log::warn!("Could not confirm own status in {chat}, not moderating it: {e}");
                self.forget(chat)
            }
        }
    }

    fn forget(&self, chat: ChatId) -> Transition {
        let previous = self
            .chats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&chat)
            .unwrap_or(false);

        match previous {
            true => Transition::Stopped,
            false => Transition::Unchanged,
        }
    }

    fn set(&self, chat: ChatId, monitored: bool) -> Transition {
        let previous = self
            .chats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(chat, monitored)
            .unwrap_or(false);

        match (previous, monitored) {
            (false, true) => Transition::Started,
            (true, false) => Transition::Stopped,
            _ => Transition::Unchanged,
        }
    }

    /// Mark chats from the snapshot store as monitored. They should be
    /// [`reconcile`][Self::reconcile]d afterwards.
    pub fn restore(&self, chats: impl IntoIterator<Item = ChatId>) {
        let mut known = self.chats.lock().unwrap_or_else(PoisonError::into_inner);
        for chat in chats {
            known.insert(chat, true);
        }
    }

    pub fn is_monitored(&self, chat: ChatId) -> bool {
        self.chats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&chat)
            .copied()
            .unwrap_or(false)
    }

    /// True if this chat's status was ever set, monitored or not.
    pub fn is_known(&self, chat: ChatId) -> bool {
        self.chats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&chat)
    }

    /// All monitored chats, in a stable order.
    pub fn chats(&self) -> Vec<ChatId> {
        let mut chats: Vec<ChatId> = self
            .chats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, monitored)| **monitored)
            .map(|(chat, _)| *chat)
            .collect();
        chats.sort_by_key(|x| x.0);
        chats
    }
}
