use std::sync::Arc;

use teloxide::types::ChatId;

use crate::{
    actions::{delete_message_logged, enforce_violation},
    extract::extract_urls,
    monitored::Transition,
    platform::ChatPlatform,
    state::ModerationState,
    types::{Link, ModerationEvent, ObservedMessage, RecentMessage, ServiceNotice},
};

/// Reacts to incoming events: checks links, deletes and escalates on
/// disallowed ones, registers allowed ones, and keeps track of which chats are
/// moderated.
pub struct Moderator<P> {
    platform: P,
    state: Arc<ModerationState>,
}

impl<P: ChatPlatform> Moderator<P> {
    pub fn new(platform: P, state: Arc<ModerationState>) -> Self {
        Self { platform, state }
    }

    pub async fn handle_event(&self, event: ModerationEvent) {
        match event {
            ModerationEvent::Text(message) => self.handle_text(message).await,
            ModerationEvent::MembershipChange {
                chat_id,
                new_status,
                is_engine_account,
            } => {
                if !is_engine_account {
                    return;
                }
                log::info!("Own status in {chat_id} is now {new_status}");
                let transition = self.state.monitored.apply_status(chat_id, new_status);
                self.after_transition(chat_id, transition);
            }
            ModerationEvent::ServiceNotice(notice) => self.handle_service_notice(notice).await,
            ModerationEvent::Callback { data } => {
                log::debug!("Ignoring callback query with data {data:?}");
            }
        }
    }

    async fn handle_text(&self, message: ObservedMessage) {
        let chat = message.chat_id;

        if !self.state.monitored.is_known(chat) {
            // Never heard of this chat. Ask what we are in it.
            log::debug!("First message from {chat}, checking own status...");
            let status = self
                .platform
                .membership_status(chat, self.platform.engine_user_id())
                .await;
            let transition = self.state.monitored.reconcile(chat, status);
            self.after_transition(chat, transition);
        }

        if !self.state.monitored.is_monitored(chat) {
            return;
        }

        let urls = extract_urls(&message.text);

        // One disallowed link is enough to remove the whole message.
        if let Some(url) = urls.iter().find(|url| !self.state.policy.is_allowed(url)) {
            log::debug!("Disallowed link {url} in message {} of {chat}", message.message_id);
            enforce_violation(
                &self.platform,
                &self.state,
                chat,
                message.message_id,
                message.author.as_ref(),
            )
            .await;
            return;
        }

        for url in &urls {
            self.state.registry.register(Link::from_message(&message, url));
        }

        self.state.window.record(chat, RecentMessage::Text(message));
    }

    async fn handle_service_notice(&self, notice: ServiceNotice) {
        let deleted =
            delete_message_logged(&self.platform, &self.state, notice.chat_id, notice.message_id)
                .await;

        if !deleted && self.state.monitored.is_monitored(notice.chat_id) {
            // Leave it for the health checker to try again.
            self.state
                .window
                .record(notice.chat_id, RecentMessage::Service(notice));
        }
    }

    fn after_transition(&self, chat: ChatId, transition: Transition) {
        match transition {
            Transition::Started => log::info!("Now moderating {chat}"),
            Transition::Stopped => {
                log::info!("No longer moderating {chat}");
                self.state.registry.clear(chat);
                self.state.window.forget_chat(chat);
            }
            Transition::Unchanged => (),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use teloxide::types::MessageId;

    use super::*;
    use crate::{
        testing::{message, state_with_threshold, FakePlatform, CHAT, USER},
        types::{MembershipStatus, ServiceKind},
    };

    fn moderator(threshold: u32) -> (Moderator<FakePlatform>, FakePlatform) {
        let platform = FakePlatform::default();
        let state = state_with_threshold(threshold);
        state
            .monitored
            .apply_status(CHAT, MembershipStatus::Administrator);
        (Moderator::new(platform.clone(), state), platform)
    }

    fn text(id: i32, text: &str) -> ModerationEvent {
        ModerationEvent::Text(message(id, text))
    }

    #[tokio::test]
    async fn disallowed_link_is_deleted_and_warned() {
        let (moderator, platform) = moderator(3);

        moderator
            .handle_event(text(1, "check this https://evil.example/x"))
            .await;

        assert_eq!(platform.deleted(), vec![(CHAT, MessageId(1))]);
        assert_eq!(moderator.state.ledger.count(USER), 1);
        let sent = platform.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("Warning 1/3"));
        assert!(moderator.state.registry.is_empty(CHAT));
    }

    #[tokio::test]
    async fn third_violation_bans_and_resets() {
        let (moderator, platform) = moderator(3);

        for id in 1..=3 {
            moderator
                .handle_event(text(id, "check this https://evil.example/x"))
                .await;
        }

        assert_eq!(platform.deleted().len(), 3);
        assert_eq!(platform.banned(), vec![(CHAT, USER)]);
        assert_eq!(moderator.state.ledger.count(USER), 0);

        let sent = platform.sent();
        assert_eq!(sent.len(), 3);
        assert!(sent[0].1.contains("Warning 1/3"));
        assert!(sent[1].1.contains("Warning 2/3"));
        assert!(!sent[2].1.contains("Warning"));
        assert!(sent[2].1.contains("was removed after 3 warnings"));
    }

    #[tokio::test]
    async fn failed_ban_still_resets_quietly() {
        let (moderator, platform) = moderator(1);
        platform.with(|x| x.fail_bans = true);

        moderator.handle_event(text(1, "https://evil.example/")).await;

        assert!(platform.banned().is_empty());
        assert!(platform.sent().is_empty());
        assert_eq!(moderator.state.ledger.count(USER), 0);
    }

    #[tokio::test]
    async fn failed_delete_still_warns() {
        let (moderator, platform) = moderator(3);
        platform.with(|x| x.already_deleted.push(MessageId(1)));

        moderator.handle_event(text(1, "https://evil.example/")).await;

        assert!(platform.deleted().is_empty());
        assert_eq!(moderator.state.ledger.count(USER), 1);
    }

    #[tokio::test]
    async fn stops_at_first_disallowed_link() {
        let (moderator, platform) = moderator(5);

        moderator
            .handle_event(text(
                1,
                "https://blndev.com/a https://evil.example/1 https://evil.example/2",
            ))
            .await;

        assert_eq!(platform.deleted().len(), 1);
        assert_eq!(moderator.state.ledger.count(USER), 1);
        // Allowed links of a removed message aren't kept either.
        assert!(moderator.state.registry.is_empty(CHAT));
    }

    #[tokio::test]
    async fn allowed_links_are_registered() {
        let (moderator, platform) = moderator(3);

        moderator
            .handle_event(text(1, "docs: https://blndev.com/a and https://blndev.com/b"))
            .await;

        assert!(platform.deleted().is_empty());
        assert!(platform.sent().is_empty());
        let links = moderator.state.registry.snapshot(CHAT);
        let urls: Vec<&str> = links.iter().map(|x| x.url.as_str()).collect();
        assert_eq!(urls, vec!["https://blndev.com/a", "https://blndev.com/b"]);
        assert_eq!(links[0].context, "docs: https://blndev.com/a and https://blndev.com/b");
    }

    #[tokio::test]
    async fn channel_posts_are_deleted_without_warning() {
        let (moderator, platform) = moderator(3);
        let mut post = message(1, "https://evil.example/");
        post.author = None;

        moderator.handle_event(ModerationEvent::Text(post)).await;

        assert_eq!(platform.deleted(), vec![(CHAT, MessageId(1))]);
        assert!(platform.sent().is_empty());
    }

    #[tokio::test]
    async fn unknown_chat_is_looked_up_once() {
        let platform = FakePlatform::default();
        let moderator = Moderator::new(platform.clone(), state_with_threshold(3));
        platform.with(|x| {
            x.statuses.insert(CHAT, MembershipStatus::Administrator);
        });

        moderator.handle_event(text(1, "https://evil.example/")).await;
        moderator.handle_event(text(2, "https://evil.example/")).await;

        assert_eq!(platform.status_queries(), vec![CHAT]);
        assert!(moderator.state.monitored.is_monitored(CHAT));
        assert_eq!(platform.deleted().len(), 2);
    }

    #[tokio::test]
    async fn failed_lookup_means_hands_off() {
        let platform = FakePlatform::default();
        let moderator = Moderator::new(platform.clone(), state_with_threshold(3));
        platform.with(|x| x.fail_status_queries = true);

        moderator.handle_event(text(1, "https://evil.example/")).await;

        assert!(!moderator.state.monitored.is_monitored(CHAT));
        assert!(platform.deleted().is_empty());
        assert_eq!(moderator.state.ledger.count(USER), 0);
    }

    #[tokio::test]
    async fn failed_lookup_is_retried_on_next_message() {
        let platform = FakePlatform::default();
        let moderator = Moderator::new(platform.clone(), state_with_threshold(3));
        platform.with(|x| x.fail_status_queries = true);

        moderator.handle_event(text(1, "https://evil.example/")).await;
        assert!(platform.deleted().is_empty());

        platform.with(|x| {
            x.fail_status_queries = false;
            x.statuses.insert(CHAT, MembershipStatus::Administrator);
        });

        moderator.handle_event(text(2, "https://evil.example/")).await;
        moderator.handle_event(text(3, "https://evil.example/")).await;

        assert_eq!(platform.status_queries(), vec![CHAT, CHAT]);
        assert!(moderator.state.monitored.is_monitored(CHAT));
        assert_eq!(
            platform.deleted(),
            vec![(CHAT, MessageId(2)), (CHAT, MessageId(3))]
        );
        assert_eq!(moderator.state.ledger.count(USER), 2);
    }

    #[tokio::test]
    async fn leaving_a_chat_stops_monitoring_and_drops_its_links() {
        let (moderator, _platform) = moderator(3);
        moderator.handle_event(text(1, "https://blndev.com/a")).await;
        assert!(!moderator.state.registry.is_empty(CHAT));

        moderator
            .handle_event(ModerationEvent::MembershipChange {
                chat_id: CHAT,
                new_status: MembershipStatus::Left,
                is_engine_account: true,
            })
            .await;

        assert!(!moderator.state.monitored.is_monitored(CHAT));
        assert!(moderator.state.monitored.chats().is_empty());
        assert!(moderator.state.registry.is_empty(CHAT));
    }

    #[tokio::test]
    async fn other_accounts_membership_is_ignored() {
        let (moderator, _platform) = moderator(3);

        moderator
            .handle_event(ModerationEvent::MembershipChange {
                chat_id: CHAT,
                new_status: MembershipStatus::Kicked,
                is_engine_account: false,
            })
            .await;

        assert!(moderator.state.monitored.is_monitored(CHAT));
    }

    #[tokio::test]
    async fn service_notices_are_deleted() {
        let (moderator, platform) = moderator(3);

        moderator
            .handle_event(ModerationEvent::ServiceNotice(ServiceNotice {
                chat_id: CHAT,
                message_id: MessageId(9),
                kind: ServiceKind::Joined,
                timestamp: chrono::Utc::now(),
            }))
            .await;

        assert_eq!(platform.deleted(), vec![(CHAT, MessageId(9))]);
    }
}
