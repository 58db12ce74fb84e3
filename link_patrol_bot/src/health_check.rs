use std::{
    collections::HashSet,
    sync::Arc,
    time::Duration,
};

use chrono::{TimeDelta, Utc};
use futures::{stream, StreamExt};
use teloxide::types::{ChatId, MessageId};
use tokio::sync::watch;

use crate::{
    actions::{delete_message_logged, enforce_violation, send_notice},
    config::{CheckSource, Config},
    extract::extract_urls,
    notices,
    platform::ChatPlatform,
    probe::{LinkProber, ProbeOutcome},
    state::ModerationState,
    types::{Link, RecentMessage},
};

/// How many links of one chat get probed at the same time.
const PROBE_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckSettings {
    pub source: CheckSource,
    pub retention: Duration,
    pub probe_concurrency: usize,
}

impl From<&Config> for CheckSettings {
    fn from(config: &Config) -> Self {
        Self {
            source: config.check_source,
            retention: config.retention,
            probe_concurrency: PROBE_CONCURRENCY,
        }
    }
}

/// What a single cycle did, for logging.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub chats_checked: usize,
    pub chats_abandoned: usize,
    pub links_probed: usize,
    pub messages_removed: usize,
    pub summaries_sent: usize,
}

/// Periodically re-validates the links seen in monitored chats, takes down
/// ones that went bad, and posts a summary of the rest.
pub struct HealthChecker<P, L> {
    platform: P,
    prober: L,
    state: Arc<ModerationState>,
    settings: CheckSettings,
}

impl<P: ChatPlatform, L: LinkProber> HealthChecker<P, L> {
    pub fn new(platform: P, prober: L, state: Arc<ModerationState>, settings: CheckSettings) -> Self {
        Self {
            platform,
            prober,
            state,
            settings,
        }
    }

    /// Run one full cycle over all monitored chats.
    ///
    /// First every chat's links are checked, then every checked chat gets its
    /// summary and has its registry cleared, whether the summary made it or not.
    /// If `shutdown` flips, chats not yet started are left alone, but the
    /// summaries of already checked chats are still sent.
    ///
    /// A checked chat's registry is cleared as a whole, so links registered by
    /// live traffic after that chat was checked are dropped without a probe.
    /// They will not be in this summary, and the next cycle won't see them.
    pub async fn run_cycle(&self, shutdown: &watch::Receiver<bool>) -> CycleReport {
        let mut report = CycleReport::default();
        let chats = self.state.monitored.chats();
        log::debug!("Starting link health check of {} chat(s)", chats.len());

        let mut checked: Vec<(ChatId, Vec<Link>)> = Vec::with_capacity(chats.len());

        for (index, chat) in chats.iter().enumerate() {
            let stopping = *shutdown.borrow();
            if stopping {
                report.chats_abandoned = chats.len() - index;
                log::info!(
                    "Shutting down, skipping health check of {} chat(s)",
                    report.chats_abandoned
                );
                break;
            }

            let valid = self.check_chat(*chat, &mut report).await;
            checked.push((*chat, valid));
            report.chats_checked += 1;
        }

        for (chat, valid) in checked {
            if let Some(text) = notices::summary(&valid) {
                match self.platform.send_message(chat, &text).await {
                    Ok(_) => report.summaries_sent += 1,
                    Err(e) => e.log(&format!("send link summary to {chat}")),
                }
            }
            self.state.registry.clear(chat);
        }

        // Chats no longer monitored don't get to keep links around.
        let monitored: HashSet<ChatId> = self.state.monitored.chats().into_iter().collect();
        self.state
            .registry
            .retain_chats(|chat| monitored.contains(&chat));

        report
    }

    /// Check the links of one chat. Returns the ones still working, oldest first.
    async fn check_chat(&self, chat: ChatId, report: &mut CycleReport) -> Vec<Link> {
        // Messages taken down during this check.
        let mut removed: HashSet<MessageId> = HashSet::new();

        if self.settings.source == CheckSource::History {
            self.rescan(chat, &mut removed, report).await;
        }

        // The allowlist may have changed since these were registered.
        let (disallowed, allowed): (Vec<Link>, Vec<Link>) = self
            .state
            .registry
            .snapshot(chat)
            .into_iter()
            .partition(|link| !self.state.policy.is_allowed(&link.url));

        for link in disallowed {
            if removed.insert(link.message_id) {
                log::info!("{} in {chat} is no longer allowed, removing", link.url);
                enforce_violation(
                    &self.platform,
                    &self.state,
                    chat,
                    link.message_id,
                    link.author.as_ref(),
                )
                .await;
                report.messages_removed += 1;
            }
        }

        let allowed: Vec<Link> = allowed
            .into_iter()
            .filter(|link| !removed.contains(&link.message_id))
            .collect();
        report.links_probed += allowed.len();

        let probed: Vec<(Link, ProbeOutcome)> = stream::iter(allowed)
            .map(|link| async move {
                let outcome = ProbeOutcome::classify(self.prober.probe(&link.url).await);
                (link, outcome)
            })
            .buffer_unordered(self.settings.probe_concurrency.max(1))
            .collect()
            .await;

        let mut valid = Vec::new();
        for (link, outcome) in probed {
            let Some(text) = notices::broken_link(&link.url, &outcome) else {
                valid.push(link);
                continue;
            };

            log::info!("{} in {chat} is {outcome:?}, removing", link.url);
            if removed.insert(link.message_id) {
                delete_message_logged(&self.platform, &self.state, chat, link.message_id).await;
                report.messages_removed += 1;
            }
            send_notice(&self.platform, chat, &text).await;
        }

        // A message taken down over one link takes its other links with it.
        valid.retain(|link| !removed.contains(&link.message_id));
        valid.sort_by(|a, b| a.first_seen.cmp(&b.first_seen).then(a.url.cmp(&b.url)));
        valid
    }

    /// Go over the chat's recent history: delete leftover join/leave messages,
    /// take down messages with disallowed links, and register allowed links.
    async fn rescan(
        &self,
        chat: ChatId,
        removed: &mut HashSet<MessageId>,
        report: &mut CycleReport,
    ) {
        let retention = TimeDelta::from_std(self.settings.retention)
            .unwrap_or_else(|_| TimeDelta::days(365));
        let history = self
            .platform
            .fetch_recent_messages(chat, Utc::now() - retention)
            .await;

        for entry in history {
            let message = match entry {
                RecentMessage::Service(notice) => {
                    log::debug!("Deleting a leftover service message in {chat}");
                    delete_message_logged(&self.platform, &self.state, chat, notice.message_id)
                        .await;
                    continue;
                }
                RecentMessage::Text(message) => message,
            };

            let urls = extract_urls(&message.text);

            if urls.iter().any(|url| !self.state.policy.is_allowed(url)) {
                if removed.insert(message.message_id) {
                    enforce_violation(
                        &self.platform,
                        &self.state,
                        chat,
                        message.message_id,
                        message.author.as_ref(),
                    )
                    .await;
                    report.messages_removed += 1;
                }
                continue;
            }

            for url in urls {
                self.state.registry.register(Link::from_message(&message, url));
            }
        }
    }
}
