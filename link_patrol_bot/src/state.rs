use std::sync::Arc;

use chrono::TimeDelta;

use crate::{
    config::Config,
    database::{self, Database},
    monitored::MonitoredChats,
    policy::DomainPolicy,
    registry::ActiveLinkRegistry,
    warnings::WarningLedger,
    window::MessageWindow,
};

/// Everything shared between live moderation and the health checker.
///
/// Each part guards itself, so the two can run side by side.
#[derive(Debug)]
pub struct ModerationState {
    pub policy: Arc<DomainPolicy>,
    pub ledger: WarningLedger,
    pub monitored: MonitoredChats,
    pub registry: ActiveLinkRegistry,
    pub window: Arc<MessageWindow>,
}

impl ModerationState {
    pub fn new(config: &Config) -> Self {
        let retention = TimeDelta::from_std(config.retention).unwrap_or_else(|_| TimeDelta::days(365));
        Self {
            policy: Arc::new(DomainPolicy::new(config.allowed_domains.clone())),
            ledger: WarningLedger::new(config.warning_threshold),
            monitored: MonitoredChats::new(),
            registry: ActiveLinkRegistry::new(),
            window: Arc::new(MessageWindow::new(retention, config.window_capacity)),
        }
    }

    /// Load monitored chats and warnings from the snapshot store.
    pub async fn restore_from(&self, database: &Database) -> Result<(), database::Error> {
        let chats = database.load_monitored_chats().await?;
        let warnings = database.load_warnings().await?;
        log::info!(
            "Restored {} monitored chat(s) and {} warning record(s)",
            chats.len(),
            warnings.len()
        );
        self.monitored.restore(chats);
        self.ledger.restore(warnings);
        Ok(())
    }

    /// Write monitored chats and warnings to the snapshot store.
    pub async fn persist_to(&self, database: &Database) -> Result<(), database::Error> {
        database
            .save(&self.monitored.chats(), &self.ledger.records())
            .await
    }
}
