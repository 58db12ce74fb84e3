use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use chrono::{DateTime, Utc};
use teloxide::types::UserId;

/// What to do about a user after recording a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    Warn,
    Ban,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarningRecord {
    pub count: u32,
    pub last_updated: DateTime<Utc>,
}

/// Per-user violation counter. Reaching the threshold signals a ban and
/// forgets the user.
#[derive(Debug)]
pub struct WarningLedger {
    threshold: u32,
    records: Mutex<HashMap<UserId, WarningRecord>>,
}

impl WarningLedger {
    /// A `threshold` of 0 is treated as 1.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Count one more violation for `user`.
    ///
    /// Returns the new count, and [`Escalation::Ban`] if it reached the
    /// threshold, in which case the user's record is already gone by the time
    /// this returns.
    pub fn record_violation(&self, user: UserId) -> (u32, Escalation) {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);

        let record = records.entry(user).or_insert(WarningRecord {
            count: 0,
            last_updated: Utc::now(),
        });
        record.count += 1;
        record.last_updated = Utc::now();
        let count = record.count;

        if count >= self.threshold {
            records.remove(&user);
            (count, Escalation::Ban)
        } else {
            (count, Escalation::Warn)
        }
    }

    /// Current count for this user, 0 if there's none.
    pub fn count(&self, user: UserId) -> u32 {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&user)
            .map_or(0, |x| x.count)
    }

    /// Copy of all records, for the snapshot store.
    pub fn records(&self) -> Vec<(UserId, WarningRecord)> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(user, record)| (*user, *record))
            .collect()
    }

    /// Put back records from the snapshot store. Counts at or above the
    /// threshold are dropped.
    pub fn restore(&self, restored: impl IntoIterator<Item = (UserId, WarningRecord)>) {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        for (user, record) in restored {
            if record.count > 0 && record.count < self.threshold {
                records.insert(user, record);
            }
        }
    }
}
