//! Source code for Link Patrol Bot: keeps links in group chats on a list of
//! allowed domains, and periodically checks that the links people posted
//! still work.

/// Various types used throughout.
mod types;

/// Configuration from the environment.
mod config;

/// Pulling URLs out of text.
mod extract;

/// Which domains links may point to.
mod policy;

/// Allowlist file parsing and hot reload.
mod allowlist;

/// Warning counters and when they turn into a ban.
mod warnings;

/// Which chats the bot is moderating.
mod monitored;

/// Links seen since the last health check.
mod registry;

/// Recent messages per chat.
mod window;

/// All of the above, shared.
mod state;

/// The messaging platform, and its Telegram implementation.
mod platform;

/// The snapshot database.
mod database;

/// Texts the bot sends.
mod notices;

/// Functions that perform stuff via the platform.
mod actions;

/// Deciding what to do about incoming events.
mod moderation;

/// Checking whether links still work.
mod probe;

/// The periodic link health check.
mod health_check;

/// Running things on an interval.
mod ticker;

/// Functions that handle events from Telegram.
mod handlers;

#[cfg(test)]
mod testing;

/// Entry function that starts the bot.
mod entry;
pub use entry::*;
