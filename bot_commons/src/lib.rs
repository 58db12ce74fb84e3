//! Boilerplate shared by the bots in this workspace: logging and runtime
//! setup, request retries, and sending long messages.

use std::future::Future;

pub mod useful_methods;

/// Initialize logging and run `closure` to completion on a multi-threaded
/// tokio runtime.
///
/// Logging defaults to level `info` unless overridden by the environment
/// variable `RUST_LOG`. This uses [pretty_env_logger][] internally; timestamps
/// are left out when running as a systemd service, since journald adds its own.
///
/// # Panics
///
/// Panics if the tokio runtime cannot be built.
///
/// [pretty_env_logger]: https://docs.rs/pretty_env_logger
pub fn start_everything(closure: impl Future<Output = ()>) {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| String::from("info"));

    let running_as_systemd_service = std::env::var_os("JOURNAL_STREAM").is_some();

    let mut builder = match running_as_systemd_service {
        true => pretty_env_logger::formatted_builder(),
        false => pretty_env_logger::formatted_timed_builder(),
    };

    builder.parse_filters(&log_level);

    if builder.try_init().is_err() {
        log::error!("Tried to init logger twice!");
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build the tokio runtime!")
        .block_on(closure);
}

/// Evaluate a teloxide request expression (including its `.await`) up to 3
/// times, sleeping through flood-wait (`RetryAfter`) and network errors in
/// between. Evaluates to the last result.
///
/// ```ignore
/// let result = teloxide_retry!(bot.delete_message(chat_id, message_id).await);
/// ```
#[macro_export]
macro_rules! teloxide_retry {
    ($request:expr) => {{
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            match $request {
                Err(::teloxide::RequestError::RetryAfter(seconds)) if attempt < 3 => {
                    ::tokio::time::sleep(seconds.duration()).await;
                }
                Err(::teloxide::RequestError::Network(_)) if attempt < 3 => {
                    ::tokio::time::sleep(::std::time::Duration::from_secs(1)).await;
                }
                result => break result,
            }
        }
    }};
}
