use std::future::Future;

use teloxide::{
    payloads::SendMessageSetters,
    requests::Requester,
    sugar::request::RequestLinkPreviewExt,
    types::{ChatId, Message, ParseMode},
    Bot, RequestError,
};

/// Maximum length of a single Telegram text message, in characters.
pub const MESSAGE_LENGTH_LIMIT: usize = 4096;

/// Split `text` into chunks of at most `limit` characters each.
///
/// Chunks are cut at the last newline that fits, and the newline itself is
/// dropped. A single line longer than `limit` is cut mid-line. Empty chunks are
/// never produced.
#[must_use]
pub fn split_by_lines(text: &str, limit: usize) -> Vec<&str> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();

    let mut start = 0;
    let mut chunk_chars = 0;
    let mut last_break: Option<usize> = None;

    for (idx, c) in text.char_indices() {
        if chunk_chars == limit {
            let (cut, skip) = match (c, last_break) {
                ('\n', _) => (idx, 1),
                (_, Some(newline)) => (newline, 1),
                (_, None) => (idx, 0),
            };

            if cut > start {
                chunks.push(&text[start..cut]);
            }

            start = cut + skip;
            last_break = None;

            if start > idx {
                // The newline we're looking at was eaten by the cut.
                chunk_chars = 0;
                continue;
            }
            chunk_chars = text[start..idx].chars().count();
        }

        if c == '\n' {
            last_break = Some(idx);
        }
        chunk_chars += 1;
    }

    if start < text.len() {
        chunks.push(&text[start..]);
    }

    chunks
}

pub trait BotSendChunked {
    /// Send HTML `text` without link previews, split into as many messages as
    /// needed to fit the length limit. Each part is retried with
    /// [`teloxide_retry`][crate::teloxide_retry].
    ///
    /// Stops at the first part that fails to send.
    fn send_html_chunked(
        &self,
        chat_id: ChatId,
        text: &str,
    ) -> impl Future<Output = Result<Vec<Message>, RequestError>> + Send;
}

impl BotSendChunked for Bot {
    async fn send_html_chunked(
        &self,
        chat_id: ChatId,
        text: &str,
    ) -> Result<Vec<Message>, RequestError> {
        let mut sent_messages = Vec::new();

        for chunk in split_by_lines(text, MESSAGE_LENGTH_LIMIT) {
            let message = crate::teloxide_retry!(
                self.send_message(chat_id, chunk)
                    .parse_mode(ParseMode::Html)
                    .disable_link_preview(true)
                    .await
            )?;
            sent_messages.push(message);
        }

        Ok(sent_messages)
    }
}
