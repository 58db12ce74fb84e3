//! Texts of the messages posted into moderated chats. All of them are HTML.

use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::{probe::ProbeOutcome, types::Link};

/// Longest title shown for a link in a summary, in characters.
const TITLE_LENGTH: usize = 64;

pub fn warning(user_name: &str, count: u32, threshold: u32, allowed: &[String]) -> String {
    let allowed = if allowed.is_empty() {
        "nowhere".to_string()
    } else {
        encode_text(&allowed.join(", ")).into_owned()
    };
    format!(
        "⚠️ Warning {count}/{threshold} for <code>{}</code>: only links to {allowed} are allowed here.",
        encode_text(user_name)
    )
}

pub fn ban(user_name: &str, threshold: u32) -> String {
    format!(
        "🚫 <code>{}</code> was removed after {threshold} warnings for disallowed links.",
        encode_text(user_name)
    )
}

/// Notice for a link taken down after probing. [`None`] for links that are fine.
pub fn broken_link(url: &str, outcome: &ProbeOutcome) -> Option<String> {
    let url = encode_text(url);
    match outcome {
        ProbeOutcome::Forbidden => Some(format!(
            "🔗 Removed a broken link (403 Forbidden): {url}"
        )),
        ProbeOutcome::Redirected { location } => Some(format!(
            "🔗 Removed a redirected link (301 Moved Permanently → {}): {url}",
            encode_text(location.as_deref().unwrap_or("unknown location"))
        )),
        ProbeOutcome::Valid => None,
    }
}

/// Summary of links that survived a health check. [`None`] if there are none.
pub fn summary(links: &[Link]) -> Option<String> {
    if links.is_empty() {
        return None;
    }

    let mut text = format!("📋 Link check: {} working link(s)\n", links.len());
    for link in links {
        text.push_str(&format!(
            "\n• <a href=\"{}\">{}</a>",
            encode_double_quoted_attribute(&link.url),
            encode_text(&title(link))
        ));
    }
    Some(text)
}

/// First line of the link's context, shortened; the URL itself if there's no context.
fn title(link: &Link) -> String {
    let context = link.context.lines().map(str::trim).find(|x| !x.is_empty());
    let Some(context) = context else {
        return link.url.clone();
    };

    if context.chars().count() <= TITLE_LENGTH {
        context.to_string()
    } else {
        let mut title: String = context.chars().take(TITLE_LENGTH - 1).collect();
        title.push('…');
        title
    }
}
