//! Caption composition from post metadata.

use crate::config::CAPTION_LIMIT;
use crate::metadata::PostMetadata;
use crate::utils::truncate_str;

const ELLIPSIS: char = '…';

fn attribution_line(fullname: &str, username: &str) -> Option<String> {
    match (fullname.is_empty(), username.is_empty()) {
        (false, false) => Some(format!("By: {fullname} ({username})")),
        (false, true) => Some(format!("By: {fullname}")),
        (true, false) => Some(format!("By: {username}")),
        (true, true) => None,
    }
}

fn footer(fullname: &str, username: &str, post_url: &str) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(2);
    if let Some(line) = attribution_line(fullname, username) {
        lines.push(line);
    }
    if !post_url.is_empty() {
        lines.push(post_url.to_string());
    }
    lines.join("\n")
}

/// Build the attribution caption for a relayed post.
///
/// Layout is the description, a blank line, `By: fullname (username)` and the
/// post URL on its own line. Empty parts are left out entirely. If the result
/// would exceed Telegram's caption limit, only the description is shortened.
///
/// # Examples
///
/// ```
/// use oxide_relay_core::caption::build_caption;
/// let caption = build_caption("sunset", "Jane Doe", "jdoe", "https://example.com/p/1");
/// assert_eq!(caption, "sunset\n\nBy: Jane Doe (jdoe)\nhttps://example.com/p/1");
///
/// let caption = build_caption("", "", "", "https://example.com/p/1");
/// assert_eq!(caption, "https://example.com/p/1");
/// ```
#[must_use]
pub fn build_caption(description: &str, fullname: &str, username: &str, post_url: &str) -> String {
    let description = description.trim();
    let footer = footer(fullname.trim(), username.trim(), post_url.trim());

    if description.is_empty() {
        return footer;
    }
    if footer.is_empty() {
        return fit_description(description, CAPTION_LIMIT);
    }

    // Two characters for the blank line between description and footer
    let budget = CAPTION_LIMIT.saturating_sub(footer.chars().count() + 2);
    if budget == 0 {
        return truncate_str(&footer, CAPTION_LIMIT);
    }
    format!("{}\n\n{footer}", fit_description(description, budget))
}

/// Build the caption straight from parsed metadata.
#[must_use]
pub fn caption_for(metadata: &PostMetadata) -> String {
    build_caption(
        &metadata.description,
        &metadata.fullname,
        &metadata.username,
        &metadata.post_url,
    )
}

fn fit_description(description: &str, budget: usize) -> String {
    if description.chars().count() <= budget {
        return description.to_string();
    }
    let mut shortened = truncate_str(description, budget.saturating_sub(1));
    shortened.truncate(shortened.trim_end().len());
    shortened.push(ELLIPSIS);
    shortened
}
