//! Listing tree formatting.
//!
//! The password server returns one entry per line, each of the form
//! `channel/app`. The formatted listing strips the channel prefix and draws
//! tree glyphs: every matching entry gets a branch marker, the last one a
//! last-branch marker. Entries that do not carry the requested channel's
//! prefix (the server mixing in another channel is undefined upstream) pass
//! through unchanged rather than being guessed at.

const BRANCH: &str = "├─ ";
const LAST_BRANCH: &str = "└─ ";

/// Format a decrypted listing for the given channel.
pub fn format_listing(channel: &str, raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let prefix = format!("{}/", channel);
    let entries: Vec<&str> = raw.lines().collect();
    let last_match = entries.iter().rposition(|e| e.starts_with(&prefix));

    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| match entry.strip_prefix(&prefix) {
            Some(app) if Some(i) == last_match => format!("{}{}", LAST_BRANCH, app),
            Some(app) => format!("{}{}", BRANCH, app),
            None => entry.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
