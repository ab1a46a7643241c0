//! Strip Slack user-mention markup (`<@U123ABC>`) from message text.

use once_cell::sync::Lazy;
use regex::Regex;

static MENTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<@[A-Za-z0-9]+>").expect("mention pattern"));

/// Remove every `<@ID>` mention. Repeats until nothing matches, so removing an inner
/// mention can never leave a new one behind (`<@<@U1>U2>`), and a second call is a no-op.
pub fn strip_mentions(text: &str) -> String {
    let mut current = text.to_string();
    while MENTION.is_match(&current) {
        current = MENTION.replace_all(&current, "").into_owned();
    }
    current
}
