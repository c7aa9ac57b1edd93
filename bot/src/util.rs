use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

/// Invisible and zero-width characters that users smuggle into command
/// arguments and that must never survive into an outbound reply.
static INVISIBLE_CHARS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        "[\u{00AD}\u{034F}\u{061C}\u{115F}\u{1160}\u{17B4}\u{17B5}",
        "\u{180B}-\u{180E}\u{200B}-\u{200F}\u{202A}-\u{202E}\u{2060}-\u{206F}",
        "\u{FE00}-\u{FE0F}\u{FEFF}\u{FFA0}\u{1D173}-\u{1D17A}\u{E0000}-\u{E007F}]",
    ))
    .unwrap()
});

/// Strip invisible characters from a single token
pub fn strip_invisible(input: &str) -> Cow<'_, str> {
    INVISIBLE_CHARS.replace_all(input, "")
}

/// Scrub raw argument tokens: invisible characters removed, empty tokens
/// dropped
pub fn tokenize_args(raw: &[String]) -> Vec<String> {
    raw.iter()
        .map(|arg| strip_invisible(arg).into_owned())
        .filter(|arg| !arg.is_empty())
        .collect()
}

/// Decode HTML entities that command bodies leak into replies. Returns the
/// input unchanged when it does not decode cleanly.
pub fn fix_html(reply: String) -> String {
    match htmlescape::decode_html(&reply) {
        Ok(decoded) => decoded,
        Err(_) => reply,
    }
}

/// Rewrite `name` inside `reply` with a combining grapheme joiner after the
/// first character, so chat clients do not treat the occurrence as a
/// mention. Case of the original occurrence is preserved.
pub fn unping(reply: &str, name: &str) -> String {
    if name.chars().count() < 2 {
        return reply.to_string();
    }
    let pattern = format!("(?i){}", regex::escape(name));
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(_) => return reply.to_string(),
    };
    re.replace_all(reply, |caps: &regex::Captures<'_>| {
        let matched = &caps[0];
        let mut chars = matched.chars();
        let first = chars.next().unwrap();
        format!("{}\u{34f}{}", first, chars.as_str())
    })
    .into_owned()
}
