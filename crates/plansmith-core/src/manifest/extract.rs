//! Best-effort isolation of the structured payload inside raw model output.
//!
//! Models are told to answer with a bare payload, but frequently wrap it in
//! markdown fences or surround it with prose anyway. [`extract`] applies a
//! fixed, ordered set of rules and never fails: when nothing matches it hands
//! back the trimmed input so the parser can reject it with a real error.
//!
//! Rules, first match wins:
//!
//! 1. A fenced block tagged for the active format (`` ```json ``,
//!    `` ```yaml `` / `` ```yml ``), case-insensitive: its interior, trimmed.
//! 2. Any fenced block: its interior, trimmed. A language tag alone on the
//!    opening fence line is dropped.
//! 3. For formats with outer delimiters (JSON): the span from the earliest
//!    opening delimiter to the latest closing delimiter.
//! 4. The input, trimmed.

use std::sync::LazyLock;

use regex::Regex;

use super::parser::Format;

fn tagged_fence_pattern(format: Format) -> Regex {
    let tags = format.fence_tags().join("|");
    Regex::new(&format!(r"(?is)```[ \t]*(?:{tags})\b(.*?)```")).expect("fence pattern is valid")
}

static JSON_FENCE: LazyLock<Regex> = LazyLock::new(|| tagged_fence_pattern(Format::Json));
static YAML_FENCE: LazyLock<Regex> = LazyLock::new(|| tagged_fence_pattern(Format::Yaml));
static ANY_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:[A-Za-z0-9_+.-]*[ \t]*\r?\n)?(.*?)```").expect("fence pattern is valid")
});

fn tagged_fence(format: Format) -> &'static Regex {
    match format {
        Format::Json => &JSON_FENCE,
        Format::Yaml => &YAML_FENCE,
    }
}

/// Return the part of `raw` most likely to be the payload in `format`.
pub fn extract(raw: &str, format: Format) -> &str {
    if let Some(inner) = first_capture(tagged_fence(format), raw) {
        return inner.trim();
    }

    if let Some(inner) = first_capture(&ANY_FENCE, raw) {
        return inner.trim();
    }

    if let Some((open, close)) = format.outer_delimiters() {
        if let (Some(first), Some(last)) = (raw.find(open), raw.rfind(close)) {
            if last > first {
                return &raw[first..last + close.len_utf8()];
            }
        }
    }

    raw.trim()
}

fn first_capture<'a>(re: &Regex, text: &'a str) -> Option<&'a str> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
