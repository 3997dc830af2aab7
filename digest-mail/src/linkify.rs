//! Turn raw post text into HTML with clickable URLs, mentions and hashtags.
//!
//! Replacements are collected first and applied in one pass from the highest
//! offset to the lowest, so no replacement ever shifts the offsets of one
//! still waiting to be applied. Unmatched text is copied through verbatim.
use std::sync::LazyLock;

use digest_social::twitter::EntitySpan;
use regex::Regex;

pub const LINK_STYLE: &str = "color: #1d9bf0; text-decoration: none;";

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"']+"#).expect("valid url regex"));
static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(\w+)").expect("valid mention regex"));
static HASHTAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#(\w+)").expect("valid hashtag regex"));

/// A byte range of the source text and the markup that replaces it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Replacement {
    start: usize,
    end: usize,
    html: String,
}

pub fn anchor(href: &str, display: &str) -> String {
    format!(
        r#"<a href="{}" style="{LINK_STYLE}">{}</a>"#,
        html_escape::encode_double_quoted_attribute(href),
        html_escape::encode_text(display)
    )
}

/// Linkify `text`, preferring upstream entity offsets and falling back to
/// pattern matching when there are none.
pub fn linkify(text: &str, spans: &[EntitySpan]) -> String {
    let replacements = if spans.is_empty() {
        pattern_replacements(text)
    } else {
        entity_replacements(text, spans)
    };
    apply(text, replacements)
}

/// Entity offsets count characters; map them onto byte positions of `text`.
fn entity_replacements(text: &str, spans: &[EntitySpan]) -> Vec<Replacement> {
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();

    spans
        .iter()
        .filter_map(|span| {
            let (Some(&start), Some(&end)) = (boundaries.get(span.start), boundaries.get(span.end))
            else {
                tracing::debug!(
                    start = span.start,
                    end = span.end,
                    chars = boundaries.len() - 1,
                    "linkify.span_out_of_range"
                );
                return None;
            };
            (start < end).then(|| Replacement {
                start,
                end,
                html: anchor(&span.href, &span.display),
            })
        })
        .collect()
}

fn preceded_by_alnum(text: &str, at: usize) -> bool {
    text[..at]
        .chars()
        .next_back()
        .is_some_and(|c| c.is_ascii_alphanumeric())
}

fn is_hex_color(tag: &str) -> bool {
    tag.len() == 6 && tag.bytes().all(|b| b.is_ascii_hexdigit())
}

fn pattern_replacements(text: &str) -> Vec<Replacement> {
    let mut out = Vec::new();

    for m in URL_RE.find_iter(text) {
        out.push(Replacement {
            start: m.start(),
            end: m.end(),
            html: anchor(m.as_str(), m.as_str()),
        });
    }

    for caps in MENTION_RE.captures_iter(text) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if preceded_by_alnum(text, whole.start()) {
            continue;
        }
        let span = EntitySpan::mention(0, 0, name.as_str());
        out.push(Replacement {
            start: whole.start(),
            end: whole.end(),
            html: anchor(&span.href, &span.display),
        });
    }

    for caps in HASHTAG_RE.captures_iter(text) {
        let (Some(whole), Some(tag)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if preceded_by_alnum(text, whole.start()) || is_hex_color(tag.as_str()) {
            continue;
        }
        let span = EntitySpan::hashtag(0, 0, tag.as_str());
        out.push(Replacement {
            start: whole.start(),
            end: whole.end(),
            html: anchor(&span.href, &span.display),
        });
    }

    out
}

/// Drop overlapping ranges (the earliest start wins), then splice from the
/// highest start down.
fn apply(text: &str, mut replacements: Vec<Replacement>) -> String {
    replacements.sort_by_key(|r| (r.start, std::cmp::Reverse(r.end)));
    let mut kept: Vec<Replacement> = Vec::with_capacity(replacements.len());
    for r in replacements {
        if kept.last().is_some_and(|prev| r.start < prev.end) {
            continue;
        }
        kept.push(r);
    }

    let mut result = text.to_string();
    for r in kept.iter().rev() {
        result.replace_range(r.start..r.end, &r.html);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_anchors(html: &str) -> usize {
        html.matches("<a href=").count()
    }

    #[test]
    fn plain_text_is_unchanged() {
        for text in ["just words here", "", "price: 5 & 6 < 7", "mail me at a@b"] {
            assert_eq!(linkify(text, &[]), text);
        }
    }

    #[test]
    fn entity_spans_replace_whole_substrings() {
        let text = "Check https://example.com/x now #Cool @bob";
        let spans = vec![
            EntitySpan::url(6, 27, "example.com/x", "https://example.com/x"),
            EntitySpan::hashtag(32, 37, "Cool"),
            EntitySpan::mention(38, 42, "bob"),
        ];
        let html = linkify(text, &spans);

        assert_eq!(count_anchors(&html), 3);
        assert!(html.starts_with("Check <a href=\"https://example.com/x\""));
        assert!(html.contains(">example.com/x</a> now <a href=\"https://x.com/hashtag/Cool\""));
        assert!(html.ends_with(r#"<a href="https://x.com/bob" style="color: #1d9bf0; text-decoration: none;">@bob</a>"#));
        assert!(!html.contains("https://example.com/x now"));
        assert!(!html.contains(" #Cool "));
    }

    #[test]
    fn span_order_does_not_matter() {
        let text = "Check https://example.com/x now #Cool @bob";
        let mut spans = vec![
            EntitySpan::mention(38, 42, "bob"),
            EntitySpan::url(6, 27, "example.com/x", "https://example.com/x"),
            EntitySpan::hashtag(32, 37, "Cool"),
        ];
        let a = linkify(text, &spans);
        spans.reverse();
        assert_eq!(a, linkify(text, &spans));
    }

    #[test]
    fn offsets_count_characters_not_bytes() {
        let text = "héllo 🌍 @bob!";
        let html = linkify(text, &[EntitySpan::mention(8, 12, "bob")]);
        assert_eq!(
            html,
            format!("héllo 🌍 {}!", anchor("https://x.com/bob", "@bob"))
        );
    }

    #[test]
    fn out_of_range_and_overlapping_spans_are_skipped() {
        let text = "hi @bob";
        let html = linkify(
            text,
            &[
                EntitySpan::mention(3, 7, "bob"),
                EntitySpan::mention(4, 7, "ob"),
                EntitySpan::hashtag(10, 20, "nope"),
            ],
        );
        assert_eq!(html, format!("hi {}", anchor("https://x.com/bob", "@bob")));
    }

    #[test]
    fn fallback_links_all_three_kinds() {
        let html = linkify("Check https://example.com/x now #Cool @bob", &[]);
        assert_eq!(count_anchors(&html), 3);
        assert!(html.contains(">https://example.com/x</a>"));
        assert!(html.contains(r#"href="https://x.com/hashtag/Cool""#));
        assert!(html.contains(r#"href="https://x.com/bob""#));
        assert!(html.starts_with("Check "));
    }

    #[test]
    fn fallback_skips_hex_colours_and_email_addresses() {
        assert_eq!(linkify("background:#1d9bf0;", &[]), "background:#1d9bf0;");
        assert_eq!(linkify("mail bob@example.com", &[]), "mail bob@example.com");
        let html = linkify("#abcdefg is a tag", &[]);
        assert_eq!(count_anchors(&html), 1);
    }

    #[test]
    fn fallback_does_not_relink_inside_urls() {
        let html = linkify("see https://medium.com/@writer/post#intro", &[]);
        assert_eq!(count_anchors(&html), 1);
    }

    #[test]
    fn hrefs_are_attribute_escaped() {
        let html = anchor("https://e.com/?a=\"x\"", "e.com");
        assert!(html.contains("href=\"https://e.com/?a=&quot;x&quot;\""));
    }
}
