//! Build the subject, HTML body and plain-text body of a digest email.
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use digest_common::DigestWindow;
use digest_social::twitter::{AuthorDigest, AuthorGroup, Post};
use html_escape::{encode_double_quoted_attribute as escape_attr, encode_text as escape_text};
use serde::{Deserialize, Serialize};

use crate::linkify::{LINK_STYLE, linkify};

const TIME_FORMAT: &str = "%b %d, %I:%M %p";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailContent {
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

/// Renders an [`AuthorDigest`] for one recipient.
#[derive(Debug, Clone)]
pub struct DigestRenderer {
    tz: Tz,
    public_base_url: Option<String>,
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

impl DigestRenderer {
    /// Unknown timezone names fall back to UTC.
    pub fn new(timezone: &str) -> Self {
        let tz = match timezone.trim().parse::<Tz>() {
            Ok(tz) => tz,
            Err(e) => {
                tracing::warn!(timezone, error = %e, "render.unknown_timezone; using UTC");
                Tz::UTC
            }
        };
        Self {
            tz,
            public_base_url: None,
        }
    }

    pub fn with_public_base_url(mut self, base: Option<&str>) -> Self {
        self.public_base_url = base
            .map(|b| b.trim().trim_end_matches('/').to_string())
            .filter(|b| !b.is_empty());
        self
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn format_time(&self, ts: DateTime<Utc>) -> String {
        ts.with_timezone(&self.tz).format(TIME_FORMAT).to_string()
    }

    /// `<base>/unsubscribe?email=<urlencoded>`, when both parts are known.
    pub fn unsubscribe_url(&self, recipient: Option<&str>) -> Option<String> {
        let base = self.public_base_url.as_deref()?;
        let email = recipient.map(str::trim).filter(|e| !e.is_empty())?;
        let encoded: String = url::form_urlencoded::byte_serialize(email.as_bytes()).collect();
        Some(format!("{base}/unsubscribe?email={encoded}"))
    }

    pub fn subject(&self, digest: &AuthorDigest, window: &DigestWindow) -> String {
        format!(
            "Your X digest – {} tweets ({})",
            digest.total_posts(),
            window.end.with_timezone(&self.tz).format("%b %d")
        )
    }

    pub fn render(
        &self,
        digest: &AuthorDigest,
        window: &DigestWindow,
        recipient: Option<&str>,
    ) -> EmailContent {
        let unsubscribe = self.unsubscribe_url(recipient);
        let subject = self.subject(digest, window);
        EmailContent {
            html_body: self.html(digest, window, &subject, unsubscribe.as_deref()),
            text_body: self.plain_text(digest, window, unsubscribe.as_deref()),
            subject,
        }
    }

    fn date_range(&self, window: &DigestWindow) -> String {
        format!(
            "{} – {}",
            window.start.with_timezone(&self.tz).format("%b %d"),
            window.end.with_timezone(&self.tz).format("%b %d, %Y")
        )
    }

    fn html(
        &self,
        digest: &AuthorDigest,
        window: &DigestWindow,
        subject: &str,
        unsubscribe: Option<&str>,
    ) -> String {
        let mut out = String::with_capacity(8 * 1024);
        out.push_str(&format!(
            concat!(
                "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">",
                "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">",
                "<title>{title}</title></head>\n",
                "<body style=\"margin: 0; padding: 0; background: #f7f9f9; ",
                "font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Helvetica, Arial, sans-serif; color: #0f1419;\">\n",
                "<div style=\"max-width: 600px; margin: 0 auto; padding: 24px 16px;\">\n",
                "<h1 style=\"font-size: 22px; margin: 0 0 4px;\">Your X Digest</h1>\n",
                "<p style=\"color: #536471; margin: 0 0 24px;\">{count} from {authors} · {range}</p>\n"
            ),
            title = escape_text(subject),
            count = plural(digest.total_posts(), "tweet"),
            authors = plural(digest.groups().len(), "account"),
            range = escape_text(&self.date_range(window)),
        ));

        for group in digest.groups() {
            self.html_group(&mut out, group);
        }

        out.push_str(
            "<p style=\"color: #536471; font-size: 12px; text-align: center; margin-top: 32px;\">\
             Generated automatically by your X Digest bot",
        );
        if let Some(url) = unsubscribe {
            out.push_str(&format!(
                "<br><a href=\"{}\" style=\"color: #536471;\">Unsubscribe</a>",
                escape_attr(url)
            ));
        }
        out.push_str("</p>\n</div>\n</body></html>\n");
        out
    }

    fn html_group(&self, out: &mut String, group: &AuthorGroup) {
        let account = &group.account;
        out.push_str(
            "<div style=\"background: #ffffff; border: 1px solid #eff3f4; border-radius: 12px; \
             padding: 16px; margin-bottom: 16px;\">\n<div style=\"margin-bottom: 8px;\">",
        );
        if !account.avatar_url.is_empty() {
            out.push_str(&format!(
                "<img src=\"{}\" alt=\"\" width=\"40\" height=\"40\" \
                 style=\"border-radius: 50%; vertical-align: middle; margin-right: 8px;\">",
                escape_attr(&account.avatar_url)
            ));
        }
        out.push_str(&format!(
            "<a href=\"{profile}\" style=\"{LINK_STYLE} color: #0f1419; font-weight: bold;\">{name}</a> \
             <span style=\"color: #536471;\">@{handle} · {count}</span></div>\n",
            profile = escape_attr(&account.profile_url()),
            name = escape_text(&account.display_name),
            handle = escape_text(&account.handle),
            count = plural(group.posts.len(), "tweet"),
        ));

        for post in &group.posts {
            self.html_post(out, post);
        }
        out.push_str("</div>\n");
    }

    fn html_post(&self, out: &mut String, post: &Post) {
        out.push_str(&format!(
            "<div style=\"border-top: 1px solid #eff3f4; padding: 12px 0;\">\n\
             <p style=\"margin: 0 0 8px; white-space: pre-wrap; line-height: 1.4;\">{}</p>\n",
            linkify(&post.text, &post.entities)
        ));
        for image in post.media.iter().filter_map(|m| m.display_image()) {
            out.push_str(&format!(
                "<a href=\"{}\"><img src=\"{}\" alt=\"\" \
                 style=\"max-width: 100%; border-radius: 8px; margin: 4px 0;\"></a>\n",
                escape_attr(&post.url),
                escape_attr(image)
            ));
        }
        out.push_str(&format!(
            "<a href=\"{}\" style=\"color: #536471; font-size: 13px; text-decoration: none;\">{}</a>\n</div>\n",
            escape_attr(&post.url),
            escape_text(&self.format_time(post.created_at))
        ));
    }

    fn plain_text(&self, digest: &AuthorDigest, window: &DigestWindow, unsubscribe: Option<&str>) -> String {
        let mut lines = vec![
            format!("Your X Digest - {} tweets", digest.total_posts()),
            self.date_range(window),
            "=".repeat(50),
            String::new(),
        ];

        for group in digest.groups() {
            lines.push(format!(
                "\n{} (@{}) - {}",
                group.account.display_name,
                group.account.handle,
                plural(group.posts.len(), "tweet")
            ));
            lines.push("-".repeat(40));
            for post in &group.posts {
                let clean = post.text.split_whitespace().collect::<Vec<_>>().join(" ");
                lines.push(format!("\n{clean}"));
                lines.push(format!("  → {}", post.url));
                lines.push(format!("  {}", self.format_time(post.created_at)));
            }
            lines.push(String::new());
        }

        lines.push("-".repeat(50));
        lines.push("Generated automatically by your X Digest bot".to_string());
        if let Some(url) = unsubscribe {
            lines.push(String::new());
            lines.push(format!("Unsubscribe: {url}"));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use digest_social::twitter::{Account, EntitySpan, Media, MediaKind, group_by_author};

    fn window() -> DigestWindow {
        DigestWindow::trailing_days(Utc.with_ymd_and_hms(2024, 11, 29, 14, 0, 0).unwrap(), 1)
    }

    fn post(id: &str, handle: &str, name: &str, hour: u32, text: &str) -> Post {
        Post {
            id: id.into(),
            text: text.into(),
            created_at: Utc.with_ymd_and_hms(2024, 11, 29, hour, 5, 0).unwrap(),
            author: Account {
                id: handle.into(),
                handle: handle.into(),
                display_name: name.into(),
                avatar_url: format!("https://pbs.twimg.com/{handle}.jpg"),
            },
            media: vec![],
            url: Post::permalink(handle, id),
            entities: vec![],
        }
    }

    fn digest() -> AuthorDigest {
        let mut with_media = post("2", "bob", "Bob <B>", 9, "pic  time\n\nnice");
        with_media.media.push(Media {
            url: "https://pbs.twimg.com/media/x.jpg".into(),
            kind: MediaKind::Photo,
            preview_url: None,
        });
        let mut linked = post("1", "alice", "Alice", 8, "hi @bob");
        linked.entities.push(EntitySpan::mention(3, 7, "bob"));
        group_by_author(vec![linked, with_media, post("3", "alice", "Alice", 7, "older")])
    }

    #[test]
    fn subject_counts_posts_and_uses_end_date() {
        let renderer = DigestRenderer::new("UTC");
        assert_eq!(
            renderer.subject(&digest(), &window()),
            "Your X digest – 3 tweets (Nov 29)"
        );
    }

    #[test]
    fn times_are_shown_in_target_timezone() {
        let renderer = DigestRenderer::new("America/New_York");
        let ts = Utc.with_ymd_and_hms(2024, 11, 29, 14, 30, 0).unwrap();
        assert_eq!(renderer.format_time(ts), "Nov 29, 09:30 AM");
    }

    #[test]
    fn unknown_timezone_falls_back_to_utc() {
        let renderer = DigestRenderer::new("Mars/Olympus");
        assert_eq!(renderer.timezone(), Tz::UTC);
    }

    #[test]
    fn html_links_escapes_and_orders() {
        let content = DigestRenderer::new("UTC").render(&digest(), &window(), None);
        let html = &content.html_body;

        assert!(html.contains("Bob &lt;B&gt;"));
        assert!(html.contains(r#"hi <a href="https://x.com/bob""#));
        assert!(html.contains("https://pbs.twimg.com/media/x.jpg"));
        assert!(html.contains("Nov 29, 09:05 AM"));
        assert!(!html.contains("Unsubscribe"));
        let bob = html.find("@bob · 1 tweet").unwrap();
        let alice = html.find("@alice · 2 tweets").unwrap();
        assert!(bob < alice);
    }

    #[test]
    fn text_body_collapses_whitespace() {
        let content = DigestRenderer::new("UTC").render(&digest(), &window(), None);
        let text = &content.text_body;
        assert!(text.starts_with("Your X Digest - 3 tweets\nNov 28 – Nov 29, 2024\n"));
        assert!(text.contains("\npic time nice\n  → https://x.com/bob/status/2\n  Nov 29, 09:05 AM"));
        assert!(text.contains("Bob <B> (@bob) - 1 tweet"));
        assert!(!text.contains("Unsubscribe"));
    }

    #[test]
    fn unsubscribe_link_needs_base_and_recipient() {
        let renderer =
            DigestRenderer::new("UTC").with_public_base_url(Some("https://digest.example.com/"));
        assert_eq!(renderer.unsubscribe_url(None), None);
        assert_eq!(
            renderer.unsubscribe_url(Some("a+b@example.com")).as_deref(),
            Some("https://digest.example.com/unsubscribe?email=a%2Bb%40example.com")
        );

        let content = renderer.render(&digest(), &window(), Some("a@example.com"));
        assert!(content.html_body.contains("unsubscribe?email=a%40example.com"));
        assert!(content
            .text_body
            .ends_with("Unsubscribe: https://digest.example.com/unsubscribe?email=a%40example.com"));
    }
}
