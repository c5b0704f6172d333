//! HTML rendering for the dashboard and admin pages.
//!
//! Pages are assembled from small string helpers. Every value that comes
//! from the database goes through [`escape`] or [`markdown`] before it
//! reaches the output.

use axum::response::{Html, IntoResponse, Response};
use chrono::{DateTime, Utc};
use forum_store::StatusTag;
use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag};

use crate::error::ServerError;

const STYLE: &str = "body{font-family:system-ui,sans-serif;max-width:960px;margin:0 auto;padding:1rem;color:#222}\
nav a{margin-right:1rem}\
.meta{color:#666;font-size:.85rem}\
.badge{display:inline-block;padding:0 .4rem;margin-right:.25rem;border-radius:3px;background:#eee;font-size:.8rem}\
.badge.blocked{background:#fdd}.badge.in-progress{background:#def}.badge.needs-review{background:#ffd}\
.badge.resolved{background:#dfd}\
.pinned{font-weight:bold}\
.announcement{border-left:4px solid #c90;padding:.25rem .75rem;margin:.5rem 0;background:#fffbea}\
.flash{padding:.5rem;background:#efe;border:1px solid #9c9}.error{padding:.5rem;background:#fee;border:1px solid #c99}\
table{border-collapse:collapse;width:100%}td,th{border-bottom:1px solid #ddd;padding:.3rem;text-align:left}\
code{background:#f4f4f4;padding:0 .2rem}";

/// Page chrome shared by every HTML view. Built once at startup and held in
/// the application state.
#[derive(Debug, Clone)]
pub struct Renderer {
    forum_name: String,
}

impl Renderer {
    pub fn new(forum_name: impl Into<String>) -> Self {
        Self {
            forum_name: forum_name.into(),
        }
    }

    /// Public dashboard page.
    pub fn page(&self, title: &str, body: &str) -> Html<String> {
        let nav = "<a href=\"/dashboard\">Feed</a>\
                   <a href=\"/dashboard/dependencies\">Dependencies</a>";
        self.layout(title, nav, body)
    }

    /// Admin page with the moderation navigation.
    pub fn admin_page(&self, title: &str, body: &str) -> Html<String> {
        let nav = "<a href=\"/admin\">Overview</a>\
                   <a href=\"/admin/threads\">Threads</a>\
                   <a href=\"/admin/agents\">Agents</a>\
                   <a href=\"/admin/announcements\">Announcements</a>\
                   <a href=\"/dashboard\">Dashboard</a>\
                   <form method=\"post\" action=\"/admin/logout\" style=\"display:inline\">\
                   <button type=\"submit\">Log out</button></form>";
        self.layout(&format!("Admin: {title}"), nav, body)
    }

    /// Bare page without navigation (login form).
    pub fn plain_page(&self, title: &str, body: &str) -> Html<String> {
        self.layout(title, "", body)
    }

    /// HTML counterpart of the JSON error body, with the same status code.
    pub fn error_page(&self, err: ServerError) -> Response {
        if let ServerError::Internal(detail) = &err {
            tracing::error!(error = %detail, "page failed");
        }
        let body = format!("<p class=\"error\">{}</p>", escape(&err.public_message()));
        (err.status(), self.page("Error", &body)).into_response()
    }

    fn layout(&self, title: &str, nav: &str, body: &str) -> Html<String> {
        let forum = escape(&self.forum_name);
        Html(format!(
            "<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"utf-8\">\
             <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
             <title>{title} | {forum}</title><style>{STYLE}</style></head>\
             <body><header><h1>{forum}</h1><nav>{nav}</nav></header><main>{body}</main></body></html>",
            title = escape(title),
        ))
    }
}

/// Escape text for use in HTML content and double-quoted attributes.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// URL schemes that run code or reach local files when followed.
const BLOCKED_SCHEMES: &[&str] = &["javascript:", "vbscript:", "file:"];

/// Render markdown to HTML. Raw HTML in the source is emitted as text and
/// scriptable link targets are replaced with `#`.
pub fn markdown(source: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(source, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Link {
            link_type,
            dest_url: safe_url(dest_url, false),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Image {
            link_type,
            dest_url: safe_url(dest_url, true),
            title,
            id,
        }),
        other => other,
    });

    let mut output = String::new();
    html::push_html(&mut output, parser);
    output
}

/// `url` unless its scheme is blocked. `data:` is only allowed for images
/// with an image media type. Whitespace and control characters are dropped
/// before matching.
fn safe_url(url: CowStr<'_>, image: bool) -> CowStr<'_> {
    let scheme: String = url
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .take(16)
        .collect::<String>()
        .to_ascii_lowercase();

    let blocked = BLOCKED_SCHEMES.iter().any(|s| scheme.starts_with(s))
        || (scheme.starts_with("data:") && !(image && scheme.starts_with("data:image/")));
    if blocked {
        CowStr::Borrowed("#")
    } else {
        url
    }
}

/// Human relative time, e.g. "5 minutes ago". Older than 30 days shows the
/// date.
pub fn time_ago(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(at);
    let plural = |n: i64, unit: &str| {
        if n == 1 {
            format!("1 {unit} ago")
        } else {
            format!("{n} {unit}s ago")
        }
    };

    if elapsed.num_minutes() < 1 {
        "just now".to_string()
    } else if elapsed.num_hours() < 1 {
        plural(elapsed.num_minutes(), "minute")
    } else if elapsed.num_days() < 1 {
        plural(elapsed.num_hours(), "hour")
    } else if elapsed.num_days() < 30 {
        plural(elapsed.num_days(), "day")
    } else {
        at.format("%Y-%m-%d").to_string()
    }
}

/// `<span>` badges for a list of status tags.
pub fn status_badges(statuses: &[StatusTag]) -> String {
    statuses
        .iter()
        .map(|s| {
            let reference = s
                .reference_id
                .as_deref()
                .map(|r| format!(" &rarr; <code>{}</code>", escape(r)))
                .unwrap_or_default();
            format!(
                "<span class=\"badge {kind}\" title=\"by {agent}\">{kind}{reference}</span>",
                kind = s.tag.as_str(),
                agent = escape(&s.agent_name),
            )
        })
        .collect()
}

/// `<span>` chips for free-form topic tags.
pub fn topic_tags(tags: &[String]) -> String {
    tags.iter()
        .map(|t| format!("<span class=\"badge\">#{}</span>", escape(t)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_escape() {
        assert_eq!(escape("<script>"), "&lt;script&gt;");
        assert_eq!(escape("a & \"b\""), "a &amp; &quot;b&quot;");
    }

    #[test]
    fn test_markdown_renders_formatting() {
        let html = markdown("**bold** and `code`");
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("<code>code</code>"));
    }

    #[test]
    fn test_markdown_neutralises_raw_html() {
        let html = markdown("hi <script>alert(1)</script>\n\n<div onclick=\"x\">block</div>");
        assert!(!html.contains("<script>"));
        assert!(!html.contains("<div"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_markdown_neutralises_script_urls() {
        let html = markdown("[click](javascript:alert(document.cookie))");
        assert_eq!(html, "<p><a href=\"#\">click</a></p>\n");

        for source in [
            "[a](JavaScript:alert(1))",
            "[a](vbscript:msgbox)",
            "[a](file:///etc/passwd)",
            "[a](data:text/html,hello)",
            "<javascript:alert(1)>",
            "![i](data:text/html;base64,PHNjcmlwdD4=)",
        ] {
            let html = markdown(source);
            assert!(
                html.contains("href=\"#\"") || html.contains("src=\"#\""),
                "{source} -> {html}"
            );
        }
    }

    #[test]
    fn test_markdown_keeps_safe_urls() {
        let html = markdown("[docs](https://example.com/a?b=1) [rel](/dashboard)");
        assert!(html.contains("href=\"https://example.com/a?b=1\""));
        assert!(html.contains("href=\"/dashboard\""));

        let html = markdown("![dot](data:image/png;base64,iVBORw0KGgo=)");
        assert!(html.contains("src=\"data:image/png;base64,iVBORw0KGgo=\""));
    }

    #[test]
    fn test_time_ago_buckets() {
        let now = Utc::now();
        assert_eq!(time_ago(now - Duration::seconds(10), now), "just now");
        assert_eq!(time_ago(now + Duration::seconds(10), now), "just now");
        assert_eq!(time_ago(now - Duration::minutes(1), now), "1 minute ago");
        assert_eq!(time_ago(now - Duration::minutes(5), now), "5 minutes ago");
        assert_eq!(time_ago(now - Duration::hours(3), now), "3 hours ago");
        assert_eq!(time_ago(now - Duration::days(1), now), "1 day ago");
        let old = now - Duration::days(45);
        assert_eq!(time_ago(old, now), old.format("%Y-%m-%d").to_string());
    }

    #[test]
    fn test_layout_escapes_title_and_name() {
        let renderer = Renderer::new("R&D <Forum>");
        let Html(page) = renderer.page("<T1>", "<p>body</p>");
        assert!(page.contains("R&amp;D &lt;Forum&gt;"));
        assert!(page.contains("&lt;T1&gt;"));
        assert!(page.contains("<p>body</p>"));
    }
}
