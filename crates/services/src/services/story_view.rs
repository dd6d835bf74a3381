//! HTML page for a single story: title, creation date, content.
//!
//! Content is rendered as Markdown. Raw HTML inside it is emitted as escaped
//! text rather than passed through, and link or image destinations with a
//! scheme other than http, https or mailto are replaced with `#`.

use pulldown_cmark::{CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd, html};
use utils::api::stories::Story;

const ALLOWED_SCHEMES: [&str; 3] = ["http", "https", "mailto"];

const STYLESHEET: &str = "body{font-family:system-ui,sans-serif;max-width:46rem;margin:2rem auto;padding:0 1rem;line-height:1.6}\
header time{color:#6b7280}\
nav a{color:inherit}";

pub fn render_story_page(story: &Story) -> String {
    let title = escape_text(story.title.trim());
    let created = story.created_at.format("%B %-d, %Y").to_string();

    let mut heading = String::new();
    html::push_html(
        &mut heading,
        [
            Event::Start(Tag::Heading {
                level: HeadingLevel::H1,
                id: None,
                classes: Vec::new(),
                attrs: Vec::new(),
            }),
            Event::Text(CowStr::from(story.title.trim())),
            Event::End(TagEnd::Heading(HeadingLevel::H1)),
        ]
        .into_iter(),
    );

    let content = render_markdown(&story.content);
    let export_href = format!("/api/stories/{}/export", story.id);

    format!(
        "<!DOCTYPE html>\n\
<html lang=\"en\">\n\
<head>\n\
<meta charset=\"utf-8\">\n\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
<title>{title} · GitFables</title>\n\
<style>{STYLESHEET}</style>\n\
</head>\n\
<body>\n\
<article>\n\
<header>\n\
{heading}<time datetime=\"{datetime}\">{created}</time>\n\
</header>\n\
<section class=\"story-content\">\n\
{content}</section>\n\
</article>\n\
<nav><a href=\"{export_href}\">Download as Markdown</a></nav>\n\
</body>\n\
</html>\n",
        datetime = story.created_at.to_rfc3339(),
    )
}

pub fn render_not_found_page() -> String {
    "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>Story not found · GitFables</title>\n</head>\n<body>\n<h1>Story not found</h1>\n<p><a href=\"/\">Back to GitFables</a></p>\n</body>\n</html>\n".to_string()
}

fn render_markdown(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);

    let events = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Link {
            link_type,
            dest_url: safe_destination(dest_url),
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
            dest_url: safe_destination(dest_url),
            title,
            id,
        }),
        other => other,
    });

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, events);
    out
}

fn safe_destination(dest_url: CowStr<'_>) -> CowStr<'_> {
    if is_allowed_destination(&dest_url) {
        dest_url
    } else {
        CowStr::Borrowed("#")
    }
}

/// Relative destinations have no scheme and are always allowed. Browsers
/// ignore whitespace and control characters inside a scheme, so those are
/// dropped before comparing.
fn is_allowed_destination(dest_url: &str) -> bool {
    let normalized: String = dest_url
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect();

    match normalized.find([':', '/', '?', '#']) {
        Some(index) if normalized[index..].starts_with(':') => {
            let scheme = normalized[..index].to_ascii_lowercase();
            ALLOWED_SCHEMES.contains(&scheme.as_str())
        }
        _ => true,
    }
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    html::push_html(&mut out, std::iter::once(Event::Text(CowStr::from(text))));
    out
}
