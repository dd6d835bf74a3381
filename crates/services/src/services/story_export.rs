//! Markdown export of a story.
//!
//! Missing optional fields degrade to placeholder text; formatting never fails.

use std::fmt::Write as _;

use chrono::SecondsFormat;
use utils::api::stories::Story;

pub const NO_DESCRIPTION_PROVIDED: &str = "No description provided";
pub const UNKNOWN: &str = "Unknown";
pub const NO_DESCRIPTION: &str = "No description";
pub const NOT_AVAILABLE: &str = "Not available";
pub const DEFAULT_STYLE: &str = "Default";
pub const NO_EVENTS_RECORDED: &str = "No events recorded";

const FALLBACK_FILE_STEM: &str = "story";
const MAX_FILE_STEM_LEN: usize = 64;

pub const MARKDOWN_CONTENT_TYPE: &str = "text/markdown; charset=utf-8";

pub fn export_markdown(story: &Story) -> String {
    let mut out = String::new();

    let description = non_blank(story.description.as_deref()).unwrap_or(NO_DESCRIPTION_PROVIDED);
    let _ = writeln!(out, "# {}\n", story.title.trim());
    let _ = writeln!(out, "{description}\n");

    let repository = story.repository.as_ref();
    let repo_name = repository
        .and_then(|r| non_blank(r.name.as_deref()))
        .unwrap_or(UNKNOWN);
    let repo_description = repository
        .and_then(|r| non_blank(r.description.as_deref()))
        .unwrap_or(NO_DESCRIPTION);
    let repo_url = repository
        .and_then(|r| non_blank(r.url.as_deref()))
        .unwrap_or(NOT_AVAILABLE);

    out.push_str("## Repository Details\n\n");
    let _ = writeln!(out, "- **Name:** {repo_name}");
    let _ = writeln!(out, "- **Description:** {repo_description}");
    let _ = writeln!(out, "- **URL:** {repo_url}\n");

    let metadata = story.metadata.as_ref();
    let generated = metadata
        .and_then(|m| m.generated_at)
        .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| UNKNOWN.to_string());
    let style = metadata
        .and_then(|m| m.style)
        .map(|s| s.to_string())
        .unwrap_or_else(|| DEFAULT_STYLE.to_string());

    out.push_str("## Generation Details\n\n");
    let _ = writeln!(out, "- **Generated:** {generated}");
    let _ = writeln!(out, "- **Style:** {style}\n");

    out.push_str("## Story\n\n");
    let _ = writeln!(out, "{}\n", story.content.trim_end());

    out.push_str("## Events\n\n");
    match story.events.as_deref() {
        Some(events) if !events.is_empty() => {
            for event in events {
                let _ = writeln!(
                    out,
                    "### {}\n",
                    event.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
                );
                let _ = writeln!(out, "{}\n", event.message.trim_end());
            }
        }
        _ => {
            let _ = writeln!(out, "{NO_EVENTS_RECORDED}");
        }
    }

    out
}

/// Attachment file name derived from the title, e.g. `the-story-of-cargo.md`.
pub fn export_file_name(story: &Story) -> String {
    let mut stem = String::with_capacity(story.title.len());
    for ch in story.title.chars() {
        if ch.is_ascii_alphanumeric() {
            stem.push(ch.to_ascii_lowercase());
        } else if !stem.is_empty() && !stem.ends_with('-') {
            stem.push('-');
        }
        if stem.len() >= MAX_FILE_STEM_LEN {
            break;
        }
    }
    let stem = stem.trim_end_matches('-');

    if stem.is_empty() {
        format!("{FALLBACK_FILE_STEM}.md")
    } else {
        format!("{stem}.md")
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
