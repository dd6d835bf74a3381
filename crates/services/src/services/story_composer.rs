//! Turns a repository's commit history into a [`NewStory`].

use std::collections::BTreeSet;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use utils::api::{
    github::{Commit, Repository},
    stories::{NewStory, RepositoryRef, StoryEvent, StoryMetadata, StoryStyle},
};

/// How many commits the summary style names explicitly.
const SUMMARY_HIGHLIGHTS: usize = 5;

pub fn compose_story(
    repository: &Repository,
    commits: &[Commit],
    style: StoryStyle,
    generated_at: DateTime<Utc>,
) -> NewStory {
    let ordered = chronological(commits);

    let content = if ordered.is_empty() {
        format!(
            "No commits were found for {}, so there is no story to tell yet.",
            repository.full_name
        )
    } else {
        match style {
            StoryStyle::Narrative => narrative(repository, &ordered),
            StoryStyle::Technical => technical(repository, &ordered),
            StoryStyle::Summary => summary(repository, &ordered),
        }
    };

    let events = ordered
        .iter()
        .map(|commit| StoryEvent {
            timestamp: commit.author.date.unwrap_or(generated_at),
            message: commit.summary().to_string(),
            author: Some(commit.author.name.clone()),
            sha: Some(commit.sha.clone()),
            url: Some(commit.url.clone()),
        })
        .collect();

    NewStory {
        title: format!("The Story of {}", repository.name),
        description: repository.description.clone(),
        content,
        metadata: Some(StoryMetadata {
            generated_at: Some(generated_at),
            style: Some(style),
        }),
        events: Some(events),
        repository: Some(RepositoryRef {
            name: Some(repository.full_name.clone()),
            description: repository.description.clone(),
            url: Some(repository.url.clone()),
        }),
    }
}

/// Oldest first. The provider returns newest first; undated commits keep
/// their relative order at the end.
fn chronological(commits: &[Commit]) -> Vec<&Commit> {
    let mut ordered: Vec<&Commit> = commits.iter().rev().collect();
    ordered.sort_by_key(|commit| (commit.author.date.is_none(), commit.author.date));
    ordered
}

fn day(commit: &Commit) -> String {
    commit
        .author
        .date
        .map(|date| date.format("%B %-d, %Y").to_string())
        .unwrap_or_else(|| "an unrecorded day".to_string())
}

fn short_sha(commit: &Commit) -> &str {
    commit.sha.get(..7).unwrap_or(&commit.sha)
}

fn narrative(repository: &Repository, commits: &[&Commit]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "This is the story of {}, told through {} commit{}.\n",
        repository.full_name,
        commits.len(),
        if commits.len() == 1 { "" } else { "s" }
    );

    for (index, commit) in commits.iter().enumerate() {
        let opener = match index {
            0 => "It all began",
            i if i + 1 == commits.len() => "Most recently",
            _ => "Then",
        };
        let _ = writeln!(
            out,
            "{opener}, on {}, {} wrote: \"{}\"\n",
            day(commit),
            commit.author.name,
            commit.summary()
        );
    }

    out.trim_end().to_string()
}

fn technical(repository: &Repository, commits: &[&Commit]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Commit log for {}:\n", repository.full_name);
    for commit in commits {
        let _ = writeln!(
            out,
            "- `{}` {} ({}): {}",
            short_sha(commit),
            day(commit),
            commit.author.name,
            commit.summary()
        );
    }
    out.trim_end().to_string()
}

fn summary(repository: &Repository, commits: &[&Commit]) -> String {
    let contributors: BTreeSet<&str> = commits.iter().map(|c| c.author.name.as_str()).collect();
    let mut out = String::new();

    let _ = write!(
        out,
        "{} has {} commit{} from {} contributor{}",
        repository.full_name,
        commits.len(),
        if commits.len() == 1 { "" } else { "s" },
        contributors.len(),
        if contributors.len() == 1 { "" } else { "s" },
    );
    if let (Some(first), Some(last)) = (commits.first(), commits.last()) {
        let _ = write!(out, ", from {} to {}", day(first), day(last));
    }
    out.push_str(".\n\nHighlights:\n\n");

    for commit in commits.iter().rev().take(SUMMARY_HIGHLIGHTS) {
        let _ = writeln!(out, "- {}", commit.summary());
    }

    out.trim_end().to_string()
}
