use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tone used when composing a story from commits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryStyle {
    #[default]
    Narrative,
    Technical,
    Summary,
}

impl StoryStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            StoryStyle::Narrative => "narrative",
            StoryStyle::Technical => "technical",
            StoryStyle::Summary => "summary",
        }
    }
}

impl fmt::Display for StoryStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStyle(pub String);

impl fmt::Display for UnknownStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown story style `{}`", self.0)
    }
}

impl std::error::Error for UnknownStyle {}

impl FromStr for StoryStyle {
    type Err = UnknownStyle;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "narrative" => Ok(StoryStyle::Narrative),
            "technical" => Ok(StoryStyle::Technical),
            "summary" => Ok(StoryStyle::Summary),
            _ => Err(UnknownStyle(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryMetadata {
    pub generated_at: Option<DateTime<Utc>>,
    pub style: Option<StoryStyle>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryEvent {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Back-reference from a story to the repository it was generated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub name: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub content: String,
    pub metadata: Option<StoryMetadata>,
    pub events: Option<Vec<StoryEvent>>,
    pub repository: Option<RepositoryRef>,
    pub created_at: DateTime<Utc>,
}

/// A story that has been composed but not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStory {
    pub title: String,
    pub description: Option<String>,
    pub content: String,
    pub metadata: Option<StoryMetadata>,
    pub events: Option<Vec<StoryEvent>>,
    pub repository: Option<RepositoryRef>,
}

/// Owner/repo pair after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoCoordinates {
    pub owner: String,
    pub repo: String,
}

impl RepoCoordinates {
    pub fn parse(owner: Option<&str>, repo: Option<&str>) -> Result<Self, &'static str> {
        let owner = owner.map(str::trim).unwrap_or_default();
        let repo = repo.map(str::trim).unwrap_or_default();
        match (owner.is_empty(), repo.is_empty()) {
            (true, true) => Err("owner and repo are required"),
            (true, false) => Err("owner is required"),
            (false, true) => Err("repo is required"),
            (false, false) => Ok(Self {
                owner: owner.to_string(),
                repo: repo.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateStoryRequest {
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub repo: Option<String>,
}

impl GenerateStoryRequest {
    pub fn coordinates(&self) -> Result<RepoCoordinates, &'static str> {
        RepoCoordinates::parse(self.owner.as_deref(), self.repo.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateStoryRequest {
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
}

impl CreateStoryRequest {
    pub fn coordinates(&self) -> Result<RepoCoordinates, &'static str> {
        RepoCoordinates::parse(self.owner.as_deref(), self.repo.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListStoriesResponse {
    pub stories: Vec<Story>,
}
