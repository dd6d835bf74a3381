//! Story pipeline services.
//!
//! - [`github`] - VCS provider seam and the GitHub implementation
//! - [`story_composer`] - commits to story
//! - [`story_export`] - story to Markdown
//! - [`story_view`] - story to HTML
//! - [`rate_limit`] - per-key sliding window

pub mod github;
pub mod rate_limit;
pub mod story_composer;
pub mod story_export;
pub mod story_view;
