pub mod auth;
pub mod exports;
pub mod github;
pub mod stories;
