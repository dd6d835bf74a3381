pub mod auth;
pub mod config;
pub mod db;
pub mod file_logging;
pub mod routes;
mod state;

pub use state::AppState;
