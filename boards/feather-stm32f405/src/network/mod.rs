//! Network settings for this board
pub mod config;
