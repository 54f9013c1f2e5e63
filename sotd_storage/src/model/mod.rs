//! All models for the bot

/// Per server songs and settings
pub mod server_settings;

/// The `HH:MM` time a server posts at
pub mod post_time;

pub use post_time::{InvalidPostTime, PostTime};
pub use server_settings::{ServerSettings, Song};
