//! All things storage for the bot.

extern crate tracing;

/// All the storage models
pub mod model;

/// The json document holding every server's songs and settings
pub mod store;

/// sotd_storage prelude
pub mod prelude {
    pub use crate::model::{self, *};
    pub use crate::store::{self, ClearOutcome, SongDocument, Store, StoreError, UninstallOutcome};
}
