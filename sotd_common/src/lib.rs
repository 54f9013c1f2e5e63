/**
 Sotd_common
 */

pub mod cli;
pub mod config;

/// Sotd common prelude
pub mod prelude {
    pub use clap::Parser;

    pub use crate::config::SotdConfig;
    pub use crate::cli::Args;
    pub use crate::cli::Commands;
}
