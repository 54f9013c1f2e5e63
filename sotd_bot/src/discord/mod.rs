use tracing::{event, Level};

use crate::ServerData;

pub type Context<'a> = poise::Context<'a, ServerData, anyhow::Error>;

pub mod announcement;
pub mod commands;
pub mod jobs;
pub mod pagination;
pub mod permissions;


pub(crate) const PERMISSION_DENIED: &str = ":x: You do not have permission to configure the bot.";

/// What the user sees when a command fails, with the whole error chain.
pub(crate) fn failure_message(error: &anyhow::Error) -> String {
    format!(":x: Sorry, something happened! {:#}", error)
}

/// Report failed commands back to the user, everything else goes to poise's default handler.
pub async fn on_error(error: poise::FrameworkError<'_, ServerData, anyhow::Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            event!(Level::ERROR, command = %ctx.command().qualified_name, "Command failed: {:?}", error);

            if let Err(e) = ctx.say(failure_message(&error)).await {
                event!(Level::WARN, %e, "Could not report the error to the user");
            }
        }
        poise::FrameworkError::CommandCheckFailed { error: None, ctx, .. } => {
            event!(Level::DEBUG, command = %ctx.command().qualified_name, "Member may not configure the bot");

            if let Err(e) = ctx.say(PERMISSION_DENIED).await {
                event!(Level::WARN, %e, "Could not report the denial to the user");
            }
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                event!(Level::ERROR, %e, "Error while handling error");
            }
        }
    }
}
